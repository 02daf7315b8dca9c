//! 内存存储
//!
//! 与Postgres实现语义一致的进程内存储，用于测试和本地演示。
//! 所有写操作在同一把写锁内完成，等价于数据库事务。

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use collex_core::store::{
    AppointmentStore, CartStore, DirectoryStore, OrderStore, PaymentStore, Settlement,
    SettlementOutcome,
};
use collex_core::{
    codes, price_cart_items, Appointment, AppointmentStatus, AvailabilitySlot, Cart, CartItem,
    CollexError, Doctor, Medicine, Order, OrderStatus, Payment, PaymentStatus, Pharmacy, Result,
    Slot, UserSummary,
};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, UserSummary>,
    doctors: HashMap<Uuid, Doctor>,
    pharmacies: HashMap<Uuid, Pharmacy>,
    medicines: HashMap<Uuid, Medicine>,
    appointments: HashMap<Uuid, Appointment>,
    availability: BTreeMap<(Uuid, Slot), AvailabilitySlot>,
    carts: HashMap<Uuid, Cart>,
    payments: HashMap<Uuid, Payment>,
    orders: HashMap<Uuid, Order>,
}

impl MemoryState {
    fn slot_taken(&self, doctor_id: Uuid, slot: &Slot, except: Option<Uuid>) -> bool {
        self.appointments.values().any(|a| {
            a.doctor_id == doctor_id
                && a.slot() == *slot
                && a.status != AppointmentStatus::Cancelled
                && Some(a.id) != except
        })
    }

    fn cart_of(&self, user_id: Uuid) -> Option<&Cart> {
        self.carts.values().find(|cart| cart.user_id == user_id)
    }

    fn cart_of_mut(&mut self, user_id: Uuid) -> Option<&mut Cart> {
        self.carts.values_mut().find(|cart| cart.user_id == user_id)
    }

    fn medicines_for(&self, items: &[CartItem]) -> Vec<Medicine> {
        items
            .iter()
            .filter_map(|item| self.medicines.get(&item.medicine_id).cloned())
            .collect()
    }
}

fn slot_conflict(appointment: &Appointment) -> CollexError {
    CollexError::conflict_with(
        codes::SLOT_UNAVAILABLE,
        format!("Slot {} is no longer available", appointment.slot()),
        serde_json::json!({
            "date": appointment.date,
            "time": appointment.time,
        }),
    )
}

fn payment_not_found(id: Uuid) -> CollexError {
    CollexError::not_found(codes::PAYMENT_NOT_FOUND, format!("Payment {} not found", id))
}

fn cart_not_found() -> CollexError {
    CollexError::not_found(codes::CART_NOT_FOUND, "Cart not found")
}

fn item_not_in_cart(medicine_id: Uuid) -> CollexError {
    CollexError::not_found(
        codes::ITEM_NOT_IN_CART,
        format!("Medicine {} is not in the cart", medicine_id),
    )
}

fn sorted_asc(mut list: Vec<Appointment>) -> Vec<Appointment> {
    list.sort_by_key(|a| a.slot());
    list
}

fn sorted_desc(mut list: Vec<Appointment>) -> Vec<Appointment> {
    list.sort_by(|a, b| b.slot().cmp(&a.slot()));
    list
}

fn is_upcoming(appointment: &Appointment, today: NaiveDate) -> bool {
    appointment.date >= today && appointment.status.is_active()
}

fn is_history(appointment: &Appointment, today: NaiveDate) -> bool {
    appointment.status.is_terminal() || appointment.date < today
}

/// 内存存储
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: UserSummary) {
        self.state.write().await.users.insert(user.id, user);
    }

    pub async fn insert_doctor(&self, doctor: Doctor) {
        self.state.write().await.doctors.insert(doctor.id, doctor);
    }

    pub async fn insert_pharmacy(&self, pharmacy: Pharmacy) {
        self.state.write().await.pharmacies.insert(pharmacy.id, pharmacy);
    }

    pub async fn insert_medicine(&self, medicine: Medicine) {
        self.state.write().await.medicines.insert(medicine.id, medicine);
    }

    /// 修改药价，用于验证读取时按当前价格重算
    pub async fn set_medicine_price(&self, medicine_id: Uuid, price: Decimal) {
        if let Some(medicine) = self.state.write().await.medicines.get_mut(&medicine_id) {
            medicine.price = price;
        }
    }

    /// 当前支付行数量
    pub async fn payment_count(&self) -> usize {
        self.state.read().await.payments.len()
    }

    /// 当前订单数量
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl AppointmentStore for MemoryStore {
    async fn reserve(&self, appointment: &Appointment) -> Result<()> {
        self.reserve_all(std::slice::from_ref(appointment)).await
    }

    async fn reserve_all(&self, appointments: &[Appointment]) -> Result<()> {
        let mut state = self.state.write().await;

        let mut batch = HashSet::new();
        for appointment in appointments {
            let key = (appointment.doctor_id, appointment.slot());
            if state.slot_taken(appointment.doctor_id, &appointment.slot(), None)
                || !batch.insert(key)
            {
                return Err(slot_conflict(appointment));
            }
        }

        for appointment in appointments {
            state.appointments.insert(appointment.id, appointment.clone());
        }
        Ok(())
    }

    async fn is_slot_taken(&self, doctor_id: Uuid, slot: &Slot) -> Result<bool> {
        Ok(self.state.read().await.slot_taken(doctor_id, slot, None))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>> {
        Ok(self.state.read().await.appointments.get(&id).cloned())
    }

    async fn update(&self, appointment: &Appointment) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.appointments.contains_key(&appointment.id) {
            return Err(CollexError::not_found(
                codes::APPOINTMENT_NOT_FOUND,
                format!("Appointment {} not found", appointment.id),
            ));
        }
        if appointment.status != AppointmentStatus::Cancelled
            && state.slot_taken(appointment.doctor_id, &appointment.slot(), Some(appointment.id))
        {
            return Err(slot_conflict(appointment));
        }
        state.appointments.insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn by_doctor(
        &self,
        doctor_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>> {
        let state = self.state.read().await;
        let list = state
            .appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id && status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();
        Ok(sorted_asc(list))
    }

    async fn all_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>> {
        self.by_doctor(doctor_id, None).await
    }

    async fn upcoming_by_doctor(&self, doctor_id: Uuid, today: NaiveDate) -> Result<Vec<Appointment>> {
        let state = self.state.read().await;
        let list = state
            .appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id && is_upcoming(a, today))
            .cloned()
            .collect();
        Ok(sorted_asc(list))
    }

    async fn history_by_doctor(&self, doctor_id: Uuid, today: NaiveDate) -> Result<Vec<Appointment>> {
        let state = self.state.read().await;
        let list = state
            .appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id && is_history(a, today))
            .cloned()
            .collect();
        Ok(sorted_desc(list))
    }

    async fn upcoming_by_patient(&self, patient_id: Uuid, today: NaiveDate) -> Result<Vec<Appointment>> {
        let state = self.state.read().await;
        let list = state
            .appointments
            .values()
            .filter(|a| a.patient_id == patient_id && is_upcoming(a, today))
            .cloned()
            .collect();
        Ok(sorted_asc(list))
    }

    async fn history_by_patient(&self, patient_id: Uuid, today: NaiveDate) -> Result<Vec<Appointment>> {
        let state = self.state.read().await;
        let list = state
            .appointments
            .values()
            .filter(|a| a.patient_id == patient_id && is_history(a, today))
            .cloned()
            .collect();
        Ok(sorted_desc(list))
    }

    async fn publish_availability(&self, slots: &[AvailabilitySlot]) -> Result<()> {
        let mut state = self.state.write().await;
        for slot in slots {
            state
                .availability
                .entry((slot.doctor_id, Slot::new(slot.date, slot.time)))
                .or_insert_with(|| slot.clone());
        }
        Ok(())
    }

    async fn availability_by_doctor(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
    ) -> Result<Vec<AvailabilitySlot>> {
        let state = self.state.read().await;
        Ok(state
            .availability
            .iter()
            .filter(|((doctor, slot), _)| *doctor == doctor_id && slot.date >= from)
            .map(|(_, slot)| slot.clone())
            .collect())
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn create_provisional(&self, payment: &Payment) -> Result<()> {
        let mut state = self.state.write().await;
        if state.payments.values().any(|p| p.order_id == payment.order_id) {
            return Err(CollexError::Database(format!(
                "duplicate local order id {}",
                payment.order_id
            )));
        }
        let mut payment = payment.clone();
        payment.provider_order_id = None;
        state.payments.insert(payment.id, payment);
        Ok(())
    }

    async fn attach_provider_order(&self, payment_id: Uuid, provider_order_id: &str) -> Result<Payment> {
        let mut state = self.state.write().await;
        let payment = state
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| payment_not_found(payment_id))?;
        payment.provider_order_id = Some(provider_order_id.to_string());
        payment.updated_at = Utc::now();
        Ok(payment.clone())
    }

    async fn discard(&self, payment_id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        let provisional = state
            .payments
            .get(&payment_id)
            .map_or(false, |p| p.provider_order_id.is_none());
        if provisional {
            state.payments.remove(&payment_id);
        }
        Ok(())
    }

    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Payment>> {
        let state = self.state.read().await;
        Ok(state.payments.values().find(|p| p.order_id == order_id).cloned())
    }

    async fn mark_failed(&self, payment_id: Uuid, reason: &str, at: DateTime<Utc>) -> Result<Payment> {
        let mut state = self.state.write().await;
        let payment = state
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| payment_not_found(payment_id))?;
        if payment.status == PaymentStatus::Pending {
            payment.status = PaymentStatus::Failed;
            payment.failure_reason = Some(reason.to_string());
            payment.updated_at = at;
        }
        Ok(payment.clone())
    }

    async fn settle(&self, settlement: &Settlement) -> Result<SettlementOutcome> {
        let mut state = self.state.write().await;

        let current = state
            .payments
            .get(&settlement.payment_id)
            .ok_or_else(|| payment_not_found(settlement.payment_id))?;
        if current.status == PaymentStatus::Failed {
            return Err(CollexError::invalid(
                codes::PAYMENT_ALREADY_FAILED,
                format!("Payment {} has already failed", current.order_id),
            ));
        }

        let mut payment = current.clone();
        if payment.status != PaymentStatus::Success {
            payment.status = PaymentStatus::Success;
            payment.provider_payment_id = Some(settlement.provider_payment_id.clone());
            payment.provider_signature = Some(settlement.provider_signature.clone());
            if settlement.method.is_some() {
                payment.method = settlement.method.clone();
            }
            payment.failure_reason = None;
            payment.updated_at = settlement.settled_at;
        }

        // 先计算订单，所有检查通过后再统一写入
        let mut order = None;
        if let Some(materialize) = &settlement.materialize {
            let already_materialized = state.orders.values().any(|o| o.payment_id == payment.id);
            if !already_materialized {
                if let Some(cart) = state.carts.get(&materialize.cart_id) {
                    let medicines = state.medicines_for(&cart.items);
                    let (lines, _) = price_cart_items(&cart.items, &medicines);
                    order = Order::from_cart_lines(
                        &materialize.draft,
                        &payment,
                        &lines,
                        settlement.settled_at,
                    );
                }
            }
        }

        state.payments.insert(payment.id, payment.clone());
        if let (Some(new_order), Some(materialize)) = (&order, &settlement.materialize) {
            state.orders.insert(new_order.id, new_order.clone());
            if let Some(cart) = state.carts.get_mut(&materialize.cart_id) {
                cart.items.clear();
                cart.total_amount = Decimal::ZERO;
                cart.updated_at = settlement.settled_at;
            }
        }

        Ok(SettlementOutcome { payment, order })
    }

    async fn provisional_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Payment>> {
        let state = self.state.read().await;
        let mut list: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| {
                p.provider_order_id.is_none()
                    && p.status == PaymentStatus::Pending
                    && p.created_at < cutoff
            })
            .cloned()
            .collect();
        list.sort_by_key(|p| p.created_at);
        Ok(list)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn by_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut list: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn by_payment(&self, payment_id: Uuid) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.values().find(|o| o.payment_id == payment_id).cloned())
    }

    async fn by_pharmacy(
        &self,
        pharmacy_id: Uuid,
        status: Option<OrderStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Order>, i64)> {
        let state = self.state.read().await;
        let mut matching: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.has_line_for(pharmacy_id) && status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn update_status(&self, order_id: Uuid, status: OrderStatus, at: DateTime<Utc>) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state.orders.get_mut(&order_id).ok_or_else(|| {
            CollexError::not_found(codes::ORDER_NOT_FOUND, format!("Order {} not found", order_id))
        })?;
        if order.status.is_terminal() {
            return Err(crate::orders::order_terminal(order));
        }
        order.status = status;
        order.updated_at = at;
        Ok(order.clone())
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn find_by_id(&self, cart_id: Uuid) -> Result<Option<Cart>> {
        Ok(self.state.read().await.carts.get(&cart_id).cloned())
    }

    async fn get(&self, user_id: Uuid) -> Result<Option<Cart>> {
        Ok(self.state.read().await.cart_of(user_id).cloned())
    }

    async fn add(&self, user_id: Uuid, medicine_id: Uuid, delta: i32) -> Result<Cart> {
        let mut state = self.state.write().await;
        let now = Utc::now();

        if state.cart_of(user_id).is_none() {
            let cart = Cart {
                id: Uuid::new_v4(),
                user_id,
                items: Vec::new(),
                total_amount: Decimal::ZERO,
                updated_at: now,
            };
            state.carts.insert(cart.id, cart);
        }

        let cart = state.cart_of_mut(user_id).ok_or_else(cart_not_found)?;
        match cart.items.iter_mut().find(|item| item.medicine_id == medicine_id) {
            Some(item) => {
                item.quantity = item.quantity.checked_add(delta).ok_or_else(|| {
                    CollexError::invalid(codes::INVALID_QUANTITY, "Quantity exceeds the allowed maximum")
                })?;
            }
            None => cart.items.push(CartItem {
                medicine_id,
                quantity: delta,
            }),
        }
        cart.updated_at = now;
        Ok(cart.clone())
    }

    async fn set_quantity(&self, user_id: Uuid, medicine_id: Uuid, quantity: i32) -> Result<Cart> {
        let mut state = self.state.write().await;
        let cart = state.cart_of_mut(user_id).ok_or_else(cart_not_found)?;
        let position = cart
            .items
            .iter()
            .position(|item| item.medicine_id == medicine_id)
            .ok_or_else(|| item_not_in_cart(medicine_id))?;

        if quantity == 0 {
            cart.items.remove(position);
        } else {
            cart.items[position].quantity = quantity;
        }
        cart.updated_at = Utc::now();
        Ok(cart.clone())
    }

    async fn remove(&self, user_id: Uuid, medicine_id: Uuid) -> Result<Cart> {
        self.set_quantity(user_id, medicine_id, 0).await
    }

    async fn clear(&self, user_id: Uuid) -> Result<Option<Cart>> {
        let mut state = self.state.write().await;
        Ok(state.cart_of_mut(user_id).map(|cart| {
            cart.items.clear();
            cart.total_amount = Decimal::ZERO;
            cart.updated_at = Utc::now();
            cart.clone()
        }))
    }

    async fn save_total(&self, cart_id: Uuid, total: Decimal) -> Result<()> {
        if let Some(cart) = self.state.write().await.carts.get_mut(&cart_id) {
            cart.total_amount = total;
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryStore for MemoryStore {
    async fn doctor(&self, id: Uuid) -> Result<Option<Doctor>> {
        Ok(self.state.read().await.doctors.get(&id).cloned())
    }

    async fn doctor_by_user(&self, user_id: Uuid) -> Result<Option<Doctor>> {
        let state = self.state.read().await;
        Ok(state.doctors.values().find(|d| d.user_id == user_id).cloned())
    }

    async fn pharmacy_by_user(&self, user_id: Uuid) -> Result<Option<Pharmacy>> {
        let state = self.state.read().await;
        Ok(state.pharmacies.values().find(|p| p.user_id == user_id).cloned())
    }

    async fn user(&self, id: Uuid) -> Result<Option<UserSummary>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn users(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.users.get(id).cloned()).collect())
    }

    async fn medicine(&self, id: Uuid) -> Result<Option<Medicine>> {
        Ok(self.state.read().await.medicines.get(&id).cloned())
    }

    async fn medicines(&self, ids: &[Uuid]) -> Result<Vec<Medicine>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.medicines.get(id).cloned()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collex_core::store::Materialization;
    use collex_core::{ConsultationMode, OrderDraft, SlotTime};
    use std::sync::Arc;

    fn appointment(doctor_id: Uuid, date: &str, time: &str) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            doctor_id,
            patient_id: Uuid::new_v4(),
            reason: "checkup".to_string(),
            mode: ConsultationMode::Online,
            status: AppointmentStatus::Pending,
            date: collex_core::parse_date(date).unwrap(),
            time: SlotTime::parse(time).unwrap(),
            duration_minutes: 30,
            consultation_fee: Decimal::new(500, 0),
            created_at: Utc::now(),
            confirmed_at: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            completed_at: None,
            consultation: None,
        }
    }

    fn payment(user_id: Uuid, cart_id: Option<Uuid>) -> Payment {
        let now = Utc::now();
        Payment {
            id: Uuid::new_v4(),
            order_id: format!("ORD{}", Uuid::new_v4().simple()),
            provider_order_id: None,
            user_id,
            cart_id,
            amount: Decimal::new(200, 0),
            currency: "INR".to_string(),
            status: PaymentStatus::Pending,
            provider_payment_id: None,
            provider_signature: None,
            method: None,
            failure_reason: None,
            delivery_address: "12 Main St".to_string(),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_reserve_rejects_taken_slot() {
        let store = MemoryStore::new();
        let doctor = Uuid::new_v4();

        store.reserve(&appointment(doctor, "2099-01-01", "10:00")).await.unwrap();
        let err = store
            .reserve(&appointment(doctor, "2099-01-01", "10:00"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::SLOT_UNAVAILABLE);

        // 其他医生的同一时段不受影响
        store
            .reserve(&appointment(Uuid::new_v4(), "2099-01-01", "10:00"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reserve_all_is_atomic() {
        let store = MemoryStore::new();
        let doctor = Uuid::new_v4();
        store.reserve(&appointment(doctor, "2099-01-01", "11:00")).await.unwrap();

        let batch = vec![
            appointment(doctor, "2099-01-01", "10:00"),
            appointment(doctor, "2099-01-01", "11:00"),
        ];
        assert!(store.reserve_all(&batch).await.is_err());
        assert_eq!(store.all_by_doctor(doctor).await.unwrap().len(), 1);

        let duplicate = vec![
            appointment(doctor, "2099-01-02", "10:00"),
            appointment(doctor, "2099-01-02", "10:00"),
        ];
        assert!(store.reserve_all(&duplicate).await.is_err());
        assert_eq!(store.all_by_doctor(doctor).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_slot_is_free() {
        let store = MemoryStore::new();
        let doctor = Uuid::new_v4();
        let mut first = appointment(doctor, "2099-01-01", "10:00");
        store.reserve(&first).await.unwrap();

        first.status = AppointmentStatus::Cancelled;
        store.update(&first).await.unwrap();

        let slot = first.slot();
        assert!(!store.is_slot_taken(doctor, &slot).await.unwrap());
        store.reserve(&appointment(doctor, "2099-01-01", "10:00")).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_reserve_single_winner() {
        let store = Arc::new(MemoryStore::new());
        let doctor = Uuid::new_v4();

        let a = appointment(doctor, "2099-03-01", "09:00");
        let b = appointment(doctor, "2099-03-01", "09:00");
        let (ra, rb) = tokio::join!(store.reserve(&a), store.reserve(&b));

        assert!(ra.is_ok() ^ rb.is_ok());
        assert_eq!(store.all_by_doctor(doctor).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cart_add_accumulates_and_remove() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let medicine = Uuid::new_v4();

        store.add(user, medicine, 2).await.unwrap();
        let cart = store.add(user, medicine, 3).await.unwrap();
        assert_eq!(cart.quantity_of(medicine), Some(5));

        let err = store.remove(user, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.code(), codes::ITEM_NOT_IN_CART);

        let cart = store.set_quantity(user, medicine, 0).await.unwrap();
        assert!(cart.items.is_empty());
    }

    #[tokio::test]
    async fn test_settle_materializes_once() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let pharmacy = Uuid::new_v4();
        let medicine = Medicine {
            id: Uuid::new_v4(),
            pharmacy_id: pharmacy,
            name: "Paracetamol".to_string(),
            price: Decimal::new(50, 0),
            stock: 100,
            is_active: true,
        };
        store.insert_medicine(medicine.clone()).await;
        let cart = store.add(user, medicine.id, 2).await.unwrap();

        let pending = payment(user, Some(cart.id));
        store.create_provisional(&pending).await.unwrap();

        let settlement = Settlement {
            payment_id: pending.id,
            provider_payment_id: "pay_1".to_string(),
            provider_signature: "sig".to_string(),
            method: Some("upi".to_string()),
            materialize: Some(Materialization {
                cart_id: cart.id,
                draft: OrderDraft {
                    order_id: Uuid::new_v4(),
                    order_number: "CLX-20990101-ABCDEFGH".to_string(),
                },
            }),
            settled_at: Utc::now(),
        };

        let first = store.settle(&settlement).await.unwrap();
        let order = first.order.unwrap();
        assert_eq!(order.total_amount, Decimal::new(100, 0));
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(first.payment.status, PaymentStatus::Success);
        assert!(store.get(user).await.unwrap().unwrap().items.is_empty());

        let second = store.settle(&settlement).await.unwrap();
        assert!(second.order.is_none());
        assert_eq!(store.order_count().await, 1);

        let delivered = store
            .update_status(order.id, OrderStatus::Delivered, Utc::now())
            .await
            .unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);
        let err = store
            .update_status(order.id, OrderStatus::Processing, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::ORDER_TERMINAL);
        let err = store
            .update_status(Uuid::new_v4(), OrderStatus::Processing, Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::ORDER_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_settle_keeps_settled_record() {
        let store = MemoryStore::new();
        let pending = payment(Uuid::new_v4(), None);
        store.create_provisional(&pending).await.unwrap();

        let mut settlement = Settlement {
            payment_id: pending.id,
            provider_payment_id: "pay_1".to_string(),
            provider_signature: "sig_1".to_string(),
            method: Some("card".to_string()),
            materialize: None,
            settled_at: Utc::now(),
        };
        store.settle(&settlement).await.unwrap();

        settlement.provider_payment_id = "pay_2".to_string();
        settlement.provider_signature = "sig_2".to_string();
        settlement.method = Some("upi".to_string());
        let again = store.settle(&settlement).await.unwrap();

        assert_eq!(again.payment.status, PaymentStatus::Success);
        assert_eq!(again.payment.provider_payment_id.as_deref(), Some("pay_1"));
        assert_eq!(again.payment.provider_signature.as_deref(), Some("sig_1"));
        assert_eq!(again.payment.method.as_deref(), Some("card"));
    }

    #[tokio::test]
    async fn test_cart_add_rejects_overflow() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let medicine = Uuid::new_v4();

        store.add(user, medicine, 5).await.unwrap();
        let err = store.add(user, medicine, i32::MAX).await.unwrap_err();
        assert_eq!(err.code(), codes::INVALID_QUANTITY);

        let cart = store.get(user).await.unwrap().unwrap();
        assert_eq!(cart.quantity_of(medicine), Some(5));
    }

    #[tokio::test]
    async fn test_settle_rejects_failed_payment() {
        let store = MemoryStore::new();
        let pending = payment(Uuid::new_v4(), None);
        store.create_provisional(&pending).await.unwrap();
        store.mark_failed(pending.id, "declined", Utc::now()).await.unwrap();

        let settlement = Settlement {
            payment_id: pending.id,
            provider_payment_id: "pay_1".to_string(),
            provider_signature: "sig".to_string(),
            method: None,
            materialize: None,
            settled_at: Utc::now(),
        };
        let err = store.settle(&settlement).await.unwrap_err();
        assert_eq!(err.code(), codes::PAYMENT_ALREADY_FAILED);
    }

    #[tokio::test]
    async fn test_discard_keeps_attached_payments() {
        let store = MemoryStore::new();
        let attached = payment(Uuid::new_v4(), None);
        let provisional = payment(Uuid::new_v4(), None);
        store.create_provisional(&attached).await.unwrap();
        store.create_provisional(&provisional).await.unwrap();
        store.attach_provider_order(attached.id, "order_1").await.unwrap();

        store.discard(attached.id).await.unwrap();
        store.discard(provisional.id).await.unwrap();
        assert_eq!(store.payment_count().await, 1);
    }
}
