//! 预约协调器
//!
//! 多时段预约、医生日程分组视图、问诊记录查询，以及确认/取消/完成三类状态转换。
//! 时段唯一性完全由存储层保证，这里的预检查只用于尽早返回友好的错误。

use collex_core::store::{AppointmentStore, DirectoryStore};
use collex_core::utils::new_id;
use collex_core::{
    codes, parse_date, Appointment, AppointmentStatus, AvailabilitySlot, BookingGroup, Clock,
    CollexError, Consultation, ConsultationMode, Doctor, Result, Slot, SlotTime, Stores,
    DEFAULT_DURATION_MINUTES, MAX_SLOTS_PER_BOOKING,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state_machine::{AppointmentEvent, AppointmentStateMachine};

/// 请求中的一个时段
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotRequest {
    pub date: String,
    pub time: String,
}

/// 预约请求
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub reason: String,
    pub mode: String,
    pub slots: Vec<SlotRequest>,
}

/// 完成问诊请求
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub appointment_id: Uuid,
    pub doctor_user_id: Uuid,
    pub diagnosis: String,
    pub prescription: String,
    pub doctor_notes: String,
}

/// 发布可预约时段请求
#[derive(Debug, Clone)]
pub struct AvailabilityRequest {
    pub doctor_user_id: Uuid,
    pub date: String,
    pub time_slots: Vec<String>,
}

/// 问诊记录视图
#[derive(Debug, Clone, Serialize)]
pub struct ConsultationHistory {
    pub upcoming: Vec<Appointment>,
    pub history: Vec<Appointment>,
}

/// 预约协调器
pub struct AppointmentCoordinator {
    appointments: Arc<dyn AppointmentStore>,
    directory: Arc<dyn DirectoryStore>,
    clock: Arc<dyn Clock>,
    state_machine: AppointmentStateMachine,
}

impl AppointmentCoordinator {
    pub fn new(stores: &Stores, clock: Arc<dyn Clock>) -> Self {
        Self {
            appointments: stores.appointments.clone(),
            directory: stores.directory.clone(),
            clock,
            state_machine: AppointmentStateMachine::new(),
        }
    }

    /// 解析并校验时段：格式正确且不早于当前时刻
    fn parse_slot(&self, date: &str, time: &str) -> Result<Slot> {
        let slot = Slot::new(parse_date(date)?, SlotTime::parse(time)?);
        if slot.starts_at() < self.clock.now() {
            return Err(CollexError::invalid_with(
                codes::PAST_SLOT,
                format!("Slot {} is in the past", slot),
                serde_json::json!({ "date": slot.date, "time": slot.time }),
            ));
        }
        Ok(slot)
    }

    async fn require_doctor(&self, doctor_id: Uuid) -> Result<Doctor> {
        self.directory.doctor(doctor_id).await?.ok_or_else(|| {
            CollexError::not_found(codes::DOCTOR_NOT_FOUND, format!("Doctor {} not found", doctor_id))
        })
    }

    async fn doctor_for_user(&self, user_id: Uuid) -> Result<Doctor> {
        self.directory.doctor_by_user(user_id).await?.ok_or_else(|| {
            CollexError::not_found(codes::DOCTOR_NOT_FOUND, "No doctor profile for this account")
        })
    }

    async fn require_appointment(&self, id: Uuid) -> Result<Appointment> {
        self.appointments.find_by_id(id).await?.ok_or_else(|| {
            CollexError::not_found(codes::APPOINTMENT_NOT_FOUND, format!("Appointment {} not found", id))
        })
    }

    /// 预约1..5个时段，同一请求的所有行共享一个booking_id
    pub async fn book(&self, request: BookingRequest) -> Result<Vec<Appointment>> {
        if request.slots.is_empty() || request.slots.len() > MAX_SLOTS_PER_BOOKING {
            return Err(CollexError::invalid(
                codes::INVALID_SLOT_COUNT,
                format!("Between 1 and {} slots must be selected", MAX_SLOTS_PER_BOOKING),
            ));
        }
        let mode = ConsultationMode::parse(&request.mode).ok_or_else(|| {
            CollexError::invalid(
                codes::INVALID_MODE,
                format!("Mode must be 'online' or 'offline', got '{}'", request.mode),
            )
        })?;
        if request.reason.trim().is_empty() {
            return Err(CollexError::invalid(codes::INVALID_INPUT, "Reason is required"));
        }

        let doctor = self.require_doctor(request.doctor_id).await?;
        if !doctor.is_active {
            return Err(CollexError::Forbidden {
                code: codes::DOCTOR_INACTIVE,
                message: format!("Doctor {} is not accepting appointments", doctor.id),
            });
        }

        let mut slots = Vec::with_capacity(request.slots.len());
        for requested in &request.slots {
            let slot = self.parse_slot(&requested.date, &requested.time)?;
            if self.appointments.is_slot_taken(doctor.id, &slot).await? {
                warn!("Slot {} of doctor {} is already taken", slot, doctor.id);
                return Err(CollexError::conflict_with(
                    codes::SLOT_UNAVAILABLE,
                    format!("Slot {} is no longer available", slot),
                    serde_json::json!({ "date": slot.date, "time": slot.time }),
                ));
            }
            slots.push(slot);
        }

        let now = self.clock.now();
        let booking_id = new_id();
        let appointments: Vec<Appointment> = slots
            .into_iter()
            .map(|slot| Appointment {
                id: new_id(),
                booking_id,
                doctor_id: doctor.id,
                patient_id: request.patient_id,
                reason: request.reason.clone(),
                mode,
                status: AppointmentStatus::Pending,
                date: slot.date,
                time: slot.time,
                duration_minutes: DEFAULT_DURATION_MINUTES,
                consultation_fee: doctor.consultation_fee,
                created_at: now,
                confirmed_at: None,
                cancelled_at: None,
                cancelled_by: None,
                cancellation_reason: None,
                completed_at: None,
                consultation: None,
            })
            .collect();

        self.appointments.reserve_all(&appointments).await?;

        info!(
            "Booked {} slot(s) for patient {} with doctor {} (booking {})",
            appointments.len(),
            request.patient_id,
            doctor.id,
            booking_id
        );
        Ok(appointments)
    }

    /// 医生日程：今天及以后的预约，按booking_id分组
    pub async fn doctor_schedule(&self, doctor_user_id: Uuid) -> Result<Vec<BookingGroup>> {
        let doctor = self.doctor_for_user(doctor_user_id).await?;
        let today = self.clock.today();

        let appointments: Vec<Appointment> = self
            .appointments
            .all_by_doctor(doctor.id)
            .await?
            .into_iter()
            .filter(|a| a.date >= today)
            .collect();

        let mut patient_ids: Vec<Uuid> = appointments.iter().map(|a| a.patient_id).collect();
        patient_ids.sort();
        patient_ids.dedup();
        let names: HashMap<Uuid, String> = self
            .directory
            .users(&patient_ids)
            .await?
            .into_iter()
            .map(|user| (user.id, user.full_name()))
            .collect();

        let groups = group_bookings(appointments, &names);
        debug!("Doctor {} schedule has {} booking group(s)", doctor.id, groups.len());
        Ok(groups)
    }

    pub async fn doctor_consultations(&self, doctor_user_id: Uuid) -> Result<ConsultationHistory> {
        let doctor = self.doctor_for_user(doctor_user_id).await?;
        let today = self.clock.today();
        Ok(ConsultationHistory {
            upcoming: self.appointments.upcoming_by_doctor(doctor.id, today).await?,
            history: self.appointments.history_by_doctor(doctor.id, today).await?,
        })
    }

    pub async fn patient_consultations(&self, patient_id: Uuid) -> Result<ConsultationHistory> {
        let today = self.clock.today();
        Ok(ConsultationHistory {
            upcoming: self.appointments.upcoming_by_patient(patient_id, today).await?,
            history: self.appointments.history_by_patient(patient_id, today).await?,
        })
    }

    /// 医生今天及以后已被占用（pending/confirmed）的时段
    pub async fn confirmed_slots(&self, doctor_id: Uuid) -> Result<Vec<Slot>> {
        let doctor = self.require_doctor(doctor_id).await?;
        let mut slots: Vec<Slot> = self
            .appointments
            .upcoming_by_doctor(doctor.id, self.clock.today())
            .await?
            .iter()
            .map(Appointment::slot)
            .collect();
        slots.sort();
        slots.dedup();
        Ok(slots)
    }

    /// 判断用户是否为预约的患者或医生
    async fn is_participant(&self, appointment: &Appointment, user_id: Uuid) -> Result<bool> {
        if appointment.patient_id == user_id {
            return Ok(true);
        }
        let doctor = self.directory.doctor(appointment.doctor_id).await?;
        Ok(doctor.map_or(false, |d| d.user_id == user_id))
    }

    /// 预约所属医生；没有医生档案的账号同样视为非参与者
    async fn appointment_doctor(&self, appointment: &Appointment, user_id: Uuid) -> Result<Doctor> {
        match self.directory.doctor_by_user(user_id).await? {
            Some(doctor) if doctor.id == appointment.doctor_id => Ok(doctor),
            _ => Err(not_participant()),
        }
    }

    /// 取消预约：患者或医生均可操作
    pub async fn cancel(&self, appointment_id: Uuid, actor_user_id: Uuid, reason: &str) -> Result<Appointment> {
        let mut appointment = self.require_appointment(appointment_id).await?;
        if !self.is_participant(&appointment, actor_user_id).await? {
            return Err(not_participant());
        }

        appointment.status = self
            .state_machine
            .transition(appointment.status, AppointmentEvent::Cancel)?;
        appointment.cancelled_at = Some(self.clock.now());
        appointment.cancelled_by = Some(actor_user_id);
        appointment.cancellation_reason = Some(reason.to_string());
        self.appointments.update(&appointment).await?;

        info!("Appointment {} cancelled by {}", appointment.id, actor_user_id);
        Ok(appointment)
    }

    /// 医生确认预约
    pub async fn confirm(&self, appointment_id: Uuid, doctor_user_id: Uuid) -> Result<Appointment> {
        let mut appointment = self.require_appointment(appointment_id).await?;
        let doctor = self.appointment_doctor(&appointment, doctor_user_id).await?;

        appointment.status = self
            .state_machine
            .transition(appointment.status, AppointmentEvent::Confirm)?;
        appointment.confirmed_at = Some(self.clock.now());
        self.appointments.update(&appointment).await?;

        info!("Appointment {} confirmed by doctor {}", appointment.id, doctor.id);
        Ok(appointment)
    }

    /// 完成问诊并记录诊断、处方与医嘱
    pub async fn complete(&self, request: CompletionRequest) -> Result<Appointment> {
        let mut appointment = self.require_appointment(request.appointment_id).await?;
        let doctor = self.appointment_doctor(&appointment, request.doctor_user_id).await?;

        appointment.status = self
            .state_machine
            .transition(appointment.status, AppointmentEvent::Complete)?;
        appointment.completed_at = Some(self.clock.now());
        appointment.consultation = Some(Consultation {
            diagnosis: request.diagnosis,
            prescription: request.prescription,
            doctor_notes: request.doctor_notes,
        });
        self.appointments.update(&appointment).await?;

        info!("Consultation {} completed by doctor {}", appointment.id, doctor.id);
        Ok(appointment)
    }

    /// 发布可预约时段；任一时段已有未取消的预约则整体拒绝
    pub async fn publish_availability(&self, request: AvailabilityRequest) -> Result<Vec<AvailabilitySlot>> {
        if request.time_slots.is_empty() {
            return Err(CollexError::invalid(codes::INVALID_INPUT, "At least one time slot is required"));
        }
        let doctor = self.doctor_for_user(request.doctor_user_id).await?;

        let mut slots = Vec::with_capacity(request.time_slots.len());
        for time in &request.time_slots {
            let slot = self.parse_slot(&request.date, time)?;
            if self.appointments.is_slot_taken(doctor.id, &slot).await? {
                return Err(CollexError::conflict_with(
                    codes::SLOT_ALREADY_EXISTS,
                    format!("Slot {} already has an appointment", slot),
                    serde_json::json!({ "date": slot.date, "time": slot.time }),
                ));
            }
            slots.push(slot);
        }
        slots.sort();
        slots.dedup();

        let now = self.clock.now();
        let availability: Vec<AvailabilitySlot> = slots
            .into_iter()
            .map(|slot| AvailabilitySlot {
                doctor_id: doctor.id,
                date: slot.date,
                time: slot.time,
                created_at: now,
            })
            .collect();
        self.appointments.publish_availability(&availability).await?;

        info!("Doctor {} published {} availability slot(s)", doctor.id, availability.len());
        Ok(availability)
    }

    /// 今天及以后已发布的可预约时段
    pub async fn availability(&self, doctor_user_id: Uuid) -> Result<Vec<AvailabilitySlot>> {
        let doctor = self.doctor_for_user(doctor_user_id).await?;
        self.appointments
            .availability_by_doctor(doctor.id, self.clock.today())
            .await
    }
}

fn not_participant() -> CollexError {
    CollexError::unauthorized(
        codes::NOT_APPOINTMENT_PARTICIPANT,
        "Only the patient or doctor of this appointment may change it",
    )
}

/// 按booking_id分组；组id与状态取最早时段的预约，组间按最早时段排序
fn group_bookings(appointments: Vec<Appointment>, names: &HashMap<Uuid, String>) -> Vec<BookingGroup> {
    let mut grouped: HashMap<Uuid, Vec<Appointment>> = HashMap::new();
    for appointment in appointments {
        grouped.entry(appointment.booking_id).or_default().push(appointment);
    }

    let mut groups: Vec<(Slot, BookingGroup)> = grouped
        .into_values()
        .filter_map(|mut members| {
            members.sort_by_key(Appointment::slot);
            let first = members.first()?;
            let group = BookingGroup {
                id: first.id,
                booking_id: first.booking_id,
                patient_id: first.patient_id,
                patient: names.get(&first.patient_id).cloned().unwrap_or_default(),
                reason: first.reason.clone(),
                mode: first.mode,
                status: first.status,
                selected_slots: members.iter().map(Appointment::slot).collect(),
            };
            Some((first.slot(), group))
        })
        .collect();

    groups.sort_by(|(a, ga), (b, gb)| a.cmp(b).then(ga.id.cmp(&gb.id)));
    groups.into_iter().map(|(_, group)| group).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use collex_core::{FixedClock, Role, UserSummary};
    use collex_database::MemoryStore;
    use rust_decimal::Decimal;

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: FixedClock,
        coordinator: AppointmentCoordinator,
        doctor: Doctor,
        patient: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2030, 6, 1, 8, 0, 0).unwrap());

        let patient = Uuid::new_v4();
        store
            .insert_user(UserSummary {
                id: patient,
                first_name: "Asha".to_string(),
                last_name: "Rao".to_string(),
                email: "asha@example.com".to_string(),
                role: Role::Normal,
            })
            .await;

        let doctor_user = Uuid::new_v4();
        let doctor = Doctor {
            id: Uuid::new_v4(),
            user_id: doctor_user,
            first_name: "Vikram".to_string(),
            last_name: "Sen".to_string(),
            specialization: Some("Cardiology".to_string()),
            consultation_fee: Decimal::new(750, 0),
            is_active: true,
        };
        store.insert_doctor(doctor.clone()).await;

        let stores = Stores::from_single(store.clone());
        let coordinator = AppointmentCoordinator::new(&stores, Arc::new(clock.clone()));
        Fixture {
            store,
            clock,
            coordinator,
            doctor,
            patient,
        }
    }

    fn slot(date: &str, time: &str) -> SlotRequest {
        SlotRequest {
            date: date.to_string(),
            time: time.to_string(),
        }
    }

    fn booking(f: &Fixture, slots: Vec<SlotRequest>) -> BookingRequest {
        BookingRequest {
            patient_id: f.patient,
            doctor_id: f.doctor.id,
            reason: "Chest pain".to_string(),
            mode: "online".to_string(),
            slots,
        }
    }

    #[tokio::test]
    async fn test_book_two_slots_groups_into_one_booking() {
        let f = fixture().await;

        let created = f
            .coordinator
            .book(booking(&f, vec![slot("2030-06-02", "11:00"), slot("2030-06-02", "10:00")]))
            .await
            .unwrap();
        assert_eq!(created.len(), 2);
        assert!(created.iter().all(|a| a.status == AppointmentStatus::Pending));
        assert!(created.iter().all(|a| a.consultation_fee == Decimal::new(750, 0)));
        assert!(created.iter().all(|a| a.duration_minutes == 30));

        let schedule = f.coordinator.doctor_schedule(f.doctor.user_id).await.unwrap();
        assert_eq!(schedule.len(), 1);
        let group = &schedule[0];
        assert_eq!(group.patient, "Asha Rao");
        assert_eq!(group.selected_slots.len(), 2);
        assert_eq!(group.selected_slots[0].time.to_string(), "10:00");
        assert_eq!(group.selected_slots[1].time.to_string(), "11:00");

        let earliest = created.iter().min_by_key(|a| a.slot()).unwrap();
        assert_eq!(group.id, earliest.id);
    }

    #[tokio::test]
    async fn test_book_conflict_leaves_no_rows() {
        let f = fixture().await;
        f.coordinator
            .book(booking(&f, vec![slot("2030-06-02", "10:00")]))
            .await
            .unwrap();

        let err = f
            .coordinator
            .book(booking(&f, vec![slot("2030-06-03", "09:00"), slot("2030-06-02", "10:00")]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::SLOT_UNAVAILABLE);
        assert_eq!(f.store.all_by_doctor(f.doctor.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_slots_in_one_request_conflict() {
        let f = fixture().await;
        let err = f
            .coordinator
            .book(booking(&f, vec![slot("2030-06-02", "10:00"), slot("2030-06-02", "10:00")]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::SLOT_UNAVAILABLE);
        assert!(f.store.all_by_doctor(f.doctor.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_booking_single_winner() {
        let f = fixture().await;
        let first = booking(&f, vec![slot("2030-06-05", "15:00")]);
        let second = booking(&f, vec![slot("2030-06-05", "15:00")]);

        let (a, b) = tokio::join!(f.coordinator.book(first), f.coordinator.book(second));
        assert!(a.is_ok() ^ b.is_ok());
        let loser = a.err().or(b.err()).unwrap();
        assert_eq!(loser.code(), codes::SLOT_UNAVAILABLE);
        assert_eq!(f.store.all_by_doctor(f.doctor.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_book_validation() {
        let f = fixture().await;

        let err = f.coordinator.book(booking(&f, vec![])).await.unwrap_err();
        assert_eq!(err.code(), codes::INVALID_SLOT_COUNT);

        let six = (0..6).map(|h| slot("2030-06-02", &format!("1{}:00", h))).collect();
        let err = f.coordinator.book(booking(&f, six)).await.unwrap_err();
        assert_eq!(err.code(), codes::INVALID_SLOT_COUNT);

        let mut request = booking(&f, vec![slot("2030-06-02", "10:00")]);
        request.mode = "video".to_string();
        assert_eq!(f.coordinator.book(request).await.unwrap_err().code(), codes::INVALID_MODE);

        let err = f
            .coordinator
            .book(booking(&f, vec![slot("2030-06-01", "07:30")]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::PAST_SLOT);

        let err = f
            .coordinator
            .book(booking(&f, vec![slot("2030/06/02", "10:00")]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::INVALID_DATE);

        let mut request = booking(&f, vec![slot("2030-06-02", "10:00")]);
        request.doctor_id = Uuid::new_v4();
        assert_eq!(f.coordinator.book(request).await.unwrap_err().code(), codes::DOCTOR_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_inactive_doctor_is_forbidden() {
        let f = fixture().await;
        let mut inactive = f.doctor.clone();
        inactive.is_active = false;
        f.store.insert_doctor(inactive).await;

        let err = f
            .coordinator
            .book(booking(&f, vec![slot("2030-06-02", "10:00")]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), collex_core::ErrorKind::Forbidden);
        assert_eq!(err.code(), codes::DOCTOR_INACTIVE);
    }

    #[tokio::test]
    async fn test_cancel_then_rebook_and_cancel_again() {
        let f = fixture().await;
        let created = f
            .coordinator
            .book(booking(&f, vec![slot("2030-06-02", "10:00")]))
            .await
            .unwrap();
        let id = created[0].id;

        let stranger = Uuid::new_v4();
        let err = f.coordinator.cancel(id, stranger, "nope").await.unwrap_err();
        assert_eq!(err.code(), codes::NOT_APPOINTMENT_PARTICIPANT);

        let cancelled = f.coordinator.cancel(id, f.patient, "travel").await.unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
        assert_eq!(cancelled.cancelled_by, Some(f.patient));
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("travel"));

        let err = f.coordinator.cancel(id, f.patient, "again").await.unwrap_err();
        assert_eq!(err.code(), codes::ALREADY_CANCELLED);

        // 取消后的时段可以再次预约
        f.coordinator
            .book(booking(&f, vec![slot("2030-06-02", "10:00")]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_doctor_cancels_confirmed_appointment() {
        let f = fixture().await;
        let created = f
            .coordinator
            .book(booking(&f, vec![slot("2030-06-03", "15:00")]))
            .await
            .unwrap();
        let id = created[0].id;
        f.coordinator.confirm(id, f.doctor.user_id).await.unwrap();

        let cancelled = f
            .coordinator
            .cancel(id, f.doctor.user_id, "Doctor unavailable")
            .await
            .unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
        assert_eq!(cancelled.cancelled_by, Some(f.doctor.user_id));
        assert!(cancelled.cancelled_at.is_some());

        let stored = AppointmentStore::find_by_id(f.store.as_ref(), id).await.unwrap().unwrap();
        assert_eq!(stored.cancelled_by, Some(f.doctor.user_id));

        let err = f
            .coordinator
            .cancel(id, f.doctor.user_id, "again")
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::ALREADY_CANCELLED);
    }

    #[tokio::test]
    async fn test_confirm_and_complete() {
        let f = fixture().await;
        let created = f
            .coordinator
            .book(booking(&f, vec![slot("2030-06-02", "10:00")]))
            .await
            .unwrap();
        let id = created[0].id;

        let err = f.coordinator.confirm(id, f.patient).await.unwrap_err();
        assert_eq!(err.code(), codes::NOT_APPOINTMENT_PARTICIPANT);
        let err = f
            .coordinator
            .complete(CompletionRequest {
                appointment_id: id,
                doctor_user_id: f.patient,
                diagnosis: String::new(),
                prescription: String::new(),
                doctor_notes: String::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::NOT_APPOINTMENT_PARTICIPANT);

        let confirmed = f.coordinator.confirm(id, f.doctor.user_id).await.unwrap();
        assert_eq!(confirmed.status, AppointmentStatus::Confirmed);
        assert!(confirmed.confirmed_at.is_some());

        let completed = f
            .coordinator
            .complete(CompletionRequest {
                appointment_id: id,
                doctor_user_id: f.doctor.user_id,
                diagnosis: "Angina".to_string(),
                prescription: "Aspirin".to_string(),
                doctor_notes: "Follow up in 2 weeks".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(completed.status, AppointmentStatus::Completed);

        let err = f.coordinator.cancel(id, f.patient, "late").await.unwrap_err();
        assert_eq!(err.code(), codes::ALREADY_COMPLETED);

        let history = f.coordinator.patient_consultations(f.patient).await.unwrap();
        assert!(history.upcoming.is_empty());
        assert_eq!(history.history.len(), 1);
        let consultation = history.history[0].consultation.as_ref().unwrap();
        assert_eq!(consultation.diagnosis, "Angina");
    }

    #[tokio::test]
    async fn test_upcoming_moves_to_history_after_date_passes() {
        let f = fixture().await;
        f.coordinator
            .book(booking(&f, vec![slot("2030-06-02", "10:00")]))
            .await
            .unwrap();

        let views = f.coordinator.doctor_consultations(f.doctor.user_id).await.unwrap();
        assert_eq!(views.upcoming.len(), 1);
        assert!(views.history.is_empty());

        f.clock.advance(Duration::days(2));
        let views = f.coordinator.doctor_consultations(f.doctor.user_id).await.unwrap();
        assert!(views.upcoming.is_empty());
        assert_eq!(views.history.len(), 1);
        assert!(f.coordinator.doctor_schedule(f.doctor.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_confirmed_slots_lists_occupied_slots() {
        let f = fixture().await;
        let created = f
            .coordinator
            .book(booking(&f, vec![slot("2030-06-03", "09:00"), slot("2030-06-02", "10:00")]))
            .await
            .unwrap();
        f.coordinator.cancel(created[0].id, f.patient, "x").await.unwrap();

        let slots = f.coordinator.confirmed_slots(f.doctor.id).await.unwrap();
        assert_eq!(slots, vec![created[1].slot()]);
    }

    #[tokio::test]
    async fn test_publish_availability() {
        let f = fixture().await;
        f.coordinator
            .book(booking(&f, vec![slot("2030-06-02", "10:00")]))
            .await
            .unwrap();

        let err = f
            .coordinator
            .publish_availability(AvailabilityRequest {
                doctor_user_id: f.doctor.user_id,
                date: "2030-06-02".to_string(),
                time_slots: vec!["09:00".to_string(), "10:00".to_string()],
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::SLOT_ALREADY_EXISTS);
        assert!(f.coordinator.availability(f.doctor.user_id).await.unwrap().is_empty());

        let published = f
            .coordinator
            .publish_availability(AvailabilityRequest {
                doctor_user_id: f.doctor.user_id,
                date: "2030-06-02".to_string(),
                time_slots: vec!["09:00".to_string(), "09:30".to_string()],
            })
            .await
            .unwrap();
        assert_eq!(published.len(), 2);
        assert_eq!(f.coordinator.availability(f.doctor.user_id).await.unwrap().len(), 2);
    }
}
