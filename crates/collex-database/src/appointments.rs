//! 预约存储的Postgres实现

use async_trait::async_trait;
use chrono::NaiveDate;
use collex_core::store::AppointmentStore;
use collex_core::{codes, Appointment, AppointmentStatus, AvailabilitySlot, CollexError, Result, Slot};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::connection::{db_err, is_unique_violation};
use crate::models::{DbAppointment, DbAvailability};
use crate::PgStore;

const INSERT_APPOINTMENT: &str = r#"
    INSERT INTO appointments (
        id, booking_id, doctor_id, patient_id, reason, mode, status, date, time,
        duration_minutes, consultation_fee, created_at
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
"#;

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

async fn insert_appointment(
    tx: &mut Transaction<'_, Postgres>,
    appointment: &Appointment,
) -> Result<()> {
    sqlx::query(INSERT_APPOINTMENT)
        .bind(appointment.id)
        .bind(appointment.booking_id)
        .bind(appointment.doctor_id)
        .bind(appointment.patient_id)
        .bind(&appointment.reason)
        .bind(appointment.mode.as_str())
        .bind(appointment.status.as_str())
        .bind(appointment.date)
        .bind(appointment.time.to_string())
        .bind(appointment.duration_minutes)
        .bind(appointment.consultation_fee)
        .bind(appointment.created_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                slot_conflict(appointment)
            } else {
                db_err(e)
            }
        })?;
    Ok(())
}

fn into_appointments(rows: Vec<DbAppointment>) -> Result<Vec<Appointment>> {
    rows.into_iter().map(Appointment::try_from).collect()
}

#[async_trait]
impl AppointmentStore for PgStore {
    async fn reserve(&self, appointment: &Appointment) -> Result<()> {
        self.reserve_all(std::slice::from_ref(appointment)).await
    }

    async fn reserve_all(&self, appointments: &[Appointment]) -> Result<()> {
        let mut tx = self.pool().begin().await.map_err(db_err)?;

        for appointment in appointments {
            // 出错时tx被丢弃，已插入的行随之回滚
            insert_appointment(&mut tx, appointment).await?;
        }

        tx.commit().await.map_err(db_err)?;
        tracing::debug!("Reserved {} appointment slot(s)", appointments.len());
        Ok(())
    }

    async fn is_slot_taken(&self, doctor_id: Uuid, slot: &Slot) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM appointments
                WHERE doctor_id = $1 AND date = $2 AND time = $3 AND status <> 'cancelled'
            )
            "#,
        )
        .bind(doctor_id)
        .bind(slot.date)
        .bind(slot.time.to_string())
        .fetch_one(self.pool())
        .await
        .map_err(db_err)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>> {
        let row = sqlx::query_as::<_, DbAppointment>("SELECT * FROM appointments WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(db_err)?;

        row.map(Appointment::try_from).transpose()
    }

    async fn update(&self, appointment: &Appointment) -> Result<()> {
        let consultation = appointment.consultation.as_ref();
        let result = sqlx::query(
            r#"
            UPDATE appointments SET
                status = $2,
                confirmed_at = $3,
                cancelled_at = $4,
                cancelled_by = $5,
                cancellation_reason = $6,
                completed_at = $7,
                diagnosis = $8,
                prescription = $9,
                doctor_notes = $10
            WHERE id = $1
            "#,
        )
        .bind(appointment.id)
        .bind(appointment.status.as_str())
        .bind(appointment.confirmed_at)
        .bind(appointment.cancelled_at)
        .bind(appointment.cancelled_by)
        .bind(&appointment.cancellation_reason)
        .bind(appointment.completed_at)
        .bind(consultation.map(|c| c.diagnosis.as_str()))
        .bind(consultation.map(|c| c.prescription.as_str()))
        .bind(consultation.map(|c| c.doctor_notes.as_str()))
        .execute(self.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                slot_conflict(appointment)
            } else {
                db_err(e)
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(CollexError::not_found(
                codes::APPOINTMENT_NOT_FOUND,
                format!("Appointment {} not found", appointment.id),
            ));
        }
        Ok(())
    }

    async fn by_doctor(
        &self,
        doctor_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>> {
        let rows = sqlx::query_as::<_, DbAppointment>(
            r#"
            SELECT * FROM appointments
            WHERE doctor_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY date ASC, time ASC
            "#,
        )
        .bind(doctor_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;

        into_appointments(rows)
    }

    async fn all_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Appointment>> {
        self.by_doctor(doctor_id, None).await
    }

    async fn upcoming_by_doctor(&self, doctor_id: Uuid, today: NaiveDate) -> Result<Vec<Appointment>> {
        let rows = sqlx::query_as::<_, DbAppointment>(
            r#"
            SELECT * FROM appointments
            WHERE doctor_id = $1 AND date >= $2 AND status IN ('pending', 'confirmed')
            ORDER BY date ASC, time ASC
            "#,
        )
        .bind(doctor_id)
        .bind(today)
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;

        into_appointments(rows)
    }

    async fn history_by_doctor(&self, doctor_id: Uuid, today: NaiveDate) -> Result<Vec<Appointment>> {
        let rows = sqlx::query_as::<_, DbAppointment>(
            r#"
            SELECT * FROM appointments
            WHERE doctor_id = $1
              AND (status IN ('completed', 'cancelled', 'no_show') OR date < $2)
            ORDER BY date DESC, time DESC
            "#,
        )
        .bind(doctor_id)
        .bind(today)
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;

        into_appointments(rows)
    }

    async fn upcoming_by_patient(&self, patient_id: Uuid, today: NaiveDate) -> Result<Vec<Appointment>> {
        let rows = sqlx::query_as::<_, DbAppointment>(
            r#"
            SELECT * FROM appointments
            WHERE patient_id = $1 AND date >= $2 AND status IN ('pending', 'confirmed')
            ORDER BY date ASC, time ASC
            "#,
        )
        .bind(patient_id)
        .bind(today)
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;

        into_appointments(rows)
    }

    async fn history_by_patient(&self, patient_id: Uuid, today: NaiveDate) -> Result<Vec<Appointment>> {
        let rows = sqlx::query_as::<_, DbAppointment>(
            r#"
            SELECT * FROM appointments
            WHERE patient_id = $1
              AND (status IN ('completed', 'cancelled', 'no_show') OR date < $2)
            ORDER BY date DESC, time DESC
            "#,
        )
        .bind(patient_id)
        .bind(today)
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;

        into_appointments(rows)
    }

    async fn publish_availability(&self, slots: &[AvailabilitySlot]) -> Result<()> {
        let mut tx = self.pool().begin().await.map_err(db_err)?;

        for slot in slots {
            sqlx::query(
                r#"
                INSERT INTO doctor_availability (doctor_id, date, time, created_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (doctor_id, date, time) DO NOTHING
                "#,
            )
            .bind(slot.doctor_id)
            .bind(slot.date)
            .bind(slot.time.to_string())
            .bind(slot.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn availability_by_doctor(
        &self,
        doctor_id: Uuid,
        from: NaiveDate,
    ) -> Result<Vec<AvailabilitySlot>> {
        let rows = sqlx::query_as::<_, DbAvailability>(
            r#"
            SELECT * FROM doctor_availability
            WHERE doctor_id = $1 AND date >= $2
            ORDER BY date ASC, time ASC
            "#,
        )
        .bind(doctor_id)
        .bind(from)
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;

        rows.into_iter().map(AvailabilitySlot::try_from).collect()
    }
}
