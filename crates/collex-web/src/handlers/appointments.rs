//! 预约相关接口

use axum::{extract::State, http::StatusCode, Json};
use collex_core::{Appointment, AvailabilitySlot, BookingGroup, Role, Slot};
use collex_workflow::{
    AvailabilityRequest, BookingRequest, CompletionRequest, ConsultationHistory, SlotRequest,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::Identity;
use crate::response::{created, ok, ApiJson, ApiQuery, ApiResponse, ApiResult};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookAppointmentBody {
    pub doctor_id: Uuid,
    pub reason: String,
    pub mode: String,
    pub slots: Vec<SlotRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelAppointmentBody {
    pub appointment_id: Uuid,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmAppointmentBody {
    pub appointment_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteConsultationBody {
    pub appointment_id: Uuid,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub prescription: String,
    #[serde(default)]
    pub doctor_notes: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishAvailabilityBody {
    pub date: String,
    pub time_slots: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedSlotsQuery {
    pub doc_id: Uuid,
}

/// POST /api/user/book-appointment
pub async fn book_appointment(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<BookAppointmentBody>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Vec<Appointment>>>)> {
    identity.require(Role::Normal)?;

    let appointments = state
        .engine
        .appointments()
        .book(BookingRequest {
            patient_id: identity.user_id,
            doctor_id: body.doctor_id,
            reason: body.reason,
            mode: body.mode,
            slots: body.slots,
        })
        .await?;

    info!("User {} booked {} slot(s)", identity.user_id, appointments.len());
    Ok(created(appointments, "Appointment booked successfully"))
}

/// DELETE /api/doctor/cancel-appointment
pub async fn cancel_appointment(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<CancelAppointmentBody>,
) -> ApiResult<Json<ApiResponse<Appointment>>> {
    identity.require_any(&[Role::Doctor, Role::Normal])?;

    let appointment = state
        .engine
        .appointments()
        .cancel(body.appointment_id, identity.user_id, &body.reason)
        .await?;
    Ok(Json(ApiResponse::ok(appointment).with_message("Appointment cancelled")))
}

/// PUT /api/doctor/confirm-appointment
pub async fn confirm_appointment(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<ConfirmAppointmentBody>,
) -> ApiResult<Json<ApiResponse<Appointment>>> {
    identity.require(Role::Doctor)?;

    let appointment = state
        .engine
        .appointments()
        .confirm(body.appointment_id, identity.user_id)
        .await?;
    Ok(Json(ApiResponse::ok(appointment).with_message("Appointment confirmed")))
}

/// POST /api/doctor/complete-consultation
pub async fn complete_consultation(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<CompleteConsultationBody>,
) -> ApiResult<Json<ApiResponse<Appointment>>> {
    identity.require(Role::Doctor)?;

    let appointment = state
        .engine
        .appointments()
        .complete(CompletionRequest {
            appointment_id: body.appointment_id,
            doctor_user_id: identity.user_id,
            diagnosis: body.diagnosis,
            prescription: body.prescription,
            doctor_notes: body.doctor_notes,
        })
        .await?;
    Ok(Json(ApiResponse::ok(appointment).with_message("Consultation completed")))
}

/// POST /api/doctor/schedule-appointment
pub async fn publish_availability(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(body): ApiJson<PublishAvailabilityBody>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Vec<AvailabilitySlot>>>)> {
    identity.require(Role::Doctor)?;

    let slots = state
        .engine
        .appointments()
        .publish_availability(AvailabilityRequest {
            doctor_user_id: identity.user_id,
            date: body.date,
            time_slots: body.time_slots,
        })
        .await?;
    Ok(created(slots, "Availability published"))
}

/// GET /api/doctor/availability
pub async fn availability(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<ApiResponse<Vec<AvailabilitySlot>>>> {
    identity.require(Role::Doctor)?;
    let slots = state.engine.appointments().availability(identity.user_id).await?;
    Ok(ok(slots))
}

/// GET /api/doctor/schedule
pub async fn doctor_schedule(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<ApiResponse<Vec<BookingGroup>>>> {
    identity.require(Role::Doctor)?;
    let groups = state.engine.appointments().doctor_schedule(identity.user_id).await?;
    Ok(ok(groups))
}

/// GET /api/doctor/consultations
pub async fn doctor_consultations(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<ApiResponse<ConsultationHistory>>> {
    identity.require(Role::Doctor)?;
    let history = state
        .engine
        .appointments()
        .doctor_consultations(identity.user_id)
        .await?;
    Ok(ok(history))
}

/// GET /api/user/consultations
pub async fn patient_consultations(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<Json<ApiResponse<ConsultationHistory>>> {
    identity.require(Role::Normal)?;
    let history = state
        .engine
        .appointments()
        .patient_consultations(identity.user_id)
        .await?;
    Ok(ok(history))
}

/// GET /api/user/confirmed-appiontment-slot?docId=
pub async fn confirmed_slots(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(query): ApiQuery<ConfirmedSlotsQuery>,
) -> ApiResult<Json<ApiResponse<Vec<Slot>>>> {
    identity.require(Role::Normal)?;
    let slots = state.engine.appointments().confirmed_slots(query.doc_id).await?;
    Ok(ok(slots))
}
