use crate::{
    db, error::AppError, middleware::auth::AuthUser, models::*, routes::AppState,
    services::notifications as notification_service,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

/// `POST /patients/{id}/labs` — 검사 결과 등록 (의료진/관리자 전용)
///
/// 결과 행을 먼저 기록하고, 환자의 사용자에게 LAB_NEW 알림을
/// 원장 기록 → 푸시 순서로 보냅니다.
pub async fn create_lab_result(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(patient_id): Path<i64>,
    Json(req): Json<CreateLabResultRequest>,
) -> Result<(StatusCode, Json<LabResult>), AppError> {
    require_clinical_role(&auth_user)?;

    let patient = db::get_patient(&state.pool, patient_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if req.test_name.trim().is_empty() {
        return Err(AppError::BadRequest("Test name is required".to_string()));
    }

    // 등록한 의료진을 기록해 둡니다 (admin이 올리면 NULL)
    let clinician_id = db::get_clinician_by_user(&state.pool, auth_user.user_id)
        .await?
        .map(|c| c.id);

    let lab = db::create_lab_result(&state.pool, patient_id, clinician_id, &req).await?;
    notification_service::notify_lab_new(&state.pool, &state.registry, patient.user_id, &lab)
        .await?;

    Ok((StatusCode::CREATED, Json(lab)))
}

/// `GET /patients/{id}/labs` — 환자의 검사 결과 목록 (최신순)
pub async fn list_lab_results(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    db::get_patient(&state.pool, patient_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let labs = db::list_lab_results_for_patient(&state.pool, patient_id).await?;
    Ok(Json(json!({ "labs": labs })))
}

/// `PATCH /labs/{id}/read` — 검사 결과 열람 처리 (멱등)
///
/// 같은 일을 하는 실시간 경로가 lab:read 프레임입니다.
pub async fn mark_lab_read(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<LabResult>, AppError> {
    if !db::mark_lab_viewed(&state.pool, id).await? {
        return Err(AppError::NotFound);
    }

    let lab = db::get_lab_result(&state.pool, id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(lab))
}

/// `POST /patients/{id}/medications` — 복약 배정 (의료진/관리자 전용)
pub async fn assign_medication(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(patient_id): Path<i64>,
    Json(req): Json<AssignMedicationRequest>,
) -> Result<(StatusCode, Json<Medication>), AppError> {
    require_clinical_role(&auth_user)?;

    let patient = db::get_patient(&state.pool, patient_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest("Medication name is required".to_string()));
    }

    let clinician_id = db::get_clinician_by_user(&state.pool, auth_user.user_id)
        .await?
        .map(|c| c.id);

    let medication = db::create_medication(
        &state.pool,
        patient_id,
        clinician_id,
        &req.name,
        req.dosage.as_deref(),
        req.instructions.as_deref(),
    )
    .await?;

    notification_service::notify_medication_assigned(
        &state.pool,
        &state.registry,
        patient.user_id,
        &medication,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(medication)))
}

/// `GET /patients/{id}/medications` — 환자의 복약 목록
pub async fn list_medications(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    db::get_patient(&state.pool, patient_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let medications = db::list_medications_for_patient(&state.pool, patient_id).await?;
    Ok(Json(json!({ "medications": medications })))
}

fn require_clinical_role(auth_user: &AuthUser) -> Result<(), AppError> {
    match auth_user.role {
        Role::Clinician | Role::Admin => Ok(()),
        _ => Err(AppError::Forbidden(
            "Only clinicians can manage labs and medications".to_string(),
        )),
    }
}
