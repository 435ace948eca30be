use crate::{
    db, error::AppError, models::*, routes::AppState,
};
use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

/// `GET /patients/{id}` — 환자 프로필 조회
pub async fn get_patient(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Patient>, AppError> {
    let patient = db::get_patient(&state.pool, id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(patient))
}

/// `POST /patients/{id}/profile` — 온보딩 프로필 제출
///
/// 민감 필드의 암복호화는 수집기(collaborator)의 몫이고, 여기 도착하는
/// 본문은 이미 평문입니다. 초대 코드가 있으면 담당 의료진을 연결하고,
/// 제출이 끝나면 계정의 profile_completed를 올립니다.
pub async fn complete_profile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<OnboardingRequest>,
) -> Result<Json<Patient>, AppError> {
    let patient = db::update_patient_profile(
        &state.pool,
        id,
        req.name.as_deref(),
        req.birth_date.as_deref(),
        req.phone.as_deref(),
    )
    .await?
    .ok_or(AppError::NotFound)?;

    if let Some(code) = &req.clinician_invite_code {
        let clinician = db::get_clinician_by_invite(&state.pool, code)
            .await?
            .ok_or(AppError::BadRequest("Invalid clinician invite code".to_string()))?;
        db::set_patient_clinician(&state.pool, patient.id, clinician.id).await?;
    }

    db::users::set_profile_completed(&state.pool, patient.user_id).await?;

    let patient = db::get_patient(&state.pool, id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(patient))
}

/// `POST /patients/{id}/caretakers` — 초대 코드로 보호자를 연결합니다.
///
/// 이미 연결된 보호자면 409 Conflict.
pub async fn link_caretaker(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<LinkCaretakerRequest>,
) -> Result<Json<Caretaker>, AppError> {
    db::get_patient(&state.pool, id)
        .await?
        .ok_or(AppError::NotFound)?;

    let caretaker = db::get_caretaker_by_invite(&state.pool, &req.invite_code)
        .await?
        .ok_or(AppError::BadRequest("Invalid caretaker invite code".to_string()))?;

    let linked = db::link_caretaker(&state.pool, id, caretaker.id).await?;
    if !linked {
        return Err(AppError::Conflict("Caretaker is already linked to this patient".to_string()));
    }

    Ok(Json(caretaker))
}

/// `GET /patients/{id}/caretakers` — 연결된 보호자 목록
pub async fn list_caretakers(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    db::get_patient(&state.pool, id)
        .await?
        .ok_or(AppError::NotFound)?;

    let caretakers = db::list_caretakers_for_patient(&state.pool, id).await?;
    Ok(Json(json!({ "caretakers": caretakers })))
}
