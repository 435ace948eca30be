use crate::{
    db, error::AppError, middleware::auth::AuthUser, models::*, routes::AppState,
    services::invites,
};
use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

/// `GET /clinicians/{id}/patients` — 담당 환자 목록
pub async fn list_clinician_patients(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    db::get_clinician(&state.pool, id)
        .await?
        .ok_or(AppError::NotFound)?;

    let patients = db::list_patients_for_clinician(&state.pool, id).await?;
    Ok(Json(json!({ "patients": patients })))
}

/// `POST /clinicians/{id}/invite/regenerate` — 초대 코드를 새로 발급합니다.
///
/// 본인(의료진 계정) 또는 admin만 호출할 수 있습니다.
/// 이전 코드는 즉시 무효가 됩니다.
pub async fn regenerate_invite(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<Clinician>, AppError> {
    let clinician = db::get_clinician(&state.pool, id)
        .await?
        .ok_or(AppError::NotFound)?;

    if auth_user.role != Role::Admin && auth_user.user_id != clinician.user_id {
        return Err(AppError::Forbidden(
            "Only the clinician or an admin can regenerate the invite code".to_string(),
        ));
    }

    let code = invites::generate_invite_code();
    let clinician = db::update_clinician_invite(&state.pool, id, &code)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(clinician))
}
