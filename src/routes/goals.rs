//! # 목표(Goal) 라우트 핸들러
//!
//! 목표의 CRUD와 상태 변경을 처리하는 HTTP 핸들러 함수들입니다.
//! 판단(전이 인식, 알림 트리거)은 전부 services::goals에 있고,
//! 여기서는 요청/응답 매핑만 합니다.
//!
//! ## 엔드포인트
//! - `POST   /api/v1/patients/goals/{id}`             → 새 목표 생성 (id = 환자 ID)
//! - `GET    /api/v1/patients/goals/{id}`             → 환자의 목표 목록 (id = 환자 ID)
//! - `PATCH  /api/v1/patients/goals/{id}`             → 상태/완료 변경 (id = 목표 ID,
//!                                                       승인 전이면 알림 발생)
//! - `DELETE /api/v1/patients/goals/{id}`             → 목표 삭제 (id = 목표 ID)
//! - `GET    /api/v1/patients/goals/{id}/suggestions` → 목표 제안 (id = 환자 ID)
//!
//! 같은 경로의 id가 메서드에 따라 환자 ID이기도, 목표 ID이기도 합니다 —
//! 클라이언트가 이미 쓰고 있는 경로 형태라 바꾸지 않습니다.

use crate::{
    db,
    error::AppError,
    models::*,
    routes::AppState,
    services::goals as goal_engine,
    services::suggestions::{GoalSuggester, TemplateSuggester},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

/// `POST /patients/goals/{id}` — 새 목표를 생성합니다. (id = 환자 ID)
///
/// `pending_approval`로 생성된 경우, 담당 의료진에게 알리는 일은
/// 생성과 별개의 연산입니다 — 여기(호출자)가 이어서 호출해 줍니다.
/// 담당 의료진이 아직 없으면 통지만 건너뜁니다 (생성은 성공).
pub async fn create_goal(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
    Json(req): Json<CreateGoalRequest>,
) -> Result<(StatusCode, Json<Goal>), AppError> {
    let goal = goal_engine::create_goal(&state.pool, patient_id, &req).await?;

    if goal.status == GoalStatus::PendingApproval {
        match goal_engine::notify_pending_goal(&state.pool, &state.registry, goal.id).await {
            Ok(()) => {}
            // 환자에게 담당 의료진이 없는 경우 — 알릴 곳이 없을 뿐 에러는 아님
            Err(AppError::NotFound) => {
                tracing::debug!(goal_id = goal.id, "no clinician to notify for pending goal");
            }
            Err(e) => return Err(e),
        }
    }

    Ok((StatusCode::CREATED, Json(goal)))
}

/// `GET /patients/goals/{id}` — 환자의 목표 목록을 조회합니다. (id = 환자 ID)
pub async fn list_goals(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    // 존재하지 않는 환자는 빈 배열 대신 404
    db::get_patient(&state.pool, patient_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let goals = db::list_goals_for_patient(&state.pool, patient_id).await?;
    Ok(Json(json!({ "goals": goals })))
}

/// `PATCH /patients/goals/{id}` — 상태/완료 플래그를 변경합니다. (id = 목표 ID)
///
/// `pending_approval → active` 전이는 승인으로 인식되어
/// GOAL_APPROVED 알림 기록과 푸시까지 이어집니다 (services::goals).
pub async fn update_goal(
    State(state): State<AppState>,
    Path(goal_id): Path<i64>,
    Json(req): Json<UpdateGoalRequest>,
) -> Result<Json<Goal>, AppError> {
    let goal = goal_engine::update_goal_status(&state.pool, &state.registry, goal_id, &req).await?;
    Ok(Json(goal))
}

/// `DELETE /patients/goals/{id}` — 목표를 삭제합니다. (id = 목표 ID)
pub async fn delete_goal(
    State(state): State<AppState>,
    Path(goal_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    goal_engine::delete_goal(&state.pool, goal_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /patients/goals/{id}/suggestions` — 목표 제안 목록 (id = 환자 ID)
///
/// 외부 AI 생성기의 자리에는 기본 구현(TemplateSuggester)이 꽂혀 있습니다.
pub async fn suggest_goals(
    State(state): State<AppState>,
    Path(patient_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    db::get_patient(&state.pool, patient_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let goals = db::list_goals_for_patient(&state.pool, patient_id).await?;
    let suggestions = TemplateSuggester.suggest(&goals);
    Ok(Json(json!({ "suggestions": suggestions })))
}
