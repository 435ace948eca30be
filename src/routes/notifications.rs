//! # 알림 라우트 핸들러
//!
//! 알림 원장의 조회/읽음 처리와 공지 브로드캐스트입니다.
//!
//! ## 엔드포인트
//! - `GET   /api/v1/notifications/{user_id}` → 사용자의 전체 알림 (최신순)
//! - `PATCH /api/v1/notifications/{id}/read` → 읽음 처리 (멱등)
//! - `POST  /api/v1/announcements`           → 전체 공지 (admin 전용)
//!
//! 푸시를 받지 못한 클라이언트의 복구 경로가 GET 엔드포인트입니다 —
//! 원장이 항상 푸시보다 먼저 기록되므로, 여기서 보이지 않는 알림은
//! 존재하지 않는 알림입니다.

use crate::{
    db,
    error::AppError,
    middleware::auth::AuthUser,
    models::*,
    routes::AppState,
    services::notifications as notification_service,
};
use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

/// `GET /notifications/{user_id}` — 사용자의 모든 알림을 최신순으로 조회합니다.
pub async fn list_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    db::users::find_by_id(&state.pool, user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let notifications: Vec<NotificationResponse> =
        db::list_notifications_for_user(&state.pool, user_id)
            .await?
            .into_iter()
            .map(NotificationResponse::from)
            .collect();

    Ok(Json(json!({ "notifications": notifications })))
}

/// `PATCH /notifications/{id}/read` — 알림을 읽음 처리합니다.
///
/// 이미 읽은 알림에 다시 호출해도 read_at은 그대로입니다 (멱등).
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<NotificationResponse>, AppError> {
    let notification = db::mark_notification_read(&state.pool, id)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(notification.into()))
}

/// `POST /announcements` — 모든 사용자에게 공지를 보냅니다. (admin 전용)
///
/// 사용자마다 알림 행을 만들고(내구성), 접속 중인 연결에는
/// ANNOUNCEMENT 프레임을 푸시합니다.
pub async fn announce(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(req): Json<AnnounceRequest>,
) -> Result<Json<Value>, AppError> {
    if auth_user.role != Role::Admin {
        return Err(AppError::Forbidden("Only admins can broadcast announcements".to_string()));
    }
    if req.title.trim().is_empty() {
        return Err(AppError::BadRequest("Announcement title is required".to_string()));
    }

    let created =
        notification_service::announce(&state.pool, &state.registry, &req.title, &req.message)
            .await?;

    Ok(Json(json!({ "created": created })))
}
