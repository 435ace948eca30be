//! # 알림 원장 데이터베이스 쿼리 모듈
//!
//! 알림(notifications) 테이블의 append-only 쿼리 함수들입니다.
//!
//! ## 원장(ledger) 규칙
//! - 삽입만 있고 수정은 `read_at` 설정 하나뿐입니다. 삭제는 없습니다.
//! - `read_at`은 `WHERE read_at IS NULL` 조건으로만 설정하므로
//!   이미 읽은 알림을 다시 읽음 처리해도 값이 바뀌지 않습니다 (멱등).
//! - 실시간 푸시는 이 원장에 기록된 뒤에만 시도됩니다 — 푸시를 놓쳐도
//!   원장이 남아 있으므로 알림이 유실되는 실패 모드는 없습니다.

use crate::error::AppError;
use crate::models::{Notification, NotificationKind};
use sqlx::SqlitePool;

/// 알림 한 건을 원장에 추가합니다.
///
/// 수신자가 존재하지 않으면 `NotFound`를 반환합니다.
/// `payload`는 종류별 구조체를 serde로 직렬화한 JSON 문자열입니다.
pub async fn create_notification(
    pool: &SqlitePool,
    user_id: i64,
    kind: NotificationKind,
    entity_kind: &str,
    entity_id: Option<i64>,
    payload: &str,
) -> Result<Notification, AppError> {
    // 수신자 존재 확인 — 없는 사용자에게 알림을 쌓지 않습니다
    let recipient: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    if recipient.is_none() {
        return Err(AppError::NotFound);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO notifications (user_id, kind, entity_kind, entity_id, payload)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(kind.as_str())
    .bind(entity_kind)
    .bind(entity_id)
    .bind(payload)
    .execute(pool)
    .await?;

    get_notification(pool, result.last_insert_rowid())
        .await?
        .ok_or(AppError::Internal(
            "Failed to retrieve created notification".to_string(),
        ))
}

/// ID로 알림 하나를 조회합니다.
pub async fn get_notification(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<Notification>, AppError> {
    let notification = sqlx::query_as::<_, Notification>(
        r#"
        SELECT id, user_id, kind, entity_kind, entity_id, payload, created_at, read_at
        FROM notifications
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(notification)
}

/// 특정 사용자의 모든 알림을 최신순으로 조회합니다.
///
/// 페이지네이션은 없습니다. 규모가 커지면 LIMIT/OFFSET이 필요한 지점.
pub async fn list_notifications_for_user(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<Notification>, AppError> {
    let notifications = sqlx::query_as::<_, Notification>(
        r#"
        SELECT id, user_id, kind, entity_kind, entity_id, payload, created_at, read_at
        FROM notifications
        WHERE user_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(notifications)
}

/// 특정 사용자의 읽지 않은 알림만 최신순으로 조회합니다.
///
/// 세션 접속 직후 보내는 BOOTSTRAP 프레임의 재료입니다.
pub async fn list_unread_for_user(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Vec<Notification>, AppError> {
    let notifications = sqlx::query_as::<_, Notification>(
        r#"
        SELECT id, user_id, kind, entity_kind, entity_id, payload, created_at, read_at
        FROM notifications
        WHERE user_id = ? AND read_at IS NULL
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(notifications)
}

/// 알림을 읽음 처리합니다 (멱등).
///
/// `WHERE read_at IS NULL` 덕분에 이미 읽은 알림에 다시 호출해도
/// 첫 호출이 기록한 시각이 그대로 유지됩니다.
///
/// ## 반환값
/// - `Ok(Some(Notification))`: 처리 후의 알림 (이번에 읽었든 이미 읽었든)
/// - `Ok(None)`: 해당 ID의 알림이 존재하지 않음
pub async fn mark_notification_read(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<Notification>, AppError> {
    // 먼저 존재 여부를 확인합니다 — 없으면 None → 라우트에서 404 처리
    if get_notification(pool, id).await?.is_none() {
        return Ok(None);
    }

    sqlx::query(
        r#"
        UPDATE notifications
        SET read_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE id = ? AND read_at IS NULL
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    get_notification(pool, id).await
}
