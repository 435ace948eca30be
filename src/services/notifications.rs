//! # 알림 서비스 — 기록 후 푸시 (write-then-notify)
//!
//! 전달할 가치가 있는 이벤트를 감지한 쪽이 이 모듈을 호출합니다.
//! 모든 함수는 같은 순서를 지킵니다:
//!
//! 1. 알림 원장에 행을 기록한다 (내구성 확보 — 여기서 실패하면 에러 반환)
//! 2. 수신자의 살아있는 연결에 프레임을 밀어 넣는다 (최선 노력 —
//!    연결이 없거나 푸시가 실패해도 에러가 아님)
//!
//! 원장 기록이 푸시보다 항상 먼저이므로(happens-before), 푸시가 실패해도
//! 내구 상태는 이미 일관적입니다. 클라이언트는 실시간 신호 하나를 놓칠
//! 뿐이고, 다음 조회에서 원장을 통해 따라잡습니다.

use serde_json::json;
use sqlx::SqlitePool;
use tracing::debug;

use crate::db;
use crate::error::AppError;
use crate::models::{Goal, LabResult, Medication, Notification, NotificationKind};
use crate::realtime::frame::{
    AnnouncementPayload, GoalApprovedPayload, GoalPendingPayload, LabNewPayload,
    MedicationAssignedPayload, ServerFrame,
};
use crate::realtime::SessionRegistry;

/// 목표 승인 알림 — 목표 소유 환자의 사용자에게 보냅니다.
///
/// `pending_approval → active` 전이에서만 호출됩니다 (services::goals).
pub async fn notify_goal_approved(
    pool: &SqlitePool,
    registry: &SessionRegistry,
    recipient_user_id: i64,
    goal: &Goal,
) -> Result<Notification, AppError> {
    let payload = json!({ "goalId": goal.id, "title": goal.title });
    let row = db::create_notification(
        pool,
        recipient_user_id,
        NotificationKind::GoalApproved,
        "goal",
        Some(goal.id),
        &payload.to_string(),
    )
    .await?;

    let delivered = registry
        .push_to_user(
            recipient_user_id,
            ServerFrame::GoalApproved(GoalApprovedPayload {
                notification_id: row.id,
                goal_id: goal.id,
                title: goal.title.clone(),
                created_at: row.created_at.clone(),
            }),
        )
        .await;
    debug!(
        user_id = recipient_user_id,
        goal_id = goal.id,
        delivered = delivered,
        "goal approval notification"
    );

    Ok(row)
}

/// 승인 대기 알림 — 담당 의료진의 사용자에게 보냅니다.
///
/// 승인 경로와 똑같이 원장을 먼저 거칩니다 — 접속해 있지 않던
/// 의료진도 다음 조회에서 대기 목표를 보게 됩니다.
pub async fn notify_goal_pending(
    pool: &SqlitePool,
    registry: &SessionRegistry,
    clinician_user_id: i64,
    goal: &Goal,
    patient_name: &str,
) -> Result<Notification, AppError> {
    let payload = json!({
        "goalId": goal.id,
        "title": goal.title,
        "patient": patient_name,
    });
    let row = db::create_notification(
        pool,
        clinician_user_id,
        NotificationKind::GoalPending,
        "goal",
        Some(goal.id),
        &payload.to_string(),
    )
    .await?;

    let delivered = registry
        .push_to_user(
            clinician_user_id,
            ServerFrame::GoalPending(GoalPendingPayload {
                id: goal.id,
                title: goal.title.clone(),
                description: goal.description.clone(),
                patient: patient_name.to_string(),
                submitted: goal.created_at.clone(),
            }),
        )
        .await;
    debug!(
        user_id = clinician_user_id,
        goal_id = goal.id,
        delivered = delivered,
        "pending goal notification"
    );

    Ok(row)
}

/// 새 검사 결과 알림 — 결과의 주인(환자)의 사용자에게 보냅니다.
pub async fn notify_lab_new(
    pool: &SqlitePool,
    registry: &SessionRegistry,
    recipient_user_id: i64,
    lab: &LabResult,
) -> Result<Notification, AppError> {
    let payload = json!({ "labId": lab.id, "test_name": lab.test_name });
    let row = db::create_notification(
        pool,
        recipient_user_id,
        NotificationKind::LabNew,
        "lab",
        Some(lab.id),
        &payload.to_string(),
    )
    .await?;

    registry
        .push_to_user(
            recipient_user_id,
            ServerFrame::LabNew(LabNewPayload {
                id: lab.id,
                test_name: lab.test_name.clone(),
                created_at: row.created_at.clone(),
            }),
        )
        .await;

    Ok(row)
}

/// 복약 배정 알림
pub async fn notify_medication_assigned(
    pool: &SqlitePool,
    registry: &SessionRegistry,
    recipient_user_id: i64,
    medication: &Medication,
) -> Result<Notification, AppError> {
    let payload = json!({ "medicationId": medication.id, "name": medication.name });
    let row = db::create_notification(
        pool,
        recipient_user_id,
        NotificationKind::MedicationAssigned,
        "medication",
        Some(medication.id),
        &payload.to_string(),
    )
    .await?;

    registry
        .push_to_user(
            recipient_user_id,
            ServerFrame::MedicationAssigned(MedicationAssignedPayload {
                id: medication.id,
                name: medication.name.clone(),
                created_at: row.created_at.clone(),
            }),
        )
        .await;

    Ok(row)
}

/// 공지 브로드캐스트 — 모든 사용자에게 알림 행을 만들고 푸시합니다.
///
/// 사용자별로 "기록 → 푸시" 순서를 지킵니다. 반환값은 만들어진 알림 수.
pub async fn announce(
    pool: &SqlitePool,
    registry: &SessionRegistry,
    title: &str,
    message: &str,
) -> Result<usize, AppError> {
    let payload = json!({ "title": title, "message": message }).to_string();
    let user_ids = db::users::list_user_ids(pool).await?;
    let mut created = 0usize;

    for user_id in user_ids {
        let row = db::create_notification(
            pool,
            user_id,
            NotificationKind::Announcement,
            "announcement",
            None,
            &payload,
        )
        .await?;
        created += 1;

        registry
            .push_to_user(
                user_id,
                ServerFrame::Announcement(AnnouncementPayload {
                    notification_id: row.id,
                    title: title.to_string(),
                    message: message.to_string(),
                    created_at: row.created_at.clone(),
                }),
            )
            .await;
    }

    Ok(created)
}
