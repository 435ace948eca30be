//! # 목표 생명주기 엔진
//!
//! 목표 상태 머신의 유효한 전이를 강제하고, 전이마다 알림을 만들어야
//! 하는지 판정하는 모듈입니다.
//!
//! ## 핵심 규칙 (update_goal_status)
//! 전이 판정은 쓰기 직전에 읽어 둔 "이전 상태"를 기준으로 합니다:
//! - `pending_approval → active`: 의료진 승인으로 인식 —
//!   (1) 새 상태 저장 → (2) 목표 소유 환자의 사용자 ID 해석 →
//!   (3) GOAL_APPROVED 알림을 원장에 기록 → (4) 살아있는 연결에 푸시
//! - 그 외의 상태/완료 변경: 알림 없이 그대로 저장
//!
//! 저장은 조건부 UPDATE(읽어 둔 상태가 WHERE 조건)라서, 두 요청이
//! 동시에 같은 목표를 바꾸면 늦은 쪽이 Conflict를 받습니다 —
//! 승인 경로가 한 전이에 대해 두 번 발화하는 일은 없습니다.

use sqlx::SqlitePool;

use crate::db;
use crate::error::AppError;
use crate::models::{CreateGoalRequest, Goal, GoalStatus, UpdateGoalRequest};
use crate::realtime::SessionRegistry;
use crate::services::notifications;

/// 새 목표를 만듭니다.
///
/// 초기 상태는 호출자가 정합니다 — `active` 또는 `pending_approval`만
/// 허용됩니다. 생성 자체는 알림을 만들지 않습니다. `pending_approval`로
/// 만든 목표의 의료진 통지는 호출자가 `notify_pending_goal`을 따로
/// 불러야 합니다 (HTTP 생성 라우트와 독립적으로 호출 가능한 연산).
pub async fn create_goal(
    pool: &SqlitePool,
    patient_id: i64,
    req: &CreateGoalRequest,
) -> Result<Goal, AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::BadRequest("Goal title is required".to_string()));
    }

    let initial_status = req.status.unwrap_or(GoalStatus::Active);
    if !matches!(
        initial_status,
        GoalStatus::Active | GoalStatus::PendingApproval
    ) {
        return Err(AppError::BadRequest(
            "Goals can only be created as active or pending_approval".to_string(),
        ));
    }

    // 소유자는 정확히 한 명 — 없는 환자 밑에는 만들 수 없습니다
    db::get_patient(pool, patient_id)
        .await?
        .ok_or(AppError::NotFound)?;

    db::create_goal(pool, patient_id, req, initial_status).await
}

/// 목표의 상태/완료 플래그를 변경합니다.
///
/// status가 포함되어 있고 이전 상태가 `pending_approval`, 새 상태가
/// `active`면 승인 경로를 탑니다 — 그 외에는 조용히 저장만 합니다.
/// 목표가 없으면 NotFound, 그 사이 다른 요청이 상태를 바꿨으면 Conflict.
pub async fn update_goal_status(
    pool: &SqlitePool,
    registry: &SessionRegistry,
    goal_id: i64,
    req: &UpdateGoalRequest,
) -> Result<Goal, AppError> {
    // 이전 상태를 먼저 읽고(read), 그 기준으로 판단(decide)한 뒤 씁니다(write)
    let goal = db::get_goal(pool, goal_id).await?.ok_or(AppError::NotFound)?;

    if let Some(new_status) = req.status {
        let is_approval =
            goal.status == GoalStatus::PendingApproval && new_status == GoalStatus::Active;

        let applied =
            db::update_goal_status_checked(pool, goal_id, goal.status, new_status).await?;
        if !applied {
            return Err(AppError::Conflict(
                "Goal status was changed by another request".to_string(),
            ));
        }

        if is_approval {
            // 목표 → 환자 → 사용자 순으로 수신자를 해석합니다
            let patient = db::get_patient(pool, goal.patient_id)
                .await?
                .ok_or(AppError::NotFound)?;
            notifications::notify_goal_approved(pool, registry, patient.user_id, &goal).await?;
        }
    }

    if let Some(completed) = req.completed {
        // status와는 독립적으로 저장됩니다
        db::set_goal_completed(pool, goal_id, completed).await?;
    }

    db::get_goal(pool, goal_id).await?.ok_or(AppError::NotFound)
}

/// 목표를 무조건 삭제합니다. 소프트 삭제는 없습니다.
pub async fn delete_goal(pool: &SqlitePool, goal_id: i64) -> Result<(), AppError> {
    if !db::delete_goal(pool, goal_id).await? {
        return Err(AppError::NotFound);
    }
    Ok(())
}

/// 승인 대기 목표를 담당 의료진에게 알립니다.
///
/// 목표 → 환자 → 담당 의료진 → 의료진의 사용자 순으로 참조를 따라가고,
/// 끊긴 고리가 있으면 NotFound입니다. 생성 라우트와 독립적으로 호출할
/// 수 있는 연산입니다.
pub async fn notify_pending_goal(
    pool: &SqlitePool,
    registry: &SessionRegistry,
    goal_id: i64,
) -> Result<(), AppError> {
    let goal = db::get_goal(pool, goal_id).await?.ok_or(AppError::NotFound)?;
    let patient = db::get_patient(pool, goal.patient_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let clinician_id = patient.clinician_id.ok_or(AppError::NotFound)?;
    let clinician = db::get_clinician(pool, clinician_id)
        .await?
        .ok_or(AppError::NotFound)?;

    notifications::notify_goal_pending(pool, registry, clinician.user_id, &goal, &patient.name)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NotificationKind, Role};
    use crate::realtime::frame::ServerFrame;
    use sqlx::sqlite::SqlitePoolOptions;
    use tokio::sync::mpsc;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        sqlx::migrate!("./migrations").run(&pool).await.expect("migrations");
        pool
    }

    async fn seed_patient(pool: &SqlitePool, username: &str) -> (i64, i64) {
        let user = db::users::create_user(pool, username, None, "hash", Role::Patient)
            .await
            .unwrap();
        let patient = db::create_patient(pool, user.id, "Kim Jiwoo").await.unwrap();
        (user.id, patient.id)
    }

    async fn seed_clinician(pool: &SqlitePool, username: &str) -> (i64, i64) {
        let user = db::users::create_user(pool, username, None, "hash", Role::Clinician)
            .await
            .unwrap();
        let clinician = db::create_clinician(pool, user.id, "Dr. Park", None, "ABCD2345")
            .await
            .unwrap();
        (user.id, clinician.id)
    }

    fn pending_goal_request(title: &str) -> CreateGoalRequest {
        CreateGoalRequest {
            title: title.to_string(),
            description: None,
            due_date: None,
            status: Some(GoalStatus::PendingApproval),
        }
    }

    #[tokio::test]
    async fn approval_creates_exactly_one_notification_and_pushes_it() {
        let pool = test_pool().await;
        let registry = SessionRegistry::new();
        let (user_id, patient_id) = seed_patient(&pool, "jiwoo").await;

        let goal = create_goal(&pool, patient_id, &pending_goal_request("Walk 10 min"))
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(user_id, "phone".to_string(), tx).await;

        let req = UpdateGoalRequest { status: Some(GoalStatus::Active), completed: None };
        let updated = update_goal_status(&pool, &registry, goal.id, &req).await.unwrap();
        assert_eq!(updated.status, GoalStatus::Active);

        // 원장: 환자 사용자 앞으로 GOAL_APPROVED 정확히 한 건
        let notifications = db::list_notifications_for_user(&pool, user_id).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::GoalApproved.as_str());
        assert_eq!(notifications[0].entity_id, Some(goal.id));

        // 푸시: 살아있는 연결로 GOAL_APPROVED 프레임 한 개
        match rx.recv().await.unwrap() {
            ServerFrame::GoalApproved(p) => {
                assert_eq!(p.goal_id, goal.id);
                assert_eq!(p.title, "Walk 10 min");
                assert_eq!(p.notification_id, notifications[0].id);
            }
            other => panic!("expected GoalApproved, got {:?}", other),
        }
        assert!(rx.try_recv().is_err(), "exactly one push expected");
    }

    #[tokio::test]
    async fn approval_with_no_live_session_still_writes_the_ledger() {
        let pool = test_pool().await;
        let registry = SessionRegistry::new();
        let (user_id, patient_id) = seed_patient(&pool, "jiwoo").await;

        let goal = create_goal(&pool, patient_id, &pending_goal_request("Stretch daily"))
            .await
            .unwrap();

        let req = UpdateGoalRequest { status: Some(GoalStatus::Active), completed: None };
        update_goal_status(&pool, &registry, goal.id, &req).await.unwrap();

        let notifications = db::list_notifications_for_user(&pool, user_id).await.unwrap();
        assert_eq!(notifications.len(), 1);
    }

    #[tokio::test]
    async fn non_approval_transitions_create_no_notification() {
        let pool = test_pool().await;
        let registry = SessionRegistry::new();
        let (user_id, patient_id) = seed_patient(&pool, "jiwoo").await;

        let goal = create_goal(
            &pool,
            patient_id,
            &CreateGoalRequest {
                title: "Drink water".to_string(),
                description: None,
                due_date: None,
                status: None, // active로 시작
            },
        )
        .await
        .unwrap();

        // active → completed
        let req = UpdateGoalRequest { status: Some(GoalStatus::Completed), completed: Some(true) };
        let updated = update_goal_status(&pool, &registry, goal.id, &req).await.unwrap();
        assert_eq!(updated.status, GoalStatus::Completed);
        assert!(updated.completed);

        // completed → pending_approval (역방향도 알림 없음)
        let req = UpdateGoalRequest { status: Some(GoalStatus::PendingApproval), completed: None };
        update_goal_status(&pool, &registry, goal.id, &req).await.unwrap();

        let notifications = db::list_notifications_for_user(&pool, user_id).await.unwrap();
        assert!(notifications.is_empty());
    }

    #[tokio::test]
    async fn stale_status_write_is_rejected() {
        let pool = test_pool().await;
        let (_, patient_id) = seed_patient(&pool, "jiwoo").await;

        let goal = create_goal(&pool, patient_id, &pending_goal_request("Walk 10 min"))
            .await
            .unwrap();

        // 다른 요청이 끼어들어 상태를 바꾼 상황
        let applied = db::update_goal_status_checked(
            &pool,
            goal.id,
            GoalStatus::PendingApproval,
            GoalStatus::Rejected,
        )
        .await
        .unwrap();
        assert!(applied);

        // 읽어 둔 상태(pending_approval)는 이미 낡았으므로 쓰기가 매칭되지 않습니다
        let applied = db::update_goal_status_checked(
            &pool,
            goal.id,
            GoalStatus::PendingApproval,
            GoalStatus::Active,
        )
        .await
        .unwrap();
        assert!(!applied);
    }

    #[tokio::test]
    async fn notify_pending_goal_reaches_the_clinician() {
        let pool = test_pool().await;
        let registry = SessionRegistry::new();
        let (clinician_user_id, clinician_id) = seed_clinician(&pool, "drpark").await;
        let (_, patient_id) = seed_patient(&pool, "jiwoo").await;
        db::set_patient_clinician(&pool, patient_id, clinician_id).await.unwrap();

        let goal = create_goal(&pool, patient_id, &pending_goal_request("Walk 10 min"))
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(clinician_user_id, "desk".to_string(), tx).await;

        notify_pending_goal(&pool, &registry, goal.id).await.unwrap();

        match rx.recv().await.unwrap() {
            ServerFrame::GoalPending(p) => {
                assert_eq!(p.id, goal.id);
                assert_eq!(p.title, "Walk 10 min");
                assert_eq!(p.patient, "Kim Jiwoo");
            }
            other => panic!("expected GoalPending, got {:?}", other),
        }

        // 원장에도 남습니다 — 접속해 있지 않던 의료진도 나중에 따라잡을 수 있게
        let rows = db::list_notifications_for_user(&pool, clinician_user_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, NotificationKind::GoalPending.as_str());
    }

    #[tokio::test]
    async fn notify_pending_goal_without_clinician_is_not_found() {
        let pool = test_pool().await;
        let registry = SessionRegistry::new();
        let (_, patient_id) = seed_patient(&pool, "jiwoo").await;

        let goal = create_goal(&pool, patient_id, &pending_goal_request("Walk 10 min"))
            .await
            .unwrap();

        let err = notify_pending_goal(&pool, &registry, goal.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn create_rejects_invalid_initial_status() {
        let pool = test_pool().await;
        let (_, patient_id) = seed_patient(&pool, "jiwoo").await;

        let req = CreateGoalRequest {
            title: "Walk".to_string(),
            description: None,
            due_date: None,
            status: Some(GoalStatus::Completed),
        };
        let err = create_goal(&pool, patient_id, &req).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn delete_missing_goal_is_not_found() {
        let pool = test_pool().await;
        let err = delete_goal(&pool, 999).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }
}
