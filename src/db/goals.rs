//! # 목표 데이터베이스 쿼리 모듈
//!
//! 목표의 CRUD와 상태 전이를 담당하는 SQL 쿼리 함수들입니다.
//! 모든 함수는 `SqlitePool` 참조를 받아 비동기로 실행됩니다.
//!
//! ## 상태 전이와 동시성
//! 상태 변경은 항상 "읽고 → 판단하고 → 쓰는" 흐름인데, 두 요청이 동시에
//! 같은 목표를 바꾸면 서로의 변경을 덮어쓸 수 있습니다. 그래서 쓰기는
//! `UPDATE ... WHERE status = ?`(읽어 둔 이전 상태)로 조건부 실행하고,
//! 영향받은 행이 0이면 호출자가 Conflict로 처리합니다.

use crate::error::AppError;
use crate::models::{CreateGoalRequest, Goal, GoalStatus};
use sqlx::SqlitePool;

/// 새 목표를 생성하고 생성된 행을 반환합니다.
///
/// `initial_status`는 호출자가 결정합니다 — `active`(승인 불필요) 또는
/// `pending_approval`(의료진 서명 필요). 검증은 서비스 계층에서 끝났다고
/// 가정합니다.
pub async fn create_goal(
    pool: &SqlitePool,
    patient_id: i64,
    req: &CreateGoalRequest,
    initial_status: GoalStatus,
) -> Result<Goal, AppError> {
    let result = sqlx::query(
        r#"
        INSERT INTO goals (patient_id, title, description, status, due_date)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(patient_id)
    .bind(&req.title)
    .bind(&req.description) // Option<String>: None이면 SQL NULL
    .bind(initial_status)
    .bind(&req.due_date)
    .execute(pool)
    .await?;

    // last_insert_rowid(): AUTOINCREMENT가 발급한 새 행의 ID
    // 생성 직후 조회하여 DB가 채운 기본값(created_at 등)이 포함된 완전한 객체를 반환
    get_goal(pool, result.last_insert_rowid())
        .await?
        .ok_or(AppError::Internal(
            "Failed to retrieve created goal".to_string(),
        ))
}

/// ID로 목표 하나를 조회합니다.
///
/// `fetch_optional`은 결과가 0행이면 None, 1행이면 Some(Goal)을 반환합니다.
pub async fn get_goal(pool: &SqlitePool, id: i64) -> Result<Option<Goal>, AppError> {
    let goal = sqlx::query_as::<_, Goal>(
        r#"
        SELECT id, patient_id, title, description, status, completed, due_date, created_at
        FROM goals
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(goal)
}

/// 특정 환자의 모든 목표를 최신순으로 조회합니다.
pub async fn list_goals_for_patient(
    pool: &SqlitePool,
    patient_id: i64,
) -> Result<Vec<Goal>, AppError> {
    let goals = sqlx::query_as::<_, Goal>(
        r#"
        SELECT id, patient_id, title, description, status, completed, due_date, created_at
        FROM goals
        WHERE patient_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(patient_id)
    .fetch_all(pool)
    .await?;

    Ok(goals)
}

/// 목표 상태를 조건부로 변경합니다.
///
/// `expected`는 호출자가 직전에 읽어 둔 상태입니다. DB의 현재 상태가
/// 그 사이 바뀌었다면 WHERE 절이 매칭되지 않아 아무 행도 갱신되지 않습니다.
///
/// ## 반환값
/// - `true`: 전이 성공 (정확히 1행 갱신)
/// - `false`: 그 사이 다른 요청이 상태를 바꿈 → 호출자가 Conflict 처리
pub async fn update_goal_status_checked(
    pool: &SqlitePool,
    id: i64,
    expected: GoalStatus,
    new_status: GoalStatus,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE goals
        SET status = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(new_status)
    .bind(id)
    .bind(expected)
    .execute(pool)
    .await?;

    // rows_affected(): 이 쿼리로 영향받은 행 수
    Ok(result.rows_affected() > 0)
}

/// 완료 플래그를 설정합니다.
///
/// status 컬럼과는 독립적으로 저장됩니다 — 두 필드의 일관성 유지는
/// 서비스 계층의 몫입니다.
pub async fn set_goal_completed(
    pool: &SqlitePool,
    id: i64,
    completed: bool,
) -> Result<(), AppError> {
    sqlx::query("UPDATE goals SET completed = ? WHERE id = ?")
        .bind(completed)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// ID로 목표를 삭제합니다.
///
/// ## 반환값
/// - `true`: 삭제 성공 (1행 이상 삭제됨)
/// - `false`: 해당 ID의 목표가 존재하지 않아 삭제된 행이 없음
pub async fn delete_goal(pool: &SqlitePool, id: i64) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM goals WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
