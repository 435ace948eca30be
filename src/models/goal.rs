//! # 케어 목표(Goal) 모델 정의
//!
//! 환자 한 명의 케어 목표와 그 상태 머신을 정의합니다.
//! 목표는 환자가 직접 만들거나 AI 제안에서 승격되며,
//! 의료진 승인이 필요한 목표는 `pending_approval` 상태로 시작합니다.
//!
//! ## 상태 머신
//! ```text
//! [생성] → active ──────────────┐
//!    └──→ pending_approval      │
//!              │ 승인           │ 완료 토글
//!              ▼                ▼
//!           active ⇄ completed / rejected / paused
//! ```
//!
//! `pending_approval → active` 전이만이 "의료진 승인"으로 인식되어
//! 알림 원장 기록과 실시간 푸시를 일으킵니다. (services::goals 참고)

use serde::{Deserialize, Serialize};

/// 목표의 생명주기 상태
///
/// 세 가지 표현이 모두 같은 문자열을 공유합니다:
/// - JSON (serde): `"pending_approval"` — rename_all = "snake_case"
/// - DB (sqlx): TEXT 컬럼 — #[derive(sqlx::Type)]로 문자열 저장/복원
/// - 코드: `GoalStatus::PendingApproval`
///
/// 엄밀한 의미의 종결 상태는 없습니다 — completed/rejected도
/// 일반 상태 변경으로 언제든 되돌릴 수 있습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum GoalStatus {
    /// 진행 중인 목표
    Active,
    /// 의료진 승인 대기 중
    PendingApproval,
    /// 완료된 목표
    Completed,
    /// 의료진이 반려한 목표
    Rejected,
    /// 일시 중지
    Paused,
}

impl GoalStatus {
    /// DB/JSON에 기록되는 문자열 표현을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::PendingApproval => "pending_approval",
            GoalStatus::Completed => "completed",
            GoalStatus::Rejected => "rejected",
            GoalStatus::Paused => "paused",
        }
    }
}

/// 케어 목표 엔티티 — DB의 `goals` 테이블 한 행에 대응합니다.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Goal {
    /// 목표 고유 식별자
    pub id: i64,
    /// 목표 소유자(환자)의 ID (외래키) — 소유자는 정확히 한 명입니다
    pub patient_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: GoalStatus,
    /// 완료 플래그 — status와 별개의 컬럼으로 유지됩니다
    pub completed: bool,
    /// 목표 기한 (선택, ISO 8601 날짜 문자열)
    pub due_date: Option<String>,
    pub created_at: String,
}

/// 목표 생성 요청 — `POST /patients/goals/:patientId`의 요청 본문
#[derive(Debug, Deserialize)]
pub struct CreateGoalRequest {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<String>,
    /// 초기 상태 — `active`(승인 불필요) 또는 `pending_approval`(의료진 서명 필요).
    /// 생략하면 `active`로 시작합니다. 그 외의 상태로는 생성할 수 없습니다.
    pub status: Option<GoalStatus>,
}

/// 목표 수정 요청 — `PATCH /patients/goals/:goalId`의 요청 본문
///
/// 두 필드 모두 선택 사항입니다. status가 포함되어 있고 그 전이가
/// `pending_approval → active`라면 승인 경로(알림 생성 + 푸시)를 탑니다.
#[derive(Debug, Deserialize)]
pub struct UpdateGoalRequest {
    pub status: Option<GoalStatus>,
    pub completed: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_status_round_trips_through_snake_case_json() {
        let json = serde_json::to_string(&GoalStatus::PendingApproval).unwrap();
        assert_eq!(json, "\"pending_approval\"");

        let back: GoalStatus = serde_json::from_str("\"pending_approval\"").unwrap();
        assert_eq!(back, GoalStatus::PendingApproval);
        assert_eq!(back.as_str(), "pending_approval");
    }

    #[test]
    fn create_request_accepts_missing_status() {
        let req: CreateGoalRequest =
            serde_json::from_str(r#"{"title":"Walk 10 min"}"#).unwrap();
        assert_eq!(req.title, "Walk 10 min");
        assert!(req.status.is_none());
        assert!(req.due_date.is_none());
    }
}
