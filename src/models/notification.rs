//! # 알림(Notification) 모델 정의
//!
//! 알림은 "한 명의 수신자에게 전달할 가치가 있는 이벤트"의 영속 기록입니다.
//! 수신자가 접속 중인지와 무관하게 항상 DB에 먼저 기록되고(원장, ledger),
//! 실시간 푸시는 그 뒤에 시도됩니다. 푸시를 놓친 클라이언트는
//! `GET /notifications/:userId`로 언제든 따라잡을 수 있습니다.
//!
//! ## 불변 규칙
//! - 생성 후에는 `read_at` 외의 어떤 필드도 변경되지 않습니다.
//! - `read_at`은 최대 한 번만 설정되며, 설정 후 되돌리지 않습니다.

use serde::{Deserialize, Serialize};

/// 알림 종류
///
/// DB에는 문자열로 저장됩니다(열린 집합 — 새 종류가 추가될 수 있으므로
/// 행 구조체(`Notification`)는 String을 그대로 들고, 이 enum은
/// 생성 지점에서 오타 없는 상수로만 사용합니다).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Message,
    Announcement,
    GoalApproved,
    GoalPending,
    LabNew,
    MedicationAssigned,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Message => "MESSAGE",
            NotificationKind::Announcement => "ANNOUNCEMENT",
            NotificationKind::GoalApproved => "GOAL_APPROVED",
            NotificationKind::GoalPending => "GOAL_PENDING",
            NotificationKind::LabNew => "LAB_NEW",
            NotificationKind::MedicationAssigned => "MEDICATION_ASSIGNED",
        }
    }
}

/// 알림 엔티티 — DB의 `notifications` 테이블 한 행에 대응합니다.
///
/// `payload`는 종류별 JSON을 문자열 그대로 담습니다.
/// API 응답으로 내보낼 때는 `NotificationResponse`로 변환하여
/// payload를 실제 JSON 객체로 펼칩니다.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    /// 수신자 사용자 ID
    pub user_id: i64,
    pub kind: String,
    /// 출처 레코드의 종류 (예: "goal", "lab", "announcement")
    pub entity_kind: String,
    /// 출처 레코드의 ID (느슨한 참조 — 없을 수도 있음)
    pub entity_id: Option<i64>,
    pub payload: String,
    pub created_at: String,
    /// 읽은 시각 — None이면 미확인
    pub read_at: Option<String>,
}

/// 알림 API 응답 — payload 문자열을 JSON 객체로 펼친 형태
#[derive(Debug, Clone, Serialize)]
pub struct NotificationResponse {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub entity_kind: String,
    pub entity_id: Option<i64>,
    pub payload: serde_json::Value,
    pub created_at: String,
    pub read_at: Option<String>,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        // 저장 시점에 serde로 직렬화한 JSON이므로 파싱 실패는 사실상 없지만,
        // 혹시 깨진 행이 있어도 응답 전체를 죽이지 않고 Null로 대체합니다.
        let payload = serde_json::from_str(&n.payload).unwrap_or(serde_json::Value::Null);
        Self {
            id: n.id,
            user_id: n.user_id,
            kind: n.kind,
            entity_kind: n.entity_kind,
            entity_id: n.entity_id,
            payload,
            created_at: n.created_at,
            read_at: n.read_at,
        }
    }
}

/// 공지 브로드캐스트 요청 — `POST /announcements`의 요청 본문
#[derive(Debug, Deserialize)]
pub struct AnnounceRequest {
    pub title: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_parses_stored_payload_json() {
        let n = Notification {
            id: 1,
            user_id: 7,
            kind: "GOAL_APPROVED".to_string(),
            entity_kind: "goal".to_string(),
            entity_id: Some(42),
            payload: r#"{"goalId":42,"title":"Walk 10 min"}"#.to_string(),
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            read_at: None,
        };

        let resp = NotificationResponse::from(n);
        assert_eq!(resp.payload["goalId"], 42);
        assert_eq!(resp.payload["title"], "Walk 10 min");
    }

    #[test]
    fn broken_payload_becomes_null_instead_of_failing() {
        let n = Notification {
            id: 2,
            user_id: 7,
            kind: "MESSAGE".to_string(),
            entity_kind: "message".to_string(),
            entity_id: None,
            payload: "not-json".to_string(),
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            read_at: None,
        };

        let resp = NotificationResponse::from(n);
        assert!(resp.payload.is_null());
    }
}
