//! # 푸시 채널 유선 프로토콜(wire protocol) 정의
//!
//! 지속 연결 위로 오가는 JSON 프레임들입니다.
//!
//! ## 클라이언트 → 서버
//! ```json
//! {"type":"SESSION_JOIN","userId":7,"deviceId":"pixel-8"}
//! {"type":"notif:ack","notificationId":42}
//! {"type":"lab:read","labId":3}
//! ```
//!
//! ## 서버 → 클라이언트 (모두 type + payload 형태)
//! ```json
//! {"type":"BOOTSTRAP","payload":{"notifications":[...]}}
//! {"type":"ANNOUNCEMENT","payload":{"notificationId":1,"title":"...","message":"...","created_at":"..."}}
//! {"type":"GOAL_PENDING","payload":{"id":5,"title":"...","description":"...","patient":"...","submitted":"..."}}
//! {"type":"GOAL_APPROVED","payload":{"notificationId":2,"goalId":5,"title":"...","created_at":"..."}}
//! {"type":"LAB_NEW","payload":{"id":3,"test_name":"...","created_at":"..."}}
//! ```
//!
//! serde의 `#[serde(tag = "type")]`(내부 태그)와
//! `#[serde(tag = "type", content = "payload")]`(인접 태그)로
//! JSON의 판별 필드(discriminator)를 enum variant에 대응시킵니다.
//! 알림 종류마다 payload 구조체가 하나씩 — 느슨한 JSON 블롭 대신
//! 타입이 있는 태그드 유니언(tagged union)으로 경계에서 검증됩니다.

use crate::models::NotificationResponse;
use serde::{Deserialize, Serialize};

/// 클라이언트가 보내는 프레임
///
/// 여기 없는 type의 프레임은 역직렬화에 실패하는데, 게이트웨이는
/// 그것을 에러로 취급하지 않고 조용히 무시합니다 (전방 호환).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// 세션 참가 — 이 연결을 userId의 살아있는 연결로 등록해 달라는 요청
    #[serde(rename = "SESSION_JOIN")]
    SessionJoin {
        #[serde(rename = "userId")]
        user_id: i64,
        /// 기기 식별자 (클라이언트 자율 신고, 최대 64자로 절단)
        #[serde(rename = "deviceId")]
        device_id: Option<String>,
    },

    /// 알림 확인 응답 — 원장의 read_at을 설정합니다
    #[serde(rename = "notif:ack")]
    NotifAck {
        #[serde(rename = "notificationId")]
        notification_id: i64,
    },

    /// 검사 결과 열람 신고
    #[serde(rename = "lab:read")]
    LabRead {
        #[serde(rename = "labId")]
        lab_id: i64,
    },
}

/// 서버가 보내는 프레임 — 항상 `{"type": ..., "payload": ...}` 모양
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerFrame {
    /// 세션 참가 직후 보내는 초기 상태 스냅샷 (읽지 않은 알림 목록)
    #[serde(rename = "BOOTSTRAP")]
    Bootstrap(BootstrapPayload),

    #[serde(rename = "ANNOUNCEMENT")]
    Announcement(AnnouncementPayload),

    #[serde(rename = "GOAL_PENDING")]
    GoalPending(GoalPendingPayload),

    #[serde(rename = "GOAL_APPROVED")]
    GoalApproved(GoalApprovedPayload),

    #[serde(rename = "LAB_NEW")]
    LabNew(LabNewPayload),

    #[serde(rename = "MEDICATION_ASSIGNED")]
    MedicationAssigned(MedicationAssignedPayload),
}

#[derive(Debug, Clone, Serialize)]
pub struct BootstrapPayload {
    pub notifications: Vec<NotificationResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnouncementPayload {
    #[serde(rename = "notificationId")]
    pub notification_id: i64,
    pub title: String,
    pub message: String,
    pub created_at: String,
}

/// 승인 대기 목표를 의료진에게 알리는 payload
#[derive(Debug, Clone, Serialize)]
pub struct GoalPendingPayload {
    /// 목표 ID
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    /// 환자 표시 이름
    pub patient: String,
    /// 목표가 제출(생성)된 시각
    pub submitted: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalApprovedPayload {
    #[serde(rename = "notificationId")]
    pub notification_id: i64,
    #[serde(rename = "goalId")]
    pub goal_id: i64,
    pub title: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabNewPayload {
    /// 검사 결과 ID
    pub id: i64,
    pub test_name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MedicationAssignedPayload {
    /// 복약 레코드 ID
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_session_join_frame() {
        let json = r#"{"type":"SESSION_JOIN","userId":7,"deviceId":"pixel-8"}"#;
        let frame: ClientFrame = serde_json::from_str(json).unwrap();
        match frame {
            ClientFrame::SessionJoin { user_id, device_id } => {
                assert_eq!(user_id, 7);
                assert_eq!(device_id.as_deref(), Some("pixel-8"));
            }
            _ => panic!("Expected SessionJoin"),
        }
    }

    #[test]
    fn parses_ack_frame_with_colon_type() {
        let json = r#"{"type":"notif:ack","notificationId":42}"#;
        let frame: ClientFrame = serde_json::from_str(json).unwrap();
        assert!(matches!(
            frame,
            ClientFrame::NotifAck { notification_id: 42 }
        ));
    }

    #[test]
    fn session_join_device_id_is_optional() {
        let json = r#"{"type":"SESSION_JOIN","userId":7}"#;
        let frame: ClientFrame = serde_json::from_str(json).unwrap();
        assert!(matches!(
            frame,
            ClientFrame::SessionJoin { user_id: 7, device_id: None }
        ));
    }

    #[test]
    fn unknown_frame_type_fails_to_parse() {
        // 게이트웨이는 이 에러를 "무시"로 처리합니다 — 여기서는
        // 알 수 없는 타입이 기존 variant로 잘못 매칭되지 않는 것만 확인
        let json = r#"{"type":"SOMETHING_ELSE","x":1}"#;
        assert!(serde_json::from_str::<ClientFrame>(json).is_err());
    }

    #[test]
    fn server_frames_carry_type_and_payload_envelope() {
        let frame = ServerFrame::Announcement(AnnouncementPayload {
            notification_id: 1,
            title: "Clinic closed".to_string(),
            message: "Closed on Friday".to_string(),
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
        });

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&frame).unwrap()).unwrap();
        assert_eq!(json["type"], "ANNOUNCEMENT");
        assert_eq!(json["payload"]["notificationId"], 1);
        assert_eq!(json["payload"]["title"], "Clinic closed");
    }

    #[test]
    fn goal_pending_payload_matches_wire_shape() {
        let frame = ServerFrame::GoalPending(GoalPendingPayload {
            id: 5,
            title: "Walk 10 min".to_string(),
            description: None,
            patient: "Kim Jiwoo".to_string(),
            submitted: "2026-01-01T00:00:00.000Z".to_string(),
        });

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&frame).unwrap()).unwrap();
        assert_eq!(json["type"], "GOAL_PENDING");
        assert_eq!(json["payload"]["id"], 5);
        assert_eq!(json["payload"]["patient"], "Kim Jiwoo");
        assert!(json["payload"]["description"].is_null());
    }
}
