//! # 실시간 세션 레지스트리
//!
//! "사용자 ID → 열려 있는 푸시 연결들"의 프로세스 내 매핑입니다.
//! 한 사용자가 여러 기기에서 동시에 접속할 수 있으므로 값은 집합(Vec)입니다.
//!
//! ## 동시성
//! 이 매핑은 모든 연결의 읽기/쓰기 루프와 HTTP 핸들러가 동시에 만지는
//! 유일한 공유 가변 상태입니다. `tokio::sync::RwLock<HashMap>`으로 보호하고,
//! 락을 쥔 채로 네트워크 I/O를 하지 않습니다 — 연결로의 실제 쓰기는
//! 연결별 mpsc 채널에 프레임을 넣는 것까지만이고(동기, 즉시 반환),
//! 소켓 쓰기는 각 연결의 태스크가 자기 채널을 비우며 수행합니다.
//! 덕분에 한 연결에 대한 전달 순서는 `push_to_user` 호출 순서와 같습니다.
//!
//! ## 자기 치유(self-healing)
//! 채널 send가 실패한다는 것은 수신 태스크가 이미 죽었다는 뜻이므로,
//! 그 자리에서 해당 연결을 집합에서 제거합니다. 별도의 청소 패스는
//! 필요 없습니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use super::frame::ServerFrame;

/// 연결 핸들 식별자 — 프로세스 안에서만 의미 있는 일련번호
pub type ConnectionId = u64;

/// 레지스트리에 등록된 연결 하나
///
/// 스펙의 Session: 사용자 ID(키), 기기 식별자, 연결 핸들(tx), 참가 시각.
/// 영속화되지 않으며, 연결이 닫히면 함께 사라집니다.
struct SessionHandle {
    conn_id: ConnectionId,
    device_id: String,
    joined_at: String,
    tx: mpsc::UnboundedSender<ServerFrame>,
}

/// 실시간 세션 레지스트리
///
/// 전역 변수가 아니라 `Arc<SessionRegistry>`로 AppState에 담겨
/// 필요한 곳(게이트웨이, 목표 엔진, 알림 서비스)에 주입됩니다 —
/// 테스트에서는 새 인스턴스를 만들어 쓰면 됩니다.
pub struct SessionRegistry {
    next_conn_id: AtomicU64,
    sessions: RwLock<HashMap<i64, Vec<SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            next_conn_id: AtomicU64::new(1),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// 연결을 사용자의 연결 집합에 추가하고 연결 ID를 발급합니다.
    ///
    /// `tx`는 이 연결의 쓰기 태스크로 가는 채널의 송신단입니다.
    pub async fn register(
        &self,
        user_id: i64,
        device_id: String,
        tx: mpsc::UnboundedSender<ServerFrame>,
    ) -> ConnectionId {
        // fetch_add: 원자적으로 1 증가시키고 이전 값을 돌려줍니다 —
        // 여러 연결이 동시에 등록해도 ID가 겹치지 않습니다.
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        let joined_at = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();

        let mut sessions = self.sessions.write().await;
        // entry().or_default(): 키가 없으면 빈 Vec을 만들어 넣고 참조를 반환
        sessions.entry(user_id).or_default().push(SessionHandle {
            conn_id,
            device_id: device_id.clone(),
            joined_at: joined_at.clone(),
            tx,
        });

        debug!(
            user_id = user_id,
            conn_id = conn_id,
            device_id = %device_id,
            joined_at = %joined_at,
            "session registered"
        );
        conn_id
    }

    /// 연결을 집합에서 제거합니다.
    ///
    /// 어느 사용자의 집합에 있는지 몰라도 되도록 전체를 훑습니다.
    /// 이미 제거된 연결에 다시 호출해도 아무 일도 일어나지 않습니다 (멱등).
    pub async fn unregister(&self, conn_id: ConnectionId) {
        let mut sessions = self.sessions.write().await;
        let mut removed_for: Option<i64> = None;

        for (user_id, handles) in sessions.iter_mut() {
            let before = handles.len();
            handles.retain(|h| h.conn_id != conn_id);
            if handles.len() < before {
                removed_for = Some(*user_id);
                break;
            }
        }

        if let Some(user_id) = removed_for {
            // 빈 Vec은 키째로 지워서 맵이 유령 항목으로 커지지 않게 합니다
            if sessions.get(&user_id).map(|v| v.is_empty()).unwrap_or(false) {
                sessions.remove(&user_id);
            }
            debug!(user_id = user_id, conn_id = conn_id, "session unregistered");
        }
    }

    /// 사용자의 모든 살아있는 연결에 프레임을 밀어 넣습니다.
    ///
    /// fire-and-forget:
    /// - 열린 연결이 없으면 아무 일도 하지 않습니다 (에러 아님 —
    ///   내구성은 알림 원장이 책임지므로 여기서 유실돼도 됩니다)
    /// - send에 실패한 연결(수신 태스크 종료)은 그 자리에서 제거합니다
    ///
    /// ## 반환값
    /// 프레임이 큐에 들어간 연결 수 (테스트와 로그용)
    pub async fn push_to_user(&self, user_id: i64, frame: ServerFrame) -> usize {
        let mut sessions = self.sessions.write().await;

        let Some(handles) = sessions.get_mut(&user_id) else {
            return 0;
        };

        let before = handles.len();
        // retain: send에 성공한 핸들만 남깁니다.
        // UnboundedSender::send는 즉시 반환하므로 락을 오래 쥐지 않습니다.
        handles.retain(|h| h.tx.send(frame.clone()).is_ok());
        let delivered = handles.len();

        if delivered < before {
            debug!(
                user_id = user_id,
                dropped = before - delivered,
                "removed dead connections during push"
            );
        }
        if handles.is_empty() {
            sessions.remove(&user_id);
        }

        delivered
    }

    /// 사용자의 현재 연결 수를 반환합니다.
    pub async fn connection_count(&self, user_id: i64) -> usize {
        let sessions = self.sessions.read().await;
        sessions.get(&user_id).map(|v| v.len()).unwrap_or(0)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::frame::{AnnouncementPayload, ServerFrame};

    fn announcement(id: i64) -> ServerFrame {
        ServerFrame::Announcement(AnnouncementPayload {
            notification_id: id,
            title: "t".to_string(),
            message: "m".to_string(),
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
        })
    }

    #[tokio::test]
    async fn push_reaches_every_device_of_one_user() {
        let registry = SessionRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();

        registry.register(7, "phone".to_string(), tx_a).await;
        registry.register(7, "tablet".to_string(), tx_b).await;
        assert_eq!(registry.connection_count(7).await, 2);

        let delivered = registry.push_to_user(7, announcement(1)).await;
        assert_eq!(delivered, 2);
        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());
    }

    #[tokio::test]
    async fn push_to_user_without_connections_is_a_noop() {
        let registry = SessionRegistry::new();
        let delivered = registry.push_to_user(99, announcement(1)).await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn dead_connection_is_removed_on_push() {
        let registry = SessionRegistry::new();
        let (tx_live, mut rx_live) = mpsc::unbounded_channel();
        let (tx_dead, rx_dead) = mpsc::unbounded_channel();

        registry.register(7, "phone".to_string(), tx_live).await;
        registry.register(7, "tablet".to_string(), tx_dead).await;

        // 수신단을 떨어뜨려 죽은 연결을 흉내 냅니다
        drop(rx_dead);

        let delivered = registry.push_to_user(7, announcement(1)).await;
        assert_eq!(delivered, 1);
        assert!(rx_live.recv().await.is_some());
        // 죽은 연결은 push 과정에서 제거되었어야 합니다 (자기 치유)
        assert_eq!(registry.connection_count(7).await, 1);
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let conn_id = registry.register(7, "phone".to_string(), tx).await;
        registry.unregister(conn_id).await;
        assert_eq!(registry.connection_count(7).await, 0);

        // 두 번째 호출은 조용한 no-op
        registry.unregister(conn_id).await;
        assert_eq!(registry.connection_count(7).await, 0);
    }

    #[tokio::test]
    async fn pushes_arrive_in_call_order_on_one_connection() {
        let registry = SessionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(7, "phone".to_string(), tx).await;

        for i in 1..=5 {
            registry.push_to_user(7, announcement(i)).await;
        }

        for expected in 1..=5 {
            match rx.recv().await.unwrap() {
                ServerFrame::Announcement(p) => assert_eq!(p.notification_id, expected),
                other => panic!("unexpected frame: {:?}", other),
            }
        }
    }
}
