//! # 푸시 게이트웨이 — 연결 하나의 프로토콜 계층
//!
//! WebSocket 연결 한 개의 전체 생명주기를 담당합니다.
//!
//! ## 연결 상태 머신
//! ```text
//! Connecting ──(SESSION_JOIN)──► Joined ──(close/error/timeout)──► Closed
//! ```
//! - `Connecting`: 참가 전. SESSION_JOIN 외의 프레임은 연결을 끊지 않고
//!   무시합니다 — 레지스트리에 아무 흔적도 남기지 않습니다.
//! - `Joined`: 레지스트리에 등록된 상태. notif:ack / lab:read를 처리하고
//!   서버 푸시를 받습니다. 참가 직후 읽지 않은 알림 스냅샷(BOOTSTRAP)을
//!   보냅니다.
//! - `Closed`: 전송 종료/에러/타임아웃. 레지스트리에서 제거됩니다.
//!
//! ## 관용적 수신 처리
//! 잘못된 프레임, 모르는 type, 참가 전의 ack — 전부 에러 없이 무시합니다.
//! 프로토콜 엄격성보다 연결 안정성이 우선입니다.
//!
//! ## 하트비트
//! 주기적으로 Ping을 보내고, 일정 시간 아무 수신이 없으면 죽은 피어로
//! 간주하고 연결을 닫습니다. 이게 없으면 TCP 피어가 사라져도 다음 쓰기
//! 실패 때까지 레지스트리에 유령 연결이 남습니다.
//!
//! ## 재접속
//! 재개(resume) 프로토콜은 없습니다. 끊겼다 돌아온 클라이언트는
//! SESSION_JOIN을 다시 보내고 새 BOOTSTRAP을 받습니다 — 끊긴 동안의
//! 이벤트는 알림 원장이 보존합니다.

use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::db;
use crate::models::NotificationResponse;
use crate::realtime::frame::{BootstrapPayload, ClientFrame, ServerFrame};
use crate::realtime::registry::ConnectionId;
use crate::routes::AppState;

/// Ping 전송 주기
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// 이 시간 동안 아무 수신이 없으면 죽은 피어로 간주합니다 (Ping 2회 분량 + 여유)
const CLIENT_TIMEOUT: Duration = Duration::from_secs(75);
/// deviceId 최대 길이 — 초과분은 잘라냅니다
const DEVICE_ID_MAX: usize = 64;

/// 연결 하나의 상태
enum ConnState {
    /// SESSION_JOIN을 기다리는 중
    Connecting,
    /// 레지스트리에 등록된 상태
    Joined { user_id: i64, conn_id: ConnectionId },
}

/// `GET /ws` — WebSocket 업그레이드 핸들러
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    // on_upgrade: HTTP 응답(101 Switching Protocols)을 돌려준 뒤,
    // 업그레이드가 끝나면 넘겨준 클로저를 새 태스크로 실행합니다.
    ws.on_upgrade(move |socket| connection_loop(socket, state))
}

/// 연결 태스크 본체 — 수신/송신/하트비트를 한 select 루프에서 처리합니다.
async fn connection_loop(socket: WebSocket, state: AppState) {
    // split(): 소켓을 쓰기 절반(Sink)과 읽기 절반(Stream)으로 분리
    let (mut sender, mut receiver) = socket.split();

    // 이 연결 전용 푸시 큐.
    // 레지스트리는 이 tx로 프레임을 넣기만 하고(즉시 반환),
    // 실제 소켓 쓰기는 아래 select 루프가 rx를 비우며 수행합니다.
    // 큐가 FIFO이므로 push_to_user 호출 순서가 곧 전달 순서입니다.
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();

    let mut conn = ConnState::Connecting;
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            // ── 클라이언트 → 서버 ──
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    last_seen = Instant::now();
                    match serde_json::from_str::<ClientFrame>(&text) {
                        Ok(frame) => handle_client_frame(&state, &mut conn, frame, &tx).await,
                        // 모르는 type, 깨진 JSON — 연결은 유지하고 무시
                        Err(e) => debug!(error = %e, "ignoring unrecognized inbound frame"),
                    }
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    // Ping에 대한 Pong 응답은 라이브러리가 처리합니다.
                    // 여기서는 "살아 있다"는 신호로만 씁니다.
                    last_seen = Instant::now();
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // 바이너리 프레임 등은 무시
                Some(Err(e)) => {
                    debug!(error = %e, "websocket receive error");
                    break;
                }
            },

            // ── 서버 → 클라이언트 (푸시 큐 비우기) ──
            frame = rx.recv() => match frame {
                Some(frame) => {
                    let json = match serde_json::to_string(&frame) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(error = %e, "failed to serialize outbound frame");
                            continue;
                        }
                    };
                    // 쓰기 실패 = 죽은 연결 → 루프를 빠져나가 등록 해제
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },

            // ── 하트비트 ──
            _ = heartbeat.tick() => {
                if last_seen.elapsed() > CLIENT_TIMEOUT {
                    debug!("client unresponsive, closing connection");
                    break;
                }
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    // Closed: 레지스트리에서 즉시 제거 — 닫힌 핸들을 남겨두지 않습니다
    if let ConnState::Joined { user_id, conn_id } = conn {
        state.registry.unregister(conn_id).await;
        debug!(user_id = user_id, conn_id = conn_id, "push connection closed");
    }
}

/// 수신 프레임 한 개를 처리합니다.
///
/// 연결을 끊어야 할 만큼 치명적인 경우는 없습니다 — DB 에러조차
/// 경고 로그로 남기고 연결은 살려 둡니다 (§ 관용적 수신 처리).
async fn handle_client_frame(
    state: &AppState,
    conn: &mut ConnState,
    frame: ClientFrame,
    tx: &mpsc::UnboundedSender<ServerFrame>,
) {
    match frame {
        ClientFrame::SessionJoin { user_id, device_id } => match conn {
            ConnState::Connecting => {
                // 기기 식별자는 자율 신고 — 없으면 서버가 발급하고, 길면 자릅니다
                let device_id = device_id
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
                let device_id: String = device_id.chars().take(DEVICE_ID_MAX).collect();

                let conn_id = state
                    .registry
                    .register(user_id, device_id, tx.clone())
                    .await;
                *conn = ConnState::Joined { user_id, conn_id };

                send_bootstrap(state, user_id, tx).await;
            }
            // 이미 참가한 연결의 중복 SESSION_JOIN은 무시
            ConnState::Joined { .. } => {
                debug!(user_id = user_id, "duplicate SESSION_JOIN ignored");
            }
        },

        ClientFrame::NotifAck { notification_id } => match conn {
            // 참가 전의 ack는 레지스트리/원장에 아무 흔적도 남기지 않습니다
            ConnState::Connecting => {
                debug!(notification_id = notification_id, "ack before join ignored");
            }
            ConnState::Joined { .. } => {
                match db::mark_notification_read(&state.pool, notification_id).await {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        debug!(notification_id = notification_id, "ack for unknown notification")
                    }
                    Err(e) => warn!(error = %e, "failed to mark notification read"),
                }
            }
        },

        ClientFrame::LabRead { lab_id } => match conn {
            ConnState::Connecting => {
                debug!(lab_id = lab_id, "lab:read before join ignored");
            }
            ConnState::Joined { .. } => match db::mark_lab_viewed(&state.pool, lab_id).await {
                Ok(_) => {}
                Err(e) => warn!(error = %e, "failed to mark lab viewed"),
            },
        },
    }
}

/// 참가 직후의 초기 스냅샷 — 읽지 않은 알림 목록을 보냅니다.
///
/// 조회에 실패해도 참가 자체는 유지합니다. 클라이언트는 어차피
/// `GET /notifications/:userId`로 같은 상태를 복구할 수 있습니다.
async fn send_bootstrap(state: &AppState, user_id: i64, tx: &mpsc::UnboundedSender<ServerFrame>) {
    match db::list_unread_for_user(&state.pool, user_id).await {
        Ok(unread) => {
            let payload = BootstrapPayload {
                notifications: unread.into_iter().map(NotificationResponse::from).collect(),
            };
            let _ = tx.send(ServerFrame::Bootstrap(payload));
        }
        Err(e) => warn!(error = %e, user_id = user_id, "failed to load bootstrap notifications"),
    }
}
