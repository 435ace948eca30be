//! # 라우트 핸들러 모듈
//!
//! HTTP 요청을 처리하는 핸들러 함수들을 모아둔 모듈입니다.
//! Axum에서 핸들러는 HTTP 요청을 받아 응답을 반환하는 async 함수입니다.
//! 핸들러는 얇게 유지합니다 — 판단이 필요한 일은 services/로,
//! 쿼리는 db/로 보냅니다.
//!
//! 각 하위 모듈:
//! - `auth`: 인증 관련 (회원가입, 로그인, 토큰 갱신, 로그아웃)
//! - `clinicians`: 의료진 담당 환자 목록, 초대 코드 재발급
//! - `goals`: 목표 CRUD 핸들러 (승인 알림 트리거 포함)
//! - `health`: 서버 상태 확인 (헬스체크)
//! - `labs`: 검사 결과와 복약 핸들러
//! - `notifications`: 알림 조회/읽음 처리와 공지 브로드캐스트
//! - `patients`: 환자 온보딩과 보호자 연결

use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};
use sqlx::SqlitePool;

use crate::realtime::SessionRegistry;

pub mod auth;
pub mod clinicians;
pub mod goals;
pub mod health;
pub mod labs;
pub mod notifications;
pub mod patients;

// 각 모듈의 핸들러 함수들을 재공개하여
// `routes::list_goals`처럼 바로 접근 가능하게 합니다.
pub use clinicians::*;
pub use goals::*;
pub use health::*;
pub use labs::*;
pub use notifications::*;
pub use patients::*;

/// 애플리케이션 공유 상태
///
/// 모든 요청 핸들러가 `State(state): State<AppState>`로 접근합니다.
/// Axum의 의존성 주입(Dependency Injection) 메커니즘입니다.
/// SqlitePool과 Arc는 clone해도 같은 풀/레지스트리를 가리킵니다.
#[derive(Clone)]
pub struct AppState {
    /// SQLite 연결 풀 (내부적으로 Arc로 공유)
    pub pool: SqlitePool,
    /// JWT 토큰 서명용 비밀키
    pub jwt_secret: String,
    /// 실시간 세션 레지스트리 — 전역 변수 대신 여기 담아 주입합니다.
    /// 푸시가 필요한 모든 컴포넌트(게이트웨이, 목표 엔진, 알림 서비스)가
    /// 이 인스턴스를 참조로 받습니다.
    pub registry: Arc<SessionRegistry>,
}

/// API 라우터를 조립합니다.
///
/// main.rs가 이 라우터를 `/api/v1` 아래에 중첩(nest)시키고
/// CORS/로깅 미들웨어를 끼웁니다. 테스트에서는 이 함수를 직접 불러
/// 요청 하나를 흘려보낼 수 있습니다 (tower::ServiceExt::oneshot).
///
/// 참고: `/patients/goals/{id}`의 id는 메서드에 따라 환자 ID(GET/POST)
/// 이기도, 목표 ID(PATCH/DELETE)이기도 합니다.
pub fn api_router() -> Router<AppState> {
    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me));

    Router::new()
        .merge(auth_routes)
        // 목표
        .route(
            "/patients/goals/{id}",
            get(list_goals).post(create_goal).patch(update_goal).delete(delete_goal),
        )
        .route("/patients/goals/{id}/suggestions", get(suggest_goals))
        // 환자 프로필과 연결
        .route("/patients/{id}", get(get_patient))
        .route("/patients/{id}/profile", post(complete_profile))
        .route("/patients/{id}/caretakers", get(list_caretakers).post(link_caretaker))
        // 검사 결과와 복약
        .route("/patients/{id}/labs", get(list_lab_results).post(create_lab_result))
        .route("/patients/{id}/medications", get(list_medications).post(assign_medication))
        .route("/labs/{id}/read", patch(mark_lab_read))
        // 알림
        .route("/notifications/{id}", get(list_notifications))
        .route("/notifications/{id}/read", patch(mark_notification_read))
        .route("/announcements", post(announce))
        // 의료진
        .route("/clinicians/{id}/patients", get(list_clinician_patients))
        .route("/clinicians/{id}/invite/regenerate", post(regenerate_invite))
        // 헬스체크
        .route("/health", get(health_check))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::middleware::auth::create_access_token;
    use crate::models::{NotificationKind, Role};
    use crate::services::notifications as notification_service;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;

    const TEST_SECRET: &str = "test-secret";

    async fn test_state() -> AppState {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        sqlx::migrate!("./migrations").run(&pool).await.expect("migrations");

        AppState {
            pool,
            jwt_secret: TEST_SECRET.to_string(),
            registry: Arc::new(SessionRegistry::new()),
        }
    }

    fn app(state: &AppState) -> Router {
        api_router().with_state(state.clone())
    }

    async fn seed_patient(state: &AppState, username: &str) -> (i64, i64) {
        let user = db::users::create_user(&state.pool, username, None, "hash", Role::Patient)
            .await
            .unwrap();
        let patient = db::create_patient(&state.pool, user.id, "Kim Jiwoo").await.unwrap();
        (user.id, patient.id)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        // Given
        let state = test_state().await;

        // When
        let response = app(&state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn create_goal_with_pending_status_persists_it() {
        // Given
        let state = test_state().await;
        let (_, patient_id) = seed_patient(&state, "jiwoo").await;

        // When
        let response = app(&state)
            .oneshot(json_request(
                "POST",
                &format!("/patients/goals/{patient_id}"),
                serde_json::json!({ "title": "Walk 10 min", "status": "pending_approval" }),
            ))
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::CREATED);
        let goal = body_json(response).await;
        assert_eq!(goal["status"], "pending_approval");
        assert_eq!(goal["patient_id"], patient_id);

        let list = app(&state)
            .oneshot(
                Request::builder()
                    .uri(format!("/patients/goals/{patient_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("request failed");
        let list = body_json(list).await;
        assert_eq!(list["goals"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn listing_goals_of_unknown_patient_is_404() {
        let state = test_state().await;

        let response = app(&state)
            .oneshot(Request::builder().uri("/patients/goals/999").body(Body::empty()).unwrap())
            .await
            .expect("request failed");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn approval_via_patch_creates_goal_approved_notification() {
        // Given: pending 목표 하나
        let state = test_state().await;
        let (user_id, patient_id) = seed_patient(&state, "jiwoo").await;
        let created = app(&state)
            .oneshot(json_request(
                "POST",
                &format!("/patients/goals/{patient_id}"),
                serde_json::json!({ "title": "Walk 10 min", "status": "pending_approval" }),
            ))
            .await
            .expect("request failed");
        let goal_id = body_json(created).await["id"].as_i64().unwrap();

        // When: pending_approval → active
        let response = app(&state)
            .oneshot(json_request(
                "PATCH",
                &format!("/patients/goals/{goal_id}"),
                serde_json::json!({ "status": "active" }),
            ))
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let notifications = app(&state)
            .oneshot(
                Request::builder()
                    .uri(format!("/notifications/{user_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("request failed");
        let json = body_json(notifications).await;
        let items = json["notifications"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["kind"], NotificationKind::GoalApproved.as_str());
        assert_eq!(items[0]["payload"]["goalId"], goal_id);
    }

    #[tokio::test]
    async fn notifications_survive_disconnects_and_reads_are_idempotent() {
        // Given: 접속이 전혀 없는 동안 만들어진 알림 두 건
        let state = test_state().await;
        let (user_id, _) = seed_patient(&state, "jiwoo").await;
        notification_service::announce(&state.pool, &state.registry, "Hello", "First").await.unwrap();
        notification_service::announce(&state.pool, &state.registry, "Hello", "Second").await.unwrap();

        // When: 나중에 조회하면 둘 다 보입니다
        let response = app(&state)
            .oneshot(
                Request::builder()
                    .uri(format!("/notifications/{user_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .expect("request failed");
        let json = body_json(response).await;
        let items = json["notifications"].as_array().unwrap().clone();
        assert_eq!(items.len(), 2);

        // Then: 읽음 처리는 멱등 — 두 번 호출해도 read_at이 그대로
        let id = items[0]["id"].as_i64().unwrap();
        let first = app(&state)
            .oneshot(json_request("PATCH", &format!("/notifications/{id}/read"), serde_json::json!({})))
            .await
            .expect("request failed");
        let first_read_at = body_json(first).await["read_at"].clone();
        assert!(first_read_at.is_string());

        let second = app(&state)
            .oneshot(json_request("PATCH", &format!("/notifications/{id}/read"), serde_json::json!({})))
            .await
            .expect("request failed");
        let second_read_at = body_json(second).await["read_at"].clone();
        assert_eq!(first_read_at, second_read_at);
    }

    #[tokio::test]
    async fn announcements_require_an_admin_token() {
        // Given
        let state = test_state().await;
        let (user_id, _) = seed_patient(&state, "jiwoo").await;
        let admin = db::users::create_user(&state.pool, "root", None, "hash", Role::Admin)
            .await
            .unwrap();

        let body = serde_json::json!({ "title": "Notice", "message": "Clinic closed Friday" });

        // When: 환자 토큰으로는 거부
        let patient_token = create_access_token(user_id, Role::Patient, TEST_SECRET).unwrap();
        let mut request = json_request("POST", "/announcements", body.clone());
        request.headers_mut().insert(
            "authorization",
            format!("Bearer {patient_token}").parse().unwrap(),
        );
        let response = app(&state).oneshot(request).await.expect("request failed");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        // Then: admin 토큰으로는 모든 사용자에게 생성
        let admin_token = create_access_token(admin.id, Role::Admin, TEST_SECRET).unwrap();
        let mut request = json_request("POST", "/announcements", body);
        request.headers_mut().insert(
            "authorization",
            format!("Bearer {admin_token}").parse().unwrap(),
        );
        let response = app(&state).oneshot(request).await.expect("request failed");
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["created"], 2); // jiwoo + root
    }

    #[tokio::test]
    async fn register_issues_tokens_and_creates_profile_row() {
        // Given
        let state = test_state().await;

        // When
        let response = app(&state)
            .oneshot(json_request(
                "POST",
                "/auth/register",
                serde_json::json!({
                    "username": "jiwoo",
                    "password": "password123",
                    "name": "Kim Jiwoo",
                    "role": "patient"
                }),
            ))
            .await
            .expect("request failed");

        // Then
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["access_token"].is_string());
        assert_eq!(json["user"]["role"], "patient");
        assert_eq!(json["user"]["profile_completed"], false);

        let user_id = json["user"]["id"].as_i64().unwrap();
        let patient = db::get_patient_by_user(&state.pool, user_id).await.unwrap();
        assert!(patient.is_some());
    }

    #[tokio::test]
    async fn duplicate_caretaker_link_is_a_conflict() {
        // Given
        let state = test_state().await;
        let (_, patient_id) = seed_patient(&state, "jiwoo").await;
        let caretaker_user =
            db::users::create_user(&state.pool, "mina", None, "hash", Role::Caretaker)
                .await
                .unwrap();
        db::create_caretaker(&state.pool, caretaker_user.id, "Lee Mina", "WXYZ2345")
            .await
            .unwrap();

        let body = serde_json::json!({ "invite_code": "WXYZ2345" });

        // When: 첫 연결은 성공
        let response = app(&state)
            .oneshot(json_request("POST", &format!("/patients/{patient_id}/caretakers"), body.clone()))
            .await
            .expect("request failed");
        assert_eq!(response.status(), StatusCode::OK);

        // Then: 같은 연결을 다시 만들면 409
        let response = app(&state)
            .oneshot(json_request("POST", &format!("/patients/{patient_id}/caretakers"), body))
            .await
            .expect("request failed");
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
