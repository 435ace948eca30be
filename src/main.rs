//! # Carelink 웹 서버 진입점
//!
//! 환자·보호자·의료진·관리자를 잇는 케어 코디네이션 백엔드입니다.
//! 이 파일은 애플리케이션의 **시작점(entry point)**입니다.
//!
//! 이 파일이 수행하는 작업:
//! 1. 환경변수(.env) 로딩
//! 2. 로깅(tracing) 초기화
//! 3. SQLite 데이터베이스 연결 풀 생성
//! 4. 데이터베이스 마이그레이션 실행
//! 5. 실시간 세션 레지스트리 생성
//! 6. API 라우터 + WebSocket 푸시 채널 설정
//! 7. HTTP 서버 시작

// ── 모듈 선언 ──
// `mod` 키워드는 다른 파일을 모듈로 가져옵니다.
// Rust에서는 파일 시스템 구조가 곧 모듈 구조입니다.
mod config;
mod db;
mod error;
mod middleware;
mod models;
mod realtime;
mod routes;
mod services;

use std::sync::Arc;

use anyhow::Result; // anyhow::Result: 어떤 에러 타입이든 담을 수 있는 범용 Result 타입
use axum::{routing::get, Router};
use config::Config;
use realtime::SessionRegistry;
use routes::AppState;
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// #[tokio::main]: 비동기 런타임을 시작하는 어트리뷰트 매크로.
// 이 매크로가 내부적으로 tokio 런타임을 생성하고 main을 그 안에서 실행합니다.
#[tokio::main]
async fn main() -> Result<()> {
    // ── 1단계: 환경변수 로딩 ──
    // .ok()는 Result를 Option으로 변환하여, .env 파일이 없어도 에러 없이 넘어갑니다.
    dotenvy::dotenv().ok();

    // ── 2단계: 로깅(tracing) 초기화 ──
    // EnvFilter: RUST_LOG 환경변수로 로그 레벨을 제어합니다.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carelink=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // ── 3단계: 설정 로딩 ──
    // `?` 연산자: Result가 Err이면 즉시 함수에서 반환(에러 전파).
    let config = Config::from_env()?;
    tracing::info!("Starting Carelink server on {}:{}", config.host, config.port);

    // ── 4단계: SQLite 연결 풀 생성 ──
    // 연결 풀(Connection Pool): 연결을 미리 만들어두고 재사용하는 패턴.
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    // ── 5단계: 데이터베이스 마이그레이션 실행 ──
    // sqlx::migrate!는 컴파일 타임에 ./migrations 폴더의 SQL 파일들을 포함시키는 매크로
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;

    // ── 6단계: 실시간 세션 레지스트리 생성 ──
    // 프로세스에 하나뿐인 인스턴스를 Arc로 감싸 AppState에 담습니다.
    // 전역 변수가 아니므로 테스트에서는 각자의 레지스트리를 만들어 씁니다.
    // 세션은 영속화되지 않습니다 — 재시작하면 클라이언트가 다시 접속합니다.
    let registry = Arc::new(SessionRegistry::new());

    // ── 7단계: 애플리케이션 상태(State) 생성 ──
    // AppState: 모든 라우트 핸들러가 공유하는 데이터를 담는 구조체
    let state = AppState {
        pool: pool.clone(),
        jwt_secret: config.jwt_secret.clone(),
        registry,
    };

    // ── 8단계: CORS 미들웨어 설정 ──
    // CORS_ORIGIN이 "*"이면 모든 출처 허용 (개발용),
    // 아니면 지정한 출처만 허용합니다 (프로덕션).
    let cors = if config.cors_origin == "*" {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origin = config.cors_origin.parse::<axum::http::HeaderValue>()?;
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // ── 9단계: 라우터 조립 ──
    // REST API는 /api/v1 아래에 중첩시키고,
    // 실시간 푸시 채널은 /ws에서 WebSocket으로 업그레이드합니다.
    let app = Router::new()
        .nest("/api/v1", routes::api_router())
        .route("/ws", get(realtime::gateway::ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http()) // HTTP 요청/응답 자동 로깅
        .with_state(state);

    // ── 10단계: 서버 시작 ──
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // 이 줄에서 서버가 영원히 실행됩니다 (종료 시그널까지).
    axum::serve(listener, app).await?;

    Ok(())
}
