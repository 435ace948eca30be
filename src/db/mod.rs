//! # 데이터베이스 접근 계층 (Data Access Layer)
//!
//! 데이터베이스와 직접 상호작용하는 함수들을 모아둔 모듈입니다.
//! 라우트 핸들러(routes/)와 서비스(services/)에서 이 모듈의 함수를
//! 호출하여 DB 작업을 수행합니다. 비즈니스 규칙은 여기에 두지 않습니다 —
//! 이 계층은 유일성/외래키 제약 외의 판단을 하지 않습니다.
//!
//! 각 하위 모듈:
//! - `goals`: 목표 CRUD와 조건부 상태 전이 쿼리
//! - `labs`: 검사 결과와 복약 쿼리
//! - `notifications`: 알림 원장(append-only) 쿼리
//! - `patients`: 환자/의료진/보호자 프로필과 연결 쿼리
//! - `users`: 사용자 계정과 refresh 토큰 쿼리

pub mod goals;
pub mod labs;
pub mod notifications;
pub mod patients;
pub mod users;

// 하위 모듈의 모든 공개 함수를 재공개(re-export)하여
// `crate::db::get_goal`처럼 바로 접근할 수 있게 합니다.
pub use goals::*;
pub use labs::*;
pub use notifications::*;
pub use patients::*;
