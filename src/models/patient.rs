use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Patient {
    pub id: i64,
    pub user_id: i64,
    pub clinician_id: Option<i64>,
    pub name: String,
    pub birth_date: Option<String>,
    pub phone: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Clinician {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub specialty: Option<String>,
    pub invite_code: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Caretaker {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub invite_code: String,
    pub created_at: String,
}

/// 온보딩 요청 본문 — 민감 필드의 복호화는 외부 수집기의 몫이고,
/// 이 서버는 이미 복호화된 JSON을 받습니다.
#[derive(Debug, Deserialize)]
pub struct OnboardingRequest {
    pub name: Option<String>,
    pub birth_date: Option<String>,
    pub phone: Option<String>,
    /// 담당 의료진 연결용 초대 코드 (선택)
    pub clinician_invite_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LinkCaretakerRequest {
    pub invite_code: String,
}
