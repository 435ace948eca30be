use crate::error::AppError;
use crate::models::patient::{Caretaker, Clinician, Patient};
use sqlx::SqlitePool;

pub async fn create_patient(
    pool: &SqlitePool,
    user_id: i64,
    name: &str,
) -> Result<Patient, AppError> {
    let result = sqlx::query("INSERT INTO patients (user_id, name) VALUES (?, ?)")
        .bind(user_id)
        .bind(name)
        .execute(pool)
        .await?;

    get_patient(pool, result.last_insert_rowid())
        .await?
        .ok_or(AppError::Internal("Failed to retrieve created patient".to_string()))
}

pub async fn get_patient(pool: &SqlitePool, id: i64) -> Result<Option<Patient>, AppError> {
    let patient = sqlx::query_as::<_, Patient>(
        r#"
        SELECT id, user_id, clinician_id, name, birth_date, phone, created_at
        FROM patients
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(patient)
}

pub async fn get_patient_by_user(pool: &SqlitePool, user_id: i64) -> Result<Option<Patient>, AppError> {
    let patient = sqlx::query_as::<_, Patient>(
        r#"
        SELECT id, user_id, clinician_id, name, birth_date, phone, created_at
        FROM patients
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(patient)
}

/// 온보딩에서 받은 필드만 갱신합니다 (PATCH 방식 — None인 필드는 유지).
pub async fn update_patient_profile(
    pool: &SqlitePool,
    id: i64,
    name: Option<&str>,
    birth_date: Option<&str>,
    phone: Option<&str>,
) -> Result<Option<Patient>, AppError> {
    if get_patient(pool, id).await?.is_none() {
        return Ok(None);
    }

    if let Some(name) = name {
        sqlx::query("UPDATE patients SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(pool)
            .await?;
    }

    if let Some(birth_date) = birth_date {
        sqlx::query("UPDATE patients SET birth_date = ? WHERE id = ?")
            .bind(birth_date)
            .bind(id)
            .execute(pool)
            .await?;
    }

    if let Some(phone) = phone {
        sqlx::query("UPDATE patients SET phone = ? WHERE id = ?")
            .bind(phone)
            .bind(id)
            .execute(pool)
            .await?;
    }

    get_patient(pool, id).await
}

pub async fn set_patient_clinician(
    pool: &SqlitePool,
    patient_id: i64,
    clinician_id: i64,
) -> Result<(), AppError> {
    sqlx::query("UPDATE patients SET clinician_id = ? WHERE id = ?")
        .bind(clinician_id)
        .bind(patient_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn list_patients_for_clinician(
    pool: &SqlitePool,
    clinician_id: i64,
) -> Result<Vec<Patient>, AppError> {
    let patients = sqlx::query_as::<_, Patient>(
        r#"
        SELECT id, user_id, clinician_id, name, birth_date, phone, created_at
        FROM patients
        WHERE clinician_id = ?
        ORDER BY name
        "#,
    )
    .bind(clinician_id)
    .fetch_all(pool)
    .await?;

    Ok(patients)
}

pub async fn create_clinician(
    pool: &SqlitePool,
    user_id: i64,
    name: &str,
    specialty: Option<&str>,
    invite_code: &str,
) -> Result<Clinician, AppError> {
    let result = sqlx::query(
        "INSERT INTO clinicians (user_id, name, specialty, invite_code) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(name)
    .bind(specialty)
    .bind(invite_code)
    .execute(pool)
    .await?;

    get_clinician(pool, result.last_insert_rowid())
        .await?
        .ok_or(AppError::Internal("Failed to retrieve created clinician".to_string()))
}

pub async fn get_clinician(pool: &SqlitePool, id: i64) -> Result<Option<Clinician>, AppError> {
    let clinician = sqlx::query_as::<_, Clinician>(
        r#"
        SELECT id, user_id, name, specialty, invite_code, created_at
        FROM clinicians
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(clinician)
}

pub async fn get_clinician_by_user(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Option<Clinician>, AppError> {
    let clinician = sqlx::query_as::<_, Clinician>(
        r#"
        SELECT id, user_id, name, specialty, invite_code, created_at
        FROM clinicians
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(clinician)
}

pub async fn get_clinician_by_invite(
    pool: &SqlitePool,
    invite_code: &str,
) -> Result<Option<Clinician>, AppError> {
    let clinician = sqlx::query_as::<_, Clinician>(
        r#"
        SELECT id, user_id, name, specialty, invite_code, created_at
        FROM clinicians
        WHERE invite_code = ?
        "#,
    )
    .bind(invite_code)
    .fetch_optional(pool)
    .await?;

    Ok(clinician)
}

pub async fn update_clinician_invite(
    pool: &SqlitePool,
    id: i64,
    invite_code: &str,
) -> Result<Option<Clinician>, AppError> {
    if get_clinician(pool, id).await?.is_none() {
        return Ok(None);
    }

    sqlx::query("UPDATE clinicians SET invite_code = ? WHERE id = ?")
        .bind(invite_code)
        .bind(id)
        .execute(pool)
        .await?;

    get_clinician(pool, id).await
}

pub async fn create_caretaker(
    pool: &SqlitePool,
    user_id: i64,
    name: &str,
    invite_code: &str,
) -> Result<Caretaker, AppError> {
    let result =
        sqlx::query("INSERT INTO caretakers (user_id, name, invite_code) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(name)
            .bind(invite_code)
            .execute(pool)
            .await?;

    get_caretaker(pool, result.last_insert_rowid())
        .await?
        .ok_or(AppError::Internal("Failed to retrieve created caretaker".to_string()))
}

pub async fn get_caretaker(pool: &SqlitePool, id: i64) -> Result<Option<Caretaker>, AppError> {
    let caretaker = sqlx::query_as::<_, Caretaker>(
        r#"
        SELECT id, user_id, name, invite_code, created_at
        FROM caretakers
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(caretaker)
}

pub async fn get_caretaker_by_invite(
    pool: &SqlitePool,
    invite_code: &str,
) -> Result<Option<Caretaker>, AppError> {
    let caretaker = sqlx::query_as::<_, Caretaker>(
        r#"
        SELECT id, user_id, name, invite_code, created_at
        FROM caretakers
        WHERE invite_code = ?
        "#,
    )
    .bind(invite_code)
    .fetch_optional(pool)
    .await?;

    Ok(caretaker)
}

/// 환자-보호자 연결을 추가합니다.
///
/// `INSERT OR IGNORE`: 같은 (patient_id, caretaker_id) 조합이 이미 있으면
/// 에러 대신 0행 삽입으로 끝납니다. 반환값 `false`는 중복 연결이라는 뜻이고,
/// 호출자(서비스)가 Conflict로 변환합니다.
pub async fn link_caretaker(
    pool: &SqlitePool,
    patient_id: i64,
    caretaker_id: i64,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO patient_caretakers (patient_id, caretaker_id) VALUES (?, ?)",
    )
    .bind(patient_id)
    .bind(caretaker_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn list_caretakers_for_patient(
    pool: &SqlitePool,
    patient_id: i64,
) -> Result<Vec<Caretaker>, AppError> {
    let caretakers = sqlx::query_as::<_, Caretaker>(
        r#"
        SELECT c.id, c.user_id, c.name, c.invite_code, c.created_at
        FROM caretakers c
        JOIN patient_caretakers pc ON pc.caretaker_id = c.id
        WHERE pc.patient_id = ?
        ORDER BY c.name
        "#,
    )
    .bind(patient_id)
    .fetch_all(pool)
    .await?;

    Ok(caretakers)
}
