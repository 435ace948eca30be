use crate::error::AppError;
use crate::models::lab::{CreateLabResultRequest, LabResult, Medication};
use sqlx::SqlitePool;

pub async fn create_lab_result(
    pool: &SqlitePool,
    patient_id: i64,
    clinician_id: Option<i64>,
    req: &CreateLabResultRequest,
) -> Result<LabResult, AppError> {
    let result = sqlx::query(
        r#"
        INSERT INTO lab_results (patient_id, clinician_id, test_name, result_value, unit, note)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(patient_id)
    .bind(clinician_id)
    .bind(&req.test_name)
    .bind(&req.result_value)
    .bind(&req.unit)
    .bind(&req.note)
    .execute(pool)
    .await?;

    get_lab_result(pool, result.last_insert_rowid())
        .await?
        .ok_or(AppError::Internal("Failed to retrieve created lab result".to_string()))
}

pub async fn get_lab_result(pool: &SqlitePool, id: i64) -> Result<Option<LabResult>, AppError> {
    let lab = sqlx::query_as::<_, LabResult>(
        r#"
        SELECT id, patient_id, clinician_id, test_name, result_value, unit, note, viewed, created_at
        FROM lab_results
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(lab)
}

pub async fn list_lab_results_for_patient(
    pool: &SqlitePool,
    patient_id: i64,
) -> Result<Vec<LabResult>, AppError> {
    let labs = sqlx::query_as::<_, LabResult>(
        r#"
        SELECT id, patient_id, clinician_id, test_name, result_value, unit, note, viewed, created_at
        FROM lab_results
        WHERE patient_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(patient_id)
    .fetch_all(pool)
    .await?;

    Ok(labs)
}

/// 검사 결과를 열람 처리합니다. 이미 열람한 결과에는 영향이 없습니다 (멱등).
pub async fn mark_lab_viewed(pool: &SqlitePool, id: i64) -> Result<bool, AppError> {
    if get_lab_result(pool, id).await?.is_none() {
        return Ok(false);
    }

    sqlx::query("UPDATE lab_results SET viewed = 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(true)
}

pub async fn create_medication(
    pool: &SqlitePool,
    patient_id: i64,
    clinician_id: Option<i64>,
    name: &str,
    dosage: Option<&str>,
    instructions: Option<&str>,
) -> Result<Medication, AppError> {
    let result = sqlx::query(
        r#"
        INSERT INTO medications (patient_id, clinician_id, name, dosage, instructions)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(patient_id)
    .bind(clinician_id)
    .bind(name)
    .bind(dosage)
    .bind(instructions)
    .execute(pool)
    .await?;

    get_medication(pool, result.last_insert_rowid())
        .await?
        .ok_or(AppError::Internal("Failed to retrieve created medication".to_string()))
}

pub async fn get_medication(pool: &SqlitePool, id: i64) -> Result<Option<Medication>, AppError> {
    let medication = sqlx::query_as::<_, Medication>(
        r#"
        SELECT id, patient_id, clinician_id, name, dosage, instructions, created_at
        FROM medications
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(medication)
}

pub async fn list_medications_for_patient(
    pool: &SqlitePool,
    patient_id: i64,
) -> Result<Vec<Medication>, AppError> {
    let medications = sqlx::query_as::<_, Medication>(
        r#"
        SELECT id, patient_id, clinician_id, name, dosage, instructions, created_at
        FROM medications
        WHERE patient_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(patient_id)
    .fetch_all(pool)
    .await?;

    Ok(medications)
}
