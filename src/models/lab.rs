use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LabResult {
    pub id: i64,
    pub patient_id: i64,
    pub clinician_id: Option<i64>,
    pub test_name: String,
    pub result_value: String,
    pub unit: Option<String>,
    pub note: Option<String>,
    pub viewed: bool,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateLabResultRequest {
    pub test_name: String,
    pub result_value: String,
    pub unit: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Medication {
    pub id: i64,
    pub patient_id: i64,
    pub clinician_id: Option<i64>,
    pub name: String,
    pub dosage: Option<String>,
    pub instructions: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignMedicationRequest {
    pub name: String,
    pub dosage: Option<String>,
    pub instructions: Option<String>,
}
