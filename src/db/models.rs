use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{AssignmentType, UserRole};

#[derive(Debug, Clone, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) username: String,
    pub(crate) hashed_password: String,
    pub(crate) full_name: String,
    pub(crate) email: Option<String>,
    pub(crate) phone: Option<String>,
    pub(crate) parent_phone: Option<String>,
    pub(crate) school: Option<String>,
    pub(crate) grade: Option<String>,
    /// `None` only for legacy rows; see `access_policy::effective_role`.
    pub(crate) role: Option<UserRole>,
    pub(crate) privacy_consent: bool,
    pub(crate) marketing_consent: bool,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct Course {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) teacher_id: String,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct Assignment {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) name: String,
    pub(crate) subject: String,
    pub(crate) main_unit: Option<String>,
    pub(crate) sub_unit: Option<String>,
    pub(crate) question_count: i32,
    pub(crate) assignment_type: AssignmentType,
    pub(crate) open_at: PrimitiveDateTime,
    pub(crate) due_at: PrimitiveDateTime,
    pub(crate) files: Json<Vec<AssignmentFile>>,
    pub(crate) answer_key: Json<Vec<AnswerKeyEntry>>,
    pub(crate) created_by: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct AssignmentSubmission {
    pub(crate) id: String,
    pub(crate) assignment_id: String,
    pub(crate) student_id: String,
    pub(crate) answers: Json<Vec<SubmittedAnswer>>,
    pub(crate) correct_count: i32,
    pub(crate) wrong_count: i32,
    pub(crate) images: Json<Vec<StoredImage>>,
    pub(crate) submitted_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct Answer {
    pub(crate) id: String,
    pub(crate) assignment_id: String,
    pub(crate) course_id: String,
    pub(crate) question_number: i32,
    pub(crate) answer_text: String,
    pub(crate) point_value: f64,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnswerKeyEntry {
    pub(crate) question_number: i32,
    #[serde(alias = "answer")]
    pub(crate) answer_text: String,
    #[serde(default = "default_point_value")]
    pub(crate) point_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmittedAnswer {
    pub(crate) question_number: i32,
    #[serde(alias = "answerText")]
    pub(crate) answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AssignmentFile {
    pub(crate) url: String,
    #[serde(default)]
    pub(crate) key: Option<String>,
    pub(crate) media_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredImage {
    pub(crate) key: String,
    pub(crate) url: String,
    pub(crate) content_type: String,
    pub(crate) size: i64,
    pub(crate) sha256: String,
}

fn default_point_value() -> f64 {
    1.0
}
