use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use crate::core::time::{format_primitive, serde_flexible};
use crate::db::models::{
    AnswerKeyEntry, Assignment, AssignmentFile, AssignmentSubmission, StoredImage,
    SubmittedAnswer,
};
use crate::db::types::AssignmentType;
use crate::repositories::submissions::SubmissionWithStudent;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AssignmentCreate {
    pub(crate) course_id: String,
    #[validate(length(min = 1, max = 200, message = "name must not be empty"))]
    pub(crate) name: String,
    pub(crate) subject: String,
    #[serde(default)]
    pub(crate) main_unit: Option<String>,
    #[serde(default)]
    pub(crate) sub_unit: Option<String>,
    #[validate(range(min = 1, max = 500, message = "questionCount must be between 1 and 500"))]
    pub(crate) question_count: i32,
    #[serde(alias = "type")]
    pub(crate) assignment_type: AssignmentType,
    #[serde(deserialize_with = "serde_flexible::deserialize")]
    pub(crate) open_at: OffsetDateTime,
    #[serde(deserialize_with = "serde_flexible::deserialize")]
    pub(crate) due_at: OffsetDateTime,
    #[serde(default)]
    pub(crate) files: Vec<AssignmentFile>,
    #[serde(default, alias = "answers")]
    pub(crate) answer_key: Vec<AnswerKeyEntry>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AssignmentUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "name must not be empty"))]
    pub(crate) name: Option<String>,
    #[serde(default)]
    pub(crate) subject: Option<String>,
    #[serde(default)]
    pub(crate) main_unit: Option<String>,
    #[serde(default)]
    pub(crate) sub_unit: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1, max = 500, message = "questionCount must be between 1 and 500"))]
    pub(crate) question_count: Option<i32>,
    #[serde(default, alias = "type")]
    pub(crate) assignment_type: Option<AssignmentType>,
    #[serde(default, deserialize_with = "serde_flexible::option::deserialize")]
    pub(crate) open_at: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "serde_flexible::option::deserialize")]
    pub(crate) due_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub(crate) files: Option<Vec<AssignmentFile>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AssignmentListQuery {
    pub(crate) page: Option<i64>,
    pub(crate) limit: Option<i64>,
    pub(crate) course_id: Option<String>,
    #[serde(rename = "type")]
    pub(crate) assignment_type: Option<AssignmentType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnswerKeyReplace {
    #[serde(alias = "answers")]
    pub(crate) answer_key: Vec<AnswerKeyEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AssignmentResponse {
    pub(crate) id: String,
    pub(crate) course_id: String,
    pub(crate) name: String,
    pub(crate) subject: String,
    pub(crate) main_unit: Option<String>,
    pub(crate) sub_unit: Option<String>,
    pub(crate) question_count: i32,
    #[serde(rename = "type")]
    pub(crate) assignment_type: AssignmentType,
    pub(crate) open_at: String,
    pub(crate) due_at: String,
    pub(crate) files: Vec<AssignmentFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) answer_key: Option<Vec<AnswerKeyEntry>>,
    pub(crate) created_by: Option<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl AssignmentResponse {
    /// `include_key` is false for students.
    pub(crate) fn from_db(assignment: Assignment, include_key: bool) -> Self {
        Self {
            id: assignment.id,
            course_id: assignment.course_id,
            name: assignment.name,
            subject: assignment.subject,
            main_unit: assignment.main_unit,
            sub_unit: assignment.sub_unit,
            question_count: assignment.question_count,
            assignment_type: assignment.assignment_type,
            open_at: format_primitive(assignment.open_at),
            due_at: format_primitive(assignment.due_at),
            files: assignment.files.0,
            answer_key: include_key.then_some(assignment.answer_key.0),
            created_by: assignment.created_by,
            created_at: format_primitive(assignment.created_at),
            updated_at: format_primitive(assignment.updated_at),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitRequest {
    pub(crate) student_answers: Vec<SubmittedAnswer>,
    #[serde(default)]
    pub(crate) solution_images: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitResponse {
    pub(crate) correct_count: usize,
    pub(crate) wrong_count: usize,
    pub(crate) total_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmissionResponse {
    pub(crate) id: String,
    pub(crate) assignment_id: String,
    pub(crate) student_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) student_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) student_name: Option<String>,
    pub(crate) answers: Vec<SubmittedAnswer>,
    pub(crate) correct_count: i32,
    pub(crate) wrong_count: i32,
    pub(crate) images: Vec<StoredImage>,
    pub(crate) submitted_at: String,
}

impl SubmissionResponse {
    pub(crate) fn from_db(submission: AssignmentSubmission) -> Self {
        Self {
            id: submission.id,
            assignment_id: submission.assignment_id,
            student_id: submission.student_id,
            student_username: None,
            student_name: None,
            answers: submission.answers.0,
            correct_count: submission.correct_count,
            wrong_count: submission.wrong_count,
            images: submission.images.0,
            submitted_at: format_primitive(submission.submitted_at),
        }
    }

    pub(crate) fn with_student(row: SubmissionWithStudent) -> Self {
        Self {
            student_username: Some(row.student_username),
            student_name: Some(row.student_name),
            ..Self::from_db(row.submission)
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PresignRequest {
    pub(crate) course_id: String,
    #[validate(length(min = 1, max = 200, message = "filename must not be empty"))]
    pub(crate) filename: String,
    #[validate(length(min = 1, max = 100, message = "contentType must not be empty"))]
    pub(crate) content_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PresignResponse {
    pub(crate) upload_url: String,
    pub(crate) key: String,
    pub(crate) url: String,
    pub(crate) media_type: String,
    pub(crate) expires_in_seconds: u64,
}
