use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Answer;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnswerCreate {
    pub(crate) assignment_id: String,
    pub(crate) course_id: String,
    #[validate(range(min = 1, message = "questionNumber must be at least 1"))]
    pub(crate) question_number: i32,
    #[validate(length(min = 1, message = "answerText must not be empty"))]
    #[serde(alias = "answer")]
    pub(crate) answer_text: String,
    #[serde(default = "default_point_value")]
    #[validate(range(min = 0.0, message = "pointValue must be non-negative"))]
    pub(crate) point_value: f64,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnswerUpdate {
    #[serde(default)]
    #[validate(range(min = 1, message = "questionNumber must be at least 1"))]
    pub(crate) question_number: Option<i32>,
    #[serde(default)]
    #[serde(alias = "answer")]
    #[validate(length(min = 1, message = "answerText must not be empty"))]
    pub(crate) answer_text: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0.0, message = "pointValue must be non-negative"))]
    pub(crate) point_value: Option<f64>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BulkAnswerItem {
    #[validate(range(min = 1, message = "questionNumber must be at least 1"))]
    pub(crate) question_number: i32,
    #[serde(alias = "answer")]
    #[validate(length(min = 1, message = "answerText must not be empty"))]
    pub(crate) answer_text: String,
    #[serde(default = "default_point_value")]
    #[validate(range(min = 0.0, message = "pointValue must be non-negative"))]
    pub(crate) point_value: f64,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnswerBulkReplace {
    pub(crate) assignment_id: String,
    pub(crate) course_id: String,
    #[validate(nested)]
    pub(crate) answers: Vec<BulkAnswerItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnswerListQuery {
    pub(crate) assignment_id: String,
    pub(crate) course_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnswerResponse {
    pub(crate) id: String,
    pub(crate) assignment_id: String,
    pub(crate) course_id: String,
    pub(crate) question_number: i32,
    pub(crate) answer_text: String,
    pub(crate) point_value: f64,
    pub(crate) updated_at: String,
}

impl AnswerResponse {
    pub(crate) fn from_db(answer: Answer) -> Self {
        Self {
            id: answer.id,
            assignment_id: answer.assignment_id,
            course_id: answer.course_id,
            question_number: answer.question_number,
            answer_text: answer.answer_text,
            point_value: answer.point_value,
            updated_at: format_primitive(answer.updated_at),
        }
    }
}

fn default_point_value() -> f64 {
    1.0
}
