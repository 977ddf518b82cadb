use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Course;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CourseCreate {
    #[validate(length(min = 1, max = 100, message = "name must not be empty"))]
    pub(crate) name: String,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub(crate) description: Option<String>,
    /// Admins pick the owning teacher; teachers always own what they create.
    #[serde(default)]
    pub(crate) teacher_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CourseUpdate {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "name must not be empty"))]
    pub(crate) name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub(crate) description: Option<String>,
    #[serde(default)]
    pub(crate) teacher_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EnrollRequest {
    pub(crate) student_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CourseListQuery {
    pub(crate) page: Option<i64>,
    pub(crate) limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CourseResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) teacher_id: String,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl CourseResponse {
    pub(crate) fn from_db(course: Course) -> Self {
        Self {
            id: course.id,
            name: course.name,
            description: course.description,
            teacher_id: course.teacher_id,
            created_at: format_primitive(course.created_at),
            updated_at: format_primitive(course.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CourseDetailResponse {
    #[serde(flatten)]
    pub(crate) course: CourseResponse,
    pub(crate) student_ids: Vec<String>,
    pub(crate) assignment_ids: Vec<String>,
}
