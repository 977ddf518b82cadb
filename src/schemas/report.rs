use serde::{Deserialize, Serialize};

use crate::services::study_report::ReportSummary;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudyReportQuery {
    pub(crate) year: Option<i32>,
    pub(crate) month: Option<u8>,
    pub(crate) start_date: Option<String>,
    pub(crate) end_date: Option<String>,
    pub(crate) course_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReportPeriod {
    pub(crate) start: String,
    pub(crate) end: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudyReportResponse {
    pub(crate) student_id: String,
    pub(crate) course_id: String,
    pub(crate) course_name: String,
    pub(crate) period: ReportPeriod,
    #[serde(flatten)]
    pub(crate) summary: ReportSummary,
}
