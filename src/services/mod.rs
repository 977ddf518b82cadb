pub(crate) mod access_policy;
pub(crate) mod curriculum;
pub(crate) mod grading;
pub(crate) mod storage;
pub(crate) mod study_report;
pub(crate) mod submission_lifecycle;
