use std::collections::HashSet;

use crate::api::errors::ApiError;
use crate::db::models::AnswerKeyEntry;
use crate::db::types::AssignmentType;
use crate::services::curriculum::Curriculum;

pub(crate) const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn validate_username(username: &str) -> Result<(), ApiError> {
    let len = username.chars().count();
    let valid = (3..=32).contains(&len)
        && username.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest(
            "Username must be 3-32 characters of letters, digits, '_', '-' or '.'".to_string(),
        ))
    }
}

pub(crate) fn validate_password_len(password: &str) -> Result<(), ApiError> {
    if password.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )))
    }
}

pub(crate) fn validate_question_number(
    question_number: i32,
    question_count: i32,
) -> Result<(), ApiError> {
    if (1..=question_count).contains(&question_number) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "questionNumber {question_number} is outside 1..={question_count}"
        )))
    }
}

/// Range, uniqueness, point value and non-empty text for a full answer key.
pub(crate) fn validate_answer_key(
    entries: &[AnswerKeyEntry],
    question_count: i32,
) -> Result<(), ApiError> {
    let mut seen = HashSet::new();
    for entry in entries {
        validate_question_number(entry.question_number, question_count)?;
        if !seen.insert(entry.question_number) {
            return Err(ApiError::BadRequest(format!(
                "Duplicate questionNumber {}",
                entry.question_number
            )));
        }
        if entry.answer_text.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Answer for question {} must not be empty",
                entry.question_number
            )));
        }
        if entry.point_value.is_nan() || entry.point_value < 0.0 {
            return Err(ApiError::BadRequest(format!(
                "pointValue for question {} must be non-negative",
                entry.question_number
            )));
        }
    }
    Ok(())
}

/// Subject must be a curriculum track; quizzes need both unit labels for report grouping.
pub(crate) fn validate_classification(
    curriculum: &Curriculum,
    assignment_type: AssignmentType,
    subject: &str,
    main_unit: Option<&str>,
    sub_unit: Option<&str>,
) -> Result<(), ApiError> {
    if !curriculum.is_known_subject(subject) {
        return Err(ApiError::BadRequest(format!(
            "Unknown subject '{subject}'; expected one of {}",
            curriculum.subjects().collect::<Vec<_>>().join(", ")
        )));
    }

    let present = |value: Option<&str>| value.is_some_and(|value| !value.trim().is_empty());
    if assignment_type == AssignmentType::Quiz && !(present(main_unit) && present(sub_unit)) {
        return Err(ApiError::BadRequest(
            "mainUnit and subUnit are required for QUIZ assignments".to_string(),
        ));
    }
    Ok(())
}
