//! Answer comparison against an assignment's answer key.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::db::models::{AnswerKeyEntry, SubmittedAnswer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GradeOutcome {
    pub(crate) correct_count: usize,
    pub(crate) wrong_count: usize,
}

impl GradeOutcome {
    pub(crate) fn total_count(&self) -> usize {
        self.correct_count + self.wrong_count
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum GradingError {
    #[error("At least one answer must be submitted")]
    EmptySubmission,
    #[error("Assignment has no answer key")]
    MissingAnswerKey,
    #[error("questionNumber {question_number} is outside 1..={question_count}")]
    QuestionOutOfRange { question_number: i32, question_count: i32 },
    #[error("Duplicate questionNumber {0}")]
    DuplicateQuestion(i32),
}

/// Every answer must target a distinct question in `1..=question_count`, so counts can
/// never exceed the assignment's question count.
pub(crate) fn check_answers(
    submitted: &[SubmittedAnswer],
    question_count: i32,
) -> Result<(), GradingError> {
    if submitted.is_empty() {
        return Err(GradingError::EmptySubmission);
    }

    let mut seen = HashSet::new();
    for answer in submitted {
        if !(1..=question_count).contains(&answer.question_number) {
            return Err(GradingError::QuestionOutOfRange {
                question_number: answer.question_number,
                question_count,
            });
        }
        if !seen.insert(answer.question_number) {
            return Err(GradingError::DuplicateQuestion(answer.question_number));
        }
    }
    Ok(())
}

fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Scores `submitted` against `key`. Comparison is trimmed and case-folded; an answer
/// for a question the key does not cover counts as wrong.
pub(crate) fn grade(
    key: &[AnswerKeyEntry],
    submitted: &[SubmittedAnswer],
) -> Result<GradeOutcome, GradingError> {
    if submitted.is_empty() {
        return Err(GradingError::EmptySubmission);
    }
    if key.is_empty() {
        return Err(GradingError::MissingAnswerKey);
    }

    let expected: HashMap<i32, String> =
        key.iter().map(|entry| (entry.question_number, normalize(&entry.answer_text))).collect();

    let correct_count = submitted
        .iter()
        .filter(|answer| {
            expected
                .get(&answer.question_number)
                .is_some_and(|expected| *expected == normalize(&answer.answer))
        })
        .count();

    Ok(GradeOutcome { correct_count, wrong_count: submitted.len() - correct_count })
}
