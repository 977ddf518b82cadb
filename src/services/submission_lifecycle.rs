use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::core::config::StorageSettings;
use crate::core::metrics;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{AssignmentSubmission, StoredImage, SubmittedAnswer};
use crate::repositories;
use crate::services::grading::{self, GradeOutcome, GradingError};
use crate::services::storage::{decode_image_data_uri, purge_blobs, BlobStore};

#[derive(Debug, Error)]
pub(crate) enum SubmissionError {
    #[error("Assignment not found")]
    AssignmentNotFound,
    #[error(transparent)]
    Grading(#[from] GradingError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug)]
pub(crate) struct SubmissionOutcome {
    pub(crate) grade: GradeOutcome,
    pub(crate) submission: AssignmentSubmission,
    pub(crate) resubmission: bool,
    pub(crate) skipped_images: usize,
}

/// Grades and stores a student's answers, replacing any earlier submission for the same
/// assignment. Blob failures are logged and never fail the submission.
pub(crate) async fn submit(
    state: &AppState,
    assignment_id: &str,
    student_id: &str,
    answers: Vec<SubmittedAnswer>,
    image_payloads: Vec<String>,
) -> Result<SubmissionOutcome, SubmissionError> {
    let assignment = repositories::assignments::find_by_id(state.db(), assignment_id)
        .await?
        .ok_or(SubmissionError::AssignmentNotFound)?;

    grading::check_answers(&answers, assignment.question_count)?;
    let grade = grading::grade(&assignment.answer_key, &answers)?;

    let previous =
        repositories::submissions::find_for_student(state.db(), assignment_id, student_id).await?;
    let resubmission = previous.is_some();

    let stale_keys: Vec<String> = previous
        .map(|submission| submission.images.0.into_iter().map(|image| image.key).collect())
        .unwrap_or_default();

    let requested_images = image_payloads.len();
    let images = match state.blobs() {
        Some(store) => {
            store_solution_images(
                Arc::clone(store),
                state.settings().storage(),
                assignment_id,
                student_id,
                image_payloads,
            )
            .await
        }
        None => {
            if requested_images > 0 || !stale_keys.is_empty() {
                tracing::warn!(
                    assignment_id,
                    student_id,
                    requested_images,
                    stale = stale_keys.len(),
                    "Blob store not configured; solution images ignored"
                );
            }
            Vec::new()
        }
    };
    let skipped_images = requested_images.saturating_sub(images.len());
    let uploaded_keys: Vec<String> = images.iter().map(|image| image.key.clone()).collect();

    let stored = repositories::submissions::upsert(
        state.db(),
        repositories::submissions::UpsertSubmission {
            id: &Uuid::new_v4().to_string(),
            assignment_id,
            student_id,
            answers,
            correct_count: grade.correct_count as i32,
            wrong_count: grade.wrong_count as i32,
            images,
            submitted_at: primitive_now_utc(),
        },
    )
    .await;

    // The row only ever references blobs that exist: new uploads go if the write fails,
    // the previous submission's images go once it succeeds.
    let submission = match stored {
        Ok(submission) => {
            if let Some(store) = state.blobs() {
                purge_blobs(Arc::clone(store), stale_keys, "resubmission").await;
            }
            submission
        }
        Err(err) => {
            if let Some(store) = state.blobs() {
                purge_blobs(Arc::clone(store), uploaded_keys, "submission_rollback").await;
            }
            return Err(err.into());
        }
    };

    metrics::record_graded_submission(resubmission);
    tracing::info!(
        assignment_id,
        student_id,
        correct = grade.correct_count,
        wrong = grade.wrong_count,
        resubmission,
        skipped_images,
        "Submission graded"
    );

    Ok(SubmissionOutcome { grade, submission, resubmission, skipped_images })
}

fn image_key(assignment_id: &str, student_id: &str, extension: &str) -> String {
    format!("submissions/{assignment_id}/{student_id}/{}.{extension}", Uuid::new_v4())
}

/// Uploads recognised image payloads concurrently and keeps the successful ones in
/// request order.
pub(crate) async fn store_solution_images(
    store: Arc<dyn BlobStore>,
    limits: &StorageSettings,
    assignment_id: &str,
    student_id: &str,
    payloads: Vec<String>,
) -> Vec<StoredImage> {
    let max_images = limits.max_images_per_submission as usize;
    if payloads.len() > max_images {
        tracing::warn!(
            assignment_id,
            student_id,
            received = payloads.len(),
            max_images,
            "Too many solution images; extra images dropped"
        );
    }

    let mut tasks = JoinSet::new();
    for (index, payload) in payloads.into_iter().take(max_images).enumerate() {
        let image = match decode_image_data_uri(&payload, limits.max_upload_bytes()) {
            Ok(image) => image,
            Err(err) => {
                tracing::warn!(
                    assignment_id,
                    student_id,
                    index,
                    error = %err,
                    "Skipping solution image"
                );
                continue;
            }
        };

        let key = image_key(assignment_id, student_id, image.extension);
        let store = Arc::clone(&store);
        tasks.spawn(async move {
            let result = store.upload(&key, &image.content_type, image.bytes).await;
            (index, key, result)
        });
    }

    let mut stored = Vec::new();
    let mut failures = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, _, Ok(image))) => stored.push((index, image)),
            Ok((index, key, Err(err))) => {
                failures += 1;
                tracing::warn!(
                    assignment_id,
                    student_id,
                    index,
                    key = %key,
                    error = %err,
                    "Solution image upload failed"
                );
            }
            Err(err) => {
                failures += 1;
                tracing::warn!(
                    assignment_id,
                    student_id,
                    error = %err,
                    "Solution image task failed"
                );
            }
        }
    }
    metrics::record_blob_failures("upload", failures);

    stored.sort_by_key(|(index, _)| *index);
    stored.into_iter().map(|(_, image)| image).collect()
}
