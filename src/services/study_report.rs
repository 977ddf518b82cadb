//! Study-report aggregation over a student's quiz submissions.
//!
//! Everything here is pure: callers load the course's quiz assignments, the enrolled
//! roster and the submissions, and this module rolls them up.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use thiserror::Error;
use time::macros::format_description;
use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::core::time::parse_datetime_flexible;
use crate::services::curriculum::{Curriculum, UnitPath};

pub(crate) const WEAK_THRESHOLD: f64 = 70.0;
pub(crate) const STRONG_MIN_QUESTIONS: i64 = 3;
pub(crate) const UNIT_LIST_CAP: usize = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum ReportError {
    #[error("Either year and month or startDate and endDate are required")]
    MissingWindow,
    #[error("startDate and endDate must be provided together")]
    IncompleteRange,
    #[error("Invalid year/month: {year}-{month}")]
    InvalidMonth { year: i32, month: u8 },
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("startDate must not be after endDate")]
    StartAfterEnd,
}

/// Inclusive `[start, end]` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReportWindow {
    pub(crate) start: OffsetDateTime,
    pub(crate) end: OffsetDateTime,
}

impl ReportWindow {
    /// Submission timestamps are stored as naive UTC.
    pub(crate) fn contains(&self, submitted_at: PrimitiveDateTime) -> bool {
        let at = submitted_at.assume_utc();
        self.start <= at && at <= self.end
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct WindowQuery<'a> {
    pub(crate) year: Option<i32>,
    pub(crate) month: Option<u8>,
    pub(crate) start_date: Option<&'a str>,
    pub(crate) end_date: Option<&'a str>,
}

fn last_instant_before(next: OffsetDateTime) -> OffsetDateTime {
    next - Duration::nanoseconds(1)
}

fn parse_bound(
    raw: &str,
    offset: UtcOffset,
    end_of_day: bool,
) -> Result<OffsetDateTime, ReportError> {
    let raw = raw.trim();
    if let Ok(date) = Date::parse(raw, format_description!("[year]-[month]-[day]")) {
        let start = PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_offset(offset);
        return Ok(if end_of_day { last_instant_before(start + Duration::days(1)) } else { start });
    }

    parse_datetime_flexible(raw).ok_or_else(|| ReportError::InvalidDate(raw.to_string()))
}

/// Explicit dates win over year/month when both are supplied.
pub(crate) fn resolve_window(
    query: &WindowQuery<'_>,
    offset: UtcOffset,
) -> Result<ReportWindow, ReportError> {
    let window = match (query.start_date, query.end_date) {
        (Some(start), Some(end)) => ReportWindow {
            start: parse_bound(start, offset, false)?,
            end: parse_bound(end, offset, true)?,
        },
        (Some(_), None) | (None, Some(_)) => return Err(ReportError::IncompleteRange),
        (None, None) => {
            let (Some(year), Some(month)) = (query.year, query.month) else {
                return Err(ReportError::MissingWindow);
            };
            let invalid = || ReportError::InvalidMonth { year, month };
            let month_value = Month::try_from(month).map_err(|_| invalid())?;
            let first = Date::from_calendar_date(year, month_value, 1).map_err(|_| invalid())?;
            let next = match month_value {
                Month::December => Date::from_calendar_date(year + 1, Month::January, 1),
                other => Date::from_calendar_date(year, other.next(), 1),
            }
            .map_err(|_| invalid())?;

            ReportWindow {
                start: PrimitiveDateTime::new(first, Time::MIDNIGHT).assume_offset(offset),
                end: last_instant_before(
                    PrimitiveDateTime::new(next, Time::MIDNIGHT).assume_offset(offset),
                ),
            }
        }
    };

    if window.start > window.end {
        return Err(ReportError::StartAfterEnd);
    }
    Ok(window)
}

#[derive(Debug, Clone)]
pub(crate) struct QuizAssignment {
    pub(crate) id: String,
    pub(crate) subject: String,
    pub(crate) main_unit: Option<String>,
    pub(crate) sub_unit: Option<String>,
    pub(crate) question_count: i32,
}

#[derive(Debug, Clone)]
pub(crate) struct QuizSubmission {
    pub(crate) assignment_id: String,
    pub(crate) student_id: String,
    pub(crate) correct_count: i32,
    pub(crate) submitted_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UnitStat {
    pub(crate) subject: String,
    pub(crate) main_unit: String,
    pub(crate) sub_unit: String,
    pub(crate) total_questions: i64,
    pub(crate) correct_questions: i64,
    pub(crate) accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReportSummary {
    pub(crate) total_questions: i64,
    pub(crate) total_correct: i64,
    pub(crate) total_wrong: i64,
    pub(crate) accuracy: f64,
    pub(crate) sub_unit_stats: Vec<UnitStat>,
    pub(crate) weak_units: Vec<UnitStat>,
    pub(crate) strong_units: Vec<UnitStat>,
    pub(crate) percentile: Option<f64>,
    pub(crate) peer_count: usize,
}

fn accuracy(correct: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64 * 100.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    questions: i64,
    correct: i64,
}

struct UnitGroup<'a> {
    path: UnitPath<'a>,
    totals: Totals,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

/// Pairs each in-window submission with its quiz; submissions for other assignments drop out.
fn in_window<'a>(
    submissions: &'a [QuizSubmission],
    assignments: &HashMap<&str, &'a QuizAssignment>,
    window: &ReportWindow,
) -> Vec<(&'a QuizSubmission, &'a QuizAssignment)> {
    submissions
        .iter()
        .filter(|submission| window.contains(submission.submitted_at))
        .filter_map(|submission| {
            assignments
                .get(submission.assignment_id.as_str())
                .map(|assignment| (submission, *assignment))
        })
        .collect()
}

pub(crate) fn summarize(
    curriculum: &Curriculum,
    student_id: &str,
    enrolled: &[String],
    assignments: &[QuizAssignment],
    submissions: &[QuizSubmission],
    window: &ReportWindow,
) -> ReportSummary {
    let by_id: HashMap<&str, &QuizAssignment> =
        assignments.iter().map(|assignment| (assignment.id.as_str(), assignment)).collect();

    let mut per_student: HashMap<&str, Totals> = HashMap::new();
    let mut groups: Vec<UnitGroup<'_>> = Vec::new();
    let mut group_index: HashMap<(&str, &str, &str), usize> = HashMap::new();

    for (submission, assignment) in in_window(submissions, &by_id, window) {
        let totals = per_student.entry(submission.student_id.as_str()).or_default();
        totals.questions += i64::from(assignment.question_count);
        totals.correct += i64::from(submission.correct_count);

        if submission.student_id != student_id {
            continue;
        }
        let (Some(main_unit), Some(sub_unit)) =
            (non_empty(&assignment.main_unit), non_empty(&assignment.sub_unit))
        else {
            continue;
        };
        let subject = assignment.subject.as_str();
        let index = *group_index.entry((subject, main_unit, sub_unit)).or_insert_with(|| {
            groups.push(UnitGroup {
                path: UnitPath { subject, main_unit, sub_unit },
                totals: Totals::default(),
            });
            groups.len() - 1
        });
        groups[index].totals.questions += i64::from(assignment.question_count);
        groups[index].totals.correct += i64::from(submission.correct_count);
    }

    groups.sort_by(|left, right| curriculum.compare(left.path, right.path));

    let raw_stats: Vec<(f64, UnitStat)> = groups
        .iter()
        .map(|group| {
            let raw = accuracy(group.totals.correct, group.totals.questions);
            let stat = UnitStat {
                subject: group.path.subject.to_string(),
                main_unit: group.path.main_unit.to_string(),
                sub_unit: group.path.sub_unit.to_string(),
                total_questions: group.totals.questions,
                correct_questions: group.totals.correct,
                accuracy: round2(raw),
            };
            (raw, stat)
        })
        .collect();

    let mut weak: Vec<&(f64, UnitStat)> =
        raw_stats.iter().filter(|(raw, _)| *raw < WEAK_THRESHOLD).collect();
    weak.sort_by(|left, right| left.0.total_cmp(&right.0));

    let mut strong: Vec<&(f64, UnitStat)> = raw_stats
        .iter()
        .filter(|(raw, stat)| {
            *raw >= WEAK_THRESHOLD && stat.total_questions >= STRONG_MIN_QUESTIONS
        })
        .collect();
    strong.sort_by(|left, right| right.0.total_cmp(&left.0));

    let own = per_student.get(student_id).copied().unwrap_or_default();
    let own_accuracy = accuracy(own.correct, own.questions);
    let (percentile, peer_count) = percentile_among_peers(own_accuracy, enrolled, &per_student);

    ReportSummary {
        total_questions: own.questions,
        total_correct: own.correct,
        total_wrong: own.questions - own.correct,
        accuracy: round2(own_accuracy),
        weak_units: weak.into_iter().take(UNIT_LIST_CAP).map(|(_, stat)| stat.clone()).collect(),
        strong_units: strong
            .into_iter()
            .take(UNIT_LIST_CAP)
            .map(|(_, stat)| stat.clone())
            .collect(),
        sub_unit_stats: raw_stats.into_iter().map(|(_, stat)| stat).collect(),
        percentile,
        peer_count,
    }
}

/// Share of the peer pool strictly ahead of `own_accuracy`. The pool is every enrolled
/// student with at least one in-window submission, the target included.
fn percentile_among_peers(
    own_accuracy: f64,
    enrolled: &[String],
    per_student: &HashMap<&str, Totals>,
) -> (Option<f64>, usize) {
    let roster: BTreeSet<&str> = enrolled.iter().map(String::as_str).collect();
    if roster.len() <= 1 {
        return (None, 0);
    }

    let pool: Vec<f64> = roster
        .iter()
        .filter_map(|id| per_student.get(id))
        .filter(|totals| totals.questions > 0)
        .map(|totals| accuracy(totals.correct, totals.questions))
        .collect();

    if pool.is_empty() {
        return (None, 0);
    }

    let ahead = pool.iter().filter(|peer| **peer > own_accuracy).count();
    (Some(round2(ahead as f64 / pool.len() as f64 * 100.0)), pool.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    fn window() -> ReportWindow {
        ReportWindow {
            start: datetime!(2025-03-01 00:00 UTC),
            end: datetime!(2025-03-31 23:59:59 UTC),
        }
    }

    fn quiz(id: &str, subject: &str, main: &str, sub: &str, questions: i32) -> QuizAssignment {
        QuizAssignment {
            id: id.to_string(),
            subject: subject.to_string(),
            main_unit: Some(main.to_string()),
            sub_unit: Some(sub.to_string()),
            question_count: questions,
        }
    }

    fn submission(assignment: &str, student: &str, correct: i32) -> QuizSubmission {
        QuizSubmission {
            assignment_id: assignment.to_string(),
            student_id: student.to_string(),
            correct_count: correct,
            submitted_at: datetime!(2025-03-10 12:00),
        }
    }

    fn roster(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn empty_report_has_zeroes_and_no_percentile() {
        let curriculum = Curriculum::standard();
        let summary = summarize(
            &curriculum,
            "s1",
            &roster(&["s1", "s2"]),
            &[quiz("a1", "중1-1", "소인수분해", "소인수분해", 10)],
            &[],
            &window(),
        );

        assert_eq!(summary.total_questions, 0);
        assert_eq!(summary.total_correct, 0);
        assert_eq!(summary.total_wrong, 0);
        assert_eq!(summary.accuracy, 0.0);
        assert!(summary.sub_unit_stats.is_empty());
        assert!(summary.weak_units.is_empty());
        assert!(summary.strong_units.is_empty());
        assert_eq!(summary.percentile, None);
    }

    #[test]
    fn totals_use_question_count_and_skip_out_of_window_submissions() {
        let curriculum = Curriculum::standard();
        let mut late = submission("a2", "s1", 5);
        late.submitted_at = datetime!(2025-04-01 00:00);

        let summary = summarize(
            &curriculum,
            "s1",
            &roster(&["s1"]),
            &[
                quiz("a1", "중1-1", "소인수분해", "소인수분해", 10),
                quiz("a2", "중1-1", "소인수분해", "소인수분해", 5),
            ],
            &[submission("a1", "s1", 7), late],
            &window(),
        );

        assert_eq!(summary.total_questions, 10);
        assert_eq!(summary.total_correct, 7);
        assert_eq!(summary.total_wrong, 3);
        assert_eq!(summary.sub_unit_stats.len(), 1);
        assert_eq!(summary.percentile, None);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let window = window();
        assert!(window.contains(datetime!(2025-03-01 00:00)));
        assert!(window.contains(datetime!(2025-03-31 23:59:59)));
        assert!(!window.contains(datetime!(2025-02-28 23:59:59)));
    }

    #[test]
    fn unit_stats_follow_curriculum_order() {
        let curriculum = Curriculum::standard();
        let summary = summarize(
            &curriculum,
            "s1",
            &roster(&["s1"]),
            &[
                quiz("a1", "중2-1", "일차함수", "일차함수와 그래프", 4),
                quiz("a2", "중1-1", "문자와 식", "일차방정식", 4),
            ],
            &[submission("a1", "s1", 4), submission("a2", "s1", 1)],
            &window(),
        );

        let subjects: Vec<_> =
            summary.sub_unit_stats.iter().map(|stat| stat.subject.as_str()).collect();
        assert_eq!(subjects, vec!["중1-1", "중2-1"]);
    }

    #[test]
    fn seventy_percent_is_strong_and_just_below_is_weak() {
        let curriculum = Curriculum::standard();
        let summary = summarize(
            &curriculum,
            "s1",
            &roster(&["s1"]),
            &[
                quiz("a1", "중1-1", "소인수분해", "소인수분해", 10),
                quiz("a2", "중1-1", "정수와 유리수", "정수와 유리수", 100_000),
            ],
            &[submission("a1", "s1", 7), submission("a2", "s1", 69_999)],
            &window(),
        );

        assert_eq!(summary.strong_units.len(), 1);
        assert_eq!(summary.strong_units[0].main_unit, "소인수분해");
        assert_eq!(summary.weak_units.len(), 1);
        assert_eq!(summary.weak_units[0].main_unit, "정수와 유리수");
        // rounded for display only
        assert_eq!(summary.weak_units[0].accuracy, 70.0);
    }

    #[test]
    fn strong_units_need_three_questions() {
        let curriculum = Curriculum::standard();
        let summary = summarize(
            &curriculum,
            "s1",
            &roster(&["s1"]),
            &[quiz("a1", "중1-1", "소인수분해", "소인수분해", 2)],
            &[submission("a1", "s1", 2)],
            &window(),
        );

        assert!(summary.strong_units.is_empty());
        assert!(summary.weak_units.is_empty());
        assert_eq!(summary.sub_unit_stats[0].accuracy, 100.0);
    }

    #[test]
    fn weak_units_are_sorted_ascending_and_capped() {
        let curriculum = Curriculum::standard();
        let units = [
            ("소인수분해", "소인수분해", 6),
            ("소인수분해", "최대공약수와 최소공배수", 1),
            ("정수와 유리수", "정수와 유리수", 5),
            ("정수와 유리수", "정수와 유리수의 계산", 2),
            ("문자와 식", "일차방정식", 4),
            ("좌표평면과 그래프", "정비례와 반비례", 3),
        ];
        let assignments: Vec<_> = units
            .iter()
            .enumerate()
            .map(|(idx, (main, sub, _))| quiz(&format!("a{idx}"), "중1-1", main, sub, 10))
            .collect();
        let submissions: Vec<_> = units
            .iter()
            .enumerate()
            .map(|(idx, (_, _, correct))| submission(&format!("a{idx}"), "s1", *correct))
            .collect();

        let summary =
            summarize(&curriculum, "s1", &roster(&["s1"]), &assignments, &submissions, &window());

        let accuracies: Vec<_> = summary.weak_units.iter().map(|stat| stat.accuracy).collect();
        assert_eq!(accuracies, vec![10.0, 20.0, 30.0, 40.0, 50.0]);
    }

    #[test]
    fn clinic_style_rows_without_units_count_in_totals_only() {
        let curriculum = Curriculum::standard();
        let mut unlabeled = quiz("a1", "중1-1", "", "", 10);
        unlabeled.sub_unit = None;

        let summary = summarize(
            &curriculum,
            "s1",
            &roster(&["s1"]),
            &[unlabeled],
            &[submission("a1", "s1", 3)],
            &window(),
        );

        assert_eq!(summary.total_questions, 10);
        assert!(summary.sub_unit_stats.is_empty());
    }

    #[test]
    fn percentile_counts_target_in_pool() {
        let curriculum = Curriculum::standard();
        let summary = summarize(
            &curriculum,
            "s2",
            &roster(&["s1", "s2", "s3", "s4"]),
            &[quiz("a1", "중1-1", "소인수분해", "소인수분해", 10)],
            &[submission("a1", "s1", 9), submission("a1", "s2", 8), submission("a1", "s3", 7)],
            &window(),
        );

        // s4 has nothing in the window and stays out of the pool
        assert_eq!(summary.peer_count, 3);
        assert_eq!(summary.percentile, Some(33.33));
    }

    #[test]
    fn top_student_has_zero_percentile() {
        let curriculum = Curriculum::standard();
        let summary = summarize(
            &curriculum,
            "s1",
            &roster(&["s1", "s2"]),
            &[quiz("a1", "중1-1", "소인수분해", "소인수분해", 10)],
            &[submission("a1", "s1", 9), submission("a1", "s2", 8)],
            &window(),
        );

        assert_eq!(summary.percentile, Some(0.0));
    }

    #[test]
    fn month_window_uses_report_offset() {
        let window = resolve_window(
            &WindowQuery { year: Some(2025), month: Some(2), ..Default::default() },
            offset!(+9),
        )
        .expect("window");

        assert_eq!(window.start, datetime!(2025-02-01 00:00 +9));
        assert_eq!(window.end, datetime!(2025-03-01 00:00 +9) - Duration::nanoseconds(1));
    }

    #[test]
    fn december_rolls_into_next_year() {
        let window = resolve_window(
            &WindowQuery { year: Some(2024), month: Some(12), ..Default::default() },
            UtcOffset::UTC,
        )
        .expect("window");
        assert_eq!(window.end, datetime!(2025-01-01 00:00 UTC) - Duration::nanoseconds(1));
    }

    #[test]
    fn date_range_covers_whole_days() {
        let window = resolve_window(
            &WindowQuery {
                start_date: Some("2025-03-01"),
                end_date: Some("2025-03-01"),
                ..Default::default()
            },
            offset!(+9),
        )
        .expect("window");

        assert_eq!(window.start, datetime!(2025-03-01 00:00 +9));
        assert_eq!(window.end, datetime!(2025-03-02 00:00 +9) - Duration::nanoseconds(1));
    }

    #[test]
    fn rfc3339_bounds_are_taken_verbatim() {
        let window = resolve_window(
            &WindowQuery {
                start_date: Some("2025-03-01T10:00:00Z"),
                end_date: Some("2025-03-02T10:00:00Z"),
                ..Default::default()
            },
            offset!(+9),
        )
        .expect("window");
        assert_eq!(window.start, datetime!(2025-03-01 10:00 UTC));
        assert_eq!(window.end, datetime!(2025-03-02 10:00 UTC));
    }

    #[test]
    fn invalid_windows_are_rejected() {
        let utc = UtcOffset::UTC;
        assert_eq!(resolve_window(&WindowQuery::default(), utc), Err(ReportError::MissingWindow));
        assert_eq!(
            resolve_window(&WindowQuery { year: Some(2025), ..Default::default() }, utc),
            Err(ReportError::MissingWindow)
        );
        assert_eq!(
            resolve_window(
                &WindowQuery { start_date: Some("2025-03-01"), ..Default::default() },
                utc
            ),
            Err(ReportError::IncompleteRange)
        );
        assert_eq!(
            resolve_window(
                &WindowQuery { year: Some(2025), month: Some(13), ..Default::default() },
                utc
            ),
            Err(ReportError::InvalidMonth { year: 2025, month: 13 })
        );
        assert_eq!(
            resolve_window(
                &WindowQuery {
                    start_date: Some("2025-03-02"),
                    end_date: Some("2025-03-01"),
                    ..Default::default()
                },
                utc
            ),
            Err(ReportError::StartAfterEnd)
        );
        assert!(matches!(
            resolve_window(
                &WindowQuery {
                    start_date: Some("march"),
                    end_date: Some("2025-03-01"),
                    ..Default::default()
                },
                utc
            ),
            Err(ReportError::InvalidDate(_))
        ));
    }
}
