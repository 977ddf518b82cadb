//! Canonical curriculum ordering used to sort per-unit report rows.

use std::cmp::Ordering;
use std::sync::Arc;

type SubUnits = &'static [&'static str];
type MainUnits = &'static [(&'static str, SubUnits)];

const STANDARD_TRACKS: &[(&str, MainUnits)] = &[
    (
        "중1-1",
        &[
            ("소인수분해", &["소인수분해", "최대공약수와 최소공배수"]),
            ("정수와 유리수", &["정수와 유리수", "정수와 유리수의 계산"]),
            ("문자와 식", &["문자의 사용과 식의 계산", "일차방정식"]),
            ("좌표평면과 그래프", &["좌표와 그래프", "정비례와 반비례"]),
        ],
    ),
    (
        "중1-2",
        &[
            ("기본 도형", &["기본 도형", "위치 관계", "작도와 합동"]),
            ("평면도형", &["다각형", "원과 부채꼴"]),
            ("입체도형", &["다면체와 회전체", "입체도형의 겉넓이와 부피"]),
            ("통계", &["대푯값", "도수분포와 그래프", "상대도수"]),
        ],
    ),
    (
        "중2-1",
        &[
            ("수와 식의 계산", &["유리수와 순환소수", "식의 계산"]),
            ("부등식과 연립방정식", &["일차부등식", "연립일차방정식"]),
            ("일차함수", &["일차함수와 그래프", "일차함수와 일차방정식의 관계"]),
        ],
    ),
    (
        "중2-2",
        &[
            ("도형의 성질", &["삼각형의 성질", "사각형의 성질"]),
            (
                "도형의 닮음과 피타고라스 정리",
                &["도형의 닮음", "평행선과 선분의 길이의 비", "피타고라스 정리"],
            ),
            ("확률", &["경우의 수", "확률"]),
        ],
    ),
    (
        "중3-1",
        &[
            ("실수와 그 계산", &["제곱근과 실수", "근호를 포함한 식의 계산"]),
            ("다항식의 곱셈과 인수분해", &["다항식의 곱셈", "인수분해"]),
            ("이차방정식", &["이차방정식의 풀이", "이차방정식의 활용"]),
            ("이차함수", &["이차함수와 그래프"]),
        ],
    ),
    (
        "중3-2",
        &[
            ("삼각비", &["삼각비", "삼각비의 활용"]),
            ("원의 성질", &["원과 직선", "원주각"]),
            ("통계", &["대푯값과 산포도", "상관관계"]),
        ],
    ),
    (
        "공통수학1",
        &[
            ("다항식", &["다항식의 연산", "나머지정리", "인수분해"]),
            (
                "방정식과 부등식",
                &["복소수와 이차방정식", "이차방정식과 이차함수", "여러 가지 방정식과 부등식"],
            ),
            ("경우의 수", &["합의 법칙과 곱의 법칙", "순열과 조합"]),
            ("행렬", &["행렬과 그 연산"]),
        ],
    ),
    (
        "공통수학2",
        &[
            ("도형의 방정식", &["평면좌표", "직선의 방정식", "원의 방정식", "도형의 이동"]),
            ("집합과 명제", &["집합", "명제"]),
            ("함수와 그래프", &["함수", "유리함수와 무리함수"]),
        ],
    ),
];

/// Position of a unit inside the curriculum. Unknown levels rank after every known one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct UnitRank {
    subject: usize,
    main_unit: usize,
    sub_unit: usize,
}

impl UnitRank {
    const UNKNOWN: usize = usize::MAX;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct UnitPath<'a> {
    pub(crate) subject: &'a str,
    pub(crate) main_unit: &'a str,
    pub(crate) sub_unit: &'a str,
}

#[derive(Debug)]
struct MainUnit {
    name: &'static str,
    sub_units: Vec<&'static str>,
}

#[derive(Debug)]
struct SubjectTrack {
    name: &'static str,
    main_units: Vec<MainUnit>,
}

/// Immutable subject → main unit → sub unit sequences, built once at startup.
#[derive(Debug)]
pub(crate) struct Curriculum {
    tracks: Vec<SubjectTrack>,
}

impl Curriculum {
    pub(crate) fn standard() -> Arc<Self> {
        let tracks = STANDARD_TRACKS
            .iter()
            .map(|(subject, main_units)| SubjectTrack {
                name: *subject,
                main_units: main_units
                    .iter()
                    .map(|(name, sub_units)| MainUnit { name: *name, sub_units: sub_units.to_vec() })
                    .collect(),
            })
            .collect();

        Arc::new(Self { tracks })
    }

    pub(crate) fn subjects(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tracks.iter().map(|track| track.name)
    }

    pub(crate) fn is_known_subject(&self, subject: &str) -> bool {
        self.tracks.iter().any(|track| track.name == subject)
    }

    pub(crate) fn rank(&self, path: UnitPath<'_>) -> UnitRank {
        let mut rank = UnitRank {
            subject: UnitRank::UNKNOWN,
            main_unit: UnitRank::UNKNOWN,
            sub_unit: UnitRank::UNKNOWN,
        };

        let Some((subject_idx, track)) =
            self.tracks.iter().enumerate().find(|(_, track)| track.name == path.subject)
        else {
            return rank;
        };
        rank.subject = subject_idx;

        let Some((main_idx, main_unit)) =
            track.main_units.iter().enumerate().find(|(_, unit)| unit.name == path.main_unit)
        else {
            return rank;
        };
        rank.main_unit = main_idx;

        if let Some(sub_idx) = main_unit.sub_units.iter().position(|sub| *sub == path.sub_unit) {
            rank.sub_unit = sub_idx;
        }
        rank
    }

    /// Canonical display order; ties (including two unknown entries) fall back to the labels.
    pub(crate) fn compare(&self, left: UnitPath<'_>, right: UnitPath<'_>) -> Ordering {
        self.rank(left)
            .cmp(&self.rank(right))
            .then_with(|| left.subject.cmp(right.subject))
            .then_with(|| left.main_unit.cmp(right.main_unit))
            .then_with(|| left.sub_unit.cmp(right.sub_unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path<'a>(subject: &'a str, main_unit: &'a str, sub_unit: &'a str) -> UnitPath<'a> {
        UnitPath { subject, main_unit, sub_unit }
    }

    #[test]
    fn earlier_grade_sorts_first() {
        let curriculum = Curriculum::standard();
        let mut units = vec![
            path("중2-1", "일차함수", "일차함수와 그래프"),
            path("중1-1", "문자와 식", "일차방정식"),
        ];
        units.sort_by(|a, b| curriculum.compare(*a, *b));
        assert_eq!(units[0].subject, "중1-1");
        assert_eq!(units[1].subject, "중2-1");
    }

    #[test]
    fn units_follow_textbook_order_within_a_subject() {
        let curriculum = Curriculum::standard();
        let mut units = vec![
            path("중1-1", "좌표평면과 그래프", "정비례와 반비례"),
            path("중1-1", "소인수분해", "최대공약수와 최소공배수"),
            path("중1-1", "소인수분해", "소인수분해"),
        ];
        units.sort_by(|a, b| curriculum.compare(*a, *b));
        assert_eq!(
            units.iter().map(|unit| unit.sub_unit).collect::<Vec<_>>(),
            vec!["소인수분해", "최대공약수와 최소공배수", "정비례와 반비례"]
        );
    }

    #[test]
    fn unknown_entries_sort_last_and_lexicographically() {
        let curriculum = Curriculum::standard();
        let mut units = vec![
            path("심화", "b", "x"),
            path("심화", "a", "x"),
            path("중3-2", "원의 성질", "원주각"),
            path("중3-2", "원의 성질", "없는 소단원"),
        ];
        units.sort_by(|a, b| curriculum.compare(*a, *b));
        assert_eq!(units[0].sub_unit, "원주각");
        assert_eq!(units[1].sub_unit, "없는 소단원");
        assert_eq!(units[2].main_unit, "a");
        assert_eq!(units[3].main_unit, "b");
    }

    #[test]
    fn knows_its_subjects() {
        let curriculum = Curriculum::standard();
        assert!(curriculum.is_known_subject("중3-1"));
        assert!(!curriculum.is_known_subject("중4-1"));
        assert_eq!(curriculum.subjects().next(), Some("중1-1"));
    }
}
