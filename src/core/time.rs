use time::{
    format_description::well_known::Rfc3339, OffsetDateTime, PrimitiveDateTime, UtcOffset,
};

pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    to_primitive_utc(OffsetDateTime::now_utc())
}

pub(crate) fn to_primitive_utc(value: OffsetDateTime) -> PrimitiveDateTime {
    let utc = value.to_offset(UtcOffset::UTC);
    PrimitiveDateTime::new(utc.date(), utc.time())
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    value.assume_utc().format(&Rfc3339).unwrap_or_else(|_| value.assume_utc().to_string())
}

pub(crate) fn format_offset(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}

/// Parses RFC 3339, falling back to the zone-less `YYYY-MM-DDTHH:MM[:SS]` form that
/// browser `datetime-local` inputs send (read as UTC).
pub(crate) fn parse_datetime_flexible(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }

    let is_local_form = raw.as_bytes().get(10) == Some(&b'T');
    let candidate = match raw.len() {
        16 if is_local_form => format!("{raw}:00Z"),
        19 if is_local_form => format!("{raw}Z"),
        _ => return None,
    };
    OffsetDateTime::parse(&candidate, &Rfc3339).ok()
}

pub(crate) mod serde_flexible {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};
    use time::OffsetDateTime;

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_datetime_flexible(&raw)
            .ok_or_else(|| D::Error::custom(format!("invalid datetime: {raw}")))
    }

    pub(crate) mod option {
        use super::*;

        pub(crate) fn deserialize<'de, D>(
            deserializer: D,
        ) -> Result<Option<OffsetDateTime>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::super::parse_datetime_flexible(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid datetime: {raw}"))),
                None => Ok(None),
            }
        }
    }
}
