use super::extract::embed_json;
use crate::models::Scalar;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use serde_json::Value;
use tracing::warn;

/// Per-field transform applied after extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalizer {
    Identity,
    /// Strips embedded NUL bytes, which Postgres refuses in text columns.
    TextClean,
    TimestampParse,
    JsonEmbed,
    /// Number of elements of a sequence.
    Count,
}

impl Normalizer {
    /// `field` only labels the data-quality warning for unparseable timestamps.
    pub fn apply(&self, value: Option<&Value>, field: &str) -> Scalar {
        let value = match value {
            None | Some(Value::Null) => return Scalar::Null,
            Some(value) => value,
        };

        match self {
            Normalizer::Identity => Scalar::from_json(value),
            Normalizer::TextClean => match value {
                Value::String(text) => clean_text(text).map_or(Scalar::Null, Scalar::Text),
                other => Scalar::from_json(other),
            },
            Normalizer::TimestampParse => match value {
                Value::String(text) if text.trim().is_empty() => Scalar::Null,
                Value::String(text) => match parse_timestamp(text) {
                    Some(ts) => Scalar::Timestamp(ts),
                    None => {
                        warn!(field = field, value = %text, "Unparseable timestamp stored as NULL");
                        Scalar::Null
                    }
                },
                other => {
                    warn!(field = field, value = %other, "Non-string timestamp stored as NULL");
                    Scalar::Null
                }
            },
            Normalizer::JsonEmbed => embed_json(value).map_or(Scalar::Null, Scalar::Json),
            Normalizer::Count => match value {
                Value::Array(items) => Scalar::Int(items.len() as i64),
                _ => Scalar::Null,
            },
        }
    }
}

/// Empty text is treated as missing; NUL bytes are dropped from everything else.
pub fn clean_text(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    Some(text.replace('\0', ""))
}

const OFFSET_FORMATS: &[&str] = &[
    // Twitter API: "Wed Aug 27 13:08:45 +0000 2008"
    "%a %b %d %H:%M:%S %z %Y",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%a %b %d %H:%M:%S %Y",
];

/// Parses the date-time shapes seen in collected data into a naive wall-clock
/// value truncated to whole seconds. A UTC offset, when present, is dropped
/// without converting the clock time.
pub fn parse_timestamp(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let parsed = DateTime::parse_from_rfc3339(input)
        .or_else(|_| DateTime::parse_from_rfc2822(input))
        .map(|dt| dt.naive_local())
        .ok()
        .or_else(|| {
            OFFSET_FORMATS
                .iter()
                .find_map(|fmt| DateTime::parse_from_str(input, fmt).ok())
                .map(|dt| dt.naive_local())
        })
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    parsed.with_nanosecond(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TIMESTAMP_FORMAT;
    use serde_json::json;

    fn canonical(input: &str) -> Option<String> {
        parse_timestamp(input).map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
    }

    #[test]
    fn parses_twitter_created_at() {
        assert_eq!(
            canonical("Wed Aug 27 13:08:45 +0000 2008").as_deref(),
            Some("2008-08-27 13:08:45")
        );
    }

    #[test]
    fn parses_collector_utc_timestamps() {
        assert_eq!(
            canonical("2017-08-18 12:34:56.789012").as_deref(),
            Some("2017-08-18 12:34:56")
        );
        assert_eq!(
            canonical("2020-01-01 00:00:00").as_deref(),
            Some("2020-01-01 00:00:00")
        );
        assert_eq!(
            canonical("2020-01-01T08:30:00Z").as_deref(),
            Some("2020-01-01 08:30:00")
        );
        assert_eq!(canonical("2020-01-01").as_deref(), Some("2020-01-01 00:00:00"));
    }

    #[test]
    fn keeps_wall_clock_of_offset_inputs() {
        assert_eq!(
            canonical("2020-01-01T08:30:00+05:00").as_deref(),
            Some("2020-01-01 08:30:00")
        );
        assert_eq!(
            canonical("Tue, 1 Jul 2003 10:52:37 +0200").as_deref(),
            Some("2003-07-01 10:52:37")
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(parse_timestamp("   "), None);
    }

    #[test]
    fn text_clean_strips_nul_and_drops_empty() {
        let n = Normalizer::TextClean;
        assert_eq!(n.apply(Some(&json!("hi\u{0}")), "text"), Scalar::Text("hi".into()));
        assert_eq!(n.apply(Some(&json!("")), "text"), Scalar::Null);
        assert_eq!(n.apply(Some(&json!(null)), "text"), Scalar::Null);
        assert_eq!(n.apply(None, "text"), Scalar::Null);
        assert_eq!(n.apply(Some(&json!(5)), "text"), Scalar::Int(5));
    }

    #[test]
    fn timestamp_parse_never_fails() {
        let n = Normalizer::TimestampParse;
        assert_eq!(n.apply(Some(&json!("")), "createdAt"), Scalar::Null);
        assert_eq!(n.apply(None, "createdAt"), Scalar::Null);
        assert_eq!(n.apply(Some(&json!("yesterday-ish")), "createdAt"), Scalar::Null);
        assert_eq!(n.apply(Some(&json!(1234)), "createdAt"), Scalar::Null);
        assert_eq!(
            n.apply(Some(&json!("Wed Aug 27 13:08:45 +0000 2008")), "createdAt")
                .to_string(),
            "2008-08-27 13:08:45"
        );
    }

    #[test]
    fn json_embed_and_count() {
        let value = json!({"coordinates": [1, 2]});
        assert_eq!(
            Normalizer::JsonEmbed.apply(Some(&value), "coordinates"),
            Scalar::Json(r#"{"coordinates":[1,2]}"#.into())
        );
        assert_eq!(Normalizer::JsonEmbed.apply(Some(&json!(null)), "place"), Scalar::Null);

        let record = json!({"place": {"name": "Köln", "bbox": [1.5, null]}});
        let embedded = Normalizer::JsonEmbed.apply(record.get("place"), "place");
        assert_eq!(
            Some(embedded.to_string()),
            crate::processor::extract::extract_json(&record, "place")
        );
        assert_eq!(
            Normalizer::Count.apply(Some(&json!([1, 2, 3])), "followers"),
            Scalar::Int(3)
        );
        assert_eq!(Normalizer::Count.apply(Some(&json!({})), "followers"), Scalar::Null);
    }
}
