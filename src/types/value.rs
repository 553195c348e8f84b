//! Typed cell values.
//!
//! Every cell returned by the execution runner (or loaded from a test case
//! fixture) carries an explicit type tag. Comparison rules dispatch on this
//! tag instead of inspecting values at runtime.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Date/time payload of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Temporal {
    /// Calendar date without time-of-day (`date`)
    Date(NaiveDate),
    /// Date with time-of-day, normalized to UTC (`timestamp`, `timestamptz`)
    DateTime(NaiveDateTime),
    /// Time-of-day without a date (`time`)
    Time(NaiveTime),
}

impl Temporal {
    /// Parse an ISO-8601 date, datetime or time string.
    ///
    /// Accepts `2022-05-29`, `2022-05-29 10:15:00`, `2022-05-29T10:15:00`,
    /// RFC 3339 with offset (converted to UTC), and `10:15:00`.
    ///
    /// # Returns
    ///
    /// `None` if the text is not a recognizable date/time
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();

        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return Some(Self::Date(date));
        }
        for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
            if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
                return Some(Self::DateTime(datetime));
            }
        }
        if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
            return Some(Self::DateTime(datetime.naive_utc()));
        }
        if let Ok(datetime) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z") {
            return Some(Self::DateTime(datetime.naive_utc()));
        }
        if let Ok(time) = NaiveTime::parse_from_str(text, "%H:%M:%S%.f") {
            return Some(Self::Time(time));
        }

        None
    }

    /// Whether this value has a calendar date but no time-of-day.
    pub fn is_date_only(&self) -> bool {
        matches!(self, Self::Date(_))
    }

    /// Canonical ISO rendering.
    ///
    /// # Arguments
    ///
    /// * `date_precision` - Drop time-of-day from datetimes
    pub fn canonical(&self, date_precision: bool) -> String {
        match self {
            Self::Date(date) => date.format("%Y-%m-%d").to_string(),
            Self::DateTime(datetime) if date_precision => {
                datetime.date().format("%Y-%m-%d").to_string()
            }
            Self::DateTime(datetime) => datetime.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
            Self::Time(time) => time.format("%H:%M:%S%.f").to_string(),
        }
    }
}

impl fmt::Display for Temporal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(date) => write!(f, "{}", date),
            Self::DateTime(datetime) => write!(f, "{}", datetime),
            Self::Time(time) => write!(f, "{}", time),
        }
    }
}

/// A single result-set cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// `int2`, `int4`, `int8`, `oid`
    Integer(i64),
    /// `float4`, `float8`, `numeric`
    Float(f64),
    /// Character types and anything rendered as text (json, uuid)
    Text(String),
    /// `bool`
    Boolean(bool),
    /// `date`, `timestamp`, `timestamptz`, `time`
    Timestamp(Temporal),
    /// SQL NULL
    Null,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{}", v),
            Self::Boolean(v) => write!(f, "{}", v),
            Self::Timestamp(v) => write!(f, "{}", v),
            Self::Null => write!(f, "NULL"),
        }
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for CellValue {
    fn from(v: i32) -> Self {
        Self::Integer(v.into())
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for CellValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Temporal> for CellValue {
    fn from(v: Temporal) -> Self {
        Self::Timestamp(v)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

// Serialized as plain scalars so reports and fixtures stay readable.
impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Integer(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Text(v) => serializer.serialize_str(v),
            Self::Boolean(v) => serializer.serialize_bool(*v),
            Self::Timestamp(v) => serializer.serialize_str(&v.canonical(false)),
            Self::Null => serializer.serialize_none(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCell {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match Option::<RawCell>::deserialize(deserializer)? {
            None => Self::Null,
            Some(RawCell::Bool(v)) => Self::Boolean(v),
            Some(RawCell::Integer(v)) => Self::Integer(v),
            Some(RawCell::Float(v)) => Self::Float(v),
            Some(RawCell::Text(v)) => Self::Text(v),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporal_parse() {
        let date = NaiveDate::from_ymd_opt(2022, 5, 29).unwrap();

        assert_eq!(Temporal::parse("2022-05-29"), Some(Temporal::Date(date)));
        assert_eq!(
            Temporal::parse("2022-05-29 10:15:00"),
            Some(Temporal::DateTime(date.and_hms_opt(10, 15, 0).unwrap()))
        );
        assert_eq!(
            Temporal::parse("2022-05-29T12:15:00+02:00"),
            Some(Temporal::DateTime(date.and_hms_opt(10, 15, 0).unwrap()))
        );
        assert_eq!(
            Temporal::parse("10:15:00"),
            Some(Temporal::Time(NaiveTime::from_hms_opt(10, 15, 0).unwrap()))
        );
        assert_eq!(Temporal::parse("Camacho-Lamb"), None);
        assert_eq!(Temporal::parse("37"), None);
    }

    #[test]
    fn test_temporal_canonical() {
        let datetime = NaiveDate::from_ymd_opt(2022, 5, 29)
            .unwrap()
            .and_hms_opt(23, 59, 1)
            .unwrap();
        let temporal = Temporal::DateTime(datetime);

        assert_eq!(temporal.canonical(true), "2022-05-29");
        assert_eq!(temporal.canonical(false), "2022-05-29T23:59:01");
    }

    #[test]
    fn test_cell_deserialize_scalars() {
        let cells: Vec<CellValue> =
            serde_yaml::from_str("[null, true, 3, 37.5, 'Hart Group', '2022-05-29']").unwrap();

        assert_eq!(
            cells,
            vec![
                CellValue::Null,
                CellValue::Boolean(true),
                CellValue::Integer(3),
                CellValue::Float(37.5),
                CellValue::Text("Hart Group".into()),
                CellValue::Text("2022-05-29".into()),
            ]
        );
    }

    #[test]
    fn test_cell_serialize_scalars() {
        let date = NaiveDate::from_ymd_opt(2022, 5, 29).unwrap();
        let row = vec![
            CellValue::Null,
            CellValue::Integer(1),
            CellValue::Timestamp(Temporal::Date(date)),
        ];

        assert_eq!(serde_json::to_string(&row).unwrap(), r#"[null,1,"2022-05-29"]"#);
    }

    #[test]
    fn test_option_into_cell() {
        assert_eq!(CellValue::from(None::<i64>), CellValue::Null);
        assert_eq!(CellValue::from(Some("Doe")), CellValue::Text("Doe".into()));
    }
}
