//! Coercion of raw criteria values into typed values.
//!
//! Criteria values are untyped JSON. The target attribute's declared type
//! decides how a value is read. Coercion fails softly: a value that does not
//! parse is passed through as-is, converted loosely.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use sieve_proto::{Comparator, Condition, Value};
use tracing::debug;

use crate::catalog::{FieldType, ScalarType};
use crate::config::{DateTimeSettings, LEGACY_DATE_TIME};
use crate::error::Error;

/// How a value is being used, for type-specific coercion rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoercionContext {
    pub trim: bool,
    pub upper: bool,
    pub comparator: Comparator,
    /// Position of the value in its condition's value list.
    pub index: usize,
}

impl CoercionContext {
    /// Default normalization for a comparator.
    pub fn new(comparator: Comparator) -> Self {
        Self {
            trim: true,
            upper: true,
            comparator,
            index: 0,
        }
    }

    /// Normalization taken from a condition, for the value at `index`.
    pub fn for_condition(condition: &Condition, index: usize) -> Self {
        Self {
            trim: condition.trim,
            upper: condition.upper,
            comparator: condition.comparator,
            index,
        }
    }

    /// No string normalization at all.
    pub fn verbatim(comparator: Comparator) -> Self {
        Self {
            trim: false,
            upper: false,
            comparator,
            index: 0,
        }
    }
}

/// Converts raw values to the semantic type of their target attribute.
pub struct ValueCoercer<'a> {
    settings: &'a DateTimeSettings,
}

impl<'a> ValueCoercer<'a> {
    pub fn new(settings: &'a DateTimeSettings) -> Self {
        Self { settings }
    }

    /// Coerce, falling back to the raw value on failure.
    pub fn coerce(
        &self,
        raw: &serde_json::Value,
        target: &FieldType,
        ctx: &CoercionContext,
    ) -> Value {
        match self.try_coerce(raw, target, ctx) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "Passing value through uncoerced");
                Value::from(raw)
            }
        }
    }

    /// Coerce, reporting values that do not parse as the target type.
    pub fn try_coerce(
        &self,
        raw: &serde_json::Value,
        target: &FieldType,
        ctx: &CoercionContext,
    ) -> Result<Value, Error> {
        let text = match raw {
            serde_json::Value::Null => return Ok(Value::Null),
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            other => return Err(unsupported(&other.to_string(), target)),
        };

        let coerced = match target {
            FieldType::Scalar(scalar) => self.coerce_scalar(&text, *scalar, ctx),
            FieldType::Enum { variants, .. } => {
                let name = text.trim();
                variants
                    .iter()
                    .find(|v| v.as_str() == name)
                    .map(|v| Value::String(v.clone()))
            }
            FieldType::Embedded { .. }
            | FieldType::CompositeKey { .. }
            | FieldType::Relation { .. } => None,
        };

        coerced.ok_or_else(|| unsupported(&text, target))
    }

    /// Apply string normalization.
    pub fn normalize(&self, text: &str, ctx: &CoercionContext) -> String {
        let text = if ctx.trim { text.trim() } else { text };
        if ctx.upper {
            text.to_uppercase()
        } else {
            text.to_string()
        }
    }

    fn coerce_scalar(&self, text: &str, scalar: ScalarType, ctx: &CoercionContext) -> Option<Value> {
        let trimmed = text.trim();
        match scalar {
            ScalarType::Bool => parse_bool(trimmed).map(Value::Bool),
            ScalarType::Int16 => trimmed.parse::<i16>().ok().map(|i| Value::Int(i as i64)),
            ScalarType::Int32 => trimmed.parse::<i32>().ok().map(|i| Value::Int(i as i64)),
            ScalarType::Int64 => trimmed.parse::<i64>().ok().map(Value::Int),
            ScalarType::Float32 => trimmed.parse::<f32>().ok().map(|f| Value::Float(f as f64)),
            ScalarType::Float64 => trimmed.parse::<f64>().ok().map(Value::Float),
            ScalarType::Decimal => parse_decimal(trimmed).map(Value::Decimal),
            ScalarType::String | ScalarType::Char => Some(Value::String(self.normalize(text, ctx))),
            ScalarType::Timestamp => self.parse_timestamp(trimmed, ctx).map(Value::Timestamp),
            ScalarType::Instant => parse_epoch_millis(trimmed)
                .or_else(|| parse_rfc3339(trimmed))
                .map(Value::Timestamp),
            ScalarType::OffsetDateTime => parse_rfc3339(trimmed).map(Value::Timestamp),
            ScalarType::LocalDate => self.parse_local_date(trimmed).map(Value::Date),
            ScalarType::LocalDateTime => self.parse_local_date_time(trimmed).map(Value::DateTime),
        }
    }

    /// Legacy timestamps accept every representation, in this order: epoch
    /// milliseconds, RFC 3339, local date-time patterns, local date patterns,
    /// then the legacy pattern. Zone-less values use the configured offset.
    fn parse_timestamp(&self, text: &str, ctx: &CoercionContext) -> Option<DateTime<Utc>> {
        if let Some(instant) = parse_epoch_millis(text).or_else(|| parse_rfc3339(text)) {
            return Some(instant);
        }

        let offset = self.settings.offset();
        if let Some(local) = self.parse_local_date_time(text) {
            return at_offset(&offset, local);
        }

        if let Some(date) = self.parse_local_date(text) {
            let upper_bound = ctx.comparator == Comparator::Between
                && ctx.index == 1
                && self.settings.end_of_day_on_between_upper_bound;
            let time = if upper_bound { end_of_day() } else { NaiveTime::MIN };
            return at_offset(&offset, date.and_time(time));
        }

        NaiveDateTime::parse_from_str(text, LEGACY_DATE_TIME)
            .ok()
            .and_then(|local| at_offset(&offset, local))
    }

    fn parse_local_date(&self, text: &str) -> Option<NaiveDate> {
        self.settings
            .local_date_patterns
            .iter()
            .find_map(|pattern| NaiveDate::parse_from_str(text, pattern).ok())
    }

    fn parse_local_date_time(&self, text: &str) -> Option<NaiveDateTime> {
        self.settings
            .local_date_time_patterns
            .iter()
            .find_map(|pattern| NaiveDateTime::parse_from_str(text, pattern).ok())
    }
}

fn unsupported(value: &str, target: &FieldType) -> Error {
    Error::UnsupportedCoercion {
        value: value.to_string(),
        target: target.to_string(),
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") || text == "1" {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") || text == "0" {
        Some(false)
    } else {
        None
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

fn parse_epoch_millis(text: &str) -> Option<DateTime<Utc>> {
    text.parse::<i64>()
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}

fn parse_rfc3339(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn at_offset(offset: &FixedOffset, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Last representable instant of a day.
pub(crate) fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn coercer(settings: &DateTimeSettings) -> ValueCoercer<'_> {
        ValueCoercer::new(settings)
    }

    fn scalar(s: ScalarType) -> FieldType {
        FieldType::scalar(s)
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> Value {
        Value::Timestamp(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(h, min, s)
                .unwrap()
                .and_utc(),
        )
    }

    #[test]
    fn test_numbers_and_booleans() {
        let settings = DateTimeSettings::default();
        let c = coercer(&settings);
        let ctx = CoercionContext::new(Comparator::Eq);

        assert_eq!(c.coerce(&json!("42"), &scalar(ScalarType::Int64), &ctx), Value::Int(42));
        assert_eq!(c.coerce(&json!(42), &scalar(ScalarType::Int32), &ctx), Value::Int(42));
        assert_eq!(c.coerce(&json!(" 7 "), &scalar(ScalarType::Int16), &ctx), Value::Int(7));
        assert_eq!(
            c.coerce(&json!("2.5"), &scalar(ScalarType::Float64), &ctx),
            Value::Float(2.5)
        );
        assert_eq!(
            c.coerce(&json!("100.50"), &scalar(ScalarType::Decimal), &ctx),
            Value::Decimal(Decimal::from_str("100.50").unwrap())
        );
        assert_eq!(
            c.coerce(&json!("1e3"), &scalar(ScalarType::Decimal), &ctx),
            Value::Decimal(Decimal::from(1000))
        );
        assert_eq!(c.coerce(&json!("TRUE"), &scalar(ScalarType::Bool), &ctx), Value::Bool(true));
        assert_eq!(c.coerce(&json!(false), &scalar(ScalarType::Bool), &ctx), Value::Bool(false));
    }

    #[test]
    fn test_out_of_range_integer_passes_through() {
        let settings = DateTimeSettings::default();
        let c = coercer(&settings);
        let ctx = CoercionContext::new(Comparator::Eq);

        assert!(matches!(
            c.try_coerce(&json!(70000), &scalar(ScalarType::Int16), &ctx),
            Err(Error::UnsupportedCoercion { .. })
        ));
        assert_eq!(
            c.coerce(&json!(70000), &scalar(ScalarType::Int16), &ctx),
            Value::Int(70000)
        );
        assert_eq!(
            c.coerce(&json!("abc"), &scalar(ScalarType::Int64), &ctx),
            Value::String("abc".into())
        );
    }

    #[test]
    fn test_string_normalization() {
        let settings = DateTimeSettings::default();
        let c = coercer(&settings);
        let target = scalar(ScalarType::String);

        assert_eq!(
            c.coerce(&json!("  acme "), &target, &CoercionContext::new(Comparator::Eq)),
            Value::String("ACME".into())
        );

        let cond = Condition::eq("x").with_upper(false);
        assert_eq!(
            c.coerce(&json!("  acme "), &target, &CoercionContext::for_condition(&cond, 0)),
            Value::String("acme".into())
        );
        assert_eq!(
            c.coerce(&json!(" acme "), &target, &CoercionContext::verbatim(Comparator::Eq)),
            Value::String(" acme ".into())
        );
    }

    #[test]
    fn test_enum_by_trimmed_name() {
        let settings = DateTimeSettings::default();
        let c = coercer(&settings);
        let status = FieldType::enumeration("Status", vec!["OPEN".into(), "PAID".into()]);
        let ctx = CoercionContext::new(Comparator::Eq);

        assert_eq!(c.coerce(&json!(" PAID "), &status, &ctx), Value::String("PAID".into()));
        assert!(c.try_coerce(&json!("paid"), &status, &ctx).is_err());
    }

    #[test]
    fn test_timestamp_strategies() {
        let settings = DateTimeSettings::default();
        let c = coercer(&settings);
        let target = scalar(ScalarType::Timestamp);
        let ctx = CoercionContext::new(Comparator::Eq);

        assert_eq!(
            c.coerce(&json!(1_704_067_200_000i64), &target, &ctx),
            utc(2024, 1, 1, 0, 0, 0)
        );
        assert_eq!(
            c.coerce(&json!("2024-01-01T10:00:00+02:00"), &target, &ctx),
            utc(2024, 1, 1, 8, 0, 0)
        );
        assert_eq!(
            c.coerce(&json!("2024-01-01T10:00:00"), &target, &ctx),
            utc(2024, 1, 1, 10, 0, 0)
        );
        assert_eq!(
            c.coerce(&json!("05/03/2024 08:15:00"), &target, &ctx),
            utc(2024, 3, 5, 8, 15, 0)
        );
        assert_eq!(c.coerce(&json!("2024-03-05"), &target, &ctx), utc(2024, 3, 5, 0, 0, 0));
        assert_eq!(c.coerce(&json!("05/03/2024"), &target, &ctx), utc(2024, 3, 5, 0, 0, 0));
    }

    #[test]
    fn test_between_upper_bound_moves_to_end_of_day() {
        let settings = DateTimeSettings::default();
        let c = coercer(&settings);
        let target = scalar(ScalarType::Timestamp);
        let cond = Condition::between("2024-03-01", "2024-03-05");

        let low = c.coerce(&json!("2024-03-01"), &target, &CoercionContext::for_condition(&cond, 0));
        let high = c.coerce(&json!("2024-03-05"), &target, &CoercionContext::for_condition(&cond, 1));

        assert_eq!(low, utc(2024, 3, 1, 0, 0, 0));
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_time(end_of_day())
            .and_utc();
        assert_eq!(high, Value::Timestamp(expected));

        let disabled = DateTimeSettings::default().with_end_of_day_on_between_upper_bound(false);
        let high = coercer(&disabled).coerce(
            &json!("2024-03-05"),
            &target,
            &CoercionContext::for_condition(&cond, 1),
        );
        assert_eq!(high, utc(2024, 3, 5, 0, 0, 0));
    }

    #[test]
    fn test_zone_less_values_use_configured_offset() {
        let settings =
            DateTimeSettings::default().with_offset(FixedOffset::east_opt(3 * 3600).unwrap());
        let c = coercer(&settings);
        let ctx = CoercionContext::new(Comparator::Eq);

        assert_eq!(
            c.coerce(&json!("2024-01-01T10:00:00"), &scalar(ScalarType::Timestamp), &ctx),
            utc(2024, 1, 1, 7, 0, 0)
        );
    }

    #[test]
    fn test_local_types_and_instants() {
        let settings = DateTimeSettings::default();
        let c = coercer(&settings);
        let ctx = CoercionContext::new(Comparator::Eq);

        assert_eq!(
            c.coerce(&json!("31/12/2023"), &scalar(ScalarType::LocalDate), &ctx),
            Value::Date(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap())
        );
        assert_eq!(
            c.coerce(&json!("2023-12-31 23:00:00"), &scalar(ScalarType::LocalDateTime), &ctx),
            Value::DateTime(
                NaiveDate::from_ymd_opt(2023, 12, 31)
                    .unwrap()
                    .and_hms_opt(23, 0, 0)
                    .unwrap()
            )
        );
        assert_eq!(
            c.coerce(&json!("0"), &scalar(ScalarType::Instant), &ctx),
            utc(1970, 1, 1, 0, 0, 0)
        );
        assert!(c
            .try_coerce(&json!("2024-01-01"), &scalar(ScalarType::OffsetDateTime), &ctx)
            .is_err());
    }

    #[test]
    fn test_round_trip() {
        let settings = DateTimeSettings::default();
        let c = coercer(&settings);
        let ctx = CoercionContext::new(Comparator::Eq);

        let cases = [
            (json!("42"), ScalarType::Int64),
            (json!("-3"), ScalarType::Int32),
            (json!("2.75"), ScalarType::Float64),
            (json!("0.1"), ScalarType::Float32),
            (json!("123.4500"), ScalarType::Decimal),
            (json!("true"), ScalarType::Bool),
            (json!("2024-02-29"), ScalarType::LocalDate),
            (json!("2024-02-29T13:45:10"), ScalarType::LocalDateTime),
            (json!("2024-02-29T13:45:10Z"), ScalarType::Timestamp),
            (json!("2024-02-29T13:45:10.250Z"), ScalarType::Instant),
        ];

        for (raw, scalar_type) in cases {
            let target = FieldType::scalar(scalar_type);
            let first = c.try_coerce(&raw, &target, &ctx).unwrap();
            let rendered = json!(first.to_string());
            let second = c.try_coerce(&rendered, &target, &ctx).unwrap();
            assert_eq!(first, second, "round trip of {raw} as {scalar_type:?}");
        }
    }

    #[test]
    fn test_structured_raw_values_are_unsupported() {
        let settings = DateTimeSettings::default();
        let c = coercer(&settings);
        let ctx = CoercionContext::new(Comparator::Eq);

        assert!(c
            .try_coerce(&json!([1, 2]), &scalar(ScalarType::Int64), &ctx)
            .is_err());
        assert_eq!(
            c.coerce(&json!(null), &scalar(ScalarType::Int64), &ctx),
            Value::Null
        );
        assert!(c
            .try_coerce(&json!("x"), &FieldType::to_one("Customer"), &ctx)
            .is_err());
    }
}
