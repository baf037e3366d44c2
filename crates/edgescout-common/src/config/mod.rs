//! Shared configuration helpers.
//!
//! Intervals and timeouts in the agent's configuration accept either a bare
//! number of seconds or a duration string with units, so that `POLL_INTERVAL=90`
//! and `POLL_INTERVAL="1m 30s"` mean the same thing.

use fundu::{DurationParser, TimeUnit};
use serde::Deserializer;
use std::time::Duration;

/// Seconds are the default unit; ms, m and h are also accepted.
///
/// Multiple values are summed ("1m 30s" = 90 seconds). Fractions, exponents and
/// infinity are rejected.
const DURATION_PARSER: DurationParser<'static> = DurationParser::builder()
    .time_units(&[
        TimeUnit::MilliSecond,
        TimeUnit::Second,
        TimeUnit::Minute,
        TimeUnit::Hour,
    ])
    .parse_multiple(None)
    .allow_time_unit_delimiter()
    .disable_infinity()
    .disable_fraction()
    .disable_exponent()
    .default_unit(TimeUnit::Second)
    .build();

/// Parse a duration string such as `"90"`, `"90s"`, `"2m"` or `"1500ms"`
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    DURATION_PARSER
        .parse(value.trim())
        .map_err(|e| format!("invalid duration '{}': {}", value, e))?
        .try_into()
        .map_err(|e| format!("duration '{}' out of range: {}", value, e))
}

/// Serde adapter for `Duration` fields, for use with `deserialize_with`
///
/// Integers are seconds; strings go through [`parse_duration`].
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{Error, Visitor};

    struct DurationVisitor;

    impl<'de> Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a duration string or a number of seconds")
        }

        fn visit_str<E: Error>(self, value: &str) -> Result<Self::Value, E> {
            parse_duration(value).map_err(E::custom)
        }

        fn visit_u64<E: Error>(self, value: u64) -> Result<Self::Value, E> {
            Ok(Duration::from_secs(value))
        }

        fn visit_i64<E: Error>(self, value: i64) -> Result<Self::Value, E> {
            u64::try_from(value)
                .map(Duration::from_secs)
                .map_err(|_| E::custom("duration cannot be negative"))
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}
