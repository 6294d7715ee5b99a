//! Shot Duration Parsing
//!
//! Accepts `"5s"`, `"5.5 sec"`, `"1500ms"` and bare numbers (seconds).
//! Anything unparsable or non-positive counts as the default five seconds.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

/// Seconds assumed for a missing or unparsable duration
pub const DEFAULT_SHOT_SECONDS: f64 = 5.0;

/// Granularity of the duration written into technical specs
pub const TECHNICAL_STEP_SECONDS: u32 = 5;

fn duration_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*(ms|msec|millis|milliseconds?|s|secs?|seconds?)?\s*$")
                .ok()
        })
        .as_ref()
}

/// Parses a duration string into seconds
pub fn parse_duration(value: &str) -> f64 {
    let parsed = duration_pattern()
        .and_then(|pattern| pattern.captures(value))
        .and_then(|caps| {
            let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
            let is_millis = caps
                .get(2)
                .is_some_and(|unit| unit.as_str().to_ascii_lowercase().starts_with('m'));
            Some(if is_millis { amount / 1000.0 } else { amount })
        })
        .filter(|seconds| seconds.is_finite() && *seconds > 0.0);

    match parsed {
        Some(seconds) => seconds,
        None => {
            debug!("Unparsable duration '{}', using {}s", value, DEFAULT_SHOT_SECONDS);
            DEFAULT_SHOT_SECONDS
        }
    }
}

/// Sums durations, rounded to whole milliseconds
pub fn total_seconds<'a>(durations: impl IntoIterator<Item = &'a str>) -> f64 {
    let sum: f64 = durations.into_iter().map(parse_duration).sum();
    (sum * 1000.0).round() / 1000.0
}

/// Smallest multiple of five seconds not below `total`
pub fn round_up_to_step(total: f64) -> u32 {
    if !total.is_finite() || total <= 0.0 {
        return TECHNICAL_STEP_SECONDS;
    }
    let step = TECHNICAL_STEP_SECONDS as f64;
    ((total / step).ceil() * step) as u32
}

/// Formats seconds for timeline windows: `5s`, `2.5s`, `1.25s`
pub fn format_seconds(seconds: f64) -> String {
    let millis = (seconds * 1000.0).round() as i64;
    if millis % 1000 == 0 {
        return format!("{}s", millis / 1000);
    }
    let text = format!("{:.3}", millis as f64 / 1000.0);
    format!("{}s", text.trim_end_matches('0').trim_end_matches('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(parse_duration("5s"), 5.0);
        assert_eq!(parse_duration("5.5 sec"), 5.5);
        assert_eq!(parse_duration("1500ms"), 1.5);
        assert_eq!(parse_duration("7"), 7.0);
        assert_eq!(parse_duration(" 3 Seconds "), 3.0);
    }

    #[test]
    fn test_parse_fallbacks() {
        assert_eq!(parse_duration(""), DEFAULT_SHOT_SECONDS);
        assert_eq!(parse_duration("long"), DEFAULT_SHOT_SECONDS);
        assert_eq!(parse_duration("0s"), DEFAULT_SHOT_SECONDS);
        assert_eq!(parse_duration("-2s"), DEFAULT_SHOT_SECONDS);
        assert_eq!(parse_duration("5 minutes"), DEFAULT_SHOT_SECONDS);
    }

    #[test]
    fn test_total_and_rounding() {
        assert_eq!(total_seconds(["5s", "6s"]), 11.0);
        assert_eq!(total_seconds(["0.1s", "0.2s"]), 0.3);
        assert_eq!(round_up_to_step(17.0), 20);
        assert_eq!(round_up_to_step(15.0), 15);
        assert_eq!(round_up_to_step(15.001), 20);
        assert_eq!(round_up_to_step(0.5), 5);
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0.0), "0s");
        assert_eq!(format_seconds(11.0), "11s");
        assert_eq!(format_seconds(2.5), "2.5s");
        assert_eq!(format_seconds(1.25), "1.25s");
    }
}
