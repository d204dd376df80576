//! Timestamp parsing and freshness checks.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};

use super::errors::{ErrorCode, ValidationErrorSet};
use crate::config::ValidationSettings;

/// Which pattern chain to use when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// The request-time pattern only.
    Request,
    /// The biometric pattern, falling back to the request-time pattern.
    Biometric,
}

#[derive(Debug, Clone)]
pub struct TimestampPolicy {
    request_pattern: String,
    biometric_pattern: String,
    past_seconds: i64,
    future_seconds: i64,
    /// `None` when the configured seconds do not fit a `Duration`.
    past: Option<Duration>,
    future: Option<Duration>,
}

impl TimestampPolicy {
    pub fn new(settings: &ValidationSettings) -> Self {
        Self {
            request_pattern: settings.request_time_pattern.clone(),
            biometric_pattern: settings.biometric_time_pattern.clone(),
            past_seconds: settings.request_time_past_seconds,
            future_seconds: settings.request_time_future_seconds,
            past: Duration::try_seconds(settings.request_time_past_seconds),
            future: Duration::try_seconds(settings.request_time_future_seconds),
        }
    }

    pub fn parse(&self, value: &str, format: TimestampFormat) -> Option<DateTime<Utc>> {
        match format {
            TimestampFormat::Request => parse_with_pattern(value, &self.request_pattern),
            TimestampFormat::Biometric => parse_with_pattern(value, &self.biometric_pattern)
                .or_else(|| {
                    tracing::debug!(
                        pattern = %self.biometric_pattern,
                        "Biometric timestamp did not match, retrying with request time pattern"
                    );
                    parse_with_pattern(value, &self.request_pattern)
                }),
        }
    }

    /// Validate `value` at `field` against the current time.
    pub fn validate(
        &self,
        value: Option<&str>,
        field: &str,
        format: TimestampFormat,
        errors: &mut ValidationErrorSet,
    ) -> bool {
        self.validate_at(value, field, format, Utc::now(), errors)
    }

    /// Returns `true` when the value is present, parseable and inside the
    /// skew window around `now`; otherwise records exactly one error.
    pub fn validate_at(
        &self,
        value: Option<&str>,
        field: &str,
        format: TimestampFormat,
        now: DateTime<Utc>,
        errors: &mut ValidationErrorSet,
    ) -> bool {
        let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
            errors.reject_missing(field);
            return false;
        };

        let Some(instant) = self.parse(value, format) else {
            errors.reject(field, ErrorCode::InvalidInput, &[field]);
            return false;
        };

        let Some((earliest, latest)) = self.window(now) else {
            tracing::error!(
                field,
                past_seconds = self.past_seconds,
                future_seconds = self.future_seconds,
                "Configured timestamp window is out of range"
            );
            self.reject_expired(field, errors);
            return false;
        };

        if instant < earliest || instant > latest {
            tracing::warn!(field, %instant, %now, "Timestamp outside the allowed window");
            self.reject_expired(field, errors);
            return false;
        }

        true
    }

    fn window(&self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let earliest = now.checked_sub_signed(self.past?)?;
        let latest = now.checked_add_signed(self.future?)?;
        Some((earliest, latest))
    }

    fn reject_expired(&self, field: &str, errors: &mut ValidationErrorSet) {
        let window = format!("-{}s/+{}s", self.past_seconds, self.future_seconds);
        errors.reject(field, ErrorCode::RequestExpired, &[field, &window]);
    }
}

/// Patterns with an offset are parsed as such; patterns without one are
/// taken as UTC.
fn parse_with_pattern(value: &str, pattern: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value, pattern)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, pattern)
                .ok()
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
}
