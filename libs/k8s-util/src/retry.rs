use crate::error::Error;

use std::time::Duration;

use backon::ExponentialBuilder;

/// Output substrings that classify a registry interaction failure as worth
/// retrying. Kept explicit so the classifier is testable on its own.
pub const RETRYABLE_OUTPUT_PATTERNS: [&str; 6] = [
    "error",
    "timeout",
    "connection",
    "network",
    "unauthorized",
    "authentication",
];

/// Exponential backoff: `base_delay * 2^(attempt - 1)` between attempts,
/// `max_attempts` attempts in total.
pub fn backoff(max_attempts: usize, base_delay: Duration) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(base_delay)
        .with_factor(2.0)
        .with_max_times(max_attempts.saturating_sub(1))
}

pub fn output_is_retryable(output: &str) -> bool {
    let lower = output.to_lowercase();
    RETRYABLE_OUTPUT_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Retry predicate for operations whose failure surface is command output:
/// timeouts within an attempt and API hiccups always retry, environment and
/// configuration failures never do, anything else consults the output
/// classifier.
pub fn error_is_retryable(error: &Error) -> bool {
    match error {
        Error::UnsupportedRuntimeEnvironment(_) | Error::Config(_) | Error::Validation(_) => false,
        Error::Timeout(_) | Error::Api(_, _) => true,
        Error::Unknown(msg) => output_is_retryable(msg),
    }
}

/// Retry predicate for operations where any non-environmental failure is
/// worth another attempt (image builds).
pub fn error_is_transient(error: &Error) -> bool {
    !matches!(
        error,
        Error::UnsupportedRuntimeEnvironment(_) | Error::Config(_)
    )
}
