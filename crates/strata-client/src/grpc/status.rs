//! gRPC status codes and retry classification.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::metadata::Metadata;

/// gRPC status codes.
///
/// These correspond to the standard gRPC status codes defined in
/// the gRPC specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum GrpcStatusCode {
    /// The operation completed successfully.
    Ok = 0,
    /// The operation was cancelled (typically by the caller).
    Cancelled = 1,
    /// Unknown error.
    Unknown = 2,
    /// Invalid argument was provided.
    InvalidArgument = 3,
    /// Deadline expired before operation could complete.
    DeadlineExceeded = 4,
    /// Requested entity was not found.
    NotFound = 5,
    /// Entity already exists.
    AlreadyExists = 6,
    /// Permission denied.
    PermissionDenied = 7,
    /// Resource exhausted (e.g., rate limit exceeded).
    ResourceExhausted = 8,
    /// Precondition failed.
    FailedPrecondition = 9,
    /// Operation was aborted.
    Aborted = 10,
    /// Operation was out of valid range.
    OutOfRange = 11,
    /// Operation is not implemented.
    Unimplemented = 12,
    /// Internal error.
    Internal = 13,
    /// Service is unavailable.
    Unavailable = 14,
    /// Data loss occurred.
    DataLoss = 15,
    /// Unauthenticated request.
    Unauthenticated = 16,
}

impl GrpcStatusCode {
    /// Create from an i32 code.
    pub fn from_i32(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::Cancelled,
            2 => Self::Unknown,
            3 => Self::InvalidArgument,
            4 => Self::DeadlineExceeded,
            5 => Self::NotFound,
            6 => Self::AlreadyExists,
            7 => Self::PermissionDenied,
            8 => Self::ResourceExhausted,
            9 => Self::FailedPrecondition,
            10 => Self::Aborted,
            11 => Self::OutOfRange,
            12 => Self::Unimplemented,
            13 => Self::Internal,
            14 => Self::Unavailable,
            15 => Self::DataLoss,
            16 => Self::Unauthenticated,
            _ => Self::Unknown,
        }
    }

    /// Check if this is an OK status.
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Check if a failed call with this code is retried by the default
    /// retry predicate.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Unavailable
                | Self::Internal
                | Self::ResourceExhausted
                | Self::Unknown
                | Self::DeadlineExceeded
        )
    }

    /// Get a human-readable description of the status code.
    pub fn description(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Cancelled => "Cancelled",
            Self::Unknown => "Unknown",
            Self::InvalidArgument => "Invalid Argument",
            Self::DeadlineExceeded => "Deadline Exceeded",
            Self::NotFound => "Not Found",
            Self::AlreadyExists => "Already Exists",
            Self::PermissionDenied => "Permission Denied",
            Self::ResourceExhausted => "Resource Exhausted",
            Self::FailedPrecondition => "Failed Precondition",
            Self::Aborted => "Aborted",
            Self::OutOfRange => "Out of Range",
            Self::Unimplemented => "Unimplemented",
            Self::Internal => "Internal",
            Self::Unavailable => "Unavailable",
            Self::DataLoss => "Data Loss",
            Self::Unauthenticated => "Unauthenticated",
        }
    }
}

impl fmt::Display for GrpcStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl From<tonic::Code> for GrpcStatusCode {
    fn from(code: tonic::Code) -> Self {
        Self::from_i32(code as i32)
    }
}

impl From<GrpcStatusCode> for tonic::Code {
    fn from(code: GrpcStatusCode) -> Self {
        tonic::Code::from(code as i32)
    }
}

/// A gRPC status representing the result of a failed RPC call.
///
/// Carries the status code, the server's message, and any trailing
/// metadata the server attached to the failure.
#[derive(Debug, Clone)]
pub struct GrpcStatus {
    code: GrpcStatusCode,
    message: String,
    trailers: Metadata,
}

impl GrpcStatus {
    /// Create a new status.
    pub fn new(code: GrpcStatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            trailers: Metadata::new(),
        }
    }

    /// Create an unknown error status.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(GrpcStatusCode::Unknown, message)
    }

    /// Create an unavailable status.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(GrpcStatusCode::Unavailable, message)
    }

    /// Create a permission denied status.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(GrpcStatusCode::PermissionDenied, message)
    }

    /// Attach trailing metadata.
    pub fn with_trailers(mut self, trailers: Metadata) -> Self {
        self.trailers = trailers;
        self
    }

    /// The status code.
    pub fn code(&self) -> GrpcStatusCode {
        self.code
    }

    /// The server's error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Trailing metadata attached to the failure.
    pub fn trailers(&self) -> &Metadata {
        &self.trailers
    }

    /// The server-mandated retry delay, if one was sent.
    ///
    /// Reads the `retry-after` trailer and parses it as an HTTP
    /// `Retry-After` value: either non-negative integer seconds or an HTTP
    /// date. An absent or malformed value yields `None`; it never fails,
    /// since a bad hint must not block error propagation.
    pub fn retry_after(&self) -> Option<Duration> {
        let value = self.trailers.get("retry-after")?;
        let parsed = parse_retry_after(value);
        if parsed.is_none() {
            tracing::debug!(value, "ignoring unparsable retry-after trailer");
        }
        parsed
    }
}

/// Parse an HTTP `Retry-After` value into a delay from now.
///
/// A date in the past yields a zero delay rather than an error.
fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let date: DateTime<Utc> = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    let delta = date - Utc::now();
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

impl fmt::Display for GrpcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for GrpcStatus {}

impl From<tonic::Status> for GrpcStatus {
    fn from(status: tonic::Status) -> Self {
        Self {
            code: GrpcStatusCode::from(status.code()),
            message: status.message().to_string(),
            trailers: Metadata::from_metadata_map(status.metadata()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_status_code_from_i32() {
        assert_eq!(GrpcStatusCode::from_i32(0), GrpcStatusCode::Ok);
        assert_eq!(GrpcStatusCode::from_i32(14), GrpcStatusCode::Unavailable);
        assert_eq!(GrpcStatusCode::from_i32(100), GrpcStatusCode::Unknown);
    }

    #[test]
    fn test_retryable_codes() {
        let retryable = [
            GrpcStatusCode::Unavailable,
            GrpcStatusCode::Internal,
            GrpcStatusCode::ResourceExhausted,
            GrpcStatusCode::Unknown,
            GrpcStatusCode::DeadlineExceeded,
        ];
        for code in retryable {
            assert!(code.is_retryable(), "{code} should be retryable");
        }
        for code in [
            GrpcStatusCode::Ok,
            GrpcStatusCode::InvalidArgument,
            GrpcStatusCode::NotFound,
            GrpcStatusCode::PermissionDenied,
            GrpcStatusCode::Unauthenticated,
        ] {
            assert!(!code.is_retryable(), "{code} should not be retryable");
        }
    }

    #[test]
    fn test_status_display() {
        let status = GrpcStatus::new(GrpcStatusCode::Internal, "something went wrong");
        assert_eq!(status.to_string(), "Internal: something went wrong");

        let status = GrpcStatus::new(GrpcStatusCode::Unavailable, "");
        assert_eq!(status.to_string(), "Unavailable");
    }

    #[test]
    fn test_retry_after_seconds() {
        let status = GrpcStatus::permission_denied("throttled")
            .with_trailers(Metadata::from_pairs([("retry-after", "30")]));
        assert_eq!(status.retry_after(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_retry_after_http_date() {
        let date = (Utc::now() + TimeDelta::seconds(90)).to_rfc2822();
        let status = GrpcStatus::permission_denied("throttled")
            .with_trailers(Metadata::from_pairs([("retry-after", date)]));

        let delay = status.retry_after().expect("date should parse");
        assert!(delay <= Duration::from_secs(90));
        assert!(delay >= Duration::from_secs(85));
    }

    #[test]
    fn test_retry_after_past_date_is_zero() {
        let date = (Utc::now() - TimeDelta::seconds(90)).to_rfc2822();
        let status = GrpcStatus::permission_denied("throttled")
            .with_trailers(Metadata::from_pairs([("retry-after", date)]));

        assert_eq!(status.retry_after(), Some(Duration::ZERO));
    }

    #[test]
    fn test_retry_after_malformed() {
        for value in ["soon", "-5", "12.5", ""] {
            let status = GrpcStatus::permission_denied("throttled")
                .with_trailers(Metadata::from_pairs([("retry-after", value)]));
            assert_eq!(status.retry_after(), None, "{value:?} should not parse");
        }
    }

    #[test]
    fn test_retry_after_missing() {
        let status = GrpcStatus::permission_denied("throttled");
        assert_eq!(status.retry_after(), None);
    }

    #[test]
    fn test_from_tonic_status_with_trailers() {
        let metadata = Metadata::from_pairs([("retry-after", "10")])
            .to_metadata_map()
            .unwrap();
        let status = tonic::Status::with_metadata(
            tonic::Code::PermissionDenied,
            "quota exceeded",
            metadata,
        );

        let status = GrpcStatus::from(status);
        assert_eq!(status.code(), GrpcStatusCode::PermissionDenied);
        assert_eq!(status.message(), "quota exceeded");
        assert_eq!(status.retry_after(), Some(Duration::from_secs(10)));
    }
}
