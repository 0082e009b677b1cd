//! Error types for the a11ybot audit engine.
//!
//! Uses `thiserror` for public API error types with structured error variants
//! covering input validation, browser lifecycle, in-page evaluation,
//! report rendering, and configuration.

use std::path::PathBuf;

/// Top-level error type for the a11ybot core library.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Missing output path for the report artifact")]
    MissingOutputPath,

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("Evaluation failed during {step}: {message}")]
    Evaluation { step: AuditStep, message: String },

    #[error("Report rendering failed: {message}")]
    Render { message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the browser process and the pages it hands out.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {message}")]
    LaunchFailed { message: String },

    #[error("Browser not connected")]
    NotConnected,

    #[error("Failed to create page: {message}")]
    PageCreationFailed { message: String },

    #[error("Navigation failed: {message}")]
    NavigationFailed { message: String },

    #[error("Navigation did not complete within {timeout_ms}ms")]
    NavigationTimeout { timeout_ms: u64 },

    #[error("JavaScript evaluation failed: {message}")]
    JsEvalFailed { message: String },

    #[error("CDP protocol error: {message}")]
    CdpError { message: String },

    #[error("PDF export failed: {message}")]
    PdfFailed { message: String },

    #[error("Browser session has been shut down")]
    SessionClosed,
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// The analysis step an evaluation failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStep {
    RuleEngine,
    Heuristics,
    FocusTrap,
}

impl std::fmt::Display for AuditStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditStep::RuleEngine => write!(f, "rule engine scan"),
            AuditStep::Heuristics => write!(f, "heuristic suggestions"),
            AuditStep::FocusTrap => write!(f, "focus trap simulation"),
        }
    }
}

/// Boundary classification of an [`AuditError`], reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidUrl,
    InvalidInput,
    NavigationTimeout,
    LaunchFailure,
    BrowserFailure,
    EvaluationFailure,
    RenderFailure,
    ConfigFailure,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::InvalidUrl => "invalid-url",
            ErrorKind::InvalidInput => "invalid-input",
            ErrorKind::NavigationTimeout => "navigation-timeout",
            ErrorKind::LaunchFailure => "launch-failure",
            ErrorKind::BrowserFailure => "browser-failure",
            ErrorKind::EvaluationFailure => "evaluation-failure",
            ErrorKind::RenderFailure => "render-failure",
            ErrorKind::ConfigFailure => "config-failure",
        };
        f.write_str(s)
    }
}

impl AuditError {
    /// Map a browser error raised inside an analysis step.
    ///
    /// Script failures become [`AuditError::Evaluation`] for that step; anything
    /// else (lost connection, crashed target) stays a browser lifecycle error.
    pub fn at_step(step: AuditStep) -> impl Fn(BrowserError) -> AuditError {
        move |err| match err {
            BrowserError::JsEvalFailed { message } => AuditError::Evaluation { step, message },
            other => AuditError::Browser(other),
        }
    }

    /// The boundary kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuditError::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            AuditError::MissingOutputPath => ErrorKind::InvalidInput,
            AuditError::Browser(BrowserError::NavigationTimeout { .. }) => {
                ErrorKind::NavigationTimeout
            }
            AuditError::Browser(BrowserError::LaunchFailed { .. }) => ErrorKind::LaunchFailure,
            AuditError::Browser(BrowserError::PdfFailed { .. }) => ErrorKind::RenderFailure,
            AuditError::Browser(_) => ErrorKind::BrowserFailure,
            AuditError::Evaluation { .. } => ErrorKind::EvaluationFailure,
            AuditError::Render { .. } | AuditError::Io(_) => ErrorKind::RenderFailure,
            AuditError::Config(_) => ErrorKind::ConfigFailure,
            AuditError::Serialization(_) => ErrorKind::EvaluationFailure,
        }
    }
}

/// A type alias for results using the top-level `AuditError`.
pub type Result<T> = std::result::Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_url() {
        let err = AuditError::InvalidUrl {
            url: "ftp://example.com".into(),
            reason: "scheme must be http or https".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid URL 'ftp://example.com': scheme must be http or https"
        );
        assert_eq!(err.kind(), ErrorKind::InvalidUrl);
    }

    #[test]
    fn test_error_display_browser() {
        let err = AuditError::Browser(BrowserError::NavigationTimeout { timeout_ms: 60_000 });
        assert_eq!(
            err.to_string(),
            "Browser error: Navigation did not complete within 60000ms"
        );
        assert_eq!(err.kind(), ErrorKind::NavigationTimeout);
    }

    #[test]
    fn test_error_display_evaluation() {
        let err = AuditError::Evaluation {
            step: AuditStep::Heuristics,
            message: "ReferenceError: x is not defined".into(),
        };
        assert_eq!(
            err.to_string(),
            "Evaluation failed during heuristic suggestions: ReferenceError: x is not defined"
        );
    }

    #[test]
    fn test_at_step_maps_script_failures() {
        let map = AuditError::at_step(AuditStep::FocusTrap);
        let err = map(BrowserError::JsEvalFailed {
            message: "boom".into(),
        });
        assert!(matches!(
            err,
            AuditError::Evaluation {
                step: AuditStep::FocusTrap,
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::EvaluationFailure);

        let err = map(BrowserError::NotConnected);
        assert!(matches!(err, AuditError::Browser(BrowserError::NotConnected)));
        assert_eq!(err.kind(), ErrorKind::BrowserFailure);
    }

    #[test]
    fn test_error_kind_strings() {
        assert_eq!(ErrorKind::LaunchFailure.to_string(), "launch-failure");
        assert_eq!(ErrorKind::NavigationTimeout.to_string(), "navigation-timeout");
        assert_eq!(ErrorKind::RenderFailure.to_string(), "render-failure");
        let err = AuditError::Browser(BrowserError::LaunchFailed {
            message: "no chrome".into(),
        });
        assert_eq!(err.kind(), ErrorKind::LaunchFailure);
        assert_eq!(AuditError::MissingOutputPath.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AuditError = io_err.into();
        assert!(matches!(err, AuditError::Io(_)));
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: AuditError = serde_err.into();
        assert!(matches!(err, AuditError::Serialization(_)));
    }
}
