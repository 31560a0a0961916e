use thiserror::Error;

/// Exit codes for the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Probe succeeded, or usage was printed
    Success = 0,
    /// Probe failed with a malformed response or an unclassified error
    ProbeFailure = 1,
    /// Authentication failure
    AuthFailure = 2,
    /// Service unreachable or timed out
    NetworkFailure = 3,
    /// Configuration error
    ConfigError = 4,
    /// Invalid input
    InvalidInput = 5,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

/// Errors raised outside the probe boundary
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Device code authentication failed: {0}")]
    DeviceCodeAuthFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

impl AppError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            AppError::Config(_) | AppError::TomlParse(_) | AppError::FileNotFound(_) => {
                ExitCode::ConfigError
            }
            AppError::DeviceCodeAuthFailed(_) => ExitCode::AuthFailure,
            AppError::Io(_) => ExitCode::InvalidInput,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failure while splitting the raw argument list
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected <service_type> <connection_string>")]
    MissingPositional,

    #[error("unterminated quoted value starting at argument {start}")]
    UnterminatedQuote { start: usize },
}

/// Closed classification of probe failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeErrorKind {
    Unreachable,
    AuthFailed,
    Timeout,
    MalformedResponse,
    Other,
}

impl ProbeErrorKind {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            ProbeErrorKind::Unreachable | ProbeErrorKind::Timeout => ExitCode::NetworkFailure,
            ProbeErrorKind::AuthFailed => ExitCode::AuthFailure,
            ProbeErrorKind::MalformedResponse | ProbeErrorKind::Other => ExitCode::ProbeFailure,
        }
    }
}

impl std::fmt::Display for ProbeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeErrorKind::Unreachable => write!(f, "unreachable"),
            ProbeErrorKind::AuthFailed => write!(f, "auth-failed"),
            ProbeErrorKind::Timeout => write!(f, "timeout"),
            ProbeErrorKind::MalformedResponse => write!(f, "malformed-response"),
            ProbeErrorKind::Other => write!(f, "other"),
        }
    }
}

/// A probe failure: the kind drives the exit code, the message is what the user sees
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ProbeError {
    pub kind: ProbeErrorKind,
    pub message: String,
}

impl ProbeError {
    pub fn new(kind: ProbeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::Unreachable, message)
    }

    pub fn auth_failed(message: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::AuthFailed, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::Timeout, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::MalformedResponse, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::Other, message)
    }
}

impl From<AppError> for ProbeError {
    fn from(err: AppError) -> Self {
        let kind = match err {
            AppError::DeviceCodeAuthFailed(_) => ProbeErrorKind::AuthFailed,
            _ => ProbeErrorKind::Other,
        };
        ProbeError::new(kind, err.to_string())
    }
}

const MAX_BODY_CHARS: usize = 300;

/// Collapse whitespace in an HTTP error body and cap its length
pub fn sanitize_error(body: &str, status: u16) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return format!("empty response body (HTTP {})", status);
    }
    if collapsed.chars().count() > MAX_BODY_CHARS {
        let truncated: String = collapsed.chars().take(MAX_BODY_CHARS).collect();
        format!("{}...", truncated)
    } else {
        collapsed
    }
}
