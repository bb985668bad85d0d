use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FireRiskError {
    #[error("Region selection failed: {message}")]
    SelectionError { message: String },

    #[error("No imagery from {collection} between {start} and {end} over {region}")]
    DataUnavailableError {
        collection: String,
        region: String,
        start: String,
        end: String,
    },

    #[error("Export submission for '{file_name}' failed: {message}")]
    SubmissionError { file_name: String, message: String },

    #[error("Export task {task_id} ('{file_name}') failed on the platform: {message}")]
    ExportFailedError {
        task_id: String,
        file_name: String,
        message: String,
    },

    #[error("Timed out after {elapsed_secs}s waiting for tasks: {}", .pending.join(", "))]
    TimeoutError {
        elapsed_secs: u64,
        pending: Vec<String>,
    },

    #[error("Authentication rejected by {service}: {message}")]
    AuthError { service: String, message: String },

    #[error("Filesystem error at {}: {source}", .path.display())]
    FilesystemError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Polling cancelled before task {task_id} finished")]
    CancelledError { task_id: String },

    #[error("Download of '{file_name}' failed: {message}")]
    DownloadError { file_name: String, message: String },

    #[error("Platform returned {status}: {message}")]
    PlatformError { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse {field}: {message}")]
    ConfigParseError { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Upstream,
    Network,
    Auth,
    Local,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl FireRiskError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::SelectionError { .. } => ErrorCategory::Input,
            Self::DataUnavailableError { .. }
            | Self::SubmissionError { .. }
            | Self::ExportFailedError { .. }
            | Self::PlatformError { .. } => ErrorCategory::Upstream,
            Self::TimeoutError { .. }
            | Self::DownloadError { .. }
            | Self::HttpError(_)
            | Self::SerializationError(_) => ErrorCategory::Network,
            Self::AuthError { .. } => ErrorCategory::Auth,
            Self::FilesystemError { .. } | Self::CancelledError { .. } => ErrorCategory::Local,
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigParseError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::CancelledError { .. } => ErrorSeverity::Low,
            Self::TimeoutError { .. }
            | Self::HttpError(_)
            | Self::DownloadError { .. }
            | Self::PlatformError { .. } => ErrorSeverity::Medium,
            Self::SelectionError { .. }
            | Self::DataUnavailableError { .. }
            | Self::SubmissionError { .. }
            | Self::ExportFailedError { .. }
            | Self::SerializationError(_) => ErrorSeverity::High,
            Self::AuthError { .. }
            | Self::FilesystemError { .. }
            | Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigParseError { .. } => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::SelectionError { .. } => {
                "Use --list-provinces to see valid names, or click inside the map area"
            }
            Self::DataUnavailableError { .. } => {
                "Widen the date range or set analysis.allow_fallback = true"
            }
            Self::SubmissionError { .. } => "Check the project quota and the region geometry",
            Self::ExportFailedError { .. } => "Inspect the task in the platform console and resubmit",
            Self::TimeoutError { .. } => {
                "Raise download.timeout_seconds; exports keep running remotely and can be fetched later"
            }
            Self::AuthError { .. } => "Refresh EE_ACCESS_TOKEN / DRIVE_ACCESS_TOKEN and retry",
            Self::FilesystemError { .. } => "Check that the output directory is writable",
            Self::CancelledError { .. } => "Re-run to resume waiting for the remaining exports",
            Self::DownloadError { .. } => "Verify the export folder exists in the drive account",
            Self::PlatformError { .. } | Self::HttpError(_) => {
                "Check network connectivity and the platform endpoint"
            }
            Self::SerializationError(_) => "The remote API answered with an unexpected payload",
            Self::ConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::ConfigParseError { .. } => "Fix the configuration file or command-line flags",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::SelectionError { message } => format!("Could not resolve the region: {}", message),
            Self::DataUnavailableError {
                collection, region, ..
            } => format!("No {} imagery available for {}", collection, region),
            Self::TimeoutError { pending, .. } => {
                format!("{} export(s) were still running when the wait ended", pending.len())
            }
            Self::AuthError { service, .. } => format!("{} rejected the credentials", service),
            other => other.to_string(),
        }
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FilesystemError {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, FireRiskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_lists_pending_tasks() {
        let err = FireRiskError::TimeoutError {
            elapsed_secs: 60,
            pending: vec!["op-1".to_string(), "op-2".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 60s waiting for tasks: op-1, op-2"
        );
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
    }

    #[test]
    fn test_auth_is_critical() {
        let err = FireRiskError::AuthError {
            service: "drive".to_string(),
            message: "expired".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.user_friendly_message(), "drive rejected the credentials");
    }
}
