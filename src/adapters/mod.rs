// Adapters layer: reqwest clients for the remote analysis platform and the cloud drive.

pub mod drive;
pub mod earth_engine;

use crate::utils::error::{FireRiskError, Result};
use reqwest::{Response, StatusCode};

/// 呼叫類型，決定非成功狀態碼對應的錯誤
#[derive(Debug, Clone, Copy)]
pub(crate) enum Call<'a> {
    Query,
    Submit { file_name: &'a str },
    Download { file_name: &'a str },
}

pub(crate) async fn ensure_success(
    response: Response,
    service: &str,
    call: Call<'_>,
) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        status.to_string()
    } else {
        body
    };
    tracing::debug!("{} answered {}: {}", service, status, message);

    Err(match (status, call) {
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => FireRiskError::AuthError {
            service: service.to_string(),
            message,
        },
        (StatusCode::TOO_MANY_REQUESTS, Call::Submit { file_name }) => {
            FireRiskError::SubmissionError {
                file_name: file_name.to_string(),
                message: format!("quota exceeded: {}", message),
            }
        }
        (_, Call::Submit { file_name }) => FireRiskError::SubmissionError {
            file_name: file_name.to_string(),
            message,
        },
        (StatusCode::NOT_FOUND, Call::Download { file_name }) => FireRiskError::DownloadError {
            file_name: file_name.to_string(),
            message,
        },
        (_, Call::Query | Call::Download { .. }) => FireRiskError::PlatformError {
            status: status.as_u16(),
            message,
        },
    })
}
