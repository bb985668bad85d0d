use crate::adapters::{ensure_success, Call};
use crate::config::toml_config::PlatformConfig;
use crate::domain::expression::{LayerExpression, SourceCollection};
use crate::domain::model::{ExportRequest, Geometry, TaskState};
use crate::domain::ports::AnalysisPlatform;
use crate::utils::error::{FireRiskError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SERVICE: &str = "analysis platform";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportBody<'a> {
    expression: &'a LayerExpression,
    description: &'a str,
    file_export_options: FileExportOptions<'a>,
    grid: Grid<'a>,
    max_pixels: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileExportOptions<'a> {
    file_format: &'a str,
    drive_destination: DriveDestination<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DriveDestination<'a> {
    folder: &'a str,
    filename_prefix: &'a str,
}

#[derive(Serialize)]
struct Grid<'a> {
    region: &'a Geometry,
    scale: f64,
}

#[derive(Serialize)]
struct ComputeBody<'a> {
    expression: CountExpression<'a>,
}

#[derive(Serialize)]
#[serde(tag = "op", rename = "count")]
struct CountExpression<'a> {
    collection: &'a SourceCollection,
}

#[derive(Deserialize)]
struct ComputeResponse {
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    metadata: Option<OperationMetadata>,
    #[serde(default)]
    error: Option<OperationError>,
}

#[derive(Debug, Deserialize)]
struct OperationMetadata {
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    message: Option<String>,
}

impl Operation {
    fn task_state(&self) -> TaskState {
        let error_message = || {
            self.error
                .as_ref()
                .and_then(|e| e.message.clone())
                .unwrap_or_else(|| "export failed without a message".to_string())
        };

        match self.metadata.as_ref().and_then(|m| m.state.as_deref()) {
            Some("PENDING") => TaskState::Pending,
            Some("RUNNING") | Some("CANCELLING") => TaskState::Running,
            Some("SUCCEEDED") => TaskState::Completed,
            Some("FAILED") => TaskState::Failed {
                message: error_message(),
            },
            Some("CANCELLED") => TaskState::Failed {
                message: "export was cancelled on the platform".to_string(),
            },
            _ if self.done && self.error.is_some() => TaskState::Failed {
                message: error_message(),
            },
            _ if self.done => TaskState::Completed,
            other => {
                tracing::debug!("Unrecognised state {:?} for {}", other, self.name);
                TaskState::Pending
            }
        }
    }
}

/// 影像分析平台 REST 客戶端
#[derive(Debug, Clone)]
pub struct EarthEngineClient {
    client: Client,
    endpoint: String,
    project: String,
    token: Option<String>,
}

impl EarthEngineClient {
    pub fn new(config: &PlatformConfig, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            project: config.project.clone(),
            token,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn project_url(&self, method: &str) -> String {
        format!("{}/v1/projects/{}/{}", self.endpoint, self.project, method)
    }
}

#[async_trait]
impl AnalysisPlatform for EarthEngineClient {
    async fn count_images(&self, source: &SourceCollection) -> Result<u64> {
        let body = ComputeBody {
            expression: CountExpression { collection: source },
        };
        let url = self.project_url("value:compute");
        tracing::debug!("Counting images in {} via {}", source.id, url);

        let response = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response, SERVICE, Call::Query).await?;
        let parsed: ComputeResponse = response.json().await?;

        parsed
            .result
            .as_u64()
            .or_else(|| parsed.result.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
            .ok_or_else(|| FireRiskError::PlatformError {
                status: 200,
                message: format!("image count is not a number: {}", parsed.result),
            })
    }

    async fn submit_export(&self, request: &ExportRequest) -> Result<String> {
        let file_name = request.file_name_prefix.as_str();
        let body = ExportBody {
            expression: &request.expression,
            description: &request.description,
            file_export_options: FileExportOptions {
                file_format: &request.file_format,
                drive_destination: DriveDestination {
                    folder: &request.folder,
                    filename_prefix: file_name,
                },
            },
            grid: Grid {
                region: &request.region,
                scale: request.scale_meters,
            },
            max_pixels: request.max_pixels,
        };

        let response = self
            .authorized(self.client.post(self.project_url("image:export")))
            .json(&body)
            .send()
            .await
            .map_err(|e| FireRiskError::SubmissionError {
                file_name: file_name.to_string(),
                message: e.to_string(),
            })?;
        let response = ensure_success(response, SERVICE, Call::Submit { file_name }).await?;
        let operation: Operation = response.json().await?;

        Ok(operation.name)
    }

    async fn task_state(&self, task_id: &str) -> Result<TaskState> {
        let url = format!("{}/v1/{}", self.endpoint, task_id);
        let response = self.authorized(self.client.get(&url)).send().await?;
        let response = ensure_success(response, SERVICE, Call::Query).await?;
        let operation: Operation = response.json().await?;

        Ok(operation.task_state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Coordinate;
    use chrono::NaiveDate;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> EarthEngineClient {
        let config = PlatformConfig {
            endpoint: server.base_url(),
            project: "fire-test".to_string(),
            ..PlatformConfig::default()
        };
        EarthEngineClient::new(&config, Some("secret-token".to_string())).unwrap()
    }

    fn source() -> SourceCollection {
        SourceCollection {
            id: "MODIS/006/MOD11A2".to_string(),
            bounds: Geometry::Buffer {
                center: Coordinate::new(52.5311, 29.5893),
                radius_meters: 30_000.0,
            },
            start: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2022, 3, 1).unwrap(),
            property_bound: None,
            select: Some("LST_Day_1km".to_string()),
        }
    }

    fn export_request() -> ExportRequest {
        ExportRequest {
            description: "Fars_NDVI".to_string(),
            file_name_prefix: "Fars_NDVI".to_string(),
            folder: "EarthEngineExports".to_string(),
            file_format: "GEO_TIFF".to_string(),
            region: source().bounds.bounds(),
            scale_meters: 30.0,
            max_pixels: 10_000_000_000_000,
            expression: LayerExpression::constant(0.0).rename("NDVI"),
        }
    }

    #[tokio::test]
    async fn test_count_images_sends_collection_filter() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/projects/fire-test/value:compute")
                .header("authorization", "Bearer secret-token")
                .json_body_partial(
                    r#"{"expression": {"op": "count", "collection": {"id": "MODIS/006/MOD11A2", "start": "2022-01-01"}}}"#,
                );
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(serde_json::json!({"result": 8}));
        });

        let count = client(&server).count_images(&source()).await.unwrap();

        api_mock.assert();
        assert_eq!(count, 8);
    }

    #[tokio::test]
    async fn test_submit_export_returns_operation_name() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/projects/fire-test/image:export")
                .json_body_partial(
                    r#"{
                        "description": "Fars_NDVI",
                        "fileExportOptions": {
                            "fileFormat": "GEO_TIFF",
                            "driveDestination": {"folder": "EarthEngineExports", "filenamePrefix": "Fars_NDVI"}
                        },
                        "grid": {"scale": 30.0},
                        "maxPixels": 10000000000000
                    }"#,
                );
            then.status(200).json_body(serde_json::json!({
                "name": "projects/fire-test/operations/ABC123",
                "done": false,
                "metadata": {"state": "PENDING"}
            }));
        });

        let id = client(&server)
            .submit_export(&export_request())
            .await
            .unwrap();

        api_mock.assert();
        assert_eq!(id, "projects/fire-test/operations/ABC123");
    }

    #[tokio::test]
    async fn test_submit_export_maps_quota_and_auth_errors() {
        let server = MockServer::start();
        let mut quota = server.mock(|when, then| {
            when.method(POST).path("/v1/projects/fire-test/image:export");
            then.status(429).body("Too many concurrent exports");
        });

        let err = client(&server)
            .submit_export(&export_request())
            .await
            .unwrap_err();
        match err {
            FireRiskError::SubmissionError { file_name, message } => {
                assert_eq!(file_name, "Fars_NDVI");
                assert!(message.contains("quota exceeded"));
            }
            other => panic!("unexpected error: {other}"),
        }
        quota.delete();

        server.mock(|when, then| {
            when.method(POST).path("/v1/projects/fire-test/image:export");
            then.status(401).body("token expired");
        });
        let err = client(&server)
            .submit_export(&export_request())
            .await
            .unwrap_err();
        assert!(matches!(err, FireRiskError::AuthError { .. }));
    }

    #[tokio::test]
    async fn test_task_state_maps_operation_states() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/projects/fire-test/operations/RUN");
            then.status(200).json_body(serde_json::json!({
                "name": "projects/fire-test/operations/RUN",
                "metadata": {"state": "RUNNING"}
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/v1/projects/fire-test/operations/OK");
            then.status(200).json_body(serde_json::json!({
                "name": "projects/fire-test/operations/OK",
                "done": true,
                "metadata": {"state": "SUCCEEDED"}
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/v1/projects/fire-test/operations/BAD");
            then.status(200).json_body(serde_json::json!({
                "name": "projects/fire-test/operations/BAD",
                "done": true,
                "metadata": {"state": "FAILED"},
                "error": {"code": 3, "message": "Image.clip: invalid geometry"}
            }));
        });

        let client = client(&server);
        assert_eq!(
            client
                .task_state("projects/fire-test/operations/RUN")
                .await
                .unwrap(),
            TaskState::Running
        );
        assert_eq!(
            client
                .task_state("projects/fire-test/operations/OK")
                .await
                .unwrap(),
            TaskState::Completed
        );
        assert_eq!(
            client
                .task_state("projects/fire-test/operations/BAD")
                .await
                .unwrap(),
            TaskState::Failed {
                message: "Image.clip: invalid geometry".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_task_state_server_error_is_platform_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/projects/fire-test/operations/X");
            then.status(503);
        });

        let err = client(&server)
            .task_state("projects/fire-test/operations/X")
            .await
            .unwrap_err();
        assert!(matches!(err, FireRiskError::PlatformError { status: 503, .. }));
    }
}
