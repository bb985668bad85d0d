use crate::adapters::{ensure_success, Call};
use crate::config::toml_config::DriveConfig;
use crate::domain::model::{ExportTask, RemoteFile};
use crate::domain::ports::ArtifactSource;
use crate::utils::error::{FireRiskError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::time::Duration;

const SERVICE: &str = "drive";
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const NEWEST_FIRST: &str = "modifiedTime desc";

#[derive(Debug, Clone, Deserialize)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Drive 查詢字串中的單引號需跳脫
fn quoted(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

pub fn folder_query(folder: &str) -> String {
    format!(
        "name={} and mimeType='{}' and trashed=false",
        quoted(folder),
        FOLDER_MIME_TYPE
    )
}

pub fn file_query(folder_id: &str, file_name: &str) -> String {
    format!(
        "{} in parents and name contains {} and trashed=false",
        quoted(folder_id),
        quoted(file_name)
    )
}

/// 雲端硬碟客戶端：依匯出資料夾與檔名找出檔案並下載
#[derive(Debug, Clone)]
pub struct DriveClient {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl DriveClient {
    pub fn new(config: &DriveConfig, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn list(&self, query: &str, order_by: Option<&str>, file_name: &str) -> Result<Vec<DriveFile>> {
        let url = format!("{}/drive/v3/files", self.endpoint);
        let mut request = self
            .authorized(self.client.get(&url))
            .query(&[("q", query), ("fields", "files(id,name,modifiedTime)")]);
        if let Some(order_by) = order_by {
            request = request.query(&[("orderBy", order_by)]);
        }
        let response = request.send().await?;
        let response = ensure_success(response, SERVICE, Call::Download { file_name }).await?;
        let list: FileList = response.json().await?;
        Ok(list.files)
    }

    pub async fn find_folder(&self, folder: &str) -> Result<String> {
        self.list(&folder_query(folder), None, folder)
            .await?
            .into_iter()
            .next()
            .map(|f| f.id)
            .ok_or_else(|| FireRiskError::DownloadError {
                file_name: folder.to_string(),
                message: format!("folder '{}' not found in drive", folder),
            })
    }

    /// 重跑會在同一資料夾留下同名檔案，依修改時間由新到舊列出，取最新的 "{name}.tif"。
    /// 沒有完全相符時只接受單一的延伸檔名；分塊匯出（多個不同檔名）視為錯誤。
    pub async fn find_file(&self, folder_id: &str, file_name: &str) -> Result<DriveFile> {
        let mut files = self
            .list(&file_query(folder_id, file_name), Some(NEWEST_FIRST), file_name)
            .await?;

        let exact = format!("{}.tif", file_name);
        if let Some(position) = files.iter().position(|f| f.name == exact) {
            return Ok(files.swap_remove(position));
        }

        files.retain(|f| {
            f.name
                .strip_prefix(file_name)
                .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('-'))
        });

        let mut names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        names.sort();
        names.dedup();

        match names.len() {
            0 => Err(FireRiskError::DownloadError {
                file_name: file_name.to_string(),
                message: "export finished but no matching file is in the folder".to_string(),
            }),
            1 => Ok(files.swap_remove(0)),
            tiles => Err(FireRiskError::DownloadError {
                file_name: file_name.to_string(),
                message: format!(
                    "export was split into {} tiles ({}); raise export.scale_meters or narrow the region",
                    tiles,
                    names.join(", ")
                ),
            }),
        }
    }

    pub async fn download(&self, file: &DriveFile) -> Result<Vec<u8>> {
        let url = format!("{}/drive/v3/files/{}", self.endpoint, file.id);
        let response = self
            .authorized(self.client.get(&url))
            .query(&[("alt", "media")])
            .send()
            .await?;
        let response = ensure_success(
            response,
            SERVICE,
            Call::Download {
                file_name: &file.name,
            },
        )
        .await?;

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ArtifactSource for DriveClient {
    async fn fetch(&self, task: &ExportTask) -> Result<RemoteFile> {
        let folder_id = self.find_folder(&task.folder).await?;
        let file = self.find_file(&folder_id, &task.file_name).await?;
        tracing::debug!("Found {} ({}) for task {}", file.name, file.id, task.id);

        let data = self.download(&file).await?;
        Ok(RemoteFile {
            name: file.name,
            data,
        })
    }
}
