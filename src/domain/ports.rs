use crate::domain::expression::SourceCollection;
use crate::domain::model::{ExportRequest, ExportTask, RemoteFile, TaskState};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::PathBuf;

pub trait Storage: Send + Sync {
    /// 寫入檔案並回傳完整路徑；寫入失敗時不得留下部分檔案
    fn write_file(
        &self,
        name: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<PathBuf>> + Send;
}

/// 遠端影像分析平台
#[async_trait]
pub trait AnalysisPlatform: Send + Sync {
    async fn count_images(&self, source: &SourceCollection) -> Result<u64>;
    /// 建立匯出工作，回傳平台指派的工作 ID
    async fn submit_export(&self, request: &ExportRequest) -> Result<String>;
    async fn task_state(&self, task_id: &str) -> Result<TaskState>;
}

/// 匯出檔案的來源（雲端硬碟）
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn fetch(&self, task: &ExportTask) -> Result<RemoteFile>;
}
