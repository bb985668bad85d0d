use crate::config::toml_config::ExportConfig;
use crate::domain::model::{ExportRequest, ExportTask, LayerRequest, TaskStatus};
use crate::domain::ports::AnalysisPlatform;
use crate::utils::error::{FireRiskError, Result};
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct ExportDispatcher {
    settings: ExportConfig,
}

impl ExportDispatcher {
    pub fn new(settings: ExportConfig) -> Self {
        Self { settings }
    }

    pub fn export_request(&self, request: &LayerRequest) -> ExportRequest {
        ExportRequest {
            description: request.file_name.clone(),
            file_name_prefix: request.file_name.clone(),
            folder: self.settings.folder.clone(),
            file_format: self.settings.file_format.clone(),
            region: request.region.geometry.bounds(),
            scale_meters: self.settings.scale_meters,
            max_pixels: self.settings.max_pixels,
            expression: request.expression.clone(),
        }
    }

    /// 每個請求都回傳一個結果（工作或錯誤），順序與輸入相同
    pub async fn dispatch<P: AnalysisPlatform + ?Sized>(
        &self,
        platform: &P,
        requests: &[LayerRequest],
    ) -> Vec<Result<ExportTask>> {
        let mut seen = HashSet::new();
        let mut results = Vec::with_capacity(requests.len());

        for request in requests {
            // 同名匯出會在雲端硬碟上互相覆蓋
            if !seen.insert(request.file_name.as_str()) {
                tracing::error!("❌ Duplicate export target {}", request.file_name);
                results.push(Err(FireRiskError::SubmissionError {
                    file_name: request.file_name.clone(),
                    message: "another task in this batch already targets this file name"
                        .to_string(),
                }));
                continue;
            }

            results.push(self.submit(platform, request).await);
        }

        let submitted = results.iter().filter(|r| r.is_ok()).count();
        tracing::info!("📤 Submitted {}/{} exports", submitted, requests.len());
        results
    }

    async fn submit<P: AnalysisPlatform + ?Sized>(
        &self,
        platform: &P,
        request: &LayerRequest,
    ) -> Result<ExportTask> {
        if !request.region.geometry.is_well_formed() {
            return Err(FireRiskError::SubmissionError {
                file_name: request.file_name.clone(),
                message: "region geometry is not well formed".to_string(),
            });
        }

        let export = self.export_request(request);
        match platform.submit_export(&export).await {
            Ok(id) => {
                tracing::info!("🚀 Export started: {} ({})", request.file_name, id);
                Ok(ExportTask {
                    id,
                    layer: request.kind,
                    file_name: request.file_name.clone(),
                    folder: export.folder,
                    status: TaskStatus::Pending,
                })
            }
            Err(e) => {
                tracing::error!("❌ Export {} not submitted: {}", request.file_name, e);
                Err(e)
            }
        }
    }
}
