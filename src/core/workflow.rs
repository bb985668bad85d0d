use crate::core::builder::RiskLayerBuilder;
use crate::core::dispatcher::ExportDispatcher;
use crate::core::poller::CompletionPoller;
use crate::domain::model::{Artifact, ExportTask, LayerKind, LayerRequest, Region};
use crate::domain::ports::{AnalysisPlatform, ArtifactSource, Storage};
use crate::utils::error::{FireRiskError, Result};
use crate::utils::monitor::SystemMonitor;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct LayerOutcome {
    pub kind: LayerKind,
    pub file_name: String,
    /// 提交失敗時為 None
    pub task: Option<ExportTask>,
    pub result: Result<Artifact>,
}

#[derive(Debug)]
pub struct RunReport {
    pub region: Region,
    pub layers: Vec<LayerOutcome>,
}

impl RunReport {
    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.layers.iter().filter_map(|l| l.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &LayerOutcome> {
        self.layers.iter().filter(|l| l.result.is_err())
    }

    pub fn is_complete(&self) -> bool {
        self.layers.iter().all(|l| l.result.is_ok())
    }

    /// 至少一個圖層因取消而未完成
    pub fn was_cancelled(&self) -> bool {
        self.layers
            .iter()
            .any(|l| matches!(l.result, Err(FireRiskError::CancelledError { .. })))
    }
}

/// Selector → Builder → Dispatcher → Poller
pub struct FireRiskWorkflow<P, A, S>
where
    P: AnalysisPlatform,
    A: ArtifactSource,
    S: Storage,
{
    platform: P,
    source: A,
    builder: RiskLayerBuilder,
    dispatcher: ExportDispatcher,
    poller: CompletionPoller<S>,
    monitor: SystemMonitor,
}

impl<P, A, S> FireRiskWorkflow<P, A, S>
where
    P: AnalysisPlatform,
    A: ArtifactSource,
    S: Storage,
{
    pub fn new(
        platform: P,
        source: A,
        builder: RiskLayerBuilder,
        dispatcher: ExportDispatcher,
        poller: CompletionPoller<S>,
    ) -> Self {
        Self::new_with_monitoring(platform, source, builder, dispatcher, poller, false)
    }

    pub fn new_with_monitoring(
        platform: P,
        source: A,
        builder: RiskLayerBuilder,
        dispatcher: ExportDispatcher,
        poller: CompletionPoller<S>,
        monitor_enabled: bool,
    ) -> Self {
        Self {
            platform,
            source,
            builder,
            dispatcher,
            poller,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    /// 只建立圖層請求，不提交
    pub async fn plan(&self, region: &Region) -> Result<Vec<LayerRequest>> {
        self.builder.build(&self.platform, region).await
    }

    /// 建立請求失敗時整體中止；之後各圖層的錯誤分別記錄
    pub async fn run(&self, region: Region, cancel: &CancellationToken) -> Result<RunReport> {
        tracing::info!("🔥 Starting fire risk analysis for {}", region.name);
        self.monitor.log_stats("start");

        let requests = self.builder.build(&self.platform, &region).await?;
        self.monitor.log_stats("build");

        let submitted = self.dispatcher.dispatch(&self.platform, &requests).await;
        self.monitor.log_stats("dispatch");

        let mut layers: Vec<Option<LayerOutcome>> = Vec::with_capacity(requests.len());
        let mut to_poll = Vec::new();
        let mut poll_slots = Vec::new();

        for (index, (request, result)) in requests.iter().zip(submitted).enumerate() {
            match result {
                Ok(task) => {
                    to_poll.push(task);
                    poll_slots.push(index);
                    layers.push(None);
                }
                Err(e) => layers.push(Some(LayerOutcome {
                    kind: request.kind,
                    file_name: request.file_name.clone(),
                    task: None,
                    result: Err(e),
                })),
            }
        }

        if !to_poll.is_empty() {
            let polled = self
                .poller
                .poll(&self.platform, &self.source, to_poll, cancel)
                .await;
            for (index, task_result) in poll_slots.into_iter().zip(polled) {
                layers[index] = Some(LayerOutcome {
                    kind: task_result.task.layer,
                    file_name: task_result.task.file_name.clone(),
                    task: Some(task_result.task),
                    result: task_result.outcome,
                });
            }
        }
        self.monitor.log_stats("poll");

        let report = RunReport {
            region,
            layers: layers.into_iter().flatten().collect(),
        };

        tracing::info!(
            "📊 {} of {} layers downloaded",
            report.artifacts().count(),
            report.layers.len()
        );
        for failure in report.failures() {
            if let Err(e) = &failure.result {
                tracing::warn!("⚠️ {}: {}", failure.file_name, e);
            }
        }
        self.monitor.log_final_stats();

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::cli::LocalStorage;
    use crate::config::toml_config::{ExportConfig, RiskWeights};
    use crate::core::builder::AnalysisParams;
    use crate::core::poller::PollSettings;
    use crate::domain::expression::SourceCollection;
    use crate::domain::model::{Coordinate, DateRange, ExportRequest, RemoteFile, TaskState};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// 依檔名決定結果：LST 提交失敗，Slope 匯出失敗，其餘立即完成
    struct FakePlatform {
        submitted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AnalysisPlatform for FakePlatform {
        async fn count_images(&self, _source: &SourceCollection) -> Result<u64> {
            Ok(3)
        }

        async fn submit_export(&self, request: &ExportRequest) -> Result<String> {
            if request.file_name_prefix.ends_with("_LST") {
                return Err(FireRiskError::SubmissionError {
                    file_name: request.file_name_prefix.clone(),
                    message: "quota exceeded".to_string(),
                });
            }
            self.submitted
                .lock()
                .unwrap()
                .push(request.file_name_prefix.clone());
            Ok(format!("op-{}", request.file_name_prefix))
        }

        async fn task_state(&self, task_id: &str) -> Result<TaskState> {
            if task_id.ends_with("_Slope") {
                Ok(TaskState::Failed {
                    message: "Computation timed out".to_string(),
                })
            } else {
                Ok(TaskState::Completed)
            }
        }
    }

    struct FakeDrive;

    #[async_trait]
    impl ArtifactSource for FakeDrive {
        async fn fetch(&self, task: &ExportTask) -> Result<RemoteFile> {
            Ok(RemoteFile {
                name: format!("{}.tif", task.file_name),
                data: vec![0x49, 0x49, 0x2a, 0x00],
            })
        }
    }

    fn workflow(temp_dir: &TempDir) -> FireRiskWorkflow<FakePlatform, FakeDrive, LocalStorage> {
        let params = AnalysisParams {
            date_range: DateRange::new(
                NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2022, 3, 1).unwrap(),
            )
            .unwrap(),
            precipitation_lead_days: 30,
            max_cloud_percentage: 10.0,
            allow_fallback: false,
            weights: RiskWeights::default(),
        };
        FireRiskWorkflow::new(
            FakePlatform {
                submitted: Mutex::new(Vec::new()),
            },
            FakeDrive,
            RiskLayerBuilder::new(params),
            ExportDispatcher::new(ExportConfig::default()),
            CompletionPoller::new(
                LocalStorage::new(temp_dir.path()),
                PollSettings {
                    interval: Duration::from_millis(5),
                    timeout: Duration::from_secs(5),
                },
            ),
        )
    }

    fn fars() -> Region {
        Region::buffered("Fars", Coordinate::new(52.5311, 29.5893), 30_000.0)
    }

    #[tokio::test]
    async fn test_run_reports_each_layer_independently() {
        let temp_dir = TempDir::new().unwrap();

        let report = workflow(&temp_dir)
            .run(fars(), &CancellationToken::new())
            .await
            .unwrap();

        let kinds: Vec<_> = report.layers.iter().map(|l| l.kind).collect();
        assert_eq!(kinds, LayerKind::ALL.to_vec());
        assert_eq!(report.artifacts().count(), 4);
        assert!(!report.is_complete());
        assert!(!report.was_cancelled());

        let lst = &report.layers[1];
        assert!(lst.task.is_none());
        assert!(matches!(lst.result, Err(FireRiskError::SubmissionError { .. })));

        let slope = &report.layers[3];
        assert!(matches!(slope.result, Err(FireRiskError::ExportFailedError { .. })));
        assert!(!temp_dir.path().join("Fars_Slope.tif").exists());
        assert!(temp_dir.path().join("Fars_FireRisk.tif").exists());
    }

    #[tokio::test]
    async fn test_cancelled_run_is_reported_as_cancelled() {
        let temp_dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = workflow(&temp_dir).run(fars(), &cancel).await.unwrap();

        assert!(report.was_cancelled());
        assert_eq!(report.artifacts().count(), 0);
        assert!(matches!(
            report.layers[0].result,
            Err(FireRiskError::CancelledError { .. })
        ));
        assert_eq!(std::fs::read_dir(temp_dir.path()).map(|d| d.count()).unwrap_or(0), 0);
    }
}
