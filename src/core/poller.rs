use crate::domain::model::{Artifact, ExportTask, RemoteFile, TaskState, TaskStatus};
use crate::domain::ports::{AnalysisPlatform, ArtifactSource, Storage};
use crate::utils::error::{FireRiskError, Result};
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::time::{Instant as TokioInstant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

/// 單一匯出工作的最終結果
#[derive(Debug)]
pub struct TaskResult {
    pub task: ExportTask,
    pub outcome: Result<Artifact>,
}

pub struct CompletionPoller<S: Storage> {
    storage: S,
    settings: PollSettings,
}

/// 進行中的遠端呼叫被取消或逾時打斷
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupted {
    Cancelled,
    Deadline,
}

/// 遠端呼叫與取消、整體期限競速；被打斷時呼叫結果直接丟棄
async fn race<F: Future>(
    call: F,
    cancel: &CancellationToken,
    deadline: TokioInstant,
) -> std::result::Result<F::Output, Interrupted> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted::Cancelled),
        _ = tokio::time::sleep_until(deadline) => Err(Interrupted::Deadline),
        output = call => Ok(output),
    }
}

impl<S: Storage> CompletionPoller<S> {
    pub fn new(storage: S, settings: PollSettings) -> Self {
        Self { storage, settings }
    }

    /// 輪詢直到所有工作結束、逾時或被取消。每個輸入工作都對應一個結果，順序不變。
    pub async fn poll<P, A>(
        &self,
        platform: &P,
        source: &A,
        tasks: Vec<ExportTask>,
        cancel: &CancellationToken,
    ) -> Vec<TaskResult>
    where
        P: AnalysisPlatform + ?Sized,
        A: ArtifactSource + ?Sized,
    {
        let mut slots: Vec<(ExportTask, Option<Result<Artifact>>)> =
            tasks.into_iter().map(|task| (task, None)).collect();

        let started = Instant::now();
        let deadline = TokioInstant::now() + self.settings.timeout;
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            "⏳ Waiting for {} exports (every {:?}, up to {:?})",
            slots.len(),
            self.settings.interval,
            self.settings.timeout
        );

        while slots.iter().any(|(_, outcome)| outcome.is_none()) {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::warn!("🛑 Polling cancelled");
                    for (task, outcome) in slots.iter_mut().filter(|(_, o)| o.is_none()) {
                        *outcome = Some(Err(FireRiskError::CancelledError {
                            task_id: task.id.clone(),
                        }));
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    let pending: Vec<String> = slots
                        .iter()
                        .filter(|(_, o)| o.is_none())
                        .map(|(task, _)| task.id.clone())
                        .collect();
                    let elapsed_secs = started.elapsed().as_secs();
                    tracing::error!("⌛ Timed out with {} exports still pending", pending.len());
                    for (_, outcome) in slots.iter_mut().filter(|(_, o)| o.is_none()) {
                        *outcome = Some(Err(FireRiskError::TimeoutError {
                            elapsed_secs,
                            pending: pending.clone(),
                        }));
                    }
                }
                _ = ticker.tick() => {
                    if let Err(interrupted) = self
                        .poll_once(platform, source, &mut slots, cancel, deadline)
                        .await
                    {
                        tracing::debug!("Poll pass interrupted: {:?}", interrupted);
                    }
                }
            }
        }

        slots
            .into_iter()
            .map(|(task, outcome)| TaskResult {
                task,
                outcome: outcome.unwrap_or_else(|| {
                    Err(FireRiskError::ConfigError {
                        message: "poll loop ended without an outcome".to_string(),
                    })
                }),
            })
            .collect()
    }

    /// 查詢與下載都與取消、期限競速；寫檔不競速，避免留下 .part 檔
    async fn poll_once<P, A>(
        &self,
        platform: &P,
        source: &A,
        slots: &mut [(ExportTask, Option<Result<Artifact>>)],
        cancel: &CancellationToken,
        deadline: TokioInstant,
    ) -> std::result::Result<(), Interrupted>
    where
        P: AnalysisPlatform + ?Sized,
        A: ArtifactSource + ?Sized,
    {
        for (task, outcome) in slots.iter_mut().filter(|(_, o)| o.is_none()) {
            let state = match race(platform.task_state(&task.id), cancel, deadline).await? {
                Ok(state) => state,
                Err(e) => {
                    tracing::error!("❌ Status query for {} failed: {}", task.file_name, e);
                    *outcome = Some(Err(e));
                    continue;
                }
            };

            let previous = task.status;
            task.status = TaskStatus::from(&state);
            if previous != task.status {
                tracing::info!("🔄 {} {:?} → {:?}", task.file_name, previous, task.status);
            }

            match state {
                TaskState::Pending | TaskState::Running => {}
                TaskState::Failed { message } => {
                    tracing::error!("❌ Export {} failed: {}", task.file_name, message);
                    *outcome = Some(Err(FireRiskError::ExportFailedError {
                        task_id: task.id.clone(),
                        file_name: task.file_name.clone(),
                        message,
                    }));
                }
                TaskState::Completed => {
                    tracing::info!("⬇️ Downloading {}...", task.file_name);
                    let result = match race(source.fetch(task), cancel, deadline).await? {
                        Ok(file) => self.save(task, file).await,
                        Err(e) => Err(e),
                    };
                    if result.is_ok() {
                        task.status = TaskStatus::Downloaded;
                    }
                    *outcome = Some(result);
                }
            }
        }
        Ok(())
    }

    async fn save(&self, task: &ExportTask, file: RemoteFile) -> Result<Artifact> {
        // 只保留檔名部分，避免寫出輸出目錄
        let file_name = Path::new(&file.name)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| FireRiskError::DownloadError {
                file_name: task.file_name.clone(),
                message: format!("unusable remote file name '{}'", file.name),
            })?
            .to_string();

        let path = self.storage.write_file(&file_name, &file.data).await?;
        tracing::info!("📁 Saved {}", path.display());

        Ok(Artifact {
            task_id: task.id.clone(),
            layer: task.layer,
            file_name,
            path,
            bytes: file.data.len() as u64,
        })
    }
}
