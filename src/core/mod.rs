pub mod builder;
pub mod dispatcher;
pub mod poller;
pub mod selector;
pub mod workflow;

pub use crate::domain::model::{Artifact, ExportTask, LayerKind, LayerRequest, Region};
pub use crate::domain::ports::{AnalysisPlatform, ArtifactSource, Storage};
pub use crate::utils::error::Result;
