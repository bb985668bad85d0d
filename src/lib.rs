pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{drive::DriveClient, earth_engine::EarthEngineClient};
pub use config::{cli::LocalStorage, toml_config::FireRiskConfig};
pub use core::{
    builder::{AnalysisParams, RiskLayerBuilder},
    dispatcher::ExportDispatcher,
    poller::{CompletionPoller, PollSettings, TaskResult},
    selector::{MapProjection, RegionSelector, PROVINCES},
    workflow::{FireRiskWorkflow, LayerOutcome, RunReport},
};
pub use utils::error::{FireRiskError, Result};
