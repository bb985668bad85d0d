pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::config::toml_config::FireRiskConfig;
#[cfg(feature = "cli")]
use chrono::NaiveDate;
#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "fire-risk")]
#[command(about = "Fire risk layers from satellite imagery: select a region, export, download")]
pub struct CliConfig {
    /// Path to TOML configuration file (optional)
    #[arg(short, long, default_value = "fire-risk.toml")]
    pub config: String,

    /// Province name, e.g. "Fars"
    #[arg(long, conflicts_with_all = ["click", "lon"])]
    pub province: Option<String>,

    /// Map click in canvas pixels, "X,Y"
    #[arg(long, value_delimiter = ',', conflicts_with = "lon")]
    pub click: Option<Vec<i64>>,

    /// Longitude of a custom analysis point (requires --lat)
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,

    /// Latitude of a custom analysis point (requires --lon)
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    #[arg(long)]
    pub start: Option<NaiveDate>,

    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Download directory; existing files with the same name are overwritten
    #[arg(long)]
    pub output_dir: Option<String>,

    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Overall wait for exports, in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Print the province table with map positions and exit
    #[arg(long)]
    pub list_provinces: bool,

    /// Build and print the layer requests without submitting them
    #[arg(long)]
    pub dry_run: bool,

    /// Log elapsed time and memory per stage
    #[arg(long)]
    pub monitor: bool,

    /// Emit JSON log lines instead of the compact format
    #[arg(long)]
    pub json_logs: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 命令列參數覆蓋檔案設定
    pub fn apply_overrides(&self, config: &mut FireRiskConfig) {
        if let Some(start) = self.start {
            config.analysis.start_date = start;
        }
        if let Some(end) = self.end {
            config.analysis.end_date = end;
        }
        if let Some(dir) = &self.output_dir {
            config.download.output_dir = dir.clone();
        }
        if let Some(interval) = self.poll_interval {
            config.download.poll_interval_seconds = interval;
        }
        if let Some(timeout) = self.timeout {
            config.download.timeout_seconds = timeout;
        }
    }
}
