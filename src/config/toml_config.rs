use crate::domain::model::DateRange;
use crate::utils::error::{FireRiskError, Result};
use crate::utils::validation::{self, Validate};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FireRiskConfig {
    pub platform: PlatformConfig,
    pub drive: DriveConfig,
    pub analysis: AnalysisConfig,
    pub export: ExportConfig,
    pub download: DownloadConfig,
    pub map: MapConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub endpoint: String,
    pub project: String,
    pub access_token: Option<String>,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub endpoint: String,
    pub access_token: Option<String>,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub default_region: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub precipitation_lead_days: u32,
    pub buffer_meters: f64,
    pub max_cloud_percentage: f64,
    pub allow_fallback: bool,
    pub weights: RiskWeights,
}

/// 火災風險加權；正值提高風險，負值降低風險
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub lst: f64,
    pub ndvi: f64,
    pub slope: f64,
    pub aspect: f64,
    pub precipitation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub folder: String,
    pub file_format: String,
    pub scale_meters: f64,
    pub max_pixels: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub output_dir: String,
    pub poll_interval_seconds: u64,
    pub timeout_seconds: u64,
}

/// 點選地圖的畫布範圍
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
    pub width: u32,
    pub height: u32,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://earthengine.googleapis.com".to_string(),
            project: "project-ee-458713".to_string(),
            access_token: None,
            request_timeout_seconds: 60,
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.googleapis.com".to_string(),
            access_token: None,
            request_timeout_seconds: 300,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_region: "Fars".to_string(),
            start_date: NaiveDate::from_ymd_opt(2023, 7, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2023, 8, 31).unwrap_or_default(),
            precipitation_lead_days: 30,
            buffer_meters: 30_000.0,
            max_cloud_percentage: 10.0,
            allow_fallback: false,
            weights: RiskWeights::default(),
        }
    }
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            lst: 0.3,
            ndvi: -0.3,
            slope: 0.15,
            aspect: 0.15,
            precipitation: -0.1,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            folder: "EarthEngineExports".to_string(),
            file_format: "GEO_TIFF".to_string(),
            scale_meters: 30.0,
            max_pixels: 10_000_000_000_000,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: "downloads".to_string(),
            poll_interval_seconds: 10,
            timeout_seconds: 3600,
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            min_lat: 25.0,
            max_lat: 39.0,
            min_lon: 44.0,
            max_lon: 63.0,
            width: 800,
            height: 1000,
        }
    }
}

impl RiskWeights {
    pub fn terms(&self) -> [(&'static str, f64); 5] {
        [
            ("lst", self.lst),
            ("ndvi", self.ndvi),
            ("slope", self.slope),
            ("aspect", self.aspect),
            ("precipitation", self.precipitation),
        ]
    }
}

impl FireRiskConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| FireRiskError::filesystem(path, e))?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        let mut config: Self =
            toml::from_str(&processed_content).map_err(|e| FireRiskError::ConfigParseError {
                field: "toml".to_string(),
                message: e.to_string(),
            })?;
        config.apply_env_defaults();
        Ok(config)
    }

    /// 替換環境變數 (例如 ${EE_ACCESS_TOKEN})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| FireRiskError::ConfigError {
            message: format!("env substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 未在檔案中指定權杖時改讀環境變數
    pub fn apply_env_defaults(&mut self) {
        if resolved_token(&self.platform.access_token).is_none() {
            self.platform.access_token = std::env::var("EE_ACCESS_TOKEN").ok();
        }
        if resolved_token(&self.drive.access_token).is_none() {
            self.drive.access_token = std::env::var("DRIVE_ACCESS_TOKEN").ok();
        }
    }

    pub fn date_range(&self) -> Result<DateRange> {
        DateRange::new(self.analysis.start_date, self.analysis.end_date).ok_or_else(|| {
            FireRiskError::InvalidConfigValueError {
                field: "analysis.end_date".to_string(),
                value: self.analysis.end_date.to_string(),
                reason: format!("must be after start_date {}", self.analysis.start_date),
            }
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.download.poll_interval_seconds)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_secs(self.download.timeout_seconds)
    }

    pub fn platform_token(&self) -> Option<&str> {
        resolved_token(&self.platform.access_token)
    }

    pub fn drive_token(&self) -> Option<&str> {
        resolved_token(&self.drive.access_token)
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("platform.endpoint", &self.platform.endpoint)?;
        validation::validate_url("drive.endpoint", &self.drive.endpoint)?;
        validation::validate_non_empty_string("platform.project", &self.platform.project)?;
        validation::validate_non_empty_string("export.folder", &self.export.folder)?;
        validation::validate_non_empty_string("export.file_format", &self.export.file_format)?;
        validation::validate_path("download.output_dir", &self.download.output_dir)?;

        validation::validate_positive_number(
            "download.poll_interval_seconds",
            self.download.poll_interval_seconds,
            1,
        )?;
        validation::validate_positive_number(
            "download.timeout_seconds",
            self.download.timeout_seconds,
            self.download.poll_interval_seconds,
        )?;
        validation::validate_range(
            "analysis.max_cloud_percentage",
            self.analysis.max_cloud_percentage,
            0.0,
            100.0,
        )?;
        validation::validate_range(
            "analysis.buffer_meters",
            self.analysis.buffer_meters,
            1.0,
            1_000_000.0,
        )?;
        validation::validate_range("export.scale_meters", self.export.scale_meters, 1.0, 100_000.0)?;

        self.date_range()?;

        for (name, weight) in self.analysis.weights.terms() {
            if !weight.is_finite() {
                return Err(FireRiskError::InvalidConfigValueError {
                    field: format!("analysis.weights.{}", name),
                    value: weight.to_string(),
                    reason: "weight must be a finite number".to_string(),
                });
            }
        }

        let map = &self.map;
        if map.min_lat >= map.max_lat || map.min_lon >= map.max_lon || map.width == 0 || map.height == 0 {
            return Err(FireRiskError::InvalidConfigValueError {
                field: "map".to_string(),
                value: format!("{:?}", map),
                reason: "map bounds must be non-empty".to_string(),
            });
        }

        Ok(())
    }
}

impl Validate for FireRiskConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

fn resolved_token(token: &Option<String>) -> Option<&str> {
    token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty() && !t.starts_with("${"))
}
