use crate::domain::expression::LayerExpression;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// 每緯度約 111.32 公里
const METERS_PER_DEGREE: f64 = 111_320.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    /// 以點為中心的圓形緩衝區
    Buffer {
        center: Coordinate,
        radius_meters: f64,
    },
    /// 封閉多邊形，首尾座標相同
    Polygon { ring: Vec<Coordinate> },
}

impl Geometry {
    /// 外接矩形，匯出時用作輸出範圍
    pub fn bounds(&self) -> Geometry {
        let (min_lon, min_lat, max_lon, max_lat) = match self {
            Geometry::Buffer {
                center,
                radius_meters,
            } => {
                let dlat = radius_meters / METERS_PER_DEGREE;
                let dlon = radius_meters / (METERS_PER_DEGREE * center.lat.to_radians().cos());
                (
                    center.lon - dlon,
                    center.lat - dlat,
                    center.lon + dlon,
                    center.lat + dlat,
                )
            }
            Geometry::Polygon { ring } => ring.iter().fold(
                (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
                |(min_lon, min_lat, max_lon, max_lat), c| {
                    (
                        min_lon.min(c.lon),
                        min_lat.min(c.lat),
                        max_lon.max(c.lon),
                        max_lat.max(c.lat),
                    )
                },
            ),
        };

        Geometry::Polygon {
            ring: vec![
                Coordinate::new(min_lon, min_lat),
                Coordinate::new(max_lon, min_lat),
                Coordinate::new(max_lon, max_lat),
                Coordinate::new(min_lon, max_lat),
                Coordinate::new(min_lon, min_lat),
            ],
        }
    }

    pub fn is_well_formed(&self) -> bool {
        match self {
            Geometry::Buffer {
                center,
                radius_meters,
            } => {
                center.lat.is_finite()
                    && center.lon.is_finite()
                    && (-90.0..=90.0).contains(&center.lat)
                    && (-180.0..=180.0).contains(&center.lon)
                    && *radius_meters > 0.0
            }
            Geometry::Polygon { ring } => ring.len() >= 4 && ring.first() == ring.last(),
        }
    }
}

/// 分析區域，選定後不可變更
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub geometry: Geometry,
}

impl Region {
    pub fn buffered(name: impl Into<String>, center: Coordinate, radius_meters: f64) -> Self {
        Self {
            name: name.into(),
            geometry: Geometry::Buffer {
                center,
                radius_meters,
            },
        }
    }

    /// 檔名用的區域名稱（空白轉底線）
    pub fn file_stem(&self) -> String {
        self.name.split_whitespace().collect::<Vec<_>>().join("_")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn with_lead_days(&self, days: u32) -> Self {
        Self {
            start: self.start - chrono::Duration::days(i64::from(days)),
            end: self.end,
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    #[serde(rename = "NDVI")]
    Ndvi,
    #[serde(rename = "LST")]
    Lst,
    Precipitation,
    Slope,
    AspectScore,
    FireRisk,
}

impl LayerKind {
    pub const ALL: [LayerKind; 6] = [
        LayerKind::Ndvi,
        LayerKind::Lst,
        LayerKind::Precipitation,
        LayerKind::Slope,
        LayerKind::AspectScore,
        LayerKind::FireRisk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKind::Ndvi => "NDVI",
            LayerKind::Lst => "LST",
            LayerKind::Precipitation => "Precipitation",
            LayerKind::Slope => "Slope",
            LayerKind::AspectScore => "AspectScore",
            LayerKind::FireRisk => "FireRisk",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 單一圖層的計算請求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRequest {
    pub kind: LayerKind,
    pub region: Region,
    pub date_range: DateRange,
    pub file_name: String,
    pub expression: LayerExpression,
}

/// 送往平台的匯出工作內容
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRequest {
    pub description: String,
    pub file_name_prefix: String,
    pub folder: String,
    pub file_format: String,
    pub region: Geometry,
    pub scale_meters: f64,
    pub max_pixels: u64,
    pub expression: LayerExpression,
}

/// 平台回報的工作狀態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// 僅存在於本地：檔案已下載
    Downloaded,
}

impl From<&TaskState> for TaskStatus {
    fn from(state: &TaskState) -> Self {
        match state {
            TaskState::Pending => TaskStatus::Pending,
            TaskState::Running => TaskStatus::Running,
            TaskState::Completed => TaskStatus::Completed,
            TaskState::Failed { .. } => TaskStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportTask {
    pub id: String,
    pub layer: LayerKind,
    pub file_name: String,
    pub folder: String,
    pub status: TaskStatus,
}

/// 雲端硬碟上的匯出檔案內容
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    pub task_id: String,
    pub layer: LayerKind,
    pub file_name: String,
    pub path: PathBuf,
    pub bytes: u64,
}
