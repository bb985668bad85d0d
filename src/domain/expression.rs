//! Serialisable raster expressions evaluated by the remote analysis platform.
//!
//! The tree only describes the computation; nothing here touches pixels.

use crate::domain::model::Geometry;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    Median,
    Mean,
    Sum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainProduct {
    Slope,
    Aspect,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyBound {
    pub property: String,
    pub less_than: f64,
}

/// 影像集合與篩選條件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCollection {
    pub id: String,
    pub bounds: Geometry,
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_bound: Option<PropertyBound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedTerm {
    pub weight: f64,
    pub input: LayerExpression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LayerExpression {
    Composite {
        source: SourceCollection,
        reducer: Reducer,
    },
    Image {
        id: String,
    },
    Constant {
        value: f64,
    },
    NormalizedDifference {
        input: Box<LayerExpression>,
        bands: [String; 2],
    },
    /// input * scale + offset
    Linear {
        input: Box<LayerExpression>,
        scale: f64,
        offset: f64,
    },
    Terrain {
        input: Box<LayerExpression>,
        product: TerrainProduct,
    },
    /// 線性縮放到 0..1 並截斷
    UnitScale {
        input: Box<LayerExpression>,
        low: f64,
        high: f64,
    },
    Formula {
        input: Box<LayerExpression>,
        variable: String,
        formula: String,
    },
    WeightedSum {
        terms: Vec<WeightedTerm>,
    },
    Clip {
        input: Box<LayerExpression>,
        geometry: Geometry,
    },
    Rename {
        input: Box<LayerExpression>,
        band: String,
    },
}

impl LayerExpression {
    pub fn composite(source: SourceCollection, reducer: Reducer) -> Self {
        LayerExpression::Composite { source, reducer }
    }

    pub fn constant(value: f64) -> Self {
        LayerExpression::Constant { value }
    }

    pub fn linear(self, scale: f64, offset: f64) -> Self {
        LayerExpression::Linear {
            input: Box::new(self),
            scale,
            offset,
        }
    }

    pub fn unit_scale(self, low: f64, high: f64) -> Self {
        LayerExpression::UnitScale {
            input: Box::new(self),
            low,
            high,
        }
    }

    pub fn clip(self, geometry: Geometry) -> Self {
        LayerExpression::Clip {
            input: Box::new(self),
            geometry,
        }
    }

    pub fn rename(self, band: impl Into<String>) -> Self {
        LayerExpression::Rename {
            input: Box::new(self),
            band: band.into(),
        }
    }

    /// 最外層的波段名稱
    pub fn band_name(&self) -> Option<&str> {
        match self {
            LayerExpression::Rename { band, .. } => Some(band),
            _ => None,
        }
    }
}
