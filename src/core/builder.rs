//! Assembles the six layer requests for one region.
//!
//! Normalisation ranges and fallback constants mirror the field-tested values
//! used for Iranian provinces; the fire-risk weights come from configuration.

use crate::config::toml_config::{AnalysisConfig, RiskWeights};
use crate::domain::expression::{
    LayerExpression, PropertyBound, Reducer, SourceCollection, TerrainProduct, WeightedTerm,
};
use crate::domain::model::{DateRange, LayerKind, LayerRequest, Region};
use crate::domain::ports::AnalysisPlatform;
use crate::utils::error::{FireRiskError, Result};

pub const SENTINEL2_SR: &str = "COPERNICUS/S2_SR";
pub const MODIS_LST: &str = "MODIS/006/MOD11A2";
pub const CHIRPS_DAILY: &str = "UCSB-CHG/CHIRPS/DAILY";
pub const SRTM_DEM: &str = "USGS/SRTMGL1_003";

const NDVI_RANGE: (f64, f64) = (0.0, 1.0);
const LST_RANGE_CELSIUS: (f64, f64) = (20.0, 45.0);
const SLOPE_RANGE_DEGREES: (f64, f64) = (0.0, 60.0);
const PRECIP_RANGE_MM: (f64, f64) = (0.0, 150.0);

const NDVI_FALLBACK: f64 = 0.0;
const LST_FALLBACK_CELSIUS: f64 = 25.0;
const PRECIP_FALLBACK_MM: f64 = 10.0;

/// MOD11A2 的 LST 為 0.02 K 單位
const LST_SCALE: f64 = 0.02;
const KELVIN_OFFSET: f64 = -273.15;

/// 朝南坡向得分 1，朝北 -1
const ASPECT_SOUTH_FORMULA: &str = "cos((aspect - 180) * 3.1416 / 180)";

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisParams {
    pub date_range: DateRange,
    pub precipitation_lead_days: u32,
    pub max_cloud_percentage: f64,
    pub allow_fallback: bool,
    pub weights: RiskWeights,
}

impl AnalysisParams {
    pub fn from_config(config: &AnalysisConfig, date_range: DateRange) -> Self {
        Self {
            date_range,
            precipitation_lead_days: config.precipitation_lead_days,
            max_cloud_percentage: config.max_cloud_percentage,
            allow_fallback: config.allow_fallback,
            weights: config.weights,
        }
    }
}

pub struct RiskLayerBuilder {
    params: AnalysisParams,
}

impl RiskLayerBuilder {
    pub fn new(params: AnalysisParams) -> Self {
        Self { params }
    }

    /// 依 LayerKind::ALL 的順序產生六個圖層請求
    pub async fn build<P: AnalysisPlatform + ?Sized>(
        &self,
        platform: &P,
        region: &Region,
    ) -> Result<Vec<LayerRequest>> {
        let range = self.params.date_range;
        tracing::info!("🧱 Building layer requests for {} ({})", region.name, range);

        let s2 = SourceCollection {
            id: SENTINEL2_SR.to_string(),
            bounds: region.geometry.clone(),
            start: range.start,
            end: range.end,
            property_bound: Some(PropertyBound {
                property: "CLOUDY_PIXEL_PERCENTAGE".to_string(),
                less_than: self.params.max_cloud_percentage,
            }),
            select: None,
        };
        let modis = SourceCollection {
            id: MODIS_LST.to_string(),
            bounds: region.geometry.clone(),
            start: range.start,
            end: range.end,
            property_bound: None,
            select: Some("LST_Day_1km".to_string()),
        };
        let precip_range = range.with_lead_days(self.params.precipitation_lead_days);
        let chirps = SourceCollection {
            id: CHIRPS_DAILY.to_string(),
            bounds: region.geometry.clone(),
            start: precip_range.start,
            end: precip_range.end,
            property_bound: None,
            select: None,
        };

        let ndvi = match self.ensure_available(platform, &s2, region).await? {
            true => LayerExpression::NormalizedDifference {
                input: Box::new(LayerExpression::composite(s2, Reducer::Median)),
                bands: ["B8".to_string(), "B4".to_string()],
            },
            false => LayerExpression::constant(NDVI_FALLBACK),
        }
        .rename("NDVI");

        let lst = match self.ensure_available(platform, &modis, region).await? {
            true => LayerExpression::composite(modis, Reducer::Mean).linear(LST_SCALE, KELVIN_OFFSET),
            false => LayerExpression::constant(LST_FALLBACK_CELSIUS),
        }
        .rename("LST");

        let precip = match self.ensure_available(platform, &chirps, region).await? {
            true => LayerExpression::composite(chirps, Reducer::Sum),
            false => LayerExpression::constant(PRECIP_FALLBACK_MM),
        }
        .rename("Precip");

        let dem = LayerExpression::Image {
            id: SRTM_DEM.to_string(),
        }
        .clip(region.geometry.clone());
        let slope = LayerExpression::Terrain {
            input: Box::new(dem.clone()),
            product: TerrainProduct::Slope,
        }
        .rename("Slope");
        let aspect = LayerExpression::Terrain {
            input: Box::new(dem),
            product: TerrainProduct::Aspect,
        }
        .rename("Aspect");
        let aspect_score = LayerExpression::Formula {
            input: Box::new(aspect),
            variable: "aspect".to_string(),
            formula: ASPECT_SOUTH_FORMULA.to_string(),
        }
        .rename("Aspect_Score");

        let fire_risk = fire_risk_expression(
            &self.params.weights,
            &ndvi,
            &lst,
            &slope,
            &aspect_score,
            &precip,
        );

        let layers = [
            (LayerKind::Ndvi, ndvi),
            (LayerKind::Lst, lst),
            (LayerKind::Precipitation, precip),
            (LayerKind::Slope, slope),
            (LayerKind::AspectScore, aspect_score),
            (LayerKind::FireRisk, fire_risk),
        ];

        let requests: Vec<LayerRequest> = layers
            .into_iter()
            .map(|(kind, expression)| LayerRequest {
                kind,
                region: region.clone(),
                date_range: range,
                file_name: format!("{}_{}", region.file_stem(), kind),
                expression,
            })
            .collect();

        tracing::info!("✅ Built {} layer requests", requests.len());
        Ok(requests)
    }

    /// 平台回報零張影像時：允許後備值則回傳 false，否則報錯
    async fn ensure_available<P: AnalysisPlatform + ?Sized>(
        &self,
        platform: &P,
        source: &SourceCollection,
        region: &Region,
    ) -> Result<bool> {
        let count = platform.count_images(source).await?;
        tracing::debug!("{} has {} images for {}", source.id, count, region.name);

        if count > 0 {
            return Ok(true);
        }
        if self.params.allow_fallback {
            tracing::warn!(
                "⚠️ No {} imagery for {} ({}..{}), using constant fallback",
                source.id,
                region.name,
                source.start,
                source.end
            );
            return Ok(false);
        }
        Err(FireRiskError::DataUnavailableError {
            collection: source.id.clone(),
            region: region.name.clone(),
            start: source.start.to_string(),
            end: source.end.to_string(),
        })
    }
}

/// fire_risk = Σ wᵢ · normᵢ，各輸入先縮放到 0..1（坡向得分本身已在 -1..1）
pub fn fire_risk_expression(
    weights: &RiskWeights,
    ndvi: &LayerExpression,
    lst: &LayerExpression,
    slope: &LayerExpression,
    aspect_score: &LayerExpression,
    precip: &LayerExpression,
) -> LayerExpression {
    let term = |weight: f64, input: LayerExpression| WeightedTerm { weight, input };

    LayerExpression::WeightedSum {
        terms: vec![
            term(
                weights.lst,
                lst.clone().unit_scale(LST_RANGE_CELSIUS.0, LST_RANGE_CELSIUS.1),
            ),
            term(weights.ndvi, ndvi.clone().unit_scale(NDVI_RANGE.0, NDVI_RANGE.1)),
            term(
                weights.slope,
                slope
                    .clone()
                    .unit_scale(SLOPE_RANGE_DEGREES.0, SLOPE_RANGE_DEGREES.1),
            ),
            term(weights.aspect, aspect_score.clone()),
            term(
                weights.precipitation,
                precip.clone().unit_scale(PRECIP_RANGE_MM.0, PRECIP_RANGE_MM.1),
            ),
        ],
    }
    .rename("Fire_Risk")
}
