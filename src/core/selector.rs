use crate::config::toml_config::MapConfig;
use crate::domain::model::{Coordinate, Region};
use crate::utils::error::{FireRiskError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Province {
    pub name: &'static str,
    pub lat: f64,
    pub lon: f64,
}

const fn province(name: &'static str, lat: f64, lon: f64) -> Province {
    Province { name, lat, lon }
}

/// 省份代表點（緯度、經度）
pub const PROVINCES: [Province; 30] = [
    province("Tehran", 35.6892, 51.3890),
    province("Isfahan", 32.6519, 51.6680),
    province("Fars", 29.5893, 52.5311),
    province("Razavi Khorasan", 36.3000, 59.6000),
    province("Mazandaran", 36.5525, 53.0762),
    province("Kurdistan", 34.7800, 46.5300),
    province("Khuzestan", 31.9391, 48.6692),
    province("East Azerbaijan", 38.0700, 46.2960),
    province("West Azerbaijan", 37.5300, 45.0000),
    province("Ardabil", 38.2500, 48.3000),
    province("Zanjan", 36.6764, 48.4963),
    province("Qazvin", 36.2700, 50.0000),
    province("Gilan", 37.2800, 49.5832),
    province("Golestan", 36.8400, 54.4300),
    province("Semnan", 35.5700, 53.4000),
    province("Alborz", 35.8400, 50.9400),
    province("Qom", 34.6400, 50.8800),
    province("Markazi", 34.1000, 49.7000),
    province("Hamedan", 34.8000, 48.5000),
    province("Ilam", 33.6300, 46.4200),
    province("Lorestan", 33.5800, 48.3500),
    province("Chaharmahal and Bakhtiari", 32.3200, 50.8600),
    province("Kohgiluyeh and Boyer-Ahmad", 30.6500, 51.6000),
    province("Bushehr", 28.9200, 50.8300),
    province("Hormozgan", 27.2000, 56.3700),
    province("Sistan and Baluchestan", 29.4900, 60.8500),
    province("Kerman", 30.2839, 57.0834),
    province("Yazd", 31.8974, 54.3569),
    province("South Khorasan", 32.8700, 59.2200),
    province("North Khorasan", 37.4700, 57.3300),
];

/// 地圖畫布與經緯度之間的等距線性投影
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapProjection {
    config: MapConfig,
}

impl MapProjection {
    pub fn new(config: MapConfig) -> Self {
        Self { config }
    }

    pub fn geo_to_pixel(&self, lat: f64, lon: f64) -> (i64, i64) {
        let c = &self.config;
        let x = (lon - c.min_lon) / (c.max_lon - c.min_lon) * f64::from(c.width);
        let y = (c.max_lat - lat) / (c.max_lat - c.min_lat) * f64::from(c.height);
        (x as i64, y as i64)
    }

    pub fn pixel_to_geo(&self, x: i64, y: i64) -> (f64, f64) {
        let c = &self.config;
        let lon = x as f64 / f64::from(c.width) * (c.max_lon - c.min_lon) + c.min_lon;
        let lat = c.max_lat - y as f64 / f64::from(c.height) * (c.max_lat - c.min_lat);
        (lat, lon)
    }

    pub fn contains_pixel(&self, x: i64, y: i64) -> bool {
        (0..i64::from(self.config.width)).contains(&x) && (0..i64::from(self.config.height)).contains(&y)
    }

    pub fn contains_geo(&self, lat: f64, lon: f64) -> bool {
        let c = &self.config;
        (c.min_lat..=c.max_lat).contains(&lat) && (c.min_lon..=c.max_lon).contains(&lon)
    }
}

impl Default for MapProjection {
    fn default() -> Self {
        Self::new(MapConfig::default())
    }
}

/// 將使用者操作（點選、輸入名稱、座標）轉為分析區域。純函式，無共享狀態。
#[derive(Debug, Clone)]
pub struct RegionSelector {
    projection: MapProjection,
    buffer_meters: f64,
    provinces: &'static [Province],
}

impl RegionSelector {
    pub fn new(projection: MapProjection, buffer_meters: f64) -> Self {
        Self {
            projection,
            buffer_meters,
            provinces: &PROVINCES,
        }
    }

    pub fn projection(&self) -> &MapProjection {
        &self.projection
    }

    pub fn provinces(&self) -> &'static [Province] {
        self.provinces
    }

    pub fn select_by_name(&self, name: &str) -> Result<Region> {
        let wanted = name.trim();
        self.provinces
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(wanted))
            .map(|p| self.region_for(p))
            .ok_or_else(|| FireRiskError::SelectionError {
                message: format!("unknown province '{}'", wanted),
            })
    }

    pub fn select_at_pixel(&self, x: i64, y: i64) -> Result<Region> {
        if !self.projection.contains_pixel(x, y) {
            return Err(FireRiskError::SelectionError {
                message: format!("click ({}, {}) is outside the map", x, y),
            });
        }
        let (lat, lon) = self.projection.pixel_to_geo(x, y);
        self.select_at_coordinates(lat, lon)
    }

    pub fn select_at_coordinates(&self, lat: f64, lon: f64) -> Result<Region> {
        if !self.projection.contains_geo(lat, lon) {
            return Err(FireRiskError::SelectionError {
                message: format!("({:.4}, {:.4}) is outside the mapped area", lat, lon),
            });
        }

        let nearest = self
            .provinces
            .iter()
            .map(|p| (p, (lat - p.lat).hypot(lon - p.lon)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(p, _)| p)
            .ok_or_else(|| FireRiskError::SelectionError {
                message: "province table is empty".to_string(),
            })?;

        tracing::info!(
            "📍 Selected {} (lat: {}, lon: {})",
            nearest.name,
            nearest.lat,
            nearest.lon
        );
        Ok(self.region_for(nearest))
    }

    /// 任意座標點，區域名稱為 "{lat}_{lon}"
    pub fn custom_point(&self, lon: f64, lat: f64) -> Result<Region> {
        let region = Region::buffered(
            format!("{}_{}", lat, lon),
            Coordinate::new(lon, lat),
            self.buffer_meters,
        );
        if !region.geometry.is_well_formed() {
            return Err(FireRiskError::SelectionError {
                message: format!("invalid coordinates lon={} lat={}", lon, lat),
            });
        }
        Ok(region)
    }

    fn region_for(&self, province: &Province) -> Region {
        Region::buffered(
            province.name,
            Coordinate::new(province.lon, province.lat),
            self.buffer_meters,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Geometry;

    fn selector() -> RegionSelector {
        RegionSelector::new(MapProjection::default(), 30_000.0)
    }

    #[test]
    fn test_select_by_name_is_case_insensitive() {
        let region = selector().select_by_name("  fars ").unwrap();
        assert_eq!(region.name, "Fars");
        assert_eq!(
            region.geometry,
            Geometry::Buffer {
                center: Coordinate::new(52.5311, 29.5893),
                radius_meters: 30_000.0,
            }
        );
    }

    #[test]
    fn test_unknown_name_is_selection_error() {
        let err = selector().select_by_name("Atlantis").unwrap_err();
        assert!(matches!(err, FireRiskError::SelectionError { .. }));
    }

    #[test]
    fn test_click_on_label_selects_that_province() {
        let selector = selector();
        for province in PROVINCES.iter() {
            let (x, y) = selector.projection().geo_to_pixel(province.lat, province.lon);
            let region = selector.select_at_pixel(x, y).unwrap();
            assert_eq!(region.name, province.name);
        }
    }

    #[test]
    fn test_pixel_round_trip_matches_projection() {
        let projection = MapProjection::default();
        let (lat, lon) = projection.pixel_to_geo(400, 500);
        assert!((lat - 32.0).abs() < 1e-9);
        assert!((lon - 53.5).abs() < 1e-9);
        assert_eq!(projection.geo_to_pixel(lat, lon), (400, 500));
    }

    #[test]
    fn test_click_outside_canvas_is_rejected() {
        let selector = selector();
        assert!(selector.select_at_pixel(-1, 10).is_err());
        assert!(selector.select_at_pixel(800, 10).is_err());
        assert!(selector.select_at_pixel(10, 1000).is_err());
    }

    #[test]
    fn test_coordinates_outside_map_are_rejected() {
        let err = selector().select_at_coordinates(48.85, 2.35).unwrap_err();
        assert!(matches!(err, FireRiskError::SelectionError { .. }));
    }

    #[test]
    fn test_custom_point_naming_and_validation() {
        let selector = selector();
        let region = selector.custom_point(52.5, 29.25).unwrap();
        assert_eq!(region.name, "29.25_52.5");

        assert!(selector.custom_point(f64::NAN, 29.0).is_err());
        assert!(selector.custom_point(52.0, 95.0).is_err());
    }
}
