// Domain layer: core models, raster expressions and ports (interfaces).

pub mod expression;
pub mod model;
pub mod ports;
