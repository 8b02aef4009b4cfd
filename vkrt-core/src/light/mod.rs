//! Scene light grid. See [`grid::LightGrid`] for the entry point.

pub mod cluster;
pub mod grid;
pub mod point;
pub mod polygon;

pub use cluster::{LightCluster, MAX_LIGHT_CLUSTERS, MAX_VISIBLE_POINT_LIGHTS, MAX_VISIBLE_SURFACE_LIGHTS};
pub use grid::{DynamicLightSample, GridDims, LightGrid, DEFAULT_CELL_SIZE, MAX_POINT_LIGHTS, MAX_POLYGON_LIGHTS};
pub use point::{environment_cos_theta_max, environment_radiance_correction, PointLight, PointLightFlags};
pub use polygon::{PolygonLight, MAX_POLYGON_LIGHT_VERTICES};
