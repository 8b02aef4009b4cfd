//! Scene light-grid: a uniform 3-D cell grid over the map bounds, each
//! cell holding the bounded set of lights that may affect it. Built once at
//! map load from BSP leafs + PVS, refreshed every frame for dynamic lights.

use std::collections::HashMap;

use glam::{IVec3, Vec3};

use crate::geom::{Aabb, LeafId, MapTopology, SurfaceId};
use crate::log::{LogCategory, LogThrottle};
use crate::log_warning;

use super::cluster::{LightCluster, MAX_LIGHT_CLUSTERS, MAX_VISIBLE_POINT_LIGHTS, MAX_VISIBLE_SURFACE_LIGHTS};
use super::point::{PointLight, PointLightFlags};
use super::polygon::PolygonLight;

const LOG: LogCategory = LogCategory::new("light_grid");

/// Fixed cell edge length in world units; not derived from map geometry.
pub const DEFAULT_CELL_SIZE: f32 = 128.0;

/// Global light array caps. Both are bounded by the per-cell `u8` index
/// width: a cell can only reference lights `0..=255`.
pub const MAX_POINT_LIGHTS: usize = 256;
pub const MAX_POLYGON_LIGHTS: usize = 256;

// Constants from `addDlight` in the original renderer: a dynamic light is
// converted to an equivalent small-radius point light whose intensity is
// derived from the published solid-angle approximation so that perceived
// brightness stays roughly constant regardless of the dlight's declared
// radius.
const DLIGHT_RADIUS: f32 = 2.0;
const DLIGHT_INTENSITY_THRESHOLD: f32 = 2.0;
const DLIGHT_EMPIRICAL_DIVISOR: f32 = 25.0;

/// `1 - sqrt(d^2 - r^2) / d`, the solid-angle-derived attenuation shape used
/// to scale a converted dynamic light so that total emitted power stays
/// roughly invariant to its declared radius.
pub fn solid_angle_attenuation(small_radius: f32, distance: f32) -> f32 {
    if distance <= small_radius {
        return 1.0;
    }
    1.0 - (distance * distance - small_radius * small_radius).sqrt() / distance
}

/// A frame's raw dynamic light sample, as the host engine reports it.
#[derive(Clone, Copy, Debug)]
pub struct DynamicLightSample {
    pub origin: Vec3,
    pub color: Vec3,
    pub radius: f32,
}

/// Converts a raw dynamic light sample into an equivalent [`PointLight`], or
/// `None` if it's too dim/small to bother with.
pub fn dynamic_light_to_point_light(sample: DynamicLightSample) -> Option<PointLight> {
    let max_component = sample.color.x.max(sample.color.y).max(sample.color.z);
    if max_component < DLIGHT_INTENSITY_THRESHOLD || sample.radius <= DLIGHT_RADIUS {
        return None;
    }

    let mut scale = DLIGHT_INTENSITY_THRESHOLD / (max_component * solid_angle_attenuation(DLIGHT_RADIUS, sample.radius));
    scale /= DLIGHT_EMPIRICAL_DIVISOR;

    Some(PointLight {
        origin: sample.origin,
        radius: DLIGHT_RADIUS,
        base_color: sample.color * scale,
        color: sample.color * scale,
        dir: Vec3::ZERO,
        stopdot: -1.0,
        stopdot2_or_costheta: -1.0,
        style: 0,
        flags: PointLightFlags::empty(),
    })
}

/// Grid dimensions over the map bounds.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct GridDims {
    pub min_cell: IVec3,
    pub size: IVec3,
}

impl GridDims {
    pub fn from_bounds(bounds: Aabb, cell_size: f32) -> Self {
        let min_cell = (bounds.min / cell_size).floor().as_ivec3();
        let max_cell = (bounds.max / cell_size).ceil().as_ivec3();
        let size = (max_cell - min_cell).max(IVec3::ONE);
        let mut dims = Self { min_cell, size };

        if dims.cell_count() > MAX_LIGHT_CLUSTERS {
            log_warning!(
                LOG,
                "grid of {:?} cells exceeds MAX_LIGHT_CLUSTERS ({}); clamping z extent",
                dims.size,
                MAX_LIGHT_CLUSTERS
            );
            // Clamp the vertical extent first: maps are usually much wider
            // than they are tall, so this loses the least coverage.
            let per_layer = (dims.size.x as i64 * dims.size.y as i64).max(1);
            let max_z = (MAX_LIGHT_CLUSTERS as i64 / per_layer).max(1) as i32;
            dims.size.z = dims.size.z.min(max_z);
        }
        dims
    }

    pub fn cell_count(&self) -> usize {
        (self.size.x as i64 * self.size.y as i64 * self.size.z as i64) as usize
    }

    pub fn cell_index(&self, cell: IVec3) -> Option<usize> {
        let local = cell - self.min_cell;
        if local.cmplt(IVec3::ZERO).any() || local.cmpge(self.size).any() {
            return None;
        }
        Some((local.x + local.y * self.size.x + local.z * self.size.x * self.size.y) as usize)
    }

    fn cell_range_for_aabb(&self, aabb: Aabb, cell_size: f32) -> (IVec3, IVec3) {
        let min = (aabb.min / cell_size).floor().as_ivec3();
        let max = (aabb.max / cell_size).floor().as_ivec3();
        (min.max(self.min_cell), max.min(self.min_cell + self.size - IVec3::ONE))
    }
}

/// One coalesced dirty range produced by [`LightGrid::upload_ranges`]:
/// `[begin, end)` cell indices, contiguous and all changed since the
/// previous upload.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DirtyRange {
    pub begin: usize,
    pub end: usize,
}

pub struct LightGrid {
    pub dims: GridDims,
    pub cell_size: f32,
    cells: Vec<LightCluster>,
    point_lights: Vec<PointLight>,
    polygon_lights: Vec<PolygonLight>,
    num_static_point_lights: usize,
    num_static_polygon_lights: usize,
    frame_counter: u64,
    surface_leaf_cache: HashMap<SurfaceId, Vec<LeafId>>,
    mark_scratch: Vec<bool>,
    throttle: LogThrottle,
}

impl LightGrid {
    pub fn new(bounds: Aabb, cell_size: f32) -> Self {
        let dims = GridDims::from_bounds(bounds, cell_size);
        let cell_count = dims.cell_count();
        Self {
            dims,
            cell_size,
            cells: vec![LightCluster::empty(); cell_count],
            point_lights: Vec::new(),
            polygon_lights: Vec::new(),
            num_static_point_lights: 0,
            num_static_polygon_lights: 0,
            frame_counter: 0,
            surface_leaf_cache: HashMap::new(),
            mark_scratch: vec![false; cell_count],
            throttle: LogThrottle::new(std::time::Duration::from_secs(5)),
        }
    }

    pub fn cells(&self) -> &[LightCluster] {
        &self.cells
    }

    pub fn point_lights(&self) -> &[PointLight] {
        &self.point_lights
    }

    pub fn polygon_lights(&self) -> &[PolygonLight] {
        &self.polygon_lights
    }

    /// Potentially-visible leaf set for `surface`: the leafs that directly
    /// reference it, unioned with each of their PVS. Computed lazily and
    /// cached.
    fn pvs_for_surface(&mut self, topo: &dyn MapTopology, surface: SurfaceId) -> &[LeafId] {
        self.surface_leaf_cache.entry(surface).or_insert_with(|| {
            let direct = topo.leafs_referencing_surface(surface);
            let mut set: Vec<LeafId> = Vec::new();
            for &leaf in direct {
                if !set.contains(&leaf) {
                    set.push(leaf);
                }
                for &visible in topo.pvs(leaf) {
                    if !set.contains(&visible) {
                        set.push(visible);
                    }
                }
            }
            set
        })
    }

    /// Marks every cell touched by the union of `leafs`' AABBs into a
    /// scratch bitmap sized to the whole grid, then returns the list of
    /// marked cell indices exactly once each.
    fn cells_touched_by_leafs(&mut self, topo: &dyn MapTopology, leafs: &[LeafId]) -> Vec<usize> {
        for b in &mut self.mark_scratch {
            *b = false;
        }
        let mut touched = Vec::new();
        for &leaf in leafs {
            let aabb = topo.leaf_aabb(leaf);
            let (min, max) = self.dims.cell_range_for_aabb(aabb, self.cell_size);
            for z in min.z..=max.z {
                for y in min.y..=max.y {
                    for x in min.x..=max.x {
                        if let Some(idx) = self.dims.cell_index(IVec3::new(x, y, z)) {
                            if !self.mark_scratch[idx] {
                                self.mark_scratch[idx] = true;
                                touched.push(idx);
                            }
                        }
                    }
                }
            }
        }
        touched
    }

    fn all_cell_indices(&self) -> Vec<usize> {
        (0..self.cells.len()).collect()
    }

    fn add_point_light_internal(&mut self, topo: &dyn MapTopology, light: PointLight, is_static: bool) -> Option<usize> {
        if self.point_lights.len() >= MAX_POINT_LIGHTS {
            if self.throttle.should_log("point_lights_full", std::time::Instant::now()) {
                log_warning!(LOG, "point light array full ({} lights), dropping", MAX_POINT_LIGHTS);
            }
            return None;
        }

        let index = self.point_lights.len();
        let is_environment = light.is_environment();
        self.point_lights.push(light);

        let cells = if is_environment {
            self.all_cell_indices()
        } else {
            match topo.leaf_containing(self.point_lights[index].origin) {
                Some(leaf) => {
                    let mut leafs = vec![leaf];
                    for &v in topo.pvs(leaf) {
                        if !leafs.contains(&v) {
                            leafs.push(v);
                        }
                    }
                    self.cells_touched_by_leafs(topo, &leafs)
                }
                None => Vec::new(),
            }
        };

        let frame = self.frame_counter;
        for cell_index in cells {
            if !self.cells[cell_index].push_point_light(index as u8, frame) && self.throttle.should_log("cell_point_overflow", std::time::Instant::now()) {
                log_warning!(LOG, "cell {cell_index} point-light list full, dropping light {index}");
            }
        }

        if is_static {
            self.num_static_point_lights = self.point_lights.len();
        }
        Some(index)
    }

    /// Adds a static point/spot/environment light at map load. Must be
    /// called before [`LightGrid::finalize_static_load`].
    pub fn add_static_point_light(&mut self, topo: &dyn MapTopology, light: PointLight) -> Option<usize> {
        self.add_point_light_internal(topo, light, true)
    }

    /// Adds a per-frame dynamic point light.
    pub fn add_dynamic_point_light(&mut self, topo: &dyn MapTopology, light: PointLight) -> Option<usize> {
        self.add_point_light_internal(topo, light, false)
    }

    /// Adds the map's single environment (sun/sky) light at map load. Its
    /// `cos(theta_max)` and radiance correction are derived from
    /// `solid_angle` by [`PointLight::new_environment`]; callers pass the
    /// skybox's configured solid angle, or fall back to the entity's own
    /// override if the map sets one.
    pub fn add_static_environment_light(
        &mut self,
        topo: &dyn MapTopology,
        origin: Vec3,
        color: Vec3,
        radius: f32,
        solid_angle: f32,
        style: u8,
    ) -> Option<usize> {
        let light = PointLight::new_environment(origin, color, radius, solid_angle, style);
        self.add_static_point_light(topo, light)
    }

    fn add_polygon_light_internal(
        &mut self,
        topo: &dyn MapTopology,
        surface: Option<SurfaceId>,
        poly: PolygonLight,
        is_static: bool,
    ) -> Option<usize> {
        if self.polygon_lights.len() >= MAX_POLYGON_LIGHTS {
            if self.throttle.should_log("polygon_lights_full", std::time::Instant::now()) {
                log_warning!(LOG, "polygon light array full ({} lights), dropping", MAX_POLYGON_LIGHTS);
            }
            return None;
        }

        let index = self.polygon_lights.len();
        self.polygon_lights.push(poly);

        let cells = match surface {
            Some(surface) => {
                let leafs = self.pvs_for_surface(topo, surface).to_vec();
                self.cells_touched_by_leafs(topo, &leafs)
            }
            // A dynamic polygon light with no backing surface (e.g. an
            // animated water brush) lights every cell, matching the
            // "no PVS information available" fallback in the original.
            None => self.all_cell_indices(),
        };

        let frame = self.frame_counter;
        for cell_index in cells {
            if !self.cells[cell_index].push_polygon_light(index as u8, frame) && self.throttle.should_log("cell_polygon_overflow", std::time::Instant::now()) {
                log_warning!(LOG, "cell {cell_index} polygon-light list full, dropping light {index}");
            }
        }

        if is_static {
            self.num_static_polygon_lights = self.polygon_lights.len();
        }
        Some(index)
    }

    /// Adds a static emissive-surface polygon light at map load.
    pub fn add_static_polygon_light(&mut self, topo: &dyn MapTopology, surface: SurfaceId, poly: PolygonLight) -> Option<usize> {
        self.add_polygon_light_internal(topo, Some(surface), poly, true)
    }

    /// Adds a per-frame dynamic polygon light (animated texture or moving brush).
    pub fn add_dynamic_polygon_light(&mut self, topo: &dyn MapTopology, surface: Option<SurfaceId>, poly: PolygonLight) -> Option<usize> {
        self.add_polygon_light_internal(topo, surface, poly, false)
    }

    /// Freezes the static prefix: call once after all static lights have
    /// been added at map load.
    pub fn finalize_static_load(&mut self) {
        for cell in &mut self.cells {
            cell.num_static_point_lights = cell.num_point_lights;
            cell.num_static_polygons = cell.num_polygons;
        }
    }

    /// Per-frame reset: drops all dynamic lights and
    /// dynamic cell contents back to the static map-load prefix.
    pub fn frame_begin(&mut self, frame: u64) {
        self.frame_counter = frame;
        self.point_lights.truncate(self.num_static_point_lights);
        self.polygon_lights.truncate(self.num_static_polygon_lights);
        for cell in &mut self.cells {
            cell.reset_to_static();
        }
    }

    /// Rescales a light's post-lightstyle color: `base_color *
    /// lightstyle_value/255`.
    pub fn apply_lightstyle(&mut self, light_index: usize, style_value: u8) {
        if let Some(light) = self.point_lights.get_mut(light_index) {
            light.apply_lightstyle(style_value);
        }
    }

    /// Coalesces consecutive dirty cells (`frame_sequence == frame`) into
    /// maximal `[begin, end)` ranges, for staging-upload batching.
    pub fn upload_ranges(&self, frame: u64) -> Vec<DirtyRange> {
        let mut ranges = Vec::new();
        let mut run_start: Option<usize> = None;
        for (i, cell) in self.cells.iter().enumerate() {
            let dirty = cell.frame_sequence == frame;
            match (dirty, run_start) {
                (true, None) => run_start = Some(i),
                (false, Some(start)) => {
                    ranges.push(DirtyRange { begin: start, end: i });
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(start) = run_start {
            ranges.push(DirtyRange { begin: start, end: self.cells.len() });
        }
        ranges
    }
}
