//! Minimal BSP-facing types the light grid needs from the host engine's
//! map data. The actual BSP/PVS parsing lives in the host engine; this
//! crate only consumes it through [`MapTopology`].

use glam::Vec3;

/// Index of a BSP leaf.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct LeafId(pub u32);

/// Index of a BSP surface (used to key emissive-surface lookups).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SurfaceId(pub u32);

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn union(self, other: Aabb) -> Aabb {
        Aabb { min: self.min.min(other.min), max: self.max.max(other.max) }
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        (self.min.x..=self.max.x).contains(&p.x)
            && (self.min.y..=self.max.y).contains(&p.y)
            && (self.min.z..=self.max.z).contains(&p.z)
    }
}

/// What the light grid needs to query about the current map's BSP tree.
/// Implemented by the host engine; a test double lives in `grid.rs`'s tests.
pub trait MapTopology {
    /// World-space bounds of the whole map, used to size the grid.
    fn bounds(&self) -> Aabb;
    /// The leaf containing `point`, if any (points outside the BSP tree have none).
    fn leaf_containing(&self, point: Vec3) -> Option<LeafId>;
    /// Potentially-visible-set of `leaf`: every leaf that may be visible from it.
    fn pvs(&self, leaf: LeafId) -> &[LeafId];
    /// World-space AABB of `leaf`.
    fn leaf_aabb(&self, leaf: LeafId) -> Aabb;
    /// Every leaf that directly references `surface` (i.e. the surface is
    /// part of that leaf's draw list), before PVS expansion.
    fn leafs_referencing_surface(&self, surface: SurfaceId) -> &[LeafId];
}
