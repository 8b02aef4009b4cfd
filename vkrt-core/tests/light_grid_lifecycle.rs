//! End-to-end exercise of the light grid across map load and several
//! frames, without a real host engine: a tiny two-leaf `MapTopology` stands
//! in for BSP/PVS data.

use std::collections::HashMap as StdHashMap;

use glam::Vec3;
use vkrt_core::geom::{Aabb, LeafId, MapTopology, SurfaceId};
use vkrt_core::light::{LightGrid, PointLight, PointLightFlags, DEFAULT_CELL_SIZE};

struct TwoRooms {
    pvs: StdHashMap<LeafId, Vec<LeafId>>,
}

impl TwoRooms {
    fn new() -> Self {
        let mut pvs = StdHashMap::new();
        pvs.insert(LeafId(0), vec![LeafId(0)]);
        pvs.insert(LeafId(1), vec![LeafId(1)]);
        Self { pvs }
    }
}

impl MapTopology for TwoRooms {
    fn bounds(&self) -> Aabb {
        Aabb::new(Vec3::splat(-256.0), Vec3::splat(256.0))
    }

    fn leaf_containing(&self, point: Vec3) -> Option<LeafId> {
        Some(if point.x < 0.0 { LeafId(0) } else { LeafId(1) })
    }

    fn pvs(&self, leaf: LeafId) -> &[LeafId] {
        self.pvs.get(&leaf).map(|v| v.as_slice()).unwrap_or(&[])
    }

    fn leaf_aabb(&self, leaf: LeafId) -> Aabb {
        if leaf == LeafId(0) {
            Aabb::new(Vec3::new(-256.0, -256.0, -256.0), Vec3::new(0.0, 256.0, 256.0))
        } else {
            Aabb::new(Vec3::new(0.0, -256.0, -256.0), Vec3::new(256.0, 256.0, 256.0))
        }
    }

    fn leafs_referencing_surface(&self, _surface: SurfaceId) -> &[LeafId] {
        &[]
    }
}

fn point_light_at(origin: Vec3) -> PointLight {
    PointLight {
        origin,
        radius: 200.0,
        base_color: Vec3::ONE,
        color: Vec3::ONE,
        dir: Vec3::ZERO,
        stopdot: 1.0,
        stopdot2_or_costheta: 1.0,
        style: 0,
        flags: PointLightFlags::empty(),
    }
}

#[test]
fn static_light_survives_map_load_and_several_frames_of_dynamic_churn() {
    let topo = TwoRooms::new();
    let mut grid = LightGrid::new(topo.bounds(), DEFAULT_CELL_SIZE);

    grid.add_static_point_light(&topo, point_light_at(Vec3::new(-100.0, 0.0, 0.0))).unwrap();
    grid.finalize_static_load();
    assert_eq!(grid.point_lights().len(), 1);

    let cell_count = grid.cells().len();

    for frame in 0..5u64 {
        grid.frame_begin(frame);
        assert_eq!(grid.point_lights().len(), 1, "frame_begin must not drop the static light");

        let added = grid.add_dynamic_point_light(&topo, point_light_at(Vec3::new(100.0, 0.0, 0.0)));
        assert!(added.is_some());
        assert_eq!(grid.point_lights().len(), 2);

        let ranges = grid.upload_ranges(frame);
        assert!(!ranges.is_empty(), "touching a cell in room B must mark it dirty");
    }

    // The dynamic light from the last iteration is dropped back out here.
    grid.frame_begin(5);
    assert_eq!(grid.point_lights().len(), 1);
    assert_eq!(grid.cells().len(), cell_count, "grid dimensions are stable across frames");
}
