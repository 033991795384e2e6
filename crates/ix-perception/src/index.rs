//! Spatial index over active vehicles, rebuilt once per step.

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use ix_core::{AgentId, Point2};

// ── R-tree entry ──────────────────────────────────────────────────────────────

#[derive(Clone)]
struct VehicleEntry {
    point: [f32; 2],
    id:    AgentId,
}

impl RTreeObject for VehicleEntry {
    type Envelope = AABB<[f32; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for VehicleEntry {
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

// ── VehicleIndex ──────────────────────────────────────────────────────────────

/// Positions of active vehicles, queried by radius when casting lidar rays.
pub struct VehicleIndex {
    tree: RTree<VehicleEntry>,
}

impl VehicleIndex {
    pub fn build(vehicles: impl IntoIterator<Item = (AgentId, Point2)>) -> Self {
        let entries = vehicles
            .into_iter()
            .map(|(id, p)| VehicleEntry { point: [p.x, p.y], id })
            .collect();
        Self { tree: RTree::bulk_load(entries) }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Vehicles within `radius` of `center`, in unspecified order.
    pub fn within(&self, center: Point2, radius: f32) -> impl Iterator<Item = (AgentId, Point2)> + '_ {
        self.tree
            .locate_within_distance([center.x, center.y], radius * radius)
            .map(|e| (e.id, Point2::new(e.point[0], e.point[1])))
    }
}
