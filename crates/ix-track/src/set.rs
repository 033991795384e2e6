//! The shared, read-only set of tracks plus the collision-zone definition.

use std::f32::consts::FRAC_PI_2;

use ix_core::{Point2, Pose, Segment, TrackId, ZoneId};

use crate::{Arm, IntersectionLayout, Maneuver, Track, TrackResult, ZoneGrid};

// ── TrackSet ──────────────────────────────────────────────────────────────────

/// Every fixed path through the intersection, the occupancy grid, and the
/// precomputed track-conflict table.
///
/// Immutable after construction.  One `TrackSet` is shared (behind an `Arc`)
/// by every simulation instance in a process.  Do not construct directly;
/// use [`TrackSetBuilder`].
pub struct TrackSet {
    layout:   IntersectionLayout,
    tracks:   Vec<Track>,
    /// `by_arm[arm]` lists the tracks entering from that arm, maneuver order.
    by_arm:   [Vec<TrackId>; 4],
    grid:     ZoneGrid,
    /// Sorted, deduplicated zones each track covers inside the box.
    box_zones: Vec<Vec<ZoneId>>,
    /// Row-major `n × n` conflict matrix.
    conflicts: Vec<bool>,
    boundary:  Vec<Segment>,
}

impl TrackSet {
    // ── Dimensions ────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn layout(&self) -> &IntersectionLayout {
        &self.layout
    }

    pub fn grid(&self) -> &ZoneGrid {
        &self.grid
    }

    // ── Track lookup ──────────────────────────────────────────────────────

    /// The track with id `id`.
    ///
    /// # Panics
    /// Panics on an id that was not produced by this set.
    #[inline]
    pub fn track(&self, id: TrackId) -> &Track {
        &self.tracks[id.index()]
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Tracks that start at the outer end of `arm`.
    #[inline]
    pub fn tracks_from(&self, arm: Arm) -> &[TrackId] {
        &self.by_arm[arm.index()]
    }

    // ── Geometry queries ──────────────────────────────────────────────────

    /// Pose of a vehicle at `arc_length` along `track`.
    #[inline]
    pub fn position_on_track(&self, track: TrackId, arc_length: f32) -> Pose {
        self.track(track).pose_at(arc_length)
    }

    /// Occupancy zone of a vehicle at `arc_length` along `track`, or `None`
    /// once it has driven off the end of the track.
    pub fn occupancy_zone(&self, track: TrackId, arc_length: f32) -> Option<ZoneId> {
        let t = self.track(track);
        if arc_length >= t.length() {
            return None;
        }
        Some(self.grid.zone_of(t.pose_at(arc_length).position))
    }

    /// `true` if vehicles on `a` and `b` can meet inside the box.
    #[inline]
    pub fn tracks_conflict(&self, a: TrackId, b: TrackId) -> bool {
        self.conflicts[a.index() * self.tracks.len() + b.index()]
    }

    /// Zones inside the box shared by `a` and `b` (empty when they come from
    /// the same arm).
    pub fn conflict_zones(&self, a: TrackId, b: TrackId) -> Vec<ZoneId> {
        if !self.tracks_conflict(a, b) {
            return vec![];
        }
        let zb = &self.box_zones[b.index()];
        self.box_zones[a.index()]
            .iter()
            .filter(|z| zb.binary_search(z).is_ok())
            .copied()
            .collect()
    }

    /// Road edges along the arms, used as lidar obstacles.
    pub fn boundary(&self) -> &[Segment] {
        &self.boundary
    }
}

// ── TrackSetBuilder ───────────────────────────────────────────────────────────

/// Generate the fixed tracks for a layout, then call [`build`](Self::build).
///
/// # Example
///
/// ```
/// use ix_track::{IntersectionLayout, TrackSetBuilder};
///
/// let set = TrackSetBuilder::new(IntersectionLayout::default())
///     .turns(true)
///     .build()
///     .unwrap();
/// assert_eq!(set.len(), 12); // 4 arms × {straight, right, left}
/// ```
pub struct TrackSetBuilder {
    layout: IntersectionLayout,
    turns:  bool,
}

impl TrackSetBuilder {
    pub fn new(layout: IntersectionLayout) -> Self {
        Self { layout, turns: false }
    }

    /// Generate turning tracks in addition to straight ones.
    pub fn turns(mut self, turns: bool) -> Self {
        self.turns = turns;
        self
    }

    pub fn build(self) -> TrackResult<TrackSet> {
        self.layout.validate()?;
        let layout    = self.layout;
        let maneuvers = Maneuver::available(self.turns);

        let mut tracks = Vec::with_capacity(4 * maneuvers.len());
        let mut by_arm: [Vec<TrackId>; 4] = Default::default();
        for arm in Arm::ALL {
            for &m in maneuvers {
                let id = TrackId(tracks.len() as u16);
                tracks.push(generate_track(&layout, id, arm, m));
                by_arm[arm.index()].push(id);
            }
        }

        let grid = ZoneGrid::new(layout.extent(), layout.zone_size);

        // Sample each in-box span finely enough that no crossed cell is skipped.
        let step = layout.zone_size * 0.25;
        let box_zones: Vec<Vec<ZoneId>> = tracks
            .iter()
            .map(|t| {
                let (enter, exit) = t.box_span();
                let mut zones = Vec::new();
                let mut s = enter;
                while s <= exit {
                    zones.push(grid.zone_of(t.pose_at(s).position));
                    s += step;
                }
                zones.push(grid.zone_of(t.pose_at(exit).position));
                zones.sort_unstable();
                zones.dedup();
                zones
            })
            .collect();

        let n = tracks.len();
        let mut conflicts = vec![false; n * n];
        for i in 0..n {
            for j in 0..n {
                if i == j || tracks[i].entry == tracks[j].entry {
                    continue;
                }
                let zj = &box_zones[j];
                conflicts[i * n + j] = box_zones[i].iter().any(|z| zj.binary_search(z).is_ok());
            }
        }

        let boundary = boundary_segments(&layout);

        Ok(TrackSet { layout, tracks, by_arm, grid, box_zones, conflicts, boundary })
    }
}

// ── Track generation ──────────────────────────────────────────────────────────

/// Build the polyline for one (entry arm, maneuver) pair.
///
/// With `u` the entry arm's outward unit vector and `r` the right-hand side
/// of the inbound direction `-u`:
///
/// ```text
/// straight: enters at u·h + r·o, leaves at -u·h + r·o
/// right:    quarter circle about u·h + r·h, radius h - o
/// left:     quarter circle about u·h - r·h, radius h + o
/// ```
///
/// where `h` is the box half-size and `o` the lane offset.
fn generate_track(layout: &IntersectionLayout, id: TrackId, entry: Arm, maneuver: Maneuver) -> Track {
    let h = layout.box_half();
    let o = layout.lane_offset();
    let e = layout.extent();

    let u = entry.outward();
    let inbound = u * -1.0;
    let r = inbound.rotate(-FRAC_PI_2);

    let start     = u * e + r * o;
    let box_enter = u * h + r * o;

    match maneuver {
        Maneuver::Straight => {
            let box_exit = u * -h + r * o;
            let end      = u * -e + r * o;
            Track::from_polyline(
                id, entry, maneuver,
                vec![start, box_enter, box_exit, end],
                vec![0.0; 3],
                1,
                2,
            )
        }
        Maneuver::Right | Maneuver::Left => {
            let (center, radius, sweep, exit_dir, exit_lane) = match maneuver {
                Maneuver::Right => (u * h + r * h, h - o, -FRAC_PI_2, r, u),
                _               => (u * h - r * h, h + o, FRAC_PI_2, r * -1.0, inbound),
            };

            let from  = box_enter - center;
            let start_angle = from.y.atan2(from.x);
            let n = layout.turn_resolution;

            let mut waypoints = Vec::with_capacity(n + 3);
            waypoints.push(start);
            for k in 0..=n {
                let angle = start_angle + sweep * (k as f32 / n as f32);
                waypoints.push(center + Point2::from_heading(angle) * radius);
            }
            let box_exit_idx = waypoints.len() - 1;
            waypoints.push(exit_dir * e + exit_lane * o);

            let mut curvature = vec![0.0];
            curvature.extend(std::iter::repeat_n(1.0 / radius, n));
            curvature.push(0.0);

            Track::from_polyline(id, entry, maneuver, waypoints, curvature, 1, box_exit_idx)
        }
    }
}

/// The two road edges of every arm, from the box corner to the arm's end.
fn boundary_segments(layout: &IntersectionLayout) -> Vec<Segment> {
    let h = layout.box_half();
    let e = layout.extent();
    Arm::ALL
        .iter()
        .flat_map(|arm| {
            let u = arm.outward();
            let p = u.rotate(FRAC_PI_2);
            [
                Segment::new(u * h + p * h, u * e + p * h),
                Segment::new(u * h - p * h, u * e - p * h),
            ]
        })
        .collect()
}
