//! A single fixed path through the intersection.
//!
//! # Data layout
//!
//! A track is a polyline of waypoints with a cumulative arc-length table:
//!
//! ```text
//! cum_length[0] = 0
//! cum_length[i] = cum_length[i-1] + |waypoint[i] - waypoint[i-1]|
//! ```
//!
//! Segment `i` joins waypoints `i` and `i+1` and carries a constant curvature
//! (zero on the arms, `1/r` along a sampled turn).  Position lookups are a
//! binary search over `cum_length` followed by linear interpolation.

use ix_core::{Point2, Pose, TrackId};

use crate::{Arm, Maneuver};

/// An immutable path from the outer end of one arm to the outer end of another.
#[derive(Clone, Debug)]
pub struct Track {
    pub id:        TrackId,
    pub entry:     Arm,
    pub exit:      Arm,
    pub maneuver:  Maneuver,
    waypoints:     Vec<Point2>,
    cum_length:    Vec<f32>,
    /// Curvature of segment `i` (between waypoints `i` and `i+1`).
    curvature:     Vec<f32>,
    /// Arc length at which the track enters the box.
    box_enter_s:   f32,
    /// Arc length at which the track leaves the box.
    box_exit_s:    f32,
}

impl Track {
    /// Build a track from a polyline.
    ///
    /// `curvature` must have one entry per segment; `box_enter` and
    /// `box_exit` are the waypoint indices where the path crosses the box
    /// boundary.
    pub(crate) fn from_polyline(
        id:        TrackId,
        entry:     Arm,
        maneuver:  Maneuver,
        waypoints: Vec<Point2>,
        curvature: Vec<f32>,
        box_enter: usize,
        box_exit:  usize,
    ) -> Self {
        debug_assert!(waypoints.len() >= 2);
        debug_assert_eq!(curvature.len(), waypoints.len() - 1);

        let mut cum_length = Vec::with_capacity(waypoints.len());
        cum_length.push(0.0);
        for pair in waypoints.windows(2) {
            let last = *cum_length.last().unwrap_or(&0.0);
            cum_length.push(last + pair[0].distance(pair[1]));
        }

        Self {
            id,
            entry,
            exit: maneuver.exit_arm(entry),
            maneuver,
            box_enter_s: cum_length[box_enter],
            box_exit_s:  cum_length[box_exit],
            waypoints,
            cum_length,
            curvature,
        }
    }

    /// Total arc length in metres.
    #[inline]
    pub fn length(&self) -> f32 {
        self.cum_length[self.cum_length.len() - 1]
    }

    pub fn waypoints(&self) -> &[Point2] {
        &self.waypoints
    }

    /// Arc-length interval `[enter, exit]` spent inside the box.
    #[inline]
    pub fn box_span(&self) -> (f32, f32) {
        (self.box_enter_s, self.box_exit_s)
    }

    /// `true` if arc length `s` lies inside the box.
    #[inline]
    pub fn in_box(&self, s: f32) -> bool {
        s >= self.box_enter_s && s <= self.box_exit_s
    }

    /// Index of the segment containing arc length `s` (clamped to the track).
    fn segment_at(&self, s: f32) -> usize {
        let last_segment = self.waypoints.len() - 2;
        // First waypoint strictly beyond `s`, minus one.
        let idx = self.cum_length.partition_point(|&c| c <= s);
        idx.saturating_sub(1).min(last_segment)
    }

    /// Pose at arc length `s`, clamped to `[0, length]`.
    pub fn pose_at(&self, s: f32) -> Pose {
        let s   = s.clamp(0.0, self.length());
        let seg = self.segment_at(s);
        let a   = self.waypoints[seg];
        let b   = self.waypoints[seg + 1];
        let seg_len = self.cum_length[seg + 1] - self.cum_length[seg];
        let frac = if seg_len > 0.0 { (s - self.cum_length[seg]) / seg_len } else { 0.0 };
        let dir  = b - a;
        Pose::new(a + dir * frac, dir.y.atan2(dir.x))
    }

    /// Curvature (1/m) at arc length `s`.  Zero on straight segments.
    #[inline]
    pub fn curvature_at(&self, s: f32) -> f32 {
        self.curvature[self.segment_at(s.clamp(0.0, self.length()))]
    }
}
