//! Intersection dimensions, arms, and maneuvers.

use std::f32::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use ix_core::Point2;

use crate::{TrackError, TrackResult};

// ── Arm ───────────────────────────────────────────────────────────────────────

/// One of the four roads meeting at the box, counter-clockwise from east.
///
/// Arms double as spawn *pockets*: every vehicle enters the map at the outer
/// end of one arm.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Arm {
    East,
    North,
    West,
    South,
}

impl Arm {
    pub const ALL: [Arm; 4] = [Arm::East, Arm::North, Arm::West, Arm::South];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn from_index(i: usize) -> Arm {
        Arm::ALL[i % 4]
    }

    /// Unit vector from the box centre along this arm.
    #[inline]
    pub fn outward(self) -> Point2 {
        Point2::from_heading(self.index() as f32 * FRAC_PI_2)
    }

    /// The arm a vehicle entering from `self` sees on its right-hand side.
    ///
    /// Vehicles approaching from the right have priority on a tie at the box.
    #[inline]
    pub fn right(self) -> Arm {
        Arm::from_index(self.index() + 1)
    }

    #[inline]
    pub fn opposite(self) -> Arm {
        Arm::from_index(self.index() + 2)
    }

    #[inline]
    pub fn left(self) -> Arm {
        Arm::from_index(self.index() + 3)
    }
}

// ── Maneuver ──────────────────────────────────────────────────────────────────

/// What a track does inside the box.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Maneuver {
    Straight,
    Right,
    Left,
}

impl Maneuver {
    /// Maneuvers available per entry arm.
    pub fn available(turns: bool) -> &'static [Maneuver] {
        if turns {
            &[Maneuver::Straight, Maneuver::Right, Maneuver::Left]
        } else {
            &[Maneuver::Straight]
        }
    }

    /// Exit arm for a vehicle entering from `entry`.
    pub fn exit_arm(self, entry: Arm) -> Arm {
        match self {
            Maneuver::Straight => entry.opposite(),
            Maneuver::Right    => entry.right(),
            Maneuver::Left     => entry.left(),
        }
    }
}

// ── IntersectionLayout ────────────────────────────────────────────────────────

/// Dimensions of the four-arm intersection, in metres.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectionLayout {
    /// Full width of each road (two lanes, one per direction).
    pub road_width: f32,
    /// Length of each arm outside the box.
    pub arm_length: f32,
    /// Side of a square occupancy zone.  About one vehicle length.
    pub zone_size: f32,
    /// Waypoints sampled along each quarter-circle turn.
    pub turn_resolution: usize,
}

impl Default for IntersectionLayout {
    fn default() -> Self {
        Self {
            road_width:      20.0,
            arm_length:      40.0,
            zone_size:       4.5,
            turn_resolution: 12,
        }
    }
}

impl IntersectionLayout {
    /// Half the side of the square box.
    #[inline]
    pub fn box_half(&self) -> f32 {
        self.road_width * 0.5
    }

    /// Lateral offset of a lane centre from the road centre line.
    #[inline]
    pub fn lane_offset(&self) -> f32 {
        self.road_width * 0.25
    }

    /// Distance from the box centre to the outer end of an arm.
    #[inline]
    pub fn extent(&self) -> f32 {
        self.box_half() + self.arm_length
    }

    /// `true` if `p` lies inside the square box (boundary inclusive).
    #[inline]
    pub fn in_box(&self, p: Point2) -> bool {
        let h = self.box_half();
        p.x.abs() <= h && p.y.abs() <= h
    }

    pub fn validate(&self) -> TrackResult<()> {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if !positive(self.road_width) || !positive(self.arm_length) || !positive(self.zone_size) {
            return Err(TrackError::Layout(format!(
                "road_width, arm_length and zone_size must be positive, got {self:?}"
            )));
        }
        if self.turn_resolution < 2 {
            return Err(TrackError::Layout("turn_resolution must be at least 2".into()));
        }
        Ok(())
    }
}
