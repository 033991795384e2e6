//! Longitudinal motion along a track.

use ix_track::Track;

use crate::{VehicleParams, VehicleState};

/// Integrate one decision step of constant acceleration `accel`.
///
/// The step of `params.dt` seconds is split into `substeps` explicit-Euler
/// sub-steps.  After every sub-step the speed is clamped to
/// `[0, params.speed_cap(κ(s))]`, so vehicles slow to the curve limit when
/// they enter a turn.  Position is not clamped to the track length; the
/// caller detects goal completion from `s >= track.length()`.
///
/// Returns the distance travelled.
pub fn advance(
    state:    &mut VehicleState,
    accel:    f32,
    track:    &Track,
    params:   &VehicleParams,
    substeps: usize,
) -> f32 {
    let substeps = substeps.max(1);
    let h = params.dt / substeps as f32;
    let start = state.s;

    for _ in 0..substeps {
        let cap = params.speed_cap(track.curvature_at(state.s));
        state.speed = (state.speed + accel * h).clamp(0.0, cap);
        state.s += state.speed * h;
    }
    state.last_accel = accel;

    state.s - start
}
