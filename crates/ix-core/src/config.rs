//! Per-experiment configuration bundles.
//!
//! The experiment file (TOML or JSON, loaded by `ix-train`) carries an
//! environment selector and two bundles defined here: the environment config
//! and the actor-critic config.  Both are validated before any worker starts;
//! an invalid bundle is a fatal [`IxError::Config`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{IxError, IxResult};

// ── EnvKind ───────────────────────────────────────────────────────────────────

/// Which intersection environment variant to simulate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvKind {
    /// Vehicles on fixed tracks choosing from a discrete acceleration table.
    #[default]
    DiscreteFixedTrack,
    /// Continuous-time track following.  Named for config compatibility;
    /// rejected by [`EnvKind::ensure_supported`].
    ContinuousFixedTrack,
}

impl EnvKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EnvKind::DiscreteFixedTrack   => "discrete-fixed-track",
            EnvKind::ContinuousFixedTrack => "continuous-fixed-track",
        }
    }

    /// Fail with [`IxError::Unsupported`] for variants without an
    /// implementation.
    pub fn ensure_supported(self) -> IxResult<()> {
        match self {
            EnvKind::DiscreteFixedTrack   => Ok(()),
            EnvKind::ContinuousFixedTrack => Err(IxError::Unsupported(self.as_str().to_owned())),
        }
    }
}

impl FromStr for EnvKind {
    type Err = IxError;

    fn from_str(s: &str) -> IxResult<Self> {
        match s {
            "discrete-fixed-track"   => Ok(EnvKind::DiscreteFixedTrack),
            "continuous-fixed-track" => Ok(EnvKind::ContinuousFixedTrack),
            other => Err(IxError::Config(format!("unknown environment '{other}'"))),
        }
    }
}

impl fmt::Display for EnvKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── EnvConfig ─────────────────────────────────────────────────────────────────

/// Environment bundle: everything that shapes one simulation instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvConfig {
    /// Hard cap on decision steps per episode.
    pub horizon: u64,

    /// Vehicles per episode.
    pub nagents: usize,

    /// Standard deviation of the zero-mean Gaussian noise added to each
    /// normalised lidar sample.  `0.0` makes observations exactly
    /// reproducible.
    pub lidar_noise: f32,

    /// Lidar frames stacked into each observation.
    pub history_len: usize,

    /// Physics sub-steps integrated per decision step.
    pub timesteps: usize,

    /// Lidar rays per frame.
    pub npoints: usize,

    /// Allow left/right turning tracks in addition to straight ones.
    pub turns: bool,

    /// Score right-of-way violations inside the intersection box.
    pub learn_right_of_way: bool,

    /// Rendering colour flag.  Carried for experiment-file compatibility;
    /// the simulation never reads it.
    pub default_color: bool,

    /// Spread spawns evenly across entry pockets (see `ix-schedule`).
    pub balance_cars: bool,

    /// Minimum decision steps between two spawns in the same pocket.
    pub spawn_gap: u64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            horizon:            250,
            nagents:            4,
            lidar_noise:        0.0,
            history_len:        5,
            timesteps:          10,
            npoints:            72,
            turns:              false,
            learn_right_of_way: false,
            default_color:      true,
            balance_cars:       true,
            spawn_gap:          20,
        }
    }
}

impl EnvConfig {
    /// Reject bundles that cannot produce a well-formed simulation.
    pub fn validate(&self) -> IxResult<()> {
        if self.horizon == 0 {
            return Err(IxError::Config("horizon must be positive".into()));
        }
        if self.nagents == 0 {
            return Err(IxError::Config("nagents must be positive".into()));
        }
        if self.history_len == 0 {
            return Err(IxError::Config("history_len must be positive".into()));
        }
        if self.npoints == 0 {
            return Err(IxError::Config("npoints must be positive".into()));
        }
        if self.timesteps == 0 {
            return Err(IxError::Config("timesteps must be positive".into()));
        }
        if !self.lidar_noise.is_finite() || self.lidar_noise < 0.0 {
            return Err(IxError::Config(format!(
                "lidar_noise must be a finite non-negative number, got {}",
                self.lidar_noise
            )));
        }
        if self.spawn_gap == 0 {
            return Err(IxError::Config("spawn_gap must be positive".into()));
        }
        Ok(())
    }
}

// ── ActorCriticConfig ─────────────────────────────────────────────────────────

/// Actor-critic bundle: shape of the policy/value component and how the
/// rollout worker presents observations to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActorCriticConfig {
    /// Widths of the hidden layers shared in shape by the policy and value
    /// networks.  Empty means linear heads.
    pub hidden_sizes: Vec<usize>,

    /// Frames of lidar history the model expects; must match the
    /// environment's `history_len`.
    pub history_len: usize,

    /// Present only active agents' observations, as a variable-length set,
    /// to a weight-shared policy.  This is the only supported mode; `false`
    /// is rejected by [`validate`](Self::validate).
    pub permutation_invariant: bool,
}

impl Default for ActorCriticConfig {
    fn default() -> Self {
        Self {
            hidden_sizes:          vec![64, 64],
            history_len:           5,
            permutation_invariant: true,
        }
    }
}

impl ActorCriticConfig {
    pub fn validate(&self) -> IxResult<()> {
        if self.hidden_sizes.iter().any(|&h| h == 0) {
            return Err(IxError::Config(format!(
                "hidden_sizes must all be positive, got {:?}",
                self.hidden_sizes
            )));
        }
        if self.history_len == 0 {
            return Err(IxError::Config("actor-critic history_len must be positive".into()));
        }
        if !self.permutation_invariant {
            return Err(IxError::Unsupported(
                "permutation_invariant = false: fixed-slot joint observations are not supported".into(),
            ));
        }
        Ok(())
    }

    /// Both bundles describe the same observation stack.
    pub fn check_compatible(&self, env: &EnvConfig) -> IxResult<()> {
        if self.history_len != env.history_len {
            return Err(IxError::Config(format!(
                "actor-critic history_len {} does not match environment history_len {}",
                self.history_len, env.history_len
            )));
        }
        Ok(())
    }
}
