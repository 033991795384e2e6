//! Experiment configuration: hyperparameters, runtime settings, and the
//! bundle loaded from an experiment file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ix_core::{ActorCriticConfig, EnvConfig, EnvKind};
use ix_sim::RewardConfig;
use ix_track::IntersectionLayout;
use ix_vehicle::VehicleParams;

use crate::{TrainError, TrainResult};

// ── TrainConfig ───────────────────────────────────────────────────────────────

/// PPO hyperparameters and run length.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainConfig {
    /// Adam learning rate of the policy parameter group.
    pub pi_lr:           f32,
    /// Adam learning rate of the value parameter group.
    pub vf_lr:           f32,
    pub entropy_coef:    f32,
    /// Optimisation stops for the iteration once the approximate KL to the
    /// rollout policy exceeds this.
    pub target_kl:       f32,
    /// Maximum optimisation passes over each batch.
    pub epochs:          usize,
    /// Transitions collected per iteration, summed over all workers.
    pub steps_per_epoch: usize,
    pub seed:            u64,
    /// Checkpoint every this many iterations.
    pub save_every:      u64,
    /// Total iterations, including any already in a resumed checkpoint.
    pub iterations:      u64,
    pub gamma:           f32,
    pub lam:             f32,
    pub clip_ratio:      f32,
    /// Worker count, fixed for the whole run.
    pub workers:         usize,
    /// Key under which checkpoints are stored.
    pub experiment_id:   String,
    /// Checkpoint file whose parameters seed a fresh run.
    pub finetune_from:   Option<PathBuf>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            pi_lr:           3e-4,
            vf_lr:           1e-3,
            entropy_coef:    0.01,
            target_kl:       0.01,
            epochs:          10,
            steps_per_epoch: 4000,
            seed:            0,
            save_every:      10,
            iterations:      100,
            gamma:           0.99,
            lam:             0.97,
            clip_ratio:      0.2,
            workers:         1,
            experiment_id:   "default".into(),
            finetune_from:   None,
        }
    }
}

impl TrainConfig {
    /// Transitions each rank collects per iteration.
    pub fn local_steps(&self) -> usize {
        self.steps_per_epoch.div_ceil(self.workers.max(1))
    }

    pub fn validate(&self) -> TrainResult<()> {
        let positive = |name: &str, v: f32| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(TrainError::Config(format!("{name} must be positive, got {v}")))
            }
        };
        positive("pi_lr", self.pi_lr)?;
        positive("vf_lr", self.vf_lr)?;
        positive("target_kl", self.target_kl)?;

        if !(self.entropy_coef.is_finite() && self.entropy_coef >= 0.0) {
            return Err(TrainError::Config(format!(
                "entropy_coef must be non-negative, got {}",
                self.entropy_coef
            )));
        }
        for (name, v) in [("gamma", self.gamma), ("lam", self.lam)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(TrainError::Config(format!("{name} must lie in [0, 1], got {v}")));
            }
        }
        if !(self.clip_ratio > 0.0 && self.clip_ratio < 1.0) {
            return Err(TrainError::Config(format!(
                "clip_ratio must lie in (0, 1), got {}",
                self.clip_ratio
            )));
        }
        if self.epochs == 0 || self.iterations == 0 || self.save_every == 0 {
            return Err(TrainError::Config("epochs, iterations and save_every must be positive".into()));
        }
        if self.workers == 0 {
            return Err(TrainError::Config("workers must be positive".into()));
        }
        if self.steps_per_epoch < self.workers {
            return Err(TrainError::Config(format!(
                "steps_per_epoch ({}) must be at least the worker count ({})",
                self.steps_per_epoch, self.workers
            )));
        }
        let id = &self.experiment_id;
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(TrainError::Config(format!("invalid experiment_id {id:?}")));
        }
        Ok(())
    }
}

// ── RuntimeConfig ─────────────────────────────────────────────────────────────

/// Process-level settings.  Everything the runtime needs is passed in here;
/// nothing is read from the environment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Rayon pool size; `0` lets Rayon decide.
    pub num_threads:            usize,
    pub checkpoint_dir:         PathBuf,
    /// Directory for `progress.csv` and `episodes.csv`.
    pub output_dir:             PathBuf,
    /// `tracing-subscriber` filter directive, e.g. `"info,ix_sim=debug"`.
    pub log_filter:             String,
    /// Fail the run when a collective waits longer than this.  `None` waits
    /// forever.
    pub straggler_timeout_secs: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            num_threads:            0,
            checkpoint_dir:         PathBuf::from("checkpoints"),
            output_dir:             PathBuf::from("output"),
            log_filter:             "info".into(),
            straggler_timeout_secs: None,
        }
    }
}

impl RuntimeConfig {
    pub fn straggler_timeout(&self) -> Option<Duration> {
        self.straggler_timeout_secs.map(Duration::from_secs)
    }
}

// ── ExperimentConfig ──────────────────────────────────────────────────────────

/// Everything one training run needs.
///
/// ```toml
/// env_kind = "discrete-fixed-track"
///
/// [env]
/// nagents = 4
/// turns   = true
///
/// [train]
/// experiment_id = "four-way"
/// workers       = 4
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentConfig {
    pub env_kind:     EnvKind,
    pub env:          EnvConfig,
    pub actor_critic: ActorCriticConfig,
    pub train:        TrainConfig,
    pub runtime:      RuntimeConfig,
    pub rewards:      RewardConfig,
    pub layout:       IntersectionLayout,
    pub vehicle:      VehicleParams,
}

impl ExperimentConfig {
    /// Load from a `.toml` or `.json` file, chosen by extension.
    pub fn load(path: &Path) -> TrainResult<Self> {
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&text),
            Some("json") => Self::from_json_str(&text),
            _ => Err(TrainError::Config(format!(
                "{}: experiment file must end in .toml or .json",
                path.display()
            ))),
        }
    }

    pub fn from_toml_str(text: &str) -> TrainResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> TrainResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Check every bundle and their mutual consistency.  Called before any
    /// worker starts.
    pub fn validate(&self) -> TrainResult<()> {
        self.env_kind.ensure_supported()?;
        self.env.validate()?;
        self.actor_critic.validate()?;
        self.actor_critic.check_compatible(&self.env)?;
        self.layout.validate()?;
        self.train.validate()?;
        if self.runtime.straggler_timeout_secs == Some(0) {
            return Err(TrainError::Config("straggler_timeout_secs must be positive".into()));
        }
        let v = &self.vehicle;
        if [v.length, v.width, v.dt, v.max_speed, v.max_lateral_accel].iter().any(|x| !(x.is_finite() && *x > 0.0)) {
            return Err(TrainError::Config(format!("vehicle parameters must be positive, got {v:?}")));
        }
        Ok(())
    }
}
