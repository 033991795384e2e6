//! Tests for ix-train.

use std::thread;

use ix_core::{ActorCriticConfig, AgentId, EnvConfig, SimRng};
use ix_perception::Observation;
use ix_rollout::{ActionSample, Policy, Trajectory, TrajectoryEnd, Transition};
use ix_sim::EpisodeSummary;
use ix_vehicle::AgentStatus;

use crate::*;

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Small and fast: 2 agents, 8 rays, one frame, 60 steps per iteration.
fn small_config(workers: usize, iterations: u64) -> ExperimentConfig {
    let mut c = ExperimentConfig::default();
    c.env = EnvConfig { nagents: 2, horizon: 30, npoints: 8, history_len: 1, ..EnvConfig::default() };
    c.actor_critic = ActorCriticConfig { hidden_sizes: vec![8], history_len: 1, ..ActorCriticConfig::default() };
    c.train = TrainConfig {
        steps_per_epoch: 60,
        epochs: 3,
        iterations,
        save_every: 1,
        workers,
        experiment_id: "unit".into(),
        ..TrainConfig::default()
    };
    c
}

fn transition(reward: f32, value: f32, done: bool) -> Transition {
    Transition { observation: Observation::zeros(1), action: 0, reward, done, log_prob: 0.0, value }
}

fn trajectory(transitions: Vec<Transition>, end: TrajectoryEnd) -> Trajectory {
    Trajectory { agent: AgentId(0), episode_seed: 0, transitions, end }
}

/// Three hand-made samples over a 3-wide observation and 2 actions.
fn tiny_batch() -> TrainBatch {
    let uniform = -(2.0f32).ln();
    TrainBatch {
        obs_len:       3,
        observations:  vec![0.2, -0.5, 0.9, 1.0, 0.3, -0.2, -0.7, 0.1, 0.4],
        actions:       vec![0, 1, 1],
        old_log_probs: vec![uniform; 3],
        advantages:    vec![1.0, -0.5, 0.8],
        returns:       vec![0.5, -1.0, 2.0],
    }
}

fn same_bits(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

#[derive(Default)]
struct Recording {
    iterations: Vec<IterationStats>,
    episodes:   usize,
    ended:      bool,
}

impl TrainObserver for Recording {
    fn on_episode(&mut self, _iteration: u64, _summary: &EpisodeSummary) {
        self.episodes += 1;
    }

    fn on_iteration(&mut self, stats: &IterationStats) {
        self.iterations.push(stats.clone());
    }

    fn on_train_end(&mut self, _report: &TrainReport) {
        self.ended = true;
    }
}

/// Delegates to an MLP but reports a fixed KL.
struct FixedKl {
    inner: MlpActorCritic,
    kl:    f32,
}

impl Policy for FixedKl {
    fn action_count(&self) -> usize {
        self.inner.action_count()
    }

    fn act(&self, observations: &[Observation], rng: &mut SimRng) -> Vec<ActionSample> {
        self.inner.act(observations, rng)
    }

    fn value(&self, observations: &[Observation]) -> Vec<f32> {
        self.inner.value(observations)
    }
}

impl ActorCritic for FixedKl {
    fn obs_len(&self) -> usize {
        self.inner.obs_len()
    }

    fn parameters(&self) -> &[f32] {
        self.inner.parameters()
    }

    fn set_parameters(&mut self, parameters: &[f32]) -> TrainResult<()> {
        self.inner.set_parameters(parameters)
    }

    fn policy_param_count(&self) -> usize {
        self.inner.policy_param_count()
    }

    fn loss_and_gradient(&self, batch: &TrainBatch, coef: &LossCoefficients) -> LossReport {
        self.inner.loss_and_gradient(batch, coef)
    }

    fn approx_kl(&self, _batch: &TrainBatch) -> f32 {
        self.kl
    }
}

// ── GAE ───────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod gae_tests {
    use super::*;

    #[test]
    fn cumsum_discounts_backwards() {
        assert_eq!(discounted_cumsum(&[1.0, 1.0, 1.0], 0.5), vec![1.75, 1.5, 1.0]);
        assert!(discounted_cumsum(&[], 0.9).is_empty());
    }

    #[test]
    fn terminal_trajectory_uses_zero_bootstrap() {
        let t = trajectory(
            vec![transition(0.0, 0.0, false), transition(0.0, 0.0, false), transition(1.0, 0.0, true)],
            TrajectoryEnd::Terminal(AgentStatus::ReachedGoal),
        );
        let (adv, ret) = advantages(&t, 1.0, 1.0);
        assert_eq!(adv, vec![1.0, 1.0, 1.0]);
        assert_eq!(ret, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn truncated_trajectory_bootstraps() {
        let t = trajectory(vec![transition(0.0, 0.0, true)], TrajectoryEnd::Truncated { bootstrap: 2.0 });
        let (adv, ret) = advantages(&t, 0.5, 0.9);
        assert_eq!(adv, vec![1.0]);
        assert_eq!(ret, vec![1.0]);
    }

    #[test]
    fn values_enter_the_deltas() {
        // δ0 = 1 + 0.5·2 − 1 = 1, δ1 = 0 + 0 − 2 = −2; A0 = 1 + 0.25·(−2).
        let t = trajectory(
            vec![transition(1.0, 1.0, false), transition(0.0, 2.0, true)],
            TrajectoryEnd::Terminal(AgentStatus::Collided),
        );
        let (adv, ret) = advantages(&t, 0.5, 0.5);
        assert_eq!(adv, vec![0.5, -2.0]);
        assert_eq!(ret, vec![1.5, 0.0]);
    }

    #[test]
    fn normalisation_uses_given_moments() {
        let mut b = TrainBatch { advantages: vec![1.0, 2.0, 3.0], actions: vec![0; 3], ..TrainBatch::default() };
        let m = b.advantage_moments();
        assert_eq!(m, [6.0, 14.0, 3.0]);
        b.normalize_advantages(m);
        let mean: f32 = b.advantages.iter().sum::<f32>() / 3.0;
        let var: f32 = b.advantages.iter().map(|a| a * a).sum::<f32>() / 3.0;
        assert!(mean.abs() < 1e-6);
        assert!((var - 1.0).abs() < 1e-4);
    }
}

// ── MlpActorCritic ────────────────────────────────────────────────────────────

#[cfg(test)]
mod mlp_tests {
    use super::*;

    #[test]
    fn parameter_layout() {
        let m = MlpActorCritic::new(3, 2, &[4], 0);
        // policy: 3·4 + 4 + 4·2 + 2; value: 3·4 + 4 + 4·1 + 1
        assert_eq!(m.policy_param_count(), 26);
        assert_eq!(m.parameters().len(), 26 + 21);
        assert_eq!(m.action_count(), 2);
        assert_eq!(m.obs_len(), 3);
    }

    #[test]
    fn initial_policy_is_near_uniform() {
        let m = MlpActorCritic::new(13, 5, &[8, 8], 1);
        let obs = vec![Observation(vec![0.5; 13]), Observation(vec![1.0; 13])];
        let mut rng = SimRng::new(0);
        for s in m.act(&obs, &mut rng) {
            assert!(s.action < 5);
            assert!((s.log_prob + (5.0f32).ln()).abs() < 0.1, "log_prob {}", s.log_prob);
            assert!(s.value.is_finite());
        }
    }

    #[test]
    fn sampling_is_seeded() {
        let m = MlpActorCritic::new(4, 5, &[6], 3);
        let obs: Vec<Observation> = (0..20).map(|i| Observation(vec![i as f32 * 0.05; 4])).collect();
        let a = m.act(&obs, &mut SimRng::new(8));
        let b = m.act(&obs, &mut SimRng::new(8));
        assert_eq!(a, b);
        assert_eq!(m.value(&obs), a.iter().map(|s| s.value).collect::<Vec<_>>());
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let model = MlpActorCritic::new(3, 2, &[4], 5);
        let batch = tiny_batch();
        let coef = LossCoefficients { clip_ratio: 0.2, entropy_coef: 0.1 };
        let report = model.loss_and_gradient(&batch, &coef);

        let h = 1e-2;
        let base = model.parameters().to_vec();
        for k in (0..base.len()).step_by(3) {
            let mut shifted = model.clone();
            let mut p = base.clone();
            p[k] += h;
            shifted.set_parameters(&p).unwrap();
            let up = shifted.loss_and_gradient(&batch, &coef).total(&coef);
            p[k] -= 2.0 * h;
            shifted.set_parameters(&p).unwrap();
            let down = shifted.loss_and_gradient(&batch, &coef).total(&coef);

            let numeric = (up - down) / (2.0 * h);
            let analytic = report.gradient[k];
            assert!(
                (numeric - analytic).abs() <= 2e-3 + 0.02 * analytic.abs(),
                "param {k}: numeric {numeric}, analytic {analytic}"
            );
        }
    }

    #[test]
    fn report_terms_are_consistent() {
        let model = MlpActorCritic::new(3, 2, &[4], 5);
        let batch = tiny_batch();
        let coef = LossCoefficients { clip_ratio: 0.2, entropy_coef: 0.0 };
        let report = model.loss_and_gradient(&batch, &coef);
        assert!((report.approx_kl - model.approx_kl(&batch)).abs() < 1e-6);
        assert!(report.entropy > 0.0 && report.entropy <= (2.0f32).ln() + 1e-6);
        assert!(report.value_loss >= 0.0);
        assert_eq!(report.clip_fraction, 0.0);
    }

    #[test]
    fn empty_batch_has_zero_gradient() {
        let model = MlpActorCritic::new(3, 2, &[4], 5);
        let coef = LossCoefficients { clip_ratio: 0.2, entropy_coef: 0.01 };
        let report = model.loss_and_gradient(&TrainBatch { obs_len: 3, ..TrainBatch::default() }, &coef);
        assert!(report.gradient.iter().all(|&g| g == 0.0));
        assert_eq!(report.gradient.len(), model.parameters().len());
    }

    #[test]
    fn wrong_width_observations_produce_no_samples() {
        let m = MlpActorCritic::new(3, 2, &[4], 5);
        let obs = vec![Observation(vec![0.0; 3]), Observation(vec![0.0; 4])];
        assert!(m.act(&obs, &mut SimRng::new(0)).is_empty());
        assert!(m.value(&obs).is_empty());
        let wide = TrainBatch { obs_len: 4, observations: vec![0.0; 4], actions: vec![0], ..tiny_batch() };
        let coef = LossCoefficients { clip_ratio: 0.2, entropy_coef: 0.01 };
        assert!(m.loss_and_gradient(&wide, &coef).gradient.iter().all(|&g| g == 0.0));
    }

    #[test]
    fn wrong_parameter_length_is_rejected() {
        let mut model = MlpActorCritic::new(3, 2, &[4], 5);
        let err = model.set_parameters(&[0.0; 3]).unwrap_err();
        assert!(matches!(err, TrainError::ParameterCount { expected: 47, got: 3 }));
    }
}

// ── Adam ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod adam_tests {
    use super::*;

    #[test]
    fn first_step_moves_by_group_learning_rate() {
        let mut adam = Adam::actor_critic(3, 2, 0.1, 0.01).unwrap();
        let mut params = vec![0.0; 3];
        adam.step(&mut params, &[1.0, -2.0, 3.0]).unwrap();
        let expected = [-0.1, 0.1, -0.01];
        for (p, e) in params.iter().zip(expected) {
            assert!((p - e).abs() < 1e-6, "{params:?}");
        }
        assert_eq!(adam.state().unwrap().step, 1);
    }

    #[test]
    fn moments_carry_between_steps() {
        // A constant gradient keeps m̂/√v̂ at one, so each step moves by lr.
        let mut adam = Adam::actor_critic(2, 1, 0.1, 0.1).unwrap();
        let mut params = vec![0.0; 2];
        for _ in 0..3 {
            adam.step(&mut params, &[0.5, -4.0]).unwrap();
        }
        assert!((params[0] + 0.3).abs() < 1e-5, "{params:?}");
        assert!((params[1] - 0.3).abs() < 1e-5, "{params:?}");
        let state = adam.state().unwrap();
        assert_eq!(state.step, 3);
        assert_eq!(state.groups, vec![1, 1]);
        assert!(state.moments.iter().all(|m| !m.is_empty()));
    }

    #[test]
    fn groups_must_tile() {
        let gap = vec![ParamGroup { range: 0..2, lr: 0.1 }, ParamGroup { range: 3..4, lr: 0.1 }];
        assert!(Adam::new(4, gap).is_err());
        let short = vec![ParamGroup { range: 0..2, lr: 0.1 }];
        assert!(Adam::new(4, short).is_err());
    }

    #[test]
    fn length_mismatches_are_rejected() {
        let mut adam = Adam::actor_critic(3, 1, 0.1, 0.1).unwrap();
        assert!(adam.step(&mut [0.0; 2], &[0.0; 3]).is_err());
        let short = AdamState { step: 1, groups: vec![1, 1], moments: vec![Vec::new(); 2] };
        assert!(matches!(adam.restore(short), Err(TrainError::ParameterCount { expected: 3, got: 2 })));
        let regrouped = AdamState { step: 1, groups: vec![2, 1], moments: vec![Vec::new(); 2] };
        assert!(matches!(adam.restore(regrouped), Err(TrainError::Config(_))));
    }

    #[test]
    fn restored_state_continues_identically() {
        let grads = [[0.5, -1.0], [0.25, 0.75], [-0.5, 0.1]];
        let mut a = Adam::actor_critic(2, 1, 0.05, 0.02).unwrap();
        let mut pa = vec![1.0, -1.0];
        a.step(&mut pa, &grads[0]).unwrap();

        let mut b = Adam::actor_critic(2, 1, 0.05, 0.02).unwrap();
        b.restore(a.state().unwrap()).unwrap();
        let mut pb = pa.clone();
        for g in &grads[1..] {
            a.step(&mut pa, g).unwrap();
            b.step(&mut pb, g).unwrap();
        }
        assert!(same_bits(&pa, &pb));
    }
}

// ── Collectives ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod collective_tests {
    use std::time::Duration;

    use super::*;

    fn input(rank: usize) -> Vec<f32> {
        vec![0.1 * rank as f32 + 0.3, 1e-3 / (rank as f32 + 1.0), -(rank as f32)]
    }

    #[test]
    fn all_reduce_is_bit_identical_in_rank_order() {
        let results: Vec<Vec<f32>> = thread::scope(|s| {
            let handles: Vec<_> = ChannelCollective::mesh(3, None)
                .into_iter()
                .map(|mut c| {
                    s.spawn(move || {
                        let mut buf = input(c.rank());
                        c.all_reduce_sum(&mut buf).unwrap();
                        buf
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut expected = vec![0.0f32; 3];
        for rank in 0..3 {
            for (e, x) in expected.iter_mut().zip(input(rank)) {
                *e += x;
            }
        }
        for r in &results {
            assert!(same_bits(r, &expected));
        }
    }

    #[test]
    fn broadcast_then_barrier_then_mean() {
        let results: Vec<(Vec<f32>, Vec<f32>)> = thread::scope(|s| {
            let handles: Vec<_> = ChannelCollective::mesh(4, Some(Duration::from_secs(10)))
                .into_iter()
                .map(|mut c| {
                    s.spawn(move || {
                        let mut b = vec![c.rank() as f32; 2];
                        c.broadcast(&mut b, 2).unwrap();
                        c.barrier().unwrap();
                        let mut m = vec![c.rank() as f32];
                        c.all_reduce_mean(&mut m).unwrap();
                        (b, m)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for (b, m) in results {
            assert_eq!(b, vec![2.0, 2.0]);
            assert_eq!(m, vec![1.5]);
        }
    }

    #[test]
    fn single_rank_is_identity() {
        let mut c = ChannelCollective::mesh(1, None).pop().unwrap();
        let mut buf = vec![1.0, 2.0];
        c.all_reduce_sum(&mut buf).unwrap();
        c.broadcast(&mut buf, 0).unwrap();
        c.barrier().unwrap();
        assert_eq!(buf, vec![1.0, 2.0]);
        assert_eq!(c.world_size(), 1);
    }

    #[test]
    fn straggler_times_out() {
        let mut mesh = ChannelCollective::mesh(2, Some(Duration::from_millis(20)));
        let _silent = mesh.pop().unwrap();
        let mut c = mesh.pop().unwrap();
        let err = c.all_reduce_sum(&mut [1.0]).unwrap_err();
        assert!(matches!(err, TrainError::CollectiveTimeout { rank: 0, round: 1 }));
    }

    #[test]
    fn dropped_peer_is_reported() {
        let mut mesh = ChannelCollective::mesh(2, None);
        drop(mesh.pop());
        let mut c = mesh.pop().unwrap();
        let err = c.all_reduce_sum(&mut [1.0]).unwrap_err();
        assert!(matches!(err, TrainError::PeerDisconnected { rank: 0, peer: 1 }));
        assert!(err.is_secondary());
    }

    #[test]
    fn length_mismatch_is_detected() {
        let errors: Vec<bool> = thread::scope(|s| {
            let handles: Vec<_> = ChannelCollective::mesh(2, Some(Duration::from_secs(10)))
                .into_iter()
                .map(|mut c| {
                    s.spawn(move || {
                        let mut buf = vec![0.0; 1 + c.rank()];
                        matches!(c.all_reduce_sum(&mut buf), Err(TrainError::CollectiveMismatch { .. }))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(errors, vec![true, true]);
    }
}

// ── Checkpoints ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod checkpoint_tests {
    use super::*;

    fn state(iteration: u64) -> TrainingState {
        TrainingState {
            experiment_id: "exp".into(),
            iteration,
            parameters: vec![0.1, -0.25, iteration as f32],
            optimizer: AdamState { step: iteration, groups: vec![2, 1], moments: vec![vec![1, 2, 3], Vec::new()] },
        }
    }

    #[test]
    fn fs_store_loads_highest_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCheckpointStore::new(dir.path());
        for it in [1, 2, 10] {
            store.save("exp", it, &state(it)).unwrap();
        }
        assert_eq!(store.iterations("exp").unwrap(), vec![1, 2, 10]);
        assert_eq!(store.load("exp").unwrap(), Some(state(10)));
        assert!(store.path_for("exp", 2).is_file());

        let leftovers = std::fs::read_dir(dir.path().join("exp"))
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn fs_store_without_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCheckpointStore::new(dir.path());
        assert_eq!(store.load("nothing-here").unwrap(), None);
    }

    #[test]
    fn corrupt_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCheckpointStore::new(dir.path());
        store.save("exp", 1, &state(1)).unwrap();
        std::fs::write(store.path_for("exp", 3), b"{ not json").unwrap();
        assert!(matches!(store.load("exp"), Err(TrainError::Checkpoint { .. })));
    }

    #[test]
    fn checkpoint_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsCheckpointStore::new(dir.path());
        store.save("exp", 4, &state(4)).unwrap();
        let loaded = load_checkpoint_file(&store.path_for("exp", 4)).unwrap();
        assert_eq!(loaded, state(4));
        assert!(load_checkpoint_file(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn memory_store_keeps_experiments_apart() {
        let store = MemoryCheckpointStore::new();
        store.save("a", 3, &state(3)).unwrap();
        store.save("a", 1, &state(1)).unwrap();
        store.save("b", 7, &state(7)).unwrap();
        assert_eq!(store.load("a").unwrap().map(|s| s.iteration), Some(3));
        assert_eq!(store.load("b").unwrap().map(|s| s.iteration), Some(7));
        assert_eq!(store.load("c").unwrap(), None);
        assert_eq!(store.iterations("a"), vec![1, 3]);
    }
}

// ── Configuration ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod config_tests {
    use ix_core::{EnvKind, IxError};

    use super::*;

    #[test]
    fn defaults_validate() {
        ExperimentConfig::default().validate().unwrap();
        small_config(2, 2).validate().unwrap();
    }

    #[test]
    fn bundled_experiment_validates() {
        let text = include_str!("../../../apps/intersection/experiments/four_way.toml");
        let c = ExperimentConfig::from_toml_str(text).unwrap();
        c.validate().unwrap();
        assert_eq!(c.train.experiment_id, "four-way");
        assert_eq!(c.train.workers, 4);
    }

    #[test]
    fn toml_experiment_file() {
        let text = r#"
            env_kind = "discrete-fixed-track"

            [env]
            nagents = 6
            turns   = true

            [train]
            experiment_id = "four-way"
            workers       = 2
            pi_lr         = 0.001

            [runtime]
            straggler_timeout_secs = 5
        "#;
        let c = ExperimentConfig::from_toml_str(text).unwrap();
        assert_eq!(c.env.nagents, 6);
        assert!(c.env.turns);
        assert_eq!(c.env.horizon, EnvConfig::default().horizon);
        assert_eq!(c.train.workers, 2);
        assert_eq!(c.train.pi_lr, 0.001);
        assert_eq!(c.runtime.straggler_timeout(), Some(std::time::Duration::from_secs(5)));
        c.validate().unwrap();
    }

    #[test]
    fn json_round_trip() {
        let c = small_config(3, 4);
        let text = serde_json::to_string(&c).unwrap();
        assert_eq!(ExperimentConfig::from_json_str(&text).unwrap(), c);
    }

    #[test]
    fn unknown_environment_and_fields_are_rejected() {
        assert!(ExperimentConfig::from_toml_str("env_kind = \"hovercraft\"").is_err());
        assert!(ExperimentConfig::from_toml_str("[train]\nlearning_rate = 1.0").is_err());
    }

    #[test]
    fn inconsistent_bundles_are_rejected() {
        let mut c = ExperimentConfig::default();
        c.env_kind = EnvKind::ContinuousFixedTrack;
        assert!(matches!(c.validate(), Err(TrainError::Core(IxError::Unsupported(_)))));

        let mut c = ExperimentConfig::default();
        c.actor_critic.history_len = 3;
        assert!(matches!(c.validate(), Err(TrainError::Core(IxError::Config(_)))));

        for train in [
            TrainConfig { workers: 0, ..TrainConfig::default() },
            TrainConfig { steps_per_epoch: 2, workers: 4, ..TrainConfig::default() },
            TrainConfig { experiment_id: "a/b".into(), ..TrainConfig::default() },
            TrainConfig { clip_ratio: 1.5, ..TrainConfig::default() },
            TrainConfig { gamma: 1.2, ..TrainConfig::default() },
        ] {
            let c = ExperimentConfig { train, ..ExperimentConfig::default() };
            assert!(matches!(c.validate(), Err(TrainError::Config(_))));
        }
    }

    #[test]
    fn load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("exp.toml");
        std::fs::write(&toml_path, "[env]\nnagents = 3\n").unwrap();
        assert_eq!(ExperimentConfig::load(&toml_path).unwrap().env.nagents, 3);

        let yaml_path = dir.path().join("exp.yaml");
        std::fs::write(&yaml_path, "env: {}").unwrap();
        assert!(matches!(ExperimentConfig::load(&yaml_path), Err(TrainError::Config(_))));
    }

    #[test]
    fn local_steps_cover_the_total() {
        let t = TrainConfig { steps_per_epoch: 100, workers: 3, ..TrainConfig::default() };
        assert_eq!(t.local_steps(), 34);
    }
}

// ── Training runs ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod trainer_tests {
    use ix_sim::IntersectionEnv;

    use super::*;

    fn fixed_kl_factory(
        config: &ExperimentConfig,
        kl:     f32,
    ) -> impl Fn(usize) -> TrainResult<(IntersectionEnv, FixedKl)> + Sync + '_ {
        move |_rank| {
            let env = EnvFactory::new(config)?.build()?;
            let inner =
                MlpActorCritic::from_config(&config.actor_critic, env.observation_len(), env.action_count(), 0);
            Ok((env, FixedKl { inner, kl }))
        }
    }

    #[test]
    fn single_worker_trains_and_checkpoints() {
        let config = small_config(1, 2);
        let store = MemoryCheckpointStore::new();
        let mut rec = Recording::default();
        let reports = launch(&config, &store, &mut rec).unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].final_iteration, 2);
        assert_eq!(reports[0].iterations_run, 2);
        assert_eq!(reports[0].resumed_from, None);
        assert_eq!(store.iterations("unit"), vec![1, 2]);
        assert_eq!(store.load("unit").unwrap().unwrap().parameters, reports[0].parameters);

        assert!(rec.ended);
        assert_eq!(rec.iterations.len(), 2);
        for (i, stats) in rec.iterations.iter().enumerate() {
            assert_eq!(stats.iteration, i as u64);
            assert!(stats.steps >= 60);
            assert!((1..=3).contains(&stats.epochs_run));
            assert!(stats.value_loss.is_finite());
        }
    }

    #[test]
    fn replicas_are_bit_identical() {
        let config = small_config(3, 2);
        let store = MemoryCheckpointStore::new();
        let reports = launch(&config, &store, &mut NoopTrainObserver).unwrap();
        assert_eq!(reports.len(), 3);
        for r in &reports[1..] {
            assert!(same_bits(&r.parameters, &reports[0].parameters));
        }
    }

    #[test]
    fn resumed_run_matches_uninterrupted_run() {
        let straight = MemoryCheckpointStore::new();
        let full = launch(&small_config(2, 3), &straight, &mut NoopTrainObserver).unwrap();

        let interrupted = MemoryCheckpointStore::new();
        launch(&small_config(2, 2), &interrupted, &mut NoopTrainObserver).unwrap();
        let resumed = launch(&small_config(2, 3), &interrupted, &mut NoopTrainObserver).unwrap();

        assert_eq!(resumed[0].resumed_from, Some(2));
        assert_eq!(resumed[0].iterations_run, 1);
        assert!(same_bits(&resumed[0].parameters, &full[0].parameters));
    }

    #[test]
    fn high_kl_stops_after_one_epoch() {
        let config = small_config(2, 2);
        let mut rec = Recording::default();
        launch_with(&config, &MemoryCheckpointStore::new(), fixed_kl_factory(&config, 1.0), &mut rec).unwrap();
        assert!(rec.iterations.iter().all(|s| s.stopped_early && s.epochs_run == 1));
    }

    #[test]
    fn low_kl_runs_every_epoch() {
        let config = small_config(1, 1);
        let mut rec = Recording::default();
        launch_with(&config, &MemoryCheckpointStore::new(), fixed_kl_factory(&config, 0.0), &mut rec).unwrap();
        assert!(rec.iterations.iter().all(|s| !s.stopped_early && s.epochs_run == 3));
    }

    #[test]
    fn trainer_resumes_from_store() {
        let config = small_config(1, 10);
        let env = EnvFactory::new(&config).unwrap().build().unwrap();
        let model = MlpActorCritic::from_config(&config.actor_critic, env.observation_len(), env.action_count(), 0);
        let params: Vec<f32> = vec![0.5; model.parameters().len()];
        let store = MemoryCheckpointStore::new();
        let mut adam = Adam::actor_critic(params.len(), model.policy_param_count(), 1e-3, 1e-3).unwrap();
        adam.step(&mut params.clone(), &vec![0.1; params.len()]).unwrap();
        let optimizer = adam.state().unwrap();
        store
            .save("unit", 5, &TrainingState { experiment_id: "unit".into(), iteration: 5, parameters: params.clone(), optimizer })
            .unwrap();

        let collective = ChannelCollective::mesh(1, None).pop().unwrap();
        let trainer = Trainer::new(&config, &store, env, model, collective).unwrap();
        assert_eq!(trainer.start_iteration(), 5);
        assert_eq!(trainer.model().parameters(), params.as_slice());
    }

    #[test]
    fn finetune_loads_parameters_only() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsCheckpointStore::new(dir.path());
        let mut config = small_config(1, 3);

        let env = EnvFactory::new(&config).unwrap().build().unwrap();
        let donor = MlpActorCritic::from_config(&config.actor_critic, env.observation_len(), env.action_count(), 99);
        let len = donor.parameters().len();
        let state = TrainingState {
            experiment_id: "donor".into(),
            iteration: 40,
            parameters: donor.parameters().to_vec(),
            optimizer: AdamState { step: 40, groups: vec![len], moments: vec![Vec::new()] },
        };
        source.save("donor", 40, &state).unwrap();
        config.train.finetune_from = Some(source.path_for("donor", 40));

        let model = MlpActorCritic::from_config(&config.actor_critic, env.observation_len(), env.action_count(), 0);
        let collective = ChannelCollective::mesh(1, None).pop().unwrap();
        let store = MemoryCheckpointStore::new();
        let trainer = Trainer::new(&config, &store, env, model, collective).unwrap();
        assert_eq!(trainer.start_iteration(), 0);
        assert_eq!(trainer.model().parameters(), donor.parameters());
    }

    #[test]
    fn model_observation_width_must_match_environment() {
        let config = small_config(1, 1);
        let env = EnvFactory::new(&config).unwrap().build().unwrap();
        let model =
            MlpActorCritic::from_config(&config.actor_critic, env.observation_len() + 1, env.action_count(), 0);
        let collective = ChannelCollective::mesh(1, None).pop().unwrap();
        let store = MemoryCheckpointStore::new();
        let err = Trainer::new(&config, &store, env, model, collective).err().unwrap();
        assert!(matches!(err, TrainError::Config(ref m) if m.contains("observations of length")));
    }

    #[test]
    fn mismatched_checkpoint_is_rejected() {
        let config = small_config(1, 2);
        let store = MemoryCheckpointStore::new();
        let state = TrainingState {
            experiment_id: "unit".into(),
            iteration: 1,
            parameters: vec![0.0; 4],
            optimizer: AdamState::default(),
        };
        store.save("unit", 1, &state).unwrap();
        let err = launch(&config, &store, &mut NoopTrainObserver).unwrap_err();
        assert!(matches!(err, TrainError::ParameterCount { got: 4, .. }));
    }

    #[test]
    fn failing_rank_reports_its_own_error() {
        let config = small_config(2, 2);
        let envs = EnvFactory::new(&config).unwrap();
        let factory = |rank: usize| -> TrainResult<(IntersectionEnv, MlpActorCritic)> {
            if rank == 1 {
                return Err(TrainError::Config("rank 1 refuses".into()));
            }
            let env = envs.build()?;
            let model = MlpActorCritic::from_config(&config.actor_critic, env.observation_len(), env.action_count(), 0);
            Ok((env, model))
        };
        let err = launch_with(&config, &MemoryCheckpointStore::new(), factory, &mut NoopTrainObserver).unwrap_err();
        assert!(matches!(err, TrainError::Config(ref m) if m.contains("refuses")));
    }

    #[test]
    fn invalid_config_fails_before_launch() {
        let mut config = small_config(1, 1);
        config.train.workers = 0;
        let err = launch(&config, &MemoryCheckpointStore::new(), &mut NoopTrainObserver).unwrap_err();
        assert!(matches!(err, TrainError::Config(_)));
    }
}
