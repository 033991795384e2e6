//! The PPO training loop and the multi-worker launcher.

use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing::{info, warn};

use ix_core::rng::mix_seed;
use ix_rollout::RolloutWorker;
use ix_sim::{EnvBuilder, IntersectionEnv};
use ix_track::{TrackSet, TrackSetBuilder};

use crate::{
    ActorCritic, Adam, ChannelCollective, CheckpointStore, Collective, ExperimentConfig,
    IterationStats, LossCoefficients, LossReport, MlpActorCritic, NoopTrainObserver,
    TrainBatch, TrainError, TrainObserver, TrainResult, TrainingState, load_checkpoint_file,
};

/// Outcome of one rank's run.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainReport {
    pub rank:            usize,
    /// Final parameters.  Identical on every rank.
    pub parameters:      Vec<f32>,
    /// Iterations executed by this process, excluding resumed ones.
    pub iterations_run:  u64,
    /// Iterations completed in total.
    pub final_iteration: u64,
    /// Completed iteration count found in the store at startup.
    pub resumed_from:    Option<u64>,
    pub last:            Option<IterationStats>,
}

// ── Trainer ───────────────────────────────────────────────────────────────────

/// One rank of a training run: its environment, rollout worker, model
/// replica, optimiser and collective endpoint.
///
/// Per iteration:
///
/// 1. Roll out `steps_per_epoch / workers` transitions with the current
///    parameters.
/// 2. GAE, then advantage normalisation with moments summed over all ranks.
/// 3. Up to `epochs` passes: gradient, all-reduce mean, Adam step, KL of the
///    new parameters (all-reduced).  Stop once KL exceeds `target_kl`.
/// 4. Rank 0 checkpoints every `save_every` iterations and at the end; all
///    ranks meet at a barrier before the next rollout.
///
/// Every rank applies the same reduced gradient to the same parameters and
/// optimiser state, so replicas stay bit-identical without re-broadcasting.
pub struct Trainer<'a, M: ActorCritic, C: Collective> {
    config:          &'a ExperimentConfig,
    store:           &'a dyn CheckpointStore,
    env:             IntersectionEnv,
    model:           M,
    optimizer:       Adam,
    collective:      C,
    worker:          RolloutWorker,
    start_iteration: u64,
    resumed_from:    Option<u64>,
}

impl<'a, M: ActorCritic, C: Collective> Trainer<'a, M, C> {
    /// Restore from `store` (or the finetune file), then adopt rank 0's
    /// parameters.
    pub fn new(
        config:     &'a ExperimentConfig,
        store:      &'a dyn CheckpointStore,
        env:        IntersectionEnv,
        mut model:  M,
        collective: C,
    ) -> TrainResult<Self> {
        let train = &config.train;
        if model.action_count() != env.action_count() {
            return Err(TrainError::Config(format!(
                "model has {} actions, environment has {}",
                model.action_count(),
                env.action_count()
            )));
        }
        if model.obs_len() != env.observation_len() {
            return Err(TrainError::Config(format!(
                "model expects observations of length {}, environment produces {}",
                model.obs_len(),
                env.observation_len()
            )));
        }
        let len = model.parameters().len();
        let mut optimizer = Adam::actor_critic(len, model.policy_param_count(), train.pi_lr, train.vf_lr)?;
        let worker = RolloutWorker::new(train.seed);

        let mut start_iteration = 0;
        let mut resumed_from = None;
        if let Some(state) = store.load(&train.experiment_id)? {
            model.set_parameters(&state.parameters)?;
            optimizer.restore(state.optimizer)?;
            start_iteration = state.iteration;
            resumed_from = Some(state.iteration);
            if collective.rank() == 0 {
                warn!(experiment = %train.experiment_id, iteration = state.iteration, "resuming from checkpoint");
            }
        } else if let Some(path) = &train.finetune_from {
            let state = load_checkpoint_file(path)?;
            model.set_parameters(&state.parameters)?;
            if collective.rank() == 0 {
                info!(from = %path.display(), "finetuning from checkpoint parameters");
            }
        }

        let mut trainer = Self {
            config,
            store,
            env,
            model,
            optimizer,
            collective,
            worker,
            start_iteration,
            resumed_from,
        };
        trainer.sync_parameters()?;
        Ok(trainer)
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn rank(&self) -> usize {
        self.collective.rank()
    }

    pub fn start_iteration(&self) -> u64 {
        self.start_iteration
    }

    fn sync_parameters(&mut self) -> TrainResult<()> {
        let mut params = self.model.parameters().to_vec();
        self.collective.broadcast(&mut params, 0)?;
        self.model.set_parameters(&params)
    }

    fn is_root(&self) -> bool {
        self.collective.rank() == 0
    }

    /// Run the remaining iterations.  `observer` is only called on rank 0.
    pub fn run(&mut self, observer: &mut dyn TrainObserver) -> TrainResult<TrainReport> {
        let config = self.config;
        let total = config.train.iterations;
        let mut last = None;

        for iteration in self.start_iteration..total {
            let stats = self.iteration(iteration, observer)?;
            if self.is_root() {
                observer.on_iteration(&stats);
            }
            let done = iteration + 1;
            if self.is_root() && (done % config.train.save_every == 0 || done == total) {
                self.save(done)?;
            }
            self.collective.barrier()?;
            last = Some(stats);
        }

        let report = TrainReport {
            rank:            self.rank(),
            parameters:      self.model.parameters().to_vec(),
            iterations_run:  total.saturating_sub(self.start_iteration),
            final_iteration: total.max(self.start_iteration),
            resumed_from:    self.resumed_from,
            last,
        };
        if self.is_root() {
            observer.on_train_end(&report);
        }
        Ok(report)
    }

    fn save(&self, iteration: u64) -> TrainResult<()> {
        let id = &self.config.train.experiment_id;
        let state = TrainingState {
            experiment_id: id.clone(),
            iteration,
            parameters: self.model.parameters().to_vec(),
            optimizer: self.optimizer.state()?,
        };
        self.store.save(id, iteration, &state)?;
        info!(experiment = %id, iteration, "checkpoint saved");
        Ok(())
    }

    /// One rollout phase and one update.
    pub fn iteration(&mut self, iteration: u64, observer: &mut dyn TrainObserver) -> TrainResult<IterationStats> {
        let started = Instant::now();
        let config = self.config;
        let train = &config.train;
        let rank = self.collective.rank() as u64;

        // ── Rollout ───────────────────────────────────────────────────────
        self.worker.reseed(mix_seed(mix_seed(train.seed, rank), iteration));
        let rollouts = self.worker.collect(&mut self.env, &self.model, train.local_steps())?;
        if rank == 0 {
            for summary in &rollouts.episodes {
                observer.on_episode(iteration, summary);
            }
        }

        let mut episode_totals = [
            rollouts.steps as f32,
            rollouts.episodes.len() as f32,
            rollouts.episodes.iter().map(|e| e.mean_return()).sum::<f32>(),
            rollouts.episodes.iter().map(|e| e.spawned).sum::<usize>() as f32,
            rollouts.episodes.iter().map(|e| e.goals).sum::<usize>() as f32,
            rollouts.episodes.iter().map(|e| e.collisions).sum::<usize>() as f32,
        ];
        self.collective.all_reduce_sum(&mut episode_totals)?;
        let [steps, episodes, return_sum, spawned, goals, collisions] = episode_totals;

        // ── Advantages ────────────────────────────────────────────────────
        let mut batch = TrainBatch::from_rollouts(&rollouts, self.env.observation_len(), train.gamma, train.lam);
        let mut moments = batch.advantage_moments();
        self.collective.all_reduce_sum(&mut moments)?;
        batch.normalize_advantages(moments);

        // ── Update ────────────────────────────────────────────────────────
        let coef = LossCoefficients { clip_ratio: train.clip_ratio, entropy_coef: train.entropy_coef };
        let mut first: Option<LossReport> = None;
        let mut epochs_run = 0;
        let mut stopped_early = false;
        let mut kl = 0.0;

        for epoch in 0..train.epochs {
            let report = self.reduced_loss(&batch, &coef)?;
            let mut params = self.model.parameters().to_vec();
            self.optimizer.step(&mut params, &report.gradient)?;
            if params.iter().any(|p| !p.is_finite()) {
                return Err(TrainError::NonFinite("parameters"));
            }
            self.model.set_parameters(&params)?;
            epochs_run += 1;
            first.get_or_insert(report);

            kl = self.reduced_kl(&batch)?;
            if kl > train.target_kl {
                stopped_early = true;
                if rank == 0 {
                    warn!(iteration, epoch, kl, target = train.target_kl, "early stop: KL above target");
                }
                break;
            }
        }

        let first = first.unwrap_or_default();
        let stats = IterationStats {
            iteration,
            steps: steps as usize,
            episodes: episodes as usize,
            mean_return: (episodes > 0.0).then(|| return_sum / episodes),
            spawned: spawned as usize,
            goals: goals as usize,
            collisions: collisions as usize,
            policy_loss: first.policy_loss,
            value_loss: first.value_loss,
            entropy: first.entropy,
            approx_kl: kl,
            clip_fraction: first.clip_fraction,
            epochs_run,
            stopped_early,
            elapsed_secs: started.elapsed().as_secs_f64(),
        };
        if rank == 0 {
            info!(
                iteration,
                steps = stats.steps,
                episodes = stats.episodes,
                mean_return = stats.mean_return.unwrap_or(f32::NAN),
                collisions = stats.collisions,
                kl,
                epochs_run,
                "iteration done"
            );
        }
        Ok(stats)
    }

    /// Loss and gradient averaged over every rank's samples.
    fn reduced_loss(&mut self, batch: &TrainBatch, coef: &LossCoefficients) -> TrainResult<LossReport> {
        let local = self.model.loss_and_gradient(batch, coef);
        let n = batch.len() as f32;

        // Weight by sample count so ranks with more samples count more.
        let mut buf: Vec<f32> = local.gradient.iter().map(|g| g * n).collect();
        buf.extend([
            local.policy_loss * n,
            local.value_loss * n,
            local.entropy * n,
            local.approx_kl * n,
            local.clip_fraction * n,
            n,
        ]);
        self.collective.all_reduce_sum(&mut buf)?;

        let Some((&total, rest)) = buf.split_last() else {
            return Err(TrainError::NonFinite("gradient"));
        };
        if !(total > 0.0) {
            return Ok(LossReport { gradient: vec![0.0; local.gradient.len()], ..LossReport::default() });
        }
        let scaled: Vec<f32> = rest.iter().map(|x| x / total).collect();
        if scaled.iter().any(|x| !x.is_finite()) {
            return Err(TrainError::NonFinite("gradient"));
        }
        let (gradient, terms) = scaled.split_at(local.gradient.len());
        Ok(LossReport {
            gradient:      gradient.to_vec(),
            policy_loss:   terms[0],
            value_loss:    terms[1],
            entropy:       terms[2],
            approx_kl:     terms[3],
            clip_fraction: terms[4],
        })
    }

    fn reduced_kl(&mut self, batch: &TrainBatch) -> TrainResult<f32> {
        let n = batch.len() as f32;
        let mut buf = [self.model.approx_kl(batch) * n, n];
        self.collective.all_reduce_sum(&mut buf)?;
        Ok(if buf[1] > 0.0 { buf[0] / buf[1] } else { 0.0 })
    }
}

// ── Launch ────────────────────────────────────────────────────────────────────

/// Builds environments that share one immutable track set.
pub struct EnvFactory {
    config: ExperimentConfig,
    tracks: Arc<TrackSet>,
}

impl EnvFactory {
    pub fn new(config: &ExperimentConfig) -> TrainResult<Self> {
        let tracks = TrackSetBuilder::new(config.layout.clone()).turns(config.env.turns).build()?;
        Ok(Self { config: config.clone(), tracks: Arc::new(tracks) })
    }

    pub fn build(&self) -> TrainResult<IntersectionEnv> {
        let c = &self.config;
        Ok(EnvBuilder::new(c.env.clone())
            .kind(c.env_kind)
            .layout(c.layout.clone())
            .tracks(Arc::clone(&self.tracks))
            .vehicle(c.vehicle.clone())
            .rewards(c.rewards.clone())
            .build()?)
    }
}

/// Run `config.train.workers` ranks on scoped threads.
///
/// `factory(rank)` builds each rank's environment and model.  `observer`
/// receives rank 0's callbacks.  On failure the error of the rank that
/// failed first is returned, not the disconnects it caused on its peers.
pub fn launch_with<M, F, O>(
    config:   &ExperimentConfig,
    store:    &dyn CheckpointStore,
    factory:  F,
    observer: &mut O,
) -> TrainResult<Vec<TrainReport>>
where
    M: ActorCritic,
    F: Fn(usize) -> TrainResult<(IntersectionEnv, M)> + Sync,
    O: TrainObserver + Send,
{
    config.validate()?;
    let workers = config.train.workers;
    let endpoints = ChannelCollective::mesh(workers, config.runtime.straggler_timeout());
    info!(
        experiment = %config.train.experiment_id,
        workers,
        iterations = config.train.iterations,
        "launching training"
    );

    let factory = &factory;
    let mut observer = Some(observer);
    let results: Vec<TrainResult<TrainReport>> = thread::scope(|s| {
        let handles: Vec<_> = endpoints
            .into_iter()
            .enumerate()
            .map(|(rank, collective)| {
                let obs = if rank == 0 { observer.take() } else { None };
                s.spawn(move || -> TrainResult<TrainReport> {
                    let (env, model) = factory(rank)?;
                    let mut trainer = Trainer::new(config, store, env, model, collective)?;
                    match obs {
                        Some(o) => trainer.run(o),
                        None => trainer.run(&mut NoopTrainObserver),
                    }
                })
            })
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(rank, h)| h.join().unwrap_or(Err(TrainError::WorkerPanicked(rank))))
            .collect()
    });

    let mut reports = Vec::with_capacity(workers);
    let mut secondary = None;
    for result in results {
        match result {
            Ok(report) => reports.push(report),
            Err(e) if e.is_secondary() => {
                secondary.get_or_insert(e);
            }
            Err(e) => return Err(e),
        }
    }
    match secondary {
        Some(e) => Err(e),
        None => Ok(reports),
    }
}

/// [`launch_with`] using [`MlpActorCritic`] and environments built from
/// `config`.
pub fn launch<O: TrainObserver + Send>(
    config:   &ExperimentConfig,
    store:    &dyn CheckpointStore,
    observer: &mut O,
) -> TrainResult<Vec<TrainReport>> {
    config.validate()?;
    let envs = EnvFactory::new(config)?;
    launch_with(
        config,
        store,
        |_rank| {
            let env = envs.build()?;
            let model = MlpActorCritic::from_config(
                &config.actor_critic,
                env.observation_len(),
                env.action_count(),
                config.train.seed,
            );
            Ok((env, model))
        },
        observer,
    )
}
