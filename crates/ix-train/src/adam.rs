//! Adam with one learning rate per contiguous parameter group.
//!
//! Each group owns a burn [`Adam`](burn::optim::Adam) optimiser over a
//! single flat parameter tensor.  The trainer holds parameters as `f32`
//! slices, so a step lifts each group's slice into a tensor, applies the
//! optimiser and copies the result back.

use std::ops::Range;

use burn::module::{Module, Param, ParamId};
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use crate::backend::{decode_record, encode_record, floats, vector, InferenceBackend, TrainBackend};
use crate::{TrainError, TrainResult};

const BETA1: f32 = 0.9;
const BETA2: f32 = 0.999;
const EPSILON: f32 = 1e-8;

/// Optimiser state saved with every checkpoint so a resumed run continues
/// the same optimisation trajectory.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AdamState {
    /// Steps taken.
    pub step:    u64,
    /// Length of each parameter group, in order.
    pub groups:  Vec<usize>,
    /// Moment estimates per group, as burn binary records.
    pub moments: Vec<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParamGroup {
    pub range: Range<usize>,
    pub lr:    f32,
}

/// One parameter group as a burn module.
#[derive(Module, Debug)]
struct Flat<B: Backend> {
    values: Param<Tensor<B, 1>>,
}

type GroupOptimizer = OptimizerAdaptor<burn::optim::Adam, Flat<TrainBackend>, TrainBackend>;
type GroupRecord = <GroupOptimizer as Optimizer<Flat<TrainBackend>, TrainBackend>>::Record;

struct Group {
    param: ParamGroup,
    id:    ParamId,
    optim: GroupOptimizer,
}

fn new_optimizer() -> GroupOptimizer {
    AdamConfig::new()
        .with_beta_1(BETA1)
        .with_beta_2(BETA2)
        .with_epsilon(EPSILON)
        .init()
}

pub struct Adam {
    len:    usize,
    groups: Vec<Group>,
    step:   u64,
}

impl Adam {
    /// `groups` must tile `0..len` without gaps or overlap.
    pub fn new(len: usize, groups: Vec<ParamGroup>) -> TrainResult<Self> {
        let mut next = 0;
        for g in &groups {
            if g.range.start != next || g.range.end < g.range.start {
                return Err(TrainError::Config(format!("parameter groups do not tile 0..{len}: {groups:?}")));
            }
            next = g.range.end;
        }
        if next != len {
            return Err(TrainError::Config(format!("parameter groups do not tile 0..{len}: {groups:?}")));
        }
        let groups = groups
            .into_iter()
            .enumerate()
            .map(|(i, param)| Group { param, id: ParamId::from(i as u64), optim: new_optimizer() })
            .collect();
        Ok(Self { len, groups, step: 0 })
    }

    /// Policy group `0..policy_len` at `pi_lr`, value group after it at
    /// `vf_lr`.
    pub fn actor_critic(len: usize, policy_len: usize, pi_lr: f32, vf_lr: f32) -> TrainResult<Self> {
        Self::new(len, vec![
            ParamGroup { range: 0..policy_len, lr: pi_lr },
            ParamGroup { range: policy_len..len, lr: vf_lr },
        ])
    }

    pub fn state(&self) -> TrainResult<AdamState> {
        let moments = self
            .groups
            .iter()
            .map(|g| encode_record(g.optim.to_record()))
            .collect::<TrainResult<Vec<_>>>()?;
        Ok(AdamState {
            step: self.step,
            groups: self.groups.iter().map(|g| g.param.range.len()).collect(),
            moments,
        })
    }

    pub fn restore(&mut self, state: AdamState) -> TrainResult<()> {
        let got: usize = state.groups.iter().sum();
        if got != self.len {
            return Err(TrainError::ParameterCount { expected: self.len, got });
        }
        let layout: Vec<usize> = self.groups.iter().map(|g| g.param.range.len()).collect();
        if state.groups != layout || state.moments.len() != layout.len() {
            return Err(TrainError::Config(format!(
                "optimiser state has groups {:?} with {} records, expected groups {layout:?}",
                state.groups,
                state.moments.len()
            )));
        }

        let mut optimizers = Vec::with_capacity(self.groups.len());
        for bytes in state.moments {
            let record: GroupRecord = decode_record(bytes)?;
            optimizers.push(new_optimizer().load_record(record));
        }
        for (group, optim) in self.groups.iter_mut().zip(optimizers) {
            group.optim = optim;
        }
        self.step = state.step;
        Ok(())
    }

    /// One descent step on `params` along `grad`.
    pub fn step(&mut self, params: &mut [f32], grad: &[f32]) -> TrainResult<()> {
        for got in [params.len(), grad.len()] {
            if got != self.len {
                return Err(TrainError::ParameterCount { expected: self.len, got });
            }
        }

        for group in &mut self.groups {
            let r = group.param.range.clone();
            if r.is_empty() {
                continue;
            }
            let module = Flat {
                values: Param::initialized(group.id, vector::<TrainBackend>(params[r.clone()].to_vec()).require_grad()),
            };
            let mut grads = GradientsParams::new();
            grads.register(group.id, vector::<InferenceBackend>(grad[r.clone()].to_vec()));

            let module = group.optim.step(f64::from(group.param.lr), module, grads);
            let updated = floats(module.values.val());
            if updated.len() != r.len() {
                return Err(TrainError::ParameterCount { expected: r.len(), got: updated.len() });
            }
            params[r].copy_from_slice(&updated);
        }
        self.step += 1;
        Ok(())
    }
}
