//! `MlpActorCritic` — tanh multilayer perceptrons on burn.
//!
//! Two independent networks share the observation as input: the policy maps
//! it to one logit per action, the value function to a scalar.  Every
//! observation is processed on its own, so the same weights serve any
//! number of agents.
//!
//! Weights are kept as one flat vector and lifted into burn [`Linear`]
//! layers per call: [`InferenceBackend`] for acting, [`TrainBackend`] when
//! the loss needs gradients.

use burn::backend::ndarray::NdArrayDevice;
use burn::module::Param;
use burn::nn::Linear;
use burn::tensor::activation::{log_softmax, tanh};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::Tensor;

use ix_core::{ActorCriticConfig, SimRng};
use ix_perception::Observation;
use ix_rollout::{ActionSample, Policy};

use crate::backend::{floats, index_column, matrix, scalar, vector, InferenceBackend, TrainBackend};
use crate::{ActorCritic, LossCoefficients, LossReport, TrainBatch, TrainError, TrainResult};

/// Scale of the initial policy output layer; keeps the first policy close
/// to uniform.
const POLICY_HEAD_SCALE: f32 = 0.01;

type Gradients = <TrainBackend as AutodiffBackend>::Gradients;

// ── Network ───────────────────────────────────────────────────────────────────

/// Dense layers with tanh between them and a linear output.
struct Network<B: Backend> {
    layers: Vec<Linear<B>>,
}

impl<B: Backend> Network<B> {
    fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let last = self.layers.len().saturating_sub(1);
        self.layers.iter().enumerate().fold(input, |x, (l, layer)| {
            let y = layer.forward(x);
            if l == last { y } else { tanh(y) }
        })
    }
}

/// Shape of a fully connected network.  Parameters live outside, laid out
/// per layer as the row-major `[input, output]` weight matrix followed by
/// the bias.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Shape {
    sizes: Vec<usize>,
}

impl Shape {
    fn new(input: usize, hidden: &[usize], output: usize) -> Self {
        let mut sizes = Vec::with_capacity(hidden.len() + 2);
        sizes.push(input);
        sizes.extend_from_slice(hidden);
        sizes.push(output);
        Self { sizes }
    }

    fn layers(&self) -> impl ExactSizeIterator<Item = (usize, usize)> + '_ {
        self.sizes.windows(2).map(|w| (w[0], w[1]))
    }

    fn param_count(&self) -> usize {
        self.layers().map(|(i, o)| i * o + o).sum()
    }

    fn input_len(&self) -> usize {
        self.sizes[0]
    }

    fn output_len(&self) -> usize {
        self.sizes[self.sizes.len() - 1]
    }

    /// Uniform in ±1/√fan_in, zero biases, last layer scaled by
    /// `head_scale`.
    fn init(&self, rng: &mut SimRng, head_scale: f32) -> Vec<f32> {
        let last = self.layers().len() - 1;
        let mut params = Vec::with_capacity(self.param_count());
        for (l, (input, output)) in self.layers().enumerate() {
            let bound = 1.0 / (input as f32).sqrt();
            let scale = if l == last { head_scale } else { 1.0 };
            for _ in 0..input * output {
                params.push(rng.gen_range(-bound..bound) * scale);
            }
            params.extend(std::iter::repeat_n(0.0, output));
        }
        params
    }

    /// Burn layers holding a copy of `params`.
    fn build<B: Backend<Device = NdArrayDevice>>(&self, params: &[f32]) -> Network<B> {
        let mut offset = 0;
        let layers = self
            .layers()
            .map(|(input, output)| {
                let weights = params[offset..offset + input * output].to_vec();
                offset += input * output;
                let bias = params[offset..offset + output].to_vec();
                offset += output;
                Linear {
                    weight: Param::from_tensor(matrix(weights, input, output)),
                    bias:   Some(Param::from_tensor(vector(bias))),
                }
            })
            .collect();
        Network { layers }
    }

    /// Gradient of every parameter in storage order; zero where the graph
    /// did not reach.
    fn gradients(&self, network: &Network<TrainBackend>, grads: &Gradients) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.param_count());
        for (layer, (input, output)) in network.layers.iter().zip(self.layers()) {
            match layer.weight.val().grad(grads) {
                Some(g) => out.extend(floats(g)),
                None => out.extend(std::iter::repeat_n(0.0, input * output)),
            }
            match layer.bias.as_ref().and_then(|b| b.val().grad(grads)) {
                Some(g) => out.extend(floats(g)),
                None => out.extend(std::iter::repeat_n(0.0, output)),
            }
        }
        out
    }
}

// ── MlpActorCritic ────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct MlpActorCritic {
    pi:     Shape,
    v:      Shape,
    params: Vec<f32>,
}

impl MlpActorCritic {
    pub fn new(obs_len: usize, actions: usize, hidden: &[usize], seed: u64) -> Self {
        let pi = Shape::new(obs_len, hidden, actions);
        let v = Shape::new(obs_len, hidden, 1);
        let mut rng = SimRng::new(seed);
        let mut params = pi.init(&mut rng, POLICY_HEAD_SCALE);
        params.extend(v.init(&mut rng, 1.0));
        Self { pi, v, params }
    }

    pub fn from_config(config: &ActorCriticConfig, obs_len: usize, actions: usize, seed: u64) -> Self {
        Self::new(obs_len, actions, &config.hidden_sizes, seed)
    }

    fn policy_params(&self) -> &[f32] {
        &self.params[..self.pi.param_count()]
    }

    fn value_params(&self) -> &[f32] {
        &self.params[self.pi.param_count()..]
    }

    /// Observations stacked into an `[n, obs_len]` matrix, or `None` if any
    /// has the wrong length.
    fn inputs<B: Backend<Device = NdArrayDevice>>(&self, observations: &[Observation]) -> Option<Tensor<B, 2>> {
        let width = self.pi.input_len();
        if observations.iter().any(|o| o.len() != width) {
            return None;
        }
        let values: Vec<f32> = observations.iter().flat_map(|o| o.as_slice().iter().copied()).collect();
        Some(matrix(values, observations.len(), width))
    }

    /// `[n, actions]` log-probabilities, without gradients.
    fn log_probs(&self, x: Tensor<InferenceBackend, 2>) -> Tensor<InferenceBackend, 2> {
        log_softmax(self.pi.build::<InferenceBackend>(self.policy_params()).forward(x), 1)
    }

    fn values_of(&self, x: Tensor<InferenceBackend, 2>) -> Vec<f32> {
        floats(self.v.build::<InferenceBackend>(self.value_params()).forward(x))
    }

    /// Batch observations as an `[n, obs_len]` matrix, or `None` when the
    /// batch is empty, ragged, or of the wrong width for the model.
    fn batch_inputs<B: Backend<Device = NdArrayDevice>>(&self, batch: &TrainBatch) -> Option<Tensor<B, 2>> {
        let n = batch.len();
        let ok = n > 0
            && batch.obs_len == self.pi.input_len()
            && batch.observations.len() == n * batch.obs_len
            && [batch.old_log_probs.len(), batch.advantages.len(), batch.returns.len()] == [n; 3]
            && batch.actions.iter().all(|&a| a < self.pi.output_len());
        ok.then(|| matrix(batch.observations.clone(), n, batch.obs_len))
    }
}

impl Policy for MlpActorCritic {
    fn action_count(&self) -> usize {
        self.pi.output_len()
    }

    /// Empty when `observations` is empty or holds a vector of the wrong
    /// length; the rollout worker reports the count mismatch.
    fn act(&self, observations: &[Observation], rng: &mut SimRng) -> Vec<ActionSample> {
        if observations.is_empty() {
            return Vec::new();
        }
        let Some(x) = self.inputs::<InferenceBackend>(observations) else {
            return Vec::new();
        };
        let logp = floats(self.log_probs(x.clone()));
        let values = self.values_of(x);

        logp.chunks_exact(self.action_count())
            .zip(values)
            .map(|(row, value)| {
                let u: f32 = rng.random();
                let mut action = row.len() - 1;
                let mut cumulative = 0.0;
                for (i, lp) in row.iter().enumerate() {
                    cumulative += lp.exp();
                    if u < cumulative {
                        action = i;
                        break;
                    }
                }
                ActionSample { action, log_prob: row[action], value }
            })
            .collect()
    }

    fn value(&self, observations: &[Observation]) -> Vec<f32> {
        if observations.is_empty() {
            return Vec::new();
        }
        match self.inputs::<InferenceBackend>(observations) {
            Some(x) => self.values_of(x),
            None => Vec::new(),
        }
    }
}

impl ActorCritic for MlpActorCritic {
    fn obs_len(&self) -> usize {
        self.pi.input_len()
    }

    fn parameters(&self) -> &[f32] {
        &self.params
    }

    fn set_parameters(&mut self, parameters: &[f32]) -> TrainResult<()> {
        if parameters.len() != self.params.len() {
            return Err(TrainError::ParameterCount { expected: self.params.len(), got: parameters.len() });
        }
        self.params.copy_from_slice(parameters);
        Ok(())
    }

    fn policy_param_count(&self) -> usize {
        self.pi.param_count()
    }

    /// A batch that is empty, ragged, or whose width differs from
    /// [`obs_len`](ActorCritic::obs_len) yields an all-zero report.
    fn loss_and_gradient(&self, batch: &TrainBatch, coef: &LossCoefficients) -> LossReport {
        let Some(x) = self.batch_inputs::<TrainBackend>(batch) else {
            return LossReport { gradient: vec![0.0; self.params.len()], ..LossReport::default() };
        };
        let n = batch.len();
        let (lo, hi) = (1.0 - coef.clip_ratio, 1.0 + coef.clip_ratio);

        let pi = self.pi.build::<TrainBackend>(self.policy_params());
        let v = self.v.build::<TrainBackend>(self.value_params());

        // Policy: clipped surrogate plus entropy bonus.
        let logp_all = log_softmax(pi.forward(x.clone()), 1);
        let logp = logp_all.clone().gather(1, index_column(&batch.actions)).reshape([n]);
        let advantages = vector::<TrainBackend>(batch.advantages.clone());
        let ratio = (logp.clone() - vector::<TrainBackend>(batch.old_log_probs.clone())).exp();
        let surr1 = ratio.clone() * advantages.clone();
        let surr2 = ratio.clamp(lo, hi) * advantages;
        let policy_loss = surr1.min_pair(surr2).mean().neg();
        let entropy = (logp_all.clone().exp() * logp_all).sum_dim(1).mean().neg();

        // Value: squared error to the target.
        let predicted = v.forward(x).reshape([n]);
        let value_loss = (predicted - vector::<TrainBackend>(batch.returns.clone())).powf_scalar(2.0).mean();

        let total = policy_loss.clone() - entropy.clone().mul_scalar(coef.entropy_coef) + value_loss.clone();
        let grads = total.backward();
        let mut gradient = self.pi.gradients(&pi, &grads);
        gradient.extend(self.v.gradients(&v, &grads));

        let logp = floats(logp);
        let mut kl = 0.0f32;
        let mut clipped = 0usize;
        for (new, old) in logp.iter().zip(&batch.old_log_probs) {
            kl += old - new;
            if !(lo..=hi).contains(&(new - old).exp()) {
                clipped += 1;
            }
        }

        LossReport {
            gradient,
            policy_loss:   scalar(policy_loss),
            value_loss:    scalar(value_loss),
            entropy:       scalar(entropy),
            approx_kl:     kl / n as f32,
            clip_fraction: clipped as f32 / n as f32,
        }
    }

    fn approx_kl(&self, batch: &TrainBatch) -> f32 {
        let Some(x) = self.batch_inputs::<InferenceBackend>(batch) else {
            return 0.0;
        };
        let n = batch.len();
        let logp = floats(self.log_probs(x).gather(1, index_column(&batch.actions)).reshape([n]));
        let kl: f32 = logp.iter().zip(&batch.old_log_probs).map(|(new, old)| old - new).sum();
        kl / n as f32
    }
}
