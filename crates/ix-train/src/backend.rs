//! Tensor backend shared by the model and the optimiser.
//!
//! Everything runs on the CPU `NdArray` backend.  Parameters cross the
//! [`ActorCritic`](crate::ActorCritic) boundary as flat `f32` slices and are
//! lifted into tensors only for the duration of one call.

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Record, Recorder};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};

use crate::{TrainError, TrainResult};

/// Backend for forward passes without gradients.
pub type InferenceBackend = NdArray<f32>;

/// Backend for loss and optimiser steps.
pub type TrainBackend = Autodiff<InferenceBackend>;

pub(crate) const DEVICE: NdArrayDevice = NdArrayDevice::Cpu;

pub(crate) fn matrix<B: Backend<Device = NdArrayDevice>>(values: Vec<f32>, rows: usize, cols: usize) -> Tensor<B, 2> {
    Tensor::from_data(TensorData::new(values, [rows, cols]), &DEVICE)
}

pub(crate) fn vector<B: Backend<Device = NdArrayDevice>>(values: Vec<f32>) -> Tensor<B, 1> {
    let len = values.len();
    Tensor::from_data(TensorData::new(values, [len]), &DEVICE)
}

/// `indices` as an `[n, 1]` column, ready for `gather` along dim 1.
pub(crate) fn index_column<B: Backend<Device = NdArrayDevice>>(indices: &[usize]) -> Tensor<B, 2, Int> {
    let values: Vec<i64> = indices.iter().map(|&i| i as i64).collect();
    Tensor::from_data(TensorData::new(values, [indices.len(), 1]), &DEVICE)
}

/// Row-major contents of a float tensor.
pub(crate) fn floats<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
    tensor.into_data().convert::<f32>().to_vec::<f32>().unwrap_or_default()
}

/// The single value of a one-element tensor; NaN if it has none.
pub(crate) fn scalar<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> f32 {
    floats(tensor).first().copied().unwrap_or(f32::NAN)
}

// ── Records ───────────────────────────────────────────────────────────────────

pub(crate) fn encode_record<R: Record<TrainBackend>>(record: R) -> TrainResult<Vec<u8>> {
    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    Recorder::<TrainBackend>::record(&recorder, record, ())
        .map_err(|e| TrainError::Backend(format!("encoding optimiser record: {e:?}")))
}

pub(crate) fn decode_record<R: Record<TrainBackend>>(bytes: Vec<u8>) -> TrainResult<R> {
    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    Recorder::<TrainBackend>::load(&recorder, bytes, &DEVICE)
        .map_err(|e| TrainError::Backend(format!("decoding optimiser record: {e:?}")))
}
