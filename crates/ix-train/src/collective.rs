//! Collectives over a fixed set of ranks.
//!
//! Every rank must issue the same sequence of collective calls.  Each call
//! advances a round counter; messages carry the round so a rank that falls
//! out of step is detected instead of silently mixing data.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use crate::{TrainError, TrainResult};

/// Synchronisation between the workers of one training run.
pub trait Collective: Send {
    fn rank(&self) -> usize;

    fn world_size(&self) -> usize;

    /// Replace `buf` on every rank with the element-wise sum over all
    /// ranks.  The result is bit-identical on every rank.
    fn all_reduce_sum(&mut self, buf: &mut [f32]) -> TrainResult<()>;

    /// Replace `buf` on every rank with `root`'s copy.
    fn broadcast(&mut self, buf: &mut [f32], root: usize) -> TrainResult<()>;

    /// Return only after every rank has reached the barrier.
    fn barrier(&mut self) -> TrainResult<()> {
        self.all_reduce_sum(&mut [])
    }

    fn all_reduce_mean(&mut self, buf: &mut [f32]) -> TrainResult<()> {
        self.all_reduce_sum(buf)?;
        let n = self.world_size() as f32;
        for x in buf.iter_mut() {
            *x /= n;
        }
        Ok(())
    }
}

// ── ChannelCollective ─────────────────────────────────────────────────────────

struct Message {
    round: u64,
    data:  Vec<f32>,
}

/// One endpoint of a fully connected mesh of in-process channels.
///
/// Each ordered pair of ranks has its own channel, so when a rank drops out
/// its peers see the disconnect instead of waiting forever.
pub struct ChannelCollective {
    rank:    usize,
    world:   usize,
    round:   u64,
    timeout: Option<Duration>,
    /// Indexed by destination rank; `None` at our own rank.
    tx:      Vec<Option<Sender<Message>>>,
    /// Indexed by source rank; `None` at our own rank.
    rx:      Vec<Option<Receiver<Message>>>,
}

impl ChannelCollective {
    /// Endpoints for ranks `0..world`, in rank order.
    pub fn mesh(world: usize, timeout: Option<Duration>) -> Vec<ChannelCollective> {
        let mut tx: Vec<Vec<Option<Sender<Message>>>> = (0..world).map(|_| (0..world).map(|_| None).collect()).collect();
        let mut rx: Vec<Vec<Option<Receiver<Message>>>> = (0..world).map(|_| (0..world).map(|_| None).collect()).collect();
        for from in 0..world {
            for to in 0..world {
                if from != to {
                    let (s, r) = unbounded();
                    tx[from][to] = Some(s);
                    rx[to][from] = Some(r);
                }
            }
        }
        tx.into_iter()
            .zip(rx)
            .enumerate()
            .map(|(rank, (tx, rx))| ChannelCollective { rank, world, round: 0, timeout, tx, rx })
            .collect()
    }

    fn send(&self, to: usize, data: Vec<f32>) -> TrainResult<()> {
        let Some(tx) = &self.tx[to] else {
            return Ok(());
        };
        tx.send(Message { round: self.round, data })
            .map_err(|_| TrainError::PeerDisconnected { rank: self.rank, peer: to })
    }

    fn recv(&self, from: usize, len: usize) -> TrainResult<Vec<f32>> {
        let Some(rx) = &self.rx[from] else {
            return Err(TrainError::CollectiveMismatch {
                rank:   self.rank,
                detail: "receive from self".into(),
            });
        };
        let msg = match self.timeout {
            None => rx
                .recv()
                .map_err(|_| TrainError::PeerDisconnected { rank: self.rank, peer: from })?,
            Some(d) => rx.recv_timeout(d).map_err(|e| match e {
                RecvTimeoutError::Timeout => TrainError::CollectiveTimeout { rank: self.rank, round: self.round },
                RecvTimeoutError::Disconnected => TrainError::PeerDisconnected { rank: self.rank, peer: from },
            })?,
        };
        if msg.round != self.round {
            return Err(TrainError::CollectiveMismatch {
                rank:   self.rank,
                detail: format!("rank {from} sent round {} during round {}", msg.round, self.round),
            });
        }
        if msg.data.len() != len {
            return Err(TrainError::CollectiveMismatch {
                rank:   self.rank,
                detail: format!("rank {from} sent {} values, expected {len}", msg.data.len()),
            });
        }
        Ok(msg.data)
    }
}

impl Collective for ChannelCollective {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world
    }

    fn all_reduce_sum(&mut self, buf: &mut [f32]) -> TrainResult<()> {
        self.round += 1;
        if self.world == 1 {
            return Ok(());
        }
        for peer in (0..self.world).filter(|&p| p != self.rank) {
            self.send(peer, buf.to_vec())?;
        }

        // Sum in rank order on every rank, so every replica rounds the same
        // way.
        let mut total = vec![0.0f32; buf.len()];
        for src in 0..self.world {
            if src == self.rank {
                for (t, x) in total.iter_mut().zip(buf.iter()) {
                    *t += x;
                }
            } else {
                let data = self.recv(src, buf.len())?;
                for (t, x) in total.iter_mut().zip(&data) {
                    *t += x;
                }
            }
        }
        buf.copy_from_slice(&total);
        Ok(())
    }

    fn broadcast(&mut self, buf: &mut [f32], root: usize) -> TrainResult<()> {
        if root >= self.world {
            return Err(TrainError::CollectiveMismatch {
                rank:   self.rank,
                detail: format!("broadcast root {root} outside world of {}", self.world),
            });
        }
        self.round += 1;
        if self.rank == root {
            for peer in (0..self.world).filter(|&p| p != root) {
                self.send(peer, buf.to_vec())?;
            }
        } else {
            let data = self.recv(root, buf.len())?;
            buf.copy_from_slice(&data);
        }
        Ok(())
    }
}
