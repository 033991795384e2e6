//! `SpawnQueue` — agents waiting to enter the map, keyed by due tick.

use std::collections::BTreeMap;

use ix_core::{AgentId, Tick};

use crate::SpawnSchedule;

/// Tick → agents due at that tick.
///
/// Agents whose admission is deferred are pushed back with a later tick, so
/// one agent is queued at most once at any time.
#[derive(Clone, Debug, Default)]
pub struct SpawnQueue {
    inner: BTreeMap<Tick, Vec<AgentId>>,
    total: usize,
}

impl SpawnQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue every agent of `schedule` at its due tick.
    pub fn from_schedule(schedule: &SpawnSchedule) -> Self {
        let mut queue = Self::new();
        for plan in schedule.plans() {
            queue.push(plan.due, plan.agent);
        }
        queue
    }

    pub fn push(&mut self, tick: Tick, agent: AgentId) {
        self.inner.entry(tick).or_default().push(agent);
        self.total += 1;
    }

    /// Remove and return every agent due at or before `now`, earliest tick
    /// first and ascending id within a tick.
    pub fn drain_due(&mut self, now: Tick) -> Vec<AgentId> {
        let later = self.inner.split_off(&now.offset(1));
        let due = std::mem::replace(&mut self.inner, later);
        let mut out = Vec::new();
        for (_, mut agents) in due {
            agents.sort_unstable();
            out.extend(agents);
        }
        self.total -= out.len();
        out
    }

    /// Earliest queued tick, or `None` if the queue is empty.
    pub fn next_tick(&self) -> Option<Tick> {
        self.inner.keys().next().copied()
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
