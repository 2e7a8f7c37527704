//! Condition planning: cross product of instance counts and trial repeats,
//! with an optional seeded shuffle for order-effect control.

use serde::{Deserialize, Serialize};

use crate::error::HarnessError;

/// Substituted for seed 0 so the shuffle generator never starts dead.
pub const GOLDEN_SEED: u32 = 0x9E37_79B9;

/// One planned measurement: an instance count plus a 1-based trial ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub instance_count: u32,
    pub trial: u32,
}

/// The full ordered run plan for a suite.
#[derive(Debug, Clone)]
pub struct Plan {
    conditions: Vec<Condition>,
    effective_seed: u32,
    shuffled: bool,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Condition> {
        self.conditions.get(index).copied()
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// The seed that actually drove the shuffle (post zero-guard). Recorded
    /// on every emitted record so a run order can be replayed.
    pub fn effective_seed(&self) -> u32 {
        self.effective_seed
    }

    pub fn shuffled(&self) -> bool {
        self.shuffled
    }
}

/// Monotonic position within a [`Plan`]. Only ever moves forward.
#[derive(Debug, Clone, Copy)]
pub struct PlanCursor {
    index: usize,
    len: usize,
}

impl PlanCursor {
    pub fn new(plan: &Plan) -> Self {
        Self {
            index: 0,
            len: plan.len(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.len
    }

    pub fn remaining(&self) -> usize {
        self.len - self.index.min(self.len)
    }

    pub fn advance(&mut self) {
        if self.index < self.len {
            self.index += 1;
        }
    }
}

/// 32-bit xorshift-multiply mix driving the shuffle (and reusable for any
/// cheap deterministic jitter). State must be non-zero.
#[derive(Debug, Clone)]
struct ShuffleRng {
    state: u32,
}

impl ShuffleRng {
    fn new(seed: u32) -> Self {
        let state = if seed == 0 { GOLDEN_SEED } else { seed };
        Self { state }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = mix32(self.state);
        self.state
    }

    fn next_below(&mut self, bound: u32) -> u32 {
        self.next_u32() % bound
    }
}

/// One step of the xorshift-multiply sequence.
pub fn mix32(x: u32) -> u32 {
    let mut s = x;
    s ^= s << 13;
    s ^= s >> 17;
    s ^= s << 5;
    s.wrapping_mul(0x2545_F491)
}

/// Build the run plan: instance-count-major, trial-minor, optionally
/// shuffled by a Fisher-Yates pass seeded from `seed`.
pub fn build_plan(
    instance_counts: &[u32],
    trials: u32,
    shuffle: bool,
    seed: u32,
) -> Result<Plan, HarnessError> {
    if instance_counts.is_empty() {
        return Err(HarnessError::invalid_configuration(
            "instance_counts must not be empty",
        ));
    }
    if trials == 0 {
        return Err(HarnessError::invalid_configuration(
            "trials must be at least 1",
        ));
    }
    if instance_counts.iter().any(|&c| c == 0) {
        return Err(HarnessError::invalid_configuration(
            "instance counts must be positive",
        ));
    }

    let mut conditions = Vec::with_capacity(instance_counts.len() * trials as usize);
    for &instance_count in instance_counts {
        for trial in 1..=trials {
            conditions.push(Condition {
                instance_count,
                trial,
            });
        }
    }

    let effective_seed = if seed == 0 { GOLDEN_SEED } else { seed };
    if shuffle && conditions.len() > 1 {
        let mut rng = ShuffleRng::new(effective_seed);
        for i in (1..conditions.len()).rev() {
            let j = rng.next_below(i as u32 + 1) as usize;
            conditions.swap(i, j);
        }
    }

    Ok(Plan {
        conditions,
        effective_seed,
        shuffled: shuffle,
    })
}
