//! Curl-P-81 sponge over balanced trits.

use crate::ternary::Trit;

pub const HASH_LENGTH: usize = 243;
pub const STATE_LENGTH: usize = 3 * HASH_LENGTH;

const ROUNDS: usize = 81;
const TRUTH_TABLE: [Trit; 11] = [1, 0, -1, 2, 1, -1, 0, 2, -1, 1, 0];

#[derive(Clone)]
pub struct Curl {
    state: [Trit; STATE_LENGTH],
}

impl Default for Curl {
    fn default() -> Self {
        Self::new()
    }
}

impl Curl {
    pub fn new() -> Self {
        Self {
            state: [0; STATE_LENGTH],
        }
    }

    /// Absorbs `trits` in blocks of [`HASH_LENGTH`], transforming after each.
    pub fn absorb(&mut self, trits: &[Trit]) {
        for block in trits.chunks(HASH_LENGTH) {
            self.state[..block.len()].copy_from_slice(block);
            self.transform();
        }
    }

    pub fn squeeze(&mut self) -> [Trit; HASH_LENGTH] {
        let mut hash = [0; HASH_LENGTH];
        hash.copy_from_slice(self.rate());
        self.transform();
        hash
    }

    /// The rate part of the state, i.e. what the next squeeze would return.
    pub fn rate(&self) -> &[Trit] {
        &self.state[..HASH_LENGTH]
    }

    fn transform(&mut self) {
        let mut scratch = [0; STATE_LENGTH];
        for _ in 0..ROUNDS {
            scratch.copy_from_slice(&self.state);
            let mut index = 0;
            for trit in &mut self.state {
                let low = scratch[index];
                index = if index < 365 { index + 364 } else { index - 365 };
                let high = scratch[index];
                *trit = TRUTH_TABLE[(low + (high << 2) + 5) as usize];
            }
        }
    }
}

/// Hashes a full serialized transaction.
pub fn transaction_hash(trits: &[Trit]) -> [Trit; HASH_LENGTH] {
    let mut curl = Curl::new();
    curl.absorb(trits);
    curl.squeeze()
}

/// Returns true if the last `mwm` trits of `hash` are zero.
pub fn meets_mwm(hash: &[Trit], mwm: usize) -> bool {
    hash[hash.len() - mwm..].iter().all(|trit| *trit == 0)
}
