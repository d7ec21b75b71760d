//! Shared fixtures for unit tests.

use std::{
    sync::{
        Mutex,
        atomic::{
            AtomicBool,
            AtomicUsize,
            Ordering,
        },
    },
    thread,
    time::{
        Duration,
        Instant,
    },
};

use crate::{
    pow::{
        PowError,
        ProofOfWork,
    },
    ternary::{
        int_to_trits,
        trits_to_trytes,
    },
    transaction::{
        TRANSACTION_TRYTES,
        layout,
    },
};

/// Builds a zero filled transaction with the given address, value and bundle
/// prefixes.
pub fn transaction_trytes(address: &str, value: i64, bundle: &str) -> String {
    let mut trytes = "9".repeat(TRANSACTION_TRYTES);
    trytes.replace_range(layout::ADDRESS, &format!("{address:9<81}"));
    trytes.replace_range(layout::VALUE, &trits_to_trytes(&int_to_trits(value, 81)));
    trytes.replace_range(layout::BUNDLE, &format!("{bundle:9<81}"));
    trytes
}

/// Marker written into the nonce field by [`MockProofOfWork`].
pub const MOCK_NONCE: &str = "MOCKNONCE999999999999999999";

/// Proof of work stand-in that records when it ran and how many calls
/// overlapped.
#[derive(Default)]
pub struct MockProofOfWork {
    delay: Duration,
    fail: AtomicBool,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    windows: Mutex<Vec<(Instant, Instant)>>,
}

impl MockProofOfWork {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn windows(&self) -> Vec<(Instant, Instant)> {
        let mut windows = self.windows.lock().unwrap().clone();
        windows.sort();
        windows
    }
}

impl ProofOfWork for MockProofOfWork {
    fn name(&self) -> &str {
        "mock"
    }

    fn attach(
        &self,
        _trunk: &str,
        _branch: &str,
        trytes: &[String],
        _mwm: u8,
    ) -> Result<Vec<String>, PowError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        let start = Instant::now();
        thread::sleep(self.delay);
        self.windows.lock().unwrap().push((start, Instant::now()));
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.fail.load(Ordering::SeqCst) {
            return Err(PowError::NonceNotFound);
        }
        Ok(trytes
            .iter()
            .map(|tx| {
                let mut tx = tx.clone();
                if tx.len() == TRANSACTION_TRYTES {
                    tx.replace_range(layout::NONCE, MOCK_NONCE);
                }
                tx
            })
            .collect())
    }
}

/// Asserts that no two recorded windows overlap.
pub fn assert_serialized(windows: &[(Instant, Instant)]) {
    for pair in windows.windows(2) {
        assert!(
            pair[0].1 <= pair[1].0,
            "compute windows overlap: {:?} and {:?}",
            pair[0],
            pair[1]
        );
    }
}
