//! Single flight execution of the proof of work.
//!
//! One process wide [`ComputeLock`] serializes every call into the
//! [`ProofOfWork`](crate::pow::ProofOfWork) primitive. Waiters are admitted in
//! arrival order. The lock guard travels into the blocking task, so it is held
//! until the primitive returns even if the caller goes away, and released on
//! every exit path.

use std::{
    sync::{
        Arc,
        atomic::{
            AtomicUsize,
            Ordering,
        },
    },
    time::Instant,
};

use metrics::{
    gauge,
    histogram,
};
use tokio::sync::Mutex;
use tracing::{
    debug,
    info,
    warn,
};

use crate::{
    command::AttachToTangleRequest,
    error::{
        InterceptError,
        Result,
    },
    pow::{
        PowError,
        SharedProofOfWork,
    },
};

/// Fair mutex guarding the proof of work. Owns no data.
pub type ComputeLock = Arc<Mutex<()>>;

#[derive(Clone)]
pub struct ComputeExecutor {
    pow: SharedProofOfWork,
    lock: ComputeLock,
    pending: Arc<AtomicUsize>,
    max_pending: Option<usize>,
}

/// Counts a request as pending until dropped.
struct PendingSlot {
    pending: Arc<AtomicUsize>,
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        let pending = self.pending.fetch_sub(1, Ordering::AcqRel) - 1;
        gauge!("pow_interceptor_pending").set(pending as f64);
    }
}

impl ComputeExecutor {
    pub fn new(pow: SharedProofOfWork) -> Self {
        Self {
            pow,
            lock: Arc::new(Mutex::new(())),
            pending: Arc::new(AtomicUsize::new(0)),
            max_pending: None,
        }
    }

    /// Bounds how many requests may wait for or hold the lock. `None` queues
    /// without limit.
    pub fn with_max_pending(mut self, max_pending: Option<usize>) -> Self {
        self.max_pending = max_pending;
        self
    }

    pub fn pow_name(&self) -> &str {
        self.pow.name()
    }

    /// Requests currently queued or computing.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    fn admit(&self) -> Result<PendingSlot> {
        let max_pending = self.max_pending;
        let admitted = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pending| {
                match max_pending {
                    Some(max) if pending >= max => None,
                    _ => Some(pending + 1),
                }
            });

        match admitted {
            Ok(previous) => {
                gauge!("pow_interceptor_pending").set((previous + 1) as f64);
                Ok(PendingSlot {
                    pending: self.pending.clone(),
                })
            }
            Err(pending) => {
                warn!(pending, "proof of work queue is full, rejecting request");
                Err(InterceptError::Busy)
            }
        }
    }

    /// Runs the proof of work for `request` once the lock is acquired.
    /// Blocks the calling task, without timeout, until the primitive returns.
    pub async fn execute(&self, request: &AttachToTangleRequest, mwm: u8) -> Result<Vec<String>> {
        let slot = self.admit()?;

        debug!("waiting for proof of work lock");
        let guard = self.lock.clone().lock_owned().await;

        let pow = self.pow.clone();
        let trunk = request.trunk_transaction.clone();
        let branch = request.branch_transaction.clone();
        let trytes = request.trytes.clone();
        let txs = trytes.len();

        info!("doing PoW for bundle with {txs} txs...");
        let started = Instant::now();
        let result = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let _slot = slot;
            pow.attach(&trunk, &branch, &trytes, mwm)
        })
        .await;
        let elapsed = started.elapsed();

        let attached = match result {
            Ok(Ok(attached)) => attached,
            Ok(Err(err)) => {
                warn!(%err, "proof of work failed");
                return Err(InterceptError::ProofOfWork(err));
            }
            Err(err) => {
                warn!(%err, "proof of work task did not complete");
                return Err(InterceptError::ProofOfWork(PowError::Task(err.to_string())));
            }
        };

        if attached.len() != txs {
            return Err(InterceptError::ProofOfWork(PowError::ShapeMismatch {
                expected: txs,
                actual: attached.len(),
            }));
        }

        histogram!("pow_interceptor_pow_duration_seconds").record(elapsed.as_secs_f64());
        info!(
            elapsed_ms = elapsed.as_millis() as u64,
            "took {}ms to do PoW for bundle with {txs} txs",
            elapsed.as_millis()
        );
        Ok(attached)
    }
}
