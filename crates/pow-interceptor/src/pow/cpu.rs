use std::sync::atomic::{
    AtomicBool,
    Ordering,
};

use rayon::{
    ThreadPool,
    ThreadPoolBuilder,
    prelude::*,
};
use tracing::debug;

use super::{
    PowError,
    ProofOfWork,
    curl::{
        Curl,
        HASH_LENGTH,
        meets_mwm,
        transaction_hash,
    },
};
use crate::{
    ternary::{
        Trit,
        int_to_trits,
        trits_to_trytes,
        trytes_to_trits,
    },
    transaction::{
        TRANSACTION_TRITS,
        is_hash,
        layout,
        trit_range,
        validate_transaction_trytes,
    },
};

/// Largest attachment timestamp representable in 27 trits, `(3^27 - 1) / 2`.
pub const UPPER_BOUND_ATTACHMENT_TIMESTAMP: i64 = 3_812_798_742_493;
pub const LOWER_BOUND_ATTACHMENT_TIMESTAMP: i64 = 0;

const NONCE_TRITS: usize = 81;
/// Offset of the nonce inside the final absorbed block.
const NONCE_OFFSET: usize = HASH_LENGTH - NONCE_TRITS;
/// Leading nonce trits reserved for the worker index, so workers search
/// disjoint parts of the nonce space.
const WORKER_TRITS: usize = 9;

/// Curl-P-81 proof of work on a dedicated rayon pool.
pub struct CurlProofOfWork {
    pool: ThreadPool,
}

impl CurlProofOfWork {
    /// Creates the nonce search pool. `threads` defaults to the available
    /// parallelism of the host.
    pub fn new(threads: Option<usize>) -> Result<Self, PowError> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("pow-worker-{i}"));
        if let Some(threads) = threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|err| PowError::ThreadPool(err.to_string()))?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    fn search_nonce(&self, trits: &mut [Trit], mwm: usize) -> Result<(), PowError> {
        let last_block = TRANSACTION_TRITS - HASH_LENGTH;
        let mut prefix = Curl::new();
        prefix.absorb(&trits[..last_block]);

        let mut block = [0; HASH_LENGTH];
        block.copy_from_slice(&trits[last_block..]);

        let found = AtomicBool::new(false);
        let workers = self.threads();
        let nonce = self.pool.install(|| {
            (0..workers)
                .into_par_iter()
                .find_map_any(|worker| search_worker(&prefix, &block, mwm, worker, &found))
        });

        let nonce = nonce.ok_or(PowError::NonceNotFound)?;
        trits[last_block + NONCE_OFFSET..].copy_from_slice(&nonce);
        Ok(())
    }
}

fn search_worker(
    prefix: &Curl,
    block: &[Trit; HASH_LENGTH],
    mwm: usize,
    worker: usize,
    found: &AtomicBool,
) -> Option<[Trit; NONCE_TRITS]> {
    let mut candidate = *block;
    let seed = int_to_trits(worker as i64, WORKER_TRITS);
    candidate[NONCE_OFFSET..NONCE_OFFSET + WORKER_TRITS].copy_from_slice(&seed);

    while !found.load(Ordering::Relaxed) {
        let mut curl = prefix.clone();
        curl.absorb(&candidate);
        if meets_mwm(curl.rate(), mwm) {
            found.store(true, Ordering::Relaxed);
            let mut nonce = [0; NONCE_TRITS];
            nonce.copy_from_slice(&candidate[NONCE_OFFSET..]);
            return Some(nonce);
        }
        increment(&mut candidate[NONCE_OFFSET + WORKER_TRITS..]);
    }
    None
}

/// Balanced ternary increment with carry.
fn increment(trits: &mut [Trit]) {
    for trit in trits {
        *trit += 1;
        if *trit > 1 {
            *trit = -1;
        } else {
            return;
        }
    }
}

fn set_field(trits: &mut [Trit], field: std::ops::Range<usize>, value: &[Trit]) {
    trits[trit_range(field)].copy_from_slice(value);
}

fn set_int_field(trits: &mut [Trit], field: std::ops::Range<usize>, value: i64) {
    let range = trit_range(field);
    let len = range.len();
    trits[range].copy_from_slice(&int_to_trits(value, len));
}

impl ProofOfWork for CurlProofOfWork {
    fn name(&self) -> &str {
        "curl-p81-cpu"
    }

    fn attach(
        &self,
        trunk: &str,
        branch: &str,
        trytes: &[String],
        mwm: u8,
    ) -> Result<Vec<String>, PowError> {
        if !is_hash(trunk) {
            return Err(PowError::InvalidHash { field: "trunk" });
        }
        if !is_hash(branch) {
            return Err(PowError::InvalidHash { field: "branch" });
        }
        if usize::from(mwm) > HASH_LENGTH {
            return Err(PowError::MwmTooHigh(mwm));
        }

        let trunk_trits = trytes_to_trits(trunk).map_err(|_| PowError::InvalidHash { field: "trunk" })?;
        let branch_trits =
            trytes_to_trits(branch).map_err(|_| PowError::InvalidHash { field: "branch" })?;

        let mut attached = vec![String::new(); trytes.len()];
        let mut previous: Option<[Trit; HASH_LENGTH]> = None;

        for (index, tx) in trytes.iter().enumerate().rev() {
            validate_transaction_trytes(tx)
                .map_err(|source| PowError::InvalidTransaction { index, source })?;
            let mut trits = trytes_to_trits(tx).map_err(|source| PowError::InvalidTransaction {
                index,
                source: source.into(),
            })?;

            // The tail transaction references the requested tips, every other
            // transaction references its successor in the bundle.
            match &previous {
                None => {
                    set_field(&mut trits, layout::TRUNK, &trunk_trits);
                    set_field(&mut trits, layout::BRANCH, &branch_trits);
                }
                Some(hash) => {
                    set_field(&mut trits, layout::TRUNK, hash);
                    set_field(&mut trits, layout::BRANCH, &trunk_trits);
                }
            }

            let tag = trit_range(layout::TAG);
            if trits[tag.clone()].iter().all(|trit| *trit == 0) {
                let obsolete_tag = trits[trit_range(layout::OBSOLETE_TAG)].to_vec();
                trits[tag].copy_from_slice(&obsolete_tag);
            }

            set_int_field(
                &mut trits,
                layout::ATTACHMENT_TIMESTAMP,
                chrono::Utc::now().timestamp_millis(),
            );
            set_int_field(
                &mut trits,
                layout::ATTACHMENT_TIMESTAMP_LOWER_BOUND,
                LOWER_BOUND_ATTACHMENT_TIMESTAMP,
            );
            set_int_field(
                &mut trits,
                layout::ATTACHMENT_TIMESTAMP_UPPER_BOUND,
                UPPER_BOUND_ATTACHMENT_TIMESTAMP,
            );

            self.search_nonce(&mut trits, usize::from(mwm))?;

            let hash = transaction_hash(&trits);
            debug!(index, hash = %trits_to_trytes(&hash), "found nonce for transaction");
            previous = Some(hash);
            attached[index] = trits_to_trytes(&trits);
        }

        Ok(attached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_utils::transaction_trytes,
        transaction::HASH_TRYTES,
    };

    fn hash_of(trytes: &str) -> String {
        trits_to_trytes(&transaction_hash(&trytes_to_trits(trytes).unwrap()))
    }

    #[test]
    fn test_increment_carries() {
        let mut trits = [1, 1, 0];
        increment(&mut trits);
        assert_eq!(trits, [-1, -1, 1]);
    }

    #[test]
    fn test_attach_chains_bundle() {
        let pow = CurlProofOfWork::new(Some(2)).unwrap();
        let trunk = "T".repeat(HASH_TRYTES);
        let branch = "B".repeat(HASH_TRYTES);
        let bundle = vec![
            transaction_trytes("FIRST", 0, "BUNDLE"),
            transaction_trytes("SECOND", 0, "BUNDLE"),
        ];

        let attached = pow.attach(&trunk, &branch, &bundle, 3).unwrap();
        assert_eq!(attached.len(), 2);

        // Order and payload are preserved.
        assert_eq!(&attached[0][layout::ADDRESS], &bundle[0][layout::ADDRESS]);
        assert_eq!(&attached[1][layout::ADDRESS], &bundle[1][layout::ADDRESS]);

        assert_eq!(&attached[1][layout::TRUNK], trunk);
        assert_eq!(&attached[1][layout::BRANCH], branch);
        assert_eq!(&attached[0][layout::TRUNK], hash_of(&attached[1]));
        assert_eq!(&attached[0][layout::BRANCH], trunk);

        for tx in &attached {
            let hash = transaction_hash(&trytes_to_trits(tx).unwrap());
            assert!(meets_mwm(&hash, 3));
            assert_ne!(&tx[layout::ATTACHMENT_TIMESTAMP], "999999999");
        }
    }

    #[test]
    fn test_attach_copies_obsolete_tag() {
        let pow = CurlProofOfWork::new(Some(1)).unwrap();
        let mut tx = transaction_trytes("ADDRESS", 0, "BUNDLE");
        tx.replace_range(layout::OBSOLETE_TAG, &format!("{:9<27}", "OLDTAG"));

        let attached = pow
            .attach(&"A".repeat(HASH_TRYTES), &"B".repeat(HASH_TRYTES), &[tx], 0)
            .unwrap();
        assert!(attached[0][layout::TAG].starts_with("OLDTAG"));
    }

    #[test]
    fn test_attach_rejects_invalid_input() {
        let pow = CurlProofOfWork::new(Some(1)).unwrap();
        let hash = "A".repeat(HASH_TRYTES);
        let tx = transaction_trytes("ADDRESS", 0, "BUNDLE");

        assert!(matches!(
            pow.attach("SHORT", &hash, std::slice::from_ref(&tx), 1),
            Err(PowError::InvalidHash { field: "trunk" })
        ));
        assert!(matches!(
            pow.attach(&hash, "short", std::slice::from_ref(&tx), 1),
            Err(PowError::InvalidHash { field: "branch" })
        ));
        assert!(matches!(
            pow.attach(&hash, &hash, std::slice::from_ref(&tx), 244),
            Err(PowError::MwmTooHigh(244))
        ));
        assert!(matches!(
            pow.attach(&hash, &hash, &["NOTATX".to_string()], 1),
            Err(PowError::InvalidTransaction { index: 0, .. })
        ));
    }
}
