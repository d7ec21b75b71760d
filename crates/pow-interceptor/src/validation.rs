use crate::{
    command::AttachToTangleRequest,
    config::Limits,
    error::{
        InterceptError,
        Result,
    },
};

/// Outcome of validating an intercepted request against the [`Limits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Run the proof of work with the validated MWM.
    Compute { mwm: u8 },
    /// Nothing to compute on; hand the request to the node.
    Passthrough,
}

/// Checks the MWM and bundle size ceilings. Pure, no side effects.
pub fn validate(request: &AttachToTangleRequest, limits: &Limits) -> Result<Admission> {
    let max_mwm = limits.max_mwm();
    let mwm = u8::try_from(request.min_weight_magnitude)
        .ok()
        .filter(|mwm| *mwm <= max_mwm)
        .ok_or(InterceptError::InvalidMwm { max: max_mwm })?;

    let bundle_txs = request.trytes.len();
    if bundle_txs > limits.max_bundle_txs() {
        return Err(InterceptError::BundleTooLarge {
            max: limits.max_bundle_txs(),
        });
    }

    if bundle_txs == 0 {
        return Ok(Admission::Passthrough);
    }

    Ok(Admission::Compute { mwm })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ATTACH_TO_TANGLE;

    fn request(mwm: i64, txs: usize) -> AttachToTangleRequest {
        AttachToTangleRequest {
            command: ATTACH_TO_TANGLE.into(),
            min_weight_magnitude: mwm,
            trytes: vec!["9".into(); txs],
            ..Default::default()
        }
    }

    #[test]
    fn test_accepts_within_limits() {
        let limits = Limits::new(14, 20).unwrap();
        assert_eq!(
            validate(&request(14, 1), &limits).unwrap(),
            Admission::Compute { mwm: 14 }
        );
        assert_eq!(
            validate(&request(0, 20), &limits).unwrap(),
            Admission::Compute { mwm: 0 }
        );
    }

    #[test]
    fn test_rejects_mwm_out_of_bounds() {
        let limits = Limits::new(14, 20).unwrap();
        for mwm in [15, -1, 300, i64::MAX, i64::MIN] {
            let err = validate(&request(mwm, 1), &limits).unwrap_err();
            assert!(matches!(err, InterceptError::InvalidMwm { max: 14 }), "mwm {mwm}");
            assert!(err.to_string().contains("1-14"));
        }
    }

    #[test]
    fn test_rejects_large_bundles() {
        let limits = Limits::new(14, 20).unwrap();
        let err = validate(&request(14, 25), &limits).unwrap_err();
        assert!(matches!(err, InterceptError::BundleTooLarge { max: 20 }));
        assert!(err.to_string().contains("max allowed is 20"));
    }

    #[test]
    fn test_empty_bundle_passes_through() {
        let limits = Limits::new(14, 20).unwrap();
        assert_eq!(
            validate(&request(14, 0), &limits).unwrap(),
            Admission::Passthrough
        );
    }

    #[test]
    fn test_mwm_is_checked_before_passthrough() {
        let limits = Limits::new(14, 20).unwrap();
        assert!(matches!(
            validate(&request(15, 0), &limits),
            Err(InterceptError::InvalidMwm { .. })
        ));
    }
}
