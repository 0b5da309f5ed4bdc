//! Attestation rejection reasons.
//!
//! Only protocol violations are errors. Inconsistent signals and unknown
//! architectures are scored, not rejected.

/// Why a submission was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationError {
    /// Missing or unparseable submission fields
    MalformedInput(String),
    /// Nonce never issued, already consumed, or past its TTL
    StaleOrReplayedNonce,
    /// Bad signature encoding, invalid signature, or key differs from the
    /// pinned one
    SignatureMismatch(String),
    /// Commitment does not equal the recomputed hash
    CommitmentMismatch,
    /// Too many challenges outstanding
    ChallengeCapacity,
    /// Persistence failed
    Storage(String),
}

impl AttestationError {
    /// Stable machine-readable code, returned to miners as `error_code`.
    pub fn code(&self) -> &'static str {
        match self {
            AttestationError::MalformedInput(_) => "malformed_input",
            AttestationError::StaleOrReplayedNonce => "stale_or_replayed_nonce",
            AttestationError::SignatureMismatch(_) => "signature_mismatch",
            AttestationError::CommitmentMismatch => "commitment_mismatch",
            AttestationError::ChallengeCapacity => "challenge_capacity",
            AttestationError::Storage(_) => "storage",
        }
    }
}

impl std::fmt::Display for AttestationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttestationError::MalformedInput(detail) => write!(f, "Malformed submission: {}", detail),
            AttestationError::StaleOrReplayedNonce => {
                write!(f, "Nonce is unknown, expired, or already used")
            }
            AttestationError::SignatureMismatch(detail) => {
                write!(f, "Signature verification failed: {}", detail)
            }
            AttestationError::CommitmentMismatch => {
                write!(f, "Commitment does not match nonce, miner and timestamp")
            }
            AttestationError::ChallengeCapacity => {
                write!(f, "Too many outstanding challenges, retry later")
            }
            AttestationError::Storage(detail) => write!(f, "Storage error: {}", detail),
        }
    }
}

impl std::error::Error for AttestationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            AttestationError::MalformedInput("x".into()),
            AttestationError::StaleOrReplayedNonce,
            AttestationError::SignatureMismatch("x".into()),
            AttestationError::CommitmentMismatch,
            AttestationError::ChallengeCapacity,
            AttestationError::Storage("x".into()),
        ];
        let codes: std::collections::HashSet<_> = errors.iter().map(|e| e.code()).collect();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_display_includes_detail() {
        let err = AttestationError::MalformedInput("miner_id is empty".into());
        assert_eq!(err.to_string(), "Malformed submission: miner_id is empty");
    }
}
