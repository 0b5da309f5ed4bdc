//! Miner submissions: wire format, commitment and signature.
//!
//! ```text
//! commitment = hex(SHA-256(nonce ‖ miner_id ‖ timestamp as i64 LE))
//! signature  = Ed25519(miner key, commitment as UTF-8)
//! ```

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::error::AttestationError;
use crate::fingerprint::FingerprintReport;

pub const MAX_MINER_ID_LEN: usize = 128;
pub const MAX_DEVICE_FIELD_LEN: usize = 256;

/// Device fields claimed by the miner. `model` carries the CPU brand string
/// as reported by the host OS.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceInfo {
    pub family: String,
    #[serde(default)]
    pub arch: String,
    pub model: String,
    #[serde(default)]
    pub hostname: String,
}

/// One attestation attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttestationSubmission {
    pub miner_id: String,
    pub device: DeviceInfo,
    /// Free-form host signals (MACs, OS release...). String values are
    /// scanned for hypervisor names.
    #[serde(default)]
    pub signals: BTreeMap<String, Value>,
    pub fingerprint: FingerprintReport,
    pub nonce: String,
    /// Unix seconds, bound into the commitment.
    pub timestamp: i64,
    pub commitment: String,
    /// Hex Ed25519 verifying key
    pub public_key: String,
    /// Hex Ed25519 signature over `commitment`
    pub signature: String,
}

/// Hex SHA-256 over `nonce ‖ miner_id ‖ timestamp`.
pub fn compute_commitment(nonce: &str, miner_id: &str, timestamp: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(nonce.as_bytes());
    hasher.update(miner_id.as_bytes());
    hasher.update(timestamp.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

fn is_hex_of_len(value: &str, bytes: usize) -> bool {
    value.len() == bytes * 2 && value.chars().all(|c| c.is_ascii_hexdigit())
}

impl AttestationSubmission {
    /// Fill in `timestamp`, `commitment`, `public_key` and `signature`.
    pub fn sign(&mut self, key: &SigningKey, timestamp: i64) {
        self.timestamp = timestamp;
        self.commitment = compute_commitment(&self.nonce, &self.miner_id, timestamp);
        self.public_key = hex::encode(key.verifying_key().to_bytes());
        self.signature = hex::encode(key.sign(self.commitment.as_bytes()).to_bytes());
    }

    /// Field presence, sizes and encodings. Runs before any crypto.
    pub fn validate_structure(&self) -> Result<(), AttestationError> {
        let malformed = |msg: String| Err(AttestationError::MalformedInput(msg));

        if self.miner_id.trim().is_empty() {
            return malformed("miner_id is empty".into());
        }
        if self.miner_id.len() > MAX_MINER_ID_LEN {
            return malformed(format!("miner_id exceeds {} bytes", MAX_MINER_ID_LEN));
        }
        if self.miner_id.chars().any(|c| c.is_control()) {
            return malformed("miner_id contains control characters".into());
        }
        if self.device.family.trim().is_empty() {
            return malformed("device.family is empty".into());
        }
        if self.device.model.trim().is_empty() {
            return malformed("device.model is empty".into());
        }
        for (name, value) in [
            ("device.family", &self.device.family),
            ("device.arch", &self.device.arch),
            ("device.model", &self.device.model),
            ("device.hostname", &self.device.hostname),
        ] {
            if value.len() > MAX_DEVICE_FIELD_LEN {
                return malformed(format!("{} exceeds {} bytes", name, MAX_DEVICE_FIELD_LEN));
            }
        }
        if !is_hex_of_len(&self.nonce, super::challenge::NONCE_BYTES) {
            return malformed("nonce must be 64 hex characters".into());
        }
        if !is_hex_of_len(&self.commitment, 32) {
            return malformed("commitment must be 64 hex characters".into());
        }
        if self.timestamp <= 0 {
            return malformed("timestamp must be positive".into());
        }
        if let Some(problem) = self.fingerprint.structural_problem() {
            return malformed(problem);
        }
        Ok(())
    }

    pub fn commitment_matches(&self) -> bool {
        let expected = compute_commitment(&self.nonce, &self.miner_id, self.timestamp);
        expected.eq_ignore_ascii_case(&self.commitment)
    }

    /// Verify the signature over the commitment and return the key used.
    pub fn verify_signature(&self) -> Result<VerifyingKey, AttestationError> {
        let mismatch = |msg: &str| AttestationError::SignatureMismatch(msg.to_string());

        let key_bytes: [u8; 32] = hex::decode(&self.public_key)
            .map_err(|_| mismatch("public_key is not hex"))?
            .try_into()
            .map_err(|_| mismatch("public_key must be 32 bytes"))?;
        let public_key =
            VerifyingKey::from_bytes(&key_bytes).map_err(|_| mismatch("public_key is not a valid point"))?;

        let sig_bytes: [u8; 64] = hex::decode(&self.signature)
            .map_err(|_| mismatch("signature is not hex"))?
            .try_into()
            .map_err(|_| mismatch("signature must be 64 bytes"))?;
        let signature = Signature::from_bytes(&sig_bytes);

        public_key
            .verify_strict(self.commitment.as_bytes(), &signature)
            .map_err(|_| mismatch("signature does not verify"))?;
        Ok(public_key)
    }

    /// Normalized hex of the submitted key, as pinned in records.
    pub fn public_key_hex(&self) -> String {
        self.public_key.to_ascii_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::test_support::report_with_passes;
    use rand::rngs::OsRng;

    fn unsigned(nonce: &str) -> AttestationSubmission {
        AttestationSubmission {
            miner_id: "miner-g4-01".to_string(),
            device: DeviceInfo {
                family: "PowerPC".to_string(),
                arch: "G4".to_string(),
                model: "PowerPC G4 (7450)".to_string(),
                hostname: "quicksilver".to_string(),
            },
            signals: BTreeMap::new(),
            fingerprint: report_with_passes(6),
            nonce: nonce.to_string(),
            timestamp: 0,
            commitment: String::new(),
            public_key: String::new(),
            signature: String::new(),
        }
    }

    fn signed() -> (AttestationSubmission, SigningKey) {
        let key = SigningKey::generate(&mut OsRng);
        let mut submission = unsigned(&"ab".repeat(32));
        submission.sign(&key, 1_764_800_000);
        (submission, key)
    }

    #[test]
    fn test_commitment_is_deterministic_and_bound() {
        let a = compute_commitment("aa", "miner", 1);
        assert_eq!(a, compute_commitment("aa", "miner", 1));
        assert_eq!(a.len(), 64);
        assert_ne!(a, compute_commitment("aa", "miner", 2));
        assert_ne!(a, compute_commitment("aa", "miner2", 1));
        assert_ne!(a, compute_commitment("ab", "miner", 1));
    }

    #[test]
    fn test_signed_submission_verifies() {
        let (submission, key) = signed();
        assert!(submission.validate_structure().is_ok());
        assert!(submission.commitment_matches());
        let verified = submission.verify_signature().unwrap();
        assert_eq!(verified, key.verifying_key());
    }

    #[test]
    fn test_tampered_commitment_detected() {
        let (mut submission, _) = signed();
        submission.miner_id = "someone-else".to_string();
        assert!(!submission.commitment_matches());
    }

    #[test]
    fn test_foreign_key_signature_rejected() {
        let (mut submission, _) = signed();
        let other = SigningKey::generate(&mut OsRng);
        submission.public_key = hex::encode(other.verifying_key().to_bytes());
        assert!(matches!(
            submission.verify_signature(),
            Err(AttestationError::SignatureMismatch(_))
        ));
    }

    #[test]
    fn test_bad_encodings_rejected() {
        let (mut submission, _) = signed();
        submission.signature = "zz".to_string();
        assert!(matches!(
            submission.verify_signature(),
            Err(AttestationError::SignatureMismatch(_))
        ));

        let (mut submission, _) = signed();
        submission.public_key = "abcd".to_string();
        assert!(matches!(
            submission.verify_signature(),
            Err(AttestationError::SignatureMismatch(_))
        ));
    }

    #[test]
    fn test_structural_validation() {
        let (mut s, _) = signed();
        s.miner_id = "  ".to_string();
        assert!(matches!(s.validate_structure(), Err(AttestationError::MalformedInput(_))));

        let (mut s, _) = signed();
        s.device.model = String::new();
        assert!(matches!(s.validate_structure(), Err(AttestationError::MalformedInput(_))));

        let (mut s, _) = signed();
        s.nonce = "short".to_string();
        assert!(matches!(s.validate_structure(), Err(AttestationError::MalformedInput(_))));

        let (mut s, _) = signed();
        s.fingerprint.all_passed = false;
        assert!(matches!(s.validate_structure(), Err(AttestationError::MalformedInput(_))));
    }

    #[test]
    fn test_missing_fields_fail_to_parse() {
        let (submission, _) = signed();
        let mut json = serde_json::to_value(&submission).unwrap();
        json.as_object_mut().unwrap().remove("nonce");
        assert!(serde_json::from_value::<AttestationSubmission>(json).is_err());
    }
}
