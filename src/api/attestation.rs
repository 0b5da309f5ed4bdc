//! Attestation API endpoints
//!
//! Endpoints:
//!   POST /attest/challenge          -> Issue a single-use nonce
//!   POST /attest/submit             -> Verify a signed submission
//!   GET  /attest/classify?brand=... -> Diagnostic brand classification
//!   GET  /weights                   -> All miner weight records
//!   GET  /weights/{miner_id}        -> One miner's weight record
//!   GET  /health                    -> Liveness probe

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

use crate::attestation::{
    AttestationChallenge, AttestationError, AttestationSubmission, InMemoryNonceStore,
    InMemoryWeightStore, MinerWeightRecord, NonceStore, VerificationOutcome, Verifier, WeightStore,
    reward_shares,
};
use crate::classifier::CpuIdentity;

/// Verifier backed by the in-memory stores.
pub type OracleVerifier = Verifier<InMemoryNonceStore, InMemoryWeightStore>;

// ============================================================================
// State
// ============================================================================

/// Attestation API state
#[derive(Clone)]
pub struct AttestationApiState {
    pub verifier: Arc<OracleVerifier>,
    pub started_at: DateTime<Utc>,
}

impl AttestationApiState {
    pub fn new(verifier: Arc<OracleVerifier>) -> Self {
        Self {
            verifier,
            started_at: Utc::now(),
        }
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Challenge response
#[derive(Debug, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub ttl_seconds: u64,
    pub expires_at: DateTime<Utc>,
}

impl From<AttestationChallenge> for ChallengeResponse {
    fn from(challenge: AttestationChallenge) -> Self {
        Self {
            expires_at: challenge.expires_at(),
            nonce: challenge.nonce,
            issued_at: challenge.issued_at,
            ttl_seconds: challenge.ttl_seconds,
        }
    }
}

/// Submission response
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_multiplier: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl From<&VerificationOutcome> for SubmitResponse {
    fn from(outcome: &VerificationOutcome) -> Self {
        Self {
            ok: true,
            final_multiplier: Some(outcome.record.final_multiplier),
            architecture: Some(outcome.record.architecture.clone()),
            pass_count: Some(outcome.record.pass_count),
            error: None,
            error_code: None,
        }
    }
}

impl From<&AttestationError> for SubmitResponse {
    fn from(err: &AttestationError) -> Self {
        Self {
            ok: false,
            final_multiplier: None,
            architecture: None,
            pass_count: None,
            error: Some(err.to_string()),
            error_code: Some(err.code().to_string()),
        }
    }
}

/// HTTP status for a rejected submission
pub fn status_for(err: &AttestationError) -> StatusCode {
    match err {
        AttestationError::MalformedInput(_) => StatusCode::BAD_REQUEST,
        AttestationError::StaleOrReplayedNonce
        | AttestationError::SignatureMismatch(_)
        | AttestationError::CommitmentMismatch => StatusCode::UNAUTHORIZED,
        AttestationError::ChallengeCapacity => StatusCode::SERVICE_UNAVAILABLE,
        AttestationError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Weight listing query
#[derive(Debug, Deserialize)]
pub struct WeightsQuery {
    /// When set, each record's share of this pool is included
    pub pool: Option<f64>,
}

/// Weight record with its optional pool share
#[derive(Debug, Serialize, Deserialize)]
pub struct WeightEntry {
    #[serde(flatten)]
    pub record: MinerWeightRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share: Option<f64>,
}

/// Weight listing response
#[derive(Debug, Serialize, Deserialize)]
pub struct WeightsResponse {
    pub epoch: u64,
    pub total: usize,
    pub total_weight: f64,
    pub records: Vec<WeightEntry>,
}

/// Classification query
#[derive(Debug, Deserialize)]
pub struct ClassifyQuery {
    pub brand: String,
}

/// Classification response
#[derive(Debug, Serialize, Deserialize)]
pub struct ClassifyResponse {
    pub brand: String,
    pub identity: CpuIdentity,
    /// Priorities of every matching rule, winner first
    pub matching_rules: Vec<u32>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub outstanding_challenges: usize,
    pub miners: usize,
    pub epoch: u64,
    pub uptime_seconds: i64,
    pub timestamp: String,
}

// ============================================================================
// API Handlers
// ============================================================================

/// Issue a challenge nonce; 503 while the challenge store is full
pub async fn create_challenge(
    State(state): State<AttestationApiState>,
) -> Result<Json<ChallengeResponse>, StatusCode> {
    let challenge = state
        .verifier
        .issue_challenge(Utc::now())
        .map_err(|e| status_for(&e))?;
    Ok(Json(challenge.into()))
}

/// Verify a submission and persist the resulting weight
pub async fn submit_attestation(
    State(state): State<AttestationApiState>,
    payload: Result<Json<AttestationSubmission>, JsonRejection>,
) -> (StatusCode, Json<SubmitResponse>) {
    let submission = match payload {
        Ok(Json(submission)) => submission,
        Err(rejection) => {
            debug!("Rejected unparseable submission: {}", rejection.body_text());
            let status = match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            let err = AttestationError::MalformedInput(rejection.body_text());
            return (status, Json((&err).into()));
        }
    };

    match state.verifier.verify(&submission, Utc::now()).await {
        Ok(outcome) => (StatusCode::OK, Json((&outcome).into())),
        Err(err) => {
            if let AttestationError::Storage(detail) = &err {
                error!("Weight store failure: {}", detail);
            }
            (status_for(&err), Json((&err).into()))
        }
    }
}

/// Classify a brand string without attesting
pub async fn classify_brand(
    State(state): State<AttestationApiState>,
    Query(query): Query<ClassifyQuery>,
) -> Json<ClassifyResponse> {
    let classifier = state.verifier.classifier();
    let identity = classifier.classify(&query.brand);
    let matching_rules = classifier
        .conflicts(&query.brand)
        .iter()
        .map(|r| r.priority)
        .collect();

    Json(ClassifyResponse {
        brand: query.brand,
        identity,
        matching_rules,
    })
}

/// List all weight records
pub async fn list_weights(
    State(state): State<AttestationApiState>,
    Query(query): Query<WeightsQuery>,
) -> Result<Json<WeightsResponse>, StatusCode> {
    let records = state.verifier.weights().all().await.map_err(|e| {
        error!("Failed to list weights: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let total_weight = records.iter().map(|r| r.final_multiplier).sum();
    let shares = query.pool.map(|pool| reward_shares(&records, pool));
    let entries = records
        .into_iter()
        .enumerate()
        .map(|(i, record)| WeightEntry {
            share: shares.as_ref().map(|s| s[i].1),
            record,
        })
        .collect::<Vec<_>>();

    Ok(Json(WeightsResponse {
        epoch: state.verifier.config().epochs.epoch_at(Utc::now()),
        total: entries.len(),
        total_weight,
        records: entries,
    }))
}

/// Get one miner's weight record
pub async fn get_weight(
    State(state): State<AttestationApiState>,
    Path(miner_id): Path<String>,
) -> Result<Json<MinerWeightRecord>, StatusCode> {
    match state.verifier.weights().get(&miner_id).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("Failed to read weight record: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Liveness probe
pub async fn health(State(state): State<AttestationApiState>) -> Json<HealthResponse> {
    let now = Utc::now();
    let miners = state
        .verifier
        .weights()
        .all()
        .await
        .map(|r| r.len())
        .unwrap_or(0);

    Json(HealthResponse {
        status: "ok".to_string(),
        outstanding_challenges: state.verifier.nonces().outstanding(),
        miners,
        epoch: state.verifier.config().epochs.epoch_at(now),
        uptime_seconds: (now - state.started_at).num_seconds(),
        timestamp: now.to_rfc3339(),
    })
}

// ============================================================================
// Router
// ============================================================================

pub fn create_router(state: AttestationApiState) -> Router {
    Router::new()
        .route("/attest/challenge", post(create_challenge))
        .route("/attest/submit", post(submit_attestation))
        .route("/attest/classify", get(classify_brand))
        .route("/weights", get(list_weights))
        .route("/weights/{miner_id}", get(get_weight))
        .route("/health", get(health))
        .with_state(state)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&AttestationError::MalformedInput("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&AttestationError::StaleOrReplayedNonce),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&AttestationError::SignatureMismatch("x".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&AttestationError::CommitmentMismatch),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&AttestationError::ChallengeCapacity),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&AttestationError::Storage("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_response_omits_success_fields() {
        let response: SubmitResponse = (&AttestationError::StaleOrReplayedNonce).into();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["error_code"], "stale_or_replayed_nonce");
        assert!(json.get("final_multiplier").is_none());
    }

    #[test]
    fn test_challenge_response_from_challenge() {
        let challenge = AttestationChallenge::new(Utc::now(), 300);
        let nonce = challenge.nonce.clone();
        let expires = challenge.expires_at();
        let response: ChallengeResponse = challenge.into();
        assert_eq!(response.nonce, nonce);
        assert_eq!(response.ttl_seconds, 300);
        assert_eq!(response.expires_at, expires);
    }
}
