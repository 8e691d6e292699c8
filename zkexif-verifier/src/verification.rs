//! Payload-against-image verification.
//!
//! The commitment is recomputed from the image first; the proving backend is
//! only consulted when the image still matches what the payload commits to.

use std::path::{Path, PathBuf};

use anyhow::anyhow;
use halo2curves_axiom::bn256::Fr;
use tracing::{info, warn};
use zkexif_common::{
    config::default_manifest_path, fr_to_decimal, BackendGuard, CircuitDescriptor,
    CommitmentScheme, Error, PaddedInputSet, Phase, PoseidonEngine, ProofBackend, ProofPayload,
    Result, SchemeKind, TruncationPolicy,
};
use zkexif_metadata::{extract, retrieve, ExtractOptions, MetadataTool};

#[derive(Clone, Copy, Debug)]
pub enum PayloadSource<'a> {
    File(&'a Path),
    /// Read from the image's own metadata.
    Embedded,
}

#[derive(Clone, Debug)]
pub struct VerifyRequest<'a> {
    pub image: &'a Path,
    pub source: PayloadSource<'a>,
    /// Required for secret-keyed payloads.
    pub secret: Option<Fr>,
    /// Defaults to the per-scheme manifest under `artifacts/`.
    pub manifest_path: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified,
    CommitmentMismatch { expected: Fr, recomputed: Fr },
    ProofRejected,
}

impl VerificationOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationOutcome::Verified)
    }

    pub fn ensure_verified(self) -> Result<()> {
        match self {
            VerificationOutcome::Verified => Ok(()),
            VerificationOutcome::CommitmentMismatch {
                expected,
                recomputed,
            } => Err(Error::CommitmentMismatch {
                expected: fr_to_decimal(&expected),
                recomputed: fr_to_decimal(&recomputed),
            }),
            VerificationOutcome::ProofRejected => Err(Error::backend(
                Phase::Verification,
                anyhow!("proof was rejected by the verifier"),
            )),
        }
    }
}

#[derive(Clone, Debug)]
pub struct VerificationReport {
    pub outcome: VerificationOutcome,
    pub payload: ProofPayload,
}

/// The commitment variant a payload was produced with.
pub fn scheme_for_payload(payload: &ProofPayload, secret: Option<Fr>) -> Result<CommitmentScheme> {
    match payload.scheme() {
        SchemeKind::IdentifierOnly => {
            let query_tag = payload
                .inputs
                .query_tag_id
                .ok_or_else(|| Error::malformed("IDENTIFIER_ONLY payload without queryTagId"))?;
            Ok(CommitmentScheme::IdentifierOnly { query_tag })
        }
        SchemeKind::IdentifierValuePair => Ok(CommitmentScheme::IdentifierValuePair),
        SchemeKind::SecretKeyedPair => secret
            .map(|secret| CommitmentScheme::SecretKeyedPair { secret })
            .ok_or(Error::MissingSecret),
    }
}

pub fn verify_image<B, T>(
    backend: &mut B,
    tool: &mut T,
    engine: &PoseidonEngine,
    request: &VerifyRequest<'_>,
) -> Result<VerificationReport>
where
    B: ProofBackend,
    T: MetadataTool + ?Sized,
{
    let payload = match request.source {
        PayloadSource::File(path) => ProofPayload::read_from(path)?,
        PayloadSource::Embedded => retrieve(tool, request.image)?,
    };
    let scheme = scheme_for_payload(&payload, request.secret)?;
    let expected = payload.commitment()?;

    let extraction = extract(
        tool,
        engine,
        request.image,
        ExtractOptions {
            value_hash: payload.meta.value_hash_mode,
            truncation: TruncationPolicy::Truncate,
        },
    )?;
    let padded = PaddedInputSet::from_extraction(&extraction);
    let recomputed = scheme.commit(engine, &padded);

    if recomputed != expected || padded.count != payload.inputs.tag_count as usize {
        warn!(
            image = %request.image.display(),
            expected_count = payload.inputs.tag_count,
            recomputed_count = padded.count,
            "image no longer matches the committed metadata"
        );
        return Ok(VerificationReport {
            outcome: VerificationOutcome::CommitmentMismatch {
                expected,
                recomputed,
            },
            payload,
        });
    }

    let descriptor = CircuitDescriptor {
        scheme: scheme.kind(),
        manifest_path: request
            .manifest_path
            .clone()
            .unwrap_or_else(|| default_manifest_path(scheme.kind())),
    };
    let proof = payload.backend_proof()?;
    let accepted = {
        let mut guard = BackendGuard::load(backend, &descriptor)?;
        guard
            .verify(&proof)
            .map_err(|err| Error::backend(Phase::Verification, err))?
    };

    let outcome = if accepted {
        VerificationOutcome::Verified
    } else {
        VerificationOutcome::ProofRejected
    };
    info!(image = %request.image.display(), ?outcome, "verification finished");
    Ok(VerificationReport { outcome, payload })
}
