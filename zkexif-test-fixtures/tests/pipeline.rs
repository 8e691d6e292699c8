use std::path::{Path, PathBuf};

use halo2curves_axiom::bn256::Fr;
use serde_json::json;
use zkexif_common::{
    fr_from_decimal, tag_identifier, CommitmentScheme, Error, PaddedInputSet, Phase,
    ProofPayload, SchemeKind, TruncationPolicy, ValueHashMode, CAPACITY,
};
use zkexif_metadata::{embed, extract, retrieve, ExtractOptions, InMemoryTool};
use zkexif_prover::{generate_proof, GeneratedProof, ProofRequest};
use zkexif_test_fixtures::{
    camera_image, engine, options, tool_with, two_tag_image, wide_image, RecordingBackend,
    EMBEDDED_IMAGE, IMAGE, MANIFEST,
};
use zkexif_verifier::{verify_image, PayloadSource, VerificationOutcome, VerifyRequest};

fn request(scheme: CommitmentScheme, output: Option<PathBuf>) -> ProofRequest {
    ProofRequest {
        image: PathBuf::from(IMAGE),
        scheme,
        query_label: None,
        options: options(ValueHashMode::PoseidonFold),
        manifest_path: PathBuf::from(MANIFEST),
        output,
    }
}

fn prove(tool: &mut InMemoryTool, scheme: CommitmentScheme) -> GeneratedProof {
    let mut backend = RecordingBackend::accepting();
    generate_proof(&mut backend, tool, engine(), &request(scheme, None)).expect("proof")
}

fn verify_with(
    backend: &mut RecordingBackend,
    tool: &mut InMemoryTool,
    image: &str,
    proof_file: &Path,
    secret: Option<Fr>,
) -> VerificationOutcome {
    let request = VerifyRequest {
        image: Path::new(image),
        source: PayloadSource::File(proof_file),
        secret,
        manifest_path: Some(PathBuf::from(MANIFEST)),
    };
    verify_image(backend, tool, engine(), &request)
        .expect("verification runs")
        .outcome
}

#[test]
fn two_tag_example_extracts_and_recommits() {
    let mut tool = tool_with(&[(IMAGE, two_tag_image())]);
    let first = extract(
        &mut tool,
        engine(),
        Path::new(IMAGE),
        options(ValueHashMode::PoseidonFold),
    )
    .unwrap();

    assert_eq!(first.ordered_tag_names, vec!["EXIF:Make", "EXIF:Model"]);
    assert_eq!(
        first.identifiers,
        vec![tag_identifier("EXIF:Make"), tag_identifier("EXIF:Model")]
    );
    assert_eq!(first.value_hashes.len(), 2);
    assert_eq!(first.count, 2);
    assert!(!first.truncated);

    let second = extract(
        &mut tool,
        engine(),
        Path::new(IMAGE),
        options(ValueHashMode::PoseidonFold),
    )
    .unwrap();
    let scheme = CommitmentScheme::IdentifierValuePair;
    assert_eq!(
        scheme.commit(engine(), &PaddedInputSet::from_extraction(&first)),
        scheme.commit(engine(), &PaddedInputSet::from_extraction(&second))
    );
}

#[test]
fn generate_then_verify_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let proof_file = dir.path().join("proof.json");
    let mut tool = tool_with(&[(IMAGE, camera_image())]);

    let mut prover = RecordingBackend::accepting();
    let generated = generate_proof(
        &mut prover,
        &mut tool,
        engine(),
        &request(CommitmentScheme::IdentifierValuePair, Some(proof_file.clone())),
    )
    .unwrap();
    assert_eq!(generated.written_to.as_deref(), Some(proof_file.as_path()));
    assert_eq!(
        (prover.loads, prover.executes, prover.proves, prover.releases),
        (1, 1, 1, 1)
    );
    assert_eq!(
        prover.last_descriptor.as_ref().unwrap().scheme,
        SchemeKind::IdentifierValuePair
    );

    let on_disk = ProofPayload::read_from(&proof_file).unwrap();
    assert_eq!(on_disk, generated.payload);
    assert_eq!(on_disk.inputs.tag_count, 9);
    assert!(on_disk
        .meta
        .extracted_tag_names
        .iter()
        .all(|name| !name.starts_with("System:") && !name.starts_with("File:")));

    let mut verifier = RecordingBackend::accepting();
    let outcome = verify_with(&mut verifier, &mut tool, IMAGE, &proof_file, None);
    assert_eq!(outcome, VerificationOutcome::Verified);
    assert_eq!((verifier.loads, verifier.verifies, verifier.releases), (1, 1, 1));
}

#[test]
fn tampered_image_is_rejected_without_backend() {
    let dir = tempfile::tempdir().unwrap();
    let proof_file = dir.path().join("proof.json");
    let mut tool = tool_with(&[(IMAGE, two_tag_image())]);
    let generated = prove(&mut tool, CommitmentScheme::IdentifierValuePair);
    generated.payload.write_atomic(&proof_file).unwrap();

    tool.tags_mut(IMAGE)
        .unwrap()
        .insert("EXIF:Model".into(), json!("X200"));

    let mut verifier = RecordingBackend::accepting();
    let outcome = verify_with(&mut verifier, &mut tool, IMAGE, &proof_file, None);
    match outcome {
        VerificationOutcome::CommitmentMismatch {
            expected,
            recomputed,
        } => {
            assert_eq!(expected, generated.payload.commitment().unwrap());
            assert_ne!(expected, recomputed);
        }
        _ => panic!("expected a commitment mismatch, got {outcome:?}"),
    }
    assert_eq!(verifier.backend_calls(), 0);
    assert!(matches!(
        outcome.ensure_verified(),
        Err(Error::CommitmentMismatch { .. })
    ));
}

#[test]
fn added_tag_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let proof_file = dir.path().join("proof.json");
    let mut tool = tool_with(&[(IMAGE, two_tag_image())]);
    let scheme = CommitmentScheme::IdentifierOnly {
        query_tag: tag_identifier("EXIF:Make"),
    };
    prove(&mut tool, scheme)
        .payload
        .write_atomic(&proof_file)
        .unwrap();

    tool.tags_mut(IMAGE)
        .unwrap()
        .insert("EXIF:Software".into(), json!("Editor 2.0"));

    let mut verifier = RecordingBackend::accepting();
    let outcome = verify_with(&mut verifier, &mut tool, IMAGE, &proof_file, None);
    assert!(matches!(outcome, VerificationOutcome::CommitmentMismatch { .. }));
    assert_eq!(verifier.backend_calls(), 0);
}

#[test]
fn volatile_file_tags_do_not_affect_commitment() {
    let mut tool = tool_with(&[(IMAGE, camera_image())]);
    let before = prove(&mut tool, CommitmentScheme::IdentifierValuePair);

    let tags = tool.tags_mut(IMAGE).unwrap();
    tags.insert("System:FileName".into(), json!("renamed.jpg"));
    tags.insert("System:FileModifyDate".into(), json!("2025:01:01 00:00:00+00:00"));
    tags.insert("File:FileSize".into(), json!(123_456));
    let after = prove(&mut tool, CommitmentScheme::IdentifierValuePair);

    assert_eq!(after.payload.inputs, before.payload.inputs);
}

#[test]
fn embedded_payload_round_trips_and_verifies() {
    let mut tool = tool_with(&[(IMAGE, camera_image())]);
    let generated = prove(&mut tool, CommitmentScheme::IdentifierValuePair);

    embed(
        &mut tool,
        Path::new(IMAGE),
        &generated.payload,
        "XMP-dc:Description",
        Path::new(EMBEDDED_IMAGE),
    )
    .unwrap();
    assert!(tool.tags(IMAGE).unwrap().get("XMP-dc:Description").is_none());

    let retrieved = retrieve(&mut tool, Path::new(EMBEDDED_IMAGE)).unwrap();
    assert_eq!(retrieved, generated.payload);

    let mut verifier = RecordingBackend::accepting();
    let report = verify_image(
        &mut verifier,
        &mut tool,
        engine(),
        &VerifyRequest {
            image: Path::new(EMBEDDED_IMAGE),
            source: PayloadSource::Embedded,
            secret: None,
            manifest_path: Some(PathBuf::from(MANIFEST)),
        },
    )
    .unwrap();
    assert_eq!(report.outcome, VerificationOutcome::Verified);
    assert_eq!(report.payload, generated.payload);
}

#[test]
fn retrieve_without_payload_is_malformed() {
    let mut tool = tool_with(&[(IMAGE, two_tag_image())]);
    assert!(matches!(
        retrieve(&mut tool, Path::new(IMAGE)),
        Err(Error::MalformedPayload(_))
    ));
}

#[test]
fn oversized_images_truncate_observably() {
    let mut tool = tool_with(&[(IMAGE, wide_image(CAPACITY + 8))]);
    let generated = prove(&mut tool, CommitmentScheme::IdentifierValuePair);

    assert!(generated.extraction.truncated);
    assert_eq!(generated.extraction.count, CAPACITY);
    assert_eq!(generated.extraction.ordered_tag_names.len(), CAPACITY + 8);
    assert!(generated.payload.meta.truncated);
    assert_eq!(generated.payload.inputs.tag_count as usize, CAPACITY);
    assert_eq!(generated.payload.meta.extracted_tag_names.len(), CAPACITY);
}

#[test]
fn reject_policy_refuses_oversized_images() {
    let mut tool = tool_with(&[(IMAGE, wide_image(CAPACITY + 1))]);
    let mut backend = RecordingBackend::accepting();
    let mut req = request(CommitmentScheme::IdentifierValuePair, None);
    req.options = ExtractOptions {
        value_hash: ValueHashMode::PoseidonFold,
        truncation: TruncationPolicy::Reject,
    };

    let err = generate_proof(&mut backend, &mut tool, engine(), &req).unwrap_err();
    assert!(matches!(
        err,
        Error::CapacityExceeded {
            found,
            capacity: CAPACITY
        } if found == CAPACITY + 1
    ));
    assert_eq!(backend.executes, 0);
    assert_eq!(backend.releases, 1);
}

#[test]
fn missing_query_tag_fails_before_execution() {
    let mut tool = tool_with(&[(IMAGE, two_tag_image())]);
    let mut backend = RecordingBackend::accepting();
    let mut req = request(
        CommitmentScheme::IdentifierOnly {
            query_tag: tag_identifier("EXIF:LensModel"),
        },
        None,
    );
    req.query_label = Some("EXIF:LensModel".into());

    let err = generate_proof(&mut backend, &mut tool, engine(), &req).unwrap_err();
    match err {
        Error::TagNotFound { tag, id } => {
            assert_eq!(tag, "EXIF:LensModel");
            assert_eq!(id, tag_identifier("EXIF:LensModel"));
        }
        other => panic!("expected TagNotFound, got {other:?}"),
    }
    assert_eq!((backend.executes, backend.proves), (0, 0));
    assert_eq!(backend.releases, 1);
}

#[test]
fn present_query_tag_is_proven() {
    let mut tool = tool_with(&[(IMAGE, two_tag_image())]);
    let query = tag_identifier("EXIF:Model");
    let generated = prove(&mut tool, CommitmentScheme::IdentifierOnly { query_tag: query });
    assert_eq!(generated.payload.inputs.query_tag_id, Some(query));
    assert_eq!(generated.payload.proof.public_inputs.len(), 3);
}

#[test]
fn failed_proving_leaves_no_payload_and_releases_backend() {
    let dir = tempfile::tempdir().unwrap();
    let proof_file = dir.path().join("proof.json");
    let mut tool = tool_with(&[(IMAGE, two_tag_image())]);
    let mut backend = RecordingBackend::failing_prove();

    let err = generate_proof(
        &mut backend,
        &mut tool,
        engine(),
        &request(CommitmentScheme::IdentifierValuePair, Some(proof_file.clone())),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        Error::Backend {
            phase: Phase::Proving,
            ..
        }
    ));
    assert_eq!(backend.releases, 1);
    assert!(!proof_file.exists());
}

#[test]
fn empty_image_has_nothing_to_commit() {
    let mut only_volatile = zkexif_metadata::TagMap::new();
    only_volatile.insert("System:FileName".into(), json!("x.jpg"));
    let mut tool = tool_with(&[(IMAGE, only_volatile)]);
    let mut backend = RecordingBackend::accepting();

    let err = generate_proof(
        &mut backend,
        &mut tool,
        engine(),
        &request(CommitmentScheme::IdentifierValuePair, None),
    )
    .unwrap_err();
    assert!(matches!(err, Error::NoMetadataFound(_)));
}

#[test]
fn keyed_proofs_need_the_right_secret() {
    let dir = tempfile::tempdir().unwrap();
    let proof_file = dir.path().join("proof.json");
    let secret = fr_from_decimal("123456789").unwrap();
    let mut tool = tool_with(&[(IMAGE, camera_image())]);
    prove(&mut tool, CommitmentScheme::SecretKeyedPair { secret })
        .payload
        .write_atomic(&proof_file)
        .unwrap();

    let mut verifier = RecordingBackend::accepting();
    let missing = verify_image(
        &mut verifier,
        &mut tool,
        engine(),
        &VerifyRequest {
            image: Path::new(IMAGE),
            source: PayloadSource::File(&proof_file),
            secret: None,
            manifest_path: None,
        },
    );
    assert!(matches!(missing, Err(Error::MissingSecret)));

    let wrong = verify_with(
        &mut verifier,
        &mut tool,
        IMAGE,
        &proof_file,
        Some(secret + Fr::from(1u64)),
    );
    assert!(matches!(wrong, VerificationOutcome::CommitmentMismatch { .. }));
    assert_eq!(verifier.backend_calls(), 0);

    let right = verify_with(&mut verifier, &mut tool, IMAGE, &proof_file, Some(secret));
    assert_eq!(right, VerificationOutcome::Verified);
}

#[test]
fn secret_changes_the_commitment() {
    let mut tool = tool_with(&[(IMAGE, two_tag_image())]);
    let plain = prove(&mut tool, CommitmentScheme::IdentifierValuePair);
    let keyed = prove(
        &mut tool,
        CommitmentScheme::SecretKeyedPair {
            secret: Fr::from(42u64),
        },
    );
    assert_ne!(plain.payload.inputs.commitment, keyed.payload.inputs.commitment);
    assert_eq!(plain.payload.inputs.tag_count, keyed.payload.inputs.tag_count);
}

#[test]
fn rejected_proof_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let proof_file = dir.path().join("proof.json");
    let mut tool = tool_with(&[(IMAGE, two_tag_image())]);
    prove(&mut tool, CommitmentScheme::IdentifierValuePair)
        .payload
        .write_atomic(&proof_file)
        .unwrap();

    let mut verifier = RecordingBackend::rejecting();
    let outcome = verify_with(&mut verifier, &mut tool, IMAGE, &proof_file, None);
    assert_eq!(outcome, VerificationOutcome::ProofRejected);
    assert_eq!(verifier.releases, 1);
}

#[test]
fn blake3_mode_is_recorded_and_reused_by_the_verifier() {
    let dir = tempfile::tempdir().unwrap();
    let proof_file = dir.path().join("proof.json");
    let mut tool = tool_with(&[(IMAGE, camera_image())]);

    let mut req = request(CommitmentScheme::IdentifierValuePair, Some(proof_file.clone()));
    req.options = options(ValueHashMode::Blake3Reduced);
    let blake = generate_proof(&mut RecordingBackend::accepting(), &mut tool, engine(), &req)
        .unwrap();
    let poseidon = prove(&mut tool, CommitmentScheme::IdentifierValuePair);

    assert_eq!(blake.payload.meta.value_hash_mode, ValueHashMode::Blake3Reduced);
    assert_ne!(blake.payload.inputs.commitment, poseidon.payload.inputs.commitment);

    let mut verifier = RecordingBackend::accepting();
    let outcome = verify_with(&mut verifier, &mut tool, IMAGE, &proof_file, None);
    assert_eq!(outcome, VerificationOutcome::Verified);
}
