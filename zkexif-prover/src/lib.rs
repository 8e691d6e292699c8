// zkexif/zkexif-prover/src/lib.rs

pub mod backend;
pub mod orchestrator;

use std::{
    fs,
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};
use halo2_proofs_axiom::{
    plonk::{self, create_proof, keygen_pk, keygen_vk},
    poly::kzg::{
        commitment::{KZGCommitmentScheme, ParamsKZG},
        multiopen::ProverGWC,
    },
    transcript::{Blake2bWrite, Challenge255, TranscriptWriterBuffer},
};
use halo2curves_axiom::bn256::{Bn256, Fr, G1Affine};
use rand::rngs::OsRng;
use tracing::info;

use zkexif_circuit::{
    public_instances, SchemeKind, TagCommitmentCircuit, TagCommitmentInput, DEFAULT_K,
};
use zkexif_common::{
    serialize_params, serialize_proving_key, serialize_verifying_key, write_manifest,
    ArtifactFile, ArtifactManifest, CIRCUIT_VERSION, MANIFEST_FILE, MANIFEST_VERSION,
};

pub use backend::{Halo2Prover, Halo2Witness};
pub use orchestrator::{
    generate_proof, resolve_query_tag, GeneratedProof, ProofRequest, ProofSession,
};

pub const PARAMS_FILENAME: &str = "params.bin";
pub const VK_FILENAME: &str = "vk.bin";
pub const PK_FILENAME: &str = "pk.bin";

pub struct ProverParams {
    pub params: ParamsKZG<Bn256>,
    pub vk: plonk::VerifyingKey<G1Affine>,
    pub pk: plonk::ProvingKey<G1Affine>,
}

/// KZG setup and key generation for one scheme's circuit.
///
/// The circuit layout is fixed at [`DEFAULT_K`] rows, so the params are too.
pub fn setup(scheme: SchemeKind) -> Result<ProverParams> {
    let mut rng = OsRng;
    let params = ParamsKZG::<Bn256>::setup(DEFAULT_K as u32, &mut rng);
    let empty_circuit = TagCommitmentCircuit::keygen(scheme);
    let vk = keygen_vk(&params, &empty_circuit).context("verifying key generation failed")?;
    let pk = keygen_pk(&params, vk.clone(), &empty_circuit)
        .context("proving key generation failed")?;
    Ok(ProverParams { params, vk, pk })
}

/// Run [`setup`] and write params, keys and a manifest into `output_dir`.
pub fn write_artifacts(
    output_dir: &Path,
    scheme: SchemeKind,
) -> Result<ArtifactManifest> {
    let k = DEFAULT_K as u32;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    info!(%scheme, k, "generating proving artifacts");
    let params = setup(scheme)?;
    let params_bytes = serialize_params(&params.params)?;
    let vk_bytes = serialize_verifying_key(&params.vk)?;
    let pk_bytes = serialize_proving_key(&params.pk)?;

    write_binary(&output_dir.join(PARAMS_FILENAME), &params_bytes)?;
    write_binary(&output_dir.join(VK_FILENAME), &vk_bytes)?;
    write_binary(&output_dir.join(PK_FILENAME), &pk_bytes)?;

    let manifest = ArtifactManifest {
        manifest_version: MANIFEST_VERSION,
        circuit_version: CIRCUIT_VERSION,
        scheme,
        k,
        created_at_unix: current_unix_timestamp(),
        params: ArtifactFile::from_bytes(PARAMS_FILENAME, &params_bytes),
        vk: ArtifactFile::from_bytes(VK_FILENAME, &vk_bytes),
        pk: ArtifactFile::from_bytes(PK_FILENAME, &pk_bytes),
    };
    write_manifest(output_dir.join(MANIFEST_FILE), &manifest)?;
    info!(dir = %output_dir.display(), "artifacts written");
    Ok(manifest)
}

pub fn create_proof_bytes(
    params: &ParamsKZG<Bn256>,
    pk: &plonk::ProvingKey<G1Affine>,
    input: TagCommitmentInput,
) -> Result<Vec<u8>> {
    let instance_slices = public_instances(input.scheme, &input.public);
    let instance_refs: Vec<&[Fr]> = instance_slices.iter().map(|col| col.as_slice()).collect();

    let circuit = TagCommitmentCircuit::new(input);

    let mut transcript = Blake2bWrite::<_, G1Affine, Challenge255<_>>::init(vec![]);
    create_proof::<KZGCommitmentScheme<Bn256>, ProverGWC<'_, Bn256>, _, _, _, _>(
        params,
        pk,
        &[circuit],
        &[instance_refs.as_slice()],
        OsRng,
        &mut transcript,
    )
    .context("proof generation failed")?;
    Ok(transcript.finalize())
}

fn write_binary(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

fn current_unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
