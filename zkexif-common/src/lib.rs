//! Host-side protocol for image-metadata commitments: canonical value
//! encoding, field hashing, the commitment variants, the fixed-capacity
//! layout, the proof payload and the proving-artifact manifest.

pub mod backend;
pub mod canonical;
pub mod commitment;
pub mod config;
pub mod error;
pub mod hasher;
pub mod hex;
pub mod padding;
pub mod payload;
pub mod tag_id;

use std::{
    fs,
    io::Cursor,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, ensure, Context};
use halo2_proofs_axiom::{
    plonk,
    poly::{commitment::Params, kzg::commitment::ParamsKZG},
    SerdeFormat,
};
use halo2curves_axiom::{
    bn256::{Bn256, Fr, G1Affine},
    ff::PrimeField,
};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use zkexif_circuit::{circuit_params, TagCommitmentCircuit};

pub use backend::{BackendGuard, BackendProof, CircuitDescriptor, CircuitInputs, ProofBackend};
pub use canonical::{canonical_bytes, normalize, TagDateTime, TagValue};
pub use commitment::CommitmentScheme;
pub use config::Config;
pub use error::{Error, Phase, Result};
pub use hasher::{digest_to_field, value_hash, PoseidonEngine, ValueHashMode};
pub use padding::{pad, ExtractionResult, PaddedInputSet, TagRecord, TruncationPolicy};
pub use payload::{
    is_binder_field, matches_field, PayloadInputs, PayloadMeta, ProofPayload, ProofSection,
    BINDER_FIELDS,
};
pub use tag_id::tag_identifier;
pub use zkexif_circuit::{PublicInputs, SchemeKind, CAPACITY, COMMIT_BASE};

pub const CIRCUIT_VERSION: u32 = 1;
pub const MANIFEST_VERSION: u32 = 1;
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub path: String,
    pub blake3: String,
    pub size: u64,
}

impl ArtifactFile {
    pub fn from_bytes(path: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            path: path.into(),
            blake3: hash_bytes_hex(bytes),
            size: bytes.len() as u64,
        }
    }

    fn resolve_path(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.path)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub manifest_version: u32,
    pub circuit_version: u32,
    pub scheme: SchemeKind,
    pub k: u32,
    pub created_at_unix: u64,
    pub params: ArtifactFile,
    pub vk: ArtifactFile,
    pub pk: ArtifactFile,
}

#[derive(Clone, Debug)]
pub struct VerifierArtifacts {
    pub manifest: ArtifactManifest,
    pub vk_bytes: Vec<u8>,
    pub params: ParamsKZG<Bn256>,
    pub vk: plonk::VerifyingKey<G1Affine>,
}

#[derive(Clone, Debug)]
pub struct ProverArtifacts {
    pub manifest: ArtifactManifest,
    pub vk_bytes: Vec<u8>,
    pub params: ParamsKZG<Bn256>,
    pub vk: plonk::VerifyingKey<G1Affine>,
    pub pk: plonk::ProvingKey<G1Affine>,
}

pub fn serialize_params(params: &ParamsKZG<Bn256>) -> anyhow::Result<Vec<u8>> {
    let mut buf = vec![];
    params
        .write(&mut buf)
        .context("failed to serialize KZG params")?;
    Ok(buf)
}

pub fn deserialize_params(bytes: &[u8]) -> anyhow::Result<ParamsKZG<Bn256>> {
    let mut reader = Cursor::new(bytes);
    ParamsKZG::<Bn256>::read(&mut reader).context("failed to deserialize KZG params")
}

pub fn serialize_verifying_key(vk: &plonk::VerifyingKey<G1Affine>) -> anyhow::Result<Vec<u8>> {
    let mut buf = vec![];
    vk.write(&mut buf, SerdeFormat::Processed)
        .context("failed to serialize verifying key")?;
    Ok(buf)
}

pub fn deserialize_verifying_key(
    scheme: SchemeKind,
    bytes: &[u8],
) -> anyhow::Result<plonk::VerifyingKey<G1Affine>> {
    let mut reader = Cursor::new(bytes);
    plonk::VerifyingKey::read::<_, TagCommitmentCircuit>(
        &mut reader,
        SerdeFormat::Processed,
        circuit_params(scheme),
    )
    .context("failed to deserialize verifying key")
}

pub fn serialize_proving_key(pk: &plonk::ProvingKey<G1Affine>) -> anyhow::Result<Vec<u8>> {
    let mut buf = vec![];
    pk.write(&mut buf, SerdeFormat::Processed)
        .context("failed to serialize proving key")?;
    Ok(buf)
}

pub fn deserialize_proving_key(
    scheme: SchemeKind,
    bytes: &[u8],
) -> anyhow::Result<plonk::ProvingKey<G1Affine>> {
    let mut reader = Cursor::new(bytes);
    plonk::ProvingKey::read::<_, TagCommitmentCircuit>(
        &mut reader,
        SerdeFormat::Processed,
        circuit_params(scheme),
    )
    .context("failed to deserialize proving key")
}

pub fn write_manifest(path: impl AsRef<Path>, manifest: &ArtifactManifest) -> anyhow::Result<()> {
    let json = serde_json::to_vec_pretty(manifest).context("failed to serialize manifest")?;
    fs::write(path.as_ref(), json).context("failed to write manifest")
}

pub fn read_manifest(path: impl AsRef<Path>) -> anyhow::Result<ArtifactManifest> {
    let bytes = fs::read(path.as_ref()).context("failed to read manifest file")?;
    serde_json::from_slice(&bytes).context("failed to parse manifest json")
}

/// Params and verifying key only; the proving key is never read.
pub fn load_verifier_artifacts(
    path: impl AsRef<Path>,
    scheme: SchemeKind,
) -> anyhow::Result<VerifierArtifacts> {
    let manifest_path = path.as_ref();
    let manifest = read_manifest(manifest_path)?;
    ensure_manifest_compat(&manifest, scheme)?;
    let base_dir = manifest_dir(manifest_path);

    let params_bytes = read_artifact_file(&base_dir, &manifest.params, "params")?;
    let vk_bytes = read_artifact_file(&base_dir, &manifest.vk, "verifying key")?;

    Ok(VerifierArtifacts {
        params: deserialize_params(&params_bytes)?,
        vk: deserialize_verifying_key(scheme, &vk_bytes)?,
        vk_bytes,
        manifest,
    })
}

pub fn load_prover_artifacts(
    path: impl AsRef<Path>,
    scheme: SchemeKind,
) -> anyhow::Result<ProverArtifacts> {
    let manifest_path = path.as_ref();
    let manifest = read_manifest(manifest_path)?;
    ensure_manifest_compat(&manifest, scheme)?;
    let base_dir = manifest_dir(manifest_path);

    let params_bytes = read_artifact_file(&base_dir, &manifest.params, "params")?;
    let vk_bytes = read_artifact_file(&base_dir, &manifest.vk, "verifying key")?;
    let pk_bytes = read_artifact_file(&base_dir, &manifest.pk, "proving key")?;

    Ok(ProverArtifacts {
        params: deserialize_params(&params_bytes)?,
        vk: deserialize_verifying_key(scheme, &vk_bytes)?,
        pk: deserialize_proving_key(scheme, &pk_bytes)?,
        vk_bytes,
        manifest,
    })
}

pub fn hash_bytes_hex(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

pub fn fr_from_bytes(bytes: &[u8; 32]) -> anyhow::Result<Fr> {
    Fr::from_bytes(bytes)
        .into_option()
        .ok_or_else(|| anyhow!("invalid bn256 scalar encoding"))
}

pub fn fr_to_bytes(fr: &Fr) -> [u8; 32] {
    let repr = fr.to_repr();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(repr.as_ref());
    bytes
}

/// Interpret `bytes` as a big-endian integer and reduce it into the field.
pub fn reduce_be_bytes_to_fr(bytes: &[u8; 32]) -> Fr {
    let mut acc = Fr::zero();
    let base = Fr::from(256);
    for byte in bytes.iter() {
        acc = acc * base + Fr::from(*byte as u64);
    }
    acc
}

pub fn fr_to_decimal(fr: &Fr) -> String {
    BigUint::from_bytes_le(&fr_to_bytes(fr)).to_str_radix(10)
}

/// Parse a canonical decimal field element; values `>= MODULUS` are rejected.
pub fn fr_from_decimal(text: &str) -> Result<Fr> {
    let value = BigUint::parse_bytes(text.trim().as_bytes(), 10)
        .ok_or_else(|| Error::malformed(format!("'{text}' is not a decimal integer")))?;
    let le = value.to_bytes_le();
    if le.len() > 32 {
        return Err(Error::malformed(format!("'{text}' exceeds the field modulus")));
    }
    let mut bytes = [0u8; 32];
    bytes[..le.len()].copy_from_slice(&le);
    Fr::from_bytes(&bytes)
        .into_option()
        .ok_or_else(|| Error::malformed(format!("'{text}' exceeds the field modulus")))
}

fn read_artifact_file(
    base_dir: &Path,
    entry: &ArtifactFile,
    label: &str,
) -> anyhow::Result<Vec<u8>> {
    let path = entry.resolve_path(base_dir);
    let bytes = fs::read(&path)
        .with_context(|| format!("failed to read {} at {}", label, path.display()))?;
    ensure!(
        bytes.len() as u64 == entry.size,
        "{} size mismatch, manifest recorded {} bytes but found {}",
        label,
        entry.size,
        bytes.len(),
    );
    let actual = hash_bytes_hex(&bytes);
    ensure!(
        actual == entry.blake3,
        "{} hash mismatch, expected {} but computed {}",
        label,
        entry.blake3,
        actual
    );
    Ok(bytes)
}

fn manifest_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn ensure_manifest_compat(manifest: &ArtifactManifest, scheme: SchemeKind) -> anyhow::Result<()> {
    ensure!(
        manifest.manifest_version == MANIFEST_VERSION,
        "unsupported manifest version {}, expected {}",
        manifest.manifest_version,
        MANIFEST_VERSION
    );
    ensure!(
        manifest.circuit_version == CIRCUIT_VERSION,
        "circuit version mismatch: manifest {} vs crate {}",
        manifest.circuit_version,
        CIRCUIT_VERSION
    );
    ensure!(
        manifest.scheme == scheme,
        "manifest was generated for {} but {} was requested",
        manifest.scheme,
        scheme
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest(scheme: SchemeKind) -> ArtifactManifest {
        ArtifactManifest {
            manifest_version: MANIFEST_VERSION,
            circuit_version: CIRCUIT_VERSION,
            scheme,
            k: 17,
            created_at_unix: 0,
            params: ArtifactFile::from_bytes("params.bin", b"params"),
            vk: ArtifactFile::from_bytes("vk.bin", b"vk"),
            pk: ArtifactFile::from_bytes("pk.bin", b"pk"),
        }
    }

    #[test]
    fn fr_bytes_round_trip() {
        let value = Fr::from(2024u64);
        assert_eq!(fr_from_bytes(&fr_to_bytes(&value)).unwrap(), value);
    }

    #[test]
    fn decimal_encoding_matches_integer_value() {
        assert_eq!(fr_to_decimal(&Fr::from(4_294_967_296u64)), "4294967296");
        assert_eq!(fr_from_decimal("0").unwrap(), Fr::zero());
        let minus_one = -Fr::one();
        assert_eq!(fr_from_decimal(&fr_to_decimal(&minus_one)).unwrap(), minus_one);
    }

    #[test]
    fn decimal_rejects_modulus_and_garbage() {
        let modulus =
            "21888242871839275222246405745257275088548364400416034343698204186575808495617";
        assert!(fr_from_decimal(modulus).is_err());
        assert!(fr_from_decimal("12ab").is_err());
        assert!(fr_from_decimal("").is_err());
    }

    #[test]
    fn be_reduction_reads_big_endian() {
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        bytes[30] = 2;
        assert_eq!(reduce_be_bytes_to_fr(&bytes), Fr::from(0x0201));
    }

    #[test]
    fn manifest_scheme_must_match() {
        let manifest = sample_manifest(SchemeKind::IdentifierOnly);
        assert!(ensure_manifest_compat(&manifest, SchemeKind::IdentifierOnly).is_ok());
        assert!(ensure_manifest_compat(&manifest, SchemeKind::SecretKeyedPair).is_err());
    }

    #[test]
    fn artifact_checksum_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("vk.bin"), b"vk").unwrap();
        let entry = ArtifactFile::from_bytes("vk.bin", b"vk");
        assert_eq!(read_artifact_file(dir.path(), &entry, "vk").unwrap(), b"vk");

        fs::write(dir.path().join("vk.bin"), b"vK").unwrap();
        let err = read_artifact_file(dir.path(), &entry, "vk").unwrap_err();
        assert!(err.to_string().contains("hash mismatch"));
    }

    #[test]
    fn manifest_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        write_manifest(&path, &sample_manifest(SchemeKind::IdentifierValuePair)).unwrap();
        let manifest = read_manifest(&path).unwrap();
        assert_eq!(manifest.scheme, SchemeKind::IdentifierValuePair);
        assert_eq!(manifest.vk.size, 2);
    }
}
