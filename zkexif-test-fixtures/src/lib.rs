//! Shared test doubles and lazily generated proving artifacts.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, ensure, Context, Result};
use halo2_proofs_axiom::dev::MockProver;
use once_cell::sync::OnceCell;
use serde_json::json;
use tempfile::TempDir;
use zkexif_circuit::{public_instances, SchemeKind, TagCommitmentCircuit, DEFAULT_K};
use zkexif_common::{
    BackendProof, CircuitDescriptor, CircuitInputs, PoseidonEngine, ProofBackend,
    TruncationPolicy, ValueHashMode, MANIFEST_FILE,
};
use zkexif_metadata::{ExtractOptions, InMemoryTool, TagMap};
use zkexif_prover::write_artifacts;

pub const IMAGE: &str = "/photos/IMG_0001.jpg";
pub const EMBEDDED_IMAGE: &str = "/photos/IMG_0001.proof.jpg";
pub const MANIFEST: &str = "/artifacts/manifest.json";

static ARTIFACTS: OnceCell<SharedArtifacts> = OnceCell::new();

/// Real params and keys for one scheme, written to a directory that lives as
/// long as the test binary.
pub struct SharedArtifacts {
    _dir: TempDir,
    manifest_path: PathBuf,
}

impl SharedArtifacts {
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }
}

/// Artifacts for `IDENTIFIER_VALUE_PAIR`, generated on first use.
pub fn pair_artifacts() -> &'static SharedArtifacts {
    ARTIFACTS.get_or_init(|| {
        build_artifacts(SchemeKind::IdentifierValuePair)
            .expect("failed to build zkexif test artifacts")
    })
}

fn build_artifacts(scheme: SchemeKind) -> Result<SharedArtifacts> {
    let dir = tempfile::tempdir().context("create artifact dir")?;
    write_artifacts(dir.path(), scheme)?;
    Ok(SharedArtifacts {
        manifest_path: dir.path().join(MANIFEST_FILE),
        _dir: dir,
    })
}

/// The two-tag image used throughout the docs.
pub fn two_tag_image() -> TagMap {
    let mut tags = TagMap::new();
    tags.insert("EXIF:Make".into(), json!("Acme"));
    tags.insert("EXIF:Model".into(), json!("X100"));
    tags
}

/// A realistic camera image, including groups the extractor ignores.
pub fn camera_image() -> TagMap {
    let mut tags = TagMap::new();
    tags.insert("SourceFile".into(), json!(IMAGE));
    tags.insert("System:FileName".into(), json!("IMG_0001.jpg"));
    tags.insert("System:FileModifyDate".into(), json!("2024:05:01 10:00:00+02:00"));
    tags.insert("File:ImageWidth".into(), json!(4000));
    tags.insert("ExifTool:ExifToolVersion".into(), json!(12.76));
    tags.insert("Composite:Megapixels".into(), json!(12.0));
    tags.insert("IFD0:Make".into(), json!("Acme"));
    tags.insert("IFD0:Model".into(), json!("X100"));
    tags.insert("IFD0:Orientation".into(), json!(1));
    tags.insert("ExifIFD:DateTimeOriginal".into(), json!("2024:04:30 18:21:07"));
    tags.insert("ExifIFD:ExposureTime".into(), json!(0.004));
    tags.insert("ExifIFD:ISO".into(), json!(200));
    tags.insert("GPS:GPSLatitude".into(), json!(48.8584));
    tags.insert("GPS:GPSLongitude".into(), json!(2.2945));
    tags.insert("XMP-dc:Subject".into(), json!(["tower", "paris"]));
    tags
}

/// An image with `count` distinct tags.
pub fn wide_image(count: usize) -> TagMap {
    (0..count)
        .map(|i| (format!("XMP-test:Tag{i:03}"), json!(i)))
        .collect()
}

pub fn tool_with(images: &[(&str, TagMap)]) -> InMemoryTool {
    images
        .iter()
        .fold(InMemoryTool::new(), |tool, (path, tags)| {
            tool.with_image(*path, tags.clone())
        })
}

pub fn engine() -> &'static PoseidonEngine {
    PoseidonEngine::shared()
}

pub fn options(value_hash: ValueHashMode) -> ExtractOptions {
    ExtractOptions {
        value_hash,
        truncation: TruncationPolicy::Truncate,
    }
}

/// Check `inputs` against the circuit without generating keys.
pub fn mock_check(inputs: &CircuitInputs) -> Result<()> {
    let input = inputs.to_circuit_input();
    let instances = public_instances(input.scheme, &input.public);
    let prover = MockProver::run(DEFAULT_K as u32, &TagCommitmentCircuit::new(input), instances)
        .map_err(|err| anyhow!("mock prover failed to run: {err:?}"))?;
    prover
        .verify()
        .map_err(|failures| anyhow!("constraints not satisfied: {failures:?}"))
}

/// Backend double that records every call it receives.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub loads: usize,
    pub executes: usize,
    pub proves: usize,
    pub verifies: usize,
    pub releases: usize,
    pub last_descriptor: Option<CircuitDescriptor>,
    pub last_inputs: Option<CircuitInputs>,
    /// What `verify` answers.
    pub accept: bool,
    pub fail_prove: bool,
}

impl RecordingBackend {
    pub fn accepting() -> Self {
        Self {
            accept: true,
            ..Self::default()
        }
    }

    pub fn rejecting() -> Self {
        Self::default()
    }

    pub fn failing_prove() -> Self {
        Self {
            fail_prove: true,
            ..Self::accepting()
        }
    }

    pub fn backend_calls(&self) -> usize {
        self.loads + self.executes + self.proves + self.verifies
    }
}

impl ProofBackend for RecordingBackend {
    type Witness = CircuitInputs;

    fn load(&mut self, descriptor: &CircuitDescriptor) -> anyhow::Result<()> {
        self.loads += 1;
        self.last_descriptor = Some(descriptor.clone());
        Ok(())
    }

    fn execute(&mut self, inputs: &CircuitInputs) -> anyhow::Result<CircuitInputs> {
        self.executes += 1;
        self.last_inputs = Some(inputs.clone());
        Ok(inputs.clone())
    }

    fn prove(&mut self, witness: CircuitInputs) -> anyhow::Result<BackendProof> {
        self.proves += 1;
        ensure!(!self.fail_prove, "prover crashed");
        Ok(BackendProof {
            scheme: witness.scheme,
            proof: vec![0xab; 64],
            public_inputs: witness.public_inputs(),
            verification_key: vec![0xcd; 32],
        })
    }

    fn verify(&mut self, proof: &BackendProof) -> anyhow::Result<bool> {
        self.verifies += 1;
        ensure!(
            proof.public_inputs.len() == proof.scheme.num_instance_columns(),
            "wrong number of public inputs"
        );
        Ok(self.accept)
    }

    fn release(&mut self) -> anyhow::Result<()> {
        self.releases += 1;
        Ok(())
    }
}
