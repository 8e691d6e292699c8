use anyhow::{anyhow, bail, ensure, Context};
use tracing::{debug, warn};
use zkexif_common::{
    load_verifier_artifacts, BackendProof, CircuitDescriptor, CircuitInputs, ProofBackend,
    VerifierArtifacts,
};

use crate::{instance_columns, verify};

/// Verification-only halo2 backend. Holds params and the trusted verifying key.
#[derive(Default)]
pub struct Halo2Verifier {
    artifacts: Option<VerifierArtifacts>,
}

impl Halo2Verifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from artifacts already in memory.
    pub fn with_artifacts(artifacts: VerifierArtifacts) -> Self {
        Self {
            artifacts: Some(artifacts),
        }
    }
}

impl ProofBackend for Halo2Verifier {
    type Witness = ();

    fn load(&mut self, descriptor: &CircuitDescriptor) -> anyhow::Result<()> {
        if self
            .artifacts
            .as_ref()
            .is_some_and(|a| a.manifest.scheme == descriptor.scheme)
        {
            return Ok(());
        }
        let artifacts = load_verifier_artifacts(&descriptor.manifest_path, descriptor.scheme)
            .with_context(|| {
                format!(
                    "failed to load verifier artifacts from {}",
                    descriptor.manifest_path.display()
                )
            })?;
        debug!(scheme = %descriptor.scheme, k = artifacts.manifest.k, "verifier artifacts loaded");
        self.artifacts = Some(artifacts);
        Ok(())
    }

    fn execute(&mut self, _inputs: &CircuitInputs) -> anyhow::Result<()> {
        bail!("verification-only backend cannot compute witnesses")
    }

    fn prove(&mut self, _witness: ()) -> anyhow::Result<BackendProof> {
        bail!("verification-only backend cannot prove")
    }

    fn verify(&mut self, proof: &BackendProof) -> anyhow::Result<bool> {
        let artifacts = self
            .artifacts
            .as_ref()
            .ok_or_else(|| anyhow!("no verifier artifacts loaded"))?;
        ensure!(
            artifacts.manifest.scheme == proof.scheme,
            "proof is for {} but loaded keys are for {}",
            proof.scheme,
            artifacts.manifest.scheme
        );
        ensure!(
            proof.public_inputs.len() == proof.scheme.num_instance_columns(),
            "expected {} public inputs, got {}",
            proof.scheme.num_instance_columns(),
            proof.public_inputs.len()
        );
        if proof.verification_key != artifacts.vk_bytes {
            warn!("payload verification key differs from the trusted key");
            return Ok(false);
        }

        let instances = instance_columns(&proof.public_inputs);
        Ok(verify(
            &artifacts.params,
            &artifacts.vk,
            &proof.proof,
            &instances,
        ))
    }

    fn release(&mut self) -> anyhow::Result<()> {
        self.artifacts = None;
        Ok(())
    }
}
