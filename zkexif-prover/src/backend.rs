use anyhow::{anyhow, ensure, Context};
use halo2_proofs_axiom::dev::MockProver;
use halo2curves_axiom::bn256::Fr;
use tracing::debug;
use zkexif_circuit::{public_instances, TagCommitmentCircuit, TagCommitmentInput};
use zkexif_common::{
    load_prover_artifacts, BackendProof, CircuitDescriptor, CircuitInputs, ProofBackend,
    ProverArtifacts,
};
use zkexif_verifier::{instance_columns, verify};

use crate::create_proof_bytes;

/// halo2 KZG prover over the tag-commitment circuit.
#[derive(Default)]
pub struct Halo2Prover {
    artifacts: Option<ProverArtifacts>,
}

/// A circuit input whose constraints were checked to hold.
pub struct Halo2Witness {
    input: TagCommitmentInput,
    public_inputs: Vec<Fr>,
}

impl Halo2Prover {
    pub fn new() -> Self {
        Self::default()
    }

    fn artifacts(&self) -> anyhow::Result<&ProverArtifacts> {
        self.artifacts
            .as_ref()
            .ok_or_else(|| anyhow!("no proving artifacts loaded"))
    }
}

impl ProofBackend for Halo2Prover {
    type Witness = Halo2Witness;

    fn load(&mut self, descriptor: &CircuitDescriptor) -> anyhow::Result<()> {
        let artifacts = load_prover_artifacts(&descriptor.manifest_path, descriptor.scheme)
            .with_context(|| {
                format!(
                    "failed to load manifest {}",
                    descriptor.manifest_path.display()
                )
            })?;
        debug!(scheme = %descriptor.scheme, k = artifacts.manifest.k, "prover artifacts loaded");
        self.artifacts = Some(artifacts);
        Ok(())
    }

    fn execute(&mut self, inputs: &CircuitInputs) -> anyhow::Result<Halo2Witness> {
        let artifacts = self.artifacts()?;
        ensure!(
            artifacts.manifest.scheme == inputs.scheme,
            "inputs are for {} but loaded keys are for {}",
            inputs.scheme,
            artifacts.manifest.scheme
        );

        let input = inputs.to_circuit_input();
        input.validate()?;
        let instances = public_instances(input.scheme, &input.public);
        let prover = MockProver::run(
            artifacts.manifest.k,
            &TagCommitmentCircuit::new(input.clone()),
            instances,
        )
        .map_err(|err| anyhow!("witness generation failed: {err:?}"))?;
        prover
            .verify()
            .map_err(|failures| anyhow!("circuit constraints not satisfied: {failures:?}"))?;

        Ok(Halo2Witness {
            input,
            public_inputs: inputs.public_inputs(),
        })
    }

    fn prove(&mut self, witness: Halo2Witness) -> anyhow::Result<BackendProof> {
        let artifacts = self.artifacts()?;
        let scheme = witness.input.scheme;
        let proof = create_proof_bytes(&artifacts.params, &artifacts.pk, witness.input)?;
        Ok(BackendProof {
            scheme,
            proof,
            public_inputs: witness.public_inputs,
            verification_key: artifacts.vk_bytes.clone(),
        })
    }

    fn verify(&mut self, proof: &BackendProof) -> anyhow::Result<bool> {
        let artifacts = self.artifacts()?;
        ensure!(
            artifacts.manifest.scheme == proof.scheme,
            "proof is for {} but loaded keys are for {}",
            proof.scheme,
            artifacts.manifest.scheme
        );
        Ok(verify(
            &artifacts.params,
            &artifacts.vk,
            &proof.proof,
            &instance_columns(&proof.public_inputs),
        ))
    }

    fn release(&mut self) -> anyhow::Result<()> {
        self.artifacts = None;
        Ok(())
    }
}
