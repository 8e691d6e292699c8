//! Contract between the orchestration code and a proving system.

use std::{
    ops::{Deref, DerefMut},
    path::PathBuf,
};

use halo2curves_axiom::bn256::Fr;
use tracing::{debug, warn};
use zkexif_circuit::{
    public_instances, PublicInputs, SchemeKind, TagCommitmentInput, CAPACITY,
};

use crate::{
    commitment::CommitmentScheme,
    error::{Error, Phase, Result},
    padding::PaddedInputSet,
};

/// Which circuit to load and where its artifacts live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CircuitDescriptor {
    pub scheme: SchemeKind,
    pub manifest_path: PathBuf,
}

/// Everything the circuit consumes, private and public.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CircuitInputs {
    pub scheme: SchemeKind,
    pub identifiers: [u32; CAPACITY],
    pub value_hashes: [Fr; CAPACITY],
    pub secret: Fr,
    pub public: PublicInputs,
}

impl CircuitInputs {
    pub fn new(scheme: &CommitmentScheme, padded: &PaddedInputSet, commitment: Fr) -> Self {
        Self {
            scheme: scheme.kind(),
            identifiers: padded.identifiers,
            value_hashes: padded.value_hashes,
            secret: scheme.secret(),
            public: PublicInputs {
                commitment,
                tag_count: padded.count as u32,
                query_tag_id: scheme.query_tag(),
            },
        }
    }

    pub fn to_circuit_input(&self) -> TagCommitmentInput {
        TagCommitmentInput {
            scheme: self.scheme,
            tag_ids: self.identifiers.to_vec(),
            tag_value_hashes: self.value_hashes.to_vec(),
            secret: self.secret,
            public: self.public.clone(),
        }
    }

    /// Public inputs in instance order.
    pub fn public_inputs(&self) -> Vec<Fr> {
        flatten_public(self.scheme, &self.public)
    }
}

pub fn flatten_public(scheme: SchemeKind, public: &PublicInputs) -> Vec<Fr> {
    public_instances(scheme, public).into_iter().flatten().collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendProof {
    pub scheme: SchemeKind,
    pub proof: Vec<u8>,
    pub public_inputs: Vec<Fr>,
    pub verification_key: Vec<u8>,
}

/// A proving system able to load a circuit and prove or verify against it.
///
/// Errors are reported as `anyhow::Error`; callers attach the failing
/// [`Phase`] when lifting them into [`Error::Backend`].
pub trait ProofBackend {
    type Witness;

    fn load(&mut self, descriptor: &CircuitDescriptor) -> anyhow::Result<()>;

    fn execute(&mut self, inputs: &CircuitInputs) -> anyhow::Result<Self::Witness>;

    fn prove(&mut self, witness: Self::Witness) -> anyhow::Result<BackendProof>;

    fn verify(&mut self, proof: &BackendProof) -> anyhow::Result<bool>;

    fn release(&mut self) -> anyhow::Result<()>;
}

/// Loaded backend; released when dropped, on success and error paths alike.
pub struct BackendGuard<'a, B: ProofBackend> {
    backend: &'a mut B,
}

impl<'a, B: ProofBackend> BackendGuard<'a, B> {
    pub fn load(backend: &'a mut B, descriptor: &CircuitDescriptor) -> Result<Self> {
        let guard = Self { backend };
        guard
            .backend
            .load(descriptor)
            .map_err(|err| Error::backend(Phase::CircuitLoad, err))?;
        debug!(scheme = %descriptor.scheme, "backend loaded");
        Ok(guard)
    }
}

impl<B: ProofBackend> Deref for BackendGuard<'_, B> {
    type Target = B;

    fn deref(&self) -> &Self::Target {
        self.backend
    }
}

impl<B: ProofBackend> DerefMut for BackendGuard<'_, B> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.backend
    }
}

impl<B: ProofBackend> Drop for BackendGuard<'_, B> {
    fn drop(&mut self) {
        if let Err(err) = self.backend.release() {
            warn!(error = %err, "failed to release proof backend");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[derive(Default)]
    struct CountingBackend {
        fail_load: bool,
        releases: usize,
    }

    impl ProofBackend for CountingBackend {
        type Witness = ();

        fn load(&mut self, _: &CircuitDescriptor) -> anyhow::Result<()> {
            if self.fail_load {
                Err(anyhow!("no artifacts"))
            } else {
                Ok(())
            }
        }

        fn execute(&mut self, _: &CircuitInputs) -> anyhow::Result<()> {
            Ok(())
        }

        fn prove(&mut self, _: ()) -> anyhow::Result<BackendProof> {
            Err(anyhow!("unused"))
        }

        fn verify(&mut self, _: &BackendProof) -> anyhow::Result<bool> {
            Ok(true)
        }

        fn release(&mut self) -> anyhow::Result<()> {
            self.releases += 1;
            Ok(())
        }
    }

    fn descriptor() -> CircuitDescriptor {
        CircuitDescriptor {
            scheme: SchemeKind::IdentifierValuePair,
            manifest_path: PathBuf::from("manifest.json"),
        }
    }

    #[test]
    fn guard_releases_on_drop() {
        let mut backend = CountingBackend::default();
        {
            let mut guard = BackendGuard::load(&mut backend, &descriptor()).unwrap();
            guard.execute(&CircuitInputs::new(
                &CommitmentScheme::IdentifierValuePair,
                &PaddedInputSet::new(&[1], &[Fr::one()]),
                Fr::zero(),
            ))
            .unwrap();
        }
        assert_eq!(backend.releases, 1);
    }

    #[test]
    fn failed_load_still_releases() {
        let mut backend = CountingBackend {
            fail_load: true,
            ..Default::default()
        };
        let err = BackendGuard::load(&mut backend, &descriptor()).err().unwrap();
        assert!(matches!(
            err,
            Error::Backend {
                phase: Phase::CircuitLoad,
                ..
            }
        ));
        assert_eq!(backend.releases, 1);
    }

    #[test]
    fn public_inputs_follow_instance_order() {
        let padded = PaddedInputSet::new(&[4, 5], &[Fr::zero(), Fr::zero()]);
        let inputs = CircuitInputs::new(
            &CommitmentScheme::IdentifierOnly { query_tag: 5 },
            &padded,
            Fr::from(99),
        );
        assert_eq!(
            inputs.public_inputs(),
            vec![Fr::from(99), Fr::from(2), Fr::from(5)]
        );
    }
}
