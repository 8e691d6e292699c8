//! Proof generation as a forward-only typed session.
//!
//! `CircuitLoaded -> InputsAssembled -> WitnessComputed -> ProofGenerated ->
//! PayloadSerialized`, the last state being the returned [`GeneratedProof`].
//! Each transition consumes the session, so a phase can neither be skipped
//! nor repeated, and the backend is released whenever the session is dropped.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zkexif_common::{
    tag_identifier, BackendGuard, BackendProof, CircuitDescriptor, CircuitInputs,
    CommitmentScheme, Error, ExtractionResult, PaddedInputSet, PayloadMeta, Phase,
    PoseidonEngine, ProofBackend, ProofPayload, Result, ValueHashMode,
};
use zkexif_metadata::{extract, ExtractOptions, MetadataTool};

/// A query tag given either by name or as a raw identifier.
pub fn resolve_query_tag(query: &str) -> u32 {
    query
        .trim()
        .parse::<u32>()
        .unwrap_or_else(|_| tag_identifier(query.trim()))
}

#[derive(Clone, Debug)]
pub struct ProofRequest {
    pub image: PathBuf,
    pub scheme: CommitmentScheme,
    /// How the query tag was named, for error reporting.
    pub query_label: Option<String>,
    pub options: ExtractOptions,
    pub manifest_path: PathBuf,
    /// Payload destination; the payload is only returned when unset.
    pub output: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct GeneratedProof {
    pub payload: ProofPayload,
    pub extraction: ExtractionResult,
    pub written_to: Option<PathBuf>,
}

pub struct CircuitLoaded;

/// What every later phase carries forward from input assembly.
struct Assembled {
    extraction: ExtractionResult,
    inputs: CircuitInputs,
    value_hash: ValueHashMode,
}

pub struct InputsAssembled(Assembled);

pub struct WitnessComputed<W> {
    assembled: Assembled,
    witness: W,
}

pub struct ProofGenerated {
    assembled: Assembled,
    proof: BackendProof,
}

pub struct ProofSession<'b, B: ProofBackend, S> {
    backend: BackendGuard<'b, B>,
    scheme: CommitmentScheme,
    state: S,
}

impl<'b, B: ProofBackend> ProofSession<'b, B, CircuitLoaded> {
    pub fn load(
        backend: &'b mut B,
        scheme: CommitmentScheme,
        manifest_path: &Path,
    ) -> Result<Self> {
        let descriptor = CircuitDescriptor {
            scheme: scheme.kind(),
            manifest_path: manifest_path.to_path_buf(),
        };
        let backend = BackendGuard::load(backend, &descriptor)?;
        info!(scheme = %descriptor.scheme, "circuit loaded");
        Ok(Self {
            backend,
            scheme,
            state: CircuitLoaded,
        })
    }

    /// Extract the image's tags, check the query tag and commit.
    pub fn assemble_inputs<T: MetadataTool + ?Sized>(
        self,
        tool: &mut T,
        engine: &PoseidonEngine,
        image: &Path,
        options: ExtractOptions,
        query_label: Option<&str>,
    ) -> Result<ProofSession<'b, B, InputsAssembled>> {
        let extraction = extract(tool, engine, image, options)?;
        let padded = PaddedInputSet::from_extraction(&extraction);

        if let Some(query) = self.scheme.query_tag() {
            if !padded.contains(query) {
                return Err(Error::TagNotFound {
                    tag: query_label
                        .map(str::to_string)
                        .unwrap_or_else(|| query.to_string()),
                    id: query,
                });
            }
        }

        let commitment = self.scheme.commit(engine, &padded);
        let inputs = CircuitInputs::new(&self.scheme, &padded, commitment);
        debug!(count = padded.count, "circuit inputs assembled");

        Ok(ProofSession {
            backend: self.backend,
            scheme: self.scheme,
            state: InputsAssembled(Assembled {
                extraction,
                inputs,
                value_hash: options.value_hash,
            }),
        })
    }
}

impl<'b, B: ProofBackend> ProofSession<'b, B, InputsAssembled> {
    pub fn inputs(&self) -> &CircuitInputs {
        &self.state.0.inputs
    }

    pub fn compute_witness(mut self) -> Result<ProofSession<'b, B, WitnessComputed<B::Witness>>> {
        let witness = self
            .backend
            .execute(&self.state.0.inputs)
            .map_err(|err| Error::backend(Phase::WitnessComputation, err))?;
        debug!("witness computed");
        Ok(ProofSession {
            backend: self.backend,
            scheme: self.scheme,
            state: WitnessComputed {
                assembled: self.state.0,
                witness,
            },
        })
    }
}

impl<'b, B: ProofBackend> ProofSession<'b, B, WitnessComputed<B::Witness>> {
    pub fn prove(mut self) -> Result<ProofSession<'b, B, ProofGenerated>> {
        let WitnessComputed { assembled, witness } = self.state;
        let proof = self
            .backend
            .prove(witness)
            .map_err(|err| Error::backend(Phase::Proving, err))?;
        info!(proof_bytes = proof.proof.len(), "proof generated");
        Ok(ProofSession {
            backend: self.backend,
            scheme: self.scheme,
            state: ProofGenerated { assembled, proof },
        })
    }
}

impl<B: ProofBackend> ProofSession<'_, B, ProofGenerated> {
    /// Build the payload and, when `output` is set, write it atomically.
    pub fn serialize(self, image: &Path, output: Option<&Path>) -> Result<GeneratedProof> {
        let ProofGenerated { assembled, proof } = self.state;
        let Assembled {
            extraction,
            inputs,
            value_hash,
        } = assembled;

        let meta = PayloadMeta::new(
            image.display().to_string(),
            self.scheme.kind(),
            value_hash,
            extraction.truncated,
            extraction.committed_tag_names().to_vec(),
        );
        let payload = ProofPayload::new(&inputs.public, meta, &proof);
        payload
            .validate()
            .map_err(|err| Error::backend(Phase::PayloadSerialization, err.into()))?;

        if let Some(path) = output {
            payload
                .write_atomic(path)
                .map_err(|err| Error::backend(Phase::PayloadSerialization, err.into()))?;
            info!(path = %path.display(), "payload written");
        }

        Ok(GeneratedProof {
            payload,
            extraction,
            written_to: output.map(Path::to_path_buf),
        })
    }
}

/// Run every phase in order for one request.
pub fn generate_proof<B, T>(
    backend: &mut B,
    tool: &mut T,
    engine: &PoseidonEngine,
    request: &ProofRequest,
) -> Result<GeneratedProof>
where
    B: ProofBackend,
    T: MetadataTool + ?Sized,
{
    ProofSession::load(backend, request.scheme.clone(), &request.manifest_path)?
        .assemble_inputs(
            tool,
            engine,
            &request.image,
            request.options,
            request.query_label.as_deref(),
        )?
        .compute_witness()?
        .prove()?
        .serialize(&request.image, request.output.as_deref())
}
