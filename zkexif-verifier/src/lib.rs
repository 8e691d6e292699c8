// zkexif/zkexif-verifier/src/lib.rs

pub mod backend;
pub mod verification;

use halo2_proofs_axiom::{
    plonk::{verify_proof, VerifyingKey},
    poly::kzg::{
        commitment::{KZGCommitmentScheme, ParamsKZG},
        multiopen::VerifierGWC,
        strategy::SingleStrategy,
    },
    transcript::{Blake2bRead, Challenge255, TranscriptReadBuffer},
};
use halo2curves_axiom::bn256::{Bn256, Fr, G1Affine};

pub use backend::Halo2Verifier;
pub use verification::{
    scheme_for_payload, verify_image, PayloadSource, VerificationOutcome, VerificationReport,
    VerifyRequest,
};

pub fn verify(
    params: &ParamsKZG<Bn256>,
    vk: &VerifyingKey<G1Affine>,
    proof_bytes: &[u8],
    instances: &[Vec<Fr>],
) -> bool {
    let mut transcript = Blake2bRead::<_, G1Affine, Challenge255<_>>::init(proof_bytes);

    let instance_columns: Vec<&[Fr]> = instances.iter().map(|col| col.as_slice()).collect();
    let prepared_instances = vec![instance_columns.as_slice()];

    verify_proof::<KZGCommitmentScheme<Bn256>, VerifierGWC<'_, Bn256>, _, _, _>(
        params,
        vk,
        SingleStrategy::new(params),
        &prepared_instances,
        &mut transcript,
    )
    .is_ok()
}

/// Every public input sits alone in its own instance column.
pub fn instance_columns(public_inputs: &[Fr]) -> Vec<Vec<Fr>> {
    public_inputs.iter().map(|value| vec![*value]).collect()
}
