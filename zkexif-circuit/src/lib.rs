// zkexif/zkexif-circuit/src/lib.rs

//! Halo2 circuit recomputing an image-metadata tag commitment.
//!
//! The circuit receives the padded tag arrays as private witness and the
//! commitment, the true tag count and (for membership proofs) the queried tag
//! identifier as public instances. It folds only the first `tag_count` slots,
//! exactly like the host-side accumulator in `zkexif-common`.

pub mod gadgets;

use halo2_base::{
    gates::{
        circuit::builder::BaseCircuitBuilder,
        circuit::{BaseCircuitParams, BaseConfig, CircuitBuilderStage},
        range::RangeChip,
        RangeInstructions,
    },
    AssignedValue, Context,
};
use halo2_proofs_axiom::{
    circuit::{Layouter, SimpleFloorPlanner},
    plonk::{Circuit, ConstraintSystem, Error},
};
use halo2curves_axiom::bn256::Fr;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

use crate::gadgets::{
    accumulator::{active_flags, pair_commitment, positional_commitment},
    membership::enforce_membership,
    poseidon::PoseidonChip,
};

/// Number of tag slots the circuit accepts.
pub const CAPACITY: usize = 32;
/// Radix of the identifier-only positional accumulator.
pub const COMMIT_BASE: u64 = 1 << 32;

pub const DEFAULT_K: usize = 17;
const DEFAULT_LOOKUP_BITS: usize = 16;
const DEFAULT_ADVICE_PER_PHASE: usize = 4;
const DEFAULT_FIXED_COLUMNS: usize = 1;
const DEFAULT_LOOKUP_ADVICE_PER_PHASE: usize = 1;

/// Which commitment the circuit recomputes. Each kind has its own keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemeKind {
    IdentifierOnly,
    IdentifierValuePair,
    SecretKeyedPair,
}

impl SchemeKind {
    pub const ALL: [SchemeKind; 3] = [
        SchemeKind::IdentifierOnly,
        SchemeKind::IdentifierValuePair,
        SchemeKind::SecretKeyedPair,
    ];

    /// Instance layout: `[commitment, tag_count]`, plus `query_tag_id` for
    /// membership proofs.
    pub fn num_instance_columns(self) -> usize {
        match self {
            SchemeKind::IdentifierOnly => 3,
            SchemeKind::IdentifierValuePair | SchemeKind::SecretKeyedPair => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SchemeKind::IdentifierOnly => "IDENTIFIER_ONLY",
            SchemeKind::IdentifierValuePair => "IDENTIFIER_VALUE_PAIR",
            SchemeKind::SecretKeyedPair => "SECRET_KEYED_PAIR",
        }
    }
}

impl std::fmt::Display for SchemeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn circuit_params(scheme: SchemeKind) -> BaseCircuitParams {
    BaseCircuitParams {
        k: DEFAULT_K,
        num_advice_per_phase: vec![DEFAULT_ADVICE_PER_PHASE],
        num_fixed: DEFAULT_FIXED_COLUMNS,
        num_lookup_advice_per_phase: vec![DEFAULT_LOOKUP_ADVICE_PER_PHASE],
        lookup_bits: Some(DEFAULT_LOOKUP_BITS),
        num_instance_columns: scheme.num_instance_columns(),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicInputs {
    pub commitment: Fr,
    pub tag_count: u32,
    /// Only present for `SchemeKind::IdentifierOnly`.
    pub query_tag_id: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct TagCommitmentInput {
    pub scheme: SchemeKind,
    /// Padded to `CAPACITY` with zeros.
    pub tag_ids: Vec<u32>,
    /// Padded to `CAPACITY` with zeros. Ignored by `IdentifierOnly`.
    pub tag_value_hashes: Vec<Fr>,
    /// Seed of the keyed variant; zero otherwise.
    pub secret: Fr,
    pub public: PublicInputs,
}

#[derive(Debug, ThisError)]
pub enum CircuitError {
    #[error("expected {expected} {what}, got {actual}")]
    Length {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("tag_count {0} exceeds capacity {CAPACITY}")]
    CountOutOfRange(u32),
    #[error("query_tag_id must be present exactly for IDENTIFIER_ONLY proofs")]
    QueryLayout,
}

impl TagCommitmentInput {
    pub fn validate(&self) -> Result<(), CircuitError> {
        if self.tag_ids.len() != CAPACITY {
            return Err(CircuitError::Length {
                what: "tag ids",
                expected: CAPACITY,
                actual: self.tag_ids.len(),
            });
        }
        if self.tag_value_hashes.len() != CAPACITY {
            return Err(CircuitError::Length {
                what: "tag value hashes",
                expected: CAPACITY,
                actual: self.tag_value_hashes.len(),
            });
        }
        if self.public.tag_count as usize > CAPACITY {
            return Err(CircuitError::CountOutOfRange(self.public.tag_count));
        }
        let wants_query = self.scheme == SchemeKind::IdentifierOnly;
        if wants_query != self.public.query_tag_id.is_some() {
            return Err(CircuitError::QueryLayout);
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct TagCommitmentCircuit {
    pub input: Option<TagCommitmentInput>,
    scheme: SchemeKind,
    params: BaseCircuitParams,
}

impl TagCommitmentCircuit {
    pub fn new(input: TagCommitmentInput) -> Self {
        let scheme = input.scheme;
        Self {
            input: Some(input),
            scheme,
            params: circuit_params(scheme),
        }
    }

    /// Witness-free circuit used for key generation.
    pub fn keygen(scheme: SchemeKind) -> Self {
        Self {
            input: None,
            scheme,
            params: circuit_params(scheme),
        }
    }

    pub fn scheme(&self) -> SchemeKind {
        self.scheme
    }
}

pub fn public_instances(scheme: SchemeKind, public: &PublicInputs) -> Vec<Vec<Fr>> {
    let mut columns = vec![
        vec![public.commitment],
        vec![Fr::from(public.tag_count as u64)],
    ];
    if scheme == SchemeKind::IdentifierOnly {
        columns.push(vec![Fr::from(public.query_tag_id.unwrap_or(0) as u64)]);
    }
    columns
}

impl Circuit<Fr> for TagCommitmentCircuit {
    type Config = BaseConfig<Fr>;
    type FloorPlanner = SimpleFloorPlanner;
    type Params = BaseCircuitParams;

    fn params(&self) -> Self::Params {
        self.params.clone()
    }

    fn without_witnesses(&self) -> Self {
        Self::keygen(self.scheme)
    }

    fn configure_with_params(
        meta: &mut ConstraintSystem<Fr>,
        params: Self::Params,
    ) -> Self::Config {
        BaseConfig::configure(meta, params)
    }

    fn configure(_: &mut ConstraintSystem<Fr>) -> Self::Config {
        unreachable!("TagCommitmentCircuit must be configured with explicit parameters")
    }

    fn synthesize(&self, config: Self::Config, layouter: impl Layouter<Fr>) -> Result<(), Error> {
        let stage = if self.input.is_some() {
            CircuitBuilderStage::Mock
        } else {
            CircuitBuilderStage::Keygen
        };

        let input = match self.input.as_ref() {
            Some(input) => input,
            None => sample_input(self.scheme),
        };
        input.validate().map_err(|_| Error::Synthesis)?;

        let mut builder = BaseCircuitBuilder::<Fr>::from_stage(stage)
            .use_params(self.params.clone())
            .use_instance_columns(self.params.num_instance_columns);

        if let Some(bits) = self.params.lookup_bits {
            builder = builder.use_lookup_bits(bits);
        }

        build_constraints(&mut builder, input);
        <BaseCircuitBuilder<Fr> as Circuit<Fr>>::synthesize(&builder, config, layouter)
    }
}

static SAMPLE_INPUTS: Lazy<[TagCommitmentInput; 3]> =
    Lazy::new(|| SchemeKind::ALL.map(build_sample_input));

fn sample_input(scheme: SchemeKind) -> &'static TagCommitmentInput {
    let idx = SchemeKind::ALL
        .iter()
        .position(|kind| *kind == scheme)
        .unwrap_or_default();
    &SAMPLE_INPUTS[idx]
}

// Layout is data independent, so any well-formed input serves for keygen.
fn build_sample_input(scheme: SchemeKind) -> TagCommitmentInput {
    TagCommitmentInput {
        scheme,
        tag_ids: vec![0; CAPACITY],
        tag_value_hashes: vec![Fr::zero(); CAPACITY],
        secret: Fr::zero(),
        public: PublicInputs {
            commitment: Fr::zero(),
            tag_count: 1,
            query_tag_id: (scheme == SchemeKind::IdentifierOnly).then_some(0),
        },
    }
}

fn build_constraints(builder: &mut BaseCircuitBuilder<Fr>, input: &TagCommitmentInput) {
    let range = builder.range_chip();
    let gate = range.gate();
    let public = &input.public;

    let ctx = builder.main(0);

    let tag_ids: Vec<_> = input
        .tag_ids
        .iter()
        .map(|id| assign_u32(ctx, &range, *id))
        .collect();
    let tag_count = assign_u32(ctx, &range, public.tag_count);
    let flags = active_flags(ctx, gate, &range, tag_count, CAPACITY);

    let mut exposed = Vec::with_capacity(input.scheme.num_instance_columns());
    match input.scheme {
        SchemeKind::IdentifierOnly => {
            let query = assign_u32(ctx, &range, public.query_tag_id.unwrap_or(0));
            enforce_membership(ctx, gate, &tag_ids, &flags, query);
            let commitment = positional_commitment(ctx, gate, &tag_ids, &flags, COMMIT_BASE);
            exposed.extend([commitment, tag_count, query]);
        }
        SchemeKind::IdentifierValuePair | SchemeKind::SecretKeyedPair => {
            let value_hashes: Vec<_> = input
                .tag_value_hashes
                .iter()
                .map(|hash| ctx.load_witness(*hash))
                .collect();
            let poseidon = PoseidonChip::new(ctx, gate);
            let seed = if input.scheme == SchemeKind::SecretKeyedPair {
                let secret = ctx.load_witness(input.secret);
                poseidon.hash1(ctx, gate, secret)
            } else {
                ctx.load_constant(Fr::zero())
            };
            let commitment =
                pair_commitment(ctx, gate, &poseidon, seed, &tag_ids, &value_hashes, &flags);
            exposed.extend([commitment, tag_count]);
        }
    }

    for (idx, value) in exposed.into_iter().enumerate() {
        builder.assigned_instances[idx].push(value);
    }
}

fn assign_u32(ctx: &mut Context<Fr>, range: &RangeChip<Fr>, value: u32) -> AssignedValue<Fr> {
    let cell = ctx.load_witness(Fr::from(value as u64));
    range.range_check(ctx, cell, 32);
    cell
}
