//! Host-side Poseidon and the field hashes built on it.
//!
//! The permutation below runs halo2-base's `OptimizedPoseidonSpec` with the
//! same parameters as `zkexif_circuit::gadgets::poseidon`, so `H(a, b)` here is
//! bit-identical to the in-circuit `hash_fix_len_array(&[a, b])`.

use halo2_base::poseidon::hasher::spec::OptimizedPoseidonSpec;
use halo2curves_axiom::{
    bn256::Fr,
    ff::{Field, PrimeField},
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use zkexif_circuit::gadgets::poseidon::{poseidon_spec, POSEIDON_RATE, POSEIDON_T};

use crate::{canonical::canonical_bytes, canonical::TagValue, reduce_be_bytes_to_fr};

type Spec = OptimizedPoseidonSpec<Fr, POSEIDON_T, POSEIDON_RATE>;

static SHARED_ENGINE: Lazy<PoseidonEngine> = Lazy::new(PoseidonEngine::new);

/// Round constants and MDS matrices for native Poseidon.
pub struct PoseidonEngine {
    spec: Spec,
}

impl Default for PoseidonEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PoseidonEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoseidonEngine")
            .field("t", &POSEIDON_T)
            .field("rate", &POSEIDON_RATE)
            .finish()
    }
}

impl PoseidonEngine {
    pub fn new() -> Self {
        Self {
            spec: poseidon_spec(),
        }
    }

    /// Process-wide instance, built on first use.
    pub fn shared() -> &'static PoseidonEngine {
        &SHARED_ENGINE
    }

    /// Variable-arity sponge hash, matching the circuit's fixed-length hasher.
    pub fn hash(&self, inputs: &[Fr]) -> Fr {
        let mut state = [Fr::ZERO; POSEIDON_T];
        state[0] = Fr::from_u128(1u128 << 64);

        for chunk in inputs.chunks(POSEIDON_RATE) {
            permute(&mut state, chunk, &self.spec);
        }
        if inputs.len() % POSEIDON_RATE == 0 {
            permute(&mut state, &[], &self.spec);
        }

        state[1]
    }

    /// `H(a, b)`
    pub fn hash2(&self, a: Fr, b: Fr) -> Fr {
        self.hash(&[a, b])
    }

    /// `H1(a) = H(a, 0)`
    pub fn hash1(&self, a: Fr) -> Fr {
        self.hash2(a, Fr::ZERO)
    }

    /// Byte-serial fold: `acc = H(acc, byte)` for every byte, from zero.
    pub fn hash_bytes(&self, bytes: &[u8]) -> Fr {
        bytes
            .iter()
            .fold(Fr::ZERO, |acc, byte| self.hash2(acc, Fr::from(*byte as u64)))
    }
}

/// BLAKE3 digest of `bytes`, read big-endian and reduced into the field.
pub fn digest_to_field(bytes: &[u8]) -> Fr {
    let digest = blake3::hash(bytes);
    reduce_be_bytes_to_fr(digest.as_bytes())
}

/// How a tag's canonical bytes are mapped to a field element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueHashMode {
    #[default]
    PoseidonFold,
    Blake3Reduced,
}

impl ValueHashMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueHashMode::PoseidonFold => "POSEIDON_FOLD",
            ValueHashMode::Blake3Reduced => "BLAKE3_REDUCED",
        }
    }

    pub fn hash_bytes(self, engine: &PoseidonEngine, bytes: &[u8]) -> Fr {
        match self {
            ValueHashMode::PoseidonFold => engine.hash_bytes(bytes),
            ValueHashMode::Blake3Reduced => digest_to_field(bytes),
        }
    }
}

impl std::str::FromStr for ValueHashMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "poseidon" | "poseidon_fold" => Ok(ValueHashMode::PoseidonFold),
            "blake3" | "blake3_reduced" => Ok(ValueHashMode::Blake3Reduced),
            other => Err(format!("unknown value hash mode '{other}'")),
        }
    }
}

/// Field hash of a tag value's canonical encoding.
pub fn value_hash(engine: &PoseidonEngine, mode: ValueHashMode, value: &TagValue) -> Fr {
    mode.hash_bytes(engine, &canonical_bytes(value))
}

fn permute(state: &mut [Fr; POSEIDON_T], inputs: &[Fr], spec: &Spec) {
    let half_full = spec.r_f() / 2;
    let constants = spec.constants();
    let matrices = spec.mds_matrices();
    let start = constants.start();

    absorb(state, inputs, &start[0]);

    for coeffs in start.iter().skip(1).take(half_full - 1) {
        sbox_full(state, coeffs);
        apply_mds(state, matrices.mds().as_ref());
    }
    if let Some(last) = start.last() {
        sbox_full(state, last);
    }
    apply_mds(state, matrices.pre_sparse_mds().as_ref());

    for (constant, sparse) in constants
        .partial()
        .iter()
        .zip(matrices.sparse_matrices().iter())
    {
        state[0] = state[0].pow_vartime([5]) + constant;
        apply_sparse_mds(state, sparse.row(), sparse.col_hat());
    }

    for coeffs in constants.end().iter() {
        sbox_full(state, coeffs);
        apply_mds(state, matrices.mds().as_ref());
    }
    sbox_full(state, &[Fr::ZERO; POSEIDON_T]);
    apply_mds(state, matrices.mds().as_ref());
}

// Adds the chunk plus the first round constants, with the 10* padding marker
// on the first unused rate slot.
fn absorb(state: &mut [Fr; POSEIDON_T], inputs: &[Fr], pre_constants: &[Fr; POSEIDON_T]) {
    debug_assert!(inputs.len() < POSEIDON_T);

    state[0] += pre_constants[0];
    for (idx, input) in inputs.iter().enumerate() {
        state[idx + 1] += *input + pre_constants[idx + 1];
    }

    let offset = inputs.len() + 1;
    for idx in offset..POSEIDON_T {
        state[idx] += pre_constants[idx];
        if idx == offset {
            state[idx] += Fr::ONE;
        }
    }
}

fn sbox_full(state: &mut [Fr; POSEIDON_T], constants: &[Fr; POSEIDON_T]) {
    for (value, constant) in state.iter_mut().zip(constants.iter()) {
        *value = value.pow_vartime([5]) + constant;
    }
}

fn apply_mds(state: &mut [Fr; POSEIDON_T], matrix: &[[Fr; POSEIDON_T]; POSEIDON_T]) {
    let current = *state;
    for (slot, row) in state.iter_mut().zip(matrix.iter()) {
        *slot = row
            .iter()
            .zip(current.iter())
            .fold(Fr::ZERO, |acc, (coeff, value)| acc + *coeff * *value);
    }
}

fn apply_sparse_mds(
    state: &mut [Fr; POSEIDON_T],
    row: &[Fr; POSEIDON_T],
    col_hat: &[Fr; POSEIDON_RATE],
) {
    let current = *state;
    state[0] = row
        .iter()
        .zip(current.iter())
        .fold(Fr::ZERO, |acc, (coeff, value)| acc + *coeff * *value);
    for (i, coeff) in col_hat.iter().enumerate() {
        state[i + 1] = current[0] * *coeff + current[i + 1];
    }
}
