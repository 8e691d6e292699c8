// zkexif/zkexif-circuit/src/gadgets/poseidon.rs

use halo2_base::{
    gates::flex_gate::GateChip,
    poseidon::hasher::{spec::OptimizedPoseidonSpec, PoseidonHasher},
    AssignedValue, Context,
};
use halo2curves_axiom::bn256::Fr;

pub const POSEIDON_T: usize = 6;
pub const POSEIDON_RATE: usize = 5;
pub const POSEIDON_FULL_ROUNDS: usize = 8;
pub const POSEIDON_PARTIAL_ROUNDS: usize = 57;

/// In-circuit two-to-one Poseidon, `H(a, b)`.
///
/// Round constants are loaded once per context and shared by every call, so a
/// single chip should be reused across the whole accumulation loop.
pub struct PoseidonChip {
    hasher: PoseidonHasher<Fr, POSEIDON_T, POSEIDON_RATE>,
    zero: AssignedValue<Fr>,
}

impl PoseidonChip {
    pub fn new(ctx: &mut Context<Fr>, gate: &GateChip<Fr>) -> Self {
        let mut hasher = PoseidonHasher::<Fr, POSEIDON_T, POSEIDON_RATE>::new(poseidon_spec());
        hasher.initialize_consts(ctx, gate);
        let zero = ctx.load_constant(Fr::zero());
        Self { hasher, zero }
    }

    pub fn hash2(
        &self,
        ctx: &mut Context<Fr>,
        gate: &GateChip<Fr>,
        a: AssignedValue<Fr>,
        b: AssignedValue<Fr>,
    ) -> AssignedValue<Fr> {
        self.hasher.hash_fix_len_array(ctx, gate, &[a, b])
    }

    /// `H1(a) = H(a, 0)`.
    pub fn hash1(
        &self,
        ctx: &mut Context<Fr>,
        gate: &GateChip<Fr>,
        a: AssignedValue<Fr>,
    ) -> AssignedValue<Fr> {
        self.hash2(ctx, gate, a, self.zero)
    }
}

pub fn poseidon_spec() -> OptimizedPoseidonSpec<Fr, POSEIDON_T, POSEIDON_RATE> {
    OptimizedPoseidonSpec::new::<POSEIDON_FULL_ROUNDS, POSEIDON_PARTIAL_ROUNDS, 0>()
}
