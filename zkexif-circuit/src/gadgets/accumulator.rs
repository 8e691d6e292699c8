// zkexif/zkexif-circuit/src/gadgets/accumulator.rs

use halo2_base::{
    gates::{
        flex_gate::{GateChip, GateInstructions},
        range::{RangeChip, RangeInstructions},
    },
    AssignedValue, Context,
    QuantumCell::Constant,
};
use halo2curves_axiom::bn256::Fr;

use crate::gadgets::poseidon::PoseidonChip;

/// Per-slot activity flags: `flags[i] == 1` iff `i < count`.
///
/// Also enforces `count <= capacity`. Every accumulation below is masked by
/// these flags, so slots at or beyond `count` never reach the commitment.
pub fn active_flags(
    ctx: &mut Context<Fr>,
    gate: &GateChip<Fr>,
    range: &RangeChip<Fr>,
    count: AssignedValue<Fr>,
    capacity: usize,
) -> Vec<AssignedValue<Fr>> {
    let bound = Constant(Fr::from(capacity as u64 + 1));
    let within = range.is_less_than(ctx, count, bound, 32);
    gate.assert_is_const(ctx, &within, &Fr::one());

    let mut active = ctx.load_constant(Fr::one());
    let mut flags = Vec::with_capacity(capacity);
    for slot in 0..capacity {
        let at_end = gate.is_equal(ctx, count, Constant(Fr::from(slot as u64)));
        let before_end = gate.sub(ctx, Constant(Fr::one()), at_end);
        active = gate.mul(ctx, active, before_end);
        flags.push(active);
    }
    flags
}

/// Horner accumulation `acc = acc * base + id` over the active prefix.
pub fn positional_commitment(
    ctx: &mut Context<Fr>,
    gate: &GateChip<Fr>,
    tag_ids: &[AssignedValue<Fr>],
    flags: &[AssignedValue<Fr>],
    base: u64,
) -> AssignedValue<Fr> {
    let mut acc = ctx.load_constant(Fr::zero());
    for (id, active) in tag_ids.iter().zip(flags.iter()) {
        let next = gate.mul_add(ctx, acc, Constant(Fr::from(base)), *id);
        acc = gate.select(ctx, next, acc, *active);
    }
    acc
}

/// Sequential `acc = H(H(acc, id), value_hash)` over the active prefix, starting
/// from `seed`.
pub fn pair_commitment(
    ctx: &mut Context<Fr>,
    gate: &GateChip<Fr>,
    poseidon: &PoseidonChip,
    seed: AssignedValue<Fr>,
    tag_ids: &[AssignedValue<Fr>],
    value_hashes: &[AssignedValue<Fr>],
    flags: &[AssignedValue<Fr>],
) -> AssignedValue<Fr> {
    let mut acc = seed;
    for ((id, value_hash), active) in tag_ids.iter().zip(value_hashes.iter()).zip(flags.iter()) {
        let with_id = poseidon.hash2(ctx, gate, acc, *id);
        let next = poseidon.hash2(ctx, gate, with_id, *value_hash);
        acc = gate.select(ctx, next, acc, *active);
    }
    acc
}
