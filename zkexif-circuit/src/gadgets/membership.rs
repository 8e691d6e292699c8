// zkexif/zkexif-circuit/src/gadgets/membership.rs

use halo2_base::{
    gates::flex_gate::{GateChip, GateInstructions},
    AssignedValue, Context,
    QuantumCell::Constant,
};
use halo2curves_axiom::bn256::Fr;

/// Enforce that `query` equals at least one active tag identifier.
pub fn enforce_membership(
    ctx: &mut Context<Fr>,
    gate: &GateChip<Fr>,
    tag_ids: &[AssignedValue<Fr>],
    flags: &[AssignedValue<Fr>],
    query: AssignedValue<Fr>,
) {
    let mut miss = ctx.load_constant(Fr::one());
    for (id, active) in tag_ids.iter().zip(flags.iter()) {
        let eq = gate.is_equal(ctx, *id, query);
        let hit = gate.mul(ctx, eq, *active);
        let not_hit = gate.sub(ctx, Constant(Fr::one()), hit);
        miss = gate.mul(ctx, miss, not_hit);
    }
    gate.assert_is_const(ctx, &miss, &Fr::zero());
}
