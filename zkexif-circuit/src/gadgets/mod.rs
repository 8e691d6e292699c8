// zkexif/zkexif-circuit/src/gadgets/mod.rs

pub mod accumulator;
pub mod membership;
pub mod poseidon;
