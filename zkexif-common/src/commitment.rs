//! The three commitment variants over a padded tag set.
//!
//! Every fold stops at `count`; padding slots never contribute.

use halo2curves_axiom::{bn256::Fr, ff::Field};
use zkexif_circuit::{SchemeKind, COMMIT_BASE};

use crate::{hasher::PoseidonEngine, padding::PaddedInputSet};

/// Commitment variant together with its private parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitmentScheme {
    /// Positional fold of identifiers; proofs also reveal `query_tag`'s membership.
    IdentifierOnly { query_tag: u32 },
    IdentifierValuePair,
    /// Pair fold seeded with `H1(secret)`.
    SecretKeyedPair { secret: Fr },
}

impl CommitmentScheme {
    pub fn kind(&self) -> SchemeKind {
        match self {
            CommitmentScheme::IdentifierOnly { .. } => SchemeKind::IdentifierOnly,
            CommitmentScheme::IdentifierValuePair => SchemeKind::IdentifierValuePair,
            CommitmentScheme::SecretKeyedPair { .. } => SchemeKind::SecretKeyedPair,
        }
    }

    pub fn query_tag(&self) -> Option<u32> {
        match self {
            CommitmentScheme::IdentifierOnly { query_tag } => Some(*query_tag),
            _ => None,
        }
    }

    /// Zero unless the scheme is keyed.
    pub fn secret(&self) -> Fr {
        match self {
            CommitmentScheme::SecretKeyedPair { secret } => *secret,
            _ => Fr::ZERO,
        }
    }

    pub fn commit(&self, engine: &PoseidonEngine, inputs: &PaddedInputSet) -> Fr {
        match self {
            CommitmentScheme::IdentifierOnly { .. } => {
                commit_identifiers(inputs.active_identifiers())
            }
            CommitmentScheme::IdentifierValuePair => commit_pairs(
                engine,
                Fr::ZERO,
                inputs.active_identifiers(),
                inputs.active_value_hashes(),
            ),
            CommitmentScheme::SecretKeyedPair { secret } => commit_pairs(
                engine,
                engine.hash1(*secret),
                inputs.active_identifiers(),
                inputs.active_value_hashes(),
            ),
        }
    }
}

/// `acc = acc * BASE + id` over `identifiers`, from zero.
pub fn commit_identifiers(identifiers: &[u32]) -> Fr {
    let base = Fr::from(COMMIT_BASE);
    identifiers
        .iter()
        .fold(Fr::ZERO, |acc, id| acc * base + Fr::from(*id as u64))
}

/// `acc = H(H(acc, id), value_hash)` pairwise, from `seed`.
pub fn commit_pairs(
    engine: &PoseidonEngine,
    seed: Fr,
    identifiers: &[u32],
    value_hashes: &[Fr],
) -> Fr {
    identifiers
        .iter()
        .zip(value_hashes.iter())
        .fold(seed, |acc, (id, value_hash)| {
            let with_id = engine.hash2(acc, Fr::from(*id as u64));
            engine.hash2(with_id, *value_hash)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag_id::tag_identifier;

    fn two_tags() -> PaddedInputSet {
        PaddedInputSet::new(&[11, 22], &[Fr::from(5), Fr::from(6)])
    }

    #[test]
    fn identifier_fold_is_horner() {
        let expected = Fr::from(11u64) * Fr::from(COMMIT_BASE) + Fr::from(22u64);
        let scheme = CommitmentScheme::IdentifierOnly { query_tag: 11 };
        assert_eq!(scheme.commit(PoseidonEngine::shared(), &two_tags()), expected);
    }

    #[test]
    fn identifier_fold_is_order_sensitive() {
        assert_ne!(commit_identifiers(&[1, 2]), commit_identifiers(&[2, 1]));
    }

    #[test]
    fn empty_set_commits_to_seed() {
        let engine = PoseidonEngine::shared();
        let empty = PaddedInputSet::new(&[], &[]);
        assert_eq!(
            CommitmentScheme::IdentifierValuePair.commit(engine, &empty),
            Fr::ZERO
        );
        let keyed = CommitmentScheme::SecretKeyedPair {
            secret: Fr::from(42),
        };
        assert_eq!(keyed.commit(engine, &empty), engine.hash1(Fr::from(42)));
    }

    #[test]
    fn pair_fold_matches_manual_chain() {
        let engine = PoseidonEngine::shared();
        let step1 = engine.hash2(engine.hash2(Fr::ZERO, Fr::from(11)), Fr::from(5));
        let step2 = engine.hash2(engine.hash2(step1, Fr::from(22)), Fr::from(6));
        assert_eq!(
            CommitmentScheme::IdentifierValuePair.commit(engine, &two_tags()),
            step2
        );
    }

    #[test]
    fn variants_do_not_collide() {
        let engine = PoseidonEngine::shared();
        let inputs = two_tags();
        let plain = CommitmentScheme::IdentifierValuePair.commit(engine, &inputs);
        let keyed = CommitmentScheme::SecretKeyedPair { secret: Fr::ONE }.commit(engine, &inputs);
        let other_key =
            CommitmentScheme::SecretKeyedPair { secret: Fr::from(2) }.commit(engine, &inputs);
        assert_ne!(plain, keyed);
        assert_ne!(keyed, other_key);
    }

    #[test]
    fn value_change_moves_pair_commitment() {
        let engine = PoseidonEngine::shared();
        let changed = PaddedInputSet::new(&[11, 22], &[Fr::from(5), Fr::from(7)]);
        assert_ne!(
            CommitmentScheme::IdentifierValuePair.commit(engine, &two_tags()),
            CommitmentScheme::IdentifierValuePair.commit(engine, &changed)
        );
    }

    #[test]
    fn kind_drops_private_parameters() {
        let keyed = CommitmentScheme::SecretKeyedPair { secret: Fr::ONE };
        assert_eq!(keyed.kind(), SchemeKind::SecretKeyedPair);
        assert_eq!(keyed.query_tag(), None);
        assert_eq!(
            CommitmentScheme::IdentifierOnly { query_tag: 3 }.query_tag(),
            Some(3)
        );
    }

    #[test]
    fn commitments_match_reference_vectors() {
        let engine = PoseidonEngine::shared();
        assert_eq!(commit_identifiers(&[1, 2]), Fr::from(4_294_967_298u64));
        assert_eq!(
            CommitmentScheme::IdentifierValuePair.commit(engine, &two_tags()),
            fr("6546538640957371297912091837395277495819844021170626004567649467918715949449")
        );

        let make = tag_identifier("EXIF:Make");
        let model = tag_identifier("EXIF:Model");
        assert_eq!((make, model), (2_756_110_333, 605_143_852));
        assert_eq!(commit_identifiers(&[make, model]), Fr::from(11_837_403_745_007_813_420u64));

        let camera = PaddedInputSet::new(
            &[make, model],
            &[engine.hash_bytes(b"\"Acme\""), engine.hash_bytes(b"\"X100\"")],
        );
        assert_eq!(
            CommitmentScheme::IdentifierValuePair.commit(engine, &camera),
            fr("20911325509199408424143071111533046757284039816529297906063822310020838971435")
        );
    }

    fn fr(decimal: &str) -> Fr {
        crate::fr_from_decimal(decimal).unwrap()
    }
}
