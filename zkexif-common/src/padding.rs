//! Fixed-capacity input layout shared with the circuit.

use halo2curves_axiom::{bn256::Fr, ff::Field};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    canonical::TagValue,
    error::{Error, Result},
    CAPACITY,
};

/// What to do when an image carries more than `CAPACITY` tags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TruncationPolicy {
    /// Commit to the first `CAPACITY` tags in name order and flag the result.
    #[default]
    Truncate,
    Reject,
}

impl std::str::FromStr for TruncationPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "truncate" => Ok(TruncationPolicy::Truncate),
            "reject" => Ok(TruncationPolicy::Reject),
            other => Err(format!("unknown truncation policy '{other}'")),
        }
    }
}

/// One extracted metadata entry.
#[derive(Clone, Debug, PartialEq)]
pub struct TagRecord {
    pub name: String,
    pub raw_value: TagValue,
    pub identifier: u32,
    pub value_hash: Fr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExtractionResult {
    /// Every surviving tag name, sorted by byte order.
    pub ordered_tag_names: Vec<String>,
    pub identifiers: Vec<u32>,
    pub value_hashes: Vec<Fr>,
    /// `min(identifiers.len(), CAPACITY)`
    pub count: usize,
    pub truncated: bool,
}

impl ExtractionResult {
    /// Build from records already sorted by name.
    pub fn from_records(records: Vec<TagRecord>, policy: TruncationPolicy) -> Result<Self> {
        let found = records.len();
        let truncated = found > CAPACITY;
        if truncated {
            match policy {
                TruncationPolicy::Reject => {
                    return Err(Error::CapacityExceeded {
                        found,
                        capacity: CAPACITY,
                    })
                }
                TruncationPolicy::Truncate => {
                    warn!(found, capacity = CAPACITY, "tag set truncated to capacity");
                }
            }
        }

        let mut ordered_tag_names = Vec::with_capacity(found);
        let mut identifiers = Vec::with_capacity(found);
        let mut value_hashes = Vec::with_capacity(found);
        for record in records {
            ordered_tag_names.push(record.name);
            identifiers.push(record.identifier);
            value_hashes.push(record.value_hash);
        }

        Ok(Self {
            ordered_tag_names,
            identifiers,
            value_hashes,
            count: found.min(CAPACITY),
            truncated,
        })
    }

    /// Names of the tags that actually reach the commitment.
    pub fn committed_tag_names(&self) -> &[String] {
        &self.ordered_tag_names[..self.count]
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Truncate or right-fill `seq` with `sentinel` to exactly `capacity` entries.
pub fn pad<T: Clone>(seq: &[T], capacity: usize, sentinel: T) -> Vec<T> {
    let mut out: Vec<T> = seq.iter().take(capacity).cloned().collect();
    out.resize(capacity, sentinel);
    out
}

/// Circuit-shaped inputs: both arrays hold `CAPACITY` entries, zero past `count`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaddedInputSet {
    pub identifiers: [u32; CAPACITY],
    pub value_hashes: [Fr; CAPACITY],
    pub count: usize,
}

impl PaddedInputSet {
    pub fn new(identifiers: &[u32], value_hashes: &[Fr]) -> Self {
        let ids = pad(identifiers, CAPACITY, 0);
        let hashes = pad(value_hashes, CAPACITY, Fr::ZERO);
        Self {
            identifiers: std::array::from_fn(|i| ids[i]),
            value_hashes: std::array::from_fn(|i| hashes[i]),
            count: identifiers.len().min(CAPACITY),
        }
    }

    pub fn from_extraction(extraction: &ExtractionResult) -> Self {
        Self::new(&extraction.identifiers, &extraction.value_hashes)
    }

    pub fn active_identifiers(&self) -> &[u32] {
        &self.identifiers[..self.count]
    }

    pub fn active_value_hashes(&self) -> &[Fr] {
        &self.value_hashes[..self.count]
    }

    pub fn contains(&self, identifier: u32) -> bool {
        self.active_identifiers().contains(&identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(name: &str, id: u32) -> TagRecord {
        TagRecord {
            name: name.to_string(),
            raw_value: TagValue::Null,
            identifier: id,
            value_hash: Fr::from(id as u64 + 1),
        }
    }

    #[test]
    fn pad_fills_and_truncates() {
        assert_eq!(pad(&[1, 2], 4, 0), vec![1, 2, 0, 0]);
        assert_eq!(pad(&[1, 2, 3], 2, 0), vec![1, 2]);
        assert_eq!(pad::<u32>(&[], 3, 9), vec![9, 9, 9]);
    }

    #[test]
    fn oversized_extraction_is_flagged() {
        let records: Vec<_> = (0..40).map(|i| record(&format!("T{i:02}"), i)).collect();
        let extraction = ExtractionResult::from_records(records, TruncationPolicy::Truncate).unwrap();
        assert!(extraction.truncated);
        assert_eq!(extraction.count, CAPACITY);
        assert_eq!(extraction.identifiers.len(), 40);
        assert_eq!(extraction.committed_tag_names().len(), CAPACITY);

        let padded = PaddedInputSet::from_extraction(&extraction);
        assert_eq!(padded.count, CAPACITY);
        assert_eq!(padded.identifiers[31], 31);
    }

    #[test]
    fn reject_policy_refuses_oversized_sets() {
        let records: Vec<_> = (0..33).map(|i| record(&format!("T{i:02}"), i)).collect();
        let err = ExtractionResult::from_records(records, TruncationPolicy::Reject).unwrap_err();
        assert!(matches!(
            err,
            Error::CapacityExceeded {
                found: 33,
                capacity: CAPACITY
            }
        ));
    }

    #[test]
    fn exact_capacity_is_not_truncated() {
        let records: Vec<_> = (0..32).map(|i| record(&format!("T{i:02}"), i)).collect();
        let extraction = ExtractionResult::from_records(records, TruncationPolicy::Reject).unwrap();
        assert!(!extraction.truncated);
        assert_eq!(extraction.count, 32);
    }

    #[test]
    fn membership_only_sees_active_slots() {
        let padded = PaddedInputSet::new(&[7, 8], &[Fr::ONE, Fr::ONE]);
        assert!(padded.contains(8));
        assert!(!padded.contains(0));
    }

    proptest! {
        #[test]
        fn padded_layout_invariants(ids in proptest::collection::vec(1u32.., 0..48)) {
            let hashes: Vec<Fr> = ids.iter().map(|id| Fr::from(*id as u64)).collect();
            let padded = PaddedInputSet::new(&ids, &hashes);
            let count = ids.len().min(CAPACITY);
            prop_assert_eq!(padded.count, count);
            prop_assert_eq!(padded.active_identifiers(), &ids[..count]);
            prop_assert!(padded.identifiers[count..].iter().all(|id| *id == 0));
            prop_assert!(padded.value_hashes[count..].iter().all(|h| *h == Fr::ZERO));
        }
    }
}
