//! Carries a proof payload inside the image it describes.

use std::{collections::BTreeMap, path::Path};

use serde_json::Value;
use tracing::{debug, info};
use zkexif_common::{Error, ProofPayload, Result};

pub use zkexif_common::{is_binder_field, matches_field, BINDER_FIELDS as CANDIDATE_FIELDS};

use crate::tool::{MetadataTool, ReadOptions, TagMap, WriteOptions};

/// Copy `image` to `output` and store the compact payload JSON in `field`.
///
/// `field` must be one of [`CANDIDATE_FIELDS`], otherwise [`retrieve`] could
/// never find the payload again.
pub fn embed<T: MetadataTool + ?Sized>(
    tool: &mut T,
    image: &Path,
    payload: &ProofPayload,
    field: &str,
    output: &Path,
) -> Result<()> {
    if !is_binder_field(field) {
        return Err(Error::Config(format!(
            "cannot embed into '{field}': expected one of {}",
            CANDIDATE_FIELDS.join(", ")
        )));
    }
    let json = payload.to_json()?;
    tool.copy(image, output)?;

    let mut tags = BTreeMap::new();
    tags.insert(field.to_string(), Some(json));
    tool.write(output, &tags, &WriteOptions::default())?;

    info!(
        output = %output.display(),
        field,
        "embedded proof payload"
    );
    Ok(())
}

/// Return the first candidate field, in priority order, that holds a valid
/// payload.
///
/// Fields holding unrelated text (camera makers fill `ImageDescription`
/// routinely) are skipped.
pub fn retrieve<T: MetadataTool + ?Sized>(tool: &mut T, image: &Path) -> Result<ProofPayload> {
    let tags = tool.read(image, &ReadOptions::default())?;
    let mut last_error = None;
    for (field, text) in embedded_candidates(&tags) {
        match ProofPayload::from_json(text) {
            Ok(payload) => {
                debug!(field, "found embedded payload");
                return Ok(payload);
            }
            Err(err) => {
                debug!(field, %err, "skipping field without a payload");
                last_error = Some((field, err));
            }
        }
    }
    Err(match last_error {
        Some((field, err)) => Error::malformed(format!(
            "no valid proof payload in {} (last tried {field}: {err})",
            image.display()
        )),
        None => Error::malformed(format!(
            "no embedded proof data found in {}",
            image.display()
        )),
    })
}

/// Non-empty string values of the candidate fields, in priority order.
fn embedded_candidates(tags: &TagMap) -> Vec<(&str, &str)> {
    CANDIDATE_FIELDS
        .iter()
        .flat_map(|candidate| {
            tags.iter().filter_map(move |(key, value)| match value {
                Value::String(text) if matches_field(key, candidate) && !text.trim().is_empty() => {
                    Some((key.as_str(), text.as_str()))
                }
                _ => None,
            })
        })
        .collect()
}
