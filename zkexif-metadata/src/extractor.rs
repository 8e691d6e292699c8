//! Image to [`ExtractionResult`]: read, filter, sort, identify and hash.

use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, info};
use zkexif_common::{
    tag_identifier, value_hash, Config, Error, ExtractionResult, PoseidonEngine, Result,
    TagRecord, TagValue, TruncationPolicy, ValueHashMode,
};

use crate::{
    binder::is_binder_field,
    tool::{MetadataTool, ReadOptions, TagMap},
};

/// Groups that describe the file or the tool rather than the image.
const VOLATILE_GROUPS: [&str; 5] = ["System", "File", "ExifTool", "Composite", "XMP-x"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    pub value_hash: ValueHashMode,
    pub truncation: TruncationPolicy,
}

impl From<&Config> for ExtractOptions {
    fn from(config: &Config) -> Self {
        Self {
            value_hash: config.value_hash,
            truncation: config.truncation,
        }
    }
}

pub fn extract<T: MetadataTool + ?Sized>(
    tool: &mut T,
    engine: &PoseidonEngine,
    image: &Path,
    options: ExtractOptions,
) -> Result<ExtractionResult> {
    let tags = tool.read(image, &ReadOptions::default())?;
    let raw_count = tags.len();
    let records = build_records(engine, tags, options.value_hash);
    debug!(raw_count, kept = records.len(), "filtered metadata tags");

    if records.is_empty() {
        return Err(Error::NoMetadataFound(image.to_path_buf()));
    }

    let extraction = ExtractionResult::from_records(records, options.truncation)?;
    info!(
        image = %image.display(),
        count = extraction.count,
        truncated = extraction.truncated,
        "extracted metadata"
    );
    Ok(extraction)
}

/// Records for every committed tag, in byte order of the name.
pub fn build_records(
    engine: &PoseidonEngine,
    tags: TagMap,
    mode: ValueHashMode,
) -> Vec<TagRecord> {
    let kept: Vec<(String, serde_json::Value)> = tags
        .into_iter()
        .filter(|(name, _)| is_committed_tag(name))
        .collect();

    kept.into_par_iter()
        .map(|(name, raw)| {
            let raw_value = TagValue::from_exiftool_json(&raw);
            TagRecord {
                identifier: tag_identifier(&name),
                value_hash: value_hash(engine, mode, &raw_value),
                name,
                raw_value,
            }
        })
        .collect()
}

/// False for file-system, tool and binder fields.
pub fn is_committed_tag(name: &str) -> bool {
    if name == "SourceFile" || is_binder_field(name) {
        return false;
    }
    match name.split_once(':') {
        Some((group, _)) => !VOLATILE_GROUPS.contains(&group),
        None => true,
    }
}
