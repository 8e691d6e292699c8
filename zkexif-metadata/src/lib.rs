//! Metadata access for zkexif: the metadata-tool seam, the ExifTool session,
//! tag extraction and the proof binder.

pub mod binder;
pub mod exiftool;
pub mod extractor;
pub mod memory;
pub mod tool;
pub mod write_args;

pub use binder::{embed, retrieve, CANDIDATE_FIELDS};
pub use exiftool::ExifTool;
pub use extractor::{extract, ExtractOptions};
pub use memory::InMemoryTool;
pub use tool::{MetadataTool, ReadOptions, TagMap, WriteOptions};
pub use write_args::{parse_assignments, parse_removals};
