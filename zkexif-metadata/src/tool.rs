use std::{collections::BTreeMap, fs, path::Path};

use serde_json::Value;
use zkexif_common::Result;

/// Tag name to raw ExifTool JSON value, in byte order of the name.
pub type TagMap = BTreeMap<String, Value>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadOptions {
    /// `-G1`: prefix names with their family-1 group.
    pub group_names: bool,
    /// `-a`: keep duplicate tags from different groups.
    pub allow_duplicates: bool,
    /// `-s`: tag names instead of descriptions.
    pub short_names: bool,
    /// `-b`: emit binary values as `base64:` strings.
    pub binary: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            group_names: true,
            allow_duplicates: true,
            short_names: true,
            binary: true,
        }
    }
}

impl ReadOptions {
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["-json".to_string()];
        if self.group_names {
            args.push("-G1".into());
        }
        if self.allow_duplicates {
            args.push("-a".into());
        }
        if self.short_names {
            args.push("-s".into());
        }
        if self.binary {
            args.push("-b".into());
        }
        args
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteOptions {
    pub overwrite_original: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            overwrite_original: true,
        }
    }
}

/// Reads and writes image metadata.
pub trait MetadataTool {
    fn read(&mut self, path: &Path, options: &ReadOptions) -> Result<TagMap>;

    /// Set each tag to `Some(value)` or delete it on `None`.
    fn write(
        &mut self,
        path: &Path,
        tags: &BTreeMap<String, Option<String>>,
        options: &WriteOptions,
    ) -> Result<()>;

    /// Copy an image so writes never touch the original.
    fn copy(&mut self, from: &Path, to: &Path) -> Result<()> {
        if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::copy(from, to)?;
        Ok(())
    }
}
