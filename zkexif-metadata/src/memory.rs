//! Metadata tool backed by a map instead of image files.

use std::{
    collections::{BTreeMap, HashMap},
    io,
    path::{Path, PathBuf},
};

use serde_json::Value;
use zkexif_common::{Error, Result};

use crate::tool::{MetadataTool, ReadOptions, TagMap, WriteOptions};

#[derive(Clone, Debug, Default)]
pub struct InMemoryTool {
    images: HashMap<PathBuf, TagMap>,
    reads: usize,
}

impl InMemoryTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, tags: TagMap) {
        self.images.insert(path.into(), tags);
    }

    pub fn with_image(mut self, path: impl Into<PathBuf>, tags: TagMap) -> Self {
        self.insert(path, tags);
        self
    }

    pub fn tags(&self, path: impl AsRef<Path>) -> Option<&TagMap> {
        self.images.get(path.as_ref())
    }

    pub fn tags_mut(&mut self, path: impl AsRef<Path>) -> Option<&mut TagMap> {
        self.images.get_mut(path.as_ref())
    }

    pub fn read_count(&self) -> usize {
        self.reads
    }

    fn missing(path: &Path) -> Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )
        .into()
    }
}

impl MetadataTool for InMemoryTool {
    fn read(&mut self, path: &Path, _options: &ReadOptions) -> Result<TagMap> {
        self.reads += 1;
        self.images
            .get(path)
            .cloned()
            .ok_or_else(|| Self::missing(path))
    }

    fn write(
        &mut self,
        path: &Path,
        tags: &BTreeMap<String, Option<String>>,
        _options: &WriteOptions,
    ) -> Result<()> {
        let image = self
            .images
            .get_mut(path)
            .ok_or_else(|| Self::missing(path))?;
        for (name, value) in tags {
            match value {
                Some(value) => {
                    image.insert(name.clone(), Value::String(value.clone()));
                }
                None => {
                    image.remove(name);
                }
            }
        }
        Ok(())
    }

    fn copy(&mut self, from: &Path, to: &Path) -> Result<()> {
        let tags = self
            .images
            .get(from)
            .cloned()
            .ok_or_else(|| Self::missing(from))?;
        self.images.insert(to.to_path_buf(), tags);
        Ok(())
    }
}
