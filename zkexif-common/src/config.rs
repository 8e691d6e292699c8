//! Runtime configuration.

use std::{env, path::PathBuf};

use zkexif_circuit::SchemeKind;

use crate::{
    error::{Error, Result},
    hasher::ValueHashMode,
    padding::TruncationPolicy,
    payload::{is_binder_field, BINDER_FIELDS},
    MANIFEST_FILE,
};

pub const MANIFEST_PATH_ENV: &str = "ZKEXIF_MANIFEST_PATH";
pub const EXIFTOOL_ENV: &str = "ZKEXIF_EXIFTOOL";
pub const EMBED_FIELD_ENV: &str = "ZKEXIF_EMBED_FIELD";
pub const TRUNCATION_ENV: &str = "ZKEXIF_TRUNCATION";
pub const VALUE_HASH_ENV: &str = "ZKEXIF_VALUE_HASH";

pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";
pub const DEFAULT_EXIFTOOL: &str = "exiftool";
pub const DEFAULT_EMBED_FIELD: &str = "XMP-dc:Description";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Explicit manifest; when unset, one manifest per scheme under `artifacts/`.
    pub manifest_path: Option<PathBuf>,
    pub exiftool: PathBuf,
    pub embed_field: String,
    pub truncation: TruncationPolicy,
    pub value_hash: ValueHashMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manifest_path: None,
            exiftool: PathBuf::from(DEFAULT_EXIFTOOL),
            embed_field: DEFAULT_EMBED_FIELD.to_string(),
            truncation: TruncationPolicy::default(),
            value_hash: ValueHashMode::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let truncation = match lookup(TRUNCATION_ENV) {
            Some(raw) => raw.parse().map_err(Error::Config)?,
            None => defaults.truncation,
        };
        let value_hash = match lookup(VALUE_HASH_ENV) {
            Some(raw) => raw.parse().map_err(Error::Config)?,
            None => defaults.value_hash,
        };

        let embed_field = match lookup(EMBED_FIELD_ENV).filter(|field| !field.trim().is_empty()) {
            Some(field) if is_binder_field(field.trim()) => field.trim().to_string(),
            Some(field) => {
                return Err(Error::Config(format!(
                    "{EMBED_FIELD_ENV}='{field}' is not one of {}",
                    BINDER_FIELDS.join(", ")
                )))
            }
            None => defaults.embed_field,
        };

        Ok(Self {
            manifest_path: lookup(MANIFEST_PATH_ENV).map(PathBuf::from),
            exiftool: lookup(EXIFTOOL_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.exiftool),
            embed_field,
            truncation,
            value_hash,
        })
    }

    pub fn manifest_for(&self, scheme: SchemeKind) -> PathBuf {
        match &self.manifest_path {
            Some(path) => path.clone(),
            None => default_manifest_path(scheme),
        }
    }
}

/// `artifacts/<scheme>/manifest.json`
pub fn default_manifest_path(scheme: SchemeKind) -> PathBuf {
    PathBuf::from(DEFAULT_ARTIFACTS_DIR)
        .join(scheme.as_str().to_ascii_lowercase())
        .join(MANIFEST_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(
            config.manifest_for(SchemeKind::IdentifierOnly),
            PathBuf::from("artifacts/identifier_only/manifest.json")
        );
    }

    #[test]
    fn overrides_are_applied() {
        let config = Config::from_lookup(lookup(&[
            (MANIFEST_PATH_ENV, "/tmp/m.json"),
            (EXIFTOOL_ENV, "/opt/exiftool"),
            (EMBED_FIELD_ENV, "UserComment"),
            (TRUNCATION_ENV, "reject"),
            (VALUE_HASH_ENV, "blake3"),
        ]))
        .unwrap();
        assert_eq!(config.manifest_for(SchemeKind::SecretKeyedPair), PathBuf::from("/tmp/m.json"));
        assert_eq!(config.exiftool, PathBuf::from("/opt/exiftool"));
        assert_eq!(config.embed_field, "UserComment");
        assert_eq!(config.truncation, TruncationPolicy::Reject);
        assert_eq!(config.value_hash, ValueHashMode::Blake3Reduced);
    }

    #[test]
    fn bad_policy_is_a_config_error() {
        let err = Config::from_lookup(lookup(&[(TRUNCATION_ENV, "sometimes")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn embed_field_must_be_retrievable() {
        let err = Config::from_lookup(lookup(&[(EMBED_FIELD_ENV, "IFD0:Artist")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let config =
            Config::from_lookup(lookup(&[(EMBED_FIELD_ENV, " ExifIFD:UserComment ")])).unwrap();
        assert_eq!(config.embed_field, "ExifIFD:UserComment");

        let config = Config::from_lookup(lookup(&[(EMBED_FIELD_ENV, "  ")])).unwrap();
        assert_eq!(config.embed_field, DEFAULT_EMBED_FIELD);
    }
}
