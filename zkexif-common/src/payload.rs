//! JSON proof payload: public inputs, provenance metadata and the proof.

use std::{fs, path::Path};

use halo2curves_axiom::bn256::Fr;
use serde::{Deserialize, Serialize};
use zkexif_circuit::{PublicInputs, SchemeKind, CAPACITY, COMMIT_BASE};

use crate::{
    backend::{flatten_public, BackendProof},
    error::{Error, Result},
    fr_from_decimal, fr_to_decimal,
    hasher::ValueHashMode,
    hex::{from_hex, to_hex},
    CIRCUIT_VERSION,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofPayload {
    pub inputs: PayloadInputs,
    pub meta: PayloadMeta,
    pub proof: ProofSection,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadInputs {
    /// Decimal field element.
    pub commitment: String,
    pub tag_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_tag_id: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadMeta {
    pub image_path: String,
    pub scheme: SchemeKind,
    #[serde(default)]
    pub value_hash_mode: ValueHashMode,
    pub capacity: usize,
    pub base: String,
    #[serde(default)]
    pub truncated: bool,
    pub circuit_version: u32,
    #[serde(default)]
    pub extracted_tag_names: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofSection {
    pub public_inputs: Vec<String>,
    pub proof_hex: String,
    pub verification_key_hex: String,
}

impl PayloadMeta {
    pub fn new(
        image_path: impl Into<String>,
        scheme: SchemeKind,
        value_hash_mode: ValueHashMode,
        truncated: bool,
        extracted_tag_names: Vec<String>,
    ) -> Self {
        Self {
            image_path: image_path.into(),
            scheme,
            value_hash_mode,
            capacity: CAPACITY,
            base: COMMIT_BASE.to_string(),
            truncated,
            circuit_version: CIRCUIT_VERSION,
            extracted_tag_names,
        }
    }
}

impl ProofPayload {
    pub fn new(public: &PublicInputs, meta: PayloadMeta, proof: &BackendProof) -> Self {
        Self {
            inputs: PayloadInputs {
                commitment: fr_to_decimal(&public.commitment),
                tag_count: public.tag_count,
                query_tag_id: public.query_tag_id,
            },
            meta,
            proof: ProofSection {
                public_inputs: proof.public_inputs.iter().map(fr_to_decimal).collect(),
                proof_hex: to_hex(&proof.proof),
                verification_key_hex: to_hex(&proof.verification_key),
            },
        }
    }

    pub fn scheme(&self) -> SchemeKind {
        self.meta.scheme
    }

    pub fn public_inputs(&self) -> Result<PublicInputs> {
        Ok(PublicInputs {
            commitment: self.commitment()?,
            tag_count: self.inputs.tag_count,
            query_tag_id: self.inputs.query_tag_id,
        })
    }

    pub fn commitment(&self) -> Result<Fr> {
        fr_from_decimal(&self.inputs.commitment)
    }

    /// Rebuild the backend view of the proof section.
    pub fn backend_proof(&self) -> Result<BackendProof> {
        let public_inputs = self
            .proof
            .public_inputs
            .iter()
            .map(|value| fr_from_decimal(value))
            .collect::<Result<Vec<_>>>()?;
        Ok(BackendProof {
            scheme: self.meta.scheme,
            proof: from_hex(&self.proof.proof_hex)?,
            public_inputs,
            verification_key: from_hex(&self.proof.verification_key_hex)?,
        })
    }

    /// Structural checks plus agreement between `inputs` and `proof.publicInputs`.
    pub fn validate(&self) -> Result<()> {
        let meta = &self.meta;
        if meta.capacity != CAPACITY {
            return Err(Error::malformed(format!(
                "capacity {} does not match circuit capacity {CAPACITY}",
                meta.capacity
            )));
        }
        if meta.base != COMMIT_BASE.to_string() {
            return Err(Error::malformed(format!("unsupported base {}", meta.base)));
        }
        if meta.circuit_version != CIRCUIT_VERSION {
            return Err(Error::malformed(format!(
                "circuit version {} does not match {CIRCUIT_VERSION}",
                meta.circuit_version
            )));
        }
        if self.inputs.tag_count as usize > CAPACITY {
            return Err(Error::malformed(format!(
                "tagCount {} exceeds capacity",
                self.inputs.tag_count
            )));
        }
        let wants_query = meta.scheme == SchemeKind::IdentifierOnly;
        if wants_query != self.inputs.query_tag_id.is_some() {
            return Err(Error::malformed(
                "queryTagId must be present exactly for IDENTIFIER_ONLY payloads",
            ));
        }

        let public = self.public_inputs()?;
        let proof = self.backend_proof()?;
        if proof.public_inputs != flatten_public(meta.scheme, &public) {
            return Err(Error::malformed(
                "proof public inputs disagree with payload inputs",
            ));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate.
    pub fn from_json(text: &str) -> Result<Self> {
        let payload: Self = serde_json::from_str(text)
            .map_err(|err| Error::malformed(format!("invalid payload json: {err}")))?;
        payload.validate()?;
        Ok(payload)
    }

    /// Write through a sibling temp file so a failed write never leaves a
    /// partial payload behind.
    pub fn write_atomic(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut tmp_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "proof".into());
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        fs::write(&tmp, self.to_json_pretty()?)?;
        if let Err(err) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        Ok(())
    }

    pub fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }
}

/// Metadata fields that may carry an embedded payload, in retrieval order.
pub const BINDER_FIELDS: [&str; 4] = [
    "XMP-dc:Description",
    "ImageDescription",
    "UserComment",
    "XPComment",
];

/// Whether `key` names `field`, with or without a group prefix on either side.
///
/// A grouped field only matches its own group or a bare key; a bare field
/// matches that tag in any group.
pub fn matches_field(key: &str, field: &str) -> bool {
    let (key_group, key_tag) = split_group(key);
    let (field_group, field_tag) = split_group(field);
    if key_tag != field_tag {
        return false;
    }
    match (key_group, field_group) {
        (Some(k), Some(f)) => k == f,
        _ => true,
    }
}

/// True for tags a payload may be written to.
pub fn is_binder_field(key: &str) -> bool {
    BINDER_FIELDS.iter().any(|field| matches_field(key, field))
}

fn split_group(name: &str) -> (Option<&str>, &str) {
    match name.rsplit_once(':') {
        Some((group, tag)) => (Some(group), tag),
        None => (None, name),
    }
}
