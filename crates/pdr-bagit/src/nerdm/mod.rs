//! NERDm component metadata model.
//!
//! Records are kept as ordered JSON objects ([`Record`]) because bags carry
//! arbitrary extension fields that must survive a read/modify/write cycle.
//! This module knows which fields each component kind requires and how to
//! build the minimal record for a path.
//!
//! - [`merge`]: annotation merge conventions
//! - [`convert`]: inventory, hierarchy, and POD conversion capabilities

pub mod convert;
pub mod merge;

use crate::checksum::ChecksumAlgorithm;
use crate::error::{BagError, BagResult};
use crate::paths::{basename_of, encode_path};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

/// A NERDm record (resource or component).
pub type Record = Map<String, Value>;

pub const NERDM_SCHEMA: &str = "https://data.nist.gov/od/dm/nerdm-schema/v0.1#";
pub const NERDM_PUB_SCHEMA_DEFS: &str =
    "https://data.nist.gov/od/dm/nerdm-schema/pub/v0.1#/definitions/";
pub const NERDM_CONTEXT: &str = "https://data.nist.gov/od/dm/nerdm-pub-context.jsonld";

/// Component record file name under `metadata/<path>/`.
pub const NERDMD_FILENAME: &str = "nerdm.json";
/// Annotation overlay file name, beside the component record.
pub const ANNOTS_FILENAME: &str = "annot.json";
/// Source POD record, stored at the top of `metadata/`.
pub const POD_FILENAME: &str = "pod.json";

/// Prefix for component identifiers.
pub const COMPONENT_ID_PREFIX: &str = "cmps/";

/// Kinds of components a bag can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    DataFile,
    ChecksumFile,
    Subcollection,
    Resource,
}

impl ComponentType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DataFile => "DataFile",
            Self::ChecksumFile => "ChecksumFile",
            Self::Subcollection => "Subcollection",
            Self::Resource => "PublicDataResource",
        }
    }

    /// Marker searched for in `@type` values, e.g. `:DataFile`.
    pub fn marker(&self) -> String {
        format!(":{}", self.name())
    }

    /// The `@type` array for a freshly initialized record.
    pub fn type_tags(&self) -> Vec<String> {
        match self {
            Self::DataFile | Self::ChecksumFile => vec![
                format!("nrdp:{}", self.name()),
                "nrdp:DownloadableFile".to_string(),
                "dcat:Distribution".to_string(),
            ],
            Self::Subcollection | Self::Resource => vec![format!("nrdp:{}", self.name())],
        }
    }

    pub fn extension_schema(&self) -> String {
        format!("{}{}", NERDM_PUB_SCHEMA_DEFS, self.name())
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::DataFile | Self::ChecksumFile)
    }

    /// Classify a record by its `@type` tags. Files win over collections.
    pub fn of_record(record: &Record) -> Option<Self> {
        [Self::ChecksumFile, Self::DataFile, Self::Subcollection, Self::Resource]
            .into_iter()
            .find(|t| has_type(record, *t))
    }
}

impl std::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// True if any `@type` tag of the record names the given component type.
pub fn has_type(record: &Record, ty: ComponentType) -> bool {
    let marker = ty.marker();
    record
        .get("@type")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .any(|t| t.contains(&marker))
        })
        .unwrap_or(false)
}

/// Component identifier for a path: `cmps/<percent-encoded path>`.
pub fn component_id(path: &str) -> String {
    format!("{}{}", COMPONENT_ID_PREFIX, encode_path(path))
}

/// Download URL for a payload file: `<base><ediid>/<pct-encoded path>`.
///
/// `base` is expected to end with `/` (see
/// [`crate::config::BuilderConfig::distrib_base`]).
pub fn download_url(base: &str, ediid: &str, path: &str) -> String {
    format!("{}{}/{}", base, ediid, encode_path(path))
}

/// Minimal record for a data or checksum file.
pub fn init_file_record(path: &str, ty: ComponentType, download_url: Option<String>) -> Record {
    let mut md = Record::new();
    md.insert("@id".into(), json!(component_id(path)));
    md.insert("@type".into(), json!(ty.type_tags()));
    md.insert("filepath".into(), json!(path));
    if let Some(url) = download_url {
        md.insert("downloadURL".into(), json!(url));
    }
    md.insert("_extensionSchemas".into(), json!([ty.extension_schema()]));

    if ty == ComponentType::ChecksumFile {
        if let Some(extras) = checksum_file_extras(path) {
            md.extend(extras);
        }
    }
    md
}

/// Minimal record for a subcollection.
pub fn init_coll_record(path: &str) -> Record {
    let ty = ComponentType::Subcollection;
    let mut md = Record::new();
    md.insert("@id".into(), json!(component_id(path)));
    md.insert("@type".into(), json!(ty.type_tags()));
    md.insert("filepath".into(), json!(path));
    md.insert("_extensionSchemas".into(), json!([ty.extension_schema()]));
    md
}

/// Minimal resource-root record.
pub fn init_resource_record(id: Option<&str>, ediid: Option<&str>) -> Record {
    let ty = ComponentType::Resource;
    let mut md = Record::new();
    md.insert("_schema".into(), json!(NERDM_SCHEMA));
    md.insert("@context".into(), json!(NERDM_CONTEXT));
    if let Some(id) = id {
        md.insert("@id".into(), json!(id));
    }
    md.insert("@type".into(), json!(ty.type_tags()));
    if let Some(ediid) = ediid {
        md.insert("ediid".into(), json!(ediid));
    }
    md.insert("_extensionSchemas".into(), json!([ty.extension_schema()]));
    md
}

/// Checksum descriptor: `{algorithm: {@type: Thing, tag}, hash}`.
pub fn checksum_descriptor(alg: ChecksumAlgorithm, hash: &str) -> Value {
    json!({
        "algorithm": { "@type": "Thing", "tag": alg.tag() },
        "hash": hash,
    })
}

/// Algorithm and hash recorded in a file component, if any.
pub fn recorded_checksum(record: &Record) -> Option<(ChecksumAlgorithm, &str)> {
    let cs = record.get("checksum")?;
    let tag = cs.pointer("/algorithm/tag")?.as_str()?;
    let hash = cs.get("hash")?.as_str()?;
    Some((ChecksumAlgorithm::from_tag(tag)?, hash))
}

/// `describes`/`description`/`algorithm` for a checksum file path, inferred
/// from its extension. Unrecognized extensions yield `None`.
fn checksum_file_extras(path: &str) -> Option<Record> {
    let (described, ext) = path.rsplit_once('.')?;
    let (alg, label) = match ext {
        "sha256" => (ChecksumAlgorithm::Sha256, "SHA-256"),
        "md5" => (ChecksumAlgorithm::Md5, "MD5"),
        _ => {
            tracing::debug!(path, "no checksum algorithm implied by extension");
            return None;
        }
    };

    let mut extras = Record::new();
    extras.insert("describes".into(), json!(component_id(described)));
    extras.insert(
        "description".into(),
        json!(format!("{} checksum value for {}", label, basename_of(described))),
    );
    extras.insert(
        "algorithm".into(),
        json!({ "@type": "Thing", "tag": alg.tag() }),
    );
    Some(extras)
}

/// Read a NERDm (or POD) JSON object from disk.
pub fn read_nerd(path: &Path) -> BagResult<Record> {
    let content = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content).map_err(|source| BagError::BadJson {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(BagError::Format {
            file: path.display().to_string(),
            message: "expected a JSON object".into(),
        }),
    }
}

/// Write a record as pretty-printed JSON.
pub fn write_nerd(path: &Path, record: &Record) -> BagResult<()> {
    let mut out = serde_json::to_string_pretty(record)?;
    out.push('\n');
    fs::write(path, out)?;
    Ok(())
}

/// Shallow merge: every top-level field of `update` replaces the field in
/// `base`.
pub fn update_record(base: &mut Record, update: &Record) {
    for (k, v) in update {
        base.insert(k.clone(), v.clone());
    }
}
