//! Builder and validator configuration.
//!
//! Both structs deserialize with `#[serde(default)]`, so a config file only
//! needs the keys it changes. `serde_yaml` accepts JSON documents as well.

use crate::checksum::ChecksumAlgorithm;
use crate::ident::{ArkMinter, DEFAULT_NAAN, DEFAULT_SHOULDER};
use anyhow::Context;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_DISTRIB_BASEURL: &str = "https://data.nist.gov/od/ds/";
pub const DEFAULT_BAGIT_VERSION: &str = "0.97";
pub const DEFAULT_TAG_ENCODING: &str = "UTF-8";
pub const DEFAULT_LINE_WIDTH: usize = 79;
pub const NIST_BAG_PROFILE_VERSION: &str = "0.4";
pub const MULTIBAG_VERSION: &str = "0.3";
pub const DEFAULT_LOGNAME: &str = "preserv.log";

/// A bag-info value in a config file: a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InfoValue {
    One(String),
    Many(Vec<String>),
}

impl InfoValue {
    pub fn values(&self) -> Vec<String> {
        match self {
            Self::One(v) => vec![v.clone()],
            Self::Many(vs) => vs.clone(),
        }
    }
}

impl From<&str> for InfoValue {
    fn from(v: &str) -> Self {
        Self::One(v.to_string())
    }
}

/// Configuration for [`crate::BagBuilder`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Base URL of the distribution service; download URLs are
    /// `<base><ediid>/<path>`.
    pub distrib_service_baseurl: String,
    pub bagit_version: String,
    pub tag_file_encoding: String,
    /// Additional tag directories created with the bag structure.
    pub extra_tag_dirs: Vec<String>,
    /// Bag-info entries layered over the NIST defaults. An empty list
    /// removes a default entry.
    pub init_bag_info: IndexMap<String, InfoValue>,
    pub baginfo_line_width: usize,
    pub manifest_algorithm: ChecksumAlgorithm,
    pub id_naan: String,
    pub id_shoulder: String,
    /// File in the bag root that receives the bag's preservation log.
    pub logname: String,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            distrib_service_baseurl: DEFAULT_DISTRIB_BASEURL.to_string(),
            bagit_version: DEFAULT_BAGIT_VERSION.to_string(),
            tag_file_encoding: DEFAULT_TAG_ENCODING.to_string(),
            extra_tag_dirs: Vec::new(),
            init_bag_info: IndexMap::new(),
            baginfo_line_width: DEFAULT_LINE_WIDTH,
            manifest_algorithm: ChecksumAlgorithm::Sha256,
            id_naan: DEFAULT_NAAN.to_string(),
            id_shoulder: DEFAULT_SHOULDER.to_string(),
            logname: DEFAULT_LOGNAME.to_string(),
        }
    }
}

impl BuilderConfig {
    /// Load from a YAML or JSON file.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read builder config {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse builder config {}", path.display()))?;
        Ok(config)
    }

    /// Download-service base URL, always ending with `/`.
    pub fn distrib_base(&self) -> String {
        let mut base = self.distrib_service_baseurl.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        base
    }

    pub fn minter(&self) -> ArkMinter {
        ArkMinter::new(&self.id_naan, &self.id_shoulder)
    }

    /// NIST default bag-info entries with configured entries layered on top.
    pub fn effective_bag_info(&self) -> IndexMap<String, Vec<String>> {
        let mut info = default_bag_info();
        for (name, value) in &self.init_bag_info {
            let values = value.values();
            if values.is_empty() {
                info.shift_remove(name);
            } else {
                info.insert(name.clone(), values);
            }
        }
        info
    }
}

/// Bag-info entries every NIST preservation bag starts from.
pub fn default_bag_info() -> IndexMap<String, Vec<String>> {
    let entries: [(&str, &[&str]); 7] = [
        (
            "Source-Organization",
            &["National Institute of Standards and Technology"],
        ),
        (
            "Organization-Address",
            &["100 Bureau Dr.", "Gaithersburg, MD 20899"],
        ),
        ("Contact-Name", &["Data Support"]),
        ("Contact-Email", &["datasupport@nist.gov"]),
        ("Multibag-Version", &[MULTIBAG_VERSION]),
        ("NIST-BagIt-Version", &[NIST_BAG_PROFILE_VERSION]),
        (
            "External-Description",
            &["This bag contains a data collection from the NIST Public Data \
               Repository together with its NERDm metadata."],
        ),
    ];
    entries
        .iter()
        .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
        .collect()
}

/// Configuration for [`crate::validate::BagItValidator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Recompute payload checksums and compare against the manifests.
    pub check_checksums: bool,
    /// Expected `BagIt-Version` value.
    pub bagit_version: String,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            check_checksums: true,
            bagit_version: DEFAULT_BAGIT_VERSION.to_string(),
        }
    }
}

impl ValidatorConfig {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read validator config {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse validator config {}", path.display()))
    }
}
