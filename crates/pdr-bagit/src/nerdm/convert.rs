//! Derived-metadata capabilities.
//!
//! Each capability is a one-method trait so callers can inject a richer
//! engine; the defaults here cover what a bag needs on its own.

use super::{
    download_url, init_coll_record, init_file_record, init_resource_record, ComponentType,
    Record, POD_FILENAME,
};
use crate::error::{BagError, BagResult};
use crate::paths::{ancestors_of, parent_of};
use percent_encoding::percent_decode_str;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Computes a resource's `inventory` from its components.
pub trait InventoryCounter: Send + Sync + std::fmt::Debug {
    fn inventory(&self, components: &[Value]) -> Value;
}

/// Computes a resource's `dataHierarchy` from its components.
pub trait HierarchyBuilder: Send + Sync + std::fmt::Debug {
    fn build_hierarchy(&self, components: &[Value]) -> Vec<Value>;
}

/// Converts a POD record into a NERDm resource record.
pub trait PodConverter: Send + Sync + std::fmt::Debug {
    fn convert(&self, pod: &Record, id: Option<&str>) -> BagResult<Record>;
}

fn filepath_of(comp: &Value) -> Option<&str> {
    comp.get("filepath").and_then(Value::as_str)
}

fn type_tags_of(comp: &Value) -> Vec<&str> {
    comp.get("@type")
        .and_then(Value::as_array)
        .map(|tags| tags.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn is_subcoll(comp: &Value) -> bool {
    let marker = ComponentType::Subcollection.marker();
    type_tags_of(comp).iter().any(|t| t.contains(&marker))
}

#[derive(Default)]
struct CollectionTally<'a> {
    child_count: usize,
    desc_count: usize,
    /// type tag → (children, descendants)
    by_type: BTreeMap<&'a str, (usize, usize)>,
    child_colls: BTreeSet<String>,
}

/// Default inventory: one entry per collection (the root `""` first, then
/// each subcollection in path order).
///
/// Entry fields: `forCollection`, `childCount`, `descCount`, `byType`
/// (`forType`/`childCount`/`descCount` per type tag) and
/// `childCollections`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ComponentCounter;

impl InventoryCounter for ComponentCounter {
    fn inventory(&self, components: &[Value]) -> Value {
        let mut tallies: BTreeMap<String, CollectionTally<'_>> = BTreeMap::new();
        tallies.insert(String::new(), CollectionTally::default());
        for comp in components.iter().filter(|c| is_subcoll(c)) {
            if let Some(fp) = filepath_of(comp) {
                tallies.entry(fp.to_string()).or_default();
            }
        }

        for comp in components {
            let Some(fp) = filepath_of(comp) else {
                continue;
            };
            let tags = type_tags_of(comp);
            let parent = parent_of(fp);

            let mut colls = vec![String::new()];
            colls.extend(ancestors_of(fp));
            for coll in colls {
                let Some(tally) = tallies.get_mut(&coll) else {
                    continue;
                };
                let is_child = coll == parent;
                tally.desc_count += 1;
                if is_child {
                    tally.child_count += 1;
                    if is_subcoll(comp) {
                        tally.child_colls.insert(fp.to_string());
                    }
                }
                for tag in &tags {
                    let counts = tally.by_type.entry(*tag).or_default();
                    counts.1 += 1;
                    if is_child {
                        counts.0 += 1;
                    }
                }
            }
        }

        let entries: Vec<Value> = tallies
            .into_iter()
            .map(|(coll, t)| {
                let by_type: Vec<Value> = t
                    .by_type
                    .iter()
                    .map(|(tag, (child, desc))| {
                        json!({ "forType": tag, "childCount": child, "descCount": desc })
                    })
                    .collect();
                json!({
                    "forCollection": coll,
                    "childCount": t.child_count,
                    "descCount": t.desc_count,
                    "byType": by_type,
                    "childCollections": t.child_colls,
                })
            })
            .collect();
        Value::Array(entries)
    }
}

/// Default hierarchy: nested `{filepath, children}` nodes for every file
/// and subcollection component. Files carry no `children`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilepathHierarchy;

impl FilepathHierarchy {
    fn node(path: &str, colls: &BTreeSet<&str>, children: &BTreeMap<&str, Vec<&str>>) -> Value {
        if !colls.contains(path) {
            return json!({ "filepath": path });
        }
        let kids: Vec<Value> = children
            .get(path)
            .map(|ks| ks.iter().map(|k| Self::node(k, colls, children)).collect())
            .unwrap_or_default();
        json!({ "filepath": path, "children": kids })
    }
}

impl HierarchyBuilder for FilepathHierarchy {
    fn build_hierarchy(&self, components: &[Value]) -> Vec<Value> {
        let mut paths: BTreeSet<&str> = BTreeSet::new();
        let mut colls: BTreeSet<&str> = BTreeSet::new();
        for comp in components {
            let Some(fp) = filepath_of(comp) else {
                continue;
            };
            let file = [ComponentType::DataFile, ComponentType::ChecksumFile]
                .iter()
                .any(|t| type_tags_of(comp).iter().any(|tag| tag.contains(&t.marker())));
            if is_subcoll(comp) {
                colls.insert(fp);
                paths.insert(fp);
            } else if file {
                paths.insert(fp);
            }
        }

        // attach each node to its nearest known ancestor collection
        let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for &path in &paths {
            let mut parent = parent_of(path);
            while !parent.is_empty() && !colls.contains(parent) {
                parent = parent_of(parent);
            }
            children.entry(parent).or_default().push(path);
        }

        children
            .get("")
            .map(|top| {
                top.iter()
                    .map(|p| Self::node(p, &colls, &children))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// POD fields copied to the NERDm record unchanged.
const POD_PASSTHROUGH: &[&str] = &[
    "title",
    "keyword",
    "modified",
    "issued",
    "contactPoint",
    "accessLevel",
    "license",
    "rights",
    "landingPage",
    "language",
    "publisher",
];

/// Default POD converter.
///
/// Copies the common POD fields, wraps a string `description` into an
/// array, and turns each `distribution` entry whose `downloadURL` points
/// into this dataset's area of the distribution service into a file
/// component (with ancestor subcollections). Other distributions become
/// access-page components.
#[derive(Debug, Clone)]
pub struct BasicPodConverter {
    distrib_base: String,
}

impl BasicPodConverter {
    /// `distrib_base` must end with `/`.
    pub fn new(distrib_base: impl Into<String>) -> Self {
        Self {
            distrib_base: distrib_base.into(),
        }
    }

    fn file_component(&self, dist: &Value, filepath: &str, ediid: &str) -> Record {
        let ty = if filepath.ends_with(".sha256") || filepath.ends_with(".md5") {
            ComponentType::ChecksumFile
        } else {
            ComponentType::DataFile
        };
        let url = download_url(&self.distrib_base, ediid, filepath);
        let mut comp = init_file_record(filepath, ty, Some(url));
        for key in ["mediaType", "format", "title", "description"] {
            if let Some(v) = dist.get(key) {
                comp.insert(key.to_string(), v.clone());
            }
        }
        comp
    }
}

impl PodConverter for BasicPodConverter {
    fn convert(&self, pod: &Record, id: Option<&str>) -> BagResult<Record> {
        let ediid = pod
            .get("identifier")
            .and_then(Value::as_str)
            .ok_or_else(|| BagError::Format {
                file: POD_FILENAME.to_string(),
                message: "POD record has no string identifier".into(),
            })?;

        let mut res = init_resource_record(id, Some(ediid));
        for key in POD_PASSTHROUGH {
            if let Some(v) = pod.get(*key) {
                res.insert(key.to_string(), v.clone());
            }
        }
        match pod.get("description") {
            Some(Value::String(d)) => {
                res.insert("description".into(), json!([d]));
            }
            Some(d @ Value::Array(_)) => {
                res.insert("description".into(), d.clone());
            }
            _ => {}
        }

        let marker = format!("/{}/", ediid);
        let mut components: Vec<Value> = Vec::new();
        let mut seen_colls: BTreeSet<String> = BTreeSet::new();
        let dists = pod
            .get("distribution")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for dist in &dists {
            let url = dist.get("downloadURL").and_then(Value::as_str);
            let filepath = url.and_then(|u| {
                let (_, tail) = u.split_once(&marker)?;
                Some(percent_decode_str(tail).decode_utf8_lossy().into_owned())
            });

            match filepath {
                Some(fp) if !fp.is_empty() => {
                    for anc in ancestors_of(&fp) {
                        if seen_colls.insert(anc.clone()) {
                            components.push(Value::Object(init_coll_record(&anc)));
                        }
                    }
                    components.push(Value::Object(self.file_component(dist, &fp, ediid)));
                }
                _ => {
                    let Some(access) = dist
                        .get("accessURL")
                        .or_else(|| dist.get("downloadURL"))
                        .and_then(Value::as_str)
                    else {
                        tracing::warn!(ediid, "skipping POD distribution with no URL");
                        continue;
                    };
                    let mut page = Record::new();
                    page.insert("@type".into(), json!(["nrdp:AccessPage", "dcat:Distribution"]));
                    page.insert("accessURL".into(), json!(access));
                    for key in ["title", "description", "format"] {
                        if let Some(v) = dist.get(key) {
                            page.insert(key.to_string(), v.clone());
                        }
                    }
                    components.push(Value::Object(page));
                }
            }
        }

        // subcollections, then files, each in path order; access pages last
        components.sort_by_key(|c| {
            let rank = match (is_subcoll(c), filepath_of(c)) {
                (true, _) => 0u8,
                (false, Some(_)) => 1,
                (false, None) => 2,
            };
            (rank, filepath_of(c).map(str::to_string).unwrap_or_default())
        });
        if !components.is_empty() {
            res.insert("components".into(), Value::Array(components));
        }
        tracing::debug!(ediid, "converted POD record");
        Ok(res)
    }
}
