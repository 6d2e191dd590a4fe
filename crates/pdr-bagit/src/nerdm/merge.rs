//! Annotation merge conventions.
//!
//! A [`Merger`] combines a component record with its annotation overlay.
//! Conventions are looked up by name once, when a reader is configured.

use crate::error::{BagError, BagResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Default convention name.
pub const DEFAULT_CONVENTION: &str = "dev";

/// Combines a base record with an overlay.
pub trait Merger: Send + Sync + std::fmt::Debug {
    fn merge(&self, base: &Value, overlay: &Value) -> Value;
}

/// Recursive object merge. Arrays are unioned (base order first, new
/// overlay items appended); scalars are replaced by the overlay.
#[derive(Debug, Default, Clone, Copy)]
pub struct DevMerger;

impl Merger for DevMerger {
    fn merge(&self, base: &Value, overlay: &Value) -> Value {
        match (base, overlay) {
            (Value::Object(b), Value::Object(o)) => {
                let mut out = b.clone();
                for (k, ov) in o {
                    let merged = match b.get(k) {
                        Some(bv) => self.merge(bv, ov),
                        None => ov.clone(),
                    };
                    out.insert(k.clone(), merged);
                }
                Value::Object(out)
            }
            (Value::Array(b), Value::Array(o)) => {
                let mut out = b.clone();
                for item in o {
                    if !out.contains(item) {
                        out.push(item.clone());
                    }
                }
                Value::Array(out)
            }
            (_, ov) => ov.clone(),
        }
    }
}

/// Top-level overwrite: overlay fields replace base fields wholesale.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplaceMerger;

impl Merger for ReplaceMerger {
    fn merge(&self, base: &Value, overlay: &Value) -> Value {
        match (base, overlay) {
            (Value::Object(b), Value::Object(o)) => {
                let mut out = b.clone();
                for (k, v) in o {
                    out.insert(k.clone(), v.clone());
                }
                Value::Object(out)
            }
            (_, ov) => ov.clone(),
        }
    }
}

/// Named merge conventions.
#[derive(Debug, Clone)]
pub struct MergerRegistry {
    conventions: BTreeMap<String, Arc<dyn Merger>>,
}

impl Default for MergerRegistry {
    fn default() -> Self {
        let mut reg = Self {
            conventions: BTreeMap::new(),
        };
        reg.register("dev", Arc::new(DevMerger));
        reg.register("replace", Arc::new(ReplaceMerger));
        reg
    }
}

impl MergerRegistry {
    pub fn register(&mut self, name: impl Into<String>, merger: Arc<dyn Merger>) {
        self.conventions.insert(name.into(), merger);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.conventions.keys().map(String::as_str)
    }

    /// Resolve a convention by name.
    pub fn resolve(&self, name: &str) -> BagResult<Arc<dyn Merger>> {
        self.conventions
            .get(name)
            .cloned()
            .ok_or_else(|| BagError::Config {
                message: format!("unknown merge convention: {}", name),
            })
    }
}
