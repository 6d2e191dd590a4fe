//! Read access to a NIST preservation bag.

use super::tagfile::{read_baginfo, BagInfo, FetchRecords, TagLines};
use super::{BAGINFO_FILE, DATA_DIR, FETCH_FILE, METADATA_DIR};
use crate::error::{BagError, BagResult};
use crate::nerdm::convert::{ComponentCounter, FilepathHierarchy, HierarchyBuilder, InventoryCounter};
use crate::nerdm::merge::{DevMerger, Merger, MergerRegistry};
use crate::nerdm::{
    has_type, read_nerd, ComponentType, Record, ANNOTS_FILENAME, NERDMD_FILENAME, POD_FILENAME,
};
use crate::paths::{join_relpath, relative_to, validate_relpath};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// A NIST-compliant BagIt bag on disk, opened for reading.
///
/// # Example
///
/// ```no_run
/// use pdr_bagit::NistBag;
///
/// let bag = NistBag::open("/data/bags/mds00nbc5c.mbag0_4-0").unwrap();
/// let record = bag.nerdm_record(true).unwrap();
/// println!("{} components", record["components"].as_array().map_or(0, |c| c.len()));
///
/// for path in bag.iter_data_files() {
///     println!("  {}", path.unwrap());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct NistBag {
    dir: PathBuf,
    name: String,
    data_dir: PathBuf,
    metadata_dir: PathBuf,
    merger: Arc<dyn Merger>,
    inventory: Arc<dyn InventoryCounter>,
    hierarchy: Arc<dyn HierarchyBuilder>,
}

impl NistBag {
    /// Open an existing bag directory.
    ///
    /// # Errors
    ///
    /// [`BagError::State`] if `dir` is not a directory.
    pub fn open(dir: impl AsRef<Path>) -> BagResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(BagError::State {
                message: format!("bag directory does not exist as a directory: {}", dir.display()),
            });
        }
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            dir: dir.to_path_buf(),
            name,
            data_dir: dir.join(DATA_DIR),
            metadata_dir: dir.join(METADATA_DIR),
            merger: Arc::new(DevMerger),
            inventory: Arc::new(ComponentCounter),
            hierarchy: Arc::new(FilepathHierarchy),
        })
    }

    /// Use a specific annotation merger.
    pub fn with_merger(mut self, merger: Arc<dyn Merger>) -> Self {
        self.merger = merger;
        self
    }

    /// Use the named merge convention from `registry`.
    pub fn with_merge_convention(self, registry: &MergerRegistry, name: &str) -> BagResult<Self> {
        let merger = registry.resolve(name)?;
        Ok(self.with_merger(merger))
    }

    pub fn with_inventory(mut self, counter: Arc<dyn InventoryCounter>) -> Self {
        self.inventory = counter;
        self
    }

    pub fn with_hierarchy(mut self, builder: Arc<dyn HierarchyBuilder>) -> Self {
        self.hierarchy = builder;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn metadata_dir(&self) -> &Path {
        &self.metadata_dir
    }

    pub fn pod_file(&self) -> PathBuf {
        self.metadata_dir.join(POD_FILENAME)
    }

    /// `metadata/<path>/nerdm.json` (the root record for `""`).
    pub fn nerd_file_for(&self, path: &str) -> BagResult<PathBuf> {
        Ok(self.comp_metadata_dir(path)?.join(NERDMD_FILENAME))
    }

    /// `metadata/<path>/annot.json`.
    pub fn annot_file_for(&self, path: &str) -> BagResult<PathBuf> {
        Ok(self.comp_metadata_dir(path)?.join(ANNOTS_FILENAME))
    }

    pub(crate) fn comp_metadata_dir(&self, path: &str) -> BagResult<PathBuf> {
        let path = validate_relpath(path)?;
        Ok(join_relpath(&self.metadata_dir, &path))
    }

    pub(crate) fn comp_data_path(&self, path: &str) -> BagResult<PathBuf> {
        let path = validate_relpath(path)?;
        Ok(join_relpath(&self.data_dir, &path))
    }

    /// True if the component's payload exists or it has a metadata
    /// directory. The root always exists.
    pub fn comp_exists(&self, path: &str) -> BagResult<bool> {
        if validate_relpath(path)?.is_empty() {
            return Ok(true);
        }
        Ok(self.comp_data_path(path)?.exists() || self.comp_metadata_dir(path)?.is_dir())
    }

    /// True if the path is a payload file, or its record is typed as a
    /// data file.
    pub fn is_data_file(&self, path: &str) -> BagResult<bool> {
        if validate_relpath(path)?.is_empty() {
            return Ok(false);
        }
        if self.comp_data_path(path)?.is_file() {
            return Ok(true);
        }
        self.record_has_type(path, ComponentType::DataFile)
    }

    /// True if the path is a payload directory, or its record is typed as
    /// a subcollection. The root is always a subcollection.
    pub fn is_subcoll(&self, path: &str) -> BagResult<bool> {
        if validate_relpath(path)?.is_empty() {
            return Ok(true);
        }
        if self.comp_data_path(path)?.is_dir() {
            return Ok(true);
        }
        self.record_has_type(path, ComponentType::Subcollection)
    }

    fn record_has_type(&self, path: &str, ty: ComponentType) -> BagResult<bool> {
        let nerdfile = self.nerd_file_for(path)?;
        if !nerdfile.exists() {
            return Ok(false);
        }
        Ok(has_type(&read_nerd(&nerdfile)?, ty))
    }

    /// Names of a subcollection's direct children, sorted.
    ///
    /// Combines payload entries with metadata directories that hold a
    /// component record. Names starting with `.` or `_` are skipped.
    ///
    /// # Errors
    ///
    /// [`BagError::BadRequest`] if `path` is not a subcollection.
    pub fn subcoll_children(&self, path: &str) -> BagResult<Vec<String>> {
        if !self.is_subcoll(path)? {
            return Err(BagError::BadRequest {
                bag: self.name.clone(),
                message: format!("does not point to a subcollection: {}", path),
            });
        }

        let visible = |name: &str| !name.starts_with('.') && !name.starts_with('_');
        let mut children = BTreeSet::new();

        let ddir = self.comp_data_path(path)?;
        if ddir.is_dir() {
            for entry in fs::read_dir(&ddir)? {
                let name = entry?.file_name().to_string_lossy().into_owned();
                if visible(&name) {
                    children.insert(name);
                }
            }
        }

        let mdir = self.comp_metadata_dir(path)?;
        if mdir.is_dir() {
            for entry in fs::read_dir(&mdir)? {
                let entry = entry?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if visible(&name) && entry.path().join(NERDMD_FILENAME).is_file() {
                    children.insert(name);
                }
            }
        }

        Ok(children.into_iter().collect())
    }

    /// The stored record for one component, optionally with its annotation
    /// overlay merged in.
    ///
    /// # Errors
    ///
    /// [`BagError::ComponentNotFound`] if the component has no record.
    pub fn nerd_metadata_for(&self, path: &str, merge_annots: bool) -> BagResult<Record> {
        let nerdfile = self.nerd_file_for(path)?;
        if !nerdfile.exists() {
            return Err(BagError::ComponentNotFound {
                path: path.to_string(),
                bag: self.name.clone(),
            });
        }
        let record = read_nerd(&nerdfile)?;
        if !merge_annots {
            return Ok(record);
        }
        self.merge_annots_from(record, &self.annot_file_for(path)?)
    }

    fn merge_annots_from(&self, record: Record, annotfile: &Path) -> BagResult<Record> {
        if !annotfile.exists() {
            return Ok(record);
        }
        let annots = read_nerd(annotfile)?;
        match self
            .merger
            .merge(&Value::Object(record), &Value::Object(annots))
        {
            Value::Object(merged) => Ok(merged),
            _ => Err(BagError::Format {
                file: annotfile.display().to_string(),
                message: "annotation merge did not produce an object".into(),
            }),
        }
    }

    /// The full resource record: the root record plus every component
    /// record found under `metadata/`, in directory-walk order.
    ///
    /// `inventory` is computed when the root record lacks one;
    /// `dataHierarchy` is always recomputed and dropped when empty.
    pub fn nerdm_record(&self, merge_annots: bool) -> BagResult<Record> {
        let mut out = self.nerd_metadata_for("", merge_annots)?;
        let mut components = match out.remove("components") {
            Some(Value::Array(comps)) => comps,
            _ => Vec::new(),
        };

        let walker = WalkDir::new(&self.metadata_dir)
            .min_depth(1)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let nerdfile = entry.path().join(NERDMD_FILENAME);
            if !nerdfile.is_file() {
                continue;
            }
            let mut comp = read_nerd(&nerdfile)?;
            if merge_annots {
                comp = self.merge_annots_from(comp, &entry.path().join(ANNOTS_FILENAME))?;
            }
            components.push(Value::Object(comp));
        }

        if !out.contains_key("inventory") {
            out.insert("inventory".into(), self.inventory.inventory(&components));
        }
        out.remove("dataHierarchy");
        let hier = self.hierarchy.build_hierarchy(&components);
        out.insert("components".into(), Value::Array(components));
        if !hier.is_empty() {
            out.insert("dataHierarchy".into(), Value::Array(hier));
        }
        tracing::debug!(bag = %self.name, "assembled resource record");
        Ok(out)
    }

    /// The stored POD record, if any.
    pub fn read_pod(&self) -> BagResult<Option<Record>> {
        let podfile = self.pod_file();
        if !podfile.exists() {
            return Ok(None);
        }
        read_nerd(&podfile).map(Some)
    }

    /// Payload files as `data/`-relative paths, hidden files included.
    ///
    /// The walk is lazy; call again to restart it.
    pub fn iter_data_files(&self) -> impl Iterator<Item = BagResult<String>> + '_ {
        WalkDir::new(&self.data_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(e) if e.file_type().is_file() => relative_to(&self.data_dir, e.path()).map(Ok),
                Ok(_) => None,
                // a bag without a payload directory has no data files
                Err(err)
                    if err.depth() == 0
                        && err
                            .io_error()
                            .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound) =>
                {
                    None
                }
                Err(err) => Some(Err(err.into())),
            })
    }

    /// Entries of `fetch.txt`; empty when the bag has none.
    pub fn iter_fetch_records(&self) -> BagResult<FetchRecords<BufReader<File>>> {
        let fetchfile = self.dir.join(FETCH_FILE);
        if !fetchfile.exists() {
            return Ok(FetchRecords::empty(FETCH_FILE));
        }
        let file = File::open(&fetchfile)?;
        Ok(FetchRecords::new(BufReader::new(file), FETCH_FILE))
    }

    /// Lines of a tag file, with trailing whitespace removed.
    pub fn iter_tagfile_lines(&self, path: &Path) -> BagResult<TagLines<BufReader<File>>> {
        TagLines::open(path)
    }

    /// Name/value data from `bag-info.txt` (or `altfile`); empty if the
    /// file does not exist.
    pub fn get_baginfo(&self, altfile: Option<&Path>) -> BagResult<BagInfo> {
        let infofile = altfile
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.dir.join(BAGINFO_FILE));
        read_baginfo(&infofile)
    }
}
