//! Incremental construction of a NIST preservation bag.
//!
//! [`BagBuilder`] owns one bag directory. Structural operations
//! (`ensure_*`) are idempotent; metadata operations create a component
//! record on first write and shallow-merge later updates onto it. The
//! finishing steps (manifests, tag files, `about.txt`) live in
//! [`finish`](self) and [`about`](self).
//!
//! Every component path is validated before anything on disk changes.

mod about;
mod finish;
mod plog;

pub use finish::format_bytes;

use super::reader::NistBag;
use super::{DATA_DIR, METADATA_DIR};
use crate::checksum::ChecksumAlgorithm;
use crate::config::BuilderConfig;
use crate::error::{BagError, BagResult};
use crate::ident::ArkMinter;
use crate::nerdm::convert::{BasicPodConverter, PodConverter};
use crate::nerdm::{
    checksum_descriptor, component_id, download_url, init_coll_record, init_file_record,
    read_nerd, update_record, write_nerd, ComponentType, Record, ANNOTS_FILENAME,
    NERDMD_FILENAME, POD_FILENAME,
};
use crate::paths::{ancestors_of, join_relpath, relative_to, validate_relpath};
use plog::PreservationLog;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Options for [`BagBuilder::init_filemd_for`].
#[derive(Debug, Clone, Copy)]
pub struct FileMdOptions<'a> {
    pub component_type: ComponentType,
    /// Persist the record to `metadata/<path>/nerdm.json`.
    pub write: bool,
    /// File to measure for `size`, `mediaType` and `checksum`.
    pub examine: Option<&'a Path>,
}

impl Default for FileMdOptions<'_> {
    fn default() -> Self {
        Self {
            component_type: ComponentType::DataFile,
            write: false,
            examine: None,
        }
    }
}

/// Options for [`BagBuilder::add_data_file`].
#[derive(Debug, Clone, Copy)]
pub struct AddFileOptions {
    /// Create or update the file's component record.
    pub init_metadata: bool,
    /// Measure the copied file when initializing metadata.
    pub examine: bool,
}

impl Default for AddFileOptions {
    fn default() -> Self {
        Self {
            init_metadata: true,
            examine: true,
        }
    }
}

/// Options for [`BagBuilder::add_ds_pod`].
#[derive(Debug, Clone, Copy)]
pub struct PodOptions {
    /// Convert the POD record into the resource record.
    pub convert: bool,
    /// Write a component record for each converted file component.
    pub savefilemd: bool,
}

impl Default for PodOptions {
    fn default() -> Self {
        Self {
            convert: true,
            savefilemd: true,
        }
    }
}

/// Builds a NIST preservation bag in `<parent>/<bagname>`.
///
/// # Example
///
/// ```no_run
/// use pdr_bagit::{AddFileOptions, BagBuilder, BuilderConfig};
/// use std::path::Path;
///
/// let mut bag = BagBuilder::new("/tmp/bags", "mds00nbc5c", BuilderConfig::default()).unwrap();
/// bag.set_ediid(Some("EBC9DB05EDEA5B0EE043065706812DF81")).unwrap();
/// bag.add_data_file("trial1.json", Some(Path::new("sip/trial1.json")), AddFileOptions::default())
///     .unwrap();
/// bag.write_data_manifest(false).unwrap();
/// ```
#[derive(Debug)]
pub struct BagBuilder {
    bagname: String,
    bagdir: PathBuf,
    data_dir: PathBuf,
    metadata_dir: PathBuf,
    config: BuilderConfig,
    distrib_base: String,
    minter: ArkMinter,
    id: Option<String>,
    ediid: Option<String>,
    pod_converter: Arc<dyn PodConverter>,
    span: tracing::Span,
    plog: PreservationLog,
}

impl BagBuilder {
    /// Create a builder for `<parent_dir>/<bagname>`.
    ///
    /// Nothing is created on disk until the first mutating operation. If
    /// the bag already holds a resource record, its `@id` and `ediid` are
    /// picked up.
    pub fn new(
        parent_dir: impl AsRef<Path>,
        bagname: impl Into<String>,
        config: BuilderConfig,
    ) -> BagResult<Self> {
        let bagname = bagname.into();
        if bagname.is_empty() || bagname.contains('/') || bagname == "." || bagname == ".." {
            return Err(BagError::Config {
                message: format!("not a usable bag name: '{}'", bagname),
            });
        }
        let logname = config.logname.as_str();
        if logname.is_empty() || logname.contains('/') || logname == "." || logname == ".." {
            return Err(BagError::Config {
                message: format!("not a usable log file name: '{}'", logname),
            });
        }
        let bagdir = parent_dir.as_ref().join(&bagname);
        let distrib_base = config.distrib_base();
        let minter = config.minter();
        let span = tracing::info_span!("bag", name = %bagname);
        let plog = PreservationLog::new(bagdir.join(&config.logname));

        let mut builder = Self {
            data_dir: bagdir.join(DATA_DIR),
            metadata_dir: bagdir.join(METADATA_DIR),
            bagname,
            bagdir,
            pod_converter: Arc::new(BasicPodConverter::new(distrib_base.clone())),
            distrib_base,
            minter,
            config,
            id: None,
            ediid: None,
            span,
            plog,
        };

        let rootfile = builder.metadata_dir.join(NERDMD_FILENAME);
        if rootfile.is_file() {
            let root = read_nerd(&rootfile)?;
            builder.id = builder
                .minter
                .fix_id(root.get("@id").and_then(Value::as_str));
            builder.ediid = root.get("ediid").and_then(Value::as_str).map(String::from);
        }
        Ok(builder)
    }

    /// Replace the POD converter used by [`BagBuilder::add_ds_pod`].
    pub fn with_pod_converter(mut self, converter: Arc<dyn PodConverter>) -> Self {
        self.pod_converter = converter;
        self
    }

    pub fn bagname(&self) -> &str {
        &self.bagname
    }

    pub fn bagdir(&self) -> &Path {
        &self.bagdir
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Name of the preservation log file in the bag root.
    pub fn logname(&self) -> &str {
        &self.config.logname
    }

    pub fn log_file(&self) -> &Path {
        self.plog.path()
    }

    /// Append a message to the bag's preservation log.
    ///
    /// The message is also emitted as an `info` event in the bag's span.
    /// Nothing is written to the log before the bag directory exists.
    pub fn record(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        self.plog.info(&self.bagname, message);
        let _guard = self.span.enter();
        tracing::info!("{}", message);
    }

    fn record_warning(&self, message: &str) {
        self.plog.warn(&self.bagname, message);
        let _guard = self.span.enter();
        tracing::warn!("{}", message);
    }

    /// The bag's ARK identifier, once known.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The dataset's EDI identifier, once known.
    pub fn ediid(&self) -> Option<&str> {
        self.ediid.as_deref()
    }

    /// Download URL for a payload file under the configured distribution
    /// service.
    pub fn download_url(&self, ediid: &str, path: &str) -> String {
        download_url(&self.distrib_base, ediid, path)
    }

    /// A reader over the bag as it currently stands.
    pub fn reader(&self) -> BagResult<NistBag> {
        NistBag::open(&self.bagdir)
    }

    pub fn pod_file(&self) -> PathBuf {
        self.metadata_dir.join(POD_FILENAME)
    }

    pub fn nerdm_file_for(&self, path: &str) -> BagResult<PathBuf> {
        Ok(self.meta_dir_for(path)?.join(NERDMD_FILENAME))
    }

    pub fn annot_file_for(&self, path: &str) -> BagResult<PathBuf> {
        Ok(self.meta_dir_for(path)?.join(ANNOTS_FILENAME))
    }

    fn meta_dir_for(&self, path: &str) -> BagResult<PathBuf> {
        Ok(join_relpath(&self.metadata_dir, &validate_relpath(path)?))
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    /// Create the bag directory if needed.
    pub fn ensure_bagdir(&self) -> BagResult<()> {
        let _guard = self.span.enter();
        if !self.bagdir.exists() {
            fs::create_dir_all(&self.bagdir)?;
            self.record(format!("Created preservation bag: {}", self.bagname));
        } else if !self.bagdir.is_dir() {
            return Err(BagError::State {
                message: format!("bag path exists but is not a directory: {}", self.bagdir.display()),
            });
        }
        Ok(())
    }

    /// Create the bag root, `data/`, `metadata/` and any configured extra
    /// tag directories.
    pub fn ensure_bag_structure(&self) -> BagResult<()> {
        let extras = self
            .config
            .extra_tag_dirs
            .iter()
            .map(|d| validate_relpath(d))
            .collect::<BagResult<Vec<_>>>()?;

        self.ensure_bagdir()?;
        let _guard = self.span.enter();
        fs::create_dir_all(&self.data_dir)?;
        fs::create_dir_all(&self.metadata_dir)?;
        for extra in extras.iter().filter(|d| !d.is_empty()) {
            fs::create_dir_all(join_relpath(&self.bagdir, extra))?;
        }
        Ok(())
    }

    /// Create the payload parent directory and the metadata directory for
    /// a data file.
    pub fn ensure_datafile_dirs(&self, path: &str) -> BagResult<()> {
        let path = validate_relpath(path)?;
        self.ensure_bag_structure()?;
        let datafile = join_relpath(&self.data_dir, &path);
        if let Some(parent) = datafile.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(join_relpath(&self.metadata_dir, &path))?;
        Ok(())
    }

    /// Create the metadata directory for a component.
    pub fn ensure_metadata_dirs(&self, path: &str) -> BagResult<()> {
        let path = validate_relpath(path)?;
        self.ensure_bag_structure()?;
        fs::create_dir_all(join_relpath(&self.metadata_dir, &path))?;
        Ok(())
    }

    /// Give every ancestor of `path` a subcollection record, creating only
    /// those that are missing. The component itself is not touched.
    pub fn ensure_ansc_collmd(&self, path: &str) -> BagResult<()> {
        let path = validate_relpath(path)?;
        self.ensure_bag_structure()?;
        for ansc in ancestors_of(&path) {
            if !join_relpath(&self.metadata_dir, &ansc)
                .join(NERDMD_FILENAME)
                .exists()
            {
                self.init_collmd_for(&ansc, true)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Component metadata
    // ------------------------------------------------------------------

    /// Minimal record for a file component; see [`FileMdOptions`].
    ///
    /// `downloadURL` is included once the EDI id is known.
    pub fn init_filemd_for(&self, path: &str, opts: FileMdOptions<'_>) -> BagResult<Record> {
        let path = validate_relpath(path)?;
        if path.is_empty() {
            return Err(BagError::BadRequest {
                bag: self.bagname.clone(),
                message: "the resource root is not a file".into(),
            });
        }
        let url = self.ediid.as_deref().map(|e| self.download_url(e, &path));
        let mut md = init_file_record(&path, opts.component_type, url);
        if let Some(file) = opts.examine {
            self.examine_file(&mut md, &path, file)?;
        }
        if opts.write {
            self.write_comp_record(&path, &md)?;
        }
        Ok(md)
    }

    /// Minimal record for a subcollection, written when `write` is set.
    pub fn init_collmd_for(&self, path: &str, write: bool) -> BagResult<Record> {
        let path = validate_relpath(path)?;
        let md = init_coll_record(&path);
        if write {
            self.write_comp_record(&path, &md)?;
        }
        Ok(md)
    }

    /// Shallow-merge `md` onto a file component's record (or its minimal
    /// record) and persist the result.
    pub fn add_metadata_for_file(
        &self,
        path: &str,
        md: &Record,
        component_type: ComponentType,
    ) -> BagResult<Record> {
        let path = validate_relpath(path)?;
        let nerdfile = join_relpath(&self.metadata_dir, &path).join(NERDMD_FILENAME);
        let mut out = if nerdfile.exists() {
            read_nerd(&nerdfile)?
        } else {
            self.init_filemd_for(
                &path,
                FileMdOptions {
                    component_type,
                    ..Default::default()
                },
            )?
        };
        update_record(&mut out, md);
        self.write_comp_record(&path, &out)?;
        Ok(out)
    }

    /// Shallow-merge `md` onto a subcollection's record and persist it.
    pub fn add_metadata_for_coll(&self, path: &str, md: &Record) -> BagResult<Record> {
        let path = validate_relpath(path)?;
        let nerdfile = join_relpath(&self.metadata_dir, &path).join(NERDMD_FILENAME);
        let mut out = if nerdfile.exists() {
            read_nerd(&nerdfile)?
        } else {
            self.init_collmd_for(&path, false)?
        };
        update_record(&mut out, md);
        self.write_comp_record(&path, &out)?;
        Ok(out)
    }

    fn write_comp_record(&self, path: &str, md: &Record) -> BagResult<()> {
        self.ensure_metadata_dirs(path)?;
        self.ensure_ansc_collmd(path)?;
        let _guard = self.span.enter();
        write_nerd(&join_relpath(&self.metadata_dir, path).join(NERDMD_FILENAME), md)?;
        tracing::debug!(path, "wrote component metadata");
        Ok(())
    }

    fn examine_file(&self, md: &mut Record, path: &str, file: &Path) -> BagResult<()> {
        let alg = self.config.manifest_algorithm;
        let size = fs::metadata(file)?.len();
        let hash = alg.digest_file(file)?;
        let media_type = mime_guess::from_path(path).first_or_octet_stream();

        md.insert("size".into(), json!(size));
        md.insert("mediaType".into(), json!(media_type.essence_str()));
        md.insert("checksum".into(), checksum_descriptor(alg, &hash));
        Ok(())
    }

    /// Copy `src` (when given) into the payload at `path` and, per
    /// `opts`, create or update its component record.
    pub fn add_data_file(
        &self,
        path: &str,
        src: Option<&Path>,
        opts: AddFileOptions,
    ) -> BagResult<()> {
        let path = validate_relpath(path)?;
        self.ensure_datafile_dirs(&path)?;
        let dest = join_relpath(&self.data_dir, &path);

        if let Some(src) = src {
            fs::copy(src, &dest)?;
            self.record(format!("Added data file: {}", path));
        }

        if opts.init_metadata {
            let examine = (opts.examine && dest.is_file()).then_some(dest.as_path());
            let ty = file_type_for(&path);
            let md = self.init_filemd_for(
                &path,
                FileMdOptions {
                    component_type: ty,
                    write: false,
                    examine,
                },
            )?;
            self.add_metadata_for_file(&path, &md, ty)?;
        }
        Ok(())
    }

    /// Store a resource record.
    ///
    /// The derived `inventory` and `dataHierarchy` are dropped; `ediid` and
    /// `@id` are captured. With `savefilemd`, every component carrying a
    /// `filepath` gets its own record and only the remaining components
    /// stay in the root record.
    pub fn add_res_nerd(&mut self, record: &Record, savefilemd: bool) -> BagResult<()> {
        let mut res = record.clone();
        res.remove("inventory");
        res.remove("dataHierarchy");
        let components = match res.remove("components") {
            Some(Value::Array(comps)) => comps,
            _ => Vec::new(),
        };

        // validate every path before touching the bag
        let mut file_comps: Vec<(String, Record)> = Vec::new();
        let mut root_comps: Vec<Value> = Vec::new();
        for comp in components {
            let filepath = comp.get("filepath").and_then(Value::as_str).map(String::from);
            match (savefilemd, filepath, comp) {
                (true, Some(fp), Value::Object(map)) => {
                    file_comps.push((validate_relpath(&fp)?, map));
                }
                (_, _, other) => root_comps.push(other),
            }
        }

        self.ensure_bag_structure()?;
        if let Some(ediid) = res.get("ediid").and_then(Value::as_str) {
            self.ediid = Some(ediid.to_string());
        }
        match res.get("@id").and_then(Value::as_str) {
            Some(id) => {
                let fixed = self.minter.fix_id(Some(id));
                if let Some(fixed) = &fixed {
                    res.insert("@id".into(), json!(fixed));
                }
                self.id = fixed;
            }
            None => {
                if let Some(id) = &self.id {
                    res.insert("@id".into(), json!(id));
                }
            }
        }

        for (fp, mut comp) in file_comps {
            comp.remove("@id");
            match ComponentType::of_record(&comp) {
                Some(ComponentType::Subcollection) => {
                    self.add_metadata_for_coll(&fp, &comp)?;
                }
                Some(ty) if ty.is_file() => {
                    self.add_metadata_for_file(&fp, &comp, ty)?;
                }
                _ => {
                    self.record_warning(&format!(
                        "component type not recognized, kept in resource record: {}",
                        fp
                    ));
                    comp.insert("@id".into(), json!(component_id(&fp)));
                    root_comps.push(Value::Object(comp));
                }
            }
        }

        if !root_comps.is_empty() {
            res.insert("components".into(), Value::Array(root_comps));
        }
        write_nerd(&self.metadata_dir.join(NERDMD_FILENAME), &res)?;
        self.record(format!(
            "Stored resource record: {}",
            self.id.as_deref().unwrap_or("(no id)")
        ));
        Ok(())
    }

    /// Set (or clear) the EDI identifier.
    ///
    /// Updates the resource record's `ediid` and regenerates `downloadURL`
    /// for every file component that already has one.
    pub fn set_ediid(&mut self, ediid: Option<&str>) -> BagResult<()> {
        self.ediid = ediid.map(String::from);
        let span = self.span.clone();
        let _guard = span.enter();

        let rootfile = self.metadata_dir.join(NERDMD_FILENAME);
        if rootfile.is_file() {
            let mut root = read_nerd(&rootfile)?;
            match ediid {
                Some(e) => root.insert("ediid".into(), json!(e)),
                None => root.remove("ediid"),
            };
            write_nerd(&rootfile, &root)?;
        }

        if !self.metadata_dir.is_dir() {
            return Ok(());
        }
        for entry in WalkDir::new(&self.metadata_dir).min_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let nerdfile = entry.path().join(NERDMD_FILENAME);
            if !nerdfile.is_file() {
                continue;
            }
            let mut comp = read_nerd(&nerdfile)?;
            if !comp.contains_key("downloadURL") {
                continue;
            }
            let filepath = comp
                .get("filepath")
                .and_then(Value::as_str)
                .map(String::from)
                .or_else(|| relative_to(&self.metadata_dir, entry.path()));
            match (ediid, filepath) {
                (Some(e), Some(fp)) => {
                    comp.insert("downloadURL".into(), json!(self.download_url(e, &fp)));
                }
                _ => {
                    comp.remove("downloadURL");
                }
            }
            write_nerd(&nerdfile, &comp)?;
        }
        tracing::debug!(ediid = ?self.ediid, "updated EDI identifier");
        Ok(())
    }

    /// Set (or clear) the ARK identifier, normalizing it first.
    pub fn set_id(&mut self, id: Option<&str>) -> BagResult<()> {
        self.id = self.minter.fix_id(id);
        let rootfile = self.metadata_dir.join(NERDMD_FILENAME);
        if rootfile.is_file() {
            let mut root = read_nerd(&rootfile)?;
            match &self.id {
                Some(id) => root.insert("@id".into(), json!(id)),
                None => root.remove("@id"),
            };
            write_nerd(&rootfile, &root)?;
        }
        Ok(())
    }

    /// Shallow-merge `md` into the component's annotation overlay.
    pub fn add_annotation_for(&self, path: &str, md: &Record) -> BagResult<Record> {
        let path = validate_relpath(path)?;
        self.ensure_metadata_dirs(&path)?;
        let annotfile = join_relpath(&self.metadata_dir, &path).join(ANNOTS_FILENAME);
        let mut annots = if annotfile.exists() {
            read_nerd(&annotfile)?
        } else {
            Record::new()
        };
        update_record(&mut annots, md);
        write_nerd(&annotfile, &annots)?;
        let _guard = self.span.enter();
        tracing::debug!(path = %path, "updated annotations");
        Ok(annots)
    }

    /// Store a POD record and, per `opts`, convert it into the resource
    /// record.
    ///
    /// Conversion mints an ARK from the POD `identifier` when no id is set
    /// and records that identifier as the EDI id.
    pub fn add_ds_pod(&mut self, pod: &Record, opts: PodOptions) -> BagResult<()> {
        self.ensure_bag_structure()?;
        write_nerd(&self.pod_file(), pod)?;
        {
            let _guard = self.span.enter();
            tracing::debug!("wrote POD record");
        }
        if !opts.convert {
            return Ok(());
        }

        let ediid = pod
            .get("identifier")
            .and_then(Value::as_str)
            .ok_or_else(|| BagError::Format {
                file: POD_FILENAME.to_string(),
                message: "POD record has no string identifier".into(),
            })?;
        if self.id.is_none() {
            self.id = Some(self.minter.mint(ediid));
        }
        let mut nerd = self.pod_converter.convert(pod, self.id.as_deref())?;
        nerd.insert("ediid".into(), json!(ediid));
        self.add_res_nerd(&nerd, opts.savefilemd)
    }

    /// Remove a component's payload and metadata.
    ///
    /// With `trim`, ancestors left without payload entries or child
    /// metadata are pruned too; `data/`, `metadata/` and the bag root are
    /// never removed. Returns true if anything was removed.
    pub fn remove_component(&self, path: &str, trim: bool) -> BagResult<bool> {
        let path = validate_relpath(path)?;
        if path.is_empty() {
            return Err(BagError::BadRequest {
                bag: self.bagname.clone(),
                message: "cannot remove the resource root".into(),
            });
        }
        let mut removed = false;

        let datap = join_relpath(&self.data_dir, &path);
        if datap.is_dir() {
            fs::remove_dir_all(&datap)?;
            removed = true;
        } else if datap.exists() {
            fs::remove_file(&datap)?;
            removed = true;
        }
        let metap = join_relpath(&self.metadata_dir, &path);
        if metap.is_dir() {
            fs::remove_dir_all(&metap)?;
            removed = true;
        }

        if trim {
            for ansc in ancestors_of(&path).iter().rev() {
                let ddir = join_relpath(&self.data_dir, ansc);
                let mdir = join_relpath(&self.metadata_dir, ansc);
                let data_empty = !ddir.exists() || dir_is_empty(&ddir)?;
                let meta_leaf = !mdir.exists() || !has_subdirs(&mdir)?;
                if !(data_empty && meta_leaf) {
                    break;
                }
                if ddir.exists() {
                    fs::remove_dir(&ddir)?;
                }
                if mdir.exists() {
                    fs::remove_dir_all(&mdir)?;
                }
                let _guard = self.span.enter();
                tracing::debug!(path = %ansc, "trimmed empty collection");
            }
        }

        if removed {
            self.record(format!("Removed component: {}", path));
        }
        Ok(removed)
    }

    /// Remove empty directories under `metadata/`, deepest first.
    pub fn trim_metadata_folders(&self) -> BagResult<()> {
        let _guard = self.span.enter();
        for dir in dirs_deepest_first(&self.metadata_dir)? {
            if dir_is_empty(&dir)? {
                fs::remove_dir(&dir)?;
                tracing::debug!(dir = %dir.display(), "removed empty metadata directory");
            }
        }
        Ok(())
    }

    /// Remove empty directories under `data/`, deepest first. With
    /// `rmmeta`, each removed directory's metadata tree goes too.
    pub fn trim_data_folders(&self, rmmeta: bool) -> BagResult<()> {
        let _guard = self.span.enter();
        for dir in dirs_deepest_first(&self.data_dir)? {
            if !dir_is_empty(&dir)? {
                continue;
            }
            fs::remove_dir(&dir)?;
            tracing::debug!(dir = %dir.display(), "removed empty data directory");
            if rmmeta {
                if let Some(rel) = relative_to(&self.data_dir, &dir) {
                    let mdir = join_relpath(&self.metadata_dir, &rel);
                    if mdir.is_dir() {
                        fs::remove_dir_all(&mdir)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Create minimal records for payload files and directories that lack
    /// one. With `examine`, file records are measured.
    pub fn ensure_comp_metadata(&self, examine: bool) -> BagResult<()> {
        if !self.data_dir.is_dir() {
            return Ok(());
        }
        for entry in WalkDir::new(&self.data_dir).min_depth(1).sort_by_file_name() {
            let entry = entry?;
            let Some(rel) = relative_to(&self.data_dir, entry.path()) else {
                continue;
            };
            if join_relpath(&self.metadata_dir, &rel)
                .join(NERDMD_FILENAME)
                .exists()
            {
                continue;
            }

            if entry.file_type().is_dir() {
                self.init_collmd_for(&rel, true)?;
            } else if entry.file_type().is_file() {
                self.init_filemd_for(
                    &rel,
                    FileMdOptions {
                        component_type: file_type_for(&rel),
                        write: true,
                        examine: examine.then_some(entry.path()),
                    },
                )?;
            } else {
                self.record_warning(&format!(
                    "skipping payload entry that is neither file nor directory: {}",
                    rel
                ));
            }
        }
        Ok(())
    }

    /// The resource record currently stored in the bag, if any.
    pub(crate) fn root_record(&self) -> BagResult<Option<Record>> {
        let rootfile = self.metadata_dir.join(NERDMD_FILENAME);
        if !rootfile.is_file() {
            return Ok(None);
        }
        read_nerd(&rootfile).map(Some)
    }

    pub(crate) fn manifest_algorithm(&self) -> ChecksumAlgorithm {
        self.config.manifest_algorithm
    }
}

/// Checksum files are recognized by extension.
fn file_type_for(path: &str) -> ComponentType {
    if path.ends_with(".sha256") || path.ends_with(".md5") {
        ComponentType::ChecksumFile
    } else {
        ComponentType::DataFile
    }
}

fn dir_is_empty(dir: &Path) -> BagResult<bool> {
    Ok(fs::read_dir(dir)?.next().is_none())
}

fn has_subdirs(dir: &Path) -> BagResult<bool> {
    for entry in fs::read_dir(dir)? {
        if entry?.file_type()?.is_dir() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Directories strictly below `root`, deepest first.
fn dirs_deepest_first(root: &Path) -> BagResult<Vec<PathBuf>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs: Vec<(usize, PathBuf)> = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            dirs.push((entry.depth(), entry.into_path()));
        }
    }
    dirs.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    Ok(dirs.into_iter().map(|(_, p)| p).collect())
}
