//! Finishing a bag: payload manifest, multibag lookup files and the
//! BagIt tag files.

use super::BagBuilder;
use crate::bag::tagfile::{format_baginfo, read_baginfo, BagInfo};
use crate::bag::{
    BAGINFO_FILE, BAGIT_FILE, DATA_DIR, FILE_LOOKUP_FILE, MEMBER_BAGS_FILE, METADATA_DIR,
    MULTIBAG_DIR,
};
use crate::checksum::ChecksumAlgorithm;
use crate::error::BagResult;
use crate::nerdm::{read_nerd, recorded_checksum, NERDMD_FILENAME};
use crate::paths::{join_relpath, relative_to};
use serde_json::Value;
use std::fmt::Write as _;
use std::fs;
use walkdir::WalkDir;

const SIZE_UNITS: [&str; 6] = ["B", "kB", "MB", "GB", "TB", "PB"];

/// Human-readable size with 1000-based units and four significant digits.
///
/// ```
/// use pdr_bagit::format_bytes;
///
/// assert_eq!(format_bytes(108), "108 B");
/// assert_eq!(format_bytes(34569), "34.57 kB");
/// assert_eq!(format_bytes(14419834569), "14.42 GB");
/// ```
pub fn format_bytes(nbytes: u64) -> String {
    if nbytes < 1000 {
        return format!("{} B", nbytes);
    }
    let mut value = nbytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    let mut text = four_significant(value);
    // rounding can carry into the next unit (999.9995 kB -> 1 MB)
    if text.parse::<f64>().is_ok_and(|v| v >= 1000.0) && unit < SIZE_UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
        text = four_significant(value);
    }
    let text = if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text.as_str()
    };
    format!("{} {}", text, SIZE_UNITS[unit])
}

fn four_significant(value: f64) -> String {
    let int_digits = if value >= 100.0 {
        3
    } else if value >= 10.0 {
        2
    } else {
        1
    };
    format!("{:.*}", 4usize.saturating_sub(int_digits), value)
}

impl BagBuilder {
    /// Write `manifest-<alg>.txt` covering every payload file.
    ///
    /// With `reuse_cached`, a checksum already recorded in a file's
    /// component record is used when its algorithm matches and its
    /// recorded size (if any) agrees with the file on disk.
    pub fn write_data_manifest(&self, reuse_cached: bool) -> BagResult<()> {
        self.ensure_bagdir()?;
        let alg = self.manifest_algorithm();
        let bag = self.reader()?;

        let mut out = String::new();
        let mut count = 0usize;
        for path in bag.iter_data_files() {
            let path = path?;
            let file = join_relpath(&self.data_dir, &path);
            let cached = if reuse_cached {
                self.cached_checksum(&path, alg)?
            } else {
                None
            };
            let hash = match cached {
                Some(hash) => hash,
                None => alg.digest_file(&file)?,
            };
            let _ = writeln!(out, "{} {}/{}", hash, DATA_DIR, path);
            count += 1;
        }

        fs::write(self.bagdir.join(alg.manifest_name()), out)?;
        let _guard = self.span.enter();
        tracing::info!(algorithm = %alg, files = count, "wrote payload manifest");
        Ok(())
    }

    fn cached_checksum(&self, path: &str, alg: ChecksumAlgorithm) -> BagResult<Option<String>> {
        let nerdfile = join_relpath(&self.metadata_dir, path).join(NERDMD_FILENAME);
        if !nerdfile.is_file() {
            return Ok(None);
        }
        let record = read_nerd(&nerdfile)?;
        let Some((recorded_alg, hash)) = recorded_checksum(&record) else {
            return Ok(None);
        };
        if recorded_alg != alg {
            return Ok(None);
        }
        if let Some(size) = record.get("size").and_then(Value::as_u64) {
            let actual = fs::metadata(join_relpath(&self.data_dir, path))?.len();
            if actual != size {
                let _guard = self.span.enter();
                tracing::debug!(path, "cached checksum is stale; recomputing");
                return Ok(None);
            }
        }
        Ok(Some(hash.to_string()))
    }

    /// Write `multibag/member-bags.tsv` and `multibag/file-lookup.tsv`.
    ///
    /// The lookup maps every payload file and every metadata JSON file to
    /// this bag.
    pub fn write_mbag_files(&self) -> BagResult<()> {
        self.ensure_bag_structure()?;
        let mbdir = self.bagdir.join(MULTIBAG_DIR);
        fs::create_dir_all(&mbdir)?;
        fs::write(mbdir.join(MEMBER_BAGS_FILE), format!("{}\n", self.bagname))?;

        let mut lookup = String::new();
        for path in self.reader()?.iter_data_files() {
            let _ = writeln!(lookup, "{}/{}\t{}", DATA_DIR, path?, self.bagname);
        }
        for entry in WalkDir::new(&self.metadata_dir)
            .min_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            if !entry.file_type().is_file()
                || entry.path().extension().and_then(|e| e.to_str()) != Some("json")
            {
                continue;
            }
            if let Some(rel) = relative_to(&self.metadata_dir, entry.path()) {
                let _ = writeln!(lookup, "{}/{}\t{}", METADATA_DIR, rel, self.bagname);
            }
        }
        fs::write(mbdir.join(FILE_LOOKUP_FILE), lookup)?;

        let _guard = self.span.enter();
        tracing::debug!("wrote multibag files");
        Ok(())
    }

    /// Write `bagit.txt`.
    pub fn write_bagit_ver(&self) -> BagResult<()> {
        self.ensure_bagdir()?;
        let content = format!(
            "BagIt-Version: {}\nTag-File-Character-Encoding: {}\n",
            self.config.bagit_version, self.config.tag_file_encoding
        );
        fs::write(self.bagdir.join(BAGIT_FILE), content)?;
        Ok(())
    }

    /// Write `info` to `bag-info.txt`.
    ///
    /// With `overwrite` the file is replaced. Otherwise existing entries
    /// come first and new values for an existing name are appended to it.
    pub fn write_baginfo_data(&self, info: &BagInfo, overwrite: bool) -> BagResult<()> {
        self.ensure_bagdir()?;
        let infofile = self.bagdir.join(BAGINFO_FILE);
        let merged = if overwrite {
            info.clone()
        } else {
            let mut merged = read_baginfo(&infofile)?;
            for (name, values) in info {
                merged
                    .entry(name.clone())
                    .or_default()
                    .extend(values.iter().cloned());
            }
            merged
        };
        fs::write(
            &infofile,
            format_baginfo(&merged, self.config.baginfo_line_width),
        )?;
        Ok(())
    }

    /// Fill `bag-info.txt` with configured defaults and the values derived
    /// from the bag's current contents.
    ///
    /// Starts from the existing file unless `overwrite` is set. Configured
    /// entries fill only names that are absent; `Payload-Oxum`, `Bag-Size`,
    /// `External-Identifier`, `Internal-Sender-Identifier`, `Bagging-Date`
    /// and `Bag-Group-Identifier` are always recomputed. Entries with empty
    /// values are dropped.
    pub fn ensure_baginfo(&self, overwrite: bool) -> BagResult<()> {
        self.ensure_bagdir()?;
        let infofile = self.bagdir.join(BAGINFO_FILE);
        let mut info = if overwrite {
            BagInfo::new()
        } else {
            read_baginfo(&infofile)?
        };

        for (name, values) in self.config.effective_bag_info() {
            info.entry(name).or_insert(values);
        }

        let (bytes, count) = self.payload_oxum()?;
        info.insert("Payload-Oxum".into(), vec![format!("{}.{}", bytes, count)]);
        info.insert("Bag-Size".into(), vec![format_bytes(self.bag_size()?)]);

        let external_ids = self.external_identifiers()?;
        if !external_ids.is_empty() {
            info.insert("External-Identifier".into(), external_ids);
        }
        info.insert(
            "Internal-Sender-Identifier".into(),
            vec![self.bagname.clone()],
        );
        info.insert(
            "Bagging-Date".into(),
            vec![chrono::Utc::now().format("%Y-%m-%d").to_string()],
        );
        let group = self
            .bagname
            .split('.')
            .next()
            .unwrap_or(&self.bagname)
            .to_string();
        info.insert("Bag-Group-Identifier".into(), vec![group]);

        for values in info.values_mut() {
            values.retain(|v| !v.trim().is_empty());
        }
        info.retain(|_, values| !values.is_empty());

        self.write_baginfo_data(&info, true)?;
        let _guard = self.span.enter();
        tracing::info!(payload_files = count, payload_bytes = bytes, "wrote bag-info.txt");
        Ok(())
    }

    /// Total bytes and number of payload files.
    fn payload_oxum(&self) -> BagResult<(u64, usize)> {
        let mut bytes = 0u64;
        let mut count = 0usize;
        for path in self.reader()?.iter_data_files() {
            bytes += fs::metadata(join_relpath(&self.data_dir, &path?))?.len();
            count += 1;
        }
        Ok((bytes, count))
    }

    /// Bytes in every file of the bag except `bag-info.txt` itself.
    fn bag_size(&self) -> BagResult<u64> {
        let infofile = self.bagdir.join(BAGINFO_FILE);
        let mut total = 0u64;
        for entry in WalkDir::new(&self.bagdir).min_depth(1) {
            let entry = entry?;
            if entry.file_type().is_file() && entry.path() != infofile {
                total += entry.metadata()?.len();
            }
        }
        Ok(total)
    }

    /// The bag's ARK and, if recorded, its DOI.
    fn external_identifiers(&self) -> BagResult<Vec<String>> {
        let root = self.root_record()?;
        let mut ids = Vec::new();
        let ark = self.id.clone().or_else(|| {
            root.as_ref()
                .and_then(|r| r.get("@id"))
                .and_then(Value::as_str)
                .map(String::from)
        });
        if let Some(ark) = ark {
            ids.push(ark);
        }
        if let Some(doi) = root
            .as_ref()
            .and_then(|r| r.get("doi"))
            .and_then(Value::as_str)
        {
            ids.push(normalize_doi(doi));
        }
        Ok(ids)
    }
}

/// `doi:`-prefixed form of a DOI given bare, prefixed or as a resolver URL.
pub(crate) fn normalize_doi(doi: &str) -> String {
    let bare = doi
        .trim()
        .trim_start_matches("https://doi.org/")
        .trim_start_matches("http://doi.org/")
        .trim_start_matches("http://dx.doi.org/")
        .trim_start_matches("doi:");
    format!("doi:{}", bare)
}
