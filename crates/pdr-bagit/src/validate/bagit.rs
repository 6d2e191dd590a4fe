//! Rules of the base BagIt profile.

use super::{Severity, ValidationIssue, ValidationResults, Validator};
use crate::bag::tagfile::{read_baginfo, BagInfo};
use crate::bag::{NistBag, BAGINFO_FILE, BAGIT_FILE, DATA_DIR};
use crate::checksum::ChecksumAlgorithm;
use crate::config::{ValidatorConfig, DEFAULT_TAG_ENCODING};
use crate::paths::validate_relpath;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;

pub const BAGIT_PROFILE: &str = "BagIt v0.97";

/// More than this many violations of one kind are summarized.
const REPORT_LIMIT: usize = 4;

lazy_static! {
    static ref MANIFEST_NAME: Regex = Regex::new(r"^manifest-(\w+)\.txt$").unwrap();
    static ref INFO_LINE: Regex = Regex::new(r"^[\w\-]+\s*:\s*\S.*$").unwrap();
}

/// Rule definition for the validator registry.
pub struct RuleDefinition {
    /// Section of the BagIt specification the rule checks.
    pub section: &'static str,
    pub description: &'static str,
    pub check: fn(&NistBag, &ValidatorConfig) -> Vec<ValidationIssue>,
}

/// Static rule registry, run in order.
pub static RULES: &[RuleDefinition] = &[
    RuleDefinition {
        section: "2.1.1",
        description: "bagit.txt declares the BagIt version and tag-file encoding",
        check: check_bagit_txt,
    },
    RuleDefinition {
        section: "2.1.2",
        description: "Payload directory data/ exists",
        check: check_data_dir,
    },
    RuleDefinition {
        section: "2.1.3",
        description: "Manifests are well-formed, complete and match the payload",
        check: check_manifests,
    },
    RuleDefinition {
        section: "2.2.2",
        description: "bag-info.txt is present and well-formed",
        check: check_baginfo,
    },
];

fn issue(spec_id: &str, severity: Severity, message: impl Into<String>) -> ValidationIssue {
    ValidationIssue::new(BAGIT_PROFILE, spec_id, severity, message)
}

/// Push one issue per item, or the first three plus a summary when there
/// are more than [`REPORT_LIMIT`].
fn push_bounded(
    out: &mut Vec<ValidationIssue>,
    items: &[String],
    each: impl Fn(&str) -> ValidationIssue,
    more: impl FnOnce(usize) -> ValidationIssue,
) {
    if items.len() > REPORT_LIMIT {
        out.extend(items[..REPORT_LIMIT - 1].iter().map(|i| each(i)));
        out.push(more(items.len() - (REPORT_LIMIT - 1)));
    } else {
        out.extend(items.iter().map(|i| each(i)));
    }
}

/// `1, 2, 3, ...` style list of line numbers.
fn line_list(lines: &[usize]) -> String {
    let shown: Vec<String> = lines
        .iter()
        .take(if lines.len() > REPORT_LIMIT {
            REPORT_LIMIT - 1
        } else {
            lines.len()
        })
        .map(usize::to_string)
        .collect();
    let mut out = shown.join(", ");
    if lines.len() > REPORT_LIMIT {
        out.push_str(", ...");
    }
    out
}

fn first_value<'a>(info: &'a BagInfo, name: &str) -> Option<&'a str> {
    info.get(name).and_then(|vs| vs.first()).map(String::as_str)
}

fn check_bagit_txt(bag: &NistBag, config: &ValidatorConfig) -> Vec<ValidationIssue> {
    let path = bag.dir().join(BAGIT_FILE);
    if !path.is_file() {
        return vec![issue("2.1.1-1", Severity::Error, "bagit.txt file is missing")];
    }
    let info = match read_baginfo(&path) {
        Ok(info) => info,
        Err(e) => {
            return vec![issue(
                "2.1.1-1",
                Severity::Error,
                format!("bagit.txt could not be read: {}", e),
            )]
        }
    };

    let mut out = Vec::new();
    match first_value(&info, "BagIt-Version") {
        None => out.push(issue(
            "2.1.1-2",
            Severity::Error,
            "bagit.txt: missing element: BagIt-Version",
        )),
        Some(v) if v != config.bagit_version => out.push(issue(
            "2.1.1-3",
            Severity::Error,
            format!("bagit.txt: BagIt-Version not set to {}", config.bagit_version),
        )),
        Some(_) => {}
    }
    match first_value(&info, "Tag-File-Character-Encoding") {
        None => out.push(issue(
            "2.1.1-4",
            Severity::Error,
            "bagit.txt: missing element: Tag-File-Character-Encoding",
        )),
        Some(v) if v != DEFAULT_TAG_ENCODING => out.push(issue(
            "2.1.1-5",
            Severity::Error,
            format!(
                "bagit.txt: Tag-File-Character-Encoding not set to {}",
                DEFAULT_TAG_ENCODING
            ),
        )),
        Some(_) => {}
    }

    if out.is_empty() {
        let names: Vec<&str> = info.keys().map(String::as_str).collect();
        if names != ["BagIt-Version", "Tag-File-Character-Encoding"] {
            out.push(issue(
                "2.1.1-6",
                Severity::Recommendation,
                "bagit.txt: recommend using this element order: \
                 BagIt-Version Tag-File-Character-Encoding",
            ));
        }
    }
    out
}

fn check_data_dir(bag: &NistBag, _config: &ValidatorConfig) -> Vec<ValidationIssue> {
    if bag.data_dir().is_dir() {
        Vec::new()
    } else {
        vec![issue("2.1.2", Severity::Error, "Missing payload directory, data/")]
    }
}

/// Manifest files in the bag root as (file name, algorithm tag), sorted.
fn manifest_files(bag: &NistBag) -> Vec<(String, String)> {
    let Ok(entries) = fs::read_dir(bag.dir()) else {
        return Vec::new();
    };
    let mut found: Vec<(String, String)> = entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_file())
        .filter_map(|e| {
            let name = e.file_name().to_str()?.to_string();
            let tag = MANIFEST_NAME.captures(&name)?.get(1)?.as_str().to_string();
            Some((name, tag))
        })
        .collect();
    found.sort();
    found
}

fn check_manifests(bag: &NistBag, config: &ValidatorConfig) -> Vec<ValidationIssue> {
    let manifests = manifest_files(bag);
    if manifests.is_empty() {
        return vec![issue(
            "2.1.3-1",
            Severity::Error,
            "No manifest-<alg>.txt files found",
        )];
    }

    let mut payload: BTreeSet<String> = BTreeSet::new();
    for path in bag.iter_data_files() {
        match path {
            Ok(p) => {
                payload.insert(format!("{}/{}", DATA_DIR, p));
            }
            Err(e) => tracing::debug!(error = %e, "unreadable payload entry"),
        }
    }

    let mut out = Vec::new();
    for (mfile, tag) in &manifests {
        check_one_manifest(bag, config, mfile, tag, &payload, &mut out);
    }
    out
}

fn check_one_manifest(
    bag: &NistBag,
    config: &ValidatorConfig,
    mfile: &str,
    tag: &str,
    payload: &BTreeSet<String>,
    out: &mut Vec<ValidationIssue>,
) {
    let lines = match bag.iter_tagfile_lines(&bag.dir().join(mfile)) {
        Ok(lines) => lines,
        Err(e) => {
            out.push(issue(
                "2.1.3-2",
                Severity::Error,
                format!("{} could not be read: {}", mfile, e),
            ));
            return;
        }
    };

    let mut bad_lines: Vec<usize> = Vec::new();
    let mut entries: Vec<(String, String)> = Vec::new();
    for (idx, line) in lines.enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                out.push(issue(
                    "2.1.3-2",
                    Severity::Error,
                    format!("{} could not be read: {}", mfile, e),
                ));
                return;
            }
        };
        match line.split_whitespace().collect::<Vec<_>>().as_slice() {
            [digest, path] => {
                let path = path.strip_prefix('*').unwrap_or(*path);
                entries.push((digest.to_string(), path.to_string()));
            }
            _ => bad_lines.push(idx + 1),
        }
    }
    if !bad_lines.is_empty() {
        out.push(issue(
            "2.1.3-2",
            Severity::Error,
            format!("{} format issues found (lines {})", mfile, line_list(&bad_lines)),
        ));
    }

    // payload entries as (digest, normalized bag path)
    let mut listed: Vec<(String, String)> = Vec::new();
    let mut non_payload = 0usize;
    for (digest, path) in entries {
        match validate_relpath(&path) {
            Ok(norm) if norm.starts_with(&format!("{}/", DATA_DIR)) => listed.push((digest, norm)),
            _ => non_payload += 1,
        }
    }
    if non_payload > 0 {
        out.push(issue(
            "2.1.3-3",
            Severity::Error,
            format!(
                "{} lists {} non-payload (i.e. under data/) file(s)",
                mfile, non_payload
            ),
        ));
    }

    let mut missing: Vec<String> = Vec::new();
    let mut present: Vec<(String, String)> = Vec::new();
    for (digest, path) in &listed {
        let full = bag.dir().join(path);
        if !full.exists() {
            missing.push(path.clone());
        } else if !full.is_file() {
            out.push(issue(
                "2.1.3-7",
                Severity::Error,
                format!("Manifest entry is not a file: {}", path),
            ));
        } else {
            present.push((digest.clone(), path.clone()));
        }
    }
    push_bounded(
        out,
        &missing,
        |p| {
            issue(
                "3-1-2",
                Severity::Error,
                format!("Path in manifest missing in payload: {}", p),
            )
        },
        |n| {
            issue(
                "3-1-2",
                Severity::Error,
                format!("{} additional files missing from payload (data/) directory", n),
            )
        },
    );

    let listed_paths: BTreeSet<&str> = listed.iter().map(|(_, p)| p.as_str()).collect();
    let unlisted: Vec<String> = payload
        .iter()
        .filter(|p| !listed_paths.contains(p.as_str()))
        .cloned()
        .collect();
    push_bounded(
        out,
        &unlisted,
        |p| {
            issue(
                "2.1.3-4",
                Severity::Recommendation,
                format!("Payload file not listed in {}: {}", mfile, p),
            )
        },
        |n| {
            issue(
                "2.1.3-4",
                Severity::Recommendation,
                format!("{} additional payload (data/) files missing from {}", n, mfile),
            )
        },
    );

    if !config.check_checksums {
        return;
    }
    let Some(alg) = ChecksumAlgorithm::from_tag(tag) else {
        tracing::debug!(manifest = mfile, "no implementation for algorithm; checksums not verified");
        return;
    };
    let mut failed: Vec<String> = Vec::new();
    for (digest, path) in &present {
        match alg.digest_file(&bag.dir().join(path)) {
            Ok(actual) if actual.eq_ignore_ascii_case(digest) => {}
            Ok(_) => failed.push(path.clone()),
            Err(e) => {
                tracing::debug!(path = %path, error = %e, "could not checksum payload file");
                failed.push(path.clone());
            }
        }
    }
    push_bounded(
        out,
        &failed,
        |p| {
            issue(
                "2.1.3-5",
                Severity::Error,
                format!("{}: Recorded checksum does not match payload file: {}", mfile, p),
            )
        },
        |n| {
            issue(
                "2.1.3-5",
                Severity::Error,
                format!("{}: Checksums don't match for {} additional payload files", mfile, n),
            )
        },
    );
}

fn check_baginfo(bag: &NistBag, _config: &ValidatorConfig) -> Vec<ValidationIssue> {
    let path = bag.dir().join(BAGINFO_FILE);
    if !path.exists() {
        return vec![issue(
            "2.2.2-1",
            Severity::Recommendation,
            "Recommend adding a bag-info.txt file",
        )];
    }
    let lines = match bag.iter_tagfile_lines(&path) {
        Ok(lines) => lines,
        Err(e) => {
            return vec![issue(
                "2.2.2-2",
                Severity::Error,
                format!("bag-info.txt could not be read: {}", e),
            )]
        }
    };

    let mut bad_lines = Vec::new();
    for (idx, line) in lines.enumerate() {
        let lineno = idx + 1;
        let Ok(line) = line else {
            bad_lines.push(lineno);
            break;
        };
        let continuation = line.starts_with(|c: char| c == ' ' || c == '\t');
        let ok = if continuation {
            lineno > 1 && !line.trim().is_empty()
        } else {
            INFO_LINE.is_match(&line)
        };
        if !ok {
            bad_lines.push(lineno);
        }
    }
    if bad_lines.is_empty() {
        Vec::new()
    } else {
        vec![issue(
            "2.2.2-2",
            Severity::Error,
            format!("bag-info.txt format issues found (lines {})", line_list(&bad_lines)),
        )]
    }
}

/// Validator for the base BagIt profile.
#[derive(Debug, Clone, Default)]
pub struct BagItValidator {
    config: ValidatorConfig,
}

impl BagItValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }
}

impl Validator for BagItValidator {
    fn profile(&self) -> &str {
        BAGIT_PROFILE
    }

    fn validate(&self, bag: &NistBag) -> ValidationResults {
        let span = tracing::info_span!("validate", bag = %bag.name(), profile = BAGIT_PROFILE);
        let _guard = span.enter();

        let mut results = ValidationResults::new(bag.name());
        for rule in RULES {
            let issues = (rule.check)(bag, &self.config);
            tracing::debug!(section = rule.section, issues = issues.len(), "rule checked");
            results.issues.extend(issues);
        }
        results
    }
}
