//! BagItValidator integration tests.

use pdr_bagit::nerdm::read_nerd;
use pdr_bagit::{
    AddFileOptions, BagBuilder, BagItValidator, BuilderConfig, NistBag, PodOptions, Severity,
    ValidationResults, Validator, ValidatorConfig,
};
use std::fs;
use std::path::{Path, PathBuf};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/simplesip")
        .join(name)
}

/// A finished bag: payload, metadata, manifest and tag files.
fn complete_bag(tmp: &tempfile::TempDir) -> BagBuilder {
    let mut bag = BagBuilder::new(tmp.path(), "validbag", BuilderConfig::default()).unwrap();
    bag.add_ds_pod(&read_nerd(&fixture("_pod.json")).unwrap(), PodOptions::default())
        .unwrap();
    for p in ["trial1.json", "trial2.json", "trial3/trial3a.json"] {
        bag.add_data_file(p, Some(&fixture(p)), AddFileOptions::default())
            .unwrap();
    }
    bag.write_data_manifest(false).unwrap();
    bag.write_bagit_ver().unwrap();
    bag.ensure_baginfo(true).unwrap();
    bag
}

fn validate(bag: &BagBuilder) -> ValidationResults {
    validate_with(bag, ValidatorConfig::default())
}

fn validate_with(bag: &BagBuilder, config: ValidatorConfig) -> ValidationResults {
    let reader = NistBag::open(bag.bagdir()).unwrap();
    BagItValidator::new(config).validate(&reader)
}

fn messages(results: &ValidationResults, id: &str) -> Vec<String> {
    results.with_id(id).map(|i| i.message.clone()).collect()
}

fn append(path: &Path, text: &str) {
    let mut content = fs::read_to_string(path).unwrap_or_default();
    content.push_str(text);
    fs::write(path, content).unwrap();
}

#[test]
fn test_complete_bag_has_no_issues() {
    let tmp = tempfile::tempdir().unwrap();
    let bag = complete_bag(&tmp);
    let results = validate(&bag);
    assert!(results.issues.is_empty(), "{:#?}", results.issues);
    assert!(results.is_valid());
    assert_eq!(results.bag, "validbag");
}

#[test]
fn test_missing_bagit_txt_is_one_issue() {
    let tmp = tempfile::tempdir().unwrap();
    let bag = complete_bag(&tmp);
    fs::remove_file(bag.bagdir().join("bagit.txt")).unwrap();

    let results = validate(&bag);
    let bagit: Vec<_> = results
        .issues
        .iter()
        .filter(|i| i.spec_id.starts_with("2.1.1"))
        .collect();
    assert_eq!(bagit.len(), 1);
    assert_eq!(bagit[0].spec_id, "2.1.1-1");
    assert_eq!(bagit[0].message, "bagit.txt file is missing");
    assert_eq!(bagit[0].severity, Severity::Error);
    assert_eq!(bagit[0].profile, "BagIt v0.97");
}

#[test]
fn test_bagit_txt_elements() {
    let tmp = tempfile::tempdir().unwrap();
    let bag = complete_bag(&tmp);
    let bagit = bag.bagdir().join("bagit.txt");

    fs::write(&bagit, "BagIt-Version: 1.0\nTag-File-Character-Encoding: UTF-8\n").unwrap();
    assert_eq!(
        messages(&validate(&bag), "2.1.1-3"),
        vec!["bagit.txt: BagIt-Version not set to 0.97"]
    );

    fs::write(&bagit, "BagIt-Version: 0.97\n").unwrap();
    let results = validate(&bag);
    assert_eq!(
        messages(&results, "2.1.1-4"),
        vec!["bagit.txt: missing element: Tag-File-Character-Encoding"]
    );
    assert_eq!(results.with_id("2.1.1-6").count(), 0);

    fs::write(&bagit, "Tag-File-Character-Encoding: Latin-1\n").unwrap();
    let results = validate(&bag);
    assert_eq!(results.with_id("2.1.1-2").count(), 1);
    assert_eq!(results.with_id("2.1.1-5").count(), 1);

    let strict = ValidatorConfig {
        bagit_version: "1.0".into(),
        ..Default::default()
    };
    fs::write(&bagit, "BagIt-Version: 1.0\nTag-File-Character-Encoding: UTF-8\n").unwrap();
    assert!(validate_with(&bag, strict).issues.is_empty());
}

#[test]
fn test_bagit_txt_element_order() {
    let tmp = tempfile::tempdir().unwrap();
    let bag = complete_bag(&tmp);
    fs::write(
        bag.bagdir().join("bagit.txt"),
        "Tag-File-Character-Encoding: UTF-8\nBagIt-Version: 0.97\n",
    )
    .unwrap();

    let results = validate(&bag);
    assert_eq!(results.issues.len(), 1);
    assert_eq!(results.issues[0].spec_id, "2.1.1-6");
    assert_eq!(results.issues[0].severity, Severity::Recommendation);
    assert!(results.is_valid());
}

#[test]
fn test_bagit_txt_extra_element_breaks_recommended_layout() {
    let tmp = tempfile::tempdir().unwrap();
    let bag = complete_bag(&tmp);
    fs::write(
        bag.bagdir().join("bagit.txt"),
        "BagIt-Version: 0.97\nTag-File-Character-Encoding: UTF-8\nContact: someone\n",
    )
    .unwrap();

    let results = validate(&bag);
    assert_eq!(results.issues.len(), 1);
    assert_eq!(results.issues[0].spec_id, "2.1.1-6");
    assert!(results.is_valid());
}

#[test]
fn test_missing_payload_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let bag = complete_bag(&tmp);
    fs::remove_dir_all(bag.bagdir().join("data")).unwrap();

    let results = validate(&bag);
    assert_eq!(
        messages(&results, "2.1.2"),
        vec!["Missing payload directory, data/"]
    );
    assert!(!results.is_valid());
}

#[test]
fn test_missing_manifest() {
    let tmp = tempfile::tempdir().unwrap();
    let bag = complete_bag(&tmp);
    fs::remove_file(bag.bagdir().join("manifest-sha256.txt")).unwrap();

    let results = validate(&bag);
    assert_eq!(
        messages(&results, "2.1.3-1"),
        vec!["No manifest-<alg>.txt files found"]
    );
    assert_eq!(results.issues.len(), 1);
}

#[test]
fn test_manifest_format_issues_are_bounded() {
    let tmp = tempfile::tempdir().unwrap();
    let bag = complete_bag(&tmp);
    let manifest = bag.bagdir().join("manifest-sha256.txt");
    append(&manifest, "justonefield\na b c\nx\ny\nz\n");

    assert_eq!(
        messages(&validate(&bag), "2.1.3-2"),
        vec!["manifest-sha256.txt format issues found (lines 4, 5, 6, ...)"]
    );
}

#[test]
fn test_manifest_blank_line_is_a_format_issue() {
    let tmp = tempfile::tempdir().unwrap();
    let bag = complete_bag(&tmp);
    let manifest = bag.bagdir().join("manifest-sha256.txt");
    append(&manifest, "\n");

    let results = validate(&bag);
    assert_eq!(
        messages(&results, "2.1.3-2"),
        vec!["manifest-sha256.txt format issues found (lines 4)"]
    );
    assert!(!results.is_valid());
}

#[test]
fn test_manifest_star_prefix_is_accepted() {
    let tmp = tempfile::tempdir().unwrap();
    let bag = complete_bag(&tmp);
    let manifest = bag.bagdir().join("manifest-sha256.txt");
    let starred = fs::read_to_string(&manifest)
        .unwrap()
        .replace(" data/", " *data/");
    fs::write(&manifest, starred).unwrap();

    assert!(validate(&bag).issues.is_empty());
}

#[test]
fn test_manifest_non_payload_and_non_file_entries() {
    let tmp = tempfile::tempdir().unwrap();
    let bag = complete_bag(&tmp);
    let manifest = bag.bagdir().join("manifest-sha256.txt");
    append(
        &manifest,
        "abc metadata/nerdm.json\nabc data/../bagit.txt\nabc data/trial3\n",
    );

    let results = validate(&bag);
    assert_eq!(
        messages(&results, "2.1.3-3"),
        vec!["manifest-sha256.txt lists 2 non-payload (i.e. under data/) file(s)"]
    );
    assert_eq!(
        messages(&results, "2.1.3-7"),
        vec!["Manifest entry is not a file: data/trial3"]
    );
}

#[test]
fn test_missing_payload_files_are_bounded() {
    let tmp = tempfile::tempdir().unwrap();
    let bag = complete_bag(&tmp);
    let manifest = bag.bagdir().join("manifest-sha256.txt");

    append(&manifest, "abc data/gone1.json\n");
    assert_eq!(
        messages(&validate(&bag), "3-1-2"),
        vec!["Path in manifest missing in payload: data/gone1.json"]
    );

    append(
        &manifest,
        "abc data/gone2.json\nabc data/gone3.json\nabc data/gone4.json\nabc data/gone5.json\n",
    );
    // five missing: three listed, the summary counts the rest (total - 3)
    let msgs = messages(&validate(&bag), "3-1-2");
    assert_eq!(msgs.len(), 4);
    assert_eq!(msgs[2], "Path in manifest missing in payload: data/gone3.json");
    assert_eq!(msgs[3], "2 additional files missing from payload (data/) directory");
}

#[test]
fn test_unlisted_payload_is_a_recommendation() {
    let tmp = tempfile::tempdir().unwrap();
    let bag = complete_bag(&tmp);
    let manifest = bag.bagdir().join("manifest-sha256.txt");
    let kept: String = fs::read_to_string(&manifest)
        .unwrap()
        .lines()
        .filter(|l| !l.ends_with("data/trial2.json"))
        .map(|l| format!("{}\n", l))
        .collect();
    fs::write(&manifest, kept).unwrap();

    let results = validate(&bag);
    assert_eq!(
        messages(&results, "2.1.3-4"),
        vec!["Payload file not listed in manifest-sha256.txt: data/trial2.json"]
    );
    assert_eq!(results.recommendations().len(), 1);
    assert!(results.is_valid());
}

#[test]
fn test_checksum_mismatches_are_bounded() {
    let tmp = tempfile::tempdir().unwrap();
    let bag = complete_bag(&tmp);
    let extra = tmp.path().join("extra.txt");
    for i in 0..4 {
        fs::write(&extra, format!("extra file {}\n", i)).unwrap();
        bag.add_data_file(
            &format!("extra/f{}.txt", i),
            Some(&extra),
            AddFileOptions::default(),
        )
        .unwrap();
    }
    bag.write_data_manifest(false).unwrap();
    assert!(validate(&bag).issues.is_empty());

    for i in 0..4 {
        fs::write(bag.bagdir().join(format!("data/extra/f{}.txt", i)), "changed").unwrap();
    }
    fs::write(bag.bagdir().join("data/trial1.json"), "{}").unwrap();

    let results = validate(&bag);
    let msgs = messages(&results, "2.1.3-5");
    assert_eq!(msgs.len(), 4);
    assert_eq!(
        msgs[0],
        "manifest-sha256.txt: Recorded checksum does not match payload file: data/extra/f0.txt"
    );
    assert_eq!(
        msgs[3],
        "manifest-sha256.txt: Checksums don't match for 2 additional payload files"
    );

    let unchecked = validate_with(
        &bag,
        ValidatorConfig {
            check_checksums: false,
            ..Default::default()
        },
    );
    assert_eq!(unchecked.with_id("2.1.3-5").count(), 0);
    assert!(unchecked.is_valid());
}

#[test]
fn test_unknown_algorithm_skips_checksums() {
    let tmp = tempfile::tempdir().unwrap();
    let bag = complete_bag(&tmp);
    fs::write(
        bag.bagdir().join("manifest-sha1.txt"),
        "0000 data/trial1.json\n0000 data/trial2.json\n0000 data/trial3/trial3a.json\n",
    )
    .unwrap();
    assert!(validate(&bag).issues.is_empty());

    let md5 = bag.bagdir().join("manifest-md5.txt");
    fs::write(&md5, "0000 data/trial1.json\n").unwrap();
    let results = validate(&bag);
    assert_eq!(
        messages(&results, "2.1.3-5"),
        vec!["manifest-md5.txt: Recorded checksum does not match payload file: data/trial1.json"]
    );
    assert_eq!(results.with_id("2.1.3-4").count(), 2);
}

#[test]
fn test_baginfo_checks() {
    let tmp = tempfile::tempdir().unwrap();
    let bag = complete_bag(&tmp);
    let infofile = bag.bagdir().join("bag-info.txt");

    fs::write(&infofile, " leading continuation\nGood-Name: value\nbad line\n  fine\nEmpty:\n")
        .unwrap();
    assert_eq!(
        messages(&validate(&bag), "2.2.2-2"),
        vec!["bag-info.txt format issues found (lines 1, 3, 5)"]
    );

    fs::remove_file(&infofile).unwrap();
    let results = validate(&bag);
    assert_eq!(results.issues.len(), 1);
    assert_eq!(
        results.issues[0].message,
        "Recommend adding a bag-info.txt file"
    );
    assert_eq!(results.issues[0].severity, Severity::Recommendation);
}

#[test]
fn test_results_serialize() {
    let tmp = tempfile::tempdir().unwrap();
    let bag = complete_bag(&tmp);
    fs::remove_file(bag.bagdir().join("bag-info.txt")).unwrap();

    let results = validate(&bag);
    let json = serde_json::to_value(&results).unwrap();
    assert_eq!(json["issues"][0]["spec_id"], "2.2.2-1");
    assert_eq!(json["issues"][0]["severity"], "recommendation");
    assert_eq!(results.summary().recommendations, 1);
}
