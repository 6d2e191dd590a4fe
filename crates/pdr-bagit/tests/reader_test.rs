//! NistBag integration tests: bags assembled with BagBuilder, read back.

use pdr_bagit::nerdm::convert::InventoryCounter;
use pdr_bagit::nerdm::merge::MergerRegistry;
use pdr_bagit::nerdm::read_nerd;
use pdr_bagit::{AddFileOptions, BagBuilder, BuilderConfig, NistBag, PodOptions, Record};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/simplesip")
        .join(name)
}

fn record(v: Value) -> Record {
    match v {
        Value::Object(m) => m,
        other => panic!("not an object: {}", other),
    }
}

fn built_bag(tmp: &tempfile::TempDir) -> BagBuilder {
    let mut bag = BagBuilder::new(tmp.path(), "samplebag", BuilderConfig::default()).unwrap();
    bag.add_ds_pod(&read_nerd(&fixture("_pod.json")).unwrap(), PodOptions::default())
        .unwrap();
    for p in ["trial1.json", "trial2.json", "trial3/trial3a.json"] {
        bag.add_data_file(p, Some(&fixture(p)), AddFileOptions::default())
            .unwrap();
    }
    bag
}

#[test]
fn test_component_classification() {
    let tmp = tempfile::tempdir().unwrap();
    let builder = built_bag(&tmp);
    // metadata-only subcollection
    builder.init_collmd_for("calibration", true).unwrap();
    let bag = builder.reader().unwrap();

    assert!(bag.comp_exists("").unwrap());
    assert!(bag.comp_exists("trial3/trial3a.json").unwrap());
    assert!(bag.comp_exists("calibration").unwrap());
    assert!(!bag.comp_exists("trial4.json").unwrap());

    assert!(bag.is_data_file("trial1.json").unwrap());
    assert!(!bag.is_data_file("trial3").unwrap());
    assert!(!bag.is_data_file("").unwrap());

    assert!(bag.is_subcoll("").unwrap());
    assert!(bag.is_subcoll("trial3").unwrap());
    assert!(bag.is_subcoll("calibration").unwrap());
    assert!(!bag.is_subcoll("trial1.json").unwrap());

    assert!(bag.comp_exists("../outside").unwrap_err().is_path_safety());
}

#[test]
fn test_subcoll_children() {
    let tmp = tempfile::tempdir().unwrap();
    let builder = built_bag(&tmp);
    builder.init_collmd_for("calibration", true).unwrap();
    fs::write(builder.bagdir().join("data/.hidden"), "x").unwrap();
    fs::write(builder.bagdir().join("data/_scratch"), "x").unwrap();
    let bag = builder.reader().unwrap();

    assert_eq!(
        bag.subcoll_children("").unwrap(),
        vec!["calibration", "trial1.json", "trial2.json", "trial3"]
    );
    assert_eq!(bag.subcoll_children("trial3").unwrap(), vec!["trial3a.json"]);
    assert!(bag
        .subcoll_children("trial1.json")
        .unwrap_err()
        .is_bad_request());
}

#[test]
fn test_nerd_metadata_for_missing_component() {
    let tmp = tempfile::tempdir().unwrap();
    let bag = built_bag(&tmp).reader().unwrap();
    let err = bag.nerd_metadata_for("trial4.json", false).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn test_merge_conventions() {
    let tmp = tempfile::tempdir().unwrap();
    let builder = built_bag(&tmp);
    builder
        .add_metadata_for_file(
            "trial1.json",
            &record(json!({
                "contactPoint": {"fn": "Pat Doe", "hasEmail": "mailto:pat.doe@nist.gov"},
                "topic": ["a"]
            })),
            pdr_bagit::ComponentType::DataFile,
        )
        .unwrap();
    builder
        .add_annotation_for(
            "trial1.json",
            &record(json!({"contactPoint": {"fn": "Sam Roe"}, "topic": ["b"]})),
        )
        .unwrap();

    let registry = MergerRegistry::default();
    let dev = builder
        .reader()
        .unwrap()
        .with_merge_convention(&registry, "dev")
        .unwrap()
        .nerd_metadata_for("trial1.json", true)
        .unwrap();
    assert_eq!(dev["contactPoint"]["fn"], "Sam Roe");
    assert_eq!(dev["contactPoint"]["hasEmail"], "mailto:pat.doe@nist.gov");
    assert_eq!(dev["topic"], json!(["a", "b"]));

    let replaced = builder
        .reader()
        .unwrap()
        .with_merge_convention(&registry, "replace")
        .unwrap()
        .nerd_metadata_for("trial1.json", true)
        .unwrap();
    assert_eq!(replaced["contactPoint"], json!({"fn": "Sam Roe"}));
    assert_eq!(replaced["topic"], json!(["b"]));

    let unmerged = builder
        .reader()
        .unwrap()
        .nerd_metadata_for("trial1.json", false)
        .unwrap();
    assert_eq!(unmerged["topic"], json!(["a"]));

    let err = builder
        .reader()
        .unwrap()
        .with_merge_convention(&registry, "midas")
        .unwrap_err();
    assert!(err.to_string().contains("midas"));
}

#[test]
fn test_nerdm_record_reconstruction() {
    let tmp = tempfile::tempdir().unwrap();
    let bag = built_bag(&tmp).reader().unwrap();
    let nerd = bag.nerdm_record(false).unwrap();

    assert_eq!(nerd["@id"], "ark:/88434/mds05tbj89");
    let comps = nerd["components"].as_array().unwrap();
    assert_eq!(comps.len(), 5);
    // root-held components come first, then walk order
    assert!(comps[0].get("filepath").is_none());
    let paths: Vec<&str> = comps[1..]
        .iter()
        .map(|c| c["filepath"].as_str().unwrap())
        .collect();
    assert_eq!(
        paths,
        vec!["trial1.json", "trial2.json", "trial3", "trial3/trial3a.json"]
    );

    let inventory = nerd["inventory"].as_array().unwrap();
    let root_inv = inventory
        .iter()
        .find(|e| e["forCollection"] == "")
        .unwrap();
    assert_eq!(root_inv["childCount"], 3);
    assert_eq!(root_inv["descCount"], 4);
    assert_eq!(root_inv["childCollections"], json!(["trial3"]));

    let hier = nerd["dataHierarchy"].as_array().unwrap();
    let trial3 = hier.iter().find(|n| n["filepath"] == "trial3").unwrap();
    assert_eq!(
        trial3["children"],
        json!([{"filepath": "trial3/trial3a.json"}])
    );
}

#[test]
fn test_nerdm_record_replaces_stale_hierarchy() {
    let tmp = tempfile::tempdir().unwrap();
    let mut builder = BagBuilder::new(tmp.path(), "bare", BuilderConfig::default()).unwrap();
    let mut nerd = read_nerd(&fixture("_nerdm.json")).unwrap();
    nerd.remove("components");
    builder.add_res_nerd(&nerd, true).unwrap();

    // stale summaries written behind the builder's back
    let rootfile = builder.nerdm_file_for("").unwrap();
    let mut root = read_nerd(&rootfile).unwrap();
    root.insert("dataHierarchy".into(), json!([{"filepath": "gone.json"}]));
    root.insert("inventory".into(), json!([{"forCollection": "", "childCount": 9}]));
    pdr_bagit::nerdm::write_nerd(&rootfile, &root).unwrap();

    let out = builder.reader().unwrap().nerdm_record(false).unwrap();
    assert!(!out.contains_key("dataHierarchy"));
    assert_eq!(out["inventory"][0]["childCount"], 9);
    assert_eq!(out["components"], json!([]));
}

#[derive(Debug)]
struct FileCount;

impl InventoryCounter for FileCount {
    fn inventory(&self, components: &[Value]) -> Value {
        json!({"files": components.iter().filter(|c| c.get("size").is_some()).count()})
    }
}

#[test]
fn test_injected_inventory_counter() {
    let tmp = tempfile::tempdir().unwrap();
    let bag = built_bag(&tmp)
        .reader()
        .unwrap()
        .with_inventory(Arc::new(FileCount));
    let nerd = bag.nerdm_record(true).unwrap();
    assert_eq!(nerd["inventory"], json!({"files": 3}));
}

#[test]
fn test_iter_data_files_is_restartable() {
    let tmp = tempfile::tempdir().unwrap();
    let bag = built_bag(&tmp).reader().unwrap();

    let first: Vec<String> = bag.iter_data_files().collect::<Result<_, _>>().unwrap();
    let second: Vec<String> = bag.iter_data_files().collect::<Result<_, _>>().unwrap();
    assert_eq!(first, vec!["trial1.json", "trial2.json", "trial3/trial3a.json"]);
    assert_eq!(first, second);
}

#[test]
fn test_fetch_records() {
    let tmp = tempfile::tempdir().unwrap();
    let builder = built_bag(&tmp);
    let bag = builder.reader().unwrap();
    assert_eq!(bag.iter_fetch_records().unwrap().count(), 0);

    fs::write(
        builder.bagdir().join("fetch.txt"),
        "https://data.nist.gov/od/ds/big.h5 8000000000 data/big.h5\n\
         https://data.nist.gov/od/ds/small.csv - data/sub/small.csv\n",
    )
    .unwrap();
    let recs: Vec<_> = bag
        .iter_fetch_records()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0].length, Some(8_000_000_000));
    assert_eq!(recs[1].path, "data/sub/small.csv");

    fs::write(
        builder.bagdir().join("fetch.txt"),
        "https://data.nist.gov/od/ds/big.h5 data/big.h5\n",
    )
    .unwrap();
    let err = bag.iter_fetch_records().unwrap().next().unwrap().unwrap_err();
    assert!(err.is_format());
}

#[test]
fn test_get_baginfo() {
    let tmp = tempfile::tempdir().unwrap();
    let builder = built_bag(&tmp);
    let bag = builder.reader().unwrap();
    assert!(bag.get_baginfo(None).unwrap().is_empty());

    builder.ensure_baginfo(true).unwrap();
    let info = bag.get_baginfo(None).unwrap();
    assert_eq!(info["Payload-Oxum"], vec!["225.3"]);
    assert_eq!(
        info["Organization-Address"],
        vec!["100 Bureau Dr.", "Gaithersburg, MD 20899"]
    );

    let alt = tmp.path().join("other-info.txt");
    fs::write(&alt, "Foo: Bar\n  continued\nFoo: Baz\n").unwrap();
    let info = bag.get_baginfo(Some(&alt)).unwrap();
    assert_eq!(info["Foo"], vec!["Bar continued", "Baz"]);
}

#[test]
fn test_open_requires_directory() {
    let tmp = tempfile::tempdir().unwrap();
    assert!(NistBag::open(tmp.path().join("nope")).is_err());
    let file = tmp.path().join("file");
    fs::write(&file, "").unwrap();
    assert!(NistBag::open(&file).is_err());
}
