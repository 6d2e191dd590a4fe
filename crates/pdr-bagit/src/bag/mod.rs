//! NIST preservation bags.
//!
//! A bag is a directory with a fixed layout:
//!
//! ```text
//! <bagname>/
//!   bagit.txt
//!   bag-info.txt
//!   manifest-<alg>.txt
//!   about.txt
//!   fetch.txt
//!   multibag/member-bags.tsv
//!   multibag/file-lookup.tsv
//!   data/...                     payload
//!   metadata/nerdm.json          resource root
//!   metadata/pod.json
//!   metadata/<path>/nerdm.json   component record
//!   metadata/<path>/annot.json   annotation overlay
//! ```
//!
//! [`NistBag`] reads this layout; [`BagBuilder`] creates and mutates it.

pub mod builder;
pub mod reader;
pub mod tagfile;

pub use crate::nerdm::{ANNOTS_FILENAME, NERDMD_FILENAME, POD_FILENAME};
pub use builder::{format_bytes, AddFileOptions, BagBuilder, FileMdOptions, PodOptions};
pub use reader::NistBag;
pub use tagfile::{BagInfo, FetchRecord};

pub const DATA_DIR: &str = "data";
pub const METADATA_DIR: &str = "metadata";
pub const BAGIT_FILE: &str = "bagit.txt";
pub const BAGINFO_FILE: &str = "bag-info.txt";
pub const FETCH_FILE: &str = "fetch.txt";
pub const ABOUT_FILE: &str = "about.txt";
pub const MULTIBAG_DIR: &str = "multibag";
pub const MEMBER_BAGS_FILE: &str = "member-bags.tsv";
pub const FILE_LOOKUP_FILE: &str = "file-lookup.tsv";
