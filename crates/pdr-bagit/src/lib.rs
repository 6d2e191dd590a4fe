//! Build, read and validate NIST preservation bags.
//!
//! A preservation bag is a BagIt directory whose `metadata/` tree carries a
//! NERDm record for the dataset and for each of its components. Use
//! [`BagBuilder`] to assemble one, [`NistBag`] to read it back as a single
//! resource record, and [`BagItValidator`] to check it against the base
//! BagIt profile.

pub mod bag;
pub mod checksum;
pub mod config;
pub mod error;
pub mod ident;
pub mod nerdm;
pub mod paths;
pub mod validate;

// Convenience re-exports
pub use bag::{
    format_bytes, AddFileOptions, BagBuilder, BagInfo, FetchRecord, FileMdOptions, NistBag,
    PodOptions,
};
pub use checksum::{checksum_of, ChecksumAlgorithm};
pub use config::{BuilderConfig, InfoValue, ValidatorConfig};
pub use error::{BagError, BagResult};
pub use ident::{fix_id, mint_id, ArkMinter};
pub use nerdm::{ComponentType, Record};
pub use paths::{encode_path, validate_relpath};
pub use validate::{
    BagItValidator, Severity, ValidationIssue, ValidationResults, ValidationSummary, Validator,
};
