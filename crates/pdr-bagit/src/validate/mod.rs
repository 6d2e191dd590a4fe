//! Bag validation.
//!
//! Validators never fail: every problem found is reported as a
//! [`ValidationIssue`] graded by [`Severity`], and the caller decides what
//! counts as a pass.

pub mod bagit;

pub use bagit::{BagItValidator, RuleDefinition, BAGIT_PROFILE, RULES};

use crate::bag::NistBag;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Recommendation,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Recommendation => write!(f, "recommendation"),
        }
    }
}

/// One problem found in a bag.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Profile the rule belongs to, e.g. `BagIt v0.97`.
    pub profile: String,
    /// Section identifier of the rule, e.g. `2.1.3-5`.
    pub spec_id: String,
    pub severity: Severity,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(
        profile: impl Into<String>,
        spec_id: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            profile: profile.into(),
            spec_id: spec_id.into(),
            severity,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} [{}]: {}",
            self.profile, self.spec_id, self.severity, self.message
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ValidationSummary {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
    pub recommendations: usize,
}

/// Issues found in one bag.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResults {
    pub bag: String,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResults {
    pub fn new(bag: impl Into<String>) -> Self {
        Self {
            bag: bag.into(),
            issues: Vec::new(),
        }
    }

    /// True when no error-level issue was found.
    pub fn is_valid(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn by_severity(&self, severity: Severity) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }

    pub fn errors(&self) -> Vec<&ValidationIssue> {
        self.by_severity(Severity::Error).collect()
    }

    pub fn warnings(&self) -> Vec<&ValidationIssue> {
        self.by_severity(Severity::Warning).collect()
    }

    pub fn recommendations(&self) -> Vec<&ValidationIssue> {
        self.by_severity(Severity::Recommendation).collect()
    }

    /// Issues reported under the given rule id.
    pub fn with_id<'a>(&'a self, spec_id: &'a str) -> impl Iterator<Item = &'a ValidationIssue> {
        self.issues.iter().filter(move |i| i.spec_id == spec_id)
    }

    pub fn summary(&self) -> ValidationSummary {
        let mut summary = ValidationSummary {
            total: self.issues.len(),
            ..Default::default()
        };
        for issue in &self.issues {
            match issue.severity {
                Severity::Error => summary.errors += 1,
                Severity::Warning => summary.warnings += 1,
                Severity::Recommendation => summary.recommendations += 1,
            }
        }
        summary
    }

    pub fn merge(&mut self, other: ValidationResults) {
        self.issues.extend(other.issues);
    }
}

/// A set of conformance rules applied to a bag.
pub trait Validator {
    /// Profile name reported on every issue.
    fn profile(&self) -> &str;

    fn validate(&self, bag: &NistBag) -> ValidationResults;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_and_validity() {
        let mut results = ValidationResults::new("bag");
        assert!(results.is_valid());

        results.issues.push(ValidationIssue::new(
            BAGIT_PROFILE,
            "2.2.2-1",
            Severity::Recommendation,
            "Recommend adding a bag-info.txt file",
        ));
        assert!(results.is_valid());

        results.issues.push(ValidationIssue::new(
            BAGIT_PROFILE,
            "2.1.2",
            Severity::Error,
            "Missing payload directory, data/",
        ));
        assert!(!results.is_valid());
        assert_eq!(
            results.summary(),
            ValidationSummary {
                total: 2,
                errors: 1,
                warnings: 0,
                recommendations: 1,
            }
        );
        assert_eq!(results.with_id("2.1.2").count(), 1);
        assert_eq!(
            results.errors()[0].to_string(),
            "BagIt v0.97 2.1.2 [error]: Missing payload directory, data/"
        );
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::Recommendation).unwrap();
        assert_eq!(json, "\"recommendation\"");
    }
}
