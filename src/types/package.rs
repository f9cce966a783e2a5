use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::error::PackageError;
use super::rule::RuleDefinition;

/// Broad benefit area of a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgramCategory {
    Food,
    Housing,
    Cash,
    Health,
    Other,
}

/// Display metadata for a program referenced by a package's rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramInfo {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ProgramCategory>,
}

/// A versioned collection of rules for one jurisdiction.
///
/// Several packages (federal plus a state, say) can be loaded into one
/// [`EligibilityEngine`](crate::EligibilityEngine); rules for the same
/// program id are evaluated together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePackage {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub jurisdiction: String,
    pub version: String,
    #[serde(default)]
    pub programs: Vec<ProgramInfo>,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

impl RulePackage {
    pub fn new(
        name: impl Into<String>,
        jurisdiction: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            jurisdiction: jurisdiction.into(),
            version: version.into(),
            programs: Vec::new(),
            rules: Vec::new(),
        }
    }

    #[must_use]
    pub fn program(mut self, info: ProgramInfo) -> Self {
        self.programs.push(info);
        self
    }

    #[must_use]
    pub fn rule(mut self, rule: RuleDefinition) -> Self {
        self.rules.push(rule);
        self
    }

    /// Parse and validate a package from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`QualifyError`](crate::QualifyError) on malformed JSON, an
    /// invalid rule expression, or a failed [`validate`](Self::validate).
    pub fn from_json(input: &str) -> Result<Self, crate::QualifyError> {
        let package: RulePackage = serde_json::from_str(input)?;
        package.validate()?;
        Ok(package)
    }

    /// Read a JSON file and parse it into a validated package.
    ///
    /// # Errors
    ///
    /// Returns [`QualifyError`](crate::QualifyError) on I/O, parse, or validation failure.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::QualifyError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_json(&input)
    }

    /// Check structural invariants: a name, a `MAJOR.MINOR.PATCH` version,
    /// unique rule ids, and a program id on every rule.
    ///
    /// # Errors
    ///
    /// Returns the first [`PackageError`] found.
    pub fn validate(&self) -> Result<(), PackageError> {
        if self.name.trim().is_empty() {
            return Err(PackageError::MissingName);
        }
        if !is_semver(&self.version) {
            return Err(PackageError::InvalidVersion {
                package: self.name.clone(),
                version: self.version.clone(),
            });
        }
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.id.as_str()) {
                return Err(PackageError::DuplicateRule {
                    package: self.name.clone(),
                    id: rule.id.clone(),
                });
            }
            if rule.program_id.trim().is_empty() {
                return Err(PackageError::MissingProgram {
                    package: self.name.clone(),
                    rule: rule.id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Display name for a program, if this package declares one.
    #[must_use]
    pub fn program_name(&self, program_id: &str) -> Option<&str> {
        self.programs
            .iter()
            .find(|p| p.id == program_id)
            .map(|p| p.name.as_str())
    }
}

/// `MAJOR.MINOR.PATCH` with optional `-prerelease` / `+build` suffixes.
fn is_semver(version: &str) -> bool {
    let core = version
        .split_once('+')
        .map_or(version, |(core, _)| core);
    let core = core.split_once('-').map_or(core, |(core, _)| core);
    let parts: Vec<&str> = core.split('.').collect();
    parts.len() == 3
        && parts.iter().all(|p| {
            !p.is_empty()
                && p.chars().all(|c| c.is_ascii_digit())
                && (p.len() == 1 || !p.starts_with('0'))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{field, QualifyError};

    fn federal() -> RulePackage {
        RulePackage::new("federal", "US", "1.2.0")
            .program(ProgramInfo {
                id: "snap".into(),
                name: "Supplemental Nutrition Assistance Program".into(),
                category: Some(ProgramCategory::Food),
            })
            .rule(RuleDefinition::new(
                "snap-gross-income",
                "snap",
                field("householdIncome").lte(2500_i64),
            ))
    }

    #[test]
    fn valid_package() {
        assert!(federal().validate().is_ok());
        assert_eq!(
            federal().program_name("snap"),
            Some("Supplemental Nutrition Assistance Program")
        );
        assert_eq!(federal().program_name("wic"), None);
    }

    #[test]
    fn semver_forms() {
        assert!(is_semver("1.0.0"));
        assert!(is_semver("2.10.3-beta.1"));
        assert!(is_semver("0.1.0+build.5"));
        assert!(!is_semver("1.0"));
        assert!(!is_semver("01.0.0"));
        assert!(!is_semver("v1.0.0"));
    }

    #[test]
    fn duplicate_rule_rejected() {
        let pkg = federal().rule(RuleDefinition::new(
            "snap-gross-income",
            "snap",
            field("householdSize").gte(1_i64),
        ));
        assert!(matches!(
            pkg.validate(),
            Err(PackageError::DuplicateRule { id, .. }) if id == "snap-gross-income"
        ));
    }

    #[test]
    fn missing_program_rejected() {
        let pkg = federal().rule(RuleDefinition::new("orphan", " ", field("age").gte(0_i64)));
        assert!(matches!(
            pkg.validate(),
            Err(PackageError::MissingProgram { .. })
        ));
    }

    #[test]
    fn bad_version_rejected() {
        let mut pkg = federal();
        pkg.version = "latest".into();
        assert!(matches!(
            pkg.validate(),
            Err(PackageError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn from_json_parses_and_validates() {
        let pkg = RulePackage::from_json(
            r#"{
                "name": "georgia",
                "jurisdiction": "US-GA",
                "version": "0.3.1",
                "programs": [
                    {"id": "ga-peachcare", "name": "PeachCare for Kids", "category": "health"}
                ],
                "rules": [{
                    "id": "ga-peachcare-age",
                    "programId": "ga-peachcare",
                    "expression": {"<": [{"var": "age"}, 19]}
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(pkg.rules.len(), 1);
        assert_eq!(pkg.programs[0].category, Some(ProgramCategory::Health));
    }

    #[test]
    fn from_json_reports_bad_expression() {
        let result = RulePackage::from_json(
            r#"{"name": "x", "jurisdiction": "US", "version": "1.0.0",
                "rules": [{"id": "r", "programId": "p", "expression": {"a": 1, "b": 2}}]}"#,
        );
        assert!(matches!(result, Err(QualifyError::Json(_))));
    }

    #[test]
    fn from_json_reports_validation_failure() {
        let result = RulePackage::from_json(
            r#"{"name": "", "jurisdiction": "US", "version": "1.0.0"}"#,
        );
        assert!(matches!(
            result,
            Err(QualifyError::Package(PackageError::MissingName))
        ));
    }
}
