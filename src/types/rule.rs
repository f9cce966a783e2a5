use serde::{Deserialize, Serialize};

use super::expr::Expr;

/// What a rule is for. Only [`RuleKind::Eligibility`] rules are scored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    #[default]
    Eligibility,
    Benefit,
    Document,
    Informational,
}

/// A document an applicant will need. Identity is the `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRequirement {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DocumentRequirement {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
        }
    }
}

/// A suggested follow-up action. Identity is the exact `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextStep {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl NextStep {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: None,
        }
    }
}

/// One declarative rule belonging to a program.
///
/// Loaded once with its [`RulePackage`](super::RulePackage) and never
/// mutated afterwards. Inactive and draft rules are filtered out before
/// evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDefinition {
    pub id: String,
    pub program_id: String,
    #[serde(default)]
    pub kind: RuleKind,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub explanation: String,
    pub expression: Expr,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_documents: Vec<DocumentRequirement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_steps: Vec<NextStep>,
    /// Author-declared categorical disqualifier. When unset, the engine's
    /// hard-stop heuristics decide.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hard_stop: Option<bool>,
}

fn default_active() -> bool {
    true
}

impl RuleDefinition {
    pub fn new(id: impl Into<String>, program_id: impl Into<String>, expression: Expr) -> Self {
        Self {
            id: id.into(),
            program_id: program_id.into(),
            kind: RuleKind::Eligibility,
            active: true,
            draft: false,
            explanation: String::new(),
            expression,
            required_documents: Vec::new(),
            next_steps: Vec::new(),
            hard_stop: None,
        }
    }

    #[must_use]
    pub fn explanation(mut self, text: impl Into<String>) -> Self {
        self.explanation = text.into();
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: RuleKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn document(mut self, document: DocumentRequirement) -> Self {
        self.required_documents.push(document);
        self
    }

    #[must_use]
    pub fn next_step(mut self, step: NextStep) -> Self {
        self.next_steps.push(step);
        self
    }

    #[must_use]
    pub fn hard_stop(mut self, hard_stop: bool) -> Self {
        self.hard_stop = Some(hard_stop);
        self
    }

    #[must_use]
    pub fn draft(mut self) -> Self {
        self.draft = true;
        self
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Whether this rule takes part in pass/fail scoring.
    #[must_use]
    pub fn is_scored(&self) -> bool {
        self.active && !self.draft && self.kind == RuleKind::Eligibility
    }

    /// Text shown for this rule in verdict details.
    #[must_use]
    pub fn display_text(&self) -> &str {
        if self.explanation.is_empty() {
            &self.id
        } else {
            &self.explanation
        }
    }
}
