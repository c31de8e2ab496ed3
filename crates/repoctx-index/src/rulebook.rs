//! Declarative allow-rules gating expansion requests.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::chunk::{CanonicalType, ChunkMeta};
use crate::error::{ExpansionError, RulebookViolation};

/// What the caller intends to do with the expanded context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Intent {
    Locate,
    Explain,
    Analyze,
    Modify,
    Refactor,
    Debug,
}

impl Intent {
    pub const ALL: &'static [Intent] = &[
        Self::Locate,
        Self::Explain,
        Self::Analyze,
        Self::Modify,
        Self::Refactor,
        Self::Debug,
    ];
}

impl FromStr for Intent {
    type Err = ExpansionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|i| format!("{i:?}").eq_ignore_ascii_case(s))
            .ok_or_else(|| ExpansionError::UnknownIntent(s.to_owned()))
    }
}

/// Structural boundary within which expansion looks for related chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    SameFile,
}

impl Scope {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SameFile => "same_file",
        }
    }
}

impl FromStr for Scope {
    type Err = ExpansionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "same_file" => Ok(Self::SameFile),
            other => Err(ExpansionError::UnsupportedScope(other.to_owned())),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One allow-rule. All five conditions must hold for the rule to match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpansionRule {
    pub name: String,
    pub allowed_intents: BTreeSet<Intent>,
    pub source_code_types: BTreeSet<CanonicalType>,
    pub allowed_requested_code_types: BTreeSet<CanonicalType>,
    pub scope: Scope,
    pub max_chunks: usize,
}

impl ExpansionRule {
    fn matches(
        &self,
        intent: Intent,
        source_types: &BTreeSet<CanonicalType>,
        requested: &BTreeSet<CanonicalType>,
        scope: Scope,
        max_chunks: usize,
    ) -> bool {
        self.allowed_intents.contains(&intent)
            && !source_types.is_disjoint(&self.source_code_types)
            && requested.is_subset(&self.allowed_requested_code_types)
            && scope == self.scope
            && max_chunks <= self.max_chunks
    }
}

/// Ordered rule list. First matching rule wins; no match is a violation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rulebook {
    rules: Vec<ExpansionRule>,
}

impl Rulebook {
    #[must_use]
    pub fn new(rules: Vec<ExpansionRule>) -> Self {
        Self { rules }
    }

    #[must_use]
    pub fn rules(&self) -> &[ExpansionRule] {
        &self.rules
    }

    /// Check an expansion request against the rules.
    ///
    /// Source chunks without a canonical type contribute nothing; a request
    /// whose sources have no canonical type at all matches no rule.
    ///
    /// # Errors
    ///
    /// Returns [`RulebookViolation`] echoing the request when no rule matches.
    pub fn validate(
        &self,
        intent: Intent,
        sources: &[ChunkMeta],
        requested: &BTreeSet<CanonicalType>,
        scope: Scope,
        max_chunks: usize,
    ) -> Result<&ExpansionRule, RulebookViolation> {
        let source_types = source_types(sources);
        self.rules
            .iter()
            .find(|rule| rule.matches(intent, &source_types, requested, scope, max_chunks))
            .ok_or_else(|| RulebookViolation {
                intent,
                requested: requested.clone(),
                scope,
                max_chunks,
            })
    }
}

impl From<Vec<ExpansionRule>> for Rulebook {
    fn from(rules: Vec<ExpansionRule>) -> Self {
        Self::new(rules)
    }
}

/// Canonical types present among `sources`.
#[must_use]
pub fn source_types(sources: &[ChunkMeta]) -> BTreeSet<CanonicalType> {
    sources
        .iter()
        .filter_map(|s| s.concrete_type.and_then(|c| c.canonical()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ConcreteType;

    fn types(items: &[CanonicalType]) -> BTreeSet<CanonicalType> {
        items.iter().copied().collect()
    }

    fn rule() -> ExpansionRule {
        ExpansionRule {
            name: "explain_function".into(),
            allowed_intents: [Intent::Explain, Intent::Debug].into_iter().collect(),
            source_code_types: types(&[CanonicalType::PyFunction]),
            allowed_requested_code_types: types(&[
                CanonicalType::PyFunction,
                CanonicalType::PyImports,
            ]),
            scope: Scope::SameFile,
            max_chunks: 5,
        }
    }

    fn source(ty: ConcreteType) -> ChunkMeta {
        ChunkMeta {
            id: "s".into(),
            concrete_type: Some(ty),
            ..ChunkMeta::default()
        }
    }

    fn book() -> Rulebook {
        Rulebook::new(vec![rule()])
    }

    #[test]
    fn matching_request_passes() {
        let book = book();
        let matched = book
            .validate(
                Intent::Explain,
                &[source(ConcreteType::PythonClassFunction)],
                &types(&[CanonicalType::PyImports]),
                Scope::SameFile,
                5,
            )
            .unwrap();
        assert_eq!(matched.name, "explain_function");
    }

    #[test]
    fn wrong_intent_is_denied() {
        let err = book()
            .validate(
                Intent::Modify,
                &[source(ConcreteType::PythonFunction)],
                &types(&[CanonicalType::PyFunction]),
                Scope::SameFile,
                2,
            )
            .unwrap_err();
        assert_eq!(err.intent, Intent::Modify);
        assert_eq!(err.scope, Scope::SameFile);
    }

    #[test]
    fn source_types_must_intersect() {
        assert!(
            book()
                .validate(
                    Intent::Explain,
                    &[source(ConcreteType::JavascriptFunction)],
                    &BTreeSet::new(),
                    Scope::SameFile,
                    1,
                )
                .is_err()
        );
    }

    #[test]
    fn sources_without_canonical_type_are_denied() {
        assert!(
            book()
                .validate(
                    Intent::Explain,
                    &[source(ConcreteType::HtmlScriptBlock)],
                    &BTreeSet::new(),
                    Scope::SameFile,
                    1,
                )
                .is_err()
        );
        assert!(
            book()
                .validate(Intent::Explain, &[], &BTreeSet::new(), Scope::SameFile, 1)
                .is_err()
        );
    }

    #[test]
    fn requested_types_must_be_subset() {
        assert!(
            book()
                .validate(
                    Intent::Explain,
                    &[source(ConcreteType::PythonFunction)],
                    &types(&[CanonicalType::PyFunction, CanonicalType::PyClassHeader]),
                    Scope::SameFile,
                    1,
                )
                .is_err()
        );
    }

    #[test]
    fn max_chunks_above_rule_limit_is_denied() {
        assert!(
            book()
                .validate(
                    Intent::Explain,
                    &[source(ConcreteType::PythonFunction)],
                    &BTreeSet::new(),
                    Scope::SameFile,
                    6,
                )
                .is_err()
        );
    }

    #[test]
    fn first_matching_rule_wins() {
        let mut second = rule();
        second.name = "second".into();
        let mut first = rule();
        first.name = "first".into();
        let book = Rulebook::new(vec![first, second]);
        let matched = book
            .validate(
                Intent::Debug,
                &[source(ConcreteType::PythonFunction)],
                &BTreeSet::new(),
                Scope::SameFile,
                1,
            )
            .unwrap();
        assert_eq!(matched.name, "first");
    }

    #[test]
    fn empty_rulebook_denies_everything() {
        assert!(
            Rulebook::default()
                .validate(
                    Intent::Locate,
                    &[source(ConcreteType::PythonFunction)],
                    &BTreeSet::new(),
                    Scope::SameFile,
                    1,
                )
                .is_err()
        );
    }

    #[test]
    fn intent_parse_is_case_insensitive() {
        assert_eq!("explain".parse::<Intent>().unwrap(), Intent::Explain);
        assert_eq!("REFACTOR".parse::<Intent>().unwrap(), Intent::Refactor);
        assert!(matches!(
            "delete".parse::<Intent>(),
            Err(ExpansionError::UnknownIntent(_))
        ));
    }

    #[test]
    fn only_same_file_scope_parses() {
        assert_eq!("same_file".parse::<Scope>().unwrap(), Scope::SameFile);
        assert!(matches!(
            "same_repo".parse::<Scope>(),
            Err(ExpansionError::UnsupportedScope(s)) if s == "same_repo"
        ));
    }

    #[test]
    fn rule_deserializes_from_toml_shape() {
        let json = r#"{
            "name": "locate",
            "allowed_intents": ["Locate"],
            "source_code_types": ["js:function"],
            "allowed_requested_code_types": ["js:imports", "js:function"],
            "scope": "same_file",
            "max_chunks": 3
        }"#;
        let rule: ExpansionRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.scope, Scope::SameFile);
        assert!(rule.allowed_requested_code_types.contains(&CanonicalType::JsImports));
    }

    #[test]
    fn rule_with_unknown_type_fails_to_load() {
        let json = r#"{
            "name": "bad",
            "allowed_intents": ["Locate"],
            "source_code_types": ["rs:function"],
            "allowed_requested_code_types": [],
            "scope": "same_file",
            "max_chunks": 3
        }"#;
        assert!(serde_json::from_str::<ExpansionRule>(json).is_err());
    }
}
