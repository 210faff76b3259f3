use crate::analysis::diagnostic::DiagnosticSeverity;
use crate::analysis::pattern::Pattern;
use crate::analysis::rule::{Rule, TokenRule, TreeRule};
use crate::analysis::rules;
use crate::{CheckError, ConfigurationError};
use log::error;
use serde::Serialize;
use std::collections::HashSet;

pub(crate) struct RegisteredTreeRule {
    pub(crate) rule: Box<dyn TreeRule>,
    pub(crate) pattern: Pattern,
}

impl RegisteredTreeRule {
    pub(crate) fn new(rule: Box<dyn TreeRule>) -> Result<Self, ConfigurationError> {
        let pattern = rule.pattern().compile().inspect_err(|err| {
            error!("rule '{}' has an invalid pattern: {err}", rule.id());
        })?;
        Ok(Self { rule, pattern })
    }
}

pub(crate) struct RegisteredTokenRule {
    pub(crate) rule: Box<dyn TokenRule>,
    pub(crate) pattern: Pattern,
    pub(crate) arming: Option<Pattern>,
}

impl RegisteredTokenRule {
    pub(crate) fn new(rule: Box<dyn TokenRule>) -> Result<Self, ConfigurationError> {
        let compiled = rule.pattern().compile().and_then(|pattern| {
            let arming = rule.arming_pattern().map(|spec| spec.compile()).transpose()?;
            Ok((pattern, arming))
        });
        let (pattern, arming) = compiled.inspect_err(|err| {
            error!("rule '{}' has an invalid pattern: {err}", rule.id());
        })?;
        Ok(Self {
            rule,
            pattern,
            arming,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleEngine {
    Tree,
    Token,
}

/// What a host needs to list or document a registered rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleInfo {
    pub id: String,
    pub description: String,
    pub severity: DiagnosticSeverity,
    pub engine: RuleEngine,
    pub enabled_by_default: bool,
}

impl RuleInfo {
    pub(crate) fn of<R: Rule + ?Sized>(rule: &R, engine: RuleEngine) -> Self {
        Self {
            id: rule.id().to_string(),
            description: rule.description().to_string(),
            severity: rule.severity(),
            engine,
            enabled_by_default: rule.enabled_by_default(),
        }
    }
}

/// Rules in registration order, patterns already compiled
#[derive(Default)]
pub struct RuleRegistry {
    tree_rules: Vec<RegisteredTreeRule>,
    token_rules: Vec<RegisteredTokenRule>,
    ids: HashSet<String>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_rules() -> Result<Self, CheckError> {
        let mut registry = Self::new();
        rules::register_builtin_rules(&mut registry)?;
        Ok(registry)
    }

    pub fn register_tree_rule<R: TreeRule + 'static>(
        &mut self,
        rule: R,
    ) -> Result<(), ConfigurationError> {
        let registered = RegisteredTreeRule::new(Box::new(rule))?;
        self.claim(registered.rule.id())?;
        self.tree_rules.push(registered);
        Ok(())
    }

    pub fn register_token_rule<R: TokenRule + 'static>(
        &mut self,
        rule: R,
    ) -> Result<(), ConfigurationError> {
        let registered = RegisteredTokenRule::new(Box::new(rule))?;
        self.claim(registered.rule.id())?;
        self.token_rules.push(registered);
        Ok(())
    }

    fn claim(&mut self, id: &str) -> Result<(), ConfigurationError> {
        if !self.ids.insert(id.to_string()) {
            error!("rule '{id}' is registered more than once");
            return Err(ConfigurationError::DuplicateRule(id.to_string()));
        }
        Ok(())
    }

    pub fn contains(&self, rule_id: &str) -> bool {
        self.ids.contains(rule_id)
    }

    pub fn get_rule(&self, rule_id: &str) -> Option<RuleInfo> {
        self.get_all_rules().into_iter().find(|info| info.id == rule_id)
    }

    /// Tree rules first, each group in registration order
    pub fn get_all_rules(&self) -> Vec<RuleInfo> {
        let tree = self
            .tree_rules
            .iter()
            .map(|r| RuleInfo::of(r.rule.as_ref(), RuleEngine::Tree));
        let token = self
            .token_rules
            .iter()
            .map(|r| RuleInfo::of(r.rule.as_ref(), RuleEngine::Token));
        tree.chain(token).collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub(crate) fn tree_rules(&self) -> &[RegisteredTreeRule] {
        &self.tree_rules
    }

    pub(crate) fn token_rules(&self) -> &[RegisteredTokenRule] {
        &self.token_rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::context::RuleContext;
    use crate::analysis::pattern::{PatternSpec, kind};
    use crate::analysis::rule::TreeMatch;

    struct Probe {
        id: &'static str,
        pattern: PatternSpec,
    }

    impl Rule for Probe {
        fn id(&self) -> &str {
            self.id
        }

        fn description(&self) -> &str {
            "test probe"
        }
    }

    impl TreeRule for Probe {
        fn pattern(&self) -> PatternSpec {
            self.pattern.clone()
        }

        fn on_match(
            &self,
            _found: &TreeMatch<'_>,
            _ctx: &mut RuleContext<'_, '_>,
        ) -> Result<(), CheckError> {
            Ok(())
        }
    }

    fn probe(id: &'static str, pattern: PatternSpec) -> Probe {
        Probe { id, pattern }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut registry = RuleRegistry::new();
        registry.register_tree_rule(probe("p", kind("VarDecl"))).unwrap();
        assert_eq!(
            registry.register_tree_rule(probe("p", kind("IfStmt"))),
            Err(ConfigurationError::DuplicateRule("p".into()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn invalid_pattern_does_not_claim_the_id() {
        let mut registry = RuleRegistry::new();
        assert_eq!(
            registry.register_tree_rule(probe("p", kind("Bogus"))),
            Err(ConfigurationError::UnknownKind("Bogus".into()))
        );
        assert!(!registry.contains("p"));
        registry.register_tree_rule(probe("p", kind("VarDecl"))).unwrap();
        assert!(registry.contains("p"));
    }

    #[test]
    fn builtin_rules_register_cleanly() {
        let registry = RuleRegistry::with_builtin_rules().unwrap();
        let infos = registry.get_all_rules();
        assert_eq!(infos.len(), 14);
        assert_eq!(infos[0].id, "misra-cpp-2.10.3");
        assert!(infos.iter().any(|i| i.engine == RuleEngine::Token));

        let c_rule = registry.get_rule("misra-c-7.1").unwrap();
        assert!(!c_rule.enabled_by_default);
    }
}
