use crate::CheckError;
use crate::analysis::context::RuleContext;
use crate::analysis::diagnostic::DiagnosticSeverity;
use crate::analysis::pattern::{MatchResult, PatternSpec};
use crate::analysis::token_engine::ScanState;
use crate::lexer::Token;
use crate::parser::ast::{Node, NodeId, NodeModel};

pub trait Rule: Send + Sync {
    // Unique identifier for this rule, e.g. `misra-cpp-5.0.21`
    fn id(&self) -> &str;

    // Short description of what this rule checks
    fn description(&self) -> &str;

    // Severity of violations unless the configuration overrides it
    fn severity(&self) -> DiagnosticSeverity {
        DiagnosticSeverity::Error
    }

    // Optional: whether this rule runs without being enabled explicitly
    fn enabled_by_default(&self) -> bool {
        true
    }
}

/// A rule evaluated against every node of the syntax tree
pub trait TreeRule: Rule {
    fn pattern(&self) -> PatternSpec;

    /// Called for every node the pattern matches outside system headers
    fn on_match(
        &self,
        found: &TreeMatch<'_>,
        ctx: &mut RuleContext<'_, '_>,
    ) -> Result<(), CheckError>;
}

/// A rule evaluated during the sequential pass over the token stream
pub trait TokenRule: Rule {
    fn pattern(&self) -> PatternSpec;

    /// Tokens that move the rule's scan state from idle to armed
    fn arming_pattern(&self) -> Option<PatternSpec> {
        None
    }

    /// `state` is the scan state before this token; it returns to idle afterwards
    fn on_token(
        &self,
        found: &TokenMatch<'_>,
        state: ScanState,
        ctx: &mut RuleContext<'_, '_>,
    ) -> Result<(), CheckError>;
}

pub struct TreeMatch<'a> {
    model: &'a NodeModel,
    node: NodeId,
    captures: &'a MatchResult,
    rule_id: &'a str,
}

impl<'a> TreeMatch<'a> {
    pub fn new(
        model: &'a NodeModel,
        node: NodeId,
        captures: &'a MatchResult,
        rule_id: &'a str,
    ) -> Self {
        Self {
            model,
            node,
            captures,
            rule_id,
        }
    }

    pub fn model(&self) -> &'a NodeModel {
        self.model
    }

    /// The node the pattern was evaluated at
    pub fn root(&self) -> NodeId {
        self.node
    }

    pub fn captures(&self) -> &MatchResult {
        self.captures
    }

    /// Node bound under `name`; a missing capture means the rule is wired wrong
    pub fn bound(&self, name: &str) -> Result<NodeId, CheckError> {
        self.captures
            .node(name)
            .ok_or_else(|| CheckError::InvariantViolation {
                rule: self.rule_id.to_string(),
                capture: name.to_string(),
            })
    }

    pub fn bound_node(&self, name: &str) -> Result<&'a Node, CheckError> {
        let model = self.model;
        self.bound(name).map(|id| model.node(id))
    }

    pub fn optional(&self, name: &str) -> Option<NodeId> {
        self.captures.node(name)
    }
}

pub struct TokenMatch<'a> {
    model: &'a NodeModel,
    index: usize,
    captures: &'a MatchResult,
    rule_id: &'a str,
}

impl<'a> TokenMatch<'a> {
    pub fn new(
        model: &'a NodeModel,
        index: usize,
        captures: &'a MatchResult,
        rule_id: &'a str,
    ) -> Self {
        Self {
            model,
            index,
            captures,
            rule_id,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// The token the pattern was evaluated at
    pub fn token(&self) -> &'a Token {
        let model = self.model;
        &model.tokens()[self.index]
    }

    pub fn captures(&self) -> &MatchResult {
        self.captures
    }

    pub fn bound(&self, name: &str) -> Result<&'a Token, CheckError> {
        let model = self.model;
        self.captures
            .token(name)
            .and_then(|index| model.tokens().get(index))
            .ok_or_else(|| CheckError::InvariantViolation {
                rule: self.rule_id.to_string(),
                capture: name.to_string(),
            })
    }
}
