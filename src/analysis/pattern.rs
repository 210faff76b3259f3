//! Composable predicates over tree nodes and tokens.
//!
//! A [`PatternSpec`] is the declarative form (built with the functions in this module or read
//! from JSON); [`PatternSpec::compile`] validates it into a [`Pattern`] that the engines evaluate.

use crate::ConfigurationError;
use crate::lexer::{Keyword, Token, TokenClass, TokenKind};
use crate::parser::ast::{Node, NodeClass, NodeId, NodeKind, NodeModel, Role, is_operator_name};
use crate::parser::types::{CastKind, TypeCategory};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Something a pattern can be evaluated against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Node(NodeId),
    /// Index into `NodeModel::tokens`
    Token(usize),
}

/// Captures recorded by one successful evaluation, in binding order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    bindings: Vec<(String, Target)>,
}

impl MatchResult {
    pub fn get(&self, name: &str) -> Option<Target> {
        self.bindings
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, target)| *target)
    }

    pub fn node(&self, name: &str) -> Option<NodeId> {
        match self.get(name)? {
            Target::Node(id) => Some(id),
            Target::Token(_) => None,
        }
    }

    pub fn token(&self, name: &str) -> Option<usize> {
        match self.get(name)? {
            Target::Token(index) => Some(index),
            Target::Node(_) => None,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Declarative pattern, serialized externally tagged in snake_case:
/// `{"all_of": [{"kind": "BinaryOperator"}, {"attr": {"name": "operator", "values": ["<<"]}}]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternSpec {
    Anything,
    /// Node class (`BinaryOperator`, `VarDecl`, …) or token class (`numeric_constant`, …)
    Kind(String),
    /// Matches when the named attribute equals one of `values`
    Attr { name: String, values: Vec<String> },
    Not(Box<PatternSpec>),
    AnyOf(Vec<PatternSpec>),
    AllOf(Vec<PatternSpec>),
    HasAncestor(Box<PatternSpec>),
    HasDescendant(Box<PatternSpec>),
    HasParent(Box<PatternSpec>),
    /// Any direct child
    Has(Box<PatternSpec>),
    HasChild { role: String, pattern: Box<PatternSpec> },
    /// Declaration a `DeclRefExpr` resolves to
    RefersTo(Box<PatternSpec>),
    IgnoringImplicit(Box<PatternSpec>),
    Bind { name: String, pattern: Box<PatternSpec> },
}

pub fn anything() -> PatternSpec {
    PatternSpec::Anything
}

pub fn kind(name: &str) -> PatternSpec {
    PatternSpec::Kind(name.to_string())
}

pub fn attr(name: &str, values: &[&str]) -> PatternSpec {
    PatternSpec::Attr {
        name: name.to_string(),
        values: values.iter().map(|v| v.to_string()).collect(),
    }
}

pub fn has_operator(operators: &[&str]) -> PatternSpec {
    attr("operator", operators)
}

pub fn has_type(category: &str) -> PatternSpec {
    attr("type", &[category])
}

pub fn has_cast_kind(kinds: &[&str]) -> PatternSpec {
    attr("cast_kind", kinds)
}

pub fn has_name(name: &str) -> PatternSpec {
    attr("name", &[name])
}

pub fn has_role(role: &str) -> PatternSpec {
    attr("role", &[role])
}

pub fn has_spelling_prefix(prefixes: &[&str]) -> PatternSpec {
    attr("spelling_prefix", prefixes)
}

pub fn is_keyword(keyword: &str) -> PatternSpec {
    attr("keyword", &[keyword])
}

pub fn not(pattern: PatternSpec) -> PatternSpec {
    PatternSpec::Not(Box::new(pattern))
}

pub fn any_of(patterns: Vec<PatternSpec>) -> PatternSpec {
    PatternSpec::AnyOf(patterns)
}

pub fn all_of(patterns: Vec<PatternSpec>) -> PatternSpec {
    PatternSpec::AllOf(patterns)
}

pub fn has_ancestor(pattern: PatternSpec) -> PatternSpec {
    PatternSpec::HasAncestor(Box::new(pattern))
}

pub fn has_descendant(pattern: PatternSpec) -> PatternSpec {
    PatternSpec::HasDescendant(Box::new(pattern))
}

pub fn has_parent(pattern: PatternSpec) -> PatternSpec {
    PatternSpec::HasParent(Box::new(pattern))
}

pub fn has(pattern: PatternSpec) -> PatternSpec {
    PatternSpec::Has(Box::new(pattern))
}

pub fn has_child(role: &str, pattern: PatternSpec) -> PatternSpec {
    PatternSpec::HasChild {
        role: role.to_string(),
        pattern: Box::new(pattern),
    }
}

pub fn has_lhs(pattern: PatternSpec) -> PatternSpec {
    has_child("lhs", pattern)
}

pub fn has_rhs(pattern: PatternSpec) -> PatternSpec {
    has_child("rhs", pattern)
}

pub fn has_either_operand(pattern: PatternSpec) -> PatternSpec {
    any_of(vec![has_lhs(pattern.clone()), has_rhs(pattern)])
}

pub fn has_operand(pattern: PatternSpec) -> PatternSpec {
    has_child("operand", pattern)
}

pub fn has_condition(pattern: PatternSpec) -> PatternSpec {
    has_child("condition", pattern)
}

pub fn has_true_expression(pattern: PatternSpec) -> PatternSpec {
    has_child("true_expr", pattern)
}

pub fn has_false_expression(pattern: PatternSpec) -> PatternSpec {
    has_child("false_expr", pattern)
}

pub fn has_initializer(pattern: PatternSpec) -> PatternSpec {
    has_child("initializer", pattern)
}

pub fn refers_to(pattern: PatternSpec) -> PatternSpec {
    PatternSpec::RefersTo(Box::new(pattern))
}

pub fn ignoring_implicit(pattern: PatternSpec) -> PatternSpec {
    PatternSpec::IgnoringImplicit(Box::new(pattern))
}

pub fn bind(name: &str, pattern: PatternSpec) -> PatternSpec {
    PatternSpec::Bind {
        name: name.to_string(),
        pattern: Box::new(pattern),
    }
}

impl PatternSpec {
    pub fn compile(&self) -> Result<Pattern, ConfigurationError> {
        let captures = captures_of(self)?;
        let matcher = Matcher::compile(self)?;
        Ok(Pattern {
            matcher,
            captures: captures.into_iter().collect(),
        })
    }
}

/// Alternatives of `any_of` may bind the same name since at most one of them is recorded;
/// everything else must bind each name once.
fn captures_of(spec: &PatternSpec) -> Result<BTreeSet<String>, ConfigurationError> {
    match spec {
        PatternSpec::Anything | PatternSpec::Kind(_) | PatternSpec::Attr { .. } => {
            Ok(BTreeSet::new())
        }
        PatternSpec::Bind { name, pattern } => {
            let mut names = captures_of(pattern)?;
            if !names.insert(name.clone()) {
                return Err(ConfigurationError::DuplicateCapture(name.clone()));
            }
            Ok(names)
        }
        PatternSpec::AnyOf(branches) => {
            let mut names = BTreeSet::new();
            for branch in branches {
                names.extend(captures_of(branch)?);
            }
            Ok(names)
        }
        PatternSpec::AllOf(parts) => {
            let mut names = BTreeSet::new();
            for part in parts {
                for name in captures_of(part)? {
                    if names.contains(&name) {
                        return Err(ConfigurationError::DuplicateCapture(name));
                    }
                    names.insert(name);
                }
            }
            Ok(names)
        }
        PatternSpec::Not(inner)
        | PatternSpec::HasAncestor(inner)
        | PatternSpec::HasDescendant(inner)
        | PatternSpec::HasParent(inner)
        | PatternSpec::Has(inner)
        | PatternSpec::RefersTo(inner)
        | PatternSpec::IgnoringImplicit(inner)
        | PatternSpec::HasChild { pattern: inner, .. } => captures_of(inner),
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Anything,
    NodeKind(NodeClass),
    TokenKind(TokenClass),
    Operator(Vec<String>),
    Type(Vec<TypeCategory>),
    CastKind(Vec<CastKind>),
    Name(Vec<String>),
    Spelling(Vec<String>),
    SpellingPrefix(Vec<String>),
    Keyword(Vec<Keyword>),
    Role(Vec<Role>),
    Not(Box<Matcher>),
    AnyOf(Vec<Matcher>),
    AllOf(Vec<Matcher>),
    HasAncestor(Box<Matcher>),
    HasDescendant(Box<Matcher>),
    HasParent(Box<Matcher>),
    Has(Box<Matcher>),
    HasChild(Role, Box<Matcher>),
    RefersTo(Box<Matcher>),
    IgnoringImplicit(Box<Matcher>),
    Bind(String, Box<Matcher>),
}

impl Matcher {
    fn compile(spec: &PatternSpec) -> Result<Matcher, ConfigurationError> {
        let boxed = |inner: &PatternSpec| Matcher::compile(inner).map(Box::new);

        Ok(match spec {
            PatternSpec::Anything => Matcher::Anything,
            PatternSpec::Kind(name) => {
                if let Some(class) = NodeClass::from_name(name) {
                    Matcher::NodeKind(class)
                } else if let Some(class) = TokenClass::from_name(name) {
                    Matcher::TokenKind(class)
                } else {
                    return Err(ConfigurationError::UnknownKind(name.clone()));
                }
            }
            PatternSpec::Attr { name, values } => compile_attr(name, values)?,
            PatternSpec::Not(inner) => Matcher::Not(boxed(inner)?),
            PatternSpec::AnyOf(branches) => {
                if branches.is_empty() {
                    return Err(ConfigurationError::EmptyCombinator("any_of"));
                }
                Matcher::AnyOf(branches.iter().map(Matcher::compile).collect::<Result<_, _>>()?)
            }
            PatternSpec::AllOf(parts) => {
                if parts.is_empty() {
                    return Err(ConfigurationError::EmptyCombinator("all_of"));
                }
                Matcher::AllOf(parts.iter().map(Matcher::compile).collect::<Result<_, _>>()?)
            }
            PatternSpec::HasAncestor(inner) => Matcher::HasAncestor(boxed(inner)?),
            PatternSpec::HasDescendant(inner) => Matcher::HasDescendant(boxed(inner)?),
            PatternSpec::HasParent(inner) => Matcher::HasParent(boxed(inner)?),
            PatternSpec::Has(inner) => Matcher::Has(boxed(inner)?),
            PatternSpec::HasChild { role, pattern } => {
                let role = Role::from_name(role)
                    .ok_or_else(|| ConfigurationError::UnknownRole(role.clone()))?;
                Matcher::HasChild(role, boxed(pattern)?)
            }
            PatternSpec::RefersTo(inner) => Matcher::RefersTo(boxed(inner)?),
            PatternSpec::IgnoringImplicit(inner) => Matcher::IgnoringImplicit(boxed(inner)?),
            PatternSpec::Bind { name, pattern } => Matcher::Bind(name.clone(), boxed(pattern)?),
        })
    }

    /// Failed sub-evaluations leave `bindings` as they found them
    fn eval(&self, model: &NodeModel, target: Target, bindings: &mut Vec<(String, Target)>) -> bool {
        match self {
            Matcher::Anything => true,
            Matcher::NodeKind(class) => {
                node_of(model, target).is_some_and(|node| node.kind.class() == *class)
            }
            Matcher::TokenKind(class) => {
                token_of(model, target).is_some_and(|token| token.kind.class() == *class)
            }
            Matcher::Operator(names) => node_of(model, target)
                .and_then(Node::operator_name)
                .is_some_and(|op| names.iter().any(|name| name == op)),
            Matcher::Type(categories) => node_of(model, target)
                .and_then(|node| node.ty.as_ref())
                .is_some_and(|ty| categories.iter().any(|c| ty.in_category(*c))),
            Matcher::CastKind(kinds) => node_of(model, target)
                .and_then(Node::cast_kind)
                .is_some_and(|kind| kinds.contains(&kind)),
            Matcher::Name(names) => node_of(model, target)
                .and_then(Node::name)
                .is_some_and(|name| names.iter().any(|n| n == name)),
            Matcher::Spelling(values) => {
                spelling_of(model, target).is_some_and(|s| values.iter().any(|v| v == s))
            }
            Matcher::SpellingPrefix(prefixes) => spelling_of(model, target)
                .is_some_and(|s| prefixes.iter().any(|p| s.starts_with(p.as_str()))),
            Matcher::Keyword(keywords) => token_of(model, target).is_some_and(|token| {
                matches!(token.kind, TokenKind::Keyword(kw) if keywords.contains(&kw))
            }),
            Matcher::Role(roles) => node_of(model, target)
                .and_then(|node| node.role)
                .is_some_and(|role| roles.contains(&role)),
            Matcher::Not(inner) => {
                let mark = bindings.len();
                let matched = inner.eval(model, target, bindings);
                bindings.truncate(mark);
                !matched
            }
            Matcher::AnyOf(branches) => branches
                .iter()
                .any(|branch| attempt(branch, model, target, bindings)),
            Matcher::AllOf(parts) => {
                let mark = bindings.len();
                for part in parts {
                    if !part.eval(model, target, bindings) {
                        bindings.truncate(mark);
                        return false;
                    }
                }
                true
            }
            Matcher::HasAncestor(inner) => match target {
                Target::Node(id) => model
                    .ancestors(id)
                    .any(|ancestor| attempt(inner, model, Target::Node(ancestor), bindings)),
                Target::Token(_) => false,
            },
            Matcher::HasDescendant(inner) => match target {
                Target::Node(id) => model
                    .descendants(id)
                    .any(|child| attempt(inner, model, Target::Node(child), bindings)),
                Target::Token(_) => false,
            },
            Matcher::HasParent(inner) => match target {
                Target::Node(id) => model
                    .parent(id)
                    .is_some_and(|parent| attempt(inner, model, Target::Node(parent), bindings)),
                Target::Token(_) => false,
            },
            Matcher::Has(inner) => match target {
                Target::Node(id) => model
                    .children(id)
                    .iter()
                    .any(|&child| attempt(inner, model, Target::Node(child), bindings)),
                Target::Token(_) => false,
            },
            Matcher::HasChild(role, inner) => match target {
                Target::Node(id) => model.children(id).iter().any(|&child| {
                    model.node(child).role == Some(*role)
                        && attempt(inner, model, Target::Node(child), bindings)
                }),
                Target::Token(_) => false,
            },
            Matcher::RefersTo(inner) => match node_of(model, target).map(|node| &node.kind) {
                Some(NodeKind::DeclRef { decl, .. }) => {
                    attempt(inner, model, Target::Node(*decl), bindings)
                }
                _ => false,
            },
            Matcher::IgnoringImplicit(inner) => match target {
                Target::Node(id) => {
                    inner.eval(model, Target::Node(model.ignoring_implicit(id)), bindings)
                }
                Target::Token(_) => inner.eval(model, target, bindings),
            },
            Matcher::Bind(name, inner) => {
                if inner.eval(model, target, bindings) {
                    bindings.push((name.clone(), target));
                    true
                } else {
                    false
                }
            }
        }
    }
}

fn attempt(
    matcher: &Matcher,
    model: &NodeModel,
    target: Target,
    bindings: &mut Vec<(String, Target)>,
) -> bool {
    let mark = bindings.len();
    let matched = matcher.eval(model, target, bindings);
    if !matched {
        bindings.truncate(mark);
    }
    matched
}

fn compile_attr(name: &str, values: &[String]) -> Result<Matcher, ConfigurationError> {
    if values.is_empty() {
        return Err(ConfigurationError::MissingAttributeValues(name.to_string()));
    }

    let unknown = |value: &String| ConfigurationError::UnknownAttributeValue {
        attribute: name.to_string(),
        value: value.clone(),
    };

    let matcher = match name {
        "operator" => {
            if let Some(bad) = values.iter().find(|v| !is_operator_name(v)) {
                return Err(unknown(bad));
            }
            Matcher::Operator(values.to_vec())
        }
        "type" => Matcher::Type(
            values
                .iter()
                .map(|v| TypeCategory::from_name(v).ok_or_else(|| unknown(v)))
                .collect::<Result<_, _>>()?,
        ),
        "cast_kind" => Matcher::CastKind(
            values
                .iter()
                .map(|v| CastKind::from_name(v).ok_or_else(|| unknown(v)))
                .collect::<Result<_, _>>()?,
        ),
        "keyword" => Matcher::Keyword(
            values
                .iter()
                .map(|v| Keyword::from_str(v).ok_or_else(|| unknown(v)))
                .collect::<Result<_, _>>()?,
        ),
        "role" => Matcher::Role(
            values
                .iter()
                .map(|v| Role::from_name(v).ok_or_else(|| unknown(v)))
                .collect::<Result<_, _>>()?,
        ),
        "name" => Matcher::Name(values.to_vec()),
        "spelling" => Matcher::Spelling(values.to_vec()),
        "spelling_prefix" => Matcher::SpellingPrefix(values.to_vec()),
        other => return Err(ConfigurationError::UnknownAttribute(other.to_string())),
    };
    Ok(matcher)
}

fn node_of(model: &NodeModel, target: Target) -> Option<&Node> {
    match target {
        Target::Node(id) => Some(model.node(id)),
        Target::Token(_) => None,
    }
}

fn token_of(model: &NodeModel, target: Target) -> Option<&Token> {
    match target {
        Target::Token(index) => model.tokens().get(index),
        Target::Node(_) => None,
    }
}

fn spelling_of(model: &NodeModel, target: Target) -> Option<&str> {
    match target {
        Target::Token(index) => model.tokens().get(index).map(|t| t.spelling.as_str()),
        Target::Node(id) => model.node(id).literal_spelling(),
    }
}

/// A validated, immutable pattern
#[derive(Debug, Clone)]
pub struct Pattern {
    matcher: Matcher,
    captures: Vec<String>,
}

impl Pattern {
    pub fn matches(&self, model: &NodeModel, target: Target) -> Option<MatchResult> {
        let mut bindings = Vec::new();
        self.matcher
            .eval(model, target, &mut bindings)
            .then_some(MatchResult { bindings })
    }

    /// Every name the pattern can bind, sorted
    pub fn captures(&self) -> &[String] {
        &self.captures
    }
}
