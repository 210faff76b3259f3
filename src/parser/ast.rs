use crate::lexer::Token;
use crate::parser::types::{CastKind, Type};
use crate::preprocessor::LineMap;
use serde::Serialize;
use std::fmt;

/// Represents a position in the source code (1-based, physical line of the input text)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
}

/// Represents a span in the source code (start and end positions)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSpan {
    pub start: SourcePosition,
    pub end: SourcePosition,
}

impl SourceSpan {
    pub fn to(self, other: SourceSpan) -> SourceSpan {
        SourceSpan {
            start: self.start,
            end: other.end,
        }
    }
}

/// A position after `#line`/line-marker remapping, as presented to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLocation {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for ResolvedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Index of a node in its `NodeModel`; only meaningful for the model that produced it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    LAnd,
    LOr,
    Assign,
    MulAssign,
    DivAssign,
    RemAssign,
    AddAssign,
    SubAssign,
    ShlAssign,
    ShrAssign,
    AndAssign,
    XorAssign,
    OrAssign,
    Comma,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 30] = [
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Rem,
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Shl,
        BinaryOp::Shr,
        BinaryOp::Lt,
        BinaryOp::Gt,
        BinaryOp::Le,
        BinaryOp::Ge,
        BinaryOp::Eq,
        BinaryOp::Ne,
        BinaryOp::BitAnd,
        BinaryOp::BitXor,
        BinaryOp::BitOr,
        BinaryOp::LAnd,
        BinaryOp::LOr,
        BinaryOp::Assign,
        BinaryOp::MulAssign,
        BinaryOp::DivAssign,
        BinaryOp::RemAssign,
        BinaryOp::AddAssign,
        BinaryOp::SubAssign,
        BinaryOp::ShlAssign,
        BinaryOp::ShrAssign,
        BinaryOp::AndAssign,
        BinaryOp::XorAssign,
        BinaryOp::OrAssign,
        BinaryOp::Comma,
    ];

    pub fn spelling(&self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitXor => "^",
            BinaryOp::BitOr => "|",
            BinaryOp::LAnd => "&&",
            BinaryOp::LOr => "||",
            BinaryOp::Assign => "=",
            BinaryOp::MulAssign => "*=",
            BinaryOp::DivAssign => "/=",
            BinaryOp::RemAssign => "%=",
            BinaryOp::AddAssign => "+=",
            BinaryOp::SubAssign => "-=",
            BinaryOp::ShlAssign => "<<=",
            BinaryOp::ShrAssign => ">>=",
            BinaryOp::AndAssign => "&=",
            BinaryOp::XorAssign => "^=",
            BinaryOp::OrAssign => "|=",
            BinaryOp::Comma => ",",
        }
    }

    pub fn is_assignment(&self) -> bool {
        self.compound_base().is_some() || *self == BinaryOp::Assign
    }

    /// The arithmetic operator a compound assignment applies, e.g. `+` for `+=`
    pub fn compound_base(&self) -> Option<BinaryOp> {
        match self {
            BinaryOp::MulAssign => Some(BinaryOp::Mul),
            BinaryOp::DivAssign => Some(BinaryOp::Div),
            BinaryOp::RemAssign => Some(BinaryOp::Rem),
            BinaryOp::AddAssign => Some(BinaryOp::Add),
            BinaryOp::SubAssign => Some(BinaryOp::Sub),
            BinaryOp::ShlAssign => Some(BinaryOp::Shl),
            BinaryOp::ShrAssign => Some(BinaryOp::Shr),
            BinaryOp::AndAssign => Some(BinaryOp::BitAnd),
            BinaryOp::XorAssign => Some(BinaryOp::BitXor),
            BinaryOp::OrAssign => Some(BinaryOp::BitOr),
            _ => None,
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::LAnd | BinaryOp::LOr)
    }

    pub fn is_shift(&self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    PostInc,
    PostDec,
    PreInc,
    PreDec,
    AddrOf,
    Deref,
    Plus,
    Minus,
    Not,
    LNot,
}

impl UnaryOp {
    pub const ALL: [UnaryOp; 10] = [
        UnaryOp::PostInc,
        UnaryOp::PostDec,
        UnaryOp::PreInc,
        UnaryOp::PreDec,
        UnaryOp::AddrOf,
        UnaryOp::Deref,
        UnaryOp::Plus,
        UnaryOp::Minus,
        UnaryOp::Not,
        UnaryOp::LNot,
    ];

    pub fn spelling(&self) -> &'static str {
        match self {
            UnaryOp::PostInc | UnaryOp::PreInc => "++",
            UnaryOp::PostDec | UnaryOp::PreDec => "--",
            UnaryOp::AddrOf => "&",
            UnaryOp::Deref => "*",
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Not => "~",
            UnaryOp::LNot => "!",
        }
    }
}

/// Spellings accepted by operator-name predicates
pub fn is_operator_name(name: &str) -> bool {
    name == "[]"
        || name == "?:"
        || BinaryOp::ALL.iter().any(|op| op.spelling() == name)
        || UnaryOp::ALL.iter().any(|op| op.spelling() == name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    TranslationUnit,
    TypedefDecl { name: String },
    VarDecl { name: String },
    ParmVarDecl { name: String },
    FunctionDecl { name: String },
    EnumDecl { name: String },
    EnumConstantDecl { name: String },
    CompoundStmt,
    DeclStmt,
    NullStmt,
    IfStmt,
    WhileStmt,
    DoStmt,
    ForStmt,
    ReturnStmt,
    BreakStmt,
    ContinueStmt,
    BinaryOperator(BinaryOp),
    UnaryOperator(UnaryOp),
    ConditionalOperator,
    ImplicitCast(CastKind),
    ExplicitCast(CastKind),
    Paren,
    DeclRef { name: String, decl: NodeId },
    IntegerLiteral { spelling: String },
    FloatingLiteral { spelling: String },
    CharLiteral { spelling: String },
    StringLiteral { spelling: String },
    BoolLiteral(bool),
    Call,
    ArraySubscript,
}

/// Node kinds with the payload stripped, as named in patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeClass {
    TranslationUnit,
    TypedefDecl,
    VarDecl,
    ParmVarDecl,
    FunctionDecl,
    EnumDecl,
    EnumConstantDecl,
    CompoundStmt,
    DeclStmt,
    NullStmt,
    IfStmt,
    WhileStmt,
    DoStmt,
    ForStmt,
    ReturnStmt,
    BreakStmt,
    ContinueStmt,
    BinaryOperator,
    UnaryOperator,
    ConditionalOperator,
    ImplicitCastExpr,
    ExplicitCastExpr,
    ParenExpr,
    DeclRefExpr,
    IntegerLiteral,
    FloatingLiteral,
    CharacterLiteral,
    StringLiteral,
    BoolLiteral,
    CallExpr,
    ArraySubscriptExpr,
}

impl NodeClass {
    pub const ALL: [NodeClass; 31] = [
        NodeClass::TranslationUnit,
        NodeClass::TypedefDecl,
        NodeClass::VarDecl,
        NodeClass::ParmVarDecl,
        NodeClass::FunctionDecl,
        NodeClass::EnumDecl,
        NodeClass::EnumConstantDecl,
        NodeClass::CompoundStmt,
        NodeClass::DeclStmt,
        NodeClass::NullStmt,
        NodeClass::IfStmt,
        NodeClass::WhileStmt,
        NodeClass::DoStmt,
        NodeClass::ForStmt,
        NodeClass::ReturnStmt,
        NodeClass::BreakStmt,
        NodeClass::ContinueStmt,
        NodeClass::BinaryOperator,
        NodeClass::UnaryOperator,
        NodeClass::ConditionalOperator,
        NodeClass::ImplicitCastExpr,
        NodeClass::ExplicitCastExpr,
        NodeClass::ParenExpr,
        NodeClass::DeclRefExpr,
        NodeClass::IntegerLiteral,
        NodeClass::FloatingLiteral,
        NodeClass::CharacterLiteral,
        NodeClass::StringLiteral,
        NodeClass::BoolLiteral,
        NodeClass::CallExpr,
        NodeClass::ArraySubscriptExpr,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            NodeClass::TranslationUnit => "TranslationUnit",
            NodeClass::TypedefDecl => "TypedefDecl",
            NodeClass::VarDecl => "VarDecl",
            NodeClass::ParmVarDecl => "ParmVarDecl",
            NodeClass::FunctionDecl => "FunctionDecl",
            NodeClass::EnumDecl => "EnumDecl",
            NodeClass::EnumConstantDecl => "EnumConstantDecl",
            NodeClass::CompoundStmt => "CompoundStmt",
            NodeClass::DeclStmt => "DeclStmt",
            NodeClass::NullStmt => "NullStmt",
            NodeClass::IfStmt => "IfStmt",
            NodeClass::WhileStmt => "WhileStmt",
            NodeClass::DoStmt => "DoStmt",
            NodeClass::ForStmt => "ForStmt",
            NodeClass::ReturnStmt => "ReturnStmt",
            NodeClass::BreakStmt => "BreakStmt",
            NodeClass::ContinueStmt => "ContinueStmt",
            NodeClass::BinaryOperator => "BinaryOperator",
            NodeClass::UnaryOperator => "UnaryOperator",
            NodeClass::ConditionalOperator => "ConditionalOperator",
            NodeClass::ImplicitCastExpr => "ImplicitCastExpr",
            NodeClass::ExplicitCastExpr => "ExplicitCastExpr",
            NodeClass::ParenExpr => "ParenExpr",
            NodeClass::DeclRefExpr => "DeclRefExpr",
            NodeClass::IntegerLiteral => "IntegerLiteral",
            NodeClass::FloatingLiteral => "FloatingLiteral",
            NodeClass::CharacterLiteral => "CharacterLiteral",
            NodeClass::StringLiteral => "StringLiteral",
            NodeClass::BoolLiteral => "BoolLiteral",
            NodeClass::CallExpr => "CallExpr",
            NodeClass::ArraySubscriptExpr => "ArraySubscriptExpr",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.name() == name)
    }
}

impl NodeKind {
    pub fn class(&self) -> NodeClass {
        match self {
            NodeKind::TranslationUnit => NodeClass::TranslationUnit,
            NodeKind::TypedefDecl { .. } => NodeClass::TypedefDecl,
            NodeKind::VarDecl { .. } => NodeClass::VarDecl,
            NodeKind::ParmVarDecl { .. } => NodeClass::ParmVarDecl,
            NodeKind::FunctionDecl { .. } => NodeClass::FunctionDecl,
            NodeKind::EnumDecl { .. } => NodeClass::EnumDecl,
            NodeKind::EnumConstantDecl { .. } => NodeClass::EnumConstantDecl,
            NodeKind::CompoundStmt => NodeClass::CompoundStmt,
            NodeKind::DeclStmt => NodeClass::DeclStmt,
            NodeKind::NullStmt => NodeClass::NullStmt,
            NodeKind::IfStmt => NodeClass::IfStmt,
            NodeKind::WhileStmt => NodeClass::WhileStmt,
            NodeKind::DoStmt => NodeClass::DoStmt,
            NodeKind::ForStmt => NodeClass::ForStmt,
            NodeKind::ReturnStmt => NodeClass::ReturnStmt,
            NodeKind::BreakStmt => NodeClass::BreakStmt,
            NodeKind::ContinueStmt => NodeClass::ContinueStmt,
            NodeKind::BinaryOperator(_) => NodeClass::BinaryOperator,
            NodeKind::UnaryOperator(_) => NodeClass::UnaryOperator,
            NodeKind::ConditionalOperator => NodeClass::ConditionalOperator,
            NodeKind::ImplicitCast(_) => NodeClass::ImplicitCastExpr,
            NodeKind::ExplicitCast(_) => NodeClass::ExplicitCastExpr,
            NodeKind::Paren => NodeClass::ParenExpr,
            NodeKind::DeclRef { .. } => NodeClass::DeclRefExpr,
            NodeKind::IntegerLiteral { .. } => NodeClass::IntegerLiteral,
            NodeKind::FloatingLiteral { .. } => NodeClass::FloatingLiteral,
            NodeKind::CharLiteral { .. } => NodeClass::CharacterLiteral,
            NodeKind::StringLiteral { .. } => NodeClass::StringLiteral,
            NodeKind::BoolLiteral(_) => NodeClass::BoolLiteral,
            NodeKind::Call => NodeClass::CallExpr,
            NodeKind::ArraySubscript => NodeClass::ArraySubscriptExpr,
        }
    }
}

/// How a node hangs off its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Decl,
    Statement,
    Lhs,
    Rhs,
    Operand,
    SubExpr,
    Condition,
    Then,
    Else,
    Body,
    Init,
    Increment,
    TrueExpr,
    FalseExpr,
    Initializer,
    Callee,
    Argument,
    Base,
    Index,
    Value,
    Parameter,
    Enumerator,
}

impl Role {
    pub const ALL: [Role; 22] = [
        Role::Decl,
        Role::Statement,
        Role::Lhs,
        Role::Rhs,
        Role::Operand,
        Role::SubExpr,
        Role::Condition,
        Role::Then,
        Role::Else,
        Role::Body,
        Role::Init,
        Role::Increment,
        Role::TrueExpr,
        Role::FalseExpr,
        Role::Initializer,
        Role::Callee,
        Role::Argument,
        Role::Base,
        Role::Index,
        Role::Value,
        Role::Parameter,
        Role::Enumerator,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Role::Decl => "decl",
            Role::Statement => "statement",
            Role::Lhs => "lhs",
            Role::Rhs => "rhs",
            Role::Operand => "operand",
            Role::SubExpr => "sub_expr",
            Role::Condition => "condition",
            Role::Then => "then",
            Role::Else => "else",
            Role::Body => "body",
            Role::Init => "init",
            Role::Increment => "increment",
            Role::TrueExpr => "true_expr",
            Role::FalseExpr => "false_expr",
            Role::Initializer => "initializer",
            Role::Callee => "callee",
            Role::Argument => "argument",
            Role::Base => "base",
            Role::Index => "index",
            Role::Value => "value",
            Role::Parameter => "parameter",
            Role::Enumerator => "enumerator",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.name() == name)
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub span: SourceSpan,
    /// Primary location: the operator for operators, the name for declarations
    pub loc: SourcePosition,
    pub ty: Option<Type>,
    pub parent: Option<NodeId>,
    pub role: Option<Role>,
    pub children: Vec<NodeId>,
}

impl Node {
    /// Declared or referenced name
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::TypedefDecl { name }
            | NodeKind::VarDecl { name }
            | NodeKind::ParmVarDecl { name }
            | NodeKind::FunctionDecl { name }
            | NodeKind::EnumDecl { name }
            | NodeKind::EnumConstantDecl { name }
            | NodeKind::DeclRef { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn operator_name(&self) -> Option<&'static str> {
        match &self.kind {
            NodeKind::BinaryOperator(op) => Some(op.spelling()),
            NodeKind::UnaryOperator(op) => Some(op.spelling()),
            NodeKind::ArraySubscript => Some("[]"),
            NodeKind::ConditionalOperator => Some("?:"),
            _ => None,
        }
    }

    pub fn cast_kind(&self) -> Option<CastKind> {
        match &self.kind {
            NodeKind::ImplicitCast(kind) | NodeKind::ExplicitCast(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn literal_spelling(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::IntegerLiteral { spelling }
            | NodeKind::FloatingLiteral { spelling }
            | NodeKind::CharLiteral { spelling }
            | NodeKind::StringLiteral { spelling } => Some(spelling),
            _ => None,
        }
    }
}

/// Incrementally assembles the node arena; id 0 is always the translation unit
#[derive(Debug)]
pub struct TreeBuilder {
    nodes: Vec<Node>,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        let origin = SourcePosition { line: 1, column: 1 };
        let root = Node {
            kind: NodeKind::TranslationUnit,
            span: SourceSpan {
                start: origin,
                end: origin,
            },
            loc: origin,
            ty: None,
            parent: None,
            role: None,
            children: Vec::new(),
        };
        TreeBuilder { nodes: vec![root] }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn add(
        &mut self,
        kind: NodeKind,
        span: SourceSpan,
        loc: SourcePosition,
        ty: Option<Type>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            span,
            loc,
            ty,
            parent: None,
            role: None,
            children: Vec::new(),
        });
        id
    }

    /// Appends `child` to `parent`'s children; children must be attached in source order
    pub fn attach(&mut self, parent: NodeId, child: NodeId, role: Role) {
        let node = &mut self.nodes[child.index()];
        node.parent = Some(parent);
        node.role = Some(role);
        self.nodes[parent.index()].children.push(child);
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn set_root_span(&mut self, span: SourceSpan) {
        self.nodes[0].span = span;
    }
}

/// One parsed translation unit: syntax tree, token stream and location resolver
#[derive(Debug)]
pub struct NodeModel {
    nodes: Vec<Node>,
    tokens: Vec<Token>,
    line_map: LineMap,
    source: String,
    system_dirs: Vec<String>,
}

impl NodeModel {
    pub fn from_parts(
        tree: TreeBuilder,
        tokens: Vec<Token>,
        line_map: LineMap,
        source: String,
        system_dirs: Vec<String>,
    ) -> Self {
        NodeModel {
            nodes: tree.nodes,
            tokens,
            line_map,
            source,
            system_dirs,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn main_file(&self) -> &str {
        self.line_map.main_file()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// First child of `id` attached in `role`
    pub fn child(&self, id: NodeId, role: Role) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&child| self.node(child).role == Some(role))
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&current| self.parent(current))
    }

    /// All nodes below `id` in pre-order, `id` itself excluded
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants { model: self, stack }
    }

    /// The whole tree in pre-order, root first
    pub fn preorder(&self) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::once(self.root()).chain(self.descendants(self.root()))
    }

    /// Strips implicit conversions and parentheses down to the written expression
    pub fn ignoring_implicit(&self, mut id: NodeId) -> NodeId {
        loop {
            let node = self.node(id);
            match node.kind {
                NodeKind::ImplicitCast(_) | NodeKind::Paren => match node.children.first() {
                    Some(&inner) => id = inner,
                    None => return id,
                },
                _ => return id,
            }
        }
    }

    pub fn is_system_location(&self, pos: SourcePosition) -> bool {
        let presumed = self.line_map.lookup(pos.line);
        presumed.is_system
            || self
                .system_dirs
                .iter()
                .any(|dir| !dir.is_empty() && presumed.file.starts_with(dir.as_str()))
    }

    pub fn resolve(&self, pos: SourcePosition) -> ResolvedLocation {
        let presumed = self.line_map.lookup(pos.line);
        ResolvedLocation {
            file: presumed.file.to_string(),
            line: presumed.line,
            column: pos.column,
        }
    }

    /// Text of a physical line of the unit, without its line terminator
    pub fn source_line(&self, line: usize) -> Option<&str> {
        if line == 0 {
            return None;
        }
        self.source.lines().nth(line - 1)
    }
}

pub struct Descendants<'m> {
    model: &'m NodeModel,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.model.children(id).iter().rev().copied());
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: usize, column: usize) -> SourcePosition {
        SourcePosition { line, column }
    }

    fn span(line: usize) -> SourceSpan {
        SourceSpan {
            start: pos(line, 1),
            end: pos(line, 10),
        }
    }

    /// `x = (int)y;` style tree built by hand: root -> assign -> {lhs, cast -> paren -> ref}
    fn sample_model() -> (NodeModel, NodeId, NodeId, NodeId) {
        let mut tree = TreeBuilder::new();
        let root = tree.root();
        let decl = tree.add(
            NodeKind::VarDecl { name: "y".into() },
            span(1),
            pos(1, 5),
            Some(Type::INT),
        );
        tree.attach(root, decl, Role::Decl);
        let assign = tree.add(
            NodeKind::BinaryOperator(BinaryOp::Assign),
            span(2),
            pos(2, 3),
            Some(Type::Bool),
        );
        let lhs = tree.add(
            NodeKind::DeclRef {
                name: "y".into(),
                decl,
            },
            span(2),
            pos(2, 1),
            Some(Type::INT),
        );
        let cast = tree.add(
            NodeKind::ImplicitCast(CastKind::IntegralToBoolean),
            span(2),
            pos(2, 5),
            Some(Type::Bool),
        );
        let paren = tree.add(NodeKind::Paren, span(2), pos(2, 5), Some(Type::INT));
        let inner = tree.add(
            NodeKind::DeclRef {
                name: "y".into(),
                decl,
            },
            span(2),
            pos(2, 6),
            Some(Type::INT),
        );
        tree.attach(paren, inner, Role::SubExpr);
        tree.attach(cast, paren, Role::SubExpr);
        tree.attach(assign, lhs, Role::Lhs);
        tree.attach(assign, cast, Role::Rhs);
        tree.attach(root, assign, Role::Statement);

        let mut line_map = LineMap::new("main.c");
        line_map.add_entry(2, "/usr/include/sys.h", 40, false);
        let model = NodeModel::from_parts(
            tree,
            Vec::new(),
            line_map,
            "int y;\ny = (y);\n".to_string(),
            vec!["/usr/include".to_string()],
        );
        (model, assign, cast, inner)
    }

    #[test]
    fn preorder_visits_parents_first_in_source_order() {
        let (model, assign, cast, inner) = sample_model();
        let order: Vec<NodeId> = model.preorder().collect();
        assert_eq!(order.len(), model.len());
        assert_eq!(order[0], model.root());
        let position = |id| order.iter().position(|&n| n == id);
        assert!(position(assign) < position(cast));
        assert!(position(cast) < position(inner));
    }

    #[test]
    fn navigation_by_role_and_unwrapping() {
        let (model, assign, cast, inner) = sample_model();
        assert_eq!(model.child(assign, Role::Rhs), Some(cast));
        assert_eq!(model.ignoring_implicit(cast), inner);
        assert_eq!(model.node(assign).operator_name(), Some("="));
        assert_eq!(model.ancestors(inner).last(), Some(model.root()));
        assert_eq!(model.ancestors(inner).count(), 4);
    }

    #[test]
    fn locations_resolve_through_line_map() {
        let (model, _, _, _) = sample_model();
        assert!(!model.is_system_location(pos(1, 1)));
        assert!(model.is_system_location(pos(3, 1)));
        assert_eq!(
            model.resolve(pos(3, 7)),
            ResolvedLocation {
                file: "/usr/include/sys.h".into(),
                line: 40,
                column: 7
            }
        );
        assert_eq!(model.source_line(2), Some("y = (y);"));
    }

    #[test]
    fn names_round_trip() {
        for class in NodeClass::ALL {
            assert_eq!(NodeClass::from_name(class.name()), Some(class));
        }
        for role in Role::ALL {
            assert_eq!(Role::from_name(role.name()), Some(role));
        }
        assert!(is_operator_name("<<="));
        assert!(is_operator_name("[]"));
        assert!(!is_operator_name("<>"));
    }
}
