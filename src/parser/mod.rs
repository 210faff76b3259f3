use crate::CheckError;
use crate::lexer::{Keyword, Lexer, Punct, Token, TokenKind};
use crate::parser::ast::*;
use crate::parser::scope::{ScopeId, Symbol, SymbolTable};
use crate::parser::types::{
    CastKind, FloatKind, IntKind, Type, cast_kind, floating_literal_type, integer_literal_type,
    integer_literal_value, is_floating_literal, promote, usual_arithmetic,
};
use crate::preprocessor::{LineMap, preprocess};
use log::debug;

pub mod ast;
mod scope;
pub mod types;

/// What the host knows about the unit being compiled
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub file_name: String,
    /// A location whose presumed file starts with one of these is a system location
    pub system_header_dirs: Vec<String>,
}

impl CompileOptions {
    pub fn new(file_name: &str) -> Self {
        CompileOptions {
            file_name: file_name.to_string(),
            system_header_dirs: Vec::new(),
        }
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self::new("<stdin>")
    }
}

/// Preprocesses, tokenizes and parses one translation unit
pub fn parse(source: &str, options: &CompileOptions) -> Result<NodeModel, CheckError> {
    let preprocessed = preprocess(source, &options.file_name)?;
    let line_map = preprocessed.line_map;

    let tokens = Lexer::new(&preprocessed.text)
        .tokenize()
        .map_err(|err| match err {
            CheckError::LexerError {
                line,
                column,
                message,
            } => {
                let presumed = line_map.lookup(line);
                CheckError::ParseError {
                    file: presumed.file.to_string(),
                    line: presumed.line,
                    column,
                    message,
                }
            }
            other => other,
        })?;

    let tree = Parser::new(&tokens, &line_map).parse_translation_unit()?;
    debug!(
        "parsed {}: {} tokens",
        options.file_name,
        tokens.len()
    );

    Ok(NodeModel::from_parts(
        tree,
        tokens,
        line_map,
        source.to_string(),
        options.system_header_dirs.clone(),
    ))
}

/// Type of a declaration's specifier list before the declarator is applied
enum BaseSpec {
    Void,
    Bool,
    Char,
    Short,
    Float,
    Double,
    Named(Type),
}

struct DeclSpec {
    ty: Type,
    is_typedef: bool,
    start: SourcePosition,
    enum_decl: Option<NodeId>,
}

struct ParamDecl {
    name: Option<String>,
    loc: SourcePosition,
    ty: Type,
    span: SourceSpan,
}

struct Declarator {
    name: Option<(String, SourcePosition)>,
    ty: Type,
    params: Option<Vec<ParamDecl>>,
    end: SourcePosition,
}

type ParseLevel<'a> = fn(&mut Parser<'a>) -> Result<NodeId, CheckError>;

/// Deepest recursion the parser follows before giving up on a unit
pub const MAX_NESTING_DEPTH: usize = 128;

pub struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
    line_map: &'a LineMap,
    tree: TreeBuilder,
    symbols: SymbolTable,
    scope: ScopeId,
    current_return: Option<Type>,
    depth: usize,
}

impl<'a> Parser<'a> {
    /// `tokens` must end with the end-of-file token
    pub fn new(tokens: &'a [Token], line_map: &'a LineMap) -> Self {
        let symbols = SymbolTable::new();
        let scope = symbols.global_scope();
        Parser {
            tokens,
            current: 0,
            line_map,
            tree: TreeBuilder::new(),
            symbols,
            scope,
            current_return: None,
            depth: 0,
        }
    }

    /// Runs `parse` one nesting level deeper, failing instead of exhausting the stack
    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, CheckError>,
    ) -> Result<T, CheckError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error(format!(
                "nesting exceeds the maximum depth of {MAX_NESTING_DEPTH}"
            )));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.current + offset).min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.current += 1;
        }
        token
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check(&self, punct: Punct) -> bool {
        self.peek().is_punct(punct)
    }

    fn check_keyword(&self, keyword: Keyword) -> bool {
        self.peek().is_keyword(keyword)
    }

    fn match_token(&mut self, punct: Punct) -> bool {
        if self.check(punct) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, punct: Punct, context: &str) -> Result<Token, CheckError> {
        if self.check(punct) {
            Ok(self.advance())
        } else {
            Err(self.error(format!(
                "expected '{}' {}, got {}",
                punct.as_str(),
                context,
                describe(self.peek())
            )))
        }
    }

    fn previous_end(&self) -> SourcePosition {
        match self.current.checked_sub(1) {
            Some(index) => self.tokens[index].span.end,
            None => self.peek().span.start,
        }
    }

    fn error_at(&self, pos: SourcePosition, message: impl Into<String>) -> CheckError {
        let presumed = self.line_map.lookup(pos.line);
        CheckError::ParseError {
            file: presumed.file.to_string(),
            line: presumed.line,
            column: pos.column,
            message: message.into(),
        }
    }

    fn error(&self, message: impl Into<String>) -> CheckError {
        self.error_at(self.peek().span.start, message)
    }

    fn type_of(&self, id: NodeId) -> Option<Type> {
        self.tree.node(id).ty.clone()
    }

    fn span_of(&self, id: NodeId) -> SourceSpan {
        self.tree.node(id).span
    }

    fn extend_to_previous(&mut self, id: NodeId) {
        let end = self.previous_end();
        self.tree.node_mut(id).span.end = end;
    }

    fn declare(&mut self, name: &str, symbol: Symbol, loc: SourcePosition) -> Result<(), CheckError> {
        self.symbols
            .add_symbol(self.scope, name, symbol)
            .map_err(|message| self.error_at(loc, message))
    }

    pub fn parse_translation_unit(mut self) -> Result<TreeBuilder, CheckError> {
        let root = self.tree.root();
        while !self.is_at_end() {
            self.parse_declaration(root, true)?;
        }

        let end = self.peek().span.end;
        self.tree.set_root_span(SourceSpan {
            start: SourcePosition { line: 1, column: 1 },
            end,
        });
        Ok(self.tree)
    }

    // ---------------------------------------------------------------- conversions

    /// Wraps `expr` in an implicit cast to `to` when its type differs
    fn convert(&mut self, expr: NodeId, to: &Type) -> NodeId {
        let Some(from) = self.type_of(expr) else {
            return expr;
        };
        let Some(kind) = cast_kind(&from, to) else {
            return expr;
        };
        let node = self.tree.node(expr);
        let (span, loc) = (node.span, node.loc);
        let cast = self
            .tree
            .add(NodeKind::ImplicitCast(kind), span, loc, Some(to.clone()));
        self.tree.attach(cast, expr, Role::SubExpr);
        cast
    }

    fn to_bool(&mut self, expr: NodeId) -> NodeId {
        self.convert(expr, &Type::Bool)
    }

    fn decay(&mut self, expr: NodeId) -> NodeId {
        match self.type_of(expr) {
            Some(ty @ Type::Array(..)) => self.convert(expr, &ty.decayed()),
            _ => expr,
        }
    }

    fn promote_operand(&mut self, expr: NodeId) -> (NodeId, Option<Type>) {
        match self.type_of(expr) {
            Some(ty) if ty.is_arithmetic() => {
                let promoted = promote(&ty);
                (self.convert(expr, &promoted), Some(promoted))
            }
            other => (self.decay(expr), other),
        }
    }

    /// Usual arithmetic conversions, or pointer arithmetic when one side is a pointer
    fn arithmetic_operands(&mut self, lhs: NodeId, rhs: NodeId) -> (NodeId, NodeId, Option<Type>) {
        match (self.type_of(lhs), self.type_of(rhs)) {
            (Some(l), Some(r)) if l.is_arithmetic() && r.is_arithmetic() => {
                let common = usual_arithmetic(&l, &r);
                let lhs = self.convert(lhs, &common);
                let rhs = self.convert(rhs, &common);
                (lhs, rhs, Some(common))
            }
            (Some(l), Some(r)) => {
                let ty = if l.is_pointer() && r.is_pointer() {
                    Type::int(IntKind::Long, true)
                } else if l.is_pointer() {
                    l.decayed()
                } else {
                    r.decayed()
                };
                (self.decay(lhs), self.decay(rhs), Some(ty))
            }
            _ => (lhs, rhs, None),
        }
    }

    // ---------------------------------------------------------------- declarations

    fn is_type_name(&self, token: &Token) -> bool {
        match token.kind {
            TokenKind::Keyword(keyword) => {
                keyword.is_type_specifier()
                    || matches!(
                        keyword,
                        Keyword::Typedef | Keyword::Enum | Keyword::Struct | Keyword::Union
                    )
            }
            TokenKind::Identifier => matches!(
                self.symbols.lookup_symbol(self.scope, &token.spelling),
                Some(Symbol::Typedef { .. })
            ),
            _ => false,
        }
    }

    fn starts_declaration(&self) -> bool {
        self.is_type_name(self.peek())
    }

    fn set_base(&self, base: &mut Option<BaseSpec>, spec: BaseSpec, token: &Token) -> Result<(), CheckError> {
        if base.is_some() {
            return Err(self.error_at(
                token.span.start,
                format!("cannot combine '{}' with previous type specifier", token.spelling),
            ));
        }
        *base = Some(spec);
        Ok(())
    }

    fn parse_decl_specifiers(&mut self) -> Result<Option<DeclSpec>, CheckError> {
        let start = self.peek().span.start;
        let mut is_typedef = false;
        let mut signedness: Option<bool> = None;
        let mut base: Option<BaseSpec> = None;
        let mut saw_int = false;
        let mut longs = 0;
        let mut seen_any = false;
        let mut enum_decl = None;

        loop {
            let token = self.peek().clone();
            match token.kind {
                TokenKind::Keyword(Keyword::Typedef) => is_typedef = true,
                TokenKind::Keyword(
                    Keyword::Const
                    | Keyword::Volatile
                    | Keyword::Static
                    | Keyword::Extern
                    | Keyword::Inline
                    | Keyword::Register,
                ) => {}
                TokenKind::Keyword(Keyword::Signed) => signedness = Some(true),
                TokenKind::Keyword(Keyword::Unsigned) => signedness = Some(false),
                TokenKind::Keyword(Keyword::Long) => longs += 1,
                TokenKind::Keyword(Keyword::Int) => saw_int = true,
                TokenKind::Keyword(Keyword::Void) => self.set_base(&mut base, BaseSpec::Void, &token)?,
                TokenKind::Keyword(Keyword::Bool) => self.set_base(&mut base, BaseSpec::Bool, &token)?,
                TokenKind::Keyword(Keyword::Char) => self.set_base(&mut base, BaseSpec::Char, &token)?,
                TokenKind::Keyword(Keyword::Short) => self.set_base(&mut base, BaseSpec::Short, &token)?,
                TokenKind::Keyword(Keyword::Float) => self.set_base(&mut base, BaseSpec::Float, &token)?,
                TokenKind::Keyword(Keyword::Double) => {
                    self.set_base(&mut base, BaseSpec::Double, &token)?
                }
                TokenKind::Keyword(Keyword::Enum) => {
                    self.advance();
                    let (ty, decl) = self.parse_enum_specifier()?;
                    self.set_base(&mut base, BaseSpec::Named(ty), &token)?;
                    enum_decl = decl;
                    seen_any = true;
                    continue;
                }
                TokenKind::Keyword(Keyword::Struct | Keyword::Union) => {
                    return Err(self.error(format!("'{}' types are not supported", token.spelling)));
                }
                TokenKind::Identifier
                    if base.is_none() && signedness.is_none() && longs == 0 && !saw_int =>
                {
                    match self.symbols.lookup_symbol(self.scope, &token.spelling) {
                        Some(Symbol::Typedef { ty }) => base = Some(BaseSpec::Named(ty.clone())),
                        _ => break,
                    }
                }
                _ => break,
            }
            seen_any = true;
            self.advance();
        }

        if !seen_any {
            return Ok(None);
        }

        if longs > 2 {
            return Err(self.error_at(start, "'long long long' is too long"));
        }
        let signed = signedness.unwrap_or(true);
        let ty = match base {
            None if !saw_int && signedness.is_none() && longs == 0 => {
                return Err(self.error_at(start, "type specifier missing in declaration"));
            }
            None => {
                let kind = match longs {
                    0 => IntKind::Int,
                    1 => IntKind::Long,
                    _ => IntKind::LongLong,
                };
                Type::int(kind, signed)
            }
            Some(BaseSpec::Void) => Type::Void,
            Some(BaseSpec::Bool) => Type::Bool,
            Some(BaseSpec::Char) => Type::int(IntKind::Char, signed),
            Some(BaseSpec::Short) => Type::int(IntKind::Short, signed),
            Some(BaseSpec::Float) => Type::Floating(FloatKind::Float),
            Some(BaseSpec::Double) if longs > 0 => Type::Floating(FloatKind::LongDouble),
            Some(BaseSpec::Double) => Type::Floating(FloatKind::Double),
            Some(BaseSpec::Named(ty)) => ty,
        };

        Ok(Some(DeclSpec {
            ty,
            is_typedef,
            start,
            enum_decl,
        }))
    }

    /// Parses what follows `enum`: a reference to a known tag or a full definition
    fn parse_enum_specifier(&mut self) -> Result<(Type, Option<NodeId>), CheckError> {
        let name_token = if self.peek().kind == TokenKind::Identifier {
            Some(self.advance())
        } else {
            None
        };

        if !self.check(Punct::LeftBrace) {
            let Some(tag) = name_token else {
                return Err(self.error("expected enum name or '{'"));
            };
            return match self.symbols.lookup_tag(self.scope, &tag.spelling) {
                Some(ty) => Ok((ty.clone(), None)),
                None => Err(self.error_at(
                    tag.span.start,
                    format!("use of undeclared enum '{}'", tag.spelling),
                )),
            };
        }

        let open = self.advance();
        let (name, loc) = match &name_token {
            Some(tag) => (tag.spelling.clone(), tag.span.start),
            None => (
                format!("(anonymous at {}:{})", open.span.start.line, open.span.start.column),
                open.span.start,
            ),
        };
        let ty = Type::Enum(name.clone());
        self.symbols
            .add_tag(self.scope, &name, ty.clone())
            .map_err(|message| self.error_at(loc, message))?;

        let start = name_token.as_ref().map_or(open.span.start, |tag| tag.span.start);
        let decl = self.tree.add(
            NodeKind::EnumDecl { name },
            SourceSpan { start, end: start },
            loc,
            Some(ty.clone()),
        );

        while !self.check(Punct::RightBrace) {
            let token = self.advance();
            if token.kind != TokenKind::Identifier {
                return Err(self.error_at(
                    token.span.start,
                    format!("expected enumerator name, got {}", describe(&token)),
                ));
            }
            let enumerator = self.tree.add(
                NodeKind::EnumConstantDecl {
                    name: token.spelling.clone(),
                },
                token.span,
                token.span.start,
                Some(ty.clone()),
            );
            if self.match_token(Punct::Equal) {
                let value = self.parse_conditional_expression()?;
                self.tree.attach(enumerator, value, Role::Initializer);
                self.extend_to_previous(enumerator);
            }
            self.tree.attach(decl, enumerator, Role::Enumerator);
            self.declare(
                &token.spelling,
                Symbol::EnumConstant {
                    decl: enumerator,
                    ty: ty.clone(),
                },
                token.span.start,
            )?;

            if !self.match_token(Punct::Comma) {
                break;
            }
        }
        self.consume(Punct::RightBrace, "to close enum definition")?;
        self.extend_to_previous(decl);

        Ok((ty, Some(decl)))
    }

    fn parse_declarator(&mut self, base: Type, allow_abstract: bool) -> Result<Declarator, CheckError> {
        self.nested(|parser| parser.parse_declarator_inner(base, allow_abstract))
    }

    fn parse_declarator_inner(&mut self, base: Type, allow_abstract: bool) -> Result<Declarator, CheckError> {
        let mut ty = base;
        while self.match_token(Punct::Star) {
            ty = Type::Pointer(Box::new(ty));
            while self.match_keyword(Keyword::Const) || self.match_keyword(Keyword::Volatile) {}
        }

        let name = if self.peek().kind == TokenKind::Identifier {
            let token = self.advance();
            Some((token.spelling, token.span.start))
        } else if allow_abstract {
            None
        } else {
            return Err(self.error(format!(
                "expected identifier in declaration, got {}",
                describe(self.peek())
            )));
        };

        let mut params = None;
        if self.match_token(Punct::LeftParen) {
            let list = self.parse_parameter_list()?;
            let param_types = list.iter().map(|param| param.ty.clone()).collect();
            ty = Type::Function {
                ret: Box::new(ty),
                params: param_types,
            };
            params = Some(list);
        } else {
            let mut dims = Vec::new();
            while self.match_token(Punct::LeftBracket) {
                if self.match_token(Punct::RightBracket) {
                    dims.push(None);
                    continue;
                }
                let token = self.advance();
                let len = match token.kind {
                    TokenKind::NumericConstant => integer_literal_value(&token.spelling),
                    _ => None,
                }
                .ok_or_else(|| {
                    self.error_at(token.span.start, "array size must be an integer constant")
                })?;
                self.consume(Punct::RightBracket, "after array size")?;
                dims.push(Some(len));
            }
            for dim in dims.into_iter().rev() {
                ty = Type::Array(Box::new(ty), dim);
            }
        }

        Ok(Declarator {
            name,
            ty,
            params,
            end: self.previous_end(),
        })
    }

    fn parse_parameter_list(&mut self) -> Result<Vec<ParamDecl>, CheckError> {
        let mut params = Vec::new();
        if self.match_token(Punct::RightParen) {
            return Ok(params);
        }
        if self.check_keyword(Keyword::Void) && self.peek_at(1).is_punct(Punct::RightParen) {
            self.advance();
            self.advance();
            return Ok(params);
        }

        loop {
            let start = self.peek().span.start;
            let spec = self
                .parse_decl_specifiers()?
                .ok_or_else(|| self.error("expected parameter declaration"))?;
            let declarator = self.parse_declarator(spec.ty, true)?;
            let (name, loc) = match declarator.name {
                Some((name, loc)) => (Some(name), loc),
                None => (None, start),
            };
            params.push(ParamDecl {
                name,
                loc,
                ty: declarator.ty.decayed(),
                span: SourceSpan {
                    start,
                    end: self.previous_end(),
                },
            });

            if self.match_token(Punct::Comma) {
                continue;
            }
            self.consume(Punct::RightParen, "after parameter list")?;
            break;
        }

        Ok(params)
    }

    /// Parses one declaration, attaching every declared entity to `parent`
    fn parse_declaration(&mut self, parent: NodeId, at_file_scope: bool) -> Result<(), CheckError> {
        let Some(spec) = self.parse_decl_specifiers()? else {
            return Err(self.error(format!("expected declaration, got {}", describe(self.peek()))));
        };
        if let Some(enum_decl) = spec.enum_decl {
            self.tree.attach(parent, enum_decl, Role::Decl);
        }
        if self.match_token(Punct::Semicolon) {
            return Ok(());
        }

        loop {
            let declarator = self.parse_declarator(spec.ty.clone(), false)?;
            let Some((name, loc)) = declarator.name.clone() else {
                return Err(self.error("expected identifier in declaration"));
            };
            let span = SourceSpan {
                start: spec.start,
                end: declarator.end,
            };

            if spec.is_typedef {
                let decl = self.tree.add(
                    NodeKind::TypedefDecl { name: name.clone() },
                    span,
                    loc,
                    Some(declarator.ty.clone()),
                );
                self.declare(&name, Symbol::Typedef { ty: declarator.ty }, loc)?;
                self.tree.attach(parent, decl, Role::Decl);
            } else if let Some(params) = declarator.params {
                let decl = self.tree.add(
                    NodeKind::FunctionDecl { name: name.clone() },
                    span,
                    loc,
                    Some(declarator.ty.clone()),
                );
                self.declare(
                    &name,
                    Symbol::Function {
                        decl,
                        ty: declarator.ty.clone(),
                    },
                    loc,
                )?;
                self.tree.attach(parent, decl, Role::Decl);

                let mut parameters = Vec::new();
                for param in params {
                    let node = self.tree.add(
                        NodeKind::ParmVarDecl {
                            name: param.name.clone().unwrap_or_default(),
                        },
                        param.span,
                        param.loc,
                        Some(param.ty.clone()),
                    );
                    self.tree.attach(decl, node, Role::Parameter);
                    parameters.push((param, node));
                }

                if self.check(Punct::LeftBrace) {
                    if !at_file_scope {
                        return Err(self.error("function definition is not allowed here"));
                    }
                    let ret = match &declarator.ty {
                        Type::Function { ret, .. } => (**ret).clone(),
                        _ => Type::Void,
                    };
                    return self.parse_function_body(decl, parameters, ret);
                }
            } else {
                let decl = self.tree.add(
                    NodeKind::VarDecl { name: name.clone() },
                    span,
                    loc,
                    Some(declarator.ty.clone()),
                );
                self.declare(
                    &name,
                    Symbol::Variable {
                        decl,
                        ty: declarator.ty.clone(),
                    },
                    loc,
                )?;
                self.tree.attach(parent, decl, Role::Decl);
                if self.match_token(Punct::Equal) {
                    self.parse_initializer(decl, &declarator.ty)?;
                    self.extend_to_previous(decl);
                }
            }

            if self.match_token(Punct::Comma) {
                continue;
            }
            self.consume(Punct::Semicolon, "after declaration")?;
            return Ok(());
        }
    }

    fn parse_initializer(&mut self, decl: NodeId, ty: &Type) -> Result<(), CheckError> {
        if !self.match_token(Punct::LeftBrace) {
            let value = self.parse_assignment_expression()?;
            let value = self.convert(value, ty);
            self.tree.attach(decl, value, Role::Initializer);
            return Ok(());
        }

        let element = match ty {
            Type::Array(element, _) => (**element).clone(),
            other => other.clone(),
        };
        while !self.check(Punct::RightBrace) {
            let value = self.parse_assignment_expression()?;
            let value = self.convert(value, &element);
            self.tree.attach(decl, value, Role::Initializer);
            if !self.match_token(Punct::Comma) {
                break;
            }
        }
        self.consume(Punct::RightBrace, "to close initializer list")?;
        Ok(())
    }

    fn parse_function_body(
        &mut self,
        decl: NodeId,
        parameters: Vec<(ParamDecl, NodeId)>,
        ret: Type,
    ) -> Result<(), CheckError> {
        let outer = self.scope;
        self.scope = self.symbols.create_scope(Some(outer));
        let previous_return = self.current_return.replace(ret);

        let body = self.declare_parameters(parameters).and_then(|_| self.parse_compound_statement(false));

        self.current_return = previous_return;
        self.scope = outer;

        let body = body?;
        self.tree.attach(decl, body, Role::Body);
        self.extend_to_previous(decl);
        Ok(())
    }

    fn declare_parameters(&mut self, parameters: Vec<(ParamDecl, NodeId)>) -> Result<(), CheckError> {
        for (param, node) in parameters {
            if let Some(name) = param.name {
                self.declare(
                    &name,
                    Symbol::Variable {
                        decl: node,
                        ty: param.ty,
                    },
                    param.loc,
                )?;
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------- statements

    fn parse_compound_statement(&mut self, new_scope: bool) -> Result<NodeId, CheckError> {
        let open = self.consume(Punct::LeftBrace, "to open block")?;
        let compound = self
            .tree
            .add(NodeKind::CompoundStmt, open.span, open.span.start, None);

        let outer = self.scope;
        if new_scope {
            self.scope = self.symbols.create_scope(Some(outer));
        }

        let mut result = Ok(());
        while !self.check(Punct::RightBrace) && !self.is_at_end() {
            match self.parse_statement() {
                Ok(statement) => self.tree.attach(compound, statement, Role::Statement),
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        self.scope = outer;
        result?;

        self.consume(Punct::RightBrace, "to close block")?;
        self.extend_to_previous(compound);
        Ok(compound)
    }

    fn parse_statement(&mut self) -> Result<NodeId, CheckError> {
        self.nested(Self::parse_statement_inner)
    }

    fn parse_statement_inner(&mut self) -> Result<NodeId, CheckError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Punctuator(Punct::LeftBrace) => self.parse_compound_statement(true),
            TokenKind::Punctuator(Punct::Semicolon) => {
                self.advance();
                Ok(self
                    .tree
                    .add(NodeKind::NullStmt, token.span, token.span.start, None))
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if_statement(),
            TokenKind::Keyword(Keyword::While) => self.parse_while_statement(),
            TokenKind::Keyword(Keyword::Do) => self.parse_do_statement(),
            TokenKind::Keyword(Keyword::For) => self.parse_for_statement(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return_statement(),
            TokenKind::Keyword(Keyword::Break | Keyword::Continue) => {
                self.advance();
                self.consume(Punct::Semicolon, "after jump statement")?;
                let kind = if token.is_keyword(Keyword::Break) {
                    NodeKind::BreakStmt
                } else {
                    NodeKind::ContinueStmt
                };
                Ok(self.tree.add(
                    kind,
                    SourceSpan {
                        start: token.span.start,
                        end: self.previous_end(),
                    },
                    token.span.start,
                    None,
                ))
            }
            TokenKind::Keyword(
                Keyword::Switch | Keyword::Case | Keyword::Default | Keyword::Goto | Keyword::Sizeof,
            ) => Err(self.error(format!("'{}' is not supported", token.spelling))),
            _ if self.starts_declaration() => self.parse_declaration_statement(),
            _ => {
                let expr = self.parse_expression()?;
                self.consume(Punct::Semicolon, "after expression")?;
                Ok(expr)
            }
        }
    }

    fn parse_declaration_statement(&mut self) -> Result<NodeId, CheckError> {
        let start = self.peek().span.start;
        let statement = self.tree.add(
            NodeKind::DeclStmt,
            SourceSpan { start, end: start },
            start,
            None,
        );
        self.parse_declaration(statement, false)?;
        self.extend_to_previous(statement);
        Ok(statement)
    }

    fn parse_condition(&mut self) -> Result<NodeId, CheckError> {
        self.consume(Punct::LeftParen, "before condition")?;
        let condition = self.parse_expression()?;
        let condition = self.to_bool(condition);
        self.consume(Punct::RightParen, "after condition")?;
        Ok(condition)
    }

    fn statement_node(&mut self, kind: NodeKind, keyword: &Token) -> NodeId {
        let span = SourceSpan {
            start: keyword.span.start,
            end: self.previous_end(),
        };
        self.tree.add(kind, span, keyword.span.start, None)
    }

    fn parse_if_statement(&mut self) -> Result<NodeId, CheckError> {
        let keyword = self.advance();
        let condition = self.parse_condition()?;
        let then_branch = self.parse_statement()?;
        let else_branch = if self.match_keyword(Keyword::Else) {
            Some(self.parse_statement()?)
        } else {
            None
        };

        let statement = self.statement_node(NodeKind::IfStmt, &keyword);
        self.tree.attach(statement, condition, Role::Condition);
        self.tree.attach(statement, then_branch, Role::Then);
        if let Some(else_branch) = else_branch {
            self.tree.attach(statement, else_branch, Role::Else);
        }
        Ok(statement)
    }

    fn parse_while_statement(&mut self) -> Result<NodeId, CheckError> {
        let keyword = self.advance();
        let condition = self.parse_condition()?;
        let body = self.parse_statement()?;

        let statement = self.statement_node(NodeKind::WhileStmt, &keyword);
        self.tree.attach(statement, condition, Role::Condition);
        self.tree.attach(statement, body, Role::Body);
        Ok(statement)
    }

    fn parse_do_statement(&mut self) -> Result<NodeId, CheckError> {
        let keyword = self.advance();
        let body = self.parse_statement()?;
        if !self.match_keyword(Keyword::While) {
            return Err(self.error(format!(
                "expected 'while' in do/while loop, got {}",
                describe(self.peek())
            )));
        }
        let condition = self.parse_condition()?;
        self.consume(Punct::Semicolon, "after do/while statement")?;

        let statement = self.statement_node(NodeKind::DoStmt, &keyword);
        self.tree.attach(statement, body, Role::Body);
        self.tree.attach(statement, condition, Role::Condition);
        Ok(statement)
    }

    fn parse_for_statement(&mut self) -> Result<NodeId, CheckError> {
        let keyword = self.advance();
        let outer = self.scope;
        self.scope = self.symbols.create_scope(Some(outer));
        let parts = self.parse_for_parts();
        self.scope = outer;
        let (init, condition, increment, body) = parts?;

        let statement = self.statement_node(NodeKind::ForStmt, &keyword);
        if let Some(init) = init {
            self.tree.attach(statement, init, Role::Init);
        }
        if let Some(condition) = condition {
            self.tree.attach(statement, condition, Role::Condition);
        }
        if let Some(increment) = increment {
            self.tree.attach(statement, increment, Role::Increment);
        }
        self.tree.attach(statement, body, Role::Body);
        Ok(statement)
    }

    #[allow(clippy::type_complexity)]
    fn parse_for_parts(
        &mut self,
    ) -> Result<(Option<NodeId>, Option<NodeId>, Option<NodeId>, NodeId), CheckError> {
        self.consume(Punct::LeftParen, "after 'for'")?;

        let init = if self.match_token(Punct::Semicolon) {
            None
        } else if self.starts_declaration() {
            Some(self.parse_declaration_statement()?)
        } else {
            let init = self.parse_expression()?;
            self.consume(Punct::Semicolon, "after for-loop initializer")?;
            Some(init)
        };

        let condition = if self.check(Punct::Semicolon) {
            None
        } else {
            let condition = self.parse_expression()?;
            Some(self.to_bool(condition))
        };
        self.consume(Punct::Semicolon, "after for-loop condition")?;

        let increment = if self.check(Punct::RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(Punct::RightParen, "after for-loop header")?;

        let body = self.parse_statement()?;
        Ok((init, condition, increment, body))
    }

    fn parse_return_statement(&mut self) -> Result<NodeId, CheckError> {
        let keyword = self.advance();

        // Parse optional return value
        let value = if self.check(Punct::Semicolon) {
            None
        } else {
            let value = self.parse_expression()?;
            Some(match self.current_return.clone() {
                Some(ret) if ret != Type::Void => self.convert(value, &ret),
                _ => value,
            })
        };
        self.consume(Punct::Semicolon, "after return statement")?;

        let statement = self.statement_node(NodeKind::ReturnStmt, &keyword);
        if let Some(value) = value {
            self.tree.attach(statement, value, Role::Value);
        }
        Ok(statement)
    }

    // ---------------------------------------------------------------- expressions

    fn binary_node(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId, loc: SourcePosition, ty: Option<Type>) -> NodeId {
        let span = self.span_of(lhs).to(self.span_of(rhs));
        let node = self.tree.add(NodeKind::BinaryOperator(op), span, loc, ty);
        self.tree.attach(node, lhs, Role::Lhs);
        self.tree.attach(node, rhs, Role::Rhs);
        node
    }

    fn build_binary(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId, loc: SourcePosition) -> NodeId {
        let (lhs, rhs, ty) = match op {
            BinaryOp::LAnd | BinaryOp::LOr => {
                let lhs = self.to_bool(lhs);
                let rhs = self.to_bool(rhs);
                (lhs, rhs, Some(Type::Bool))
            }
            BinaryOp::Comma => {
                let ty = self.type_of(rhs);
                (lhs, rhs, ty)
            }
            BinaryOp::Shl | BinaryOp::Shr => {
                let (lhs, ty) = self.promote_operand(lhs);
                let (rhs, _) = self.promote_operand(rhs);
                (lhs, rhs, ty)
            }
            _ if op.is_comparison() => {
                let (lhs, rhs, _) = self.arithmetic_operands(lhs, rhs);
                (lhs, rhs, Some(Type::Bool))
            }
            _ => self.arithmetic_operands(lhs, rhs),
        };
        self.binary_node(op, lhs, rhs, loc, ty)
    }

    fn build_assignment(&mut self, op: BinaryOp, lhs: NodeId, rhs: NodeId, loc: SourcePosition) -> NodeId {
        let lhs_ty = self.type_of(lhs);
        let rhs = match (&lhs_ty, op.compound_base()) {
            (Some(target), None) => self.convert(rhs, target),
            (Some(_), Some(base)) if base.is_shift() => self.promote_operand(rhs).0,
            (Some(target), Some(_)) => match self.type_of(rhs) {
                Some(value) if target.is_arithmetic() && value.is_arithmetic() => {
                    let computation = usual_arithmetic(target, &value);
                    self.convert(rhs, &computation)
                }
                _ => self.decay(rhs),
            },
            (None, _) => rhs,
        };
        self.binary_node(op, lhs, rhs, loc, lhs_ty)
    }

    fn parse_expression(&mut self) -> Result<NodeId, CheckError> {
        let mut expr = self.parse_assignment_expression()?;
        while self.check(Punct::Comma) {
            let operator = self.advance();
            let rhs = self.parse_assignment_expression()?;
            expr = self.build_binary(BinaryOp::Comma, expr, rhs, operator.span.start);
        }
        Ok(expr)
    }

    fn parse_assignment_expression(&mut self) -> Result<NodeId, CheckError> {
        self.nested(Self::parse_assignment_inner)
    }

    fn parse_assignment_inner(&mut self) -> Result<NodeId, CheckError> {
        let lhs = self.parse_conditional_expression()?;

        let op = match self.peek().kind {
            TokenKind::Punctuator(punct) => assignment_operator(punct),
            _ => None,
        };
        let Some(op) = op else {
            return Ok(lhs);
        };

        let operator = self.advance();
        let rhs = self.parse_assignment_expression()?;
        Ok(self.build_assignment(op, lhs, rhs, operator.span.start))
    }

    fn parse_conditional_expression(&mut self) -> Result<NodeId, CheckError> {
        let condition = self.parse_logical_or_expression()?;
        if !self.check(Punct::Question) {
            return Ok(condition);
        }

        let question = self.advance();
        let true_expr = self.parse_expression()?;
        self.consume(Punct::Colon, "in conditional expression")?;
        let false_expr = self.parse_assignment_expression()?;

        let condition = self.to_bool(condition);
        let (true_expr, false_expr, ty) = match (self.type_of(true_expr), self.type_of(false_expr)) {
            (Some(t), Some(f)) if t == f => (true_expr, false_expr, Some(t)),
            (Some(t), Some(f)) if t.is_arithmetic() && f.is_arithmetic() => {
                self.arithmetic_operands(true_expr, false_expr)
            }
            (t, _) => (self.decay(true_expr), self.decay(false_expr), t.map(|t| t.decayed())),
        };

        let span = self.span_of(condition).to(self.span_of(false_expr));
        let node = self
            .tree
            .add(NodeKind::ConditionalOperator, span, question.span.start, ty);
        self.tree.attach(node, condition, Role::Condition);
        self.tree.attach(node, true_expr, Role::TrueExpr);
        self.tree.attach(node, false_expr, Role::FalseExpr);
        Ok(node)
    }

    fn parse_left_assoc(
        &mut self,
        operators: &[(Punct, BinaryOp)],
        next: ParseLevel<'a>,
    ) -> Result<NodeId, CheckError> {
        let mut expr = next(self)?;

        loop {
            let Some(op) = operators
                .iter()
                .find(|(punct, _)| self.check(*punct))
                .map(|(_, op)| *op)
            else {
                break;
            };
            let operator = self.advance();
            let rhs = next(self)?;
            expr = self.build_binary(op, expr, rhs, operator.span.start);
        }

        Ok(expr)
    }

    fn parse_logical_or_expression(&mut self) -> Result<NodeId, CheckError> {
        self.parse_left_assoc(
            &[(Punct::PipePipe, BinaryOp::LOr)],
            Self::parse_logical_and_expression,
        )
    }

    fn parse_logical_and_expression(&mut self) -> Result<NodeId, CheckError> {
        self.parse_left_assoc(
            &[(Punct::AmpAmp, BinaryOp::LAnd)],
            Self::parse_bitwise_or_expression,
        )
    }

    fn parse_bitwise_or_expression(&mut self) -> Result<NodeId, CheckError> {
        self.parse_left_assoc(
            &[(Punct::Pipe, BinaryOp::BitOr)],
            Self::parse_bitwise_xor_expression,
        )
    }

    fn parse_bitwise_xor_expression(&mut self) -> Result<NodeId, CheckError> {
        self.parse_left_assoc(
            &[(Punct::Caret, BinaryOp::BitXor)],
            Self::parse_bitwise_and_expression,
        )
    }

    fn parse_bitwise_and_expression(&mut self) -> Result<NodeId, CheckError> {
        self.parse_left_assoc(
            &[(Punct::Amp, BinaryOp::BitAnd)],
            Self::parse_equality_expression,
        )
    }

    fn parse_equality_expression(&mut self) -> Result<NodeId, CheckError> {
        self.parse_left_assoc(
            &[
                (Punct::EqualEqual, BinaryOp::Eq),
                (Punct::NotEqual, BinaryOp::Ne),
            ],
            Self::parse_comparison_expression,
        )
    }

    fn parse_comparison_expression(&mut self) -> Result<NodeId, CheckError> {
        self.parse_left_assoc(
            &[
                (Punct::Less, BinaryOp::Lt),
                (Punct::LessEqual, BinaryOp::Le),
                (Punct::Greater, BinaryOp::Gt),
                (Punct::GreaterEqual, BinaryOp::Ge),
            ],
            Self::parse_shift_expression,
        )
    }

    fn parse_shift_expression(&mut self) -> Result<NodeId, CheckError> {
        self.parse_left_assoc(
            &[
                (Punct::LeftShift, BinaryOp::Shl),
                (Punct::RightShift, BinaryOp::Shr),
            ],
            Self::parse_term,
        )
    }

    fn parse_term(&mut self) -> Result<NodeId, CheckError> {
        self.parse_left_assoc(
            &[(Punct::Plus, BinaryOp::Add), (Punct::Minus, BinaryOp::Sub)],
            Self::parse_factor,
        )
    }

    fn parse_factor(&mut self) -> Result<NodeId, CheckError> {
        self.parse_left_assoc(
            &[
                (Punct::Star, BinaryOp::Mul),
                (Punct::Slash, BinaryOp::Div),
                (Punct::Percent, BinaryOp::Rem),
            ],
            Self::parse_cast,
        )
    }

    fn parse_cast(&mut self) -> Result<NodeId, CheckError> {
        self.nested(Self::parse_cast_inner)
    }

    fn parse_cast_inner(&mut self) -> Result<NodeId, CheckError> {
        if !(self.check(Punct::LeftParen) && self.is_type_name(self.peek_at(1))) {
            return self.parse_unary();
        }

        let open = self.advance();
        let spec = self
            .parse_decl_specifiers()?
            .ok_or_else(|| self.error("expected type name"))?;
        let declarator = self.parse_declarator(spec.ty, true)?;
        if let Some((name, loc)) = declarator.name {
            return Err(self.error_at(loc, format!("unexpected '{name}' in type name")));
        }
        self.consume(Punct::RightParen, "after type name")?;

        let operand = self.parse_cast()?;
        let operand = self.decay(operand);
        let target = declarator.ty;
        let kind = self
            .type_of(operand)
            .and_then(|from| cast_kind(&from, &target))
            .unwrap_or(CastKind::NoOp);

        let span = SourceSpan {
            start: open.span.start,
            end: self.span_of(operand).end,
        };
        let cast = self
            .tree
            .add(NodeKind::ExplicitCast(kind), span, open.span.start, Some(target));
        self.tree.attach(cast, operand, Role::SubExpr);
        Ok(cast)
    }

    fn build_unary(&mut self, op: UnaryOp, operand: NodeId, operator: &Token) -> Result<NodeId, CheckError> {
        let operand_ty = self.type_of(operand);
        let (operand, ty) = match op {
            UnaryOp::LNot => (self.to_bool(operand), Some(Type::Bool)),
            UnaryOp::Minus | UnaryOp::Plus | UnaryOp::Not => self.promote_operand(operand),
            UnaryOp::AddrOf => (operand, operand_ty.map(|ty| Type::Pointer(Box::new(ty)))),
            UnaryOp::Deref => {
                let operand = self.decay(operand);
                match self.type_of(operand).as_ref().and_then(Type::pointee) {
                    Some(pointee) => {
                        let pointee = pointee.clone();
                        (operand, Some(pointee))
                    }
                    None => {
                        return Err(self.error_at(
                            operator.span.start,
                            "indirection requires pointer operand",
                        ));
                    }
                }
            }
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => {
                (operand, operand_ty)
            }
        };

        let operand_span = self.span_of(operand);
        let span = if matches!(op, UnaryOp::PostInc | UnaryOp::PostDec) {
            SourceSpan {
                start: operand_span.start,
                end: operator.span.end,
            }
        } else {
            SourceSpan {
                start: operator.span.start,
                end: operand_span.end,
            }
        };
        let node = self
            .tree
            .add(NodeKind::UnaryOperator(op), span, operator.span.start, ty);
        self.tree.attach(node, operand, Role::Operand);
        Ok(node)
    }

    fn parse_unary(&mut self) -> Result<NodeId, CheckError> {
        let op = match self.peek().kind {
            TokenKind::Punctuator(Punct::Bang) => Some(UnaryOp::LNot),
            TokenKind::Punctuator(Punct::Tilde) => Some(UnaryOp::Not),
            TokenKind::Punctuator(Punct::Minus) => Some(UnaryOp::Minus),
            TokenKind::Punctuator(Punct::Plus) => Some(UnaryOp::Plus),
            TokenKind::Punctuator(Punct::Amp) => Some(UnaryOp::AddrOf),
            TokenKind::Punctuator(Punct::Star) => Some(UnaryOp::Deref),
            TokenKind::Punctuator(Punct::PlusPlus) => Some(UnaryOp::PreInc),
            TokenKind::Punctuator(Punct::MinusMinus) => Some(UnaryOp::PreDec),
            TokenKind::Keyword(Keyword::Sizeof) => {
                return Err(self.error("'sizeof' is not supported"));
            }
            _ => None,
        };

        match op {
            Some(op) => {
                let operator = self.advance();
                let operand = self.parse_cast()?;
                self.build_unary(op, operand, &operator)
            }
            None => self.parse_call(),
        }
    }

    fn parse_call(&mut self) -> Result<NodeId, CheckError> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.check(Punct::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if self.check(Punct::LeftBracket) {
                expr = self.finish_subscript(expr)?;
            } else if self.check(Punct::PlusPlus) || self.check(Punct::MinusMinus) {
                let operator = self.advance();
                let op = if operator.is_punct(Punct::PlusPlus) {
                    UnaryOp::PostInc
                } else {
                    UnaryOp::PostDec
                };
                expr = self.build_unary(op, expr, &operator)?;
            } else if self.check(Punct::Dot) || self.check(Punct::Arrow) {
                return Err(self.error("member access is not supported"));
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: NodeId) -> Result<NodeId, CheckError> {
        let open = self.advance();
        let (ret, params) = match self.type_of(callee) {
            Some(Type::Function { ret, params }) => (*ret, params),
            _ => return Err(self.error_at(open.span.start, "called object is not a function")),
        };

        let start = self.span_of(callee).start;
        let call = self.tree.add(
            NodeKind::Call,
            SourceSpan { start, end: start },
            start,
            Some(ret),
        );
        self.tree.attach(call, callee, Role::Callee);

        let mut count = 0;
        if !self.match_token(Punct::RightParen) {
            loop {
                let argument = self.parse_assignment_expression()?;
                let argument = match params.get(count) {
                    Some(param) => self.convert(argument, param),
                    None => self.decay(argument),
                };
                self.tree.attach(call, argument, Role::Argument);
                count += 1;

                if self.match_token(Punct::Comma) {
                    continue;
                }
                self.consume(Punct::RightParen, "after call arguments")?;
                break;
            }
        }

        if count != params.len() {
            return Err(self.error_at(
                open.span.start,
                format!("expected {} arguments, got {}", params.len(), count),
            ));
        }

        self.extend_to_previous(call);
        Ok(call)
    }

    fn finish_subscript(&mut self, base: NodeId) -> Result<NodeId, CheckError> {
        let open = self.advance();
        let base = self.decay(base);
        let index = self.parse_expression()?;
        self.consume(Punct::RightBracket, "after subscript")?;

        let ty = match self.type_of(base).as_ref().and_then(Type::pointee) {
            Some(element) => element.clone(),
            None => {
                return Err(self.error_at(
                    open.span.start,
                    "subscripted value is not an array or pointer",
                ));
            }
        };

        let span = SourceSpan {
            start: self.span_of(base).start,
            end: self.previous_end(),
        };
        let node = self
            .tree
            .add(NodeKind::ArraySubscript, span, open.span.start, Some(ty));
        self.tree.attach(node, base, Role::Base);
        self.tree.attach(node, index, Role::Index);
        Ok(node)
    }

    fn parse_primary(&mut self) -> Result<NodeId, CheckError> {
        let token = self.advance();
        let start = token.span.start;

        let (kind, ty) = match token.kind {
            TokenKind::NumericConstant if is_floating_literal(&token.spelling) => (
                NodeKind::FloatingLiteral {
                    spelling: token.spelling.clone(),
                },
                floating_literal_type(&token.spelling),
            ),
            TokenKind::NumericConstant => {
                let ty = integer_literal_type(&token.spelling).ok_or_else(|| {
                    self.error_at(start, format!("invalid integer constant '{}'", token.spelling))
                })?;
                (
                    NodeKind::IntegerLiteral {
                        spelling: token.spelling.clone(),
                    },
                    ty,
                )
            }
            TokenKind::CharConstant => (
                NodeKind::CharLiteral {
                    spelling: token.spelling.clone(),
                },
                char_literal_type(&token.spelling),
            ),
            TokenKind::StringLiteral => (
                NodeKind::StringLiteral {
                    spelling: token.spelling.clone(),
                },
                Type::Array(Box::new(Type::int(IntKind::Char, true)), None),
            ),
            TokenKind::Keyword(Keyword::True) => (NodeKind::BoolLiteral(true), Type::Bool),
            TokenKind::Keyword(Keyword::False) => (NodeKind::BoolLiteral(false), Type::Bool),
            TokenKind::Identifier => {
                let (decl, ty) = match self.symbols.lookup_symbol(self.scope, &token.spelling) {
                    Some(
                        Symbol::Variable { decl, ty }
                        | Symbol::Function { decl, ty }
                        | Symbol::EnumConstant { decl, ty },
                    ) => (*decl, ty.clone()),
                    Some(Symbol::Typedef { .. }) => {
                        return Err(self.error_at(
                            start,
                            format!("unexpected type name '{}': expected expression", token.spelling),
                        ));
                    }
                    None => {
                        return Err(self.error_at(
                            start,
                            format!("use of undeclared identifier '{}'", token.spelling),
                        ));
                    }
                };
                (
                    NodeKind::DeclRef {
                        name: token.spelling.clone(),
                        decl,
                    },
                    ty,
                )
            }
            TokenKind::Punctuator(Punct::LeftParen) => {
                let inner = self.parse_expression()?;
                self.consume(Punct::RightParen, "after parenthesized expression")?;
                let ty = self.type_of(inner);
                let span = SourceSpan {
                    start,
                    end: self.previous_end(),
                };
                let paren = self.tree.add(NodeKind::Paren, span, start, ty);
                self.tree.attach(paren, inner, Role::SubExpr);
                return Ok(paren);
            }
            _ => {
                return Err(self.error_at(
                    start,
                    format!("expected expression, got {}", describe(&token)),
                ));
            }
        };

        Ok(self.tree.add(kind, token.span, start, Some(ty)))
    }
}

fn assignment_operator(punct: Punct) -> Option<BinaryOp> {
    let op = match punct {
        Punct::Equal => BinaryOp::Assign,
        Punct::StarEqual => BinaryOp::MulAssign,
        Punct::SlashEqual => BinaryOp::DivAssign,
        Punct::PercentEqual => BinaryOp::RemAssign,
        Punct::PlusEqual => BinaryOp::AddAssign,
        Punct::MinusEqual => BinaryOp::SubAssign,
        Punct::LeftShiftEqual => BinaryOp::ShlAssign,
        Punct::RightShiftEqual => BinaryOp::ShrAssign,
        Punct::AmpEqual => BinaryOp::AndAssign,
        Punct::CaretEqual => BinaryOp::XorAssign,
        Punct::PipeEqual => BinaryOp::OrAssign,
        _ => return None,
    };
    Some(op)
}

fn char_literal_type(spelling: &str) -> Type {
    if spelling.starts_with("u8") {
        Type::int(IntKind::Char, true)
    } else if spelling.starts_with('u') {
        Type::int(IntKind::Short, false)
    } else if spelling.starts_with('U') {
        Type::int(IntKind::Int, false)
    } else if spelling.starts_with('L') {
        Type::INT
    } else {
        Type::int(IntKind::Char, true)
    }
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Eof => "end of file".to_string(),
        _ => format!("'{}'", token.spelling),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::TypeCategory;

    const TEST_SOURCE: &str = r#"
// comments should be ignored
typedef unsigned int u32;
enum Color { RED, GREEN = 2, BLUE };

static u32 counter = 0U;

bool is_even(int value)
{
    return (value % 2) == 0;
}

int main(void)
{
    int x = 0;
    enum Color c = RED;
    float ratio = 1.5f;

    while (x < 2) {
        x = x + 1;
        counter += 1U;
    }

    for (int i = 0; i < 10; i++) {
        if (is_even(i)) {
            x = i;
        } else {
            x = -i;
        }
    }

    do {
        x--;
    } while (x);

    return c == BLUE ? x : (int)ratio;
}
"#;

    fn parse_str(source: &str) -> Result<NodeModel, CheckError> {
        parse(source, &CompileOptions::new("test.cpp"))
    }

    fn find(model: &NodeModel, predicate: impl Fn(&Node) -> bool) -> Vec<NodeId> {
        model
            .preorder()
            .filter(|&id| predicate(model.node(id)))
            .collect()
    }

    #[test]
    fn test_parser() {
        let model = parse_str(TEST_SOURCE).unwrap();
        let root = model.root();
        let decl_names: Vec<&str> = model
            .children(root)
            .iter()
            .filter_map(|&id| model.node(id).name())
            .collect();
        assert_eq!(decl_names, vec!["u32", "Color", "counter", "is_even", "main"]);

        let loops = find(&model, |node| {
            matches!(
                node.kind,
                NodeKind::WhileStmt | NodeKind::ForStmt | NodeKind::DoStmt
            )
        });
        assert_eq!(loops.len(), 3);
    }

    #[test]
    fn test_fail() {
        let result = parse_str("int f(void) {\n  return y;\n}\n");
        match result {
            Err(CheckError::ParseError {
                file,
                line,
                column,
                message,
            }) => {
                assert_eq!(file, "test.cpp");
                assert_eq!((line, column), (2, 10));
                assert!(message.contains("undeclared identifier 'y'"));
            }
            other => panic!("Expected ParseError, got {other:?}"),
        }

        assert!(matches!(
            parse_str("int f( {"),
            Err(CheckError::ParseError { .. })
        ));
        assert!(matches!(
            parse_str("int x = \"open;"),
            Err(CheckError::ParseError { line: 1, .. })
        ));
    }

    #[test]
    fn conditions_are_converted_to_bool() {
        let model = parse_str("void f(int x) { if (x) { } while (x > 1) { } }").unwrap();
        let ifs = find(&model, |node| node.kind == NodeKind::IfStmt);
        let condition = model.child(ifs[0], Role::Condition).unwrap();
        assert_eq!(
            model.node(condition).kind,
            NodeKind::ImplicitCast(CastKind::IntegralToBoolean)
        );

        let whiles = find(&model, |node| node.kind == NodeKind::WhileStmt);
        let condition = model.child(whiles[0], Role::Condition).unwrap();
        assert_eq!(
            model.node(condition).kind,
            NodeKind::BinaryOperator(BinaryOp::Gt)
        );
    }

    #[test]
    fn usual_arithmetic_conversions_are_explicit_in_the_tree() {
        let model = parse_str("void f(unsigned int u, int s) { u = u | s; }").unwrap();
        let ors = find(&model, |node| node.kind == NodeKind::BinaryOperator(BinaryOp::BitOr));
        let or = ors[0];
        assert!(
            model
                .node(or)
                .ty
                .as_ref()
                .is_some_and(|ty| ty.in_category(TypeCategory::UnsignedInteger))
        );
        let rhs = model.child(or, Role::Rhs).unwrap();
        assert_eq!(
            model.node(rhs).kind,
            NodeKind::ImplicitCast(CastKind::IntegralCast)
        );
        let written = model.ignoring_implicit(rhs);
        assert!(
            model
                .node(written)
                .ty
                .as_ref()
                .is_some_and(|ty| ty.in_category(TypeCategory::SignedInteger))
        );
    }

    #[test]
    fn enumerators_have_enum_type_and_decl_refs_resolve() {
        let model = parse_str("enum E { A, B };\nint f(void) { enum E e = B; return e; }").unwrap();
        let refs = find(&model, |node| matches!(node.kind, NodeKind::DeclRef { .. }));
        let b = refs[0];
        assert_eq!(model.node(b).name(), Some("B"));
        assert_eq!(model.node(b).ty, Some(Type::Enum("E".into())));
        let NodeKind::DeclRef { decl, .. } = &model.node(b).kind else {
            panic!("not a reference");
        };
        assert_eq!(model.node(*decl).kind.class(), NodeClass::EnumConstantDecl);

        let ret = find(&model, |node| node.kind == NodeKind::ReturnStmt)[0];
        let value = model.child(ret, Role::Value).unwrap();
        assert_eq!(
            model.node(value).kind,
            NodeKind::ImplicitCast(CastKind::IntegralCast)
        );
    }

    #[test]
    fn shadowing_in_nested_scopes_is_allowed() {
        let model = parse_str("int a; void f(void) { int a = 1; { int a = 2; } }").unwrap();
        let vars = find(&model, |node| matches!(node.kind, NodeKind::VarDecl { .. }));
        assert_eq!(vars.len(), 3);
        assert!(parse_str("int a; int a;").is_err());
    }

    #[test]
    fn errors_report_presumed_locations() {
        let source = "int a;\n#line 50 \"gen.c\"\nint b = c;\n";
        match parse_str(source) {
            Err(CheckError::ParseError { file, line, .. }) => {
                assert_eq!(file, "gen.c");
                assert_eq!(line, 50);
            }
            other => panic!("Expected ParseError, got {other:?}"),
        }
    }

    fn parenthesized(depth: usize) -> String {
        format!("int a = {}1{};", "(".repeat(depth), ")".repeat(depth))
    }

    #[test]
    fn nesting_depth_is_bounded() {
        assert!(parse_str(&parenthesized(40)).is_ok());

        match parse_str(&parenthesized(150)) {
            Err(CheckError::ParseError { line, message, .. }) => {
                assert_eq!(line, 1);
                assert!(message.contains("maximum depth"), "{message}");
            }
            other => panic!("Expected ParseError, got {other:?}"),
        }

        let unary = format!("int a = {}1;", "- ".repeat(2 * MAX_NESTING_DEPTH));
        assert!(matches!(parse_str(&unary), Err(CheckError::ParseError { .. })));

        let blocks = format!(
            "void f(void) {}{}",
            "{".repeat(2 * MAX_NESTING_DEPTH),
            "}".repeat(2 * MAX_NESTING_DEPTH)
        );
        assert!(matches!(parse_str(&blocks), Err(CheckError::ParseError { .. })));
    }

    #[test]
    fn operator_locations_point_at_the_operator() {
        let model = parse_str("int f(int a, int b) { return a + b; }").unwrap();
        let add = find(&model, |node| node.kind == NodeKind::BinaryOperator(BinaryOp::Add))[0];
        assert_eq!(model.node(add).loc, SourcePosition { line: 1, column: 32 });
    }
}
