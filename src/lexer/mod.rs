use crate::CheckError;
use crate::parser::ast::{SourcePosition, SourceSpan};
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Bool,
    Break,
    Case,
    Char,
    Const,
    Continue,
    Default,
    Do,
    Double,
    Else,
    Enum,
    Extern,
    False,
    Float,
    For,
    Goto,
    If,
    Inline,
    Int,
    Long,
    Register,
    Return,
    Short,
    Signed,
    Sizeof,
    Static,
    Struct,
    Switch,
    True,
    Typedef,
    Union,
    Unsigned,
    Void,
    Volatile,
    While,
}

impl Keyword {
    pub fn from_str(word: &str) -> Option<Self> {
        let keyword = match word {
            "bool" | "_Bool" => Keyword::Bool,
            "break" => Keyword::Break,
            "case" => Keyword::Case,
            "char" => Keyword::Char,
            "const" => Keyword::Const,
            "continue" => Keyword::Continue,
            "default" => Keyword::Default,
            "do" => Keyword::Do,
            "double" => Keyword::Double,
            "else" => Keyword::Else,
            "enum" => Keyword::Enum,
            "extern" => Keyword::Extern,
            "false" => Keyword::False,
            "float" => Keyword::Float,
            "for" => Keyword::For,
            "goto" => Keyword::Goto,
            "if" => Keyword::If,
            "inline" => Keyword::Inline,
            "int" => Keyword::Int,
            "long" => Keyword::Long,
            "register" => Keyword::Register,
            "return" => Keyword::Return,
            "short" => Keyword::Short,
            "signed" => Keyword::Signed,
            "sizeof" => Keyword::Sizeof,
            "static" => Keyword::Static,
            "struct" => Keyword::Struct,
            "switch" => Keyword::Switch,
            "true" => Keyword::True,
            "typedef" => Keyword::Typedef,
            "union" => Keyword::Union,
            "unsigned" => Keyword::Unsigned,
            "void" => Keyword::Void,
            "volatile" => Keyword::Volatile,
            "while" => Keyword::While,
            _ => return None,
        };
        Some(keyword)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Bool => "bool",
            Keyword::Break => "break",
            Keyword::Case => "case",
            Keyword::Char => "char",
            Keyword::Const => "const",
            Keyword::Continue => "continue",
            Keyword::Default => "default",
            Keyword::Do => "do",
            Keyword::Double => "double",
            Keyword::Else => "else",
            Keyword::Enum => "enum",
            Keyword::Extern => "extern",
            Keyword::False => "false",
            Keyword::Float => "float",
            Keyword::For => "for",
            Keyword::Goto => "goto",
            Keyword::If => "if",
            Keyword::Inline => "inline",
            Keyword::Int => "int",
            Keyword::Long => "long",
            Keyword::Register => "register",
            Keyword::Return => "return",
            Keyword::Short => "short",
            Keyword::Signed => "signed",
            Keyword::Sizeof => "sizeof",
            Keyword::Static => "static",
            Keyword::Struct => "struct",
            Keyword::Switch => "switch",
            Keyword::True => "true",
            Keyword::Typedef => "typedef",
            Keyword::Union => "union",
            Keyword::Unsigned => "unsigned",
            Keyword::Void => "void",
            Keyword::Volatile => "volatile",
            Keyword::While => "while",
        }
    }

    /// Keywords that can start a declaration's type specifier
    pub fn is_type_specifier(&self) -> bool {
        matches!(
            self,
            Keyword::Bool
                | Keyword::Char
                | Keyword::Const
                | Keyword::Double
                | Keyword::Enum
                | Keyword::Extern
                | Keyword::Float
                | Keyword::Inline
                | Keyword::Int
                | Keyword::Long
                | Keyword::Register
                | Keyword::Short
                | Keyword::Signed
                | Keyword::Static
                | Keyword::Unsigned
                | Keyword::Void
                | Keyword::Volatile
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Punct {
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Semicolon,
    Comma,
    Colon,
    Question,
    Dot,
    Arrow,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Equal,
    Less,
    Greater,
    PlusPlus,
    MinusMinus,
    LeftShift,
    RightShift,
    LessEqual,
    GreaterEqual,
    EqualEqual,
    NotEqual,
    AmpAmp,
    PipePipe,
    PlusEqual,
    MinusEqual,
    StarEqual,
    SlashEqual,
    PercentEqual,
    AmpEqual,
    PipeEqual,
    CaretEqual,
    LeftShiftEqual,
    RightShiftEqual,
    Hash,
    HashHash,
}

impl Punct {
    pub fn as_str(&self) -> &'static str {
        match self {
            Punct::LeftParen => "(",
            Punct::RightParen => ")",
            Punct::LeftBrace => "{",
            Punct::RightBrace => "}",
            Punct::LeftBracket => "[",
            Punct::RightBracket => "]",
            Punct::Semicolon => ";",
            Punct::Comma => ",",
            Punct::Colon => ":",
            Punct::Question => "?",
            Punct::Dot => ".",
            Punct::Arrow => "->",
            Punct::Plus => "+",
            Punct::Minus => "-",
            Punct::Star => "*",
            Punct::Slash => "/",
            Punct::Percent => "%",
            Punct::Amp => "&",
            Punct::Pipe => "|",
            Punct::Caret => "^",
            Punct::Tilde => "~",
            Punct::Bang => "!",
            Punct::Equal => "=",
            Punct::Less => "<",
            Punct::Greater => ">",
            Punct::PlusPlus => "++",
            Punct::MinusMinus => "--",
            Punct::LeftShift => "<<",
            Punct::RightShift => ">>",
            Punct::LessEqual => "<=",
            Punct::GreaterEqual => ">=",
            Punct::EqualEqual => "==",
            Punct::NotEqual => "!=",
            Punct::AmpAmp => "&&",
            Punct::PipePipe => "||",
            Punct::PlusEqual => "+=",
            Punct::MinusEqual => "-=",
            Punct::StarEqual => "*=",
            Punct::SlashEqual => "/=",
            Punct::PercentEqual => "%=",
            Punct::AmpEqual => "&=",
            Punct::PipeEqual => "|=",
            Punct::CaretEqual => "^=",
            Punct::LeftShiftEqual => "<<=",
            Punct::RightShiftEqual => ">>=",
            Punct::Hash => "#",
            Punct::HashHash => "##",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    Keyword(Keyword),
    NumericConstant,
    CharConstant,
    StringLiteral,
    Punctuator(Punct),
    Eof,
}

/// Token kinds with the payload stripped, as named in patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenClass {
    Identifier,
    Keyword,
    NumericConstant,
    CharConstant,
    StringLiteral,
    Punctuator,
    Eof,
}

impl TokenClass {
    pub const ALL: [TokenClass; 7] = [
        TokenClass::Identifier,
        TokenClass::Keyword,
        TokenClass::NumericConstant,
        TokenClass::CharConstant,
        TokenClass::StringLiteral,
        TokenClass::Punctuator,
        TokenClass::Eof,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TokenClass::Identifier => "identifier",
            TokenClass::Keyword => "keyword",
            TokenClass::NumericConstant => "numeric_constant",
            TokenClass::CharConstant => "char_constant",
            TokenClass::StringLiteral => "string_literal",
            TokenClass::Punctuator => "punctuator",
            TokenClass::Eof => "eof",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.name() == name)
    }
}

impl TokenKind {
    pub fn class(&self) -> TokenClass {
        match self {
            TokenKind::Identifier => TokenClass::Identifier,
            TokenKind::Keyword(_) => TokenClass::Keyword,
            TokenKind::NumericConstant => TokenClass::NumericConstant,
            TokenKind::CharConstant => TokenClass::CharConstant,
            TokenKind::StringLiteral => TokenClass::StringLiteral,
            TokenKind::Punctuator(_) => TokenClass::Punctuator,
            TokenKind::Eof => TokenClass::Eof,
        }
    }
}

/// A lexical unit with its raw spelling, exactly as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub spelling: String,
    pub span: SourceSpan,
}

impl Token {
    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::NumericConstant | TokenKind::CharConstant | TokenKind::StringLiteral
        )
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }

    pub fn is_punct(&self, punct: Punct) -> bool {
        self.kind == TokenKind::Punctuator(punct)
    }

    pub fn location(&self) -> SourcePosition {
        self.span.start
    }
}

pub struct Lexer<'src> {
    chars: Peekable<Chars<'src>>,
    line: usize,
    column: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Lexer {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.next();
        if let Some(c) = ch {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        ch
    }

    fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    fn advance_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(&expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn position(&self) -> SourcePosition {
        SourcePosition {
            line: self.line,
            column: self.column,
        }
    }

    fn error(&self, message: impl Into<String>) -> CheckError {
        CheckError::LexerError {
            line: self.line,
            column: self.column,
            message: message.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(&c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), CheckError> {
        loop {
            match self.advance() {
                Some('*') if self.advance_if('/') => return Ok(()),
                Some(_) => {}
                None => return Err(self.error("Unterminated block comment")),
            }
        }
    }

    fn read_identifier(&mut self, first_char: char) -> String {
        let mut identifier = String::new();
        identifier.push(first_char);

        while let Some(&c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                identifier.push(c);
                self.advance();
            } else {
                break;
            }
        }

        identifier
    }

    /// Reads a preprocessing number: digits, letters, `_`, `.` and signed exponents.
    fn read_number(&mut self, first_char: char) -> String {
        let mut number = String::new();
        number.push(first_char);

        while let Some(&c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                number.push(c);
                self.advance();
                if matches!(c, 'e' | 'E' | 'p' | 'P') {
                    if let Some(&sign) = self.peek() {
                        if sign == '+' || sign == '-' {
                            number.push(sign);
                            self.advance();
                        }
                    }
                }
            } else {
                break;
            }
        }

        number
    }

    fn read_quoted(&mut self, prefix: &str, quote: char) -> Result<String, CheckError> {
        let mut literal = String::from(prefix);
        literal.push(quote);
        let what = if quote == '"' {
            "string literal"
        } else {
            "character constant"
        };

        loop {
            match self.advance() {
                None | Some('\n') => return Err(self.error(format!("Unterminated {what}"))),
                Some('\\') => {
                    literal.push('\\');
                    match self.advance() {
                        Some(escaped) => literal.push(escaped),
                        None => return Err(self.error(format!("Unterminated {what}"))),
                    }
                }
                Some(c) if c == quote => {
                    literal.push(c);
                    return Ok(literal);
                }
                Some(c) => literal.push(c),
            }
        }
    }

    fn punct(&mut self, c: char) -> Option<Punct> {
        let punct = match c {
            '(' => Punct::LeftParen,
            ')' => Punct::RightParen,
            '{' => Punct::LeftBrace,
            '}' => Punct::RightBrace,
            '[' => Punct::LeftBracket,
            ']' => Punct::RightBracket,
            ';' => Punct::Semicolon,
            ',' => Punct::Comma,
            ':' => Punct::Colon,
            '?' => Punct::Question,
            '~' => Punct::Tilde,
            '.' => Punct::Dot,
            '+' => {
                if self.advance_if('+') {
                    Punct::PlusPlus
                } else if self.advance_if('=') {
                    Punct::PlusEqual
                } else {
                    Punct::Plus
                }
            }
            '-' => {
                if self.advance_if('-') {
                    Punct::MinusMinus
                } else if self.advance_if('=') {
                    Punct::MinusEqual
                } else if self.advance_if('>') {
                    Punct::Arrow
                } else {
                    Punct::Minus
                }
            }
            '*' => {
                if self.advance_if('=') {
                    Punct::StarEqual
                } else {
                    Punct::Star
                }
            }
            '/' => {
                if self.advance_if('=') {
                    Punct::SlashEqual
                } else {
                    Punct::Slash
                }
            }
            '%' => {
                if self.advance_if('=') {
                    Punct::PercentEqual
                } else {
                    Punct::Percent
                }
            }
            '=' => {
                if self.advance_if('=') {
                    Punct::EqualEqual
                } else {
                    Punct::Equal
                }
            }
            '!' => {
                if self.advance_if('=') {
                    Punct::NotEqual
                } else {
                    Punct::Bang
                }
            }
            '<' => {
                if self.advance_if('<') {
                    if self.advance_if('=') {
                        Punct::LeftShiftEqual
                    } else {
                        Punct::LeftShift
                    }
                } else if self.advance_if('=') {
                    Punct::LessEqual
                } else {
                    Punct::Less
                }
            }
            '>' => {
                if self.advance_if('>') {
                    if self.advance_if('=') {
                        Punct::RightShiftEqual
                    } else {
                        Punct::RightShift
                    }
                } else if self.advance_if('=') {
                    Punct::GreaterEqual
                } else {
                    Punct::Greater
                }
            }
            '&' => {
                if self.advance_if('&') {
                    Punct::AmpAmp
                } else if self.advance_if('=') {
                    Punct::AmpEqual
                } else {
                    Punct::Amp
                }
            }
            '|' => {
                if self.advance_if('|') {
                    Punct::PipePipe
                } else if self.advance_if('=') {
                    Punct::PipeEqual
                } else {
                    Punct::Pipe
                }
            }
            '^' => {
                if self.advance_if('=') {
                    Punct::CaretEqual
                } else {
                    Punct::Caret
                }
            }
            '#' => {
                if self.advance_if('#') {
                    Punct::HashHash
                } else {
                    Punct::Hash
                }
            }
            _ => return None,
        };
        Some(punct)
    }

    pub fn next_token(&mut self) -> Result<Token, CheckError> {
        loop {
            self.skip_whitespace();

            let start = self.position();

            let c = match self.advance() {
                Some(c) => c,
                None => {
                    return Ok(Token {
                        kind: TokenKind::Eof,
                        spelling: String::new(),
                        span: SourceSpan { start, end: start },
                    });
                }
            };

            let (kind, spelling) = match c {
                '/' if self.advance_if('/') => {
                    self.skip_line_comment();
                    continue;
                }
                '/' if self.advance_if('*') => {
                    self.skip_block_comment()?;
                    continue;
                }
                '\\' if self.advance_if('\n') => continue,
                '\'' => (TokenKind::CharConstant, self.read_quoted("", '\'')?),
                '"' => (TokenKind::StringLiteral, self.read_quoted("", '"')?),
                '0'..='9' => (TokenKind::NumericConstant, self.read_number(c)),
                '.' if self.peek().is_some_and(|next| next.is_ascii_digit()) => {
                    (TokenKind::NumericConstant, self.read_number(c))
                }
                'a'..='z' | 'A'..='Z' | '_' => {
                    let identifier = self.read_identifier(c);
                    let is_prefix = matches!(identifier.as_str(), "L" | "u" | "U" | "u8");
                    match self.peek() {
                        Some(&'\'') if is_prefix => {
                            self.advance();
                            (
                                TokenKind::CharConstant,
                                self.read_quoted(&identifier, '\'')?,
                            )
                        }
                        Some(&'"') if is_prefix => {
                            self.advance();
                            (
                                TokenKind::StringLiteral,
                                self.read_quoted(&identifier, '"')?,
                            )
                        }
                        _ => match Keyword::from_str(&identifier) {
                            Some(keyword) => (TokenKind::Keyword(keyword), identifier),
                            None => (TokenKind::Identifier, identifier),
                        },
                    }
                }
                _ => match self.punct(c) {
                    Some(punct) => (TokenKind::Punctuator(punct), punct.as_str().to_string()),
                    None => return Err(self.error(format!("Unexpected character: {c}"))),
                },
            };

            let end = self.position();
            return Ok(Token {
                kind,
                spelling,
                span: SourceSpan { start, end },
            });
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, CheckError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);

            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SOURCE: &str = r#"
// comments should be ignored
typedef unsigned int u32;
/* block
   comment */
unsigned int mask = 010U;
long big = 10l;
float ratio = 1.5e-3f;
char c = 'a';
const char *s = "text";
"#;

    fn spellings(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.spelling.as_str()).collect()
    }

    #[test]
    fn test_lexer() {
        let tokens = Lexer::new(TEST_SOURCE).tokenize().unwrap();
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
        assert!(tokens[0].is_keyword(Keyword::Typedef));
        assert_eq!(tokens[0].span.start, SourcePosition { line: 3, column: 1 });

        let literals: Vec<&str> = tokens
            .iter()
            .filter(|t| t.is_literal())
            .map(|t| t.spelling.as_str())
            .collect();
        assert_eq!(literals, vec!["010U", "10l", "1.5e-3f", "'a'", "\"text\""]);
    }

    #[test]
    fn literal_spelling_keeps_suffixes() {
        let tokens = Lexer::new("0x1Fu 0777 .5f 1e+10L").tokenize().unwrap();
        assert_eq!(spellings(&tokens), vec!["0x1Fu", "0777", ".5f", "1e+10L", ""]);
        assert!(
            tokens[..4]
                .iter()
                .all(|t| t.kind == TokenKind::NumericConstant)
        );
    }

    #[test]
    fn multi_character_punctuators() {
        let tokens = Lexer::new("a <<= b >> c && !d").tokenize().unwrap();
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::Punctuator(Punct::LeftShiftEqual),
                TokenKind::Identifier,
                TokenKind::Punctuator(Punct::RightShift),
                TokenKind::Identifier,
                TokenKind::Punctuator(Punct::AmpAmp),
                TokenKind::Punctuator(Punct::Bang),
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn prefixed_character_constants() {
        let tokens = Lexer::new("L'x' u8\"s\" L").tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::CharConstant);
        assert_eq!(tokens[0].spelling, "L'x'");
        assert_eq!(tokens[1].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[2].kind, TokenKind::Identifier);
    }

    #[test]
    fn escaped_quotes_stay_inside_literal() {
        let tokens = Lexer::new(r"'\'' x").tokenize().unwrap();
        assert_eq!(tokens[0].spelling, r"'\''");
        assert_eq!(tokens[1].spelling, "x");
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let result = Lexer::new("\"abc\nint x;").tokenize();
        assert!(matches!(result, Err(CheckError::LexerError { line: 1, .. })));
    }

    #[test]
    fn token_class_names_round_trip() {
        for class in TokenClass::ALL {
            assert_eq!(TokenClass::from_name(class.name()), Some(class));
        }
        assert_eq!(TokenClass::from_name("literal"), None);
    }
}
