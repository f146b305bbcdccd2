use {
    crate::parser::Location,
    std::{
        backtrace::Backtrace,
        error::Error,
        fmt::{Display, Formatter, Result as FmtResult},
        io::Error as IoError,
    },
};

/// An error raised while parsing or evaluating a Kconfig tree.
#[derive(Debug)]
pub struct KconfigError {
    /// The kind of error that occurred.
    pub kind: KconfigErrorKind,

    /// Additional backtrace information.
    pub backtrace: Backtrace,

    /// The location of the error.
    pub location: Option<Location>,
}

impl KconfigError {
    /// Create a new [KconfigError] with the given kind. The backtrace is captured automatically.
    pub fn new(kind: KconfigErrorKind, location: Location) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
            location: Some(location),
        }
    }

    /// Create a new [KconfigError] without location information.
    pub fn unlocated(kind: KconfigErrorKind) -> Self {
        Self {
            kind,
            backtrace: Backtrace::capture(),
            location: None,
        }
    }

    /// Create a new [KconfigError] for a line indented inconsistently with its entry.
    pub fn bad_indent(detail: impl ToString, location: Location) -> Self {
        Self::new(KconfigErrorKind::BadIndent(detail.to_string()), location)
    }

    /// Create a new [KconfigError] for an option that may appear at most once per entry.
    pub fn duplicate_option(option: impl ToString, location: Location) -> Self {
        Self::new(KconfigErrorKind::DuplicateOption(option.to_string()), location)
    }

    /// Create a new [KconfigError] for an invalid integer literal.
    pub fn invalid_integer(value: impl ToString, location: Location) -> Self {
        Self::new(KconfigErrorKind::InvalidInteger(value.to_string()), location)
    }

    /// Create a new [KconfigError] for a missing token.
    pub fn missing(expected: impl Into<Expected>, location: Location) -> Self {
        Self::new(KconfigErrorKind::Missing(expected.into()), location)
    }

    /// Create a new [KconfigError] for a rename map problem.
    pub fn rename(detail: impl ToString, location: Option<Location>) -> Self {
        Self {
            kind: KconfigErrorKind::Rename(detail.to_string()),
            backtrace: Backtrace::capture(),
            location,
        }
    }

    /// Create a new [KconfigError] for a recursively sourced file.
    pub fn recursive_source(filename: impl ToString, location: Location) -> Self {
        Self::new(KconfigErrorKind::RecursiveSource(filename.to_string()), location)
    }

    /// Create a new [KconfigError] for a syntax error.
    pub fn syntax(e: impl ToString, location: Location) -> Self {
        Self::new(KconfigErrorKind::Syntax(e.to_string()), location)
    }

    /// Create a new [KconfigError] for a value whose form does not match a symbol's kind.
    pub fn type_mismatch(detail: impl ToString, location: Location) -> Self {
        Self::new(KconfigErrorKind::TypeMismatch(detail.to_string()), location)
    }

    /// Create a new [KconfigError] for an unexpected character or string.
    pub fn unexpected(s: impl ToString, expected: impl Into<Expected>, location: Location) -> Self {
        Self::new(KconfigErrorKind::Unexpected(s.to_string(), expected.into()), location)
    }

    /// Create a new [KconfigError] for an unexpected end-of-file.
    pub fn unexpected_eof(expected: impl Into<Expected>, location: Location) -> Self {
        Self::new(KconfigErrorKind::UnexpectedEof(expected.into()), location)
    }

    /// Create a new [KconfigError] for a line that does not start with a known keyword.
    pub fn unknown_keyword(word: impl ToString, location: Location) -> Self {
        Self::new(KconfigErrorKind::UnknownKeyword(word.to_string()), location)
    }

    /// Create a new [KconfigError] for an unset `$(NAME)` expansion in a bare context.
    pub fn unknown_macro(name: impl ToString, location: Location) -> Self {
        Self::new(KconfigErrorKind::UnknownMacro(name.to_string()), location)
    }

    /// Create a new [KconfigError] for an unterminated string literal.
    pub fn unterminated_string(location: Location) -> Self {
        Self::new(KconfigErrorKind::UnterminatedString, location)
    }
}

impl Display for KconfigError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        if let Some(loc) = &self.location {
            write!(f, "{}: {}", loc, self.kind)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

impl From<IoError> for KconfigError {
    fn from(e: IoError) -> Self {
        Self {
            kind: KconfigErrorKind::Io(e),
            backtrace: Backtrace::capture(),
            location: None,
        }
    }
}

impl Error for KconfigError {}

/// The kinds of errors raised by the parser and evaluator.
#[derive(Debug)]
pub enum KconfigErrorKind {
    /// Indentation inconsistent with the enclosing entry.
    BadIndent(String),

    /// An option appeared twice on an entry where only one is allowed.
    DuplicateOption(String),

    /// Invalid integer literal.
    InvalidInteger(String),

    /// I/O error.
    Io(IoError),

    /// Missing a required token.
    Missing(Expected),

    /// A non-bool symbol carries a `select`, `imply`, `set`, or `set default`.
    NonBoolReverseDep(String),

    /// A rename list is malformed, self-referential, or cyclic.
    Rename(String),

    /// A sourced file sources itself, directly or indirectly.
    RecursiveSource(String),

    /// Syntax error.
    Syntax(String),

    /// A literal value does not match the symbol's declared kind.
    TypeMismatch(String),

    /// Expected a certain token, but got a different string.
    Unexpected(String, Expected),

    /// Expected a token of a certain type, but got end-of-file.
    UnexpectedEof(Expected),

    /// A line starts with a word that is not a Kconfig keyword.
    UnknownKeyword(String),

    /// `$(NAME)` expansion with no macro or environment variable of that name.
    UnknownMacro(String),

    /// A string literal with no closing quote.
    UnterminatedString,
}

impl Display for KconfigErrorKind {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::BadIndent(detail) => write!(f, "Bad indentation: {detail}"),
            Self::DuplicateOption(option) => write!(f, "Duplicate {option} option"),
            Self::InvalidInteger(value) => write!(f, "Invalid integer literal: {value}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Missing(expected) => write!(f, "Missing {expected}"),
            Self::NonBoolReverseDep(detail) => write!(f, "{detail}"),
            Self::Rename(detail) => write!(f, "Invalid rename: {detail}"),
            Self::RecursiveSource(filename) => write!(f, "Recursive source of {filename:?}"),
            Self::Syntax(e) => write!(f, "Syntax error: {e}"),
            Self::TypeMismatch(detail) => write!(f, "Type mismatch: {detail}"),
            Self::Unexpected(s, expected) => write!(f, "{s:?} unexpected; expected {expected}"),
            Self::UnexpectedEof(expected) => {
                if expected.is_any() {
                    write!(f, "Unexpected end-of-file")
                } else {
                    write!(f, "Unexpected end-of-file, expected {expected}")
                }
            }
            Self::UnknownKeyword(word) => write!(f, "Unknown keyword: {word}"),
            Self::UnknownMacro(name) => write!(f, "Undefined macro or environment variable: {name}"),
            Self::UnterminatedString => write!(f, "Unterminated string literal"),
        }
    }
}

/// Expected input description, used in parse diagnostics.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Expected {
    /// Any character.
    Any,

    /// A block entry (`config`, `menu`, `choice`, ...).
    Block,

    /// `endchoice` keyword.
    EndChoice,

    /// `endif` keyword.
    EndIf,

    /// `endmenu` keyword.
    EndMenu,

    /// End-of-line.
    Eol,

    /// Equals sign.
    Eq,

    /// Expression.
    Expr,

    /// `help` keyword.
    Help,

    /// `if` keyword.
    If,

    /// `if` or end-of-line.
    IfOrEol,

    /// An integer, hex, or float literal.
    NumericLiteral,

    /// `on` keyword.
    On,

    /// One of the given characters.
    OneOf(Vec<char>),

    /// Right parenthesis.
    RParen,

    /// A string literal.
    StringLiteral,

    /// A symbol.
    Symbol,

    /// A symbol or a literal value.
    SymbolOrValue,

    /// Whitespace.
    Whitespace,
}

impl Expected {
    /// Indicates if any character was expected.
    #[inline(always)]
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

impl Display for Expected {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Any => f.write_str("any character"),
            Self::Block => f.write_str("config, menuconfig, menu, choice, if, comment, or source"),
            Self::EndChoice => f.write_str("endchoice"),
            Self::EndIf => f.write_str("endif"),
            Self::EndMenu => f.write_str("endmenu"),
            Self::Eol => f.write_str("end of line"),
            Self::Eq => f.write_str("="),
            Self::Expr => f.write_str("expression"),
            Self::Help => f.write_str("help"),
            Self::If => f.write_str("if"),
            Self::IfOrEol => f.write_str("if or end of line"),
            Self::NumericLiteral => f.write_str("numeric literal"),
            Self::On => f.write_str("on"),
            Self::OneOf(v) => {
                write!(f, "one of: ")?;
                for (i, c) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{}'", c.escape_default())?;
                }
                Ok(())
            }
            Self::RParen => f.write_str("right parenthesis"),
            Self::StringLiteral => f.write_str("string literal"),
            Self::Symbol => f.write_str("symbol"),
            Self::SymbolOrValue => f.write_str("symbol or value"),
            Self::Whitespace => f.write_str("whitespace"),
        }
    }
}

impl From<char> for Expected {
    fn from(c: char) -> Self {
        Self::OneOf(vec![c])
    }
}
