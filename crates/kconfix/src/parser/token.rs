use {
    crate::parser::{Located, Location},
    phf::phf_map,
    std::fmt::{Display, Formatter, Result as FmtResult},
};

/// Tokens of the Kconfig language.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    // Keywords.
    Bool,
    Choice,
    Comment,
    Config,
    Default,
    Depends,
    EndChoice,
    EndIf,
    EndMenu,
    Env,
    Float,
    Help,
    Hex,
    If,
    Imply,
    Int,
    Mainmenu,
    Menu,
    MenuConfig,
    On,
    Option,
    ORSource,
    OSource,
    Prompt,
    Range,
    RSource,
    Select,
    Set,
    Source,
    String,
    Visible,
    Warning,

    // Operators and punctuation.
    And,
    Or,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
    ColonEq,

    // Terminals.
    Symbol(std::string::String),
    StrLit(std::string::String),
    IntLit(i64),
    HexLit(u64),
    FloatLit(f64),

    /// `# ignore: CODE [CODE]*` pragma attached to the line it trails.
    IgnorePragma(Vec<std::string::String>),
}

static KEYWORDS: phf::Map<&'static str, Token> = phf_map! {
    "bool" => Token::Bool,
    "choice" => Token::Choice,
    "comment" => Token::Comment,
    "config" => Token::Config,
    "default" => Token::Default,
    "depends" => Token::Depends,
    "endchoice" => Token::EndChoice,
    "endif" => Token::EndIf,
    "endmenu" => Token::EndMenu,
    "env" => Token::Env,
    "float" => Token::Float,
    "help" => Token::Help,
    "hex" => Token::Hex,
    "if" => Token::If,
    "imply" => Token::Imply,
    "int" => Token::Int,
    "mainmenu" => Token::Mainmenu,
    "menu" => Token::Menu,
    "menuconfig" => Token::MenuConfig,
    "on" => Token::On,
    "option" => Token::Option,
    "orsource" => Token::ORSource,
    "osource" => Token::OSource,
    "prompt" => Token::Prompt,
    "range" => Token::Range,
    "rsource" => Token::RSource,
    "select" => Token::Select,
    "set" => Token::Set,
    "source" => Token::Source,
    "string" => Token::String,
    "visible" => Token::Visible,
    "warning" => Token::Warning,
};

impl Token {
    /// Look up a keyword token for the given word, if it is one.
    pub fn keyword(word: &str) -> Option<Token> {
        KEYWORDS.get(word).cloned()
    }

    /// Indicates whether a string literal is expected after this token. Used to tell
    /// prompts and paths from constant symbol references during tokenization.
    pub fn expects_string(&self) -> bool {
        matches!(
            self,
            Self::Comment
                | Self::Mainmenu
                | Self::Menu
                | Self::ORSource
                | Self::OSource
                | Self::Prompt
                | Self::RSource
                | Self::Source
                | Self::Warning
        )
    }

    /// Indicates whether this is a type keyword.
    pub fn is_type_token(&self) -> bool {
        matches!(self, Self::Bool | Self::Int | Self::Hex | Self::String | Self::Float)
    }

    /// Indicates whether this is a `source`-family keyword.
    pub fn is_source_token(&self) -> bool {
        matches!(self, Self::ORSource | Self::OSource | Self::RSource | Self::Source)
    }

    /// Indicates whether this is a source keyword relative to the current file.
    pub fn is_relative_source(&self) -> bool {
        matches!(self, Self::ORSource | Self::RSource)
    }

    /// Indicates whether this is a source keyword that tolerates a missing file.
    pub fn is_optional_source(&self) -> bool {
        matches!(self, Self::ORSource | Self::OSource)
    }

    /// If this is a symbol token, return its name.
    pub fn symbol_value(&self) -> Option<&str> {
        match self {
            Self::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// If this is a string literal token, return its contents.
    pub fn string_literal_value(&self) -> Option<&str> {
        match self {
            Self::StrLit(s) => Some(s),
            _ => None,
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Choice => f.write_str("choice"),
            Self::Comment => f.write_str("comment"),
            Self::Config => f.write_str("config"),
            Self::Default => f.write_str("default"),
            Self::Depends => f.write_str("depends"),
            Self::EndChoice => f.write_str("endchoice"),
            Self::EndIf => f.write_str("endif"),
            Self::EndMenu => f.write_str("endmenu"),
            Self::Env => f.write_str("env"),
            Self::Float => f.write_str("float"),
            Self::Help => f.write_str("help"),
            Self::Hex => f.write_str("hex"),
            Self::If => f.write_str("if"),
            Self::Imply => f.write_str("imply"),
            Self::Int => f.write_str("int"),
            Self::Mainmenu => f.write_str("mainmenu"),
            Self::Menu => f.write_str("menu"),
            Self::MenuConfig => f.write_str("menuconfig"),
            Self::On => f.write_str("on"),
            Self::Option => f.write_str("option"),
            Self::ORSource => f.write_str("orsource"),
            Self::OSource => f.write_str("osource"),
            Self::Prompt => f.write_str("prompt"),
            Self::Range => f.write_str("range"),
            Self::RSource => f.write_str("rsource"),
            Self::Select => f.write_str("select"),
            Self::Set => f.write_str("set"),
            Self::Source => f.write_str("source"),
            Self::String => f.write_str("string"),
            Self::Visible => f.write_str("visible"),
            Self::Warning => f.write_str("warning"),
            Self::And => f.write_str("&&"),
            Self::Or => f.write_str("||"),
            Self::Not => f.write_str("!"),
            Self::Eq => f.write_str("="),
            Self::Ne => f.write_str("!="),
            Self::Lt => f.write_str("<"),
            Self::Le => f.write_str("<="),
            Self::Gt => f.write_str(">"),
            Self::Ge => f.write_str(">="),
            Self::LParen => f.write_str("("),
            Self::RParen => f.write_str(")"),
            Self::ColonEq => f.write_str(":="),
            Self::Symbol(s) => f.write_str(s),
            Self::StrLit(s) => write!(f, "{s:?}"),
            Self::IntLit(i) => write!(f, "{i}"),
            Self::HexLit(h) => write!(f, "0x{h:X}"),
            Self::FloatLit(x) => write!(f, "{x}"),
            Self::IgnorePragma(codes) => write!(f, "# ignore: {}", codes.join(" ")),
        }
    }
}

/// A [`Token`] with location information.
#[derive(Clone, Debug, PartialEq)]
pub struct LocToken {
    /// The token.
    pub token: Token,

    /// Where the token starts.
    pub location: Location,
}

impl LocToken {
    /// Create a new [`LocToken`] from a token and a location.
    #[inline(always)]
    pub fn new(token: Token, location: Location) -> Self {
        Self {
            token,
            location,
        }
    }
}

impl Located for LocToken {
    #[inline(always)]
    fn location(&self) -> Location {
        self.location
    }
}

impl Display for LocToken {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        Display::fmt(&self.token, f)
    }
}

#[cfg(test)]
mod tests {
    use super::Token;

    #[test]
    fn keyword_lookup() {
        assert_eq!(Token::keyword("menuconfig"), Some(Token::MenuConfig));
        assert_eq!(Token::keyword("tristate"), None);
        assert_eq!(Token::keyword("FOO"), None);
    }

    #[test]
    fn source_classification() {
        assert!(Token::ORSource.is_optional_source() && Token::ORSource.is_relative_source());
        assert!(Token::Source.is_source_token() && !Token::Source.is_optional_source());
    }
}
