use crate::parser::{
    Expected, Expr, KconfigError, Kind, LocExpr, LocString, LocToken, Located, Location, PeekableTokenLines, Token,
    TokenLine,
};

/// Configuration entry (`config` or `menuconfig`).
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// The name of the symbol for this config block.
    pub name: LocString,

    /// The declared kind of this config block.
    pub kind: Kind,

    /// The prompt for this config.
    pub prompt: Option<Prompt>,

    /// Help text for this config.
    pub help: Option<LocString>,

    /// Default values for the config, in declaration order.
    pub defaults: Vec<ConfigDefault>,

    /// Environment variable named by a deprecated `option env=` line.
    pub env: Option<LocString>,

    /// Dependencies from `depends on` statements.
    pub depends_on: Vec<LocExpr>,

    /// Other configs selected by this config.
    pub selects: Vec<ConfigTarget>,

    /// Other configs implied by this config.
    pub implies: Vec<ConfigTarget>,

    /// `set` statements declared on this config.
    pub sets: Vec<ConfigSet>,

    /// `set default` statements declared on this config.
    pub set_defaults: Vec<ConfigSet>,

    /// Acceptable value ranges, in declaration order.
    pub ranges: Vec<ConfigRange>,

    /// User-facing warning attached to this config.
    pub warning: Option<ConfigWarning>,

    /// Report areas suppressed via `# ignore:` on the entry line.
    pub ignore: Vec<String>,

    /// Where the entry was declared.
    pub location: Location,
}

/// Prompt for a config or choice block along with an optional condition.
#[derive(Clone, Debug, PartialEq)]
pub struct Prompt {
    /// The prompt title.
    pub title: LocString,

    /// Optional expression that determines whether the prompt is shown.
    pub condition: Option<LocExpr>,
}

/// One `default` clause.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigDefault {
    /// The value of the default.
    pub value: LocExpr,

    /// An optional condition; unspecified is equivalent to `y`.
    pub condition: Option<LocExpr>,
}

/// The target of a `select` or `imply` statement.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigTarget {
    /// The name of the target symbol.
    pub target: LocString,

    /// An optional condition; unspecified is equivalent to `y`.
    pub condition: Option<LocExpr>,
}

/// A `set TARGET=VALUE` or `set default TARGET=VALUE` statement.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigSet {
    /// The name of the target symbol.
    pub target: LocString,

    /// The value (or symbol) assigned to the target.
    pub value: LocExpr,

    /// An optional condition; unspecified is equivalent to `y`.
    pub condition: Option<LocExpr>,
}

/// One `range LOW HIGH` clause for int/hex/float configs.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigRange {
    /// The lower bound (inclusive).
    pub low: LocExpr,

    /// The upper bound (inclusive).
    pub high: LocExpr,

    /// An optional condition; unspecified is equivalent to `y`.
    pub condition: Option<LocExpr>,
}

/// A `warning "message"` clause.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: LocString,

    /// An optional condition; unspecified is equivalent to `y`.
    pub condition: Option<LocExpr>,
}

impl Prompt {
    /// Parse the remainder of a prompt statement (everything after the `prompt`
    /// keyword or a type keyword).
    pub fn parse(prev: Location, tokens: &mut TokenLine) -> Result<Self, KconfigError> {
        let Some(title) = tokens.next() else {
            return Err(KconfigError::missing(Expected::StringLiteral, prev));
        };

        let Some(s) = title.token.string_literal_value() else {
            return Err(KconfigError::unexpected(title, Expected::StringLiteral, title.location()));
        };

        let title = LocString::new(s, title.location());
        let condition = tokens.read_if_expr(true)?;

        Ok(Prompt {
            title,
            condition,
        })
    }
}

impl Config {
    /// Parse a `config` or `menuconfig` block, including its indented options.
    pub fn parse(lines: &mut PeekableTokenLines) -> Result<Self, KconfigError> {
        let Some(mut tokens) = lines.next() else {
            panic!("Expected config block");
        };

        let entry_indent = tokens.indent();
        let ignore = tokens.ignore_pragma().map(<[String]>::to_vec).unwrap_or_default();
        let (blk_cmd, name) = tokens.read_cmd_sym(true)?;

        assert!(
            matches!(blk_cmd.token, Token::Config | Token::MenuConfig),
            "Expected config or menuconfig: {blk_cmd:?}"
        );

        let location = blk_cmd.location();
        let mut config = Self {
            name,
            kind: Kind::Unknown,
            prompt: None,
            help: None,
            defaults: Vec::new(),
            env: None,
            depends_on: Vec::new(),
            selects: Vec::new(),
            implies: Vec::new(),
            sets: Vec::new(),
            set_defaults: Vec::new(),
            ranges: Vec::new(),
            warning: None,
            ignore,
            location,
        };

        let mut body_indent = None;

        loop {
            let Some(tokens) = lines.peek() else {
                break;
            };

            let indent = tokens.indent();
            if indent <= entry_indent {
                break;
            }

            match body_indent {
                None => body_indent = Some(indent),
                Some(expected) if indent != expected => {
                    return Err(KconfigError::bad_indent(
                        format!("expected column {expected}, found column {indent}"),
                        tokens.peek().unwrap().location(),
                    ));
                }
                _ => {}
            }

            let mut tokens = lines.next().unwrap();
            config.parse_option(&mut tokens)?;
        }

        config.check_literal_kinds()?;

        Ok(config)
    }

    /// Parse one option line of the entry body.
    fn parse_option(&mut self, tokens: &mut TokenLine) -> Result<(), KconfigError> {
        let cmd = tokens.peek().expect("Expected config option").clone();

        match &cmd.token {
            t if t.is_type_token() => {
                let type_token = tokens.next().unwrap();

                if self.kind != Kind::Unknown {
                    return Err(KconfigError::duplicate_option("type", type_token.location()));
                }
                self.kind = Kind::from_token(&type_token.token).unwrap();

                if !tokens.is_empty() && !matches!(tokens.peek().unwrap().token, Token::IgnorePragma(_)) {
                    self.set_prompt(Prompt::parse(type_token.location(), tokens)?, type_token.location())?;
                }
            }

            Token::Prompt => {
                _ = tokens.next();
                self.set_prompt(Prompt::parse(cmd.location(), tokens)?, cmd.location())?;
            }

            Token::Help => {
                if self.help.is_some() {
                    return Err(KconfigError::duplicate_option("help", cmd.location()));
                }
                self.help = Some(tokens.read_help()?);
            }

            Token::Default => {
                _ = tokens.next();
                self.defaults.push(ConfigDefault::parse(&cmd, tokens)?);
            }

            Token::Depends => {
                self.depends_on.push(LocExpr::parse_depends_on(tokens)?);
            }

            Token::Select => {
                self.selects.push(ConfigTarget::parse(tokens)?);
            }

            Token::Imply => {
                self.implies.push(ConfigTarget::parse(tokens)?);
            }

            Token::Set => {
                _ = tokens.next();
                let is_default = match tokens.peek() {
                    Some(t) if t.token == Token::Default => {
                        _ = tokens.next();
                        true
                    }
                    _ => false,
                };

                let set = ConfigSet::parse(&cmd, tokens)?;
                if is_default {
                    self.set_defaults.push(set);
                } else {
                    self.sets.push(set);
                }
            }

            Token::Range => {
                _ = tokens.next();
                self.ranges.push(ConfigRange::parse(&cmd, tokens)?);
            }

            Token::Warning => {
                if self.warning.is_some() {
                    return Err(KconfigError::duplicate_option("warning", cmd.location()));
                }
                _ = tokens.next();
                self.warning = Some(ConfigWarning::parse(&cmd, tokens)?);
            }

            Token::Option => {
                if self.env.is_some() {
                    return Err(KconfigError::duplicate_option("option env", cmd.location()));
                }
                self.env = Some(Self::parse_option_env(tokens)?);
            }

            Token::Symbol(word) => {
                return Err(KconfigError::unknown_keyword(word, cmd.location()));
            }

            _ => {
                // A block keyword indented under a config entry.
                return Err(KconfigError::bad_indent(
                    format!("{cmd} cannot appear inside a config entry"),
                    cmd.location(),
                ));
            }
        }

        Ok(())
    }

    fn set_prompt(&mut self, prompt: Prompt, location: Location) -> Result<(), KconfigError> {
        if self.prompt.is_some() {
            return Err(KconfigError::duplicate_option("prompt", location));
        }
        self.prompt = Some(prompt);
        Ok(())
    }

    /// Parse a deprecated `option env="NAME"` line (after the `option` keyword).
    fn parse_option_env(tokens: &mut TokenLine) -> Result<LocString, KconfigError> {
        let cmd = tokens.next().unwrap();

        let Some(env_token) = tokens.next() else {
            return Err(KconfigError::missing(Expected::Symbol, cmd.location()));
        };

        if env_token.token != Token::Env {
            return Err(KconfigError::unexpected(env_token, Expected::Symbol, env_token.location()));
        }

        let Some(eq_token) = tokens.next() else {
            return Err(KconfigError::missing(Expected::Eq, env_token.location()));
        };

        if eq_token.token != Token::Eq {
            return Err(KconfigError::unexpected(eq_token, Expected::Eq, eq_token.location()));
        }

        let Some(env_name) = tokens.next() else {
            return Err(KconfigError::missing(Expected::StringLiteral, eq_token.location()));
        };

        let name = match &env_name.token {
            Token::StrLit(s) => s.clone(),
            Token::Symbol(s) => s.clone(),
            _ => return Err(KconfigError::unexpected(env_name, Expected::StringLiteral, env_name.location())),
        };

        tokens.expect_eol()?;

        Ok(LocString::new(name, env_name.location()))
    }

    /// Reject literal defaults and range bounds whose form cannot match the
    /// declared kind. Symbol references are left for evaluation to judge.
    fn check_literal_kinds(&self) -> Result<(), KconfigError> {
        for default in &self.defaults {
            check_literal_kind(self.kind, &default.value, "default")?;
        }

        for range in &self.ranges {
            check_literal_kind(self.kind, &range.low, "range bound")?;
            check_literal_kind(self.kind, &range.high, "range bound")?;
        }

        Ok(())
    }
}

fn check_literal_kind(kind: Kind, value: &LocExpr, what: &str) -> Result<(), KconfigError> {
    let ok = match (&value.expr, kind) {
        (_, Kind::Unknown) => true,
        (Expr::String(s), Kind::Int) => s.parse::<i64>().is_ok(),
        (Expr::String(s), Kind::Hex) => {
            let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
            u64::from_str_radix(digits, 16).is_ok()
        }
        (Expr::String(s), Kind::Float) => s.parse::<f64>().is_ok(),
        (Expr::String(s), Kind::Bool) => s == "y" || s == "n",
        (Expr::Integer(_) | Expr::Hex(_) | Expr::Float(_), Kind::Bool) => false,
        (Expr::Float(_), Kind::Int | Kind::Hex) => false,
        _ => true,
    };

    if ok {
        Ok(())
    } else {
        Err(KconfigError::type_mismatch(
            format!("{what} {value} does not fit a {kind} symbol"),
            value.location(),
        ))
    }
}

impl ConfigDefault {
    /// Parse the remainder of a `default` statement (after the `default` keyword).
    pub fn parse(cmd: &LocToken, tokens: &mut TokenLine) -> Result<Self, KconfigError> {
        let value = LocExpr::parse(cmd.location(), tokens)?;
        let condition = tokens.read_if_expr(true)?;

        Ok(Self {
            value,
            condition,
        })
    }
}

impl ConfigTarget {
    /// Parse a `select` or `imply` statement, including the keyword.
    pub fn parse(tokens: &mut TokenLine) -> Result<Self, KconfigError> {
        let (cmd, target) = tokens.read_cmd_sym(false)?;
        assert!(matches!(cmd.token, Token::Select | Token::Imply));

        let condition = tokens.read_if_expr(true)?;

        Ok(Self {
            target,
            condition,
        })
    }
}

impl ConfigSet {
    /// Parse the remainder of a `set [default]` statement: `TARGET=VALUE [if expr]`.
    pub fn parse(cmd: &LocToken, tokens: &mut TokenLine) -> Result<Self, KconfigError> {
        let Some(target) = tokens.next() else {
            return Err(KconfigError::missing(Expected::Symbol, cmd.location()));
        };

        let Some(sym) = target.token.symbol_value() else {
            return Err(KconfigError::unexpected(target, Expected::Symbol, target.location()));
        };
        let target = LocString::new(sym, target.location());

        let Some(eq) = tokens.next() else {
            return Err(KconfigError::missing(Expected::Eq, target.location()));
        };
        if eq.token != Token::Eq {
            return Err(KconfigError::unexpected(eq, Expected::Eq, eq.location()));
        }

        let value = LocExpr::parse(eq.location(), tokens)?;
        let condition = tokens.read_if_expr(true)?;

        Ok(Self {
            target,
            value,
            condition,
        })
    }
}

impl ConfigRange {
    /// Parse the remainder of a `range` statement (after the `range` keyword).
    pub fn parse(cmd: &LocToken, tokens: &mut TokenLine) -> Result<Self, KconfigError> {
        let low = Self::parse_bound(cmd, tokens)?;
        let high = Self::parse_bound(cmd, tokens)?;
        let condition = tokens.read_if_expr(true)?;

        Ok(Self {
            low,
            high,
            condition,
        })
    }

    fn parse_bound(cmd: &LocToken, tokens: &mut TokenLine) -> Result<LocExpr, KconfigError> {
        let Some(token) = tokens.next() else {
            return Err(KconfigError::missing(Expected::SymbolOrValue, cmd.location()));
        };

        let expr = match &token.token {
            Token::Symbol(s) => Expr::Symbol(s.clone()),
            Token::IntLit(i) => Expr::Integer(*i),
            Token::HexLit(h) => Expr::Hex(*h),
            Token::FloatLit(x) => Expr::Float(*x),
            _ => return Err(KconfigError::unexpected(token, Expected::SymbolOrValue, token.location())),
        };

        Ok(LocExpr::new(expr, token.location()))
    }
}

impl ConfigWarning {
    /// Parse the remainder of a `warning` statement (after the `warning` keyword).
    pub fn parse(cmd: &LocToken, tokens: &mut TokenLine) -> Result<Self, KconfigError> {
        let Some(message) = tokens.next() else {
            return Err(KconfigError::missing(Expected::StringLiteral, cmd.location()));
        };

        let Some(s) = message.token.string_literal_value() else {
            return Err(KconfigError::unexpected(message, Expected::StringLiteral, message.location()));
        };

        let message = LocString::new(s, message.location());
        let condition = tokens.read_if_expr(true)?;

        Ok(Self {
            message,
            condition,
        })
    }
}
