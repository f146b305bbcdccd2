use crate::parser::{
    Config, Expected, KconfigError, LocExpr, LocString, LocToken, Located, Location, PeekableTokenLines, Prompt, Token,
    TokenLine,
};

/// Choice entry: a mutually exclusive group of bool configs.
#[derive(Clone, Debug, PartialEq)]
pub struct Choice {
    /// The name of the choice, if it has one.
    pub name: Option<LocString>,

    /// Optional prompt for the choice.
    pub prompt: Option<Prompt>,

    /// Optional help text for the choice.
    pub help: Option<LocString>,

    /// Member symbols, in declaration order.
    pub configs: Vec<Config>,

    /// Default selections for the choice, in declaration order.
    pub defaults: Vec<ChoiceDefault>,

    /// Dependencies from `depends on` statements.
    pub depends_on: Vec<LocExpr>,

    /// Report areas suppressed via `# ignore:` on the entry line.
    pub ignore: Vec<String>,

    /// Where the entry was declared.
    pub location: Location,
}

/// A possible default selection for a choice entry.
#[derive(Clone, Debug, PartialEq)]
pub struct ChoiceDefault {
    /// The member to select by default.
    pub target: LocString,

    /// An optional condition; unspecified is equivalent to `y`.
    pub condition: Option<LocExpr>,
}

impl Choice {
    /// Parse a choice block, through the matching `endchoice`.
    pub fn parse(lines: &mut PeekableTokenLines) -> Result<Self, KconfigError> {
        let Some(mut tokens) = lines.next() else {
            panic!("Expected choice block");
        };

        let entry_indent = tokens.indent();
        let ignore = tokens.ignore_pragma().map(<[String]>::to_vec).unwrap_or_default();

        let Some(blk_cmd) = tokens.next() else {
            panic!("Expected choice command");
        };
        assert_eq!(blk_cmd.token, Token::Choice);
        let location = blk_cmd.location();

        // The name is optional.
        let name = match tokens.peek() {
            Some(t) if !matches!(t.token, Token::IgnorePragma(_)) => {
                let Some(sym) = t.token.symbol_value() else {
                    return Err(KconfigError::unexpected(t, Expected::Symbol, t.location()));
                };
                let name = LocString::new(sym, t.location());
                _ = tokens.next();
                Some(name)
            }
            _ => None,
        };
        tokens.expect_eol()?;

        let mut choice = Self {
            name,
            prompt: None,
            help: None,
            configs: Vec::new(),
            defaults: Vec::new(),
            depends_on: Vec::new(),
            ignore,
            location,
        };

        let mut last_loc = location;

        loop {
            let Some(tokens) = lines.peek() else {
                return Err(KconfigError::unexpected_eof(Expected::EndChoice, last_loc));
            };

            let indent = tokens.indent();
            let Some(cmd) = tokens.peek() else {
                panic!("Expected choice entry");
            };

            last_loc = cmd.location();

            if cmd.token == Token::EndChoice {
                if indent != entry_indent {
                    return Err(KconfigError::bad_indent(
                        format!("endchoice at column {indent}, choice at column {entry_indent}"),
                        cmd.location(),
                    ));
                }
                _ = lines.next();
                break;
            }

            match &cmd.token {
                Token::Config => {
                    choice.configs.push(Config::parse(lines)?);
                }

                Token::Default => {
                    let mut tokens = lines.next().unwrap();
                    _ = tokens.next();
                    choice.defaults.push(ChoiceDefault::parse(cmd, &mut tokens)?);
                }

                Token::Depends => {
                    let mut tokens = lines.next().unwrap();
                    choice.depends_on.push(LocExpr::parse_depends_on(&mut tokens)?);
                }

                Token::Help => {
                    if choice.help.is_some() {
                        return Err(KconfigError::duplicate_option("help", cmd.location()));
                    }
                    let mut tokens = lines.next().unwrap();
                    choice.help = Some(tokens.read_help()?);
                }

                // A choice prompt is usually `prompt "title"`, but `bool "title"`
                // also occurs in the wild and is accepted.
                Token::Prompt | Token::Bool => {
                    if choice.prompt.is_some() {
                        return Err(KconfigError::duplicate_option("prompt", cmd.location()));
                    }
                    let mut tokens = lines.next().unwrap();
                    let cmd = tokens.next().unwrap();
                    choice.prompt = Some(Prompt::parse(cmd.location(), &mut tokens)?);
                }

                Token::Symbol(word) => {
                    return Err(KconfigError::unknown_keyword(word, cmd.location()));
                }

                _ => {
                    return Err(KconfigError::unexpected(cmd, Expected::EndChoice, cmd.location()));
                }
            }
        }

        Ok(choice)
    }
}

impl ChoiceDefault {
    /// Parse the remainder of a `default` line within a choice block.
    pub fn parse(cmd: &LocToken, tokens: &mut TokenLine) -> Result<Self, KconfigError> {
        let Some(target) = tokens.next() else {
            return Err(KconfigError::missing(Expected::Symbol, cmd.location()));
        };

        let Some(sym) = target.token.symbol_value() else {
            return Err(KconfigError::unexpected(target, Expected::Symbol, target.location()));
        };
        let target = LocString::new(sym, target.location());

        let condition = tokens.read_if_expr(true)?;

        Ok(Self {
            target,
            condition,
        })
    }
}
