use crate::parser::{KconfigError, LocExpr, LocString, Located, Location, PeekableTokenLines, Token};

/// A `comment` entry: text shown in the menu, with optional dependencies.
#[derive(Clone, Debug, PartialEq)]
pub struct CommentBlock {
    /// The comment text.
    pub text: LocString,

    /// Dependencies from `depends on` statements.
    pub depends_on: Vec<LocExpr>,

    /// Where the comment was declared.
    pub location: Location,
}

impl CommentBlock {
    /// Parse a `comment` entry and any indented `depends on` lines.
    pub fn parse(lines: &mut PeekableTokenLines) -> Result<Self, KconfigError> {
        let Some(mut tokens) = lines.next() else {
            panic!("Expected comment block");
        };

        let entry_indent = tokens.indent();
        let (cmd, text) = tokens.read_cmd_str_lit(true)?;
        assert_eq!(cmd.token, Token::Comment);

        let mut depends_on = Vec::new();

        while let Some(next) = lines.peek() {
            if next.indent() <= entry_indent {
                break;
            }

            let Some(option) = next.peek() else {
                break;
            };

            if option.token != Token::Depends {
                break;
            }

            let mut tokens = lines.next().unwrap();
            depends_on.push(LocExpr::parse_depends_on(&mut tokens)?);
        }

        Ok(Self {
            text,
            depends_on,
            location: cmd.location(),
        })
    }
}
