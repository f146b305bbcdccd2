use crate::parser::{
    Block, Expected, KconfigError, LocExpr, LocString, Located, Location, PeekableTokenLines, Token,
};

/// A menu block in a Kconfig file.
#[derive(Clone, Debug, PartialEq)]
pub struct Menu {
    /// The title of the menu.
    pub title: LocString,

    /// The items in the menu.
    pub blocks: Vec<Block>,

    /// Dependencies from `depends on` statements.
    pub depends_on: Vec<LocExpr>,

    /// Visibility of the menu's contents. `None` is equivalent to `y`.
    /// Affects only what the user can see and edit, not symbol semantics.
    pub visible_if: Option<LocExpr>,

    /// Where the menu was declared.
    pub location: Location,
}

impl Menu {
    /// Parse a menu block, through the matching `endmenu`.
    pub fn parse(lines: &mut PeekableTokenLines) -> Result<Self, KconfigError> {
        let mut tokens = lines.next().unwrap();
        let entry_indent = tokens.indent();

        let Some(blk_cmd) = tokens.next() else {
            panic!("Expected menu command");
        };
        assert_eq!(blk_cmd.token, Token::Menu);

        let Some(title) = tokens.next() else {
            return Err(KconfigError::missing(Expected::StringLiteral, blk_cmd.location()));
        };

        let Some(s) = title.token.string_literal_value() else {
            return Err(KconfigError::unexpected(title, Expected::StringLiteral, title.location()));
        };

        let title = LocString::new(s, title.location());
        tokens.expect_eol()?;

        let location = blk_cmd.location();
        let mut last_loc = location;
        let mut blocks = Vec::new();
        let mut depends_on = Vec::new();
        let mut visible_if = None;

        loop {
            let Some(tokens) = lines.peek() else {
                return Err(KconfigError::unexpected_eof(Expected::EndMenu, last_loc));
            };

            let indent = tokens.indent();
            let Some(cmd) = tokens.peek() else {
                panic!("Expected menu entry");
            };

            last_loc = cmd.location();

            if cmd.token == Token::EndMenu {
                if indent != entry_indent {
                    return Err(KconfigError::bad_indent(
                        format!("endmenu at column {indent}, menu at column {entry_indent}"),
                        cmd.location(),
                    ));
                }
                _ = lines.next();
                break;
            }

            match cmd.token {
                Token::Depends => {
                    let mut tokens = lines.next().unwrap();
                    depends_on.push(LocExpr::parse_depends_on(&mut tokens)?);
                }

                Token::Visible => {
                    if visible_if.is_some() {
                        return Err(KconfigError::duplicate_option("visible if", cmd.location()));
                    }
                    let mut tokens = lines.next().unwrap();
                    visible_if = Some(LocExpr::parse_visible_if(&mut tokens)?);
                }

                _ => {
                    let Some(block) = Block::parse(lines)? else {
                        return Err(KconfigError::unexpected_eof(Expected::EndMenu, last_loc));
                    };

                    blocks.push(block);
                }
            }
        }

        Ok(Self {
            title,
            blocks,
            depends_on,
            visible_if,
            location,
        })
    }
}
