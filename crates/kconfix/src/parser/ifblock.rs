use crate::parser::{Block, Expected, KconfigError, LocExpr, Located, PeekableTokenLines, Token};

/// A conditional inclusion block (`if` ... `endif`).
///
/// The block is transparent in the menu tree: resolution folds its condition
/// into the dependencies of the items it contains.
#[derive(Clone, Debug, PartialEq)]
pub struct IfBlock {
    /// The condition for the block.
    pub condition: LocExpr,

    /// The items in the block.
    pub items: Vec<Block>,
}

impl IfBlock {
    /// Parse a conditional inclusion block, through the matching `endif`.
    pub fn parse(lines: &mut PeekableTokenLines) -> Result<Self, KconfigError> {
        let mut tokens = lines.next().unwrap();
        let entry_indent = tokens.indent();

        let Some(if_token) = tokens.next() else {
            panic!("Expected if command");
        };
        assert_eq!(if_token.token, Token::If);

        let condition = LocExpr::parse(if_token.location(), &mut tokens)?;
        tokens.expect_eol()?;

        let mut items = Vec::new();
        let mut last_loc = condition.location();

        loop {
            let Some(tokens) = lines.peek() else {
                return Err(KconfigError::unexpected_eof(Expected::EndIf, last_loc));
            };

            let indent = tokens.indent();
            let Some(cmd) = tokens.peek() else {
                panic!("Expected if entry");
            };

            last_loc = cmd.location();

            if cmd.token == Token::EndIf {
                if indent != entry_indent {
                    return Err(KconfigError::bad_indent(
                        format!("endif at column {indent}, if at column {entry_indent}"),
                        cmd.location(),
                    ));
                }
                _ = lines.next();
                break;
            }

            let Some(block) = Block::parse(lines)? else {
                return Err(KconfigError::unexpected_eof(Expected::EndIf, last_loc));
            };

            items.push(block);
        }

        Ok(Self {
            condition,
            items,
        })
    }
}
