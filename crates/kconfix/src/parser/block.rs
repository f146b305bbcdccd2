use {
    crate::parser::{
        Choice, CommentBlock, Config, IfBlock, KconfigError, LocExpr, LocString, Menu, ParseContext,
        PeekableTokenLines, Source, Token, Expected,
    },
    std::path::Path,
};

/// A block in a Kconfig file.
#[derive(Clone, Debug, PartialEq)]
pub enum Block {
    /// Choice of configuration entries.
    Choice(Choice),

    /// Comment shown in the menu.
    Comment(CommentBlock),

    /// Configuration entry for a symbol.
    Config(Config),

    /// Conditional inclusion of entries.
    If(IfBlock),

    /// Main menu title.
    Mainmenu(LocString),

    /// Menu block containing other items visible to the user in a submenu.
    Menu(Menu),

    /// Configuration entry for a symbol with an attached menu.
    MenuConfig(Config),

    /// Source another Kconfig file.
    Source(Source),
}

/// A trait for adjusting the block hierarchy of a Kconfig file.
///
/// This is used to:
/// * inline blocks read from `source`-family statements, and
/// * fold `if` block conditions onto the blocks they contain.
pub trait ResolveBlock {
    /// The resulting type after the block is resolved.
    type Output: Sized;

    /// Resolve `source` statements and `if` blocks.
    ///
    /// `parent_cond` is the conjunction of the enclosing `if` conditions, or
    /// `None` when unconditional.
    fn resolve_block(
        &self,
        base_dir: &Path,
        ctx: &ParseContext,
        parent_cond: Option<&LocExpr>,
    ) -> Result<Self::Output, KconfigError>;
}

impl Block {
    /// Parse the next block from the stream.
    pub fn parse(lines: &mut PeekableTokenLines) -> Result<Option<Block>, KconfigError> {
        let Some(tokens) = lines.peek() else {
            return Ok(None);
        };

        let Some(cmd) = tokens.peek() else {
            panic!("Expected block command");
        };

        match &cmd.token {
            Token::Choice => Ok(Some(Block::Choice(Choice::parse(lines)?))),

            Token::Comment => Ok(Some(Block::Comment(CommentBlock::parse(lines)?))),

            Token::Config => Ok(Some(Block::Config(Config::parse(lines)?))),

            Token::If => Ok(Some(Block::If(IfBlock::parse(lines)?))),

            Token::MenuConfig => Ok(Some(Block::MenuConfig(Config::parse(lines)?))),

            Token::Mainmenu => {
                let mut tokens = lines.next().unwrap();
                let (cmd, title) = tokens.read_cmd_str_lit(true)?;
                assert_eq!(cmd.token, Token::Mainmenu);
                Ok(Some(Block::Mainmenu(title)))
            }

            Token::Menu => Ok(Some(Block::Menu(Menu::parse(lines)?))),

            t if t.is_source_token() => {
                let mut tokens = lines.next().unwrap();
                let source = Source::parse(&mut tokens)?;
                Ok(Some(Block::Source(source)))
            }

            Token::Symbol(word) => Err(KconfigError::unknown_keyword(word, cmd.location)),

            _ => Err(KconfigError::unexpected(cmd, Expected::Block, cmd.location)),
        }
    }
}

impl ResolveBlock for Block {
    type Output = Vec<Block>;

    fn resolve_block(
        &self,
        base_dir: &Path,
        ctx: &ParseContext,
        parent_cond: Option<&LocExpr>,
    ) -> Result<Self::Output, KconfigError> {
        match self {
            Block::If(i) => i.resolve_block(base_dir, ctx, parent_cond),

            Block::Menu(m) => {
                let menu = m.resolve_block(base_dir, ctx, parent_cond)?;
                Ok(vec![Block::Menu(menu)])
            }

            Block::Source(s) => s.resolve_block(base_dir, ctx, parent_cond),

            Block::Config(c) => {
                let mut c = c.clone();
                if let Some(cond) = parent_cond {
                    c.depends_on.push(cond.clone());
                }
                Ok(vec![Block::Config(c)])
            }

            Block::MenuConfig(c) => {
                let mut c = c.clone();
                if let Some(cond) = parent_cond {
                    c.depends_on.push(cond.clone());
                }
                Ok(vec![Block::MenuConfig(c)])
            }

            Block::Choice(c) => {
                let mut c = c.clone();
                if let Some(cond) = parent_cond {
                    c.depends_on.push(cond.clone());
                }
                Ok(vec![Block::Choice(c)])
            }

            Block::Comment(c) => {
                let mut c = c.clone();
                if let Some(cond) = parent_cond {
                    c.depends_on.push(cond.clone());
                }
                Ok(vec![Block::Comment(c)])
            }

            Block::Mainmenu(title) => Ok(vec![Block::Mainmenu(title.clone())]),
        }
    }
}

impl ResolveBlock for [Block] {
    type Output = Vec<Block>;

    fn resolve_block(
        &self,
        base_dir: &Path,
        ctx: &ParseContext,
        parent_cond: Option<&LocExpr>,
    ) -> Result<Self::Output, KconfigError> {
        let mut resolved = Vec::with_capacity(self.len());

        for block in self {
            resolved.extend(block.resolve_block(base_dir, ctx, parent_cond)?);
        }

        Ok(resolved)
    }
}

impl ResolveBlock for IfBlock {
    type Output = Vec<Block>;

    fn resolve_block(
        &self,
        base_dir: &Path,
        ctx: &ParseContext,
        parent_cond: Option<&LocExpr>,
    ) -> Result<Self::Output, KconfigError> {
        let sub_cond = LocExpr::and_opt(parent_cond.cloned(), Some(self.condition.clone()))
            .expect("if block always has a condition");

        self.items.resolve_block(base_dir, ctx, Some(&sub_cond))
    }
}

impl ResolveBlock for Menu {
    type Output = Menu;

    fn resolve_block(
        &self,
        base_dir: &Path,
        ctx: &ParseContext,
        parent_cond: Option<&LocExpr>,
    ) -> Result<Self::Output, KconfigError> {
        let mut depends_on = self.depends_on.clone();
        if let Some(cond) = parent_cond {
            depends_on.push(cond.clone());
        }

        log::debug!("Resolving menu {:?}", &*self.title);

        // Menu dependencies reach descendants when the model is built, so the
        // children restart with no inherited condition here.
        let blocks = self.blocks.resolve_block(base_dir, ctx, None)?;

        Ok(Menu {
            title: self.title.clone(),
            blocks,
            depends_on,
            visible_if: self.visible_if.clone(),
            location: self.location,
        })
    }
}
