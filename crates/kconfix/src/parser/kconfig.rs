use {
    crate::parser::{
        parse_stream, Block, KconfigError, KconfigErrorKind, ParseContext, PeekableChars, PeekableTokenLinesExt,
        LocString, ResolveBlock,
    },
    std::{fs::File, io::Read, path::Path},
};

/// A parsed Kconfig hierarchy with all `source` statements inlined and all
/// `if` blocks folded into dependencies.
#[derive(Debug, Default)]
pub struct Kconfig {
    /// The main menu title, if a `mainmenu` statement was present.
    pub mainmenu: Option<LocString>,

    /// The top-level blocks.
    pub blocks: Vec<Block>,
}

impl Kconfig {
    /// Read a full Kconfig tree starting with the given file.
    ///
    /// This recursively reads configuration files named in `source` (or
    /// `osource`, `orsource`, `rsource`) statements, erroring out if a file
    /// sources itself, directly or indirectly.
    pub fn from_file(filename: &Path, base_dir: &Path, ctx: &ParseContext) -> Result<Self, KconfigError> {
        if !ctx.push_file(filename) {
            return Err(KconfigError::unlocated(KconfigErrorKind::RecursiveSource(
                filename.display().to_string(),
            )));
        }

        let result = Self::read_file(filename, base_dir, ctx);
        ctx.pop_file();
        result
    }

    fn read_file(filename: &Path, base_dir: &Path, ctx: &ParseContext) -> Result<Self, KconfigError> {
        let mut file = File::open(filename)?;
        let mut input = String::new();
        file.read_to_string(&mut input)?;
        drop(file);

        Self::from_str(PeekableChars::new(&input, filename), base_dir, ctx)
    }

    /// Parse a Kconfig tree from the given input, resolving `source`
    /// statements and `if` blocks.
    pub fn from_str(input: PeekableChars, base_dir: &Path, ctx: &ParseContext) -> Result<Self, KconfigError> {
        let raw = Self::from_str_raw(input, ctx)?;
        let blocks = raw.blocks.resolve_block(base_dir, ctx, None)?;

        let mut mainmenu = raw.mainmenu;
        let blocks = blocks
            .into_iter()
            .filter(|block| match block {
                Block::Mainmenu(title) => {
                    if mainmenu.is_none() {
                        mainmenu = Some(title.clone());
                    }
                    false
                }
                _ => true,
            })
            .collect();

        Ok(Self {
            mainmenu,
            blocks,
        })
    }

    /// Parse a Kconfig file without resolving `source` statements.
    pub(crate) fn from_str_raw(input: PeekableChars, ctx: &ParseContext) -> Result<Self, KconfigError> {
        let tokens = parse_stream(input, ctx)?;
        let mut lines = tokens.peek_lines();
        let mut blocks = Vec::with_capacity(16);

        while let Some(block) = Block::parse(&mut lines)? {
            blocks.push(block);
        }

        Ok(Self {
            mainmenu: None,
            blocks,
        })
    }
}

#[cfg(test)]
mod tests {
    use {
        super::Kconfig,
        crate::parser::{Block, Expr, Kind, ParseContext, PeekableChars},
        std::{collections::HashMap, path::Path},
    };

    fn parse(input: &str) -> Kconfig {
        let ctx = ParseContext::with_env(HashMap::new());
        Kconfig::from_str(PeekableChars::new(input, Path::new("test")), Path::new("/tmp"), &ctx).unwrap()
    }

    #[test]
    fn mainmenu_and_comments() {
        let kconfig = parse(
            r#"mainmenu "Hello, world!"

# An ordinary comment is skipped.
config FOO
    bool "foo"
"#,
        );

        assert_eq!(kconfig.mainmenu.as_deref(), Some("Hello, world!"));
        assert_eq!(kconfig.blocks.len(), 1);
    }

    #[test]
    fn menuconfig_block() {
        let kconfig = parse(
            r#"
menuconfig FOO
    bool "Foo"
    default y
    help
        Say foo.
"#,
        );

        assert_eq!(kconfig.blocks.len(), 1);
        let Block::MenuConfig(c) = &kconfig.blocks[0] else {
            panic!("Expected MenuConfig");
        };

        assert_eq!(&*c.name, "FOO");
        assert_eq!(c.kind, Kind::Bool);
        assert_eq!(c.help.as_deref(), Some("Say foo."));
    }

    #[test_log::test]
    fn config_selects_and_deps() {
        let kconfig = parse(
            r#"config FOO
    bool "foo"
    default n

config BAR
    bool "bar"
    default y
    select FOO if BAZ
    depends on BAZ

config BAZ
    bool "baz"
    default y
"#,
        );

        assert_eq!(kconfig.blocks.len(), 3);
        let Block::Config(bar) = &kconfig.blocks[1] else {
            panic!("Expected Config");
        };

        assert_eq!(bar.selects.len(), 1);
        assert_eq!(&*bar.selects[0].target, "FOO");
        let cond = bar.selects[0].condition.as_ref().unwrap();
        assert_eq!(cond.expr, Expr::Symbol("BAZ".to_string()));
        assert_eq!(bar.depends_on.len(), 1);
    }

    #[test]
    fn if_blocks_fold_into_dependencies() {
        let kconfig = parse(
            r#"config GATE
    bool "gate"

if GATE
config INNER
    bool "inner"
endif
"#,
        );

        assert_eq!(kconfig.blocks.len(), 2);
        let Block::Config(inner) = &kconfig.blocks[1] else {
            panic!("Expected Config");
        };
        assert_eq!(inner.depends_on.len(), 1);
        assert_eq!(inner.depends_on[0].expr, Expr::Symbol("GATE".to_string()));
    }

    #[test]
    fn set_and_warning_options() {
        let kconfig = parse(
            r#"config DRIVER
    bool "driver"
    set SPEED=9600 if SLOW
    set default NAME="uart0"
    warning "experimental" if SLOW
"#,
        );

        let Block::Config(c) = &kconfig.blocks[0] else {
            panic!("Expected Config");
        };
        assert_eq!(c.sets.len(), 1);
        assert_eq!(&*c.sets[0].target, "SPEED");
        assert_eq!(c.set_defaults.len(), 1);
        assert_eq!(&*c.set_defaults[0].target, "NAME");
        assert!(c.warning.is_some());
    }

    #[test]
    fn bad_indent_is_rejected() {
        let ctx = ParseContext::with_env(HashMap::new());
        let result = Kconfig::from_str(
            PeekableChars::new(
                "config FOO\n    bool \"foo\"\n      default y\n",
                Path::new("test"),
            ),
            Path::new("/tmp"),
            &ctx,
        );
        assert!(result.is_err());
    }

    #[test]
    fn unknown_keyword_is_rejected() {
        let ctx = ParseContext::with_env(HashMap::new());
        let result = Kconfig::from_str(
            PeekableChars::new("config FOO\n    bool \"foo\"\n    defautl y\n", Path::new("test")),
            Path::new("/tmp"),
            &ctx,
        );
        assert!(result.is_err());
    }

    #[test]
    fn choice_members() {
        let kconfig = parse(
            r#"choice MODE
    prompt "mode"
    default MODE_A

    config MODE_A
        bool "a"

    config MODE_B
        bool "b"
endchoice
"#,
        );

        let Block::Choice(choice) = &kconfig.blocks[0] else {
            panic!("Expected Choice");
        };
        assert_eq!(choice.name.as_deref(), Some("MODE"));
        assert_eq!(choice.configs.len(), 2);
        assert_eq!(choice.defaults.len(), 1);
        assert_eq!(&*choice.defaults[0].target, "MODE_A");
    }
}
