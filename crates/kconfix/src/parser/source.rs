use {
    crate::parser::{
        Block, KconfigError, KconfigErrorKind, Kconfig, LocString, Located, ParseContext, ResolveBlock, LocExpr,
        TokenLine,
    },
    log::{debug, trace},
    std::{
        io::ErrorKind as IoErrorKind,
        path::{Path, PathBuf},
    },
};

/// A `source`-family statement.
#[derive(Clone, Debug, PartialEq)]
pub struct Source {
    /// The filename to read, with `$(NAME)` references still unexpanded.
    pub filename: LocString,

    /// Whether a missing file is tolerated (`osource`, `orsource`).
    pub optional: bool,

    /// Whether the path is relative to the current file (`rsource`, `orsource`).
    pub relative: bool,

    /// The directory of the file containing the statement.
    pub own_dir: PathBuf,
}

impl Source {
    /// Parse a source line.
    pub fn parse(tokens: &mut TokenLine) -> Result<Self, KconfigError> {
        let (cmd, filename) = tokens.read_cmd_str_lit(true)?;

        let optional = cmd.token.is_optional_source();
        let relative = cmd.token.is_relative_source();

        let own_dir = filename.location().filename.parent().unwrap_or_else(|| Path::new("/")).to_path_buf();

        // Only the directory part may be computed; the filename itself must
        // be spelled out.
        let last = filename.rsplit('/').next().unwrap_or(&filename);
        if last.contains("$(") {
            return Err(KconfigError::syntax(
                format!("the final component of a sourced path must be literal: {:?}", &*filename),
                filename.location(),
            ));
        }

        Ok(Source {
            filename,
            optional,
            relative,
            own_dir,
        })
    }
}

impl ResolveBlock for Source {
    type Output = Vec<Block>;

    /// Read the sourced file and return its resolved blocks.
    fn resolve_block(
        &self,
        base_dir: &Path,
        ctx: &ParseContext,
        parent_cond: Option<&LocExpr>,
    ) -> Result<Vec<Block>, KconfigError> {
        let expanded = ctx.expand_string(&self.filename);

        let dir = if self.relative { self.own_dir.as_path() } else { base_dir };
        let filename = dir.join(expanded);

        trace!("Reading source file {filename:?}");
        match Kconfig::from_file(&filename, base_dir, ctx) {
            Ok(sourced) => sourced.blocks.resolve_block(base_dir, ctx, parent_cond),
            Err(e) => {
                let KconfigErrorKind::Io(io_error) = &e.kind else {
                    return Err(e);
                };

                if io_error.kind() != IoErrorKind::NotFound || !self.optional {
                    return Err(e);
                }

                debug!("Ignoring missing optional source file: {filename:?}");
                Ok(Vec::new())
            }
        }
    }
}
