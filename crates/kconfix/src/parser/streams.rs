use {
    crate::parser::{
        cache_path,
        numeric::parse_numeric_literal,
        string_literal::{parse_string_literal, read_expansion_name},
        Expected, KconfigError, LocExpr, LocString, LocToken, Located, Location, ParseContext, Token,
    },
    std::{iter::FusedIterator, ops::Deref, path::Path},
};

/// An iterator over a string slice from a file that returns characters and can peek ahead.
///
/// This is more powerful than `Peekable<Chars>`:
/// * It can peek at more than the next character.
/// * [`&str`][str] methods such as [`starts_with()`][str::starts_with()] work via [`Deref`].
/// * It tracks the [`Location`] of the current position.
#[derive(Clone, Debug)]
pub struct PeekableChars<'buf> {
    base: &'buf str,
    offset: usize,
    location: Location,
}

impl<'buf> PeekableChars<'buf> {
    /// Create a new PeekableChars from a string slice and filename.
    pub fn new(base: &'buf str, filename: &Path) -> Self {
        Self {
            base,
            offset: 0,
            location: Location {
                filename: cache_path(filename),
                line: 1,
                column: 1,
            },
        }
    }

    /// Returns the underlying string.
    #[inline(always)]
    pub fn base_str(&self) -> &'buf str {
        self.base
    }

    /// Returns the current offset in the string.
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns true if there are no more bytes to read.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.offset >= self.base.len()
    }

    /// Peek at the next character in the string.
    #[inline(always)]
    pub fn peek(&self) -> Option<char> {
        self.base[self.offset..].chars().next()
    }

    /// Peek at the nth character in the string.
    #[inline(always)]
    pub fn peek_at(&self, n: usize) -> Option<char> {
        self.base[self.offset..].chars().nth(n)
    }

    /// Advances the offset by the given number of bytes.
    pub fn advance(&mut self, n: usize) {
        let target = self.offset + n;
        assert!(target <= self.base.len(), "advance past end of input");

        while self.offset < target {
            let Some(c) = self.peek() else { break };
            self.offset += c.len_utf8();
            if c == '\n' {
                self.location.line += 1;
                self.location.column = 1;
            } else {
                self.location.column += 1;
            }
        }
    }

    /// Read characters until the given predicate returns true or the end of the string is reached.
    pub fn read_until(&mut self, predicate: impl Fn(char) -> bool) -> &'buf str {
        let start = self.offset;

        while let Some(c) = self.peek() {
            if predicate(c) {
                break;
            }
            _ = self.next();
        }

        &self.base[start..self.offset]
    }
}

impl Located for PeekableChars<'_> {
    fn location(&self) -> Location {
        self.location
    }
}

impl<'buf> Deref for PeekableChars<'buf> {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.base[self.offset..]
    }
}

impl<'buf> Iterator for PeekableChars<'buf> {
    type Item = char;

    fn next(&mut self) -> Option<Self::Item> {
        let c = self.peek()?;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.location.line += 1;
            self.location.column = 1;
        } else {
            self.location.column += 1;
        }
        Some(c)
    }
}

impl FusedIterator for PeekableChars<'_> {}

/// Parse the input stream into logical lines of tokens.
///
/// Macro assignment lines (`NAME = value`, `NAME := value`) are consumed here:
/// they update `ctx` and produce no token line.
pub fn parse_stream(mut chars: PeekableChars, ctx: &ParseContext) -> Result<Vec<Vec<LocToken>>, KconfigError> {
    let mut lines = vec![];

    loop {
        let line = parse_line(&mut chars, ctx)?;
        if line.is_empty() {
            break;
        }

        lines.push(line);
    }

    Ok(lines)
}

/// Parse the next non-empty logical line from the stream.
///
/// Returns an empty vector if EOF is reached without parsing any tokens.
pub fn parse_line(chars: &mut PeekableChars, ctx: &ParseContext) -> Result<Vec<LocToken>, KconfigError> {
    'outer: loop {
        let mut tokens: Vec<LocToken> = vec![];

        loop {
            let Some(c) = chars.peek() else {
                // EOF reached. Return what we have.
                return Ok(tokens);
            };

            match c {
                '#' | '\n' => {
                    let pragma = if c == '#' {
                        read_comment(chars, !tokens.is_empty())?
                    } else {
                        _ = chars.next();
                        None
                    };

                    if let Some(pragma) = pragma {
                        tokens.push(pragma);
                    }

                    if tokens.is_empty() {
                        continue 'outer;
                    } else if tokens.len() == 1 && tokens[0].token == Token::Help {
                        // A help block follows; its text becomes a single string literal.
                        let start = chars.location();
                        tokens.push(LocToken::new(Token::StrLit(read_help_block(chars)?), start));
                        return Ok(tokens);
                    } else {
                        return Ok(tokens);
                    }
                }

                '"' | '\'' => {
                    let start = chars.location();
                    // Paths after source keywords keep `$(...)` references raw so the
                    // final-component-literal rule can be checked before expansion.
                    let expand = !tokens.last().is_some_and(|t| t.token.is_source_token());
                    let s = parse_string_literal(chars, ctx, expand)?;
                    tokens.push(LocToken::new(Token::StrLit(s), start));
                }

                '+' | '-' | '0'..='9' => {
                    let start = chars.location();
                    let token = parse_numeric_literal(chars)?;
                    tokens.push(LocToken::new(token, start));
                }

                '$' if chars.peek_at(1) == Some('(') => {
                    let start = chars.location();
                    _ = chars.next();
                    _ = chars.next();
                    let name = read_expansion_name(chars, start)?;
                    let Some(expansion) = ctx.expand(&name) else {
                        // Unset expansions are only forgiven inside quotes.
                        return Err(KconfigError::unknown_macro(name, start));
                    };
                    tokens.push(LocToken::new(classify_expansion(&expansion), start));
                }

                c if c.is_whitespace() => {
                    _ = chars.next();
                }

                c if c.is_alphanumeric() || c == '_' => {
                    let start = chars.location();
                    let word = chars.read_until(|c| !c.is_alphanumeric() && c != '_');
                    let token = Token::keyword(word).unwrap_or_else(|| Token::Symbol(word.to_string()));
                    tokens.push(LocToken::new(token, start));
                }

                '&' if chars.starts_with("&&") => {
                    let start = chars.location();
                    chars.advance(2);
                    tokens.push(LocToken::new(Token::And, start));
                }

                '|' if chars.starts_with("||") => {
                    let start = chars.location();
                    chars.advance(2);
                    tokens.push(LocToken::new(Token::Or, start));
                }

                '=' => {
                    let start = chars.location();
                    _ = chars.next();
                    tokens.push(LocToken::new(Token::Eq, start));
                }

                ':' if chars.starts_with(":=") => {
                    let start = chars.location();
                    chars.advance(2);
                    tokens.push(LocToken::new(Token::ColonEq, start));
                }

                '!' => {
                    let start = chars.location();
                    _ = chars.next();
                    let op = if chars.peek() == Some('=') {
                        _ = chars.next();
                        Token::Ne
                    } else {
                        Token::Not
                    };
                    tokens.push(LocToken::new(op, start));
                }

                '(' => {
                    let start = chars.location();
                    _ = chars.next();
                    tokens.push(LocToken::new(Token::LParen, start));
                }

                ')' => {
                    let start = chars.location();
                    _ = chars.next();
                    tokens.push(LocToken::new(Token::RParen, start));
                }

                '<' => {
                    let start = chars.location();
                    _ = chars.next();
                    let op = if chars.peek() == Some('=') {
                        _ = chars.next();
                        Token::Le
                    } else {
                        Token::Lt
                    };
                    tokens.push(LocToken::new(op, start));
                }

                '>' => {
                    let start = chars.location();
                    _ = chars.next();
                    let op = if chars.peek() == Some('=') {
                        _ = chars.next();
                        Token::Ge
                    } else {
                        Token::Gt
                    };
                    tokens.push(LocToken::new(op, start));
                }

                '\\' if chars.starts_with("\\\n") => {
                    // Line continuation.
                    chars.advance(2);
                }

                _ => return Err(KconfigError::syntax(c, chars.location())),
            }

            // A lone `NAME =` or `NAME :=` prefix is a macro assignment; the rest
            // of the line is its raw replacement text.
            if tokens.len() == 2
                && matches!(tokens[1].token, Token::Eq | Token::ColonEq)
                && matches!(tokens[0].token, Token::Symbol(_))
            {
                let Token::Symbol(name) = &tokens[0].token else {
                    unreachable!();
                };
                let value = chars.read_until(|c| c == '\n' || c == '#').trim().to_string();
                ctx.define_macro(name.clone(), value);
                continue 'outer;
            }
        }
    }
}

/// Turn a bare `$(NAME)` expansion into a token by its shape.
fn classify_expansion(expansion: &str) -> Token {
    if let Some(hex) = expansion.strip_prefix("0x").or_else(|| expansion.strip_prefix("0X")) {
        if let Ok(value) = u64::from_str_radix(hex, 16) {
            return Token::HexLit(value);
        }
    }

    if let Ok(value) = expansion.parse::<i64>() {
        return Token::IntLit(value);
    }

    if let Ok(value) = expansion.parse::<f64>() {
        return Token::FloatLit(value);
    }

    Token::StrLit(expansion.to_string())
}

/// Consume a `#` comment up to the newline. Returns an [`Token::IgnorePragma`]
/// token when the comment is an `# ignore:` pragma trailing a non-empty line.
fn read_comment(chars: &mut PeekableChars, line_has_tokens: bool) -> Result<Option<LocToken>, KconfigError> {
    let start = chars.location();
    let Some(c) = chars.next() else {
        return Err(KconfigError::unexpected_eof(Expected::Any, start));
    };
    debug_assert_eq!(c, '#');

    let text = chars.read_until(|c| c == '\n').trim().to_string();
    _ = chars.next();

    if line_has_tokens {
        if let Some(codes) = text.strip_prefix("ignore:") {
            let codes: Vec<String> = codes.split_whitespace().map(str::to_string).collect();
            if !codes.is_empty() {
                return Ok(Some(LocToken::new(Token::IgnorePragma(codes), start)));
            }
        }
    }

    Ok(None)
}

/// Read a help block from the stream.
///
/// The first line of the help block determines the indentation level of the rest of
/// the block. The block continues until a non-empty line indented less than the
/// first line.
fn read_help_block(chars: &mut PeekableChars) -> Result<String, KconfigError> {
    let mut help = String::new();

    // Skip blank lines between `help` and the first text line.
    while chars.starts_with('\n') {
        _ = chars.next();
    }

    let indent = chars.read_until(|c| !c.is_whitespace() || c == '\n');

    if indent.is_empty() {
        let start = chars.location();
        let c = chars.peek().map(|c| c.to_string()).unwrap_or_else(|| "<EOF>".to_string());
        return Err(KconfigError::unexpected(c, Expected::Whitespace, start));
    }

    help.push_str(chars.read_until(|c| c == '\n'));

    while !chars.is_empty() {
        if chars.starts_with(indent) {
            chars.advance(indent.len());
            help.push_str("\n");
            help.push_str(chars.read_until(|c| c == '\n'));
        } else if chars.starts_with('\n') {
            _ = chars.next();
            if chars.starts_with(indent) {
                help.push('\n');
            } else if !chars.starts_with('\n') {
                break;
            }
        } else {
            break;
        }
    }

    Ok(help.trim_end().to_string())
}

/// An iterator over lines of tokens that can peek ahead without consuming.
pub struct PeekableTokenLines<'buf> {
    base: &'buf [Vec<LocToken>],
    offset: usize,
}

impl<'buf> PeekableTokenLines<'buf> {
    /// Peek at the next line.
    #[inline(always)]
    pub fn peek(&self) -> Option<TokenLine<'buf>> {
        self.base.get(self.offset).map(|line| TokenLine::new(line))
    }
}

impl<'buf> Iterator for PeekableTokenLines<'buf> {
    type Item = TokenLine<'buf>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.peek()?;
        self.offset += 1;
        Some(line)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.base.len() - self.offset;
        (n, Some(n))
    }
}

impl FusedIterator for PeekableTokenLines<'_> {}

/// An extension trait for `&[Vec<LocToken>]` that provides `peek_lines()`.
pub trait PeekableTokenLinesExt {
    /// Return a [`PeekableTokenLines`] iterator over the slice.
    fn peek_lines(&self) -> PeekableTokenLines;
}

impl PeekableTokenLinesExt for [Vec<LocToken>] {
    fn peek_lines(&self) -> PeekableTokenLines {
        PeekableTokenLines {
            base: self,
            offset: 0,
        }
    }
}

/// An iterator over a single line of tokens that can peek ahead without consuming.
#[derive(Debug)]
pub struct TokenLine<'buf> {
    base: &'buf [LocToken],
    offset: usize,
}

impl<'buf> TokenLine<'buf> {
    /// Create a new `TokenLine` from the given slice of tokens.
    pub fn new(base: &'buf [LocToken]) -> Self {
        Self {
            base,
            offset: 0,
        }
    }

    /// Returns true if there are no more tokens to read.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.offset >= self.base.len()
    }

    /// The indentation of this line: the column of its first token.
    #[inline(always)]
    pub fn indent(&self) -> usize {
        self.base.first().map(|t| t.location.column).unwrap_or(1)
    }

    /// Peek at the next token in the line.
    #[inline(always)]
    pub fn peek(&self) -> Option<&'buf LocToken> {
        self.base.get(self.offset)
    }

    /// Return the line's trailing `# ignore:` pragma codes, if any.
    pub fn ignore_pragma(&self) -> Option<&'buf [std::string::String]> {
        match &self.base.last()?.token {
            Token::IgnorePragma(codes) => Some(codes),
            _ => None,
        }
    }

    /// Read a command followed by a symbol from the line.
    pub fn read_cmd_sym(&mut self, require_eol: bool) -> Result<(&'buf LocToken, LocString), KconfigError> {
        let Some(cmd) = self.next() else {
            panic!("Expected keyword");
        };

        let Some(name) = self.next() else {
            return Err(KconfigError::missing(Expected::Symbol, cmd.location()));
        };

        let Some(sym) = name.token.symbol_value() else {
            return Err(KconfigError::unexpected(name, Expected::Symbol, name.location()));
        };

        if require_eol {
            self.expect_eol()?;
        }

        Ok((cmd, LocString::new(sym, name.location())))
    }

    /// Read a command followed by a string literal from the line.
    pub fn read_cmd_str_lit(&mut self, require_eol: bool) -> Result<(&'buf LocToken, LocString), KconfigError> {
        let cmd = self.next().unwrap();

        let Some(str_lit) = self.next() else {
            return Err(KconfigError::missing(Expected::StringLiteral, cmd.location()));
        };

        let Some(s) = str_lit.token.string_literal_value() else {
            return Err(KconfigError::unexpected(str_lit, Expected::StringLiteral, str_lit.location()));
        };

        if require_eol {
            self.expect_eol()?;
        }

        Ok((cmd, LocString::new(s, str_lit.location())))
    }

    /// Read an `if <expr>` guard, if present. A trailing ignore pragma reads
    /// as end-of-line.
    pub fn read_if_expr(&mut self, require_eol: bool) -> Result<Option<LocExpr>, KconfigError> {
        let Some(if_token) = self.next() else {
            return Ok(None);
        };

        if matches!(if_token.token, Token::IgnorePragma(_)) {
            return Ok(None);
        }

        if if_token.token != Token::If {
            return Err(KconfigError::unexpected(if_token, Expected::IfOrEol, if_token.location()));
        }

        let expr = LocExpr::parse(if_token.location(), self)?;

        if require_eol {
            self.expect_eol()?;
        }

        Ok(Some(expr))
    }

    /// Read the help text from a `help` block, tokenized as [`Token::Help`]
    /// followed by a [`Token::StrLit`].
    pub fn read_help(&mut self) -> Result<LocString, KconfigError> {
        let cmd = self.next().unwrap();

        if cmd.token != Token::Help {
            return Err(KconfigError::unexpected(cmd, Expected::Help, cmd.location()));
        }

        let Some(text) = self.next() else {
            return Err(KconfigError::missing(Expected::StringLiteral, cmd.location()));
        };

        let Some(s) = text.token.string_literal_value() else {
            return Err(KconfigError::unexpected(text, Expected::StringLiteral, text.location()));
        };

        self.expect_eol()?;
        Ok(LocString::new(s, text.location()))
    }

    /// Error unless the rest of the line is empty. A trailing ignore pragma
    /// does not count as content.
    pub fn expect_eol(&mut self) -> Result<(), KconfigError> {
        while let Some(token) = self.next() {
            if !matches!(token.token, Token::IgnorePragma(_)) {
                return Err(KconfigError::unexpected(token, Expected::Eol, token.location()));
            }
        }
        Ok(())
    }
}

impl<'buf> Iterator for TokenLine<'buf> {
    type Item = &'buf LocToken;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.peek()?;
        self.offset += 1;
        Some(token)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.base.len() - self.offset;
        (n, Some(n))
    }
}

impl FusedIterator for TokenLine<'_> {}

#[cfg(test)]
mod tests {
    use {
        super::{parse_stream, PeekableChars},
        crate::parser::{ParseContext, Token},
        std::{collections::HashMap, path::Path},
    };

    fn lex(input: &str) -> Vec<Vec<Token>> {
        let ctx = ParseContext::with_env(HashMap::new());
        lex_with(input, &ctx)
    }

    fn lex_with(input: &str, ctx: &ParseContext) -> Vec<Vec<Token>> {
        parse_stream(PeekableChars::new(input, Path::new("test")), ctx)
            .unwrap()
            .into_iter()
            .map(|line| line.into_iter().map(|t| t.token).collect())
            .collect()
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let lines = lex("# a comment\n\nconfig FOO\n");
        assert_eq!(lines, vec![vec![Token::Config, Token::Symbol("FOO".into())]]);
    }

    #[test]
    fn operators() {
        let lines = lex("default y if FOO && !BAR || BAZ != 3\n");
        assert_eq!(
            lines[0],
            vec![
                Token::Default,
                Token::Symbol("y".into()),
                Token::If,
                Token::Symbol("FOO".into()),
                Token::And,
                Token::Not,
                Token::Symbol("BAR".into()),
                Token::Or,
                Token::Symbol("BAZ".into()),
                Token::Ne,
                Token::IntLit(3),
            ]
        );
    }

    #[test]
    fn help_block_becomes_string() {
        let lines = lex("config FOO\n    bool \"foo\"\n    help\n        First line.\n\n        Third line.\nconfig BAR\n");
        let help = &lines[2];
        assert_eq!(help[0], Token::Help);
        assert_eq!(help[1], Token::StrLit("First line.\n\nThird line.".into()));
        assert_eq!(lines[3][0], Token::Config);
    }

    #[test]
    fn macro_lines_update_context_and_expand() {
        let ctx = ParseContext::with_env(HashMap::new());
        let lines = lex_with("WIDTH = 32\nconfig FOO\n    int \"foo\"\n    default $(WIDTH)\n", &ctx);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], vec![Token::Default, Token::IntLit(32)]);
    }

    #[test]
    fn bare_unset_expansion_is_an_error() {
        let ctx = ParseContext::with_env(HashMap::new());
        let result = parse_stream(PeekableChars::new("config FOO\n    default $(NOPE)\n", Path::new("test")), &ctx);
        assert!(result.is_err());
    }

    #[test]
    fn ignore_pragma_attaches_to_line() {
        let lines = lex("config FOO # ignore: multiple-definition\n    bool \"foo\"\n");
        assert_eq!(lines[0].last().unwrap(), &Token::IgnorePragma(vec!["multiple-definition".into()]));
    }

    #[test]
    fn line_continuation() {
        let lines = lex("config FOO\n    depends on A && \\\n        B\n");
        assert_eq!(
            lines[1],
            vec![Token::Depends, Token::On, Token::Symbol("A".into()), Token::And, Token::Symbol("B".into())]
        );
    }
}
