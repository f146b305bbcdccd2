use crate::parser::{Expected, KconfigError, Located, ParseContext, PeekableChars};

/// Parse a string literal from the stream.
///
/// The stream must be positioned at the opening quote, which may be `"` or
/// `'`. The other quote kind may appear freely inside the literal; the
/// delimiting kind must be escaped. `$(NAME)` expansions are resolved when
/// `expand` is true; an unset name expands to the empty string (the quoted
/// context is forgiving, unlike bare expansions).
pub fn parse_string_literal(
    chars: &mut PeekableChars,
    ctx: &ParseContext,
    expand: bool,
) -> Result<String, KconfigError> {
    let start = chars.location();

    let Some(quote) = chars.next() else {
        return Err(KconfigError::unexpected_eof(Expected::StringLiteral, start));
    };

    if quote != '"' && quote != '\'' {
        return Err(KconfigError::unexpected(quote, Expected::StringLiteral, start));
    }

    let mut value = String::new();

    loop {
        let Some(c) = chars.next() else {
            return Err(KconfigError::unterminated_string(start));
        };

        match c {
            c if c == quote => return Ok(value),
            '\n' => return Err(KconfigError::unterminated_string(start)),
            '\\' => parse_escape(chars, &mut value)?,
            '$' if expand && chars.peek() == Some('(') => {
                _ = chars.next();
                let name_loc = chars.location();
                let name = read_expansion_name(chars, name_loc)?;
                if let Some(expansion) = ctx.expand(&name) {
                    value.push_str(&expansion);
                }
            }
            c => value.push(c),
        }
    }
}

/// Parse one escape sequence. The leading backslash has already been consumed;
/// the escaped character (or its expansion) is appended to `out`.
pub fn parse_escape(chars: &mut PeekableChars, out: &mut String) -> Result<(), KconfigError> {
    let loc = chars.location();
    let Some(c) = chars.next() else {
        return Err(KconfigError::unexpected_eof(Expected::Any, loc));
    };

    match c {
        'n' => out.push('\n'),
        'r' => out.push('\r'),
        't' => out.push('\t'),
        '\\' | '"' | '\'' => out.push(c),
        // Unknown escapes keep the backslash, as the C tools do.
        c => {
            out.push('\\');
            out.push(c);
        }
    }

    Ok(())
}

/// Read the `NAME)` part of a `$(NAME)` expansion; the `$(` has been consumed.
pub(crate) fn read_expansion_name(
    chars: &mut PeekableChars,
    start: crate::parser::Location,
) -> Result<String, KconfigError> {
    let mut name = String::new();

    loop {
        let Some(c) = chars.next() else {
            return Err(KconfigError::unexpected_eof(')', start));
        };

        match c {
            ')' => break,
            c if c.is_ascii_alphanumeric() || c == '_' => name.push(c),
            c => return Err(KconfigError::unexpected(c, ')', start)),
        }
    }

    if name.is_empty() {
        return Err(KconfigError::missing(Expected::Symbol, start));
    }

    Ok(name)
}

#[cfg(test)]
mod tests {
    use {
        super::parse_string_literal,
        crate::parser::{ParseContext, PeekableChars},
        std::{collections::HashMap, path::Path},
    };

    fn parse(input: &str, ctx: &ParseContext) -> Result<String, crate::parser::KconfigError> {
        let mut chars = PeekableChars::new(input, Path::new("test"));
        parse_string_literal(&mut chars, ctx, true)
    }

    #[test]
    fn plain_and_escaped() {
        let ctx = ParseContext::with_env(HashMap::new());
        assert_eq!(parse(r#""Hello, world!""#, &ctx).unwrap(), "Hello, world!");
        assert_eq!(parse(r#""with \"escapes\" and \\""#, &ctx).unwrap(), r#"with "escapes" and \"#);
        assert_eq!(parse(r#""tab\there""#, &ctx).unwrap(), "tab\there");
    }

    #[test]
    fn nested_other_quote_kind() {
        let ctx = ParseContext::with_env(HashMap::new());
        assert_eq!(parse(r#""it's fine""#, &ctx).unwrap(), "it's fine");
        assert_eq!(parse(r#"'say "hi"'"#, &ctx).unwrap(), r#"say "hi""#);
    }

    #[test]
    fn unterminated() {
        let ctx = ParseContext::with_env(HashMap::new());
        assert!(parse(r#""never closed"#, &ctx).is_err());
    }

    #[test]
    fn quoted_expansion_of_unset_name_is_empty() {
        let mut env = HashMap::new();
        env.insert("SET".to_string(), "value".to_string());
        let ctx = ParseContext::with_env(env);
        assert_eq!(parse(r#""$(SET)/x""#, &ctx).unwrap(), "value/x");
        assert_eq!(parse(r#""$(UNSET)/x""#, &ctx).unwrap(), "/x");
    }
}
