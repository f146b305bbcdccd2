use crate::parser::{Expected, KconfigError, Located, PeekableChars, Token};

/// Parse an integer, hexadecimal, or float literal from the stream.
///
/// Decimal integers may carry a sign. Hexadecimal values start with `0x`/`0X`.
/// A decimal point turns the literal into a float.
pub fn parse_numeric_literal(chars: &mut PeekableChars) -> Result<Token, KconfigError> {
    let start = chars.location();

    let Some(c) = chars.peek() else {
        return Err(KconfigError::unexpected_eof(Expected::NumericLiteral, start));
    };

    if chars.starts_with("0x") || chars.starts_with("0X") {
        return parse_hex_literal(chars);
    }

    if c != '+' && c != '-' && !c.is_ascii_digit() {
        return Err(KconfigError::unexpected(c, Expected::NumericLiteral, start));
    }

    let mut literal = String::new();
    if c == '+' || c == '-' {
        literal.push(c);
        _ = chars.next();
    }

    let mut is_float = false;

    loop {
        let Some(c) = chars.peek() else {
            break;
        };

        if c.is_ascii_digit() {
            literal.push(c);
            _ = chars.next();
        } else if c == '.' && !is_float && chars.peek_at(1).is_some_and(|d| d.is_ascii_digit()) {
            is_float = true;
            literal.push(c);
            _ = chars.next();
        } else {
            break;
        }
    }

    if is_float {
        let value: f64 = literal.parse().map_err(|_| KconfigError::invalid_integer(&literal, start))?;
        return Ok(Token::FloatLit(value));
    }

    let value: i64 = literal.parse().map_err(|_| KconfigError::invalid_integer(&literal, start))?;
    Ok(Token::IntLit(value))
}

fn parse_hex_literal(chars: &mut PeekableChars) -> Result<Token, KconfigError> {
    let start = chars.location();

    // Skip the 0x prefix.
    _ = chars.next();
    _ = chars.next();

    let mut literal = String::new();

    loop {
        let Some(c) = chars.peek() else {
            break;
        };

        if c.is_ascii_hexdigit() {
            literal.push(c);
            _ = chars.next();
        } else {
            break;
        }
    }

    if literal.is_empty() {
        return Err(KconfigError::invalid_integer("0x", start));
    }

    let value =
        u64::from_str_radix(&literal, 16).map_err(|_| KconfigError::invalid_integer(format!("0x{literal}"), start))?;

    Ok(Token::HexLit(value))
}

#[cfg(test)]
mod tests {
    use {
        super::parse_numeric_literal,
        crate::parser::{PeekableChars, Token},
        std::path::Path,
    };

    fn lex(input: &str) -> Token {
        let mut chars = PeekableChars::new(input, Path::new("test"));
        parse_numeric_literal(&mut chars).unwrap()
    }

    #[test]
    fn decimal() {
        assert_eq!(lex("42"), Token::IntLit(42));
        assert_eq!(lex("-7 trailing"), Token::IntLit(-7));
        assert_eq!(lex("+3"), Token::IntLit(3));
    }

    #[test]
    fn hex() {
        assert_eq!(lex("0x1A"), Token::HexLit(0x1A));
        assert_eq!(lex("0Xff"), Token::HexLit(0xFF));
        assert!(parse_numeric_literal(&mut PeekableChars::new("0x", Path::new("test"))).is_err());
    }

    #[test]
    fn float() {
        assert_eq!(lex("3.25"), Token::FloatLit(3.25));
        assert_eq!(lex("-0.5"), Token::FloatLit(-0.5));
        // A bare trailing dot is not part of the literal.
        assert_eq!(lex("3."), Token::IntLit(3));
    }
}
