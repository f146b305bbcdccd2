use {
    crate::parser::{Expected, KconfigError, Located, Location, Token, TokenLine},
    log::trace,
    std::fmt::{Display, Formatter, Result as FmtResult},
};

/// An expression in the Kconfig language.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Named symbol (terminal). `y` and `n` are the tristate constants;
    /// non-uppercase names evaluate as string constants.
    Symbol(String),

    /// Hex constant (terminal).
    Hex(u64),

    /// Integer constant (terminal).
    Integer(i64),

    /// Float constant (terminal).
    Float(f64),

    /// String literal (terminal).
    String(String),

    /// Comparison expression.
    Cmp(ExprCmpOp, Box<LocExpr>, Box<LocExpr>),

    /// Unary negation.
    Not(Box<LocExpr>),

    /// Boolean AND.
    And(Box<LocExpr>, Box<LocExpr>),

    /// Boolean OR.
    Or(Box<LocExpr>, Box<LocExpr>),
}

/// Comparison operator.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExprCmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// An [`Expr`] with location information.
#[derive(Clone, Debug, PartialEq)]
pub struct LocExpr {
    /// The expression.
    pub expr: Expr,

    /// Where the expression starts.
    pub location: Location,
}

impl LocExpr {
    /// Create a new [`LocExpr`].
    #[inline(always)]
    pub fn new(expr: Expr, location: Location) -> Self {
        Self {
            expr,
            location,
        }
    }

    /// The conjunction of two optional conditions; `None` stands for `y`.
    pub fn and_opt(lhs: Option<LocExpr>, rhs: Option<LocExpr>) -> Option<LocExpr> {
        match (lhs, rhs) {
            (None, rhs) => rhs,
            (lhs, None) => lhs,
            (Some(lhs), Some(rhs)) => {
                let location = lhs.location;
                Some(LocExpr::new(Expr::And(Box::new(lhs), Box::new(rhs)), location))
            }
        }
    }

    /// Parse an expression from a token line. Stops in front of an `if` token,
    /// which introduces a trailing condition on most option lines.
    pub fn parse(prev: Location, tokens: &mut TokenLine) -> Result<Self, KconfigError> {
        let result = Self::parse_or(prev, tokens)?;

        if let Some(t) = tokens.peek() {
            if !matches!(t.token, Token::If | Token::IgnorePragma(_)) {
                return Err(KconfigError::unexpected(t, Expected::Eol, t.location()));
            }
        }

        Ok(result)
    }

    /// Parse a `depends on <expr>` line.
    pub fn parse_depends_on(tokens: &mut TokenLine) -> Result<Self, KconfigError> {
        Self::parse_dep_vis(tokens, "depends", Token::On, Expected::On)
    }

    /// Parse a `visible if <expr>` line.
    pub fn parse_visible_if(tokens: &mut TokenLine) -> Result<Self, KconfigError> {
        Self::parse_dep_vis(tokens, "visible", Token::If, Expected::If)
    }

    /// The guts of `depends on <expr>` / `visible if <expr>` parsing.
    fn parse_dep_vis(
        tokens: &mut TokenLine,
        statement: &str,
        preposition: Token,
        expected: Expected,
    ) -> Result<Self, KconfigError> {
        let Some(cmd) = tokens.next() else {
            panic!("Expected {statement} command");
        };

        let Some(prep_token) = tokens.next() else {
            return Err(KconfigError::missing(expected, cmd.location()));
        };

        if prep_token.token != preposition {
            return Err(KconfigError::unexpected(prep_token, expected, prep_token.location()));
        }

        let expr = Self::parse(prep_token.location(), tokens)?;
        tokens.expect_eol()?;

        Ok(expr)
    }

    /// Parse an OR (`||`) expression, or return the underlying AND expression.
    fn parse_or(prev: Location, tokens: &mut TokenLine) -> Result<Self, KconfigError> {
        trace!("parse_or: tokens={tokens:?}");
        let lhs = Self::parse_and(prev, tokens)?;

        let Some(op) = tokens.peek() else {
            return Ok(lhs);
        };

        if op.token != Token::Or {
            return Ok(lhs);
        }

        let op = tokens.next().unwrap();
        let location = lhs.location;
        let rhs = Self::parse_or(op.location(), tokens)?;
        Ok(LocExpr::new(Expr::Or(Box::new(lhs), Box::new(rhs)), location))
    }

    /// Parse an AND (`&&`) expression, or return the underlying comparison expression.
    fn parse_and(prev: Location, tokens: &mut TokenLine) -> Result<Self, KconfigError> {
        trace!("parse_and: tokens={tokens:?}");
        let lhs = Self::parse_comparison(prev, tokens)?;

        let Some(op) = tokens.peek() else {
            return Ok(lhs);
        };

        if op.token != Token::And {
            return Ok(lhs);
        }

        let op = tokens.next().unwrap();
        let location = lhs.location;
        let rhs = Self::parse_and(op.location(), tokens)?;
        Ok(LocExpr::new(Expr::And(Box::new(lhs), Box::new(rhs)), location))
    }

    /// Parse a comparison, or return the underlying unary-not expression.
    ///
    /// Comparisons are non-associative: both operands are unary terms, so
    /// `A = B = C` is rejected rather than parsed as `A = (B = C)`.
    fn parse_comparison(prev: Location, tokens: &mut TokenLine) -> Result<Self, KconfigError> {
        trace!("parse_comparison: tokens={tokens:?}");
        let lhs = Self::parse_unary_not(prev, tokens)?;

        let Some(op) = tokens.peek() else {
            return Ok(lhs);
        };

        let cmp = match op.token {
            Token::Eq => ExprCmpOp::Eq,
            Token::Ne => ExprCmpOp::Ne,
            Token::Lt => ExprCmpOp::Lt,
            Token::Le => ExprCmpOp::Le,
            Token::Gt => ExprCmpOp::Gt,
            Token::Ge => ExprCmpOp::Ge,
            _ => return Ok(lhs),
        };

        let op = tokens.next().unwrap();
        let rhs = Self::parse_unary_not(op.location(), tokens)?;
        let location = lhs.location;

        Ok(LocExpr::new(Expr::Cmp(cmp, Box::new(lhs), Box::new(rhs)), location))
    }

    /// Parse a unary not expression, or return the underlying terminal expression.
    fn parse_unary_not(prev: Location, tokens: &mut TokenLine) -> Result<Self, KconfigError> {
        trace!("parse_unary_not: tokens={tokens:?}");

        let Some(token) = tokens.peek() else {
            return Err(KconfigError::missing(Expected::Expr, prev));
        };

        match token.token {
            Token::Not => {
                let location = token.location();
                _ = tokens.next();
                let expr = Self::parse_unary_not(location, tokens)?;
                Ok(LocExpr::new(Expr::Not(Box::new(expr)), location))
            }
            _ => Self::parse_terminal(prev, tokens),
        }
    }

    /// Parse a terminal or an expression in parentheses.
    fn parse_terminal(prev: Location, tokens: &mut TokenLine) -> Result<Self, KconfigError> {
        trace!("parse_terminal: tokens={tokens:?}");

        let Some(token) = tokens.peek() else {
            return Err(KconfigError::missing(Expected::Expr, prev));
        };

        let location = token.location();

        let expr = match &token.token {
            Token::Symbol(s) => Expr::Symbol(s.clone()),
            Token::HexLit(h) => Expr::Hex(*h),
            Token::IntLit(i) => Expr::Integer(*i),
            Token::FloatLit(x) => Expr::Float(*x),
            Token::StrLit(s) => Expr::String(s.clone()),
            Token::LParen => return Self::parse_paren(prev, tokens),
            _ => return Err(KconfigError::unexpected(token, Expected::Expr, location)),
        };

        _ = tokens.next();
        Ok(LocExpr::new(expr, location))
    }

    /// Parse an expression in parentheses.
    fn parse_paren(prev: Location, tokens: &mut TokenLine) -> Result<Self, KconfigError> {
        let Some(lparen) = tokens.next() else {
            return Err(KconfigError::missing(Expected::Expr, prev));
        };

        if lparen.token != Token::LParen {
            return Err(KconfigError::unexpected(lparen, Expected::Expr, lparen.location()));
        }

        let result = Self::parse_or(lparen.location(), tokens)?;

        let Some(rparen) = tokens.next() else {
            return Err(KconfigError::missing(Expected::RParen, lparen.location()));
        };

        if rparen.token != Token::RParen {
            return Err(KconfigError::unexpected(rparen, Expected::RParen, rparen.location()));
        }

        Ok(result)
    }

    /// Call `visit` on every symbol name referenced by this expression.
    pub fn visit_symbols(&self, visit: &mut impl FnMut(&str)) {
        match &self.expr {
            Expr::Symbol(name) => visit(name),
            Expr::Cmp(_, lhs, rhs) | Expr::And(lhs, rhs) | Expr::Or(lhs, rhs) => {
                lhs.visit_symbols(visit);
                rhs.visit_symbols(visit);
            }
            Expr::Not(inner) => inner.visit_symbols(visit),
            Expr::Hex(_) | Expr::Integer(_) | Expr::Float(_) | Expr::String(_) => {}
        }
    }
}

impl Located for LocExpr {
    #[inline(always)]
    fn location(&self) -> Location {
        self.location
    }
}

impl Display for LocExpr {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        Display::fmt(&self.expr, f)
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Symbol(s) => f.write_str(s),
            Self::Hex(h) => write!(f, "0x{h:X}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Cmp(op, lhs, rhs) => write!(f, "{} {op} {}", paren_cmp(lhs), paren_cmp(rhs)),
            Self::Not(e) => match e.expr {
                Self::Cmp(..) | Self::And(..) | Self::Or(..) => write!(f, "!({})", e),
                _ => write!(f, "!{}", e),
            },
            Self::And(lhs, rhs) => write!(f, "{} && {}", paren_or(lhs), paren_or(rhs)),
            Self::Or(lhs, rhs) => write!(f, "{} || {}", lhs, rhs),
        }
    }
}

fn paren_cmp(e: &LocExpr) -> String {
    match e.expr {
        Expr::And(..) | Expr::Or(..) => format!("({})", e),
        _ => format!("{}", e),
    }
}

fn paren_or(e: &LocExpr) -> String {
    match e.expr {
        Expr::Or(..) => format!("({})", e),
        _ => format!("{}", e),
    }
}

impl Display for ExprCmpOp {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Eq => f.write_str("="),
            Self::Ne => f.write_str("!="),
            Self::Lt => f.write_str("<"),
            Self::Le => f.write_str("<="),
            Self::Gt => f.write_str(">"),
            Self::Ge => f.write_str(">="),
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::{Expr, LocExpr},
        crate::parser::{LocToken, Location, Token, TokenLine},
    };

    fn tokens(toks: &[Token]) -> Vec<LocToken> {
        toks.iter()
            .enumerate()
            .map(|(i, t)| LocToken::new(t.clone(), Location::new("test", 1, i * 4 + 1)))
            .collect()
    }

    fn parse(toks: &[Token]) -> LocExpr {
        let line = tokens(toks);
        let mut line = TokenLine::new(&line);
        LocExpr::parse(Location::new("test", 1, 1), &mut line).unwrap()
    }

    #[test]
    fn precedence_and_binds_tighter_than_or() {
        let sym = |s: &str| Token::Symbol(s.to_string());
        let expr = parse(&[sym("A"), Token::Or, sym("B"), Token::And, sym("C")]);
        let Expr::Or(lhs, rhs) = expr.expr else {
            panic!("expected Or at the top: {expr:?}");
        };
        assert_eq!(lhs.expr, Expr::Symbol("A".into()));
        assert!(matches!(rhs.expr, Expr::And(..)));
    }

    #[test]
    fn comparison_binds_tighter_than_and() {
        let sym = |s: &str| Token::Symbol(s.to_string());
        let expr = parse(&[sym("A"), Token::Eq, sym("B"), Token::And, sym("C")]);
        let Expr::And(lhs, rhs) = expr.expr else {
            panic!("expected And at the top: {expr:?}");
        };
        assert!(matches!(lhs.expr, Expr::Cmp(..)));
        assert_eq!(rhs.expr, Expr::Symbol("C".into()));
    }

    #[test]
    fn comparison_is_non_associative() {
        let sym = |s: &str| Token::Symbol(s.to_string());
        let line = tokens(&[sym("A"), Token::Eq, sym("B"), Token::Eq, sym("C")]);
        let mut line = TokenLine::new(&line);
        assert!(LocExpr::parse(Location::new("test", 1, 1), &mut line).is_err());
    }

    #[test]
    fn display_round_trip_shape() {
        let sym = |s: &str| Token::Symbol(s.to_string());
        let expr = parse(&[
            Token::Not,
            Token::LParen,
            sym("A"),
            Token::Or,
            sym("B"),
            Token::RParen,
            Token::And,
            sym("C"),
            Token::Ge,
            Token::IntLit(2),
        ]);
        assert_eq!(expr.to_string(), "!(A || B) && C >= 2");
    }
}
