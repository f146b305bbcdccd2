use {
    crate::parser::Kind,
    std::fmt::{Display, Formatter, Result as FmtResult},
};

/// A typed symbol value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// `y` or `n`.
    Bool(bool),

    /// Signed decimal integer.
    Int(i64),

    /// Unsigned hexadecimal value.
    Hex(u64),

    /// UTF-8 string.
    Str(String),

    /// Floating-point value.
    Float(f64),
}

impl Value {
    /// The kind this value belongs to.
    pub fn kind(&self) -> Kind {
        match self {
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Hex(_) => Kind::Hex,
            Value::Str(_) => Kind::String,
            Value::Float(_) => Kind::Float,
        }
    }

    /// The zero value of a kind: n, 0, 0x0, "", 0.0.
    pub fn zero(kind: Kind) -> Value {
        match kind {
            Kind::Bool => Value::Bool(false),
            Kind::Int => Value::Int(0),
            Kind::Hex => Value::Hex(0),
            Kind::Float => Value::Float(0.0),
            Kind::String | Kind::Unknown => Value::Str(String::new()),
        }
    }

    /// The truth value in a boolean context. Non-bool values are n.
    pub fn truth(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    /// The value as a number, for comparisons: y=2, n=0 for bools (the legacy
    /// tristate encoding), parsed numerics otherwise. Unparseable strings
    /// compare as 0, as C's strtoll would give.
    pub fn numeric(&self) -> f64 {
        match self {
            Value::Bool(true) => 2.0,
            Value::Bool(false) => 0.0,
            Value::Int(i) => *i as f64,
            Value::Hex(h) => *h as f64,
            Value::Float(x) => *x,
            Value::Str(s) => parse_numeric_str(s),
        }
    }

    /// Coerce this value into the given kind, when its form allows it.
    pub fn coerce(&self, kind: Kind) -> Option<Value> {
        if self.kind() == kind || kind == Kind::Unknown {
            return Some(self.clone());
        }

        match (self, kind) {
            (Value::Str(s), Kind::Bool) => match s.as_str() {
                "y" => Some(Value::Bool(true)),
                "n" => Some(Value::Bool(false)),
                _ => None,
            },
            (Value::Str(s), Kind::Int) => s.trim().parse().ok().map(Value::Int),
            (Value::Str(s), Kind::Hex) => {
                let digits = s.trim();
                let digits = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")).unwrap_or(digits);
                u64::from_str_radix(digits, 16).ok().map(Value::Hex)
            }
            (Value::Str(s), Kind::Float) => s.trim().parse().ok().map(Value::Float),
            (Value::Int(i), Kind::Hex) if *i >= 0 => Some(Value::Hex(*i as u64)),
            (Value::Int(i), Kind::Float) => Some(Value::Float(*i as f64)),
            (Value::Hex(h), Kind::Int) => i64::try_from(*h).ok().map(Value::Int),
            (Value::Hex(h), Kind::Float) => Some(Value::Float(*h as f64)),
            (_, Kind::String) => Some(Value::Str(self.to_string())),
            _ => None,
        }
    }
}

fn parse_numeric_str(s: &str) -> f64 {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map(|v| v as f64).unwrap_or(0.0);
    }
    s.parse().unwrap_or(0.0)
}

impl Display for Value {
    /// The canonical string form: bools as `y`/`n`, hex as `0x` + uppercase.
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Value::Bool(true) => f.write_str("y"),
            Value::Bool(false) => f.write_str("n"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Hex(h) => write!(f, "0x{h:X}"),
            Value::Str(s) => f.write_str(s),
            Value::Float(x) => write!(f, "{x}"),
        }
    }
}

/// Escape a string for a `CONFIG_X="..."` record: `"` and `\` get backslashes.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Undo [`escape`].
pub fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use {
        super::{escape, unescape, Value},
        crate::parser::Kind,
    };

    #[test]
    fn display_forms() {
        assert_eq!(Value::Bool(true).to_string(), "y");
        assert_eq!(Value::Bool(false).to_string(), "n");
        assert_eq!(Value::Hex(0x1a).to_string(), "0x1A");
        assert_eq!(Value::Int(-3).to_string(), "-3");
        assert_eq!(Value::Float(0.5).to_string(), "0.5");
    }

    #[test]
    fn coercions() {
        assert_eq!(Value::Str("y".into()).coerce(Kind::Bool), Some(Value::Bool(true)));
        assert_eq!(Value::Str("0x1F".into()).coerce(Kind::Hex), Some(Value::Hex(0x1F)));
        assert_eq!(Value::Str("12".into()).coerce(Kind::Int), Some(Value::Int(12)));
        assert_eq!(Value::Str("oops".into()).coerce(Kind::Int), None);
        assert_eq!(Value::Int(3).coerce(Kind::Float), Some(Value::Float(3.0)));
    }

    #[test]
    fn numeric_encoding() {
        assert_eq!(Value::Bool(true).numeric(), 2.0);
        assert_eq!(Value::Bool(false).numeric(), 0.0);
        assert_eq!(Value::Str("0x10".into()).numeric(), 16.0);
        assert_eq!(Value::Str("junk".into()).numeric(), 0.0);
    }

    #[test]
    fn escape_round_trip() {
        let original = r#"path "quoted" with \ backslash"#;
        assert_eq!(unescape(&escape(original)), original);
    }
}
