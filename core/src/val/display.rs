use std::fmt::{self, Write as _};

use super::{FunctionBody, Value};

fn write_char_literal(f: &mut fmt::Formatter<'_>, c: char) -> fmt::Result {
    match c {
        ' ' => f.write_str("#\\space"),
        '\n' => f.write_str("#\\newline"),
        '\t' => f.write_str("#\\tab"),
        '\r' => f.write_str("#\\return"),
        other => write!(f, "#\\{}", other),
    }
}

fn write_escaped_str(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            '\0' => f.write_str("\\0")?,
            other => f.write_char(other)?,
        }
    }
    f.write_char('"')
}

fn write_bytes(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    f.write_str("b\"")?;
    for &b in bytes {
        match b {
            b'"' => f.write_str("\\\"")?,
            b'\\' => f.write_str("\\\\")?,
            0x20..=0x7e => f.write_char(b as char)?,
            _ => write!(f, "\\x{:02x}", b)?,
        }
    }
    f.write_char('"')
}

fn write_float(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    if x.is_finite() {
        let mut buf = ryu::Buffer::new();
        f.write_str(buf.format_finite(x))
    } else if x.is_nan() {
        f.write_str("NaN")
    } else if x > 0.0 {
        f.write_str("+Inf")
    } else {
        f.write_str("-Inf")
    }
}

impl fmt::Display for Value {
    /// Canonical textual form, readable back by the reader for data kinds.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::End => f.write_str("%end"),
            Value::Marker => f.write_str("%marker"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Char(c) => write_char_literal(f, *c),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write_float(f, *x),
            Value::Str(s) => write_escaped_str(f, s),
            Value::Bytes(b) => write_bytes(f, b),
            Value::Symbol(sym) => f.write_str(sym.name()),
            Value::Pair(_) => {
                f.write_char('(')?;
                let mut cur = self;
                let mut first = true;
                loop {
                    match cur {
                        Value::Pair(p) => {
                            if !first {
                                f.write_char(' ')?;
                            }
                            write!(f, "{}", p.head)?;
                            first = false;
                            cur = &p.tail;
                        }
                        Value::Nil => break,
                        tail => {
                            write!(f, " . {}", tail)?;
                            break;
                        }
                    }
                }
                f.write_char(')')
            }
            Value::Array(items) => {
                f.write_char('[')?;
                for (i, item) in items.read().unwrap().iter().enumerate() {
                    if i > 0 {
                        f.write_char(' ')?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_char(']')
            }
            Value::Hash(map) => {
                f.write_char('{')?;
                for (i, (k, v)) in map.read().unwrap().iter().enumerate() {
                    if i > 0 {
                        f.write_char(' ')?;
                    }
                    write!(f, "{} {}", k, v)?;
                }
                f.write_char('}')
            }
            Value::Function(func) => match func.body {
                FunctionBody::Script(_) => write!(f, "<fn {}>", func.name),
                FunctionBody::Native(_) => write!(f, "<native fn {}>", func.name),
            },
            Value::Channel(ch) => write!(f, "<chan {}>", ch.id()),
        }
    }
}

impl Value {
    /// Display form without quoting: strings and chars come out raw.
    pub fn to_plain_string(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            Value::Char(c) => c.to_string(),
            other => other.to_string(),
        }
    }
}
