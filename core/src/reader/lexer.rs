use num_bigint::BigInt;
use num_traits::Num;

use super::error::{ParseError, Position, Span};

type Result<T> = std::result::Result<T, ParseError>;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Quote,         // '
    SyntaxQuote,   // `
    Unquote,       // ~
    UnquoteSplice, // ~@
    Str(String),
    Bytes(Vec<u8>),
    Int(BigInt),
    Float(f64),
    Char(char),
    Bool(bool),
    Nil,
    Sym(String),
}

const ASCII_WHITESPACE: u8 = 1 << 0;
const ASCII_DIGIT: u8 = 1 << 1;
const ASCII_DELIM: u8 = 1 << 2;

const fn build_ascii_class() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let c = i as u8;
        // Commas read as whitespace.
        if matches!(c, b' ' | b'\t' | b'\n' | b'\r' | 0x0B | 0x0C | b',') {
            table[i] |= ASCII_WHITESPACE | ASCII_DELIM;
        }
        if c >= b'0' && c <= b'9' {
            table[i] |= ASCII_DIGIT;
        }
        if matches!(c, b'(' | b')' | b'[' | b']' | b'{' | b'}' | b'"' | b';') {
            table[i] |= ASCII_DELIM;
        }
        i += 1;
    }
    table
}

const ASCII_CLASS: [u8; 256] = build_ascii_class();

#[inline]
fn ascii_flags(c: char) -> u8 {
    if c.is_ascii() { ASCII_CLASS[c as usize] } else { 0 }
}

#[inline]
fn is_space_char(c: char) -> bool {
    let flags = ascii_flags(c);
    if flags != 0 {
        flags & ASCII_WHITESPACE != 0
    } else {
        c.is_whitespace()
    }
}

#[inline]
fn is_delimiter(c: char) -> bool {
    let flags = ascii_flags(c);
    if flags != 0 {
        flags & ASCII_DELIM != 0
    } else {
        c.is_whitespace()
    }
}

#[inline]
fn is_digit(c: char) -> bool {
    ascii_flags(c) & ASCII_DIGIT != 0
}

/// Turns source text into tokens paired with their spans.
pub struct Tokenizer<'a> {
    chars: Vec<char>,
    idx: usize,
    len: usize,
    tokens: Vec<(Token, Span)>,
    line: u32,
    column: u32,
    input: &'a str,
}

impl<'a> Tokenizer<'a> {
    pub fn tokenize(input: &'a str) -> Result<Vec<(Token, Span)>> {
        let chars: Vec<char> = input.chars().collect();
        let mut t = Tokenizer {
            len: chars.len(),
            chars,
            idx: 0,
            tokens: Vec::with_capacity(input.len() / 3),
            line: 1,
            column: 1,
            input,
        };
        t.run()?;
        Ok(t.tokens)
    }

    fn current_position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn eof(&self) -> bool {
        self.idx >= self.len
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.idx + ahead).copied()
    }

    fn advance_char(&mut self) {
        if !self.eof() && self.chars[self.idx] == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.idx += 1;
    }

    /// Error at the cursor, quoting the offending source line.
    fn err<T: AsRef<str>>(&self, msg: T) -> ParseError {
        let line = self
            .input
            .lines()
            .nth((self.line as usize).saturating_sub(1))
            .unwrap_or_default();
        let near = match self.peek() {
            Some(c) => format!("near '{}'", c),
            None => "at end of input".to_string(),
        };
        ParseError::with_position(
            format!("{} ({}): {}", msg.as_ref(), near, line.trim_end()),
            self.current_position(),
        )
    }

    fn push(&mut self, token: Token, start: Position) {
        let span = Span::new(start, self.current_position());
        self.tokens.push((token, span));
    }

    fn single(&mut self, token: Token) {
        let start = self.current_position();
        self.advance_char();
        self.push(token, start);
    }

    fn run(&mut self) -> Result<()> {
        while !self.eof() {
            let c = self.chars[self.idx];
            if is_space_char(c) {
                self.advance_char();
                continue;
            }
            match c {
                ';' => self.skip_line_comment(),
                '(' => self.single(Token::LParen),
                ')' => self.single(Token::RParen),
                '[' => self.single(Token::LBracket),
                ']' => self.single(Token::RBracket),
                '{' => self.single(Token::LBrace),
                '}' => self.single(Token::RBrace),
                '\'' => self.single(Token::Quote),
                '`' => self.single(Token::SyntaxQuote),
                '~' => {
                    let start = self.current_position();
                    self.advance_char();
                    if self.peek() == Some('@') {
                        self.advance_char();
                        self.push(Token::UnquoteSplice, start);
                    } else {
                        self.push(Token::Unquote, start);
                    }
                }
                '"' => {
                    let start = self.current_position();
                    let bytes = self.parse_quoted()?;
                    let text = String::from_utf8(bytes).map_err(|_| self.err("String is not valid UTF-8"))?;
                    self.push(Token::Str(text), start);
                }
                'b' if self.peek_at(1) == Some('"') => {
                    let start = self.current_position();
                    self.advance_char();
                    let bytes = self.parse_quoted()?;
                    self.push(Token::Bytes(bytes), start);
                }
                '#' if self.peek_at(1) == Some('\\') => self.parse_char()?,
                _ => self.parse_atom()?,
            }
        }
        Ok(())
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            self.advance_char();
            if c == '\n' {
                break;
            }
        }
    }

    /// Body of a `"..."` literal starting at the opening quote, as raw bytes.
    fn parse_quoted(&mut self) -> Result<Vec<u8>> {
        self.advance_char(); // opening quote
        let mut out = Vec::new();
        let mut buf = [0u8; 4];
        while let Some(c) = self.peek() {
            match c {
                '"' => {
                    self.advance_char();
                    return Ok(out);
                }
                '\\' => {
                    self.advance_char();
                    let Some(esc) = self.peek() else {
                        break;
                    };
                    match esc {
                        'n' => out.push(b'\n'),
                        't' => out.push(b'\t'),
                        'r' => out.push(b'\r'),
                        '0' => out.push(0),
                        '"' => out.push(b'"'),
                        '\\' => out.push(b'\\'),
                        'x' => {
                            let hi = self.peek_at(1).and_then(|d| d.to_digit(16));
                            let lo = self.peek_at(2).and_then(|d| d.to_digit(16));
                            let (Some(hi), Some(lo)) = (hi, lo) else {
                                return Err(self.err("Invalid \\x escape, expected two hex digits"));
                            };
                            out.push((hi * 16 + lo) as u8);
                            self.advance_char();
                            self.advance_char();
                        }
                        other => return Err(self.err(format!("Unknown escape sequence '\\{}'", other))),
                    }
                    self.advance_char();
                }
                _ => {
                    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    self.advance_char();
                }
            }
        }
        Err(self.err("String not closed"))
    }

    fn parse_char(&mut self) -> Result<()> {
        let start = self.current_position();
        self.advance_char(); // '#'
        self.advance_char(); // '\'
        let Some(first) = self.peek() else {
            return Err(self.err("Character literal missing its character"));
        };
        self.advance_char();
        let mut name = String::from(first);
        while let Some(c) = self.peek() {
            if is_delimiter(c) {
                break;
            }
            name.push(c);
            self.advance_char();
        }
        let ch = if name.chars().count() == 1 {
            first
        } else {
            match name.as_str() {
                "space" => ' ',
                "newline" => '\n',
                "tab" => '\t',
                "return" => '\r',
                "nul" => '\0',
                _ => return Err(self.err(format!("Unknown character name '{}'", name))),
            }
        };
        self.push(Token::Char(ch), start);
        Ok(())
    }

    fn parse_atom(&mut self) -> Result<()> {
        let start = self.current_position();
        let from = self.idx;
        while let Some(c) = self.peek() {
            if is_delimiter(c) {
                break;
            }
            self.advance_char();
        }
        if self.idx == from {
            return Err(self.err("Unexpected character"));
        }
        let text: String = self.chars[from..self.idx].iter().collect();
        let token = match text.as_str() {
            "true" => Token::Bool(true),
            "false" => Token::Bool(false),
            "nil" => Token::Nil,
            _ if looks_numeric(&text) => parse_number(&text).ok_or_else(|| {
                ParseError::with_span(format!("Invalid number literal '{}'", text), Span::new(start, self.current_position()))
            })?,
            _ => Token::Sym(text),
        };
        self.push(token, start);
        Ok(())
    }
}

/// Digit first, or a sign or dot followed by a digit.
fn looks_numeric(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if is_digit(c) => true,
        Some('+' | '-' | '.') => chars.next().is_some_and(is_digit),
        _ => false,
    }
}

fn parse_number(text: &str) -> Option<Token> {
    let (negative, body) = match text.as_bytes()[0] {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let int = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        Some(BigInt::from_str_radix(hex, 16).ok()?)
    } else if body.bytes().all(|b| b.is_ascii_digit()) {
        Some(BigInt::from_str_radix(body, 10).ok()?)
    } else {
        None
    };
    match int {
        Some(n) => Some(Token::Int(if negative { -n } else { n })),
        None => text.parse::<f64>().ok().map(Token::Float),
    }
}
