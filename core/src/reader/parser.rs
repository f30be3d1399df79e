use std::sync::Arc;

use crate::val::{OrderedHash, Value};
use crate::vm::SymbolTable;

use super::error::{ParseError, Span};
use super::lexer::Token;

type Result<T> = std::result::Result<T, ParseError>;

/// Builds value trees from a token stream.
pub struct Parser<'a> {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    symbols: &'a SymbolTable,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<(Token, Span)>, symbols: &'a SymbolTable) -> Self {
        Self { tokens, pos: 0, symbols }
    }

    pub fn parse_all(&mut self) -> Result<Vec<Value>> {
        let mut forms = Vec::new();
        while self.pos < self.tokens.len() {
            forms.push(self.parse_form()?);
        }
        Ok(forms)
    }

    fn next(&mut self) -> Option<(Token, Span)> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn last_span(&self) -> Option<Span> {
        self.tokens.last().map(|(_, span)| *span)
    }

    fn unexpected_end(&self, what: &str) -> ParseError {
        let msg = format!("Unexpected end of input, {} not closed", what);
        match self.last_span() {
            Some(span) => ParseError::with_span(msg, Span::at(span.end)),
            None => ParseError::new(msg),
        }
    }

    fn parse_form(&mut self) -> Result<Value> {
        let Some((token, span)) = self.next() else {
            return Err(self.unexpected_end("form"));
        };
        let value = match token {
            Token::LParen => Value::list(self.parse_seq(Token::RParen, "list", span)?),
            Token::LBracket => Value::array(self.parse_seq(Token::RBracket, "array", span)?),
            Token::LBrace => {
                let items = self.parse_seq(Token::RBrace, "hash", span)?;
                if items.len() % 2 != 0 {
                    return Err(ParseError::with_span("Hash literal needs an even number of forms", span));
                }
                let mut map = OrderedHash::with_capacity(items.len() / 2);
                for kv in items.chunks_exact(2) {
                    map.insert(kv[0].clone(), kv[1].clone())
                        .map_err(|e| ParseError::with_span(e.to_string(), span))?;
                }
                Value::hash(map)
            }
            Token::RParen | Token::RBracket | Token::RBrace => {
                return Err(ParseError::with_span("Unbalanced closing delimiter", span));
            }
            Token::Quote => self.wrap("quote")?,
            Token::SyntaxQuote => self.wrap("syntax-quote")?,
            Token::Unquote => self.wrap("unquote")?,
            Token::UnquoteSplice => self.wrap("unquote-splicing")?,
            Token::Str(s) => Value::Str(Arc::from(s)),
            Token::Bytes(b) => Value::Bytes(Arc::new(b)),
            Token::Int(n) => Value::Int(n),
            Token::Float(f) => Value::Float(f),
            Token::Char(c) => Value::Char(c),
            Token::Bool(b) => Value::Bool(b),
            Token::Nil => Value::Nil,
            Token::Sym(name) => Value::Symbol(self.symbols.intern(&name)),
        };
        Ok(value)
    }

    /// `'x` and friends read as `(quote x)`.
    fn wrap(&mut self, head: &str) -> Result<Value> {
        let inner = self.parse_form()?;
        Ok(Value::list([Value::Symbol(self.symbols.intern(head)), inner]))
    }

    fn parse_seq(&mut self, close: Token, what: &str, open: Span) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        loop {
            match self.tokens.get(self.pos) {
                None => {
                    let mut err = self.unexpected_end(what);
                    err.message.push_str(&format!(" (opened at {})", open.start));
                    return Err(err);
                }
                Some((token, _)) if *token == close => {
                    self.pos += 1;
                    return Ok(items);
                }
                Some(_) => items.push(self.parse_form()?),
            }
        }
    }
}
