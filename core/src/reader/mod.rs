//! Text to value trees: a tokenizer feeding a recursive-descent parser.

mod error;
mod lexer;
mod parser;

pub use error::{ParseError, Position, Span};
pub use lexer::{Token, Tokenizer};
pub use parser::Parser;

use anyhow::Result;

use crate::val::Value;
use crate::vm::SymbolTable;


/// Parse every top-level form in `src`, interning symbols into `symbols`.
pub fn read_all(src: &str, symbols: &SymbolTable) -> Result<Vec<Value>> {
    let tokens = Tokenizer::tokenize(src)?;
    let forms = Parser::new(tokens, symbols).parse_all()?;
    Ok(forms)
}

/// Parse exactly one form; trailing input is an error.
pub fn read_one(src: &str, symbols: &SymbolTable) -> Result<Value> {
    let mut forms = read_all(src, symbols)?;
    match forms.len() {
        1 => Ok(forms.remove(0)),
        0 => Err(ParseError::new("Expected a form, found empty input").into()),
        n => Err(ParseError::new(format!("Expected one form, found {}", n)).into()),
    }
}
