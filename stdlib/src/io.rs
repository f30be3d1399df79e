use std::io::Write;

use anyhow::{Context, Result};
use kelp_core::{Environment, Value, val::NativeFunction, vm::expect_arity};

use crate::{Module, str_arg};

#[derive(Debug, Default)]
pub struct IoModule;

impl IoModule {
    pub fn new() -> Self {
        Self
    }
}

impl Module for IoModule {
    fn name(&self) -> &str {
        "io"
    }

    fn description(&self) -> &str {
        "Console output and whole-file reads"
    }

    fn exports(&self) -> Vec<(&'static str, NativeFunction)> {
        vec![
            ("print", print as NativeFunction),
            ("println", println as NativeFunction),
            ("slurp", slurp as NativeFunction),
        ]
    }
}

/// Arguments joined by spaces; strings and chars print raw.
fn join_display(args: &[Value]) -> String {
    args.iter()
        .map(Value::to_plain_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn print(args: &[Value], _env: &mut Environment) -> Result<Value> {
    let mut out = std::io::stdout().lock();
    write!(out, "{}", join_display(args)).context("print: write to stdout failed")?;
    out.flush().context("print: flush failed")?;
    Ok(Value::Nil)
}

fn println(args: &[Value], _env: &mut Environment) -> Result<Value> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", join_display(args)).context("println: write to stdout failed")?;
    Ok(Value::Nil)
}

/// Whole file as a string.
fn slurp(args: &[Value], _env: &mut Environment) -> Result<Value> {
    expect_arity("slurp", args, 1)?;
    let path = str_arg("slurp", args, 0)?;
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read file '{}'", path))?;
    Ok(Value::from(text))
}
