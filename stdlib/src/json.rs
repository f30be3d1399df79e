use anyhow::{Context, Result};
use kelp_core::{
    Environment, Value,
    val::{NativeFunction, to_json},
    vm::expect_arity,
};

use crate::{Module, str_arg};

#[derive(Debug, Default)]
pub struct JsonModule;

impl JsonModule {
    pub fn new() -> Self {
        Self
    }
}

impl Module for JsonModule {
    fn name(&self) -> &str {
        "json"
    }

    fn exports(&self) -> Vec<(&'static str, NativeFunction)> {
        vec![("json/encode", encode as NativeFunction), ("json/decode", decode as NativeFunction)]
    }
}

fn encode(args: &[Value], _env: &mut Environment) -> Result<Value> {
    expect_arity("json/encode", args, 1)?;
    Ok(Value::from(to_json(&args[0])?))
}

fn decode(args: &[Value], _env: &mut Environment) -> Result<Value> {
    expect_arity("json/decode", args, 1)?;
    let text = str_arg("json/decode", args, 0)?;
    let json: serde_json::Value = serde_json::from_str(text).context("json/decode: invalid JSON")?;
    Value::from_json(json)
}
