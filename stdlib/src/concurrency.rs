//! Thread-backed `go` plus channels.
//!
//! `go` runs a function on a new OS thread inside a duplicate of the calling
//! environment: fresh stacks over the same globals, builtins and macros.
//! Channels are the only synchronization scripts get.

use std::sync::Arc;

use anyhow::Result;
use kelp_core::{
    Environment, Value, VmError,
    val::{Channel, NativeFunction},
    vm::{expect_arity, expect_min_arity},
};
use tracing::{debug, warn};

use crate::{Module, index_arg};

#[derive(Debug, Default)]
pub struct ConcurrencyModule;

impl ConcurrencyModule {
    pub fn new() -> Self {
        Self
    }
}

impl Module for ConcurrencyModule {
    fn name(&self) -> &str {
        "concurrency"
    }

    fn description(&self) -> &str {
        "go and channels"
    }

    fn exports(&self) -> Vec<(&'static str, NativeFunction)> {
        vec![
            ("go", go as NativeFunction),
            ("make-chan", make_chan as NativeFunction),
            ("send!", send as NativeFunction),
            ("recv!", recv as NativeFunction),
            ("close!", close as NativeFunction),
        ]
    }
}

fn channel_arg<'a>(name: &str, args: &'a [Value]) -> Result<&'a Arc<Channel>> {
    match &args[0] {
        Value::Channel(ch) => Ok(ch),
        other => Err(VmError::type_error(format!("channel for `{}`", name), other.kind_name()).into()),
    }
}

/// `(go f args...)`: call `f` on its own thread. Failures are logged, never
/// propagated to the caller.
fn go(args: &[Value], env: &mut Environment) -> Result<Value> {
    expect_min_arity("go", args, 1)?;
    let Value::Function(f) = &args[0] else {
        return Err(VmError::NotAFunction(args[0].to_string()).into());
    };
    let f = Arc::clone(f);
    let call_args = args[1..].to_vec();
    let mut worker = env.duplicate();

    std::thread::Builder::new()
        .name(format!("kelp-go-{}", f.name()))
        .spawn(move || {
            debug!(target: "kelp::stdlib", function = f.name(), "go started");
            if let Err(err) = worker.apply(&f, &call_args) {
                let trace = worker.stack_trace().unwrap_or_default().trim_end().to_string();
                warn!(target: "kelp::stdlib", function = f.name(), "go failed: {:#}\n{}", err, trace);
            }
        })
        .map_err(|e| VmError::user(format!("go: cannot spawn thread: {}", e)))?;
    Ok(Value::Nil)
}

/// `(make-chan [capacity])`; no capacity or 0 is unbounded.
fn make_chan(args: &[Value], _env: &mut Environment) -> Result<Value> {
    if args.len() > 1 {
        return Err(VmError::native_arity("make-chan", 1, args.len()).into());
    }
    let capacity = match args.first() {
        Some(_) => index_arg("make-chan", args, 0)?,
        None => 0,
    };
    Ok(Value::Channel(Arc::new(Channel::new(capacity))))
}

/// Blocks while a bounded channel is full.
fn send(args: &[Value], _env: &mut Environment) -> Result<Value> {
    expect_arity("send!", args, 2)?;
    channel_arg("send!", args)?.send(args[1].clone())?;
    Ok(args[1].clone())
}

/// Next value, or `end` once the channel is closed and drained.
fn recv(args: &[Value], _env: &mut Environment) -> Result<Value> {
    expect_arity("recv!", args, 1)?;
    Ok(channel_arg("recv!", args)?.recv())
}

fn close(args: &[Value], _env: &mut Environment) -> Result<Value> {
    expect_arity("close!", args, 1)?;
    channel_arg("close!", args)?.close();
    Ok(Value::Nil)
}
