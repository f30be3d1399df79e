pub(super) use std::sync::{Arc, Mutex};

pub(super) use crate::{
    error::{VmError, vm_error},
    reader::read_one,
    val::{Function, Value},
    vm::{Environment, Instr, ReturnKind, VmConfig},
};

pub(super) fn eval(src: &str) -> Value {
    let mut env = Environment::new();
    env.eval_str(src).unwrap()
}

pub(super) fn eval_in(env: &mut Environment, src: &str) -> Value {
    env.eval_str(src).unwrap()
}

pub(super) fn eval_err(env: &mut Environment, src: &str) -> anyhow::Error {
    let err = env.eval_str(src).unwrap_err();
    env.clear();
    err
}

pub(super) fn sym(env: &Environment, name: &str) -> Value {
    Value::Symbol(env.make_symbol(name))
}

pub(super) fn ints(items: &[i64]) -> Vec<Value> {
    items.iter().map(|&i| Value::int(i)).collect()
}

mod bytecode;
mod control_flow;
mod environment;
mod functions;
mod native;
mod semantics;
