//! Natives every environment starts with: arithmetic, comparison and list
//! basics. Richer extension functions live in `kelp-stdlib`.

use std::cmp::Ordering;
use std::sync::Arc;

use anyhow::Result;
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};

use crate::error::VmError;
use crate::val::{Value, compare, values_equal};

use super::Environment;

/// Fail unless exactly `n` arguments were passed.
pub fn expect_arity(name: &str, args: &[Value], n: usize) -> Result<()> {
    if args.len() != n {
        return Err(VmError::native_arity(name, n, args.len()).into());
    }
    Ok(())
}

/// Fail unless at least `min` arguments were passed.
pub fn expect_min_arity(name: &str, args: &[Value], min: usize) -> Result<()> {
    if args.len() < min {
        return Err(VmError::Arity {
            function: name.to_string(),
            expected: min,
            got: args.len(),
            variadic: true,
            native: true,
        }
        .into());
    }
    Ok(())
}

pub(crate) fn install(env: &mut Environment) {
    env.add_builtin("+", add);
    env.add_builtin("-", sub);
    env.add_builtin("*", mul);
    env.add_builtin("/", div);
    env.add_builtin("mod", modulo);
    env.add_builtin("<", lt);
    env.add_builtin("<=", le);
    env.add_builtin(">", gt);
    env.add_builtin(">=", ge);
    env.add_builtin("=", eq);
    env.add_builtin("not=", not_eq);
    env.add_builtin("not", not);
    env.add_builtin("list", list);
    env.add_builtin("cons", cons);
    env.add_builtin("first", first);
    env.add_builtin("rest", rest);
    env.add_builtin("second", second);
    env.add_builtin("list?", is_list);
    env.add_builtin("null?", is_null);
    env.add_builtin("len", len);
    env.add_builtin("append", append);
    env.add_builtin("concat", concat);
    env.add_builtin("reverse", reverse);
    env.add_builtin("array", array);
    env.add_builtin("hash", hash);
    env.add_builtin("apply", apply);
    env.add_builtin("gensym", gensym);
    env.add_builtin("symbol", symbol);
    env.add_builtin("str", str_);
    env.add_builtin("type", type_of);
    env.add_builtin("identity", identity);
}

// ---------- arithmetic ----------

enum Num {
    Int(BigInt),
    Float(f64),
}

impl Num {
    fn from_value(name: &str, v: &Value) -> Result<Self> {
        match v {
            Value::Int(i) => Ok(Num::Int(i.clone())),
            Value::Float(f) => Ok(Num::Float(*f)),
            other => Err(VmError::type_error(format!("number for `{}`", name), other.kind_name()).into()),
        }
    }

    fn to_f64(&self) -> f64 {
        match self {
            Num::Int(i) => i.to_f64().unwrap_or(f64::NAN),
            Num::Float(f) => *f,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Num::Int(i) => Value::Int(i),
            Num::Float(f) => Value::Float(f),
        }
    }
}

fn fold_numbers(
    name: &str,
    args: &[Value],
    init: Num,
    int_op: fn(BigInt, &BigInt) -> Result<Num>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    let mut acc = init;
    for arg in args {
        let rhs = Num::from_value(name, arg)?;
        acc = match (acc, rhs) {
            (Num::Int(a), Num::Int(b)) => int_op(a, &b)?,
            (a, b) => Num::Float(float_op(a.to_f64(), b.to_f64())),
        };
    }
    Ok(acc.into_value())
}

fn division_by_zero() -> anyhow::Error {
    VmError::user("division by zero").into()
}

fn add(args: &[Value], _env: &mut Environment) -> Result<Value> {
    fold_numbers("+", args, Num::Int(BigInt::zero()), |a, b| Ok(Num::Int(a + b)), |a, b| a + b)
}

fn mul(args: &[Value], _env: &mut Environment) -> Result<Value> {
    fold_numbers("*", args, Num::Int(BigInt::from(1)), |a, b| Ok(Num::Int(a * b)), |a, b| a * b)
}

fn sub(args: &[Value], _env: &mut Environment) -> Result<Value> {
    expect_min_arity("-", args, 1)?;
    if args.len() == 1 {
        return fold_numbers("-", args, Num::Int(BigInt::zero()), |a, b| Ok(Num::Int(a - b)), |a, b| a - b);
    }
    let init = Num::from_value("-", &args[0])?;
    fold_numbers("-", &args[1..], init, |a, b| Ok(Num::Int(a - b)), |a, b| a - b)
}

/// Integer division stays integral when it is exact.
fn div_ints(a: BigInt, b: &BigInt) -> Result<Num> {
    if b.is_zero() {
        return Err(division_by_zero());
    }
    if (&a % b).is_zero() {
        Ok(Num::Int(a / b))
    } else {
        Ok(Num::Float(Num::Int(a).to_f64() / Num::Int(b.clone()).to_f64()))
    }
}

fn div(args: &[Value], _env: &mut Environment) -> Result<Value> {
    expect_min_arity("/", args, 1)?;
    if args.len() == 1 {
        return fold_numbers("/", args, Num::Int(BigInt::from(1)), div_ints, |a, b| a / b);
    }
    let init = Num::from_value("/", &args[0])?;
    fold_numbers("/", &args[1..], init, div_ints, |a, b| a / b)
}

/// Floored modulo: the result takes the sign of the divisor.
fn modulo(args: &[Value], _env: &mut Environment) -> Result<Value> {
    expect_arity("mod", args, 2)?;
    let a = Num::from_value("mod", &args[0])?;
    let b = Num::from_value("mod", &args[1])?;
    match (a, b) {
        (Num::Int(a), Num::Int(b)) => {
            if b.is_zero() {
                return Err(division_by_zero());
            }
            let r = &a % &b;
            let r = if !r.is_zero() && (r < BigInt::zero()) != (b < BigInt::zero()) {
                r + b
            } else {
                r
            };
            Ok(Value::Int(r))
        }
        (a, b) => {
            let (x, y) = (a.to_f64(), b.to_f64());
            Ok(Value::Float(x - y * (x / y).floor()))
        }
    }
}

// ---------- comparison ----------

fn chain(name: &str, args: &[Value], ok: fn(Ordering) -> bool) -> Result<Value> {
    expect_min_arity(name, args, 1)?;
    for pair in args.windows(2) {
        if !ok(compare(&pair[0], &pair[1])?) {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn lt(args: &[Value], _env: &mut Environment) -> Result<Value> {
    chain("<", args, |o| o == Ordering::Less)
}

fn le(args: &[Value], _env: &mut Environment) -> Result<Value> {
    chain("<=", args, |o| o != Ordering::Greater)
}

fn gt(args: &[Value], _env: &mut Environment) -> Result<Value> {
    chain(">", args, |o| o == Ordering::Greater)
}

fn ge(args: &[Value], _env: &mut Environment) -> Result<Value> {
    chain(">=", args, |o| o != Ordering::Less)
}

fn eq(args: &[Value], _env: &mut Environment) -> Result<Value> {
    expect_min_arity("=", args, 1)?;
    Ok(Value::Bool(args.windows(2).all(|p| values_equal(&p[0], &p[1]))))
}

fn not_eq(args: &[Value], env: &mut Environment) -> Result<Value> {
    let same = eq(args, env)?;
    Ok(Value::Bool(!same.is_truthy()))
}

fn not(args: &[Value], _env: &mut Environment) -> Result<Value> {
    expect_arity("not", args, 1)?;
    Ok(Value::Bool(!args[0].is_truthy()))
}

// ---------- sequences ----------

/// Elements of a list or array.
fn seq_items(name: &str, v: &Value) -> Result<Vec<Value>> {
    match v {
        Value::Nil | Value::Pair(_) => v.list_to_vec(),
        Value::Array(items) => Ok(items.read().unwrap().clone()),
        other => Err(VmError::type_error(format!("list or array for `{}`", name), other.kind_name()).into()),
    }
}

fn list(args: &[Value], _env: &mut Environment) -> Result<Value> {
    Ok(Value::list(args.to_vec()))
}

fn cons(args: &[Value], _env: &mut Environment) -> Result<Value> {
    expect_arity("cons", args, 2)?;
    Ok(Value::cons(args[0].clone(), args[1].clone()))
}

fn first(args: &[Value], _env: &mut Environment) -> Result<Value> {
    expect_arity("first", args, 1)?;
    match &args[0] {
        Value::Nil => Ok(Value::Nil),
        Value::Pair(p) => Ok(p.head.clone()),
        Value::Array(items) => Ok(items.read().unwrap().first().cloned().unwrap_or_default()),
        other => Err(VmError::type_error("list or array for `first`", other.kind_name()).into()),
    }
}

fn rest(args: &[Value], _env: &mut Environment) -> Result<Value> {
    expect_arity("rest", args, 1)?;
    match &args[0] {
        Value::Nil => Ok(Value::Nil),
        Value::Pair(p) => Ok(p.tail.clone()),
        Value::Array(items) => {
            let items = items.read().unwrap();
            Ok(Value::array(items.iter().skip(1).cloned().collect()))
        }
        other => Err(VmError::type_error("list or array for `rest`", other.kind_name()).into()),
    }
}

fn second(args: &[Value], _env: &mut Environment) -> Result<Value> {
    expect_arity("second", args, 1)?;
    Ok(seq_items("second", &args[0])?.into_iter().nth(1).unwrap_or_default())
}

fn is_list(args: &[Value], _env: &mut Environment) -> Result<Value> {
    expect_arity("list?", args, 1)?;
    Ok(Value::Bool(args[0].is_list()))
}

fn is_null(args: &[Value], _env: &mut Environment) -> Result<Value> {
    expect_arity("null?", args, 1)?;
    Ok(Value::Bool(args[0].is_nil()))
}

fn len(args: &[Value], _env: &mut Environment) -> Result<Value> {
    expect_arity("len", args, 1)?;
    let n = match &args[0] {
        Value::Nil => 0,
        Value::Pair(_) => args[0].list_to_vec()?.len(),
        Value::Array(items) => items.read().unwrap().len(),
        Value::Hash(map) => map.read().unwrap().len(),
        Value::Str(s) => s.chars().count(),
        Value::Bytes(b) => b.len(),
        Value::Channel(ch) => ch.len(),
        other => return Err(VmError::type_error("sized value for `len`", other.kind_name()).into()),
    };
    Ok(Value::from(n))
}

/// New sequence of the same kind with `x` added at the end.
fn append(args: &[Value], _env: &mut Environment) -> Result<Value> {
    expect_arity("append", args, 2)?;
    let mut items = seq_items("append", &args[0])?;
    items.push(args[1].clone());
    Ok(match &args[0] {
        Value::Array(_) => Value::array(items),
        _ => Value::list(items),
    })
}

/// Join sequences; the result has the kind of the first argument.
fn concat(args: &[Value], _env: &mut Environment) -> Result<Value> {
    let mut out = Vec::new();
    for arg in args {
        out.extend(seq_items("concat", arg)?);
    }
    Ok(match args.first() {
        Some(Value::Array(_)) => Value::array(out),
        _ => Value::list(out),
    })
}

fn reverse(args: &[Value], _env: &mut Environment) -> Result<Value> {
    expect_arity("reverse", args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Value::from(s.chars().rev().collect::<String>())),
        Value::Array(items) => Ok(Value::array(items.read().unwrap().iter().rev().cloned().collect())),
        other => {
            let mut items = seq_items("reverse", other)?;
            items.reverse();
            Ok(Value::list(items))
        }
    }
}

fn array(args: &[Value], _env: &mut Environment) -> Result<Value> {
    Ok(Value::array(args.to_vec()))
}

fn hash(args: &[Value], _env: &mut Environment) -> Result<Value> {
    Value::hash_from_pairs(args)
}

// ---------- functions and symbols ----------

/// `(apply f a b coll)`: leading arguments, then the elements of `coll`.
fn apply(args: &[Value], env: &mut Environment) -> Result<Value> {
    expect_min_arity("apply", args, 1)?;
    let Value::Function(f) = &args[0] else {
        return Err(VmError::NotAFunction(args[0].to_string()).into());
    };
    let mut call_args: Vec<Value> = Vec::new();
    if let Some((spread, fixed)) = args[1..].split_last() {
        call_args.extend(fixed.iter().cloned());
        call_args.extend(seq_items("apply", spread)?);
    }
    let f = Arc::clone(f);
    env.apply(&f, &call_args)
}

fn gensym(args: &[Value], env: &mut Environment) -> Result<Value> {
    let prefix = match args.first() {
        None => "G__".to_string(),
        Some(Value::Str(s)) => s.to_string(),
        Some(Value::Symbol(sym)) => sym.name().to_string(),
        Some(other) => return Err(VmError::type_error("string prefix for `gensym`", other.kind_name()).into()),
    };
    Ok(Value::Symbol(env.gen_symbol(&prefix)))
}

fn symbol(args: &[Value], env: &mut Environment) -> Result<Value> {
    expect_arity("symbol", args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Value::Symbol(env.make_symbol(s))),
        Value::Symbol(_) => Ok(args[0].clone()),
        other => Err(VmError::type_error("string for `symbol`", other.kind_name()).into()),
    }
}

fn str_(args: &[Value], _env: &mut Environment) -> Result<Value> {
    let mut out = String::new();
    for arg in args {
        out.push_str(&arg.to_plain_string());
    }
    Ok(Value::from(out))
}

fn type_of(args: &[Value], env: &mut Environment) -> Result<Value> {
    expect_arity("type", args, 1)?;
    Ok(Value::Symbol(env.make_symbol(args[0].kind_name())))
}

fn identity(args: &[Value], _env: &mut Environment) -> Result<Value> {
    expect_arity("identity", args, 1)?;
    Ok(args[0].clone())
}
