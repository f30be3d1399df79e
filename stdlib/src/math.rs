use std::cmp::Ordering;

use anyhow::Result;
use kelp_core::{
    Environment, Value, VmError,
    val::{NativeFunction, compare},
    vm::{expect_arity, expect_min_arity},
};
use num_traits::{FromPrimitive, Signed};

use crate::Module;

#[derive(Debug, Default)]
pub struct MathModule;

fn number(name: &str, v: &Value) -> Result<f64> {
    v.as_f64()
        .ok_or_else(|| VmError::type_error(format!("number for `{}`", name), v.kind_name()).into())
}

/// Floats that hold a whole number come back as ints.
fn integral(name: &str, x: f64) -> Result<Value> {
    num_bigint::BigInt::from_f64(x)
        .map(Value::Int)
        .ok_or_else(|| VmError::user(format!("{}: {} has no integer value", name, x)).into())
}

impl MathModule {
    pub fn new() -> Self {
        Self
    }

    fn abs(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_arity("abs", args, 1)?;
        match &args[0] {
            Value::Int(i) => Ok(Value::Int(i.abs())),
            Value::Float(f) => Ok(Value::Float(f.abs())),
            other => Err(VmError::type_error("number for `abs`", other.kind_name()).into()),
        }
    }

    fn sqrt(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_arity("sqrt", args, 1)?;
        let x = number("sqrt", &args[0])?;
        if x < 0.0 {
            return Err(VmError::user(format!("sqrt of negative number {}", x)).into());
        }
        Ok(Value::Float(x.sqrt()))
    }

    /// Integer base with a non-negative integer exponent stays exact.
    fn pow(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_arity("pow", args, 2)?;
        if let (Value::Int(base), Some(exp)) = (&args[0], args[1].as_i64())
            && let Ok(exp) = usize::try_from(exp)
        {
            return Ok(Value::Int(num_traits::pow(base.clone(), exp)));
        }
        let base = number("pow", &args[0])?;
        let exp = number("pow", &args[1])?;
        Ok(Value::Float(base.powf(exp)))
    }

    fn floor(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_arity("floor", args, 1)?;
        match &args[0] {
            Value::Int(_) => Ok(args[0].clone()),
            other => integral("floor", number("floor", other)?.floor()),
        }
    }

    fn ceil(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_arity("ceil", args, 1)?;
        match &args[0] {
            Value::Int(_) => Ok(args[0].clone()),
            other => integral("ceil", number("ceil", other)?.ceil()),
        }
    }

    fn min(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_min_arity("min", args, 1)?;
        Self::extreme("min", args, Ordering::Less)
    }

    fn max(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_min_arity("max", args, 1)?;
        Self::extreme("max", args, Ordering::Greater)
    }

    fn extreme(name: &str, args: &[Value], keep: Ordering) -> Result<Value> {
        let mut best = &args[0];
        number(name, best)?;
        for candidate in &args[1..] {
            number(name, candidate)?;
            if compare(candidate, best)? == keep {
                best = candidate;
            }
        }
        Ok(best.clone())
    }
}

impl Module for MathModule {
    fn name(&self) -> &str {
        "math"
    }

    fn description(&self) -> &str {
        "Numeric helpers over ints and floats"
    }

    fn exports(&self) -> Vec<(&'static str, NativeFunction)> {
        vec![
            ("abs", Self::abs as NativeFunction),
            ("sqrt", Self::sqrt as NativeFunction),
            ("pow", Self::pow as NativeFunction),
            ("floor", Self::floor as NativeFunction),
            ("ceil", Self::ceil as NativeFunction),
            ("min", Self::min as NativeFunction),
            ("max", Self::max as NativeFunction),
        ]
    }
}
