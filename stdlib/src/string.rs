use anyhow::Result;
use kelp_core::{
    Environment, Value, VmError,
    val::NativeFunction,
    vm::{expect_arity, expect_min_arity},
};

use crate::{Module, index_arg, str_arg};

#[derive(Debug, Default)]
pub struct StringModule;

impl StringModule {
    pub fn new() -> Self {
        Self
    }

    /// Length in characters
    fn len(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_arity("str/len", args, 1)?;
        let s = str_arg("str/len", args, 0)?;
        Ok(Value::from(s.chars().count()))
    }

    fn upper(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_arity("str/upper", args, 1)?;
        Ok(Value::from(str_arg("str/upper", args, 0)?.to_uppercase()))
    }

    fn lower(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_arity("str/lower", args, 1)?;
        Ok(Value::from(str_arg("str/lower", args, 0)?.to_lowercase()))
    }

    fn trim(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_arity("str/trim", args, 1)?;
        Ok(Value::str(str_arg("str/trim", args, 0)?.trim()))
    }

    fn contains(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_arity("str/contains?", args, 2)?;
        let haystack = str_arg("str/contains?", args, 0)?;
        let needle = str_arg("str/contains?", args, 1)?;
        Ok(Value::Bool(haystack.contains(needle)))
    }

    /// Split on a separator into a list of strings. Without a separator,
    /// splits on runs of whitespace.
    fn split(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_min_arity("str/split", args, 1)?;
        let s = str_arg("str/split", args, 0)?;
        let parts: Vec<Value> = match args.get(1) {
            None => s.split_whitespace().map(Value::str).collect(),
            Some(_) => {
                let sep = str_arg("str/split", args, 1)?;
                if sep.is_empty() {
                    s.chars().map(|c| Value::from(c.to_string())).collect()
                } else {
                    s.split(sep).map(Value::str).collect()
                }
            }
        };
        Ok(Value::list(parts))
    }

    /// Join a list or array with an optional separator. Non-string items use
    /// their display form.
    fn join(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_min_arity("str/join", args, 1)?;
        let items = match &args[0] {
            Value::Array(items) => items.read().unwrap().clone(),
            other if other.is_list() => other.list_to_vec()?,
            other => return Err(VmError::type_error("list or array to join", other.kind_name()).into()),
        };
        let sep = match args.get(1) {
            Some(_) => str_arg("str/join", args, 1)?,
            None => "",
        };
        let joined = items
            .iter()
            .map(Value::to_plain_string)
            .collect::<Vec<_>>()
            .join(sep);
        Ok(Value::from(joined))
    }

    /// `(substr s start [end])`, character indexed; `end` is clamped.
    fn substr(args: &[Value], _env: &mut Environment) -> Result<Value> {
        expect_min_arity("substr", args, 2)?;
        let s = str_arg("substr", args, 0)?;
        let len = s.chars().count();
        let start = index_arg("substr", args, 1)?;
        let end = match args.get(2) {
            Some(_) => index_arg("substr", args, 2)?.min(len),
            None => len,
        };
        if start > end {
            return Err(VmError::user(format!("substr start {} is past end {}", start, end)).into());
        }
        let out: String = s.chars().skip(start).take(end - start).collect();
        Ok(Value::from(out))
    }
}

impl Module for StringModule {
    fn name(&self) -> &str {
        "string"
    }

    fn description(&self) -> &str {
        "String inspection and transformation"
    }

    fn exports(&self) -> Vec<(&'static str, NativeFunction)> {
        vec![
            ("str/len", Self::len as NativeFunction),
            ("str/upper", Self::upper as NativeFunction),
            ("str/lower", Self::lower as NativeFunction),
            ("str/trim", Self::trim as NativeFunction),
            ("str/contains?", Self::contains as NativeFunction),
            ("str/split", Self::split as NativeFunction),
            ("str/join", Self::join as NativeFunction),
            ("substr", Self::substr as NativeFunction),
        ]
    }
}
