use std::sync::Arc;

use anyhow::Result;

use crate::error::VmError;
use crate::val::{Function, Symbol, Value};
use crate::vm::{Instr, ReturnKind};

use super::{Frame, FunctionBuilder, Generator};

fn expect_symbol<'v>(form: &str, value: &'v Value) -> Result<&'v Symbol> {
    value
        .as_symbol()
        .ok_or_else(|| VmError::syntax(format!("{} expects a symbol, got {}", form, value)).into())
}

fn expect_args(form: &str, args: &[Value], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        let want = if min == max {
            min.to_string()
        } else if max == usize::MAX {
            format!("at least {}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(VmError::syntax(format!("{} takes {} forms, got {}", form, want, args.len())).into());
    }
    Ok(())
}

/// Items of a `[...]` or `(...)` binding vector.
fn vector_items(form: &str, value: &Value) -> Result<Vec<Value>> {
    if let Some(items) = value.array_items() {
        return Ok(items);
    }
    if value.is_list() {
        return value.list_to_vec();
    }
    Err(VmError::syntax(format!("{} expects a binding vector, got {}", form, value)).into())
}

/// `[a b & rest]` into parameter symbols plus the variadic flag.
fn parse_params(value: &Value) -> Result<(Vec<Symbol>, bool)> {
    let items = vector_items("fn", value)?;
    let mut params = Vec::with_capacity(items.len());
    let mut iter = items.iter();
    while let Some(item) = iter.next() {
        let sym = expect_symbol("fn parameter list", item)?;
        if sym.name() == "&" {
            let rest = iter
                .next()
                .ok_or_else(|| VmError::syntax("`&` must be followed by a parameter name"))?;
            params.push(expect_symbol("fn parameter list", rest)?.clone());
            if iter.next().is_some() {
                return Err(VmError::syntax("only one parameter may follow `&`").into());
            }
            return Ok((params, true));
        }
        params.push(sym.clone());
    }
    Ok((params, false))
}

fn is_else(value: &Value) -> bool {
    match value {
        Value::Bool(true) => true,
        Value::Symbol(sym) => matches!(sym.name(), "else" | ":else"),
        _ => false,
    }
}

/// How a compiled function literal reaches the data stack.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Capture {
    /// Plain constant; callers see only the globals.
    None,
    /// Closure over the current scope stack.
    Scope,
}

impl Generator<'_> {
    /// Compile `sym args...` when `sym` names a special form. Returns false
    /// for ordinary calls.
    pub(super) fn special_form(
        &mut self,
        b: &mut FunctionBuilder,
        sym: &Symbol,
        args: &[Value],
        tail: bool,
    ) -> Result<bool> {
        match sym.name() {
            "quote" => {
                expect_args("quote", args, 1, 1)?;
                self.quasi(b, &args[0], true)?;
            }
            "syntax-quote" => {
                expect_args("syntax-quote", args, 1, 1)?;
                self.quasi(b, &args[0], false)?;
            }
            "unquote" | "unquote-splicing" => {
                return Err(VmError::syntax(format!("{} outside syntax-quote", sym.name())).into());
            }
            "def" => self.compile_def(b, args)?,
            "set!" => {
                expect_args("set!", args, 2, 2)?;
                let name = expect_symbol("set!", &args[0])?.clone();
                self.expr(b, &args[1], false)?;
                b.emit(Instr::Dup);
                b.emit(Instr::Set(name));
            }
            "let" => self.compile_let(b, args, tail)?,
            "fn" => self.compile_fn(b, args)?,
            "defn" => self.compile_defn(b, args)?,
            "defmac" => self.compile_defmac(b, args)?,
            "if" => {
                expect_args("if", args, 2, 3)?;
                self.compile_if(b, &args[0], &args[1], args.get(2), tail)?;
            }
            "do" | "begin" => self.body(b, args, tail)?,
            "and" => self.compile_logic(b, args, false, tail)?,
            "or" => self.compile_logic(b, args, true, tail)?,
            "cond" => self.compile_cond(b, args, tail)?,
            "when" | "unless" => {
                expect_args(sym.name(), args, 1, usize::MAX)?;
                self.expr(b, &args[0], false)?;
                let skip = b.emit_branch(sym.name() == "unless");
                self.body(b, &args[1..], tail)?;
                let end = b.emit_jump();
                b.patch_to_here(skip);
                b.emit(Instr::Push(Value::Nil));
                b.patch_to_here(end);
            }
            "assert" => {
                expect_args("assert", args, 1, 2)?;
                let msg: Arc<str> = match args.get(1) {
                    Some(Value::Str(msg)) => Arc::clone(msg),
                    Some(other) => {
                        return Err(VmError::syntax(format!("assert message must be a string, got {}", other)).into());
                    }
                    None => Arc::from(format!("assertion failed: {}", args[0])),
                };
                self.expr(b, &args[0], false)?;
                b.emit(Instr::Branch { when: true, offset: 2 });
                b.emit(Instr::Return(ReturnKind::StaticError(msg)));
                b.emit(Instr::Push(Value::Bool(true)));
            }
            "error" => {
                expect_args("error", args, 1, 1)?;
                self.expr(b, &args[0], false)?;
                b.emit(Instr::Return(ReturnKind::PoppedError));
            }
            "resolve" => {
                expect_args("resolve", args, 1, 1)?;
                let target = unquote_form(&args[0]);
                let name = expect_symbol("resolve", &target)?;
                b.emit(Instr::RefSym(name.clone()));
            }
            "bind-fn" => {
                expect_args("bind-fn", args, 2, 2)?;
                self.expr(b, &args[0], false)?;
                self.expr(b, &args[1], false)?;
                b.emit(Instr::BindDynFn);
                b.emit(Instr::Push(Value::Nil));
            }
            "macroexpand" => {
                expect_args("macroexpand", args, 1, 1)?;
                let expanded = self.macroexpand(&unquote_form(&args[0]))?;
                self.quasi(b, &expanded, true)?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn compile_def(&mut self, b: &mut FunctionBuilder, args: &[Value]) -> Result<()> {
        expect_args("def", args, 1, 2)?;
        let name = expect_symbol("def", &args[0])?.clone();
        match args.get(1) {
            Some(value) => self.expr(b, value, false)?,
            None => {
                b.emit(Instr::Push(Value::Nil));
            }
        }
        self.put_defined(b, name);
        Ok(())
    }

    /// `Dup` + `Put` so the definition also yields its value.
    fn put_defined(&mut self, b: &mut FunctionBuilder, name: Symbol) {
        b.emit(Instr::Dup);
        if !self.frame().toplevel || self.frame().let_depth > 0 {
            self.frame_mut().locals.push(name.id());
        }
        b.emit(Instr::Put(name));
    }

    fn compile_let(&mut self, b: &mut FunctionBuilder, args: &[Value], tail: bool) -> Result<()> {
        expect_args("let", args, 1, usize::MAX)?;
        let bindings = vector_items("let", &args[0])?;
        if bindings.len() % 2 != 0 {
            return Err(VmError::syntax("let bindings need an even number of forms").into());
        }
        let saved_locals = self.frame().locals.len();
        b.emit(Instr::AddScope);
        self.frame_mut().let_depth += 1;
        for pair in bindings.chunks_exact(2) {
            let name = expect_symbol("let", &pair[0])?.clone();
            self.expr(b, &pair[1], false)?;
            self.frame_mut().locals.push(name.id());
            b.emit(Instr::Put(name));
        }
        self.body(b, &args[1..], tail)?;
        b.emit(Instr::RemoveScope);
        let frame = self.frame_mut();
        frame.let_depth -= 1;
        frame.locals.truncate(saved_locals);
        Ok(())
    }

    fn compile_if(
        &mut self,
        b: &mut FunctionBuilder,
        cond: &Value,
        then: &Value,
        otherwise: Option<&Value>,
        tail: bool,
    ) -> Result<()> {
        self.expr(b, cond, false)?;
        let to_else = b.emit_branch(false);
        self.expr(b, then, tail)?;
        let to_end = b.emit_jump();
        b.patch_to_here(to_else);
        match otherwise {
            Some(form) => self.expr(b, form, tail)?,
            None => {
                b.emit(Instr::Push(Value::Nil));
            }
        }
        b.patch_to_here(to_end);
        Ok(())
    }

    /// `and` exits on the first falsy value, `or` on the first truthy one.
    fn compile_logic(&mut self, b: &mut FunctionBuilder, args: &[Value], exit_when: bool, tail: bool) -> Result<()> {
        let Some((last, init)) = args.split_last() else {
            b.emit(Instr::Push(if exit_when { Value::Nil } else { Value::Bool(true) }));
            return Ok(());
        };
        let mut exits = Vec::with_capacity(init.len());
        for form in init {
            self.expr(b, form, false)?;
            b.emit(Instr::Dup);
            exits.push(b.emit_branch(exit_when));
            b.emit(Instr::Pop);
        }
        self.expr(b, last, tail)?;
        for at in exits {
            b.patch_to_here(at);
        }
        Ok(())
    }

    fn compile_cond(&mut self, b: &mut FunctionBuilder, args: &[Value], tail: bool) -> Result<()> {
        if args.len() % 2 != 0 {
            return Err(VmError::syntax("cond needs test/result pairs").into());
        }
        let mut exits = Vec::new();
        let mut exhaustive = false;
        for clause in args.chunks_exact(2) {
            if is_else(&clause[0]) {
                self.expr(b, &clause[1], tail)?;
                exhaustive = true;
                break;
            }
            self.expr(b, &clause[0], false)?;
            let next = b.emit_branch(false);
            self.expr(b, &clause[1], tail)?;
            exits.push(b.emit_jump());
            b.patch_to_here(next);
        }
        if !exhaustive {
            b.emit(Instr::Push(Value::Nil));
        }
        for at in exits {
            b.patch_to_here(at);
        }
        Ok(())
    }

    fn compile_fn(&mut self, b: &mut FunctionBuilder, args: &[Value]) -> Result<()> {
        expect_args("fn", args, 1, usize::MAX)?;
        let (name, params, body) = match &args[0] {
            Value::Symbol(sym) => {
                expect_args("named fn", args, 2, usize::MAX)?;
                (Some(sym.clone()), &args[1], &args[2..])
            }
            _ => (None, &args[0], &args[1..]),
        };
        let frame = self.frame();
        let capture = if frame.toplevel && frame.let_depth == 0 && name.is_none() {
            Capture::None
        } else {
            Capture::Scope
        };
        self.function_literal(b, name, params, body, capture)
    }

    fn compile_defn(&mut self, b: &mut FunctionBuilder, args: &[Value]) -> Result<()> {
        expect_args("defn", args, 2, usize::MAX)?;
        let name = expect_symbol("defn", &args[0])?.clone();
        let frame = self.frame();
        // At top level the global binding made here is what self references see.
        let capture = if frame.toplevel && frame.let_depth == 0 {
            Capture::None
        } else {
            Capture::Scope
        };
        self.function_literal(b, Some(name.clone()), &args[1], &args[2..], capture)?;
        self.put_defined(b, name);
        Ok(())
    }

    fn compile_defmac(&mut self, b: &mut FunctionBuilder, args: &[Value]) -> Result<()> {
        expect_args("defmac", args, 2, usize::MAX)?;
        let name = expect_symbol("defmac", &args[0])?.clone();
        let mac = self.compile_function(Some(name.clone()), &args[1], &args[2..])?;
        self.env.add_macro(name.name(), Arc::new(mac));
        b.emit(Instr::Push(Value::Symbol(name)));
        Ok(())
    }

    /// Compile a body into its own function, parameters bound by a prologue
    /// of `put`s in reverse order.
    fn compile_function(
        &mut self,
        name: Option<Symbol>,
        params: &Value,
        body: &[Value],
    ) -> Result<Function> {
        let (params, variadic) = parse_params(params)?;
        let label = name.as_ref().map_or("lambda", |s| s.name()).to_string();
        self.frames.push(Frame::function(name, &params));
        let mut fb = FunctionBuilder::new();
        for param in params.iter().rev() {
            fb.emit(Instr::Put(param.clone()));
        }
        let compiled = self.body(&mut fb, body, true);
        self.frames.pop();
        compiled?;
        fb.emit(Instr::Return(ReturnKind::Value));
        let required = params.len() - usize::from(variadic);
        Ok(fb.finish(&label, required, variadic))
    }

    fn function_literal(
        &mut self,
        b: &mut FunctionBuilder,
        name: Option<Symbol>,
        params: &Value,
        body: &[Value],
        capture: Capture,
    ) -> Result<()> {
        let func = self.compile_function(name.clone(), params, body)?;
        match (capture, name) {
            (Capture::None, _) => {
                b.emit(Instr::Push(Value::Function(Arc::new(func))));
            }
            (Capture::Scope, None) => {
                b.emit(Instr::PushClosure(Arc::new(func)));
            }
            (Capture::Scope, Some(name)) => {
                b.emit(Instr::PushClosure(Arc::new(func.with_self_name(name))));
            }
        }
        Ok(())
    }
}

/// `'x` in a position that takes a literal form reads the same as `x`.
fn unquote_form(value: &Value) -> Value {
    if let Value::Pair(p) = value {
        if let (Value::Symbol(sym), Value::Pair(rest)) = (&p.head, &p.tail) {
            if sym.name() == "quote" && rest.tail.is_nil() {
                return rest.head.clone();
            }
        }
    }
    value.clone()
}
