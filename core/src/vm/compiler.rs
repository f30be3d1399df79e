//! Generator: lowers read forms to stack bytecode.
//!
//! Every compiled expression leaves exactly one value on the data stack. Self
//! calls in tail position become `prepare-call` + `goto 0`, with one
//! `remove-scope` per enclosing `let`.

mod builder;
mod forms;
mod quasi;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::error::VmError;
use crate::val::{Function, Symbol, Value};
use crate::vm::{Environment, Instr, ReturnKind};

pub(crate) use builder::FunctionBuilder;


/// Lexical state of the function body being compiled.
struct Frame {
    /// Name a tail self-call may jump back to.
    self_name: Option<Symbol>,
    locals: Vec<u32>,
    let_depth: usize,
    toplevel: bool,
}

impl Frame {
    fn toplevel() -> Self {
        Self {
            self_name: None,
            locals: Vec::new(),
            let_depth: 0,
            toplevel: true,
        }
    }

    fn function(self_name: Option<Symbol>, params: &[Symbol]) -> Self {
        Self {
            self_name,
            locals: params.iter().map(Symbol::id).collect(),
            let_depth: 0,
            toplevel: false,
        }
    }
}

pub struct Generator<'e> {
    env: &'e mut Environment,
    frames: Vec<Frame>,
}

impl<'e> Generator<'e> {
    pub fn new(env: &'e mut Environment) -> Self {
        Self { env, frames: Vec::new() }
    }

    /// Compile one top-level form into a zero-argument function.
    pub fn compile_toplevel(mut self, expr: &Value) -> Result<Function> {
        self.frames.push(Frame::toplevel());
        let mut b = FunctionBuilder::new();
        self.expr(&mut b, expr, false)?;
        b.emit(Instr::Return(ReturnKind::Value));
        self.frames.pop();
        Ok(b.finish("toplevel", 0, false))
    }

    fn frame(&self) -> &Frame {
        &self.frames[self.frames.len() - 1]
    }

    fn frame_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Bound by a parameter, `let` or local `def` in any enclosing body.
    fn is_local(&self, sym: &Symbol) -> bool {
        self.frames.iter().any(|f| f.locals.contains(&sym.id()))
    }

    fn is_self_call(&self, sym: &Symbol) -> bool {
        let frame = self.frame();
        frame.self_name.as_ref() == Some(sym) && !frame.locals.contains(&sym.id())
    }

    pub(crate) fn expr(&mut self, b: &mut FunctionBuilder, expr: &Value, tail: bool) -> Result<()> {
        match expr {
            Value::Symbol(sym) => {
                b.emit(Instr::Get(sym.clone()));
            }
            Value::Pair(_) => self.list_form(b, expr, tail)?,
            Value::Array(items) => {
                let items = items.read().unwrap().clone();
                b.emit(Instr::Push(Value::Marker));
                for item in &items {
                    self.expr(b, item, false)?;
                }
                b.emit(Instr::Vectorize);
            }
            Value::Hash(map) => {
                let entries: Vec<(Value, Value)> = map
                    .read()
                    .unwrap()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                b.emit(Instr::Push(Value::Marker));
                for (k, v) in &entries {
                    self.expr(b, k, false)?;
                    self.expr(b, v, false)?;
                }
                b.emit(Instr::Hashize);
            }
            other => {
                b.emit(Instr::Push(other.clone()));
            }
        }
        Ok(())
    }

    /// Forms in sequence, keeping only the last value.
    pub(crate) fn body(&mut self, b: &mut FunctionBuilder, forms: &[Value], tail: bool) -> Result<()> {
        let Some((last, init)) = forms.split_last() else {
            b.emit(Instr::Push(Value::Nil));
            return Ok(());
        };
        for form in init {
            self.expr(b, form, false)?;
            b.emit(Instr::Pop);
        }
        self.expr(b, last, tail)
    }

    fn list_form(&mut self, b: &mut FunctionBuilder, expr: &Value, tail: bool) -> Result<()> {
        let items = expr
            .list_to_vec()
            .map_err(|_| VmError::syntax(format!("cannot evaluate dotted pair {}", expr)))?;
        let (head, args) = items.split_first().ok_or_else(|| VmError::syntax("empty call"))?;

        let Value::Symbol(sym) = head else {
            for arg in args {
                self.expr(b, arg, false)?;
            }
            self.expr(b, head, false)?;
            b.emit(Instr::Dispatch { nargs: args.len() });
            return Ok(());
        };

        if self.special_form(b, sym, args, tail)? {
            return Ok(());
        }
        if !self.is_local(sym) {
            if let Some(mac) = self.env.find_macro(sym) {
                let expansion = self.expand_macro(&mac, args)?;
                return self.expr(b, &expansion, tail);
            }
        }
        if tail && self.is_self_call(sym) {
            return self.tail_call(b, args);
        }
        for arg in args {
            self.expr(b, arg, false)?;
        }
        b.emit(Instr::Call {
            sym: sym.clone(),
            nargs: args.len(),
        });
        Ok(())
    }

    fn tail_call(&mut self, b: &mut FunctionBuilder, args: &[Value]) -> Result<()> {
        for arg in args {
            self.expr(b, arg, false)?;
        }
        for _ in 0..self.frame().let_depth {
            b.emit(Instr::RemoveScope);
        }
        b.emit(Instr::PrepareCall { nargs: args.len() });
        b.emit(Instr::Goto(0));
        Ok(())
    }

    /// Run a macro on its unevaluated arguments in a duplicate environment.
    pub(crate) fn expand_macro(&mut self, mac: &Arc<Function>, args: &[Value]) -> Result<Value> {
        let mut sub = self.env.duplicate();
        let expansion = sub
            .apply(mac, args)
            .with_context(|| format!("while expanding macro `{}`", mac.name()))?;
        debug!(target: "kelp::compiler", name = mac.name(), "expanded to {}", expansion);
        Ok(expansion)
    }

    /// Expand `form` until its head is no longer a macro.
    pub(crate) fn macroexpand(&mut self, form: &Value) -> Result<Value> {
        let mut form = form.clone();
        loop {
            let Some(Value::Symbol(sym)) = form.head() else {
                return Ok(form);
            };
            let Some(mac) = self.env.find_macro(sym) else {
                return Ok(form);
            };
            let items = form.list_to_vec()?;
            form = self.expand_macro(&mac, &items[1..])?;
        }
    }
}
