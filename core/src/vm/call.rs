use std::mem;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::error::VmError;
use crate::scope::ScopeStack;
use crate::val::{Function, FunctionBody, NativeFunction, Value};

use super::context::{Environment, HALT};
use super::stacks::Address;

impl Environment {
    /// Call `f` with the top `nargs` data-stack values as arguments. The caller
    /// has already advanced `pc` to the resume point.
    pub(crate) fn call_value(&mut self, f: Arc<Function>, nargs: usize) -> Result<()> {
        let native = match f.body {
            FunctionBody::Native(cb) => Some(cb),
            FunctionBody::Script(_) => None,
        };
        match native {
            Some(cb) => self.call_user_function(f, cb, nargs),
            None => self.call_function(f, nargs),
        }
    }

    /// Check arity and fold surplus arguments of a variadic function into one
    /// trailing list. Afterwards exactly `required` (+1 when variadic) values
    /// are on top of the data stack.
    pub(crate) fn wrangle_args(&mut self, f: &Function, nargs: usize) -> Result<()> {
        let Some(body) = f.script_body() else {
            return Ok(());
        };
        if body.variadic {
            if nargs < body.required {
                return Err(VmError::Arity {
                    function: f.name().to_string(),
                    expected: body.required,
                    got: nargs,
                    variadic: true,
                    native: false,
                }
                .into());
            }
            let extra = self.data.pop_n(nargs - body.required)?;
            self.data.push(Value::list(extra))?;
        } else if nargs != body.required {
            return Err(VmError::arity(f.name(), body.required, nargs).into());
        }
        Ok(())
    }

    fn run_pre_hooks(&self, name: &str, nargs: usize) -> Result<()> {
        if self.hooks.pre.is_empty() {
            return Ok(());
        }
        let args = self.data.peek_n(nargs)?;
        for hook in &self.hooks.pre {
            hook(name, args);
        }
        Ok(())
    }

    fn run_post_hooks(&self, name: &str, ret: &Value) {
        for hook in &self.hooks.post {
            hook(name, std::slice::from_ref(ret));
        }
    }

    /// Scope stack for a new activation of `f`: its closure (or the globals)
    /// plus an empty frame layer. A named closure finds itself in that layer.
    pub(crate) fn fresh_frame(&self, f: &Arc<Function>) -> ScopeStack {
        let body = f.script_body();
        let mut scope = match body.and_then(|body| body.closure.as_ref()) {
            Some(closure) => closure.fork(),
            None => self.scope.fork_globals(),
        };
        scope.push_scope();
        if let Some(name) = body.and_then(|body| body.self_name.as_ref()) {
            scope.bind(name, Value::Function(Arc::clone(f)));
        }
        scope
    }

    /// Enter an interpreted function: save the caller's scope stack, build the
    /// callee's from the globals (or its closure) plus a fresh frame layer, and
    /// jump to pc 0.
    pub(crate) fn call_function(&mut self, f: Arc<Function>, nargs: usize) -> Result<()> {
        self.run_pre_hooks(f.name(), nargs)?;
        self.wrangle_args(&f, nargs)?;

        let callee_scope = self.fresh_frame(&f);

        self.addrs.push(Address {
            func: Arc::clone(&self.cur),
            pc: self.pc,
        })?;
        let caller_scope = mem::replace(&mut self.scope, callee_scope);
        self.saved_scopes.push(caller_scope)?;

        self.cur = f;
        self.pc = 0;
        Ok(())
    }

    /// Leave the current interpreted function; its return value stays on top
    /// of the data stack.
    pub(crate) fn return_from_function(&mut self) -> Result<()> {
        if !self.hooks.post.is_empty() {
            let ret = self.data.peek()?.clone();
            self.run_post_hooks(self.cur.name(), &ret);
        }
        let addr = self.addrs.pop()?;
        let caller_scope = self.saved_scopes.pop()?;
        self.scope = caller_scope;
        self.cur = addr.func;
        self.pc = addr.pc;
        Ok(())
    }

    /// Native call: arguments are popped as a slice, a frame is recorded for
    /// stack traces, the result is pushed exactly once.
    pub(crate) fn call_user_function(&mut self, f: Arc<Function>, cb: NativeFunction, nargs: usize) -> Result<()> {
        self.run_pre_hooks(f.name(), nargs)?;
        let args = self.data.pop_n(nargs)?;
        self.addrs.push(Address {
            func: mem::replace(&mut self.cur, Arc::clone(&f)),
            pc: self.pc,
        })?;
        self.pc = 0;

        let ret = cb(&args, self).with_context(|| format!("in native function `{}`", f.name()))?;

        let addr = self.addrs.pop()?;
        self.cur = addr.func;
        self.pc = addr.pc;
        self.run_post_hooks(f.name(), &ret);
        self.data.push(ret)?;
        Ok(())
    }

    /// Call any function from host code or from a native function.
    ///
    /// Natives are invoked directly. Script functions get their arguments pushed,
    /// a normal call, and a nested run to completion. A failure unwinds every
    /// frame this call created before the error is returned.
    pub fn apply(&mut self, f: &Arc<Function>, args: &[Value]) -> Result<Value> {
        if let FunctionBody::Native(cb) = f.body {
            return cb(args, self).with_context(|| format!("in native function `{}`", f.name()));
        }

        self.begin_outermost();
        self.enter_nested()?;
        let saved_cur = Arc::clone(&self.cur);
        let saved_pc = self.pc;
        let base_depth = self.addrs.len();
        let base_scopes = self.saved_scopes.len();
        let base_data = self.data.len();

        let result = self.apply_script(f, args, base_depth);
        if let Err(err) = &result {
            self.record_trace(err);
            self.unwind_to(base_depth, base_scopes, base_data);
        }
        self.cur = saved_cur;
        self.pc = saved_pc;
        self.leave_nested();
        result
    }

    fn apply_script(&mut self, f: &Arc<Function>, args: &[Value], base_depth: usize) -> Result<Value> {
        for arg in args {
            self.data.push(arg.clone())?;
        }
        self.pc = HALT;
        self.call_function(Arc::clone(f), args.len())?;
        self.run_loop(base_depth)?;
        self.data.pop()
    }

    /// Drop frames, saved scope stacks and data back to the given depths,
    /// reinstating the scope stack that was current at that point.
    pub(crate) fn unwind_to(&mut self, depth: usize, scope_depth: usize, data_len: usize) {
        self.addrs.truncate(depth);
        while self.saved_scopes.len() > scope_depth {
            match self.saved_scopes.pop() {
                Ok(scope) => self.scope = scope,
                Err(_) => break,
            }
        }
        self.data.truncate(data_len);
    }
}
