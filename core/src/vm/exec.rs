use std::sync::Arc;

use anyhow::Result;

use crate::error::VmError;
use crate::val::{Function, Value};

use super::bytecode::{Instr, ReturnKind};
use super::context::{Environment, HALT};

/// What the loop does after an instruction.
enum Flow {
    Next,
    Return(ReturnKind),
}

impl Environment {
    /// Run a compiled top-level function in the current scope stack and pop its
    /// value. On error the stacks are left as they were for `stack_trace`;
    /// call `clear` before reusing the environment.
    pub fn run(&mut self, f: &Arc<Function>) -> Result<Value> {
        self.begin_outermost();
        self.enter_nested()?;
        let result = self.run_toplevel(f);
        self.leave_nested();
        result
    }

    fn run_toplevel(&mut self, f: &Arc<Function>) -> Result<Value> {
        let saved_cur = std::mem::replace(&mut self.cur, Arc::clone(f));
        let saved_pc = std::mem::replace(&mut self.pc, 0);
        let base_depth = self.addrs.len();
        self.run_loop(base_depth)?;
        let value = self.data.pop()?;
        self.cur = saved_cur;
        self.pc = saved_pc;
        Ok(value)
    }

    /// Fetch-execute until the frame at `base_depth` returns or the pc hits `HALT`.
    pub(crate) fn run_loop(&mut self, base_depth: usize) -> Result<()> {
        let mut func = Arc::clone(&self.cur);
        let mut code = func.code_arc().unwrap_or_else(|| Arc::from(Vec::new()));
        loop {
            if self.pc == HALT {
                return Ok(());
            }
            if !Arc::ptr_eq(&func, &self.cur) {
                func = Arc::clone(&self.cur);
                code = func.code_arc().unwrap_or_else(|| Arc::from(Vec::new()));
            }
            let flow = match code.get(self.pc) {
                Some(instr) => self.step(instr, code.len()),
                // Falling off the end of a body is an implicit return.
                None => Ok(Flow::Return(ReturnKind::Value)),
            };
            let outcome = match flow {
                Ok(Flow::Next) => Ok(false),
                Ok(Flow::Return(kind)) => self.finish_return(kind, base_depth),
                Err(err) => Err(err),
            };
            match outcome {
                Ok(false) => {}
                Ok(true) => return Ok(()),
                Err(err) => {
                    self.record_trace(&err);
                    return Err(err);
                }
            }
        }
    }

    /// Returns true when control leaves the loop's base frame.
    fn finish_return(&mut self, kind: ReturnKind, base_depth: usize) -> Result<bool> {
        match kind {
            ReturnKind::Value => {}
            ReturnKind::StaticError(msg) => return Err(VmError::User(msg.to_string()).into()),
            ReturnKind::PoppedError => {
                let msg = self.data.pop()?;
                return Err(VmError::User(msg.to_plain_string()).into());
            }
        }
        if self.addrs.len() <= base_depth {
            return Ok(true);
        }
        self.return_from_function()?;
        Ok(self.pc == HALT)
    }

    fn jump_target(&self, target: isize, len: usize) -> Result<usize> {
        if target < 0 || target as usize > len {
            return Err(VmError::JumpOutOfBounds {
                function: self.cur.name().to_string(),
                target,
                len,
            }
            .into());
        }
        Ok(target as usize)
    }

    fn step(&mut self, instr: &Instr, len: usize) -> Result<Flow> {
        match instr {
            Instr::Push(v) => {
                self.data.push(v.clone())?;
                self.pc += 1;
            }
            Instr::PushClosure(template) => {
                // Forked, not deep-copied: later `bind`s in this scope go to
                // extension layers, later `set!`s stay visible to the closure.
                let closure = template.with_closure(self.scope.fork());
                self.data.push(closure.into_value())?;
                self.pc += 1;
            }
            Instr::Pop => {
                self.data.pop()?;
                self.pc += 1;
            }
            Instr::Dup => {
                let top = self.data.peek()?.clone();
                self.data.push(top)?;
                self.pc += 1;
            }
            Instr::Get(sym) => {
                let v = self.resolve(sym)?;
                self.data.push(v)?;
                self.pc += 1;
            }
            Instr::Put(sym) => {
                let v = self.data.pop()?;
                self.scope.bind(sym, v);
                self.pc += 1;
            }
            Instr::Set(sym) => {
                let v = self.data.pop()?;
                self.scope.set(sym, v);
                self.pc += 1;
            }
            Instr::BindDynFn => {
                let f = self.data.pop()?;
                let name = self.data.pop()?;
                let Value::Symbol(sym) = name else {
                    return Err(VmError::type_error("symbol for function name", name.kind_name()).into());
                };
                if !matches!(f, Value::Function(_)) {
                    return Err(VmError::NotAFunction(f.to_string()).into());
                }
                self.scope.bind(&sym, f);
                self.pc += 1;
            }
            Instr::Jump(ofs) => {
                self.pc = self.jump_target(self.pc as isize + ofs, len)?;
            }
            Instr::Goto(target) => {
                self.pc = self.jump_target(*target as isize, len)?;
            }
            Instr::Branch { when, offset } => {
                let cond = self.data.pop()?;
                if cond.is_truthy() == *when {
                    self.pc = self.jump_target(self.pc as isize + offset, len)?;
                } else {
                    self.pc += 1;
                }
            }
            Instr::Call { sym, nargs } => {
                let target = self.resolve(sym)?;
                let Value::Function(f) = target else {
                    return Err(VmError::NotAFunction(sym.name().to_string()).into());
                };
                self.pc += 1;
                self.call_value(f, *nargs)?;
            }
            Instr::PrepareCall { nargs } => {
                let f = Arc::clone(&self.cur);
                self.wrangle_args(&f, *nargs)?;
                // Each iteration starts from a new frame layer; closures made
                // by the previous one keep the old layer.
                self.scope = self.fresh_frame(&f);
                self.pc += 1;
            }
            Instr::Dispatch { nargs } => {
                let target = self.data.pop()?;
                let Value::Function(f) = target else {
                    return Err(VmError::NotAFunction(target.to_string()).into());
                };
                self.pc += 1;
                self.call_value(f, *nargs)?;
            }
            Instr::AddScope => {
                self.scope.push_scope();
                self.pc += 1;
            }
            Instr::RemoveScope => {
                self.scope.pop()?;
                self.pc += 1;
            }
            Instr::Return(kind) => return Ok(Flow::Return(kind.clone())),
            Instr::Explode => {
                let v = self.data.pop()?;
                let items = match &v {
                    Value::Nil | Value::Pair(_) => v.list_to_vec()?,
                    Value::Array(items) => items.read().unwrap().clone(),
                    other => return Err(VmError::type_error("list or array to splice", other.kind_name()).into()),
                };
                for item in items {
                    self.data.push(item)?;
                }
                self.pc += 1;
            }
            Instr::Squash => {
                let items = self.data.pop_to_marker()?;
                self.data.push(Value::list(items))?;
                self.pc += 1;
            }
            Instr::Vectorize => {
                let items = self.data.pop_to_marker()?;
                self.data.push(Value::array(items))?;
                self.pc += 1;
            }
            Instr::Hashize => {
                let items = self.data.pop_to_marker()?;
                self.data.push(Value::hash_from_pairs(&items)?)?;
                self.pc += 1;
            }
            Instr::RefSym(sym) => {
                let v = self.try_resolve(sym).unwrap_or(Value::Nil);
                self.data.push(v)?;
                self.pc += 1;
            }
        }
        Ok(Flow::Next)
    }
}
