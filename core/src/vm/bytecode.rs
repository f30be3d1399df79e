use std::fmt;
use std::sync::Arc;

use crate::val::{Function, Symbol, Value};

/// What a `Return` hands back to the caller.
#[derive(Debug, Clone)]
pub enum ReturnKind {
    /// The value on top of the data stack.
    Value,
    /// Fail with a message fixed at compile time.
    StaticError(Arc<str>),
    /// Fail with the message popped from the data stack.
    PoppedError,
}

/// One VM instruction. A function body is a flat `[Instr]` executed from pc 0.
#[derive(Debug, Clone)]
pub enum Instr {
    Push(Value),
    /// Clone the template and attach the current scope stack as its closure.
    PushClosure(Arc<Function>),
    Pop,
    Dup,
    /// Look up a symbol and push its value.
    Get(Symbol),
    /// Pop and bind in the top scope layer.
    Put(Symbol),
    /// Pop and overwrite the nearest existing binding (`set!`).
    Set(Symbol),
    /// Pop a function, then a name symbol, and bind the name to the function.
    BindDynFn,
    /// Relative jump.
    Jump(isize),
    /// Absolute jump.
    Goto(usize),
    /// Pop the condition; jump by `offset` when its truthiness equals `when`.
    Branch { when: bool, offset: isize },
    Call { sym: Symbol, nargs: usize },
    /// Argument wrangling for a self tail call, without pushing a frame.
    PrepareCall { nargs: usize },
    /// Pop a function value and call it with `nargs` arguments.
    Dispatch { nargs: usize },
    AddScope,
    RemoveScope,
    Return(ReturnKind),
    /// Pop a list or array and push its elements.
    Explode,
    /// Collect values down to the marker into a list.
    Squash,
    /// Collect values down to the marker into an array.
    Vectorize,
    /// Collect key/value runs down to the marker into a hash.
    Hashize,
    /// Push the symbol's binding, or nil when unbound.
    RefSym(Symbol),
}

impl fmt::Display for ReturnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnKind::Value => Ok(()),
            ReturnKind::StaticError(msg) => write!(f, " error={:?}", msg),
            ReturnKind::PoppedError => f.write_str(" error=<popped>"),
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Push(v) => write!(f, "push {}", v),
            Instr::PushClosure(func) => write!(f, "push-closure {}", func.name()),
            Instr::Pop => f.write_str("pop"),
            Instr::Dup => f.write_str("dup"),
            Instr::Get(sym) => write!(f, "get {}", sym.name()),
            Instr::Put(sym) => write!(f, "put {}", sym.name()),
            Instr::Set(sym) => write!(f, "set! {}", sym.name()),
            Instr::BindDynFn => f.write_str("bind-dyn-fn"),
            Instr::Jump(ofs) => write!(f, "jump {:+}", ofs),
            Instr::Goto(pc) => write!(f, "goto {}", pc),
            Instr::Branch { when, offset } => write!(f, "branch-{} {:+}", when, offset),
            Instr::Call { sym, nargs } => write!(f, "call {} {}", sym.name(), nargs),
            Instr::PrepareCall { nargs } => write!(f, "prepare-call {}", nargs),
            Instr::Dispatch { nargs } => write!(f, "dispatch {}", nargs),
            Instr::AddScope => f.write_str("add-scope"),
            Instr::RemoveScope => f.write_str("remove-scope"),
            Instr::Return(kind) => write!(f, "return{}", kind),
            Instr::Explode => f.write_str("explode"),
            Instr::Squash => f.write_str("squash"),
            Instr::Vectorize => f.write_str("vectorize"),
            Instr::Hashize => f.write_str("hashize"),
            Instr::RefSym(sym) => write!(f, "ref-sym {}", sym.name()),
        }
    }
}

/// Numbered disassembly of a function body, one instruction per line.
pub fn disassemble(func: &Function) -> String {
    let mut out = format!("; {}\n", func.name());
    for (pc, instr) in func.code().iter().enumerate() {
        out.push_str(&format!("{:>4}  {}\n", pc, instr));
    }
    out
}
