use std::fmt;
use std::sync::Arc;

use anyhow::Result;

use crate::scope::ScopeStack;
use crate::vm::{Environment, Instr};

use super::{Symbol, Value};

/// Native extension function. Receives arguments already popped off the data stack.
pub type NativeFunction = fn(args: &[Value], env: &mut Environment) -> Result<Value>;

#[derive(Clone)]
pub struct Function {
    pub name: Arc<str>,
    pub body: FunctionBody,
}

#[derive(Clone)]
pub enum FunctionBody {
    /// Compiled bytecode run by the VM with a full call frame.
    Script(ScriptBody),
    /// Called directly with an argument slice.
    Native(NativeFunction),
}

#[derive(Clone)]
pub struct ScriptBody {
    pub required: usize,
    pub variadic: bool,
    pub code: Arc<[Instr]>,
    /// Lexical environment captured when the closure was constructed.
    pub closure: Option<ScopeStack>,
    /// Bound to the function itself in every new frame of a named closure.
    pub self_name: Option<Symbol>,
}

impl Function {
    pub fn script(name: &str, required: usize, variadic: bool, code: Vec<Instr>) -> Self {
        Self {
            name: Arc::from(name),
            body: FunctionBody::Script(ScriptBody {
                required,
                variadic,
                code: Arc::from(code),
                closure: None,
                self_name: None,
            }),
        }
    }

    /// Make every activation see this function under `name`.
    pub fn with_self_name(mut self, name: Symbol) -> Self {
        if let FunctionBody::Script(body) = &mut self.body {
            body.self_name = Some(name);
        }
        self
    }

    pub fn native(name: &str, f: NativeFunction) -> Self {
        Self {
            name: Arc::from(name),
            body: FunctionBody::Native(f),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_native(&self) -> bool {
        matches!(self.body, FunctionBody::Native(_))
    }

    /// Instructions of a script function; empty for natives.
    pub fn code(&self) -> &[Instr] {
        match &self.body {
            FunctionBody::Script(body) => &body.code,
            FunctionBody::Native(_) => &[],
        }
    }

    pub(crate) fn code_arc(&self) -> Option<Arc<[Instr]>> {
        match &self.body {
            FunctionBody::Script(body) => Some(Arc::clone(&body.code)),
            FunctionBody::Native(_) => None,
        }
    }

    pub fn script_body(&self) -> Option<&ScriptBody> {
        match &self.body {
            FunctionBody::Script(body) => Some(body),
            FunctionBody::Native(_) => None,
        }
    }

    /// Copy of this template closing over `scope`.
    pub fn with_closure(&self, scope: ScopeStack) -> Self {
        match &self.body {
            FunctionBody::Script(body) => Self {
                name: Arc::clone(&self.name),
                body: FunctionBody::Script(ScriptBody {
                    required: body.required,
                    variadic: body.variadic,
                    code: Arc::clone(&body.code),
                    closure: Some(scope),
                    self_name: body.self_name.clone(),
                }),
            },
            FunctionBody::Native(_) => self.clone(),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Function(Arc::new(self))
    }
}

// The captured scope can reach this very function through the global layer, so
// Debug never descends into it.
impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            FunctionBody::Script(body) => f
                .debug_struct("Function")
                .field("name", &self.name)
                .field("required", &body.required)
                .field("variadic", &body.variadic)
                .field("instructions", &body.code.len())
                .field("closure", &body.closure.is_some())
                .finish(),
            FunctionBody::Native(_) => f.debug_struct("NativeFunction").field("name", &self.name).finish(),
        }
    }
}
