use std::fmt;

/// Typed runtime failures raised by the VM, the generator and the core builtins.
///
/// Everything travels as `anyhow::Error`; callers that need to branch on the kind
/// of failure use `err.downcast_ref::<VmError>()`, which also sees through any
/// `context` layers added while the error propagates.
#[derive(Debug, Clone, PartialEq)]
pub enum VmError {
    /// Wrong number of arguments at a call site.
    Arity {
        function: String,
        expected: usize,
        got: usize,
        variadic: bool,
        native: bool,
    },
    /// Two values whose kinds have no ordering between them.
    Uncomparable { left: &'static str, right: &'static str },
    /// A value that cannot be used as a hash key.
    Unhashable(&'static str),
    /// An operation received a value of an unsupported kind.
    Type { expected: String, got: &'static str },
    Unbound(String),
    NotAFunction(String),
    StackUnderflow(&'static str),
    StackOverflow { stack: &'static str, limit: usize },
    JumpOutOfBounds { function: String, target: isize, len: usize },
    /// Raised explicitly by interpreted code or by an extension function.
    User(String),
    /// The generator rejected a form.
    Syntax(String),
}

impl VmError {
    pub fn arity(function: impl Into<String>, expected: usize, got: usize) -> Self {
        VmError::Arity {
            function: function.into(),
            expected,
            got,
            variadic: false,
            native: false,
        }
    }

    pub fn native_arity(function: impl Into<String>, expected: usize, got: usize) -> Self {
        VmError::Arity {
            function: function.into(),
            expected,
            got,
            variadic: false,
            native: true,
        }
    }

    pub fn type_error(expected: impl Into<String>, got: &'static str) -> Self {
        VmError::Type {
            expected: expected.into(),
            got,
        }
    }

    pub fn user(msg: impl Into<String>) -> Self {
        VmError::User(msg.into())
    }

    pub fn syntax(msg: impl Into<String>) -> Self {
        VmError::Syntax(msg.into())
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::Arity {
                function,
                expected,
                got,
                variadic,
                native,
            } => {
                let kind = if *native { "native function" } else { "function" };
                if *variadic {
                    write!(
                        f,
                        "{} '{}' expects at least {} arguments, got {}",
                        kind, function, expected, got
                    )
                } else {
                    write!(f, "{} '{}' expects {} arguments, got {}", kind, function, expected, got)
                }
            }
            VmError::Uncomparable { left, right } => write!(f, "cannot compare {} to {}", left, right),
            VmError::Unhashable(kind) => write!(f, "cannot hash type {}", kind),
            VmError::Type { expected, got } => write!(f, "expected {}, got {}", expected, got),
            VmError::Unbound(name) => write!(f, "symbol `{}` not found", name),
            VmError::NotAFunction(what) => write!(f, "{} is not a function", what),
            VmError::StackUnderflow(stack) => write!(f, "{} stack underflow", stack),
            VmError::StackOverflow { stack, limit } => {
                write!(f, "{} stack overflow (limit {})", stack, limit)
            }
            VmError::JumpOutOfBounds { function, target, len } => {
                write!(f, "jump to {} out of bounds in {} (len {})", target, function, len)
            }
            VmError::User(msg) => write!(f, "{}", msg),
            VmError::Syntax(msg) => write!(f, "syntax error: {}", msg),
        }
    }
}

impl std::error::Error for VmError {}

/// Look through an `anyhow::Error` chain for the typed VM failure, if any.
pub fn vm_error(err: &anyhow::Error) -> Option<&VmError> {
    err.chain().find_map(|cause| cause.downcast_ref::<VmError>())
}
