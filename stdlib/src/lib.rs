pub mod collections;
pub mod concurrency;
pub mod io;
pub mod json;
pub mod math;
pub mod string;

#[cfg(test)]
mod string_test;

use anyhow::Result;
use kelp_core::{Environment, VmError, Value, val::NativeFunction};
use tracing::debug;

/// A named group of extension functions.
pub trait Module: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Every function this module provides, under its script-visible name.
    fn exports(&self) -> Vec<(&'static str, NativeFunction)>;

    fn register(&self, env: &mut Environment) {
        let exports = self.exports();
        debug!(target: "kelp::stdlib", module = self.name(), count = exports.len(), "registering module");
        for (name, f) in exports {
            env.add_builtin(name, f);
        }
    }
}

/// Every stdlib module, in registration order.
pub fn modules() -> Vec<Box<dyn Module>> {
    vec![
        Box::new(string::StringModule::new()),
        Box::new(math::MathModule::new()),
        Box::new(collections::CollectionsModule::new()),
        Box::new(json::JsonModule::new()),
        Box::new(io::IoModule::new()),
        Box::new(concurrency::ConcurrencyModule::new()),
    ]
}

/// Register all stdlib functions with the given environment. Builtins are
/// shared, so duplicates made afterwards see them too.
pub fn register_stdlib(env: &mut Environment) {
    for module in modules() {
        module.register(env);
    }
}

/// The `i`th argument as a string slice.
pub(crate) fn str_arg<'a>(name: &str, args: &'a [Value], i: usize) -> Result<&'a str> {
    args[i]
        .as_str()
        .ok_or_else(|| VmError::type_error(format!("string argument to {}", name), args[i].kind_name()).into())
}

/// The `i`th argument as a non-negative index.
pub(crate) fn index_arg(name: &str, args: &[Value], i: usize) -> Result<usize> {
    use anyhow::Context;
    args[i].as_index().with_context(|| format!("bad index argument to {}", name))
}
