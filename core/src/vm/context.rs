use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::Result;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::error::VmError;
use crate::reader;
use crate::scope::ScopeStack;
use crate::val::{Function, NativeFunction, Symbol, Value};

use super::bytecode::{Instr, disassemble};
use super::compiler::Generator;
use super::config::VmConfig;
use super::stacks::{AddressStack, DataStack, ScopeStackStack, set_pool_limits};
use super::symbols::SymbolTable;

/// Sentinel program counter: the frame below returns to the host.
pub const HALT: usize = usize::MAX;

/// Called with the function name and either the pending arguments (pre) or
/// the returned value (post).
pub type Hook = Arc<dyn Fn(&str, &[Value]) + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub(crate) pre: Vec<Hook>,
    pub(crate) post: Vec<Hook>,
}

/// One independent execution context.
///
/// - owns the data stack, the address stack and the stack of saved scope stacks;
/// - holds the current scope stack, function and program counter;
/// - shares the symbol table, builtins and macros with every environment
///   duplicated from it.
pub struct Environment {
    pub(crate) data: DataStack,
    pub(crate) addrs: AddressStack,
    pub(crate) saved_scopes: ScopeStackStack,
    pub(crate) scope: ScopeStack,
    pub(crate) extra_globals: usize,
    pub(crate) symbols: Arc<SymbolTable>,
    pub(crate) builtins: Arc<DashMap<u32, Value>>,
    pub(crate) macros: Arc<DashMap<u32, Arc<Function>>>,
    pub(crate) hooks: Hooks,
    pub(crate) cur: Arc<Function>,
    pub(crate) pc: usize,
    pub(crate) config: VmConfig,
    pub(crate) trace: Option<String>,
    /// Run loops currently nested on the native stack through `run`/`apply`.
    pub(crate) nested_runs: usize,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

fn main_function() -> Arc<Function> {
    Arc::new(Function::script("__main", 0, false, Vec::new()))
}

impl Environment {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(config: VmConfig) -> Self {
        set_pool_limits(config.pool_limit);
        let mut env = Self::from_parts(
            ScopeStack::new(),
            0,
            Arc::new(SymbolTable::new()),
            Arc::new(DashMap::new()),
            Arc::new(DashMap::new()),
            Hooks::default(),
            config,
        );
        super::builtins::install(&mut env);
        env
    }

    fn from_parts(
        scope: ScopeStack,
        extra_globals: usize,
        symbols: Arc<SymbolTable>,
        builtins: Arc<DashMap<u32, Value>>,
        macros: Arc<DashMap<u32, Arc<Function>>>,
        hooks: Hooks,
        config: VmConfig,
    ) -> Self {
        Self {
            data: DataStack::new_data(config.initial_data_stack, config.max_data_stack),
            addrs: AddressStack::new_address(config.initial_call_stack, config.max_call_depth),
            saved_scopes: ScopeStackStack::new_scopes(config.initial_scope_stacks, config.max_call_depth),
            scope,
            extra_globals,
            symbols,
            builtins,
            macros,
            hooks,
            cur: main_function(),
            pc: HALT,
            config,
            trace: None,
            nested_runs: 0,
        }
    }

    /// Fresh stacks over the same globals, symbols, builtins and macros.
    pub fn duplicate(&self) -> Self {
        Self::from_parts(
            self.scope.fork_globals(),
            self.extra_globals,
            Arc::clone(&self.symbols),
            Arc::clone(&self.builtins),
            Arc::clone(&self.macros),
            self.hooks.clone(),
            self.config.clone(),
        )
    }

    /// Like `duplicate`, but the current lexical environment is deep-copied
    /// instead of reduced to the globals.
    pub fn clone_env(&self) -> Self {
        let extra_globals = self.extra_globals;
        Self::from_parts(
            self.scope.deep_clone(),
            extra_globals,
            Arc::clone(&self.symbols),
            Arc::clone(&self.builtins),
            Arc::clone(&self.macros),
            self.hooks.clone(),
            self.config.clone(),
        )
    }

    #[inline]
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn symbols(&self) -> &Arc<SymbolTable> {
        &self.symbols
    }

    pub fn make_symbol(&self, name: &str) -> Symbol {
        self.symbols.intern(name)
    }

    pub fn gen_symbol(&self, prefix: &str) -> Symbol {
        self.symbols.gensym(prefix)
    }

    /// Register a native function under `name`.
    pub fn add_builtin(&mut self, name: &str, f: NativeFunction) {
        let sym = self.make_symbol(name);
        self.builtins.insert(sym.id(), Function::native(name, f).into_value());
    }

    pub fn add_macro(&mut self, name: &str, f: Arc<Function>) {
        let sym = self.make_symbol(name);
        self.macros.insert(sym.id(), f);
    }

    pub fn find_macro(&self, sym: &Symbol) -> Option<Arc<Function>> {
        self.macros.get(&sym.id()).map(|m| Arc::clone(m.value()))
    }

    pub fn add_pre_hook(&mut self, hook: Hook) {
        self.hooks.pre.push(hook);
    }

    pub fn add_post_hook(&mut self, hook: Hook) {
        self.hooks.post.push(hook);
    }

    /// Bind `name` in the current top scope.
    pub fn define(&mut self, name: &str, value: Value) {
        let sym = self.make_symbol(name);
        self.scope.bind(&sym, value);
    }

    /// Bind `name` in the base global layer shared by every duplicate.
    pub fn bind_global(&mut self, name: &str, value: Value) {
        let sym = self.make_symbol(name);
        self.scope.bind_global(&sym, value);
    }

    /// Scope chain first, then registered builtins.
    pub fn resolve(&self, sym: &Symbol) -> Result<Value> {
        self.try_resolve(sym)
            .ok_or_else(|| VmError::Unbound(sym.name().to_string()).into())
    }

    pub(crate) fn try_resolve(&self, sym: &Symbol) -> Option<Value> {
        self.scope
            .try_lookup(sym.id())
            .or_else(|| self.builtins.get(&sym.id()).map(|v| v.value().clone()))
    }

    pub fn lookup(&self, name: &str) -> Result<Value> {
        let sym = self.make_symbol(name);
        self.resolve(&sym)
    }

    /// Open another global-level layer, e.g. for a sourced file.
    pub fn push_global_scope(&mut self) -> Result<()> {
        self.check_top_level("push-global-scope")?;
        self.scope.push_global_scope();
        self.extra_globals += 1;
        Ok(())
    }

    pub fn pop_global_scope(&mut self) -> Result<()> {
        self.check_top_level("pop-global-scope")?;
        if self.extra_globals == 0 {
            return Err(VmError::StackUnderflow("global scope").into());
        }
        self.scope.pop()?;
        self.extra_globals -= 1;
        Ok(())
    }

    fn check_top_level(&self, what: &str) -> Result<()> {
        let depth = self.scope.depth();
        if depth != self.extra_globals {
            return Err(VmError::user(format!(
                "{} outside top level: scope depth {} but {} extra globals",
                what, depth, self.extra_globals
            ))
            .into());
        }
        Ok(())
    }

    pub fn scope(&self) -> &ScopeStack {
        &self.scope
    }

    #[inline]
    pub fn data_stack_len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn call_depth(&self) -> usize {
        self.addrs.len()
    }

    #[inline]
    pub fn saved_scope_depth(&self) -> usize {
        self.saved_scopes.len()
    }

    /// Reset after an uncaught error: stacks emptied, the top-level lexical
    /// view restored. Symbols, builtins, macros and globals survive.
    pub fn clear(&mut self) {
        debug!(
            target: "kelp::vm",
            data = self.data.len(),
            calls = self.addrs.len(),
            "clearing environment"
        );
        self.data.clear();
        self.addrs.clear();
        while let Ok(saved) = self.saved_scopes.pop() {
            self.scope = saved;
        }
        while self.scope.depth() > self.extra_globals {
            if self.scope.pop().is_err() {
                break;
            }
        }
        self.cur = main_function();
        self.pc = HALT;
        self.trace = None;
        self.nested_runs = 0;
    }

    /// Start of a host-level evaluation: a trace left by an earlier error that
    /// was already unwound must not be reported for the next one.
    pub(crate) fn begin_outermost(&mut self) {
        if self.addrs.is_empty() {
            self.trace = None;
        }
    }

    /// Account for one more run loop on the native stack.
    pub(crate) fn enter_nested(&mut self) -> Result<()> {
        let limit = self.config.max_reentry_depth;
        if self.nested_runs >= limit {
            warn!(target: "kelp::vm", limit, "nested run limit reached");
            return Err(VmError::StackOverflow { stack: "native", limit }.into());
        }
        self.nested_runs += 1;
        Ok(())
    }

    pub(crate) fn leave_nested(&mut self) {
        self.nested_runs = self.nested_runs.saturating_sub(1);
    }

    /// Trace captured for the most recent uncaught error.
    pub fn stack_trace(&self) -> Option<&str> {
        self.trace.as_deref()
    }

    pub(crate) fn record_trace(&mut self, err: &anyhow::Error) {
        if self.trace.is_some() {
            return;
        }
        let mut out = String::new();
        let _ = writeln!(out, "error in {}:{}: {}", self.cur.name(), pc_label(self.pc), err);
        for addr in self.addrs.iter_top_down() {
            let _ = writeln!(out, "in {}:{}", addr.func.name(), pc_label(addr.pc));
        }
        debug!(target: "kelp::vm", "{}", out.trim_end());
        self.trace = Some(out);
    }

    /// Compile one parsed expression into a top-level function.
    pub fn compile(&mut self, expr: &Value) -> Result<Function> {
        Generator::new(self).compile_toplevel(expr)
    }

    /// Read, compile and run every form in `src`; yields the last value.
    pub fn eval_str(&mut self, src: &str) -> Result<Value> {
        let forms = reader::read_all(src, &self.symbols)?;
        let mut last = Value::Nil;
        for form in forms {
            last = self.eval(&form)?;
        }
        Ok(last)
    }

    /// Disassembly listing of `f` and every function literal it embeds.
    pub fn dump_function(&self, f: &Function) -> String {
        let mut out = disassemble(f);
        for instr in f.code() {
            let nested = match instr {
                Instr::PushClosure(inner) => Some(Arc::clone(inner)),
                Instr::Push(Value::Function(inner)) if !inner.is_native() => Some(Arc::clone(inner)),
                _ => None,
            };
            if let Some(inner) = nested {
                out.push('\n');
                out.push_str(&self.dump_function(&inner));
            }
        }
        out
    }

    pub fn eval(&mut self, expr: &Value) -> Result<Value> {
        self.begin_outermost();
        let f = self.compile(expr)?;
        self.run(&Arc::new(f))
    }
}

fn pc_label(pc: usize) -> String {
    if pc == HALT { "top".to_string() } else { pc.to_string() }
}
