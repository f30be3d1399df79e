use super::*;

fn assert_idle(env: &Environment) {
    assert_eq!(env.data_stack_len(), 0, "data stack");
    assert_eq!(env.call_depth(), 0, "address stack");
    assert_eq!(env.saved_scope_depth(), 0, "saved scopes");
}

#[test]
fn test_stacks_balance_after_successful_runs() {
    let mut env = Environment::new();
    eval_in(
        &mut env,
        "(defn f [a & more] (let [b (+ a 1)] (if more (apply f more) b)))",
    );
    assert_eq!(eval_in(&mut env, "(f 1 2 3)"), Value::int(4));
    assert_eq!(eval_in(&mut env, "`(1 ~@(list 2 3) [4 ~(f 4)])").to_string(), "(1 2 3 [4 5])");
    assert_idle(&env);
    assert_eq!(env.scope().depth(), 0);
}

#[test]
fn test_clear_after_error_restores_top_level() {
    let mut env = Environment::new();
    eval_in(&mut env, r#"(defn f [] (let [a 1] (error "stop")))"#);
    assert!(env.eval_str("(f)").is_err());
    assert!(env.call_depth() > 0);
    assert!(env.stack_trace().is_some());

    env.clear();
    assert_idle(&env);
    assert_eq!(env.scope().depth(), 0);
    assert!(env.stack_trace().is_none());

    // Definitions survive the reset.
    assert!(matches!(eval_in(&mut env, "f"), Value::Function(_)));
    assert_eq!(eval_in(&mut env, "(+ 1 1)"), Value::int(2));
}

#[test]
fn test_stack_trace_lists_frames_innermost_first() {
    let mut env = Environment::new();
    eval_in(
        &mut env,
        r#"(defn inner [] (error "deep"))
           (defn outer [] (+ 1 (inner)))"#,
    );
    assert!(env.eval_str("(outer)").is_err());
    let trace = env.stack_trace().unwrap().to_string();
    let lines: Vec<&str> = trace.lines().collect();
    assert_eq!(lines[0], "error in inner:1: deep");
    assert!(lines[1].starts_with("in outer:"), "{}", trace);
    assert!(lines[2].starts_with("in toplevel:"), "{}", trace);
    env.clear();
}

#[test]
fn test_global_scope_push_and_pop() {
    let mut env = Environment::new();
    eval_in(&mut env, "(def base 1)");
    env.push_global_scope().unwrap();
    eval_in(&mut env, "(def sourced 2) (defn peek [] (+ base sourced))");
    assert_eq!(eval_in(&mut env, "(peek)"), Value::int(3));

    env.pop_global_scope().unwrap();
    assert_eq!(eval_in(&mut env, "(resolve sourced)"), Value::Nil);
    assert_eq!(eval_in(&mut env, "base"), Value::int(1));

    let err = env.pop_global_scope().unwrap_err();
    assert_eq!(vm_error(&err), Some(&VmError::StackUnderflow("global scope")));
}

#[test]
fn test_global_scope_ops_require_top_level() {
    let mut env = Environment::new();
    env.scope.push_scope();
    let err = env.push_global_scope().unwrap_err();
    assert!(err.to_string().contains("outside top level"), "{}", err);
    assert!(env.pop_global_scope().is_err());
    env.scope.pop().unwrap();
    env.push_global_scope().unwrap();
    env.pop_global_scope().unwrap();
}

#[test]
fn test_bind_global_outlives_extra_scopes() {
    let mut env = Environment::new();
    env.push_global_scope().unwrap();
    env.bind_global("shared", Value::int(5));
    env.define("transient", Value::int(6));
    env.pop_global_scope().unwrap();
    assert_eq!(env.lookup("shared").unwrap(), Value::int(5));
    assert!(env.lookup("transient").is_err());
}

#[test]
fn test_duplicate_shares_globals_and_macros() {
    let mut env = Environment::new();
    eval_in(&mut env, "(def a 1) (defmac twice [x] `(* 2 ~x))");
    let mut dup = env.duplicate();
    assert_eq!(eval_in(&mut dup, "(twice a)"), Value::int(2));

    eval_in(&mut dup, "(def b 10)");
    assert_eq!(eval_in(&mut env, "b"), Value::int(10));
    assert!(dup.scope().shares_bottom_with(env.scope()));
    assert_idle(&dup);
}

#[test]
fn test_clone_env_copies_locals() {
    let mut env = Environment::new();
    env.push_global_scope().unwrap();
    env.define("x", Value::int(1));

    let mut copy = env.clone_env();
    copy.define("x", Value::int(2));
    assert_eq!(env.lookup("x").unwrap(), Value::int(1));
    assert_eq!(copy.lookup("x").unwrap(), Value::int(2));

    // Base layer is still shared.
    copy.bind_global("seen", Value::Bool(true));
    assert_eq!(env.lookup("seen").unwrap(), Value::Bool(true));
    copy.pop_global_scope().unwrap();
}

#[test]
fn test_duplicates_run_on_threads() {
    let mut env = Environment::new();
    eval_in(&mut env, "(defn sq [x] (* x x))");
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let mut dup = env.duplicate();
            std::thread::spawn(move || dup.eval_str(&format!("(sq {})", i)).unwrap())
        })
        .collect();
    let results: Vec<Value> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results, ints(&[0, 1, 4, 9]));
}

#[test]
fn test_symbols_interned_once() {
    let env = Environment::new();
    let a = env.make_symbol("same");
    let b = env.make_symbol("same");
    assert_eq!(a.id(), b.id());
    let g = env.gen_symbol("tmp");
    assert!(g.name().starts_with("tmp"));
    assert_ne!(g.id(), a.id());
}

#[test]
fn test_trace_from_unwound_apply_is_not_reused() {
    let mut env = Environment::new();
    eval_in(&mut env, r#"(defn bad [] (error "first"))"#);
    let Value::Function(bad) = env.lookup("bad").unwrap() else {
        panic!("bad should be a function");
    };
    assert!(env.apply(&bad, &[]).is_err());
    assert!(env.stack_trace().unwrap().contains("first"));
    assert_eq!(env.call_depth(), 0);

    let err = env.eval_str("(undefined-sym)").unwrap_err();
    assert!(matches!(vm_error(&err), Some(VmError::Unbound(_))));
    let trace = env.stack_trace().unwrap().to_string();
    assert!(trace.contains("undefined-sym"), "{}", trace);
    assert!(!trace.contains("first"), "{}", trace);
    env.clear();
    assert_idle(&env);
}
