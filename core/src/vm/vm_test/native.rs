use super::*;

fn double(args: &[Value], _env: &mut Environment) -> anyhow::Result<Value> {
    crate::vm::expect_arity("double", args, 1)?;
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(i * 2)),
        other => Err(VmError::type_error("int", other.kind_name()).into()),
    }
}

/// Calls its first argument back through `apply`.
fn call_back(args: &[Value], env: &mut Environment) -> anyhow::Result<Value> {
    crate::vm::expect_min_arity("call-back", args, 1)?;
    let Value::Function(f) = &args[0] else {
        return Err(VmError::NotAFunction(args[0].to_string()).into());
    };
    let f = Arc::clone(f);
    env.apply(&f, &args[1..])
}

#[test]
fn test_registered_native_is_callable() {
    let mut env = Environment::new();
    env.add_builtin("double", double);
    assert_eq!(eval_in(&mut env, "(double 21)"), Value::int(42));
    assert_eq!(eval_in(&mut env, "(apply double (list 4))"), Value::int(8));
}

#[test]
fn test_native_error_carries_function_name() {
    let mut env = Environment::new();
    env.add_builtin("double", double);
    let err = eval_err(&mut env, r#"(double "x")"#);
    assert!(format!("{:#}", err).contains("in native function `double`"), "{:#}", err);
    assert!(matches!(vm_error(&err), Some(VmError::Type { got: "string", .. })));
}

#[test]
fn test_native_arity_is_flagged_native() {
    let mut env = Environment::new();
    let err = eval_err(&mut env, "(not 1 2)");
    assert!(matches!(
        vm_error(&err),
        Some(VmError::Arity {
            native: true,
            expected: 1,
            got: 2,
            ..
        })
    ));
}

#[test]
fn test_native_reenters_vm_through_apply() {
    let mut env = Environment::new();
    env.add_builtin("call-back", call_back);
    eval_in(&mut env, "(defn sq [x] (* x x))");
    assert_eq!(eval_in(&mut env, "(+ 1 (call-back sq 7))"), Value::int(50));
    assert_eq!(env.call_depth(), 0);
    assert_eq!(env.data_stack_len(), 0);
}

#[test]
fn test_failed_apply_unwinds_its_frames() {
    let mut env = Environment::new();
    eval_in(&mut env, r#"(defn boom [] (error "inner failure"))"#);
    let Value::Function(f) = env.lookup("boom").unwrap() else {
        panic!("expected function");
    };
    let err = env.apply(&f, &[]).unwrap_err();
    assert_eq!(vm_error(&err), Some(&VmError::User("inner failure".into())));
    assert_eq!(env.call_depth(), 0);
    assert_eq!(env.saved_scope_depth(), 0);
    assert_eq!(env.data_stack_len(), 0);
    assert!(env.stack_trace().unwrap().contains("error in boom"));
}

#[test]
fn test_host_apply_of_script_function() {
    let mut env = Environment::new();
    eval_in(&mut env, "(defn add [a b] (+ a b))");
    let Value::Function(f) = env.lookup("add").unwrap() else {
        panic!("expected function");
    };
    let v = env.apply(&f, &[Value::int(2), Value::int(40)]).unwrap();
    assert_eq!(v, Value::int(42));
    assert_eq!(env.call_depth(), 0);
}

#[test]
fn test_pre_and_post_hooks_fire() {
    let mut env = Environment::new();
    let seen = Arc::new(Mutex::new(Vec::<String>::new()));

    let pre = Arc::clone(&seen);
    env.add_pre_hook(Arc::new(move |name: &str, args: &[Value]| {
        pre.lock().unwrap().push(format!("pre {} {}", name, args.len()));
    }));
    let post = Arc::clone(&seen);
    env.add_post_hook(Arc::new(move |name: &str, ret: &[Value]| {
        post.lock().unwrap().push(format!("post {} {}", name, ret[0]));
    }));

    eval_in(&mut env, "(defn inc [x] (+ x 1))");
    seen.lock().unwrap().clear();
    eval_in(&mut env, "(inc 1)");

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            "pre inc 1".to_string(),
            "pre + 2".to_string(),
            "post + 2".to_string(),
            "post inc 2".to_string(),
        ]
    );
}
