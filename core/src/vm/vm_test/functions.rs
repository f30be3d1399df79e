use super::*;

#[test]
fn test_arity_mismatch_names_expected_count() {
    let mut env = Environment::new();
    eval_in(&mut env, "(defn two [a b] a)");
    for src in ["(two 1)", "(two 1 2 3)"] {
        let err = eval_err(&mut env, src);
        match vm_error(&err) {
            Some(VmError::Arity {
                function,
                expected,
                native,
                ..
            }) => {
                assert_eq!(function, "two");
                assert_eq!(*expected, 2);
                assert!(!native);
            }
            other => panic!("expected arity error, got {:?}", other),
        }
        assert!(err.to_string().contains("expects 2 arguments"), "{}", err);
    }
}

#[test]
fn test_variadic_receives_nil_or_list() {
    let mut env = Environment::new();
    eval_in(&mut env, "(defn v [a & more] more)");
    assert_eq!(eval_in(&mut env, "(v 1)"), Value::Nil);
    assert_eq!(eval_in(&mut env, "(v 1 2 3 4)"), Value::list(ints(&[2, 3, 4])));

    let err = eval_err(&mut env, "(v)");
    assert!(matches!(
        vm_error(&err),
        Some(VmError::Arity {
            expected: 1,
            got: 0,
            variadic: true,
            ..
        })
    ));
}

#[test]
fn test_tail_recursion_is_bounded() {
    let cfg = VmConfig {
        max_call_depth: 200,
        ..VmConfig::default()
    };
    let mut env = Environment::with_config(cfg);
    eval_in(
        &mut env,
        "(defn sum [n acc] (if (= n 0) acc (sum (- n 1) (+ acc n))))",
    );
    let v = eval_in(&mut env, "(sum 50000 0)");
    assert_eq!(v, Value::int(1_250_025_000));
    assert_eq!(env.call_depth(), 0);
}

#[test]
fn test_tail_call_inside_let_pops_scopes() {
    let mut env = Environment::with_config(VmConfig {
        max_call_depth: 50,
        ..VmConfig::default()
    });
    eval_in(
        &mut env,
        "(defn loop-let [n] (let [m (- n 1)] (let [k m] (if (< k 0) 'done (loop-let k)))))",
    );
    assert_eq!(eval_in(&mut env, "(loop-let 20000)").to_string(), "done");
    assert_eq!(env.data_stack_len(), 0);
}

#[test]
fn test_variadic_tail_call_wrangles_like_a_call() {
    let mut env = Environment::with_config(VmConfig {
        max_call_depth: 50,
        ..VmConfig::default()
    });
    eval_in(
        &mut env,
        "(defn count-args [n & xs] (if (= n 0) xs (count-args (- n 1) n n)))",
    );
    assert_eq!(eval_in(&mut env, "(count-args 1000 0)"), Value::list(ints(&[1, 1])));
}

#[test]
fn test_non_tail_recursion_overflows() {
    let cfg = VmConfig {
        max_call_depth: 200,
        ..VmConfig::default()
    };
    let mut env = Environment::with_config(cfg);
    eval_in(
        &mut env,
        "(defn count-down [n] (if (= n 0) 0 (+ 1 (count-down (- n 1)))))",
    );
    assert_eq!(eval_in(&mut env, "(count-down 100)"), Value::int(100));

    let err = eval_err(&mut env, "(count-down 1000)");
    assert!(matches!(
        vm_error(&err),
        Some(VmError::StackOverflow { limit: 200, .. })
    ));
}

#[test]
fn test_shadowed_self_name_is_a_normal_call() {
    let mut env = Environment::new();
    eval_in(&mut env, "(defn f [f] (f 10))");
    assert_eq!(eval_in(&mut env, "(f (fn [x] (* x 3)))"), Value::int(30));
}

#[test]
fn test_closure_isolated_from_later_bind() {
    let mut env = Environment::new();
    let v = eval_in(
        &mut env,
        "(let [x 1]
           (def g (fn [] x))
           (def x 2)
           (list (g) x))",
    );
    assert_eq!(v, Value::list(ints(&[1, 2])));
}

#[test]
fn test_set_visible_through_closure() {
    let mut env = Environment::new();
    let v = eval_in(
        &mut env,
        "(let [x 1]
           (def g (fn [] x))
           (set! x 2)
           (g))",
    );
    assert_eq!(v, Value::int(2));
}

#[test]
fn test_closure_counter_keeps_state() {
    let mut env = Environment::new();
    eval_in(
        &mut env,
        "(defn counter [] (let [n 0] (fn [] (set! n (+ n 1)) n)))
         (def c (counter))
         (def d (counter))",
    );
    eval_in(&mut env, "(c)");
    assert_eq!(eval_in(&mut env, "(c)"), Value::int(2));
    assert_eq!(eval_in(&mut env, "(d)"), Value::int(1));
}

#[test]
fn test_named_local_function_recurses() {
    let v = eval(
        "(let [k 10]
           (defn fact [n] (if (= n 0) 1 (* n (fact (- n 1)))))
           (+ k (fact 5)))",
    );
    assert_eq!(v, Value::int(130));

    let v = eval("((fn fib [n] (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2))))) 10)");
    assert_eq!(v, Value::int(55));
}

#[test]
fn test_dispatch_on_computed_function() {
    assert_eq!(eval("((if true + *) 3 4)"), Value::int(7));
    let mut env = Environment::new();
    let err = eval_err(&mut env, "((list 1) 2)");
    assert!(matches!(vm_error(&err), Some(VmError::NotAFunction(_))));
}

#[test]
fn test_higher_order_apply() {
    assert_eq!(eval("(apply + 1 2 (list 3 4))"), Value::int(10));
    assert_eq!(eval("(defn add3 [a b c] (+ a b c)) (apply add3 [1 2 3])"), Value::int(6));
}

#[test]
fn test_bind_fn_uses_runtime_name() {
    let mut env = Environment::new();
    eval_in(&mut env, r#"(bind-fn (symbol "dyn") (fn [x] (* x 2)))"#);
    assert_eq!(eval_in(&mut env, "(dyn 21)"), Value::int(42));

    let err = eval_err(&mut env, r#"(bind-fn (symbol "bad") 5)"#);
    assert!(matches!(vm_error(&err), Some(VmError::NotAFunction(_))));
}

#[test]
fn test_function_display() {
    let mut env = Environment::new();
    assert_eq!(eval_in(&mut env, "(defn named [] 1)").to_string(), "<fn named>");
    assert_eq!(eval_in(&mut env, "(fn [] 1)").to_string(), "<fn lambda>");
    assert_eq!(eval_in(&mut env, "+").to_string(), "<native fn +>");
}

#[test]
fn test_tail_loop_carrying_closures_keeps_frames_flat() {
    let mut env = Environment::new();
    eval_in(&mut env, "(defn lp [n acc] (if (= n 0) acc (lp (- n 1) (fn [] n))))");
    let last = eval_in(&mut env, "(lp 100000 nil)");
    let Value::Function(f) = &last else {
        panic!("expected a closure, got {}", last);
    };
    let captured = f.script_body().unwrap().closure.as_ref().unwrap();
    assert_eq!(captured.depth(), 1);
    assert_eq!(env.apply(f, &[]).unwrap(), Value::int(1));
    assert_eq!(env.scope().depth(), 0);
    // Releases a chain of 100000 closures, each holding the previous one.
    drop(last);
}

#[test]
fn test_recursion_through_apply_is_bounded() {
    let mut env = Environment::with_config(VmConfig {
        max_reentry_depth: 16,
        ..VmConfig::default()
    });
    eval_in(&mut env, "(defn f [n] (if (= n 0) 0 (+ 1 (apply f (list (- n 1))))))");
    assert_eq!(eval_in(&mut env, "(f 10)"), Value::int(10));

    let err = eval_err(&mut env, "(f 100)");
    assert!(
        matches!(
            vm_error(&err),
            Some(VmError::StackOverflow {
                stack: "native",
                limit: 16
            })
        ),
        "{:#}",
        err
    );
    assert_eq!(eval_in(&mut env, "(f 3)"), Value::int(3));
}

#[test]
fn test_named_local_closure_is_released() {
    let mut env = Environment::new();
    eval_in(
        &mut env,
        "(defn make [payload] (fn helper [n] (if (= n 0) payload (helper (- n 1)))))",
    );
    let payload = Value::array(vec![Value::int(7)]);
    let Value::Array(shared) = &payload else { unreachable!() };
    env.bind_global("p", payload.clone());

    eval_in(&mut env, "(def h (make p))");
    assert_eq!(eval_in(&mut env, "(h 3)").to_string(), "[7]");
    assert_eq!(eval_in(&mut env, "((make p) 2)").to_string(), "[7]");

    eval_in(&mut env, "(def h nil) (def p nil)");
    assert_eq!(Arc::strong_count(shared), 1);
}
