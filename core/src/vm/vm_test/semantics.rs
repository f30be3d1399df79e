use super::*;

#[test]
fn test_add_literal_program() {
    assert_eq!(eval("(+ 1 2)"), Value::int(3));
}

#[test]
fn test_let_set_program() {
    assert_eq!(eval("(let [x 5] (set! x (+ x 1)) x)"), Value::int(6));
}

#[test]
fn test_variadic_rest_program() {
    let v = eval("(defn f [a & rest] rest) (f 1 2 3)");
    assert_eq!(v, Value::list(ints(&[2, 3])));
}

#[test]
fn test_arithmetic_promotion() {
    assert_eq!(eval("(+ 1 2.5)"), Value::Float(3.5));
    assert_eq!(eval("(/ 10 2)"), Value::int(5));
    assert_eq!(eval("(/ 1 2)"), Value::Float(0.5));
    assert_eq!(eval("(- 4)"), Value::int(-4));
    assert_eq!(eval("(mod -7 3)"), Value::int(2));
    assert_eq!(eval("(* 99999999999 99999999999)").to_string(), "9999999999800000000001");
}

#[test]
fn test_division_by_zero_is_user_error() {
    let mut env = Environment::new();
    let err = eval_err(&mut env, "(/ 1 0)");
    assert!(matches!(vm_error(&err), Some(VmError::User(msg)) if msg == "division by zero"));
}

#[test]
fn test_comparisons() {
    assert_eq!(eval("(< 1 2 3)"), Value::Bool(true));
    assert_eq!(eval("(< 1 3 2)"), Value::Bool(false));
    assert_eq!(eval("(>= 2 2.0)"), Value::Bool(true));
    assert_eq!(eval("(= 1 1.0)"), Value::Bool(true));
    assert_eq!(eval(r#"(= "a" "a")"#), Value::Bool(true));
    assert_eq!(eval("(not= 1 2)"), Value::Bool(true));
}

#[test]
fn test_cross_kind_comparison_names_both_kinds() {
    let mut env = Environment::new();
    let err = eval_err(&mut env, r#"(< 1 "a")"#);
    assert_eq!(
        vm_error(&err),
        Some(&VmError::Uncomparable {
            left: "int",
            right: "string"
        })
    );
}

#[test]
fn test_quote_keeps_forms_unevaluated() {
    let mut env = Environment::new();
    let v = eval_in(&mut env, "'(a (b 1))");
    let expected = Value::list([
        sym(&env, "a"),
        Value::list([sym(&env, "b"), Value::int(1)]),
    ]);
    assert_eq!(v, expected);
}

#[test]
fn test_quoted_array_is_fresh_each_time() {
    let mut env = Environment::new();
    eval_in(&mut env, "(defn mk [] '[1 2])");
    let a = eval_in(&mut env, "(mk)");
    let b = eval_in(&mut env, "(mk)");
    let (Value::Array(a), Value::Array(b)) = (a, b) else {
        panic!("expected arrays");
    };
    assert!(!Arc::ptr_eq(&a, &b));
}

#[test]
fn test_syntax_quote_unquote_and_splice() {
    let mut env = Environment::new();
    let v = eval_in(&mut env, "(def xs (list 1 2)) `(a ~(+ 1 2) ~@xs b)");
    let expected = Value::list([
        sym(&env, "a"),
        Value::int(3),
        Value::int(1),
        Value::int(2),
        sym(&env, "b"),
    ]);
    assert_eq!(v, expected);
}

#[test]
fn test_syntax_quote_array_and_hash() {
    let mut env = Environment::new();
    let v = eval_in(&mut env, "`[1 ~(+ 1 1) ~@(list 3 4)]");
    assert_eq!(v.array_items().unwrap(), ints(&[1, 2, 3, 4]));

    let v = eval_in(&mut env, r#"`{"k" ~(* 2 21)}"#);
    let Value::Hash(map) = v else { panic!("expected hash") };
    assert_eq!(map.read().unwrap().get(&Value::str("k")).unwrap(), Some(&Value::int(42)));
}

#[test]
fn test_splice_outside_list_is_syntax_error() {
    let mut env = Environment::new();
    let err = eval_err(&mut env, "`~@(list 1)");
    assert!(matches!(vm_error(&err), Some(VmError::Syntax(_))));
}

#[test]
fn test_array_and_hash_literals_evaluate_elements() {
    let v = eval("[(+ 1 1) (* 2 2)]");
    assert_eq!(v.array_items().unwrap(), ints(&[2, 4]));

    let v = eval(r#"{"a" (+ 1 2) "b" nil}"#);
    let Value::Hash(map) = v else { panic!("expected hash") };
    let map = map.read().unwrap();
    assert_eq!(map.get(&Value::str("a")).unwrap(), Some(&Value::int(3)));
    assert_eq!(map.get(&Value::str("b")).unwrap(), Some(&Value::Nil));
}

#[test]
fn test_array_hash_key_is_type_error() {
    let mut env = Environment::new();
    let err = eval_err(&mut env, "(hash [1 2] 3)");
    assert_eq!(vm_error(&err), Some(&VmError::Unhashable("array")));
    let err = eval_err(&mut env, "(hash (hash) 3)");
    assert_eq!(vm_error(&err), Some(&VmError::Unhashable("hash")));
}

#[test]
fn test_macro_expansion() {
    let mut env = Environment::new();
    eval_in(&mut env, "(defmac my-unless [c body] `(if ~c nil ~body))");
    assert_eq!(eval_in(&mut env, "(my-unless false 42)"), Value::int(42));
    assert_eq!(eval_in(&mut env, "(my-unless true 42)"), Value::Nil);

    let expanded = eval_in(&mut env, "(macroexpand (my-unless false 42))");
    let expected = Value::list([sym(&env, "if"), Value::Bool(false), Value::Nil, Value::int(42)]);
    assert_eq!(expanded, expected);
}

#[test]
fn test_macro_with_rest_args_and_gensym() {
    let mut env = Environment::new();
    eval_in(
        &mut env,
        "(defmac my-let1 [name value & body] `(let [~name ~value] ~@body))",
    );
    assert_eq!(eval_in(&mut env, "(my-let1 y 4 (+ y 1) (* y 2))"), Value::int(8));

    let a = eval_in(&mut env, "(gensym)");
    let b = eval_in(&mut env, "(gensym)");
    assert_ne!(a, b);
}

#[test]
fn test_local_binding_shadows_macro() {
    let mut env = Environment::new();
    eval_in(&mut env, "(defmac twice [x] `(* 2 ~x))");
    assert_eq!(eval_in(&mut env, "(twice 5)"), Value::int(10));
    let v = eval_in(&mut env, "(let [twice (fn [x] (+ x x x))] (twice 5))");
    assert_eq!(v, Value::int(15));
}

#[test]
fn test_list_builtins() {
    assert_eq!(eval("(first (list 1 2))"), Value::int(1));
    assert_eq!(eval("(rest (list 1 2))"), Value::list(ints(&[2])));
    assert_eq!(eval("(second (list 1 2))"), Value::int(2));
    assert_eq!(eval("(cons 0 (list 1))"), Value::list(ints(&[0, 1])));
    assert_eq!(eval("(len (list 1 2 3))"), Value::int(3));
    assert_eq!(eval("(append (list 1) 2)"), Value::list(ints(&[1, 2])));
    assert_eq!(eval("(concat (list 1) (list 2 3))"), Value::list(ints(&[1, 2, 3])));
    assert_eq!(eval("(reverse (list 1 2 3))"), Value::list(ints(&[3, 2, 1])));
    assert_eq!(eval("(list? nil)"), Value::Bool(true));
    assert_eq!(eval("(null? (list))"), Value::Bool(true));
    assert_eq!(eval(r#"(str "a" 1 #\b)"#), Value::str("a1b"));
    assert_eq!(eval(r#"(symbol "zz")"#).to_string(), "zz");
    assert_eq!(eval("(type 1.5)").to_string(), "float");
}
