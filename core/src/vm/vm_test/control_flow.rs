use super::*;

#[test]
fn test_if_branches_on_truthiness() {
    assert_eq!(eval("(if 0 'yes 'no)").to_string(), "yes");
    assert_eq!(eval(r#"(if "" 1 2)"#), Value::int(1));
    assert_eq!(eval("(if nil 1 2)"), Value::int(2));
    assert_eq!(eval("(if false 1)"), Value::Nil);
}

#[test]
fn test_cond_picks_first_match() {
    let mut env = Environment::new();
    eval_in(
        &mut env,
        "(defn classify [n]
           (cond (< n 0) 'negative
                 (= n 0) 'zero
                 else 'positive))",
    );
    assert_eq!(eval_in(&mut env, "(classify -3)").to_string(), "negative");
    assert_eq!(eval_in(&mut env, "(classify 0)").to_string(), "zero");
    assert_eq!(eval_in(&mut env, "(classify 9)").to_string(), "positive");
    assert_eq!(eval("(cond false 1)"), Value::Nil);
    assert_eq!(eval("(cond false 1 true 2)"), Value::int(2));
}

#[test]
fn test_cond_with_odd_forms_is_rejected() {
    let mut env = Environment::new();
    let err = eval_err(&mut env, "(cond true)");
    assert!(matches!(vm_error(&err), Some(VmError::Syntax(_))));
}

#[test]
fn test_and_or_short_circuit() {
    let mut env = Environment::new();
    eval_in(&mut env, "(def hits 0) (defn hit [v] (set! hits (+ hits 1)) v)");

    assert_eq!(eval_in(&mut env, "(and (hit 1) (hit false) (hit 3))"), Value::Bool(false));
    assert_eq!(eval_in(&mut env, "hits"), Value::int(2));

    assert_eq!(eval_in(&mut env, "(or (hit nil) (hit 7) (hit 8))"), Value::int(7));
    assert_eq!(eval_in(&mut env, "hits"), Value::int(4));

    assert_eq!(eval("(and)"), Value::Bool(true));
    assert_eq!(eval("(or)"), Value::Nil);
    assert_eq!(eval("(and 1 2)"), Value::int(2));
}

#[test]
fn test_when_and_unless() {
    assert_eq!(eval("(when true 1 2)"), Value::int(2));
    assert_eq!(eval("(when false 1 2)"), Value::Nil);
    assert_eq!(eval("(unless false 'ran)").to_string(), "ran");
    assert_eq!(eval("(unless 1 'ran)"), Value::Nil);
}

#[test]
fn test_do_sequences_and_yields_last() {
    assert_eq!(eval("(do 1 2 3)"), Value::int(3));
    assert_eq!(eval("(do)"), Value::Nil);
    assert_eq!(eval("(begin (def a 4) (* a a))"), Value::int(16));
}

#[test]
fn test_assert_passes_and_fails() {
    assert_eq!(eval("(assert (= 1 1))"), Value::Bool(true));

    let mut env = Environment::new();
    let err = eval_err(&mut env, r#"(assert (= 1 2) "numbers differ")"#);
    assert_eq!(vm_error(&err), Some(&VmError::User("numbers differ".into())));

    let err = eval_err(&mut env, "(assert false)");
    assert!(err.to_string().starts_with("assertion failed"), "{}", err);
}

#[test]
fn test_error_raises_user_message() {
    let mut env = Environment::new();
    let err = eval_err(&mut env, r#"(error (str "bad " 42))"#);
    assert_eq!(vm_error(&err), Some(&VmError::User("bad 42".into())));
    assert_eq!(err.to_string(), "bad 42");
}

#[test]
fn test_resolve_yields_binding_or_nil() {
    let mut env = Environment::new();
    eval_in(&mut env, "(def present 5)");
    assert_eq!(eval_in(&mut env, "(resolve present)"), Value::int(5));
    assert_eq!(eval_in(&mut env, "(resolve 'present)"), Value::int(5));
    assert_eq!(eval_in(&mut env, "(resolve missing)"), Value::Nil);
    assert!(matches!(eval_in(&mut env, "(resolve +)"), Value::Function(_)));
}

#[test]
fn test_unbound_symbol() {
    let mut env = Environment::new();
    let err = eval_err(&mut env, "(+ 1 nowhere)");
    assert_eq!(vm_error(&err), Some(&VmError::Unbound("nowhere".into())));
    assert_eq!(err.to_string(), "symbol `nowhere` not found");
}

#[test]
fn test_let_scopes_do_not_leak() {
    let mut env = Environment::new();
    assert_eq!(eval_in(&mut env, "(let [a 1 b (+ a 1)] (list a b))"), Value::list(ints(&[1, 2])));
    let err = eval_err(&mut env, "a");
    assert!(matches!(vm_error(&err), Some(VmError::Unbound(_))));
    assert_eq!(env.scope().depth(), 0);
}

#[test]
fn test_def_inside_let_is_local() {
    let mut env = Environment::new();
    assert_eq!(eval_in(&mut env, "(let [] (def inner 3) inner)"), Value::int(3));
    assert_eq!(eval_in(&mut env, "(resolve inner)"), Value::Nil);
}

#[test]
fn test_special_form_misuse_is_syntax_error() {
    let mut env = Environment::new();
    for src in ["(if)", "(let [a] a)", "(def 1 2)", "(fn [1] 1)", "~x", "(set! x)"] {
        let err = eval_err(&mut env, src);
        assert!(matches!(vm_error(&err), Some(VmError::Syntax(_))), "{}: {}", src, err);
    }
}
