use super::*;

fn run_code(env: &mut Environment, code: Vec<Instr>) -> anyhow::Result<Value> {
    let f = Arc::new(Function::script("hand", 0, false, code));
    let result = env.run(&f);
    if result.is_err() {
        env.clear();
    }
    result
}

#[test]
fn test_if_disassembly_uses_relative_offsets() {
    let mut env = Environment::new();
    let form = read_one("(if x 1 2)", env.symbols()).unwrap();
    let f = env.compile(&form).unwrap();
    let listing = crate::vm::disassemble(&f);
    let lines: Vec<&str> = listing.lines().map(str::trim).collect();
    assert_eq!(
        lines,
        vec![
            "; toplevel",
            "0  get x",
            "1  branch-false +3",
            "2  push 1",
            "3  jump +2",
            "4  push 2",
            "5  return",
        ]
    );
}

#[test]
fn test_dump_function_includes_nested_bodies() {
    let mut env = Environment::new();
    let form = read_one("(fn [a] (fn [b] (+ a b)))", env.symbols()).unwrap();
    let f = env.compile(&form).unwrap();
    let dump = env.dump_function(&f);
    assert_eq!(dump.matches("; lambda").count(), 2, "{}", dump);
    assert!(dump.contains("push-closure lambda"), "{}", dump);
    assert!(dump.contains("put b"), "{}", dump);
}

#[test]
fn test_falling_off_the_end_returns_top() {
    let mut env = Environment::new();
    let v = run_code(&mut env, vec![Instr::Push(Value::int(7))]).unwrap();
    assert_eq!(v, Value::int(7));
    let v = run_code(
        &mut env,
        vec![Instr::Goto(2), Instr::Push(Value::int(1)), Instr::Push(Value::int(2))],
    )
    .unwrap();
    assert_eq!(v, Value::int(2));
    assert_eq!(env.data_stack_len(), 0);
}

#[test]
fn test_jump_out_of_bounds() {
    let mut env = Environment::new();
    let err = run_code(&mut env, vec![Instr::Jump(10)]).unwrap_err();
    assert_eq!(
        vm_error(&err),
        Some(&VmError::JumpOutOfBounds {
            function: "hand".into(),
            target: 10,
            len: 1,
        })
    );
    let err = run_code(&mut env, vec![Instr::Push(Value::Nil), Instr::Jump(-5)]).unwrap_err();
    assert!(matches!(vm_error(&err), Some(VmError::JumpOutOfBounds { target: -4, .. })));
}

#[test]
fn test_branch_compares_truthiness() {
    let mut env = Environment::new();
    let code = |cond: Value| {
        vec![
            Instr::Push(cond),
            Instr::Branch { when: false, offset: 2 },
            Instr::Push(Value::int(1)),
            Instr::Push(Value::int(2)),
        ]
    };
    assert_eq!(run_code(&mut env, code(Value::Nil)).unwrap(), Value::int(2));
    // Not taken: both pushes run and only the top is returned.
    let v = run_code(&mut env, code(Value::int(0))).unwrap();
    assert_eq!(v, Value::int(2));
    assert_eq!(env.data_stack_len(), 1);
}

#[test]
fn test_marker_collectors() {
    let mut env = Environment::new();
    let list = run_code(
        &mut env,
        vec![
            Instr::Push(Value::Marker),
            Instr::Push(Value::int(1)),
            Instr::Push(Value::int(2)),
            Instr::Squash,
        ],
    )
    .unwrap();
    assert_eq!(list, Value::list(ints(&[1, 2])));

    let array = run_code(
        &mut env,
        vec![
            Instr::Push(Value::Marker),
            Instr::Push(Value::list(ints(&[1, 2]))),
            Instr::Explode,
            Instr::Push(Value::array(ints(&[3]))),
            Instr::Explode,
            Instr::Vectorize,
        ],
    )
    .unwrap();
    assert_eq!(array.array_items().unwrap(), ints(&[1, 2, 3]));

    let hash = run_code(
        &mut env,
        vec![
            Instr::Push(Value::Marker),
            Instr::Push(Value::str("k")),
            Instr::Push(Value::int(1)),
            Instr::Hashize,
        ],
    )
    .unwrap();
    assert_eq!(hash.to_string(), r#"{"k" 1}"#);
}

#[test]
fn test_explode_rejects_scalars() {
    let mut env = Environment::new();
    let err = run_code(&mut env, vec![Instr::Push(Value::int(1)), Instr::Explode]).unwrap_err();
    assert!(matches!(vm_error(&err), Some(VmError::Type { got: "int", .. })));
}

#[test]
fn test_odd_hashize_is_error() {
    let mut env = Environment::new();
    let err = run_code(
        &mut env,
        vec![Instr::Push(Value::Marker), Instr::Push(Value::int(1)), Instr::Hashize],
    )
    .unwrap_err();
    assert!(matches!(vm_error(&err), Some(VmError::User(_))));
}

#[test]
fn test_ref_sym_of_unbound_is_nil() {
    let mut env = Environment::new();
    let missing = env.make_symbol("missing");
    let v = run_code(&mut env, vec![Instr::RefSym(missing)]).unwrap();
    assert_eq!(v, Value::Nil);
}

#[test]
fn test_popped_error_message() {
    let mut env = Environment::new();
    let err = run_code(
        &mut env,
        vec![Instr::Push(Value::str("boom")), Instr::Return(ReturnKind::PoppedError)],
    )
    .unwrap_err();
    assert_eq!(vm_error(&err), Some(&VmError::User("boom".into())));
}

#[test]
fn test_bind_dyn_fn_needs_symbol_name() {
    let mut env = Environment::new();
    let plus = env.lookup("+").unwrap();
    let err = run_code(
        &mut env,
        vec![Instr::Push(Value::int(1)), Instr::Push(plus), Instr::BindDynFn],
    )
    .unwrap_err();
    assert!(matches!(vm_error(&err), Some(VmError::Type { got: "int", .. })));
}

#[test]
fn test_data_stack_limit() {
    let mut env = Environment::with_config(VmConfig {
        max_data_stack: 8,
        ..VmConfig::default()
    });
    assert_eq!(eval_in(&mut env, "(+ 1 2 3)"), Value::int(6));
    let err = eval_err(&mut env, "(list 1 2 3 4 5 6 7 8 9 10)");
    assert!(matches!(vm_error(&err), Some(VmError::StackOverflow { limit: 8, .. })));
    assert_eq!(env.data_stack_len(), 0);
}

#[test]
fn test_underflow_is_reported() {
    let mut env = Environment::new();
    let err = run_code(&mut env, vec![Instr::Pop]).unwrap_err();
    assert!(matches!(vm_error(&err), Some(VmError::StackUnderflow(_))));
}
