#[cfg(test)]
mod tests {
    use crate::test_support::{eval, eval_err};
    use kelp_core::{Value, VmError, vm_error};

    #[test]
    fn test_case_and_trim() {
        assert_eq!(eval(r#"(str/upper "hello")"#), Value::str("HELLO"));
        assert_eq!(eval(r#"(str/lower "HeLLo")"#), Value::str("hello"));
        assert_eq!(eval(r#"(str/trim "  pad  ")"#), Value::str("pad"));
    }

    #[test]
    fn test_len_counts_chars() {
        assert_eq!(eval(r#"(str/len "héllo")"#), Value::int(5));
        assert_eq!(eval(r#"(str/len "")"#), Value::int(0));
    }

    #[test]
    fn test_contains() {
        assert_eq!(eval(r#"(str/contains? "haystack" "st")"#), Value::Bool(true));
        assert_eq!(eval(r#"(str/contains? "haystack" "needle")"#), Value::Bool(false));
    }

    #[test]
    fn test_split_and_join() {
        assert_eq!(eval(r#"(str/split "a,b,,c" ",")"#).to_string(), r#"("a" "b" "" "c")"#);
        assert_eq!(eval(r#"(str/split "  two   words ")"#).to_string(), r#"("two" "words")"#);
        assert_eq!(eval(r#"(str/split "ab" "")"#).to_string(), r#"("a" "b")"#);
        assert_eq!(eval(r#"(str/join (list "a" 1 #\c) "-")"#), Value::str("a-1-c"));
        assert_eq!(eval(r#"(str/join ["x" "y"])"#), Value::str("xy"));
    }

    #[test]
    fn test_substr() {
        assert_eq!(eval(r#"(substr "kelp forest" 5)"#), Value::str("forest"));
        assert_eq!(eval(r#"(substr "kelp forest" 0 4)"#), Value::str("kelp"));
        assert_eq!(eval(r#"(substr "abc" 1 99)"#), Value::str("bc"));
        let err = eval_err(r#"(substr "abc" 2 1)"#);
        assert!(matches!(vm_error(&err), Some(VmError::User(_))));
    }

    #[test]
    fn test_type_errors_name_the_function() {
        let err = eval_err("(str/upper 42)");
        assert!(format!("{:#}", err).contains("in native function `str/upper`"), "{:#}", err);
        assert!(matches!(vm_error(&err), Some(VmError::Type { got: "int", .. })));

        let err = eval_err(r#"(str/contains? "a")"#);
        assert!(matches!(vm_error(&err), Some(VmError::Arity { native: true, .. })));
    }
}
