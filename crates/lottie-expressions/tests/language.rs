use lottie_expressions::{ErrorKind, EvaluationContext, ExpressionError, RunOptions, Script, Value};

fn run(source: &str) -> Result<Value, ExpressionError> {
    let ctx = EvaluationContext::new(0.0, 30.0);
    let options = RunOptions {
        strict: true,
        ..RunOptions::default()
    };
    Script::compile(source).run(&ctx, options)
}

fn number(source: &str) -> f64 {
    match run(source) {
        Ok(value) => value
            .to_number()
            .unwrap_or_else(|| panic!("`{}` produced {:?}", source, value)),
        Err(err) => panic!("`{}` failed: {}", source, err),
    }
}

fn boolean(source: &str) -> bool {
    match run(source) {
        Ok(Value::Bool(b)) => b,
        other => panic!("`{}` produced {:?}", source, other),
    }
}

mod control_flow {
    use super::*;

    #[test]
    fn test_loops() {
        assert_eq!(number("var x = 0; while (x != 3) { x += 1 }; x"), 3.0);
        assert_eq!(number("var x = 0\ndo {\n  x += 1\n} while (x != 3)\nx"), 3.0);
        assert_eq!(number("var i = 0\nfor (;;) { i++; if (i >= 3) break }\ni"), 3.0);
    }

    #[test]
    fn test_continue_rechecks_condition() {
        let source = r#"
            var x = 0
            for (var i = 0; i < 3; i++) {
                if (i % 2 == 1) continue
                x += 1
            }
            x
        "#;
        assert_eq!(number(source), 2.0);
    }

    #[test]
    fn test_statements_after_nested_blocks() {
        let source = r#"
            var n = 0
            for (var i = 0; i < 3; i++) {
                if (i % 2 == 1) {
                    continue
                }
                n += 1
            }
            n
        "#;
        assert_eq!(number(source), 2.0);

        let source = r#"
            var total = 0
            for (var i = 0; i < 3; i++) {
                var j = 0
                while (j < i) {
                    j++
                }
                total += j
            }
            total
        "#;
        assert_eq!(number(source), 3.0);

        let source = r#"
            var hits = 0
            var k = 0
            while (k < 4) {
                for (var m = 0; m < 2; m++) {
                    hits++
                }
                if (k == 1) {
                    hits += 10
                } else {
                    hits += 0
                }
                k++
            }
            hits
        "#;
        assert_eq!(number(source), 18.0);

        assert_eq!(number("var n = 0
{ if (n == 0) n = 2; n = n + 1 }
n"), 3.0);
    }

    #[test]
    fn test_braceless_do_while() {
        assert_eq!(number("var i = 0
do i++
while (i < 3)
i"), 3.0);
        assert_eq!(number("var i = 5
do
  i += 1
while (i < 3)
i"), 6.0);
    }

    #[test]
    fn test_var_survives_loop_but_let_does_not() {
        assert_eq!(number("for (var i = 0; i < 4; i++) {}\ni"), 4.0);

        let err = run("for (let j = 0; j < 4; j++) {}\nj").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);

        let err = run("if (true) { let y = 1 }\ny").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);

        let err = run("var k = 0\nwhile (k < 2) { let w = k; k++ }\nw").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);

        let err = run("var k = 0\ndo { const w = k; k++ } while (k < 2)\nw").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
    }

    #[test]
    fn test_truthiness() {
        assert_eq!(number("var n = 0\nif (\"\") { n = 1 } else { n = 2 }\nn"), 2.0);
        assert_eq!(number("var n = 0\nif (0 / 0) { n = 1 } else { n = 2 }\nn"), 2.0);
        assert_eq!(number("var n = 0\nif ([0]) { n = 1 } else { n = 2 }\nn"), 1.0);
    }

    #[test]
    fn test_lenient_run_keeps_going() {
        let ctx = EvaluationContext::new(0.0, 30.0);
        let script = Script::compile("var a = 5\nunknownFn(a)\na * 2");
        let value = script.run(&ctx, RunOptions::default()).unwrap();
        assert_eq!(value.to_number(), Some(10.0));
    }
}

mod functions {
    use super::*;

    #[test]
    fn test_default_parameters() {
        assert_eq!(number("function f(a, b = 2) { return a + b }\nf(1)"), 3.0);
        assert_eq!(number("function f(a, b = 2) { return a + b }\nf(2, 3)"), 5.0);
        assert_eq!(number("function f(a = 1, b = 2) { return a + b }\nf()"), 3.0);
    }

    #[test]
    fn test_named_arguments_bind_by_name() {
        assert_eq!(
            number("function f(a, b = 2) { return a - b }\nf(b = 10, a = 1)"),
            -9.0
        );
    }

    #[test]
    fn test_missing_argument() {
        let err = run("function f(a) { return a }\nf()").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingArgument);
        assert_eq!(
            err.to_string(),
            "'a' argument of 'f' function is missing"
        );
    }

    #[test]
    fn test_rest_parameter() {
        let source = r#"
            function sum(first, ...rest) {
                var total = first
                for (var i = 0; i < rest.length; i++) {
                    total += rest[i]
                }
                return total
            }
            sum(1, 2, 3, 4)
        "#;
        assert_eq!(number(source), 10.0);
        assert_eq!(number("function count(...items) { return items.length }\ncount()"), 0.0);

        let err = run("function bad(...rest, last) { return last }").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        let err = run("function twice(...a, ...b) { return a }").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
    }

    #[test]
    fn test_closures_share_outer_bindings() {
        assert_eq!(number("let n = 1\nfunction bump() { n = n + 1 }\nbump()\nn"), 2.0);

        let source = r#"
            function counter() {
                let count = 0
                return function () { count += 1; return count }
            }
            var next = counter()
            next()
            next()
            next()
        "#;
        assert_eq!(number(source), 3.0);
    }

    #[test]
    fn test_nested_function_is_not_visible_outside() {
        let source = r#"
            function outer() {
                function inner() { return 1 }
                return inner()
            }
            inner()
        "#;
        let err = run(source).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert_eq!(number("function outer() {\n function inner() { return 1 }\n return inner()\n}\nouter()"), 1.0);
    }

    #[test]
    fn test_function_bodies_continue_after_nested_blocks() {
        let source = r#"
            function f() {
                var x = 0
                while (x < 3) {
                    x++
                }
                return x
            }
            f()
        "#;
        assert_eq!(number(source), 3.0);

        let source = r#"
            function clampDown(a) {
                if (a > 1) {
                    a = 1
                }
                return a
            }
            clampDown(5) + clampDown(0.5)
        "#;
        assert_eq!(number(source), 1.5);

        let source = r#"
            function firstOver(limit) {
                for (var i = 0; i < 10; i++) {
                    if (i * i > limit) {
                        return i
                    }
                }
                return -1
            }
            firstOver(10)
        "#;
        assert_eq!(number(source), 4.0);
    }

    #[test]
    fn test_recursion() {
        let source = "function r(n) {
  if (n <= 0) {
    return 0
  }
  return n + r(n - 1)
}
";
        assert_eq!(number(&format!("{}r(100)", source)), 5050.0);
        assert_eq!(number(&format!("{}r(500)", source)), 125250.0);
    }

    #[test]
    fn test_later_declarations_shadow_builtins() {
        let source = "var r = ease(1, 2, 3)
function ease(a, b, c) { return a + b + c }
r";
        assert_eq!(number(source), 6.0);
        assert_eq!(number("value = 3
var value
value * 2"), 6.0);
    }

    #[test]
    fn test_function_forms() {
        assert_eq!(number("function test(a, b) { return a + b }\ntest(1, 2)"), 3.0);

        let source = "function add(a, b) {\n  var s = a + b\n  return s\n}\nadd(1, 3)";
        assert_eq!(number(source), 4.0);

        // falling off the end yields undefined
        let value = run("function noop() { var x = 1 }\nnoop()").unwrap();
        assert!(matches!(value, Value::Undefined));
    }
}

mod values {
    use super::*;

    #[test]
    fn test_equality() {
        assert!(boolean("\"3\" == 3"));
        assert!(!boolean("\"3\" === 3"));
        assert!(boolean("3 == 3.0"));
        assert!(boolean("null == undefined"));
        assert!(!boolean("\"abc\" == 0"));
    }

    #[test]
    fn test_undeclared_assignment_is_reference_error() {
        let err = run("ghost = 4").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert_eq!(err.to_string(), "ReferenceError: ghost is not defined");
    }

    #[test]
    fn test_const_cannot_be_reassigned() {
        assert!(run("const k = 1\nk = 2").is_err());
    }

    #[test]
    fn test_vector_arithmetic() {
        let value = run("[1, 2] + [3, 4]").unwrap();
        assert_eq!(value.components(), Some(vec![4.0, 6.0]));

        let value = run("var v = [10, 20] * 0.5\nv[1]").unwrap();
        assert_eq!(value.to_number(), Some(10.0));
    }
}
