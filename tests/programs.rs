// End-to-end tests: whole source programs through compile + execute,
// asserting their printed output.
use rill::error::{Error, SemanticError};
use rill::memory::Const;
use rill::{compile, execute};

fn run(source: &str) -> String {
    let program = compile(source).expect("program should compile");
    execute(&program).expect("program should run")
}

fn semantic_err(source: &str) -> SemanticError {
    match compile(source).unwrap_err() {
        Error::Semantic(e) => e,
        other => panic!("expected a semantic error, got {:?}", other),
    }
}

#[test]
fn precedence_and_grouping() {
    let out = run(
        "program p;
         vars x, y : int;
         main {
             x = 3 + 4 * 2;
             y = (3 + 4) * 2;
             print(x, \" \", y);
         } end",
    );
    assert_eq!(out, "11 14\n");
}

#[test]
fn division_always_yields_float() {
    let out = run(
        "program p;
         vars z : float;
         main {
             z = 10 / 4;
             print(z);
         } end",
    );
    assert_eq!(out, "2.5\n");
}

#[test]
fn conditional_runs_exactly_one_branch() {
    let source = |x: i64| {
        format!(
            "program p;
             vars x : int;
             main {{
                 x = {};
                 if (x == 0) {{ print(\"cero\"); }} else {{ print(\"nz\"); }};
                 print(\" listo\");
             }} end",
            x
        )
    };
    assert_eq!(run(&source(0)), "cero listo\n");
    assert_eq!(run(&source(7)), "nz listo\n");
}

#[test]
fn while_loop_reevaluates_its_guard() {
    let out = run(
        "program p;
         vars i, sum : int;
         main {
             i = 0;
             sum = 0;
             while (i < 4) do {
                 print(\"*\");
                 sum = sum + i;
                 i = i + 1;
             };
             print(sum);
         } end",
    );
    // Four iterations, then the accumulated 0+1+2+3.
    assert_eq!(out, "****6\n");
}

#[test]
fn call_and_return_round_trip() {
    let out = run(
        "program p;
         int f(a : int, b : int) {
             {
                 return (a + b) * 2;
             }
         };
         main {
             print(f(5, 3));
         } end",
    );
    assert_eq!(out, "16\n");
}

#[test]
fn widened_parameters_and_float_assignment() {
    let out = run(
        "program p;
         vars z : float;
         float half(x : float) {
             {
                 return x / 2;
             }
         };
         main {
             z = 3;
             print(z, \" \", half(5));
         } end",
    );
    assert_eq!(out, "3.0 2.5\n");
}

#[test]
fn recursive_factorial() {
    let out = run(
        "program p;
         vars n, r : int;
         int fact(x : int) {
             {
                 if (x == 0) {
                     return 1;
                 } else {
                     return x * fact(x - 1);
                 };
             }
         };
         main {
             n = 5;
             r = fact(n);
             print(\"fact: \", r);
         } end",
    );
    assert_eq!(out, "fact: 120\n");
}

#[test]
fn recursive_fibonacci() {
    let out = run(
        "program p;
         int fib(x : int) {
             {
                 if (x < 2) {
                     return x;
                 } else {
                     return fib(x - 1) + fib(x - 2);
                 };
             }
         };
         main {
             print(fib(10));
         } end",
    );
    assert_eq!(out, "55\n");
}

#[test]
fn caller_locals_survive_the_callee() {
    let out = run(
        "program p;
         vars r : int;
         int deep(n : int) {
             vars a : int;
             {
                 a = n * 10;
                 if (n > 0) {
                     r = deep(n - 1);
                 };
                 return a;
             }
         };
         main {
             print(deep(2));
         } end",
    );
    // Each activation keeps its own `a` despite the shared local slots.
    assert_eq!(out, "20\n");
}

#[test]
fn void_functions_and_globals() {
    let out = run(
        "program p;
         vars count : int;
         void bump() {
             {
                 count = count + 1;
             }
         };
         main {
             bump();
             bump();
             bump();
             print(count);
         } end",
    );
    assert_eq!(out, "3\n");
}

#[test]
fn locals_shadow_globals() {
    let out = run(
        "program p;
         vars x : int;
         int probe() {
             vars x : int;
             {
                 x = 9;
                 return x;
             }
         };
         main {
             x = 1;
             print(probe(), \" \", x);
         } end",
    );
    assert_eq!(out, "9 1\n");
}

#[test]
fn print_concatenates_without_separators() {
    let out = run(
        "program p;
         main {
             print(\"a: \", 1, \" b: \", 2.5);
             print(\" tail\");
         } end",
    );
    // Several prints share one line; the newline comes only at END.
    assert_eq!(out, "a: 1 b: 2.5 tail\n");
}

#[test]
fn relational_results_print_as_bools() {
    let out = run(
        "program p;
         main {
             print(1 < 2, \" \", 1 > 2);
         } end",
    );
    assert_eq!(out, "true false\n");
}

#[test]
fn unary_minus_preserves_type() {
    let out = run(
        "program p;
         vars x : int;
         main {
             x = -5;
             print(-x, \" \", -2.5);
         } end",
    );
    assert_eq!(out, "5 -2.5\n");
}

#[test]
fn nested_call_in_argument_position() {
    let out = run(
        "program p;
         int inc(a : int) { { return a + 1; } };
         int add(a : int, b : int) { { return a + b; } };
         main {
             print(add(inc(1), 2));
         } end",
    );
    assert_eq!(out, "4\n");
}

#[test]
fn literals_share_constant_addresses() {
    let program = compile(
        "program p;
         vars x, y : int;
         main {
             x = 5;
             y = 5 + 7;
             print(\"hola\", \"hola\");
         } end",
    )
    .unwrap();
    let fives = program.constants.values().filter(|c| **c == Const::Int(5)).count();
    let holas = program
        .constants
        .values()
        .filter(|c| **c == Const::Str("hola".to_string()))
        .count();
    let sevens = program.constants.values().filter(|c| **c == Const::Int(7)).count();
    assert_eq!(fives, 1);
    assert_eq!(holas, 1);
    assert_eq!(sevens, 1);
}

#[test]
fn arity_violations_are_compile_errors() {
    let decl = "int add(a : int, b : int) { { return a + b; } };";
    assert!(matches!(
        semantic_err(&format!("program p; vars x : int; {} main {{ x = add(1); }} end", decl)),
        SemanticError::TooFewArguments { .. }
    ));
    assert!(matches!(
        semantic_err(&format!("program p; vars x : int; {} main {{ x = add(1, 2, 3); }} end", decl)),
        SemanticError::TooManyArguments { .. }
    ));
    assert!(matches!(
        semantic_err(&format!("program p; vars x : int; {} main {{ x = add(1.5, 2); }} end", decl)),
        SemanticError::ArgumentType { index: 1, .. }
    ));
}

#[test]
fn type_violations_are_compile_errors() {
    assert!(matches!(
        semantic_err("program p; vars x : int; main { x = 2.5; } end"),
        SemanticError::IncompatibleAssignment { .. }
    ));
    assert!(matches!(
        semantic_err("program p; vars x : int; main { x = (1 < 2) + 3; } end"),
        SemanticError::TypeMismatch { .. }
    ));
    assert!(matches!(
        semantic_err("program p; vars x : int; main { while (x) do { x = 0; }; } end"),
        SemanticError::NonBoolCondition { .. }
    ));
}

#[test]
fn lexical_errors_are_collected_and_fatal() {
    let err = compile("program p; main { @ $ } end").unwrap_err();
    match err {
        Error::Lex(errors) => assert_eq!(errors.len(), 2),
        other => panic!("expected lexical errors, got {:?}", other),
    }
}

#[test]
fn listing_has_no_unpatched_targets() {
    let program = compile(
        "program p;
         vars i : int;
         int sq(a : int) { { return a * a; } };
         main {
             while (i < 3) do {
                 if (i > 0) { print(sq(i)); } else { print(\"-\"); };
                 i = i + 1;
             };
         } end",
    )
    .unwrap();
    assert!(!program.listing().contains('?'));
}
