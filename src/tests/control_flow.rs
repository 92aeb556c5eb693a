use super::{global, global_int, global_str, run};
use crate::runtime::error::RuntimeError;
use crate::runtime::runner::{RunError, Runner};
use crate::runtime::value::Value;

#[test]
fn if_elif_else_takes_the_first_true_clause() {
    let runner = run(
        "def pick(n):\n\
         \tif n < 0:\n\
         \t\treturn 'neg'\n\
         \telif n == 0:\n\
         \t\treturn 'zero'\n\
         \telse:\n\
         \t\treturn 'pos'\n\
         a = pick(0 - 3)\n\
         b = pick(0)\n\
         c = pick(3)\n",
    );
    assert_eq!(global_str(&runner, "a"), "neg");
    assert_eq!(global_str(&runner, "b"), "zero");
    assert_eq!(global_str(&runner, "c"), "pos");
}

#[test]
fn while_loops_with_break_and_continue() {
    let runner = run(
        "total = 0\n\
         i = 0\n\
         while true:\n\
         \ti += 1\n\
         \tif i > 10:\n\
         \t\tbreak\n\
         \tif i == 3:\n\
         \t\tcontinue\n\
         \ttotal += i\n",
    );
    assert_eq!(global_int(&runner, "total"), 52);
}

#[test]
fn for_iterates_lists_in_order() {
    let runner = run(
        "out = ''\n\
         for x in ['a', 'b', 'c']:\n\
         \tout = out + x\n",
    );
    assert_eq!(global_str(&runner, "out"), "abc");
}

#[test]
fn for_over_a_map_yields_keys_in_insertion_order() {
    let runner = run(
        "out = ''\n\
         m = { 'z': 1, 'a': 2, 'm': 3 }\n\
         for k in m:\n\
         \tout = out + k\n",
    );
    assert_eq!(global_str(&runner, "out"), "zam");
}

#[test]
fn loop_variable_does_not_leak_into_the_enclosing_scope() {
    let runner = run(
        "x = 'kept'\n\
         for v in [1, 2]:\n\
         \tpass\n\
         leaked = v\n",
    );
    assert_eq!(global_str(&runner, "x"), "kept");
    assert!(matches!(global(&runner, "leaked"), Value::Null));
}

#[test]
fn nested_loops_break_only_the_inner_one() {
    let runner = run(
        "count = 0\n\
         for i in [1, 2, 3]:\n\
         \tfor j in [1, 2, 3]:\n\
         \t\tif j == 2:\n\
         \t\t\tbreak\n\
         \t\tcount += 1\n",
    );
    assert_eq!(global_int(&runner, "count"), 3);
}

#[test]
fn except_runs_before_finally() {
    let runner = run(
        "log = ''\n\
         try:\n\
         \tthrow { 'name': 'boom', 'message': 'x' }\n\
         except e:\n\
         \tlog = log + 'e:' + e.name\n\
         finally:\n\
         \tlog = log + '/f'\n",
    );
    assert_eq!(global_str(&runner, "log"), "e:boom/f");
}

#[test]
fn finally_runs_when_no_exception_is_thrown() {
    let runner = run(
        "log = ''\n\
         try:\n\
         \tlog = log + 'b'\n\
         except:\n\
         \tlog = log + 'e'\n\
         finally:\n\
         \tlog = log + 'f'\n",
    );
    assert_eq!(global_str(&runner, "log"), "bf");
}

#[test]
fn break_through_a_try_still_runs_its_finally() {
    let runner = run(
        "log = ''\n\
         while true:\n\
         \ttry:\n\
         \t\tlog = log + 'b'\n\
         \t\tbreak\n\
         \texcept:\n\
         \t\tlog = log + 'e'\n\
         \tfinally:\n\
         \t\tlog = log + 'f'\n\
         log = log + '.'\n",
    );
    assert_eq!(global_str(&runner, "log"), "bf.");
}

#[test]
fn continue_through_a_try_runs_finally_each_pass() {
    let runner = run(
        "log = ''\n\
         for i in [1, 2]:\n\
         \ttry:\n\
         \t\tcontinue\n\
         \texcept:\n\
         \t\tpass\n\
         \tfinally:\n\
         \t\tlog = log + 'f'\n",
    );
    assert_eq!(global_str(&runner, "log"), "ff");
}

#[test]
fn return_through_a_try_runs_finally_before_delivering_the_value() {
    let runner = run(
        "log = ''\n\
         def f():\n\
         \ttry:\n\
         \t\treturn 1\n\
         \texcept:\n\
         \t\tpass\n\
         \tfinally:\n\
         \t\tlog = log + 'f'\n\
         x = f()\n",
    );
    assert_eq!(global_str(&runner, "log"), "f");
    assert_eq!(global_int(&runner, "x"), 1);
}

#[test]
fn nested_finally_blocks_run_innermost_first() {
    let runner = run(
        "log = ''\n\
         while true:\n\
         \ttry:\n\
         \t\ttry:\n\
         \t\t\tbreak\n\
         \t\texcept:\n\
         \t\t\tpass\n\
         \t\tfinally:\n\
         \t\t\tlog = log + 'i'\n\
         \texcept:\n\
         \t\tpass\n\
         \tfinally:\n\
         \t\tlog = log + 'o'\n",
    );
    assert_eq!(global_str(&runner, "log"), "io");
}

#[test]
fn a_throw_inside_except_reaches_the_outer_handler() {
    let runner = run(
        "outer = ''\n\
         try:\n\
         \ttry:\n\
         \t\tthrow { 'name': 'first', 'message': '' }\n\
         \texcept:\n\
         \t\tthrow { 'name': 'second', 'message': '' }\n\
         except e:\n\
         \touter = e.name\n",
    );
    assert_eq!(global_str(&runner, "outer"), "second");
}

#[test]
fn a_throw_from_finally_supersedes_the_handled_exception() {
    let runner = run(
        "outer = ''\n\
         try:\n\
         \ttry:\n\
         \t\tthrow { 'name': 'original', 'message': '' }\n\
         \texcept:\n\
         \t\tpass\n\
         \tfinally:\n\
         \t\tthrow { 'name': 'override', 'message': '' }\n\
         except e:\n\
         \touter = e.name\n",
    );
    assert_eq!(global_str(&runner, "outer"), "override");
}

#[test]
fn a_throw_from_finally_supersedes_an_in_flight_return() {
    let runner = run(
        "caught = ''\n\
         def f():\n\
         \ttry:\n\
         \t\treturn 'kept'\n\
         \texcept:\n\
         \t\tpass\n\
         \tfinally:\n\
         \t\tthrow { 'name': 'boom', 'message': '' }\n\
         try:\n\
         \tx = f()\n\
         except e:\n\
         \tcaught = e.name\n",
    );
    assert_eq!(global_str(&runner, "caught"), "boom");
    assert!(matches!(global(&runner, "x"), Value::Null));
}

#[test]
fn calling_a_non_function_is_catchable() {
    let runner = run(
        "name = ''\n\
         msg = ''\n\
         x = 5\n\
         try:\n\
         \tx()\n\
         except e:\n\
         \tname = e.name\n\
         \tmsg = e.message\n",
    );
    assert_eq!(global_str(&runner, "name"), "arg_exception");
    assert_eq!(global_str(&runner, "msg"), "Attempted call to non-function");
}

#[test]
fn an_uncaught_throw_escapes_with_a_stack_trace() {
    let mut runner = Runner::new();
    let err = runner
        .run(
            "trace",
            "def inner():\n\
             \tthrow { 'name': 'boom', 'message': 'bad' }\n\
             def outer():\n\
             \treturn inner()\n\
             outer()\n",
        )
        .expect_err("should fail");
    let RunError::Runtime(RuntimeError::Uncaught(err)) = err else {
        panic!("expected an uncaught script exception, got {:?}", err)
    };
    assert_eq!(err.name().as_deref(), Some("boom"));
    assert_eq!(err.message(), "bad");
    let trace = err.trace.as_ref().expect("trace missing");
    let funcs: Vec<_> = trace
        .frames
        .iter()
        .filter_map(|frame| frame.func.clone())
        .collect();
    assert_eq!(funcs, vec!["inner", "outer"]);
}

#[test]
fn break_outside_a_loop_is_an_invalid_operation() {
    let mut runner = Runner::new();
    let err = runner.run("test", "break\n").expect_err("should fail");
    let RunError::Runtime(RuntimeError::Uncaught(err)) = err else {
        panic!("expected an uncaught script exception")
    };
    assert_eq!(err.name().as_deref(), Some("invop_exception"));
}
