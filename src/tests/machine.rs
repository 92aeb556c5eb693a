use super::{global, global_int, global_str, run};
use crate::runtime::value::Value;

#[test]
fn arithmetic_precedence_and_parens() {
    let runner = run("x = 1 + 2 * 3\ny = (1 + 2) * 3\n");
    assert_eq!(global_int(&runner, "x"), 7);
    assert_eq!(global_int(&runner, "y"), 9);
}

#[test]
fn string_concatenation_coerces_the_other_side() {
    let runner = run("a = 'n=' + 5\nb = 2 + '2'\n");
    assert_eq!(global_str(&runner, "a"), "n=5");
    assert_eq!(global_str(&runner, "b"), "22");
}

#[test]
fn division_by_zero_is_a_catchable_invalid_operation() {
    let runner = run(
        "name = ''\n\
         try:\n\
         \tx = 1 / 0\n\
         except e:\n\
         \tname = e.name\n",
    );
    assert_eq!(global_str(&runner, "name"), "invop_exception");
}

#[test]
fn augmented_assignment_updates_and_yields_the_value() {
    let runner = run("x = 5\nx += 3\ny = x += 2\n");
    assert_eq!(global_int(&runner, "x"), 10);
    assert_eq!(global_int(&runner, "y"), 10);
}

#[test]
fn undefined_names_read_as_null() {
    let runner = run("x = never_assigned\nsame = x == null\n");
    assert!(matches!(global(&runner, "x"), Value::Null));
    assert!(matches!(global(&runner, "same"), Value::Bool(true)));
}

#[test]
fn constants_resist_assignment() {
    let runner = run(
        "caught = ''\n\
         try:\n\
         \ttrue = 0\n\
         except e:\n\
         \tcaught = e.name\n",
    );
    assert_eq!(global_str(&runner, "caught"), "invop_exception");
}

#[test]
fn list_literals_are_fresh_and_aliased_by_reference() {
    let runner = run(
        "a = [0]\n\
         b = [0]\n\
         a[0] = 9\n\
         alias = a\n\
         alias[0] = 5\n\
         x = a[0]\n\
         y = b[0]\n",
    );
    assert_eq!(global_int(&runner, "x"), 5);
    assert_eq!(global_int(&runner, "y"), 0);
}

#[test]
fn slices_clamp_and_count_back_from_the_end() {
    let runner = run(
        "a = [1, 2, 3, 4, 5]\n\
         trimmed = a[:-1]\n\
         empty = a[10:]\n\
         tail = a[3:]\n\
         mid = a[1:3]\n",
    );
    let Value::List(trimmed) = global(&runner, "trimmed") else {
        panic!("expected list")
    };
    assert_eq!(trimmed.len(), 4);
    let Value::List(empty) = global(&runner, "empty") else {
        panic!("expected list")
    };
    assert!(empty.is_empty());
    let Value::List(tail) = global(&runner, "tail") else {
        panic!("expected list")
    };
    assert_eq!(tail.len(), 2);
    let Value::List(mid) = global(&runner, "mid") else {
        panic!("expected list")
    };
    assert_eq!(mid.snapshot().len(), 2);
    assert!(matches!(mid.get(0), Some(Value::Int(2))));
}

#[test]
fn slicing_copies_rather_than_aliases() {
    let runner = run(
        "a = [1, 2, 3]\n\
         b = a[:]\n\
         b[0] = 9\n\
         x = a[0]\n",
    );
    assert_eq!(global_int(&runner, "x"), 1);
}

#[test]
fn list_index_out_of_range_is_an_argument_error() {
    let runner = run(
        "name = ''\n\
         a = [1]\n\
         try:\n\
         \tx = a[3]\n\
         except e:\n\
         \tname = e.name\n",
    );
    assert_eq!(global_str(&runner, "name"), "arg_exception");
}

#[test]
fn map_members_and_indexing_share_entries() {
    let runner = run(
        "m = { 'a': 1 }\n\
         m.b = 2\n\
         m['c'] = 3\n\
         x = m.c + m['b'] + m.a\n",
    );
    assert_eq!(global_int(&runner, "x"), 6);
}

#[test]
fn string_methods_index_and_slice() {
    let runner = run(
        "s = 'hello'\n\
         n = s.length()\n\
         greeting = 'hi {0}, {1}!'.format('you', 2)\n\
         ch = s[1]\n\
         cut = s[1:4]\n",
    );
    assert_eq!(global_int(&runner, "n"), 5);
    assert_eq!(global_str(&runner, "greeting"), "hi you, 2!");
    assert_eq!(global_str(&runner, "ch"), "e");
    assert_eq!(global_str(&runner, "cut"), "ell");
}

#[test]
fn logical_operators_evaluate_both_sides() {
    let runner = run(
        "count = 0\n\
         def bump():\n\
         \tcount += 1\n\
         \treturn false\n\
         x = bump() && bump()\n\
         y = bump() || bump()\n",
    );
    assert_eq!(global_int(&runner, "count"), 4);
    assert!(matches!(global(&runner, "x"), Value::Bool(false)));
    assert!(matches!(global(&runner, "y"), Value::Bool(false)));
}

#[test]
fn comparison_chain_of_coercions() {
    let runner = run("a = '10' > 9\nb = 3 <= 3\nc = 'x' == 'x'\nd = 1 != 2\n");
    assert!(matches!(global(&runner, "a"), Value::Bool(true)));
    assert!(matches!(global(&runner, "b"), Value::Bool(true)));
    assert!(matches!(global(&runner, "c"), Value::Bool(true)));
    assert!(matches!(global(&runner, "d"), Value::Bool(true)));
}
