use super::{global, global_int, global_str};
use crate::runtime::async_action::{AsyncAction, FunctionTarget};
use crate::runtime::interop::{native_fn, HostObject, NativeOutcome};
use crate::runtime::runner::Runner;
use crate::runtime::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

fn recording_runner() -> (Runner, Rc<RefCell<Vec<Value>>>) {
    let mut runner = Runner::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    runner.register_const(
        "record",
        native_fn("record", move |_, mut args| {
            sink.borrow_mut().append(&mut args);
            Ok(NativeOutcome::Value(Value::Null))
        }),
    );
    (runner, seen)
}

#[test]
fn native_functions_receive_dereferenced_arguments() {
    let (mut runner, seen) = recording_runner();
    runner
        .run("test", "x = 4\nrecord(x, x + 1, 'done')\n")
        .expect("script failed");
    let seen = seen.borrow();
    assert!(matches!(seen[0], Value::Int(4)));
    assert!(matches!(seen[1], Value::Int(5)));
    assert!(matches!(&seen[2], Value::Str(s) if s == "done"));
}

#[test]
fn native_errors_are_catchable_in_scripts() {
    let mut runner = Runner::new();
    runner.register_const(
        "fail",
        native_fn("fail", |_, _| {
            Err(crate::runtime::error::CoralError::arg("host said no"))
        }),
    );
    runner
        .run(
            "test",
            "msg = ''\n\
             try:\n\
             \tfail()\n\
             except e:\n\
             \tmsg = e.message\n",
        )
        .expect("script failed");
    assert_eq!(global_str(&runner, "msg"), "host said no");
}

#[test]
fn host_objects_expose_properties_and_methods() {
    let mut runner = Runner::new();
    let count = Rc::new(RefCell::new(10i64));
    let get_count = Rc::clone(&count);
    let set_count = Rc::clone(&count);
    let bump_count = Rc::clone(&count);
    let counter = HostObject::new("counter")
        .property_rw(
            "value",
            move |_| Ok(Value::Int(*get_count.borrow())),
            move |_, value| {
                *set_count.borrow_mut() = value.coerce_int()?;
                Ok(())
            },
        )
        .method("add", move |_, args| {
            let by = args.first().cloned().unwrap_or(Value::Int(1)).coerce_int()?;
            *bump_count.borrow_mut() += by;
            Ok(NativeOutcome::Value(Value::Null))
        })
        .into_value();
    runner.register_const("counter", counter);
    runner
        .run(
            "test",
            "before = counter.value\n\
             counter.add(5)\n\
             counter.value = counter.value + 1\n\
             after = counter.value\n",
        )
        .expect("script failed");
    assert_eq!(global_int(&runner, "before"), 10);
    assert_eq!(global_int(&runner, "after"), 16);
    assert_eq!(*count.borrow(), 16);
}

#[test]
fn unknown_host_members_are_argument_errors() {
    let mut runner = Runner::new();
    runner.register_const("obj", HostObject::new("widget").into_value());
    runner
        .run(
            "test",
            "name = ''\n\
             try:\n\
             \tobj.missing\n\
             except e:\n\
             \tname = e.name\n",
        )
        .expect("script failed");
    assert_eq!(global_str(&runner, "name"), "arg_exception");
}

#[test]
fn async_actions_run_in_listed_order() {
    let (mut runner, seen) = recording_runner();
    runner.register_const(
        "plan",
        native_fn("plan", |_, _| {
            Ok(NativeOutcome::Actions(vec![
                AsyncAction::Variable {
                    name: "flag".to_string(),
                    value: Value::Int(1),
                },
                AsyncAction::Call {
                    target: FunctionTarget::Name("record".to_string()),
                    args: vec![Value::str("first")],
                },
                AsyncAction::Call {
                    target: FunctionTarget::Name("record".to_string()),
                    args: vec![Value::str("second")],
                },
            ]))
        }),
    );
    runner.run("test", "plan()\n").expect("script failed");
    assert_eq!(global_int(&runner, "flag"), 1);
    let seen = seen.borrow();
    assert!(matches!(&seen[0], Value::Str(s) if s == "first"));
    assert!(matches!(&seen[1], Value::Str(s) if s == "second"));
}

#[test]
fn exit_suspends_and_resume_completes_the_assignment() {
    let mut runner = Runner::new();
    runner.register_const(
        "pause",
        native_fn("pause", |_, _| {
            Ok(NativeOutcome::Actions(vec![AsyncAction::Exit]))
        }),
    );
    runner
        .run("test", "x = pause()\ny = 'after'\n")
        .expect("script failed");
    assert!(runner.is_suspended());

    // Deliver the value the suspended assignment is waiting on.
    runner.state.push_value(Value::Int(42));
    runner.resume().expect("resume failed");
    assert!(!runner.is_suspended());
    assert_eq!(global_int(&runner, "x"), 42);
    assert_eq!(global_str(&runner, "y"), "after");
}

#[test]
fn queued_code_fragments_execute_like_inline_script() {
    let mut runner = Runner::new();
    let fragment = crate::language::compiler::Compiler::compile("queued", "q = 5 * 5\n")
        .expect("compile failed");
    runner.register_const(
        "inject",
        native_fn("inject", move |_, _| {
            Ok(NativeOutcome::Actions(vec![
                AsyncAction::Code(fragment.clone()),
            ]))
        }),
    );
    runner.run("test", "inject()\n").expect("script failed");
    assert_eq!(global_int(&runner, "q"), 25);
}

#[test]
fn scripts_can_pass_functions_back_to_native_code() {
    let mut runner = Runner::new();
    let held = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&held);
    runner.register_const(
        "keep",
        native_fn("keep", move |_, mut args| {
            *slot.borrow_mut() = args.pop();
            Ok(NativeOutcome::Value(Value::Null))
        }),
    );
    runner
        .run(
            "test",
            "def triple(n):\n\
             \treturn n * 3\n\
             keep(triple)\n",
        )
        .expect("script failed");
    let func = held.borrow_mut().take().expect("callback not captured");
    let result = runner.call_value(func, &[Value::Int(7)]).expect("call failed");
    assert!(matches!(result, Value::Int(21)));
}

#[test]
fn globals_registered_by_the_host_are_plain_variables() {
    let mut runner = Runner::new();
    runner.register_global("setting", Value::Int(1));
    runner
        .run("test", "copy = setting\nsetting = 2\n")
        .expect("script failed");
    assert_eq!(global_int(&runner, "copy"), 1);
    assert_eq!(global_int(&runner, "setting"), 2);
}
