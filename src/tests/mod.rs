//! End-to-end tests driving scripts through the compiler and the machine.

mod control_flow;
mod interop;
mod machine;

use crate::runtime::runner::Runner;
use crate::runtime::value::Value;

/// Runs a script to completion and hands back the runner for inspection.
fn run(source: &str) -> Runner {
    let mut runner = Runner::new();
    runner.run("test", source).expect("script failed");
    runner
}

fn global(runner: &Runner, name: &str) -> Value {
    runner
        .state
        .scopes
        .get(runner.state.root_scope, name)
        .expect("global read failed")
}

fn global_int(runner: &Runner, name: &str) -> i64 {
    match global(runner, name) {
        Value::Int(v) => v,
        other => panic!("expected int in '{}', found {:?}", name, other),
    }
}

fn global_str(runner: &Runner, name: &str) -> String {
    match global(runner, name) {
        Value::Str(s) => s,
        other => panic!("expected string in '{}', found {:?}", name, other),
    }
}
