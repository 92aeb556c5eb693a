use crate::language::ast::{NodeKind, SyntaxNode};
use crate::language::compiler::CodeFragment;
use crate::runtime::scope::ScopeId;
use crate::runtime::state::State;
use crate::runtime::step::{Action, Step, StepFn};
use crate::runtime::value::Value;

pub enum FunctionTarget {
    /// Resolve by name in the active scope when the call executes.
    Name(String),
    Value(Value),
}

/// Work a host function hands back to the machine instead of (or before) a
/// direct result. Decoded into steps; actions run in the order listed.
pub enum AsyncAction {
    /// Suspend the pump loop in place. Both stacks stay intact; the host
    /// resumes whenever it likes.
    Exit,
    Call {
        target: FunctionTarget,
        args: Vec<Value>,
    },
    Variable {
        name: String,
        value: Value,
    },
    Code(CodeFragment),
    Callback(StepFn),
    /// Pins a scope for everything scheduled above it.
    PushScope(ScopeId),
}

/// Schedules actions onto the step stack. Pushed in reverse so the first
/// listed action executes first.
pub fn queue_actions(state: &mut State, actions: Vec<AsyncAction>) {
    for action in actions.into_iter().rev() {
        let step = match action {
            AsyncAction::Exit => Step::new(Action::Suspend),
            AsyncAction::Call { target, args } => {
                let callee = match target {
                    FunctionTarget::Name(name) => SyntaxNode::synthetic(NodeKind::Ident(name)),
                    FunctionTarget::Value(value) => {
                        SyntaxNode::synthetic(NodeKind::Wrapper(value))
                    }
                };
                let args = args
                    .into_iter()
                    .map(|value| SyntaxNode::synthetic(NodeKind::Wrapper(value)))
                    .collect();
                let call = SyntaxNode::synthetic(NodeKind::Call { callee, args });
                Step::new(Action::EmitNode(call))
            }
            AsyncAction::Variable { name, value } => Step::new(Action::SetVariable { name, value }),
            AsyncAction::Code(fragment) => Step::new(Action::EmitNode(fragment.root)),
            AsyncAction::Callback(f) => Step::new(Action::Host(f)),
            AsyncAction::PushScope(scope) => Step::new(Action::ScopeMarker).with_scope(scope),
        };
        state.push_step(step);
    }
}
