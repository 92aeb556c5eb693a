use crate::language::ast::{NodeKind, SyntaxNode};
use crate::language::compiler::{CodeFragment, Compiler};
use crate::language::errors::SyntaxErrors;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::interpreter::{dispatch_throw, pump};
use crate::runtime::state::State;
use crate::runtime::value::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("{} syntax error(s)", .0.errors.len())]
    Syntax(SyntaxErrors),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Host entry point: owns a `State`, registers host values into it, and runs
/// compiled code through the pump. One `Runner` is one execution context.
pub struct Runner {
    pub state: State,
}

impl Runner {
    pub fn new() -> Self {
        let mut state = State::new();
        let consts = state.const_scope;
        // Registration into the const scope cannot fail.
        let _ = state.scopes.define_const(consts, "true", Value::Bool(true));
        let _ = state.scopes.define_const(consts, "false", Value::Bool(false));
        Self { state }
    }

    /// Registers an immutable binding scripts can read but never assign.
    pub fn register_const(&mut self, name: &str, value: Value) {
        let consts = self.state.const_scope;
        let _ = self.state.scopes.define_const(consts, name, value);
    }

    /// Registers an ordinary global variable.
    pub fn register_global(&mut self, name: &str, value: Value) {
        let root = self.state.root_scope;
        self.state.scopes.set_local(root, name, value);
    }

    /// Compiles and runs a source unit to completion or suspension.
    pub fn run(&mut self, unit: &str, source: &str) -> Result<(), RunError> {
        let fragment = Compiler::compile(unit, source).map_err(RunError::Syntax)?;
        self.execute(&fragment)?;
        Ok(())
    }

    /// Seeds an already-compiled fragment and pumps it.
    pub fn execute(&mut self, fragment: &CodeFragment) -> RuntimeResult<()> {
        fragment.root.emit(&mut self.state);
        pump(&mut self.state)
    }

    /// True while a suspended run still has pending steps.
    pub fn is_suspended(&self) -> bool {
        self.state.has_pending_steps()
    }

    /// Continues a suspended run. The host may first push values or steps
    /// into `state` to deliver results the script is waiting on.
    pub fn resume(&mut self) -> RuntimeResult<()> {
        pump(&mut self.state)
    }

    /// Calls a script function by name with host-supplied arguments and
    /// returns its result. Fails with `NoResult` if the call suspends.
    pub fn call_function(&mut self, name: &str, args: &[Value]) -> RuntimeResult<Value> {
        let root = self.state.root_scope;
        match self.state.scopes.get(root, name) {
            Ok(Value::Function(_)) => {}
            _ => {
                return Err(RuntimeError::UnknownFunction {
                    name: name.to_string(),
                })
            }
        }
        let callee = SyntaxNode::synthetic(NodeKind::Ident(name.to_string()));
        self.call_node(callee, args)
    }

    /// Calls any callable value directly.
    pub fn call_value(&mut self, func: Value, args: &[Value]) -> RuntimeResult<Value> {
        let callee = SyntaxNode::synthetic(NodeKind::Wrapper(func));
        self.call_node(callee, args)
    }

    /// Builds a synthetic call node whose arguments wrap pre-computed values,
    /// then pumps it like any other code.
    fn call_node(
        &mut self,
        callee: std::rc::Rc<SyntaxNode>,
        args: &[Value],
    ) -> RuntimeResult<Value> {
        let args = args
            .iter()
            .map(|value| SyntaxNode::synthetic(NodeKind::Wrapper(value.clone())))
            .collect();
        let call = SyntaxNode::synthetic(NodeKind::Call { callee, args });
        call.emit(&mut self.state);
        pump(&mut self.state)?;
        if self.state.has_pending_steps() {
            return Err(RuntimeError::NoResult);
        }
        self.state.pop_value().map_err(|_| RuntimeError::NoResult)
    }

    /// Routes a host-raised script exception through the machine, as if a
    /// failing step had thrown it.
    pub fn raise(&mut self, err: crate::runtime::error::CoralError) -> RuntimeResult<()> {
        dispatch_throw(&mut self.state, err, None)?;
        pump(&mut self.state)
    }
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}
