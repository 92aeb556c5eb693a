use crate::language::ast::{NodeKind, SyntaxNode};
use crate::runtime::error::CoralError;
use crate::runtime::lvalue::{LValue, Slot};
use crate::runtime::scope::{ScopeArena, ScopeId};
use crate::runtime::stack_trace::{StackFrame, StackTrace};
use crate::runtime::step::{Action, Step};
use crate::runtime::value::Value;
use std::rc::Rc;

/// A deferred `finally` block collected while unwinding past its `try`.
pub struct DeferredBlock {
    pub block: Rc<SyntaxNode>,
    pub scope: ScopeId,
}

/// The complete execution context: the step stack of pending operations, the
/// result stack of intermediate values, and the scope arena. Everything a
/// script is doing lives here; dropping a `State` abandons the run wholesale.
pub struct State {
    pub scopes: ScopeArena,
    pub const_scope: ScopeId,
    pub root_scope: ScopeId,
    steps: Vec<Step>,
    results: Vec<Slot>,
    /// Result-stack depths recorded at statement starts. `clear_results`
    /// truncates back to the most recent one, so operands belonging to
    /// enclosing expressions survive statements executed mid-expression.
    marks: Vec<usize>,
    exit_requested: bool,
}

impl State {
    pub fn new() -> Self {
        let mut scopes = ScopeArena::new();
        let const_scope = scopes.alloc_const();
        let root_scope = scopes.alloc_standard(Some(const_scope));
        Self {
            scopes,
            const_scope,
            root_scope,
            steps: Vec::new(),
            results: Vec::new(),
            marks: Vec::new(),
            exit_requested: false,
        }
    }

    // Step stack

    pub fn push_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn pop_step(&mut self) -> Option<Step> {
        self.steps.pop()
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn has_pending_steps(&self) -> bool {
        !self.steps.is_empty()
    }

    /// The scope the next-executing step resolves names against: the nearest
    /// step below the top carrying a scope override, else the root scope.
    pub fn current_scope(&self) -> ScopeId {
        self.steps
            .iter()
            .rev()
            .find_map(|step| step.scope)
            .unwrap_or(self.root_scope)
    }

    pub fn find_step(&self, pred: impl Fn(&Step) -> bool) -> bool {
        self.steps.iter().any(|step| pred(step))
    }

    /// Pops steps until one matches. The matched step is popped too unless
    /// `retain` is set (`continue` leaves its iteration step in place).
    /// Collects the `finally` blocks of every `try` marker popped on the way,
    /// innermost first; the caller must schedule them before its own
    /// continuation.
    pub fn unwind(
        &mut self,
        pred: impl Fn(&Step) -> bool,
        retain: bool,
    ) -> (Option<Step>, Vec<DeferredBlock>) {
        let mut deferred = Vec::new();
        while let Some(step) = self.steps.pop() {
            if pred(&step) {
                if retain {
                    self.steps.push(step.clone());
                }
                return (Some(step), deferred);
            }
            // A discarded statement boundary will never truncate; drop its
            // mark so later boundaries pair with their own.
            if matches!(step.action, Action::ClearResults) {
                self.marks.pop();
            }
            if step.is_try_marker() {
                if let Some(node) = &step.node {
                    if let NodeKind::Try {
                        finally_block: Some(block),
                        ..
                    } = &node.kind
                    {
                        deferred.push(DeferredBlock {
                            block: Rc::clone(block),
                            scope: step.scope.unwrap_or(self.root_scope),
                        });
                    }
                }
            }
        }
        (None, deferred)
    }

    // Result stack

    pub fn push_value(&mut self, value: Value) {
        self.results.push(Slot::Value(value));
    }

    pub fn push_lvalue(&mut self, lvalue: LValue) {
        self.results.push(Slot::LValue(lvalue));
    }

    pub fn pop_slot(&mut self) -> Result<Slot, CoralError> {
        self.results
            .pop()
            .ok_or_else(|| CoralError::invprog("Result stack underflow"))
    }

    /// Pops and dereferences, collapsing lvalues into plain values.
    pub fn pop_value(&mut self) -> Result<Value, CoralError> {
        let slot = self.pop_slot()?;
        slot.deref(self)
    }

    pub fn result_count(&self) -> usize {
        self.results.len()
    }

    /// Records the current depth for the statement about to run.
    pub fn mark_results(&mut self) {
        self.marks.push(self.results.len());
    }

    /// Drops everything the finished statement pushed since its mark.
    pub fn clear_results(&mut self) {
        let depth = self.marks.pop().unwrap_or(0);
        self.results.truncate(depth);
    }

    // Suspension

    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    pub fn take_exit(&mut self) -> bool {
        std::mem::take(&mut self.exit_requested)
    }

    /// Reconstructs the script call chain by scanning the step stack for call
    /// markers, innermost first. `current` contributes the topmost frame.
    pub fn stack_trace(&self, current: Option<&SyntaxNode>) -> StackTrace {
        let mut frames = Vec::new();
        if let Some(node) = current {
            frames.push(StackFrame {
                unit: node.unit.to_string(),
                pos: node.pos,
                func: None,
            });
        }
        for step in self.steps.iter().rev() {
            if !step.is_call_marker() {
                continue;
            }
            let Action::CallMarker { function } = &step.action else {
                continue;
            };
            let (unit, pos) = match &step.node {
                Some(node) => (node.unit.to_string(), node.pos),
                None => ("<native>".to_string(), Default::default()),
            };
            frames.push(StackFrame {
                unit,
                pos,
                func: Some(function.clone()),
            });
        }
        StackTrace { frames }
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}
