use crate::language::ast::{BinOp, SyntaxNode, UnOp};
use crate::runtime::error::CoralError;
use crate::runtime::scope::ScopeId;
use crate::runtime::state::State;
use crate::runtime::value::Value;
use std::fmt;
use std::rc::Rc;

/// A host callback scheduled directly onto the step stack. The only closures
/// the machine carries; every script construct is plain `Action` data.
pub type StepFn = Rc<dyn Fn(&mut State) -> Result<(), CoralError>>;

/// A pending operation. Executing one may push further steps, consume or
/// produce result slots, or both. Marker variants do nothing when executed
/// normally; they exist to be found by unwinds and stack-trace scans.
#[derive(Clone)]
pub enum Action {
    Nop,
    /// Statement start: record the result-stack depth to restore afterwards.
    MarkResults,
    /// Statement end: drop results pushed since the matching mark.
    ClearResults,
    PushValue(Value),
    LoadIdent(String),
    Binary(BinOp),
    Unary(UnOp),
    Assign,
    AugAssign,
    MakeList(usize),
    MakeMap(usize),
    Member(String),
    Index,
    Slice,
    Call { argc: usize },
    DefineFunc,
    Return,
    Break,
    Continue,
    Throw,
    IfDispatch { clause: usize },
    WhileTest,
    WhileNext,
    ForSetup,
    ForNext {
        items: Rc<Vec<Value>>,
        index: usize,
    },
    /// Unwind target for `break`/`continue`.
    LoopMarker,
    /// Unwind target for `return`; also a stack-trace frame.
    CallMarker { function: String },
    /// Unwind target for thrown values.
    TryMarker,
    /// Carries a scope and nothing else; pins a binding (such as an `except`
    /// variable) for the steps above it.
    ScopeMarker,
    /// Runs a whole block later: loop bodies, `finally` blocks.
    EmitNode(Rc<SyntaxNode>),
    SetVariable { name: String, value: Value },
    /// Stops the pump loop, leaving both stacks intact for resumption.
    Suspend,
    Host(StepFn),
}

#[derive(Clone)]
pub struct Step {
    pub action: Action,
    /// Source node for error positions and stack traces.
    pub node: Option<Rc<SyntaxNode>>,
    /// When set, this step (and everything emitted above it) resolves names
    /// against this scope.
    pub scope: Option<ScopeId>,
}

impl Step {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            node: None,
            scope: None,
        }
    }

    pub fn with_node(action: Action, node: &Rc<SyntaxNode>) -> Self {
        Self {
            action,
            node: Some(Rc::clone(node)),
            scope: None,
        }
    }

    pub fn with_scope(mut self, scope: ScopeId) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn is_loop_marker(&self) -> bool {
        matches!(self.action, Action::LoopMarker)
    }

    /// Steps that restart a loop iteration; `continue` unwinds to one of
    /// these and leaves it in place.
    pub fn is_iteration(&self) -> bool {
        matches!(self.action, Action::ForNext { .. } | Action::WhileNext)
    }

    pub fn is_call_marker(&self) -> bool {
        matches!(self.action, Action::CallMarker { .. })
    }

    pub fn is_try_marker(&self) -> bool {
        matches!(self.action, Action::TryMarker)
    }

    pub fn description(&self) -> String {
        match &self.action {
            Action::Nop => "nop".into(),
            Action::MarkResults => "statement: mark results".into(),
            Action::ClearResults => "statement: clear results".into(),
            Action::PushValue(value) => format!("push: {}", value.type_name()),
            Action::LoadIdent(name) => format!("load: {}", name),
            Action::Binary(op) => format!("binary: {}", op.symbol()),
            Action::Unary(_) => "unary".into(),
            Action::Assign => "assign".into(),
            Action::AugAssign => "augmented assign".into(),
            Action::MakeList(n) => format!("list: {} elements", n),
            Action::MakeMap(n) => format!("map: {} entries", n),
            Action::Member(name) => format!("member: {}", name),
            Action::Index => "index".into(),
            Action::Slice => "slice".into(),
            Action::Call { argc } => format!("call: {} args", argc),
            Action::DefineFunc => "def".into(),
            Action::Return => "return".into(),
            Action::Break => "break".into(),
            Action::Continue => "continue".into(),
            Action::Throw => "throw".into(),
            Action::IfDispatch { clause } => format!("if: clause {}", clause),
            Action::WhileTest => "while: test".into(),
            Action::WhileNext => "while: next iteration".into(),
            Action::ForSetup => "for: setup".into(),
            Action::ForNext { index, .. } => format!("for: next iteration {}", index),
            Action::LoopMarker => "loop: marker".into(),
            Action::CallMarker { function } => format!("call: {}", function),
            Action::TryMarker => "try: marker".into(),
            Action::ScopeMarker => "scope: marker".into(),
            Action::EmitNode(_) => "block: run".into(),
            Action::SetVariable { name, .. } => format!("set: {}", name),
            Action::Suspend => "suspend".into(),
            Action::Host(_) => "host callback".into(),
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Step({})", self.description())
    }
}
