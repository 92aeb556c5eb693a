use crate::runtime::stack_trace::StackTrace;
use crate::runtime::value::Value;
use thiserror::Error;

/// Exception names for runtime faults raised by the machine itself. Scripts
/// match on the `name` member of the thrown map to tell them apart.
pub const ARGUMENT_ERROR: &str = "arg_exception";
pub const INVALID_OPERATION_ERROR: &str = "invop_exception";
pub const INVALID_PROGRAM_ERROR: &str = "invprog_exception";

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// A fault that escaped the script entirely, or one the host cannot route
/// back through script `try` handling.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Uncaught script exception: {}", .0.message())]
    Uncaught(CoralError),
    #[error("No result value was produced")]
    NoResult,
    #[error("Expected a {expected} value, found {actual}")]
    Coerce {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Unknown function `{name}`")]
    UnknownFunction { name: String },
}

impl RuntimeError {
    pub fn trace(&self) -> Option<&StackTrace> {
        match self {
            RuntimeError::Uncaught(err) => err.trace.as_ref(),
            _ => None,
        }
    }
}

/// An in-flight thrown script value. These travel through the step stack's
/// `try` marker search, not through host unwinding; one only turns into a
/// `RuntimeError` if no handler is found.
#[derive(Clone, Debug)]
pub struct CoralError {
    pub value: Value,
    pub trace: Option<StackTrace>,
}

impl CoralError {
    pub fn raise(value: Value) -> Self {
        Self { value, trace: None }
    }

    pub fn arg(message: impl Into<String>) -> Self {
        Self::raise(Self::fault_value(ARGUMENT_ERROR, message))
    }

    pub fn invop(message: impl Into<String>) -> Self {
        Self::raise(Self::fault_value(INVALID_OPERATION_ERROR, message))
    }

    pub fn invprog(message: impl Into<String>) -> Self {
        Self::raise(Self::fault_value(INVALID_PROGRAM_ERROR, message))
    }

    /// Machine faults are thrown as plain maps so scripts can inspect them.
    fn fault_value(name: &str, message: impl Into<String>) -> Value {
        Value::map_from(vec![
            (Value::str("name"), Value::str(name)),
            (Value::str("message"), Value::Str(message.into())),
        ])
    }

    /// The `name` member if the thrown value is a map carrying one.
    pub fn name(&self) -> Option<String> {
        self.member_string("name")
    }

    /// The `message` member, or a rendering of the whole thrown value.
    pub fn message(&self) -> String {
        self.member_string("message")
            .unwrap_or_else(|| self.value.to_string())
    }

    fn member_string(&self, key: &str) -> Option<String> {
        let Value::Map(map) = &self.value else {
            return None;
        };
        match map.get(&Value::str(key)) {
            Some(Value::Str(text)) => Some(text),
            _ => None,
        }
    }
}
