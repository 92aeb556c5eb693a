use crate::language::span::SourcePos;
use std::fmt;

/// One frame of a reconstructed script stack trace, innermost first.
#[derive(Clone, Debug)]
pub struct StackFrame {
    pub unit: String,
    pub pos: SourcePos,
    /// Name of the function being entered at this frame, if any.
    pub func: Option<String>,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.func {
            Some(func) => write!(f, "{}({}): {}", self.unit, self.pos, func),
            None => write!(f, "{}({})", self.unit, self.pos),
        }
    }
}

/// Built on demand by scanning the step stack for call markers; the machine
/// never maintains frames eagerly.
#[derive(Clone, Debug, Default)]
pub struct StackTrace {
    pub frames: Vec<StackFrame>,
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in &self.frames {
            writeln!(f, "  at {}", frame)?;
        }
        Ok(())
    }
}
