pub mod async_action;
pub mod error;
pub mod interop;
pub mod interpreter;
pub mod lvalue;
pub mod runner;
pub mod scope;
pub mod stack_trace;
pub mod state;
pub mod step;
pub mod strings;
pub mod value;
