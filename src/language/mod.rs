pub mod ast;
pub mod compiler;
pub mod errors;
pub mod lexer;
pub mod parse_tree;
pub mod parser;
pub mod span;
pub mod token;
