use crate::language::{
    ast::{self, SyntaxNode},
    errors::SyntaxErrors,
    parser,
};
use std::rc::Rc;

/// A compiled source unit, ready to be seeded into a runtime `State`.
#[derive(Clone, Debug)]
pub struct CodeFragment {
    pub unit: Rc<str>,
    pub root: Rc<SyntaxNode>,
}

pub struct Compiler;

impl Compiler {
    /// Compiles one source unit. `unit` is the name reported in stack traces.
    pub fn compile(unit: &str, source: &str) -> Result<CodeFragment, SyntaxErrors> {
        let tree = parser::parse(source)?;
        let unit: Rc<str> = Rc::from(unit);
        let root = ast::convert(&tree, &unit).map_err(|err| SyntaxErrors::new(vec![err]))?;
        Ok(CodeFragment { unit, root })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::ast::NodeKind;

    #[test]
    fn compiles_a_unit_end_to_end() {
        let fragment = Compiler::compile("sample", "x = 1 + 2\n").expect("compile failure");
        assert_eq!(&*fragment.unit, "sample");
        assert!(matches!(fragment.root.kind, NodeKind::Statements(_)));
    }

    #[test]
    fn surfaces_lex_and_parse_errors() {
        let err = Compiler::compile("sample", "x = $\n").expect_err("should fail");
        assert!(!err.errors.is_empty());
    }
}
