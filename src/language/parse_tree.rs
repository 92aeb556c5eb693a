use crate::language::span::SourcePos;

/// Grammar productions. The parser hands the compiler a tree of these; the
/// typed AST is built from them and nothing downstream sees tokens or spans.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Term {
    Empty,
    Number,
    Str,
    Identifier,
    Operator,
    BinExpr,
    UnExpr,
    Assignment,
    AugAssignment,
    MemberAccess,
    ArrayAccess,
    ArraySlice,
    ArrayExpr,
    DictExpr,
    DictElement,
    FunctionCall,
    ArgList,
    FunctionDef,
    ParamList,
    ReturnStmt,
    ThrowStmt,
    BreakStmt,
    ContinueStmt,
    PassStmt,
    IfStmt,
    IfClause,
    ElifClause,
    ElseClause,
    TryStmt,
    ExceptClause,
    FinallyClause,
    ForInStmt,
    WhileStmt,
    StmtList,
}

/// An untyped parse-tree node.
///
/// Child shapes per term:
/// - `BinExpr`: `[left, Operator, right]`
/// - `UnExpr`: `[Operator, operand]`
/// - `Assignment` / `AugAssignment`: `[lhs, rhs]`
/// - `MemberAccess`: `[source, Identifier]`
/// - `ArrayAccess`: `[source, index]`
/// - `ArraySlice`: `[source, begin|Empty, end|Empty]`
/// - `ArrayExpr`: elements; `DictExpr`: `DictElement[key, value]` children
/// - `FunctionCall`: `[callee, ArgList]`
/// - `FunctionDef`: `[Identifier, ParamList, StmtList]`
/// - `ReturnStmt` / `ThrowStmt`: `[]` or `[value]`
/// - `IfStmt`: `IfClause[cond, StmtList]`, `ElifClause[cond, StmtList]`...,
///   optionally `ElseClause[StmtList]` last
/// - `TryStmt`: `[StmtList, ExceptClause, FinallyClause|Empty]`; the except
///   clause is `[Identifier|Empty, StmtList]`
/// - `ForInStmt`: `[Identifier, over, StmtList]`; `WhileStmt`: `[test, StmtList]`
#[derive(Clone, Debug)]
pub struct ParseNode {
    pub term: Term,
    /// Literal or identifier text; operator symbol for `Operator` nodes.
    pub text: String,
    pub pos: SourcePos,
    pub children: Vec<ParseNode>,
}

impl ParseNode {
    pub fn new(term: Term, pos: SourcePos) -> Self {
        Self {
            term,
            text: String::new(),
            pos,
            children: Vec::new(),
        }
    }

    pub fn with_text(term: Term, text: impl Into<String>, pos: SourcePos) -> Self {
        Self {
            term,
            text: text.into(),
            pos,
            children: Vec::new(),
        }
    }

    pub fn with_children(term: Term, pos: SourcePos, children: Vec<ParseNode>) -> Self {
        Self {
            term,
            text: String::new(),
            pos,
            children,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.term == Term::Empty
    }
}
