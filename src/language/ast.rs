use crate::language::{
    errors::SyntaxError,
    parse_tree::{ParseNode, Term},
    span::{SourcePos, Span},
};
use crate::runtime::value::Value;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Clone, Debug)]
pub struct IfClause {
    /// `None` for the final `else` clause.
    pub condition: Option<Rc<SyntaxNode>>,
    pub block: Rc<SyntaxNode>,
}

/// The typed syntax tree the interpreter emits steps from. Nodes are shared
/// behind `Rc` because pending steps keep references to the blocks they will
/// run later (loop bodies, `finally` blocks, function bodies).
#[derive(Clone, Debug)]
pub enum NodeKind {
    Number(i64),
    Str(String),
    Ident(String),
    Binary {
        op: BinOp,
        left: Rc<SyntaxNode>,
        right: Rc<SyntaxNode>,
    },
    Unary {
        op: UnOp,
        operand: Rc<SyntaxNode>,
    },
    Assign {
        target: Rc<SyntaxNode>,
        value: Rc<SyntaxNode>,
    },
    AugAssign {
        target: Rc<SyntaxNode>,
        value: Rc<SyntaxNode>,
    },
    Member {
        source: Rc<SyntaxNode>,
        name: String,
    },
    Index {
        source: Rc<SyntaxNode>,
        index: Rc<SyntaxNode>,
    },
    Slice {
        source: Rc<SyntaxNode>,
        begin: Option<Rc<SyntaxNode>>,
        end: Option<Rc<SyntaxNode>>,
    },
    Array(Vec<Rc<SyntaxNode>>),
    Dict(Vec<(Rc<SyntaxNode>, Rc<SyntaxNode>)>),
    Call {
        callee: Rc<SyntaxNode>,
        args: Vec<Rc<SyntaxNode>>,
    },
    FuncDef {
        name: String,
        params: Vec<String>,
        body: Rc<SyntaxNode>,
    },
    If {
        clauses: Vec<IfClause>,
    },
    For {
        var: String,
        over: Rc<SyntaxNode>,
        body: Rc<SyntaxNode>,
    },
    While {
        test: Rc<SyntaxNode>,
        body: Rc<SyntaxNode>,
    },
    Break,
    Continue,
    Pass,
    Return(Option<Rc<SyntaxNode>>),
    Throw(Option<Rc<SyntaxNode>>),
    Try {
        body: Rc<SyntaxNode>,
        except_var: Option<String>,
        except_block: Rc<SyntaxNode>,
        finally_block: Option<Rc<SyntaxNode>>,
    },
    Statements(Vec<Rc<SyntaxNode>>),
    /// A pre-computed value wrapped as an expression node. Used by the runner
    /// to build synthetic call nodes around native argument values.
    Wrapper(Value),
}

#[derive(Clone, Debug)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    pub pos: SourcePos,
    /// Name of the source unit this node came from, for stack traces.
    pub unit: Rc<str>,
}

impl SyntaxNode {
    pub fn new(kind: NodeKind, pos: SourcePos, unit: &Rc<str>) -> Rc<Self> {
        Rc::new(Self {
            kind,
            pos,
            unit: Rc::clone(unit),
        })
    }

    /// A node with no source location, for synthetic trees built by the host.
    pub fn synthetic(kind: NodeKind) -> Rc<Self> {
        Rc::new(Self {
            kind,
            pos: SourcePos::default(),
            unit: Rc::from("<native>"),
        })
    }
}

/// Builds the typed tree from the parser's untyped one.
pub fn convert(node: &ParseNode, unit: &Rc<str>) -> Result<Rc<SyntaxNode>, SyntaxError> {
    Converter { unit }.node(node)
}

struct Converter<'a> {
    unit: &'a Rc<str>,
}

impl Converter<'_> {
    fn node(&self, node: &ParseNode) -> Result<Rc<SyntaxNode>, SyntaxError> {
        let kind = match node.term {
            Term::Number => {
                let value = node.text.parse::<i64>().map_err(|_| {
                    self.malformed(node, "number literal out of range")
                })?;
                NodeKind::Number(value)
            }
            Term::Str => NodeKind::Str(node.text.clone()),
            Term::Identifier => NodeKind::Ident(node.text.clone()),
            Term::BinExpr => {
                let [left, op, right] = self.children::<3>(node)?;
                NodeKind::Binary {
                    op: self.bin_op(op)?,
                    left: self.node(left)?,
                    right: self.node(right)?,
                }
            }
            Term::UnExpr => {
                let [op, operand] = self.children::<2>(node)?;
                let op = match op.text.as_str() {
                    "-" => UnOp::Neg,
                    "!" => UnOp::Not,
                    _ => return Err(self.malformed(node, "unknown unary operator")),
                };
                NodeKind::Unary {
                    op,
                    operand: self.node(operand)?,
                }
            }
            Term::Assignment => {
                let [lhs, rhs] = self.children::<2>(node)?;
                NodeKind::Assign {
                    target: self.node(lhs)?,
                    value: self.node(rhs)?,
                }
            }
            Term::AugAssignment => {
                let [lhs, rhs] = self.children::<2>(node)?;
                NodeKind::AugAssign {
                    target: self.node(lhs)?,
                    value: self.node(rhs)?,
                }
            }
            Term::MemberAccess => {
                let [source, name] = self.children::<2>(node)?;
                NodeKind::Member {
                    source: self.node(source)?,
                    name: name.text.clone(),
                }
            }
            Term::ArrayAccess => {
                let [source, index] = self.children::<2>(node)?;
                NodeKind::Index {
                    source: self.node(source)?,
                    index: self.node(index)?,
                }
            }
            Term::ArraySlice => {
                let [source, begin, end] = self.children::<3>(node)?;
                NodeKind::Slice {
                    source: self.node(source)?,
                    begin: self.optional(begin)?,
                    end: self.optional(end)?,
                }
            }
            Term::ArrayExpr => {
                let elements = node
                    .children
                    .iter()
                    .map(|child| self.node(child))
                    .collect::<Result<Vec<_>, _>>()?;
                NodeKind::Array(elements)
            }
            Term::DictExpr => {
                let mut pairs = Vec::with_capacity(node.children.len());
                for element in &node.children {
                    let [key, value] = self.children::<2>(element)?;
                    pairs.push((self.node(key)?, self.node(value)?));
                }
                NodeKind::Dict(pairs)
            }
            Term::FunctionCall => {
                let [callee, args] = self.children::<2>(node)?;
                NodeKind::Call {
                    callee: self.node(callee)?,
                    args: args
                        .children
                        .iter()
                        .map(|arg| self.node(arg))
                        .collect::<Result<Vec<_>, _>>()?,
                }
            }
            Term::FunctionDef => {
                let [name, params, body] = self.children::<3>(node)?;
                NodeKind::FuncDef {
                    name: name.text.clone(),
                    params: params.children.iter().map(|p| p.text.clone()).collect(),
                    body: self.node(body)?,
                }
            }
            Term::IfStmt => {
                let mut clauses = Vec::with_capacity(node.children.len());
                for clause in &node.children {
                    match clause.term {
                        Term::IfClause | Term::ElifClause => {
                            let [cond, block] = self.children::<2>(clause)?;
                            clauses.push(IfClause {
                                condition: Some(self.node(cond)?),
                                block: self.node(block)?,
                            });
                        }
                        Term::ElseClause => {
                            let [block] = self.children::<1>(clause)?;
                            clauses.push(IfClause {
                                condition: None,
                                block: self.node(block)?,
                            });
                        }
                        _ => return Err(self.malformed(clause, "unexpected if clause")),
                    }
                }
                NodeKind::If { clauses }
            }
            Term::TryStmt => {
                let [body, except, finally] = self.children::<3>(node)?;
                let [var, except_block] = self.children::<2>(except)?;
                let except_var = if var.is_empty() {
                    None
                } else {
                    Some(var.text.clone())
                };
                let finally_block = if finally.is_empty() {
                    None
                } else {
                    let [block] = self.children::<1>(finally)?;
                    Some(self.node(block)?)
                };
                NodeKind::Try {
                    body: self.node(body)?,
                    except_var,
                    except_block: self.node(except_block)?,
                    finally_block,
                }
            }
            Term::ForInStmt => {
                let [var, over, body] = self.children::<3>(node)?;
                NodeKind::For {
                    var: var.text.clone(),
                    over: self.node(over)?,
                    body: self.node(body)?,
                }
            }
            Term::WhileStmt => {
                let [test, body] = self.children::<2>(node)?;
                NodeKind::While {
                    test: self.node(test)?,
                    body: self.node(body)?,
                }
            }
            Term::ReturnStmt => NodeKind::Return(match node.children.first() {
                Some(value) => Some(self.node(value)?),
                None => None,
            }),
            Term::ThrowStmt => NodeKind::Throw(match node.children.first() {
                Some(value) => Some(self.node(value)?),
                None => None,
            }),
            Term::BreakStmt => NodeKind::Break,
            Term::ContinueStmt => NodeKind::Continue,
            Term::PassStmt => NodeKind::Pass,
            Term::StmtList => {
                let statements = node
                    .children
                    .iter()
                    .map(|child| self.node(child))
                    .collect::<Result<Vec<_>, _>>()?;
                NodeKind::Statements(statements)
            }
            Term::Empty
            | Term::Operator
            | Term::ArgList
            | Term::ParamList
            | Term::DictElement
            | Term::IfClause
            | Term::ElifClause
            | Term::ElseClause
            | Term::ExceptClause
            | Term::FinallyClause => {
                return Err(self.malformed(node, "structural term outside its parent"))
            }
        };
        Ok(SyntaxNode::new(kind, node.pos, self.unit))
    }

    fn optional(&self, node: &ParseNode) -> Result<Option<Rc<SyntaxNode>>, SyntaxError> {
        if node.is_empty() {
            Ok(None)
        } else {
            self.node(node).map(Some)
        }
    }

    fn bin_op(&self, op: &ParseNode) -> Result<BinOp, SyntaxError> {
        Ok(match op.text.as_str() {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "<" => BinOp::Lt,
            ">" => BinOp::Gt,
            "<=" => BinOp::Le,
            ">=" => BinOp::Ge,
            "==" => BinOp::Eq,
            "!=" => BinOp::Ne,
            "&&" => BinOp::And,
            "||" => BinOp::Or,
            _ => return Err(self.malformed(op, "unknown binary operator")),
        })
    }

    fn children<'n, const N: usize>(
        &self,
        node: &'n ParseNode,
    ) -> Result<[&'n ParseNode; N], SyntaxError> {
        if node.children.len() != N {
            return Err(self.malformed(node, "wrong child count"));
        }
        let mut out = [&node.children[0]; N];
        for (slot, child) in out.iter_mut().zip(&node.children) {
            *slot = child;
        }
        Ok(out)
    }

    fn malformed(&self, node: &ParseNode, detail: &str) -> SyntaxError {
        SyntaxError::new(
            format!("Malformed parse tree at {:?}: {}", node.term, detail),
            Span::new(0, 0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::parser;

    fn build(source: &str) -> Rc<SyntaxNode> {
        let tree = parser::parse(source).expect("parse failure");
        convert(&tree, &Rc::from("test")).expect("convert failure")
    }

    #[test]
    fn converts_literals_and_identifiers() {
        let root = build("x = 'hi'\ny = 42\n");
        let NodeKind::Statements(stmts) = &root.kind else {
            panic!("expected statements")
        };
        let NodeKind::Assign { value, .. } = &stmts[0].kind else {
            panic!("expected assign")
        };
        assert!(matches!(value.kind, NodeKind::Str(ref s) if s == "hi"));
        let NodeKind::Assign { value, .. } = &stmts[1].kind else {
            panic!("expected assign")
        };
        assert!(matches!(value.kind, NodeKind::Number(42)));
    }

    #[test]
    fn else_clause_has_no_condition() {
        let root = build("if a:\n  pass\nelse:\n  pass\n");
        let NodeKind::Statements(stmts) = &root.kind else {
            panic!("expected statements")
        };
        let NodeKind::If { clauses } = &stmts[0].kind else {
            panic!("expected if")
        };
        assert!(clauses[0].condition.is_some());
        assert!(clauses[1].condition.is_none());
    }

    #[test]
    fn empty_slice_bounds_become_none() {
        let root = build("a[:]\n");
        let NodeKind::Statements(stmts) = &root.kind else {
            panic!("expected statements")
        };
        let NodeKind::Slice { begin, end, .. } = &stmts[0].kind else {
            panic!("expected slice")
        };
        assert!(begin.is_none() && end.is_none());
    }

    #[test]
    fn try_without_finally() {
        let root = build("try:\n  pass\nexcept:\n  pass\n");
        let NodeKind::Statements(stmts) = &root.kind else {
            panic!("expected statements")
        };
        let NodeKind::Try {
            except_var,
            finally_block,
            ..
        } = &stmts[0].kind
        else {
            panic!("expected try")
        };
        assert!(except_var.is_none());
        assert!(finally_block.is_none());
    }
}
