use crate::language::{
    errors::{SyntaxError, SyntaxErrors},
    lexer::lex,
    parse_tree::{ParseNode, Term},
    span::SourcePos,
    token::{Token, TokenKind},
};

/// Parses a source unit into an untyped parse tree rooted at a `StmtList`.
pub fn parse(source: &str) -> Result<ParseNode, SyntaxErrors> {
    let tokens = match lex(source) {
        Ok(tokens) => tokens,
        Err(errors) => return Err(SyntaxErrors::new(errors)),
    };
    Parser::new(tokens).parse()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<ParseNode, SyntaxErrors> {
        let start = self.current_pos();
        let statements = self.parse_statements_until(TokenKind::Eof);
        if self.errors.is_empty() {
            Ok(ParseNode::with_children(Term::StmtList, start, statements))
        } else {
            Err(SyntaxErrors::new(self.errors))
        }
    }

    // Token plumbing

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_pos(&self) -> SourcePos {
        self.current().pos
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token, SyntaxError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(format!(
                "Expected {}, found {}",
                kind.describe(),
                self.current().kind.describe()
            )))
        }
    }

    fn expect_identifier(&mut self, message: &str) -> Result<(String, SourcePos), SyntaxError> {
        let pos = self.current_pos();
        match self.current().kind.clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok((name, pos))
            }
            _ => Err(self.error_here(message)),
        }
    }

    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(message, self.current().span)
    }

    fn report(&mut self, err: SyntaxError) {
        self.errors.push(err);
    }

    /// Skips to just past the next statement boundary at the current block
    /// level, balancing indent tokens so recovery lands on a statement start.
    fn synchronize(&mut self) {
        let mut depth = 0usize;
        loop {
            match &self.current().kind {
                TokenKind::Eof => return,
                TokenKind::Indent => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::Dedent => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    self.advance();
                }
                TokenKind::Newline if depth == 0 => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // Statements

    fn parse_statements_until(&mut self, end: TokenKind) -> Vec<ParseNode> {
        let mut statements = Vec::new();
        while !self.check(&end) && !self.check(&TokenKind::Eof) {
            if self.matches(&TokenKind::Newline) {
                continue;
            }
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.report(err);
                    self.synchronize();
                }
            }
        }
        self.matches(&end);
        statements
    }

    fn parse_statement(&mut self) -> Result<ParseNode, SyntaxError> {
        let pos = self.current_pos();
        match &self.current().kind {
            TokenKind::Def => self.parse_function_def(),
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::While => self.parse_while(),
            TokenKind::Try => self.parse_try(),
            TokenKind::Return => {
                self.advance();
                let mut node = ParseNode::new(Term::ReturnStmt, pos);
                if !self.check(&TokenKind::Newline) {
                    node.children.push(self.parse_expression()?);
                }
                self.end_statement()?;
                Ok(node)
            }
            TokenKind::Throw => {
                self.advance();
                let mut node = ParseNode::new(Term::ThrowStmt, pos);
                if !self.check(&TokenKind::Newline) {
                    node.children.push(self.parse_expression()?);
                }
                self.end_statement()?;
                Ok(node)
            }
            TokenKind::Break => {
                self.advance();
                self.end_statement()?;
                Ok(ParseNode::new(Term::BreakStmt, pos))
            }
            TokenKind::Continue => {
                self.advance();
                self.end_statement()?;
                Ok(ParseNode::new(Term::ContinueStmt, pos))
            }
            TokenKind::Pass => {
                self.advance();
                self.end_statement()?;
                Ok(ParseNode::new(Term::PassStmt, pos))
            }
            _ => {
                let expr = self.parse_expression()?;
                self.end_statement()?;
                Ok(expr)
            }
        }
    }

    fn end_statement(&mut self) -> Result<(), SyntaxError> {
        if self.check(&TokenKind::Eof) || self.check(&TokenKind::Dedent) {
            return Ok(());
        }
        self.expect(&TokenKind::Newline).map(|_| ())
    }

    /// `: NEWLINE INDENT statements DEDENT`
    fn parse_block(&mut self) -> Result<ParseNode, SyntaxError> {
        self.expect(&TokenKind::Colon)?;
        self.expect(&TokenKind::Newline)?;
        self.expect(&TokenKind::Indent)?;
        let pos = self.current_pos();
        let statements = self.parse_statements_until(TokenKind::Dedent);
        Ok(ParseNode::with_children(Term::StmtList, pos, statements))
    }

    fn parse_function_def(&mut self) -> Result<ParseNode, SyntaxError> {
        let pos = self.current_pos();
        self.expect(&TokenKind::Def)?;
        let (name, name_pos) = self.expect_identifier("Expected function name after 'def'")?;
        self.expect(&TokenKind::LParen)?;
        let params_pos = self.current_pos();
        let mut params = ParseNode::new(Term::ParamList, params_pos);
        if !self.check(&TokenKind::RParen) {
            loop {
                let (param, param_pos) = self.expect_identifier("Expected parameter name")?;
                params
                    .children
                    .push(ParseNode::with_text(Term::Identifier, param, param_pos));
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(ParseNode::with_children(
            Term::FunctionDef,
            pos,
            vec![
                ParseNode::with_text(Term::Identifier, name, name_pos),
                params,
                body,
            ],
        ))
    }

    fn parse_if(&mut self) -> Result<ParseNode, SyntaxError> {
        let pos = self.current_pos();
        self.expect(&TokenKind::If)?;
        let mut clauses = Vec::new();
        let cond = self.parse_expression()?;
        let block = self.parse_block()?;
        clauses.push(ParseNode::with_children(
            Term::IfClause,
            pos,
            vec![cond, block],
        ));
        loop {
            let clause_pos = self.current_pos();
            if self.matches(&TokenKind::Elif) {
                let cond = self.parse_expression()?;
                let block = self.parse_block()?;
                clauses.push(ParseNode::with_children(
                    Term::ElifClause,
                    clause_pos,
                    vec![cond, block],
                ));
            } else if self.matches(&TokenKind::Else) {
                let block = self.parse_block()?;
                clauses.push(ParseNode::with_children(
                    Term::ElseClause,
                    clause_pos,
                    vec![block],
                ));
                break;
            } else {
                break;
            }
        }
        Ok(ParseNode::with_children(Term::IfStmt, pos, clauses))
    }

    fn parse_for(&mut self) -> Result<ParseNode, SyntaxError> {
        let pos = self.current_pos();
        self.expect(&TokenKind::For)?;
        let (var, var_pos) = self.expect_identifier("Expected loop variable after 'for'")?;
        self.expect(&TokenKind::In)?;
        let over = self.parse_expression()?;
        let body = self.parse_block()?;
        Ok(ParseNode::with_children(
            Term::ForInStmt,
            pos,
            vec![
                ParseNode::with_text(Term::Identifier, var, var_pos),
                over,
                body,
            ],
        ))
    }

    fn parse_while(&mut self) -> Result<ParseNode, SyntaxError> {
        let pos = self.current_pos();
        self.expect(&TokenKind::While)?;
        let test = self.parse_expression()?;
        let body = self.parse_block()?;
        Ok(ParseNode::with_children(
            Term::WhileStmt,
            pos,
            vec![test, body],
        ))
    }

    fn parse_try(&mut self) -> Result<ParseNode, SyntaxError> {
        let pos = self.current_pos();
        self.expect(&TokenKind::Try)?;
        let body = self.parse_block()?;

        let except_pos = self.current_pos();
        self.expect(&TokenKind::Except)?;
        let var = if let TokenKind::Identifier(name) = self.current().kind.clone() {
            let var_pos = self.current_pos();
            self.advance();
            ParseNode::with_text(Term::Identifier, name, var_pos)
        } else {
            ParseNode::new(Term::Empty, except_pos)
        };
        let except_block = self.parse_block()?;
        let except = ParseNode::with_children(Term::ExceptClause, except_pos, vec![var, except_block]);

        let finally = if self.check(&TokenKind::Finally) {
            let finally_pos = self.current_pos();
            self.advance();
            let block = self.parse_block()?;
            ParseNode::with_children(Term::FinallyClause, finally_pos, vec![block])
        } else {
            ParseNode::new(Term::Empty, pos)
        };

        Ok(ParseNode::with_children(
            Term::TryStmt,
            pos,
            vec![body, except, finally],
        ))
    }

    // Expressions

    fn parse_expression(&mut self) -> Result<ParseNode, SyntaxError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<ParseNode, SyntaxError> {
        let lhs = self.parse_or()?;
        let pos = self.current_pos();
        if self.matches(&TokenKind::Assign) {
            let rhs = self.parse_assignment()?;
            Ok(ParseNode::with_children(
                Term::Assignment,
                pos,
                vec![lhs, rhs],
            ))
        } else if self.matches(&TokenKind::PlusAssign) {
            let rhs = self.parse_assignment()?;
            Ok(ParseNode::with_children(
                Term::AugAssignment,
                pos,
                vec![lhs, rhs],
            ))
        } else {
            Ok(lhs)
        }
    }

    fn parse_or(&mut self) -> Result<ParseNode, SyntaxError> {
        let mut left = self.parse_and()?;
        while self.check(&TokenKind::OrOr) {
            left = self.binary_step(left, "||", Self::parse_and)?;
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<ParseNode, SyntaxError> {
        let mut left = self.parse_comparison()?;
        while self.check(&TokenKind::AndAnd) {
            left = self.binary_step(left, "&&", Self::parse_comparison)?;
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<ParseNode, SyntaxError> {
        let mut left = self.parse_additive()?;
        loop {
            let symbol = match &self.current().kind {
                TokenKind::Lt => "<",
                TokenKind::Gt => ">",
                TokenKind::Le => "<=",
                TokenKind::Ge => ">=",
                TokenKind::EqEq => "==",
                TokenKind::NotEq => "!=",
                _ => break,
            };
            left = self.binary_step(left, symbol, Self::parse_additive)?;
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<ParseNode, SyntaxError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let symbol = match &self.current().kind {
                TokenKind::Plus => "+",
                TokenKind::Minus => "-",
                _ => break,
            };
            left = self.binary_step(left, symbol, Self::parse_multiplicative)?;
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<ParseNode, SyntaxError> {
        let mut left = self.parse_unary()?;
        loop {
            let symbol = match &self.current().kind {
                TokenKind::Star => "*",
                TokenKind::Slash => "/",
                _ => break,
            };
            left = self.binary_step(left, symbol, Self::parse_unary)?;
        }
        Ok(left)
    }

    fn binary_step(
        &mut self,
        left: ParseNode,
        symbol: &str,
        next: fn(&mut Self) -> Result<ParseNode, SyntaxError>,
    ) -> Result<ParseNode, SyntaxError> {
        let pos = self.current_pos();
        self.advance();
        let right = next(self)?;
        Ok(ParseNode::with_children(
            Term::BinExpr,
            pos,
            vec![
                left,
                ParseNode::with_text(Term::Operator, symbol, pos),
                right,
            ],
        ))
    }

    fn parse_unary(&mut self) -> Result<ParseNode, SyntaxError> {
        let pos = self.current_pos();
        let symbol = match &self.current().kind {
            TokenKind::Minus => "-",
            TokenKind::Bang => "!",
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(ParseNode::with_children(
            Term::UnExpr,
            pos,
            vec![ParseNode::with_text(Term::Operator, symbol, pos), operand],
        ))
    }

    fn parse_postfix(&mut self) -> Result<ParseNode, SyntaxError> {
        let mut node = self.parse_primary()?;
        loop {
            let pos = self.current_pos();
            if self.matches(&TokenKind::Dot) {
                let (name, name_pos) = self.expect_identifier("Expected member name after '.'")?;
                node = ParseNode::with_children(
                    Term::MemberAccess,
                    pos,
                    vec![node, ParseNode::with_text(Term::Identifier, name, name_pos)],
                );
            } else if self.matches(&TokenKind::LParen) {
                let args_pos = self.current_pos();
                let mut args = ParseNode::new(Term::ArgList, args_pos);
                if !self.check(&TokenKind::RParen) {
                    loop {
                        args.children.push(self.parse_expression()?);
                        if !self.matches(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RParen)?;
                node = ParseNode::with_children(Term::FunctionCall, pos, vec![node, args]);
            } else if self.matches(&TokenKind::LBracket) {
                node = self.parse_index_or_slice(node, pos)?;
            } else {
                break;
            }
        }
        Ok(node)
    }

    fn parse_index_or_slice(
        &mut self,
        source: ParseNode,
        pos: SourcePos,
    ) -> Result<ParseNode, SyntaxError> {
        let begin = if self.check(&TokenKind::Colon) {
            ParseNode::new(Term::Empty, self.current_pos())
        } else {
            self.parse_expression()?
        };
        if self.matches(&TokenKind::Colon) {
            let end = if self.check(&TokenKind::RBracket) {
                ParseNode::new(Term::Empty, self.current_pos())
            } else {
                self.parse_expression()?
            };
            self.expect(&TokenKind::RBracket)?;
            Ok(ParseNode::with_children(
                Term::ArraySlice,
                pos,
                vec![source, begin, end],
            ))
        } else {
            self.expect(&TokenKind::RBracket)?;
            Ok(ParseNode::with_children(
                Term::ArrayAccess,
                pos,
                vec![source, begin],
            ))
        }
    }

    fn parse_primary(&mut self) -> Result<ParseNode, SyntaxError> {
        let pos = self.current_pos();
        match self.current().kind.clone() {
            TokenKind::Integer(value) => {
                self.advance();
                Ok(ParseNode::with_text(Term::Number, value.to_string(), pos))
            }
            TokenKind::Str(value) => {
                self.advance();
                Ok(ParseNode::with_text(Term::Str, value, pos))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(ParseNode::with_text(Term::Identifier, name, pos))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.advance();
                let mut node = ParseNode::new(Term::ArrayExpr, pos);
                if !self.check(&TokenKind::RBracket) {
                    loop {
                        node.children.push(self.parse_expression()?);
                        if !self.matches(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RBracket)?;
                Ok(node)
            }
            TokenKind::LBrace => {
                self.advance();
                let mut node = ParseNode::new(Term::DictExpr, pos);
                if !self.check(&TokenKind::RBrace) {
                    loop {
                        let element_pos = self.current_pos();
                        let key = self.parse_or()?;
                        self.expect(&TokenKind::Colon)?;
                        let value = self.parse_expression()?;
                        node.children.push(ParseNode::with_children(
                            Term::DictElement,
                            element_pos,
                            vec![key, value],
                        ));
                        if !self.matches(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RBrace)?;
                Ok(node)
            }
            other => Err(self.error_here(format!("Expected expression, found {}", other.describe()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(source: &str) -> ParseNode {
        parse(source).expect("parse failure")
    }

    #[test]
    fn parses_assignment_statement() {
        let tree = root("x = 5\n");
        assert_eq!(tree.term, Term::StmtList);
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].term, Term::Assignment);
        assert_eq!(tree.children[0].children[0].text, "x");
        assert_eq!(tree.children[0].children[1].term, Term::Number);
    }

    #[test]
    fn precedence_mul_binds_tighter_than_add() {
        let tree = root("a = 1 + 2 * 3\n");
        let rhs = &tree.children[0].children[1];
        assert_eq!(rhs.term, Term::BinExpr);
        assert_eq!(rhs.children[1].text, "+");
        assert_eq!(rhs.children[2].term, Term::BinExpr);
        assert_eq!(rhs.children[2].children[1].text, "*");
    }

    #[test]
    fn parses_function_def_with_params() {
        let tree = root("def add(a, b):\n  return a + b\n");
        let def = &tree.children[0];
        assert_eq!(def.term, Term::FunctionDef);
        assert_eq!(def.children[0].text, "add");
        assert_eq!(def.children[1].children.len(), 2);
        assert_eq!(def.children[2].children[0].term, Term::ReturnStmt);
    }

    #[test]
    fn parses_if_elif_else_clauses() {
        let tree = root("if a:\n  pass\nelif b:\n  pass\nelse:\n  pass\n");
        let ifstmt = &tree.children[0];
        assert_eq!(ifstmt.term, Term::IfStmt);
        assert_eq!(ifstmt.children.len(), 3);
        assert_eq!(ifstmt.children[0].term, Term::IfClause);
        assert_eq!(ifstmt.children[1].term, Term::ElifClause);
        assert_eq!(ifstmt.children[2].term, Term::ElseClause);
    }

    #[test]
    fn parses_try_except_finally() {
        let tree = root("try:\n  pass\nexcept e:\n  pass\nfinally:\n  pass\n");
        let stmt = &tree.children[0];
        assert_eq!(stmt.term, Term::TryStmt);
        assert_eq!(stmt.children[1].term, Term::ExceptClause);
        assert_eq!(stmt.children[1].children[0].text, "e");
        assert_eq!(stmt.children[2].term, Term::FinallyClause);
    }

    #[test]
    fn except_variable_is_optional() {
        let tree = root("try:\n  pass\nexcept:\n  pass\n");
        let stmt = &tree.children[0];
        assert!(stmt.children[1].children[0].is_empty());
        assert!(stmt.children[2].is_empty());
    }

    #[test]
    fn slice_bounds_are_optional() {
        let tree = root("a[:]\na[1:]\na[:2]\na[1:2]\na[1]\n");
        let slices: Vec<_> = tree.children.iter().map(|c| c.term).collect();
        assert_eq!(
            slices,
            vec![
                Term::ArraySlice,
                Term::ArraySlice,
                Term::ArraySlice,
                Term::ArraySlice,
                Term::ArrayAccess,
            ]
        );
        assert!(tree.children[0].children[1].is_empty());
        assert!(tree.children[0].children[2].is_empty());
        assert!(tree.children[1].children[2].is_empty());
        assert!(tree.children[2].children[1].is_empty());
    }

    #[test]
    fn parses_map_literal_with_expression_keys() {
        let tree = root("m = { 'a': 1, 2: b }\n");
        let dict = &tree.children[0].children[1];
        assert_eq!(dict.term, Term::DictExpr);
        assert_eq!(dict.children.len(), 2);
        assert_eq!(dict.children[0].children[0].term, Term::Str);
        assert_eq!(dict.children[1].children[0].term, Term::Number);
    }

    #[test]
    fn chained_postfix_nests_left_to_right() {
        let tree = root("a.b[0](1)\n");
        let call = &tree.children[0];
        assert_eq!(call.term, Term::FunctionCall);
        assert_eq!(call.children[0].term, Term::ArrayAccess);
        assert_eq!(call.children[0].children[0].term, Term::MemberAccess);
    }

    #[test]
    fn augmented_assignment_is_an_expression() {
        let tree = root("a = b += 1\n");
        assert_eq!(tree.children[0].term, Term::Assignment);
        assert_eq!(tree.children[0].children[1].term, Term::AugAssignment);
    }

    #[test]
    fn reports_missing_block() {
        let err = parse("if a\n  pass\n").expect_err("should fail");
        assert!(!err.errors.is_empty());
    }

    #[test]
    fn recovers_and_reports_multiple_errors() {
        let err = parse("a = \nb = \n").expect_err("should fail");
        assert_eq!(err.errors.len(), 2);
    }
}
