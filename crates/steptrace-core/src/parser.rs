//! Recursive-descent parser producing a [`Program`].
//!
//! Function definitions are only accepted at the top level; each one is
//! registered in the program's function table and referenced from the
//! statement list by [`FunctionId`].

use crate::ast::{
    Arg, BinOp, BoolOp, CmpOp, CompClause, Expr, FunctionDef, Param, Program, Stmt, StmtKind,
    Target, UnaryOp,
};
use crate::error::LoadError;
use crate::id::FunctionId;
use crate::lexer::{tokenize, Keyword, Token, TokenKind};

/// Parses script source into a [`Program`].
pub fn parse_program(source: &str) -> Result<Program, LoadError> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).parse()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    functions: Vec<FunctionDef>,
    in_function: bool,
    loop_depth: usize,
    /// Line of the most recently consumed non-structural token.
    last_line: usize,
}

type PResult<T> = Result<T, LoadError>;

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            functions: Vec::new(),
            in_function: false,
            loop_depth: 0,
            last_line: 1,
        }
    }

    fn parse(mut self) -> PResult<Program> {
        let mut body = Vec::new();
        while !self.check(&TokenKind::Eof) {
            if self.check(&TokenKind::Indent) {
                return Err(self.error("unexpected indent"));
            }
            self.parse_statement(&mut body)?;
        }
        Ok(Program {
            functions: self.functions,
            body,
        })
    }

    // -----------------------------------------------------------------------
    // Token helpers
    // -----------------------------------------------------------------------

    fn peek(&self) -> &TokenKind {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len().saturating_sub(1));
        self.tokens
            .get(idx)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|t| t.line)
            .unwrap_or(self.last_line)
    }

    fn advance(&mut self) -> TokenKind {
        let Some(tok) = self.tokens.get(self.pos) else {
            return TokenKind::Eof;
        };
        let kind = tok.kind.clone();
        if !matches!(
            kind,
            TokenKind::Indent | TokenKind::Dedent | TokenKind::Eof
        ) {
            self.last_line = tok.line;
        }
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn check_keyword(&self, kw: Keyword) -> bool {
        matches!(self.peek(), TokenKind::Keyword(k) if *k == kw)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if self.check_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> PResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {what}")))
        }
    }

    fn expect_name(&mut self, what: &str) -> PResult<String> {
        match self.peek().clone() {
            TokenKind::Name(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error(&format!("expected {what}"))),
        }
    }

    fn error(&self, message: &str) -> LoadError {
        if let TokenKind::Unsupported(word) = self.peek() {
            return LoadError::syntax(self.line(), format!("'{word}' is not supported"));
        }
        LoadError::syntax(self.line(), message)
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn parse_statement(&mut self, out: &mut Vec<Stmt>) -> PResult<()> {
        match self.peek() {
            TokenKind::Keyword(Keyword::If) => {
                let stmt = self.parse_if()?;
                out.push(stmt);
            }
            TokenKind::Keyword(Keyword::While) => {
                let stmt = self.parse_while()?;
                out.push(stmt);
            }
            TokenKind::Keyword(Keyword::For) => {
                let stmt = self.parse_for()?;
                out.push(stmt);
            }
            TokenKind::Keyword(Keyword::Def) => {
                let stmt = self.parse_def()?;
                out.push(stmt);
            }
            TokenKind::Keyword(Keyword::Elif) | TokenKind::Keyword(Keyword::Else) => {
                return Err(self.error("invalid syntax: 'else'/'elif' without a matching 'if'"));
            }
            _ => self.parse_simple_line(out, false)?,
        }
        Ok(())
    }

    /// Parses `small_stmt (';' small_stmt)* [';'] NEWLINE`.
    fn parse_simple_line(&mut self, out: &mut Vec<Stmt>, first_same_line: bool) -> PResult<()> {
        let mut same_line = first_same_line;
        loop {
            let stmt = self.parse_small_statement(same_line)?;
            out.push(stmt);
            same_line = true;
            if !self.eat(&TokenKind::Semicolon) {
                break;
            }
            if self.check(&TokenKind::Newline) {
                break;
            }
        }
        if !self.eat(&TokenKind::Newline) && !self.check(&TokenKind::Eof) {
            return Err(self.error("invalid syntax"));
        }
        Ok(())
    }

    fn parse_small_statement(&mut self, same_line: bool) -> PResult<Stmt> {
        let line = self.line();
        let kind = match self.peek().clone() {
            TokenKind::Keyword(Keyword::Pass) => {
                self.advance();
                StmtKind::Pass
            }
            TokenKind::Keyword(Keyword::Break) => {
                if self.loop_depth == 0 {
                    return Err(self.error("'break' outside loop"));
                }
                self.advance();
                StmtKind::Break
            }
            TokenKind::Keyword(Keyword::Continue) => {
                if self.loop_depth == 0 {
                    return Err(self.error("'continue' not properly in loop"));
                }
                self.advance();
                StmtKind::Continue
            }
            TokenKind::Keyword(Keyword::Return) => {
                if !self.in_function {
                    return Err(self.error("'return' outside function"));
                }
                self.advance();
                if self.at_statement_end() {
                    StmtKind::Return(None)
                } else {
                    StmtKind::Return(Some(self.parse_testlist()?))
                }
            }
            TokenKind::Keyword(Keyword::Raise) => {
                self.advance();
                if self.at_statement_end() {
                    StmtKind::Raise(None)
                } else {
                    StmtKind::Raise(Some(self.parse_expr()?))
                }
            }
            TokenKind::Keyword(Keyword::Assert) => {
                self.advance();
                let test = self.parse_expr()?;
                let message = if self.eat(&TokenKind::Comma) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                StmtKind::Assert { test, message }
            }
            TokenKind::Keyword(Keyword::Def) => {
                return Err(self.error("function definitions must start on their own line"));
            }
            TokenKind::Unsupported(word) => {
                return Err(LoadError::syntax(line, format!("'{word}' is not supported")));
            }
            _ => self.parse_expr_statement(line)?,
        };
        Ok(Stmt {
            line,
            same_line,
            kind,
        })
    }

    fn at_statement_end(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof
        )
    }

    fn parse_expr_statement(&mut self, line: usize) -> PResult<StmtKind> {
        let first = self.parse_testlist()?;

        if self.check(&TokenKind::Assign) {
            let mut exprs = vec![first];
            while self.eat(&TokenKind::Assign) {
                exprs.push(self.parse_testlist()?);
            }
            let value = exprs.pop().ok_or_else(|| self.error("invalid syntax"))?;
            let targets = exprs
                .into_iter()
                .map(|e| into_target(e, line))
                .collect::<PResult<Vec<_>>>()?;
            return Ok(StmtKind::Assign { targets, value });
        }

        let aug = match self.peek() {
            TokenKind::PlusAssign => Some(BinOp::Add),
            TokenKind::MinusAssign => Some(BinOp::Sub),
            TokenKind::StarAssign => Some(BinOp::Mul),
            TokenKind::SlashAssign => Some(BinOp::Div),
            TokenKind::DoubleSlashAssign => Some(BinOp::FloorDiv),
            TokenKind::PercentAssign => Some(BinOp::Mod),
            TokenKind::DoubleStarAssign => Some(BinOp::Pow),
            _ => None,
        };
        if let Some(op) = aug {
            self.advance();
            let target = match into_target(first, line)? {
                Target::Unpack(_) => {
                    return Err(LoadError::syntax(
                        line,
                        "illegal expression for augmented assignment",
                    ))
                }
                target => target,
            };
            let value = self.parse_testlist()?;
            return Ok(StmtKind::AugAssign { target, op, value });
        }

        Ok(StmtKind::Expr(first))
    }

    /// Parses `':' (simple_line | NEWLINE INDENT stmt+ DEDENT)`.
    fn parse_block(&mut self, header: &str) -> PResult<Vec<Stmt>> {
        let header_line = self.line();
        self.expect(&TokenKind::Colon, "':'")?;
        let mut body = Vec::new();

        if !self.eat(&TokenKind::Newline) {
            self.parse_simple_line(&mut body, true)?;
            return Ok(body);
        }

        if !self.eat(&TokenKind::Indent) {
            return Err(LoadError::syntax(
                self.line(),
                format!("expected an indented block after '{header}' statement on line {header_line}"),
            ));
        }
        while !self.check(&TokenKind::Dedent) && !self.check(&TokenKind::Eof) {
            self.parse_statement(&mut body)?;
        }
        self.eat(&TokenKind::Dedent);
        Ok(body)
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let line = self.line();
        self.advance();
        let test = self.parse_expr()?;
        let body = self.parse_block("if")?;

        let orelse = if self.check_keyword(Keyword::Elif) {
            // An `elif` is an `if` nested in the else branch, on its own line.
            vec![self.parse_if()?]
        } else if self.eat_keyword(Keyword::Else) {
            self.parse_block("else")?
        } else {
            Vec::new()
        };

        Ok(Stmt {
            line,
            same_line: false,
            kind: StmtKind::If { test, body, orelse },
        })
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        let line = self.line();
        self.advance();
        let test = self.parse_expr()?;
        self.loop_depth += 1;
        let body = self.parse_block("while");
        self.loop_depth -= 1;
        let body = body?;
        self.reject_loop_else()?;
        Ok(Stmt {
            line,
            same_line: false,
            kind: StmtKind::While { test, body },
        })
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let line = self.line();
        self.advance();
        let target = self.parse_target_list(line)?;
        if !self.eat_keyword(Keyword::In) {
            return Err(self.error("expected 'in'"));
        }
        let iter = self.parse_testlist()?;
        self.loop_depth += 1;
        let body = self.parse_block("for");
        self.loop_depth -= 1;
        let body = body?;
        self.reject_loop_else()?;
        Ok(Stmt {
            line,
            same_line: false,
            kind: StmtKind::For { target, iter, body },
        })
    }

    fn reject_loop_else(&self) -> PResult<()> {
        if self.check_keyword(Keyword::Else) {
            return Err(self.error("'else' clauses on loops are not supported"));
        }
        Ok(())
    }

    /// Parses loop targets: `x`, `i, x`, `(a, b)`.
    fn parse_target_list(&mut self, line: usize) -> PResult<Target> {
        let first = self.parse_or_target()?;
        if !self.check(&TokenKind::Comma) {
            return into_target(first, line);
        }
        let mut items = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.check_keyword(Keyword::In) {
                break;
            }
            items.push(self.parse_or_target()?);
        }
        into_target(Expr::Tuple(items), line)
    }

    /// Target expressions stop below comparisons so `in` is not consumed.
    fn parse_or_target(&mut self) -> PResult<Expr> {
        self.parse_sum()
    }

    fn parse_def(&mut self) -> PResult<Stmt> {
        let first_line = self.line();
        if self.in_function {
            return Err(self.error("nested function definitions are not supported"));
        }
        self.advance();
        let name = self.expect_name("function name")?;
        self.expect(&TokenKind::LParen, "'('")?;

        let mut params: Vec<Param> = Vec::new();
        while !self.check(&TokenKind::RParen) {
            if matches!(self.peek(), TokenKind::Star | TokenKind::DoubleStar) {
                return Err(self.error("variadic parameters are not supported"));
            }
            let pname = self.expect_name("parameter name")?;
            if params.iter().any(|p| p.name == pname) {
                return Err(self.error(&format!(
                    "duplicate argument '{pname}' in function definition"
                )));
            }
            if self.eat(&TokenKind::Colon) {
                // Annotations are accepted and ignored.
                self.parse_expr()?;
            }
            let default = if self.eat(&TokenKind::Assign) {
                Some(self.parse_expr()?)
            } else {
                if params.iter().any(|p| p.default.is_some()) {
                    return Err(
                        self.error("non-default argument follows default argument")
                    );
                }
                None
            };
            params.push(Param {
                name: pname,
                default,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        if self.eat(&TokenKind::Arrow) {
            self.parse_expr()?;
        }

        self.in_function = true;
        let saved_loop_depth = std::mem::replace(&mut self.loop_depth, 0);
        let body = self.parse_block("def");
        self.in_function = false;
        self.loop_depth = saved_loop_depth;
        let mut body = body?;
        strip_docstring(&mut body);

        let mut locals: Vec<String> = params.iter().map(|p| p.name.clone()).collect();
        collect_assigned(&body, &mut locals);

        let id = FunctionId(self.functions.len() as u32);
        self.functions.push(FunctionDef {
            id,
            name,
            params,
            body,
            first_line,
            last_line: self.last_line.max(first_line),
            locals,
        });

        Ok(Stmt {
            line: first_line,
            same_line: false,
            kind: StmtKind::FunctionDef(id),
        })
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    /// Parses `expr (',' expr)* [',']`, producing a tuple when commas appear.
    fn parse_testlist(&mut self) -> PResult<Expr> {
        let first = self.parse_expr()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&TokenKind::Comma) {
            if self.at_statement_end() || matches!(self.peek(), TokenKind::Assign) {
                break;
            }
            items.push(self.parse_expr()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn parse_expr(&mut self) -> PResult<Expr> {
        let body = self.parse_or()?;
        if self.eat_keyword(Keyword::If) {
            let test = self.parse_or()?;
            if !self.eat_keyword(Keyword::Else) {
                return Err(self.error("expected 'else' after conditional expression"));
            }
            let orelse = self.parse_expr()?;
            return Ok(Expr::IfExp {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            });
        }
        Ok(body)
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut left = self.parse_and()?;
        while self.eat_keyword(Keyword::Or) {
            let right = self.parse_and()?;
            left = Expr::BoolOp {
                op: BoolOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut left = self.parse_not()?;
        while self.eat_keyword(Keyword::And) {
            let right = self.parse_not()?;
            left = Expr::BoolOp {
                op: BoolOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> PResult<Expr> {
        if self.eat_keyword(Keyword::Not) {
            let operand = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let left = self.parse_sum()?;
        let mut ops = Vec::new();
        loop {
            let op = match self.peek() {
                TokenKind::EqEq => CmpOp::Eq,
                TokenKind::NotEq => CmpOp::NotEq,
                TokenKind::Lt => CmpOp::Lt,
                TokenKind::Le => CmpOp::Le,
                TokenKind::Gt => CmpOp::Gt,
                TokenKind::Ge => CmpOp::Ge,
                TokenKind::Keyword(Keyword::In) => CmpOp::In,
                TokenKind::Keyword(Keyword::Not)
                    if matches!(self.peek_at(1), TokenKind::Keyword(Keyword::In)) =>
                {
                    self.advance();
                    CmpOp::NotIn
                }
                TokenKind::Keyword(Keyword::Is) => {
                    if matches!(self.peek_at(1), TokenKind::Keyword(Keyword::Not)) {
                        self.advance();
                        CmpOp::IsNot
                    } else {
                        CmpOp::Is
                    }
                }
                _ => break,
            };
            self.advance();
            let right = self.parse_sum()?;
            ops.push((op, right));
        }
        if ops.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare {
                left: Box::new(left),
                ops,
            })
        }
    }

    fn parse_sum(&mut self) -> PResult<Expr> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> PResult<Expr> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::DoubleSlash => BinOp::FloorDiv,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> PResult<Expr> {
        let op = match self.peek() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Pos,
            _ => return self.parse_power(),
        };
        self.advance();
        let operand = self.parse_factor()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_power(&mut self) -> PResult<Expr> {
        let base = self.parse_postfix()?;
        if self.eat(&TokenKind::DoubleStar) {
            // Right-associative and binds tighter than unary minus on the left.
            let exponent = self.parse_factor()?;
            return Ok(binary(BinOp::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.peek() {
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_call_args()?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    expr = self.parse_subscript(expr)?;
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_name("attribute name")?;
                    if self.eat(&TokenKind::LParen) {
                        let args = self.parse_call_args()?;
                        expr = Expr::MethodCall {
                            object: Box::new(expr),
                            method: name,
                            args,
                        };
                    } else {
                        expr = Expr::Attribute {
                            object: Box::new(expr),
                            name,
                        };
                    }
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// Parses call arguments after the opening parenthesis.
    fn parse_call_args(&mut self) -> PResult<Vec<Arg>> {
        let mut args: Vec<Arg> = Vec::new();
        while !self.check(&TokenKind::RParen) {
            if matches!(self.peek(), TokenKind::Star | TokenKind::DoubleStar) {
                return Err(self.error("argument unpacking is not supported"));
            }
            let keyword = match (self.peek(), self.peek_at(1)) {
                (TokenKind::Name(name), TokenKind::Assign) => Some(name.clone()),
                _ => None,
            };
            if let Some(name) = keyword {
                self.advance();
                self.advance();
                let value = self.parse_expr()?;
                args.push(Arg {
                    name: Some(name),
                    value,
                });
            } else {
                if args.iter().any(|a| a.name.is_some()) {
                    return Err(self.error("positional argument follows keyword argument"));
                }
                let value = self.parse_expr()?;
                if self.check_keyword(Keyword::For) {
                    // A bare generator argument is evaluated eagerly as a list.
                    let clauses = self.parse_comp_clauses()?;
                    args.push(Arg {
                        name: None,
                        value: Expr::ListComp {
                            element: Box::new(value),
                            clauses,
                        },
                    });
                    self.expect(&TokenKind::RParen, "')'")?;
                    return Ok(args);
                }
                args.push(Arg { name: None, value });
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(args)
    }

    fn parse_subscript(&mut self, object: Expr) -> PResult<Expr> {
        let lower = if self.check(&TokenKind::Colon) {
            None
        } else {
            Some(self.parse_expr()?)
        };

        if self.eat(&TokenKind::Colon) {
            let upper = if matches!(self.peek(), TokenKind::Colon | TokenKind::RBracket) {
                None
            } else {
                Some(Box::new(self.parse_expr()?))
            };
            let step = if self.eat(&TokenKind::Colon) && !self.check(&TokenKind::RBracket) {
                Some(Box::new(self.parse_expr()?))
            } else {
                None
            };
            self.expect(&TokenKind::RBracket, "']'")?;
            return Ok(Expr::Slice {
                object: Box::new(object),
                lower: lower.map(Box::new),
                upper,
                step,
            });
        }

        let mut index = lower.ok_or_else(|| self.error("invalid syntax"))?;
        if self.check(&TokenKind::Comma) {
            let mut items = vec![index];
            while self.eat(&TokenKind::Comma) {
                if self.check(&TokenKind::RBracket) {
                    break;
                }
                items.push(self.parse_expr()?);
            }
            index = Expr::Tuple(items);
        }
        self.expect(&TokenKind::RBracket, "']'")?;
        Ok(Expr::Index {
            object: Box::new(object),
            index: Box::new(index),
        })
    }

    fn parse_comp_clauses(&mut self) -> PResult<Vec<CompClause>> {
        let mut clauses = Vec::new();
        while self.eat_keyword(Keyword::For) {
            let line = self.line();
            let target = self.parse_target_list(line)?;
            if !self.eat_keyword(Keyword::In) {
                return Err(self.error("expected 'in'"));
            }
            let iter = self.parse_or()?;
            let mut conditions = Vec::new();
            while self.eat_keyword(Keyword::If) {
                conditions.push(self.parse_or()?);
            }
            clauses.push(CompClause {
                target,
                iter,
                conditions,
            });
        }
        Ok(clauses)
    }

    fn parse_atom(&mut self) -> PResult<Expr> {
        match self.peek().clone() {
            TokenKind::Int(v) => {
                self.advance();
                Ok(Expr::Int(v))
            }
            TokenKind::Float(v) => {
                self.advance();
                Ok(Expr::Float(v))
            }
            TokenKind::Str(s) => {
                self.advance();
                let mut buf = s;
                while let TokenKind::Str(next) = self.peek().clone() {
                    self.advance();
                    buf.push_str(&next);
                }
                Ok(Expr::Str(buf))
            }
            TokenKind::Name(name) => {
                self.advance();
                Ok(Expr::Name(name))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            TokenKind::Keyword(Keyword::None) => {
                self.advance();
                Ok(Expr::None)
            }
            TokenKind::LParen => {
                self.advance();
                if self.eat(&TokenKind::RParen) {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let first = self.parse_expr()?;
                if self.check_keyword(Keyword::For) {
                    let clauses = self.parse_comp_clauses()?;
                    self.expect(&TokenKind::RParen, "')'")?;
                    return Ok(Expr::ListComp {
                        element: Box::new(first),
                        clauses,
                    });
                }
                if !self.check(&TokenKind::Comma) {
                    self.expect(&TokenKind::RParen, "')'")?;
                    return Ok(first);
                }
                let mut items = vec![first];
                while self.eat(&TokenKind::Comma) {
                    if self.check(&TokenKind::RParen) {
                        break;
                    }
                    items.push(self.parse_expr()?);
                }
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(Expr::Tuple(items))
            }
            TokenKind::LBracket => {
                self.advance();
                if self.eat(&TokenKind::RBracket) {
                    return Ok(Expr::List(Vec::new()));
                }
                let first = self.parse_expr()?;
                if self.check_keyword(Keyword::For) {
                    let clauses = self.parse_comp_clauses()?;
                    self.expect(&TokenKind::RBracket, "']'")?;
                    return Ok(Expr::ListComp {
                        element: Box::new(first),
                        clauses,
                    });
                }
                let mut items = vec![first];
                while self.eat(&TokenKind::Comma) {
                    if self.check(&TokenKind::RBracket) {
                        break;
                    }
                    items.push(self.parse_expr()?);
                }
                self.expect(&TokenKind::RBracket, "']'")?;
                Ok(Expr::List(items))
            }
            TokenKind::LBrace => {
                self.advance();
                let mut entries = Vec::new();
                while !self.check(&TokenKind::RBrace) {
                    let key = self.parse_expr()?;
                    if !self.eat(&TokenKind::Colon) {
                        return Err(self.error("set literals are not supported"));
                    }
                    let value = self.parse_expr()?;
                    entries.push((key, value));
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RBrace, "'}'")?;
                Ok(Expr::Dict(entries))
            }
            _ => Err(self.error("invalid syntax")),
        }
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn into_target(expr: Expr, line: usize) -> PResult<Target> {
    match expr {
        Expr::Name(name) => Ok(Target::Name(name)),
        Expr::Index { object, index } => Ok(Target::Index {
            object: *object,
            index: *index,
        }),
        Expr::Tuple(items) | Expr::List(items) => Ok(Target::Unpack(
            items
                .into_iter()
                .map(|e| into_target(e, line))
                .collect::<PResult<Vec<_>>>()?,
        )),
        Expr::Call { .. } | Expr::MethodCall { .. } => {
            Err(LoadError::syntax(line, "cannot assign to function call"))
        }
        Expr::Slice { .. } => Err(LoadError::syntax(line, "slice assignment is not supported")),
        Expr::Attribute { .. } => Err(LoadError::syntax(
            line,
            "attribute assignment is not supported",
        )),
        _ => Err(LoadError::syntax(line, "cannot assign to expression")),
    }
}

/// Drops a leading docstring from a function body so it produces no line
/// event. A body holding only a docstring keeps it.
fn strip_docstring(body: &mut Vec<Stmt>) {
    let is_docstring = matches!(body.first(), Some(Stmt { kind: StmtKind::Expr(Expr::Str(_)), .. }));
    if is_docstring && body.len() > 1 {
        body.remove(0);
        body[0].same_line = false;
    }
}

/// Collects every name a statement list binds, recursing into blocks.
fn collect_assigned(body: &[Stmt], out: &mut Vec<String>) {
    for stmt in body {
        match &stmt.kind {
            StmtKind::Assign { targets, .. } => {
                for target in targets {
                    target.collect_names(out);
                }
            }
            StmtKind::AugAssign { target, .. } => target.collect_names(out),
            StmtKind::For { target, body, .. } => {
                target.collect_names(out);
                collect_assigned(body, out);
            }
            StmtKind::If { body, orelse, .. } => {
                collect_assigned(body, out);
                collect_assigned(orelse, out);
            }
            StmtKind::While { body, .. } => collect_assigned(body, out),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Program {
        parse_program(src).unwrap()
    }

    #[test]
    fn parses_function_with_body_lines() {
        let program = parse("def f(x):\n  y = x + 1\n  return y");
        assert_eq!(program.functions.len(), 1);
        let f = &program.functions[0];
        assert_eq!(f.name, "f");
        assert_eq!(f.first_line, 1);
        assert_eq!(f.last_line, 3);
        assert_eq!(f.body.len(), 2);
        assert_eq!(f.body[0].line, 2);
        assert_eq!(f.body[1].line, 3);
        assert_eq!(f.locals, vec!["x".to_string(), "y".to_string()]);
        assert!(matches!(
            program.body[0].kind,
            StmtKind::FunctionDef(FunctionId(0))
        ));
    }

    #[test]
    fn elif_becomes_nested_if_on_its_own_line() {
        let program = parse("def f(x):\n  if x > 1:\n    a = 1\n  elif x > 0:\n    a = 2\n  else:\n    a = 3\n  return a\n");
        let f = &program.functions[0];
        let StmtKind::If { orelse, .. } = &f.body[0].kind else {
            panic!("expected if");
        };
        assert_eq!(orelse.len(), 1);
        assert_eq!(orelse[0].line, 4);
        let StmtKind::If { orelse: inner, .. } = &orelse[0].kind else {
            panic!("expected nested if");
        };
        assert_eq!(inner[0].line, 7);
    }

    #[test]
    fn semicolons_share_a_line() {
        let program = parse("def f(x):\n  a = 1; b = 2\n  return a + b\n");
        let f = &program.functions[0];
        assert!(!f.body[0].same_line);
        assert!(f.body[1].same_line);
        assert_eq!(f.body[1].line, 2);
    }

    #[test]
    fn inline_block_body_shares_header_line() {
        let program = parse("def f(x):\n  if x: return 1\n  return 2\n");
        let StmtKind::If { body, .. } = &program.functions[0].body[0].kind else {
            panic!("expected if");
        };
        assert!(body[0].same_line);
    }

    #[test]
    fn precedence_and_power() {
        let program = parse("x = -2 ** 2 + 3 * 4\n");
        let StmtKind::Assign { value, .. } = &program.body[0].kind else {
            panic!("expected assign");
        };
        let Expr::Binary { op: BinOp::Add, left, .. } = value else {
            panic!("expected addition at the root, got {value:?}");
        };
        assert!(matches!(
            **left,
            Expr::Unary {
                op: UnaryOp::Neg,
                ..
            }
        ));
    }

    #[test]
    fn tuple_unpacking_and_multiple_targets() {
        let program = parse("a, b = 1, 2\nc = d = 3\n");
        let StmtKind::Assign { targets, .. } = &program.body[0].kind else {
            panic!();
        };
        assert!(matches!(&targets[0], Target::Unpack(items) if items.len() == 2));
        let StmtKind::Assign { targets, .. } = &program.body[1].kind else {
            panic!();
        };
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn for_loop_with_tuple_target() {
        let program = parse("def f(xs):\n  for i, x in enumerate(xs):\n    pass\n");
        let f = &program.functions[0];
        assert_eq!(f.locals, vec!["xs", "i", "x"]);
    }

    #[test]
    fn comprehension_and_generator_argument() {
        let program = parse("a = [x * 2 for x in range(3) if x]\nb = sum(x for x in a)\n");
        assert!(matches!(
            &program.body[0].kind,
            StmtKind::Assign { value: Expr::ListComp { .. }, .. }
        ));
        let StmtKind::Assign { value: Expr::Call { args, .. }, .. } = &program.body[1].kind
        else {
            panic!();
        };
        assert!(matches!(args[0].value, Expr::ListComp { .. }));
    }

    #[test]
    fn chained_comparison_and_not_in() {
        let program = parse("x = 1 < 2 <= 3 not in [4]\n");
        let StmtKind::Assign { value: Expr::Compare { ops, .. }, .. } = &program.body[0].kind
        else {
            panic!();
        };
        let kinds: Vec<CmpOp> = ops.iter().map(|(op, _)| *op).collect();
        assert_eq!(kinds, vec![CmpOp::Lt, CmpOp::Le, CmpOp::NotIn]);
    }

    #[test]
    fn slices_and_keyword_arguments() {
        let program = parse("y = xs[1:-1:2]\nz = sorted(xs, reverse=True)\n");
        assert!(matches!(
            &program.body[0].kind,
            StmtKind::Assign { value: Expr::Slice { .. }, .. }
        ));
        let StmtKind::Assign { value: Expr::Call { args, .. }, .. } = &program.body[1].kind
        else {
            panic!();
        };
        assert_eq!(args[1].name.as_deref(), Some("reverse"));
    }

    #[test]
    fn annotations_are_ignored() {
        let program = parse("def f(n: int = 3) -> int:\n  return n\n");
        assert_eq!(program.functions[0].params[0].name, "n");
        assert!(program.functions[0].params[0].default.is_some());
    }

    #[test]
    fn return_outside_function_is_rejected() {
        let err = parse_program("return 1\n").unwrap_err();
        assert!(err.to_string().contains("'return' outside function"));
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        assert!(parse_program("def f(x):\n  break\n").is_err());
    }

    #[test]
    fn nested_def_is_rejected() {
        let err = parse_program("def f(x):\n  def g(y):\n    return y\n  return x\n").unwrap_err();
        assert!(err.to_string().contains("nested"));
    }

    #[test]
    fn missing_indented_block_is_reported() {
        let err = parse_program("def f(x):\nreturn x\n").unwrap_err();
        assert!(err.to_string().contains("expected an indented block"));
    }

    #[test]
    fn unsupported_statement_is_named() {
        let err = parse_program("import os\n").unwrap_err();
        assert_eq!(err.to_string(), "'import' is not supported (line 1)");
    }

    #[test]
    fn last_line_ignores_trailing_top_level_code() {
        let program = parse("def f(x):\n  return x\n\nK = 3\n");
        assert_eq!(program.functions[0].last_line, 2);
    }

    #[test]
    fn leading_docstring_is_dropped_from_the_body() {
        let program = parse("def f(x):\n  \"\"\"doc\"\"\"\n  return x\n");
        let body = &program.functions[0].body;
        assert_eq!(body.len(), 1);
        assert_eq!(body[0].line, 3);
        assert!(matches!(body[0].kind, StmtKind::Return(_)));
    }

    #[test]
    fn docstring_sharing_a_line_hands_the_line_on() {
        let program = parse("def f(x):\n  'doc'; y = x\n  return y\n");
        let body = &program.functions[0].body;
        assert_eq!(body.len(), 2);
        assert_eq!(body[0].line, 2);
        assert!(!body[0].same_line);
    }

    #[test]
    fn docstring_only_body_is_kept() {
        let program = parse("def f(x):\n  'doc'\n");
        assert_eq!(program.functions[0].body.len(), 1);
    }
}
