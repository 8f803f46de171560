//! Recursive-descent parser building an [`Ast`] from the token stream
//! produced by [`crate::parser::lexer::tokenize`].
//!
//! `goto`/labels are intentionally unsupported; a `goto` or `::label::` is
//! reported as a [`ParseError`] rather than silently accepted.

use crate::error::{CoverageError, Result};
use crate::parser::ast::*;
use crate::parser::lexer::{tokenize, Keyword, Span, Token, TokenKind};
use crate::path::FileKey;

/// Parses already-tokenized input. `line_of` maps a byte offset to a
/// 1-based line number, the same prebuilt index [`crate::source::SourceBuffer`]
/// exposes, so a syntax error can be reported as `ParseError{file,line,...}`
/// without the parser re-scanning source text itself.
pub fn parse_tokens(
    tokens: Vec<Token>,
    file: &FileKey,
    line_of: impl Fn(usize) -> u32,
) -> Result<Ast> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        file: file.clone(),
        line_of: Box::new(line_of),
    };
    let body = parser.block(&[TokenKind::Eof])?;
    parser.expect(&TokenKind::Eof)?;
    Ok(Ast { body })
}

pub fn parse_source(source: &[u8], file: &FileKey, line_of: impl Fn(usize) -> u32 + 'static) -> Result<Ast> {
    let tokens = tokenize(source).map_err(|e| CoverageError::ParseError {
        file: file.as_str().to_string(),
        line: line_of(e.offset),
        column: 1,
        message: e.message,
    })?;
    parse_tokens(tokens, file, line_of)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    file: FileKey,
    line_of: Box<dyn Fn(usize) -> u32>,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn check_kw(&self, kw: Keyword) -> bool {
        matches!(self.peek_kind(), TokenKind::Keyword(k) if *k == kw)
    }

    fn eat_kw(&mut self, kw: Keyword) -> bool {
        if self.check_kw(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.err_at(self.peek().span, format!("expected {:?}, found {:?}", kind, self.peek().kind)))
        }
    }

    fn expect_kw(&mut self, kw: Keyword) -> Result<Token> {
        if self.check_kw(kw) {
            Ok(self.advance())
        } else {
            Err(self.err_at(
                self.peek().span,
                format!("expected keyword {:?}, found {:?}", kw, self.peek().kind),
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.err_at(self.peek().span, format!("expected identifier, found {:?}", other))),
        }
    }

    fn err_at(&self, span: Span, message: String) -> CoverageError {
        CoverageError::ParseError {
            file: self.file.as_str().to_string(),
            line: (self.line_of)(span.start),
            column: (span.start + 1) as u32,
            message,
        }
    }

    /// Parses statements until one of `terminators` is seen (not consumed).
    fn block(&mut self, terminators: &[TokenKind]) -> Result<Block> {
        let start = self.peek().span;
        let mut statements = Vec::new();
        loop {
            if terminators.iter().any(|t| self.check(t)) || self.check(&TokenKind::Eof) {
                break;
            }
            if self.eat(&TokenKind::Semi) {
                continue;
            }
            if self.check_kw(Keyword::Return) {
                statements.push(self.return_stmt()?);
                break;
            }
            statements.push(self.statement()?);
        }
        let end = self.peek().span;
        Ok(Block {
            statements,
            span: start.join(end),
        })
    }

    fn return_stmt(&mut self) -> Result<Stmt> {
        let start = self.expect_kw(Keyword::Return)?.span;
        let mut values = Vec::new();
        if !self.check(&TokenKind::Semi)
            && !self.check(&TokenKind::Eof)
            && !self.check_kw(Keyword::End)
            && !self.check_kw(Keyword::Else)
            && !self.check_kw(Keyword::Elseif)
            && !self.check_kw(Keyword::Until)
        {
            values.push(self.expr()?);
            while self.eat(&TokenKind::Comma) {
                values.push(self.expr()?);
            }
        }
        self.eat(&TokenKind::Semi);
        let end = self.tokens[self.pos.saturating_sub(1)].span;
        Ok(Stmt::Return {
            values,
            span: start.join(end),
        })
    }

    fn statement(&mut self) -> Result<Stmt> {
        match self.peek_kind().clone() {
            TokenKind::Keyword(Keyword::Local) => self.local_stmt(),
            TokenKind::Keyword(Keyword::Function) => self.function_decl(),
            TokenKind::Keyword(Keyword::If) => self.if_stmt(),
            TokenKind::Keyword(Keyword::While) => self.while_stmt(),
            TokenKind::Keyword(Keyword::Repeat) => self.repeat_stmt(),
            TokenKind::Keyword(Keyword::For) => self.for_stmt(),
            TokenKind::Keyword(Keyword::Do) => self.do_stmt(),
            TokenKind::Keyword(Keyword::Break) => {
                let span = self.advance().span;
                Ok(Stmt::Break { span })
            }
            TokenKind::DoubleColon => Err(self.err_at(self.peek().span, "labels are not supported".into())),
            TokenKind::Ident(name) if name == "goto" => {
                Err(self.err_at(self.peek().span, "goto is not supported".into()))
            }
            _ => self.expr_stmt(),
        }
    }

    fn local_stmt(&mut self) -> Result<Stmt> {
        let start = self.expect_kw(Keyword::Local)?.span;
        if self.eat_kw(Keyword::Function) {
            let name = self.expect_ident()?;
            let func = self.function_body()?;
            let end = func.span;
            return Ok(Stmt::LocalFunction {
                name,
                span: start.join(end),
                func,
            });
        }
        let mut names = vec![self.expect_ident()?];
        self.skip_attrib();
        while self.eat(&TokenKind::Comma) {
            names.push(self.expect_ident()?);
            self.skip_attrib();
        }
        let mut values = Vec::new();
        let mut end = self.tokens[self.pos.saturating_sub(1)].span;
        if self.eat(&TokenKind::Assign) {
            values.push(self.expr()?);
            while self.eat(&TokenKind::Comma) {
                values.push(self.expr()?);
            }
            end = self.tokens[self.pos.saturating_sub(1)].span;
        }
        Ok(Stmt::Local {
            names,
            values,
            span: start.join(end),
        })
    }

    /// `<const>`/`<close>` attributes are lexed as `< ident >`; skip them.
    fn skip_attrib(&mut self) {
        if self.eat(&TokenKind::Lt) {
            let _ = self.expect_ident();
            let _ = self.eat(&TokenKind::Gt);
        }
    }

    fn function_decl(&mut self) -> Result<Stmt> {
        let start = self.expect_kw(Keyword::Function)?.span;
        let mut name_path = vec![self.expect_ident()?];
        while self.eat(&TokenKind::Dot) {
            name_path.push(self.expect_ident()?);
        }
        let mut is_method = false;
        if self.eat(&TokenKind::Colon) {
            name_path.push(self.expect_ident()?);
            is_method = true;
        }
        let func = self.function_body_with_self(is_method)?;
        let end = func.span;
        Ok(Stmt::FunctionDecl {
            name_path,
            is_method,
            func,
            span: start.join(end),
        })
    }

    fn function_body(&mut self) -> Result<FunctionBody> {
        self.function_body_with_self(false)
    }

    fn function_body_with_self(&mut self, is_method: bool) -> Result<FunctionBody> {
        let start = self.expect(&TokenKind::LParen)?.span;
        let mut params = Vec::new();
        if is_method {
            params.push("self".to_string());
        }
        let mut is_vararg = false;
        if !self.check(&TokenKind::RParen) {
            loop {
                if self.eat(&TokenKind::Ellipsis) {
                    is_vararg = true;
                    break;
                }
                params.push(self.expect_ident()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        let body = self.block(&[TokenKind::Keyword(Keyword::End)]);
        let body = body?;
        let end = self.expect_kw(Keyword::End)?.span;
        Ok(FunctionBody {
            params,
            is_vararg,
            body,
            span: start.join(end),
        })
    }

    fn if_stmt(&mut self) -> Result<Stmt> {
        let start = self.expect_kw(Keyword::If)?.span;
        let mut arms = Vec::new();
        let cond = self.expr()?;
        self.expect_kw(Keyword::Then)?;
        let body = self.block(&[
            TokenKind::Keyword(Keyword::Elseif),
            TokenKind::Keyword(Keyword::Else),
            TokenKind::Keyword(Keyword::End),
        ])?;
        arms.push((cond, body));
        while self.eat_kw(Keyword::Elseif) {
            let cond = self.expr()?;
            self.expect_kw(Keyword::Then)?;
            let body = self.block(&[
                TokenKind::Keyword(Keyword::Elseif),
                TokenKind::Keyword(Keyword::Else),
                TokenKind::Keyword(Keyword::End),
            ])?;
            arms.push((cond, body));
        }
        let else_body = if self.eat_kw(Keyword::Else) {
            Some(self.block(&[TokenKind::Keyword(Keyword::End)])?)
        } else {
            None
        };
        let end = self.expect_kw(Keyword::End)?.span;
        Ok(Stmt::If {
            arms,
            else_body,
            span: start.join(end),
        })
    }

    fn while_stmt(&mut self) -> Result<Stmt> {
        let start = self.expect_kw(Keyword::While)?.span;
        let cond = self.expr()?;
        self.expect_kw(Keyword::Do)?;
        let body = self.block(&[TokenKind::Keyword(Keyword::End)])?;
        let end = self.expect_kw(Keyword::End)?.span;
        Ok(Stmt::While {
            cond,
            body,
            span: start.join(end),
        })
    }

    fn repeat_stmt(&mut self) -> Result<Stmt> {
        let start = self.expect_kw(Keyword::Repeat)?.span;
        let body = self.block(&[TokenKind::Keyword(Keyword::Until)])?;
        self.expect_kw(Keyword::Until)?;
        let cond = self.expr()?;
        let end = cond.span();
        Ok(Stmt::Repeat {
            body,
            cond,
            span: start.join(end),
        })
    }

    fn for_stmt(&mut self) -> Result<Stmt> {
        let start = self.expect_kw(Keyword::For)?.span;
        let first_name = self.expect_ident()?;
        if self.eat(&TokenKind::Assign) {
            let from = self.expr()?;
            self.expect(&TokenKind::Comma)?;
            let to = self.expr()?;
            let step = if self.eat(&TokenKind::Comma) {
                Some(self.expr()?)
            } else {
                None
            };
            self.expect_kw(Keyword::Do)?;
            let body = self.block(&[TokenKind::Keyword(Keyword::End)])?;
            let end = self.expect_kw(Keyword::End)?.span;
            return Ok(Stmt::NumericFor {
                var: first_name,
                start: from,
                stop: to,
                step,
                body,
                span: start.join(end),
            });
        }
        let mut vars = vec![first_name];
        while self.eat(&TokenKind::Comma) {
            vars.push(self.expect_ident()?);
        }
        self.expect_kw(Keyword::In)?;
        let mut exprs = vec![self.expr()?];
        while self.eat(&TokenKind::Comma) {
            exprs.push(self.expr()?);
        }
        self.expect_kw(Keyword::Do)?;
        let body = self.block(&[TokenKind::Keyword(Keyword::End)])?;
        let end = self.expect_kw(Keyword::End)?.span;
        Ok(Stmt::GenericFor {
            vars,
            exprs,
            body,
            span: start.join(end),
        })
    }

    fn do_stmt(&mut self) -> Result<Stmt> {
        let start = self.expect_kw(Keyword::Do)?.span;
        let body = self.block(&[TokenKind::Keyword(Keyword::End)])?;
        let end = self.expect_kw(Keyword::End)?.span;
        Ok(Stmt::Do {
            body,
            span: start.join(end),
        })
    }

    /// An expression statement is either a bare call or the start of an
    /// assignment; the grammar can't distinguish until it has parsed the
    /// first "suffixed expression" and sees whether `=`/`,` follows.
    fn expr_stmt(&mut self) -> Result<Stmt> {
        let first = self.suffixed_expr()?;
        if self.check(&TokenKind::Assign) || self.check(&TokenKind::Comma) {
            let mut targets = vec![first];
            while self.eat(&TokenKind::Comma) {
                targets.push(self.suffixed_expr()?);
            }
            self.expect(&TokenKind::Assign)?;
            let mut values = vec![self.expr()?];
            while self.eat(&TokenKind::Comma) {
                values.push(self.expr()?);
            }
            let span = targets[0].span().join(values.last().unwrap().span());
            return Ok(Stmt::Assign {
                targets,
                values,
                span,
            });
        }
        let span = first.span();
        match &first {
            Expr::Call { .. } | Expr::MethodCall { .. } => Ok(Stmt::CallStmt { call: first, span }),
            _ => Err(self.err_at(span, "expression statement must be a function call".into())),
        }
    }

    // --- Expressions, by precedence (lowest to highest): or, and, comparison,
    // concat, additive, multiplicative, unary, power, primary. ---

    fn expr(&mut self) -> Result<Expr> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.and_expr()?;
        while self.eat_kw(Keyword::Or) {
            let rhs = self.and_expr()?;
            let span = lhs.span().join(rhs.span());
            lhs = Expr::BinOp {
                op: BinOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.compare_expr()?;
        while self.eat_kw(Keyword::And) {
            let rhs = self.compare_expr()?;
            let span = lhs.span().join(rhs.span());
            lhs = Expr::BinOp {
                op: BinOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn compare_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.concat_expr()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::NotEq => BinOp::NotEq,
                TokenKind::Lt => BinOp::Lt,
                TokenKind::LtEq => BinOp::LtEq,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::GtEq => BinOp::GtEq,
                _ => break,
            };
            self.advance();
            let rhs = self.concat_expr()?;
            let span = lhs.span().join(rhs.span());
            lhs = Expr::BinOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn concat_expr(&mut self) -> Result<Expr> {
        let lhs = self.additive_expr()?;
        if self.eat(&TokenKind::DotDot) {
            // Right-associative.
            let rhs = self.concat_expr()?;
            let span = lhs.span().join(rhs.span());
            return Ok(Expr::BinOp {
                op: BinOp::Concat,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            });
        }
        Ok(lhs)
    }

    fn additive_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.multiplicative_expr()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.multiplicative_expr()?;
            let span = lhs.span().join(rhs.span());
            lhs = Expr::BinOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn multiplicative_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.unary_expr()?;
            let span = lhs.span().join(rhs.span());
            lhs = Expr::BinOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> Result<Expr> {
        let op = match self.peek_kind() {
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Hash => Some(UnOp::Len),
            TokenKind::Keyword(Keyword::Not) => Some(UnOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            let start = self.advance().span;
            let operand = self.unary_expr()?;
            let span = start.join(operand.span());
            return Ok(Expr::UnOp {
                op,
                operand: Box::new(operand),
                span,
            });
        }
        self.power_expr()
    }

    fn power_expr(&mut self) -> Result<Expr> {
        let lhs = self.suffixed_expr()?;
        if self.eat(&TokenKind::Caret) {
            // Right-associative, binds tighter than unary on its rhs.
            let rhs = self.unary_expr()?;
            let span = lhs.span().join(rhs.span());
            return Ok(Expr::BinOp {
                op: BinOp::Pow,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            });
        }
        Ok(lhs)
    }

    /// A primary expression followed by any chain of `.field`, `[expr]`,
    /// `:method(args)`, or `(args)` suffixes.
    fn suffixed_expr(&mut self) -> Result<Expr> {
        let mut expr = self.primary_expr()?;
        loop {
            match self.peek_kind().clone() {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_ident()?;
                    let span = expr.span().join(self.tokens[self.pos - 1].span);
                    expr = Expr::Field {
                        object: Box::new(expr),
                        name,
                        span,
                    };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let key = self.expr()?;
                    let end = self.expect(&TokenKind::RBracket)?.span;
                    let span = expr.span().join(end);
                    expr = Expr::Index {
                        object: Box::new(expr),
                        key: Box::new(key),
                        span,
                    };
                }
                TokenKind::Colon => {
                    self.advance();
                    let method = self.expect_ident()?;
                    let (args, end) = self.call_args()?;
                    let span = expr.span().join(end);
                    expr = Expr::MethodCall {
                        receiver: Box::new(expr),
                        method,
                        args,
                        span,
                    };
                }
                TokenKind::LParen | TokenKind::Str(_) | TokenKind::LBrace => {
                    let (args, end) = self.call_args()?;
                    let span = expr.span().join(end);
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        span,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn call_args(&mut self) -> Result<(Vec<Expr>, Span)> {
        match self.peek_kind().clone() {
            TokenKind::LParen => {
                self.advance();
                let mut args = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    args.push(self.expr()?);
                    while self.eat(&TokenKind::Comma) {
                        args.push(self.expr()?);
                    }
                }
                let end = self.expect(&TokenKind::RParen)?.span;
                Ok((args, end))
            }
            TokenKind::Str(value) => {
                let span = self.advance().span;
                Ok((vec![Expr::Str { value, span }], span))
            }
            TokenKind::LBrace => {
                let table = self.table_constructor()?;
                let span = table.span();
                Ok((vec![table], span))
            }
            other => Err(self.err_at(self.peek().span, format!("expected call arguments, found {:?}", other))),
        }
    }

    fn primary_expr(&mut self) -> Result<Expr> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Keyword(Keyword::Nil) => {
                self.advance();
                Ok(Expr::Nil { span: tok.span })
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Ok(Expr::True { span: tok.span })
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Ok(Expr::False { span: tok.span })
            }
            TokenKind::Number(value) => {
                self.advance();
                Ok(Expr::Number { value, span: tok.span })
            }
            TokenKind::Str(value) => {
                self.advance();
                Ok(Expr::Str { value, span: tok.span })
            }
            TokenKind::Ellipsis => {
                self.advance();
                Ok(Expr::Vararg { span: tok.span })
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::Ident { name, span: tok.span })
            }
            TokenKind::Keyword(Keyword::Function) => {
                self.advance();
                let func = self.function_body()?;
                let span = tok.span.join(func.span);
                Ok(Expr::FunctionLiteral {
                    func: Box::new(func),
                    span,
                })
            }
            TokenKind::LBrace => self.table_constructor(),
            TokenKind::LParen => {
                self.advance();
                let inner = self.expr()?;
                let end = self.expect(&TokenKind::RParen)?.span;
                let span = tok.span.join(end);
                Ok(Expr::Paren {
                    inner: Box::new(inner),
                    span,
                })
            }
            other => Err(self.err_at(tok.span, format!("unexpected token in expression: {:?}", other))),
        }
    }

    fn table_constructor(&mut self) -> Result<Expr> {
        let start = self.expect(&TokenKind::LBrace)?.span;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.check(&TokenKind::LBracket) {
                self.advance();
                let key = self.expr()?;
                self.expect(&TokenKind::RBracket)?;
                self.expect(&TokenKind::Assign)?;
                let value = self.expr()?;
                fields.push(TableField::Indexed { key, value });
            } else if matches!(self.peek_kind(), TokenKind::Ident(_))
                && self.tokens.get(self.pos + 1).map(|t| &t.kind) == Some(&TokenKind::Assign)
            {
                let name = self.expect_ident()?;
                self.expect(&TokenKind::Assign)?;
                let value = self.expr()?;
                fields.push(TableField::Named { name, value });
            } else {
                fields.push(TableField::Positional(self.expr()?));
            }
            if !self.eat(&TokenKind::Comma) && !self.eat(&TokenKind::Semi) {
                break;
            }
        }
        let end = self.expect(&TokenKind::RBrace)?.span;
        Ok(Expr::TableConstructor {
            fields,
            span: start.join(end),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::tokenize;

    fn parse(src: &str) -> Result<Ast> {
        let file = FileKey::normalize("/t.lua").unwrap();
        let tokens = tokenize(src.as_bytes()).unwrap();
        parse_tokens(tokens, &file, |_| 1)
    }

    #[test]
    fn parses_local_assignment() {
        let ast = parse("local x = 1\n").unwrap();
        assert_eq!(ast.body.statements.len(), 1);
        assert!(matches!(ast.body.statements[0], Stmt::Local { .. }));
    }

    #[test]
    fn parses_if_elseif_else() {
        let ast = parse("if a then b() elseif c then d() else e() end\n").unwrap();
        match &ast.body.statements[0] {
            Stmt::If { arms, else_body, .. } => {
                assert_eq!(arms.len(), 2);
                assert!(else_body.is_some());
            }
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn parses_method_call_statement() {
        let ast = parse("t:m(1, 2)\n").unwrap();
        match &ast.body.statements[0] {
            Stmt::CallStmt { call, .. } => assert!(matches!(call, Expr::MethodCall { .. })),
            other => panic!("expected CallStmt, got {other:?}"),
        }
    }

    #[test]
    fn parses_local_function_and_nested_blocks() {
        let ast = parse(
            "local function f(a, b)\n  if a > b then\n    return a\n  end\n  return b\nend\n",
        )
        .unwrap();
        assert!(matches!(ast.body.statements[0], Stmt::LocalFunction { .. }));
    }

    #[test]
    fn parses_numeric_and_generic_for() {
        let ast = parse("for i = 1, 10 do end\nfor k, v in pairs(t) do end\n").unwrap();
        assert!(matches!(ast.body.statements[0], Stmt::NumericFor { .. }));
        assert!(matches!(ast.body.statements[1], Stmt::GenericFor { .. }));
    }

    #[test]
    fn compound_condition_is_decomposable() {
        let ast = parse("if a and b or not c then d() end\n").unwrap();
        match &ast.body.statements[0] {
            Stmt::If { arms, .. } => {
                let (cond, _) = &arms[0];
                assert!(cond.as_logical().is_some());
            }
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn goto_is_rejected() {
        let file = FileKey::normalize("/t.lua").unwrap();
        let tokens = tokenize(b"goto done\n").unwrap();
        assert!(parse_tokens(tokens, &file, |_| 1).is_err());
    }

    #[test]
    fn rejects_bare_non_call_expression_statement() {
        let file = FileKey::normalize("/t.lua").unwrap();
        let tokens = tokenize(b"1 + 1\n").unwrap();
        assert!(parse_tokens(tokens, &file, |_| 1).is_err());
    }
}
