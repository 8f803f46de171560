//! C4: static analyzer. Consumes a [`SourceBuffer`], [`Ast`], and comment
//! map, and produces a [`CodeMap`] — the static description of a file's
//! structure that the instrumenter (C7), tracker (C6), and patch-up (C8)
//! all key off of.

use std::collections::HashSet;
use std::time::Instant;

use crate::comment_scanner::{is_in_block_comment, CommentMap};
use crate::config::AnalyzerConfig;
use crate::parser::{Ast, Block, Expr, FunctionBody, LogicalOp, Stmt};
use crate::parser::lexer::{tokenize, Keyword, TokenKind};
use crate::source::SourceBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineType {
    Code,
    Comment,
    #[default]
    Blank,
    Structure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Global,
    Local,
    Method,
    Anonymous,
    Closure,
}

#[derive(Debug, Clone)]
pub struct FunctionInfo {
    pub func_id: String,
    pub name: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
    pub kind: FunctionKind,
    pub parameters: Vec<String>,
    pub is_method: bool,
}

pub type BlockId = usize;
pub type ConditionId = usize;

pub const ROOT_BLOCK: BlockId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Root,
    If,
    ThenBlock,
    ElseBlock,
    While,
    WhileBody,
    Repeat,
    RepeatBody,
    ForNum,
    ForIn,
    ForBody,
    Function,
    DoBlock,
}

#[derive(Debug, Clone)]
pub struct BlockInfo {
    pub kind: BlockKind,
    pub start_line: u32,
    pub end_line: u32,
    /// `None` only for [`ROOT_BLOCK`] itself.
    pub parent_id: Option<BlockId>,
    pub children: Vec<BlockId>,
    /// Direct alternatives to this block, e.g. a `then_block`'s sibling
    /// `else_block`.
    pub branches: Vec<BlockId>,
    pub conditions: Vec<ConditionId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    If,
    While,
    Repeat,
    /// A decomposed operand of a compound `and`/`or`/`not` expression.
    Component,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone)]
pub struct ConditionInfo {
    pub kind: ConditionKind,
    pub start_line: u32,
    pub end_line: u32,
    pub parent_id: BlockId,
    pub is_compound: bool,
    pub operator: Option<LogicalOperator>,
    pub components: Vec<ConditionId>,
}

#[derive(Debug, Clone)]
pub struct CodeMap {
    pub line_count: u32,
    /// Index 0 holds line 1's type.
    pub line_type: Vec<LineType>,
    pub functions: Vec<FunctionInfo>,
    pub blocks: Vec<BlockInfo>,
    pub conditions: Vec<ConditionInfo>,
    pub truncated: bool,
}

impl CodeMap {
    pub fn line_type(&self, line: u32) -> LineType {
        self.line_type
            .get((line.saturating_sub(1)) as usize)
            .copied()
            .unwrap_or(LineType::Blank)
    }

    /// Executability projection of §4.4: STRUCTURE's executability is
    /// policy-controlled; COMMENT/BLANK are never executable; CODE always
    /// is.
    pub fn is_executable_line(&self, line: u32, structural_is_executable: bool) -> bool {
        match self.line_type(line) {
            LineType::Code => true,
            LineType::Structure => structural_is_executable,
            LineType::Comment | LineType::Blank => false,
        }
    }

    pub fn executable_lines(&self, structural_is_executable: bool) -> Vec<u32> {
        (1..=self.line_count)
            .filter(|&l| self.is_executable_line(l, structural_is_executable))
            .collect()
    }

    pub fn function_by_start_line(&self, line: u32) -> Option<&FunctionInfo> {
        self.functions.iter().find(|f| f.start_line == line)
    }

    /// Returns a "conservative" code map for a file whose source couldn't be
    /// parsed or analyzed: no line is executable, matching §7's recovery
    /// policy ("engine continues with a conservative code map").
    pub fn conservative(line_count: u32) -> CodeMap {
        CodeMap {
            line_count,
            line_type: vec![LineType::Blank; line_count as usize],
            functions: Vec::new(),
            blocks: vec![BlockInfo {
                kind: BlockKind::Root,
                start_line: 1,
                end_line: line_count,
                parent_id: None,
                children: Vec::new(),
                branches: Vec::new(),
                conditions: Vec::new(),
            }],
            conditions: Vec::new(),
            truncated: false,
        }
    }
}

struct Builder {
    functions: Vec<FunctionInfo>,
    blocks: Vec<BlockInfo>,
    conditions: Vec<ConditionInfo>,
    nodes_processed: u64,
    node_budget: u64,
    deadline: Instant,
    truncated: bool,
}

impl Builder {
    fn tick(&mut self) -> bool {
        if self.truncated {
            return false;
        }
        self.nodes_processed += 1;
        if self.nodes_processed > self.node_budget || Instant::now() >= self.deadline {
            self.truncated = true;
            return false;
        }
        true
    }

    fn new_block(&mut self, kind: BlockKind, start_line: u32, end_line: u32, parent: BlockId) -> BlockId {
        let id = self.blocks.len();
        self.blocks.push(BlockInfo {
            kind,
            start_line,
            end_line,
            parent_id: Some(parent),
            children: Vec::new(),
            branches: Vec::new(),
            conditions: Vec::new(),
        });
        self.blocks[parent].children.push(id);
        id
    }

    fn link_branch(&mut self, a: BlockId, b: BlockId) {
        self.blocks[a].branches.push(b);
        self.blocks[b].branches.push(a);
    }

    fn new_condition(
        &mut self,
        kind: ConditionKind,
        start_line: u32,
        end_line: u32,
        parent_id: BlockId,
    ) -> ConditionId {
        let id = self.conditions.len();
        self.conditions.push(ConditionInfo {
            kind,
            start_line,
            end_line,
            parent_id,
            is_compound: false,
            operator: None,
            components: Vec::new(),
        });
        id
    }

    /// Recursively decomposes a (possibly compound) condition expression
    /// into [`ConditionInfo`] entries. Expression nesting in practice is
    /// shallow (a handful of `and`/`or`/`not` operators), so this uses plain
    /// recursion rather than an explicit worklist, unlike the statement walk
    /// in [`analyze`].
    fn decompose_condition(
        &mut self,
        expr: &Expr,
        kind: ConditionKind,
        parent_id: BlockId,
        line_of: &impl Fn(usize) -> u32,
    ) -> ConditionId {
        let start_line = line_of(expr.span().start);
        let end_line = line_of(expr.span().end.saturating_sub(1).max(expr.span().start));
        let id = self.new_condition(kind, start_line, end_line, parent_id);

        if let Some((op, operands)) = expr.as_logical() {
            self.conditions[id].is_compound = true;
            self.conditions[id].operator = Some(match op {
                LogicalOp::And => LogicalOperator::And,
                LogicalOp::Or => LogicalOperator::Or,
                LogicalOp::Not => LogicalOperator::Not,
            });
            for operand in operands {
                let component = self.decompose_condition(operand, ConditionKind::Component, parent_id, line_of);
                self.conditions[id].components.push(component);
            }
        }
        id
    }
}

enum WorkItem<'a> {
    Block {
        block: &'a Block,
        parent_block: BlockId,
    },
}

/// Walks `ast` with an explicit worklist rather than recursion, bounded by
/// `config.node_budget` processed statements and
/// `config.time_budget_ms` wall-clock. On overrun, returns a partial
/// `CodeMap` with `truncated = true`.
pub fn analyze(
    source: &SourceBuffer,
    ast: &Ast,
    comments: &CommentMap,
    config: &AnalyzerConfig,
) -> CodeMap {
    let line_count = source.line_count();
    let line_of = |offset: usize| source.position_to_line(offset);

    let mut builder = Builder {
        functions: Vec::new(),
        blocks: vec![BlockInfo {
            kind: BlockKind::Root,
            start_line: 1,
            end_line: line_count,
            parent_id: None,
            children: Vec::new(),
            branches: Vec::new(),
            conditions: Vec::new(),
        }],
        conditions: Vec::new(),
        nodes_processed: 0,
        node_budget: config.node_budget,
        deadline: Instant::now() + std::time::Duration::from_millis(config.time_budget_ms),
        truncated: false,
    };

    let mut code_lines: HashSet<u32> = HashSet::new();
    let mut structural_ast_lines: HashSet<u32> = HashSet::new();

    let mut worklist: Vec<WorkItem> = vec![WorkItem::Block {
        block: &ast.body,
        parent_block: ROOT_BLOCK,
    }];

    while let Some(item) = worklist.pop() {
        let WorkItem::Block { block, parent_block } = item;

        for stmt in &block.statements {
            if !builder.tick() {
                break;
            }
            let start_line = line_of(stmt.span().start);
            if stmt.is_executable_kind() {
                code_lines.insert(start_line);
            } else {
                structural_ast_lines.insert(start_line);
            }

            match stmt {
                Stmt::If { arms, else_body, .. } => {
                    let if_block = builder.new_block(BlockKind::If, start_line, line_of(stmt.span().end), parent_block);
                    let mut branch_ids = Vec::new();
                    for (cond, body) in arms {
                        let cond_id = builder.decompose_condition(cond, ConditionKind::If, if_block, &line_of);
                        builder.blocks[if_block].conditions.push(cond_id);
                        let then_id = builder.new_block(
                            BlockKind::ThenBlock,
                            line_of(body.span.start),
                            line_of(body.span.end),
                            if_block,
                        );
                        branch_ids.push(then_id);
                        worklist.push(WorkItem::Block {
                            block: body,
                            parent_block: then_id,
                        });
                    }
                    if let Some(else_body) = else_body {
                        let else_id = builder.new_block(
                            BlockKind::ElseBlock,
                            line_of(else_body.span.start),
                            line_of(else_body.span.end),
                            if_block,
                        );
                        branch_ids.push(else_id);
                        worklist.push(WorkItem::Block {
                            block: else_body,
                            parent_block: else_id,
                        });
                    }
                    for i in 0..branch_ids.len() {
                        for j in (i + 1)..branch_ids.len() {
                            builder.link_branch(branch_ids[i], branch_ids[j]);
                        }
                    }
                }
                Stmt::While { cond, body, .. } => {
                    let while_id = builder.new_block(BlockKind::While, start_line, line_of(stmt.span().end), parent_block);
                    let cond_id = builder.decompose_condition(cond, ConditionKind::While, while_id, &line_of);
                    builder.blocks[while_id].conditions.push(cond_id);
                    let body_id = builder.new_block(
                        BlockKind::WhileBody,
                        line_of(body.span.start),
                        line_of(body.span.end),
                        while_id,
                    );
                    worklist.push(WorkItem::Block {
                        block: body,
                        parent_block: body_id,
                    });
                }
                Stmt::Repeat { body, cond, .. } => {
                    let repeat_id =
                        builder.new_block(BlockKind::Repeat, start_line, line_of(stmt.span().end), parent_block);
                    let body_id = builder.new_block(
                        BlockKind::RepeatBody,
                        line_of(body.span.start),
                        line_of(body.span.end),
                        repeat_id,
                    );
                    let cond_id = builder.decompose_condition(cond, ConditionKind::Repeat, repeat_id, &line_of);
                    builder.blocks[repeat_id].conditions.push(cond_id);
                    worklist.push(WorkItem::Block {
                        block: body,
                        parent_block: body_id,
                    });
                }
                Stmt::NumericFor { body, .. } => {
                    let for_id =
                        builder.new_block(BlockKind::ForNum, start_line, line_of(stmt.span().end), parent_block);
                    let body_id = builder.new_block(
                        BlockKind::ForBody,
                        line_of(body.span.start),
                        line_of(body.span.end),
                        for_id,
                    );
                    worklist.push(WorkItem::Block {
                        block: body,
                        parent_block: body_id,
                    });
                }
                Stmt::GenericFor { body, .. } => {
                    let for_id =
                        builder.new_block(BlockKind::ForIn, start_line, line_of(stmt.span().end), parent_block);
                    let body_id = builder.new_block(
                        BlockKind::ForBody,
                        line_of(body.span.start),
                        line_of(body.span.end),
                        for_id,
                    );
                    worklist.push(WorkItem::Block {
                        block: body,
                        parent_block: body_id,
                    });
                }
                Stmt::Do { body, .. } => {
                    let do_id =
                        builder.new_block(BlockKind::DoBlock, start_line, line_of(stmt.span().end), parent_block);
                    worklist.push(WorkItem::Block {
                        block: body,
                        parent_block: do_id,
                    });
                }
                Stmt::LocalFunction { name, func, .. } => {
                    register_function(
                        &mut builder,
                        Some(name.clone()),
                        FunctionKind::Local,
                        func,
                        false,
                        parent_block,
                        &mut worklist,
                        &line_of,
                    );
                }
                Stmt::FunctionDecl { name_path, is_method, func, .. } => {
                    let kind = if *is_method { FunctionKind::Method } else { FunctionKind::Global };
                    register_function(
                        &mut builder,
                        Some(name_path.join(".")),
                        kind,
                        func,
                        *is_method,
                        parent_block,
                        &mut worklist,
                        &line_of,
                    );
                }
                Stmt::Local { values, .. } | Stmt::Assign { values, .. } => {
                    for (i, value) in values.iter().enumerate() {
                        if let Expr::FunctionLiteral { func, .. } = value {
                            let name = match stmt {
                                Stmt::Local { names, .. } => names.get(i).cloned(),
                                Stmt::Assign { targets, .. } => targets.get(i).and_then(expr_name_hint),
                                _ => None,
                            };
                            let is_closure = captures_upvalue(func);
                            let kind = if is_closure {
                                FunctionKind::Closure
                            } else if name.is_some() {
                                FunctionKind::Local
                            } else {
                                FunctionKind::Anonymous
                            };
                            register_function(
                                &mut builder, name, kind, func, false, parent_block, &mut worklist, &line_of,
                            );
                        }
                    }
                }
                Stmt::Return { .. } | Stmt::Break { .. } | Stmt::CallStmt { .. } => {}
            }
        }
    }

    // Line classification: rules 1-6, first applicable.
    let mut line_type = vec![LineType::Blank; line_count as usize];
    for line in 1..=line_count {
        let idx = (line - 1) as usize;
        let text = source.line_text(line).unwrap_or("");
        let trimmed = text.trim();

        if is_in_block_comment(comments, line) {
            line_type[idx] = LineType::Comment;
            continue;
        }
        if trimmed.is_empty() {
            line_type[idx] = LineType::Blank;
            continue;
        }
        if is_line_comment_start(trimmed) {
            line_type[idx] = LineType::Comment;
            continue;
        }
        if structural_ast_lines.contains(&line) || is_structural_only(trimmed) {
            line_type[idx] = LineType::Structure;
            continue;
        }
        if code_lines.contains(&line) {
            line_type[idx] = LineType::Code;
            continue;
        }
        line_type[idx] = if has_any_token(trimmed) {
            LineType::Code
        } else {
            LineType::Blank
        };
    }

    CodeMap {
        line_count,
        line_type,
        functions: builder.functions,
        blocks: builder.blocks,
        conditions: builder.conditions,
        truncated: builder.truncated,
    }
}

fn register_function<'a>(
    builder: &mut Builder,
    name: Option<String>,
    kind: FunctionKind,
    func: &'a FunctionBody,
    is_method: bool,
    parent_block: BlockId,
    worklist: &mut Vec<WorkItem<'a>>,
    line_of: &impl Fn(usize) -> u32,
) {
    let start_line = line_of(func.span.start);
    let end_line = line_of(func.span.end.saturating_sub(1).max(func.span.start));
    let func_id = format!(
        "{}:{}-{}",
        name.clone().unwrap_or_else(|| "<anonymous>".to_string()),
        start_line,
        end_line
    );
    if builder.functions.iter().any(|f| f.func_id == func_id) {
        return;
    }
    builder.functions.push(FunctionInfo {
        func_id,
        name,
        start_line,
        end_line,
        kind,
        parameters: func.params.clone(),
        is_method,
    });
    let fn_block = builder.new_block(BlockKind::Function, start_line, end_line, parent_block);
    worklist.push(WorkItem::Block {
        block: &func.body,
        parent_block: fn_block,
    });
}

fn expr_name_hint(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Ident { name, .. } => Some(name.clone()),
        Expr::Field { name, .. } => Some(name.clone()),
        _ => None,
    }
}

/// A nested function literal is a CLOSURE when it references any
/// identifier it didn't bind itself — a coarse but cheap
/// approximation of upvalue capture that doesn't require full scope
/// resolution.
fn captures_upvalue(func: &FunctionBody) -> bool {
    let mut bound: HashSet<&str> = func.params.iter().map(String::as_str).collect();
    let mut free = false;
    walk_block_for_free_idents(&func.body, &mut bound, &mut free);
    free
}

fn walk_block_for_free_idents<'a>(block: &'a Block, bound: &mut HashSet<&'a str>, free: &mut bool) {
    for stmt in &block.statements {
        if *free {
            return;
        }
        match stmt {
            Stmt::Local { names, values, .. } => {
                for v in values {
                    walk_expr_for_free_idents(v, bound, free);
                }
                for n in names {
                    bound.insert(n.as_str());
                }
            }
            Stmt::LocalFunction { name, func, .. } => {
                bound.insert(name.as_str());
                walk_block_for_free_idents(&func.body, bound, free);
            }
            Stmt::Assign { targets, values, .. } => {
                for v in values.iter().chain(targets.iter()) {
                    walk_expr_for_free_idents(v, bound, free);
                }
            }
            Stmt::FunctionDecl { func, .. } => walk_block_for_free_idents(&func.body, bound, free),
            Stmt::If { arms, else_body, .. } => {
                for (cond, body) in arms {
                    walk_expr_for_free_idents(cond, bound, free);
                    walk_block_for_free_idents(body, bound, free);
                }
                if let Some(body) = else_body {
                    walk_block_for_free_idents(body, bound, free);
                }
            }
            Stmt::While { cond, body, .. } => {
                walk_expr_for_free_idents(cond, bound, free);
                walk_block_for_free_idents(body, bound, free);
            }
            Stmt::Repeat { body, cond, .. } => {
                walk_block_for_free_idents(body, bound, free);
                walk_expr_for_free_idents(cond, bound, free);
            }
            Stmt::NumericFor { var, start, stop, step, body, .. } => {
                walk_expr_for_free_idents(start, bound, free);
                walk_expr_for_free_idents(stop, bound, free);
                if let Some(step) = step {
                    walk_expr_for_free_idents(step, bound, free);
                }
                bound.insert(var.as_str());
                walk_block_for_free_idents(body, bound, free);
            }
            Stmt::GenericFor { vars, exprs, body, .. } => {
                for e in exprs {
                    walk_expr_for_free_idents(e, bound, free);
                }
                for v in vars {
                    bound.insert(v.as_str());
                }
                walk_block_for_free_idents(body, bound, free);
            }
            Stmt::Do { body, .. } => walk_block_for_free_idents(body, bound, free),
            Stmt::Return { values, .. } => {
                for v in values {
                    walk_expr_for_free_idents(v, bound, free);
                }
            }
            Stmt::CallStmt { call, .. } => walk_expr_for_free_idents(call, bound, free),
            Stmt::Break { .. } => {}
        }
    }
}

fn walk_expr_for_free_idents<'a>(expr: &'a Expr, bound: &HashSet<&'a str>, free: &mut bool) {
    if *free {
        return;
    }
    match expr {
        Expr::Ident { name, .. } => {
            if !bound.contains(name.as_str()) {
                *free = true;
            }
        }
        Expr::BinOp { lhs, rhs, .. } => {
            walk_expr_for_free_idents(lhs, bound, free);
            walk_expr_for_free_idents(rhs, bound, free);
        }
        Expr::UnOp { operand, .. } => walk_expr_for_free_idents(operand, bound, free),
        Expr::Call { callee, args, .. } => {
            walk_expr_for_free_idents(callee, bound, free);
            for a in args {
                walk_expr_for_free_idents(a, bound, free);
            }
        }
        Expr::MethodCall { receiver, args, .. } => {
            walk_expr_for_free_idents(receiver, bound, free);
            for a in args {
                walk_expr_for_free_idents(a, bound, free);
            }
        }
        Expr::Index { object, key, .. } => {
            walk_expr_for_free_idents(object, bound, free);
            walk_expr_for_free_idents(key, bound, free);
        }
        Expr::Field { object, .. } => walk_expr_for_free_idents(object, bound, free),
        Expr::Paren { inner, .. } => walk_expr_for_free_idents(inner, bound, free),
        Expr::TableConstructor { fields, .. } => {
            for f in fields {
                match f {
                    crate::parser::ast::TableField::Positional(e) => walk_expr_for_free_idents(e, bound, free),
                    crate::parser::ast::TableField::Named { value, .. } => {
                        walk_expr_for_free_idents(value, bound, free)
                    }
                    crate::parser::ast::TableField::Indexed { key, value } => {
                        walk_expr_for_free_idents(key, bound, free);
                        walk_expr_for_free_idents(value, bound, free);
                    }
                }
            }
        }
        // A nested function literal's own free variables are its own
        // concern; whether it captures from this scope doesn't change
        // whether this scope's variables were referenced free here.
        Expr::FunctionLiteral { .. }
        | Expr::Nil { .. }
        | Expr::True { .. }
        | Expr::False { .. }
        | Expr::Number { .. }
        | Expr::Str { .. }
        | Expr::Vararg { .. } => {}
    }
}

const STRUCTURAL_KEYWORDS: &[Keyword] = &[
    Keyword::End,
    Keyword::Else,
    Keyword::Until,
    Keyword::Then,
    Keyword::Do,
    Keyword::Repeat,
];

/// Rule 4: a line made up only of structural tokens (closing keywords or
/// standalone closing brackets) and nothing else executable.
fn is_structural_only(trimmed: &str) -> bool {
    let Ok(tokens) = tokenize(trimmed.as_bytes()) else {
        return false;
    };
    let mut saw_any = false;
    for tok in &tokens {
        match &tok.kind {
            TokenKind::Eof => continue,
            TokenKind::Keyword(kw) if STRUCTURAL_KEYWORDS.contains(kw) => saw_any = true,
            TokenKind::RParen | TokenKind::RBrace | TokenKind::RBracket => saw_any = true,
            _ => return false,
        }
    }
    saw_any
}

/// Rule 3: a line whose first non-whitespace characters are a line-comment
/// marker not immediately opening a long bracket (that's still a comment —
/// only a long-bracket *string*, not preceded by `--`, stays CODE if it
/// starts a statement; a `--` prefix is always a comment regardless).
fn is_line_comment_start(trimmed: &str) -> bool {
    trimmed.starts_with("--")
}

fn has_any_token(trimmed: &str) -> bool {
    !trimmed.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment_scanner::scan_comments;
    use crate::config::AnalyzerConfig;
    use crate::parser;
    use crate::path::FileKey;

    fn analyze_src(src: &str) -> CodeMap {
        let key = FileKey::normalize("/f.lua").unwrap();
        let buf = SourceBuffer::new(key, src.as_bytes().to_vec());
        let ast = parser::parse(&buf).unwrap();
        let comments = scan_comments(buf.bytes());
        analyze(&buf, &ast, &comments, &AnalyzerConfig::default())
    }

    #[test]
    fn comment_only_file_has_no_executable_lines() {
        let map = analyze_src("-- one\n-- two\n\n-- three\n");
        assert_eq!(map.executable_lines(true).len(), 0);
    }

    #[test]
    fn single_function_single_call() {
        let src = "local function f(x)\n  if x > 0 then\n    return x\n  end\n  return 0\nend\nreturn f(1)\n";
        let map = analyze_src(src);
        assert_eq!(map.functions.len(), 1);
        assert_eq!(map.functions[0].kind, FunctionKind::Local);
        assert!(map.is_executable_line(1, true));
        assert!(map.is_executable_line(2, true));
        assert!(map.is_executable_line(3, true));
        assert!(map.is_executable_line(5, true));
        assert!(map.is_executable_line(7, true));
        // Line 4 (`end`) and line 6 (`end`) are structural.
        assert_eq!(map.line_type(4), LineType::Structure);
        assert!(!map.is_executable_line(4, false));
    }

    #[test]
    fn compound_condition_decomposes() {
        let map = analyze_src("if a > 0 and b < 10 then\n  c()\nend\n");
        assert_eq!(map.conditions.len(), 3); // root `and` + 2 components
        let root = map.conditions.iter().find(|c| c.is_compound).unwrap();
        assert_eq!(root.operator, Some(LogicalOperator::And));
        assert_eq!(root.components.len(), 2);
    }

    #[test]
    fn global_and_method_function_kinds() {
        let map = analyze_src("function globalFn() end\nfunction t:method() end\n");
        assert!(map.functions.iter().any(|f| f.kind == FunctionKind::Global));
        assert!(map.functions.iter().any(|f| f.kind == FunctionKind::Method && f.is_method));
    }

    #[test]
    fn blocks_form_consistent_parent_child_tree() {
        let map = analyze_src("if a then\n  b()\nelse\n  c()\nend\n");
        for block in &map.blocks {
            if let Some(parent) = block.parent_id {
                let id = map.blocks.iter().position(|b| std::ptr::eq(b, block)).unwrap();
                assert!(map.blocks[parent].children.contains(&id));
            }
        }
    }
}
