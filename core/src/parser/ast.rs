//! Abstract syntax tree for the language subset this crate analyzes.
//!
//! Every node that corresponds to a source span carries a [`Span`] of byte
//! offsets — the static analyzer and instrumenter both work from these
//! spans rather than re-scanning source text.

pub use crate::parser::lexer::Span;

#[derive(Debug, Clone)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Local {
        names: Vec<String>,
        values: Vec<Expr>,
        span: Span,
    },
    LocalFunction {
        name: String,
        func: FunctionBody,
        span: Span,
    },
    Assign {
        targets: Vec<Expr>,
        values: Vec<Expr>,
        span: Span,
    },
    FunctionDecl {
        /// Dotted/method path, e.g. `a.b:c`.
        name_path: Vec<String>,
        is_method: bool,
        func: FunctionBody,
        span: Span,
    },
    If {
        /// (condition, body) pairs in order: `if`, then any `elseif`s.
        arms: Vec<(Expr, Block)>,
        else_body: Option<Block>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Block,
        span: Span,
    },
    Repeat {
        body: Block,
        cond: Expr,
        span: Span,
    },
    NumericFor {
        var: String,
        start: Expr,
        stop: Expr,
        step: Option<Expr>,
        body: Block,
        span: Span,
    },
    GenericFor {
        vars: Vec<String>,
        exprs: Vec<Expr>,
        body: Block,
        span: Span,
    },
    Do {
        body: Block,
        span: Span,
    },
    Return {
        values: Vec<Expr>,
        span: Span,
    },
    Break {
        span: Span,
    },
    /// A bare call used as a statement, e.g. `f(x)` or `t:m()`.
    CallStmt {
        call: Expr,
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Local { span, .. }
            | Stmt::LocalFunction { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::FunctionDecl { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::Repeat { span, .. }
            | Stmt::NumericFor { span, .. }
            | Stmt::GenericFor { span, .. }
            | Stmt::Do { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Break { span }
            | Stmt::CallStmt { span, .. } => *span,
        }
    }

    /// True for statements the static analyzer treats as unconditionally
    /// executable: calls, assignments, non-bare returns, control-flow
    /// headers, function-definition lines. Excludes the pure structural
    /// forms (bare `local` with no values, bare `return IDENT`).
    pub fn is_executable_kind(&self) -> bool {
        match self {
            Stmt::Local { values, .. } => !values.is_empty(),
            Stmt::Assign { .. }
            | Stmt::CallStmt { .. }
            | Stmt::If { .. }
            | Stmt::While { .. }
            | Stmt::Repeat { .. }
            | Stmt::NumericFor { .. }
            | Stmt::GenericFor { .. }
            | Stmt::FunctionDecl { .. }
            | Stmt::LocalFunction { .. } => true,
            Stmt::Return { values, .. } => {
                !(values.len() == 1 && matches!(values[0], Expr::Ident { .. }))
                    && !values.is_empty()
            }
            Stmt::Do { .. } | Stmt::Break { .. } => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionBody {
    pub params: Vec<String>,
    pub is_vararg: bool,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Nil { span: Span },
    True { span: Span },
    False { span: Span },
    Number { value: String, span: Span },
    Str { value: String, span: Span },
    Vararg { span: Span },
    Ident { name: String, span: Span },
    BinOp {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    UnOp {
        op: UnOp,
        operand: Box<Expr>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
        span: Span,
    },
    FunctionLiteral {
        func: Box<FunctionBody>,
        span: Span,
    },
    TableConstructor {
        fields: Vec<TableField>,
        span: Span,
    },
    Index {
        object: Box<Expr>,
        key: Box<Expr>,
        span: Span,
    },
    Field {
        object: Box<Expr>,
        name: String,
        span: Span,
    },
    Paren {
        inner: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Nil { span }
            | Expr::True { span }
            | Expr::False { span }
            | Expr::Number { span, .. }
            | Expr::Str { span, .. }
            | Expr::Vararg { span }
            | Expr::Ident { span, .. }
            | Expr::BinOp { span, .. }
            | Expr::UnOp { span, .. }
            | Expr::Call { span, .. }
            | Expr::MethodCall { span, .. }
            | Expr::FunctionLiteral { span, .. }
            | Expr::TableConstructor { span, .. }
            | Expr::Index { span, .. }
            | Expr::Field { span, .. }
            | Expr::Paren { span, .. } => *span,
        }
    }

    /// True for the logical connective operators the condition enumerator
    /// (C4) decomposes compound conditions on.
    pub fn as_logical(&self) -> Option<(LogicalOp, Vec<&Expr>)> {
        match self {
            Expr::BinOp { op: BinOp::And, lhs, rhs, .. } => {
                Some((LogicalOp::And, vec![lhs.as_ref(), rhs.as_ref()]))
            }
            Expr::BinOp { op: BinOp::Or, lhs, rhs, .. } => {
                Some((LogicalOp::Or, vec![lhs.as_ref(), rhs.as_ref()]))
            }
            Expr::UnOp { op: UnOp::Not, operand, .. } => {
                Some((LogicalOp::Not, vec![operand.as_ref()]))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Concat,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    Len,
}

#[derive(Debug, Clone)]
pub enum TableField {
    Positional(Expr),
    Named { name: String, value: Expr },
    Indexed { key: Expr, value: Expr },
}

#[derive(Debug, Clone)]
pub struct Ast {
    pub body: Block,
}
