//! The abstract syntax tree produced by the parser (C4, spec §4.4).

use crate::value::Var;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
}

/// A scatter-assignment target (`{a, ?b = 1, @rest} = list`).
#[derive(Debug, Clone)]
pub enum ScatterTarget {
    Required(String),
    Optional(String, Option<Box<Expr>>),
    Rest(String),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Var),
    Var(String),
    /// `^`/`$` index sugar, resolved against the enclosing collection's
    /// length at evaluation time (spec §4.1).
    RangeStart,
    RangeEnd,
    Assign(Box<Expr>, Box<Expr>),
    ScatterAssign(Vec<ScatterTarget>, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Unary(UnOp, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
    PropGet(Box<Expr>, PropName),
    PropSet(Box<Expr>, PropName, Box<Expr>),
    VerbCall(Box<Expr>, VerbName, Vec<Expr>),
    BuiltinCall(String, Vec<Expr>),
    Index(Box<Expr>, Box<Expr>),
    IndexSet(Box<Expr>, Box<Expr>, Box<Expr>),
    Range(Box<Expr>, Box<Expr>, Box<Expr>),
    RangeSet(Box<Expr>, Box<Expr>, Box<Expr>, Box<Expr>),
    List(Vec<ListItem>),
    Map(Vec<(Expr, Expr)>),
    Catch(Box<Expr>, Vec<CatchCode>, Option<Box<Expr>>),
    SystemProp(String),
    SystemVerbCall(String, Vec<Expr>),
}

/// A list-literal element, possibly a splice (`@x`, GLOSSARY).
#[derive(Debug, Clone)]
pub enum ListItem {
    Single(Expr),
    Splice(Expr),
}

#[derive(Debug, Clone)]
pub enum PropName {
    Literal(String),
    Dynamic(Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum VerbName {
    Literal(String),
    Dynamic(Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum CatchCode {
    Any,
    Named(String),
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),
    If(Vec<(Expr, Vec<Stmt>)>, Vec<Stmt>),
    While {
        label: Option<String>,
        cond: Expr,
        body: Vec<Stmt>,
    },
    ForList {
        var: String,
        index_var: Option<String>,
        label: Option<String>,
        list: Expr,
        body: Vec<Stmt>,
    },
    ForRange {
        var: String,
        label: Option<String>,
        from: Expr,
        to: Expr,
        body: Vec<Stmt>,
    },
    Fork {
        var: Option<String>,
        delay: Expr,
        body: Vec<Stmt>,
    },
    Try {
        body: Vec<Stmt>,
        excepts: Vec<ExceptClause>,
        finally: Option<Vec<Stmt>>,
    },
    Return(Option<Expr>),
    Break(Option<String>),
    Continue(Option<String>),
}

#[derive(Debug, Clone)]
pub struct ExceptClause {
    pub var: Option<String>,
    pub codes: Vec<CatchCode>,
    pub body: Vec<Stmt>,
}

pub type Program = Vec<Stmt>;
