//! Syntax tree for macro bodies run by the script host.

use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    Len,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Nil,
    True,
    False,
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Vararg,
    Function(Rc<FuncBody>),
    Name(String),
    Index(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    Method(Box<Expr>, String, Vec<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Unary(UnOp, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Table(Vec<Field>),
    /// Parenthesized expression, truncated to one value.
    Paren(Box<Expr>),
}

impl Expr {
    /// Calls and `...` produce several values in the last position of a list.
    pub fn is_multi(&self) -> bool {
        matches!(self, Expr::Call(..) | Expr::Method(..) | Expr::Vararg)
    }
}

#[derive(Debug, Clone)]
pub enum Field {
    Positional(Expr),
    Keyed(Expr, Expr),
}

#[derive(Debug)]
pub struct FuncBody {
    pub name: String,
    pub chunk: Rc<str>,
    pub line: usize,
    pub params: Vec<String>,
    pub vararg: bool,
    pub body: Block,
}

#[derive(Debug, Clone)]
pub enum Stat {
    Local(Vec<String>, Vec<Expr>),
    Assign(Vec<Expr>, Vec<Expr>),
    Call(Expr),
    Do(Block),
    While(Expr, Block),
    Repeat(Block, Expr),
    If(Vec<(Expr, Block)>, Option<Block>),
    NumericFor {
        var: String,
        start: Expr,
        limit: Expr,
        step: Option<Expr>,
        body: Block,
    },
    GenericFor {
        names: Vec<String>,
        exprs: Vec<Expr>,
        body: Block,
    },
    LocalFunction(String, Rc<FuncBody>),
    Return(Vec<Expr>),
    Break,
}

/// A statement list; every statement remembers its line for error messages.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub stats: Vec<(Stat, usize)>,
}
