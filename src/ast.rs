// Compiled expression tree.
// Produced by the parser, walked by the evaluator.

use std::rc::Rc;

use crate::value::Value;

/// A compiled expression node.
///
/// One variant per surface form. Literals carry their `Value` directly
/// (numbers parsed, regexes precompiled); function-literal bodies are parsed
/// eagerly at compile time, so evaluation never touches source text again.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal: string, number, boolean, null, infinity or regex.
    Literal(Value),

    /// `[a, b, c]`
    ArrayLit(Vec<Expr>),

    /// `(params){body}`
    FuncLit {
        params: Rc<Vec<String>>,
        body: Rc<Expr>,
    },

    /// Bare identifier, resolved through `vars` and the unknowns policy.
    Ident(String),

    /// `$name`, `${literal name}` or `$(dynamic)` variable reference.
    Var(VarName),

    /// Omitted operand site: evaluates to the caller's default-left value.
    DefaultLeft,

    /// Head value followed by `.prop` and `(args)` links.
    Chain {
        head: Box<Expr>,
        links: Vec<Link>,
    },

    /// `!value`
    Not(Box<Expr>),

    /// `debug <rest-of-chunk>`: captures the source text for the sink.
    Debug {
        source: String,
        inner: Box<Expr>,
    },

    /// `C ? A : B` and the `A ?: B` shorthand. `cond`/`then` are `None` when
    /// the corresponding slice was empty.
    Ternary {
        cond: Option<Box<Expr>>,
        then: Option<Box<Expr>>,
        otherwise: Box<Expr>,
    },

    /// `&` / `|`, short-circuit, source value preserved.
    Logic {
        op: LogicOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Comparison-layer operator; `negated` covers the `!`-prefixed and
    /// `not`-worded spellings.
    Cmp {
        op: CmpOp,
        negated: bool,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Math-layer operator.
    Math {
        op: MathOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Default-left projection wrapped around each comparison layer outside
    /// ternary predicates: a non-boolean result is compared against the
    /// default-left value at evaluation time.
    Projected(Box<Expr>),
}

/// The name part of a `$` reference.
#[derive(Debug, Clone, PartialEq)]
pub enum VarName {
    Literal(String),
    Dynamic(Box<Expr>),
}

/// One link of a property-access chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Link {
    Prop(PropName),
    Call(Vec<Expr>),
}

/// A property name: `.name`, `.{literal name}` or `.(dynamic)`.
#[derive(Debug, Clone, PartialEq)]
pub enum PropName {
    Literal(String),
    Dynamic(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

/// Comparison operators in their absolute (non-negated) form. The `Ci`
/// variants are the `~`-spelled case-insensitive forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `is`: type predicate via the check service
    Is,
    /// `in`: right side contains left
    In,
    CiIn,
    Matches,
    /// `=`: deep structural equality
    Eq,
    /// `<>`: shallow identity inequality
    Ne,
    CiEq,
    Lt,
    Le,
    Gt,
    Ge,
    /// `^=`
    StartsWith,
    CiStartsWith,
    /// `$=`
    EndsWith,
    CiEndsWith,
    /// `*=`: substring, or elementwise contains on arrays
    Contains,
    CiContains,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    Add,
    /// `before`: prefix the right string when it is non-empty
    Before,
    /// `then`: append when the left side is truthy
    Then,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

impl Expr {
    /// Literal string node.
    pub fn string(s: impl Into<String>) -> Self {
        Expr::Literal(Value::from(s.into()))
    }

    /// Literal number node.
    pub fn number(n: f64) -> Self {
        Expr::Literal(Value::Number(n))
    }

    /// Literal boolean node.
    pub fn boolean(b: bool) -> Self {
        Expr::Literal(Value::Bool(b))
    }

    /// Literal null node.
    pub fn null() -> Self {
        Expr::Literal(Value::Null)
    }
}
