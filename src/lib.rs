//! # conscript
//!
//! A tiny expression language for embeddable predicates — a `WHERE` clause
//! you can hand to your users. A one-line textual *conscription* compiles
//! into a reusable test over a caller-supplied variable environment:
//!
//! ```
//! use conscript::compile;
//! use serde_json::json;
//!
//! let check = compile("month = 10 & day = 28").unwrap();
//! assert!(check.test(json!({"month": 10, "day": 28})).unwrap());
//! assert!(!check.test(json!({"month": 3, "day": 1})).unwrap());
//! ```
//!
//! Compile once, evaluate many times. The full surface is curried the same
//! way: a [`Conscript`] factory carries global options, `compile` merges
//! per-call options over them, and `exec` takes the variables plus
//! per-evaluation options such as `defaultLeft`:
//!
//! ```
//! use conscript::{Conscript, ExecOptions, Options, Value};
//! use serde_json::json;
//!
//! let factory = Conscript::with_options(Options {
//!     allow_regex_literals: Some(true),
//!     ..Options::default()
//! });
//! let check = factory.compile("\"test\" matches @^T@i").unwrap();
//! assert_eq!(check.exec(json!({})).unwrap(), Value::Bool(true));
//!
//! // `defaultLeft` stands in for omitted left operands
//! let range = factory.compile(">2 & <10").unwrap();
//! let result = range
//!     .exec_with(json!({}), ExecOptions::default_left(5.0))
//!     .unwrap();
//! assert_eq!(result, Value::Bool(true));
//! ```
//!
//! The pipeline is a precedence-layered recursive-descent parser producing a
//! compiled expression tree, plus an evaluator for the runtime semantics of
//! every operator, property access, call and identifier resolution mode:
//!
//! - `cursor` - rewindable scanner with bracket-aware terminator searches
//! - `parser` - grammar layers: ternary, boolean, comparison, math, value
//! - `ast` - the compiled expression tree
//! - `evaluator` - operator semantics, scopes, the unknowns policy
//! - `functions` - the array/string method set (`map`, `slice`, `pop`, ...)
//! - `typecheck` - default vocabulary behind `is` / `is not`

pub mod ast;
pub mod evaluator;
pub mod options;
pub mod parser;
pub mod typecheck;
pub mod value;

mod cursor;
mod functions;

use thiserror::Error;

use crate::ast::Expr;
use crate::options::ResolvedOptions;

pub use crate::evaluator::{EvalError, Vars};
pub use crate::options::{DebugSink, ExecOptions, Options, UnknownsAre};
pub use crate::parser::SyntaxError;
pub use crate::typecheck::TypeCheck;
pub use crate::value::Value;

/// Either compilation or evaluation failed; returned by the one-shot
/// [`evaluate`] helper.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Compiler factory carrying global options.
#[derive(Clone, Default)]
pub struct Conscript {
    options: Options,
}

impl Conscript {
    pub fn new() -> Self {
        Conscript::default()
    }

    pub fn with_options(options: Options) -> Self {
        Conscript { options }
    }

    /// Compile a conscription under the factory's options.
    pub fn compile(&self, source: &str) -> Result<Conscription, SyntaxError> {
        self.compile_with(source, Options::default())
    }

    /// Compile with per-call options merged over the factory's.
    pub fn compile_with(
        &self,
        source: &str,
        options: Options,
    ) -> Result<Conscription, SyntaxError> {
        let resolved = options.merged_over(&self.options).resolve();
        let expr = parser::parse(source, resolved.allow_regex_literals)?;
        Ok(Conscription {
            source: source.to_string(),
            expr,
            options: resolved,
        })
    }
}

/// A compiled conscription: an immutable expression tree plus its resolved
/// option set. Evaluation is pure: the only side effects are calls into the
/// caller's `vars` functions and the `debugOutput` sink.
pub struct Conscription {
    source: String,
    expr: Expr,
    options: ResolvedOptions,
}

impl Conscription {
    /// The original source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against a variable environment.
    pub fn exec(&self, vars: impl Into<Vars>) -> Result<Value, EvalError> {
        self.exec_with(vars, ExecOptions::default())
    }

    /// Evaluate with per-evaluation options (`defaultLeft`).
    pub fn exec_with(
        &self,
        vars: impl Into<Vars>,
        exec: ExecOptions,
    ) -> Result<Value, EvalError> {
        evaluator::run(&self.expr, vars.into(), &self.options, &exec)
    }

    /// Evaluate and reduce to a boolean by truthiness.
    pub fn test(&self, vars: impl Into<Vars>) -> Result<bool, EvalError> {
        Ok(self.exec(vars)?.is_truthy())
    }
}

/// Compile under default options.
pub fn compile(source: &str) -> Result<Conscription, SyntaxError> {
    Conscript::new().compile(source)
}

/// Compile and evaluate in one step. Prefer [`compile`] when the same
/// conscription runs more than once.
pub fn evaluate(source: &str, vars: impl Into<Vars>) -> Result<Value, Error> {
    Ok(compile(source)?.exec(vars)?)
}
