// Expression evaluator.
//
// Walks the compiled `Expr` tree against the runtime environment: the
// caller's variable source wrapped in a scope chain (function literals push
// parameter frames), plus the resolved option set. Every node is total —
// it produces a `Value` or a typed error.

use std::rc::Rc;

use indexmap::IndexMap;
use thiserror::Error;

use crate::ast::{CmpOp, Expr, Link, LogicOp, MathOp, PropName, VarName};
use crate::functions;
use crate::options::{DebugSink, ExecOptions, ResolvedOptions, UnknownsAre};
use crate::typecheck::{self, TypeCheck};
use crate::value::Value;

/// Evaluation errors.
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Reference error: '{0}' is not defined")]
    Reference(String),

    #[error("Type error: {0}")]
    Type(String),
}

// ── Variable sources and scopes ──────────────────────────────────────────────

/// The caller-supplied variable environment: either a name→value mapping or
/// an on-demand lookup callable (`None` meaning "not a variable").
#[derive(Clone)]
pub enum Vars {
    Map(Rc<IndexMap<String, Value>>),
    Lookup(Rc<dyn Fn(&str) -> Option<Value>>),
}

impl Vars {
    pub fn empty() -> Self {
        Vars::Map(Rc::new(IndexMap::new()))
    }

    pub fn from_fn(f: impl Fn(&str) -> Option<Value> + 'static) -> Self {
        Vars::Lookup(Rc::new(f))
    }

    fn get(&self, name: &str) -> Option<Value> {
        match self {
            Vars::Map(map) => map.get(name).cloned(),
            Vars::Lookup(f) => f(name),
        }
    }
}

impl Default for Vars {
    fn default() -> Self {
        Vars::empty()
    }
}

impl From<IndexMap<String, Value>> for Vars {
    fn from(map: IndexMap<String, Value>) -> Self {
        Vars::Map(Rc::new(map))
    }
}

/// A JSON object becomes a mapping; any other JSON value gives the empty
/// environment.
impl From<serde_json::Value> for Vars {
    fn from(v: serde_json::Value) -> Self {
        match Value::from(v) {
            Value::Object(map) => Vars::Map(Rc::new(map.as_ref().clone())),
            _ => Vars::empty(),
        }
    }
}

/// One frame of the variable-resolver chain. Function literals push a
/// parameter frame whose lookups fall through to the invoking scope.
struct ScopeInner {
    frame: IndexMap<String, Value>,
    parent: Option<Scope>,
    base: Option<Vars>,
}

#[derive(Clone)]
pub(crate) struct Scope(Rc<ScopeInner>);

impl Scope {
    pub(crate) fn root(vars: Vars) -> Self {
        Scope(Rc::new(ScopeInner {
            frame: IndexMap::new(),
            parent: None,
            base: Some(vars),
        }))
    }

    fn child(&self, frame: IndexMap<String, Value>) -> Self {
        Scope(Rc::new(ScopeInner {
            frame,
            parent: Some(self.clone()),
            base: None,
        }))
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.0.frame.get(name) {
            return Some(v.clone());
        }
        if let Some(parent) = &self.0.parent {
            return parent.lookup(name);
        }
        self.0.base.as_ref().and_then(|vars| vars.get(name))
    }
}

// ── Evaluation environment ───────────────────────────────────────────────────

pub(crate) struct ExecState {
    pub default_left: Option<Value>,
    pub safe_call: bool,
    pub safe_nav: bool,
    pub safe_op: bool,
    pub unknowns_are: UnknownsAre,
    pub debug_output: Option<DebugSink>,
    pub type_check: Option<TypeCheck>,
}

#[derive(Clone)]
pub(crate) struct Env {
    pub scope: Scope,
    pub state: Rc<ExecState>,
}

/// Evaluate a compiled expression against a variable source. The result is
/// normalised: callers never see `Undefined`.
pub(crate) fn run(
    expr: &Expr,
    vars: Vars,
    opts: &ResolvedOptions,
    exec: &ExecOptions,
) -> Result<Value, EvalError> {
    let env = Env {
        scope: Scope::root(vars),
        state: Rc::new(ExecState {
            default_left: exec.default_left.clone(),
            safe_call: opts.safe_call,
            safe_nav: opts.safe_nav,
            safe_op: opts.safe_op,
            unknowns_are: opts.unknowns_are,
            debug_output: opts.debug_output.clone(),
            type_check: opts.type_check.clone(),
        }),
    };
    Ok(undef_to_null(eval(expr, &env)?))
}

#[inline]
fn undef_to_null(v: Value) -> Value {
    if v.is_undefined() {
        Value::Null
    } else {
        v
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Undefined => "undefined",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        Value::Function(_) => "function",
        Value::Regex(_) => "regex",
    }
}

// ── Interpreter ──────────────────────────────────────────────────────────────

pub(crate) fn eval(expr: &Expr, env: &Env) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),

        Expr::ArrayLit(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(undef_to_null(eval(item, env)?));
            }
            Ok(Value::array(out))
        }

        Expr::FuncLit { params, body } => Ok(make_lambda(params, body, env)),

        Expr::Ident(name) => resolve_name(name, env),

        Expr::Var(name) => {
            let name = match name {
                VarName::Literal(n) => n.clone(),
                VarName::Dynamic(expr) => eval(expr, env)?.to_text(),
            };
            resolve_name(&name, env)
        }

        Expr::DefaultLeft => Ok(env
            .state
            .default_left
            .clone()
            .unwrap_or(Value::Undefined)),

        Expr::Chain { head, links } => {
            let mut value = eval(head, env)?;
            for link in links {
                value = match link {
                    Link::Prop(name) => {
                        let name = match name {
                            PropName::Literal(n) => n.clone(),
                            PropName::Dynamic(expr) => eval(expr, env)?.to_text(),
                        };
                        access(value, &name, env)?
                    }
                    Link::Call(arg_exprs) => {
                        let mut args = Vec::with_capacity(arg_exprs.len());
                        for a in arg_exprs {
                            args.push(undef_to_null(eval(a, env)?));
                        }
                        call_value(&value, &args, env)?
                    }
                };
            }
            Ok(value)
        }

        Expr::Not(inner) => {
            let v = eval(inner, env)?;
            // Inside default-left pipelines !x reads as "differs from default"
            if let Some(dl) = &env.state.default_left {
                if !v.is_bool() {
                    return Ok(Value::Bool(!v.same_value(dl)));
                }
            }
            Ok(Value::Bool(!v.is_truthy()))
        }

        Expr::Debug { source, inner } => {
            let v = eval(inner, env)?;
            if let Some(sink) = &env.state.debug_output {
                sink(source, &v);
            }
            Ok(v)
        }

        Expr::Ternary {
            cond,
            then,
            otherwise,
        } => {
            let raw = match cond {
                Some(c) => eval(c, env)?,
                None => Value::Undefined,
            };
            // `?` doubles as the default-left short circuit
            let a = if raw.is_undefined() {
                env.state.default_left.clone().unwrap_or(Value::Undefined)
            } else {
                raw
            };
            if a.is_truthy() {
                match then {
                    Some(t) => {
                        let tv = eval(t, env)?;
                        // empty middle slice (`A ?: B`) keeps the condition value
                        if tv.is_undefined() {
                            Ok(a)
                        } else {
                            Ok(tv)
                        }
                    }
                    None => Ok(a),
                }
            } else {
                eval(otherwise, env)
            }
        }

        Expr::Logic { op, left, right } => {
            let lv = eval(left, env)?;
            match op {
                LogicOp::And => {
                    if lv.is_truthy() {
                        eval(right, env)
                    } else {
                        Ok(lv)
                    }
                }
                LogicOp::Or => {
                    if lv.is_truthy() {
                        Ok(lv)
                    } else {
                        eval(right, env)
                    }
                }
            }
        }

        Expr::Cmp {
            op,
            negated,
            left,
            right,
        } => {
            let lv = eval(left, env)?;
            let rv = eval(right, env)?;
            let outcome = compare(*op, &lv, &rv, env)?;
            Ok(Value::Bool(outcome != *negated))
        }

        Expr::Math { op, left, right } => {
            let lv = eval(left, env)?;
            let rv = eval(right, env)?;
            math_apply(*op, lv, rv, env)
        }

        Expr::Projected(inner) => {
            let v = eval(inner, env)?;
            // With a default-left in effect, a non-boolean comparison-layer
            // result is read as "equals the default"
            if let Some(dl) = &env.state.default_left {
                if !v.is_bool() {
                    return Ok(Value::Bool(v.same_value(dl)));
                }
            }
            Ok(v)
        }
    }
}

fn resolve_name(name: &str, env: &Env) -> Result<Value, EvalError> {
    match env.scope.lookup(name) {
        Some(v) => Ok(v),
        None => match env.state.unknowns_are {
            UnknownsAre::Strings => Ok(Value::from(name)),
            UnknownsAre::Null => Ok(Value::Null),
            UnknownsAre::Errors => Err(EvalError::Reference(name.to_string())),
        },
    }
}

/// Compile a function literal into a callable: a parameter frame over the
/// defining environment, missing arguments bound to `Null`.
fn make_lambda(params: &Rc<Vec<String>>, body: &Rc<Expr>, env: &Env) -> Value {
    let params = params.clone();
    let body = body.clone();
    let env = env.clone();
    Value::function(move |args| {
        let mut frame = IndexMap::new();
        for (i, p) in params.iter().enumerate() {
            frame.insert(p.clone(), args.get(i).cloned().unwrap_or(Value::Null));
        }
        let child = Env {
            scope: env.scope.child(frame),
            state: env.state.clone(),
        };
        Ok(undef_to_null(eval(&body, &child)?))
    })
}

/// Invoke a function value. Calling anything else is a type error unless
/// `safeCall` turns it into `Null`.
pub(crate) fn call_value(value: &Value, args: &[Value], env: &Env) -> Result<Value, EvalError> {
    match value {
        Value::Function(f) => f.call(args),
        other => {
            if env.state.safe_call {
                Ok(Value::Null)
            } else {
                Err(EvalError::Type(format!(
                    "{} is not a function",
                    type_name(other)
                )))
            }
        }
    }
}

// ── Property access ──────────────────────────────────────────────────────────

/// One `.name` step. Objects look keys up verbatim (absent keys are `Null`,
/// no synthetic names); arrays and strings answer indices and the reserved
/// method set; everything else raises unless `safeNav`. `NaN` is normalised
/// to `Null` on both sides of the boundary.
fn access(recv: Value, name: &str, env: &Env) -> Result<Value, EvalError> {
    let recv = match recv {
        Value::Number(n) if n.is_nan() => Value::Null,
        other => other,
    };
    let result = match &recv {
        Value::Object(map) => map.get(name).cloned().unwrap_or(Value::Null),
        Value::Array(arr) => functions::sequence::access(arr, name, env)?,
        Value::String(s) => functions::text::access(s, name, env)?,
        other => {
            if env.state.safe_nav {
                Value::Null
            } else {
                return Err(EvalError::Type(format!(
                    "cannot read '{}' of {}",
                    name,
                    type_name(other)
                )));
            }
        }
    };
    Ok(match result {
        Value::Number(n) if n.is_nan() => Value::Null,
        Value::Undefined => Value::Null,
        other => other,
    })
}

// ── Comparison semantics ─────────────────────────────────────────────────────

fn compare(op: CmpOp, lv: &Value, rv: &Value, env: &Env) -> Result<bool, EvalError> {
    Ok(match op {
        CmpOp::Eq => lv == rv,
        CmpOp::Ne => !lv.same_value(rv),
        CmpOp::CiEq => lv.to_text().to_lowercase() == rv.to_text().to_lowercase(),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => ordered(op, lv, rv, env)?,
        CmpOp::StartsWith => lv.to_text().starts_with(&rv.to_text()),
        CmpOp::CiStartsWith => lv
            .to_text()
            .to_lowercase()
            .starts_with(&rv.to_text().to_lowercase()),
        CmpOp::EndsWith => lv.to_text().ends_with(&rv.to_text()),
        CmpOp::CiEndsWith => lv
            .to_text()
            .to_lowercase()
            .ends_with(&rv.to_text().to_lowercase()),
        CmpOp::Contains => contains(lv, rv, false),
        CmpOp::CiContains => contains(lv, rv, true),
        CmpOp::In => contains(rv, lv, false),
        CmpOp::CiIn => contains(rv, lv, true),
        CmpOp::Matches => regex_match(lv, rv, env)?,
        CmpOp::Is => {
            let descriptor = rv.to_text();
            match &env.state.type_check {
                Some(check) => check(lv, &descriptor),
                None => typecheck::check(lv, &descriptor),
            }
        }
    })
}

/// Native ordering: numbers numerically, strings lexicographically, and a
/// number against a string through numeric coercion.
fn ordered(op: CmpOp, lv: &Value, rv: &Value, env: &Env) -> Result<bool, EvalError> {
    use std::cmp::Ordering;
    let ordering = match (lv, rv) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.as_ref().cmp(b.as_ref())),
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            lv.to_number().partial_cmp(&rv.to_number())
        }
        _ => {
            if env.state.safe_op {
                return Ok(false);
            }
            return Err(EvalError::Type(format!(
                "cannot order {} against {}",
                type_name(lv),
                type_name(rv)
            )));
        }
    };
    Ok(match ordering {
        None => false, // NaN never orders
        Some(ord) => match op {
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
            _ => unreachable!(),
        },
    })
}

/// `*=` and friends: elementwise deep containment on arrays, substring test
/// after string coercion otherwise.
fn contains(container: &Value, item: &Value, fold_case: bool) -> bool {
    match container {
        Value::Array(arr) => arr.iter().any(|elem| {
            if fold_case {
                elem.deep_eq_ci(item)
            } else {
                elem == item
            }
        }),
        _ => {
            let mut hay = container.to_text();
            let mut needle = item.to_text();
            if fold_case {
                hay = hay.to_lowercase();
                needle = needle.to_lowercase();
            }
            hay.contains(&needle)
        }
    }
}

/// `matches`: exactly one operand is a regex, the other a string, in either
/// order.
fn regex_match(lv: &Value, rv: &Value, env: &Env) -> Result<bool, EvalError> {
    let (regex, subject) = match (lv, rv) {
        (Value::Regex(re), other) if !other.is_regex() => (re, other),
        (other, Value::Regex(re)) if !other.is_regex() => (re, other),
        _ => {
            if env.state.safe_op {
                return Ok(false);
            }
            return Err(EvalError::Type(
                "matches needs exactly one regex operand".to_string(),
            ));
        }
    };
    match subject.as_str() {
        Some(s) => Ok(regex.is_match(s)),
        None => {
            if env.state.safe_op {
                Ok(false)
            } else {
                Err(EvalError::Type(format!(
                    "matches needs a string to test, got {}",
                    type_name(subject)
                )))
            }
        }
    }
}

// ── Math semantics ───────────────────────────────────────────────────────────

fn math_apply(op: MathOp, lv: Value, rv: Value, env: &Env) -> Result<Value, EvalError> {
    match op {
        MathOp::Add => add(lv, rv, env),
        MathOp::Sub => subtract(lv, rv, env),
        MathOp::Mul | MathOp::Div | MathOp::Rem | MathOp::Pow => numeric(op, lv, rv, env),
        MathOp::Before => {
            let suffix = rv.to_text();
            if suffix.is_empty() {
                Ok(rv)
            } else {
                Ok(Value::from(lv.to_text() + &suffix))
            }
        }
        MathOp::Then => {
            if lv.is_truthy() {
                let lhs = if lv == Value::Bool(true) {
                    Value::from("")
                } else {
                    lv
                };
                add(lhs, rv, env)
            } else {
                Ok(lv)
            }
        }
    }
}

/// A `+`/`-` result must be a real number; `NaN` is a coercion violation,
/// promoted to `0` under `safeOp`.
fn num_result(n: f64, env: &Env) -> Result<Value, EvalError> {
    if n.is_nan() {
        if env.state.safe_op {
            Ok(Value::Number(0.0))
        } else {
            Err(EvalError::Type("arithmetic produced NaN".to_string()))
        }
    } else {
        Ok(Value::Number(n))
    }
}

/// Coerce an arithmetic operand to a number. Only strings coerce; any other
/// non-number raises, or counts as `0` under `safeOp`.
fn num_operand(v: &Value, op: &str, env: &Env) -> Result<f64, EvalError> {
    match v {
        Value::Number(n) => Ok(*n),
        Value::String(_) => {
            let n = v.to_number();
            if n.is_nan() {
                if env.state.safe_op {
                    Ok(0.0)
                } else {
                    Err(EvalError::Type(format!(
                        "cannot {} non-numeric string '{}'",
                        op,
                        v.to_text()
                    )))
                }
            } else {
                Ok(n)
            }
        }
        other => {
            if env.state.safe_op {
                Ok(0.0)
            } else {
                Err(EvalError::Type(format!("cannot {} {}", op, type_name(other))))
            }
        }
    }
}

/// Polymorphic `+`: array concatenation, object merge, numeric addition with
/// string coercion, string concatenation.
fn add(lv: Value, rv: Value, env: &Env) -> Result<Value, EvalError> {
    match (&lv, &rv) {
        (Value::Array(a), _) => {
            let mut out = a.as_ref().clone();
            match &rv {
                Value::Array(b) => out.extend(b.iter().cloned()),
                other => out.push(other.clone()),
            }
            Ok(Value::array(out))
        }
        (_, Value::Array(b)) => {
            let mut out = vec![lv.clone()];
            out.extend(b.iter().cloned());
            Ok(Value::array(out))
        }
        (Value::Object(a), Value::Object(b)) => {
            let mut merged = a.as_ref().clone();
            for (k, v) in b.iter() {
                merged.insert(k.clone(), v.clone());
            }
            Ok(Value::object(merged))
        }
        (Value::Number(a), Value::Number(b)) => num_result(a + b, env),
        (Value::Number(a), Value::String(_)) => {
            num_result(a + num_operand(&rv, "add", env)?, env)
        }
        (Value::String(_), Value::Number(b)) => {
            num_result(num_operand(&lv, "add", env)? + b, env)
        }
        (Value::String(a), _) => Ok(Value::from(a.to_string() + &rv.to_text())),
        (_, Value::String(b)) => Ok(Value::from(lv.to_text() + b.as_ref())),
        (Value::Number(a), _) => num_result(a + num_operand(&rv, "add", env)?, env),
        (_, Value::Number(b)) => num_result(num_operand(&lv, "add", env)? + b, env),
        _ => {
            if env.state.safe_op {
                num_result(
                    num_operand(&lv, "add", env)? + num_operand(&rv, "add", env)?,
                    env,
                )
            } else {
                Err(EvalError::Type(format!(
                    "cannot add {} and {}",
                    type_name(&lv),
                    type_name(&rv)
                )))
            }
        }
    }
}

/// Polymorphic `-`: array set-difference, object key/pair filtering, string
/// occurrence removal, numeric subtraction with string coercion.
fn subtract(lv: Value, rv: Value, env: &Env) -> Result<Value, EvalError> {
    match (&lv, &rv) {
        (Value::Array(a), _) => {
            let removed: Vec<Value> = match &rv {
                Value::Array(b) => b.as_ref().clone(),
                other => vec![other.clone()],
            };
            let kept = a
                .iter()
                .filter(|x| !removed.iter().any(|r| r == *x))
                .cloned()
                .collect();
            Ok(Value::array(kept))
        }
        (Value::Object(a), Value::Object(b)) => {
            let kept = a
                .iter()
                .filter(|(k, v)| b.get(*k) != Some(*v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Ok(Value::object(kept))
        }
        (Value::Object(a), Value::Array(keys)) => {
            let names: Vec<String> = keys.iter().map(Value::to_text).collect();
            let kept = a
                .iter()
                .filter(|(k, _)| !names.contains(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Ok(Value::object(kept))
        }
        (Value::Object(a), other) => {
            let name = other.to_text();
            let kept = a
                .iter()
                .filter(|(k, _)| **k != name)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Ok(Value::object(kept))
        }
        (Value::String(s), _) => Ok(Value::from(s.replace(&rv.to_text(), ""))),
        (Value::Number(a), _) => num_result(a - num_operand(&rv, "subtract", env)?, env),
        (_, Value::Number(b)) => num_result(num_operand(&lv, "subtract", env)? - b, env),
        _ => {
            if env.state.safe_op {
                num_result(
                    num_operand(&lv, "subtract", env)? - num_operand(&rv, "subtract", env)?,
                    env,
                )
            } else {
                Err(EvalError::Type(format!(
                    "cannot subtract {} from {}",
                    type_name(&rv),
                    type_name(&lv)
                )))
            }
        }
    }
}

/// `*` `/` `%` `^`: numeric with string coercion. Division by signed zero
/// follows IEEE (`±Infinity`); a computed `NaN` flows through, or becomes
/// `0` under `safeOp`.
fn numeric(op: MathOp, lv: Value, rv: Value, env: &Env) -> Result<Value, EvalError> {
    let name = match op {
        MathOp::Mul => "multiply",
        MathOp::Div => "divide",
        MathOp::Rem => "take the remainder of",
        MathOp::Pow => "raise",
        _ => unreachable!(),
    };
    let a = num_operand(&lv, name, env)?;
    let b = num_operand(&rv, name, env)?;
    let result = match op {
        MathOp::Mul => a * b,
        MathOp::Div => a / b,
        MathOp::Rem => a % b,
        MathOp::Pow => a.powf(b),
        _ => unreachable!(),
    };
    if result.is_nan() && env.state.safe_op {
        Ok(Value::Number(0.0))
    } else {
        Ok(Value::Number(result))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use crate::parser::parse;
    use serde_json::json;

    fn exec(src: &str, vars: serde_json::Value) -> Result<Value, EvalError> {
        let expr = parse(src, true).unwrap();
        run(
            &expr,
            Vars::from(vars),
            &Options::default().resolve(),
            &ExecOptions::default(),
        )
    }

    fn exec_dl(src: &str, vars: serde_json::Value, dl: Value) -> Result<Value, EvalError> {
        let expr = parse(src, true).unwrap();
        run(
            &expr,
            Vars::from(vars),
            &Options::default().resolve(),
            &ExecOptions {
                default_left: Some(dl),
            },
        )
    }

    #[test]
    fn test_variable_lookup() {
        assert_eq!(exec("month", json!({"month": 10})).unwrap(), Value::from(10i64));
        assert_eq!(exec("$month", json!({"month": 10})).unwrap(), Value::from(10i64));
    }

    #[test]
    fn test_unknowns_default_to_strings() {
        assert_eq!(exec("mystery", json!({})).unwrap(), Value::from("mystery"));
    }

    #[test]
    fn test_callable_vars() {
        let expr = parse("x + 1", false).unwrap();
        let vars = Vars::from_fn(|name| (name == "x").then(|| Value::from(41i64)));
        let result = run(
            &expr,
            vars,
            &Options::default().resolve(),
            &ExecOptions::default(),
        )
        .unwrap();
        assert_eq!(result, Value::from(42i64));
    }

    #[test]
    fn test_logic_returns_source_values() {
        assert_eq!(exec("0 | 5", json!({})).unwrap(), Value::from(5i64));
        assert_eq!(exec("3 & 5", json!({})).unwrap(), Value::from(5i64));
        assert_eq!(exec("0 & 5", json!({})).unwrap(), Value::from(0i64));
    }

    #[test]
    fn test_strict_equality() {
        assert_eq!(exec("0 = \"0\"", json!({})).unwrap(), Value::Bool(false));
        assert_eq!(exec("\"a\" = \"a\"", json!({})).unwrap(), Value::Bool(true));
        assert_eq!(exec("0 - 0 = 0", json!({})).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_ternary_default_left_shortcut() {
        // `?:` keeps the condition value when it is truthy
        assert_eq!(exec("5 ?: 2", json!({})).unwrap(), Value::from(5i64));
        assert_eq!(exec("0 ?: 2", json!({})).unwrap(), Value::from(2i64));
        // omitted condition picks up the default-left
        assert_eq!(
            exec_dl("? \"yes\" : \"no\"", json!({}), Value::Bool(true)).unwrap(),
            Value::from("yes")
        );
    }

    #[test]
    fn test_property_chain() {
        assert_eq!(
            exec("user.name", json!({"user": {"name": "Ada"}})).unwrap(),
            Value::from("Ada")
        );
        assert_eq!(
            exec("user.missing", json!({"user": {}})).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_access_on_non_object_raises() {
        assert!(matches!(
            exec("user.name", json!({"user": 5})),
            Err(EvalError::Type(_))
        ));
    }

    #[test]
    fn test_safe_nav() {
        let expr = parse("user.name", false).unwrap();
        let opts = Options {
            safe_nav: Some(true),
            ..Options::default()
        };
        let result = run(
            &expr,
            Vars::from(json!({"user": 5})),
            &opts.resolve(),
            &ExecOptions::default(),
        )
        .unwrap();
        assert_eq!(result, Value::Null);
    }

    #[test]
    fn test_array_methods() {
        assert_eq!(exec("[].empty", json!({})).unwrap(), Value::Bool(true));
        assert_eq!(exec("[1].multiple", json!({})).unwrap(), Value::Bool(false));
        assert_eq!(exec("[1,2].multiple", json!({})).unwrap(), Value::Bool(true));
        assert_eq!(exec("[1,2,3].length", json!({})).unwrap(), Value::from(3i64));
        assert_eq!(exec("[1,2,3].count", json!({})).unwrap(), Value::from(3i64));
        assert_eq!(exec("[1,2,3].last", json!({})).unwrap(), Value::from(3i64));
        assert_eq!(exec("[1,2,3].1", json!({})).unwrap(), Value::from(2i64));
    }

    #[test]
    fn test_higher_order_methods() {
        assert_eq!(
            exec("[1,2,3].map((x){x*2}) = [2,4,6]", json!({})).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            exec("[1,2,3].every((x){x > 0})", json!({})).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            exec("[1,2,3].some((x){x > 2})", json!({})).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            exec("[1,2,3].slice(1) = [2,3]", json!({})).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_function_literal_scoping() {
        // parameters shadow outer vars, and outer vars stay reachable
        assert_eq!(
            exec("[1].map((x){x + y}).0", json!({"x": 100, "y": 10})).unwrap(),
            Value::from(11i64)
        );
    }

    #[test]
    fn test_immediate_call() {
        assert_eq!(exec("(x){x*2}(21)", json!({})).unwrap(), Value::from(42i64));
    }

    #[test]
    fn test_calling_a_non_function() {
        assert!(matches!(exec("x(1)", json!({"x": 5})), Err(EvalError::Type(_))));
        let expr = parse("x(1)", false).unwrap();
        let opts = Options {
            safe_call: Some(true),
            ..Options::default()
        };
        let result = run(
            &expr,
            Vars::from(json!({"x": 5})),
            &opts.resolve(),
            &ExecOptions::default(),
        )
        .unwrap();
        assert_eq!(result, Value::Null);
    }

    #[test]
    fn test_add_polymorphism() {
        assert_eq!(exec("1 + 2", json!({})).unwrap(), Value::from(3i64));
        assert_eq!(exec("1 + \"2\"", json!({})).unwrap(), Value::from(3i64));
        assert_eq!(exec("\"a\" + \"b\"", json!({})).unwrap(), Value::from("ab"));
        assert_eq!(exec("\"n=\" + true", json!({})).unwrap(), Value::from("n=true"));
        // a number against a non-numeric string is a coercion violation
        assert!(matches!(exec("\"a\" + 1", json!({})), Err(EvalError::Type(_))));
        assert_eq!(
            exec("[1] + 2 = [1,2]", json!({})).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            exec("[1] + [2,3] = [1,2,3]", json!({})).unwrap(),
            Value::Bool(true)
        );
        // object + object merges, right side winning
        assert_eq!(
            exec("(a + b).x", json!({"a": {"x": 1, "y": 2}, "b": {"x": 9}})).unwrap(),
            Value::from(9i64)
        );
    }

    #[test]
    fn test_subtract_polymorphism() {
        assert_eq!(exec("5 - 2", json!({})).unwrap(), Value::from(3i64));
        assert_eq!(exec("5 - \"2\"", json!({})).unwrap(), Value::from(3i64));
        assert_eq!(
            exec("[1,2,3] - [2] = [1,3]", json!({})).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            exec("\"banana\" - \"an\"", json!({})).unwrap(),
            Value::from("ba")
        );
    }

    #[test]
    fn test_division_by_signed_zero() {
        assert_eq!(
            exec("1 / 0", json!({})).unwrap(),
            Value::Number(f64::INFINITY)
        );
        assert_eq!(
            exec("1 / -0.0", json!({})).unwrap(),
            Value::Number(f64::NEG_INFINITY)
        );
    }

    #[test]
    fn test_coercion_violation_raises_without_safe_op() {
        assert!(matches!(exec("1 + true", json!({})), Err(EvalError::Type(_))));
        let expr = parse("1 + true", false).unwrap();
        let opts = Options {
            safe_op: Some(true),
            ..Options::default()
        };
        let result = run(
            &expr,
            Vars::empty(),
            &opts.resolve(),
            &ExecOptions::default(),
        )
        .unwrap();
        assert_eq!(result, Value::from(1i64));
    }

    #[test]
    fn test_before_and_then() {
        assert_eq!(
            exec("\"a\" before \"b\"", json!({})).unwrap(),
            Value::from("ab")
        );
        assert_eq!(exec("\"a\" before \"\"", json!({})).unwrap(), Value::from(""));
        assert_eq!(
            exec("\"go\" then \"!\"", json!({})).unwrap(),
            Value::from("go!")
        );
        assert_eq!(
            exec("true then \"on\"", json!({})).unwrap(),
            Value::from("on")
        );
        assert_eq!(exec("0 then \"on\"", json!({})).unwrap(), Value::from(0i64));
    }

    #[test]
    fn test_string_operators() {
        assert_eq!(exec("\"Hello\" ^= \"He\"", json!({})).unwrap(), Value::Bool(true));
        assert_eq!(exec("\"Hello\" ^~= \"he\"", json!({})).unwrap(), Value::Bool(true));
        assert_eq!(exec("\"Hello\" $= \"lo\"", json!({})).unwrap(), Value::Bool(true));
        assert_eq!(exec("\"Hello\" *= \"ell\"", json!({})).unwrap(), Value::Bool(true));
        assert_eq!(exec("\"Hello\" ~= \"HELLO\"", json!({})).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_in_operator() {
        assert_eq!(exec("2 in [1,2,3]", json!({})).unwrap(), Value::Bool(true));
        assert_eq!(exec("\"A\" ~in [\"a\"]", json!({})).unwrap(), Value::Bool(true));
        assert_eq!(exec("4 not in [1,2,3]", json!({})).unwrap(), Value::Bool(true));
        assert_eq!(exec("\"ell\" in \"hello\"", json!({})).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_matches_either_order() {
        assert_eq!(
            exec("\"test\" matches @^t@", json!({})).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            exec("@^t@ matches \"test\"", json!({})).unwrap(),
            Value::Bool(true)
        );
        assert!(matches!(
            exec("\"a\" matches \"b\"", json!({})),
            Err(EvalError::Type(_))
        ));
    }

    #[test]
    fn test_is_type_checks() {
        assert_eq!(exec("5 is number", json!({})).unwrap(), Value::Bool(true));
        assert_eq!(exec("test is string", json!({})).unwrap(), Value::Bool(true));
        assert_eq!(exec("[] is empty array", json!({})).unwrap(), Value::Bool(true));
        assert_eq!(exec("5 is not string", json!({})).unwrap(), Value::Bool(true));
        assert_eq!(exec("5 !is string", json!({})).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_default_left_sites() {
        assert_eq!(exec_dl(">2", json!({}), Value::from(3i64)).unwrap(), Value::Bool(true));
        assert_eq!(
            exec_dl("+1 = 4", json!({}), Value::from(3i64)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            exec_dl("-  1 = 2", json!({}), Value::from(3i64)).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_default_left_projection() {
        assert_eq!(
            exec_dl("\"a\" | \"b\"", json!({}), Value::from("a")).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            exec_dl("\"b\" | \"c\"", json!({}), Value::from("a")).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_not_against_default_left() {
        assert_eq!(
            exec_dl("!\"b\"", json!({}), Value::from("a")).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            exec_dl("!\"a\"", json!({}), Value::from("a")).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_leading_dot_without_default_left_raises() {
        assert!(matches!(exec(".key", json!({})), Err(EvalError::Type(_))));
        assert_eq!(
            exec_dl(".key = \"value\"", json!({}), Value::from(json!({"key": "value"}))).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_unknowns_are_errors() {
        let expr = parse("mystery", false).unwrap();
        let opts = Options {
            unknowns_are: Some(UnknownsAre::Errors),
            ..Options::default()
        };
        assert!(matches!(
            run(&expr, Vars::empty(), &opts.resolve(), &ExecOptions::default()),
            Err(EvalError::Reference(_))
        ));
    }

    #[test]
    fn test_unknowns_are_null() {
        let expr = parse("mystery", false).unwrap();
        let opts = Options {
            unknowns_are: Some(UnknownsAre::Null),
            ..Options::default()
        };
        assert_eq!(
            run(&expr, Vars::empty(), &opts.resolve(), &ExecOptions::default()).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_debug_sink() {
        use std::cell::RefCell;
        let seen: Rc<RefCell<Vec<(String, Value)>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let opts = Options::default()
            .with_debug_output(move |src, v| sink.borrow_mut().push((src.to_string(), v.clone())));
        let expr = parse("debug x = 2", false).unwrap();
        let result = run(
            &expr,
            Vars::from(json!({"x": 2})),
            &opts.resolve(),
            &ExecOptions::default(),
        )
        .unwrap();
        assert_eq!(result, Value::Bool(true));
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(seen.borrow()[0].0, "x");
        assert_eq!(seen.borrow()[0].1, Value::from(2i64));
    }

    #[test]
    fn test_dynamic_variable_name() {
        assert_eq!(
            exec("$(\"mo\" + \"nth\")", json!({"month": 7})).unwrap(),
            Value::from(7i64)
        );
        assert_eq!(
            exec("${strange name}", json!({"strange name": 1})).unwrap(),
            Value::from(1i64)
        );
    }

    #[test]
    fn test_string_indexing() {
        assert_eq!(exec("\"abc\".1", json!({})).unwrap(), Value::from("b"));
        assert_eq!(exec("\"abc\".length", json!({})).unwrap(), Value::from(3i64));
        assert_eq!(exec("\"\".empty", json!({})).unwrap(), Value::Bool(true));
    }
}
