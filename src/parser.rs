// Conscription parser.
//
// Precedence-layered recursive descent over the character cursor:
// ternary → boolean → comparison → math → value. Each layer slices its
// operands with a bracket-aware `until` over the layer's operator spellings,
// then recurses on the slice, so a value chunk never sees the operators of
// an enclosing layer. Tokens are context-sensitive (identifiers may contain
// spaces, `-` doubles as a number sign, `{}` quotes names and delimits
// function bodies), which is why there is no standalone token stream.

use std::rc::Rc;

use thiserror::Error;

use crate::ast::{CmpOp, Expr, Link, LogicOp, MathOp, PropName, VarName};
use crate::cursor::Cursor;
use crate::value::{RegexValue, Value};

/// Compile-time errors. The parser raises on the first defect; there is no
/// recovery.
#[derive(Error, Debug)]
pub enum SyntaxError {
    #[error("empty conscription")]
    EmptyExpression,

    #[error("missing operand near '{0}'")]
    MissingOperand(String),

    #[error("unterminated ternary: no ':' matching '?'")]
    UnterminatedTernary,

    #[error("unmatched '{0}'")]
    Unterminated(char),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("unterminated regex literal")]
    UnterminatedRegex,

    #[error("regex literals are disabled (enable with allowRegexLiterals)")]
    RegexNotEnabled,

    #[error("invalid regex: {0}")]
    InvalidRegex(String),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("'{0}' is not a valid identifier")]
    InvalidIdentifier(String),

    #[error("unknown operator near '{0}'")]
    UnknownOperator(String),

    #[error("unexpected characters '{0}'")]
    Trailing(String),
}

/// Inherited parse context. Comparison layers inside a ternary are not
/// wrapped with the default-left projection: the predicate must keep its
/// original value for the `?? defaultLeft` rule, and the branches are the
/// ternary's raw results.
#[derive(Clone, Copy, Default)]
struct Ctx {
    in_ternary: bool,
}

/// Identifier character class: alphanumerics, underscore and space.
#[inline]
fn ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == ' '
}

/// Separator spellings per layer. Worded operators carry their surrounding
/// spaces so they only fire on word boundaries; `!`-prefixed word forms
/// carry a trailing space for the same reason.
const TERNARY_SEPS: &[&str] = &["?"];
const BOOLEAN_SEPS: &[&str] = &["&", "|"];
const CMP_SEPS: &[&str] = &[
    " is ", " in ", " ~in ", " not ", " matches ",
    "!is ", "!in ", "!~in ", "!matches ",
    "!^~=", "!$~=", "!*~=", "!~=", "!^=", "!$=", "!*=", "!=",
    "^~=", "$~=", "*~=", "<=", ">=", "<>", "~=", "^=", "$=", "*=",
    "<", ">", "=",
];
const MATH_SEPS: &[&str] = &["+", " before ", " then ", "-", "*", "/", "%", "^"];

/// Symbolic comparison spellings, longest first, with their operators.
const CMP_SYMBOLS: &[(&str, CmpOp)] = &[
    ("^~=", CmpOp::CiStartsWith),
    ("$~=", CmpOp::CiEndsWith),
    ("*~=", CmpOp::CiContains),
    ("<=", CmpOp::Le),
    (">=", CmpOp::Ge),
    ("<>", CmpOp::Ne),
    ("~=", CmpOp::CiEq),
    ("^=", CmpOp::StartsWith),
    ("$=", CmpOp::EndsWith),
    ("*=", CmpOp::Contains),
    ("<", CmpOp::Lt),
    (">", CmpOp::Gt),
    ("=", CmpOp::Eq),
];

/// Symbolic spellings that may follow a `!` negation prefix.
const CMP_NEG_SYMBOLS: &[(&str, CmpOp)] = &[
    ("^~=", CmpOp::CiStartsWith),
    ("$~=", CmpOp::CiEndsWith),
    ("*~=", CmpOp::CiContains),
    ("~=", CmpOp::CiEq),
    ("^=", CmpOp::StartsWith),
    ("$=", CmpOp::EndsWith),
    ("*=", CmpOp::Contains),
    ("=", CmpOp::Eq),
];

/// Comparison word operators that may open a chunk (omitted left operand).
const CMP_LEADING_WORDS: &[&str] = &[
    "is", "in", "~in", "not", "matches", "!is", "!in", "!~in", "!matches",
];

struct Parser {
    allow_regex: bool,
}

/// Parse a conscription into a compiled expression tree.
pub fn parse(source: &str, allow_regex_literals: bool) -> Result<Expr, SyntaxError> {
    let parser = Parser {
        allow_regex: allow_regex_literals,
    };
    let mut cur = Cursor::new(source);
    cur.skip_ws();
    if cur.eof() {
        return Err(SyntaxError::EmptyExpression);
    }
    parser.ternary(&mut cur, Ctx::default())
}

impl Parser {
    /// Parse a complete expression from a sliced substring.
    fn full(&self, text: &str, ctx: Ctx) -> Result<Expr, SyntaxError> {
        let mut cur = Cursor::new(text);
        cur.skip_ws();
        if cur.eof() {
            return Err(SyntaxError::MissingOperand(text.trim().to_string()));
        }
        self.ternary(&mut cur, ctx)
    }

    // ── Grammar layers ───────────────────────────────────────────────────

    /// Split at the first top-level `?`, then its `:`. `A ?: B` falls out of
    /// the same shape with an empty middle slice.
    fn ternary(&self, cur: &mut Cursor, ctx: Ctx) -> Result<Expr, SyntaxError> {
        let mark = cur.mark();
        let cond_txt = cur.until(TERNARY_SEPS);
        if cur.eof() {
            cur.reset(mark);
            return self.boolean(cur, ctx);
        }
        cur.advance(1); // '?'
        let inner = Ctx { in_ternary: true };
        let cond = self.optional_slice(&cond_txt, |p, c| p.boolean(c, inner))?;
        let then_txt = cur.until(&[":"]);
        if cur.eof() {
            return Err(SyntaxError::UnterminatedTernary);
        }
        cur.advance(1); // ':'
        let then = self.optional_slice(&then_txt, |p, c| p.ternary(c, inner))?;
        let otherwise = Box::new(self.ternary(cur, inner)?);
        Ok(Expr::Ternary {
            cond,
            then,
            otherwise,
        })
    }

    fn boolean(&self, cur: &mut Cursor, ctx: Ctx) -> Result<Expr, SyntaxError> {
        let first = cur.until(BOOLEAN_SEPS);
        let mut left = self.layer_operand(&first, cur, "expression", |p, c| p.comparison(c, ctx))?;
        while let Some(op) = cur.consume(BOOLEAN_SEPS, false) {
            let txt = cur.until(BOOLEAN_SEPS);
            if txt.trim().is_empty() {
                return Err(SyntaxError::MissingOperand(op.to_string()));
            }
            let mut sub = Cursor::new(&txt);
            let right = self.comparison(&mut sub, ctx)?;
            left = Expr::Logic {
                op: if op == "&" { LogicOp::And } else { LogicOp::Or },
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn comparison(&self, cur: &mut Cursor, ctx: Ctx) -> Result<Expr, SyntaxError> {
        cur.skip_ws();
        let mut left = if self.at_leading_word(cur, CMP_LEADING_WORDS) {
            Expr::DefaultLeft
        } else {
            let txt = cur.until(CMP_SEPS);
            self.layer_operand(&txt, cur, "comparison", |p, c| p.math(c, ctx))?
        };
        loop {
            cur.skip_ws();
            if cur.eof() {
                break;
            }
            let (op, negated, spelling) = self.cmp_operator(cur)?;
            let txt = cur.until(CMP_SEPS);
            if txt.trim().is_empty() {
                return Err(SyntaxError::MissingOperand(spelling));
            }
            let mut sub = Cursor::new(&txt);
            let right = self.math(&mut sub, ctx)?;
            left = Expr::Cmp {
                op,
                negated,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        if ctx.in_ternary {
            Ok(left)
        } else {
            Ok(Expr::Projected(Box::new(left)))
        }
    }

    fn math(&self, cur: &mut Cursor, ctx: Ctx) -> Result<Expr, SyntaxError> {
        cur.skip_ws();
        let mut left = if self.at_leading_word(cur, &["before", "then"]) {
            Expr::DefaultLeft
        } else {
            let txt = self.math_operand(cur);
            self.layer_operand(&txt, cur, "math", |p, c| p.value(c, ctx))?
        };
        loop {
            cur.skip_ws();
            if cur.eof() {
                break;
            }
            let (op, spelling) = self.math_operator(cur)?;
            let txt = self.math_operand(cur);
            if txt.trim().is_empty() {
                return Err(SyntaxError::MissingOperand(spelling));
            }
            let mut sub = Cursor::new(&txt);
            let right = self.value(&mut sub, ctx)?;
            left = Expr::Math {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// Slice a math operand. A leading `-` is part of the operand when a
    /// number (or infinity) follows; `- ` stays an operator.
    fn math_operand(&self, cur: &mut Cursor) -> String {
        cur.skip_ws();
        let mut prefix = String::new();
        if cur.peek_char() == Some('-')
            && cur
                .peek_at(1)
                .is_some_and(|c| c.is_ascii_digit() || c == '.' || c == 'i' || c == 'I' || c == '∞')
        {
            prefix.push('-');
            cur.advance(1);
        }
        prefix + &cur.until(MATH_SEPS)
    }

    /// Shared initial-operand handling: an empty slice before a pending
    /// operator is a default-left site; an empty slice at the end of the
    /// chunk is a missing operand.
    fn layer_operand(
        &self,
        text: &str,
        cur: &Cursor,
        what: &str,
        rule: impl FnOnce(&Parser, &mut Cursor) -> Result<Expr, SyntaxError>,
    ) -> Result<Expr, SyntaxError> {
        if text.trim().is_empty() {
            if cur.eof() {
                Err(SyntaxError::MissingOperand(what.to_string()))
            } else {
                Ok(Expr::DefaultLeft)
            }
        } else {
            let mut sub = Cursor::new(text);
            rule(self, &mut sub)
        }
    }

    fn optional_slice(
        &self,
        text: &str,
        rule: impl FnOnce(&Parser, &mut Cursor) -> Result<Expr, SyntaxError>,
    ) -> Result<Option<Box<Expr>>, SyntaxError> {
        if text.trim().is_empty() {
            Ok(None)
        } else {
            let mut cur = Cursor::new(text);
            Ok(Some(Box::new(rule(self, &mut cur)?)))
        }
    }

    // ── Operator recognition ─────────────────────────────────────────────

    /// Is a word operator (needing a following boundary) at the cursor?
    fn at_leading_word(&self, cur: &Cursor, words: &[&str]) -> bool {
        words.iter().any(|w| {
            cur.at(w)
                && cur
                    .peek_at(w.chars().count())
                    .map_or(true, char::is_whitespace)
        })
    }

    /// Consume a word operator plus its trailing boundary requirement.
    fn consume_word(&self, cur: &mut Cursor, word: &str) -> bool {
        let mark = cur.mark();
        if cur.consume(&[word], false).is_some() {
            if cur.peek_char().map_or(true, char::is_whitespace) {
                return true;
            }
            cur.reset(mark);
        }
        false
    }

    fn cmp_operator(&self, cur: &mut Cursor) -> Result<(CmpOp, bool, String), SyntaxError> {
        cur.skip_ws();
        if self.consume_word(cur, "is") {
            let mark = cur.mark();
            cur.skip_ws();
            if self.consume_word(cur, "not") {
                return Ok((CmpOp::Is, true, "is not".to_string()));
            }
            cur.reset(mark);
            return Ok((CmpOp::Is, false, "is".to_string()));
        }
        if self.consume_word(cur, "not") {
            cur.skip_ws();
            if self.consume_word(cur, "~in") {
                return Ok((CmpOp::CiIn, true, "not ~in".to_string()));
            }
            if self.consume_word(cur, "in") {
                return Ok((CmpOp::In, true, "not in".to_string()));
            }
            return Err(SyntaxError::UnknownOperator(format!("not {}", cur.peek(8))));
        }
        if self.consume_word(cur, "in") {
            return Ok((CmpOp::In, false, "in".to_string()));
        }
        if self.consume_word(cur, "~in") {
            return Ok((CmpOp::CiIn, false, "~in".to_string()));
        }
        if self.consume_word(cur, "matches") {
            return Ok((CmpOp::Matches, false, "matches".to_string()));
        }
        if cur.peek_char() == Some('!') {
            let mark = cur.mark();
            cur.advance(1);
            if self.consume_word(cur, "is") {
                return Ok((CmpOp::Is, true, "!is".to_string()));
            }
            if self.consume_word(cur, "~in") {
                return Ok((CmpOp::CiIn, true, "!~in".to_string()));
            }
            if self.consume_word(cur, "in") {
                return Ok((CmpOp::In, true, "!in".to_string()));
            }
            if self.consume_word(cur, "matches") {
                return Ok((CmpOp::Matches, true, "!matches".to_string()));
            }
            for (sym, op) in CMP_NEG_SYMBOLS {
                if cur.consume(&[*sym], false).is_some() {
                    return Ok((*op, true, format!("!{}", sym)));
                }
            }
            cur.reset(mark);
            return Err(SyntaxError::UnknownOperator(cur.peek(8)));
        }
        for (sym, op) in CMP_SYMBOLS {
            if cur.consume(&[*sym], false).is_some() {
                return Ok((*op, false, (*sym).to_string()));
            }
        }
        Err(SyntaxError::UnknownOperator(cur.peek(8)))
    }

    fn math_operator(&self, cur: &mut Cursor) -> Result<(MathOp, String), SyntaxError> {
        cur.skip_ws();
        if self.consume_word(cur, "before") {
            return Ok((MathOp::Before, "before".to_string()));
        }
        if self.consume_word(cur, "then") {
            return Ok((MathOp::Then, "then".to_string()));
        }
        let op = match cur.consume(&["+", "-", "*", "/", "%", "^"], false) {
            Some("+") => MathOp::Add,
            Some("-") => MathOp::Sub,
            Some("*") => MathOp::Mul,
            Some("/") => MathOp::Div,
            Some("%") => MathOp::Rem,
            Some("^") => MathOp::Pow,
            _ => return Err(SyntaxError::UnknownOperator(cur.peek(8))),
        };
        let spelling = match op {
            MathOp::Add => "+",
            MathOp::Sub => "-",
            MathOp::Mul => "*",
            MathOp::Div => "/",
            MathOp::Rem => "%",
            MathOp::Pow => "^",
            _ => unreachable!(),
        };
        Ok((op, spelling.to_string()))
    }

    // ── Value layer ──────────────────────────────────────────────────────

    fn value(&self, cur: &mut Cursor, ctx: Ctx) -> Result<Expr, SyntaxError> {
        cur.skip_ws();
        let Some(c) = cur.peek_char() else {
            return Err(SyntaxError::MissingOperand("value".to_string()));
        };
        let head = match c {
            '(' => {
                cur.advance(1);
                self.paren_or_function(cur, ctx)?
            }
            '!' => {
                cur.advance(1);
                // NOT applies to the remainder of the chunk as a value
                return Ok(Expr::Not(Box::new(self.value(cur, ctx)?)));
            }
            '$' => {
                cur.advance(1);
                self.var_ref(cur, ctx)?
            }
            '[' => {
                cur.advance(1);
                let inner = self.bracket(cur, '[', ']')?;
                Expr::ArrayLit(self.list(&inner, ctx)?)
            }
            '@' => return self.regex_literal(cur),
            '"' | '\'' => {
                cur.advance(1);
                Expr::Literal(Value::from(self.string_literal(cur, c)?))
            }
            // leading '.' chains on the default-left, unless it opens a
            // number literal like `.5`
            '.' if !cur.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => Expr::DefaultLeft,
            _ => {
                if self.at_leading_word(cur, &["debug"]) {
                    return self.debug_value(cur, ctx);
                }
                if let Some(kw) = self.keyword(cur) {
                    return self.finish(cur, kw);
                }
                if self.at_number(cur) {
                    let n = self.number_literal(cur)?;
                    return self.finish(cur, n);
                }
                self.fallback_head(cur)?
            }
        };
        let chained = self.chain(cur, head, ctx)?;
        self.finish(cur, chained)
    }

    /// A value chunk admits no trailing characters after its expression.
    fn finish(&self, cur: &mut Cursor, expr: Expr) -> Result<Expr, SyntaxError> {
        cur.skip_ws();
        if cur.eof() {
            Ok(expr)
        } else {
            Err(SyntaxError::Trailing(cur.rest()))
        }
    }

    /// `(expr)` or `(params){body}`.
    fn paren_or_function(&self, cur: &mut Cursor, ctx: Ctx) -> Result<Expr, SyntaxError> {
        let inner = self.bracket(cur, '(', ')')?;
        if cur.peek_char() == Some('{') {
            cur.advance(1);
            let body_txt = self.bracket(cur, '{', '}')?;
            let params = self.params(&inner)?;
            let body = self.full(&body_txt, Ctx::default())?;
            Ok(Expr::FuncLit {
                params: Rc::new(params),
                body: Rc::new(body),
            })
        } else {
            self.full(&inner, ctx)
        }
    }

    /// `$name`, `${literal name}` or `$(dynamic)`.
    fn var_ref(&self, cur: &mut Cursor, ctx: Ctx) -> Result<Expr, SyntaxError> {
        let name = match cur.peek_char() {
            Some('{') => {
                cur.advance(1);
                let raw = self.bracket(cur, '{', '}')?;
                VarName::Literal(unescape(&raw).trim().to_string())
            }
            Some('(') => {
                cur.advance(1);
                let raw = self.bracket(cur, '(', ')')?;
                VarName::Dynamic(Box::new(self.full(&raw, ctx)?))
            }
            _ => {
                let run = cur.consume_while(ident_char);
                let trimmed = run.trim();
                if trimmed.is_empty() {
                    return Err(SyntaxError::InvalidIdentifier("$".to_string()));
                }
                VarName::Literal(trimmed.to_string())
            }
        };
        Ok(Expr::Var(name))
    }

    /// `debug <rest>`: capture the remainder as source text and compile it
    /// as a value.
    fn debug_value(&self, cur: &mut Cursor, ctx: Ctx) -> Result<Expr, SyntaxError> {
        cur.consume(&["debug"], false);
        cur.skip_ws();
        let source = cur.rest().trim_end().to_string();
        if source.is_empty() {
            return Err(SyntaxError::MissingOperand("debug".to_string()));
        }
        let mut sub = Cursor::new(&source);
        let inner = self.value(&mut sub, ctx)?;
        cur.advance(source.chars().count());
        self.finish(cur, Expr::Debug {
            source,
            inner: Box::new(inner),
        })
    }

    /// `true`, `false`, `null`, `infinity`, `-infinity` (case-insensitive,
    /// also `∞` / `-∞`). Keywords only stand alone in their chunk; anything
    /// following makes the text an identifier instead.
    fn keyword(&self, cur: &mut Cursor) -> Option<Expr> {
        const KEYWORDS: &[&str] = &[
            "true", "false", "null", "-infinity", "infinity", "-∞", "∞",
        ];
        for lit in KEYWORDS {
            let mark = cur.mark();
            if cur.consume(&[*lit], true).is_some() {
                cur.skip_ws();
                if cur.eof() {
                    let value = match *lit {
                        "true" => Value::Bool(true),
                        "false" => Value::Bool(false),
                        "null" => Value::Null,
                        "-infinity" | "-∞" => Value::Number(f64::NEG_INFINITY),
                        _ => Value::Number(f64::INFINITY),
                    };
                    return Some(Expr::Literal(value));
                }
                cur.reset(mark);
            }
        }
        None
    }

    fn at_number(&self, cur: &Cursor) -> bool {
        let mut i = 0;
        if cur.peek_at(i) == Some('-') {
            i += 1;
        }
        if cur.peek_at(i) == Some('.') {
            i += 1;
        }
        cur.peek_at(i).is_some_and(|c| c.is_ascii_digit())
    }

    fn number_literal(&self, cur: &mut Cursor) -> Result<Expr, SyntaxError> {
        let mut text = String::new();
        if cur.peek_char() == Some('-') {
            text.push('-');
            cur.advance(1);
        }
        text += &cur.consume_while(|c| c.is_ascii_digit() || c == '.');
        if text.matches('.').count() > 1 {
            return Err(SyntaxError::InvalidNumber(text));
        }
        match text.parse::<f64>() {
            Ok(n) => Ok(Expr::Literal(Value::Number(n))),
            Err(_) => Err(SyntaxError::InvalidNumber(text)),
        }
    }

    /// Fallback rule: everything up to the next `(` or `.` is an identifier
    /// head — `{…}`-quoted or a bare alphanumeric/underscore/space run.
    fn fallback_head(&self, cur: &mut Cursor) -> Result<Expr, SyntaxError> {
        if cur.peek_char() == Some('{') {
            cur.advance(1);
            let raw = self.bracket(cur, '{', '}')?;
            return Ok(Expr::Ident(unescape(&raw).trim().to_string()));
        }
        let head = cur.until(&["(", "."]);
        let name = head.trim();
        if name.is_empty() || !name.chars().all(ident_char) {
            return Err(SyntaxError::InvalidIdentifier(name.to_string()));
        }
        Ok(Expr::Ident(name.to_string()))
    }

    /// Parse any sequence of `.prop` and `(args)` links after a head value.
    fn chain(&self, cur: &mut Cursor, head: Expr, ctx: Ctx) -> Result<Expr, SyntaxError> {
        let mut links = Vec::new();
        loop {
            cur.skip_ws();
            match cur.peek_char() {
                Some('.') => {
                    cur.advance(1);
                    cur.skip_ws();
                    let name = match cur.peek_char() {
                        Some('{') => {
                            cur.advance(1);
                            let raw = self.bracket(cur, '{', '}')?;
                            PropName::Literal(unescape(&raw).trim().to_string())
                        }
                        Some('(') => {
                            cur.advance(1);
                            let raw = self.bracket(cur, '(', ')')?;
                            PropName::Dynamic(Box::new(self.full(&raw, ctx)?))
                        }
                        _ => {
                            let run = cur.consume_while(ident_char);
                            let trimmed = run.trim();
                            if trimmed.is_empty() {
                                return Err(SyntaxError::InvalidIdentifier(".".to_string()));
                            }
                            PropName::Literal(trimmed.to_string())
                        }
                    };
                    links.push(Link::Prop(name));
                }
                Some('(') => {
                    cur.advance(1);
                    let inner = self.bracket(cur, '(', ')')?;
                    links.push(Link::Call(self.list(&inner, ctx)?));
                }
                _ => break,
            }
        }
        if links.is_empty() {
            Ok(head)
        } else {
            Ok(Expr::Chain {
                head: Box::new(head),
                links,
            })
        }
    }

    /// Comma-separated expression list (array literals, call arguments).
    fn list(&self, text: &str, ctx: Ctx) -> Result<Vec<Expr>, SyntaxError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let mut cur = Cursor::new(text);
        let mut items = Vec::new();
        loop {
            let item = cur.until(&[","]);
            items.push(self.full(&item, ctx)?);
            if cur.eof() {
                break;
            }
            cur.advance(1); // ','
        }
        Ok(items)
    }

    /// Parameter list of a function literal: list evaluation disabled, each
    /// name stripped to its identifier characters.
    fn params(&self, text: &str) -> Result<Vec<String>, SyntaxError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let mut cur = Cursor::new(text);
        let mut names = Vec::new();
        loop {
            let raw = cur.until(&[","]);
            let name: String = raw
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            if name.is_empty() {
                return Err(SyntaxError::InvalidIdentifier(raw.trim().to_string()));
            }
            names.push(name);
            if cur.eof() {
                break;
            }
            cur.advance(1);
        }
        Ok(names)
    }

    fn regex_literal(&self, cur: &mut Cursor) -> Result<Expr, SyntaxError> {
        if !self.allow_regex {
            return Err(SyntaxError::RegexNotEnabled);
        }
        cur.advance(1); // '@'
        let mut pattern = String::new();
        loop {
            match cur.peek_char() {
                None => return Err(SyntaxError::UnterminatedRegex),
                Some('\\') => {
                    cur.advance(1);
                    match cur.peek_char() {
                        None => return Err(SyntaxError::UnterminatedRegex),
                        // \@ unescapes; every other escape stays for the engine
                        Some('@') => pattern.push('@'),
                        Some(other) => {
                            pattern.push('\\');
                            pattern.push(other);
                        }
                    }
                    cur.advance(1);
                }
                Some('@') => {
                    cur.advance(1);
                    break;
                }
                Some(other) => {
                    pattern.push(other);
                    cur.advance(1);
                }
            }
        }
        let flags = cur.consume_while(|c| "gimsuy".contains(c));
        let regex = RegexValue::new(&pattern, &flags)
            .map_err(|e| SyntaxError::InvalidRegex(e.to_string()))?;
        self.finish(cur, Expr::Literal(Value::Regex(Rc::new(regex))))
    }

    fn string_literal(&self, cur: &mut Cursor, quote: char) -> Result<String, SyntaxError> {
        let mut result = String::new();
        loop {
            match cur.peek_char() {
                None => return Err(SyntaxError::UnterminatedString),
                Some('\\') => {
                    cur.advance(1);
                    match cur.peek_char() {
                        None => return Err(SyntaxError::UnterminatedString),
                        Some('n') => result.push('\n'),
                        Some('r') => result.push('\r'),
                        Some('t') => result.push('\t'),
                        Some(other) => result.push(other),
                    }
                    cur.advance(1);
                }
                Some(c) if c == quote => {
                    cur.advance(1);
                    return Ok(result);
                }
                Some(c) => {
                    result.push(c);
                    cur.advance(1);
                }
            }
        }
    }

    /// `through_end` plus the unmatched-bracket error.
    fn bracket(&self, cur: &mut Cursor, open: char, close: char) -> Result<String, SyntaxError> {
        cur.through_end(open, close)
            .ok_or(SyntaxError::Unterminated(open))
    }
}

/// Strip `\` escapes from a `{…}`-quoted name.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
