// Compile- and exec-time options.
//
// Field names on the wire are the surface-stable spellings
// (`allowRegexLiterals`, `safeNav`, `unknownsAre`, ...), so option blocks can
// be loaded straight from JSON config. Callbacks (`debugOutput`,
// `typeCheck`) are programmatic-only.

use std::rc::Rc;

use serde::Deserialize;

use crate::typecheck::TypeCheck;
use crate::value::Value;

/// Sink for the `debug` operator: receives the captured source text and the
/// value it produced.
pub type DebugSink = Rc<dyn Fn(&str, &Value)>;

/// Routing policy for identifiers with no binding under `vars`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum UnknownsAre {
    /// Unresolved identifiers become string values — this is what makes
    /// unquoted string literals (`test is string`) work.
    #[default]
    #[serde(rename = "strings", alias = "str")]
    Strings,
    #[serde(rename = "null")]
    Null,
    #[serde(rename = "errors", alias = "err")]
    Errors,
}

/// Options applied to every evaluation of a compiled conscription.
///
/// All fields are optional so that per-call options can merge over the
/// factory's global options field by field. `safe` is a shortcut that
/// defaults `safeCall`, `safeNav` and `safeOp` at once; the individual
/// flags still win when set.
#[derive(Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    pub allow_regex_literals: Option<bool>,
    pub safe: Option<bool>,
    pub safe_call: Option<bool>,
    pub safe_nav: Option<bool>,
    pub safe_op: Option<bool>,
    pub unknowns_are: Option<UnknownsAre>,
    /// Sink for the `debug` operator. Default: discard.
    #[serde(skip)]
    pub debug_output: Option<DebugSink>,
    /// Type-predicate service backing `is` / `is not`. Default: the built-in
    /// vocabulary of [`crate::typecheck`].
    #[serde(skip)]
    pub type_check: Option<TypeCheck>,
}

impl Options {
    pub fn new() -> Self {
        Options::default()
    }

    /// Merge `self` (per-call) over `base` (global): any field set here wins.
    pub fn merged_over(&self, base: &Options) -> Options {
        Options {
            allow_regex_literals: self.allow_regex_literals.or(base.allow_regex_literals),
            safe: self.safe.or(base.safe),
            safe_call: self.safe_call.or(base.safe_call),
            safe_nav: self.safe_nav.or(base.safe_nav),
            safe_op: self.safe_op.or(base.safe_op),
            unknowns_are: self.unknowns_are.or(base.unknowns_are),
            debug_output: self.debug_output.clone().or_else(|| base.debug_output.clone()),
            type_check: self.type_check.clone().or_else(|| base.type_check.clone()),
        }
    }

    pub(crate) fn resolve(&self) -> ResolvedOptions {
        let safe = self.safe.unwrap_or(false);
        ResolvedOptions {
            allow_regex_literals: self.allow_regex_literals.unwrap_or(false),
            safe_call: self.safe_call.unwrap_or(safe),
            safe_nav: self.safe_nav.unwrap_or(safe),
            safe_op: self.safe_op.unwrap_or(safe),
            unknowns_are: self.unknowns_are.unwrap_or_default(),
            debug_output: self.debug_output.clone(),
            type_check: self.type_check.clone(),
        }
    }

    /// Install a `debug` sink.
    pub fn with_debug_output(mut self, sink: impl Fn(&str, &Value) + 'static) -> Self {
        self.debug_output = Some(Rc::new(sink));
        self
    }

    /// Install a host type-predicate service for `is` / `is not`.
    pub fn with_type_check(mut self, check: impl Fn(&Value, &str) -> bool + 'static) -> Self {
        self.type_check = Some(Rc::new(check));
        self
    }
}

/// Fully-defaulted option set stored on a compiled conscription.
#[derive(Clone)]
pub(crate) struct ResolvedOptions {
    pub allow_regex_literals: bool,
    pub safe_call: bool,
    pub safe_nav: bool,
    pub safe_op: bool,
    pub unknowns_are: UnknownsAre,
    pub debug_output: Option<DebugSink>,
    pub type_check: Option<TypeCheck>,
}

/// Per-evaluation options.
#[derive(Clone, Default)]
pub struct ExecOptions {
    /// Value standing in for omitted left operands and leading `.` chains.
    pub default_left: Option<Value>,
}

impl ExecOptions {
    pub fn default_left(value: impl Into<Value>) -> Self {
        ExecOptions {
            default_left: Some(value.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_safe_shortcut() {
        let opts = Options {
            safe: Some(true),
            ..Options::default()
        };
        let resolved = opts.resolve();
        assert!(resolved.safe_call && resolved.safe_nav && resolved.safe_op);
    }

    #[test]
    fn test_individual_flag_wins_over_shortcut() {
        let opts = Options {
            safe: Some(true),
            safe_nav: Some(false),
            ..Options::default()
        };
        let resolved = opts.resolve();
        assert!(resolved.safe_call);
        assert!(!resolved.safe_nav);
    }

    #[test]
    fn test_merge_per_call_over_global() {
        let global = Options {
            allow_regex_literals: Some(true),
            unknowns_are: Some(UnknownsAre::Errors),
            ..Options::default()
        };
        let per_call = Options {
            unknowns_are: Some(UnknownsAre::Null),
            ..Options::default()
        };
        let merged = per_call.merged_over(&global);
        assert_eq!(merged.allow_regex_literals, Some(true));
        assert_eq!(merged.unknowns_are, Some(UnknownsAre::Null));
    }

    #[test]
    fn test_deserialize_surface_names() {
        let opts: Options = serde_json::from_value(json!({
            "allowRegexLiterals": true,
            "safeNav": true,
            "unknownsAre": "err"
        }))
        .unwrap();
        assert_eq!(opts.allow_regex_literals, Some(true));
        assert_eq!(opts.safe_nav, Some(true));
        assert_eq!(opts.unknowns_are, Some(UnknownsAre::Errors));

        let opts: Options = serde_json::from_value(json!({"unknownsAre": "strings"})).unwrap();
        assert_eq!(opts.unknowns_are, Some(UnknownsAre::Strings));
    }
}
