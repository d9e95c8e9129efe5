// Built-in type-predicate vocabulary for `is` / `is not`.
//
// The descriptor string is opaque to the core: the host can replace this
// wholesale through `Options::type_check`. The default vocabulary covers the
// primitive type names, the `empty` modifier and the regex class name.

use std::rc::Rc;

use crate::value::Value;

/// Host-suppliable type-predicate service: `check(value, descriptor)`.
pub type TypeCheck = Rc<dyn Fn(&Value, &str) -> bool>;

/// Evaluate a type descriptor against a value. Unknown descriptors are
/// `false`, never an error.
pub fn check(value: &Value, descriptor: &str) -> bool {
    let descriptor = descriptor.trim().to_lowercase();
    if descriptor == "empty" {
        return is_empty(value);
    }
    if let Some(base) = descriptor.strip_prefix("empty ") {
        return check_base(value, base.trim()) && is_empty(value);
    }
    check_base(value, &descriptor)
}

fn check_base(value: &Value, name: &str) -> bool {
    match name {
        "null" => value.is_null() || value.is_undefined(),
        "boolean" | "bool" => value.is_bool(),
        "number" => value.is_number(),
        "int" => value
            .as_f64()
            .is_some_and(|n| n.is_finite() && n.fract() == 0.0),
        "float" => value.as_f64().is_some_and(f64::is_finite),
        "string" => value.is_string(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "function" => value.is_function(),
        "regex" | "regexp" => value.is_regex(),
        _ => false,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null | Value::Undefined => true,
        Value::String(s) => s.is_empty(),
        Value::Array(arr) => arr.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_names() {
        assert!(check(&Value::from(5i64), "number"));
        assert!(check(&Value::from(5i64), "int"));
        assert!(check(&Value::from(5.5), "float"));
        assert!(!check(&Value::from(5.5), "int"));
        assert!(check(&Value::from("x"), "string"));
        assert!(check(&Value::Bool(true), "boolean"));
        assert!(check(&Value::Null, "null"));
        assert!(check(&Value::array(vec![]), "array"));
        assert!(!check(&Value::array(vec![]), "object"));
    }

    #[test]
    fn test_empty_modifier() {
        assert!(check(&Value::array(vec![]), "empty array"));
        assert!(!check(&Value::array(vec![Value::Null]), "empty array"));
        assert!(check(&Value::from(""), "empty string"));
        assert!(check(&Value::from(""), "empty"));
        assert!(!check(&Value::from("x"), "empty"));
    }

    #[test]
    fn test_case_insensitive_descriptors() {
        assert!(check(&Value::from(1i64), "Number"));
        let regex = crate::value::RegexValue::new(".", "").unwrap();
        assert!(check(&Value::Regex(Rc::new(regex)), "RegExp"));
    }

    #[test]
    fn test_unknown_descriptor_is_false() {
        assert!(!check(&Value::from(1i64), "Date"));
    }
}
