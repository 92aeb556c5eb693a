use crate::runtime::error::CoralError;
use crate::runtime::interop::{native_fn, NativeOutcome};
use crate::runtime::value::{slice_bounds, Value};

/// Built-in methods on string values. Each call site gets a fresh native
/// function bound to the receiver text.
pub fn member(text: &str, name: &str) -> Result<Value, CoralError> {
    match name {
        "length" => {
            let receiver = text.to_string();
            Ok(native_fn("length", move |_, _| {
                Ok(NativeOutcome::Value(Value::Int(
                    receiver.chars().count() as i64
                )))
            }))
        }
        "format" => {
            let receiver = text.to_string();
            Ok(native_fn("format", move |_, args| {
                Ok(NativeOutcome::Value(Value::Str(format_template(
                    &receiver, &args,
                ))))
            }))
        }
        _ => Err(CoralError::arg(format!(
            "String values have no member '{}'",
            name
        ))),
    }
}

/// Replaces `{0}`, `{1}`, ... placeholders with the rendered arguments.
fn format_template(template: &str, args: &[Value]) -> String {
    let mut out = template.to_string();
    for (idx, arg) in args.iter().enumerate() {
        out = out.replace(&format!("{{{}}}", idx), &arg.coerce_string());
    }
    out
}

/// Indexing yields a one-character string; positions count characters.
pub fn index(text: &str, index: i64) -> Result<Value, CoralError> {
    if index < 0 {
        return Err(CoralError::arg(format!(
            "String index {} out of range",
            index
        )));
    }
    match text.chars().nth(index as usize) {
        Some(ch) => Ok(Value::Str(ch.to_string())),
        None => Err(CoralError::arg(format!(
            "String index {} out of range",
            index
        ))),
    }
}

pub fn slice(text: &str, begin: Option<i64>, end: Option<i64>) -> Value {
    let chars: Vec<char> = text.chars().collect();
    let (begin, end) = slice_bounds(chars.len(), begin, end);
    Value::Str(chars[begin..end].iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_substitutes_positional_placeholders() {
        assert_eq!(
            format_template("{0} and {1} and {0}", &[Value::Int(1), Value::str("x")]),
            "1 and x and 1"
        );
    }

    #[test]
    fn index_is_character_based() {
        assert!(matches!(index("héllo", 1), Ok(Value::Str(s)) if s == "é"));
        assert!(index("ab", 2).is_err());
        assert!(index("ab", -1).is_err());
    }

    #[test]
    fn slice_follows_list_rules() {
        assert!(matches!(slice("hello", None, Some(-1)), Value::Str(s) if s == "hell"));
        assert!(matches!(slice("hello", Some(10), None), Value::Str(s) if s.is_empty()));
    }
}
