//! Positional message templates.
//!
//! Holes are `{0}`, `{1}`, ... (by index) or `{Name}` (bound to parameters in
//! order of appearance). `{{` and `}}` render literal braces. A hole with no
//! matching parameter is left verbatim.

use crate::value::{format_value, Value};

/// Substitute `parameters` into `template`.
pub fn format_template(template: &str, parameters: &[Value]) -> String {
    if parameters.is_empty() && !template.contains(['{', '}']) {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len());
    let mut named_position = 0usize;
    let mut rest = template;

    while let Some(at) = rest.find(['{', '}']) {
        out.push_str(&rest[..at]);
        let tail = &rest[at..];

        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
        } else if tail.starts_with('{') {
            match tail.find('}') {
                Some(end) => {
                    let hole = &tail[1..end];
                    let name = hole.split([',', ':']).next().unwrap_or(hole).trim();
                    let index = match name.parse::<usize>() {
                        Ok(index) => Some(index),
                        Err(_) if is_identifier(name) => {
                            named_position += 1;
                            Some(named_position - 1)
                        }
                        Err(_) => None,
                    };
                    match index.and_then(|i| parameters.get(i)) {
                        Some(value) => out.push_str(&format_value(value)),
                        None => out.push_str(&tail[..=end]),
                    }
                    rest = &tail[end + 1..];
                }
                None => {
                    out.push_str(tail);
                    rest = "";
                }
            }
        } else {
            out.push('}');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

fn is_identifier(name: &str) -> bool {
    let name = name.trim_start_matches(['@', '$']);
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexed_holes() {
        let params = [Value::from("a"), Value::from(2)];
        assert_eq!(format_template("{1} then {0}", &params), "2 then a");
    }

    #[test]
    fn named_holes_bind_in_order() {
        let params = [Value::from("bob"), Value::from(3)];
        assert_eq!(
            format_template("user {User} has {Count} items", &params),
            "user bob has 3 items"
        );
    }

    #[test]
    fn escapes_and_missing_parameters() {
        assert_eq!(format_template("{{literal}} {0}", &[]), "{literal} {0}");
        assert_eq!(format_template("no holes", &[Value::from(1)]), "no holes");
        assert_eq!(format_template("open { brace", &[Value::from(1)]), "open { brace");
    }

    #[test]
    fn format_specifiers_are_ignored() {
        assert_eq!(format_template("{0:N2}", &[Value::from(1.5)]), "1.5");
    }
}
