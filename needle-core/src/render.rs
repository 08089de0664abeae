//! Minimal placeholder rendering for embedded text templates.
//!
//! Templates contain `{{Name}}` placeholders; rendering substitutes each
//! from the supplied bindings. Rendering is pure: identical input yields
//! identical bytes. A placeholder with no binding is a compiler error,
//! as is a binding syntax the template cannot hold.

use crate::error::{NeedleError, NeedleResult};

/// A named, embedded template.
#[derive(Debug, Clone, Copy)]
pub struct Template {
    name: &'static str,
    text: &'static str,
}

impl Template {
    pub const fn new(name: &'static str, text: &'static str) -> Template {
        Template { name, text }
    }

    /// Substitute every `{{Name}}` placeholder from `vars`.
    pub fn render(&self, vars: &[(&str, &str)]) -> NeedleResult<String> {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                return Err(NeedleError::Compiler(format!(
                    "template {}: unterminated placeholder",
                    self.name
                )));
            };
            let key = &after[..end];
            if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(NeedleError::Compiler(format!(
                    "template {}: malformed placeholder {{{{{}}}}}",
                    self.name, key
                )));
            }
            match vars.iter().find(|(k, _)| *k == key) {
                Some((_, v)) => out.push_str(v),
                None => {
                    return Err(NeedleError::Compiler(format!(
                        "template {}: unknown placeholder {{{{{}}}}}",
                        self.name, key
                    )))
                }
            }
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes() {
        let t = Template::new("t", "hello {{Name}}, {{Name}} and {{Other}}");
        let got = t.render(&[("Name", "a"), ("Other", "b")]).unwrap();
        assert_eq!(got, "hello a, a and b");
    }

    #[test]
    fn test_unknown_placeholder_is_compiler_error() {
        let t = Template::new("t", "{{Missing}}");
        let err = t.render(&[("Name", "a")]).unwrap_err();
        assert!(err.to_string().starts_with("[CompilerError]"), "{}", err);
    }

    #[test]
    fn test_render_is_deterministic() {
        let t = Template::new("t", "a {{X}} b {{Y}} c");
        let vars = [("X", "1"), ("Y", "2")];
        assert_eq!(t.render(&vars).unwrap(), t.render(&vars).unwrap());
    }

    #[test]
    fn test_unterminated_placeholder_rejected() {
        let t = Template::new("t", "a {{X");
        assert!(t.render(&[("X", "1")]).is_err());
    }
}
