/// Replace `${ENV_VAR}` placeholders in raw config text.
///
/// Placeholders whose variable is unset (or malformed, missing the closing
/// brace) are emitted verbatim so the parse error points at the original
/// text.
pub fn substitute_env(input: &str) -> String {
    substitute_with(input, |name| std::env::var(name).ok())
}

fn substitute_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    },
                }
                rest = &after[end + 1..];
            },
            _ => {
                // No closing brace (or empty name): keep the rest literal.
                out.push_str(&rest[start..]);
                return out;
            },
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_env(name: &str) -> Option<String> {
        (name == "PROPWIRE_TOKEN").then(|| "tok123".to_string())
    }

    #[test]
    fn substitutes_known_var() {
        assert_eq!(
            substitute_with("token=${PROPWIRE_TOKEN}", fake_env),
            "token=tok123"
        );
    }

    #[test]
    fn leaves_unknown_var() {
        assert_eq!(
            substitute_with("${PROPWIRE_NONEXISTENT_XYZ}", fake_env),
            "${PROPWIRE_NONEXISTENT_XYZ}"
        );
    }

    #[test]
    fn substitutes_multiple_occurrences() {
        assert_eq!(
            substitute_with("${PROPWIRE_TOKEN} and ${PROPWIRE_TOKEN}", fake_env),
            "tok123 and tok123"
        );
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        assert_eq!(substitute_with("key=${OOPS", fake_env), "key=${OOPS");
    }

    #[test]
    fn no_placeholders() {
        assert_eq!(substitute_with("plain text", fake_env), "plain text");
    }
}
