//! Message templating: `{variable}` substitution.
//!
//! Consumes the mapping produced by a store's `variables` extractor.
//! Unknown placeholders are left intact so a misconfigured message stays
//! visibly broken instead of silently losing text.

use std::collections::BTreeMap;

/// Replace every `{key}` occurrence in `input` with the mapped value.
#[must_use]
pub fn render(variables: &BTreeMap<String, String>, input: &str) -> String {
    if variables.is_empty() {
        return input.to_string();
    }

    let mut result = input.to_string();
    for (key, value) in variables {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn substitutes_known_keys() {
        let vars = vars(&[("bank.name", "First Coffer"), ("bank.loans.size", "2")]);
        assert_eq!(
            render(&vars, "{bank.name} holds {bank.loans.size} loans"),
            "First Coffer holds 2 loans"
        );
    }

    #[test]
    fn unknown_keys_are_left_intact() {
        let vars = vars(&[("bank.name", "First Coffer")]);
        assert_eq!(
            render(&vars, "{bank.name} / {bank.missing}"),
            "First Coffer / {bank.missing}"
        );
    }

    #[test]
    fn empty_mapping_returns_input() {
        assert_eq!(render(&BTreeMap::new(), "{anything}"), "{anything}");
    }

    #[test]
    fn repeated_placeholders_all_replaced() {
        let vars = vars(&[("x", "7")]);
        assert_eq!(render(&vars, "{x}+{x}={x}{x}"), "7+7=77");
    }
}
