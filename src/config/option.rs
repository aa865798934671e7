//! Field option grammar: `name[:param[:param...]]` tokens joined by `|`.
//!
//! `"string:120|unique|min:3"` parses to `string(120)`, `unique()`, `min(3)`.
//! Parsing never fails; whether the names and parameter counts make sense is
//! decided by the validator against the option registries.

/// Parsed option names with their raw positional parameters, in first-seen order.
///
/// A name appears at most once. When the same name is given twice, the later
/// parameters replace the earlier ones and the option keeps its first position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldOptions {
    entries: Vec<(String, Vec<String>)>,
}

impl FieldOptions {
    pub fn insert(&mut self, name: String, params: Vec<String>) {
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = params,
            None => self.entries.push((name, params)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(n, p)| (n.as_str(), p.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse one field specification string. Blank input yields an empty set.
pub fn parse_field(spec: &str) -> FieldOptions {
    let mut options = FieldOptions::default();
    if spec.trim().is_empty() {
        return options;
    }
    for token in spec.split('|') {
        let mut parts = token.split(':').map(str::trim);
        let name = parts.next().unwrap_or_default().to_string();
        let params = parts.map(str::to_string).collect();
        options.insert(name, params);
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_params() {
        let options = parse_field("string:120|unique|one-to-one:users:id");
        assert_eq!(options.len(), 3);
        assert_eq!(options.get("string"), Some(&["120".to_string()][..]));
        assert_eq!(options.get("unique"), Some(&[][..]));
        assert_eq!(
            options.get("one-to-one"),
            Some(&["users".to_string(), "id".to_string()][..])
        );
    }

    #[test]
    fn blank_spec_is_empty() {
        assert!(parse_field("").is_empty());
        assert!(parse_field("   ").is_empty());
    }

    #[test]
    fn later_duplicate_overwrites_and_keeps_position() {
        let options = parse_field("min:1|string|min:4");
        let names: Vec<&str> = options.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["min", "string"]);
        assert_eq!(options.get("min"), Some(&["4".to_string()][..]));
    }

    #[test]
    fn empty_token_is_kept_as_empty_name() {
        let options = parse_field("string||unique");
        assert!(options.contains(""));
        assert_eq!(options.len(), 3);
    }
}
