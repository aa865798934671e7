//! Naming rules derived from table names: PascalCase display names, default
//! API endpoints, and many-to-many link tables.

/// Convert a snake_case table name to PascalCase.
/// e.g. "blog_post" -> "BlogPost", "user" -> "User"
pub fn to_pascal_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut capitalize_next = true;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            out.extend(c.to_uppercase());
            capitalize_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Endpoint used when a table's `api` section names none: the lower-cased
/// PascalCase name, e.g. "blog_post" -> "blogpost".
pub fn default_endpoint(table: &str) -> String {
    to_pascal_case(table).to_lowercase()
}

/// Link table of a many-to-many relation, e.g. ("posts", "tags") -> "posts_tags_link".
pub fn link_table_name(source: &str, target: &str) -> String {
    format!("{}_{}_link", source, target)
}

/// Join column pointing at `table` inside a link table, e.g. "posts" -> "posts_id".
pub fn join_column(table: &str) -> String {
    format!("{}_id", table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pascal_case() {
        assert_eq!(to_pascal_case("blog_post"), "BlogPost");
        assert_eq!(to_pascal_case("user"), "User");
        assert_eq!(to_pascal_case("a__b"), "AB");
    }

    #[test]
    fn endpoint_defaults_to_lowercased_pascal() {
        assert_eq!(default_endpoint("blog_post"), "blogpost");
    }

    #[test]
    fn link_naming() {
        assert_eq!(link_table_name("posts", "tags"), "posts_tags_link");
        assert_eq!(join_column("tags"), "tags_id");
    }
}
