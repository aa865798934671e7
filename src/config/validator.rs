//! Field descriptor validation: option names and parameter counts against the
//! registries, then exactly one type option.

use crate::config::option::{parse_field, FieldOptions};
use crate::config::registry::{ParamKind, Registries};
use crate::config::resolved::{
    ExpectedKind, FieldDescriptor, FieldOption, FieldType, ForeignRef, LinkTable, Param, RelationKind,
};
use crate::error::{DescriptorError, DescriptorErrorKind};
use serde_json::Value;

/// Parse and validate one field specification of `table`.
pub fn build_field(
    registries: &Registries,
    table: &str,
    field: &str,
    spec: &str,
) -> Result<FieldDescriptor, Vec<DescriptorError>> {
    let options = parse_field(spec);
    validate_field(registries, table, field, &options)
}

/// Validate a parsed option set. Every error is reported, not just the first.
pub fn validate_field(
    registries: &Registries,
    table: &str,
    field: &str,
    options: &FieldOptions,
) -> Result<FieldDescriptor, Vec<DescriptorError>> {
    if options.is_empty() {
        return Err(vec![DescriptorError::field(field, DescriptorErrorKind::NoOptions)]);
    }

    let mut errors = Vec::new();
    let mut resolved = Vec::with_capacity(options.len());
    let mut types = Vec::new();

    for (name, raw) in options.iter() {
        let Some(spec) = registries.lookup(name) else {
            errors.push(DescriptorError::option(field, name, DescriptorErrorKind::UnknownOption));
            continue;
        };
        if raw.len() < spec.min_params() {
            errors.push(DescriptorError::option(
                field,
                name,
                DescriptorErrorKind::TooFewParams {
                    min: spec.min_params(),
                    found: raw.len(),
                },
            ));
            continue;
        }
        if raw.len() > spec.max_params() {
            errors.push(DescriptorError::option(
                field,
                name,
                DescriptorErrorKind::TooManyParams {
                    max: spec.max_params(),
                    found: raw.len(),
                },
            ));
            continue;
        }
        if registries.is_type(name) {
            types.push(name.to_string());
        }
        let params = raw
            .iter()
            .enumerate()
            .map(|(i, p)| resolve_param(spec.param_kind(i), p))
            .collect();
        resolved.push(FieldOption {
            name: name.to_string(),
            params,
        });
    }

    // Bad-count type options are still types for the cardinality rule.
    for (name, _) in options.iter() {
        if registries.is_type(name) && !types.iter().any(|t| t == name) {
            types.push(name.to_string());
        }
    }

    match types.len() {
        0 => errors.push(DescriptorError::field(field, DescriptorErrorKind::NoType)),
        1 => {}
        _ => errors.push(DescriptorError::field(
            field,
            DescriptorErrorKind::TooManyTypes { types: types.clone() },
        )),
    }

    if !errors.is_empty() {
        for e in &errors {
            tracing::error!(table = %table, field = %field, error = %e, "invalid field descriptor");
        }
        return Err(errors.into_iter().map(|e| e.in_table(table)).collect());
    }

    let type_name = types.remove(0);
    let Some(field_type) = FieldType::from_option(&type_name) else {
        return Err(vec![DescriptorError::option(field, &type_name, DescriptorErrorKind::UnknownOption).in_table(table)]);
    };
    let type_params = resolved
        .iter()
        .find(|o| o.name == type_name)
        .map(|o| o.params.clone())
        .unwrap_or_default();

    let text = |name: &str, index: usize| -> Option<String> {
        resolved
            .iter()
            .find(|o| o.name == name)
            .and_then(|o| o.params.get(index))
            .and_then(Param::as_str)
            .map(str::to_string)
    };

    let relation = match field_type {
        FieldType::OneToMany => match (text("one-to-many", 0), text("one-to-many", 1)) {
            (Some(target), Some(join)) => Some(RelationKind::OneToMany { table: target, field: join }),
            _ => None,
        },
        FieldType::ManyToMany => text("many-to-many", 0).map(|target| RelationKind::ManyToMany {
            link: LinkTable::between(table, &target),
            field: text("many-to-many", 1),
            table: target,
        }),
        _ => match (text("one-to-one", 0), text("one-to-one", 1)) {
            (Some(target), Some(target_field)) => Some(RelationKind::OneToOne {
                table: target,
                field: target_field,
                alias: text("as", 0),
            }),
            _ => None,
        },
    };

    let foreign = match (&relation, text("foreign", 0)) {
        (Some(RelationKind::OneToOne { table, field, .. }), _) => Some(ForeignRef {
            table: table.clone(),
            field: Some(field.clone()),
        }),
        (_, Some(target)) => Some(ForeignRef {
            table: target,
            field: None,
        }),
        _ => None,
    };

    let expected = text("type", 0).map(|k| ExpectedKind::parse(&k));
    let default = text("default", 0).map(|literal| typed_default(field_type, &literal));

    Ok(FieldDescriptor {
        name: field.to_string(),
        options: resolved,
        field_type,
        type_params,
        relation,
        foreign,
        expected,
        default,
    })
}

fn resolve_param(kind: ParamKind, raw: &str) -> Param {
    match kind {
        ParamKind::Integer => Param::Integer(leading_integer(raw)),
        ParamKind::Text => Param::Text(raw.to_string()),
    }
}

/// Leading optionally-signed digits of `raw`, 0 when there are none.
/// Out-of-range values saturate at the `i64` bounds.
fn leading_integer(raw: &str) -> i64 {
    let s = raw.trim_start();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| {
            let d = i64::from(d - b'0');
            if negative {
                acc.saturating_mul(10).saturating_sub(d)
            } else {
                acc.saturating_mul(10).saturating_add(d)
            }
        })
}

fn typed_default(field_type: FieldType, literal: &str) -> Value {
    match field_type {
        FieldType::Integer | FieldType::Increments => literal
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(literal.to_string())),
        FieldType::Float => literal
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(literal.to_string())),
        FieldType::Boolean => match literal.to_ascii_lowercase().as_str() {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => Value::String(literal.to_string()),
        },
        _ => Value::String(literal.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(spec: &str) -> Result<FieldDescriptor, Vec<DescriptorError>> {
        build_field(&Registries::STANDARD, "posts", "field", spec)
    }

    fn kinds(errors: &[DescriptorError]) -> Vec<&'static str> {
        errors.iter().map(|e| e.kind.tag()).collect()
    }

    #[test]
    fn single_type_resolves_and_normalizes() {
        for (spec, name) in [
            ("int", "integer"),
            ("bool|nullable", "boolean"),
            ("string:40|unique|min:2|max:40", "string"),
            ("uuid|primary", "uuid"),
            ("datetime|index", "datetime"),
            ("increments", "increments"),
            ("one-to-many:comments:post_id", "one-to-many"),
            ("many-to-many:tags", "many-to-many"),
        ] {
            let field = build(spec).unwrap_or_else(|e| panic!("{spec}: {e:?}"));
            assert_eq!(field.field_type.name(), name, "{spec}");
        }
    }

    #[test]
    fn type_params_come_from_type_option() {
        let field = build("string:120|max:80").unwrap();
        assert_eq!(field.type_params, vec![Param::Integer(120)]);
        assert_eq!(field.string_length(), Some(120));
        assert_eq!(field.max(), Some(80));
    }

    #[test]
    fn zero_types_is_one_no_type_error() {
        let errors = build("unique|nullable").unwrap_err();
        assert_eq!(kinds(&errors), vec!["error-no-type"]);
        assert_eq!(errors[0].table.as_deref(), Some("posts"));
    }

    #[test]
    fn two_types_is_one_too_many_types_error() {
        let errors = build("string|integer|unique").unwrap_err();
        assert_eq!(kinds(&errors), vec!["error-too-many-types"]);
    }

    #[test]
    fn empty_spec_reports_no_options() {
        let errors = build("  ").unwrap_err();
        assert_eq!(kinds(&errors), vec!["error-no-options"]);
    }

    #[test]
    fn unknown_option_names_field_and_option() {
        let errors = build("string|cascade").unwrap_err();
        assert_eq!(kinds(&errors), vec!["error-unknown-option"]);
        assert_eq!(errors[0].field.as_deref(), Some("field"));
        assert_eq!(errors[0].option.as_deref(), Some("cascade"));
    }

    #[test]
    fn parameter_bounds() {
        let errors = build("string|min").unwrap_err();
        assert_eq!(
            errors[0].kind,
            DescriptorErrorKind::TooFewParams { min: 1, found: 0 }
        );
        let errors = build("string:1:2").unwrap_err();
        assert_eq!(
            errors[0].kind,
            DescriptorErrorKind::TooManyParams { max: 1, found: 2 }
        );
        let errors = build("uuid|one-to-one:users").unwrap_err();
        assert_eq!(kinds(&errors), vec!["error-too-few-params"]);
    }

    #[test]
    fn one_to_one_with_alias_is_a_foreign_relation() {
        let field = build("uuid|one-to-one:users:id|as:author").unwrap();
        assert_eq!(
            field.relation,
            Some(RelationKind::OneToOne {
                table: "users".into(),
                field: "id".into(),
                alias: Some("author".into()),
            })
        );
        assert_eq!(field.alias(), Some("author"));
        assert_eq!(
            field.foreign,
            Some(ForeignRef {
                table: "users".into(),
                field: Some("id".into())
            })
        );
    }

    #[test]
    fn many_to_many_derives_link_table() {
        let field = build("many-to-many:tags").unwrap();
        match field.relation {
            Some(RelationKind::ManyToMany { table, field, link }) => {
                assert_eq!(table, "tags");
                assert_eq!(field, None);
                assert_eq!(link.table, "posts_tags_link");
                assert_eq!(link.source_column, "posts_id");
                assert_eq!(link.target_column, "tags_id");
            }
            other => panic!("unexpected relation {other:?}"),
        }
    }

    #[test]
    fn numeric_params_resolve_once() {
        let field = build("integer|min:5abc|max:x").unwrap();
        assert_eq!(field.min(), Some(5));
        assert_eq!(field.max(), Some(0));
        assert_eq!(leading_integer(" -12"), -12);
    }

    #[test]
    fn oversized_params_saturate() {
        let field = build("integer|min:99999999999999999999").unwrap();
        assert_eq!(field.min(), Some(i64::MAX));
        assert_eq!(leading_integer("-99999999999999999999"), i64::MIN);
        assert_eq!(leading_integer("9223372036854775807"), i64::MAX);
    }

    #[test]
    fn defaults_follow_field_type() {
        assert_eq!(build("integer|default:7").unwrap().default, Some(Value::from(7)));
        assert_eq!(build("boolean|default:true").unwrap().default, Some(Value::Bool(true)));
        assert_eq!(
            build("string|default:draft").unwrap().default,
            Some(Value::String("draft".into()))
        );
    }

    #[test]
    fn type_option_sets_expected_kind() {
        let field = build("text|type:array").unwrap();
        assert_eq!(field.expected, Some(ExpectedKind::Array));
    }
}
