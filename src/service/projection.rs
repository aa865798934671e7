//! Entity -> output map.

use crate::config::RelationKind;
use crate::entity::{Entity, Related};
use serde_json::{Map, Value};

/// Output representation of `entity`: stored values, hydrated relations in
/// place of their keys, `omit` fields removed.
pub fn project(entity: &Entity) -> Map<String, Value> {
    let table = entity.table();
    let mut out = entity.values().clone();

    for (field, relation) in table.relation_fields() {
        match relation {
            RelationKind::OneToOne { alias: Some(alias), .. } => {
                out.remove(&field.name);
                if let Some(related) = entity.related(alias) {
                    out.insert(alias.clone(), project_related(related));
                }
            }
            RelationKind::OneToOne { alias: None, .. } => {}
            RelationKind::OneToMany { .. } | RelationKind::ManyToMany { .. } => {
                if let Some(related) = entity.related(&field.name) {
                    out.insert(field.name.clone(), project_related(related));
                }
            }
        }
    }

    for field in table.fields.iter().filter(|f| f.is_omitted()) {
        out.remove(&field.name);
    }
    out
}

fn project_related(related: &Related) -> Value {
    match related {
        Related::One(Some(child)) => Value::Object(project(child)),
        Related::One(None) => Value::Null,
        Related::Many(children) => Value::Array(
            children
                .iter()
                .map(|c| Value::Object(project(c)))
                .collect(),
        ),
    }
}
