//! Option registries: every recognized option name with its parameter shape.
//!
//! The registries are immutable process-wide constants. Callers pass
//! [`Registries::STANDARD`] (or their own set) by reference into each build.

/// Whether an option names the field's storage/relation type or modifies it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionClass {
    Type,
    Modifier,
}

/// How a positional parameter is resolved when the descriptor is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    /// Whole number; non-numeric text resolves to its leading integer, or 0.
    Integer,
    /// Free text (table, field and kind names, literals).
    Text,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OptionSpec {
    pub name: &'static str,
    pub class: OptionClass,
    pub mandatory: &'static [ParamKind],
    pub optional: &'static [ParamKind],
}

impl OptionSpec {
    const fn new(
        name: &'static str,
        class: OptionClass,
        mandatory: &'static [ParamKind],
        optional: &'static [ParamKind],
    ) -> Self {
        OptionSpec {
            name,
            class,
            mandatory,
            optional,
        }
    }

    pub fn min_params(&self) -> usize {
        self.mandatory.len()
    }

    pub fn max_params(&self) -> usize {
        self.mandatory.len() + self.optional.len()
    }

    pub fn param_kind(&self, index: usize) -> ParamKind {
        self.mandatory
            .iter()
            .chain(self.optional.iter())
            .nth(index)
            .copied()
            .unwrap_or(ParamKind::Text)
    }
}

use OptionClass::{Modifier, Type};
use ParamKind::{Integer, Text};

/// uuid: identifier, generated when primary. string: optional length.
/// int/integer, bool/boolean: aliases normalized on resolution.
/// increments: auto-increment integer key.
/// one-to-many:table:field lists records of `table` whose `field` is our key.
/// many-to-many:table[:field] links through `<source>_<table>_link`.
pub const TYPE_OPTIONS: &[OptionSpec] = &[
    OptionSpec::new("uuid", Type, &[], &[]),
    OptionSpec::new("string", Type, &[], &[Integer]),
    OptionSpec::new("int", Type, &[], &[]),
    OptionSpec::new("integer", Type, &[], &[]),
    OptionSpec::new("text", Type, &[], &[]),
    OptionSpec::new("date", Type, &[], &[]),
    OptionSpec::new("datetime", Type, &[], &[]),
    OptionSpec::new("increments", Type, &[], &[]),
    OptionSpec::new("float", Type, &[], &[]),
    OptionSpec::new("bool", Type, &[], &[]),
    OptionSpec::new("boolean", Type, &[], &[]),
    OptionSpec::new("one-to-many", Type, &[Text, Text], &[]),
    OptionSpec::new("many-to-many", Type, &[Text], &[Text]),
];

/// one-to-one:table:field binds a record of another table through this column;
/// `as:name` exposes the bound record under `name`. `foreign:table` checks
/// the value against the primary key of `table`.
pub const MODIFIER_OPTIONS: &[OptionSpec] = &[
    OptionSpec::new("unique", Modifier, &[], &[]),
    OptionSpec::new("default", Modifier, &[Text], &[]),
    OptionSpec::new("min", Modifier, &[Integer], &[]),
    OptionSpec::new("max", Modifier, &[Integer], &[]),
    OptionSpec::new("nullable", Modifier, &[], &[]),
    OptionSpec::new("primary", Modifier, &[], &[]),
    OptionSpec::new("required", Modifier, &[], &[]),
    OptionSpec::new("type", Modifier, &[Text], &[]),
    OptionSpec::new("one-to-one", Modifier, &[Text, Text], &[]),
    OptionSpec::new("foreign", Modifier, &[Text], &[]),
    OptionSpec::new("as", Modifier, &[Text], &[]),
    OptionSpec::new("omit", Modifier, &[], &[]),
    OptionSpec::new("index", Modifier, &[], &[]),
];

#[derive(Clone, Copy, Debug)]
pub struct Registries {
    pub types: &'static [OptionSpec],
    pub modifiers: &'static [OptionSpec],
}

impl Registries {
    pub const STANDARD: Registries = Registries {
        types: TYPE_OPTIONS,
        modifiers: MODIFIER_OPTIONS,
    };

    /// Modifiers are consulted first, then types.
    pub fn lookup(&self, name: &str) -> Option<&'static OptionSpec> {
        self.modifiers
            .iter()
            .chain(self.types.iter())
            .find(|spec| spec.name == name)
    }

    pub fn is_type(&self, name: &str) -> bool {
        self.types.iter().any(|spec| spec.name == name)
    }
}

impl Default for Registries {
    fn default() -> Self {
        Registries::STANDARD
    }
}
