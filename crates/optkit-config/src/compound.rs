//! List-valued options synthesized from prefix-named flat options.
//!
//! A compound option declares columns as `(prefix, type, default)`. In a
//! section holding `hey_k1 = 1` and `bey_k1 = 1.2`, columns `hey_` and `bey_`
//! produce the row `["k1", "1", "1.2"]`: the first element is the row key
//! (the suffix shared by all flat names), followed by one string per column.

use std::any::TypeId;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use optkit_core::{Color, OptionValue, ValueKind};
use tracing::{error, warn};

use crate::option::{AnyOption, OptionBase, OptionHandle};
use crate::section::Section;

/// Untyped rows: `[key, column_0, column_1, ...]`.
pub type CompoundRows = Vec<Vec<String>>;

fn parses_as<T: OptionValue>(text: &str) -> bool {
    T::parse_value(text).is_some()
}

/// One declared column of a compound option.
#[derive(Debug, Clone)]
pub struct CompoundEntry {
    prefix: String,
    kind: ValueKind,
    type_id: TypeId,
    default: Option<String>,
    validate: fn(&str) -> bool,
}

impl CompoundEntry {
    pub fn new<T: OptionValue>(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            kind: T::kind(),
            type_id: TypeId::of::<T>(),
            default: None,
            validate: parses_as::<T>,
        }
    }

    /// Column for a kind known only at runtime (e.g. from a schema).
    pub fn for_kind(kind: ValueKind, prefix: impl Into<String>) -> Self {
        match kind {
            ValueKind::Int => Self::new::<i32>(prefix),
            ValueKind::Double => Self::new::<f64>(prefix),
            ValueKind::Bool => Self::new::<bool>(prefix),
            ValueKind::String => Self::new::<String>(prefix),
            ValueKind::Color => Self::new::<Color>(prefix),
        }
    }

    /// Value used when a row has no (valid) option for this column.
    ///
    /// A default that does not parse as the column type is ignored.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        let default = default.into();
        if self.is_parsable(&default) {
            self.default = Some(default);
        } else {
            warn!(
                prefix = %self.prefix,
                kind = %self.kind,
                "Ignoring invalid default '{}' for list column",
                default
            );
        }
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn is_parsable(&self, text: &str) -> bool {
        (self.validate)(text)
    }
}

/// A tuple of column values, used for the typed view of a compound option.
pub trait CompoundRow: Sized {
    fn column_types() -> Vec<TypeId>;
    fn from_columns(columns: &[String]) -> Option<Self>;
    fn to_columns(&self) -> Vec<String>;
}

macro_rules! impl_compound_row {
    ($($t:ident => $idx:tt),+) => {
        impl<$($t: OptionValue),+> CompoundRow for ($($t,)+) {
            fn column_types() -> Vec<TypeId> {
                vec![$(TypeId::of::<$t>()),+]
            }

            fn from_columns(columns: &[String]) -> Option<Self> {
                if columns.len() != Self::column_types().len() {
                    return None;
                }
                Some(($(<$t as OptionValue>::parse_value(&columns[$idx])?,)+))
            }

            fn to_columns(&self) -> Vec<String> {
                vec![$(self.$idx.format_value()),+]
            }
        }
    };
}

impl_compound_row!(A => 0);
impl_compound_row!(A => 0, B => 1);
impl_compound_row!(A => 0, B => 1, C => 2);
impl_compound_row!(A => 0, B => 1, C => 2, D => 3);
impl_compound_row!(A => 0, B => 1, C => 2, D => 3, E => 4);
impl_compound_row!(A => 0, B => 1, C => 2, D => 3, E => 4, F => 5);

/// Row keys made only of digits sort numerically and come first.
fn row_key_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// An option whose value is a list of rows built from flat options.
pub struct CompoundOption {
    base: OptionBase,
    entries: Vec<CompoundEntry>,
    value: RefCell<CompoundRows>,
    plain: bool,
}

impl CompoundOption {
    pub fn new(name: impl Into<String>, entries: Vec<CompoundEntry>) -> Self {
        Self {
            base: OptionBase::new(name),
            entries,
            value: RefCell::new(Vec::new()),
            plain: false,
        }
    }

    /// A list without meaningful row keys.
    ///
    /// Whatever suffixes the file used, rows are renumbered `0, 1, ...` in
    /// row order on every update, so only the column values carry meaning.
    pub fn new_plain(name: impl Into<String>, entries: Vec<CompoundEntry>) -> Self {
        Self {
            plain: true,
            ..Self::new(name, entries)
        }
    }

    pub fn entries(&self) -> &[CompoundEntry] {
        &self.entries
    }

    pub fn is_plain(&self) -> bool {
        self.plain
    }

    pub fn get_value_untyped(&self) -> CompoundRows {
        self.value.borrow().clone()
    }

    fn is_valid_row(&self, row: &[String]) -> bool {
        row.len() == self.entries.len() + 1
            && self
                .entries
                .iter()
                .zip(&row[1..])
                .all(|(entry, value)| entry.is_parsable(value))
    }

    fn positional(&self, mut rows: CompoundRows) -> CompoundRows {
        if self.plain {
            for (index, row) in rows.iter_mut().enumerate() {
                row[0] = index.to_string();
            }
        }
        rows
    }

    /// Replace all rows. Every row is validated first; if any has the wrong
    /// width or a column that does not parse, nothing changes and `false`
    /// is returned. Plain lists replace the given keys with positions.
    pub fn set_value_untyped(&self, rows: CompoundRows) -> bool {
        if !rows.iter().all(|row| self.is_valid_row(row)) {
            return false;
        }
        let rows = self.positional(rows);
        let changed = {
            let mut current = self.value.borrow_mut();
            if *current == rows {
                false
            } else {
                *current = rows;
                true
            }
        };
        if changed {
            self.base.mark_changed();
        }
        true
    }

    fn types_match<R: CompoundRow>(&self) -> bool {
        let declared: Vec<TypeId> = self.entries.iter().map(|e| e.type_id).collect();
        R::column_types() == declared
    }

    /// Typed rows as `(key, tuple)`. `None` if `R` does not match the
    /// declared column types.
    pub fn get_value<R: CompoundRow>(&self) -> Option<Vec<(String, R)>> {
        if !self.types_match::<R>() {
            return None;
        }
        self.value
            .borrow()
            .iter()
            .map(|row| Some((row[0].clone(), R::from_columns(&row[1..])?)))
            .collect()
    }

    pub fn set_value<R: CompoundRow>(&self, rows: Vec<(String, R)>) -> bool {
        if !self.types_match::<R>() {
            return false;
        }
        let untyped = rows
            .into_iter()
            .map(|(key, tuple)| {
                let mut row = vec![key];
                row.extend(tuple.to_columns());
                row
            })
            .collect();
        self.set_value_untyped(untyped)
    }

    /// Typed rows without their keys.
    pub fn get_value_simple<R: CompoundRow>(&self) -> Option<Vec<R>> {
        self.get_value::<R>()
            .map(|rows| rows.into_iter().map(|(_, tuple)| tuple).collect())
    }

    /// Replace all rows, keyed by position.
    pub fn set_value_simple<R: CompoundRow>(&self, rows: Vec<R>) -> bool {
        let keyed = rows
            .into_iter()
            .enumerate()
            .map(|(index, tuple)| (index.to_string(), tuple))
            .collect();
        self.set_value(keyed)
    }

    /// The flat `prefix + key = value` pairs representing the current rows.
    pub fn expand(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for row in self.value.borrow().iter() {
            for (entry, value) in self.entries.iter().zip(&row[1..]) {
                pairs.push((format!("{}{}", entry.prefix, row[0]), value.clone()));
            }
        }
        pairs
    }

    /// Whether `name` starts with any declared column prefix.
    pub fn owns_name(&self, name: &str) -> bool {
        self.entries.iter().any(|e| name.starts_with(e.prefix.as_str()))
    }

    /// Rebuild all rows from the flat options of `section`.
    ///
    /// Only options supplied by the last parse and not declared by a schema
    /// take part. Each such name is assigned to its longest matching prefix;
    /// the remainder is the row key. A row is kept only if every column
    /// resolves to a parsable option value or to the column default.
    pub fn update_from_section(&self, section: &Section) {
        let is_candidate = |opt: &OptionHandle| {
            opt.as_compound().is_none() && opt.is_in_config_file() && !opt.is_schema_defined()
        };

        let mut by_specificity: Vec<&str> = self.entries.iter().map(|e| e.prefix()).collect();
        by_specificity.sort_by_key(|prefix| std::cmp::Reverse(prefix.len()));

        let mut keys: Vec<String> = Vec::new();
        for opt in section.options().filter(|opt| is_candidate(*opt)) {
            let name = opt.name();
            if let Some(prefix) = by_specificity.iter().find(|p| name.starts_with(**p)) {
                keys.push(name[prefix.len()..].to_string());
            }
        }
        keys.sort_by(|a, b| row_key_order(a, b));
        keys.dedup();

        let mut rows = CompoundRows::new();
        'rows: for key in keys {
            let mut row = vec![key.clone()];
            for entry in &self.entries {
                let full_name = format!("{}{}", entry.prefix, key);
                let from_file = section
                    .get_option_or(&full_name)
                    .filter(|opt| is_candidate(opt))
                    .map(|opt| opt.get_value_str());

                if let Some(value) = &from_file {
                    if entry.is_parsable(value) {
                        row.push(value.clone());
                        continue;
                    }
                    error!(
                        "Failed parsing option {}/{} as part of the list option {}/{}",
                        section.name(),
                        full_name,
                        section.name(),
                        self.name()
                    );
                }

                match entry.default_value() {
                    Some(default) => row.push(default.to_string()),
                    None => {
                        error!(
                            "Dropping entry '{}' of the list option {}/{}: missing value for {}",
                            key,
                            section.name(),
                            self.name(),
                            full_name
                        );
                        continue 'rows;
                    }
                }
            }
            rows.push(row);
        }

        self.set_value_untyped(rows);
    }
}

impl AnyOption for CompoundOption {
    fn base(&self) -> &OptionBase {
        &self.base
    }

    fn kind_name(&self) -> &'static str {
        "compound"
    }

    /// Compound values come only from their section's flat options.
    fn set_value_str(&self, _text: &str) -> bool {
        false
    }

    fn get_value_str(&self) -> String {
        String::new()
    }

    fn reset_to_default(&self) {
        self.set_value_untyped(Vec::new());
    }

    fn set_default_value_str(&self, _text: &str) -> bool {
        false
    }

    fn get_default_value_str(&self) -> String {
        String::new()
    }

    fn clone_option(&self) -> OptionHandle {
        Rc::new(Self {
            base: self.base.detached_copy(),
            entries: self.entries.clone(),
            value: RefCell::new(self.get_value_untyped()),
            plain: self.plain,
        })
    }

    fn as_compound(&self) -> Option<&CompoundOption> {
        Some(self)
    }
}

#[cfg(test)]
#[path = "compound_tests.rs"]
mod tests;
