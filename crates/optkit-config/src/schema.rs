//! Schema providers declare the sections and typed options a store starts
//! from, before any config file is applied.
//!
//! [`TomlSchema`] reads a document like:
//!
//! ```toml
//! [window.options.width]
//! type = "int"
//! default = 800
//! min = 1
//!
//! [window.compound.bindings]
//! columns = [
//!     { prefix = "binding_", type = "string" },
//!     { prefix = "repeat_", type = "bool", default = false },
//! ]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use optkit_core::{BoundedValue, Color, OptionValue, ValueKind};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::compound::{CompoundEntry, CompoundOption};
use crate::option::{AnyOption, OptionCell, OptionHandle};
use crate::section::Section;

/// Source of the sections a configuration is built on.
pub trait SchemaProvider {
    fn sections(&self) -> Result<Vec<Section>>;
}

#[derive(Debug, Deserialize)]
struct OptionSchema {
    #[serde(rename = "type")]
    kind: String,
    default: Option<toml::Value>,
    min: Option<toml::Value>,
    max: Option<toml::Value>,
}

#[derive(Debug, Deserialize)]
struct ColumnSchema {
    prefix: String,
    #[serde(rename = "type")]
    kind: String,
    default: Option<toml::Value>,
}

#[derive(Debug, Deserialize)]
struct CompoundSchema {
    columns: Vec<ColumnSchema>,
    #[serde(default)]
    plain: bool,
}

#[derive(Debug, Default, Deserialize)]
struct SectionSchema {
    #[serde(default)]
    options: BTreeMap<String, OptionSchema>,
    #[serde(default)]
    compound: BTreeMap<String, CompoundSchema>,
}

/// Option schema read from a TOML document.
#[derive(Debug, Default)]
pub struct TomlSchema {
    sections: BTreeMap<String, SectionSchema>,
}

impl TomlSchema {
    pub fn parse(text: &str) -> Result<Self> {
        let sections = toml::from_str(text).context("Failed to parse option schema")?;
        Ok(Self { sections })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema file: {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid schema file: {}", path.display()))
    }
}

/// TOML scalars become their config-text form; strings are taken verbatim.
fn value_text(value: &toml::Value) -> String {
    match value {
        toml::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn parse_field<T: OptionValue>(field: &str, value: &toml::Value) -> Result<T, String> {
    let text = value_text(value);
    T::parse_value(&text).ok_or_else(|| format!("invalid {field} '{text}' for type {}", T::kind()))
}

fn default_for<T: OptionValue + Default>(schema: &OptionSchema) -> Result<T, String> {
    match &schema.default {
        Some(value) => parse_field("default", value),
        None => Ok(T::default()),
    }
}

fn unbounded_option<T: OptionValue + Default>(
    name: &str,
    schema: &OptionSchema,
) -> Result<OptionHandle, String> {
    Ok(Rc::new(OptionCell::new(name, default_for::<T>(schema)?)))
}

fn bounded_option<T: BoundedValue + Default>(
    name: &str,
    schema: &OptionSchema,
) -> Result<OptionHandle, String> {
    let cell = OptionCell::new(name, default_for::<T>(schema)?);
    if let Some(min) = &schema.min {
        cell.set_minimum(parse_field("min", min)?);
    }
    if let Some(max) = &schema.max {
        cell.set_maximum(parse_field("max", max)?);
    }
    Ok(Rc::new(cell))
}

fn build_option(name: &str, schema: &OptionSchema) -> Result<OptionHandle, String> {
    let kind: ValueKind = schema.kind.parse()?;
    if !kind.is_ordered() && (schema.min.is_some() || schema.max.is_some()) {
        return Err(format!("type {kind} does not support min/max"));
    }
    match kind {
        ValueKind::Int => bounded_option::<i32>(name, schema),
        ValueKind::Double => bounded_option::<f64>(name, schema),
        ValueKind::Bool => unbounded_option::<bool>(name, schema),
        ValueKind::String => unbounded_option::<String>(name, schema),
        ValueKind::Color => unbounded_option::<Color>(name, schema),
    }
}

fn build_compound(name: &str, schema: &CompoundSchema) -> Result<OptionHandle, String> {
    if schema.columns.is_empty() {
        return Err("a list option needs at least one column".to_string());
    }

    let mut entries = Vec::with_capacity(schema.columns.len());
    for column in &schema.columns {
        if column.prefix.is_empty() {
            return Err("column prefix must not be empty".to_string());
        }
        let kind: ValueKind = column.kind.parse()?;
        let mut entry = CompoundEntry::for_kind(kind, column.prefix.clone());
        if let Some(default) = &column.default {
            let text = value_text(default);
            if !entry.is_parsable(&text) {
                return Err(format!(
                    "invalid default '{text}' for column '{}' of type {kind}",
                    column.prefix
                ));
            }
            entry = entry.with_default(text);
        }
        entries.push(entry);
    }

    let compound = if schema.plain {
        CompoundOption::new_plain(name, entries)
    } else {
        CompoundOption::new(name, entries)
    };
    Ok(Rc::new(compound))
}

fn add_declared(section: &mut Section, name: &str, built: Result<OptionHandle, String>) {
    let option = match built {
        Ok(option) => option,
        Err(reason) => {
            warn!("Skipping schema option {}/{}: {}", section.name(), name, reason);
            return;
        }
    };
    option.set_schema_defined(true);
    if let Err(err) = section.register_new_option(option) {
        warn!("Skipping schema option {}/{}: {}", section.name(), name, err);
    }
}

impl SchemaProvider for TomlSchema {
    fn sections(&self) -> Result<Vec<Section>> {
        let mut sections = Vec::with_capacity(self.sections.len());
        for (section_name, schema) in &self.sections {
            let mut section = Section::new(section_name.clone());
            for (name, option) in &schema.options {
                add_declared(&mut section, name, build_option(name, option));
            }
            for (name, compound) in &schema.compound {
                add_declared(&mut section, name, build_compound(name, compound));
            }
            debug!(
                section = %section_name,
                options = section.len(),
                "Loaded schema section"
            );
            sections.push(section);
        }
        Ok(sections)
    }
}
