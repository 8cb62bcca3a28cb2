use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use optkit_config::{
    AnyOption, CompoundOption, ConfigStore, OptionHandle, ParseReport, Section, TomlSchema,
    build_configuration, save_to_string, try_load_from_file, try_save_to_file,
};
use optkit_core::OutputFormat;
use serde_json::{Map, Value, json};
use tracing::debug;

/// Where a command reads its configuration from.
pub(crate) struct Target {
    pub file: PathBuf,
    pub schema: TomlSchema,
    pub sysconf: Option<PathBuf>,
}

pub(crate) fn default_config_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "optkit")
        .context("Failed to determine config directory")?;
    Ok(dirs.config_dir().join("config.ini"))
}

/// Schema and system defaults, then the config file if there is one.
fn open(target: &Target) -> Result<(ConfigStore, Option<ParseReport>)> {
    let mut store = build_configuration(&target.schema, target.sysconf.as_deref(), None)?;
    if !target.file.exists() {
        debug!(path = %target.file.display(), "Config file does not exist yet");
        return Ok((store, None));
    }
    let report = try_load_from_file(&mut store, &target.file)?;
    Ok((store, Some(report)))
}

fn rows_json(compound: &CompoundOption) -> Value {
    let rows = compound
        .get_value_untyped()
        .into_iter()
        .map(|row| {
            let mut object = Map::new();
            object.insert("key".to_string(), Value::String(row[0].clone()));
            for (entry, value) in compound.entries().iter().zip(&row[1..]) {
                object.insert(entry.prefix().to_string(), Value::String(value.clone()));
            }
            Value::Object(object)
        })
        .collect();
    Value::Array(rows)
}

/// Flat options that only exist as the expansion of a list option.
fn is_list_member(section: &Section, option: &OptionHandle) -> bool {
    if option.as_compound().is_some() || option.is_schema_defined() {
        return false;
    }
    section.options().any(|other| {
        other
            .as_compound()
            .is_some_and(|compound| compound.owns_name(option.name()))
    })
}

pub(crate) fn handle_get(target: &Target, path: &str, format: OutputFormat) -> Result<()> {
    let (store, _) = open(target)?;
    let option = store.find_option(path)?;

    match (format, option.as_compound()) {
        (OutputFormat::Json, Some(compound)) => {
            let body = json!({ "path": path, "type": "compound", "rows": rows_json(compound) });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        (OutputFormat::Json, None) => {
            let body = json!({
                "path": path,
                "type": option.kind_name(),
                "value": option.get_value_str(),
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        (OutputFormat::Text, Some(compound)) => {
            for (name, value) in compound.expand() {
                println!("{name} = {value}");
            }
        }
        (OutputFormat::Text, None) => println!("{}", option.get_value_str()),
    }
    Ok(())
}

pub(crate) fn handle_set(target: &Target, path: &str, value: &str) -> Result<()> {
    let (mut store, _) = open(target)?;
    let option = store.set_option_str(path, value)?;

    if let Some(parent) = target.file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }
    try_save_to_file(&store, &target.file)?;
    eprintln!("{} = {}", path, option.get_value_str());
    Ok(())
}

pub(crate) fn handle_dump(target: &Target, format: OutputFormat) -> Result<()> {
    let (store, _) = open(target)?;

    match format {
        OutputFormat::Json => {
            let mut sections = Map::new();
            for section in store.sections() {
                let mut options = Map::new();
                for option in section.options() {
                    if is_list_member(section, option) {
                        continue;
                    }
                    let value = match option.as_compound() {
                        Some(compound) => rows_json(compound),
                        None => Value::String(option.get_value_str()),
                    };
                    options.insert(option.name().to_string(), value);
                }
                sections.insert(section.name().to_string(), Value::Object(options));
            }
            println!("{}", serde_json::to_string_pretty(&Value::Object(sections))?);
        }
        OutputFormat::Text => print!("{}", save_to_string(&store)),
    }
    Ok(())
}

pub(crate) fn handle_check(target: &Target, format: OutputFormat) -> Result<()> {
    let (_, report) = open(target)?;
    let Some(report) = report else {
        bail!("Config file does not exist: {}", target.file.display());
    };

    match format {
        OutputFormat::Json => {
            let errors: Vec<Value> = report
                .issues()
                .iter()
                .map(|issue| json!({ "line": issue.line, "message": issue.kind.to_string() }))
                .collect();
            let body = json!({ "file": target.file.display().to_string(), "errors": errors });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text => {
            for issue in report.issues() {
                println!("{}:{}: {}", target.file.display(), issue.line, issue.kind);
            }
        }
    }

    if !report.is_clean() {
        bail!(
            "{} error(s) in {}",
            report.error_count(),
            target.file.display()
        );
    }
    Ok(())
}
