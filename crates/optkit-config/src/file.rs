//! Config files on disk: locked load/save and the layered build.
//!
//! Readers take a non-blocking shared `flock` and skip the reload when a
//! writer holds the file. Writers wait for an exclusive lock, so a reader
//! never sees a half-written file.

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use optkit_core::ConfigError;
use tracing::{debug, error, warn};

use crate::format::{ParseReport, load_from_str, save_to_string};
use crate::option::AnyOption;
use crate::schema::SchemaProvider;
use crate::store::ConfigStore;

fn read_locked(path: &Path) -> Result<String> {
    let mut lock = optkit_lock::try_shared_lock(path)?
        .ok_or_else(|| ConfigError::LockUnavailable(path.display().to_string()))?;

    let mut contents = String::new();
    lock.file()
        .read_to_string(&mut contents)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    lock.unlock()?;
    Ok(contents)
}

/// Load `path` into `store`, reporting the lines that were skipped.
///
/// Fails without touching the store if the file cannot be opened or is
/// locked by a writer.
pub fn try_load_from_file(store: &mut ConfigStore, path: &Path) -> Result<ParseReport> {
    let contents = read_locked(path)?;
    debug!(path = %path.display(), "Loading config file");
    Ok(load_from_str(store, &contents, &path.display().to_string()))
}

/// Load `path` into `store`. Returns `false`, leaving the store untouched,
/// if the file is missing or currently being written.
pub fn load_from_file(store: &mut ConfigStore, path: &Path) -> bool {
    match try_load_from_file(store, path) {
        Ok(_) => true,
        Err(err) => {
            if matches!(
                err.downcast_ref::<ConfigError>(),
                Some(ConfigError::LockUnavailable(_))
            ) {
                debug!(path = %path.display(), "Config file is being written, skipping reload");
            } else {
                error!("{:#}", err);
            }
            false
        }
    }
}

/// Serialize `store` and write it to `path` under an exclusive lock.
///
/// The final newline is appended after the lock is released, so watchers
/// get one last change notification once readers can get in.
pub fn try_save_to_file(store: &ConfigStore, path: &Path) -> Result<()> {
    let contents = save_to_string(store);
    let body = contents.strip_suffix('\n').unwrap_or(&contents);

    let mut lock = optkit_lock::exclusive_lock(path)?;
    let file = lock.file();
    file.set_len(0)
        .with_context(|| format!("Failed to truncate config file: {}", path.display()))?;
    file.write_all(body.as_bytes())
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    let mut file = lock.into_file()?;
    if body.len() < contents.len() {
        file.write_all(b"\n")
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    }
    debug!(path = %path.display(), "Saved config file");
    Ok(())
}

pub fn save_to_file(store: &ConfigStore, path: &Path) -> bool {
    match try_save_to_file(store, path) {
        Ok(()) => true,
        Err(err) => {
            error!("{:#}", err);
            false
        }
    }
}

/// Use the values in `source` as new defaults for the options of `store`.
///
/// Every option named there gets its default replaced and is reset to it.
/// Keys the store does not know and values its options reject are logged
/// and ignored.
pub fn override_defaults(store: &ConfigStore, source: &str, source_name: &str) {
    let mut overrides = ConfigStore::new();
    load_from_str(&mut overrides, source, source_name);

    for section in overrides.sections() {
        for option in section.options() {
            let full_name = format!("{}/{}", section.name(), option.name());
            match store.get_option(&full_name) {
                Some(real) if real.set_default_value_str(&option.get_value_str()) => {
                    real.reset_to_default();
                }
                Some(_) => warn!("Invalid value for {} in {}", full_name, source_name),
                None => warn!("Unused default value for {} in {}", full_name, source_name),
            }
        }
    }
}

/// Build a store from `schema`, then the system defaults file, then the
/// user config file. Files that are not given or do not exist are skipped.
pub fn build_configuration(
    schema: &dyn SchemaProvider,
    sysconf: Option<&Path>,
    userconf: Option<&Path>,
) -> Result<ConfigStore> {
    let mut store = ConfigStore::new();
    for section in schema.sections().context("Failed to load option schema")? {
        store.merge_section(section);
    }

    match sysconf {
        Some(path) if path.exists() => match read_locked(path) {
            Ok(contents) => override_defaults(&store, &contents, &path.display().to_string()),
            Err(err) => warn!("Skipping system defaults: {:#}", err),
        },
        Some(path) => debug!(path = %path.display(), "No system defaults file"),
        None => {}
    }

    match userconf {
        Some(path) if path.exists() => {
            load_from_file(&mut store, path);
        }
        Some(path) => debug!(path = %path.display(), "No user config file"),
        None => {}
    }

    Ok(store)
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
