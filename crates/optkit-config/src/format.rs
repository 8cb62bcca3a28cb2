//! The line-oriented config text format.
//!
//! ```text
//! [section]
//! key = value        # comment
//! long = first part \
//!        continued
//! color = \#FF0000FF
//! ```
//!
//! Loading applies the document to a [`ConfigStore`] in place: options it
//! mentions are set, options it no longer mentions go back to their default
//! unless locked, and compound options are rebuilt afterwards.

use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use tracing::{debug, error};

use crate::compound::CompoundOption;
use crate::option::{AnyOption, OptionCell, OptionHandle};
use crate::section::Section;
use crate::store::ConfigStore;

/// Why a line of a config document was skipped.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseIssueKind {
    #[error("option declared before a section starts!")]
    OptionBeforeSection,

    #[error("invalid option format (allowed <option_name> = <value>)")]
    InvalidFormat,

    #[error("invalid option value!")]
    InvalidValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIssue {
    /// 1-based line number in the source document.
    pub line: usize,
    pub kind: ParseIssueKind,
}

/// Lines skipped while loading a document.
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    issues: Vec<ParseIssue>,
}

impl ParseReport {
    pub fn issues(&self) -> &[ParseIssue] {
        &self.issues
    }

    pub fn error_count(&self) -> usize {
        self.issues.len()
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    fn record(&mut self, source_name: &str, line: usize, kind: ParseIssueKind) {
        error!("Error in file {}:{}, {}", source_name, line, kind);
        self.issues.push(ParseIssue { line, kind });
    }
}

#[derive(Debug)]
struct Line {
    number: usize,
    text: String,
}

/// Cut the line at the first `#` not preceded by `\`, then unescape `\#`.
fn strip_comment(text: &str) -> String {
    let bytes = text.as_bytes();
    let end = text
        .char_indices()
        .find(|&(i, ch)| ch == '#' && (i == 0 || bytes[i - 1] != b'\\'))
        .map_or(text.len(), |(i, _)| i);

    let mut out = String::with_capacity(end);
    let mut escaped = false;
    for ch in text[..end].chars() {
        if ch == '#' && escaped {
            out.pop();
        }
        out.push(ch);
        escaped = ch == '\\';
    }
    out
}

/// Merge lines ending in a single `\` with the line that follows.
///
/// A trailing `\\` is an escaped backslash: one `\` is dropped and the line
/// ends there. Joined lines report the number of their first physical line.
fn join_continuations(lines: Vec<Line>) -> Vec<Line> {
    let mut result: Vec<Line> = Vec::with_capacity(lines.len());
    let mut continuing = false;

    for line in lines {
        if continuing {
            if let Some(last) = result.last_mut() {
                last.text.push_str(&line.text);
            }
        } else {
            result.push(line);
        }

        continuing = result.last_mut().is_some_and(|last| {
            if last.text.ends_with('\\') {
                last.text.pop();
                !last.text.ends_with('\\')
            } else {
                false
            }
        });
    }

    result
}

fn logical_lines(source: &str) -> Vec<Line> {
    let physical = source
        .lines()
        .enumerate()
        .map(|(i, raw)| Line {
            number: i + 1,
            text: strip_comment(raw).trim_end().to_string(),
        })
        .collect();

    join_continuations(physical)
        .into_iter()
        .filter(|line| !line.text.is_empty())
        .collect()
}

fn section_header(text: &str) -> Option<&str> {
    let name = text.trim().strip_prefix('[')?.strip_suffix(']')?;
    (!name.is_empty()).then_some(name)
}

/// Make sure a section called `name` exists, instantiating `base:instance`
/// names from the `base` section when there is one.
pub(crate) fn open_section(store: &mut ConfigStore, name: &str) {
    if store.get_section(name).is_some() {
        return;
    }

    let from_template = match name.split_once(':') {
        Some((base, instance)) if !base.is_empty() && !instance.is_empty() => store
            .get_section(base)
            .map(|template| template.clone_with_name(name)),
        _ => None,
    };

    match from_template {
        Some(section) => {
            debug!(section = name, "Instantiating section from template");
            store.merge_section(section);
        }
        None => store.merge_section(Section::new(name)),
    }
}

fn identity(option: &OptionHandle) -> *const () {
    Rc::as_ptr(option) as *const ()
}

fn apply_option_line(
    section: &mut Section,
    text: &str,
    touched: &mut HashSet<*const ()>,
) -> Result<(), ParseIssueKind> {
    let (name, value) = text.split_once('=').ok_or(ParseIssueKind::InvalidFormat)?;
    let (name, value) = (name.trim(), value.trim());
    if name.is_empty() {
        return Err(ParseIssueKind::InvalidFormat);
    }

    let option = match section.get_option_or(name) {
        Some(option) => option,
        None => {
            let created: OptionHandle = Rc::new(OptionCell::new(name, String::new()));
            section
                .register_new_option(created.clone())
                .map_err(|_| ParseIssueKind::InvalidFormat)?;
            created
        }
    };

    // A locked option keeps its value but still counts as present.
    if option.is_locked() || option.set_value_str(value) {
        touched.insert(identity(&option));
        Ok(())
    } else {
        Err(ParseIssueKind::InvalidValue)
    }
}

/// Apply the config document `source` to `store`.
///
/// Bad lines are logged as `Error in file <source_name>:<line>, ...` and
/// skipped. After the pass, every unlocked option the document did not set is
/// reset to its default and every unlocked compound option is rebuilt from
/// its section.
pub fn load_from_str(store: &mut ConfigStore, source: &str, source_name: &str) -> ParseReport {
    let mut report = ParseReport::default();
    let mut touched = HashSet::new();
    let mut current: Option<String> = None;

    for line in logical_lines(source) {
        if let Some(name) = section_header(&line.text) {
            open_section(store, name);
            current = Some(name.to_string());
            continue;
        }

        let Some(section) = current
            .as_deref()
            .and_then(|name| store.get_section_mut(name))
        else {
            report.record(source_name, line.number, ParseIssueKind::OptionBeforeSection);
            continue;
        };

        if let Err(kind) = apply_option_line(section, &line.text, &mut touched) {
            report.record(source_name, line.number, kind);
        }
    }

    for section in store.sections() {
        for option in section.options() {
            let present = touched.contains(&identity(option));
            option.base().set_in_config_file(present);
            if !present && !option.is_locked() && option.as_compound().is_none() {
                option.reset_to_default();
            }
        }
    }

    for section in store.sections() {
        for option in section.options() {
            if let Some(compound) = option.as_compound() {
                if !compound.is_locked() {
                    compound.update_from_section(section);
                }
            }
        }
    }

    report
}

fn escape_line(line: &str) -> String {
    let mut escaped = line.replace('#', "\\#");
    if escaped.ends_with('\\') {
        escaped.push('\\');
    }
    escaped
}

fn is_worth_saving(option: &OptionHandle) -> bool {
    let value = option.get_value_str();
    !value.is_empty() && (value != option.get_default_value_str() || option.is_in_config_file())
}

fn section_lines(section: &Section) -> Vec<String> {
    let compounds: Vec<&CompoundOption> = section
        .options()
        .filter_map(|option| option.as_compound())
        .collect();

    let mut values: BTreeMap<String, String> = BTreeMap::new();
    for option in section.options() {
        if option.as_compound().is_some() {
            continue;
        }
        let owned_by_compound = !option.is_schema_defined()
            && compounds.iter().any(|compound| compound.owns_name(option.name()));
        if owned_by_compound || !is_worth_saving(option) {
            continue;
        }
        values.insert(option.name().to_string(), option.get_value_str());
    }

    for compound in &compounds {
        values.extend(compound.expand());
    }

    let mut lines = Vec::with_capacity(values.len() + 2);
    lines.push(format!("[{}]", section.name()));
    lines.extend(values.into_iter().map(|(key, value)| format!("{key} = {value}")));
    lines.push(String::new());
    lines
}

/// Render `store` in the config text format.
///
/// Sections and keys come out in lexicographic order, each section followed
/// by a blank line. Default values not supplied by a file are omitted.
pub fn save_to_string(store: &ConfigStore) -> String {
    let mut out = String::new();
    for section in store.sections() {
        for line in section_lines(section) {
            out.push_str(&escape_line(&line));
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
