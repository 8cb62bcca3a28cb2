//! Typed, file-backed configuration store.
//!
//! A [`ConfigStore`] holds named [`Section`]s of typed options. Options are
//! shared [`OptionHandle`]s with change notification; the text format in
//! [`format`] loads into and saves out of a store, and [`file`] adds
//! cross-process locking on top.

pub mod compound;
pub mod file;
pub mod format;
pub mod option;
pub mod schema;
pub mod section;
pub mod store;
pub mod wrapper;

#[cfg(test)]
mod test_support;

pub use compound::{CompoundEntry, CompoundOption, CompoundRow, CompoundRows};
pub use file::{
    build_configuration, load_from_file, override_defaults, save_to_file, try_load_from_file,
    try_save_to_file,
};
pub use format::{ParseIssue, ParseIssueKind, ParseReport, load_from_str, save_to_string};
pub use option::{
    AnyOption, OptionBase, OptionCell, OptionHandle, SetMode, Subscriber, try_as,
    try_as_compound,
};
pub use schema::{SchemaProvider, TomlSchema};
pub use section::Section;
pub use store::ConfigStore;
pub use wrapper::{OptionWrapper, create_option, create_option_string};
