use std::collections::BTreeMap;
use std::rc::Rc;

use optkit_core::{ConfigError, OptionValue};
use tracing::{debug, error};

use crate::format::open_section;
use crate::option::{AnyOption, OptionCell, OptionHandle, try_as};
use crate::section::Section;

/// All sections of one configuration, keyed by name.
#[derive(Debug, Default)]
pub struct ConfigStore {
    sections: BTreeMap<String, Section>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `section`, or fold it into the same-named section already present.
    ///
    /// Existing cells keep their identity (and subscribers); only the
    /// incoming option's string value is copied into them. Options the store
    /// does not know yet are registered as they are.
    pub fn merge_section(&mut self, section: Section) {
        let Some(existing) = self.sections.get_mut(section.name()) else {
            debug!(section = section.name(), "Adding config section");
            self.sections.insert(section.name().to_string(), section);
            return;
        };

        for incoming in section.options() {
            match existing.get_option_or(incoming.name()) {
                Some(current) => {
                    current.set_value_str(&incoming.get_value_str());
                }
                None => {
                    if let Err(err) = existing.register_new_option(incoming.clone()) {
                        error!("Failed to merge option into {}: {}", section.name(), err);
                    }
                }
            }
        }
    }

    pub fn get_section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    pub fn get_section_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections.get_mut(name)
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.values()
    }

    /// Look up `<section>/<option>`. Both halves must be non-empty.
    pub fn get_option(&self, path: &str) -> Option<OptionHandle> {
        self.find_option(path).ok()
    }

    /// Like [`ConfigStore::get_option`], reporting why the lookup failed.
    pub fn find_option(&self, path: &str) -> Result<OptionHandle, ConfigError> {
        let (section_name, option_name) = split_path(path)?;
        self.get_section(section_name)
            .ok_or_else(|| ConfigError::SectionNotFound(section_name.to_string()))?
            .get_option(option_name)
    }

    /// Typed lookup: `None` if the path is absent or holds another type.
    pub fn get_option_as<T: OptionValue>(&self, path: &str) -> Option<Rc<OptionCell<T>>> {
        self.get_option(path).and_then(|handle| try_as::<T>(&handle))
    }

    /// Assign `text` to `<section>/<option>` the way a config file line would.
    ///
    /// A missing section is opened (from its `base:` template if any) and a
    /// missing option is created as a string option. The option then counts
    /// as supplied by a file, and the unlocked list options of its section
    /// are rebuilt, so a following save writes the new value.
    pub fn set_option_str(&mut self, path: &str, text: &str) -> Result<OptionHandle, ConfigError> {
        let (section_name, option_name) = split_path(path)?;
        open_section(self, section_name);
        let section = self
            .get_section_mut(section_name)
            .ok_or_else(|| ConfigError::SectionNotFound(section_name.to_string()))?;

        let (option, created) = match section.get_option_or(option_name) {
            Some(option) => (option, false),
            None => {
                let option: OptionHandle = Rc::new(OptionCell::new(option_name, String::new()));
                section.register_new_option(Rc::clone(&option))?;
                (option, true)
            }
        };

        if !option.set_value_str(text) {
            if created {
                section.unregister_option(&option);
            }
            return Err(ConfigError::InvalidValue {
                name: path.to_string(),
                value: text.to_string(),
            });
        }
        option.base().set_in_config_file(true);

        let section: &Section = section;
        for compound in section.options().filter_map(|opt| opt.as_compound()) {
            if !compound.is_locked() {
                compound.update_from_section(section);
            }
        }
        Ok(option)
    }
}

fn split_path(path: &str) -> Result<(&str, &str), ConfigError> {
    match path.split_once('/') {
        Some((section, option)) if !section.is_empty() && !option.is_empty() => {
            Ok((section, option))
        }
        _ => Err(ConfigError::InvalidPath(path.to_string())),
    }
}
