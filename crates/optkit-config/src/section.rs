use std::collections::BTreeMap;
use std::rc::Rc;

use optkit_core::ConfigError;
use tracing::error;

use crate::option::OptionHandle;

/// A named group of options. Iteration is in lexicographic name order.
pub struct Section {
    name: String,
    options: BTreeMap<String, OptionHandle>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_option(&self, name: &str) -> Result<OptionHandle, ConfigError> {
        self.get_option_or(name)
            .ok_or_else(|| ConfigError::OptionNotFound {
                section: self.name.clone(),
                option: name.to_string(),
            })
    }

    pub fn get_option_or(&self, name: &str) -> Option<OptionHandle> {
        self.options.get(name).cloned()
    }

    pub fn options(&self) -> impl Iterator<Item = &OptionHandle> {
        self.options.values()
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Insert `option`, replacing any option registered under the same name.
    pub fn register_new_option(&mut self, option: OptionHandle) -> Result<(), ConfigError> {
        if option.name().is_empty() {
            error!(section = %self.name, "Cannot register an option without a name");
            return Err(ConfigError::EmptyOptionName(self.name.clone()));
        }
        self.options.insert(option.name().to_string(), option);
        Ok(())
    }

    /// Remove `option` only if that exact handle is the one registered.
    pub fn unregister_option(&mut self, option: &OptionHandle) {
        let registered = self
            .options
            .get(option.name())
            .is_some_and(|current| Rc::ptr_eq(current, option));
        if registered {
            self.options.remove(option.name());
        }
    }

    /// A new section holding independent copies of every option.
    pub fn clone_with_name(&self, name: impl Into<String>) -> Section {
        Section {
            name: name.into(),
            options: self
                .options
                .iter()
                .map(|(key, option)| (key.clone(), option.clone_option()))
                .collect(),
        }
    }
}

impl std::fmt::Debug for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Section")
            .field("name", &self.name)
            .field("options", &self.options.keys().collect::<Vec<_>>())
            .finish()
    }
}
