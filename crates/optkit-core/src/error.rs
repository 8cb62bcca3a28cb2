#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Non-existing option '{option}' in config section '{section}'")]
    OptionNotFound { section: String, option: String },

    #[error("Non-existing config section '{0}'")]
    SectionNotFound(String),

    #[error("Invalid option path '{0}': expected '<section>/<option>'")]
    InvalidPath(String),

    #[error("Bad option type for '{name}': expected {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    #[error("Cannot add an option without a name to section '{0}'")]
    EmptyOptionName(String),

    #[error("Invalid value '{value}' for option '{name}'")]
    InvalidValue { name: String, value: String },

    #[error("Config file '{0}' is locked by another process")]
    LockUnavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
