use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// The closed set of scalar value types an option or compound column can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Int,
    Double,
    Bool,
    String,
    Color,
}

impl ValueKind {
    /// Returns the schema-facing name for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Double => "double",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Color => "color",
        }
    }

    /// Whether options of this kind accept a minimum and maximum.
    pub fn is_ordered(&self) -> bool {
        matches!(self, Self::Int | Self::Double)
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ValueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "int" => Ok(Self::Int),
            "double" => Ok(Self::Double),
            "bool" => Ok(Self::Bool),
            "string" => Ok(Self::String),
            "color" => Ok(Self::Color),
            other => Err(format!("unknown value type '{other}'")),
        }
    }
}

/// Output format for CLI responses
#[derive(Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
