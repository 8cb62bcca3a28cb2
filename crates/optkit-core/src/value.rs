//! Text codecs for every value type an option can hold.
//!
//! Each type parses from and formats to the single-line text used in config
//! files. `format_value` output must always parse back with `parse_value`;
//! formatting may normalize (e.g. `1.5` becomes `1.500000`).

use std::fmt;

use crate::types::ValueKind;

/// A value type that can live inside an option cell.
pub trait OptionValue: Clone + PartialEq + fmt::Debug + 'static {
    /// Which member of the closed kind set this type is.
    fn kind() -> ValueKind;

    /// Parse the textual form. `None` means the text is not a valid value.
    fn parse_value(text: &str) -> Option<Self>;

    /// Canonical textual form.
    fn format_value(&self) -> String;
}

/// Ordered scalar types which support a minimum and maximum.
pub trait BoundedValue: OptionValue + PartialOrd {
    /// Clamp `self` into the optional `[minimum, maximum]` range.
    fn clamp_to(self, minimum: Option<&Self>, maximum: Option<&Self>) -> Self {
        if let Some(min) = minimum {
            if self < *min {
                return min.clone();
            }
        }
        if let Some(max) = maximum {
            if self > *max {
                return max.clone();
            }
        }
        self
    }
}

impl OptionValue for i32 {
    fn kind() -> ValueKind {
        ValueKind::Int
    }

    fn parse_value(text: &str) -> Option<Self> {
        text.parse().ok()
    }

    fn format_value(&self) -> String {
        self.to_string()
    }
}

impl BoundedValue for i32 {}

impl OptionValue for f64 {
    fn kind() -> ValueKind {
        ValueKind::Double
    }

    fn parse_value(text: &str) -> Option<Self> {
        // NaN would never compare equal to itself and defeat change detection.
        text.parse::<f64>().ok().filter(|v| v.is_finite())
    }

    fn format_value(&self) -> String {
        format!("{:.6}", self)
    }
}

impl BoundedValue for f64 {}

impl OptionValue for bool {
    fn kind() -> ValueKind {
        ValueKind::Bool
    }

    fn parse_value(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }

    fn format_value(&self) -> String {
        self.to_string()
    }
}

impl OptionValue for String {
    fn kind() -> ValueKind {
        ValueKind::String
    }

    fn parse_value(text: &str) -> Option<Self> {
        if text.contains('\n') {
            return None;
        }
        Some(text.to_string())
    }

    fn format_value(&self) -> String {
        self.clone()
    }
}

/// An RGBA color with channels in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

const COLOR_EPSILON: f64 = 1e-6;

impl Color {
    /// Build a color, clamping every channel into `[0, 1]`.
    pub fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
            a: a.clamp(0.0, 1.0),
        }
    }

    fn channels(&self) -> [f64; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl PartialEq for Color {
    fn eq(&self, other: &Self) -> bool {
        self.channels()
            .iter()
            .zip(other.channels().iter())
            .all(|(x, y)| (x - y).abs() < COLOR_EPSILON)
    }
}

impl OptionValue for Color {
    fn kind() -> ValueKind {
        ValueKind::Color
    }

    /// Accepts `#RGBA` or `#RRGGBBAA`.
    fn parse_value(text: &str) -> Option<Self> {
        let hex = text.strip_prefix('#')?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let (width, scale) = match hex.len() {
            4 => (1, 15.0),
            8 => (2, 255.0),
            _ => return None,
        };
        let mut channels = [0.0; 4];
        for (i, channel) in channels.iter_mut().enumerate() {
            let digits = &hex[i * width..(i + 1) * width];
            *channel = f64::from(u8::from_str_radix(digits, 16).ok()?) / scale;
        }
        Some(Self::new(channels[0], channels[1], channels[2], channels[3]))
    }

    fn format_value(&self) -> String {
        let mut out = String::from("#");
        for channel in self.channels() {
            out.push_str(&format!("{:02X}", (channel * 255.0).round() as u8));
        }
        out
    }
}
