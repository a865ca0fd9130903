use std::fmt::Display;

use serde::{Deserialize, Serialize};

// Defines a new type that wraps a String for use as a label.
macro_rules! idtype {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

idtype!(Choice);

/// The choice labels used when none are configured.
pub const DEFAULT_CHOICES: [&str; 5] = ["A", "B", "C", "D", "E"];

pub fn default_choices() -> Vec<Choice> {
    DEFAULT_CHOICES.iter().map(|&c| Choice::from(c)).collect()
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size<T> {
    pub width: T,
    pub height: T,
}
