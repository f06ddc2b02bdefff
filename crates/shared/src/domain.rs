use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(ProjectId);
id_newtype!(CollectionId);
id_newtype!(FlowId);
id_newtype!(Cursor);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionStatus {
    Enabled,
    Disabled,
}

impl CollectionStatus {
    pub fn toggled(self) -> Self {
        match self {
            Self::Enabled => Self::Disabled,
            Self::Disabled => Self::Enabled,
        }
    }

    pub fn is_enabled(self) -> bool {
        self == Self::Enabled
    }
}

impl fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => f.write_str("ENABLED"),
            Self::Disabled => f.write_str("DISABLED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggled_status_is_the_complement() {
        assert_eq!(CollectionStatus::Enabled.toggled(), CollectionStatus::Disabled);
        assert_eq!(CollectionStatus::Disabled.toggled(), CollectionStatus::Enabled);
    }

    #[test]
    fn status_uses_upper_case_wire_names() {
        let json = serde_json::to_string(&CollectionStatus::Disabled).expect("serialize");
        assert_eq!(json, "\"DISABLED\"");
        let parsed: CollectionStatus = serde_json::from_str("\"ENABLED\"").expect("parse");
        assert_eq!(parsed, CollectionStatus::Enabled);
    }

    #[test]
    fn ids_serialize_as_bare_strings() {
        let json = serde_json::to_string(&CollectionId::new("col_1")).expect("serialize");
        assert_eq!(json, "\"col_1\"");
    }
}
