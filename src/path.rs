use std::fmt::Display;

#[cfg(feature = "json_schema")]
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::de;

use crate::errors::Error;

/// Separator between the components of a host path.
pub const SEPARATOR: char = '/';

/// A custom deserializer function for a Vec<String> that checks for ".."
/// components.
fn deserialize_components<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let components = Vec::<String>::deserialize(deserializer)?;

    if components.iter().any(|c| c == ".." || c == "." || c.is_empty()) {
        Err(de::Error::custom(
            "Path component cannot be empty, '.' or '..'",
        ))
    } else {
        Ok(components)
    }
}

/// A slash-delimited location inside a course snapshot, stored as its
/// components. The empty path addresses the snapshot root.
#[cfg_attr(feature = "json_schema", derive(JsonSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Hash, Eq, Default)]
pub struct Path {
    /// The components of the path as a vector of strings.
    #[serde(deserialize_with = "deserialize_components")]
    components: Vec<String>,
}

impl Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, comp) in self.components.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            write!(f, "{comp}")?;
        }
        Ok(())
    }
}

impl Path {
    /// Creates empty path
    pub fn empty() -> Self {
        Self { components: vec![] }
    }

    /// Parses a host path such as `docs/slides` or `./docs/`.
    ///
    /// Empty and `.` components are dropped, so `""`, `"."` and `"/"` all
    /// parse to the root. A `..` component is rejected with
    /// `Error::InvalidPath`: a snapshot has no notion of leaving its root.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let mut components = Vec::new();
        for comp in s.split(SEPARATOR) {
            match comp {
                "" | "." => continue,
                ".." => {
                    return Err(Error::InvalidPath {
                        what: format!("'..' is not allowed in {s:?}"),
                    });
                }
                _ => components.push(comp.to_owned()),
            }
        }
        Ok(Self { components })
    }

    /// The components of this path, root first.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Returns a new path with `name` appended.
    pub fn child(&self, name: &str) -> Path {
        let mut components = self.components.clone();
        components.push(name.to_owned());
        Path { components }
    }
}
