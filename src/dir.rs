use std::cmp::Ordering;

#[cfg(feature = "json_schema")]
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Path;
use crate::tree::NodeKind;
use crate::tree::TreeNode;
use crate::utils::format_timestamp;

/// A child of a listed directory.
#[cfg_attr(feature = "json_schema", derive(JsonSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Hash, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DirectoryEntry {
    /// A folder.
    Directory {
        /// Name of the folder.
        name: String,
        /// Remote id of the folder.
        id: String,
        /// Last change in RFC 3339 - Z format, e.g. "2018-01-26T18:30:09.453Z".
        mtime: String,
        /// Number of entries directly inside the folder.
        items: u64,
    },
    /// A downloadable file.
    File {
        /// Name of the file.
        name: String,
        /// Remote id of the file reference.
        id: String,
        /// Size in bytes.
        size: u64,
        /// MIME type reported by the remote store.
        mime_type: String,
        /// Last change in RFC 3339 - Z format, e.g. "2018-01-26T18:30:09.453Z".
        mtime: String,
    },
}

impl DirectoryEntry {
    /// Name of the entry.
    pub fn name(&self) -> &str {
        match self {
            DirectoryEntry::Directory { name, .. } | DirectoryEntry::File { name, .. } => name,
        }
    }

    /// Remote id of the entry.
    pub fn id(&self) -> &str {
        match self {
            DirectoryEntry::Directory { id, .. } | DirectoryEntry::File { id, .. } => id,
        }
    }

    /// Whether this entry is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, DirectoryEntry::Directory { .. })
    }
}

impl From<&TreeNode> for DirectoryEntry {
    fn from(node: &TreeNode) -> Self {
        let mtime = format_timestamp(&node.changed);
        match &node.kind {
            NodeKind::Directory { children } => DirectoryEntry::Directory {
                name: node.name.clone(),
                id: node.id.clone(),
                mtime,
                items: children.len() as u64,
            },
            NodeKind::File { size, mime_type } => DirectoryEntry::File {
                name: node.name.clone(),
                id: node.id.clone(),
                size: *size,
                mime_type: mime_type.clone(),
                mtime,
            },
        }
    }
}

/// Compares names ignoring case, char by char, without locale rules.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Represents the contents of a directory, including the current path and its
/// items.
#[cfg_attr(feature = "json_schema", derive(JsonSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Hash, Eq)]
pub struct Directory {
    /// The current directory path.
    pub current_path: Path,
    /// The list of files and directories in the current path.
    pub items: Vec<DirectoryEntry>,
}

impl Directory {
    /// Projects the children of `node` into entries sorted by
    /// [`compare_names`]. Entries whose names compare equal keep their fetch
    /// order.
    ///
    /// Fails with `Error::DirectoryNotFound` if `node` is missing or a file.
    pub fn project(current_path: Path, node: Option<&TreeNode>) -> Result<Self, Error> {
        let children = match node.map(|n| &n.kind) {
            Some(NodeKind::Directory { children }) => children,
            _ => {
                return Err(Error::DirectoryNotFound {
                    path: current_path.to_string(),
                });
            }
        };
        let mut items: Vec<DirectoryEntry> = children.iter().map(DirectoryEntry::from).collect();
        items.sort_by(|a, b| compare_names(a.name(), b.name()));
        Ok(Self {
            current_path,
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::tests::dir;
    use crate::tree::tests::file;

    fn names(d: &Directory) -> Vec<&str> {
        d.items.iter().map(|e| e.name()).collect()
    }

    #[test]
    fn listing_ignores_case() {
        let root = dir("", vec![file("b", 1), dir("A", vec![]), file("c", 1)]);
        let listing = Directory::project(Path::empty(), Some(&root)).unwrap();
        assert_eq!(names(&listing), ["A", "b", "c"]);
    }

    #[test]
    fn equal_names_keep_fetch_order() {
        let root = dir("", vec![file("readme", 1), file("README", 2), file("a", 3)]);
        let listing = Directory::project(Path::empty(), Some(&root)).unwrap();
        assert_eq!(names(&listing), ["a", "readme", "README"]);
    }

    #[test]
    fn entries_are_typed_by_node_kind() {
        let root = dir(
            "",
            vec![dir("docs", vec![file("a.pdf", 10)]), file("notes.txt", 5)],
        );
        let listing = Directory::project(Path::empty(), Some(&root)).unwrap();
        assert_eq!(
            listing.items[0],
            DirectoryEntry::Directory {
                name: "docs".into(),
                id: "d-docs".into(),
                mtime: "1970-01-01T00:00:00.000Z".into(),
                items: 1,
            }
        );
        assert!(matches!(
            &listing.items[1],
            DirectoryEntry::File { size: 5, .. }
        ));
    }

    #[test]
    fn missing_node_is_directory_not_found() {
        let path = Path::parse("nope").unwrap();
        assert_eq!(
            Directory::project(path, None),
            Err(Error::DirectoryNotFound {
                path: "nope".into()
            })
        );
    }

    #[test]
    fn file_node_is_directory_not_found() {
        let f = file("notes.txt", 5);
        assert!(matches!(
            Directory::project(Path::parse("notes.txt").unwrap(), Some(&f)),
            Err(Error::DirectoryNotFound { .. })
        ));
    }

    #[test]
    fn entries_serialize_with_a_type_tag() {
        let entry = DirectoryEntry::from(&file("a.pdf", 10));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "file");
        assert_eq!(json["size"], 10);
    }
}
