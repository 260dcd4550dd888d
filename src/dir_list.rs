#[cfg(feature = "json_schema")]
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::DirectoryEntry;
use crate::Error;
use crate::Path;
use crate::dir::compare_names;
use crate::tree::TreeNode;

/// An entry together with its full path.
#[cfg_attr(feature = "json_schema", derive(JsonSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Hash, Eq)]
pub struct FileInfo {
    /// The full path of the entry.
    pub path: Path,
    /// The projected entry.
    pub entry: DirectoryEntry,
}

/// Every file and directory below `base_dir`
#[cfg_attr(feature = "json_schema", derive(JsonSchema))]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Hash, Eq)]
pub struct RecursiveDirList {
    /// Directory the listing starts at
    pub base_dir: Path,
    /// Entries in depth-first order; siblings are ordered like a listing.
    pub entries: Vec<FileInfo>,
}

impl RecursiveDirList {
    /// Collects everything below `node`, which must be a directory.
    pub fn collect(base_dir: Path, node: Option<&TreeNode>) -> Result<Self, Error> {
        let node = match node {
            Some(n) if n.is_dir() => n,
            _ => {
                return Err(Error::DirectoryNotFound {
                    path: base_dir.to_string(),
                });
            }
        };
        let mut entries = Vec::with_capacity(node.descendants());
        Self::visit(&base_dir, node, &mut entries);
        Ok(Self { base_dir, entries })
    }

    fn visit(dir_path: &Path, node: &TreeNode, out: &mut Vec<FileInfo>) {
        let mut children: Vec<&TreeNode> = node.children().iter().collect();
        children.sort_by(|a, b| compare_names(&a.name, &b.name));
        for child in children {
            let path = dir_path.child(&child.name);
            out.push(FileInfo {
                path: path.clone(),
                entry: DirectoryEntry::from(child),
            });
            if child.is_dir() {
                Self::visit(&path, child, out);
            }
        }
    }
}
