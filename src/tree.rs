use chrono::DateTime;
use chrono::Utc;

use crate::api::FileRecord;
use crate::api::FolderRecord;

/// Size reported for directories, meaning "not applicable".
pub const DIRECTORY_SIZE: i64 = -1;

/// What a [`TreeNode`] stands for. Only directories carry children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A remote folder and the nodes it owns.
    Directory {
        /// Subfolders in fetch order, followed by files in fetch order.
        children: Vec<TreeNode>,
    },
    /// A remote file reference.
    File {
        /// Size in bytes.
        size: u64,
        /// MIME type reported by the remote store.
        mime_type: String,
    },
}

/// One remote folder or file in a course snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// Remote id, stable across requests.
    pub id: String,
    /// Display name, the key used to match path components.
    pub name: String,
    /// Remote modification time.
    pub changed: DateTime<Utc>,
    /// Directory or file payload.
    pub kind: NodeKind,
}

impl TreeNode {
    /// A directory node that only knows its id. Used for the build root.
    pub fn root(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            changed: DateTime::<Utc>::UNIX_EPOCH,
            kind: NodeKind::Directory { children: vec![] },
        }
    }

    /// An empty directory node for a folder record.
    pub fn from_folder(folder: FolderRecord) -> Self {
        Self {
            id: folder.id,
            name: folder.name,
            changed: folder.changed,
            kind: NodeKind::Directory { children: vec![] },
        }
    }

    /// A leaf node for a file record.
    pub fn from_file(file: FileRecord) -> Self {
        Self {
            id: file.id,
            name: file.name,
            changed: file.changed,
            kind: NodeKind::File {
                size: file.size,
                mime_type: file.mime_type,
            },
        }
    }

    /// Whether this node is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    /// Children of a directory; always empty for files.
    pub fn children(&self) -> &[TreeNode] {
        match &self.kind {
            NodeKind::Directory { children } => children,
            NodeKind::File { .. } => &[],
        }
    }

    /// Byte length for files, [`DIRECTORY_SIZE`] for directories.
    pub fn size(&self) -> i64 {
        match &self.kind {
            NodeKind::File { size, .. } => i64::try_from(*size).unwrap_or(i64::MAX),
            NodeKind::Directory { .. } => DIRECTORY_SIZE,
        }
    }

    /// MIME type for files, empty for directories.
    pub fn mime_type(&self) -> &str {
        match &self.kind {
            NodeKind::File { mime_type, .. } => mime_type,
            NodeKind::Directory { .. } => "",
        }
    }

    /// Walks `segments` from this node by exact name match.
    ///
    /// Leading `""` and `"."` segments address the node itself, so `[]`,
    /// `["."]` and `[""]` all return `self`. Matching is ordinal and
    /// case-sensitive and takes the first child with the name. There is no
    /// backtracking.
    pub fn resolve<S: AsRef<str>>(&self, segments: &[S]) -> Option<&TreeNode> {
        let Some((first, rest)) = segments.split_first() else {
            return Some(self);
        };
        match first.as_ref() {
            "" | "." => self.resolve(rest),
            name => self
                .children()
                .iter()
                .find(|c| c.name == name)
                .and_then(|c| c.resolve(rest)),
        }
    }

    /// Consumes the tree and returns the subtree at `segments`, if any.
    pub fn into_subtree<S: AsRef<str>>(self, segments: &[S]) -> Option<TreeNode> {
        let Some((first, rest)) = segments.split_first() else {
            return Some(self);
        };
        match first.as_ref() {
            "" | "." => self.into_subtree(rest),
            name => match self.kind {
                NodeKind::Directory { children } => children
                    .into_iter()
                    .find(|c| c.name == name)
                    .and_then(|c| c.into_subtree(rest)),
                NodeKind::File { .. } => None,
            },
        }
    }

    /// Number of nodes below this one.
    pub fn descendants(&self) -> usize {
        self.children()
            .iter()
            .map(|c| 1 + c.descendants())
            .sum()
    }
}
