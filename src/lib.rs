//! A read-only, navigable, serializable snapshot of a Stud.IP course's files.
//!
//! The folder tree of a course is fetched once, concurrently, when a
//! [`CourseFs`] is created. Listings are then answered from memory; only file
//! content goes back to the server.
//!
//! ```rust
//! # tokio_test::block_on(async {
//! # use std::sync::Arc;
//! # use coursefs::{CourseFs, MockCourseApi, Options};
//! # use tokio_util::sync::CancellationToken;
//! let api = MockCourseApi::new("c1")
//!     .folder(MockCourseApi::ROOT, "d1", "docs")
//!     .file("d1", "f1", "a.pdf", 10)
//!     .file(MockCourseApi::ROOT, "f2", "notes.txt", 5);
//! let options = Options::new("user", "secret", "c1");
//! let fs = CourseFs::from_api(Arc::new(api), &options, &CancellationToken::new())
//!     .await
//!     .unwrap();
//! let dir = fs.list("").unwrap();
//! assert_eq!(dir.items.len(), 2);
//! println!("{}", serde_json::to_string_pretty(&dir).unwrap());
//! # })
//! ```
//!
//! The output might look like
//! ```json
//! {
//!   "current_path": {
//!     "components": []
//!   },
//!   "items": [
//!     {
//!       "type": "directory",
//!       "name": "docs",
//!       "id": "d1",
//!       "mtime": "2024-04-18T08:21:33.000Z",
//!       "items": 1
//!     },
//!     {
//!       "type": "file",
//!       "name": "notes.txt",
//!       "id": "f2",
//!       "size": 5,
//!       "mime_type": "text/plain",
//!       "mtime": "2024-04-18T08:21:33.000Z"
//!     }
//!   ]
//! }
//! ```

pub mod api;
mod builder;
mod course_fs;
mod dir;
mod dir_list;
mod errors;
mod options;
mod path;
pub mod studip;
mod tree;
pub mod utils;

pub use api::ContentStream;
pub use api::CourseApi;
pub use builder::BuildOptions;
pub use builder::BuildStats;
pub use builder::TreeBuilder;
pub use course_fs::CourseFs;
pub use dir::Directory;
pub use dir::DirectoryEntry;
pub use dir::compare_names;
pub use dir_list::FileInfo;
pub use dir_list::RecursiveDirList;
pub use errors::Error;
pub use options::DEFAULT_BASE_URL;
pub use options::Options;
pub use path::Path;
pub use studip::StudIpClient;
pub use tree::DIRECTORY_SIZE;
pub use tree::NodeKind;
pub use tree::TreeNode;

#[cfg(any(test, feature = "test_utils"))]
pub(crate) mod test_utils;
#[cfg(any(test, feature = "test_utils"))]
pub use test_utils::CallLog;
#[cfg(any(test, feature = "test_utils"))]
pub use test_utils::MockCourseApi;
#[cfg(any(test, feature = "test_utils"))]
pub use test_utils::Query;
