use std::sync::Arc;

use futures_lite::StreamExt;
use log::debug;
use log::info;
use tokio_util::sync::CancellationToken;

use crate::BuildStats;
use crate::Directory;
use crate::DirectoryEntry;
use crate::Error;
use crate::Options;
use crate::Path;
use crate::RecursiveDirList;
use crate::api::ContentStream;
use crate::api::CourseApi;
use crate::builder::TreeBuilder;
use crate::studip::StudIpClient;
use crate::tree::TreeNode;

/// A read-only view of one course's files.
///
/// The whole folder tree is fetched once when the session is created and kept
/// as an immutable snapshot. Listings and lookups are answered from the
/// snapshot; only file content is fetched on demand. Write-class operations
/// are refused with `Error::PermissionDenied` without contacting the remote
/// store.
#[derive(Clone)]
pub struct CourseFs {
    course_id: String,
    api: Arc<dyn CourseApi>,
    root: Arc<TreeNode>,
    stats: BuildStats,
}

impl std::fmt::Debug for CourseFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CourseFs")
            .field("course_id", &self.course_id)
            .field("root", &self.root.id)
            .field("stats", &self.stats)
            .finish()
    }
}

impl CourseFs {
    /// Connects to the Stud.IP installation in `options` and builds the
    /// snapshot of the configured course.
    pub async fn connect(options: &Options, cancel: &CancellationToken) -> Result<Self, Error> {
        let api = Arc::new(StudIpClient::new(options)?);
        Self::from_api(api, options, cancel).await
    }

    /// Builds the snapshot of `options.course_id` through `api`.
    ///
    /// Fails if the course lookup returns another course, if the course has no
    /// root folder, if any fetch of the build fails, or if `options.root` is
    /// not a directory of the course.
    pub async fn from_api(
        api: Arc<dyn CourseApi>,
        options: &Options,
        cancel: &CancellationToken,
    ) -> Result<Self, Error> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let course_id = options.course_id.as_str();
        debug!("initializing course {course_id} for root {:?}", options.root);

        let course = api.fetch_course(course_id).await?;
        if course.id != course_id {
            return Err(Error::CourseMismatch {
                expected: course_id.to_owned(),
                received: course.id,
            });
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let root_id = api.fetch_root_folder_id(course_id).await?;
        let builder = TreeBuilder::new(api.clone(), &options.build, cancel.clone());
        let tree = builder.build(&root_id).await?;

        let root_path = parse_dir(&options.root)?;
        let root = match tree.into_subtree(root_path.components()) {
            Some(node) if node.is_dir() => node,
            _ => {
                return Err(Error::DirectoryNotFound {
                    path: root_path.to_string(),
                });
            }
        };

        info!("course {course_id} ({}) ready with {} entries", course.title, root.descendants());
        Ok(Self {
            course_id: course_id.to_owned(),
            api,
            root: Arc::new(root),
            stats: builder.stats(),
        })
    }

    /// The course this session exposes.
    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    /// The root of the snapshot.
    pub fn snapshot(&self) -> &TreeNode {
        &self.root
    }

    /// Counters collected while building the snapshot.
    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    fn lookup(&self, path: &Path) -> Option<&TreeNode> {
        self.root.resolve(path.components())
    }

    /// Lists the directory at `path`.
    pub fn read_dir(&self, path: &Path) -> Result<Directory, Error> {
        Directory::project(path.clone(), self.lookup(path))
    }

    /// Lists the directory at the slash-delimited `dir`. `""` and `"."` list
    /// the root.
    pub fn list(&self, dir: &str) -> Result<Directory, Error> {
        self.read_dir(&parse_dir(dir)?)
    }

    /// Describes the file or directory at `path`.
    pub fn stat(&self, path: &str) -> Result<DirectoryEntry, Error> {
        let parsed = parse_object(path)?;
        self.lookup(&parsed)
            .map(DirectoryEntry::from)
            .ok_or_else(|| Error::ObjectNotFound {
                path: parsed.to_string(),
            })
    }

    /// Lists everything below the directory at `dir`.
    pub fn walk(&self, dir: &str) -> Result<RecursiveDirList, Error> {
        let parsed = parse_dir(dir)?;
        let node = self.lookup(&parsed);
        RecursiveDirList::collect(parsed, node)
    }

    /// Opens the content of the file at `path`.
    pub async fn open(&self, path: &str, cancel: &CancellationToken) -> Result<ContentStream, Error> {
        let parsed = parse_object(path)?;
        let node = self.lookup(&parsed).ok_or_else(|| Error::ObjectNotFound {
            path: parsed.to_string(),
        })?;
        if node.is_dir() {
            return Err(Error::NotAFile {
                path: parsed.to_string(),
            });
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        debug!("opening {parsed} ({})", node.id);
        self.api.open_file_content(&node.id).await
    }

    /// Reads the whole content of the file at `path` into memory.
    pub async fn read(&self, path: &str, cancel: &CancellationToken) -> Result<Vec<u8>, Error> {
        let mut stream = self.open(path, cancel).await?;
        let mut data = Vec::new();
        while let Some(chunk) = stream.next().await {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            data.extend_from_slice(&chunk?);
        }
        Ok(data)
    }

    /// Content hashes are not provided by the remote store.
    pub fn hash(&self, _path: &str) -> Result<String, Error> {
        Err(Error::Unsupported {
            operation: "hash".into(),
        })
    }

    /// Refused: the course store is read-only.
    pub fn mkdir(&self, dir: &str) -> Result<(), Error> {
        Err(Error::permission_denied("mkdir", dir))
    }

    /// Refused: the course store is read-only.
    pub fn rmdir(&self, dir: &str) -> Result<(), Error> {
        Err(Error::permission_denied("rmdir", dir))
    }

    /// Refused: the course store is read-only.
    pub fn purge(&self, dir: &str) -> Result<(), Error> {
        Err(Error::permission_denied("purge", dir))
    }

    /// Refused: the course store is read-only.
    pub fn put(&self, path: &str, _data: &[u8]) -> Result<DirectoryEntry, Error> {
        Err(Error::permission_denied("put", path))
    }

    /// Refused: the course store is read-only.
    pub fn copy(&self, _from: &str, to: &str) -> Result<DirectoryEntry, Error> {
        Err(Error::permission_denied("copy", to))
    }

    /// Refused: the course store is read-only.
    pub fn rename(&self, from: &str, _to: &str) -> Result<DirectoryEntry, Error> {
        Err(Error::permission_denied("rename", from))
    }

    /// Refused: the course store is read-only.
    pub fn dir_move(&self, from: &str, _to: &str) -> Result<(), Error> {
        Err(Error::permission_denied("dir_move", from))
    }

    /// Refused: the course store is read-only.
    pub fn remove(&self, path: &str) -> Result<(), Error> {
        Err(Error::permission_denied("remove", path))
    }

    /// Refused: the course store is read-only.
    pub fn set_modified(&self, path: &str, _mtime: chrono::DateTime<chrono::Utc>) -> Result<(), Error> {
        Err(Error::permission_denied("set_modified", path))
    }
}

/// A path that can't be parsed names no directory of the snapshot.
fn parse_dir(dir: &str) -> Result<Path, Error> {
    Path::parse(dir).map_err(|_| Error::DirectoryNotFound { path: dir.to_owned() })
}

/// A path that can't be parsed names no node of the snapshot.
fn parse_object(path: &str) -> Result<Path, Error> {
    Path::parse(path).map_err(|_| Error::ObjectNotFound {
        path: path.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::test_utils::MockCourseApi;

    const COURSE: &str = "c1";

    fn options() -> Options {
        Options::new("user", "secret", COURSE)
    }

    fn sample_api() -> MockCourseApi {
        MockCourseApi::new(COURSE)
            .folder(MockCourseApi::ROOT, "docs", "docs")
            .file("docs", "a", "a.pdf", 10)
            .file_with_flags("docs", "hidden", "hidden.pdf", 3, true, false)
            .file(MockCourseApi::ROOT, "notes", "notes.txt", 5)
            .content("notes", b"hello course")
    }

    async fn session(api: &Arc<MockCourseApi>) -> CourseFs {
        CourseFs::from_api(api.clone(), &options(), &CancellationToken::new())
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn end_to_end_listing_and_lookup() {
        let api = Arc::new(sample_api());
        let fs = session(&api).await;

        let root = fs.list("").unwrap();
        assert_eq!(root.items.len(), 2);
        assert!(root.items[0].is_dir());
        assert_eq!(root.items[0].name(), "docs");
        assert!(matches!(
            &root.items[1],
            DirectoryEntry::File { name, size: 5, .. } if name == "notes.txt"
        ));

        let a = fs.snapshot().resolve(&["docs", "a.pdf"]).unwrap();
        assert!(!a.is_dir());
        assert_eq!(a.size(), 10);
        assert!(matches!(fs.stat("docs/a.pdf").unwrap(), DirectoryEntry::File { size: 10, .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn root_spellings_list_the_same_directory() {
        let api = Arc::new(sample_api());
        let fs = session(&api).await;
        let expected = fs.list("").unwrap();
        assert_eq!(fs.list(".").unwrap(), expected);
        assert_eq!(fs.list("/").unwrap(), expected);
        assert_eq!(fs.read_dir(&Path::empty()).unwrap(), expected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn listings_never_touch_the_remote_store() {
        let api = Arc::new(sample_api());
        let fs = session(&api).await;
        let before = api.calls().total();
        fs.list("docs").unwrap();
        fs.list("./docs/").unwrap();
        fs.stat("notes.txt").unwrap();
        fs.walk("").unwrap();
        assert_eq!(api.calls().total(), before);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn inaccessible_file_is_neither_listed_nor_openable() {
        let api = Arc::new(sample_api());
        let fs = session(&api).await;
        let docs = fs.list("docs").unwrap();
        assert!(docs.items.iter().all(|e| e.name() != "hidden.pdf"));
        assert!(fs.walk("").unwrap().entries.iter().all(|e| e.entry.name() != "hidden.pdf"));
        let result = fs.open("docs/hidden.pdf", &CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::ObjectNotFound { .. })));
        assert_eq!(api.calls().content_of("hidden"), 0);
        assert_eq!(fs.stats().skipped_files, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_or_file_paths_are_directory_not_found() {
        let api = Arc::new(sample_api());
        let fs = session(&api).await;
        assert!(matches!(fs.list("nope"), Err(Error::DirectoryNotFound { .. })));
        assert!(matches!(fs.list("notes.txt"), Err(Error::DirectoryNotFound { .. })));
        assert!(matches!(fs.list("Docs"), Err(Error::DirectoryNotFound { .. })));
        assert!(matches!(fs.list("../etc"), Err(Error::DirectoryNotFound { .. })));
        assert!(matches!(fs.list("../docs"), Err(Error::DirectoryNotFound { .. })));
        assert!(matches!(fs.walk("docs/.."), Err(Error::DirectoryNotFound { .. })));
        // The snapshot survives failed lookups.
        assert!(fs.list("docs").is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn file_content_is_fetched_on_demand() {
        let api = Arc::new(sample_api());
        let fs = session(&api).await;
        assert_eq!(api.calls().content_of("notes"), 0);
        let data = fs.read("notes.txt", &CancellationToken::new()).await.unwrap();
        assert_eq!(data, b"hello course");
        assert_eq!(api.calls().content_of("notes"), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn parent_components_name_no_object() {
        let api = Arc::new(sample_api());
        let fs = session(&api).await;
        assert!(matches!(fs.stat("docs/../notes.txt"), Err(Error::ObjectNotFound { .. })));
        let result = fs.open("../notes.txt", &CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::ObjectNotFound { .. })));
        assert_eq!(api.calls().content_of("notes"), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn directories_cannot_be_opened() {
        let api = Arc::new(sample_api());
        let fs = session(&api).await;
        let result = fs.open("docs", &CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::NotAFile { .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn write_class_calls_are_refused_locally() {
        let api = Arc::new(sample_api());
        let fs = session(&api).await;
        let before = api.calls().total();

        let denied = |r: Result<(), Error>| matches!(r, Err(Error::PermissionDenied { .. }));
        assert!(denied(fs.mkdir("new")));
        assert!(denied(fs.rmdir("docs")));
        assert!(denied(fs.purge("docs")));
        assert!(denied(fs.put("docs/b.pdf", b"data").map(|_| ())));
        assert!(denied(fs.copy("notes.txt", "copy.txt").map(|_| ())));
        assert!(denied(fs.rename("notes.txt", "renamed.txt").map(|_| ())));
        assert!(denied(fs.dir_move("docs", "moved")));
        assert!(denied(fs.remove("notes.txt")));
        assert!(denied(fs.set_modified("notes.txt", Utc::now())));
        assert!(matches!(fs.hash("notes.txt"), Err(Error::Unsupported { .. })));

        assert_eq!(api.calls().total(), before);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_root_folder_fails_initialization() {
        let api = Arc::new(sample_api().without_root_folder());
        let result = CourseFs::from_api(api, &options(), &CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn course_mismatch_fails_initialization() {
        let api = Arc::new(MockCourseApi::new("other-course"));
        let result = CourseFs::from_api(api.clone(), &options(), &CancellationToken::new()).await;
        assert_eq!(
            result.map(|_| ()),
            Err(Error::CourseMismatch {
                expected: COURSE.into(),
                received: "other-course".into()
            })
        );
        assert_eq!(api.calls().subfolders_of(MockCourseApi::ROOT), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn any_build_failure_leaves_no_snapshot() {
        let api = Arc::new(sample_api().fail_files("docs"));
        let result = CourseFs::from_api(api, &options(), &CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::Transport { .. })));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn root_option_exposes_a_subdirectory() {
        let api = Arc::new(sample_api());
        let mut opts = options();
        opts.root = "docs".into();
        let fs = CourseFs::from_api(api.clone(), &opts, &CancellationToken::new())
            .await
            .unwrap();
        let listing = fs.list("").unwrap();
        let names: Vec<&str> = listing.items.iter().map(|e| e.name()).collect();
        assert_eq!(names, ["a.pdf"]);

        opts.root = "../docs".into();
        let result = CourseFs::from_api(api.clone(), &opts, &CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::DirectoryNotFound { .. })));

        opts.root = "notes.txt".into();
        let result = CourseFs::from_api(api, &opts, &CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::DirectoryNotFound { .. })));
    }

    #[tokio::test]
    async fn cancelled_session_does_not_start() {
        let api = Arc::new(sample_api());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = CourseFs::from_api(api.clone(), &options(), &cancel).await;
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(api.calls().total(), 0);
    }
}
