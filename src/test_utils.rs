use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use crate::Error;
use crate::api::ContentStream;
use crate::api::CourseApi;
use crate::api::CourseRecord;
use crate::api::FileRecord;
use crate::api::FolderRecord;
use crate::api::ROOT_FOLDER_TYPE;
use crate::utils::parse_timestamp;

// Every mock record carries this change time.
pub(crate) static CHANGED: &str = "2024-04-18T10:21:33+02:00";

/// Content chunks are split at this size so readers see several chunks.
const CHUNK: usize = 4;

/// Which query a call went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    /// `courses/{id}`
    Course,
    /// `courses/{id}/folders`
    CourseFolders,
    /// `folders/{id}/folders`
    Subfolders,
    /// `folders/{id}/file-refs`
    Files,
    /// `file-refs/{id}/content`
    Content,
}

/// Per-query call counters of a [`MockCourseApi`].
#[derive(Debug, Default)]
pub struct CallLog {
    counts: Mutex<HashMap<(Query, String), usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a CallLog);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl CallLog {
    fn enter(&self, query: Query, id: &str) -> InFlight<'_> {
        *self
            .counts
            .lock()
            .unwrap()
            .entry((query, id.to_owned()))
            .or_default() += 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(self)
    }

    /// Calls made to `query` for `id`.
    pub fn count(&self, query: Query, id: &str) -> usize {
        self.counts
            .lock()
            .unwrap()
            .get(&(query, id.to_owned()))
            .copied()
            .unwrap_or(0)
    }

    /// Subfolder listings requested for `folder_id`.
    pub fn subfolders_of(&self, folder_id: &str) -> usize {
        self.count(Query::Subfolders, folder_id)
    }

    /// File listings requested for `folder_id`.
    pub fn files_of(&self, folder_id: &str) -> usize {
        self.count(Query::Files, folder_id)
    }

    /// Content downloads requested for `file_id`.
    pub fn content_of(&self, file_id: &str) -> usize {
        self.count(Query::Content, file_id)
    }

    /// All calls made so far.
    pub fn total(&self) -> usize {
        self.counts.lock().unwrap().values().sum()
    }

    /// Highest number of calls that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// An in-memory course file store.
///
/// The course always has a root folder with id [`MockCourseApi::ROOT`];
/// folders and files are attached to a parent folder id and returned in the
/// order they were added.
#[derive(Debug)]
pub struct MockCourseApi {
    course_id: String,
    course_folders: Vec<FolderRecord>,
    subfolders: HashMap<String, Vec<FolderRecord>>,
    files: HashMap<String, Vec<FileRecord>>,
    contents: HashMap<String, Vec<u8>>,
    delays: HashMap<String, Duration>,
    failing_subfolders: HashSet<String>,
    failing_files: HashSet<String>,
    calls: CallLog,
}

impl MockCourseApi {
    /// Id of the course root folder.
    pub const ROOT: &'static str = "root";

    /// Creates a course with an empty root folder.
    pub fn new(course_id: &str) -> Self {
        let mut ret = Self {
            course_id: course_id.to_owned(),
            course_folders: vec![],
            subfolders: HashMap::new(),
            files: HashMap::new(),
            contents: HashMap::new(),
            delays: HashMap::new(),
            failing_subfolders: HashSet::new(),
            failing_files: HashSet::new(),
            calls: CallLog::default(),
        };
        ret.course_folders.push(Self::folder_record("other", "Homework", "HomeworkFolder"));
        ret.course_folders.push(Self::folder_record(Self::ROOT, "", ROOT_FOLDER_TYPE));
        ret
    }

    fn changed() -> DateTime<Utc> {
        parse_timestamp(CHANGED).expect("valid mock timestamp")
    }

    fn folder_record(id: &str, name: &str, folder_type: &str) -> FolderRecord {
        FolderRecord {
            id: id.to_owned(),
            name: name.to_owned(),
            folder_type: folder_type.to_owned(),
            changed: Self::changed(),
            is_visible: true,
            is_readable: true,
            is_writable: false,
        }
    }

    /// Drops the root folder from the course folder listing.
    pub fn without_root_folder(mut self) -> Self {
        self.course_folders
            .retain(|f| f.folder_type != ROOT_FOLDER_TYPE);
        self
    }

    /// Adds a subfolder `id` named `name` to `parent`.
    pub fn folder(mut self, parent: &str, id: &str, name: &str) -> Self {
        self.subfolders
            .entry(parent.to_owned())
            .or_default()
            .push(Self::folder_record(id, name, "StandardFolder"));
        self
    }

    /// Adds a readable, downloadable file of `size` bytes to `parent`.
    pub fn file(self, parent: &str, id: &str, name: &str, size: u64) -> Self {
        self.file_with_flags(parent, id, name, size, true, true)
    }

    /// Adds a file with explicit access flags to `parent`. Its content is
    /// `size` bytes of `x`.
    pub fn file_with_flags(
        mut self,
        parent: &str,
        id: &str,
        name: &str,
        size: u64,
        is_readable: bool,
        is_downloadable: bool,
    ) -> Self {
        self.files.entry(parent.to_owned()).or_default().push(FileRecord {
            id: id.to_owned(),
            name: name.to_owned(),
            size,
            mime_type: "text/plain".to_owned(),
            changed: Self::changed(),
            is_readable,
            is_downloadable,
        });
        self.contents.insert(id.to_owned(), vec![b'x'; size as usize]);
        self
    }

    /// Replaces the content served for `file_id`.
    pub fn content(mut self, file_id: &str, data: &[u8]) -> Self {
        self.contents.insert(file_id.to_owned(), data.to_vec());
        self
    }

    /// Delays the subfolder listing of `folder_id`.
    pub fn delay(mut self, folder_id: &str, delay: Duration) -> Self {
        self.delays.insert(folder_id.to_owned(), delay);
        self
    }

    /// Makes the subfolder listing of `folder_id` fail.
    pub fn fail_subfolders(mut self, folder_id: &str) -> Self {
        self.failing_subfolders.insert(folder_id.to_owned());
        self
    }

    /// Makes the file listing of `folder_id` fail.
    pub fn fail_files(mut self, folder_id: &str) -> Self {
        self.failing_files.insert(folder_id.to_owned());
        self
    }

    /// Calls received so far.
    pub fn calls(&self) -> &CallLog {
        &self.calls
    }

    fn unreachable(what: String) -> Error {
        Error::Transport {
            what,
            how: "connection reset by mock".into(),
        }
    }
}

#[async_trait]
impl CourseApi for MockCourseApi {
    async fn fetch_course(&self, course_id: &str) -> Result<CourseRecord, Error> {
        let _guard = self.calls.enter(Query::Course, course_id);
        Ok(CourseRecord {
            id: self.course_id.clone(),
            title: format!("Course {}", self.course_id),
        })
    }

    async fn fetch_course_folders(&self, course_id: &str) -> Result<Vec<FolderRecord>, Error> {
        let _guard = self.calls.enter(Query::CourseFolders, course_id);
        Ok(self.course_folders.clone())
    }

    async fn fetch_subfolders(&self, folder_id: &str) -> Result<Vec<FolderRecord>, Error> {
        let _guard = self.calls.enter(Query::Subfolders, folder_id);
        if let Some(delay) = self.delays.get(folder_id) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_subfolders.contains(folder_id) {
            return Err(Self::unreachable(format!("folders/{folder_id}/folders")));
        }
        Ok(self.subfolders.get(folder_id).cloned().unwrap_or_default())
    }

    async fn fetch_files(&self, folder_id: &str) -> Result<Vec<FileRecord>, Error> {
        let _guard = self.calls.enter(Query::Files, folder_id);
        if self.failing_files.contains(folder_id) {
            return Err(Self::unreachable(format!("folders/{folder_id}/file-refs")));
        }
        Ok(self.files.get(folder_id).cloned().unwrap_or_default())
    }

    async fn open_file_content(&self, file_id: &str) -> Result<ContentStream, Error> {
        let _guard = self.calls.enter(Query::Content, file_id);
        let data = self
            .contents
            .get(file_id)
            .ok_or_else(|| Self::unreachable(format!("file-refs/{file_id}/content")))?;
        let chunks: Vec<Result<Vec<u8>, Error>> =
            data.chunks(CHUNK).map(|c| Ok(c.to_vec())).collect();
        Ok(Box::pin(futures_lite::stream::iter(chunks)))
    }
}
