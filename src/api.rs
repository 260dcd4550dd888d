//! The read queries a course file store answers, independent of transport.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use futures_lite::Stream;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;

/// Folder type marking the top folder of a course.
pub const ROOT_FOLDER_TYPE: &str = "RootFolder";

/// Chunks of a file's content as they arrive from the remote store.
pub type ContentStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, Error>> + Send>>;

/// A course as returned by the course lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CourseRecord {
    /// Remote id of the course.
    pub id: String,
    /// Human readable course title.
    pub title: String,
}

/// A remote folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FolderRecord {
    /// Remote id of the folder.
    pub id: String,
    /// Display name of the folder.
    pub name: String,
    /// Remote folder type, `RootFolder` for the top folder of a course.
    pub folder_type: String,
    /// Last change of the folder.
    pub changed: DateTime<Utc>,
    /// Whether the folder is visible to the user.
    pub is_visible: bool,
    /// Whether the folder's content can be read by the user.
    pub is_readable: bool,
    /// Whether the user may write into the folder.
    pub is_writable: bool,
}

/// A remote file reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileRecord {
    /// Remote id of the file reference.
    pub id: String,
    /// Display name of the file.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// MIME type reported by the remote store.
    pub mime_type: String,
    /// Last change of the file.
    pub changed: DateTime<Utc>,
    /// Whether the user may read the file's metadata.
    pub is_readable: bool,
    /// Whether the user may download the file's content.
    pub is_downloadable: bool,
}

impl FileRecord {
    /// Files that can't be both read and downloaded are never exposed.
    pub fn is_accessible(&self) -> bool {
        self.is_readable && self.is_downloadable
    }
}

/// Read access to a course file store.
///
/// Every method is idempotent and side-effect free on the remote side.
/// Failures are `Error::Transport` or `Error::Decode` and are never retried by
/// the caller.
#[async_trait]
pub trait CourseApi: Send + Sync {
    /// Looks up the course itself.
    async fn fetch_course(&self, course_id: &str) -> Result<CourseRecord, Error>;

    /// Lists the top-level folders of a course.
    async fn fetch_course_folders(&self, course_id: &str) -> Result<Vec<FolderRecord>, Error>;

    /// Lists the immediate subfolders of a folder.
    async fn fetch_subfolders(&self, folder_id: &str) -> Result<Vec<FolderRecord>, Error>;

    /// Lists the immediate file references of a folder.
    async fn fetch_files(&self, folder_id: &str) -> Result<Vec<FileRecord>, Error>;

    /// Opens the content of a file reference.
    async fn open_file_content(&self, file_id: &str) -> Result<ContentStream, Error>;

    /// Returns the id of the course's root folder.
    async fn fetch_root_folder_id(&self, course_id: &str) -> Result<String, Error> {
        self.fetch_course_folders(course_id)
            .await?
            .into_iter()
            .find(|f| f.folder_type == ROOT_FOLDER_TYPE)
            .map(|f| f.id)
            .ok_or_else(|| Error::NotFound {
                what: format!("{ROOT_FOLDER_TYPE} of course {course_id}"),
            })
    }
}

/// How many pages of a collection are fetched.
#[cfg_attr(feature = "json_schema", derive(schemars::JsonSchema))]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Pagination {
    /// Keep requesting pages until `offset + limit >= total`.
    #[default]
    FollowAll,
    /// Only consume the first page the server returns.
    FirstPage,
}

/// Paging metadata attached to a collection response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Page {
    /// Index of the first item of this page.
    #[serde(default)]
    pub offset: u64,
    /// Maximum number of items per page.
    #[serde(default)]
    pub limit: u64,
    /// Number of items in the whole collection.
    #[serde(default)]
    pub total: u64,
}

impl Page {
    /// Offset of the page following this one, if the collection continues.
    pub fn next_offset(&self) -> Option<u64> {
        if self.limit == 0 {
            return None;
        }
        let next = self.offset.saturating_add(self.limit);
        (next < self.total).then_some(next)
    }
}

/// Requests pages through `fetch_page` and concatenates their items.
///
/// `fetch_page` receives `None` for the first request and
/// `Some((offset, limit))` for each following one. It returns the items of the
/// page together with the page metadata, if the server sent any. Walking stops
/// when the metadata says the collection is exhausted, when a page comes back
/// empty, or after the first page under `Pagination::FirstPage`.
///
/// A follow-up page whose metadata reports another offset than the requested
/// one fails with `Error::Decode`, so a server ignoring `page[offset]` can't
/// keep the walk going forever.
pub async fn collect_pages<T, F, Fut>(pagination: Pagination, mut fetch_page: F) -> Result<Vec<T>, Error>
where
    F: FnMut(Option<(u64, u64)>) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Option<Page>), Error>>,
{
    let mut items = Vec::new();
    let mut request = None;
    loop {
        let (mut data, page) = fetch_page(request).await?;
        let empty = data.is_empty();
        items.append(&mut data);
        if pagination == Pagination::FirstPage || empty {
            break;
        }
        let Some(page) = page else {
            break;
        };
        if let Some((requested, _)) = request
            && page.offset != requested
        {
            return Err(Error::Decode {
                what: "page metadata".into(),
                how: format!("requested offset {requested}, server answered with {}", page.offset),
            });
        }
        match page.next_offset() {
            Some(next) => request = Some((next, page.limit)),
            None => break,
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn serve(
        total: u64,
        limit: u64,
        calls: &Mutex<Vec<Option<(u64, u64)>>>,
        request: Option<(u64, u64)>,
    ) -> Result<(Vec<u64>, Option<Page>), Error> {
        calls.lock().unwrap().push(request);
        let (offset, limit) = request.unwrap_or((0, limit));
        let items = (offset..(offset + limit).min(total)).collect();
        Ok((
            items,
            Some(Page {
                offset,
                limit,
                total,
            }),
        ))
    }

    #[test]
    fn next_offset_stops_at_total() {
        let p = Page {
            offset: 0,
            limit: 30,
            total: 61,
        };
        assert_eq!(p.next_offset(), Some(30));
        let p = Page { offset: 60, ..p };
        assert_eq!(p.next_offset(), None);
        let p = Page {
            offset: 0,
            limit: 0,
            total: 10,
        };
        assert_eq!(p.next_offset(), None);
    }

    #[tokio::test]
    async fn follow_all_walks_every_page() {
        let calls = Mutex::new(Vec::new());
        let items = collect_pages(Pagination::FollowAll, |req| {
            std::future::ready(serve(7, 3, &calls, req))
        })
        .await
        .unwrap();
        assert_eq!(items, (0..7u64).collect::<Vec<_>>());
        assert_eq!(
            *calls.lock().unwrap(),
            vec![None, Some((3, 3)), Some((6, 3))]
        );
    }

    #[tokio::test]
    async fn first_page_caps_at_one_request() {
        let calls = Mutex::new(Vec::new());
        let items = collect_pages(Pagination::FirstPage, |req| {
            std::future::ready(serve(7, 3, &calls, req))
        })
        .await
        .unwrap();
        assert_eq!(items, vec![0u64, 1, 2]);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_metadata_means_single_page() {
        let items = collect_pages(Pagination::FollowAll, |_| {
            std::future::ready(Ok::<_, Error>((vec!["a", "b"], None)))
        })
        .await
        .unwrap();
        assert_eq!(items, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn ignored_offset_fails_instead_of_looping() {
        let calls = Mutex::new(Vec::new());
        let result = collect_pages(Pagination::FollowAll, |req| {
            calls.lock().unwrap().push(req);
            std::future::ready(Ok::<_, Error>((
                vec![1u64],
                Some(Page {
                    offset: 0,
                    limit: 1,
                    total: 2,
                }),
            )))
        })
        .await;
        assert!(matches!(result, Err(Error::Decode { .. })));
        assert_eq!(*calls.lock().unwrap(), vec![None, Some((1, 1))]);
    }

    #[tokio::test]
    async fn page_error_aborts_the_walk() {
        let result = collect_pages::<u64, _, _>(Pagination::FollowAll, |req| {
            std::future::ready(match req {
                None => Ok((
                    vec![1],
                    Some(Page {
                        offset: 0,
                        limit: 1,
                        total: 2,
                    }),
                )),
                Some(_) => Err(Error::Transport {
                    what: "page 2".into(),
                    how: "reset".into(),
                }),
            })
        })
        .await;
        assert!(matches!(result, Err(Error::Transport { .. })));
    }
}
