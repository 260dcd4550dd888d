//! [`CourseApi`] over the Stud.IP JSON:API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use futures_lite::StreamExt;
use log::debug;
use reqwest::Client;
use reqwest::Response;
use reqwest::Url;
use reqwest::header::ACCEPT;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::Error;
use crate::Options;
use crate::api::ContentStream;
use crate::api::CourseApi;
use crate::api::CourseRecord;
use crate::api::FileRecord;
use crate::api::FolderRecord;
use crate::api::Page;
use crate::api::Pagination;
use crate::api::collect_pages;

const JSON_API: &str = "application/vnd.api+json";

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(default)]
    page: Option<Page>,
}

#[derive(Debug, Deserialize)]
struct Collection<A> {
    #[serde(default)]
    meta: Option<Meta>,
    data: Vec<Resource<A>>,
}

#[derive(Debug, Deserialize)]
struct Single<A> {
    data: Resource<A>,
}

#[derive(Debug, Deserialize)]
struct Resource<A> {
    id: String,
    attributes: A,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CourseAttributes {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct FolderAttributes {
    #[serde(default)]
    folder_type: String,
    name: String,
    chdate: DateTime<Utc>,
    #[serde(default)]
    is_visible: bool,
    #[serde(default)]
    is_readable: bool,
    #[serde(default)]
    is_writable: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct FileAttributes {
    name: String,
    #[serde(default)]
    filesize: u64,
    #[serde(default)]
    mime_type: String,
    chdate: DateTime<Utc>,
    #[serde(default)]
    is_readable: bool,
    #[serde(default)]
    is_downloadable: bool,
}

impl From<Resource<CourseAttributes>> for CourseRecord {
    fn from(r: Resource<CourseAttributes>) -> Self {
        CourseRecord {
            id: r.id,
            title: r.attributes.title,
        }
    }
}

impl From<Resource<FolderAttributes>> for FolderRecord {
    fn from(r: Resource<FolderAttributes>) -> Self {
        let a = r.attributes;
        FolderRecord {
            id: r.id,
            name: a.name,
            folder_type: a.folder_type,
            changed: a.chdate,
            is_visible: a.is_visible,
            is_readable: a.is_readable,
            is_writable: a.is_writable,
        }
    }
}

impl From<Resource<FileAttributes>> for FileRecord {
    fn from(r: Resource<FileAttributes>) -> Self {
        let a = r.attributes;
        FileRecord {
            id: r.id,
            name: a.name,
            size: a.filesize,
            mime_type: a.mime_type,
            changed: a.chdate,
            is_readable: a.is_readable,
            is_downloadable: a.is_downloadable,
        }
    }
}

/// Authenticated client for one Stud.IP installation.
#[derive(Debug, Clone)]
pub struct StudIpClient {
    client: Client,
    base: Url,
    username: String,
    password: String,
    pagination: Pagination,
}

impl StudIpClient {
    /// Creates a client from validated `options`.
    pub fn new(options: &Options) -> Result<Self, Error> {
        let base = options.validate()?;
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_API));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(options.request_timeout_secs))
            .build()
            .map_err(|e| Error::InvalidArgument(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base,
            username: options.username.clone(),
            password: options.password.clone(),
            pagination: options.pagination,
        })
    }

    fn endpoint(&self, path: &str, page: Option<(u64, u64)>) -> Result<Url, Error> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| Error::InvalidArgument(format!("invalid endpoint {path}: {e}")))?;
        if let Some((offset, limit)) = page {
            url.query_pairs_mut()
                .append_pair("page[offset]", &offset.to_string())
                .append_pair("page[limit]", &limit.to_string());
        }
        Ok(url)
    }

    async fn get(&self, url: Url, what: &str) -> Result<Response, Error> {
        debug!("GET {url}");
        self.client
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(|e| Error::Transport {
                what: what.to_owned(),
                how: e.to_string(),
            })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T, Error> {
        let body = self
            .get(url, what)
            .await?
            .bytes()
            .await
            .map_err(|e| Error::Transport {
                what: what.to_owned(),
                how: e.to_string(),
            })?;
        decode(&body, what)
    }

    async fn get_collection<A>(&self, path: &str) -> Result<Vec<Resource<A>>, Error>
    where
        A: DeserializeOwned + Send,
    {
        collect_pages(self.pagination, |page| async move {
            let url = self.endpoint(path, page)?;
            let body: Collection<A> = self.get_json(url, path).await?;
            Ok::<_, Error>((body.data, body.meta.and_then(|m| m.page)))
        })
        .await
    }
}

fn decode<T: DeserializeOwned>(body: &[u8], what: &str) -> Result<T, Error> {
    serde_json::from_slice(body).map_err(|e| Error::Decode {
        what: what.to_owned(),
        how: e.to_string(),
    })
}

#[async_trait]
impl CourseApi for StudIpClient {
    async fn fetch_course(&self, course_id: &str) -> Result<CourseRecord, Error> {
        let path = format!("courses/{course_id}");
        let body: Single<CourseAttributes> = self.get_json(self.endpoint(&path, None)?, &path).await?;
        Ok(body.data.into())
    }

    async fn fetch_course_folders(&self, course_id: &str) -> Result<Vec<FolderRecord>, Error> {
        let path = format!("courses/{course_id}/folders");
        let folders = self.get_collection::<FolderAttributes>(&path).await?;
        Ok(folders.into_iter().map(FolderRecord::from).collect())
    }

    async fn fetch_subfolders(&self, folder_id: &str) -> Result<Vec<FolderRecord>, Error> {
        let path = format!("folders/{folder_id}/folders");
        let folders = self.get_collection::<FolderAttributes>(&path).await?;
        Ok(folders.into_iter().map(FolderRecord::from).collect())
    }

    async fn fetch_files(&self, folder_id: &str) -> Result<Vec<FileRecord>, Error> {
        let path = format!("folders/{folder_id}/file-refs");
        let files = self.get_collection::<FileAttributes>(&path).await?;
        Ok(files.into_iter().map(FileRecord::from).collect())
    }

    async fn open_file_content(&self, file_id: &str) -> Result<ContentStream, Error> {
        let path = format!("file-refs/{file_id}/content");
        let response = self.get(self.endpoint(&path, None)?, &path).await?;
        let stream = response.bytes_stream().map(move |chunk| {
            chunk.map(|bytes| bytes.to_vec()).map_err(|e| Error::Transport {
                what: path.clone(),
                how: e.to_string(),
            })
        });
        Ok(Box::pin(stream))
    }
}
