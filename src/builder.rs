use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Instant;

use async_recursion::async_recursion;
use log::debug;
use log::info;
use log::warn;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::sync::SemaphorePermit;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::Error;
use crate::api::CourseApi;
use crate::tree::NodeKind;
use crate::tree::TreeNode;

/// Limits applied while building a snapshot.
#[cfg_attr(feature = "json_schema", derive(schemars::JsonSchema))]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildOptions {
    /// Maximum number of remote fetches in flight at once. Unbounded when
    /// unset.
    #[serde(default)]
    pub max_concurrent_fetches: Option<usize>,
    /// Folders deeper than this are kept as empty directories and not
    /// descended into. The root folder has depth 0.
    #[serde(default)]
    pub max_depth: Option<usize>,
}

/// Counters collected during a build.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildStats {
    /// Folders populated, the root included.
    pub folders: usize,
    /// Files added to the snapshot.
    pub files: usize,
    /// Files left out because they are not readable or not downloadable.
    pub skipped_files: usize,
    /// Subfolder tasks spawned.
    pub tasks_spawned: usize,
    /// Subfolder tasks that reported back, successfully or not.
    pub tasks_completed: usize,
    /// Remote fetches issued.
    pub requests: usize,
}

#[derive(Default)]
struct Counters {
    folders: AtomicUsize,
    files: AtomicUsize,
    skipped_files: AtomicUsize,
    tasks_spawned: AtomicUsize,
    tasks_completed: AtomicUsize,
    requests: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize, by: usize) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn snapshot(&self) -> BuildStats {
        BuildStats {
            folders: self.folders.load(Ordering::Relaxed),
            files: self.files.load(Ordering::Relaxed),
            skipped_files: self.skipped_files.load(Ordering::Relaxed),
            tasks_spawned: self.tasks_spawned.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
        }
    }
}

/// Populates a directory node and everything below it, one task per
/// subfolder.
///
/// A folder's task waits for every subfolder task it spawned before fetching
/// its own files, even after one of them failed, and then reports at most one
/// of the failures. Children keep the order the remote store returned them in.
#[derive(Clone)]
pub struct TreeBuilder {
    api: Arc<dyn CourseApi>,
    cancel: CancellationToken,
    limiter: Option<Arc<Semaphore>>,
    max_depth: Option<usize>,
    counters: Arc<Counters>,
}

impl TreeBuilder {
    /// Creates a builder fetching through `api`.
    pub fn new(api: Arc<dyn CourseApi>, options: &BuildOptions, cancel: CancellationToken) -> Self {
        Self {
            api,
            cancel,
            limiter: options
                .max_concurrent_fetches
                .map(|n| Arc::new(Semaphore::new(n.max(1)))),
            max_depth: options.max_depth,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Builds the full tree below the folder `root_id`.
    pub async fn build(&self, root_id: &str) -> Result<TreeNode, Error> {
        let start = Instant::now();
        let root = self.fill_folder(TreeNode::root(root_id), 0).await?;
        let stats = self.stats();
        info!(
            "built snapshot of folder {root_id}: {} folders, {} files ({} skipped) in {:?}",
            stats.folders,
            stats.files,
            stats.skipped_files,
            start.elapsed()
        );
        Ok(root)
    }

    /// Counters collected so far.
    pub fn stats(&self) -> BuildStats {
        self.counters.snapshot()
    }

    fn check_cancelled(&self) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn permit(&self) -> Result<Option<SemaphorePermit<'_>>, Error> {
        match &self.limiter {
            Some(limiter) => limiter.acquire().await.map(Some).map_err(|e| Error::Sync {
                what: "fetch limiter".into(),
                how: e.to_string(),
            }),
            None => Ok(None),
        }
    }

    /// Runs one remote fetch. The limiter permit is held only for the fetch
    /// itself so a parent waiting on its children never starves them.
    async fn fetch<T, Fut>(&self, fetch: Fut) -> Result<T, Error>
    where
        Fut: Future<Output = Result<T, Error>>,
    {
        self.check_cancelled()?;
        let _permit = self.permit().await?;
        self.check_cancelled()?;
        Counters::bump(&self.counters.requests, 1);
        fetch.await
    }

    #[async_recursion]
    async fn fill_folder(&self, mut node: TreeNode, depth: usize) -> Result<TreeNode, Error> {
        self.check_cancelled()?;
        let NodeKind::Directory { children } = &mut node.kind else {
            return Err(Error::InvalidArgument(format!(
                "node {} isn't a folder",
                node.id
            )));
        };

        debug!("fetching subfolders of {}", node.id);
        let folders = self.fetch(self.api.fetch_subfolders(&node.id)).await?;
        let subfolders: Vec<TreeNode> = folders.into_iter().map(TreeNode::from_folder).collect();

        if self.max_depth.is_some_and(|max| depth >= max) {
            children.extend(subfolders);
        } else {
            children.extend(self.fill_subfolders(subfolders, depth).await?);
        }

        debug!("fetching files of {}", node.id);
        let files = self.fetch(self.api.fetch_files(&node.id)).await?;
        for file in files {
            if !file.is_accessible() {
                debug!("skipping inaccessible file {} ({})", file.name, file.id);
                Counters::bump(&self.counters.skipped_files, 1);
                continue;
            }
            Counters::bump(&self.counters.files, 1);
            children.push(TreeNode::from_file(file));
        }

        Counters::bump(&self.counters.folders, 1);
        Ok(node)
    }

    /// Spawns one task per subfolder and drains exactly as many reports as
    /// tasks were spawned.
    async fn fill_subfolders(&self, subfolders: Vec<TreeNode>, depth: usize) -> Result<Vec<TreeNode>, Error> {
        let expected = subfolders.len();
        if expected == 0 {
            return Ok(vec![]);
        }

        let (tx, mut rx) = mpsc::channel(expected);
        for (index, child) in subfolders.into_iter().enumerate() {
            let tx = tx.clone();
            let builder = self.clone();
            Counters::bump(&self.counters.tasks_spawned, 1);
            tokio::spawn(async move {
                let result = builder.fill_folder(child, depth + 1).await;
                Counters::bump(&builder.counters.tasks_completed, 1);
                // The receiver only goes away once every report was drained.
                let _ = tx.send((index, result)).await;
            });
        }
        drop(tx);

        let mut slots: Vec<Option<TreeNode>> = (0..expected).map(|_| None).collect();
        let mut failure = None;
        for _ in 0..expected {
            match rx.recv().await {
                Some((index, Ok(child))) => slots[index] = Some(child),
                Some((index, Err(e))) => {
                    warn!("building subfolder #{index} at depth {} failed: {e}", depth + 1);
                    failure.get_or_insert(e);
                }
                None => {
                    warn!("a subfolder task ended without reporting");
                    failure.get_or_insert(Error::Sync {
                        what: "subfolder task".into(),
                        how: "ended without reporting".into(),
                    });
                    break;
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(slots.into_iter().flatten().collect()),
        }
    }
}
