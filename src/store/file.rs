//! JSON文件任务存储
//!
//! 每次读写前先从文件重新加载，修改后通过临时文件 + 重命名整体写回。
//! 多个进程共用同一文件时，各自新增或删除的任务不会互相覆盖；
//! 但同时修改同一个任务时，以最后写入者为准。

use crate::error::{Result, StoreError};
use crate::job::Job;
use crate::store::{JobStore, MemoryJobStore};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// 基于JSON文件的任务存储
#[derive(Debug)]
pub struct FileJobStore {
    path: PathBuf,
    inner: MemoryJobStore,
    /// 串行化“重新加载 + 修改 + 写文件”
    write_lock: Mutex<()>,
}

impl FileJobStore {
    /// 打开存储文件，文件不存在时创建空存储
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let jobs = match read_jobs(&path).await? {
            Some(jobs) => jobs,
            None => {
                info!("存储文件不存在，使用空存储: {}", path.display());
                Vec::new()
            }
        };

        debug!("从 {} 加载了 {} 个任务", path.display(), jobs.len());

        Ok(Self {
            path,
            inner: MemoryJobStore::with_jobs(jobs),
            write_lock: Mutex::new(()),
        })
    }

    /// 用文件中的最新内容替换内存中的任务
    ///
    /// 文件被外部删除时保留内存中的任务，下一次写入会重新创建文件。
    /// 调用方必须持有 `write_lock`。
    async fn reload(&self) -> Result<()> {
        if let Some(jobs) = read_jobs(&self.path).await? {
            self.inner.replace_all(jobs).await;
        }
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let jobs = self.inner.snapshot().await;
        let json = serde_json::to_string_pretty(&jobs)?;

        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
            }
        }

        // 其他进程读取时不会看到写了一半的文件
        let tmp_path = temp_path(&self.path);
        tokio::fs::write(&tmp_path, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(io_err)?;
        Ok(())
    }
}

/// 读取并解析存储文件，文件不存在时返回 `None`
async fn read_jobs(path: &Path) -> Result<Option<Vec<Job>>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) if content.trim().is_empty() => Ok(Some(Vec::new())),
        Ok(content) => serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| {
                StoreError::Corrupt {
                    path: path.display().to_string(),
                    source,
                }
                .into()
            }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Io {
            path: path.display().to_string(),
            source,
        }
        .into()),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "jobs.json".to_string());
    path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()))
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn load_all(&self) -> Result<Vec<Job>> {
        let _guard = self.write_lock.lock().await;
        self.reload().await?;
        self.inner.load_all().await
    }

    async fn save(&self, job: Job) -> Result<Job> {
        let _guard = self.write_lock.lock().await;
        self.reload().await?;
        let saved = self.inner.save(job).await?;
        self.flush().await?;
        Ok(saved)
    }

    async fn find(&self, id: u64) -> Result<Option<Job>> {
        let _guard = self.write_lock.lock().await;
        self.reload().await?;
        self.inner.find(id).await
    }

    async fn delete(&self, id: u64) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        self.reload().await?;
        let removed = self.inner.delete(id).await?;
        if removed {
            self.flush().await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = FileJobStore::open(dir.path().join("jobs.json")).await.unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("jobs.json");

        let store = FileJobStore::open(&path).await.unwrap();
        let mut job = store
            .save(Job::new("svc", "http://localhost", "ok").with_tags(["web"]))
            .await
            .unwrap();
        job.last_message = "timeout?".to_string();
        store.save(job).await.unwrap();
        drop(store);

        let reopened = FileJobStore::open(&path).await.unwrap();
        let jobs = reopened.load_all().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].last_message, "timeout?");
        assert!(jobs[0].tags.contains("WEB"));

        let next = reopened.save(Job::new("b", "http://b", "ok")).await.unwrap();
        assert_eq!(next.id, Some(2));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jobs.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = FileJobStore::open(&path).await.unwrap_err();
        assert!(err.to_string().contains("存储文件解析失败"));
    }

    #[tokio::test]
    async fn test_writers_sharing_a_file_keep_each_others_jobs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jobs.json");

        let first = FileJobStore::open(&path).await.unwrap();
        let mut billing = first
            .save(Job::new("billing", "http://billing", "UP"))
            .await
            .unwrap();

        let second = FileJobStore::open(&path).await.unwrap();
        let orders = second
            .save(Job::new("orders", "http://orders", "UP"))
            .await
            .unwrap();
        assert_eq!(orders.id, Some(2));

        // 第一个实例不知道 orders，写回时也不能把它覆盖掉
        billing.last_message = "timeout?".to_string();
        first.save(billing).await.unwrap();
        assert!(first.find(2).await.unwrap().is_some());

        let reopened = FileJobStore::open(&path).await.unwrap();
        let jobs = reopened.load_all().await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].name, "billing");
        assert_eq!(jobs[0].last_message, "timeout?");
        assert_eq!(jobs[1].name, "orders");

        // 另一个实例删除的任务，读取时同样可见
        assert!(second.delete(1).await.unwrap());
        assert_eq!(first.load_all().await.unwrap().len(), 1);
        assert!(!dir
            .path()
            .read_dir()
            .unwrap()
            .any(|entry| entry.unwrap().file_name().to_string_lossy().ends_with(".tmp")));
    }
}
