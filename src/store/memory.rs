//! 内存任务存储

use crate::error::Result;
use crate::job::Job;
use crate::store::JobStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// 基于 `BTreeMap` 的内存任务存储
#[derive(Debug)]
pub struct MemoryJobStore {
    jobs: RwLock<BTreeMap<u64, Job>>,
    next_id: AtomicU64,
}

impl MemoryJobStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// 用已有任务创建存储，ID计数从最大ID之后继续
    pub fn with_jobs(jobs: impl IntoIterator<Item = Job>) -> Self {
        let (map, next_id) = index_jobs(jobs);
        Self {
            jobs: RwLock::new(map),
            next_id: AtomicU64::new(next_id),
        }
    }

    /// 用给定任务整体替换当前内容
    ///
    /// ID计数不会回退，避免重新分配已经用过的ID。
    pub async fn replace_all(&self, jobs: impl IntoIterator<Item = Job>) {
        let (map, next_id) = index_jobs(jobs);
        let mut guard = self.jobs.write().await;
        *guard = map;
        self.next_id.fetch_max(next_id, Ordering::SeqCst);
    }

    /// 当前所有任务的快照，按ID排序
    pub async fn snapshot(&self) -> Vec<Job> {
        self.jobs.read().await.values().cloned().collect()
    }
}

/// 按ID建立索引，为没有ID的任务从最大ID之后依次分配
fn index_jobs(jobs: impl IntoIterator<Item = Job>) -> (BTreeMap<u64, Job>, u64) {
    let mut map = BTreeMap::new();
    let mut pending = Vec::new();
    for job in jobs {
        match job.id {
            Some(id) => {
                map.insert(id, job);
            }
            None => pending.push(job),
        }
    }
    let mut next_id = map.keys().next_back().map_or(1, |max| max + 1);
    for mut job in pending {
        job.id = Some(next_id);
        map.insert(next_id, job);
        next_id += 1;
    }
    (map, next_id)
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn load_all(&self) -> Result<Vec<Job>> {
        Ok(self.snapshot().await)
    }

    async fn save(&self, mut job: Job) -> Result<Job> {
        job.uppercase_tags();
        let id = match job.id {
            Some(id) => {
                // 保证后续分配的ID不会与显式ID冲突
                self.next_id.fetch_max(id + 1, Ordering::SeqCst);
                id
            }
            None => self.next_id.fetch_add(1, Ordering::SeqCst),
        };
        job.id = Some(id);

        self.jobs.write().await.insert(id, job.clone());
        Ok(job)
    }

    async fn find(&self, id: u64) -> Result<Option<Job>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn delete(&self, id: u64) -> Result<bool> {
        Ok(self.jobs.write().await.remove(&id).is_some())
    }
}
