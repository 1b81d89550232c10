//! 任务存储模块
//!
//! 调度器通过 [`JobStore`] 读取全部任务并逐个写回检测结果。
//! 提供内存存储和基于JSON文件的存储两种实现。

pub mod file;
pub mod memory;

use crate::error::Result;
use crate::job::Job;
use async_trait::async_trait;
use tracing::{debug, info};

// 重新导出主要类型
pub use file::FileJobStore;
pub use memory::MemoryJobStore;

/// 任务存储trait
#[async_trait]
pub trait JobStore: Send + Sync {
    /// 加载全部任务
    async fn load_all(&self) -> Result<Vec<Job>>;

    /// 保存任务
    ///
    /// 没有ID的任务会被分配新ID，标签统一转换为大写。
    async fn save(&self, job: Job) -> Result<Job>;

    /// 按ID查找任务
    async fn find(&self, id: u64) -> Result<Option<Job>>;

    /// 删除任务，返回任务是否存在
    async fn delete(&self, id: u64) -> Result<bool>;

    /// 查找带有指定标签的任务，按名称排序
    async fn find_by_tag(&self, tag: &str) -> Result<Vec<Job>> {
        let tag = tag.to_uppercase();
        let mut jobs: Vec<Job> = self
            .load_all()
            .await?
            .into_iter()
            .filter(|job| job.tags.contains(&tag))
            .collect();
        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(jobs)
    }

    /// 按名称（忽略大小写的子串）或标签查找任务，按名称排序
    ///
    /// 空查询返回全部任务。
    async fn find_by_tag_or_name(&self, query: &str) -> Result<Vec<Job>> {
        let query = query.trim().to_uppercase();
        let mut jobs: Vec<Job> = self
            .load_all()
            .await?
            .into_iter()
            .filter(|job| {
                query.is_empty()
                    || job.name.to_uppercase().contains(&query)
                    || job.tags.contains(&query)
            })
            .collect();
        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(jobs)
    }

    /// 按名称精确查找任务
    async fn find_by_name(&self, name: &str) -> Result<Option<Job>> {
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .find(|job| job.name == name))
    }

    /// 所有标签，去重并排序
    async fn all_tags(&self) -> Result<Vec<String>> {
        let mut tags: Vec<String> = self
            .load_all()
            .await?
            .into_iter()
            .flat_map(|job| job.tags.into_iter())
            .collect();
        tags.sort();
        tags.dedup();
        Ok(tags)
    }
}

/// 将配置中声明的任务写入存储
///
/// 同名任务已存在时只刷新静态配置，保留其ID和最近结果。
///
/// # 返回
/// * `Result<usize>` - 新增的任务数量
pub async fn seed_jobs(store: &dyn JobStore, jobs: &[Job]) -> Result<usize> {
    let mut created = 0;
    for definition in jobs {
        match store.find_by_name(&definition.name).await? {
            Some(mut existing) => {
                existing.apply_definition(definition);
                store.save(existing).await?;
                debug!("刷新任务配置: {}", definition.name);
            }
            None => {
                let mut job = definition.clone();
                job.id = None;
                store.save(job).await?;
                created += 1;
            }
        }
    }
    info!("任务初始化完成，新增 {} 个，共声明 {} 个", created, jobs.len());
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(name: &str, tags: &[&str]) -> Job {
        Job::new(name, "http://localhost", "ok").with_tags(tags.iter().copied())
    }

    async fn populated_store() -> MemoryJobStore {
        let store = MemoryJobStore::new();
        store.save(job("foo2", &["tag1", "tag20"])).await.unwrap();
        store.save(job("foo1", &["tag1", "tag2", "tag3"])).await.unwrap();
        store.save(job("foo3", &["tag40", "tag2"])).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_all_tags_sorted_and_uppercased() {
        let store = populated_store().await;
        assert_eq!(
            store.all_tags().await.unwrap(),
            vec!["TAG1", "TAG2", "TAG20", "TAG3", "TAG40"]
        );
    }

    #[tokio::test]
    async fn test_find_by_tag_orders_by_name() {
        let store = populated_store().await;
        let names: Vec<String> = store
            .find_by_tag("tag2")
            .await
            .unwrap()
            .into_iter()
            .map(|job| job.name)
            .collect();
        assert_eq!(names, vec!["foo1", "foo3"]);
    }

    #[tokio::test]
    async fn test_find_by_tag_or_name() {
        let store = populated_store().await;

        let by_name = store.find_by_tag_or_name("FOO2").await.unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].name, "foo2");

        let by_tag = store.find_by_tag_or_name("tag40").await.unwrap();
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].name, "foo3");

        let all = store.find_by_tag_or_name("  ").await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].name, "foo1");
    }

    #[tokio::test]
    async fn test_seed_jobs_keeps_last_result() {
        let store = MemoryJobStore::new();
        let mut stored = store.save(job("svc", &[])).await.unwrap();
        stored.last_result = true;
        stored.last_timestamp = 1234;
        store.save(stored.clone()).await.unwrap();

        let declared = vec![
            job("svc", &["prod"]).with_interval_secs(60),
            job("other", &[]),
        ];
        let created = seed_jobs(&store, &declared).await.unwrap();
        assert_eq!(created, 1);

        let svc = store.find(stored.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(svc.interval_secs, 60);
        assert!(svc.tags.contains("PROD"));
        assert!(svc.last_result);
        assert_eq!(svc.last_timestamp, 1234);
        assert_eq!(store.load_all().await.unwrap().len(), 2);
    }
}
