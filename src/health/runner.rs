//! 检测周期调度器
//!
//! 每个周期：加载全部任务，筛选到期任务，在有界并发池中分发检测，
//! 按完成顺序收集结果，为未返回结果的任务写入超时兜底结果，最后逐个写回存储。

use crate::error::Result;
use crate::health::checker::Checker;
use crate::job::{now_millis, Job, JobResult};
use crate::store::JobStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// 调度器运行参数
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerSettings {
    /// 并发检测池大小
    pub pool_size: usize,
    /// 单次请求超时
    pub request_timeout: Duration,
    /// 收集结果时在请求超时之外额外等待的时间
    pub collect_grace: Duration,
    /// 两个周期之间的间隔（上一周期结束到下一周期开始）
    pub delay: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            pool_size: 10,
            request_timeout: Duration::from_secs(30),
            collect_grace: Duration::from_secs(5),
            delay: Duration::from_secs(10),
        }
    }
}

impl RunnerSettings {
    /// 收集 `job_count` 个任务结果的最长等待时间
    ///
    /// 池中每一轮最多占用一个请求超时，共 `ceil(job_count / pool_size)` 轮。
    pub fn collect_deadline(&self, job_count: usize) -> Duration {
        let pool_size = self.pool_size.max(1);
        let waves = job_count.div_ceil(pool_size).max(1) as u32;
        self.request_timeout.saturating_mul(waves) + self.collect_grace
    }
}

/// 单个检测周期的统计
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// 周期ID
    pub cycle_id: Uuid,
    /// 到期任务数量
    pub due: usize,
    /// 收到真实检测结果的任务数量
    pub checked: usize,
    /// 写入超时兜底结果的任务数量
    pub timed_out: usize,
    /// 成功写回存储的任务数量
    pub saved: usize,
    /// 周期耗时
    pub elapsed: Duration,
}

/// 检测任务的返回值：(任务下标, 检测结果, 完成时间)
type TaskOutput = (usize, Option<(JobResult, i64)>);

/// 检测周期调度器
pub struct JobRunner {
    /// 任务存储
    store: Arc<dyn JobStore>,
    /// 检测器
    checker: Arc<dyn Checker>,
    /// 并发控制信号量
    pool: Arc<Semaphore>,
    /// 运行参数
    settings: RunnerSettings,
}

impl JobRunner {
    /// 创建新的调度器
    pub fn new(store: Arc<dyn JobStore>, checker: Arc<dyn Checker>, settings: RunnerSettings) -> Self {
        let pool = Arc::new(Semaphore::new(settings.pool_size.max(1)));
        Self {
            store,
            checker,
            pool,
            settings,
        }
    }

    /// 运行参数
    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// 执行一个检测周期
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let cycle_id = Uuid::new_v4();
        self.run_cycle_inner(cycle_id)
            .instrument(info_span!("cycle", %cycle_id))
            .await
    }

    async fn run_cycle_inner(&self, cycle_id: Uuid) -> Result<CycleReport> {
        let started = Instant::now();
        let mut jobs = self.load_due_jobs().await?;
        if !jobs.is_empty() {
            debug!("加载到期任务 {} 个", jobs.len());
        }

        let mut join_set = self.start_jobs(&jobs);
        let results = self.wait_for_results(&mut join_set, jobs.len()).await;
        let checked = results.len();
        let timed_out = self.merge_results(&mut jobs, results);
        let due = jobs.len();
        let saved = self.update_jobs(jobs).await;

        let report = CycleReport {
            cycle_id,
            due,
            checked,
            timed_out,
            saved,
            elapsed: started.elapsed(),
        };
        if report.due > 0 {
            info!(
                "检测周期完成: 到期 {}，完成 {}，超时 {}，写回 {}，耗时 {}ms",
                report.due,
                report.checked,
                report.timed_out,
                report.saved,
                report.elapsed.as_millis()
            );
        }
        Ok(report)
    }

    async fn load_due_jobs(&self) -> Result<Vec<Job>> {
        let now = now_millis();
        Ok(self
            .store
            .load_all()
            .await?
            .into_iter()
            .filter(|job| job.is_due_at(now))
            .collect())
    }

    fn start_jobs(&self, jobs: &[Job]) -> JoinSet<TaskOutput> {
        let mut join_set = JoinSet::new();
        for (index, job) in jobs.iter().enumerate() {
            let job = job.clone();
            let checker = Arc::clone(&self.checker);
            let pool = Arc::clone(&self.pool);

            join_set.spawn(async move {
                let _permit = match pool.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        warn!("获取并发许可失败，跳过本次检测: {}", job.name);
                        return (index, None);
                    }
                };

                let result = checker.check(&job).await;
                (index, Some((result, now_millis())))
            }
            .in_current_span());
        }
        join_set
    }

    /// 按完成顺序收集结果，超过收集期限后放弃剩余任务
    async fn wait_for_results(
        &self,
        join_set: &mut JoinSet<TaskOutput>,
        job_count: usize,
    ) -> HashMap<usize, (JobResult, i64)> {
        let mut results = HashMap::with_capacity(job_count);
        if job_count == 0 {
            return results;
        }

        let deadline = Instant::now() + self.settings.collect_deadline(job_count);
        loop {
            match tokio::time::timeout_at(deadline, join_set.join_next()).await {
                Ok(Some(Ok((index, Some(outcome))))) => {
                    results.insert(index, outcome);
                }
                Ok(Some(Ok((_, None)))) => {}
                Ok(Some(Err(e))) => {
                    error!("检测任务执行异常: {}", e);
                }
                Ok(None) => break,
                Err(_) => {
                    warn!("等待检测结果超时，放弃 {} 个未完成任务", join_set.len());
                    join_set.abort_all();
                    break;
                }
            }
        }
        results
    }

    /// 合并检测结果，返回写入超时兜底结果的任务数量
    fn merge_results(
        &self,
        jobs: &mut [Job],
        mut results: HashMap<usize, (JobResult, i64)>,
    ) -> usize {
        let mut not_checked = 0;
        let now = now_millis();
        for (index, job) in jobs.iter_mut().enumerate() {
            match results.remove(&index) {
                Some((result, completed_at)) => job.populate_from_result(&result, completed_at),
                None => {
                    warn!("任务未返回检测结果: {}", job.name);
                    job.mark_not_checked(now);
                    not_checked += 1;
                }
            }
        }
        not_checked
    }

    async fn update_jobs(&self, jobs: Vec<Job>) -> usize {
        let mut saved = 0;
        for job in jobs {
            let name = job.name.clone();
            match self.store.save(job).await {
                Ok(_) => saved += 1,
                Err(e) => error!("保存任务结果失败 {}: {}", name, e),
            }
        }
        saved
    }

    /// 立即检测单个任务，不经过到期判断
    ///
    /// 已有ID的任务会写回存储。
    pub async fn check_now(&self, mut job: Job) -> Result<Job> {
        let result = self.checker.check(&job).await;
        job.populate_from_result(&result, now_millis());
        if job.id.is_some() {
            return self.store.save(job).await;
        }
        Ok(job)
    }

    /// 按固定间隔循环执行检测周期，直到收到停止信号
    ///
    /// 间隔从上一周期结束开始计算。
    pub async fn run_loop(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            "检测调度器启动，周期间隔 {}ms，并发 {}",
            self.settings.delay.as_millis(),
            self.settings.pool_size
        );

        loop {
            if let Err(e) = self.run_cycle().await {
                error!("检测周期执行失败: {}", e);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.delay) => {}
                _ = shutdown.recv() => {
                    info!("检测调度器收到停止信号");
                    break;
                }
            }
        }

        info!("检测调度器已停止");
    }
}
