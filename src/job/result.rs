//! 检测结果数据结构
//!
//! 定义单次检测结果和按标签聚合的健康结果

use crate::job::model::{Job, NOT_CHECKED_MESSAGE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 单次检测结果
///
/// 由检测器生成，调度器用它覆盖任务的最近结果字段后即丢弃。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    /// 产生该结果的任务ID
    pub job_id: Option<u64>,
    /// 是否成功（`error` 为空）
    pub success: bool,
    /// 检测耗时（毫秒）
    pub duration_ms: u64,
    /// 提取到的版本号
    pub version: String,
    /// 提取到的构建时间
    pub build_timestamp: String,
    /// 错误信息，空字符串表示成功
    pub error: String,
}

impl JobResult {
    /// 创建新的检测结果，`success` 由 `error` 是否为空决定
    pub fn new(
        job: &Job,
        duration: Duration,
        version: String,
        build_timestamp: String,
        error: String,
    ) -> Self {
        Self {
            job_id: job.id,
            success: error.is_empty(),
            duration_ms: duration.as_millis() as u64,
            version,
            build_timestamp,
            error,
        }
    }

    /// 未收到检测结果时的兜底结果
    pub fn timeout(job: &Job) -> Self {
        Self {
            job_id: job.id,
            success: false,
            duration_ms: 0,
            version: String::new(),
            build_timestamp: String::new(),
            error: NOT_CHECKED_MESSAGE.to_string(),
        }
    }
}

/// 按标签聚合的健康结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagResult {
    /// 标签
    pub tag: String,
    /// 该标签下所有任务都成功时为 true
    pub success: bool,
    /// 代表任务的最近检测时间
    pub last_timestamp: i64,
    /// 该标签下的任务
    pub jobs: Vec<Job>,
}

impl TagResult {
    /// 聚合标签下所有任务的最近结果
    ///
    /// 代表任务按 `last_build_timestamp` 的字符串大小选取，不解析为日期；
    /// 并列时取最靠前的任务。没有任务时返回 `None`。
    pub fn aggregate(tag: impl Into<String>, jobs: Vec<Job>) -> Option<Self> {
        let (first, rest) = jobs.split_first()?;
        let representative = rest.iter().fold(first, |best, job| {
            if job.last_build_timestamp > best.last_build_timestamp {
                job
            } else {
                best
            }
        });
        let last_timestamp = representative.last_timestamp;
        let success = jobs.iter().all(|job| job.last_result);

        Some(Self {
            tag: tag.into(),
            success,
            last_timestamp,
            jobs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_with(name: &str, last_result: bool, build_ts: &str, last_ts: i64) -> Job {
        let mut job = Job::new(name, "http://localhost", "ok").with_tags(["TAG1"]);
        job.last_result = last_result;
        job.last_build_timestamp = build_ts.to_string();
        job.last_timestamp = last_ts;
        job
    }

    #[test]
    fn test_result_success_follows_error() {
        let job = Job::new("svc", "http://localhost", "ok");
        let ok = JobResult::new(&job, Duration::from_millis(12), "1.0.0".into(), String::new(), String::new());
        assert!(ok.success);
        assert_eq!(ok.duration_ms, 12);

        let failed = JobResult::new(
            &job,
            Duration::from_millis(3),
            String::new(),
            String::new(),
            "success match failed".into(),
        );
        assert!(!failed.success);
    }

    #[test]
    fn test_timeout_result() {
        let mut job = Job::new("svc", "http://localhost", "ok");
        job.id = Some(7);
        let result = JobResult::timeout(&job);
        assert_eq!(result.job_id, Some(7));
        assert!(!result.success);
        assert_eq!(result.error, "timeout?");
        assert_eq!(result.duration_ms, 0);
    }

    #[test]
    fn test_tag_success_requires_every_job() {
        let healthy = TagResult::aggregate(
            "TAG2",
            vec![job_with("a", true, "", 1), job_with("b", true, "", 2)],
        )
        .unwrap();
        assert!(healthy.success);

        let broken = TagResult::aggregate(
            "TAG1",
            vec![job_with("a", true, "", 1), job_with("b", false, "", 2)],
        )
        .unwrap();
        assert!(!broken.success);
        assert_eq!(broken.jobs.len(), 2);
    }

    #[test]
    fn test_tag_representative_uses_string_max() {
        // "9" > "2017-..." 的字符串比较结果
        let result = TagResult::aggregate(
            "TAG1",
            vec![
                job_with("a", true, "2017-01-06 00:37:45", 100),
                job_with("b", true, "9", 200),
                job_with("c", true, "2016-12-31 23:59:59", 300),
            ],
        )
        .unwrap();
        assert_eq!(result.last_timestamp, 200);
    }

    #[test]
    fn test_tag_representative_keeps_first_on_tie() {
        // 未开启部署校验的任务构建时间都为空，取排在最前的任务
        let result = TagResult::aggregate(
            "TAG1",
            vec![job_with("a", true, "", 100), job_with("b", true, "", 200)],
        )
        .unwrap();
        assert_eq!(result.last_timestamp, 100);

        let result = TagResult::aggregate(
            "TAG1",
            vec![
                job_with("a", true, "", 100),
                job_with("b", true, "2024-01-01 00:00:00", 200),
                job_with("c", true, "2024-01-01 00:00:00", 300),
            ],
        )
        .unwrap();
        assert_eq!(result.last_timestamp, 200);
    }

    #[test]
    fn test_tag_without_jobs() {
        assert!(TagResult::aggregate("EMPTY", Vec::new()).is_none());
    }
}
