//! 任务数据结构定义
//!
//! `Job` 既包含端点的静态配置，也包含最近一次检测的结果字段。
//! 结果字段只能通过 [`Job::populate_from_result`] 或
//! [`Job::mark_not_checked`] 整体覆盖。

use crate::job::result::JobResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 超时兜底结果的错误信息
pub const NOT_CHECKED_MESSAGE: &str = "timeout?";

/// 被监控的端点任务
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// 任务ID，由存储层分配
    #[serde(default)]
    pub id: Option<u64>,
    /// 任务名称
    pub name: String,
    /// 检测URL
    pub url: String,
    /// 成功匹配的正则表达式
    pub success_match: String,
    /// 检测间隔（秒）
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u32,
    /// 版本号提取正则（为空时使用默认规则）
    #[serde(default)]
    pub version_match: String,
    /// 构建时间提取正则（为空时使用默认规则）
    #[serde(default)]
    pub build_timestamp_match: String,
    /// 是否校验部署新鲜度
    #[serde(default)]
    pub check_deployment: bool,
    /// 标签（大写）
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// 最近一次检测完成时间（毫秒时间戳）
    #[serde(default)]
    pub last_timestamp: i64,
    /// 最近一次检测是否成功
    #[serde(default)]
    pub last_result: bool,
    /// 最近一次检测的错误信息
    #[serde(default)]
    pub last_message: String,
    /// 最近一次提取到的版本号
    #[serde(default)]
    pub last_version: String,
    /// 最近一次提取到的构建时间
    #[serde(default)]
    pub last_build_timestamp: String,
    /// 最近一次检测耗时（毫秒）
    #[serde(default)]
    pub last_duration: u64,
}

fn default_interval_secs() -> u32 {
    300
}

/// 当前时间的毫秒时间戳
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Job {
    /// 创建一个从未检测过的新任务
    pub fn new(name: impl Into<String>, url: impl Into<String>, success_match: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            url: url.into(),
            success_match: success_match.into(),
            interval_secs: default_interval_secs(),
            version_match: String::new(),
            build_timestamp_match: String::new(),
            check_deployment: false,
            tags: BTreeSet::new(),
            last_timestamp: 0,
            last_result: false,
            last_message: String::new(),
            last_version: String::new(),
            last_build_timestamp: String::new(),
            last_duration: 0,
        }
    }

    /// 设置检测间隔
    pub fn with_interval_secs(mut self, interval_secs: u32) -> Self {
        self.interval_secs = interval_secs;
        self
    }

    /// 开启部署新鲜度校验
    pub fn with_check_deployment(mut self, check_deployment: bool) -> Self {
        self.check_deployment = check_deployment;
        self
    }

    /// 添加标签
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// 判断任务在给定时间点是否到期
    ///
    /// 从未检测过的任务（`last_timestamp == 0`）总是到期。
    pub fn is_due_at(&self, now_ms: i64) -> bool {
        if self.last_timestamp == 0 {
            return true;
        }
        let interval_ms = i64::from(self.interval_secs) * 1000;
        now_ms.saturating_sub(self.last_timestamp) > interval_ms
    }

    /// 判断任务当前是否到期
    pub fn is_due(&self) -> bool {
        self.is_due_at(now_millis())
    }

    /// 用一次检测结果整体覆盖最近结果字段
    pub fn populate_from_result(&mut self, result: &JobResult, now_ms: i64) {
        self.last_result = result.success;
        self.last_timestamp = now_ms;
        self.last_message = result.error.clone();
        self.last_duration = result.duration_ms;
        self.last_version = result.version.clone();
        self.last_build_timestamp = result.build_timestamp.clone();
    }

    /// 写入未收到检测结果时的兜底结果
    pub fn mark_not_checked(&mut self, now_ms: i64) {
        let result = JobResult::timeout(self);
        self.populate_from_result(&result, now_ms);
    }

    /// 将所有标签转换为大写
    pub fn uppercase_tags(&mut self) {
        self.tags = self.tags.iter().map(|tag| tag.to_uppercase()).collect();
    }

    /// 复制另一个任务的静态配置，保留自身ID和最近结果字段
    pub fn apply_definition(&mut self, other: &Job) {
        self.name = other.name.clone();
        self.url = other.url.clone();
        self.success_match = other.success_match.clone();
        self.interval_secs = other.interval_secs;
        self.version_match = other.version_match.clone();
        self.build_timestamp_match = other.build_timestamp_match.clone();
        self.check_deployment = other.check_deployment;
        self.tags = other.tags.clone();
    }
}
