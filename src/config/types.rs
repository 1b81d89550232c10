//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑

use crate::health::extractor::full_match_regex;
use crate::health::RunnerSettings;
use crate::job::Job;
use crate::logging::parse_level;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// 主配置结构，包含全局配置和任务列表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 全局配置项
    pub global: GlobalConfig,
    /// 任务配置列表
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

/// 全局配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    /// 检测周期间隔，如 "10s"、"500ms"、"1m"
    #[serde(default = "default_runner_delay")]
    pub runner_delay: String,
    /// 请求超时时间（秒），连接、读取和整体请求共用
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    /// 并发检测池大小
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// 收集结果的额外等待时间（秒）
    #[serde(default = "default_collect_grace")]
    pub collect_grace_seconds: u64,
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 任务存储文件路径，未设置时使用内存存储
    pub store_path: Option<PathBuf>,
    /// 日志文件路径，设置后在控制台之外追加写入该文件
    pub log_file: Option<PathBuf>,
    /// 按模块覆盖日志级别，如 `reqwest = "warn"`
    #[serde(default)]
    pub log_modules: BTreeMap<String, String>,
}

/// 任务配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobConfig {
    /// 任务名称
    pub name: String,
    /// 检测URL
    pub url: String,
    /// 成功匹配的正则表达式
    pub success_match: String,
    /// 检测间隔（秒）
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u32,
    /// 版本号提取正则
    #[serde(default)]
    pub version_match: String,
    /// 构建时间提取正则
    #[serde(default)]
    pub build_timestamp_match: String,
    /// 是否校验部署新鲜度
    #[serde(default)]
    pub check_deployment: bool,
    /// 标签
    #[serde(default)]
    pub tags: Vec<String>,
}

// 默认值函数
fn default_runner_delay() -> String {
    "10s".to_string()
}
fn default_timeout() -> u64 {
    30
}
fn default_pool_size() -> usize {
    10
}
fn default_collect_grace() -> u64 {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_interval_secs() -> u32 {
    300
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            runner_delay: default_runner_delay(),
            request_timeout_seconds: default_timeout(),
            pool_size: default_pool_size(),
            collect_grace_seconds: default_collect_grace(),
            log_level: default_log_level(),
            store_path: None,
            log_file: None,
            log_modules: BTreeMap::new(),
        }
    }
}

impl GlobalConfig {
    /// 检测周期间隔
    pub fn runner_delay(&self) -> Option<Duration> {
        parse_duration(&self.runner_delay)
    }

    /// 请求超时
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// 转换为调度器运行参数
    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            pool_size: self.pool_size,
            request_timeout: self.request_timeout(),
            collect_grace: Duration::from_secs(self.collect_grace_seconds),
            delay: self
                .runner_delay()
                .unwrap_or_else(|| Duration::from_secs(10)),
        }
    }
}

impl JobConfig {
    /// 转换为未检测过的任务
    pub fn to_job(&self) -> Job {
        let mut job = Job::new(&self.name, &self.url, &self.success_match)
            .with_interval_secs(self.interval_secs)
            .with_check_deployment(self.check_deployment)
            .with_tags(self.tags.iter().cloned());
        job.version_match = self.version_match.clone();
        job.build_timestamp_match = self.build_timestamp_match.clone();
        job.uppercase_tags();
        job
    }
}

impl Config {
    /// 配置中声明的全部任务
    pub fn declared_jobs(&self) -> Vec<Job> {
        self.jobs.iter().map(JobConfig::to_job).collect()
    }
}

/// 解析时间间隔字符串，支持 "500ms"、"10s"、"1m"、"2h" 和纯数字秒
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else if let Some(hours) = s.strip_suffix('h') {
        hours
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(|h| h.checked_mul(3600))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    // 验证全局配置
    match config.global.runner_delay() {
        None => {
            return Err(format!(
                "无效的检测周期间隔: {}",
                config.global.runner_delay
            ))
        }
        Some(delay) if delay.is_zero() => return Err("检测周期间隔不能为0".to_string()),
        Some(_) => {}
    }

    if config.global.request_timeout_seconds == 0 {
        return Err("请求超时时间不能为0".to_string());
    }

    if config.global.pool_size == 0 {
        return Err("并发检测池大小不能为0".to_string());
    }

    // 验证日志级别
    let valid_log_levels = ["debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&config.global.log_level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，支持的级别: {:?}",
            config.global.log_level, valid_log_levels
        ));
    }

    for (module, level) in &config.global.log_modules {
        if parse_level(level).is_none() {
            return Err(format!("模块 {} 的日志级别无效: {}", module, level));
        }
    }

    // 验证任务配置
    let mut names = std::collections::HashSet::new();
    for job in &config.jobs {
        if job.name.trim().is_empty() {
            return Err("任务名称不能为空".to_string());
        }

        if !names.insert(job.name.as_str()) {
            return Err(format!("任务名称重复: {}", job.name));
        }

        if !job.url.starts_with("http://") && !job.url.starts_with("https://") {
            return Err(format!("任务 {} 的URL格式无效", job.name));
        }

        if job.success_match.is_empty() {
            return Err(format!("任务 {} 必须指定成功匹配规则", job.name));
        }

        if job.interval_secs == 0 {
            return Err(format!("任务 {} 的检测间隔不能为0", job.name));
        }

        for (field, pattern) in [
            ("success_match", format!(".*(?:{}).*", job.success_match)),
            ("version_match", job.version_match.clone()),
            ("build_timestamp_match", job.build_timestamp_match.clone()),
        ] {
            if pattern.trim().is_empty() {
                continue;
            }
            if let Err(e) = full_match_regex(&pattern) {
                return Err(format!("任务 {} 的 {} 正则无效: {}", job.name, field, e));
            }
        }
    }

    Ok(())
}
