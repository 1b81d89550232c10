//! Endpoint Vitals - 周期性HTTP端点检测工具
//!
//! 这是一个用Rust编写的端点检测工具，支持：
//! - 按任务间隔的到期调度和有界并发检测
//! - 正则成功匹配和部署新鲜度校验
//! - 版本号与构建时间提取
//! - 按标签聚合检测结果
//! - 结构化日志记录

pub mod cli;
pub mod config;
pub mod error;
pub mod health;
pub mod job;
pub mod logging;
pub mod store;

// 重新导出主要类型
pub use config::{Config, GlobalConfig, JobConfig};
pub use error::VitalsError;
pub use health::{Checker, HttpChecker, JobRunner, RunnerSettings};
pub use job::{Job, JobResult, TagResult};
pub use store::{FileJobStore, JobStore, MemoryJobStore};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
