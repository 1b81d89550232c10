//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Endpoint Vitals - 周期性HTTP端点检测工具
#[derive(Parser, Debug, Clone)]
#[command(
    name = "endpoint-vitals",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径",
        env = "ENDPOINT_VITALS_CONFIG"
    )]
    pub config: Option<PathBuf>,

    /// 日志级别，未指定时使用配置文件中的 log_level
    #[arg(
        short,
        long,
        value_enum,
        help = "日志级别",
        env = "ENDPOINT_VITALS_LOG_LEVEL"
    )]
    pub log_level: Option<LogLevel>,

    /// 输出JSON格式的日志
    #[arg(long, help = "输出JSON格式的日志")]
    pub json_logs: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum LogLevel {
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 在前台启动周期检测，Ctrl+C 停止
    Start {
        /// 覆盖配置中的周期间隔，如 "10s"
        #[arg(
            short,
            long,
            value_name = "DURATION",
            help = "周期间隔",
            env = "ENDPOINT_VITALS_DELAY"
        )]
        delay: Option<String>,

        /// 覆盖配置中的并发检测池大小
        #[arg(
            long,
            value_name = "COUNT",
            help = "并发检测池大小",
            env = "ENDPOINT_VITALS_POOL_SIZE"
        )]
        pool_size: Option<usize>,
    },

    /// 执行一个检测周期并输出统计
    RunOnce {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },

    /// 立即检测单个任务
    Check {
        /// 任务名称（已配置或已存储的任务）
        #[arg(
            value_name = "NAME",
            help = "任务名称",
            required_unless_present = "url",
            conflicts_with = "url"
        )]
        name: Option<String>,

        /// 临时检测的URL，不写入存储
        #[arg(long, value_name = "URL", requires = "success_match")]
        url: Option<String>,

        /// 临时检测的成功匹配规则
        #[arg(long, value_name = "PATTERN", requires = "url")]
        success_match: Option<String>,

        /// 临时检测时同时校验部署新鲜度
        #[arg(long, requires = "url")]
        check_deployment: bool,

        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },

    /// 列出任务，可按标签或名称过滤
    Jobs {
        /// 标签或名称，为空时列出全部任务
        #[arg(value_name = "QUERY", help = "标签或名称")]
        query: Option<String>,

        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },

    /// 按ID删除已存储的任务
    DeleteJob {
        /// 任务ID
        #[arg(value_name = "ID", help = "任务ID")]
        id: u64,
    },

    /// 列出所有标签
    Tags {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },

    /// 查看标签的聚合检测结果
    TagStatus {
        /// 标签
        #[arg(value_name = "TAG", help = "标签")]
        tag: String,

        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },

    /// 验证配置文件
    Validate {
        /// 配置文件路径
        #[arg(value_name = "FILE", help = "配置文件路径")]
        config_path: Option<PathBuf>,

        /// 是否显示详细信息
        #[arg(short, long, help = "显示详细信息")]
        verbose: bool,
    },

    /// 初始化配置文件
    Init {
        /// 配置文件路径
        #[arg(
            value_name = "FILE",
            help = "配置文件路径",
            default_value = crate::config::loader::DEFAULT_CONFIG_FILE
        )]
        config_path: PathBuf,

        /// 是否覆盖现有文件
        #[arg(short, long, help = "覆盖现有文件")]
        force: bool,
    },
}

/// 输出格式枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum OutputFormat {
    /// 文本格式
    Text,
    /// JSON格式
    Json,
}

impl Args {
    /// 获取配置文件路径
    pub fn get_config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::get_default_config_path)
    }
}
