//! 错误处理模块
//!
//! 定义应用程序的统一错误类型。单个任务的检测失败不会走这里，
//! 而是作为数据写入 `JobResult::error`。

use thiserror::Error;

/// Endpoint Vitals 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum VitalsError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 任务存储相关错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 任务存储错误类型
#[derive(Error, Debug)]
pub enum StoreError {
    /// 存储文件读写失败
    #[error("存储文件访问失败 {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 存储文件内容损坏
    #[error("存储文件解析失败 {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// 按ID查找的任务不存在
    #[error("任务不存在: {0}")]
    NotFound(u64),

    /// 按名称查找的任务不存在
    #[error("未找到名为 '{0}' 的任务")]
    JobNotFound(String),
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, VitalsError>;
