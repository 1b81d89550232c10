//! 检测模块
//!
//! 提供文本提取、HTTP传输、端点检测和周期调度功能

pub mod checker;
pub mod extractor;
pub mod runner;
pub mod transport;

// 重新导出主要类型
pub use checker::{Checker, HttpChecker};
pub use extractor::DataExtractor;
pub use runner::{CycleReport, JobRunner, RunnerSettings};
pub use transport::{HttpTransport, ReqwestTransport, TransportError};
