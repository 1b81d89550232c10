//! 任务模型模块
//!
//! 定义被监控端点（任务）、单次检测结果以及标签聚合结果

pub mod model;
pub mod result;

// 重新导出主要类型
pub use model::{now_millis, Job};
pub use result::{JobResult, TagResult};
