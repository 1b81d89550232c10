//! 日志系统模块
//!
//! 提供结构化日志配置和管理功能。`log` 宏的输出通过 `tracing-log`
//! 桥接到 tracing subscriber。

use crate::config::GlobalConfig;
use log::LevelFilter;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter, Layer};

/// 全局日志初始化状态
#[derive(Debug)]
struct GlobalLoggingState {
    /// 是否已初始化
    initialized: bool,
    /// 初始化结果
    init_result: Result<(), String>,
}

impl Default for GlobalLoggingState {
    fn default() -> Self {
        Self {
            initialized: false,
            init_result: Ok(()),
        }
    }
}

/// 全局日志状态管理器
static GLOBAL_LOGGING_STATE: OnceLock<Mutex<GlobalLoggingState>> = OnceLock::new();

fn lock_state() -> MutexGuard<'static, GlobalLoggingState> {
    GLOBAL_LOGGING_STATE
        .get_or_init(|| Mutex::new(GlobalLoggingState::default()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 日志配置结构
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 日志级别
    pub level: LevelFilter,
    /// 日志文件路径（可选）
    pub file_path: Option<PathBuf>,
    /// 是否输出到控制台
    pub console: bool,
    /// 是否使用JSON格式
    pub json_format: bool,
    /// 模块级别日志控制
    pub module_levels: HashMap<String, LevelFilter>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            file_path: None,
            console: true,
            json_format: false,
            module_levels: HashMap::new(),
        }
    }
}

impl LogConfig {
    /// 根据配置文件的 `[global]` 段构建日志配置
    ///
    /// 无法识别的级别已在配置验证时拒绝，这里按 info 处理。
    pub fn from_global(global: &GlobalConfig) -> Self {
        let module_levels = global
            .log_modules
            .iter()
            .filter_map(|(module, level)| parse_level(level).map(|level| (module.clone(), level)))
            .collect();

        Self {
            level: parse_level(&global.log_level).unwrap_or(LevelFilter::Info),
            file_path: global.log_file.clone(),
            module_levels,
            ..Default::default()
        }
    }
}

/// 把配置文件中的日志级别字符串转换为 `LevelFilter`
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    match level.trim().to_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// 日志系统管理器
#[derive(Debug)]
pub struct LoggingSystem {
    /// 配置
    config: LogConfig,
}

impl LoggingSystem {
    /// 初始化日志系统
    ///
    /// 全局 subscriber 只会安装一次，重复调用返回新的句柄。
    pub fn setup_logging(config: LogConfig) -> anyhow::Result<Self> {
        {
            let state = lock_state();
            if state.initialized {
                return match &state.init_result {
                    Ok(()) => Ok(Self { config }),
                    Err(e) => Err(anyhow::anyhow!("日志系统之前初始化失败: {}", e)),
                };
            }
        }

        let init_result = Self::perform_initialization(&config);

        {
            let mut state = lock_state();
            state.initialized = true;
            state.init_result = init_result.as_ref().map(|_| ()).map_err(|e| e.to_string());
        }

        init_result?;
        Ok(Self { config })
    }

    /// 当前句柄使用的配置
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// 执行实际的日志系统初始化
    fn perform_initialization(config: &LogConfig) -> anyhow::Result<()> {
        Self::init_log_tracer()?;
        Self::init_tracing_subscriber(config)?;
        Ok(())
    }

    /// 初始化 LogTracer
    fn init_log_tracer() -> anyhow::Result<()> {
        use tracing_log::LogTracer;

        static LOG_TRACER_INIT: OnceLock<Result<(), String>> = OnceLock::new();

        let result = LOG_TRACER_INIT.get_or_init(|| LogTracer::init().map_err(|e| e.to_string()));

        result
            .as_ref()
            .map_err(|e| anyhow::anyhow!("LogTracer初始化失败: {}", e))?;
        Ok(())
    }

    /// 初始化 tracing subscriber
    fn init_tracing_subscriber(config: &LogConfig) -> anyhow::Result<()> {
        let mut env_filter = EnvFilter::from_default_env()
            .add_directive(Self::convert_level_to_directive(config.level));

        // 添加模块级别过滤
        for (module, level) in &config.module_levels {
            match format!("{}={}", module, Self::level_to_string(*level)).parse() {
                Ok(directive) => env_filter = env_filter.add_directive(directive),
                Err(e) => eprintln!("忽略无效的模块日志级别 {module}: {e}"),
            }
        }

        let console_layer = if !config.console {
            None
        } else if config.json_format {
            Some(
                fmt::layer()
                    .json()
                    .with_timer(fmt::time::ChronoUtc::rfc_3339())
                    .with_file(true)
                    .with_line_number(true)
                    .boxed(),
            )
        } else {
            Some(
                fmt::layer()
                    .with_timer(fmt::time::ChronoUtc::rfc_3339())
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(true)
                    .boxed(),
            )
        };

        let file_layer = match &config.file_path {
            Some(file_path) => {
                if let Some(parent) = file_path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)
                            .map_err(|e| anyhow::anyhow!("创建日志目录失败: {}", e))?;
                    }
                }
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(file_path)
                    .map_err(|e| anyhow::anyhow!("打开日志文件失败: {}", e))?;
                Some(
                    fmt::layer()
                        .with_writer(Arc::new(file))
                        .with_timer(fmt::time::ChronoUtc::rfc_3339())
                        .with_ansi(false)
                        .with_file(true)
                        .with_line_number(true),
                )
            }
            None => None,
        };

        let result = registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init();

        match result {
            Ok(()) => {
                tracing::info!("日志系统初始化完成");
                tracing::debug!("日志配置: {:?}", config);
                Ok(())
            }
            Err(e) => {
                let error_msg = e.to_string();
                if error_msg.contains(
                    "attempted to set a logger after the logging system was already initialized",
                ) || error_msg.contains("a global default trace dispatcher has already been set")
                {
                    tracing::debug!("日志系统已经初始化过了");
                    Ok(())
                } else {
                    Err(anyhow::anyhow!(
                        "tracing subscriber初始化失败: {}",
                        error_msg
                    ))
                }
            }
        }
    }

    /// 将 log::LevelFilter 转换为 tracing 的指令
    fn convert_level_to_directive(level: LevelFilter) -> tracing_subscriber::filter::Directive {
        use tracing_subscriber::filter::{Directive, LevelFilter as TracingLevel};
        let level = match level {
            LevelFilter::Off => TracingLevel::OFF,
            LevelFilter::Error => TracingLevel::ERROR,
            LevelFilter::Warn => TracingLevel::WARN,
            LevelFilter::Info => TracingLevel::INFO,
            LevelFilter::Debug => TracingLevel::DEBUG,
            LevelFilter::Trace => TracingLevel::TRACE,
        };
        Directive::from(level)
    }

    /// 将 log::LevelFilter 转换为字符串
    fn level_to_string(level: LevelFilter) -> &'static str {
        match level {
            LevelFilter::Off => "off",
            LevelFilter::Error => "error",
            LevelFilter::Warn => "warn",
            LevelFilter::Info => "info",
            LevelFilter::Debug => "debug",
            LevelFilter::Trace => "trace",
        }
    }

    /// 重置日志系统状态（主要用于测试）
    #[cfg(test)]
    pub fn reset_for_testing() {
        let mut state = lock_state();
        state.initialized = false;
        state.init_result = Ok(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn create_test_config() -> LogConfig {
        LogConfig {
            level: LevelFilter::Info,
            file_path: None,
            console: true,
            json_format: false,
            module_levels: HashMap::new(),
        }
    }

    #[test]
    #[serial]
    fn test_logging_system_single_initialization() {
        LoggingSystem::reset_for_testing();

        let config = create_test_config();

        let first = LoggingSystem::setup_logging(config.clone()).unwrap();
        assert_eq!(first.config().level, LevelFilter::Info);

        // 第二次初始化不会重复安装 subscriber
        let mut second_config = config;
        second_config.level = LevelFilter::Debug;
        let second = LoggingSystem::setup_logging(second_config).unwrap();
        assert_eq!(second.config().level, LevelFilter::Debug);
    }

    #[test]
    #[serial]
    fn test_logging_system_with_file_output() {
        LoggingSystem::reset_for_testing();

        let dir = TempDir::new().unwrap();
        let mut config = create_test_config();
        config.file_path = Some(dir.path().join("logs").join("vitals.log"));
        config.console = false;

        assert!(LoggingSystem::setup_logging(config).is_ok());
    }

    #[test]
    #[serial]
    fn test_logging_system_with_json_format() {
        LoggingSystem::reset_for_testing();

        let mut config = create_test_config();
        config.json_format = true;

        assert!(LoggingSystem::setup_logging(config).is_ok());
    }

    #[test]
    #[serial]
    fn test_module_level_filtering() {
        LoggingSystem::reset_for_testing();

        let mut config = create_test_config();
        config
            .module_levels
            .insert("endpoint_vitals::health".to_string(), LevelFilter::Debug);
        config
            .module_levels
            .insert("reqwest".to_string(), LevelFilter::Warn);

        assert!(LoggingSystem::setup_logging(config).is_ok());
    }

    #[test]
    fn test_log_config_from_global() {
        let mut global = GlobalConfig {
            log_level: "debug".to_string(),
            log_file: Some(PathBuf::from("/var/log/endpoint-vitals.log")),
            ..Default::default()
        };
        global
            .log_modules
            .insert("reqwest".to_string(), "warn".to_string());
        global
            .log_modules
            .insert("hyper".to_string(), "loud".to_string());

        let config = LogConfig::from_global(&global);
        assert_eq!(config.level, LevelFilter::Debug);
        assert_eq!(
            config.file_path,
            Some(PathBuf::from("/var/log/endpoint-vitals.log"))
        );
        assert!(config.console);
        assert_eq!(config.module_levels.get("reqwest"), Some(&LevelFilter::Warn));
        assert!(!config.module_levels.contains_key("hyper"));
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Some(LevelFilter::Debug));
        assert_eq!(parse_level(" WARN "), Some(LevelFilter::Warn));
        assert_eq!(parse_level("verbose"), None);
    }
}
