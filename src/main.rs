//! Endpoint Vitals 主程序入口
//!
//! 周期性HTTP端点检测工具

use anyhow::{Context, Result};
use clap::Parser;
use endpoint_vitals::cli::args::{Args, Commands};
use endpoint_vitals::cli::commands::{
    AppContext, CheckCommand, Command, DeleteJobCommand, InitCommand, JobsCommand, RunOnceCommand,
    TagStatusCommand, TagsCommand, ValidateCommand,
};
use endpoint_vitals::config::{parse_duration, ConfigLoader, TomlConfigLoader};
use endpoint_vitals::logging::{LogConfig, LoggingSystem};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    // 初始化日志系统
    let log_config = resolve_log_config(&args).await;

    let _logging_system = LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    info!("Endpoint Vitals v{} 启动", endpoint_vitals::VERSION);

    // 执行命令
    if let Err(e) = execute_command(&args).await {
        error!("命令执行失败: {}", e);
        eprintln!("错误: {e}");
        std::process::exit(1);
    }

    Ok(())
}

/// 确定日志配置：配置文件中的日志项，命令行参数优先
async fn resolve_log_config(args: &Args) -> LogConfig {
    let config_path = args.get_config_path();
    let mut log_config = if config_path.exists() {
        TomlConfigLoader::default()
            .load_from_file(&config_path)
            .await
            .map(|config| LogConfig::from_global(&config.global))
            .unwrap_or_default()
    } else {
        LogConfig::default()
    };

    if let Some(level) = args.log_level {
        log_config.level = level.into();
    }
    log_config.json_format = args.json_logs;
    log_config
}

/// 执行CLI命令
async fn execute_command(args: &Args) -> Result<()> {
    let result = match &args.command {
        Commands::Start { delay, pool_size } => {
            return execute_start_command(args, delay.as_deref(), *pool_size).await
        }
        Commands::RunOnce { .. } => RunOnceCommand.execute(args).await,
        Commands::Check { .. } => CheckCommand.execute(args).await,
        Commands::Jobs { .. } => JobsCommand.execute(args).await,
        Commands::DeleteJob { .. } => DeleteJobCommand.execute(args).await,
        Commands::Tags { .. } => TagsCommand.execute(args).await,
        Commands::TagStatus { .. } => TagStatusCommand.execute(args).await,
        Commands::Validate { .. } => ValidateCommand.execute(args).await,
        Commands::Init { .. } => InitCommand.execute(args).await,
    };
    result.map_err(|e| anyhow::anyhow!(e))
}

/// 执行启动命令
///
/// 在前台运行检测循环，直到收到 Ctrl+C。
async fn execute_start_command(
    args: &Args,
    delay: Option<&str>,
    pool_size: Option<usize>,
) -> Result<()> {
    info!("启动周期检测服务...");

    let context = AppContext::load(args)
        .await
        .with_context(|| {
            format!(
                "加载配置文件失败: {}\n提示：请运行 'endpoint-vitals init' 创建默认配置文件",
                args.get_config_path().display()
            )
        })?;

    // 应用命令行参数覆盖
    let mut settings = context.config.global.runner_settings();
    if let Some(delay) = delay {
        settings.delay = parse_duration(delay)
            .filter(|d| !d.is_zero())
            .ok_or_else(|| anyhow::anyhow!("无效的周期间隔: {}", delay))?;
    }
    if let Some(pool_size) = pool_size {
        if pool_size == 0 {
            return Err(anyhow::anyhow!("并发检测池大小不能为0"));
        }
        settings.pool_size = pool_size;
    }

    let runner = context.runner_with(settings)?;
    info!(
        "配置加载完成，任务数量: {}",
        context.config.jobs.len()
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    // 设置Ctrl+C信号处理
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("收到中断信号，正在停止服务...");
                let _ = shutdown_tx.send(());
            }
            Err(err) => {
                error!("监听中断信号失败: {}", err);
            }
        }
    });

    runner.run_loop(shutdown_rx).await;
    info!("周期检测服务已停止");
    Ok(())
}
