//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::cli::args::{Args, Commands, OutputFormat};
use crate::config::{sample_config, Config, ConfigLoader, TomlConfigLoader};
use crate::error::{Result, StoreError, VitalsError};
use crate::health::{
    CycleReport, DataExtractor, HttpChecker, JobRunner, ReqwestTransport, RunnerSettings,
};
use crate::job::{Job, TagResult};
use crate::store::{seed_jobs, FileJobStore, JobStore, MemoryJobStore};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 命令运行所需的配置和任务存储
pub struct AppContext {
    /// 已验证的配置
    pub config: Config,
    /// 任务存储，已写入配置中声明的任务
    pub store: Arc<dyn JobStore>,
}

impl AppContext {
    /// 从命令行指定的配置文件构建上下文
    pub async fn load(args: &Args) -> Result<Self> {
        let loader = TomlConfigLoader::default();
        let config = loader.load_from_file(args.get_config_path()).await?;
        Self::from_config(config).await
    }

    /// 根据配置打开任务存储并写入声明的任务
    ///
    /// 配置了 `store_path` 时使用文件存储，否则使用内存存储。
    pub async fn from_config(config: Config) -> Result<Self> {
        let store: Arc<dyn JobStore> = match &config.global.store_path {
            Some(path) => Arc::new(FileJobStore::open(path).await?),
            None => Arc::new(MemoryJobStore::new()),
        };
        seed_jobs(store.as_ref(), &config.declared_jobs()).await?;
        Ok(Self { config, store })
    }

    /// 使用配置中的运行参数创建调度器
    pub fn runner(&self) -> Result<JobRunner> {
        self.runner_with(self.config.global.runner_settings())
    }

    /// 使用指定运行参数创建调度器
    pub fn runner_with(&self, settings: RunnerSettings) -> Result<JobRunner> {
        let transport = ReqwestTransport::new(settings.request_timeout)
            .map_err(|e| VitalsError::Other(anyhow::Error::new(e)))?;
        let checker = HttpChecker::new(transport, DataExtractor::new());
        Ok(JobRunner::new(
            Arc::clone(&self.store),
            Arc::new(checker),
            settings,
        ))
    }
}

/// 打印单个任务的最近结果
fn print_job(job: &Job) {
    let status_icon = if job.last_result { "✓" } else { "✗" };
    let id = job
        .id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{} [{}] {} ({}) - {}ms",
        status_icon, id, job.name, job.url, job.last_duration
    );

    if !job.tags.is_empty() {
        let tags: Vec<&str> = job.tags.iter().map(String::as_str).collect();
        println!("  标签: {}", tags.join(", "));
    }
    if !job.last_version.is_empty() || !job.last_build_timestamp.is_empty() {
        println!(
            "  版本: {}  构建时间: {}",
            job.last_version, job.last_build_timestamp
        );
    }
    if !job.last_message.is_empty() {
        println!("  错误: {}", job.last_message);
    }
}

/// 以指定格式输出任务列表
fn print_jobs(jobs: &[Job], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(jobs)?),
        OutputFormat::Text => {
            if jobs.is_empty() {
                println!("没有匹配的任务");
            }
            for job in jobs {
                print_job(job);
            }
        }
    }
    Ok(())
}

/// 以指定格式输出周期统计
pub fn print_report(report: &CycleReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "cycleId": report.cycle_id,
                "due": report.due,
                "checked": report.checked,
                "timedOut": report.timed_out,
                "saved": report.saved,
                "elapsedMs": report.elapsed.as_millis() as u64,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            println!("检测周期 {}", report.cycle_id);
            println!("  到期任务: {}", report.due);
            println!("  完成检测: {}", report.checked);
            println!("  超时兜底: {}", report.timed_out);
            println!("  写回存储: {}", report.saved);
            println!("  耗时: {}ms", report.elapsed.as_millis());
        }
    }
    Ok(())
}

/// 单周期命令
pub struct RunOnceCommand;

#[async_trait]
impl Command for RunOnceCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::RunOnce { format } = &args.command {
            let context = AppContext::load(args).await?;
            let report = context.runner()?.run_cycle().await?;
            print_report(&report, *format)?;

            if *format == OutputFormat::Text && report.due > 0 {
                let jobs = context.store.load_all().await?;
                for job in jobs.iter().filter(|job| job.last_timestamp > 0) {
                    print_job(job);
                }
            }
        }
        Ok(())
    }
}

/// 检测命令
pub struct CheckCommand;

#[async_trait]
impl Command for CheckCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Check {
            name,
            url,
            success_match,
            check_deployment,
            format,
        } = &args.command
        {
            let job = match (name, url, success_match) {
                (_, Some(url), Some(success_match)) => {
                    // 临时任务不依赖配置文件，缺失时使用默认参数
                    let context = match AppContext::load(args).await {
                        Ok(loaded) => loaded,
                        Err(e) => {
                            log::debug!("未加载配置文件，使用默认参数: {}", e);
                            AppContext::from_config(Config {
                                global: Default::default(),
                                jobs: Vec::new(),
                            })
                            .await?
                        }
                    };
                    let job = Job::new("adhoc", url.as_str(), success_match.as_str())
                        .with_check_deployment(*check_deployment);
                    context.runner()?.check_now(job).await?
                }
                (Some(name), _, _) => {
                    let context = AppContext::load(args).await?;
                    let job = context
                        .store
                        .find_by_name(name)
                        .await?
                        .ok_or_else(|| StoreError::JobNotFound(name.clone()))?;
                    context.runner()?.check_now(job).await?
                }
                _ => {
                    return Err(VitalsError::Other(anyhow::anyhow!(
                        "需要指定任务名称，或同时指定 --url 和 --success-match"
                    )))
                }
            };

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&job)?),
                OutputFormat::Text => print_job(&job),
            }
        }
        Ok(())
    }
}

/// 任务列表命令
pub struct JobsCommand;

#[async_trait]
impl Command for JobsCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Jobs { query, format } = &args.command {
            let context = AppContext::load(args).await?;
            let jobs = context
                .store
                .find_by_tag_or_name(query.as_deref().unwrap_or(""))
                .await?;
            print_jobs(&jobs, *format)?;
        }
        Ok(())
    }
}

/// 删除任务命令
pub struct DeleteJobCommand;

#[async_trait]
impl Command for DeleteJobCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::DeleteJob { id } = &args.command {
            let context = AppContext::load(args).await?;
            let job = delete_job(&context, *id).await?;
            println!("已删除任务 [{}] {}", id, job.name);
        }
        Ok(())
    }
}

/// 从存储中删除任务并返回被删除的任务
///
/// 仍在配置文件中声明的任务会在下次加载配置时重新写入存储。
async fn delete_job(context: &AppContext, id: u64) -> Result<Job> {
    let job = context
        .store
        .find(id)
        .await?
        .ok_or(StoreError::NotFound(id))?;
    if !context.store.delete(id).await? {
        return Err(StoreError::NotFound(id).into());
    }

    if context.config.jobs.iter().any(|declared| declared.name == job.name) {
        log::warn!("任务 {} 仍在配置文件中声明，下次启动时会重新创建", job.name);
    }
    Ok(job)
}

/// 标签列表命令
pub struct TagsCommand;

#[async_trait]
impl Command for TagsCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Tags { format } = &args.command {
            let context = AppContext::load(args).await?;
            let tags = context.store.all_tags().await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tags)?),
                OutputFormat::Text => {
                    for tag in &tags {
                        println!("{tag}");
                    }
                }
            }
        }
        Ok(())
    }
}

/// 标签聚合结果命令
pub struct TagStatusCommand;

#[async_trait]
impl Command for TagStatusCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::TagStatus { tag, format } = &args.command {
            let context = AppContext::load(args).await?;
            let tag = tag.to_uppercase();
            let jobs = context.store.find_by_tag(&tag).await?;
            let result = TagResult::aggregate(tag.as_str(), jobs).ok_or_else(|| {
                VitalsError::Other(anyhow::anyhow!("标签 '{}' 下没有任务", tag))
            })?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
                OutputFormat::Text => {
                    let status = if result.success { "正常" } else { "异常" };
                    println!(
                        "标签 {}: {}，最近检测时间 {}",
                        result.tag, status, result.last_timestamp
                    );
                    for job in &result.jobs {
                        print_job(job);
                    }
                }
            }
        }
        Ok(())
    }
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Validate {
            config_path,
            verbose,
        } = &args.command
        {
            let config_file = config_path
                .clone()
                .unwrap_or_else(|| args.get_config_path());

            self.validate_config_file(&config_file, *verbose).await
        } else {
            Ok(())
        }
    }
}

impl ValidateCommand {
    /// 验证配置文件
    async fn validate_config_file(&self, config_path: &Path, verbose: bool) -> Result<()> {
        println!("验证配置文件: {}", config_path.display());

        let loader = TomlConfigLoader::default();
        let config = loader.load_from_file(config_path).await?;

        if verbose {
            println!("配置验证通过！");
            println!("全局配置:");
            println!("  周期间隔: {}", config.global.runner_delay);
            println!("  请求超时: {}秒", config.global.request_timeout_seconds);
            println!("  并发检测: {}", config.global.pool_size);
            println!("  收集等待: {}秒", config.global.collect_grace_seconds);
            println!("  日志级别: {}", config.global.log_level);
            match &config.global.store_path {
                Some(path) => println!("  任务存储: {}", path.display()),
                None => println!("  任务存储: 内存"),
            }

            println!("任务配置:");
            for (i, job) in config.jobs.iter().enumerate() {
                println!("  {}. {} ({})", i + 1, job.name, job.url);
                println!("     成功匹配: {}", job.success_match);
                println!("     检测间隔: {}秒", job.interval_secs);
                println!(
                    "     部署校验: {}",
                    if job.check_deployment { "是" } else { "否" }
                );
            }
        } else {
            println!("✓ 配置文件验证通过");
            println!("✓ 找到 {} 个任务配置", config.jobs.len());
        }

        Ok(())
    }
}

/// 初始化命令
pub struct InitCommand;

#[async_trait]
impl Command for InitCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Init { config_path, force } = &args.command {
            self.create_config_file(config_path, *force).await
        } else {
            Ok(())
        }
    }
}

impl InitCommand {
    /// 创建配置文件
    async fn create_config_file(&self, config_path: &Path, force: bool) -> Result<()> {
        if config_path.exists() && !force {
            eprintln!("配置文件已存在: {}", config_path.display());
            eprintln!("使用 --force 参数覆盖现有文件");
            return Ok(());
        }

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tokio::fs::write(config_path, sample_config()).await?;

        println!("配置文件已创建: {}", config_path.display());
        println!("请编辑配置文件以添加您的检测任务");

        Ok(())
    }
}
