//! HTTP端点检测器实现
//!
//! 对任务URL执行一次GET请求，校验响应内容并可选地校验部署新鲜度

use crate::health::extractor::{full_match_regex, DataExtractor};
use crate::health::transport::HttpTransport;
use crate::job::{Job, JobResult};
use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;
use std::time::Instant;
use tracing::{debug, warn};

/// 成功匹配失败的错误信息
pub const SUCCESS_MATCH_FAILED: &str = "success match failed";

/// 部署新鲜度校验失败的错误信息
pub const DEPLOYMENT_CHECK_FAILED: &str = "deployment version check failed";

/// 预发布（快照）版本标记
pub const SNAPSHOT_MARKER: &str = "SNAPSHOT";

/// 构建时间格式
pub const BUILD_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static LINE_BREAKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r\n|\r|\n").expect("内置换行正则无效"));

/// 检测器trait，定义检测接口
///
/// 实现不能返回错误：所有失败都写入 `JobResult::error`。
#[async_trait]
pub trait Checker: Send + Sync {
    /// 执行一次检测
    async fn check(&self, job: &Job) -> JobResult;
}

/// HTTP检测器
pub struct HttpChecker<T: HttpTransport> {
    /// HTTP传输层
    transport: T,
    /// 文本提取器
    extractor: DataExtractor,
}

impl<T: HttpTransport> HttpChecker<T> {
    /// 创建新的HTTP检测器
    pub fn new(transport: T, extractor: DataExtractor) -> Self {
        Self {
            transport,
            extractor,
        }
    }

    /// 校验响应文本，返回 (版本号, 构建时间, 错误信息)
    fn evaluate(&self, job: &Job, text: &str) -> (String, String, String) {
        let version = self.extractor.extract_version(&job.version_match, text);
        let build_timestamp = self
            .extractor
            .extract_build_timestamp(&job.build_timestamp_match, text);

        let error = if !contains_success_match(&job.success_match, text) {
            SUCCESS_MATCH_FAILED.to_string()
        } else if job.check_deployment
            && !has_expected_deployment(&version, &build_timestamp, Local::now().date_naive())
        {
            DEPLOYMENT_CHECK_FAILED.to_string()
        } else {
            String::new()
        };

        (version, build_timestamp, error)
    }
}

#[async_trait]
impl<T: HttpTransport> Checker for HttpChecker<T> {
    async fn check(&self, job: &Job) -> JobResult {
        let start_time = Instant::now();

        let (version, build_timestamp, error) = match self.transport.get(&job.url).await {
            Ok(body) => {
                let text = normalize_line_breaks(&body);
                self.evaluate(job, &text)
            }
            Err(e) => (String::new(), String::new(), e.to_string()),
        };

        let result = JobResult::new(job, start_time.elapsed(), version, build_timestamp, error);
        if result.success {
            debug!("任务检测正常: {} ({}ms)", job.name, result.duration_ms);
        } else {
            debug!("任务检测失败: {} - {}", job.name, result.error);
        }
        result
    }
}

/// 把所有换行序列替换为单个空格
pub fn normalize_line_breaks(text: &str) -> String {
    LINE_BREAKS.replace_all(text, " ").into_owned()
}

/// 整段文本是否匹配 `.*<success_match>.*`
///
/// 无法编译的规则视为不匹配。
pub fn contains_success_match(success_match: &str, text: &str) -> bool {
    match full_match_regex(&format!(".*(?:{success_match}).*")) {
        Ok(pattern) => pattern.is_match(text),
        Err(e) => {
            warn!("成功匹配正则无效 {}: {}", success_match, e);
            false
        }
    }
}

/// 部署新鲜度校验
///
/// 版本号和构建时间都存在、版本号为快照版本，且构建日期等于 `today` 时通过。
pub fn has_expected_deployment(version: &str, build_timestamp: &str, today: NaiveDate) -> bool {
    if version.is_empty() || build_timestamp.is_empty() || !version.contains(SNAPSHOT_MARKER) {
        return false;
    }

    match NaiveDateTime::parse_from_str(build_timestamp, BUILD_TIMESTAMP_FORMAT) {
        Ok(built_at) => built_at.date() == today,
        Err(e) => {
            debug!("构建时间格式无效 {}: {}", build_timestamp, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::transport::TransportError;
    use chrono::Duration as ChronoDuration;

    /// 返回固定响应的传输实现
    struct StubTransport {
        response: Result<String, TransportError>,
    }

    impl StubTransport {
        fn body(body: &str) -> Self {
            Self {
                response: Ok(body.to_string()),
            }
        }

        fn failure(kind: &str, message: &str) -> Self {
            Self {
                response: Err(TransportError::new(kind, message)),
            }
        }
    }

    #[async_trait]
    impl HttpTransport for StubTransport {
        async fn get(&self, _url: &str) -> Result<String, TransportError> {
            self.response.clone()
        }
    }

    fn checker(transport: StubTransport) -> HttpChecker<StubTransport> {
        HttpChecker::new(transport, DataExtractor::new())
    }

    fn new_job(success_match: &str) -> Job {
        Job::new("testing", "testing", success_match)
    }

    fn new_job_check_deployment(success_match: &str) -> Job {
        new_job(success_match).with_check_deployment(true)
    }

    const DEFAULT_BODY: &str = "YfooU 12 x13 ver = 1.20<br> a";

    #[tokio::test]
    async fn test_check_simple_string() {
        let result = checker(StubTransport::body(DEFAULT_BODY)).check(&new_job("foo")).await;
        assert!(result.success);
        assert!(result.error.is_empty());
    }

    #[tokio::test]
    async fn test_check_regex_string() {
        let result = checker(StubTransport::body(DEFAULT_BODY))
            .check(&new_job("[a-z]{1}[o-o]{2}"))
            .await;
        assert!(result.success);
        assert!(result.error.is_empty());
    }

    #[tokio::test]
    async fn test_check_non_match() {
        let result = checker(StubTransport::body(DEFAULT_BODY)).check(&new_job("/d{2}")).await;
        assert!(!result.success);
        assert_eq!(result.error, "success match failed");
    }

    #[tokio::test]
    async fn test_check_alternation_is_grouped() {
        let result = checker(StubTransport::body(DEFAULT_BODY))
            .check(&new_job("nothing|foo"))
            .await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_check_multiline_body() {
        let body = "line one\r\nstatus: UP\rversion 1.2.3\nend";
        let result = checker(StubTransport::body(body))
            .check(&new_job("one status: UP version"))
            .await;
        assert!(result.success);
        assert_eq!(result.version, "1.2.3");
    }

    #[tokio::test]
    async fn test_check_transport_failure() {
        let result = checker(StubTransport::failure("ConnectError", "boom"))
            .check(&new_job("foo"))
            .await;
        assert!(!result.success);
        assert!(result.error.contains("boom"));
        assert_eq!(result.error, "ConnectError: boom");
        assert!(result.version.is_empty());
        assert!(result.build_timestamp.is_empty());
    }

    #[tokio::test]
    async fn test_check_invalid_success_pattern() {
        let result = checker(StubTransport::body(DEFAULT_BODY)).check(&new_job("(foo")).await;
        assert!(!result.success);
        assert_eq!(result.error, "success match failed");
    }

    #[tokio::test]
    async fn test_check_deployment_today() {
        let now = Local::now().format(BUILD_TIMESTAMP_FORMAT).to_string();
        let body = format!("1701.0.13-SNAPSHOT {now} foo");
        let result = checker(StubTransport::body(&body))
            .check(&new_job_check_deployment("foo"))
            .await;
        assert!(result.success);
        assert_eq!(result.build_timestamp, now);
        assert_eq!(result.version, "1701.0.13-SNAPSHOT");
        assert!(result.error.is_empty());
    }

    #[tokio::test]
    async fn test_check_deployment_wrong_build_timestamp() {
        let result = checker(StubTransport::body("1701.0.13-SNAPSHOT 2017-01-06 00:37:45 foo"))
            .check(&new_job_check_deployment("foo"))
            .await;
        assert!(!result.success);
        assert_eq!(result.build_timestamp, "2017-01-06 00:37:45");
        assert_eq!(result.version, "1701.0.13-SNAPSHOT");
        assert_eq!(result.error, "deployment version check failed");
    }

    #[tokio::test]
    async fn test_check_deployment_missing_version() {
        let result = checker(StubTransport::body("2017-01-06 00:37:45 foo"))
            .check(&new_job_check_deployment("foo"))
            .await;
        assert!(!result.success);
        assert!(result.version.is_empty());
        assert_eq!(result.build_timestamp, "2017-01-06 00:37:45");
        assert_eq!(result.error, "deployment version check failed");
    }

    #[tokio::test]
    async fn test_check_deployment_missing_build_timestamp() {
        let result = checker(StubTransport::body("1701.0.13 foo"))
            .check(&new_job_check_deployment("foo"))
            .await;
        assert!(!result.success);
        assert!(result.build_timestamp.is_empty());
        assert_eq!(result.version, "1701.0.13");
        assert_eq!(result.error, "deployment version check failed");
    }

    #[tokio::test]
    async fn test_success_match_checked_before_deployment() {
        let result = checker(StubTransport::body("1701.0.13-SNAPSHOT 2017-01-06 00:37:45"))
            .check(&new_job_check_deployment("foo"))
            .await;
        assert_eq!(result.error, "success match failed");
    }

    #[test]
    fn test_has_expected_deployment() {
        let today = NaiveDate::from_ymd_opt(2017, 1, 6).unwrap();
        assert!(has_expected_deployment("1701.0.13-SNAPSHOT", "2017-01-06 00:37:45", today));
        assert!(!has_expected_deployment("1701.0.13", "2017-01-06 00:37:45", today));
        assert!(!has_expected_deployment(
            "1701.0.13-SNAPSHOT",
            "2017-01-06 00:37:45",
            today + ChronoDuration::days(1)
        ));
        assert!(!has_expected_deployment("", "2017-01-06 00:37:45", today));
        assert!(!has_expected_deployment("1701.0.13-SNAPSHOT", "", today));
        assert!(!has_expected_deployment("1701.0.13-SNAPSHOT", "2017", today));
    }

    #[test]
    fn test_normalize_line_breaks() {
        assert_eq!(normalize_line_breaks("a\r\nb\rc\nd"), "a b c d");
        assert_eq!(normalize_line_breaks("a\n\nb"), "a  b");
    }
}
