//! 版本号与构建时间提取器
//!
//! 对整段响应文本做全串匹配，取第1个捕获组。匹配失败时返回空字符串，
//! 提取过程本身不会报错。

use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

/// 默认版本号规则：三段ASCII数字，可带 `-SNAPSHOT` 后缀，取最左侧的匹配
static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.*?([0-9]+\.[0-9]+\.[0-9]+(-SNAPSHOT)?).*$").expect("内置版本号正则无效")
});

/// 默认构建时间规则：`yyyy-MM-dd HH:mm:ss`，取最左侧的匹配
static BUILD_TIMESTAMP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.*?([0-9]{4}-[0-9]{2}-[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2}).*$").expect("内置构建时间正则无效")
});

/// 文本提取器
#[derive(Debug, Clone, Default)]
pub struct DataExtractor;

impl DataExtractor {
    /// 创建提取器
    pub fn new() -> Self {
        Self
    }

    /// 提取版本号
    ///
    /// # 参数
    /// * `pattern_override` - 自定义正则，空白时使用默认规则
    /// * `text` - 已归一化为单行的响应文本
    pub fn extract_version(&self, pattern_override: &str, text: &str) -> String {
        self.extract(&VERSION_PATTERN, pattern_override, text)
    }

    /// 提取构建时间
    ///
    /// # 参数
    /// * `pattern_override` - 自定义正则，空白时使用默认规则
    /// * `text` - 已归一化为单行的响应文本
    pub fn extract_build_timestamp(&self, pattern_override: &str, text: &str) -> String {
        self.extract(&BUILD_TIMESTAMP_PATTERN, pattern_override, text)
    }

    fn extract(&self, default: &Regex, pattern_override: &str, text: &str) -> String {
        if pattern_override.trim().is_empty() {
            return first_group(default, text);
        }

        match full_match_regex(pattern_override) {
            Ok(pattern) => first_group(&pattern, text),
            Err(e) => {
                warn!("提取正则无效 {}: {}", pattern_override, e);
                String::new()
            }
        }
    }
}

/// 编译要求匹配整段文本的正则
pub fn full_match_regex(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})$"))
}

fn first_group(pattern: &Regex, text: &str) -> String {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|group| group.as_str().to_string())
        .unwrap_or_default()
}
