//! HTTP传输层
//!
//! 把一次GET请求的结果转换为 `Ok(响应体)` 或带类别的 [`TransportError`]，
//! 检测器只消费这个结果，不直接处理 reqwest 的错误。

use async_trait::async_trait;
use reqwest::Client;
use std::fmt;
use std::time::Duration;

/// 传输层失败，显示为 `"<类别>: <信息>"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    /// 失败类别，如 `ConnectError`、`TimeoutError`
    pub kind: String,
    /// 底层错误信息
    pub message: String,
}

impl TransportError {
    /// 创建传输错误
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// 从 reqwest 错误归类
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            "TimeoutError"
        } else if error.is_connect() {
            "ConnectError"
        } else if error.is_builder() {
            "BuilderError"
        } else if error.is_redirect() {
            "RedirectError"
        } else if error.is_decode() {
            "DecodeError"
        } else if error.is_body() {
            "BodyError"
        } else if error.is_request() {
            "RequestError"
        } else {
            "HttpError"
        };

        Self::new(kind, error_chain(error))
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for TransportError {}

/// 拼接错误及其来源，reqwest 的顶层信息通常不包含真正原因
fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

/// HTTP传输trait
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// 执行GET请求并返回响应体文本，状态码不影响结果
    async fn get(&self, url: &str) -> Result<String, TransportError>;
}

/// 基于 reqwest 的传输实现
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// 创建传输实现，连接、读取和整体请求使用同一个超时
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .timeout(timeout)
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .build()
            .map_err(|e| TransportError::from_reqwest(&e))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<String, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))
    }
}
