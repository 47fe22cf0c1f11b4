use crate::{
    error::{Error, Result},
    types::{ConfigUpdate, Health, RemoteConfig, StartedTask, Task, UrlInfo},
};
use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{
    Client, Method, Proxy, RequestBuilder, Response,
    header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{collections::HashMap, time::Duration};

/// 路径段中保留的字符之外一律转义
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'~');

/// 把任务 ID 编码为单个路径段
fn segment(task_id: &str) -> Result<String> {
    if matches!(task_id, "" | "." | "..") {
        return Err(Error::Validation(format!("Invalid task id {task_id:?}")));
    }
    Ok(utf8_percent_encode(task_id, SEGMENT).to_string())
}

/// 远端任务源
///
/// 服务端是任务状态的唯一事实来源，客户端只能读取或发出命令。
#[async_trait]
pub trait RemoteTaskSource: Send + Sync {
    async fn list_tasks(&self) -> Result<Vec<Task>>;

    async fn get_task(&self, task_id: &str) -> Result<Task>;

    async fn start_download(&self, url: &str, download_path: Option<&str>) -> Result<StartedTask>;

    async fn preload(&self, url: &str) -> Result<StartedTask>;

    async fn retry(&self, task_id: &str) -> Result<()>;

    async fn cancel(&self, task_id: &str) -> Result<()>;

    async fn delete(&self, task_id: &str) -> Result<()>;

    async fn logs(&self, task_id: &str) -> Result<Vec<String>>;

    async fn get_config(&self) -> Result<RemoteConfig>;

    async fn update_config(&self, update: &ConfigUpdate) -> Result<()>;

    async fn validate_url(&self, url: &str) -> Result<UrlInfo>;

    async fn health(&self) -> Result<Health>;
}

/// HTTP 客户端配置
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// 后端地址
    pub base_url: String,
    /// 单次请求超时
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
    /// 附加请求头
    pub headers: HashMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout: Duration::from_secs(30),
            user_agent: Some(concat!("grovegrab/", env!("CARGO_PKG_VERSION")).to_string()),
            proxy: None,
            headers: HashMap::new(),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct LogsBody {
    logs: Vec<String>,
}

/// 命令类接口的确认回执，内容不参与逻辑
#[derive(Deserialize)]
struct Ack {}

#[derive(Serialize)]
struct UrlBody<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct DownloadBody<'a> {
    url: &'a str,
    download_path: Option<&'a str>,
}

/// 基于 REST 接口的任务源
#[derive(Debug, Clone)]
pub struct HttpTaskSource {
    client: Client,
    base_url: String,
}

impl HttpTaskSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_config(ClientConfig {
            base_url: base_url.into(),
            ..Default::default()
        })
    }

    /// 使用自定义配置创建客户端
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(config.timeout);

        // 设置代理
        if let Some(proxy_url) = &config.proxy {
            let proxy = Proxy::all(proxy_url)
                .map_err(|e| Error::Validation(format!("Invalid proxy {proxy_url}: {e}")))?;
            builder = builder.proxy(proxy);
        }

        if let Some(ua) = &config.user_agent {
            builder = builder.user_agent(ua.as_str());
        }

        let mut headers = HeaderMap::new();
        for (key, value) in &config.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| Error::Validation(format!("Invalid header {key}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::Validation(format!("Invalid header {key}: {e}")))?;
            headers.insert(name, value);
        }
        builder = builder.default_headers(headers);

        let client = builder
            .build()
            .map_err(|e| Error::Transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, endpoint))
    }

    async fn send<T: DeserializeOwned>(&self, endpoint: &str, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(|e| self.connect_error(endpoint, &e))?;
        self.decode(endpoint, response).await
    }

    fn connect_error(&self, endpoint: &str, err: &reqwest::Error) -> Error {
        tracing::debug!(endpoint, error = %err, "request failed");
        if err.is_timeout() {
            Error::Transport(format!("Request to {endpoint} timed out"))
        } else {
            Error::Transport(format!(
                "Cannot connect to backend server at {}. Please make sure it is running.",
                self.base_url
            ))
        }
    }

    /// 非 JSON 或形状不符的响应视为传输层错误；
    /// 非 2xx 的结构化错误原样透传
    async fn decode<T: DeserializeOwned>(&self, endpoint: &str, response: Response) -> Result<T> {
        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"));
        if !is_json {
            return Err(Error::Transport(format!(
                "Backend server is not responding correctly. Make sure the server is running at {}",
                self.base_url
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.connect_error(endpoint, &e))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&bytes)
                .map(|body| body.error)
                .unwrap_or_else(|_| format!("HTTP {}", status.as_u16()));
            return Err(Error::Application(message));
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Transport(format!("Malformed response from {endpoint}: {e}")))
    }
}

#[async_trait]
impl RemoteTaskSource for HttpTaskSource {
    async fn list_tasks(&self) -> Result<Vec<Task>> {
        let endpoint = "/api/tasks";
        self.send(endpoint, self.request(Method::GET, endpoint)).await
    }

    async fn get_task(&self, task_id: &str) -> Result<Task> {
        let endpoint = format!("/api/tasks/{}", segment(task_id)?);
        self.send(&endpoint, self.request(Method::GET, &endpoint))
            .await
    }

    async fn start_download(&self, url: &str, download_path: Option<&str>) -> Result<StartedTask> {
        let endpoint = "/api/download";
        let body = DownloadBody { url, download_path };
        self.send(endpoint, self.request(Method::POST, endpoint).json(&body))
            .await
    }

    async fn preload(&self, url: &str) -> Result<StartedTask> {
        let endpoint = "/api/preload";
        self.send(
            endpoint,
            self.request(Method::POST, endpoint).json(&UrlBody { url }),
        )
        .await
    }

    async fn retry(&self, task_id: &str) -> Result<()> {
        let endpoint = format!("/api/tasks/{}/retry", segment(task_id)?);
        let _: Ack = self
            .send(&endpoint, self.request(Method::POST, &endpoint))
            .await?;
        Ok(())
    }

    async fn cancel(&self, task_id: &str) -> Result<()> {
        let endpoint = format!("/api/tasks/{}/cancel", segment(task_id)?);
        let _: Ack = self
            .send(&endpoint, self.request(Method::POST, &endpoint))
            .await?;
        Ok(())
    }

    async fn delete(&self, task_id: &str) -> Result<()> {
        let endpoint = format!("/api/tasks/{}", segment(task_id)?);
        let _: Ack = self
            .send(&endpoint, self.request(Method::DELETE, &endpoint))
            .await?;
        Ok(())
    }

    async fn logs(&self, task_id: &str) -> Result<Vec<String>> {
        let endpoint = format!("/api/logs/{}", segment(task_id)?);
        let body: LogsBody = self
            .send(&endpoint, self.request(Method::GET, &endpoint))
            .await?;
        Ok(body.logs)
    }

    async fn get_config(&self) -> Result<RemoteConfig> {
        let endpoint = "/api/config";
        self.send(endpoint, self.request(Method::GET, endpoint)).await
    }

    async fn update_config(&self, update: &ConfigUpdate) -> Result<()> {
        let endpoint = "/api/config";
        let _: Ack = self
            .send(endpoint, self.request(Method::POST, endpoint).json(update))
            .await?;
        Ok(())
    }

    async fn validate_url(&self, url: &str) -> Result<UrlInfo> {
        let endpoint = "/api/validate-url";
        self.send(
            endpoint,
            self.request(Method::POST, endpoint).json(&UrlBody { url }),
        )
        .await
    }

    async fn health(&self) -> Result<Health> {
        let endpoint = "/health";
        self.send(endpoint, self.request(Method::GET, endpoint)).await
    }
}
