use anyhow::Result;
use grovegrab_core::{ClientConfig, TrackerConfig};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// 本地客户端设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// 后端地址
    pub server_url: String,
    /// 轮询间隔（毫秒）
    pub poll_interval_ms: u64,
    /// 请求超时（秒）
    pub timeout: u64,
    /// 用户代理
    pub user_agent: String,
    /// 代理地址
    #[serde(default)]
    pub proxy: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".to_string(),
            poll_interval_ms: 2000,
            timeout: 30,
            user_agent: concat!("grovegrab/", env!("CARGO_PKG_VERSION")).to_string(),
            proxy: None,
        }
    }
}

impl Settings {
    /// 默认设置文件位置
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("grovegrab")
            .join("settings.json")
    }

    /// 从文件加载设置
    pub async fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs_err::tokio::read_to_string(path).await?;
            let settings: Settings = serde_json::from_str(&content)?;
            Ok(settings)
        } else {
            // 如果设置文件不存在，返回默认设置
            Ok(Self::default())
        }
    }

    /// 保存设置到文件
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs_err::tokio::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs_err::tokio::write(path, content).await?;
        Ok(())
    }

    /// 验证设置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            anyhow::bail!("server_url must not be empty");
        }
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than 0");
        }
        if self.timeout == 0 {
            anyhow::bail!("timeout must be greater than 0");
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.server_url.clone(),
            timeout: Duration::from_secs(self.timeout),
            user_agent: Some(self.user_agent.clone()),
            proxy: self.proxy.clone(),
            ..Default::default()
        }
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            ..Default::default()
        }
    }
}
