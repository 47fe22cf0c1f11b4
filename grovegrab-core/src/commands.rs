use crate::{
    error::{Error, Result},
    tracker::TaskTracker,
    types::{ConfigUpdate, Health, RemoteConfig, StartedTask, Task, TaskStatus, UrlInfo},
};

fn require_url(url: &str) -> Result<&str> {
    let url = url.trim();
    if url.is_empty() {
        return Err(Error::Validation("URL is required".to_string()));
    }
    Ok(url)
}

impl TaskTracker {
    /// 按本地最后已知状态检查前置条件
    ///
    /// 本地未知的任务交给服务端裁决。
    fn require(
        &self,
        task_id: &str,
        action: &'static str,
        allowed: impl Fn(TaskStatus) -> bool,
    ) -> Result<()> {
        let status = self.inner.snapshot.borrow().status_of(task_id);
        match status {
            Some(status) if !allowed(status) => Err(Error::InvalidState {
                action,
                task_id: task_id.to_string(),
                status,
            }),
            _ => Ok(()),
        }
    }

    /// 新建下载任务
    ///
    /// # 参数
    /// * `url` - 来源 URL，去除首尾空白后不能为空
    /// * `download_path` - 下载目录，为空时使用服务端默认值
    ///
    /// # 返回
    /// 返回服务端分配的任务 ID
    pub async fn start_download(
        &self,
        url: &str,
        download_path: Option<&str>,
    ) -> Result<StartedTask> {
        let url = require_url(url)?;
        let missing_credentials = self
            .inner
            .remote_config
            .read()
            .await
            .as_ref()
            .is_some_and(|config| !config.has_credentials);
        if missing_credentials {
            return Err(Error::Validation(
                "Spotify API credentials are not configured".to_string(),
            ));
        }

        let download_path = download_path.map(str::trim).filter(|p| !p.is_empty());
        let started = self.inner.source.start_download(url, download_path).await?;
        tracing::info!(task_id = %started.task_id, url, "download started");

        // 新任务尽快出现，不等下一个 tick
        self.schedule_refresh();
        Ok(started)
    }

    /// 预加载元数据
    pub async fn preload(&self, url: &str) -> Result<StartedTask> {
        let url = require_url(url)?;
        let started = self.inner.source.preload(url).await?;
        tracing::info!(task_id = %started.task_id, url, "preload started");
        self.schedule_refresh();
        Ok(started)
    }

    /// 重试失败的任务，仅允许从 `failed` 状态发起
    pub async fn retry(&self, task_id: &str) -> Result<()> {
        self.require(task_id, "retry", |status| status == TaskStatus::Failed)?;
        self.inner.source.retry(task_id).await?;
        tracing::info!(task_id, "retry requested");
        self.refresh().await;
        Ok(())
    }

    /// 取消运行中的任务
    ///
    /// 本地立即乐观地标记为 `cancelled`。远端失败时不做显式回滚，
    /// 紧随其后的刷新会用服务端的值覆盖。
    pub async fn cancel(&self, task_id: &str) -> Result<()> {
        self.require(task_id, "cancel", |status| status == TaskStatus::Running)?;

        self.inner.snapshot.send_if_modified(|snapshot| {
            snapshot.patch_task(task_id, |task| {
                task.status = TaskStatus::Cancelled;
                task.current_track = None;
            })
        });

        let result = self.inner.source.cancel(task_id).await;
        match &result {
            Ok(()) => tracing::info!(task_id, "task cancelled"),
            Err(err) => tracing::warn!(task_id, error = %err, "cancel rejected"),
        }
        self.refresh().await;
        result
    }

    /// 删除已终止的任务
    ///
    /// 本地列表不做删除，以服务端后续不再报告该任务为准。
    pub async fn delete(&self, task_id: &str) -> Result<()> {
        self.require(task_id, "delete", TaskStatus::is_terminal)?;
        self.inner.source.delete(task_id).await?;
        tracing::info!(task_id, "task deleted");
        self.refresh().await;
        Ok(())
    }

    /// 获取任务的完整日志（不写入快照）
    pub async fn get_logs(&self, task_id: &str) -> Result<Vec<String>> {
        self.inner.source.logs(task_id).await
    }

    /// 获取单个任务
    pub async fn get_task(&self, task_id: &str) -> Result<Task> {
        self.inner.source.get_task(task_id).await
    }

    /// 拉取后端配置并缓存凭据状态
    pub async fn load_config(&self) -> Result<RemoteConfig> {
        let config = self.inner.source.get_config().await?;
        *self.inner.remote_config.write().await = Some(config.clone());
        Ok(config)
    }

    /// 最近一次拉取到的后端配置
    pub async fn cached_config(&self) -> Option<RemoteConfig> {
        self.inner.remote_config.read().await.clone()
    }

    /// 更新后端配置，成功后重新拉取
    pub async fn update_config(&self, update: &ConfigUpdate) -> Result<RemoteConfig> {
        self.inner.source.update_config(update).await?;
        tracing::info!("configuration updated");
        self.load_config().await
    }

    /// 校验 URL 并返回其类型
    pub async fn validate_url(&self, url: &str) -> Result<UrlInfo> {
        let url = require_url(url)?;
        self.inner.source.validate_url(url).await
    }

    pub async fn health(&self) -> Result<Health> {
        self.inner.source.health().await
    }
}
