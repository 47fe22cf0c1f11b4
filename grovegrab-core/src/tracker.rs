use crate::{
    client::RemoteTaskSource,
    error::Result,
    state::Snapshot,
    types::{RemoteConfig, Task, TrackerConfig, TrackerEvent},
};
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::{Mutex, RwLock, mpsc, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};

/// 轮询间隔下限，`interval` 不接受零间隔
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub(crate) struct Inner {
    pub(crate) source: Arc<dyn RemoteTaskSource>,
    config: TrackerConfig,
    pub(crate) snapshot: watch::Sender<Snapshot>,
    /// 同一时刻最多一个任务列表请求在途
    fetch_lock: Mutex<()>,
    /// 视图销毁后置为 false，迟到的响应直接丢弃
    alive: AtomicBool,
    pub(crate) remote_config: RwLock<Option<RemoteConfig>>,
    event_tx: mpsc::Sender<TrackerEvent>,
}

/// 任务跟踪器
///
/// 定时轮询远端任务列表，并以不可变快照的形式发布给展示层。
/// 命令（取消、重试、删除等）见 `commands` 模块。
#[derive(Clone)]
pub struct TaskTracker {
    pub(crate) inner: Arc<Inner>,
}

impl TaskTracker {
    /// 创建新的跟踪器
    ///
    /// # 参数
    /// * `source` - 远端任务源
    /// * `config` - 轮询间隔等配置
    ///
    /// # 返回
    /// 返回跟踪器实例和事件接收器
    pub fn new(
        source: Arc<dyn RemoteTaskSource>,
        config: TrackerConfig,
    ) -> (Self, mpsc::Receiver<TrackerEvent>) {
        let config = TrackerConfig {
            poll_interval: config.poll_interval.max(MIN_POLL_INTERVAL),
            ..config
        };
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity.max(1));
        let (snapshot, _) = watch::channel(Snapshot::default());

        let tracker = Self {
            inner: Arc::new(Inner {
                source,
                config,
                snapshot,
                fetch_lock: Mutex::new(()),
                alive: AtomicBool::new(true),
                remote_config: RwLock::new(None),
                event_tx,
            }),
        };

        (tracker, event_rx)
    }

    /// 订阅快照变化
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.snapshot.subscribe()
    }

    /// 当前快照
    pub fn snapshot(&self) -> Snapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::Acquire)
    }

    /// 启动定时轮询，第一次轮询立即进行
    pub fn start(&self) -> Poller {
        let tracker = self.clone();
        let handle = tokio::spawn(async move { tracker.run().await });
        Poller {
            tracker: self.clone(),
            handle,
        }
    }

    /// 停止跟踪器，之后不再发布任何快照
    pub fn stop(&self) {
        self.inner.alive.store(false, Ordering::Release);
    }

    async fn run(self) {
        let mut ticker = tokio::time::interval(self.inner.config.poll_interval);
        // 上一次请求未返回时错过的 tick 直接跳过，不排队
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if !self.is_alive() {
                break;
            }
            self.poll().await;
        }
        tracing::debug!("poll loop stopped");
    }

    /// 定时轮询：已有请求在途时跳过本次
    async fn poll(&self) {
        let Ok(_guard) = self.inner.fetch_lock.try_lock() else {
            tracing::debug!("previous fetch still in flight, skipping tick");
            return;
        };
        let _ = self.fetch_and_publish().await;
    }

    /// 立即刷新（不等下一个 tick），与定时轮询串行
    ///
    /// 失败只记录日志，不向调用方抛出。
    pub async fn refresh(&self) {
        let _guard = self.inner.fetch_lock.lock().await;
        let _ = self.fetch_and_publish().await;
    }

    /// 首次加载失败后的重试入口
    pub async fn reload(&self) -> Result<()> {
        self.inner.snapshot.send_if_modified(|snapshot| {
            if snapshot.is_ready() {
                return false;
            }
            *snapshot = snapshot.loading();
            true
        });
        let _guard = self.inner.fetch_lock.lock().await;
        self.fetch_and_publish().await
    }

    /// 在后台安排一次刷新
    pub(crate) fn schedule_refresh(&self) {
        let tracker = self.clone();
        tokio::spawn(async move { tracker.refresh().await });
    }

    async fn fetch_and_publish(&self) -> Result<()> {
        if !self.is_alive() {
            return Ok(());
        }
        let result = self.inner.source.list_tasks().await;
        if !self.is_alive() {
            tracing::debug!("discarding task list received after teardown");
            return Ok(());
        }

        match result {
            Ok(tasks) => {
                let previous = Arc::clone(&self.inner.snapshot.borrow().tasks);
                self.emit_changes(&previous, &tasks);
                tracing::debug!(count = tasks.len(), "task list refreshed");
                self.inner
                    .snapshot
                    .send_modify(|snapshot| *snapshot = snapshot.replaced(tasks));
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                let ready = self.inner.snapshot.borrow().is_ready();
                if ready {
                    // 已有可用视图时吞掉错误，避免闪烁
                    tracing::warn!(error = %message, "failed to refresh tasks");
                    self.emit(TrackerEvent::PollFailed { message });
                } else {
                    tracing::warn!(error = %message, "initial task load failed");
                    self.inner
                        .snapshot
                        .send_modify(|snapshot| *snapshot = snapshot.failed(message));
                }
                Err(err)
            }
        }
    }

    fn emit(&self, event: TrackerEvent) {
        // 消费者跟不上时丢弃事件，绝不阻塞轮询
        if self.inner.event_tx.try_send(event).is_err() {
            tracing::trace!("tracker event dropped");
        }
    }

    fn emit_changes(&self, previous: &[Task], current: &[Task]) {
        let before: HashMap<&str, &Task> = previous.iter().map(|t| (t.id.as_str(), t)).collect();

        for task in current {
            match before.get(task.id.as_str()) {
                None => self.emit(TrackerEvent::TaskAppeared {
                    task_id: task.id.clone(),
                    status: task.status,
                }),
                Some(old) if old.status != task.status => {
                    self.emit(TrackerEvent::TaskStatusChanged {
                        task_id: task.id.clone(),
                        from: old.status,
                        to: task.status,
                    })
                }
                Some(_) => {}
            }
        }

        for old in previous {
            if !current.iter().any(|task| task.id == old.id) {
                self.emit(TrackerEvent::TaskRemoved {
                    task_id: old.id.clone(),
                });
            }
        }
    }
}

/// 轮询句柄，drop 或 `stop` 时终止轮询
pub struct Poller {
    tracker: TaskTracker,
    handle: JoinHandle<()>,
}

impl Poller {
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.tracker.stop();
        self.handle.abort();
    }
}
