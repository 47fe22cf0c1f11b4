use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, time::Duration};

/// 任务状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// 等待开始
    Pending,
    /// 正在下载
    Running,
    /// 已完成
    Completed,
    /// 失败
    Failed,
    /// 已取消
    Cancelled,
}

impl TaskStatus {
    /// 是否为终止状态（只允许删除）
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    #[default]
    Download,
    Preload,
}

/// 单曲状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackStatus {
    /// 排队中（后端使用 `queued`）
    #[default]
    #[serde(alias = "queued")]
    Pending,
    Downloading,
    Completed,
    Failed,
    Cancelled,
}

/// 任务中的一首歌曲，完全镜像服务端上报的内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: TrackStatus,
    /// 缺失时由 [`crate::progress::track_display_progress`] 推导
    #[serde(default)]
    pub progress: Option<u32>,
}

/// 下载任务
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// 任务唯一标识符
    pub id: String,
    /// 创建任务时的来源 URL
    pub url: String,
    /// 任务类型
    #[serde(rename = "type", default)]
    pub kind: TaskKind,
    /// 当前状态
    pub status: TaskStatus,
    /// 总曲目数，0 表示未知
    #[serde(default)]
    pub total_tracks: u32,
    /// 已完成曲目数
    #[serde(default)]
    pub completed_tracks: u32,
    /// 失败曲目数
    #[serde(default)]
    pub failed_tracks: u32,
    /// 正在传输的曲目，仅在运行中出现
    #[serde(default, deserialize_with = "non_empty_string")]
    pub current_track: Option<String>,
    /// 百分比进度，原样显示
    #[serde(default)]
    pub progress: u32,
    #[serde(default)]
    pub tracks: Vec<Track>,
    /// 追加写入的日志行
    #[serde(default)]
    pub logs: Vec<String>,
    /// 后端记录的失败日志行
    #[serde(default)]
    pub failed_track_list: Vec<String>,
    #[serde(default)]
    pub download_path: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// 后端用空字符串表示"没有当前曲目"
fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

/// 派生歌曲状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SongStatus {
    Completed,
    Failed,
    Downloading,
}

/// 从日志和计数器推导出的歌曲记录，仅用于展示
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedSong {
    pub name: String,
    pub status: SongStatus,
    pub task_id: String,
    pub url: String,
}

/// 尚未具名的待下载曲目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingGroup {
    pub task_id: String,
    pub url: String,
    pub count: u32,
}

/// 歌曲视图，字段顺序即展示顺序
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongList {
    pub downloaded: Vec<DerivedSong>,
    pub downloading: Vec<DerivedSong>,
    pub pending: Vec<PendingGroup>,
    pub failed: Vec<DerivedSong>,
}

impl SongList {
    pub fn is_empty(&self) -> bool {
        self.downloaded.is_empty()
            && self.downloading.is_empty()
            && self.pending.is_empty()
            && self.failed.is_empty()
    }

    /// 待下载曲目总数
    pub fn pending_count(&self) -> u32 {
        self.pending
            .iter()
            .fold(0u32, |total, group| total.saturating_add(group.count))
    }
}

/// 后端配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub has_credentials: bool,
    #[serde(default)]
    pub default_download_path: String,
    #[serde(default)]
    pub audio_format: String,
    #[serde(default)]
    pub audio_quality: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

/// 更新后端配置的请求体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub download_path: Option<String>,
    pub audio_format: String,
    pub audio_quality: String,
}

impl Default for ConfigUpdate {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://localhost:8888/callback".to_string(),
            download_path: None,
            audio_format: "mp3".to_string(),
            audio_quality: "320k".to_string(),
        }
    }
}

/// URL 校验结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlInfo {
    pub valid: bool,
    /// track / playlist / album / artist
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub url: String,
}

/// 新建任务的回执
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedTask {
    pub task_id: String,
    #[serde(default)]
    pub status: String,
}

/// 健康检查结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// 跟踪器事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    /// 服务端出现了新任务
    TaskAppeared { task_id: String, status: TaskStatus },
    /// 任务状态变化
    TaskStatusChanged {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },
    /// 服务端不再报告该任务
    TaskRemoved { task_id: String },
    /// 轮询失败（已吞掉，仅作通知）
    PollFailed { message: String },
}

/// 跟踪器配置
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// 轮询间隔
    pub poll_interval: Duration,
    /// 事件通道容量
    pub event_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2000),
            event_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_backend_task() {
        let json = r#"{
            "id": "t1",
            "url": "https://open.spotify.com/playlist/abc",
            "type": "download",
            "status": "running",
            "progress": 33,
            "total_tracks": 3,
            "completed_tracks": 1,
            "failed_tracks": 0,
            "current_track": "",
            "tracks": [{"title": "Song A", "status": "completed", "progress": 100},
                       {"title": "Song B", "status": "queued", "progress": 0}],
            "download_path": "/music",
            "logs": ["[12:00:00] Downloaded \"Song A\": https://youtube.com/x"],
            "failed_track_list": [],
            "created_at": "2024-01-01T00:00:00",
            "updated_at": "2024-01-01T00:00:01",
            "cancelled": false
        }"#;

        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.kind, TaskKind::Download);
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.current_track, None);
        assert_eq!(task.tracks[1].status, TrackStatus::Pending);
        assert_eq!(task.logs.len(), 1);
    }

    #[test]
    fn test_decode_minimal_task() {
        let json = r#"{"id": "t2", "url": "u", "status": "failed", "current_track": "Song C"}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.kind, TaskKind::Download);
        assert_eq!(task.total_tracks, 0);
        assert!(task.tracks.is_empty());
        assert_eq!(task.current_track.as_deref(), Some("Song C"));
    }

    #[test]
    fn test_derived_song_serializes_camel_case() {
        let song = DerivedSong {
            name: "Song A".to_string(),
            status: SongStatus::Completed,
            task_id: "t1".to_string(),
            url: "u".to_string(),
        };
        let value = serde_json::to_value(&song).unwrap();
        assert_eq!(value["taskId"], "t1");
        assert_eq!(value["status"], "completed");
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
    }

    #[test]
    fn test_pending_count_saturates() {
        let group = |count| PendingGroup {
            task_id: "t".to_string(),
            url: "u".to_string(),
            count,
        };
        let list = SongList {
            pending: vec![group(u32::MAX), group(5)],
            ..Default::default()
        };
        assert_eq!(list.pending_count(), u32::MAX);
    }
}
