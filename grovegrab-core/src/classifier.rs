//! 从任务日志中还原歌曲列表
//!
//! 日志是下载器写出的自由文本，这里只做纯函数式的折叠：
//! 每次都从头重新计算，不保留任何增量状态。

use crate::types::{DerivedSong, PendingGroup, SongList, SongStatus, Task, TaskStatus};
use regex::Regex;
use std::{collections::HashSet, sync::LazyLock};

static DOWNLOADED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"Downloaded "([^"]+)""#).expect("valid regex"));

static FAILURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Error|Failed|AudioProviderError").expect("valid regex"));

// 取行内第一个引号包裹的片段，单双引号都算
static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"["']([^"']+)["']"#).expect("valid regex"));

/// 判断标题是否为 `query:` 之类的占位符
pub fn is_query_title(title: &str) -> bool {
    let t = title.trim().to_lowercase();
    if t.is_empty() || t == "query:" || t == "query" {
        return true;
    }
    t.strip_prefix("query:")
        .is_some_and(|rest| rest.trim().is_empty())
}

/// 若日志行是 `Downloaded "<name>"`，返回歌曲名
pub fn downloaded_name(line: &str) -> Option<&str> {
    DOWNLOADED
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// 若日志行是失败行且带引号片段，返回第一个引号内的文本
///
/// 引号内容不一定是歌名（可能是错误类型或路径片段），这是已知的启发式限制。
pub fn failed_name(line: &str) -> Option<&str> {
    if !FAILURE.is_match(line) {
        return None;
    }
    QUOTED
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// 待下载曲目数，仅对总数已知的运行中任务有意义
pub fn pending_count(task: &Task) -> Option<u32> {
    if task.status != TaskStatus::Running || task.total_tracks == 0 {
        return None;
    }
    let in_flight = i64::from(task.current_track.is_some());
    let count = i64::from(task.total_tracks)
        - i64::from(task.completed_tracks)
        - i64::from(task.failed_tracks)
        - in_flight;
    u32::try_from(count).ok().filter(|&c| c > 0)
}

#[derive(Default)]
struct Classifier {
    list: SongList,
    downloaded: HashSet<String>,
    downloading: HashSet<String>,
    failed: HashSet<String>,
}

impl Classifier {
    fn song(task: &Task, name: &str, status: SongStatus) -> DerivedSong {
        DerivedSong {
            name: name.to_string(),
            status,
            task_id: task.id.clone(),
            url: task.url.clone(),
        }
    }

    fn feed(&mut self, task: &Task) {
        for line in &task.logs {
            if let Some(name) = downloaded_name(line)
                && self.downloaded.insert(name.to_string())
            {
                self.list
                    .downloaded
                    .push(Self::song(task, name, SongStatus::Completed));
            }

            if let Some(name) = failed_name(line)
                && !self.downloaded.contains(name)
                && self.failed.insert(name.to_string())
            {
                self.list
                    .failed
                    .push(Self::song(task, name, SongStatus::Failed));
            }
        }

        if task.status == TaskStatus::Running
            && let Some(current) = task.current_track.as_deref()
            && !is_query_title(current)
            && self.downloading.insert(current.to_string())
        {
            self.list
                .downloading
                .push(Self::song(task, current, SongStatus::Downloading));
        }

        if let Some(count) = pending_count(task) {
            self.list.pending.push(PendingGroup {
                task_id: task.id.clone(),
                url: task.url.clone(),
                count,
            });
        }
    }

    fn finish(self) -> SongList {
        self.list
    }
}

/// 对单个任务分类
pub fn classify_task(task: &Task) -> SongList {
    classify_tasks(std::slice::from_ref(task))
}

/// 对整个任务列表分类，歌曲名在所有任务间去重，先出现者保留
pub fn classify_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> SongList {
    let mut classifier = Classifier::default();
    for task in tasks {
        classifier.feed(task);
    }
    classifier.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskKind;

    fn task(status: TaskStatus, logs: &[&str]) -> Task {
        Task {
            id: "t1".to_string(),
            url: "https://open.spotify.com/playlist/abc".to_string(),
            kind: TaskKind::Download,
            status,
            total_tracks: 0,
            completed_tracks: 0,
            failed_tracks: 0,
            current_track: None,
            progress: 0,
            tracks: Vec::new(),
            logs: logs.iter().map(|s| s.to_string()).collect(),
            failed_track_list: Vec::new(),
            download_path: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn names(songs: &[DerivedSong]) -> Vec<&str> {
        songs.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_end_to_end_running_task() {
        let mut t = task(
            TaskStatus::Running,
            &["Downloaded \"Song A\"", "Starting Song B"],
        );
        t.total_tracks = 3;
        t.completed_tracks = 1;
        t.current_track = Some("Song B".to_string());

        let list = classify_task(&t);
        assert_eq!(names(&list.downloaded), ["Song A"]);
        assert_eq!(names(&list.downloading), ["Song B"]);
        assert_eq!(list.pending.len(), 1);
        assert_eq!(list.pending[0].count, 1);
        assert_eq!(list.pending[0].task_id, "t1");
        assert!(list.failed.is_empty());
    }

    #[test]
    fn test_classification_is_idempotent() {
        let mut t = task(
            TaskStatus::Running,
            &[
                "[10:00:01] Downloaded \"One\": https://youtube.com/a",
                "[10:00:02] AudioProviderError: 'Two' not found",
                "[10:00:03] Downloaded \"One\": https://youtube.com/a",
            ],
        );
        t.total_tracks = 5;
        t.current_track = Some("Three".to_string());

        let first = classify_task(&t);
        let second = classify_task(&t);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_first_downloaded_occurrence_wins() {
        let t = task(
            TaskStatus::Completed,
            &["Downloaded \"Song A\": x", "Downloaded \"Song A\": y"],
        );
        let list = classify_task(&t);
        assert_eq!(list.downloaded.len(), 1);
    }

    #[test]
    fn test_completed_takes_precedence_over_failed() {
        let t = task(
            TaskStatus::Failed,
            &["Downloaded \"X\": url", "Error while tagging \"X\""],
        );
        let list = classify_task(&t);
        assert_eq!(names(&list.downloaded), ["X"]);
        assert!(list.failed.is_empty());
    }

    #[test]
    fn test_failure_before_download_is_kept() {
        // 失败行只参照此前已完成的歌曲
        let t = task(
            TaskStatus::Completed,
            &["Failed to fetch \"X\"", "Downloaded \"X\": url"],
        );
        let list = classify_task(&t);
        assert_eq!(names(&list.downloaded), ["X"]);
        assert_eq!(names(&list.failed), ["X"]);
    }

    #[test]
    fn test_failed_line_requires_token_and_quote() {
        let t = task(
            TaskStatus::Failed,
            &[
                "Error: connection reset",
                "Skipping \"Not A Failure\"",
                "Failed 'Single Quoted'",
                "Failed \"Dup\"",
                "Error \"Dup\"",
            ],
        );
        let list = classify_task(&t);
        assert_eq!(names(&list.failed), ["Single Quoted", "Dup"]);
    }

    #[test]
    fn test_failed_takes_first_quoted_substring() {
        let t = task(
            TaskStatus::Failed,
            &["AudioProviderError: 'YT-DLP' could not find \"Song Z\""],
        );
        let list = classify_task(&t);
        assert_eq!(names(&list.failed), ["YT-DLP"]);
    }

    #[test]
    fn test_failure_tokens_are_case_sensitive() {
        let t = task(TaskStatus::Failed, &["error with \"lower\""]);
        assert!(classify_task(&t).failed.is_empty());
    }

    #[test]
    fn test_query_titles() {
        assert!(is_query_title("query:"));
        assert!(is_query_title("Query"));
        assert!(is_query_title("query:   "));
        assert!(is_query_title("  QUERY:  "));
        assert!(is_query_title(""));
        assert!(!is_query_title("query: Bohemian Rhapsody"));
        assert!(!is_query_title("Queryous"));
    }

    #[test]
    fn test_placeholder_current_track_not_downloading() {
        for placeholder in ["query:", "Query", "query:   "] {
            let mut t = task(TaskStatus::Running, &[]);
            t.current_track = Some(placeholder.to_string());
            assert!(classify_task(&t).downloading.is_empty(), "{placeholder}");
        }

        let mut t = task(TaskStatus::Running, &[]);
        t.current_track = Some("query: Bohemian Rhapsody".to_string());
        assert_eq!(
            names(&classify_task(&t).downloading),
            ["query: Bohemian Rhapsody"]
        );
    }

    #[test]
    fn test_pending_arithmetic() {
        let mut t = task(TaskStatus::Running, &[]);
        t.total_tracks = 10;
        t.completed_tracks = 6;
        t.failed_tracks = 1;
        t.current_track = Some("Now".to_string());
        assert_eq!(pending_count(&t), Some(2));

        t.current_track = None;
        assert_eq!(pending_count(&t), Some(3));

        t.completed_tracks = 9;
        assert_eq!(pending_count(&t), None);
    }

    #[test]
    fn test_no_pending_or_downloading_unless_running() {
        let mut t = task(TaskStatus::Cancelled, &[]);
        t.total_tracks = 10;
        t.current_track = Some("Song".to_string());
        let list = classify_task(&t);
        assert!(list.pending.is_empty());
        assert!(list.downloading.is_empty());

        t.status = TaskStatus::Running;
        t.total_tracks = 0;
        assert!(classify_task(&t).pending.is_empty());
    }

    #[test]
    fn test_names_deduplicated_across_tasks() {
        let a = task(TaskStatus::Completed, &["Downloaded \"Shared\""]);
        let mut b = task(TaskStatus::Completed, &["Downloaded \"Shared\""]);
        b.id = "t2".to_string();

        let list = classify_tasks([&a, &b]);
        assert_eq!(list.downloaded.len(), 1);
        assert_eq!(list.downloaded[0].task_id, "t1");
    }
}
