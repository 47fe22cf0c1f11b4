use crate::{
    classifier::is_query_title,
    types::{Task, TaskStatus, Track, TrackStatus},
};

/// 单曲显示进度：优先取上报值，否则已完成为 100，其余为 0
pub fn track_display_progress(track: &Track) -> u32 {
    match track.progress {
        Some(progress) => progress,
        None if track.status == TrackStatus::Completed => 100,
        None => 0,
    }
}

/// 剩余曲目数，总数未知时返回 `None`
pub fn remaining_tracks(task: &Task) -> Option<u32> {
    if task.total_tracks == 0 {
        return None;
    }
    Some(
        task.total_tracks
            .saturating_sub(task.completed_tracks)
            .saturating_sub(task.failed_tracks),
    )
}

/// 用于展示的单曲
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackView<'a> {
    pub title: &'a str,
    pub status: TrackStatus,
    pub progress: u32,
}

/// 过滤掉占位标题后的曲目列表
pub fn visible_tracks(task: &Task) -> Vec<TrackView<'_>> {
    task.tracks
        .iter()
        .filter(|track| !is_query_title(&track.title))
        .map(|track| TrackView {
            title: &track.title,
            status: track.status,
            progress: track_display_progress(track),
        })
        .collect()
}

/// 任务级进度汇总
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskProgress<'a> {
    /// 服务端上报的百分比，原样保留
    pub percent: u32,
    pub completed: u32,
    pub failed: u32,
    pub total: Option<u32>,
    pub remaining: Option<u32>,
    /// 正在下载的曲目（占位标题已隐藏）
    pub current_track: Option<&'a str>,
}

impl<'a> TaskProgress<'a> {
    pub fn of(task: &'a Task) -> Self {
        let current_track = task
            .current_track
            .as_deref()
            .filter(|_| task.status == TaskStatus::Running)
            .filter(|title| !is_query_title(title));
        Self {
            percent: task.progress,
            completed: task.completed_tracks,
            failed: task.failed_tracks,
            total: (task.total_tracks > 0).then_some(task.total_tracks),
            remaining: remaining_tracks(task),
            current_track,
        }
    }
}

/// 整个快照的汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub tasks: usize,
    pub running: usize,
    pub completed_tracks: u32,
    pub failed_tracks: u32,
}

impl Totals {
    pub fn of<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        tasks.into_iter().fold(Self::default(), |mut totals, task| {
            totals.tasks += 1;
            if task.status == TaskStatus::Running {
                totals.running += 1;
            }
            // 计数来自服务端，饱和累加
            totals.completed_tracks = totals.completed_tracks.saturating_add(task.completed_tracks);
            totals.failed_tracks = totals.failed_tracks.saturating_add(task.failed_tracks);
            totals
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskKind;

    fn track(title: &str, status: TrackStatus, progress: Option<u32>) -> Track {
        Track {
            title: title.to_string(),
            status,
            progress,
        }
    }

    fn task() -> Task {
        Task {
            id: "t1".to_string(),
            url: "u".to_string(),
            kind: TaskKind::Download,
            status: TaskStatus::Running,
            total_tracks: 0,
            completed_tracks: 0,
            failed_tracks: 0,
            current_track: None,
            progress: 0,
            tracks: Vec::new(),
            logs: Vec::new(),
            failed_track_list: Vec::new(),
            download_path: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_track_display_progress() {
        assert_eq!(
            track_display_progress(&track("a", TrackStatus::Downloading, Some(42))),
            42
        );
        assert_eq!(
            track_display_progress(&track("a", TrackStatus::Completed, None)),
            100
        );
        assert_eq!(
            track_display_progress(&track("a", TrackStatus::Failed, None)),
            0
        );
    }

    #[test]
    fn test_remaining_tracks() {
        let mut t = task();
        assert_eq!(remaining_tracks(&t), None);

        t.total_tracks = 10;
        t.completed_tracks = 6;
        t.failed_tracks = 1;
        assert_eq!(remaining_tracks(&t), Some(3));
    }

    #[test]
    fn test_visible_tracks_skip_placeholders() {
        let mut t = task();
        t.tracks = vec![
            track("query:", TrackStatus::Downloading, None),
            track("Query", TrackStatus::Pending, None),
            track("query:   ", TrackStatus::Pending, None),
            track("query: Bohemian Rhapsody", TrackStatus::Completed, None),
            track("Song", TrackStatus::Downloading, Some(12)),
        ];

        let visible = visible_tracks(&t);
        let titles: Vec<_> = visible.iter().map(|v| v.title).collect();
        assert_eq!(titles, ["query: Bohemian Rhapsody", "Song"]);
        assert_eq!(visible[0].progress, 100);
        assert_eq!(visible[1].progress, 12);
    }

    #[test]
    fn test_task_progress_hides_placeholder_current_track() {
        let mut t = task();
        t.total_tracks = 4;
        t.completed_tracks = 1;
        t.progress = 25;
        t.current_track = Some("query:".to_string());

        let progress = TaskProgress::of(&t);
        assert_eq!(progress.percent, 25);
        assert_eq!(progress.total, Some(4));
        assert_eq!(progress.remaining, Some(3));
        assert_eq!(progress.current_track, None);

        t.current_track = Some("Song".to_string());
        assert_eq!(TaskProgress::of(&t).current_track, Some("Song"));

        t.status = TaskStatus::Completed;
        assert_eq!(TaskProgress::of(&t).current_track, None);
    }

    #[test]
    fn test_totals() {
        let mut a = task();
        a.completed_tracks = 2;
        let mut b = task();
        b.status = TaskStatus::Failed;
        b.failed_tracks = 3;

        let totals = Totals::of([&a, &b]);
        assert_eq!(totals.tasks, 2);
        assert_eq!(totals.running, 1);
        assert_eq!(totals.completed_tracks, 2);
        assert_eq!(totals.failed_tracks, 3);
    }

    #[test]
    fn test_totals_saturate_on_huge_counters() {
        let mut a = task();
        a.completed_tracks = u32::MAX;
        a.failed_tracks = u32::MAX;
        let mut b = task();
        b.completed_tracks = 1;
        b.failed_tracks = 1;

        let totals = Totals::of([&a, &b]);
        assert_eq!(totals.completed_tracks, u32::MAX);
        assert_eq!(totals.failed_tracks, u32::MAX);
    }
}
