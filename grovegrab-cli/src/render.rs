use grovegrab_core::{
    SongList, Task, TaskKind, TaskStatus, TrackStatus, TrackerEvent,
    progress::{TaskProgress, Totals, visible_tracks},
};
use std::fmt::Write;

fn status_label(status: TaskStatus) -> String {
    status.as_str().to_uppercase()
}

fn track_icon(status: TrackStatus) -> &'static str {
    match status {
        TrackStatus::Completed => "✓",
        TrackStatus::Failed => "✗",
        TrackStatus::Cancelled => "■",
        TrackStatus::Downloading => "▶",
        TrackStatus::Pending => "·",
    }
}

/// 单个任务的多行描述
pub fn task(task: &Task, with_tracks: bool) -> String {
    let progress = TaskProgress::of(task);
    let kind = match task.kind {
        TaskKind::Download => "download",
        TaskKind::Preload => "preload",
    };

    let mut out = String::new();
    let _ = writeln!(
        out,
        "[{}] {} {} ({kind})",
        status_label(task.status),
        task.id,
        task.url
    );
    if let Some(path) = &task.download_path {
        let _ = writeln!(out, "    path: {path}");
    }
    if task.status == TaskStatus::Running {
        let total = progress
            .total
            .map_or_else(|| "?".to_string(), |total| total.to_string());
        let _ = writeln!(
            out,
            "    progress: {}%  {} / {total} tracks completed",
            progress.percent, progress.completed
        );
        if let Some(current) = progress.current_track {
            let _ = writeln!(out, "    downloading: {current}");
        }
    }

    let mut stats = format!("    downloaded: {}", progress.completed);
    if progress.failed > 0 {
        let _ = write!(stats, "  failed: {}", progress.failed);
    }
    if let Some(remaining) = progress.remaining {
        let _ = write!(stats, "  remaining: {remaining}");
    }
    if let Some(updated_at) = &task.updated_at {
        let _ = write!(stats, "  updated: {updated_at}");
    }
    out.push_str(&stats);
    out.push('\n');

    if with_tracks {
        for track in visible_tracks(task) {
            let _ = writeln!(
                out,
                "      {} {} {}%",
                track_icon(track.status),
                track.title,
                track.progress
            );
        }
    }
    out
}

pub fn tasks(tasks: &[Task], with_tracks: bool) -> String {
    if tasks.is_empty() {
        return "No active downloads\n".to_string();
    }
    let totals = Totals::of(tasks);
    let mut out = format!(
        "{} task(s), {} running, {} track(s) downloaded, {} failed\n",
        totals.tasks, totals.running, totals.completed_tracks, totals.failed_tracks
    );
    for t in tasks {
        out.push_str(&task(t, with_tracks));
    }
    out
}

pub fn songs(list: &SongList) -> String {
    if list.is_empty() {
        return "No songs yet\n".to_string();
    }
    let mut out = String::new();
    for song in &list.downloaded {
        let _ = writeln!(out, "✓ {}", song.name);
    }
    for song in &list.downloading {
        let _ = writeln!(out, "▶ {}", song.name);
    }
    for group in &list.pending {
        let _ = writeln!(out, "· {} pending from {}", group.count, group.url);
    }
    for song in &list.failed {
        let _ = writeln!(out, "✗ {}", song.name);
    }
    out
}

pub fn event(event: &TrackerEvent) -> String {
    match event {
        TrackerEvent::TaskAppeared { task_id, status } => {
            format!("+ {task_id} ({status})")
        }
        TrackerEvent::TaskStatusChanged { task_id, from, to } => {
            format!("~ {task_id}: {from} -> {to}")
        }
        TrackerEvent::TaskRemoved { task_id } => format!("- {task_id}"),
        TrackerEvent::PollFailed { message } => format!("! {message}"),
    }
}
