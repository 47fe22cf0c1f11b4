use anyhow::Result;
use grovegrab_core::{HttpTaskSource, TaskTracker, TrackerConfig, TrackerEvent};
use std::{sync::Arc, time::Duration};

#[tokio::main]
async fn main() -> Result<()> {
    let server = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:5000".to_string());
    println!("🛰️ 监听下载任务: {server}");

    let source = HttpTaskSource::new(server)?;
    let (tracker, mut events) = TaskTracker::new(Arc::new(source), TrackerConfig::default());
    let poller = tracker.start();

    // 事件监听器
    let listener = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                TrackerEvent::TaskAppeared { task_id, status } => {
                    println!("🆕 新任务 {task_id} ({status})");
                }
                TrackerEvent::TaskStatusChanged { task_id, from, to } => {
                    println!("🔄 {task_id}: {from} -> {to}");
                }
                TrackerEvent::TaskRemoved { task_id } => {
                    println!("🗑️ 任务已删除: {task_id}");
                }
                TrackerEvent::PollFailed { message } => {
                    eprintln!("⚠️ 刷新失败: {message}");
                }
            }
        }
    });

    tokio::time::sleep(Duration::from_secs(30)).await;

    let snapshot = tracker.snapshot();
    let songs = snapshot.song_list();
    println!(
        "📊 已完成 {} 首，下载中 {} 首，待下载 {} 首，失败 {} 首",
        songs.downloaded.len(),
        songs.downloading.len(),
        songs.pending_count(),
        songs.failed.len()
    );

    poller.stop();
    listener.abort();
    println!("✅ 已停止");
    Ok(())
}
