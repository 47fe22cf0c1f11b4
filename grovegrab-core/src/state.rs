use crate::{
    classifier::classify_tasks,
    progress::Totals,
    types::{SongList, Task, TaskStatus},
};
use std::sync::Arc;

/// 加载阶段
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadPhase {
    /// 尚未成功加载过
    #[default]
    Loading,
    /// 至少成功加载过一次
    Ready,
    /// 首次加载失败，需要用户重试
    Failed { message: String },
}

/// 发布给展示层的不可变快照
///
/// 每次成功轮询都会整体替换 `tasks`，从不逐字段修补。
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub phase: LoadPhase,
    pub tasks: Arc<Vec<Task>>,
    /// 每次发布递增
    pub revision: u64,
}

impl Snapshot {
    pub fn is_ready(&self) -> bool {
        self.phase == LoadPhase::Ready
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    pub fn status_of(&self, task_id: &str) -> Option<TaskStatus> {
        self.task(task_id).map(|task| task.status)
    }

    /// 从当前任务重新推导的歌曲视图
    pub fn song_list(&self) -> SongList {
        classify_tasks(self.tasks.iter())
    }

    pub fn totals(&self) -> Totals {
        Totals::of(self.tasks.iter())
    }

    /// 用新的任务列表整体替换
    pub(crate) fn replaced(&self, tasks: Vec<Task>) -> Self {
        Self {
            phase: LoadPhase::Ready,
            tasks: Arc::new(tasks),
            revision: self.revision + 1,
        }
    }

    /// 首次加载失败；已有任务（若有）保持不变
    pub(crate) fn failed(&self, message: String) -> Self {
        Self {
            phase: LoadPhase::Failed { message },
            tasks: Arc::clone(&self.tasks),
            revision: self.revision + 1,
        }
    }

    pub(crate) fn loading(&self) -> Self {
        Self {
            phase: LoadPhase::Loading,
            tasks: Arc::clone(&self.tasks),
            revision: self.revision + 1,
        }
    }

    /// 对单个任务应用本地乐观修改，返回是否命中
    pub(crate) fn patch_task(&mut self, task_id: &str, patch: impl FnOnce(&mut Task)) -> bool {
        let Some(index) = self.tasks.iter().position(|task| task.id == task_id) else {
            return false;
        };
        let mut tasks = Vec::clone(&self.tasks);
        patch(&mut tasks[index]);
        self.tasks = Arc::new(tasks);
        self.revision += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskKind;

    fn task(id: &str, status: TaskStatus) -> Task {
        Task {
            id: id.to_string(),
            url: format!("https://open.spotify.com/track/{id}"),
            kind: TaskKind::Download,
            status,
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
    fn test_replaced_swaps_list_identity() {
        let initial = Snapshot::default();
        let first = initial.replaced(vec![task("a", TaskStatus::Running)]);
        let second = first.replaced(vec![task("a", TaskStatus::Running)]);

        assert!(first.is_ready());
        assert_eq!(second.revision, 2);
        assert!(!Arc::ptr_eq(&first.tasks, &second.tasks));
    }

    #[test]
    fn test_patch_task_leaves_previous_snapshot_untouched() {
        let before = Snapshot::default().replaced(vec![task("a", TaskStatus::Running)]);
        let mut after = before.clone();

        assert!(after.patch_task("a", |t| t.status = TaskStatus::Cancelled));
        assert!(!after.patch_task("missing", |t| t.status = TaskStatus::Cancelled));

        assert_eq!(before.status_of("a"), Some(TaskStatus::Running));
        assert_eq!(after.status_of("a"), Some(TaskStatus::Cancelled));
        assert_eq!(after.revision, before.revision + 1);
    }

    #[test]
    fn test_failed_keeps_tasks() {
        let ready = Snapshot::default().replaced(vec![task("a", TaskStatus::Failed)]);
        let failed = ready.failed("down".to_string());
        assert_eq!(
            failed.phase,
            LoadPhase::Failed {
                message: "down".to_string()
            }
        );
        assert_eq!(failed.tasks.len(), 1);
    }
}
