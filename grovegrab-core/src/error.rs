use crate::types::TaskStatus;
use thiserror::Error;

/// 客户端错误分类
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// 网络不可达或响应不是预期格式
    #[error("{0}")]
    Transport(String),

    /// 服务端返回的结构化错误，原样透传
    #[error("{0}")]
    Application(String),

    /// 发起网络请求之前就被拒绝的输入
    #[error("{0}")]
    Validation(String),

    /// 本地已知状态不允许该操作
    #[error("Cannot {action} task {task_id} while it is {status}")]
    InvalidState {
        action: &'static str,
        task_id: String,
        status: TaskStatus,
    },
}

impl Error {
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// 服务端拒绝或本地前置条件不满足
    pub fn is_application(&self) -> bool {
        matches!(self, Self::Application(_) | Self::InvalidState { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
