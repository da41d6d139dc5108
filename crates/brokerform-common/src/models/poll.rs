//! 轮询续传模型
//!
//! 每次完成检查都是独立调用，可能运行在不同的进程或机器上。
//! 恢复轮询所需的全部状态都保存在续传负载中，而不是进程内存里。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::event::{LifecycleEvent, Properties, ReconciliationResult};

/// 轮询状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollState {
    /// 物理资源 ID
    pub physical_id: String,
    /// 供应操作开始时间
    pub started_at: DateTime<Utc>,
    /// 已完成的检查次数
    pub attempt: u32,
    /// 上一次瞬时错误
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PollState {
    /// 创建新的轮询状态
    pub fn new(physical_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            physical_id: physical_id.into(),
            started_at,
            attempt: 0,
            last_error: None,
        }
    }
}

/// 完成检查的结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompletionCheck {
    /// 是否已完成
    pub is_complete: bool,
    /// 透传给调用方的输出
    #[serde(default)]
    pub data: Properties,
    /// 下一次检查所需的续传状态
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub checkpoint: Properties,
    /// 本次检查遇到的瞬时错误
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl CompletionCheck {
    /// 已完成
    pub fn complete(data: Properties) -> Self {
        Self {
            is_complete: true,
            data,
            ..Default::default()
        }
    }

    /// 尚未完成
    pub fn pending(checkpoint: Properties) -> Self {
        Self {
            is_complete: false,
            checkpoint,
            ..Default::default()
        }
    }
}

/// 续传负载
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Continuation {
    /// 原始事件，PhysicalResourceId 已填充
    pub event: LifecycleEvent,
    /// 轮询状态
    pub poll: PollState,
    /// 处理器私有的续传状态
    #[serde(default)]
    pub checkpoint: Properties,
}

impl Continuation {
    /// 根据事件处理结果开始一次轮询
    pub fn begin(
        mut event: LifecycleEvent,
        result: &ReconciliationResult,
        started_at: DateTime<Utc>,
    ) -> Self {
        event.physical_resource_id = Some(result.physical_resource_id.clone());
        Self {
            event,
            poll: PollState::new(result.physical_resource_id.clone(), started_at),
            checkpoint: result.checkpoint.clone(),
        }
    }

    /// 物理资源 ID
    pub fn physical_id(&self) -> &str {
        &self.poll.physical_id
    }

    /// 根据一次检查结果推进到下一次轮询
    pub fn advance(mut self, check: &CompletionCheck) -> Self {
        self.poll.attempt += 1;
        self.poll.last_error = check.last_error.clone();
        self.checkpoint = check.checkpoint.clone();
        self
    }

    /// 自开始以来经过的时间
    pub fn elapsed(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.poll.started_at
    }
}
