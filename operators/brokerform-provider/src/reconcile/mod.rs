//! 资源协调模块
//!
//! 每种资源类型对应一个处理器。处理器负责让外部系统的实际状态与声明一致：
//! 变更之前总是先读取当前状态，已存在且一致的资源直接确认，不一致的资源以冲突拒绝。
//! 处理器只返回分类后的错误，是否重试由编排器决定。

pub mod acl;
pub mod namespace;
pub mod topic;

use async_trait::async_trait;
use serde_json::Value;

use brokerform_common::{CompletionCheck, Continuation, LifecycleEvent, Properties, ReconciliationResult, Result};

pub use acl::AclHandler;
pub use namespace::{NamespaceApi, NamespaceHandler};
pub use topic::TopicHandler;

/// 资源处理器
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// 由事件推导物理资源 ID，不做任何网络调用
    ///
    /// Update/Delete 事件沿用 Create 时分配的 ID。
    fn physical_id(&self, event: &LifecycleEvent) -> Result<String>;

    /// 处理一次生命周期事件
    async fn handle_event(&self, event: &LifecycleEvent) -> Result<ReconciliationResult>;

    /// 检查异步操作是否完成
    async fn check_complete(&self, continuation: &Continuation) -> Result<CompletionCheck>;
}

/// 将一次完整的重新协调转换为完成检查结果
///
/// ACL、Topic 等同步资源的协调本身是幂等的，完成检查直接重新执行一遍。
pub(crate) fn as_completion(result: ReconciliationResult) -> CompletionCheck {
    if result.is_complete {
        CompletionCheck::complete(result.data)
    } else {
        CompletionCheck::pending(result.checkpoint)
    }
}

/// 构造输出数据
pub(crate) fn output<I, K>(entries: I) -> Properties
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    entries.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
