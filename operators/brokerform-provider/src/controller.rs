//! 控制器模块
//!
//! 该模块实现了供应引擎的编排器：每次生命周期变化调用一次 `handle_event`，
//! 之后由外部轮询器反复调用 `check_complete`。编排器本身不持有状态，
//! 负责把处理器返回的错误分为“尚未完成”和终止错误两类。

use tracing::{debug, error, info, warn};

use brokerform_common::{
    CompletionCheck, Continuation, LifecycleEvent, Properties, ReconciliationResult, Result,
};

use crate::event_handler::EventRouter;

/// 编排器
pub struct Controller {
    /// 事件路由器
    router: EventRouter,
}

impl Controller {
    /// 创建新的编排器
    pub fn new(router: EventRouter) -> Self {
        Self { router }
    }

    /// 处理一次生命周期事件
    ///
    /// 瞬时错误报告为尚未完成，物理资源 ID 仍由事件确定性推导；终止错误原样返回，
    /// 外部编排层通过 `Error::message` 取得不带类别前缀的信息。
    pub async fn handle_event(&self, event: &LifecycleEvent) -> Result<ReconciliationResult> {
        let handler = self.router.route(event)?;
        info!("处理 {} {} 事件", event.resource_type, event.request_type);

        match handler.handle_event(event).await {
            Ok(result) => {
                info!(
                    "{} {} 事件处理完成: {}（已完成: {}）",
                    event.resource_type,
                    event.request_type,
                    result.physical_resource_id,
                    result.is_complete
                );
                Ok(result)
            }
            Err(e) if e.is_transient() => {
                let physical_id = handler.physical_id(event)?;
                warn!("{} 暂时无法完成，等待重试: {}", physical_id, e);
                Ok(ReconciliationResult::pending(physical_id, Properties::new()))
            }
            Err(e) => {
                error!(
                    "{} {} 事件失败（{}）: {}",
                    event.resource_type,
                    event.request_type,
                    e.kind(),
                    e
                );
                Err(e)
            }
        }
    }

    /// 检查异步操作是否完成
    ///
    /// 瞬时错误保留原有的续传状态并记录在 lastError 中。
    pub async fn check_complete(&self, continuation: &Continuation) -> Result<CompletionCheck> {
        let handler = self.router.route(&continuation.event)?;
        debug!(
            "检查 {} 是否完成（第 {} 次）",
            continuation.physical_id(),
            continuation.poll.attempt + 1
        );

        match handler.check_complete(continuation).await {
            Ok(check) => {
                if check.is_complete {
                    info!("{} 已完成", continuation.physical_id());
                }
                Ok(check)
            }
            Err(e) if e.is_transient() => {
                warn!("检查 {} 时遇到瞬时错误: {}", continuation.physical_id(), e);
                Ok(CompletionCheck {
                    is_complete: false,
                    data: Properties::new(),
                    checkpoint: continuation.checkpoint.clone(),
                    last_error: Some(e.to_string()),
                })
            }
            Err(e) => {
                error!(
                    "{} 失败（{}）: {}",
                    continuation.physical_id(),
                    e.kind(),
                    e
                );
                Err(e)
            }
        }
    }

    /// 获取事件路由器
    pub fn router(&self) -> &EventRouter {
        &self.router
    }
}
