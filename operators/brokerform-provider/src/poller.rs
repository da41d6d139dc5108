//! 进程内轮询器
//!
//! 外部调度器的参考实现：先调用一次 `handle_event`，然后按固定间隔调用 `check_complete`，
//! 直到完成、遇到终止错误或超过总超时时间。每轮之间续传负载都经过一次 JSON 序列化，
//! 与跨进程调度时的行为保持一致。

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

use brokerform_common::{Continuation, Error, LifecycleEvent, Properties, Result};

use crate::config::PollingConfig;
use crate::controller::Controller;

/// 供应结果
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionOutcome {
    /// 物理资源 ID
    pub physical_resource_id: String,
    /// 输出数据
    pub data: Properties,
    /// 完成检查次数
    pub attempts: u32,
}

/// 轮询器
pub struct Poller {
    controller: Arc<Controller>,
    query_interval: Duration,
    total_timeout: Duration,
}

impl Poller {
    /// 创建新的轮询器
    pub fn new(controller: Arc<Controller>, query_interval: Duration, total_timeout: Duration) -> Self {
        Self {
            controller,
            query_interval,
            total_timeout,
        }
    }

    /// 按配置创建轮询器
    pub fn from_config(controller: Arc<Controller>, config: &PollingConfig) -> Self {
        Self::new(controller, config.query_interval(), config.total_timeout())
    }

    /// 驱动一个事件直到完成
    pub async fn run(&self, event: LifecycleEvent) -> Result<ProvisionOutcome> {
        let started_at = Utc::now();
        let deadline = Instant::now() + self.total_timeout;

        let result = self.controller.handle_event(&event).await?;
        if result.is_complete {
            return Ok(ProvisionOutcome {
                physical_resource_id: result.physical_resource_id,
                data: result.data,
                attempts: 0,
            });
        }

        let mut payload = serde_json::to_value(Continuation::begin(event, &result, started_at))?;
        let mut ticker = interval(self.query_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // 第一次 tick 立即返回
        ticker.tick().await;
        loop {
            let continuation: Continuation = serde_json::from_value(payload)?;
            if Instant::now() + self.query_interval > deadline {
                return Err(Error::Timeout(format!(
                    "{} 在 {} 秒内未完成（已检查 {} 次，最近错误: {}）",
                    continuation.physical_id(),
                    self.total_timeout.as_secs(),
                    continuation.poll.attempt,
                    continuation.poll.last_error.as_deref().unwrap_or("无")
                )));
            }
            ticker.tick().await;

            let check = self.controller.check_complete(&continuation).await?;
            if check.is_complete {
                info!(
                    "{} 经过 {} 次检查后完成",
                    continuation.physical_id(),
                    continuation.poll.attempt + 1
                );
                return Ok(ProvisionOutcome {
                    physical_resource_id: continuation.physical_id().to_string(),
                    data: check.data,
                    attempts: continuation.poll.attempt + 1,
                });
            }

            let continuation = continuation.advance(&check);
            debug!(
                "{} 尚未完成，已检查 {} 次",
                continuation.physical_id(),
                continuation.poll.attempt
            );
            payload = serde_json::to_value(&continuation)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, InMemoryBroker, InMemoryNamespaceApi};
    use brokerform_common::RequestType;
    use serde_json::json;

    fn namespace_event() -> LifecycleEvent {
        LifecycleEvent::new(
            RequestType::Create,
            "Custom::RedshiftServerlessNamespace",
            testing::properties(json!({"namespaceName": "analytics"})),
        )
    }

    #[tokio::test]
    async fn test_runs_until_complete() {
        let broker = InMemoryBroker::default();
        let namespaces = Arc::new(InMemoryNamespaceApi::new(2));
        let controller = Arc::new(testing::controller_with_namespaces(&broker, namespaces));
        let poller = Poller::new(controller, Duration::from_millis(5), Duration::from_secs(5));

        let outcome = poller.run(namespace_event()).await.unwrap();
        assert_eq!(outcome.physical_resource_id, "analytics");
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.data["namespaceName"], json!("analytics"));
    }

    #[tokio::test]
    async fn test_checks_are_spaced_by_query_interval() {
        let broker = InMemoryBroker::default();
        let namespaces = Arc::new(InMemoryNamespaceApi::new(3));
        let controller = Arc::new(testing::controller_with_namespaces(&broker, namespaces));
        let poller = Poller::new(controller, Duration::from_millis(20), Duration::from_secs(5));

        let started = Instant::now();
        let outcome = poller.run(namespace_event()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20) * outcome.attempts);
    }

    #[tokio::test]
    async fn test_total_timeout_is_terminal() {
        let broker = InMemoryBroker::default();
        let namespaces = Arc::new(InMemoryNamespaceApi::new(u32::MAX));
        let controller = Arc::new(testing::controller_with_namespaces(&broker, namespaces));
        let poller = Poller::new(controller, Duration::from_millis(5), Duration::from_millis(40));

        let err = poller.run(namespace_event()).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_synchronous_completion() {
        let broker = InMemoryBroker::default();
        let controller = Arc::new(testing::controller(&broker));
        let poller = Poller::new(controller, Duration::from_millis(5), Duration::from_secs(1));
        let event = LifecycleEvent::new(
            RequestType::Create,
            "Topic",
            testing::properties(json!({
                "clusterArn": testing::CLUSTER_ARN,
                "secretName": "kafka-admin",
                "name": "orders",
                "partitionCount": 3,
                "replicationFactor": 3
            })),
        );
        let outcome = poller.run(event).await.unwrap();
        assert_eq!(outcome.attempts, 0);
        assert_eq!(outcome.physical_resource_id, "orders");
    }
}
