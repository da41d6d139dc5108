//! Topic 协调
//!
//! 物理资源 ID 就是 Topic 名称。创建之前先描述 Topic：已存在且分区数与副本因子一致时直接确认，
//! 不一致时以冲突拒绝。开启 `waitForLeaders` 时在自己的超时时间内等待所有分区选出 Leader。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use brokerform_common::{
    CompletionCheck, Continuation, Error, LifecycleEvent, Properties, ReconciliationResult,
    RequestType, Result, TopicDescription, TopicSpec,
};

use super::{as_completion, output, ResourceHandler};
use crate::config::TopicConfig;
use crate::session::{AdminErrorKind, AdminSessionHandle, SessionFactory, SessionProperties};

/// Topic 资源属性
#[derive(Debug, Clone, Deserialize)]
pub struct TopicProperties {
    /// 会话属性
    #[serde(flatten)]
    pub session: SessionProperties,
    /// 声明的 Topic 规格
    #[serde(flatten)]
    pub spec: TopicSpec,
}

/// Topic 处理器
pub struct TopicHandler {
    /// 会话工厂
    sessions: Arc<SessionFactory>,
    /// Topic 配置
    config: TopicConfig,
}

impl TopicHandler {
    /// 创建新的 Topic 处理器
    pub fn new(sessions: Arc<SessionFactory>, config: TopicConfig) -> Self {
        Self { sessions, config }
    }

    /// 解析并校验属性；属性中未给出等待超时时使用配置值
    fn properties(&self, properties: &Properties) -> Result<TopicProperties> {
        let mut parsed: TopicProperties =
            serde_json::from_value(Value::Object(properties.clone()))
                .map_err(|e| Error::Validation(format!("资源属性无效: {}", e)))?;
        if !properties.contains_key("leaderWaitTimeoutMs") && !properties.contains_key("timeout") {
            parsed.spec.leader_wait_timeout_ms = self.config.leader_wait_timeout_ms;
        }
        parsed.spec.validate()?;
        parsed.session.validate()?;
        Ok(parsed)
    }

    /// 等待所有分区选出 Leader，超时返回终止错误
    async fn wait_for_leaders(&self, handle: &AdminSessionHandle, spec: &TopicSpec) -> Result<()> {
        let interval = Duration::from_millis(self.config.leader_poll_interval_ms);
        let timeout = Duration::from_millis(spec.leader_wait_timeout_ms);

        let wait = async {
            loop {
                match handle.session.describe_partitions(&spec.name).await {
                    Ok(Some(description)) if !description.partitions.is_empty() => {
                        let leaderless = description.leaderless_partitions();
                        if leaderless.is_empty() {
                            return Ok(());
                        }
                        debug!("Topic {} 的分区 {:?} 尚无 Leader", spec.name, leaderless);
                    }
                    Ok(_) => debug!("Topic {} 的元数据尚未传播", spec.name),
                    Err(e) => {
                        let err = Error::from(e);
                        if err.is_terminal() {
                            return Err(err);
                        }
                        debug!("查询 Topic {} 分区元数据失败，稍后重试: {}", spec.name, err);
                    }
                }
                tokio::time::sleep(interval).await;
            }
        };

        tokio::time::timeout(timeout, wait).await.map_err(|_| {
            Error::Timeout(format!(
                "Topic {} 在 {} 毫秒内未能为所有分区选出 Leader",
                spec.name, spec.leader_wait_timeout_ms
            ))
        })??;

        info!("Topic {} 的所有分区均已选出 Leader", spec.name);
        Ok(())
    }

    async fn describe(handle: &AdminSessionHandle, name: &str) -> Result<Option<TopicDescription>> {
        Ok(handle.session.describe_partitions(name).await?)
    }

    /// 分区列表为空说明元数据尚未传播，稍后重试
    fn ensure_propagated(current: &TopicDescription) -> Result<()> {
        if current.partitions.is_empty() {
            return Err(Error::Transient(format!(
                "Topic {} 的分区元数据尚未传播",
                current.name
            )));
        }
        Ok(())
    }

    /// 确认已存在的 Topic 与声明一致
    fn confirm(spec: &TopicSpec, current: &TopicDescription) -> Result<()> {
        Self::ensure_propagated(current)?;
        if current.partition_count() != spec.partition_count
            || current.replication_factor() != spec.replication_factor
        {
            return Err(Error::Conflict(format!(
                "Topic {} 已存在，但分区数/副本因子为 {}/{}，声明为 {}/{}",
                spec.name,
                current.partition_count(),
                current.replication_factor(),
                spec.partition_count,
                spec.replication_factor
            )));
        }
        Ok(())
    }

    async fn create(&self, event: &LifecycleEvent) -> Result<ReconciliationResult> {
        let properties = self.properties(&event.resource_properties)?;
        let spec = &properties.spec;
        let handle = self.sessions.open(&properties.session).await?;

        match Self::describe(&handle, &spec.name).await? {
            Some(current) => {
                Self::confirm(spec, &current)?;
                info!("Topic {} 已存在且与声明一致", spec.name);
            }
            None => match handle.session.create_topic(spec).await {
                Ok(()) => info!(
                    "已创建 Topic {}（分区数 {}，副本因子 {}）",
                    spec.name, spec.partition_count, spec.replication_factor
                ),
                Err(e) if e.kind == AdminErrorKind::TopicAlreadyExists => {
                    // 与并发的重试竞争，重新读取后确认
                    warn!("Topic {} 在创建时已存在，重新确认", spec.name);
                    let current = Self::describe(&handle, &spec.name)
                        .await?
                        .ok_or_else(|| Error::Transient(format!("Topic {} 的元数据尚未传播", spec.name)))?;
                    Self::confirm(spec, &current)?;
                }
                Err(e) => return Err(e.into()),
            },
        }

        if spec.wait_for_leaders {
            self.wait_for_leaders(&handle, spec).await?;
        }

        Ok(ReconciliationResult::complete(spec.name.clone(), topic_output(spec)))
    }

    async fn update(&self, event: &LifecycleEvent, physical_id: String) -> Result<ReconciliationResult> {
        let properties = self.properties(&event.resource_properties)?;
        let spec = &properties.spec;

        if spec.name != physical_id {
            return Err(Error::Conflict(format!(
                "Topic 名称不可修改: {} -> {}",
                physical_id, spec.name
            )));
        }
        if let Some(old) = event.old_properties::<TopicProperties>()? {
            if spec.partition_count < old.spec.partition_count {
                return Err(Error::Validation(format!(
                    "Topic {} 的分区数不能减少: {} -> {}",
                    spec.name, old.spec.partition_count, spec.partition_count
                )));
            }
        }

        let handle = self.sessions.open(&properties.session).await?;
        let current = match Self::describe(&handle, &spec.name).await? {
            Some(current) => current,
            None => {
                warn!("待更新的 Topic {} 不存在，按创建处理", spec.name);
                return self.create(event).await;
            }
        };
        Self::ensure_propagated(&current)?;

        if current.replication_factor() != spec.replication_factor {
            return Err(Error::Conflict(format!(
                "Topic {} 的副本因子不可修改: {} -> {}",
                spec.name,
                current.replication_factor(),
                spec.replication_factor
            )));
        }

        let current_count = current.partition_count();
        if spec.partition_count < current_count {
            return Err(Error::Validation(format!(
                "Topic {} 的分区数不能减少: {} -> {}",
                spec.name, current_count, spec.partition_count
            )));
        }
        if spec.partition_count > current_count {
            handle
                .session
                .create_partitions(&spec.name, spec.partition_count)
                .await?;
            info!(
                "已将 Topic {} 的分区数从 {} 扩展到 {}",
                spec.name, current_count, spec.partition_count
            );
        } else {
            debug!("Topic {} 无需变更", spec.name);
        }

        if spec.wait_for_leaders {
            self.wait_for_leaders(&handle, spec).await?;
        }

        Ok(ReconciliationResult::complete(physical_id, topic_output(spec)))
    }

    async fn delete(&self, event: &LifecycleEvent, physical_id: String) -> Result<ReconciliationResult> {
        let properties = match self.properties(&event.resource_properties) {
            Ok(properties) => properties,
            Err(e) => {
                warn!("Topic {} 的属性无效，跳过删除: {}", physical_id, e);
                return Ok(ReconciliationResult::complete(physical_id, Properties::new()));
            }
        };

        let handle = self.sessions.open(&properties.session).await?;
        if Self::describe(&handle, &physical_id).await?.is_none() {
            info!("Topic {} 不存在，视为已删除", physical_id);
            return Ok(ReconciliationResult::complete(physical_id, Properties::new()));
        }

        match handle.session.delete_topic(&physical_id).await {
            Ok(()) => info!("已删除 Topic {}", physical_id),
            Err(e) if e.kind == AdminErrorKind::UnknownTopicOrPartition => {
                info!("Topic {} 已被删除", physical_id)
            }
            Err(e) => return Err(e.into()),
        }

        Ok(ReconciliationResult::complete(physical_id, Properties::new()))
    }
}

fn topic_output(spec: &TopicSpec) -> Properties {
    output([
        ("topicName", Value::String(spec.name.clone())),
        ("partitionCount", Value::from(spec.partition_count)),
        ("replicationFactor", Value::from(spec.replication_factor)),
    ])
}

#[async_trait]
impl ResourceHandler for TopicHandler {
    fn physical_id(&self, event: &LifecycleEvent) -> Result<String> {
        match event.physical_resource_id.as_deref() {
            Some(id) if !id.is_empty() && event.request_type != RequestType::Create => {
                Ok(id.to_string())
            }
            _ => Ok(self.properties(&event.resource_properties)?.spec.name),
        }
    }

    async fn handle_event(&self, event: &LifecycleEvent) -> Result<ReconciliationResult> {
        let physical_id = self.physical_id(event)?;
        debug!("处理 Topic {} 事件: {}", event.request_type, physical_id);

        match event.request_type {
            RequestType::Create => self.create(event).await,
            RequestType::Update => self.update(event, physical_id).await,
            RequestType::Delete => self.delete(event, physical_id).await,
        }
    }

    async fn check_complete(&self, continuation: &Continuation) -> Result<CompletionCheck> {
        self.handle_event(&continuation.event).await.map(as_completion)
    }
}
