//! 数据仓库命名空间协调
//!
//! 命名空间的创建、更新和删除都是异步的，只能通过轮询状态观察到完成。

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use brokerform_common::{
    CompletionCheck, Continuation, Error, LifecycleEvent, NamespaceDescription, NamespaceSpec,
    NamespaceStatus, Properties, ReconciliationResult, RequestType, Result,
};

use super::{output, ResourceHandler};
use crate::config::NamespaceConfig;

#[cfg(test)]
use mockall::automock;

const SUBMITTED: &str = "submitted";
const STALE_POLLS: &str = "stalePolls";

/// 数据仓库命名空间接口
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NamespaceApi: Send + Sync {
    /// 读取命名空间，不存在时返回 None
    async fn get_namespace(&self, name: &str) -> Result<Option<NamespaceDescription>>;

    /// 提交创建请求
    async fn create_namespace(&self, spec: &NamespaceSpec) -> Result<NamespaceDescription>;

    /// 提交可变字段的更新请求
    async fn update_namespace(&self, spec: &NamespaceSpec) -> Result<NamespaceDescription>;

    /// 提交删除请求
    async fn delete_namespace(&self, name: &str) -> Result<()>;
}

/// 一次推进的结果
enum Progress {
    Done(Properties),
    Pending(Properties),
}

/// 命名空间处理器
pub struct NamespaceHandler {
    /// 命名空间接口
    api: Arc<dyn NamespaceApi>,
    /// 命名空间配置
    config: NamespaceConfig,
}

impl NamespaceHandler {
    /// 创建新的命名空间处理器
    pub fn new(api: Arc<dyn NamespaceApi>, config: NamespaceConfig) -> Self {
        Self { api, config }
    }

    fn spec(event: &LifecycleEvent) -> Result<NamespaceSpec> {
        let spec: NamespaceSpec = event.properties()?;
        spec.validate()?;
        Ok(spec)
    }

    /// 推进创建或更新
    async fn converge(&self, spec: &NamespaceSpec, checkpoint: &Properties) -> Result<Progress> {
        let submitted = checkpoint
            .get(SUBMITTED)
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let current = match self.api.get_namespace(&spec.namespace_name).await? {
            Some(current) => current,
            None if submitted => {
                debug!("命名空间 {} 已提交创建，尚不可见", spec.namespace_name);
                return Ok(Progress::Pending(checkpoint.clone()));
            }
            None => {
                self.api.create_namespace(spec).await?;
                info!("已提交命名空间 {} 的创建请求", spec.namespace_name);
                return Ok(Progress::Pending(submitted_checkpoint()));
            }
        };

        if let Some(conflict) = spec.immutable_conflict(&current) {
            return Err(Error::Conflict(conflict));
        }

        match current.status {
            NamespaceStatus::Available if spec.matches_mutable(&current) => {
                info!("命名空间 {} 已可用", current.namespace_name);
                Ok(Progress::Done(namespace_output(&current)))
            }
            NamespaceStatus::Available => {
                let stale_polls = checkpoint
                    .get(STALE_POLLS)
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                if submitted && stale_polls < u64::from(self.config.resubmit_after_stale_polls) {
                    debug!(
                        "命名空间 {} 的更新尚未生效（第 {} 次读到旧值）",
                        spec.namespace_name,
                        stale_polls + 1
                    );
                    let mut next = checkpoint.clone();
                    next.insert(STALE_POLLS.to_string(), Value::from(stale_polls + 1));
                    return Ok(Progress::Pending(next));
                }
                if submitted {
                    warn!(
                        "命名空间 {} 连续 {} 次读到旧值，重新提交更新",
                        spec.namespace_name, stale_polls
                    );
                }
                self.api.update_namespace(spec).await?;
                info!("已提交命名空间 {} 的更新请求", spec.namespace_name);
                Ok(Progress::Pending(submitted_checkpoint()))
            }
            NamespaceStatus::Deleting => Err(Error::Conflict(format!(
                "命名空间 {} 正在被删除",
                current.namespace_name
            ))),
            status => {
                debug!("命名空间 {} 当前状态为 {}，继续等待", current.namespace_name, status);
                Ok(Progress::Pending(checkpoint.clone()))
            }
        }
    }

    /// 推进删除
    async fn remove(&self, name: &str) -> Result<Progress> {
        match self.api.get_namespace(name).await? {
            None => {
                info!("命名空间 {} 不存在，视为已删除", name);
                Ok(Progress::Done(Properties::new()))
            }
            Some(current) if current.status == NamespaceStatus::Deleting => {
                debug!("命名空间 {} 正在删除", name);
                Ok(Progress::Pending(submitted_checkpoint()))
            }
            Some(_) => {
                self.api.delete_namespace(name).await?;
                info!("已提交命名空间 {} 的删除请求", name);
                Ok(Progress::Pending(submitted_checkpoint()))
            }
        }
    }

    async fn advance(&self, event: &LifecycleEvent, checkpoint: &Properties) -> Result<Progress> {
        let physical_id = self.physical_id(event)?;
        match event.request_type {
            RequestType::Create => self.converge(&Self::spec(event)?, checkpoint).await,
            RequestType::Update => {
                let spec = Self::spec(event)?;
                if spec.namespace_name != physical_id {
                    return Err(Error::Conflict(format!(
                        "命名空间名称不可修改: {} -> {}",
                        physical_id, spec.namespace_name
                    )));
                }
                self.converge(&spec, checkpoint).await
            }
            RequestType::Delete => self.remove(&physical_id).await,
        }
    }
}

fn submitted_checkpoint() -> Properties {
    output([(SUBMITTED, Value::Bool(true))])
}

fn namespace_output(description: &NamespaceDescription) -> Properties {
    output([
        ("namespaceId", Value::String(description.namespace_id.clone())),
        ("namespaceArn", Value::String(description.namespace_arn.clone())),
        ("namespaceName", Value::String(description.namespace_name.clone())),
    ])
}

#[async_trait]
impl ResourceHandler for NamespaceHandler {
    fn physical_id(&self, event: &LifecycleEvent) -> Result<String> {
        match event.physical_resource_id.as_deref() {
            Some(id) if !id.is_empty() && event.request_type != RequestType::Create => {
                Ok(id.to_string())
            }
            _ => Ok(Self::spec(event)?.namespace_name),
        }
    }

    async fn handle_event(&self, event: &LifecycleEvent) -> Result<ReconciliationResult> {
        let physical_id = match self.physical_id(event) {
            Ok(id) => id,
            Err(e) if event.request_type == RequestType::Delete => {
                warn!("命名空间删除事件无效，视为已删除: {}", e);
                return Ok(ReconciliationResult::complete(
                    event.physical_resource_id.clone().unwrap_or_default(),
                    Properties::new(),
                ));
            }
            Err(e) => return Err(e),
        };

        match self.advance(event, &Properties::new()).await? {
            Progress::Done(data) => Ok(ReconciliationResult::complete(physical_id, data)),
            Progress::Pending(checkpoint) => Ok(ReconciliationResult::pending(physical_id, checkpoint)),
        }
    }

    async fn check_complete(&self, continuation: &Continuation) -> Result<CompletionCheck> {
        match self.advance(&continuation.event, &continuation.checkpoint).await? {
            Progress::Done(data) => Ok(CompletionCheck::complete(data)),
            Progress::Pending(checkpoint) => Ok(CompletionCheck::pending(checkpoint)),
        }
    }
}
