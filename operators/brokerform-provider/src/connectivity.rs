//! 连接性更新模块
//!
//! 连接性变更是一个显式的状态机：CHECKING -> UPDATE_IN_PROGRESS -> STABLE / FAILED。
//! 每次完成检查都从续传状态中恢复，描述集群一次，最多提交一次变更。
//! 变更只在集群处于 ACTIVE 时提交，并且携带本次观察到的版本令牌。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use brokerform_common::{
    CompletionCheck, ConnectivityTarget, Continuation, Error, LifecycleEvent, Properties,
    ReconciliationResult, RequestType, Result,
};

use crate::config::ConnectivityConfig;
use crate::control_plane::ClusterControlPlane;
use crate::reconcile::ResourceHandler;

/// 状态机阶段
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectivityPhase {
    /// 等待集群进入 ACTIVE
    #[default]
    Checking,
    /// 已提交变更，等待版本令牌变化
    UpdateInProgress,
    /// 变更已生效
    Stable,
    /// 集群进入永久失败状态
    Failed,
}

impl fmt::Display for ConnectivityPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectivityPhase::Checking => "CHECKING",
            ConnectivityPhase::UpdateInProgress => "UPDATE_IN_PROGRESS",
            ConnectivityPhase::Stable => "STABLE",
            ConnectivityPhase::Failed => "FAILED",
        };
        write!(f, "{}", name)
    }
}

/// 连接性续传状态，随续传负载往返
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityCheckpoint {
    /// 当前阶段
    pub phase: ConnectivityPhase,
    /// 最近一次观察到的版本令牌
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_version: Option<String>,
    /// 提交变更时使用的版本令牌
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_version: Option<String>,
    /// 是否已提交变更
    #[serde(default)]
    pub update_submitted: bool,
    /// 提交后集群在 ACTIVE 且版本令牌未变化的连续检查次数
    #[serde(default)]
    pub stale_polls: u32,
}

impl ConnectivityCheckpoint {
    /// 初始状态，记录声明时已知的版本令牌
    pub fn initial(target: &ConnectivityTarget) -> Self {
        Self {
            observed_version: target.baseline_version_token.clone(),
            ..Default::default()
        }
    }

    /// 从续传负载恢复，空负载视为初始状态
    pub fn from_properties(properties: &Properties, target: &ConnectivityTarget) -> Result<Self> {
        if properties.is_empty() {
            return Ok(Self::initial(target));
        }
        serde_json::from_value(Value::Object(properties.clone()))
            .map_err(|e| Error::Validation(format!("连接性续传状态无效: {}", e)))
    }

    /// 写入续传负载
    pub fn to_properties(&self) -> Result<Properties> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(Error::Validation("连接性续传状态必须是对象".to_string())),
        }
    }

    /// 是否已完成
    pub fn is_stable(&self) -> bool {
        self.phase == ConnectivityPhase::Stable
    }
}

/// 连接性更新器
pub struct ConnectivityUpdater {
    /// 控制平面
    control_plane: Arc<dyn ClusterControlPlane>,
    /// 配置
    config: ConnectivityConfig,
}

impl ConnectivityUpdater {
    /// 创建新的连接性更新器
    pub fn new(control_plane: Arc<dyn ClusterControlPlane>, config: ConnectivityConfig) -> Self {
        Self {
            control_plane,
            config,
        }
    }

    /// 推进一步：描述集群一次，必要时提交一次变更
    pub async fn step(
        &self,
        target: &ConnectivityTarget,
        mut checkpoint: ConnectivityCheckpoint,
    ) -> Result<ConnectivityCheckpoint> {
        let cluster = target.cluster_ref()?;
        let description = self.control_plane.describe_cluster(&cluster).await?;
        let state = description.state;
        let token = description.version_token.clone();
        debug!(
            "集群 {} 状态 {}，版本令牌 {}，阶段 {}",
            cluster.name(),
            state,
            token,
            checkpoint.phase
        );

        if state.is_permanent_failure() {
            checkpoint.phase = ConnectivityPhase::Failed;
            warn!("集群 {} 进入 {} 状态，连接性更新失败", cluster.name(), state);
            return Err(Error::PermanentClusterFailure(format!(
                "集群 {} 处于 {} 状态，无法更新连接性",
                cluster.name(),
                state
            )));
        }

        let previous_version = checkpoint.observed_version.replace(token.clone());

        if !checkpoint.update_submitted {
            if !state.is_active() {
                // 之前的更新仍在进行，保留令牌，不提交
                checkpoint.phase = ConnectivityPhase::Checking;
                info!("集群 {} 尚未 ACTIVE（{}），等待后再提交", cluster.name(), state);
                return Ok(checkpoint);
            }

            let desired = target.desired();
            if description.connectivity == Some(desired) {
                checkpoint.phase = ConnectivityPhase::Stable;
                info!("集群 {} 已是期望的连接性配置，无需提交", cluster.name());
                return Ok(checkpoint);
            }

            if let Some(previous) = previous_version.filter(|v| *v != token) {
                debug!("版本令牌已从 {} 变为 {}", previous, token);
            }

            let operation = self
                .control_plane
                .update_connectivity(&cluster, &token, &desired)
                .await?;
            info!(
                "已提交集群 {} 的连接性更新（版本令牌 {}，操作 {}）",
                cluster.name(),
                token,
                operation
            );
            checkpoint.phase = ConnectivityPhase::UpdateInProgress;
            checkpoint.submitted_version = Some(token);
            checkpoint.update_submitted = true;
            checkpoint.stale_polls = 0;
            return Ok(checkpoint);
        }

        if !state.is_active() {
            checkpoint.phase = ConnectivityPhase::UpdateInProgress;
            checkpoint.stale_polls = 0;
            debug!("集群 {} 正在应用更新（{}）", cluster.name(), state);
            return Ok(checkpoint);
        }

        if checkpoint.submitted_version.as_deref() != Some(token.as_str()) {
            checkpoint.phase = ConnectivityPhase::Stable;
            info!("集群 {} 的连接性更新已生效，版本令牌 {}", cluster.name(), token);
            return Ok(checkpoint);
        }

        checkpoint.stale_polls += 1;
        if checkpoint.stale_polls >= self.config.resubmit_after_stale_polls {
            // 版本令牌长期未变化，之前的提交可能已丢失
            warn!(
                "集群 {} 在 {} 次检查中保持版本令牌 {}，重新提交更新",
                cluster.name(),
                checkpoint.stale_polls,
                token
            );
            let desired = target.desired();
            self.control_plane
                .update_connectivity(&cluster, &token, &desired)
                .await?;
            checkpoint.stale_polls = 0;
        }
        checkpoint.phase = ConnectivityPhase::UpdateInProgress;
        Ok(checkpoint)
    }
}

/// 连接性更新处理器
pub struct ConnectivityHandler {
    updater: ConnectivityUpdater,
}

impl ConnectivityHandler {
    /// 创建新的连接性处理器
    pub fn new(updater: ConnectivityUpdater) -> Self {
        Self { updater }
    }

    fn target(event: &LifecycleEvent) -> Result<ConnectivityTarget> {
        let target: ConnectivityTarget = event.properties()?;
        target.cluster_ref()?;
        Ok(target)
    }
}

fn connectivity_output(target: &ConnectivityTarget, checkpoint: &ConnectivityCheckpoint) -> Properties {
    let mut data = Properties::new();
    data.insert("clusterArn".into(), Value::String(target.cluster.clone()));
    if let Some(version) = &checkpoint.observed_version {
        data.insert("currentVersion".into(), Value::String(version.clone()));
    }
    data
}

#[async_trait]
impl ResourceHandler for ConnectivityHandler {
    fn physical_id(&self, event: &LifecycleEvent) -> Result<String> {
        match event.physical_resource_id.as_deref() {
            Some(id) if !id.is_empty() && event.request_type != RequestType::Create => {
                Ok(id.to_string())
            }
            _ => Ok(format!("connectivity/{}", Self::target(event)?.cluster_ref()?.name())),
        }
    }

    async fn handle_event(&self, event: &LifecycleEvent) -> Result<ReconciliationResult> {
        if event.request_type == RequestType::Delete {
            // 连接性不做回滚
            let physical_id = event.physical_resource_id.clone().unwrap_or_default();
            info!("连接性资源 {} 删除，不回滚集群配置", physical_id);
            return Ok(ReconciliationResult::complete(physical_id, Properties::new()));
        }

        let physical_id = self.physical_id(event)?;
        let target = Self::target(event)?;
        let checkpoint = self
            .updater
            .step(&target, ConnectivityCheckpoint::initial(&target))
            .await?;

        if checkpoint.is_stable() {
            Ok(ReconciliationResult::complete(
                physical_id,
                connectivity_output(&target, &checkpoint),
            ))
        } else {
            Ok(ReconciliationResult::pending(physical_id, checkpoint.to_properties()?))
        }
    }

    async fn check_complete(&self, continuation: &Continuation) -> Result<CompletionCheck> {
        let event = &continuation.event;
        if event.request_type == RequestType::Delete {
            return Ok(CompletionCheck::complete(Properties::new()));
        }

        let target = Self::target(event)?;
        let checkpoint = ConnectivityCheckpoint::from_properties(&continuation.checkpoint, &target)?;
        let checkpoint = self.updater.step(&target, checkpoint).await?;

        if checkpoint.is_stable() {
            Ok(CompletionCheck::complete(connectivity_output(&target, &checkpoint)))
        } else {
            Ok(CompletionCheck::pending(checkpoint.to_properties()?))
        }
    }
}
