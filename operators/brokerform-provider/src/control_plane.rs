//! 集群控制平面接口
//!
//! 控制平面是稳定的外部契约：描述集群（状态、版本令牌、引导地址）以及提交连接性变更。

use async_trait::async_trait;

use brokerform_common::{ClusterDescription, ClusterRef, ConnectivitySettings, Result};

#[cfg(test)]
use mockall::automock;

/// 集群控制平面
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterControlPlane: Send + Sync {
    /// 描述集群当前状态、版本令牌与引导地址
    async fn describe_cluster(&self, cluster: &ClusterRef) -> Result<ClusterDescription>;

    /// 使用版本令牌提交连接性变更，返回控制平面的操作标识
    async fn update_connectivity(
        &self,
        cluster: &ClusterRef,
        version_token: &str,
        desired: &ConnectivitySettings,
    ) -> Result<String>;
}
