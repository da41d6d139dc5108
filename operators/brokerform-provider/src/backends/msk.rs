//! 托管 Kafka 控制平面
//!
//! 通过 DescribeCluster、GetBootstrapBrokers 和 UpdateConnectivity 实现 `ClusterControlPlane`。

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_kafka::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_kafka::types::{
    ClusterInfo, ConnectivityInfo, PublicAccess, VpcConnectivity,
    VpcConnectivityClientAuthentication, VpcConnectivityIam, VpcConnectivitySasl,
    VpcConnectivityScram, VpcConnectivityTls,
};
use aws_sdk_kafka::Client;
use tracing::{debug, info};

use brokerform_common::{
    ClusterDescription, ClusterRef, ClusterState, ConnectivitySettings, Error, Result,
};

use crate::control_plane::ClusterControlPlane;

const PUBLIC_ACCESS_DISABLED: &str = "DISABLED";
const PUBLIC_ACCESS_ENABLED: &str = "SERVICE_PROVIDED_EIPS";

/// 托管 Kafka 控制平面客户端
pub struct MskControlPlane {
    client: Client,
}

impl MskControlPlane {
    /// 使用已有的 SDK 客户端
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// 从默认凭证链和区域配置创建
    pub async fn from_env() -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self::new(Client::new(&sdk_config))
    }

    async fn bootstrap_brokers(&self, cluster: &ClusterRef) -> Result<Vec<String>> {
        let output = self
            .client
            .get_bootstrap_brokers()
            .cluster_arn(cluster.arn())
            .send()
            .await
            .map_err(|e| classify("GetBootstrapBrokers", e))?;
        Ok(split_brokers(output.bootstrap_broker_string_tls().unwrap_or_default()))
    }
}

#[async_trait]
impl ClusterControlPlane for MskControlPlane {
    async fn describe_cluster(&self, cluster: &ClusterRef) -> Result<ClusterDescription> {
        let output = self
            .client
            .describe_cluster()
            .cluster_arn(cluster.arn())
            .send()
            .await
            .map_err(|e| classify("DescribeCluster", e))?;

        let info = output
            .cluster_info()
            .ok_or_else(|| Error::Transient(format!("集群 {} 的描述为空", cluster.name())))?;
        let state = info
            .state()
            .map(|s| ClusterState::from_api(s.as_str()))
            .unwrap_or(ClusterState::Unknown);
        let version_token = info.current_version().unwrap_or_default().to_string();

        let endpoints = if state.is_active() {
            self.bootstrap_brokers(cluster).await?
        } else {
            Vec::new()
        };
        debug!("DescribeCluster {}: {} {}", cluster.name(), state, version_token);

        Ok(ClusterDescription {
            state,
            version_token,
            endpoints,
            connectivity: current_connectivity(info),
        })
    }

    async fn update_connectivity(
        &self,
        cluster: &ClusterRef,
        version_token: &str,
        desired: &ConnectivitySettings,
    ) -> Result<String> {
        let output = self
            .client
            .update_connectivity()
            .cluster_arn(cluster.arn())
            .current_version(version_token)
            .connectivity_info(connectivity_info(desired))
            .send()
            .await
            .map_err(|e| classify("UpdateConnectivity", e))?;

        let operation = output.cluster_operation_arn().unwrap_or_default().to_string();
        info!("UpdateConnectivity {} 已受理: {}", cluster.name(), operation);
        Ok(operation)
    }
}

/// 拆分逗号分隔的引导地址
pub fn split_brokers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_string)
        .collect()
}

/// 构造连接性变更请求：SASL/SCRAM 始终关闭
pub fn connectivity_info(desired: &ConnectivitySettings) -> ConnectivityInfo {
    let public_access = if desired.public_access {
        PUBLIC_ACCESS_ENABLED
    } else {
        PUBLIC_ACCESS_DISABLED
    };

    let sasl = VpcConnectivitySasl::builder()
        .scram(VpcConnectivityScram::builder().enabled(false).build())
        .iam(VpcConnectivityIam::builder().enabled(desired.iam_auth).build())
        .build();

    ConnectivityInfo::builder()
        .public_access(PublicAccess::builder().r#type(public_access).build())
        .vpc_connectivity(
            VpcConnectivity::builder()
                .client_authentication(
                    VpcConnectivityClientAuthentication::builder()
                        .sasl(sasl)
                        .tls(VpcConnectivityTls::builder().enabled(desired.tls_auth).build())
                        .build(),
                )
                .build(),
        )
        .build()
}

/// 从集群描述中读出当前连接性配置
fn current_connectivity(info: &ClusterInfo) -> Option<ConnectivitySettings> {
    let connectivity = info.broker_node_group_info()?.connectivity_info()?;
    Some(read_connectivity(connectivity))
}

fn read_connectivity(connectivity: &ConnectivityInfo) -> ConnectivitySettings {
    let public_access = connectivity
        .public_access()
        .and_then(|p| p.r#type())
        .map(|t| t != PUBLIC_ACCESS_DISABLED)
        .unwrap_or(false);
    let auth = connectivity
        .vpc_connectivity()
        .and_then(|v| v.client_authentication());
    let iam_auth = auth
        .and_then(|a| a.sasl())
        .and_then(|s| s.iam())
        .and_then(|i| i.enabled())
        .unwrap_or(false);
    let tls_auth = auth
        .and_then(|a| a.tls())
        .and_then(|t| t.enabled())
        .unwrap_or(false);

    ConnectivitySettings {
        public_access,
        iam_auth,
        tls_auth,
    }
}

/// 按错误码分类控制平面错误
fn classify<E, R>(operation: &str, err: SdkError<E, R>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().map(str::to_string);
    let message = format!("{} 失败: {}", operation, DisplayErrorContext(&err));
    match code.as_deref() {
        Some("ForbiddenException") | Some("UnauthorizedException") | Some("AccessDeniedException") => {
            Error::PermissionDenied(message)
        }
        Some("BadRequestException") | Some("NotFoundException") => Error::Validation(message),
        _ => Error::Transient(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_brokers() {
        assert_eq!(
            split_brokers("b-1.example.com:9094, b-2.example.com:9094,"),
            vec!["b-1.example.com:9094", "b-2.example.com:9094"]
        );
        assert!(split_brokers("").is_empty());
    }

    #[test]
    fn test_connectivity_request_roundtrip() {
        let desired = ConnectivitySettings {
            public_access: false,
            iam_auth: true,
            tls_auth: false,
        };
        let info = connectivity_info(&desired);
        assert_eq!(
            info.public_access().and_then(|p| p.r#type()),
            Some(PUBLIC_ACCESS_DISABLED)
        );
        let scram = info
            .vpc_connectivity()
            .and_then(|v| v.client_authentication())
            .and_then(|a| a.sasl())
            .and_then(|s| s.scram())
            .and_then(|s| s.enabled());
        assert_eq!(scram, Some(false));
        assert_eq!(read_connectivity(&info), desired);
    }
}
