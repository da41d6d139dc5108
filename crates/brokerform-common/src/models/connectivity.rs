//! 集群连接性模型
//!
//! 该模块定义了集群控制平面的描述结果以及连接性更新的目标配置。
//! 版本令牌是控制平面的乐观并发标记，每次变更调用都必须携带最近一次在 ACTIVE 状态下观察到的令牌。

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::models::lenient::bool_from_any;

/// 集群状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterState {
    Active,
    Creating,
    Updating,
    Deleting,
    Failed,
    Healing,
    Maintenance,
    RebootingBroker,
    #[serde(other)]
    Unknown,
}

impl ClusterState {
    /// 是否处于可接受变更的稳定状态
    pub fn is_active(self) -> bool {
        self == ClusterState::Active
    }

    /// 是否为不可恢复的失败状态
    pub fn is_permanent_failure(self) -> bool {
        self == ClusterState::Failed
    }

    /// 从控制平面返回的状态字符串解析，未知值映射为 Unknown
    pub fn from_api(value: &str) -> Self {
        match value.to_uppercase().as_str() {
            "ACTIVE" => ClusterState::Active,
            "CREATING" => ClusterState::Creating,
            "UPDATING" => ClusterState::Updating,
            "DELETING" => ClusterState::Deleting,
            "FAILED" => ClusterState::Failed,
            "HEALING" => ClusterState::Healing,
            "MAINTENANCE" => ClusterState::Maintenance,
            "REBOOTING_BROKER" => ClusterState::RebootingBroker,
            _ => ClusterState::Unknown,
        }
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClusterState::Active => "ACTIVE",
            ClusterState::Creating => "CREATING",
            ClusterState::Updating => "UPDATING",
            ClusterState::Deleting => "DELETING",
            ClusterState::Failed => "FAILED",
            ClusterState::Healing => "HEALING",
            ClusterState::Maintenance => "MAINTENANCE",
            ClusterState::RebootingBroker => "REBOOTING_BROKER",
            ClusterState::Unknown => "UNKNOWN",
        };
        write!(f, "{}", name)
    }
}

/// 连接性配置
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivitySettings {
    /// 是否开启公网访问
    pub public_access: bool,
    /// VPC 连接是否启用 IAM 认证
    pub iam_auth: bool,
    /// VPC 连接是否启用 TLS 认证
    pub tls_auth: bool,
}

/// 控制平面返回的集群描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDescription {
    /// 集群状态
    pub state: ClusterState,
    /// 版本令牌
    pub version_token: String,
    /// 引导 Broker 地址（仅在集群可达时非空）
    #[serde(default)]
    pub endpoints: Vec<String>,
    /// 当前连接性配置（控制平面未返回时为 None）
    #[serde(default)]
    pub connectivity: Option<ConnectivitySettings>,
}

/// 集群引用
///
/// 格式为 `arn:<partition>:kafka:<region>:<account>:cluster/<name>/<uuid>`。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClusterRef {
    arn: String,
    name: String,
}

impl ClusterRef {
    /// 解析并校验集群引用，格式错误时返回校验错误
    pub fn parse(arn: &str) -> Result<Self> {
        let arn = arn.trim();
        let parts: Vec<&str> = arn.splitn(6, ':').collect();
        if parts.len() != 6 || parts[0] != "arn" || parts[2] != "kafka" {
            return Err(Error::Validation(format!("无效的集群 ARN: {}", arn)));
        }
        if parts[3].is_empty() || parts[4].is_empty() {
            return Err(Error::Validation(format!("集群 ARN 缺少区域或账号: {}", arn)));
        }
        let resource: Vec<&str> = parts[5].split('/').collect();
        if resource.len() != 3 || resource[0] != "cluster" || resource[1].is_empty() || resource[2].is_empty() {
            return Err(Error::Validation(format!("集群 ARN 资源部分无效: {}", arn)));
        }
        Ok(Self {
            arn: arn.to_string(),
            name: resource[1].to_string(),
        })
    }

    /// 完整 ARN
    pub fn arn(&self) -> &str {
        &self.arn
    }

    /// 集群名称
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ClusterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.arn)
    }
}

impl TryFrom<String> for ClusterRef {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ClusterRef> for String {
    fn from(value: ClusterRef) -> String {
        value.arn
    }
}

/// 连接性更新目标
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityTarget {
    /// 目标集群
    #[serde(rename = "clusterArn", alias = "mskClusterArn", alias = "clusterHandle")]
    pub cluster: String,
    /// 期望的公网访问
    #[serde(rename = "publicAccess", default, deserialize_with = "bool_from_any")]
    pub desired_public_access: bool,
    /// 期望的 IAM 认证
    #[serde(rename = "iamAuth", alias = "Iam", default, deserialize_with = "bool_from_any")]
    pub desired_iam_auth: bool,
    /// 期望的 TLS 认证
    #[serde(rename = "tlsAuth", alias = "Tls", default, deserialize_with = "bool_from_any")]
    pub desired_tls_auth: bool,
    /// 声明时已知的版本令牌
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_version_token: Option<String>,
}

impl ConnectivityTarget {
    /// 期望的连接性配置
    pub fn desired(&self) -> ConnectivitySettings {
        ConnectivitySettings {
            public_access: self.desired_public_access,
            iam_auth: self.desired_iam_auth,
            tls_auth: self.desired_tls_auth,
        }
    }

    /// 解析集群引用
    pub fn cluster_ref(&self) -> Result<ClusterRef> {
        ClusterRef::parse(&self.cluster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ARN: &str = "arn:aws:kafka:us-east-1:123456789012:cluster/streaming/6a3c7e5b-1b2c-4d5e-9f00-1234567890ab-2";

    #[test]
    fn test_cluster_ref_parsing() {
        let cluster = ClusterRef::parse(ARN).unwrap();
        assert_eq!(cluster.name(), "streaming");
        assert_eq!(cluster.arn(), ARN);
    }

    #[test]
    fn test_malformed_cluster_ref() {
        assert!(ClusterRef::parse("streaming").is_err());
        assert!(ClusterRef::parse("arn:aws:s3:us-east-1:123:cluster/a/b").is_err());
        assert!(ClusterRef::parse("arn:aws:kafka:us-east-1:123:topic/a/b/c").is_err());
        assert!(ClusterRef::parse("arn:aws:kafka::123:cluster/a/b").is_err());
        assert!(ClusterRef::parse("arn:aws:kafka:us-east-1:123:cluster//b").is_err());
    }

    #[test]
    fn test_target_from_stringified_properties() {
        let target: ConnectivityTarget = serde_json::from_value(json!({
            "mskClusterArn": ARN,
            "Iam": "true",
            "Tls": "false"
        }))
        .unwrap();
        assert_eq!(
            target.desired(),
            ConnectivitySettings { public_access: false, iam_auth: true, tls_auth: false }
        );
        assert!(target.cluster_ref().is_ok());
        assert!(target.baseline_version_token.is_none());
    }

    #[test]
    fn test_cluster_state_from_api() {
        assert_eq!(ClusterState::from_api("ACTIVE"), ClusterState::Active);
        assert_eq!(ClusterState::from_api("REBOOTING_BROKER"), ClusterState::RebootingBroker);
        assert_eq!(ClusterState::from_api("SOMETHING_NEW"), ClusterState::Unknown);
        assert!(ClusterState::Failed.is_permanent_failure());
        assert!(!ClusterState::Updating.is_active());
    }
}
