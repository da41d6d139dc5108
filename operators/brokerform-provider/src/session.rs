//! 管理会话模块
//!
//! 该模块定义了 Broker 管理协议会话的接口，以及会话工厂：
//! 通过控制平面解析实时引导地址，读取并规范化客户端证书，然后打开双向认证的管理会话。
//! 会话只在单次调用内存活，不跨调用缓存连接。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use brokerform_common::{
    AclEntry, AclFilter, ClusterRef, Error, Result, TopicDescription, TopicSpec,
};

use crate::certificate::{materialize_credentials, ClientCredentials};
use crate::config::SessionConfig;
use crate::control_plane::ClusterControlPlane;
use crate::secrets::SecretStore;

#[cfg(test)]
use mockall::automock;

/// 管理协议错误类别，对应 Broker 返回的错误码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminErrorKind {
    LeaderNotAvailable,
    NotController,
    BrokerNotAvailable,
    NetworkException,
    RequestTimedOut,
    TopicAlreadyExists,
    UnknownTopicOrPartition,
    ClusterAuthorizationFailed,
    TopicAuthorizationFailed,
    InvalidReplicationFactor,
    InvalidPartitions,
    InvalidConfig,
    InvalidRequest,
    SecurityDisabled,
    Unknown,
}

/// 管理协议错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct AdminError {
    pub kind: AdminErrorKind,
    pub message: String,
}

impl AdminError {
    /// 创建新的管理协议错误
    pub fn new(kind: AdminErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<AdminError> for Error {
    fn from(err: AdminError) -> Self {
        use AdminErrorKind::*;
        match err.kind {
            LeaderNotAvailable | NotController | BrokerNotAvailable | NetworkException
            | RequestTimedOut | UnknownTopicOrPartition | Unknown => {
                Error::Transient(err.to_string())
            }
            TopicAlreadyExists => Error::Conflict(err.to_string()),
            ClusterAuthorizationFailed | TopicAuthorizationFailed => {
                Error::PermissionDenied(err.to_string())
            }
            InvalidReplicationFactor | InvalidPartitions | InvalidConfig | InvalidRequest
            | SecurityDisabled => Error::Validation(err.to_string()),
        }
    }
}

/// 管理协议会话：标准的 Broker 管理操作
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AdminSession: Send + Sync {
    /// 添加 ACL；协议层面对相同条目是幂等的
    async fn create_acl(&self, entry: &AclEntry) -> std::result::Result<(), AdminError>;

    /// 删除所有匹配过滤器的 ACL，返回被删除的条目
    async fn delete_acls(&self, filter: &AclFilter) -> std::result::Result<Vec<AclEntry>, AdminError>;

    /// 列出所有匹配过滤器的 ACL
    async fn list_acls(&self, filter: &AclFilter) -> std::result::Result<Vec<AclEntry>, AdminError>;

    /// 创建 Topic
    async fn create_topic(&self, spec: &TopicSpec) -> std::result::Result<(), AdminError>;

    /// 将 Topic 的分区总数扩展到 `total_count`
    async fn create_partitions(&self, topic: &str, total_count: u32) -> std::result::Result<(), AdminError>;

    /// 删除 Topic
    async fn delete_topic(&self, topic: &str) -> std::result::Result<(), AdminError>;

    /// 描述 Topic 的分区元数据，Topic 不存在时返回 None
    async fn describe_partitions(&self, topic: &str) -> std::result::Result<Option<TopicDescription>, AdminError>;
}

/// 为每个管理请求加上截止时间的会话
///
/// 超时按 `RequestTimedOut` 报告，归类为瞬时错误。
struct DeadlineSession {
    inner: Box<dyn AdminSession>,
    request_timeout: Duration,
}

impl DeadlineSession {
    async fn guard<T>(
        &self,
        operation: &str,
        request: impl Future<Output = std::result::Result<T, AdminError>>,
    ) -> std::result::Result<T, AdminError> {
        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => {
                warn!("{} 在 {} 毫秒内没有响应", operation, self.request_timeout.as_millis());
                Err(AdminError::new(
                    AdminErrorKind::RequestTimedOut,
                    format!("{} 在 {} 毫秒内没有响应", operation, self.request_timeout.as_millis()),
                ))
            }
        }
    }
}

#[async_trait]
impl AdminSession for DeadlineSession {
    async fn create_acl(&self, entry: &AclEntry) -> std::result::Result<(), AdminError> {
        self.guard("CreateAcls", self.inner.create_acl(entry)).await
    }

    async fn delete_acls(&self, filter: &AclFilter) -> std::result::Result<Vec<AclEntry>, AdminError> {
        self.guard("DeleteAcls", self.inner.delete_acls(filter)).await
    }

    async fn list_acls(&self, filter: &AclFilter) -> std::result::Result<Vec<AclEntry>, AdminError> {
        self.guard("DescribeAcls", self.inner.list_acls(filter)).await
    }

    async fn create_topic(&self, spec: &TopicSpec) -> std::result::Result<(), AdminError> {
        self.guard("CreateTopics", self.inner.create_topic(spec)).await
    }

    async fn create_partitions(&self, topic: &str, total_count: u32) -> std::result::Result<(), AdminError> {
        self.guard("CreatePartitions", self.inner.create_partitions(topic, total_count))
            .await
    }

    async fn delete_topic(&self, topic: &str) -> std::result::Result<(), AdminError> {
        self.guard("DeleteTopics", self.inner.delete_topic(topic)).await
    }

    async fn describe_partitions(&self, topic: &str) -> std::result::Result<Option<TopicDescription>, AdminError> {
        self.guard("Metadata", self.inner.describe_partitions(topic)).await
    }
}

/// 打开会话所需的选项
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// 客户端 ID，如 `client-CR-<集群名>`
    pub client_id: String,
    /// 引导 Broker 地址
    pub brokers: Vec<String>,
    /// 双向 TLS 凭证
    pub credentials: ClientCredentials,
    /// 单个管理请求的超时时间
    pub request_timeout: Duration,
    /// 是否输出协议级调试日志
    pub debug: bool,
}

/// 管理协议连接器，负责建立传输层连接
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AdminConnector: Send + Sync {
    /// 建立认证后的管理会话
    async fn connect(&self, options: &SessionOptions) -> std::result::Result<Box<dyn AdminSession>, AdminError>;
}

/// 会话相关的资源属性
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProperties {
    /// 目标集群 ARN
    #[serde(rename = "clusterArn", alias = "mskClusterArn")]
    pub cluster_arn: String,
    /// 存放客户端证书的密钥名称
    #[serde(alias = "secretArn")]
    pub secret_name: String,
    /// 客户端日志级别：DEBUG 或 INFO
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl SessionProperties {
    /// 在任何网络调用之前校验属性
    pub fn validate(&self) -> Result<ClusterRef> {
        let cluster = ClusterRef::parse(&self.cluster_arn)?;
        if self.secret_name.trim().is_empty() {
            return Err(Error::Validation("secretName 不能为空".to_string()));
        }
        Ok(cluster)
    }

    fn debug_enabled(&self) -> bool {
        self.log_level
            .as_deref()
            .map(|level| level.eq_ignore_ascii_case("DEBUG"))
            .unwrap_or(false)
    }
}

/// 已打开的管理会话及其引导地址
pub struct AdminSessionHandle {
    /// 管理会话
    pub session: Box<dyn AdminSession>,
    /// 本次解析到的引导 Broker 地址
    pub brokers: Vec<String>,
    /// 目标集群
    pub cluster: ClusterRef,
}

impl AdminSessionHandle {
    /// 根据实时引导地址解析 Broker 自身身份
    pub fn bootstrap_principal(&self) -> Result<String> {
        resolve_bootstrap_principal(&self.brokers)
    }
}

/// 会话工厂
pub struct SessionFactory {
    /// 控制平面
    control_plane: Arc<dyn ClusterControlPlane>,
    /// 密钥存储
    secrets: Arc<dyn SecretStore>,
    /// 管理协议连接器
    connector: Arc<dyn AdminConnector>,
    /// 会话配置
    config: SessionConfig,
    /// 客户端 ID 前缀
    client_id_prefix: String,
}

impl SessionFactory {
    /// 创建新的会话工厂
    pub fn new(
        control_plane: Arc<dyn ClusterControlPlane>,
        secrets: Arc<dyn SecretStore>,
        connector: Arc<dyn AdminConnector>,
        config: SessionConfig,
        client_id_prefix: &str,
    ) -> Self {
        Self {
            control_plane,
            secrets,
            connector,
            config,
            client_id_prefix: client_id_prefix.to_string(),
        }
    }

    /// 打开到目标集群的管理会话
    ///
    /// 集群引用格式错误时立即返回终止错误；集群存在但尚不可达时返回瞬时错误。
    pub async fn open(&self, properties: &SessionProperties) -> Result<AdminSessionHandle> {
        let cluster = properties.validate()?;

        let description = self.control_plane.describe_cluster(&cluster).await?;
        if description.state.is_permanent_failure() {
            return Err(Error::PermanentClusterFailure(format!(
                "集群 {} 处于 {} 状态",
                cluster.name(),
                description.state
            )));
        }
        if !description.state.is_active() || description.endpoints.is_empty() {
            return Err(Error::Transient(format!(
                "集群 {} 尚不可达（状态: {}）",
                cluster.name(),
                description.state
            )));
        }
        debug!("集群 {} 的引导地址: {:?}", cluster.name(), description.endpoints);

        let material = self.secrets.get_secret(&properties.secret_name).await?;
        let credentials = materialize_credentials(&material.cert, &material.key)?;

        let options = SessionOptions {
            client_id: format!("{}-{}", self.client_id_prefix, cluster.name()),
            brokers: description.endpoints.clone(),
            credentials,
            request_timeout: Duration::from_millis(self.config.request_timeout_ms),
            debug: properties.debug_enabled(),
        };

        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let session = tokio::time::timeout(connect_timeout, self.connector.connect(&options))
            .await
            .map_err(|_| {
                Error::Transient(format!(
                    "连接集群 {} 超时（{} 毫秒）",
                    cluster.name(),
                    self.config.connect_timeout_ms
                ))
            })??;

        info!("已打开集群 {} 的管理会话，客户端 ID: {}", cluster.name(), options.client_id);

        Ok(AdminSessionHandle {
            session: Box::new(DeadlineSession {
                inner: session,
                request_timeout: options.request_timeout,
            }),
            brokers: description.endpoints,
            cluster,
        })
    }
}

/// 从 Broker 地址推导域名后缀：去掉端口和第一段主机名
pub fn broker_domain_suffix(broker: &str) -> Result<String> {
    let broker = broker.trim();
    let host = match broker.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => broker,
    };
    match host.split_once('.') {
        Some((first, suffix)) if !first.is_empty() && !suffix.is_empty() => {
            Ok(suffix.to_string())
        }
        _ => Err(Error::Validation(format!("无法从 Broker 地址推导域名: {}", broker))),
    }
}

/// 将引导地址占位符解析为 Broker 身份的通配主体
///
/// 检查所有 Broker 的域名后缀，而不是只信任第一个地址；后缀不一致时返回校验错误。
pub fn resolve_bootstrap_principal(brokers: &[String]) -> Result<String> {
    let suffixes = brokers
        .iter()
        .map(|broker| broker_domain_suffix(broker))
        .collect::<Result<BTreeSet<String>>>()?;

    let mut iter = suffixes.iter();
    match (iter.next(), iter.next()) {
        (None, _) => Err(Error::Transient("没有可用的引导 Broker 地址".to_string())),
        (Some(suffix), None) => Ok(format!("User:CN=*.{}", suffix)),
        (Some(_), Some(_)) => {
            warn!("引导 Broker 跨越多个域名: {:?}", suffixes);
            Err(Error::Validation(format!(
                "引导 Broker 跨越多个域名，无法推导唯一的 Broker 身份: {:?}",
                suffixes
            )))
        }
    }
}
