//! ACL 条目模型
//!
//! 该模块定义了 Kafka 访问控制条目（ACL）及其过滤器。ACL 是声明式的：
//! 只会被创建和删除，从不原地修改，替换即“先删除后创建”。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::models::lenient::{normalize_name, CodeOrName};

/// 代表“集群自身 Broker 身份”的占位主体
///
/// Broker 的身份在集群供应完成之前未知，因此在调用时根据引导地址解析。
pub const BOOTSTRAP_PRINCIPAL_PLACEHOLDER: &str = "REPLACE-WITH-BOOTSTRAP";

/// ACL 资源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CodeOrName", into = "String")]
pub enum AclResourceType {
    /// Topic 资源
    Topic,
    /// 消费者组资源
    Group,
    /// 集群资源
    Cluster,
}

impl AclResourceType {
    /// Kafka 协议中的数值代码
    pub fn code(self) -> i8 {
        match self {
            AclResourceType::Topic => 2,
            AclResourceType::Group => 3,
            AclResourceType::Cluster => 4,
        }
    }

    /// 从 Kafka 协议数值代码解析
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            2 => Ok(AclResourceType::Topic),
            3 => Ok(AclResourceType::Group),
            4 => Ok(AclResourceType::Cluster),
            _ => Err(Error::Validation(format!("无效的 ACL 资源类型代码: {}", code))),
        }
    }
}

impl fmt::Display for AclResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AclResourceType::Topic => write!(f, "Topic"),
            AclResourceType::Group => write!(f, "Group"),
            AclResourceType::Cluster => write!(f, "Cluster"),
        }
    }
}

impl FromStr for AclResourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(code) = s.trim().parse::<i64>() {
            return Self::from_code(code);
        }
        match normalize_name(s).as_str() {
            "TOPIC" => Ok(AclResourceType::Topic),
            "GROUP" => Ok(AclResourceType::Group),
            "CLUSTER" => Ok(AclResourceType::Cluster),
            _ => Err(Error::Validation(format!("无效的 ACL 资源类型: {}", s))),
        }
    }
}

/// 资源名称匹配模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CodeOrName", into = "String")]
pub enum PatternType {
    /// 精确匹配资源名称
    Literal,
    /// 按前缀匹配资源名称
    Prefixed,
}

impl PatternType {
    /// Kafka 协议中的数值代码
    pub fn code(self) -> i8 {
        match self {
            PatternType::Literal => 3,
            PatternType::Prefixed => 4,
        }
    }

    /// 从 Kafka 协议数值代码解析
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            3 => Ok(PatternType::Literal),
            4 => Ok(PatternType::Prefixed),
            _ => Err(Error::Validation(format!("无效的资源匹配模式代码: {}", code))),
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternType::Literal => write!(f, "Literal"),
            PatternType::Prefixed => write!(f, "Prefixed"),
        }
    }
}

impl FromStr for PatternType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(code) = s.trim().parse::<i64>() {
            return Self::from_code(code);
        }
        match normalize_name(s).as_str() {
            "LITERAL" => Ok(PatternType::Literal),
            "PREFIXED" => Ok(PatternType::Prefixed),
            _ => Err(Error::Validation(format!("无效的资源匹配模式: {}", s))),
        }
    }
}

/// ACL 操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CodeOrName", into = "String")]
pub enum AclOperation {
    All,
    Read,
    Write,
    Create,
    Delete,
    Alter,
    Describe,
    ClusterAction,
    DescribeConfigs,
    AlterConfigs,
    IdempotentWrite,
}

impl AclOperation {
    /// Kafka 协议中的数值代码
    pub fn code(self) -> i8 {
        match self {
            AclOperation::All => 2,
            AclOperation::Read => 3,
            AclOperation::Write => 4,
            AclOperation::Create => 5,
            AclOperation::Delete => 6,
            AclOperation::Alter => 7,
            AclOperation::Describe => 8,
            AclOperation::ClusterAction => 9,
            AclOperation::DescribeConfigs => 10,
            AclOperation::AlterConfigs => 11,
            AclOperation::IdempotentWrite => 12,
        }
    }

    /// 从 Kafka 协议数值代码解析
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            2 => Ok(AclOperation::All),
            3 => Ok(AclOperation::Read),
            4 => Ok(AclOperation::Write),
            5 => Ok(AclOperation::Create),
            6 => Ok(AclOperation::Delete),
            7 => Ok(AclOperation::Alter),
            8 => Ok(AclOperation::Describe),
            9 => Ok(AclOperation::ClusterAction),
            10 => Ok(AclOperation::DescribeConfigs),
            11 => Ok(AclOperation::AlterConfigs),
            12 => Ok(AclOperation::IdempotentWrite),
            _ => Err(Error::Validation(format!("无效的 ACL 操作代码: {}", code))),
        }
    }
}

impl fmt::Display for AclOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AclOperation::All => "All",
            AclOperation::Read => "Read",
            AclOperation::Write => "Write",
            AclOperation::Create => "Create",
            AclOperation::Delete => "Delete",
            AclOperation::Alter => "Alter",
            AclOperation::Describe => "Describe",
            AclOperation::ClusterAction => "ClusterAction",
            AclOperation::DescribeConfigs => "DescribeConfigs",
            AclOperation::AlterConfigs => "AlterConfigs",
            AclOperation::IdempotentWrite => "IdempotentWrite",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for AclOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(code) = s.trim().parse::<i64>() {
            return Self::from_code(code);
        }
        match normalize_name(s).as_str() {
            "ALL" => Ok(AclOperation::All),
            "READ" => Ok(AclOperation::Read),
            "WRITE" => Ok(AclOperation::Write),
            "CREATE" => Ok(AclOperation::Create),
            "DELETE" => Ok(AclOperation::Delete),
            "ALTER" => Ok(AclOperation::Alter),
            "DESCRIBE" => Ok(AclOperation::Describe),
            "CLUSTERACTION" => Ok(AclOperation::ClusterAction),
            "DESCRIBECONFIGS" => Ok(AclOperation::DescribeConfigs),
            "ALTERCONFIGS" => Ok(AclOperation::AlterConfigs),
            "IDEMPOTENTWRITE" => Ok(AclOperation::IdempotentWrite),
            _ => Err(Error::Validation(format!("无效的 ACL 操作: {}", s))),
        }
    }
}

/// ACL 权限类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CodeOrName", into = "String")]
pub enum AclPermissionType {
    /// 拒绝
    Deny,
    /// 允许
    Allow,
}

impl AclPermissionType {
    /// Kafka 协议中的数值代码
    pub fn code(self) -> i8 {
        match self {
            AclPermissionType::Deny => 2,
            AclPermissionType::Allow => 3,
        }
    }

    /// 从 Kafka 协议数值代码解析
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            2 => Ok(AclPermissionType::Deny),
            3 => Ok(AclPermissionType::Allow),
            _ => Err(Error::Validation(format!("无效的 ACL 权限类型代码: {}", code))),
        }
    }
}

impl fmt::Display for AclPermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AclPermissionType::Deny => write!(f, "Deny"),
            AclPermissionType::Allow => write!(f, "Allow"),
        }
    }
}

impl FromStr for AclPermissionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(code) = s.trim().parse::<i64>() {
            return Self::from_code(code);
        }
        match normalize_name(s).as_str() {
            "DENY" => Ok(AclPermissionType::Deny),
            "ALLOW" => Ok(AclPermissionType::Allow),
            _ => Err(Error::Validation(format!("无效的 ACL 权限类型: {}", s))),
        }
    }
}

// serde 的 try_from/into 转换

macro_rules! impl_code_or_name {
    ($($ty:ty),*) => {
        $(
            impl TryFrom<CodeOrName> for $ty {
                type Error = Error;

                fn try_from(value: CodeOrName) -> Result<Self> {
                    match value {
                        CodeOrName::Code(code) => <$ty>::from_code(code),
                        CodeOrName::Name(name) => name.parse(),
                    }
                }
            }

            impl From<$ty> for String {
                fn from(value: $ty) -> String {
                    value.to_string()
                }
            }
        )*
    };
}

impl_code_or_name!(AclResourceType, PatternType, AclOperation, AclPermissionType);

/// ACL 条目
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AclEntry {
    /// 资源类型
    pub resource_type: AclResourceType,
    /// 资源名称
    pub resource_name: String,
    /// 资源匹配模式
    #[serde(rename = "resourcePatternType", alias = "patternType")]
    pub pattern_type: PatternType,
    /// 主体，如 `User:CN=app`
    pub principal: String,
    /// 主机，`*` 表示任意主机
    #[serde(default = "default_host")]
    pub host: String,
    /// 操作
    pub operation: AclOperation,
    /// 权限类型
    pub permission_type: AclPermissionType,
}

fn default_host() -> String {
    "*".to_string()
}

impl AclEntry {
    /// 校验 ACL 条目，在任何网络调用之前执行
    pub fn validate(&self) -> Result<()> {
        if self.resource_name.trim().is_empty() {
            return Err(Error::Validation("ACL 资源名称不能为空".to_string()));
        }
        if self.principal.trim().is_empty() {
            return Err(Error::Validation("ACL 主体不能为空".to_string()));
        }
        if self.host.trim().is_empty() {
            return Err(Error::Validation("ACL 主机不能为空".to_string()));
        }
        if self.resource_type == AclResourceType::Cluster && self.resource_name != "kafka-cluster" {
            return Err(Error::Validation(format!(
                "集群类型 ACL 的资源名称必须为 kafka-cluster，实际为: {}",
                self.resource_name
            )));
        }
        Ok(())
    }

    /// 由条目内容派生的物理资源 ID
    ///
    /// 相同的声明在重试时总是得到相同的 ID，使其可以作为幂等键。
    pub fn physical_id(&self) -> String {
        format!(
            "acl/{}/{}/{}/{}/{}/{}/{}",
            self.resource_type,
            self.pattern_type,
            self.resource_name,
            self.principal,
            self.host,
            self.operation,
            self.permission_type
        )
    }

    /// 主体是否为引导地址占位符
    pub fn has_bootstrap_principal(&self) -> bool {
        self.principal == BOOTSTRAP_PRINCIPAL_PLACEHOLDER
    }

    /// 返回替换了主体的新条目
    pub fn with_principal(&self, principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for AclEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}:{}) {} {} {} from {}",
            self.resource_type,
            self.pattern_type,
            self.resource_name,
            self.permission_type,
            self.principal,
            self.operation,
            self.host
        )
    }
}

/// ACL 过滤器，`None` 字段匹配任意值
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AclFilter {
    pub resource_type: Option<AclResourceType>,
    pub resource_name: Option<String>,
    pub pattern_type: Option<PatternType>,
    pub principal: Option<String>,
    pub host: Option<String>,
    pub operation: Option<AclOperation>,
    pub permission_type: Option<AclPermissionType>,
}

impl AclFilter {
    /// 精确匹配一个条目的全部字段
    pub fn exact(entry: &AclEntry) -> Self {
        Self {
            resource_type: Some(entry.resource_type),
            resource_name: Some(entry.resource_name.clone()),
            pattern_type: Some(entry.pattern_type),
            principal: Some(entry.principal.clone()),
            host: Some(entry.host.clone()),
            operation: Some(entry.operation),
            permission_type: Some(entry.permission_type),
        }
    }

    /// 删除用过滤器：资源类型、资源名称、匹配模式、主体和操作五个字段必须全部相等
    pub fn for_delete(entry: &AclEntry) -> Self {
        Self {
            resource_type: Some(entry.resource_type),
            resource_name: Some(entry.resource_name.clone()),
            pattern_type: Some(entry.pattern_type),
            principal: Some(entry.principal.clone()),
            host: None,
            operation: Some(entry.operation),
            permission_type: None,
        }
    }

    /// 检查条目是否匹配过滤器
    pub fn matches(&self, entry: &AclEntry) -> bool {
        self.resource_type.map_or(true, |t| t == entry.resource_type)
            && self
                .resource_name
                .as_deref()
                .map_or(true, |n| n == entry.resource_name)
            && self.pattern_type.map_or(true, |p| p == entry.pattern_type)
            && self
                .principal
                .as_deref()
                .map_or(true, |p| p == entry.principal)
            && self.host.as_deref().map_or(true, |h| h == entry.host)
            && self.operation.map_or(true, |o| o == entry.operation)
            && self
                .permission_type
                .map_or(true, |p| p == entry.permission_type)
    }
}
