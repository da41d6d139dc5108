//! 数据仓库命名空间模型
//!
//! 命名空间的创建完成只能通过轮询状态观察到。

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// 命名空间状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NamespaceStatus {
    Available,
    Modifying,
    Deleting,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for NamespaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceStatus::Available => write!(f, "AVAILABLE"),
            NamespaceStatus::Modifying => write!(f, "MODIFYING"),
            NamespaceStatus::Deleting => write!(f, "DELETING"),
            NamespaceStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl NamespaceStatus {
    /// 从服务返回的状态字符串解析，未知值映射为 Unknown
    pub fn from_api(value: &str) -> Self {
        match value.to_uppercase().as_str() {
            "AVAILABLE" => NamespaceStatus::Available,
            "MODIFYING" => NamespaceStatus::Modifying,
            "DELETING" => NamespaceStatus::Deleting,
            _ => NamespaceStatus::Unknown,
        }
    }
}

/// 命名空间规格
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceSpec {
    /// 命名空间名称
    #[serde(alias = "name")]
    pub namespace_name: String,
    /// 默认数据库名称（不可变）
    #[serde(default = "default_db_name")]
    pub db_name: String,
    /// 管理员用户名（不可变）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_username: Option<String>,
    /// 数据加密密钥
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
    /// 关联的 IAM 角色
    #[serde(default)]
    pub iam_roles: Vec<String>,
    /// 默认 IAM 角色
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_iam_role_arn: Option<String>,
    /// 导出的日志类型
    #[serde(default)]
    pub log_exports: Vec<String>,
}

fn default_db_name() -> String {
    "dev".to_string()
}

impl NamespaceSpec {
    /// 校验命名空间规格：3 到 64 个小写字母、数字或连字符
    pub fn validate(&self) -> Result<()> {
        let name = &self.namespace_name;
        if name.len() < 3 || name.len() > 64 {
            return Err(Error::Validation(format!(
                "命名空间名称长度必须在 3 到 64 之间: {}",
                name
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(Error::Validation(format!(
                "命名空间名称只能包含小写字母、数字和连字符: {}",
                name
            )));
        }
        if self.db_name.is_empty() {
            return Err(Error::Validation("数据库名称不能为空".to_string()));
        }
        if let Some(default_role) = &self.default_iam_role_arn {
            if !self.iam_roles.contains(default_role) {
                return Err(Error::Validation(format!(
                    "默认 IAM 角色 {} 必须包含在 iamRoles 中",
                    default_role
                )));
            }
        }
        Ok(())
    }

    /// 不可变字段与现有命名空间是否冲突
    pub fn immutable_conflict(&self, current: &NamespaceDescription) -> Option<String> {
        if self.db_name != current.db_name {
            return Some(format!(
                "命名空间 {} 的数据库名称为 {}，期望 {}",
                current.namespace_name, current.db_name, self.db_name
            ));
        }
        if self.admin_username.is_some() && self.admin_username != current.admin_username {
            return Some(format!(
                "命名空间 {} 的管理员用户名不可修改",
                current.namespace_name
            ));
        }
        None
    }

    /// 可变字段是否与现有命名空间一致
    pub fn matches_mutable(&self, current: &NamespaceDescription) -> bool {
        let mut desired_roles = self.iam_roles.clone();
        let mut current_roles = current.iam_roles.clone();
        desired_roles.sort();
        current_roles.sort();
        let mut desired_logs = self.log_exports.clone();
        let mut current_logs = current.log_exports.clone();
        desired_logs.sort();
        current_logs.sort();

        self.kms_key_id == current.kms_key_id
            && desired_roles == current_roles
            && self.default_iam_role_arn == current.default_iam_role_arn
            && desired_logs == current_logs
    }
}

/// 命名空间描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceDescription {
    pub namespace_name: String,
    pub namespace_id: String,
    pub namespace_arn: String,
    pub status: NamespaceStatus,
    pub db_name: String,
    #[serde(default)]
    pub admin_username: Option<String>,
    #[serde(default)]
    pub kms_key_id: Option<String>,
    #[serde(default)]
    pub iam_roles: Vec<String>,
    #[serde(default)]
    pub default_iam_role_arn: Option<String>,
    #[serde(default)]
    pub log_exports: Vec<String>,
}
