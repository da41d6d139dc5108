//! 生命周期事件模型
//!
//! 外部编排层为每次资源生命周期变化发出一个事件，引擎为每个事件返回一个协调结果。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// 资源属性：不透明的键值映射
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// 请求类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    /// 创建
    Create,
    /// 更新
    Update,
    /// 删除
    Delete,
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestType::Create => write!(f, "Create"),
            RequestType::Update => write!(f, "Update"),
            RequestType::Delete => write!(f, "Delete"),
        }
    }
}

/// 生命周期事件
///
/// 在一次调用内不可变。Create 事件没有物理资源 ID，Update/Delete 事件携带
/// Create 时分配的物理资源 ID。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LifecycleEvent {
    /// 请求类型
    pub request_type: RequestType,
    /// 资源类型鉴别字符串
    pub resource_type: String,
    /// 资源属性
    #[serde(default)]
    pub resource_properties: Properties,
    /// 更新前的资源属性（仅 Update）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_resource_properties: Option<Properties>,
    /// 物理资源 ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
}

impl LifecycleEvent {
    /// 创建新的事件
    pub fn new(request_type: RequestType, resource_type: &str, properties: Properties) -> Self {
        Self {
            request_type,
            resource_type: resource_type.to_string(),
            resource_properties: properties,
            old_resource_properties: None,
            physical_resource_id: None,
        }
    }

    /// 设置物理资源 ID
    pub fn with_physical_id(mut self, physical_id: impl Into<String>) -> Self {
        self.physical_resource_id = Some(physical_id.into());
        self
    }

    /// 设置更新前的资源属性
    pub fn with_old_properties(mut self, properties: Properties) -> Self {
        self.old_resource_properties = Some(properties);
        self
    }

    /// 将资源属性解析为强类型结构，失败时返回校验错误
    pub fn properties<T: DeserializeOwned>(&self) -> Result<T> {
        parse_properties(&self.resource_properties)
    }

    /// 解析更新前的资源属性
    pub fn old_properties<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.old_resource_properties
            .as_ref()
            .map(parse_properties)
            .transpose()
    }

    /// Update/Delete 事件必须携带物理资源 ID
    pub fn require_physical_id(&self) -> Result<&str> {
        match self.physical_resource_id.as_deref() {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(Error::Validation(format!(
                "{} 事件缺少 PhysicalResourceId",
                self.request_type
            ))),
        }
    }
}

fn parse_properties<T: DeserializeOwned>(properties: &Properties) -> Result<T> {
    serde_json::from_value(serde_json::Value::Object(properties.clone()))
        .map_err(|e| Error::Validation(format!("资源属性无效: {}", e)))
}

/// 协调结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReconciliationResult {
    /// 物理资源 ID，同一逻辑操作的重试之间保持不变
    pub physical_resource_id: String,
    /// 透传给调用方的输出
    #[serde(default)]
    pub data: Properties,
    /// 操作是否已同步完成
    pub is_complete: bool,
    /// 下一次完成检查所需的续传状态
    #[serde(default, skip_serializing_if = "Properties::is_empty")]
    pub checkpoint: Properties,
}

impl ReconciliationResult {
    /// 已完成的结果
    pub fn complete(physical_resource_id: impl Into<String>, data: Properties) -> Self {
        Self {
            physical_resource_id: physical_resource_id.into(),
            data,
            is_complete: true,
            checkpoint: Properties::new(),
        }
    }

    /// 尚未完成的结果
    pub fn pending(physical_resource_id: impl Into<String>, checkpoint: Properties) -> Self {
        Self {
            physical_resource_id: physical_resource_id.into(),
            data: Properties::new(),
            is_complete: false,
            checkpoint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_format() {
        let event: LifecycleEvent = serde_json::from_value(json!({
            "RequestType": "Update",
            "ResourceType": "Custom::MskAcl",
            "ResourceProperties": {"resourceName": "orders"},
            "OldResourceProperties": {"resourceName": "legacy"},
            "PhysicalResourceId": "acl/Topic/Literal/orders",
            "ServiceToken": "ignored"
        }))
        .unwrap();

        assert_eq!(event.request_type, RequestType::Update);
        assert_eq!(event.resource_type, "Custom::MskAcl");
        assert_eq!(event.require_physical_id().unwrap(), "acl/Topic/Literal/orders");
        assert_eq!(
            event.old_resource_properties.as_ref().unwrap()["resourceName"],
            "legacy"
        );
    }

    #[test]
    fn test_create_has_no_physical_id() {
        let event = LifecycleEvent::new(RequestType::Create, "Topic", Properties::new());
        assert!(matches!(event.require_physical_id(), Err(Error::Validation(_))));
        let wire = serde_json::to_value(&event).unwrap();
        assert!(wire.get("PhysicalResourceId").is_none());
    }

    #[test]
    fn test_invalid_properties_are_validation_errors() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Needs {
            name: String,
        }
        let event = LifecycleEvent::new(RequestType::Create, "Topic", Properties::new());
        assert!(matches!(event.properties::<Needs>(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_result_wire_format() {
        let mut data = Properties::new();
        data.insert("namespaceId".into(), json!("ns-1"));
        let result = ReconciliationResult::complete("analytics", data);
        let wire = serde_json::to_value(&result).unwrap();
        assert_eq!(wire["PhysicalResourceId"], "analytics");
        assert_eq!(wire["IsComplete"], true);
        assert_eq!(wire["Data"]["namespaceId"], "ns-1");
        assert!(wire.get("Checkpoint").is_none());
    }
}
