//! 事件路由模块
//!
//! 该模块按资源类型鉴别字符串把生命周期事件分派给对应的处理器。
//! 资源类型是封闭集合，未知类型在任何网络调用之前以校验错误拒绝。

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use brokerform_common::{Error, LifecycleEvent, Result};

use crate::reconcile::ResourceHandler;

/// 资源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// ACL 条目
    Acl,
    /// Topic
    Topic,
    /// 集群连接性更新
    ConnectivityUpdate,
    /// 数据仓库命名空间
    Namespace,
}

impl ResourceKind {
    /// 全部资源类型
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Acl,
        ResourceKind::Topic,
        ResourceKind::ConnectivityUpdate,
        ResourceKind::Namespace,
    ];

    /// 声明层使用的自定义资源名称
    pub fn custom_resource_name(self) -> &'static str {
        match self {
            ResourceKind::Acl => "Custom::MskAcl",
            ResourceKind::Topic => "Custom::MskTopic",
            ResourceKind::ConnectivityUpdate => "Custom::MskUpdateConnectivity",
            ResourceKind::Namespace => "Custom::RedshiftServerlessNamespace",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Acl => "Acl",
            ResourceKind::Topic => "Topic",
            ResourceKind::ConnectivityUpdate => "ConnectivityUpdate",
            ResourceKind::Namespace => "Namespace",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim();
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.to_string() == name || kind.custom_resource_name() == name)
            .ok_or_else(|| Error::Validation(format!("invalid resource type: {}", name)))
    }
}

/// 事件路由器
pub struct EventRouter {
    acl: Arc<dyn ResourceHandler>,
    topic: Arc<dyn ResourceHandler>,
    connectivity: Arc<dyn ResourceHandler>,
    namespace: Arc<dyn ResourceHandler>,
}

impl EventRouter {
    /// 创建新的事件路由器，每种资源类型一个处理器
    pub fn new(
        acl: Arc<dyn ResourceHandler>,
        topic: Arc<dyn ResourceHandler>,
        connectivity: Arc<dyn ResourceHandler>,
        namespace: Arc<dyn ResourceHandler>,
    ) -> Self {
        Self {
            acl,
            topic,
            connectivity,
            namespace,
        }
    }

    /// 选择处理器
    pub fn route(&self, event: &LifecycleEvent) -> Result<&dyn ResourceHandler> {
        let kind: ResourceKind = event.resource_type.parse()?;
        debug!("资源类型 {} 路由到 {} 处理器", event.resource_type, kind);
        let handler = match kind {
            ResourceKind::Acl => &self.acl,
            ResourceKind::Topic => &self.topic,
            ResourceKind::ConnectivityUpdate => &self.connectivity,
            ResourceKind::Namespace => &self.namespace,
        };
        Ok(handler.as_ref())
    }

    /// 推导事件的物理资源 ID，不做任何网络调用
    pub fn physical_id(&self, event: &LifecycleEvent) -> Result<String> {
        self.route(event)?.physical_id(event)
    }
}
