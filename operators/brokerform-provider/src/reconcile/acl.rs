//! ACL 协调
//!
//! ACL 条目创建后不可变，更新等于删除旧条目再创建新条目。

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use brokerform_common::{
    AclEntry, AclFilter, CompletionCheck, Continuation, LifecycleEvent, ReconciliationResult,
    RequestType, Result,
};

use super::{as_completion, output, ResourceHandler};
use crate::session::{AdminSessionHandle, SessionFactory, SessionProperties};

/// ACL 资源属性
#[derive(Debug, Clone, Deserialize)]
pub struct AclProperties {
    /// 会话属性
    #[serde(flatten)]
    pub session: SessionProperties,
    /// 声明的 ACL 条目
    #[serde(flatten)]
    pub entry: AclEntry,
}

impl AclProperties {
    /// 在任何网络调用之前校验
    pub fn validate(&self) -> Result<()> {
        self.entry.validate()?;
        self.session.validate()?;
        Ok(())
    }
}

/// ACL 处理器
pub struct AclHandler {
    /// 会话工厂
    sessions: Arc<SessionFactory>,
}

impl AclHandler {
    /// 创建新的 ACL 处理器
    pub fn new(sessions: Arc<SessionFactory>) -> Self {
        Self { sessions }
    }

    /// 解析占位符主体
    fn resolve(handle: &AdminSessionHandle, entry: &AclEntry) -> Result<AclEntry> {
        if entry.has_bootstrap_principal() {
            let principal = handle.bootstrap_principal()?;
            debug!("引导地址占位符解析为 {}", principal);
            Ok(entry.with_principal(principal))
        } else {
            Ok(entry.clone())
        }
    }

    /// 确保条目存在，已存在时不重复创建
    async fn ensure(handle: &AdminSessionHandle, entry: &AclEntry) -> Result<()> {
        let existing = handle.session.list_acls(&AclFilter::exact(entry)).await?;
        if existing.iter().any(|acl| acl == entry) {
            info!("ACL 已存在，无需创建: {}", entry);
            return Ok(());
        }
        handle.session.create_acl(entry).await?;
        info!("已创建 ACL: {}", entry);
        Ok(())
    }

    /// 删除五字段匹配的条目，没有匹配时同样视为成功
    async fn remove(handle: &AdminSessionHandle, entry: &AclEntry) -> Result<usize> {
        let deleted = handle.session.delete_acls(&AclFilter::for_delete(entry)).await?;
        if deleted.is_empty() {
            info!("没有匹配的 ACL，视为已删除: {}", entry);
        } else {
            info!("已删除 {} 条 ACL: {}", deleted.len(), entry);
        }
        Ok(deleted.len())
    }

    async fn create(&self, event: &LifecycleEvent, physical_id: String) -> Result<ReconciliationResult> {
        let properties: AclProperties = event.properties()?;
        properties.validate()?;

        let handle = self.sessions.open(&properties.session).await?;
        let entry = Self::resolve(&handle, &properties.entry)?;
        Self::ensure(&handle, &entry).await?;

        Ok(ReconciliationResult::complete(physical_id, entry_output(&entry)))
    }

    async fn update(&self, event: &LifecycleEvent, physical_id: String) -> Result<ReconciliationResult> {
        let properties: AclProperties = event.properties()?;
        properties.validate()?;
        let old: Option<AclProperties> = event.old_properties()?;

        let handle = self.sessions.open(&properties.session).await?;
        let entry = Self::resolve(&handle, &properties.entry)?;

        if let Some(old) = old {
            if old.session.cluster_arn == properties.session.cluster_arn {
                let old_entry = Self::resolve(&handle, &old.entry)?;
                if old_entry != entry {
                    Self::remove(&handle, &old_entry).await?;
                }
            } else {
                // 旧条目位于另一个集群
                let old_handle = self.sessions.open(&old.session).await?;
                let old_entry = Self::resolve(&old_handle, &old.entry)?;
                Self::remove(&old_handle, &old_entry).await?;
            }
        } else {
            warn!("Update 事件缺少 OldResourceProperties，仅确保新条目存在");
        }

        Self::ensure(&handle, &entry).await?;
        Ok(ReconciliationResult::complete(physical_id, entry_output(&entry)))
    }

    async fn delete(&self, event: &LifecycleEvent, physical_id: String) -> Result<ReconciliationResult> {
        let properties = match event
            .properties::<AclProperties>()
            .and_then(|p| p.validate().map(|_| p))
        {
            Ok(properties) => properties,
            Err(e) => {
                // 无效的声明不可能创建过任何条目
                warn!("ACL {} 的属性无效，跳过删除: {}", physical_id, e);
                return Ok(ReconciliationResult::complete(physical_id, Default::default()));
            }
        };

        let handle = self.sessions.open(&properties.session).await?;
        let entry = Self::resolve(&handle, &properties.entry)?;
        Self::remove(&handle, &entry).await?;

        Ok(ReconciliationResult::complete(physical_id, Default::default()))
    }
}

fn entry_output(entry: &AclEntry) -> brokerform_common::Properties {
    output([
        ("principal", Value::String(entry.principal.clone())),
        ("resourceName", Value::String(entry.resource_name.clone())),
    ])
}

#[async_trait]
impl ResourceHandler for AclHandler {
    fn physical_id(&self, event: &LifecycleEvent) -> Result<String> {
        match event.physical_resource_id.as_deref() {
            Some(id) if !id.is_empty() && event.request_type != RequestType::Create => {
                Ok(id.to_string())
            }
            _ => Ok(event.properties::<AclProperties>()?.entry.physical_id()),
        }
    }

    async fn handle_event(&self, event: &LifecycleEvent) -> Result<ReconciliationResult> {
        let physical_id = self.physical_id(event)?;
        debug!("处理 ACL {} 事件: {}", event.request_type, physical_id);

        match event.request_type {
            RequestType::Create => self.create(event, physical_id).await,
            RequestType::Update => self.update(event, physical_id).await,
            RequestType::Delete => self.delete(event, physical_id).await,
        }
    }

    async fn check_complete(&self, continuation: &Continuation) -> Result<CompletionCheck> {
        self.handle_event(&continuation.event).await.map(as_completion)
    }
}
