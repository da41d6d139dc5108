//! 数据仓库命名空间接口
//!
//! 通过 GetNamespace、CreateNamespace、UpdateNamespace 和 DeleteNamespace 实现 `NamespaceApi`。

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_redshiftserverless::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_redshiftserverless::types::{LogExport, Namespace};
use aws_sdk_redshiftserverless::Client;
use tracing::{debug, info};

use brokerform_common::{Error, NamespaceDescription, NamespaceSpec, NamespaceStatus, Result};

use crate::reconcile::NamespaceApi;

const NOT_FOUND: &str = "ResourceNotFoundException";

/// 数据仓库命名空间客户端
pub struct RedshiftNamespaceApi {
    client: Client,
}

impl RedshiftNamespaceApi {
    /// 使用已有的 SDK 客户端
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// 从默认凭证链和区域配置创建
    pub async fn from_env() -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self::new(Client::new(&sdk_config))
    }
}

#[async_trait]
impl NamespaceApi for RedshiftNamespaceApi {
    async fn get_namespace(&self, name: &str) -> Result<Option<NamespaceDescription>> {
        let output = match self.client.get_namespace().namespace_name(name).send().await {
            Ok(output) => output,
            Err(e) if e.code() == Some(NOT_FOUND) => {
                debug!("命名空间 {} 不存在", name);
                return Ok(None);
            }
            Err(e) => return Err(classify("GetNamespace", e)),
        };
        let namespace: Option<&Namespace> = output.namespace().into();
        Ok(namespace.map(describe_namespace))
    }

    async fn create_namespace(&self, spec: &NamespaceSpec) -> Result<NamespaceDescription> {
        let output = self
            .client
            .create_namespace()
            .namespace_name(&spec.namespace_name)
            .db_name(&spec.db_name)
            .set_admin_username(spec.admin_username.clone())
            .set_kms_key_id(spec.kms_key_id.clone())
            .set_iam_roles(Some(spec.iam_roles.clone()))
            .set_default_iam_role_arn(spec.default_iam_role_arn.clone())
            .set_log_exports(Some(log_exports(spec)))
            .send()
            .await
            .map_err(|e| classify("CreateNamespace", e))?;

        info!("CreateNamespace {} 已受理", spec.namespace_name);
        let namespace: Option<&Namespace> = output.namespace().into();
        namespace
            .map(describe_namespace)
            .ok_or_else(|| Error::Transient(format!("CreateNamespace {} 未返回命名空间", spec.namespace_name)))
    }

    async fn update_namespace(&self, spec: &NamespaceSpec) -> Result<NamespaceDescription> {
        let output = self
            .client
            .update_namespace()
            .namespace_name(&spec.namespace_name)
            .set_kms_key_id(spec.kms_key_id.clone())
            .set_iam_roles(Some(spec.iam_roles.clone()))
            .set_default_iam_role_arn(spec.default_iam_role_arn.clone())
            .set_log_exports(Some(log_exports(spec)))
            .send()
            .await
            .map_err(|e| classify("UpdateNamespace", e))?;

        info!("UpdateNamespace {} 已受理", spec.namespace_name);
        let namespace: Option<&Namespace> = output.namespace().into();
        namespace
            .map(describe_namespace)
            .ok_or_else(|| Error::Transient(format!("UpdateNamespace {} 未返回命名空间", spec.namespace_name)))
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        match self.client.delete_namespace().namespace_name(name).send().await {
            Ok(_) => {
                info!("DeleteNamespace {} 已受理", name);
                Ok(())
            }
            Err(e) if e.code() == Some(NOT_FOUND) => Ok(()),
            Err(e) => Err(classify("DeleteNamespace", e)),
        }
    }
}

fn log_exports(spec: &NamespaceSpec) -> Vec<LogExport> {
    spec.log_exports
        .iter()
        .map(|log| LogExport::from(log.as_str()))
        .collect()
}

/// 转换为共享的命名空间描述
pub fn describe_namespace(namespace: &Namespace) -> NamespaceDescription {
    NamespaceDescription {
        namespace_name: namespace.namespace_name().unwrap_or_default().to_string(),
        namespace_id: namespace.namespace_id().unwrap_or_default().to_string(),
        namespace_arn: namespace.namespace_arn().unwrap_or_default().to_string(),
        status: namespace
            .status()
            .map(|s| NamespaceStatus::from_api(s.as_str()))
            .unwrap_or(NamespaceStatus::Unknown),
        db_name: namespace.db_name().unwrap_or_default().to_string(),
        admin_username: namespace.admin_username().map(str::to_string),
        kms_key_id: namespace.kms_key_id().map(str::to_string),
        iam_roles: namespace.iam_roles().to_vec(),
        default_iam_role_arn: namespace.default_iam_role_arn().map(str::to_string),
        log_exports: namespace
            .log_exports()
            .iter()
            .map(|log| log.as_str().to_string())
            .collect(),
    }
}

/// 按错误码分类命名空间接口错误
fn classify<E, R>(operation: &str, err: SdkError<E, R>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().map(str::to_string);
    let message = format!("{} 失败: {}", operation, DisplayErrorContext(&err));
    match code.as_deref() {
        Some("AccessDeniedException") => Error::PermissionDenied(message),
        Some("ConflictException") => Error::Conflict(message),
        Some("ValidationException") | Some("ServiceQuotaExceededException") => {
            Error::Validation(message)
        }
        _ => Error::Transient(message),
    }
}
