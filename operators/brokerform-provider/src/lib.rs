//! BrokerForm Provider - 异步外部资源供应引擎
//!
//! 该模块让声明式基础设施描述能够管理创建或变更不是原子操作的资源：
//! 运行中的 Kafka 集群内的 ACL 与 Topic、集群网络连接性的切换，以及只能通过轮询观察完成的数据仓库命名空间。
//! 所有操作都是幂等的，续传状态随事件负载往返，进程内不保留任何状态。

pub mod backends;
pub mod certificate;
pub mod config;
pub mod connectivity;
pub mod control_plane;
pub mod controller;
pub mod event_handler;
pub mod poller;
pub mod reconcile;
pub mod secrets;
pub mod session;

#[cfg(test)]
mod testing;

use anyhow::{anyhow, Result};
use aws_config::BehaviorVersion;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use brokerform_common::{CompletionCheck, Continuation, LifecycleEvent, ReconciliationResult};

use crate::backends::{KubeSecretStore, MskControlPlane, RedshiftNamespaceApi};
use crate::config::ProviderConfig;
use crate::connectivity::{ConnectivityHandler, ConnectivityUpdater};
use crate::control_plane::ClusterControlPlane;
use crate::controller::Controller;
use crate::event_handler::EventRouter;
use crate::poller::{Poller, ProvisionOutcome};
use crate::reconcile::{AclHandler, NamespaceApi, NamespaceHandler, TopicHandler};
use crate::secrets::SecretStore;
use crate::session::{AdminConnector, SessionFactory};

/// 外部依赖
pub struct Backends {
    /// 集群控制平面
    pub control_plane: Arc<dyn ClusterControlPlane>,
    /// 密钥存储
    pub secrets: Arc<dyn SecretStore>,
    /// 管理协议连接器
    pub connector: Arc<dyn AdminConnector>,
    /// 命名空间接口
    pub namespaces: Arc<dyn NamespaceApi>,
}

/// 按配置组装编排器，每种资源类型一个处理器
pub fn build_controller(config: &ProviderConfig, backends: Backends) -> Controller {
    let sessions = Arc::new(SessionFactory::new(
        backends.control_plane.clone(),
        backends.secrets,
        backends.connector,
        config.session.clone(),
        &config.client_id_prefix,
    ));

    let router = EventRouter::new(
        Arc::new(AclHandler::new(sessions.clone())),
        Arc::new(TopicHandler::new(sessions, config.topics.clone())),
        Arc::new(ConnectivityHandler::new(ConnectivityUpdater::new(
            backends.control_plane,
            config.connectivity.clone(),
        ))),
        Arc::new(NamespaceHandler::new(
            backends.namespaces,
            config.namespaces.clone(),
        )),
    );

    Controller::new(router)
}

/// 供应引擎主结构体
pub struct BrokerFormProvider {
    /// 配置
    config: ProviderConfig,
    /// 编排器
    controller: Arc<Controller>,
}

impl BrokerFormProvider {
    /// 使用给定的外部依赖创建供应引擎
    pub fn new(config: ProviderConfig, backends: Backends) -> Self {
        let controller = Arc::new(build_controller(&config, backends));
        Self { config, controller }
    }

    /// 使用托管 Kafka 控制平面、数据仓库命名空间接口和 Kubernetes 密钥存储创建供应引擎
    pub async fn with_default_backends(
        config: ProviderConfig,
        connector: Arc<dyn AdminConnector>,
    ) -> Result<Self> {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let control_plane = Arc::new(MskControlPlane::new(aws_sdk_kafka::Client::new(&sdk_config)));
        let namespaces = Arc::new(RedshiftNamespaceApi::new(
            aws_sdk_redshiftserverless::Client::new(&sdk_config),
        ));
        let secrets = Arc::new(KubeSecretStore::try_default(config.secrets.clone()).await?);

        info!("BrokerForm 供应引擎已初始化");

        Ok(Self::new(
            config,
            Backends {
                control_plane,
                secrets,
                connector,
                namespaces,
            },
        ))
    }

    /// 处理一次生命周期事件
    pub async fn handle_event(&self, event: &LifecycleEvent) -> brokerform_common::Result<ReconciliationResult> {
        self.controller.handle_event(event).await
    }

    /// 检查异步操作是否完成
    pub async fn check_complete(&self, continuation: &Continuation) -> brokerform_common::Result<CompletionCheck> {
        self.controller.check_complete(continuation).await
    }

    /// 在进程内驱动事件直到完成
    pub async fn provision(&self, event: LifecycleEvent) -> brokerform_common::Result<ProvisionOutcome> {
        Poller::from_config(self.controller.clone(), &self.config.polling)
            .run(event)
            .await
    }

    /// 获取编排器
    pub fn controller(&self) -> Arc<Controller> {
        self.controller.clone()
    }

    /// 获取配置
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

/// 初始化日志，`RUST_LOG` 优先于配置的日志级别
pub fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| anyhow!("无效的日志级别 {}: {}", level, e))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("初始化日志失败: {}", e))
}
