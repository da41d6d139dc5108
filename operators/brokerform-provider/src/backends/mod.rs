//! 生产环境后端
//!
//! 管理协议的传输客户端由嵌入方通过 `AdminConnector` 注入。

pub mod kube_secret;
pub mod msk;
pub mod redshift;

pub use kube_secret::KubeSecretStore;
pub use msk::MskControlPlane;
pub use redshift::RedshiftNamespaceApi;
