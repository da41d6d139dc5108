//! BrokerForm Common - 跨模块共享的数据模型与错误分类
//!
//! 该模块提供 BrokerForm 各组件共享的数据结构：生命周期事件、协调结果、
//! 轮询续传状态、ACL 条目、Topic 规格、连接性目标与命名空间规格，以及统一的错误分类。

pub mod models;
pub mod error;

/// 重新导出常用类型，方便使用
pub use error::Error;
pub use error::Result;
pub use models::acl::*;
pub use models::connectivity::*;
pub use models::event::*;
pub use models::namespace::*;
pub use models::poll::*;
pub use models::topic::*;
