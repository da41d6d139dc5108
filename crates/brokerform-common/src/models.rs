//! 数据模型模块
//!
//! 该模块定义了 BrokerForm 使用的核心数据模型。所有模型都可以序列化，
//! 因为每次调用都是无状态的，续传所需的全部状态都随事件负载往返。

pub mod acl;
pub mod connectivity;
pub mod event;
pub mod lenient;
pub mod namespace;
pub mod poll;
pub mod topic;
