//! 错误处理模块
//!
//! 该模块提供 BrokerForm 的统一错误分类。每个错误都属于以下两类之一：
//! 瞬时错误（由外部轮询器重试，报告为“尚未完成”）和终止错误（原样返回给调用方，不再重试）。

use std::io;
use thiserror::Error;

/// BrokerForm 统一错误类型
#[derive(Error, Debug)]
pub enum Error {
    /// 瞬时错误：网络中断、Leader 不可用、集群尚未就绪等
    #[error("瞬时错误: {0}")]
    Transient(String),

    /// 冲突错误：期望状态与已存在的资源配置不一致
    #[error("资源冲突: {0}")]
    Conflict(String),

    /// 格式错误：证书或密钥材料格式不正确
    #[error("格式错误: {0}")]
    Format(String),

    /// 校验错误：资源引用格式错误或缺少必填属性
    #[error("校验错误: {0}")]
    Validation(String),

    /// 权限错误：控制平面或管理协议拒绝了请求
    #[error("权限不足: {0}")]
    PermissionDenied(String),

    /// 集群进入不可恢复的状态
    #[error("集群永久失败: {0}")]
    PermanentClusterFailure(String),

    /// 有界等待超时
    #[error("等待超时: {0}")]
    Timeout(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] io::Error),

    /// JSON 错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// 是否为瞬时错误（外部轮询器应当重试）
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_))
    }

    /// 是否为终止错误
    pub fn is_terminal(&self) -> bool {
        !self.is_transient()
    }

    /// 不带类别前缀的错误信息，原样返回给外部编排层
    pub fn message(&self) -> String {
        match self {
            Error::Transient(message)
            | Error::Conflict(message)
            | Error::Format(message)
            | Error::Validation(message)
            | Error::PermissionDenied(message)
            | Error::PermanentClusterFailure(message)
            | Error::Timeout(message) => message.clone(),
            Error::Io(e) => e.to_string(),
            Error::Json(e) => e.to_string(),
        }
    }

    /// 错误类别名称，用于日志和续传状态中的 lastError 字段
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Transient(_) => "Transient",
            Error::Conflict(_) => "Conflict",
            Error::Format(_) => "Format",
            Error::Validation(_) => "Validation",
            Error::PermissionDenied(_) => "PermissionDenied",
            Error::PermanentClusterFailure(_) => "PermanentClusterFailure",
            Error::Timeout(_) => "Timeout",
            Error::Io(_) => "Io",
            Error::Json(_) => "Json",
        }
    }
}

/// BrokerForm 结果类型别名
pub type Result<T> = std::result::Result<T, Error>;
