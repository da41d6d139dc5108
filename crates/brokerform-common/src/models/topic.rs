//! Topic 规格模型

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::lenient::{bool_from_any, number_from_any};

/// Topic 名称的最大长度
pub const MAX_TOPIC_NAME_LEN: usize = 249;

/// Topic 配置项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicConfigEntry {
    pub name: String,
    pub value: String,
}

/// Topic 规格
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSpec {
    /// Topic 名称
    #[serde(alias = "topic")]
    pub name: String,
    /// 分区数
    #[serde(alias = "numPartitions", deserialize_with = "number_from_any")]
    pub partition_count: u32,
    /// 副本因子
    #[serde(deserialize_with = "number_from_any")]
    pub replication_factor: u16,
    /// 是否等待所有分区选出 Leader
    #[serde(default, deserialize_with = "bool_from_any")]
    pub wait_for_leaders: bool,
    /// 等待 Leader 的超时时间（毫秒）
    #[serde(
        default = "default_leader_wait_timeout_ms",
        alias = "timeout",
        deserialize_with = "number_from_any"
    )]
    pub leader_wait_timeout_ms: u64,
    /// Topic 配置项
    #[serde(default)]
    pub config_entries: Vec<TopicConfigEntry>,
}

/// 默认等待 Leader 5 秒
pub fn default_leader_wait_timeout_ms() -> u64 {
    5000
}

impl TopicSpec {
    /// 创建新的 Topic 规格
    pub fn new(name: &str, partition_count: u32, replication_factor: u16) -> Self {
        Self {
            name: name.to_string(),
            partition_count,
            replication_factor,
            wait_for_leaders: false,
            leader_wait_timeout_ms: default_leader_wait_timeout_ms(),
            config_entries: Vec::new(),
        }
    }

    /// 校验 Topic 规格，在任何网络调用之前执行
    pub fn validate(&self) -> Result<()> {
        let name = self.name.as_str();
        if name.is_empty() || name == "." || name == ".." {
            return Err(Error::Validation(format!("无效的 Topic 名称: '{}'", name)));
        }
        if name.len() > MAX_TOPIC_NAME_LEN {
            return Err(Error::Validation(format!(
                "Topic 名称长度不能超过 {} 个字符",
                MAX_TOPIC_NAME_LEN
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(Error::Validation(format!(
                "Topic 名称只能包含字母、数字、'.'、'_' 和 '-': {}",
                name
            )));
        }
        if self.partition_count == 0 {
            return Err(Error::Validation("分区数必须大于 0".to_string()));
        }
        if self.replication_factor == 0 {
            return Err(Error::Validation("副本因子必须大于 0".to_string()));
        }
        if self.wait_for_leaders && self.leader_wait_timeout_ms == 0 {
            return Err(Error::Validation("等待 Leader 的超时时间必须大于 0".to_string()));
        }
        Ok(())
    }
}

/// 分区元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionMetadata {
    /// 分区编号
    pub partition: i32,
    /// Leader Broker，`None` 表示 LEADER_NOT_AVAILABLE
    pub leader: Option<i32>,
    /// 副本 Broker 列表
    pub replicas: Vec<i32>,
}

/// Topic 描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDescription {
    pub name: String,
    pub partitions: Vec<PartitionMetadata>,
}

impl TopicDescription {
    /// 分区数
    pub fn partition_count(&self) -> u32 {
        self.partitions.len() as u32
    }

    /// 副本因子（取第一个分区的副本数）
    pub fn replication_factor(&self) -> u16 {
        self.partitions
            .first()
            .map(|p| p.replicas.len() as u16)
            .unwrap_or(0)
    }

    /// 尚无 Leader 的分区编号
    pub fn leaderless_partitions(&self) -> Vec<i32> {
        self.partitions
            .iter()
            .filter(|p| p.leader.is_none())
            .map(|p| p.partition)
            .collect()
    }
}
