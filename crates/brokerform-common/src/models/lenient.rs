//! 宽松反序列化辅助函数
//!
//! 声明式编排层会把所有资源属性序列化为字符串（例如 `"true"`、`"3"`），
//! 这里的函数同时接受原生 JSON 类型和字符串形式。

use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::fmt::Display;
use std::str::FromStr;

/// 数值代码或名称
///
/// 用于既可以写成 Kafka 协议数值代码、也可以写成名称的枚举字段。
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CodeOrName {
    /// 数值代码，如 `2`
    Code(i64),
    /// 名称，如 `"TOPIC"` 或 `"2"`
    Name(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolOrString {
    Bool(bool),
    Str(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Str(String),
}

/// 解析布尔值，接受 `true` 与 `"true"`
pub fn bool_from_any<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(value) => Ok(value),
        BoolOrString::Str(value) => match value.trim().to_lowercase().as_str() {
            "true" => Ok(true),
            "false" | "" => Ok(false),
            other => Err(de::Error::custom(format!("无效的布尔值: {other}"))),
        },
    }
}

/// 解析无符号整数，接受 `3` 与 `"3"`
pub fn number_from_any<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64> + FromStr,
    <T as TryFrom<u64>>::Error: Display,
    <T as FromStr>::Err: Display,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(value) => T::try_from(value).map_err(de::Error::custom),
        NumberOrString::Str(value) => value.trim().parse::<T>().map_err(de::Error::custom),
    }
}

/// 归一化枚举名称：忽略大小写、下划线、连字符和空格
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_uppercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "bool_from_any")]
        flag: bool,
        #[serde(deserialize_with = "number_from_any")]
        count: u32,
    }

    #[test]
    fn test_accepts_stringified_values() {
        let probe: Probe = serde_json::from_str(r#"{"flag": "true", "count": "3"}"#).unwrap();
        assert!(probe.flag);
        assert_eq!(probe.count, 3);

        let probe: Probe = serde_json::from_str(r#"{"count": 12}"#).unwrap();
        assert!(!probe.flag);
        assert_eq!(probe.count, 12);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(serde_json::from_str::<Probe>(r#"{"flag": "yes", "count": 1}"#).is_err());
        assert!(serde_json::from_str::<Probe>(r#"{"count": "many"}"#).is_err());
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("CLUSTER_ACTION"), "CLUSTERACTION");
        assert_eq!(normalize_name("ClusterAction"), "CLUSTERACTION");
        assert_eq!(normalize_name("describe-configs"), "DESCRIBECONFIGS");
    }
}
