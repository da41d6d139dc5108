//! 配置管理模块
//!
//! 该模块负责加载和管理供应引擎的配置，支持 YAML/JSON 格式，
//! 文件中的值覆盖内置默认值，`BROKERFORM__*` 环境变量覆盖文件中的值。

use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "BROKERFORM";

/// 供应引擎配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// 日志级别
    pub log_level: String,
    /// 管理会话客户端 ID 前缀
    pub client_id_prefix: String,
    /// 管理会话配置
    pub session: SessionConfig,
    /// 轮询配置
    pub polling: PollingConfig,
    /// Topic 配置
    pub topics: TopicConfig,
    /// 连接性更新配置
    pub connectivity: ConnectivityConfig,
    /// 命名空间配置
    pub namespaces: NamespaceConfig,
    /// 密钥存储配置
    pub secrets: SecretConfig,
}

/// 管理会话配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 建立连接的超时时间（毫秒）
    pub connect_timeout_ms: u64,
    /// 单个管理请求的超时时间（毫秒）
    pub request_timeout_ms: u64,
}

/// 轮询配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// 两次完成检查之间的间隔（秒）
    pub query_interval_secs: u64,
    /// 总超时时间（秒）
    pub total_timeout_secs: u64,
}

/// Topic 配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    /// 未在属性中指定时等待 Leader 的超时时间（毫秒）
    pub leader_wait_timeout_ms: u64,
    /// 查询分区元数据的间隔（毫秒）
    pub leader_poll_interval_ms: u64,
}

/// 连接性更新配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// 提交后版本令牌连续多少次未变化才重新提交
    pub resubmit_after_stale_polls: u32,
}

/// 命名空间配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceConfig {
    /// 提交更新后连续多少次读到旧值才重新提交
    pub resubmit_after_stale_polls: u32,
}

/// 密钥存储配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretConfig {
    /// 密钥所在的命名空间
    pub namespace: String,
    /// 证书字段名
    pub cert_field: String,
    /// 私钥字段名
    pub key_field: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        create_default_config()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5000,
            request_timeout_ms: 30000,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            query_interval_secs: 10,
            total_timeout_secs: 1800,
        }
    }
}

impl PollingConfig {
    /// 轮询间隔
    pub fn query_interval(&self) -> Duration {
        Duration::from_secs(self.query_interval_secs)
    }

    /// 总超时时间
    pub fn total_timeout(&self) -> Duration {
        Duration::from_secs(self.total_timeout_secs)
    }
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            leader_wait_timeout_ms: brokerform_common::default_leader_wait_timeout_ms(),
            leader_poll_interval_ms: 250,
        }
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            resubmit_after_stale_polls: 3,
        }
    }
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            resubmit_after_stale_polls: 3,
        }
    }
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            cert_field: "cert".to_string(),
            key_field: "key".to_string(),
        }
    }
}

/// 配置管理器
pub struct ConfigManager {
    /// 配置文件路径
    config_path: Option<PathBuf>,
    /// 当前配置
    config: ProviderConfig,
}

impl ConfigManager {
    /// 从配置文件创建配置管理器
    pub fn new(config_path: &str) -> Result<Self> {
        let config_path = PathBuf::from(config_path);

        let config = Self::load_config(Some(&config_path))
            .context(format!("无法加载配置文件: {:?}", config_path))?;

        info!("已加载配置文件: {:?}", config_path);

        Ok(Self {
            config_path: Some(config_path),
            config,
        })
    }

    /// 只使用内置默认值和环境变量创建配置管理器
    pub fn from_env() -> Result<Self> {
        let config = Self::load_config(None).context("无法从环境变量加载配置")?;
        Ok(Self {
            config_path: None,
            config,
        })
    }

    /// 加载配置：默认值 < 配置文件 < 环境变量
    fn load_config(config_path: Option<&Path>) -> Result<ProviderConfig> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&create_default_config()).context("序列化默认配置失败")?);

        if let Some(config_path) = config_path {
            let config_file = config_path.to_str().ok_or_else(|| anyhow!("配置路径无效"))?;

            // 确定配置文件格式
            let format = match config_path.extension().and_then(|ext| ext.to_str()) {
                Some("yaml") | Some("yml") => FileFormat::Yaml,
                Some("json") => FileFormat::Json,
                _ => return Err(anyhow!("不支持的配置文件格式，仅支持 YAML 或 JSON")),
            };
            builder = builder.add_source(File::with_name(config_file).format(format));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("构建配置失败")?;

        let provider_config = config
            .try_deserialize::<ProviderConfig>()
            .context("配置格式错误")?;

        validate_config(&provider_config)?;
        debug!("生效配置: {:?}", provider_config);

        Ok(provider_config)
    }

    /// 配置文件路径
    pub fn get_config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// 获取轮询配置
    pub fn get_polling_config(&self) -> &PollingConfig {
        &self.config.polling
    }

    /// 获取完整配置
    pub fn get_config(&self) -> &ProviderConfig {
        &self.config
    }

    /// 取出配置
    pub fn into_config(self) -> ProviderConfig {
        self.config
    }
}

fn validate_config(config: &ProviderConfig) -> Result<()> {
    if config.polling.query_interval_secs == 0 {
        return Err(anyhow!("polling.query_interval_secs 必须大于 0"));
    }
    if config.polling.total_timeout_secs < config.polling.query_interval_secs {
        return Err(anyhow!("polling.total_timeout_secs 不能小于轮询间隔"));
    }
    if config.topics.leader_poll_interval_ms == 0 {
        return Err(anyhow!("topics.leader_poll_interval_ms 必须大于 0"));
    }
    if config.connectivity.resubmit_after_stale_polls == 0 {
        return Err(anyhow!("connectivity.resubmit_after_stale_polls 必须大于 0"));
    }
    if config.namespaces.resubmit_after_stale_polls == 0 {
        return Err(anyhow!("namespaces.resubmit_after_stale_polls 必须大于 0"));
    }
    if config.client_id_prefix.is_empty() {
        return Err(anyhow!("client_id_prefix 不能为空"));
    }
    Ok(())
}

/// 创建默认配置
pub fn create_default_config() -> ProviderConfig {
    ProviderConfig {
        log_level: "info".to_string(),
        client_id_prefix: "client-CR".to_string(),
        session: SessionConfig::default(),
        polling: PollingConfig::default(),
        topics: TopicConfig::default(),
        connectivity: ConnectivityConfig::default(),
        namespaces: NamespaceConfig::default(),
        secrets: SecretConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = create_default_config();
        assert_eq!(config.client_id_prefix, "client-CR");
        assert_eq!(config.polling.query_interval(), Duration::from_secs(10));
        assert_eq!(config.topics.leader_wait_timeout_ms, 5000);
        assert_eq!(config.connectivity.resubmit_after_stale_polls, 3);
        assert_eq!(config.namespaces.resubmit_after_stale_polls, 3);
    }

    #[test]
    fn test_yaml_overrides_defaults() {
        let file = write_config(
            ".yaml",
            "log_level: debug\npolling:\n  query_interval_secs: 1\n  total_timeout_secs: 300\n",
        );
        let manager = ConfigManager::new(file.path().to_str().unwrap()).unwrap();
        let config = manager.get_config();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.polling.query_interval_secs, 1);
        assert_eq!(config.polling.total_timeout_secs, 300);
        // 未出现在文件中的字段保持默认值
        assert_eq!(config.session, SessionConfig::default());
        assert_eq!(config.secrets.cert_field, "cert");
    }

    #[test]
    fn test_json_config() {
        let file = write_config(
            ".json",
            r#"{"secrets": {"namespace": "kafka", "cert_field": "tls.crt", "key_field": "tls.key"}}"#,
        );
        let manager = ConfigManager::new(file.path().to_str().unwrap()).unwrap();
        assert_eq!(manager.get_config().secrets.namespace, "kafka");
        assert_eq!(manager.get_config().secrets.key_field, "tls.key");
    }

    #[test]
    fn test_unsupported_extension() {
        let file = write_config(".toml", "log_level = 'debug'");
        assert!(ConfigManager::new(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_invalid_polling_rejected() {
        let file = write_config(
            ".yaml",
            "polling:\n  query_interval_secs: 60\n  total_timeout_secs: 30\n",
        );
        assert!(ConfigManager::new(file.path().to_str().unwrap()).is_err());
    }
}
