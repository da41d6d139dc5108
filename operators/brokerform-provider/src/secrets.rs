//! 密钥读取接口
//!
//! 凭证的生命周期由外部系统管理，引擎只读取命名密钥中的证书与私钥两个字段。

use async_trait::async_trait;

use brokerform_common::Result;

#[cfg(test)]
use mockall::automock;

/// 从密钥中读出的原始凭证材料
#[derive(Clone, PartialEq, Eq)]
pub struct SecretMaterial {
    /// 原始证书文本（换行格式不保证正确）
    pub cert: String,
    /// 原始私钥文本（换行格式不保证正确）
    pub key: String,
}

impl std::fmt::Debug for SecretMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretMaterial")
            .field("cert", &format!("<{} bytes>", self.cert.len()))
            .field("key", &"<redacted>")
            .finish()
    }
}

/// 密钥存储
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// 读取命名密钥
    ///
    /// 密钥不存在或缺少字段时返回校验错误；存储暂时不可达时返回瞬时错误。
    async fn get_secret(&self, name: &str) -> Result<SecretMaterial>;
}
