//! 访客身份哈希
//!
//! IP 与 User-Agent 分别做 SHA-256，只保存十六进制摘要，原值不落库。
//! 空字符串同样参与哈希：缺失 IP/UA 的访客会落到同一个桶里。

use sha2::{Digest, Sha256};

/// 去重票据 key 前缀
pub const TICKET_PREFIX: &str = "viewed";

/// 计算 64 位小写十六进制 SHA-256 摘要
pub fn hash_identifier(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// 匿名访客身份（IP 哈希 + UA 哈希）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VisitorIdentity {
    pub visitor_id_hash: String,
    pub agent_hash: String,
}

impl VisitorIdentity {
    pub fn from_raw(visitor_ip: &str, user_agent: &str) -> Self {
        Self {
            visitor_id_hash: hash_identifier(visitor_ip),
            agent_hash: hash_identifier(user_agent),
        }
    }

    /// 去重票据 key：`viewed:{visitor}:{agent}:{content_id}`
    pub fn ticket_key(&self, content_id: i64) -> String {
        format!(
            "{}:{}:{}:{}",
            TICKET_PREFIX, self.visitor_id_hash, self.agent_hash, content_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_sha256_hex() {
        assert_eq!(
            hash_identifier("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_empty_input_is_hashed() {
        assert_eq!(
            hash_identifier(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hash_shape() {
        let h = hash_identifier("203.0.113.7");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(h, hash_identifier("203.0.113.7"));
    }

    #[test]
    fn test_ticket_key_layout() {
        let identity = VisitorIdentity::from_raw("1.2.3.4", "curl/8.0");
        let key = identity.ticket_key(42);
        let parts: Vec<&str> = key.split(':').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "viewed");
        assert_eq!(parts[1], hash_identifier("1.2.3.4"));
        assert_eq!(parts[2], hash_identifier("curl/8.0"));
        assert_eq!(parts[3], "42");
    }

    #[test]
    fn test_identity_differs_by_agent() {
        let a = VisitorIdentity::from_raw("1.2.3.4", "Firefox");
        let b = VisitorIdentity::from_raw("1.2.3.4", "Chrome");
        assert_eq!(a.visitor_id_hash, b.visitor_id_hash);
        assert_ne!(a.ticket_key(1), b.ticket_key(1));
    }
}
