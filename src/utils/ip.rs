//! 访客 IP 解析
//!
//! 去重身份依赖客户端 IP，因此只在连接来自可信代理时才采信转发头：
//! - 配置了 trusted_proxies：仅这些地址（支持 CIDR）转发的 X-Forwarded-For 被采信
//! - 未配置：连接来自私有地址或 localhost 时视为反向代理
//! - 其余情况使用连接地址，防止伪造

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use actix_web::HttpRequest;
use actix_web::http::header::HeaderMap;
use tracing::{debug, warn};

/// 无法确定客户端地址时使用的占位值
pub const UNKNOWN_IP: &str = "unknown";

/// 检查 IP 是否为私有地址或 localhost
pub fn is_private_or_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || (v6.segments()[0] & 0xfe00) == 0xfc00 // fc00::/7
                || (v6.segments()[0] & 0xffc0) == 0xfe80 // fe80::/10
        }
    }
}

fn parse_peer(peer: &str) -> Option<IpAddr> {
    peer.parse::<SocketAddr>()
        .map(|s| s.ip())
        .or_else(|_| peer.parse::<IpAddr>())
        .ok()
}

/// 单个地址或 CIDR 网段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustedNetwork {
    network: IpAddr,
    prefix_len: u8,
}

impl TrustedNetwork {
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (ip, self.network) {
            (IpAddr::V4(ip), IpAddr::V4(net)) => {
                let mask = u32::MAX
                    .checked_shl(32 - self.prefix_len as u32)
                    .unwrap_or(0);
                (u32::from_be_bytes(ip.octets()) & mask) == (u32::from_be_bytes(net.octets()) & mask)
            }
            (IpAddr::V6(ip), IpAddr::V6(net)) => {
                let mask = u128::MAX
                    .checked_shl(128 - self.prefix_len as u32)
                    .unwrap_or(0);
                (u128::from_be_bytes(ip.octets()) & mask)
                    == (u128::from_be_bytes(net.octets()) & mask)
            }
            _ => false,
        }
    }
}

impl FromStr for TrustedNetwork {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s, None),
        };

        let network = addr
            .trim()
            .parse::<IpAddr>()
            .map_err(|e| format!("invalid address '{}': {}", s, e))?;
        let max = if network.is_ipv4() { 32 } else { 128 };

        let prefix_len = match prefix {
            Some(p) => p
                .trim()
                .parse::<u8>()
                .map_err(|e| format!("invalid prefix '{}': {}", s, e))?,
            None => max,
        };
        if prefix_len > max {
            return Err(format!("prefix too long: {}", s));
        }

        Ok(Self {
            network,
            prefix_len,
        })
    }
}

/// 转发头采信策略，启动时从配置解析一次
#[derive(Debug, Clone, Default)]
pub struct ProxyPolicy {
    trusted: Vec<TrustedNetwork>,
}

impl ProxyPolicy {
    /// 无效条目记录警告后跳过
    pub fn from_config(entries: &[String]) -> Self {
        let trusted = entries
            .iter()
            .filter_map(|entry| match entry.parse::<TrustedNetwork>() {
                Ok(net) => Some(net),
                Err(e) => {
                    warn!("Ignoring trusted proxy entry: {}", e);
                    None
                }
            })
            .collect();
        Self { trusted }
    }

    pub fn is_trusted(&self, peer: &str) -> bool {
        parse_peer(peer).is_some_and(|ip| self.trusted.iter().any(|net| net.contains(&ip)))
    }

    /// 根据连接地址与转发头决定客户端 IP
    pub fn resolve<F>(&self, peer: Option<&str>, forwarded: F) -> Option<String>
    where
        F: FnOnce() -> Option<String>,
    {
        let peer = peer?;

        if !self.trusted.is_empty() {
            if self.is_trusted(peer) {
                let ip = forwarded().unwrap_or_else(|| peer.to_string());
                debug!("Trusted proxy {} -> {}", peer, ip);
                return Some(ip);
            }
            return Some(peer.to_string());
        }

        if parse_peer(peer).is_some_and(|ip| is_private_or_local(&ip))
            && let Some(ip) = forwarded()
        {
            debug!("Private peer {} forwarded for {}", peer, ip);
            return Some(ip);
        }

        Some(peer.to_string())
    }

    /// 访客 IP，无法确定时为 [`UNKNOWN_IP`]
    pub fn visitor_ip(&self, req: &HttpRequest) -> String {
        let conn = req.connection_info();
        self.resolve(conn.peer_addr(), || forwarded_ip(req.headers()))
            .unwrap_or_else(|| UNKNOWN_IP.to_string())
    }
}

/// X-Forwarded-For 的第一个地址，其次 X-Real-IP
pub fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.trim().to_string())
        })
}
