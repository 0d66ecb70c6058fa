//! Proxy server configuration
//!
//! Proxy type and proxy authentication scheme are selected from their
//! configuration strings with exhaustive matches; every accepted spelling
//! maps to exactly one variant.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Transport protocol spoken to the proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxyType {
    #[default]
    Http,
    SocksV4,
    SocksV5,
}

/// Authentication scheme used against the proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxyAuthScheme {
    #[default]
    Basic,
    Kerberos,
    Ntlm,
    Spnego,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProxyParseError {
    #[error("unknown proxy type `{0}` (expected http, socksv4 or socksv5)")]
    UnknownType(String),
    #[error("proxy host must not be empty")]
    EmptyHost,
}

impl FromStr for ProxyType {
    type Err = ProxyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(ProxyType::Http),
            "socksv4" => Ok(ProxyType::SocksV4),
            "socksv5" => Ok(ProxyType::SocksV5),
            _ => Err(ProxyParseError::UnknownType(s.to_string())),
        }
    }
}

impl ProxyAuthScheme {
    /// Scheme for a protocol name; unrecognized names fall back to `Basic`
    #[must_use]
    pub fn from_protocol(protocol: &str) -> Self {
        match protocol.to_ascii_lowercase().as_str() {
            "http" | "https" => ProxyAuthScheme::Basic,
            "kerberos" => ProxyAuthScheme::Kerberos,
            "ntlm" => ProxyAuthScheme::Ntlm,
            "spnego" => ProxyAuthScheme::Spnego,
            _ => ProxyAuthScheme::Basic,
        }
    }
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProxyType::Http => "http",
            ProxyType::SocksV4 => "socksv4",
            ProxyType::SocksV5 => "socksv5",
        })
    }
}

/// Credentials presented to the proxy
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyCredentials {
    pub principal: String,
    pub password: Option<String>,
    pub scheme: ProxyAuthScheme,
    pub ntlm_domain: Option<String>,
    pub encoding: Option<String>,
}

impl fmt::Debug for ProxyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyCredentials")
            .field("principal", &self.principal)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("scheme", &self.scheme)
            .field("ntlm_domain", &self.ntlm_domain)
            .field("encoding", &self.encoding)
            .finish()
    }
}

/// A resolved proxy server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyServer {
    host: String,
    port: u16,
    proxy_type: ProxyType,
    credentials: Option<ProxyCredentials>,
    non_proxy_hosts: Vec<String>,
}

impl ProxyServer {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, ProxyParseError> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(ProxyParseError::EmptyHost);
        }
        Ok(Self {
            host,
            port,
            proxy_type: ProxyType::default(),
            credentials: None,
            non_proxy_hosts: Vec::new(),
        })
    }

    #[must_use]
    pub fn with_type(mut self, proxy_type: ProxyType) -> Self {
        self.proxy_type = proxy_type;
        self
    }

    /// Attach credentials; the scheme is derived from `protocol` (default `http`)
    #[must_use]
    pub fn with_principal(
        mut self,
        principal: impl Into<String>,
        password: Option<String>,
        protocol: Option<&str>,
    ) -> Self {
        self.credentials = Some(ProxyCredentials {
            principal: principal.into(),
            password,
            scheme: ProxyAuthScheme::from_protocol(protocol.unwrap_or("http")),
            ntlm_domain: None,
            encoding: None,
        });
        self
    }

    #[must_use]
    pub fn with_ntlm_domain(mut self, domain: impl Into<String>) -> Self {
        if let Some(credentials) = self.credentials.as_mut() {
            credentials.ntlm_domain = Some(domain.into());
        }
        self
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        if let Some(credentials) = self.credentials.as_mut() {
            credentials.encoding = Some(encoding.into());
        }
        self
    }

    #[must_use]
    pub fn with_non_proxy_hosts(mut self, hosts: Vec<String>) -> Self {
        self.non_proxy_hosts = hosts;
        self
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn proxy_type(&self) -> ProxyType {
        self.proxy_type
    }

    #[must_use]
    pub fn credentials(&self) -> Option<&ProxyCredentials> {
        self.credentials.as_ref()
    }

    /// Whether `host` is exempt from proxying
    ///
    /// Entries match exactly or, when written `*.suffix`, by domain suffix.
    #[must_use]
    pub fn bypasses(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.non_proxy_hosts.iter().any(|pattern| {
            let pattern = pattern.to_ascii_lowercase();
            match pattern.strip_prefix("*.") {
                Some(suffix) => host.ends_with(&format!(".{suffix}")),
                None => host == pattern,
            }
        })
    }
}
