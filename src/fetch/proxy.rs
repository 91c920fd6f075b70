use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use sha2::{Digest, Sha256};

/// Forward proxy settings shared by every outbound request.
///
/// An empty `host` means "no proxy". Credentials are only attached when
/// `username` is non-empty.
///
/// SEC-015: The password is held as a [`SecretString`] and masked in `Debug`.
#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

impl Clone for ProxyConfig {
    fn clone(&self) -> Self {
        Self {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self
                .password
                .as_ref()
                .map(|p| SecretString::from(p.expose_secret().to_owned())),
        }
    }
}

impl std::fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ProxyConfig {
    /// No proxy: requests go direct.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: &str) -> Self {
        self.username = username.into();
        self.password = Some(SecretString::from(password.to_owned()));
        self
    }

    /// Returns true when requests should be routed through the proxy.
    pub fn is_enabled(&self) -> bool {
        !self.host.trim().is_empty()
    }

    /// Proxy URL in the form `reqwest::Proxy` accepts.
    ///
    /// A host that already carries a scheme is used verbatim; a zero port
    /// leaves the scheme default in place.
    pub fn endpoint(&self) -> String {
        let host = self.host.trim();
        let base = if host.contains("://") {
            host.to_string()
        } else {
            format!("http://{host}")
        };
        if self.port == 0 {
            base
        } else {
            format!("{}:{}", base.trim_end_matches('/'), self.port)
        }
    }

    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }

    pub(crate) fn password_str(&self) -> &str {
        self.password
            .as_ref()
            .map(|p| p.expose_secret())
            .unwrap_or("")
    }

    /// Stable key identifying this proxy setup, used to reuse HTTP clients.
    ///
    /// The password only contributes a digest so the key can be logged safely.
    pub(crate) fn client_key(&self) -> String {
        if !self.is_enabled() {
            return "direct".to_string();
        }
        let digest = Sha256::digest(self.password_str().as_bytes());
        format!("{}|{}|{:x}", self.endpoint(), self.username, digest)
    }
}
