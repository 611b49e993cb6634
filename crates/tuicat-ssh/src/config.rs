use zeroize::Zeroizing;

#[derive(Clone, Debug)]
pub struct SshConnectConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth_method: AuthMethod,
    pub host_key_policy: HostKeyPolicy,
    pub keepalive_interval_secs: u64,
    /// Bounds TCP connect, key exchange and authentication together.
    pub connect_timeout_ms: u64,
    pub term: String,
    pub term_width: u32,
    pub term_height: u32,
}

#[derive(Clone, Debug)]
pub enum AuthMethod {
    Password {
        password: Zeroizing<String>,
    },
    /// OpenSSH or PEM private key text, decoded in memory.
    Key {
        private_key: Zeroizing<String>,
        passphrase: Option<Zeroizing<String>>,
    },
    /// No secret supplied; the server decides.
    None,
}

impl AuthMethod {
    pub fn from_secrets(password: Option<String>, private_key: Option<String>) -> Self {
        match (password, private_key) {
            (Some(password), _) if !password.is_empty() => AuthMethod::Password {
                password: Zeroizing::new(password),
            },
            (_, Some(key)) if !key.trim().is_empty() => AuthMethod::Key {
                private_key: Zeroizing::new(key),
                passphrase: None,
            },
            _ => AuthMethod::None,
        }
    }

    pub fn as_key(&self) -> &str {
        match self {
            AuthMethod::Password { .. } => "password",
            AuthMethod::Key { .. } => "publickey",
            AuthMethod::None => "none",
        }
    }
}

#[derive(Clone, Debug)]
pub enum HostKeyPolicy {
    InsecureAcceptAny,
    /// SHA-256 fingerprints in `SHA256:<base64>` form.
    Pinned(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_wins_over_key() {
        let auth = AuthMethod::from_secrets(Some("p".into()), Some("KEY".into()));
        assert_eq!(auth.as_key(), "password");
    }

    #[test]
    fn empty_secrets_fall_back_to_none() {
        let auth = AuthMethod::from_secrets(Some(String::new()), Some("  ".into()));
        assert_eq!(auth.as_key(), "none");
        let auth = AuthMethod::from_secrets(None, Some("-----BEGIN".into()));
        assert_eq!(auth.as_key(), "publickey");
    }
}
