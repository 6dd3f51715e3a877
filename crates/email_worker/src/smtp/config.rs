use std::time::Duration;

/// SMTP settings. Host, username and password must all be present for the
/// transport to count as configured.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    /// Connect and per-command timeout
    pub timeout: Duration,
}

impl SmtpConfig {
    pub fn is_configured(&self) -> bool {
        [&self.host, &self.username, &self.password]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }

    /// Port 465 speaks implicit TLS; everything else upgrades with STARTTLS
    pub fn implicit_tls(&self) -> bool {
        self.port == 465
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 587,
            username: None,
            password: None,
            from: "no-reply@voltwatch.local".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}
