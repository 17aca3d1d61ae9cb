//! Per-service credential issuance
//!
//! A composition that hands every consumer the database root credential
//! gives all of them root-equivalent access. Issuance happens once at
//! stack startup instead: each service receives its own username, a
//! generated password, and a role no broader than it needs. Only the
//! database service itself sees the root bootstrap credential.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const PASSWORD_LEN: usize = 24;
const PASSWORD_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Access role granted to a service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read-only access
    Read,
    /// Read and write access
    #[default]
    ReadWrite,
    /// Administrative access
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Read => write!(f, "read"),
            Role::ReadWrite => write!(f, "readwrite"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = crate::error::BerthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Role::Read),
            "readwrite" => Ok(Role::ReadWrite),
            "admin" => Ok(Role::Admin),
            other => Err(crate::error::BerthError::InvalidConfig(format!(
                "Unknown role: {}",
                other
            ))),
        }
    }
}

/// A credential scoped to one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedCredential {
    /// Username, derived from project and service name
    pub username: String,
    /// Generated password
    pub password: String,
    /// Granted role
    pub role: Role,
}

impl ScopedCredential {
    /// Environment variables injected into the consuming service
    pub fn to_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("DB_USERNAME".to_string(), self.username.clone());
        env.insert("DB_PASSWORD".to_string(), self.password.clone());
        env.insert("DB_ROLE".to_string(), self.role.to_string());
        env
    }
}

impl std::fmt::Display for ScopedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, password <redacted>)", self.username, self.role)
    }
}

/// Issues scoped credentials for the services of one stack
pub struct CredentialIssuer {
    /// Project name, used as the username prefix
    project: String,
    /// Credentials issued so far, by service name
    issued: HashMap<String, ScopedCredential>,
}

impl CredentialIssuer {
    /// Create a new issuer for a project
    pub fn new(project: &str) -> Self {
        Self {
            project: project.to_string(),
            issued: HashMap::new(),
        }
    }

    /// Issue a credential for a service, or return the one already issued
    pub fn issue(&mut self, service: &str, role: Role) -> ScopedCredential {
        if let Some(existing) = self.issued.get(service) {
            return existing.clone();
        }

        let credential = ScopedCredential {
            username: format!("{}-{}", self.project, service),
            password: generate_password(),
            role,
        };

        self.issued.insert(service.to_string(), credential.clone());
        credential
    }

    /// Look up a previously issued credential
    pub fn get(&self, service: &str) -> Option<&ScopedCredential> {
        self.issued.get(service)
    }
}

/// Generate a random password
fn generate_password() -> String {
    let mut rng = rand::thread_rng();
    (0..PASSWORD_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..PASSWORD_CHARSET.len());
            PASSWORD_CHARSET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_is_scoped_per_service() {
        let mut issuer = CredentialIssuer::new("demo");

        let web = issuer.issue("web", Role::ReadWrite);
        let worker = issuer.issue("worker", Role::ReadWrite);

        assert_eq!(web.username, "demo-web");
        assert_eq!(worker.username, "demo-worker");
        assert_ne!(web.password, worker.password);
    }

    #[test]
    fn test_issue_is_idempotent() {
        let mut issuer = CredentialIssuer::new("demo");

        let first = issuer.issue("web", Role::ReadWrite);
        let second = issuer.issue("web", Role::ReadWrite);

        assert_eq!(first, second);
    }

    #[test]
    fn test_display_redacts_password() {
        let mut issuer = CredentialIssuer::new("demo");
        let cred = issuer.issue("admin", Role::Admin);

        let shown = cred.to_string();
        assert!(!shown.contains(&cred.password));
        assert!(shown.contains("demo-admin"));
    }

    #[test]
    fn test_env_injection() {
        let mut issuer = CredentialIssuer::new("demo");
        let cred = issuer.issue("web", Role::Read);
        let env = cred.to_env();

        assert_eq!(env.get("DB_USERNAME"), Some(&cred.username));
        assert_eq!(env.get("DB_ROLE").map(String::as_str), Some("read"));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
    }
}
