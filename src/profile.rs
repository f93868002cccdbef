//! Customer profile resolution from the requesting email address.
//!
//! The email domain decides the customer's organization, documentation
//! role, and support vertical. An unknown domain resolves to the default
//! role with a blank organization, which downstream code treats as
//! "no visibility" rather than "all visibility".

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::config::ProfilesConfig;

/// Resolved identity attributes for one customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerProfile {
    /// Organization used to scope issue-tracker searches. Blank when the
    /// customer is unknown.
    pub organization: String,
    /// Documentation role used to scope knowledge-base searches.
    pub role: String,
    /// Support vertical sheet code (`"HT"`, `"LS"`), when known.
    pub sheet: Option<String>,
}

/// Resolves the customer profile behind a query.
#[async_trait]
pub trait CustomerProfileResolver: Send + Sync {
    /// Look up the profile for an email address. Resolution always
    /// succeeds; unknown customers get the default profile.
    async fn resolve(&self, email: &str) -> CustomerProfile;

    /// Reload the backing mapping, when the implementation has one.
    async fn refresh(&self) -> Result<()>;
}

/// Profile resolver backed by the configured domain table.
pub struct StaticProfileResolver {
    default_role: String,
    domains: RwLock<BTreeMap<String, CustomerProfile>>,
    source: ProfilesConfig,
}

impl StaticProfileResolver {
    pub fn new(config: ProfilesConfig) -> Self {
        Self {
            default_role: config.default_role.clone(),
            domains: RwLock::new(Self::build_table(&config)),
            source: config,
        }
    }

    fn build_table(config: &ProfilesConfig) -> BTreeMap<String, CustomerProfile> {
        config
            .domains
            .iter()
            .map(|(domain, profile)| {
                (
                    domain.to_lowercase(),
                    CustomerProfile {
                        organization: profile.organization.clone(),
                        role: profile.role.clone(),
                        sheet: profile.sheet.clone(),
                    },
                )
            })
            .collect()
    }

    fn default_profile(&self) -> CustomerProfile {
        CustomerProfile {
            organization: String::new(),
            role: self.default_role.clone(),
            sheet: None,
        }
    }
}

#[async_trait]
impl CustomerProfileResolver for StaticProfileResolver {
    async fn resolve(&self, email: &str) -> CustomerProfile {
        let domain = match email.rsplit_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
                domain.trim().to_lowercase()
            }
            _ => {
                debug!(email = %email, "malformed email, using default profile");
                return self.default_profile();
            }
        };

        let table = self.domains.read().unwrap_or_else(|e| e.into_inner());
        match table.get(&domain) {
            Some(profile) => profile.clone(),
            None => {
                debug!(domain = %domain, "unknown domain, using default profile");
                self.default_profile()
            }
        }
    }

    async fn refresh(&self) -> Result<()> {
        let rebuilt = Self::build_table(&self.source);
        *self.domains.write().unwrap_or_else(|e| e.into_inner()) = rebuilt;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DomainProfile;

    fn config() -> ProfilesConfig {
        let mut domains = BTreeMap::new();
        domains.insert(
            "amd.com".to_string(),
            DomainProfile {
                organization: "AMD".to_string(),
                role: "GoS-HT".to_string(),
                sheet: Some("HT".to_string()),
            },
        );
        domains.insert(
            "novartis.com".to_string(),
            DomainProfile {
                organization: "Novartis".to_string(),
                role: "GoS-LS".to_string(),
                sheet: Some("LS".to_string()),
            },
        );
        ProfilesConfig {
            default_role: "customer".to_string(),
            domains,
        }
    }

    #[tokio::test]
    async fn test_known_domain_resolves() {
        let resolver = StaticProfileResolver::new(config());
        let profile = resolver.resolve("alice@amd.com").await;
        assert_eq!(profile.organization, "AMD");
        assert_eq!(profile.role, "GoS-HT");
        assert_eq!(profile.sheet.as_deref(), Some("HT"));
    }

    #[tokio::test]
    async fn test_domain_lookup_is_case_insensitive() {
        let resolver = StaticProfileResolver::new(config());
        let profile = resolver.resolve("bob@Novartis.COM").await;
        assert_eq!(profile.organization, "Novartis");
    }

    #[tokio::test]
    async fn test_unknown_domain_gets_default_profile() {
        let resolver = StaticProfileResolver::new(config());
        let profile = resolver.resolve("eve@unknown.example").await;
        assert_eq!(profile.organization, "");
        assert_eq!(profile.role, "customer");
        assert!(profile.sheet.is_none());
    }

    #[tokio::test]
    async fn test_malformed_email_gets_default_profile() {
        let resolver = StaticProfileResolver::new(config());
        assert_eq!(resolver.resolve("not-an-email").await.role, "customer");
        assert_eq!(resolver.resolve("@amd.com").await.role, "customer");
        assert_eq!(resolver.resolve("alice@").await.role, "customer");
    }

    #[tokio::test]
    async fn test_refresh_is_ok() {
        let resolver = StaticProfileResolver::new(config());
        resolver.refresh().await.unwrap();
        assert_eq!(resolver.resolve("alice@amd.com").await.organization, "AMD");
    }
}
