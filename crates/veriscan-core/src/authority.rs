//! Domain authority lookup.
//!
//! Every source gets an authority weight in [0, 1]: an explicit override,
//! the verified weight for allowlisted domains, or the default. Lookups
//! walk up parent domains, so `factcheck.afp.com` inherits from `afp.com`.

use std::collections::{HashMap, HashSet};
use std::fs;

use crate::config::{AuthorityConfig, ConfigError};
use crate::evidence::normalize_domain;

/// Authority assigned to one source domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceTier {
    pub authority: f64,
    pub is_verified: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthorityTable {
    default_authority: f64,
    verified_authority: f64,
    verified: HashSet<String>,
    overrides: HashMap<String, f64>,
}

impl Default for AuthorityTable {
    fn default() -> Self {
        Self::new(0.8, 1.0)
    }
}

impl AuthorityTable {
    pub fn new(default_authority: f64, verified_authority: f64) -> Self {
        Self {
            default_authority,
            verified_authority,
            verified: HashSet::new(),
            overrides: HashMap::new(),
        }
    }

    /// Build from config, reading `verified_domains_file` if set.
    pub fn from_config(config: &AuthorityConfig) -> Result<Self, ConfigError> {
        let mut table = Self::new(config.default_authority, config.verified_authority)
            .with_verified(config.verified_domains.iter().map(String::as_str));

        if let Some(path) = &config.verified_domains_file {
            let content = fs::read_to_string(path)?;
            let domains: Vec<String> = serde_json::from_str(&content)?;
            table = table.with_verified(domains.iter().map(String::as_str));
        }

        for (domain, authority) in &config.overrides {
            table = table.with_override(domain, *authority);
        }

        Ok(table)
    }

    pub fn with_verified<'a>(mut self, domains: impl IntoIterator<Item = &'a str>) -> Self {
        self.verified.extend(
            domains
                .into_iter()
                .map(normalize_domain)
                .filter(|d| !d.is_empty()),
        );
        self
    }

    pub fn with_override(mut self, domain: &str, authority: f64) -> Self {
        let domain = normalize_domain(domain);
        if !domain.is_empty() {
            self.overrides.insert(domain, authority.clamp(0.0, 1.0));
        }
        self
    }

    pub fn verified_count(&self) -> usize {
        self.verified.len()
    }

    /// Tier for a normalized domain.
    pub fn lookup(&self, domain: &str) -> SourceTier {
        let is_verified = self.find(domain, |d| self.verified.contains(d)).is_some();
        let authority = self
            .find(domain, |d| self.overrides.contains_key(d))
            .and_then(|d| self.overrides.get(d).copied())
            .unwrap_or(if is_verified {
                self.verified_authority
            } else {
                self.default_authority
            });

        SourceTier {
            authority,
            is_verified,
        }
    }

    /// Most specific suffix of `domain` accepted by `hit`.
    fn find<'d>(&self, domain: &'d str, hit: impl Fn(&str) -> bool) -> Option<&'d str> {
        let mut current = domain;
        loop {
            if current.is_empty() {
                return None;
            }
            if hit(current) {
                return Some(current);
            }
            match current.split_once('.') {
                Some((_, parent)) if parent.contains('.') => current = parent,
                _ => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_authority() {
        let table = AuthorityTable::default();
        let tier = table.lookup("randomblog.net");
        assert_eq!(tier.authority, 0.8);
        assert!(!tier.is_verified);
    }

    #[test]
    fn test_verified_and_subdomain() {
        let table = AuthorityTable::default().with_verified(["www.afp.com", "nasa.gov"]);

        assert_eq!(table.verified_count(), 2);
        assert!(table.lookup("afp.com").is_verified);
        assert_eq!(table.lookup("factcheck.afp.com").authority, 1.0);
        assert!(!table.lookup("notafp.com").is_verified);
    }

    #[test]
    fn test_parent_stops_at_registrable_level() {
        let table = AuthorityTable::default().with_verified(["com"]);
        assert!(!table.lookup("example.com").is_verified);
    }

    #[test]
    fn test_override_wins() {
        let table = AuthorityTable::default()
            .with_verified(["wikipedia.org"])
            .with_override("wikipedia.org", 0.6);

        let tier = table.lookup("en.wikipedia.org");
        assert_eq!(tier.authority, 0.6);
        assert!(tier.is_verified);
    }

    #[test]
    fn test_from_config_with_file() {
        let path = std::env::temp_dir().join(format!(
            "veriscan-verified-{}.json",
            std::process::id()
        ));
        fs::write(&path, r#"["reuters.com", "apnews.com"]"#).unwrap();

        let config = AuthorityConfig {
            verified_domains_file: Some(path.clone()),
            ..AuthorityConfig::default()
        };
        let table = AuthorityTable::from_config(&config).unwrap();
        fs::remove_file(&path).ok();

        assert!(table.lookup("apnews.com").is_verified);
    }

    #[test]
    fn test_missing_file_is_error() {
        let config = AuthorityConfig {
            verified_domains_file: Some("/nonexistent/veriscan/domains.json".into()),
            ..AuthorityConfig::default()
        };
        assert!(matches!(
            AuthorityTable::from_config(&config),
            Err(ConfigError::IoError(_))
        ));
    }
}
