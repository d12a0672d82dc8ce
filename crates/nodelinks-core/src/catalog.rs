//! Registry catalog: the ordered list of known npm mirrors and input resolution against it.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error_handling::utils::config_error;
use crate::error_handling::Result;
use crate::store::JsonDocument;
use crate::utils;

/// One catalog entry. An empty `value` is the user-custom slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mirror {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub alias: Vec<String>,
}

impl Mirror {
    pub fn new(name: &str, value: &str, alias: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            alias: alias.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn is_custom(&self) -> bool {
        self.value.is_empty()
    }
}

/// Result of resolving user input against the catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolved {
    All,
    Custom,
    Address(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Catalog {
    mirrors: Vec<Mirror>,
}

impl Catalog {
    /// Build a catalog; aliases are lowercased and must be unique across entries.
    pub fn new(mirrors: Vec<Mirror>) -> Result<Self> {
        if mirrors.is_empty() {
            return Err(config_error("load catalog", None, "catalog has no entries"));
        }
        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(mirrors.len());
        for mut m in mirrors {
            m.alias = m.alias.iter().map(|a| a.trim().to_lowercase()).collect();
            m.alias.retain(|a| !a.is_empty());
            m.alias.sort();
            m.alias.dedup();
            for a in &m.alias {
                if !seen.insert(a.clone()) {
                    return Err(config_error(
                        "load catalog",
                        Some("alias"),
                        format!("alias \"{}\" is used by more than one mirror", a),
                    ));
                }
            }
            normalized.push(m);
        }
        Ok(Self { mirrors: normalized })
    }

    pub fn default_mirrors() -> Vec<Mirror> {
        vec![
            Mirror::new("npmmirror (Taobao)", "registry.npmmirror.com", &["npmmirror", "taobao"]),
            Mirror::new("npm official", "registry.npmjs.org", &["npmjs", "official"]),
            Mirror::new("Tencent Cloud", "mirrors.cloud.tencent.com/npm/", &["tencent"]),
            Mirror::new("Huawei Cloud", "mirrors.huaweicloud.com/repository/npm/", &["huawei"]),
            Mirror::new("Custom address", "", &["custom"]),
        ]
    }

    /// Load repos.json from the tool home, generating the default catalog when absent.
    pub async fn load_or_init(home: &Path) -> Result<Self> {
        let doc = JsonDocument::new(utils::catalog_path(home));
        match doc.read::<Vec<Mirror>>().await? {
            Some(mirrors) => Self::new(mirrors),
            None => {
                let mirrors = Self::default_mirrors();
                doc.write(&mirrors).await?;
                utils::log(&format!(
                    "Initialized {} with the default mirror list",
                    doc.path().display()
                ));
                Self::new(mirrors)
            }
        }
    }

    pub fn mirrors(&self) -> &[Mirror] {
        &self.mirrors
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    /// First entry's address; the default registry.
    pub fn default_address(&self) -> &str {
        &self.mirrors[0].value
    }

    pub fn custom_entry(&self) -> Option<&Mirror> {
        self.mirrors.iter().find(|m| m.is_custom())
    }

    /// Entries with a non-empty address, in catalog order.
    pub fn probe_targets(&self) -> impl Iterator<Item = &Mirror> {
        self.mirrors.iter().filter(|m| !m.is_custom())
    }

    /// 1-based catalog position of an address.
    pub fn index_of(&self, address: &str) -> Option<usize> {
        self.mirrors
            .iter()
            .position(|m| !m.is_custom() && m.value == address)
            .map(|i| i + 1)
    }

    fn by_alias(&self, input: &str) -> Option<&Mirror> {
        let needle = input.to_lowercase();
        self.mirrors.iter().find(|m| m.alias.iter().any(|a| *a == needle))
    }

    /// Resolve raw user input. First match wins; never fails.
    pub fn resolve_input(&self, raw: &str) -> Resolved {
        let input = raw.trim();
        if input.is_empty() || input.eq_ignore_ascii_case("all") {
            return Resolved::All;
        }
        if let Ok(n) = input.parse::<usize>() {
            if n >= 1 && n <= self.mirrors.len() {
                let m = &self.mirrors[n - 1];
                return if m.is_custom() {
                    Resolved::Custom
                } else {
                    Resolved::Address(m.value.clone())
                };
            }
        }
        if let Some(m) = self.by_alias(input) {
            return if m.is_custom() {
                Resolved::Custom
            } else {
                Resolved::Address(m.value.clone())
            };
        }
        // Exact catalog address, literal URL / host, or unrecognized: all pass through unchanged.
        Resolved::Address(input.to_string())
    }

    /// Canonical stored form of a registry value: aliases resolve to their address,
    /// everything else is kept verbatim. Empty input falls back to the default entry.
    pub fn normalize_registry(&self, input: &str) -> String {
        let input = input.trim();
        if input.is_empty() {
            return self.default_address().to_string();
        }
        match self.by_alias(input) {
            Some(m) if !m.is_custom() => m.value.clone(),
            _ => input.to_string(),
        }
    }
}

/// Looks like a host or URL rather than a bare word.
pub fn looks_like_address(input: &str) -> bool {
    input.contains("://") || input.contains('.') || input.contains(':')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Catalog {
        Catalog::new(Catalog::default_mirrors()).unwrap()
    }

    #[test]
    fn test_every_index_resolves_to_its_entry() {
        let c = catalog();
        for (i, m) in c.mirrors().iter().enumerate() {
            let got = c.resolve_input(&(i + 1).to_string());
            if m.is_custom() {
                assert_eq!(got, Resolved::Custom);
            } else {
                assert_eq!(got, Resolved::Address(m.value.clone()));
            }
        }
    }

    #[test]
    fn test_aliases_are_case_insensitive() {
        let c = catalog();
        for m in c.mirrors().iter().filter(|m| !m.is_custom()) {
            for a in &m.alias {
                assert_eq!(c.resolve_input(a), Resolved::Address(m.value.clone()));
                assert_eq!(c.resolve_input(&a.to_uppercase()), Resolved::Address(m.value.clone()));
            }
        }
        assert_eq!(c.resolve_input("CUSTOM"), Resolved::Custom);
    }

    #[test]
    fn test_all_and_empty_are_sentinels() {
        let c = catalog();
        assert_eq!(c.resolve_input(""), Resolved::All);
        assert_eq!(c.resolve_input("all"), Resolved::All);
        assert_eq!(c.resolve_input("ALL"), Resolved::All);
    }

    #[test]
    fn test_tencent_by_index_and_alias() {
        let c = Catalog::new(vec![
            Mirror::new("A", "m1.example", &["a"]),
            Mirror::new("Tencent", "mirrors.cloud.tencent.com/npm/", &["tencent"]),
            Mirror::new("Custom", "", &["custom"]),
        ])
        .unwrap();
        let expected = Resolved::Address("mirrors.cloud.tencent.com/npm/".to_string());
        assert_eq!(c.resolve_input("2"), expected);
        assert_eq!(c.resolve_input("tencent"), expected);
        assert_eq!(c.resolve_input("TENCENT"), expected);
        assert_eq!(c.resolve_input("3"), Resolved::Custom);
    }

    #[test]
    fn test_passthrough_inputs() {
        let c = catalog();
        assert_eq!(
            c.resolve_input("registry.npmjs.org"),
            Resolved::Address("registry.npmjs.org".to_string())
        );
        assert_eq!(
            c.resolve_input("https://registry.example.com"),
            Resolved::Address("https://registry.example.com".to_string())
        );
        assert_eq!(c.resolve_input("42"), Resolved::Address("42".to_string()));
        assert_eq!(c.resolve_input("0"), Resolved::Address("0".to_string()));
        assert_eq!(c.resolve_input("whatever"), Resolved::Address("whatever".to_string()));
        assert!(looks_like_address("localhost:4873"));
        assert!(!looks_like_address("whatever"));
    }

    #[test]
    fn test_normalize_registry() {
        let c = catalog();
        assert_eq!(c.normalize_registry("TAOBAO"), "registry.npmmirror.com");
        assert_eq!(c.normalize_registry(""), "registry.npmmirror.com");
        assert_eq!(c.normalize_registry("custom"), "custom");
        assert_eq!(
            c.normalize_registry("https://npm.internal:8443/"),
            "https://npm.internal:8443/"
        );
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let err = Catalog::new(vec![
            Mirror::new("A", "a.example", &["dup"]),
            Mirror::new("B", "b.example", &["DUP"]),
        ])
        .unwrap_err();
        assert!(format!("{}", err).contains("dup"));
        assert!(Catalog::new(Vec::new()).is_err());
    }

    #[tokio::test]
    async fn test_load_or_init_generates_default_catalog() {
        let td = tempfile::tempdir().unwrap();
        let c = Catalog::load_or_init(td.path()).await.unwrap();
        assert_eq!(c.len(), 5);
        assert!(td.path().join("repos.json").exists());
        assert_eq!(c.index_of("registry.npmjs.org"), Some(2));
        assert_eq!(c.probe_targets().count(), 4);

        std::fs::write(
            td.path().join("repos.json"),
            r#"[{"name":"Only","value":"only.example","alias":["Only"]}]"#,
        )
        .unwrap();
        let c = Catalog::load_or_init(td.path()).await.unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c.resolve_input("only"), Resolved::Address("only.example".to_string()));
        assert!(c.custom_entry().is_none());
    }
}
