//! Rule-based classification of catalog records into folders.
//!
//! Rules are evaluated in order and the first match wins, so precedence is
//! exactly the order in the configuration file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::CatalogRecord;

fn default_fallback() -> String {
    "Uncategorized".to_string()
}

/// One pattern-to-category rule
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyRule {
    pub name: String,

    /// Destination folder, relative to the managed tree (`/`-separated)
    pub path: String,

    /// Matches if the record carries at least one of these tags
    #[serde(default)]
    pub any_tags: Vec<String>,

    /// Matches only if the record carries all of these tags
    #[serde(default)]
    pub all_tags: Vec<String>,

    /// Matches if the title contains one of these substrings
    #[serde(default)]
    pub title_contains: Vec<String>,

    /// Extra fields attached to matching records
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl TaxonomyRule {
    /// All non-empty conditions must hold; a rule without conditions never matches
    pub fn matches(&self, record: &CatalogRecord) -> bool {
        if self.any_tags.is_empty() && self.all_tags.is_empty() && self.title_contains.is_empty() {
            return false;
        }

        let has_tag = |wanted: &String| record.tags.iter().any(|t| t.eq_ignore_ascii_case(wanted));
        let title = record.title.to_lowercase();

        (self.any_tags.is_empty() || self.any_tags.iter().any(has_tag))
            && self.all_tags.iter().all(has_tag)
            && (self.title_contains.is_empty()
                || self
                    .title_contains
                    .iter()
                    .any(|needle| title.contains(&needle.to_lowercase())))
    }
}

/// Ordered rule set plus the folder for unmatched records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Taxonomy {
    #[serde(default)]
    pub rules: Vec<TaxonomyRule>,

    #[serde(default = "default_fallback")]
    pub fallback: String,
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            fallback: default_fallback(),
        }
    }
}

/// Where a record belongs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: String,
    pub fields: BTreeMap<String, String>,
}

impl Classification {
    /// Category as a relative directory that cannot leave the tree
    pub fn relative_dir(&self) -> PathBuf {
        self.category
            .split(['/', '\\'])
            .map(str::trim)
            .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
            .map(sanitize_component)
            .collect()
    }
}

impl Taxonomy {
    pub fn classify(&self, record: &CatalogRecord) -> Classification {
        match self.rules.iter().find(|rule| rule.matches(record)) {
            Some(rule) => {
                let mut fields = rule.labels.clone();
                fields.insert("rule".to_string(), rule.name.clone());
                Classification {
                    category: rule.path.clone(),
                    fields,
                }
            }
            None => Classification {
                category: self.fallback.clone(),
                fields: BTreeMap::new(),
            },
        }
    }
}

/// Replace characters that are unsafe in file names
pub fn sanitize_component(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, path: &str) -> TaxonomyRule {
        TaxonomyRule {
            name: name.to_string(),
            path: path.to_string(),
            ..Default::default()
        }
    }

    fn record(title: &str, tags: &[&str]) -> CatalogRecord {
        CatalogRecord::new(title, "https://x/1", "lbry://x#1").with_tags(tags.iter().copied())
    }

    #[test]
    fn test_first_match_wins() {
        let taxonomy = Taxonomy {
            rules: vec![
                TaxonomyRule {
                    any_tags: vec!["bracket".to_string()],
                    ..rule("brackets", "Hardware/Brackets")
                },
                TaxonomyRule {
                    any_tags: vec!["Hardware".to_string()],
                    labels: BTreeMap::from([("kind".to_string(), "generic".to_string())]),
                    ..rule("hardware", "Hardware")
                },
            ],
            fallback: "Other".to_string(),
        };

        let both = taxonomy.classify(&record("Shelf", &["hardware", "bracket"]));
        assert_eq!(both.category, "Hardware/Brackets");
        assert_eq!(both.fields.get("rule").map(String::as_str), Some("brackets"));

        let second = taxonomy.classify(&record("Shelf", &["hardware"]));
        assert_eq!(second.category, "Hardware");
        assert_eq!(second.fields.get("kind").map(String::as_str), Some("generic"));

        let none = taxonomy.classify(&record("Shelf", &["misc"]));
        assert_eq!(none.category, "Other");
        assert!(none.fields.is_empty());
    }

    #[test]
    fn test_conditions_combine() {
        let r = TaxonomyRule {
            all_tags: vec!["a".to_string(), "b".to_string()],
            title_contains: vec!["Clip".to_string()],
            ..rule("combo", "Combo")
        };

        assert!(r.matches(&record("Big clip v2", &["a", "b", "c"])));
        assert!(!r.matches(&record("Big clip v2", &["a"])));
        assert!(!r.matches(&record("Bracket", &["a", "b"])));
    }

    #[test]
    fn test_empty_rule_never_matches() {
        assert!(!rule("empty", "Anything").matches(&record("Shelf", &["x"])));
        assert_eq!(Taxonomy::default().classify(&record("Shelf", &[])).category, "Uncategorized");
    }

    #[test]
    fn test_relative_dir_stays_inside() {
        let c = Classification {
            category: "../Parts/./Trig:gers/".to_string(),
            fields: BTreeMap::new(),
        };
        assert_eq!(c.relative_dir(), PathBuf::from("Parts/Trig_gers"));
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component(r#"a<b>c:"d|e?f*g"#), "a_b_c__d_e_f_g");
    }
}
