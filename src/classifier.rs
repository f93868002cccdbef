//! Ticket category classification for unanswered queries.
//!
//! Precedence is an explicit ordered rule list, first match wins:
//! NOC keywords → COPS keywords → CSP keywords → customer-profile sheet
//! (HT → MNHT, LS → MNLS) → default (MNHT). Matching is case-insensitive
//! substring matching against each rule's curated keyword set.
//!
//! Beyond the category, the classifier extracts priority, affected area,
//! and environment from the query text so the ticket sink can auto-populate
//! those fields. Everything here is deterministic: identical
//! (query, profile) input always produces identical output.

use std::collections::BTreeMap;

use crate::models::Query;
use crate::profile::CustomerProfile;

/// Support queue a ticket is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketCategory {
    /// Network operations: outages, infrastructure, monitoring access.
    Noc,
    /// Cloud operations: refreshes, provisioning, backups.
    Cops,
    /// Customer security/provisioning: account and access management.
    Csp,
    /// Product support, Hi-Tech vertical.
    Mnht,
    /// Product support, Life Sciences vertical.
    Mnls,
}

impl TicketCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketCategory::Noc => "NOC",
            TicketCategory::Cops => "COPS",
            TicketCategory::Csp => "CSP",
            TicketCategory::Mnht => "MNHT",
            TicketCategory::Mnls => "MNLS",
        }
    }
}

impl std::fmt::Display for TicketCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the ordered classification rule list.
#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub category: TicketCategory,
    pub keywords: &'static [&'static str],
}

/// Keyword tiers checked in order. NOC outranks COPS outranks CSP.
const RULES: &[CategoryRule] = &[
    CategoryRule {
        category: TicketCategory::Noc,
        keywords: &[
            "outage",
            "network",
            "monitoring dashboard",
            "server down",
            "vpn",
            "dns",
            "firewall",
            "infrastructure",
            "database password",
            "connectivity",
        ],
    },
    CategoryRule {
        category: TicketCategory::Cops,
        keywords: &[
            "database refresh",
            "environment refresh",
            "cloud operations",
            "provisioning",
            "backup",
            "restore",
            "deployment failed",
            "cloud environment",
        ],
    },
    CategoryRule {
        category: TicketCategory::Csp,
        keywords: &[
            "revoke access",
            "terminated employee",
            "account creation",
            "deactivate user",
            "user provisioning",
            "offboarding",
            "onboarding request",
        ],
    },
];

const DEFAULT_CATEGORY: TicketCategory = TicketCategory::Mnht;

/// Classification output: category plus its field plan.
#[derive(Debug, Clone)]
pub struct Classification {
    pub category: TicketCategory,
    /// Keyword that decided the category, when a keyword tier matched.
    pub matched_keyword: Option<String>,
    /// Fields the customer must still provide: name → description.
    pub required_fields: BTreeMap<String, String>,
    /// Fields filled in from the profile and query: name → value.
    pub auto_populated: BTreeMap<String, String>,
}

/// Maps unanswered queries to a ticket category and field plan.
pub struct TicketCategoryClassifier {
    rules: Vec<CategoryRule>,
}

impl TicketCategoryClassifier {
    pub fn new() -> Self {
        Self {
            rules: RULES.to_vec(),
        }
    }

    pub fn classify(&self, query: &Query, profile: &CustomerProfile) -> Classification {
        let query_lower = query.text.to_lowercase();

        let mut category = None;
        let mut matched_keyword = None;
        for rule in &self.rules {
            // Longest keyword in the winning tier is reported as the match.
            if let Some(best) = rule
                .keywords
                .iter()
                .filter(|k| query_lower.contains(&k.to_lowercase()))
                .max_by_key(|k| k.len())
            {
                category = Some(rule.category);
                matched_keyword = Some(best.to_string());
                break;
            }
        }

        let category = category.unwrap_or_else(|| match profile.sheet.as_deref() {
            Some("HT") => TicketCategory::Mnht,
            Some("LS") => TicketCategory::Mnls,
            _ => DEFAULT_CATEGORY,
        });

        let auto_populated = self.auto_populate(category, query, profile);
        let required_fields = field_schema(category)
            .into_iter()
            .filter(|(name, _)| !auto_populated.contains_key(name.as_str()))
            .collect();

        Classification {
            category,
            matched_keyword,
            required_fields,
            auto_populated,
        }
    }

    fn auto_populate(
        &self,
        category: TicketCategory,
        query: &Query,
        profile: &CustomerProfile,
    ) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();

        let summary: String = query.text.chars().take(80).collect();
        fields.insert("summary".to_string(), format!("Support Request: {}", summary));
        fields.insert(
            "customer".to_string(),
            if profile.organization.is_empty() {
                "UNKNOWN".to_string()
            } else {
                profile.organization.clone()
            },
        );
        fields.insert("priority".to_string(), detect_priority(&query.text).to_string());
        fields.insert("environment".to_string(), detect_environment(&query.text).to_string());
        if let Some(area) = detect_area(&query.text) {
            fields.insert("area".to_string(), area.to_string());
        }

        match category {
            TicketCategory::Noc => {
                fields.insert("support_org".to_string(), "Network Operations".to_string());
            }
            TicketCategory::Cops => {
                fields.insert("work_type".to_string(), "Cloud Operations".to_string());
                fields.insert(
                    "request_type".to_string(),
                    "Cloud Operations Request".to_string(),
                );
            }
            TicketCategory::Csp => {
                fields.insert("work_type".to_string(), "Access Management".to_string());
            }
            TicketCategory::Mnht => {
                fields.insert("project".to_string(), "Hi-Tech Support".to_string());
            }
            TicketCategory::Mnls => {
                fields.insert("project".to_string(), "Life Sciences Support".to_string());
            }
        }

        fields
    }
}

impl Default for TicketCategoryClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Required-field schema per category: name → description.
pub fn field_schema(category: TicketCategory) -> BTreeMap<String, String> {
    let fields: &[(&str, &str)] = match category {
        TicketCategory::Noc => &[("description", "Describe the network or infrastructure issue")],
        TicketCategory::Cops => &[
            ("description", "Describe the cloud operations request"),
            ("environment", "Which environment is affected"),
        ],
        TicketCategory::Csp => &[
            ("description", "Describe the access change needed"),
            ("affected_user", "User the access change applies to"),
        ],
        TicketCategory::Mnht | TicketCategory::Mnls => &[
            ("description", "Describe the product issue"),
            ("area", "Area or component affected"),
            ("affected_version", "Product version the issue occurs on"),
        ],
    };
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Priority keywords, checked from most to least severe.
fn detect_priority(query: &str) -> &'static str {
    let q = query.to_lowercase();
    const CRITICAL: &[&str] = &[
        "down",
        "outage",
        "crashed",
        "not working",
        "system failure",
        "production down",
        "emergency",
        "critical",
    ];
    const HIGH: &[&str] = &[
        "blocking",
        "urgent",
        "deadline",
        "asap",
        "high priority",
        "stuck",
        "cannot proceed",
    ];
    const LOW: &[&str] = &[
        "question",
        "enhancement",
        "suggestion",
        "improvement",
        "how to",
        "can you",
    ];

    if CRITICAL.iter().any(|k| q.contains(k)) {
        "Critical"
    } else if HIGH.iter().any(|k| q.contains(k)) {
        "High"
    } else if LOW.iter().any(|k| q.contains(k)) {
        "Low"
    } else {
        "Medium"
    }
}

/// Affected-area keywords; first matching area wins.
fn detect_area(query: &str) -> Option<&'static str> {
    let q = query.to_lowercase();
    const AREAS: &[(&str, &[&str])] = &[
        ("Access", &["login", "password", "authentication", "sign in", "permissions"]),
        ("Database", &["database", "sql", "query", "table", "connection"]),
        ("Network", &["network", "connectivity", "latency", "timeout"]),
        ("API", &["api", "endpoint", "rest", "webhook", "integration"]),
        ("Performance", &["slow", "performance", "lag", "hanging"]),
        ("Deployment", &["deployment", "deploy", "release", "build"]),
        ("Application", &["application", "interface", "screen", "ui"]),
    ];
    AREAS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| q.contains(k)))
        .map(|(area, _)| *area)
}

fn detect_environment(query: &str) -> &'static str {
    let q = query.to_lowercase();
    if ["staging", "stage environment", "test environment"]
        .iter()
        .any(|k| q.contains(k))
    {
        "staging"
    } else if ["development", "dev environment", "sandbox"]
        .iter()
        .any(|k| q.contains(k))
    {
        "development"
    } else {
        "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::CustomerProfile;

    fn query(text: &str) -> Query {
        Query {
            text: text.to_string(),
            customer_email: "user@amd.com".to_string(),
            organization: "AMD".to_string(),
            role: "GoS-HT".to_string(),
            session_id: "s-1".to_string(),
        }
    }

    fn ht_profile() -> CustomerProfile {
        CustomerProfile {
            organization: "AMD".to_string(),
            role: "GoS-HT".to_string(),
            sheet: Some("HT".to_string()),
        }
    }

    fn ls_profile() -> CustomerProfile {
        CustomerProfile {
            organization: "Novartis".to_string(),
            role: "GoS-LS".to_string(),
            sheet: Some("LS".to_string()),
        }
    }

    #[test]
    fn test_noc_keywords_take_precedence() {
        let classifier = TicketCategoryClassifier::new();
        let c = classifier.classify(
            &query("Need access to monitoring dashboard for server outage investigation"),
            &ht_profile(),
        );
        assert_eq!(c.category, TicketCategory::Noc);
        assert_eq!(c.matched_keyword.as_deref(), Some("monitoring dashboard"));
    }

    #[test]
    fn test_cops_keywords() {
        let classifier = TicketCategoryClassifier::new();
        let c = classifier.classify(
            &query("Database refresh is failing in production environment"),
            &ht_profile(),
        );
        assert_eq!(c.category, TicketCategory::Cops);
    }

    #[test]
    fn test_csp_keywords() {
        let classifier = TicketCategoryClassifier::new();
        let c = classifier.classify(
            &query("Please revoke access for terminated employee John Smith"),
            &ht_profile(),
        );
        assert_eq!(c.category, TicketCategory::Csp);
    }

    #[test]
    fn test_profile_sheet_fallback() {
        let classifier = TicketCategoryClassifier::new();
        let c = classifier.classify(
            &query("How to configure user roles in version 2.3"),
            &ls_profile(),
        );
        assert_eq!(c.category, TicketCategory::Mnls);
        assert!(c.matched_keyword.is_none());

        let c = classifier.classify(
            &query("Application misbehaves when importing data files"),
            &ht_profile(),
        );
        assert_eq!(c.category, TicketCategory::Mnht);
    }

    #[test]
    fn test_default_category_for_unknown_profile() {
        let classifier = TicketCategoryClassifier::new();
        let profile = CustomerProfile {
            organization: String::new(),
            role: "customer".to_string(),
            sheet: None,
        };
        let c = classifier.classify(&query("something entirely unmatched"), &profile);
        assert_eq!(c.category, TicketCategory::Mnht);
        assert_eq!(c.auto_populated["customer"], "UNKNOWN");
    }

    #[test]
    fn test_deterministic() {
        let classifier = TicketCategoryClassifier::new();
        let q = query("Database refresh failing in staging, urgent");
        let a = classifier.classify(&q, &ht_profile());
        let b = classifier.classify(&q, &ht_profile());
        assert_eq!(a.category, b.category);
        assert_eq!(a.required_fields, b.required_fields);
        assert_eq!(a.auto_populated, b.auto_populated);
    }

    #[test]
    fn test_required_fields_exclude_auto_populated() {
        let classifier = TicketCategoryClassifier::new();
        // "production environment" auto-populates the environment field,
        // so COPS only still requires the description.
        let c = classifier.classify(
            &query("Database refresh failing in production environment"),
            &ht_profile(),
        );
        assert!(c.auto_populated.contains_key("environment"));
        assert!(!c.required_fields.contains_key("environment"));
        assert!(c.required_fields.contains_key("description"));
    }

    #[test]
    fn test_priority_detection() {
        assert_eq!(detect_priority("production down, emergency"), "Critical");
        assert_eq!(detect_priority("this is urgent, blocking our team"), "High");
        assert_eq!(detect_priority("question: how to export reports"), "Low");
        assert_eq!(detect_priority("strange behaviour on save"), "Medium");
    }

    #[test]
    fn test_area_and_environment_detection() {
        assert_eq!(detect_area("cannot login after password change"), Some("Access"));
        assert_eq!(detect_area("totally unrelated"), None);
        assert_eq!(detect_environment("fails in staging"), "staging");
        assert_eq!(detect_environment("fails in the dev environment"), "development");
        assert_eq!(detect_environment("fails for everyone"), "production");
    }
}
