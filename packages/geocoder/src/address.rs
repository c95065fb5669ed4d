//! Address normalization and deduplication.
//!
//! HDB publishes addresses as a block number plus an abbreviated street
//! name (`"10"`, `"ANCHORVALE ST"`). OneMap is queried with the two
//! joined by a space and every space written as `%20`. A curated table
//! then patches spellings the geocoder cannot resolve, sometimes by
//! swapping the whole address for its postal code.
//!
//! Queries on the exclusion list keep their transactions but are never
//! geocoded, so those transactions surface with empty enrichment.

use std::collections::BTreeSet;
use std::path::Path;

use hdb_resale_transaction_models::{KeyedTransaction, Transaction, UniqueAddress};
use regex::Regex;
use serde::Deserialize;

use crate::GeocodeError;

const EMBEDDED_RULES: &str = include_str!("../rules/address_corrections.toml");

#[derive(Debug, Deserialize)]
struct RulesFile {
    #[serde(default)]
    excluded: Vec<String>,
    #[serde(default)]
    correction: Vec<CorrectionEntry>,
}

#[derive(Debug, Deserialize)]
struct CorrectionEntry {
    pattern: String,
    replacement: String,
}

/// A single regex substitution.
#[derive(Debug, Clone)]
struct CorrectionRule {
    pattern: Regex,
    replacement: String,
}

impl CorrectionRule {
    /// Replaces every match of the pattern with the literal replacement.
    ///
    /// A match position where the haystack already starts with the
    /// replacement is left alone, so expansions such as
    /// `52%20KENT%20RD` -> `52%20KENT%20RD%20KENT%20VILLE` do not grow on
    /// a second pass.
    fn apply(&self, haystack: &str) -> String {
        let mut out = String::with_capacity(haystack.len());
        let mut last = 0;

        for m in self.pattern.find_iter(haystack) {
            if haystack[m.start()..].starts_with(&self.replacement) {
                continue;
            }
            out.push_str(&haystack[last..m.start()]);
            out.push_str(&self.replacement);
            last = m.end();
        }

        out.push_str(&haystack[last..]);
        out
    }
}

/// The correction table and exclusion set.
#[derive(Debug, Clone)]
pub struct AddressRules {
    corrections: Vec<CorrectionRule>,
    excluded: BTreeSet<String>,
}

/// A normalized query for one block + street pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuery {
    /// Corrected, `%20`-encoded query string.
    pub query: String,
    /// Whether the query is on the exclusion list.
    pub excluded: bool,
}

impl AddressRules {
    /// Returns the rules compiled into the binary.
    ///
    /// # Panics
    ///
    /// Panics if the embedded table is malformed. It is compiled in, so
    /// this is caught by the tests below.
    #[must_use]
    pub fn embedded() -> Self {
        Self::from_toml_str(EMBEDDED_RULES)
            .unwrap_or_else(|e| panic!("Failed to parse embedded address corrections: {e}"))
    }

    /// Loads a replacement rule table from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the file cannot be read or is invalid.
    pub fn load(path: &Path) -> Result<Self, GeocodeError> {
        let content = std::fs::read_to_string(path)?;
        let rules = Self::from_toml_str(&content)?;
        log::info!(
            "Loaded {} address corrections and {} exclusions from {}",
            rules.corrections.len(),
            rules.excluded.len(),
            path.display()
        );
        Ok(rules)
    }

    /// Parses a rule table.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Rules`] on invalid TOML, an empty pattern,
    /// a pattern that is not a valid regex, or one that matches empty text.
    pub fn from_toml_str(content: &str) -> Result<Self, GeocodeError> {
        let file: RulesFile = toml::de::from_str(content).map_err(|e| GeocodeError::Rules {
            message: e.to_string(),
        })?;

        let corrections = file
            .correction
            .into_iter()
            .map(|entry| {
                if entry.pattern.is_empty() {
                    return Err(GeocodeError::Rules {
                        message: "empty correction pattern".to_string(),
                    });
                }
                let pattern = Regex::new(&entry.pattern).map_err(|e| GeocodeError::Rules {
                    message: format!("bad correction pattern '{}': {e}", entry.pattern),
                })?;
                if pattern.is_match("") {
                    return Err(GeocodeError::Rules {
                        message: format!("correction pattern '{}' matches empty text", entry.pattern),
                    });
                }
                Ok(CorrectionRule {
                    pattern,
                    replacement: entry.replacement,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            corrections,
            excluded: file.excluded.into_iter().collect(),
        })
    }

    /// Applies every correction, in table order, to an encoded query.
    #[must_use]
    pub fn correct(&self, query: &str) -> String {
        self.corrections
            .iter()
            .fold(query.to_string(), |acc, rule| rule.apply(&acc))
    }

    /// Whether `query` (already corrected) is on the exclusion list.
    #[must_use]
    pub fn is_excluded(&self, query: &str) -> bool {
        self.excluded.contains(query)
    }

    /// Builds the final query for a block + street pair.
    #[must_use]
    pub fn normalize(&self, block: &str, street: &str) -> NormalizedQuery {
        let query = self.correct(&encode_query(block, street));
        let excluded = self.is_excluded(&query);
        NormalizedQuery { query, excluded }
    }
}

/// Joins block and street with a space and writes every space as `%20`.
#[must_use]
pub fn encode_query(block: &str, street: &str) -> String {
    format!("{block} {street}").replace(' ', "%20")
}

/// Attaches a normalized query string to every transaction.
///
/// No transaction is dropped; excluded queries are only flagged.
#[must_use]
pub fn key_transactions(
    rules: &AddressRules,
    transactions: Vec<Transaction>,
) -> Vec<KeyedTransaction> {
    let keyed: Vec<KeyedTransaction> = transactions
        .into_iter()
        .map(|transaction| {
            let NormalizedQuery { query, excluded } =
                rules.normalize(&transaction.block, &transaction.street);
            KeyedTransaction {
                transaction,
                query,
                excluded,
            }
        })
        .collect();

    let excluded = keyed.iter().filter(|t| t.excluded).count();
    if excluded > 0 {
        log::info!("{excluded} transactions carry an excluded address and will not be geocoded");
    }

    keyed
}

/// Reduces keyed transactions to one [`UniqueAddress`] per distinct,
/// non-excluded query string, numbered from 1 in order of first
/// appearance.
#[must_use]
pub fn unique_addresses(transactions: &[KeyedTransaction]) -> Vec<UniqueAddress> {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut unique = Vec::new();

    for t in transactions {
        if t.excluded || !seen.insert(t.query.as_str()) {
            continue;
        }
        unique.push(UniqueAddress {
            id: unique.len() as u64 + 1,
            block: t.transaction.block.clone(),
            street: t.transaction.street.clone(),
            query: t.query.clone(),
        });
    }

    log::info!(
        "{} unique addresses from {} transactions",
        unique.len(),
        transactions.len()
    );

    unique
}
