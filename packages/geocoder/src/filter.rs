//! Residential filter.
//!
//! OneMap happily resolves an HDB block to a kindergarten, clinic, or
//! community club operating on its void deck. Such matches carry the
//! tenant's name in `BUILDING`, so a curated taxonomy of building-name
//! patterns (`rules/nonresidential.toml`) is used to drop them before
//! spatial enrichment.
//!
//! All patterns are compiled into one case-insensitive [`RegexSet`].
//! Results with no building name are always kept.

use std::path::Path;

use regex::{RegexSet, RegexSetBuilder};
use serde::Deserialize;

use crate::{GeocodeError, GeocodeResult};

const EMBEDDED_PATTERNS: &str = include_str!("../rules/nonresidential.toml");

#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    #[serde(default)]
    category: Vec<Category>,
}

#[derive(Debug, Deserialize)]
struct Category {
    name: String,
    patterns: Vec<String>,
}

/// A geocode result that survived filtering, tagged with its position in
/// the unfiltered input.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredResult {
    /// Zero-based index of the result before filtering.
    pub position: usize,
    /// The result itself.
    pub result: GeocodeResult,
}

/// Compiled non-residential building-name patterns.
#[derive(Debug, Clone)]
pub struct ResidentialFilter {
    set: RegexSet,
    /// Category name for each pattern in `set`, by index.
    categories: Vec<String>,
}

impl ResidentialFilter {
    /// Returns the taxonomy compiled into the binary.
    ///
    /// # Panics
    ///
    /// Panics if the embedded taxonomy is malformed.
    #[must_use]
    pub fn embedded() -> Self {
        Self::from_toml_str(EMBEDDED_PATTERNS)
            .unwrap_or_else(|e| panic!("Failed to parse embedded non-residential patterns: {e}"))
    }

    /// Loads a taxonomy from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the file cannot be read or is invalid.
    pub fn load(path: &Path) -> Result<Self, GeocodeError> {
        let content = std::fs::read_to_string(path)?;
        let filter = Self::from_toml_str(&content)?;
        log::info!(
            "Loaded {} non-residential patterns from {}",
            filter.len(),
            path.display()
        );
        Ok(filter)
    }

    /// Parses and compiles a taxonomy.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Rules`] on invalid TOML or an invalid regex.
    pub fn from_toml_str(content: &str) -> Result<Self, GeocodeError> {
        let file: TaxonomyFile = toml::de::from_str(content).map_err(|e| GeocodeError::Rules {
            message: e.to_string(),
        })?;

        let mut patterns = Vec::new();
        let mut categories = Vec::new();
        for category in file.category {
            for pattern in category.patterns {
                patterns.push(pattern);
                categories.push(category.name.clone());
            }
        }

        let set = RegexSetBuilder::new(&patterns)
            .case_insensitive(true)
            .build()
            .map_err(|e| GeocodeError::Rules {
                message: format!("bad non-residential pattern: {e}"),
            })?;

        Ok(Self { set, categories })
    }

    /// Number of compiled patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// Whether the taxonomy has no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Category of the first pattern matching `building`, if any.
    #[must_use]
    pub fn classify(&self, building: &str) -> Option<&str> {
        self.set
            .matches(building)
            .iter()
            .next()
            .map(|i| self.categories[i].as_str())
    }

    /// Whether `building` names non-residential premises.
    #[must_use]
    pub fn is_nonresidential(&self, building: &str) -> bool {
        self.set.is_match(building)
    }

    /// Drops results whose building name matches the taxonomy.
    ///
    /// Each survivor keeps its index in `results`. Results without a
    /// building name are never dropped.
    #[must_use]
    pub fn retain_residential(&self, results: Vec<GeocodeResult>) -> Vec<FilteredResult> {
        let total = results.len();

        let kept: Vec<FilteredResult> = results
            .into_iter()
            .enumerate()
            .filter(|(_, result)| {
                let Some(building) = result.building() else {
                    return true;
                };
                match self.classify(building) {
                    Some(category) => {
                        log::debug!(
                            "Dropping '{}' (building '{building}' is {category})",
                            result.query
                        );
                        false
                    }
                    None => true,
                }
            })
            .map(|(position, result)| FilteredResult { position, result })
            .collect();

        log::info!(
            "Residential filter removed {} of {total} geocoded addresses",
            total - kept.len()
        );

        kept
    }
}
