//! Industry factsheet templates
//!
//! Templates are Markdown files with `{placeholder}` slots, one per
//! industry, living in a flat directory. Industry tags from the batch
//! input are normalized through a synonym table before lookup, with a
//! generic template as the final fallback.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{OnceLock, RwLock};
use tracing::{debug, warn};

/// Synonym table: raw industry fragments mapped to template names
const INDUSTRY_SYNONYMS: &[(&str, &str)] = &[
    // Technology variations
    ("tech", "technology"),
    ("software", "technology"),
    ("saas", "technology"),
    ("it", "technology"),
    ("ai", "technology"),
    ("data", "technology"),
    // Construction variations
    ("building", "construction"),
    ("real estate", "construction"),
    ("realestate", "construction"),
    ("property", "construction"),
    ("contractor", "construction"),
    // Finance variations
    ("finance", "fintech"),
    ("financial", "fintech"),
    ("banking", "fintech"),
    ("payments", "fintech"),
    ("crypto", "fintech"),
    // Healthcare variations
    ("health", "healthcare"),
    ("medical", "healthcare"),
    ("pharma", "healthcare"),
    ("biotech", "healthcare"),
    ("clinical", "healthcare"),
];

const GENERIC_TEMPLATE: &str = "generic";

/// Loads and caches industry templates from a directory
pub struct TemplateLibrary {
    dir: PathBuf,
    cache: RwLock<HashMap<String, String>>,
}

impl TemplateLibrary {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Normalize an industry tag to a template name
    pub fn normalize_industry(&self, industry: &str) -> String {
        let lowered = industry.to_lowercase();
        let cleaned: String = lowered
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
            .collect();
        let normalized = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

        if normalized.is_empty() {
            return GENERIC_TEMPLATE.to_string();
        }

        for (fragment, template) in INDUSTRY_SYNONYMS {
            if normalized == *fragment {
                return template.to_string();
            }
        }
        for (fragment, template) in INDUSTRY_SYNONYMS {
            if normalized.contains(fragment) {
                return template.to_string();
            }
        }

        if self.dir.join(format!("{}.md", normalized)).exists() {
            return normalized;
        }

        GENERIC_TEMPLATE.to_string()
    }

    /// Get the template text for an industry, falling back to the
    /// generic template when no specific one exists.
    pub fn template(&self, industry: &str) -> Result<String> {
        let name = self.normalize_industry(industry);

        if let Some(cached) = self.cache.read().ok().and_then(|c| c.get(&name).cloned()) {
            return Ok(cached);
        }

        let mut path = self.dir.join(format!("{}.md", name));
        if !path.exists() && name != GENERIC_TEMPLATE {
            warn!(
                "No template for industry '{}' ({}), falling back to generic",
                industry, name
            );
            path = self.dir.join(format!("{}.md", GENERIC_TEMPLATE));
        }

        if !path.exists() {
            return Err(Error::Template(format!(
                "Generic template not found at {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(&path)?;
        debug!("Loaded template '{}' for industry '{}'", name, industry);

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(name, content.clone());
        }
        Ok(content)
    }

    /// Extract the placeholder names used by an industry's template, in
    /// first-appearance order without duplicates.
    pub fn placeholders(&self, industry: &str) -> Result<Vec<String>> {
        let template = self.template(industry)?;
        Ok(extract_placeholders(&template))
    }
}

/// Extract `{placeholder}` names from template text
pub fn extract_placeholders(template: &str) -> Vec<String> {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    let placeholder =
        PLACEHOLDER.get_or_init(|| Regex::new(r"\{([a-zA-Z0-9_]+)\}").expect("placeholder regex"));

    let mut names = Vec::new();
    for captures in placeholder.captures_iter(template) {
        let name = captures[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library_with(templates: &[(&str, &str)]) -> (tempfile::TempDir, TemplateLibrary) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in templates {
            std::fs::write(dir.path().join(format!("{}.md", name)), content).unwrap();
        }
        let library = TemplateLibrary::new(dir.path());
        (dir, library)
    }

    #[test]
    fn test_normalize_industry_synonyms() {
        let (_dir, library) = library_with(&[]);

        assert_eq!(library.normalize_industry("SaaS"), "technology");
        assert_eq!(library.normalize_industry("Real Estate"), "construction");
        assert_eq!(library.normalize_industry("Banking & Payments"), "fintech");
        assert_eq!(library.normalize_industry("Biotech"), "healthcare");
        assert_eq!(library.normalize_industry(""), "generic");
        assert_eq!(library.normalize_industry("Logistics"), "generic");
    }

    #[test]
    fn test_normalize_industry_direct_template_match() {
        let (_dir, library) = library_with(&[("logistics", "# {company_name}")]);
        assert_eq!(library.normalize_industry("Logistics"), "logistics");
    }

    #[test]
    fn test_template_fallback_to_generic() {
        let (_dir, library) = library_with(&[("generic", "# {company_name}\n{company_overview}")]);

        let template = library.template("Aerospace").unwrap();
        assert!(template.contains("{company_overview}"));
    }

    #[test]
    fn test_template_missing_generic_is_error() {
        let (_dir, library) = library_with(&[]);
        assert!(library.template("Aerospace").is_err());
    }

    #[test]
    fn test_extract_placeholders_order_and_dedup() {
        let names = extract_placeholders(
            "# {company_name}\n{company_overview}\n{products_services}\n{company_name}",
        );
        assert_eq!(
            names,
            vec!["company_name", "company_overview", "products_services"]
        );
    }

    #[test]
    fn test_placeholders_via_industry() {
        let (_dir, library) = library_with(&[(
            "technology",
            "# {company_name}\n{technology_stack}",
        )]);

        let names = library.placeholders("software").unwrap();
        assert_eq!(names, vec!["company_name", "technology_stack"]);
    }
}
