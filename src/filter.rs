use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::Instance;

/// Configuration for deciding which links are course pages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseFilterConfig {
    /// Host the course must live on (if None, any host is accepted)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_domain: Option<String>,

    /// Regex patterns a course URL must match (at least one, if any are given)
    #[serde(default = "default_include_patterns")]
    pub include_patterns: Vec<String>,

    /// Regex patterns for URLs to reject (these take precedence over include patterns)
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

fn default_include_patterns() -> Vec<String> {
    vec![r"/course/view\.php".to_string()]
}

impl Default for CourseFilterConfig {
    fn default() -> Self {
        Self {
            required_domain: None,
            include_patterns: default_include_patterns(),
            exclude_patterns: Vec::new(),
        }
    }
}

/// Validates course links entered by hand or found on a dashboard
#[derive(Debug)]
pub struct CourseFilter {
    config: CourseFilterConfig,
    include_regexes: Vec<Regex>,
    exclude_regexes: Vec<Regex>,
}

impl Default for CourseFilter {
    fn default() -> Self {
        Self::new(CourseFilterConfig::default()).expect("Default regex patterns should be valid")
    }
}

impl CourseFilter {
    /// Create a new course filter from configuration
    pub fn new(config: CourseFilterConfig) -> Result<Self, regex::Error> {
        let include_regexes = config
            .include_patterns
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        let exclude_regexes = config
            .exclude_patterns
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            config,
            include_regexes,
            exclude_regexes,
        })
    }

    /// Rules from `config`, restricted to the instance host unless a domain is configured
    pub fn for_instance(
        mut config: CourseFilterConfig,
        instance: &Instance,
    ) -> Result<Self, regex::Error> {
        if config.required_domain.is_none() {
            config.required_domain = instance.base_url().domain().map(|d| d.to_string());
        }
        Self::new(config)
    }

    /// Whether an absolute link points at a course page
    pub fn is_course_url(&self, link: &str) -> bool {
        match Url::parse(link) {
            Ok(url) => self.accepts(&url),
            Err(_) => false,
        }
    }

    /// Check a parsed URL against all rules
    pub fn accepts(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }

        if let Some(required_domain) = &self.config.required_domain {
            if url.domain() != Some(required_domain.as_str()) {
                return false;
            }
        }

        let url_str = url.as_str();
        if self.exclude_regexes.iter().any(|regex| regex.is_match(url_str)) {
            return false;
        }

        self.include_regexes.is_empty()
            || self.include_regexes.iter().any(|regex| regex.is_match(url_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PortalConfig;

    #[test]
    fn test_default_accepts_course_pages() {
        let filter = CourseFilter::default();

        assert!(filter.is_course_url("https://moodle.huji.ac.il/2024-25/course/view.php?id=2098"));
        assert!(!filter.is_course_url("https://moodle.huji.ac.il/2024-25/my/"));
        assert!(!filter.is_course_url("/2024-25/course/view.php?id=1"));
        assert!(!filter.is_course_url("ftp://moodle.huji.ac.il/course/view.php?id=1"));
    }

    #[test]
    fn test_instance_restricts_domain() {
        let instance = PortalConfig::default().instance("2024-25").unwrap();
        let filter = CourseFilter::for_instance(CourseFilterConfig::default(), &instance).unwrap();

        assert!(filter.is_course_url("https://moodle.huji.ac.il/2024-25/course/view.php?id=1"));
        assert!(!filter.is_course_url("https://evil.example.com/course/view.php?id=1"));
    }

    #[test]
    fn test_configured_domain_wins_over_instance() {
        let instance = PortalConfig::default().instance("2024-25").unwrap();
        let config = CourseFilterConfig {
            required_domain: Some("moodle.example.org".to_string()),
            ..CourseFilterConfig::default()
        };
        let filter = CourseFilter::for_instance(config, &instance).unwrap();

        assert!(filter.is_course_url("https://moodle.example.org/course/view.php?id=1"));
        assert!(!filter.is_course_url("https://moodle.huji.ac.il/2024-25/course/view.php?id=1"));
    }

    #[test]
    fn test_exclude_takes_precedence() {
        let config = CourseFilterConfig {
            exclude_patterns: vec![r"id=999".to_string()],
            ..CourseFilterConfig::default()
        };
        let filter = CourseFilter::new(config).unwrap();

        assert!(filter.is_course_url("https://example.org/course/view.php?id=1"));
        assert!(!filter.is_course_url("https://example.org/course/view.php?id=999"));
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let config = CourseFilterConfig {
            include_patterns: vec!["(".to_string()],
            ..CourseFilterConfig::default()
        };
        assert!(CourseFilter::new(config).is_err());
    }
}
