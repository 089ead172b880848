use serde::{Deserialize, Serialize};
use std::fmt;

/// Name used when a course entry carries no visible label
pub const PLACEHOLDER_NAME: &str = "Unnamed course";

/// A single enrollment discovered on the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// Display name of the course
    pub name: String,

    /// Link to the course page (absolute or relative, as found in the markup)
    pub url: String,
}

impl Course {
    /// Create a new course reference, substituting the placeholder for a blank name
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        let name = name.into();
        let name = if name.trim().is_empty() {
            PLACEHOLDER_NAME.to_string()
        } else {
            name.trim().to_string()
        };

        Self {
            name,
            url: url.into(),
        }
    }
}

impl fmt::Display for Course {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.url)
    }
}

/// Ordered course list; entries are unique by `url`
pub type CourseList = Vec<Course>;

/// Stages of an extraction run, used to label failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    Login,
    Navigation,
    Fetch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Setup => "setup",
            Stage::Login => "login",
            Stage::Navigation => "navigation",
            Stage::Fetch => "fetch",
        };
        f.write_str(name)
    }
}

/// Terminal outcome of an extraction task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    /// Whether the run completed all stages
    pub success: bool,

    /// Extracted courses (always empty on failure)
    pub courses: CourseList,

    /// Human-readable diagnostic. Always set on failure; on success it summarizes the outcome.
    pub error_detail: Option<String>,

    /// Stage that failed, if any
    pub failed_stage: Option<Stage>,
}

impl ExtractionResult {
    /// Successful run with the given courses
    pub fn succeeded(courses: CourseList) -> Self {
        let detail = if courses.is_empty() {
            "No courses found on your dashboard.".to_string()
        } else {
            format!("Successfully extracted {} courses.", courses.len())
        };

        Self {
            success: true,
            courses,
            error_detail: Some(detail),
            failed_stage: None,
        }
    }

    /// Failed run; never carries a partial list
    pub fn failed(stage: Stage, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            courses: Vec::new(),
            error_detail: Some(detail.into()),
            failed_stage: Some(stage),
        }
    }

    /// The diagnostic text, or an empty string when none is present
    pub fn detail(&self) -> &str {
        self.error_detail.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_name_uses_placeholder() {
        let course = Course::new("   ", "https://example.com/course/view.php?id=1");
        assert_eq!(course.name, PLACEHOLDER_NAME);

        let course = Course::new("  Algebra ", "https://example.com/course/view.php?id=2");
        assert_eq!(course.name, "Algebra");
    }

    #[test]
    fn test_result_details() {
        let empty = ExtractionResult::succeeded(vec![]);
        assert!(empty.success);
        assert_eq!(empty.detail(), "No courses found on your dashboard.");

        let failed = ExtractionResult::failed(Stage::Login, "login failed");
        assert!(!failed.success);
        assert!(failed.courses.is_empty());
        assert_eq!(failed.failed_stage, Some(Stage::Login));
    }

    #[test]
    fn test_stage_labels() {
        let labels: Vec<String> = [Stage::Setup, Stage::Login, Stage::Navigation, Stage::Fetch]
            .iter()
            .map(|stage| stage.to_string())
            .collect();
        assert_eq!(labels, vec!["setup", "login", "navigation", "fetch"]);
    }
}
