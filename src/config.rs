use crate::error::ConfigError;
use crate::filter::{CourseFilter, CourseFilterConfig};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}$").expect("year pattern is valid"));

/// Configuration for talking to the portal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Base URL of a portal instance; `{year}` is replaced by the selected year
    #[serde(default = "default_base_url_template")]
    pub base_url_template: String,

    /// Academic year selecting the portal instance
    #[serde(default = "default_year")]
    pub year: String,

    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Run the browser without a window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Upper bound for each stage of an extraction run
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,

    /// How long to wait for the dashboard redirect after submitting the login form
    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,

    /// Capacity of the task event channel
    #[serde(default = "default_status_buffer")]
    pub status_buffer: usize,

    /// Rules a manually added course URL must satisfy
    #[serde(default)]
    pub course_filter: CourseFilterConfig,
}

fn default_base_url_template() -> String {
    "https://moodle.huji.ac.il/{year}".to_string()
}

fn default_year() -> String {
    "2024-25".to_string()
}

/// Default value for webdriver_url
fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_stage_timeout_secs() -> u64 {
    30
}

fn default_login_timeout_secs() -> u64 {
    25
}

fn default_status_buffer() -> usize {
    32
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url_template: default_base_url_template(),
            year: default_year(),
            webdriver_url: default_webdriver_url(),
            headless: default_headless(),
            stage_timeout_secs: default_stage_timeout_secs(),
            login_timeout_secs: default_login_timeout_secs(),
            status_buffer: default_status_buffer(),
            course_filter: CourseFilterConfig::default(),
        }
    }
}

impl PortalConfig {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that depend on each other.
    ///
    /// The dashboard redirect wait runs inside the login stage and must end
    /// before the stage timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.login_timeout_secs >= self.stage_timeout_secs {
            return Err(ConfigError::LoginTimeout {
                login: self.login_timeout_secs,
                stage: self.stage_timeout_secs,
            });
        }
        Ok(())
    }

    /// Apply the `WEBDRIVER_URL` environment override, if set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                self.webdriver_url = webdriver_url;
            }
        }
        self
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    /// Course URL rules for an instance
    pub fn course_filter(&self, instance: &Instance) -> Result<CourseFilter, ConfigError> {
        Ok(CourseFilter::for_instance(self.course_filter.clone(), instance)?)
    }

    /// Resolve the configured year into a portal instance
    pub fn default_instance(&self) -> Result<Instance, ConfigError> {
        self.instance(&self.year)
    }

    /// Resolve a year into a portal instance
    pub fn instance(&self, year: &str) -> Result<Instance, ConfigError> {
        if !YEAR_RE.is_match(year) {
            return Err(ConfigError::InvalidYear(year.to_string()));
        }

        let raw = self.base_url_template.replace("{year}", year);
        // Trailing slash so relative joins stay under the instance path
        let with_slash = format!("{}/", raw.trim_end_matches('/'));
        let base_url = Url::parse(&with_slash).map_err(|source| ConfigError::InvalidUrl {
            url: raw.clone(),
            source,
        })?;

        Ok(Instance {
            year: year.to_string(),
            base_url,
        })
    }
}

/// A resolved portal instance (one per academic year)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub year: String,
    base_url: Url,
}

impl Instance {
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Login page of the instance
    pub fn login_url(&self) -> Url {
        self.join("login/index.php")
    }

    /// Dashboard page of the instance
    pub fn dashboard_url(&self) -> Url {
        self.join("my/")
    }

    /// Whether a URL lies on this instance's dashboard
    pub fn is_dashboard(&self, url: &Url) -> bool {
        url.as_str().starts_with(self.dashboard_url().as_str())
    }

    fn join(&self, path: &str) -> Url {
        // Joining a static relative path onto a base with a trailing slash cannot fail
        self.base_url
            .join(path)
            .unwrap_or_else(|_| self.base_url.clone())
    }
}
