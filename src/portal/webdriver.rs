use super::{Credentials, Portal};
use crate::config::{Instance, PortalConfig};
use crate::error::PortalError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use std::time::Duration;
use tokio::time::{Instant, sleep};

const EMAIL_TAB: &str = "a[href='#pills-email']";
const LOGIN_FORM: &str = "form#f3";
const USERNAME_FIELD: &str = "form#f3 #username";
const PASSWORD_FIELD: &str = "form#f3 #password";
const SUBMIT_BUTTON: &str = "form#f3 button.btn.btn-primary";
const LOGIN_ERRORS: &str = ".loginerrors .error, #loginerrormessage";

const ELEMENT_WAIT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Portal session driven through a WebDriver server
pub struct WebDriverPortal {
    client: Option<Client>,
    webdriver_url: String,
    headless: bool,
    login_timeout: Duration,
}

impl WebDriverPortal {
    /// Create an unconnected session; the browser starts on `prepare`
    pub fn new(config: &PortalConfig) -> Self {
        Self {
            client: None,
            webdriver_url: config.webdriver_url.clone(),
            headless: config.headless,
            login_timeout: config.login_timeout(),
        }
    }

    fn client(&self) -> Result<&Client, PortalError> {
        self.client.as_ref().ok_or(PortalError::Closed)
    }

    fn capabilities(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut caps = serde_json::Map::new();
        if self.headless {
            caps.insert(
                "goog:chromeOptions".to_string(),
                json!({ "args": ["--headless=new", "--disable-gpu"] }),
            );
            caps.insert(
                "moz:firefoxOptions".to_string(),
                json!({ "args": ["-headless"] }),
            );
        }
        caps
    }

    /// Connects to the configured WebDriver, then to common local defaults
    async fn connect(&self) -> Result<Client, PortalError> {
        let mut builder = ClientBuilder::native();
        builder.capabilities(self.capabilities());

        let first_error = match builder.connect(&self.webdriver_url).await {
            Ok(client) => {
                ::log::debug!("Connected to WebDriver at {}", self.webdriver_url);
                return Ok(client);
            }
            Err(e) => {
                ::log::error!(
                    "Failed to connect to WebDriver at {}: {}",
                    self.webdriver_url,
                    e
                );
                e.to_string()
            }
        };

        let fallback_urls = [
            "http://localhost:9515", // ChromeDriver default
            "http://localhost:4444", // geckodriver / Selenium default
            "http://127.0.0.1:4444",
        ];

        for url in fallback_urls.iter() {
            if *url == self.webdriver_url {
                continue;
            }

            ::log::info!("Trying fallback WebDriver URL: {}", url);
            if let Ok(client) = builder.connect(url).await {
                ::log::debug!("Connected to fallback WebDriver at {}", url);
                return Ok(client);
            }
        }

        ::log::error!(
            "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
        );
        Err(PortalError::Connect {
            url: self.webdriver_url.clone(),
            reason: first_error,
        })
    }

    async fn submit_login_form(
        client: &Client,
        credentials: &Credentials,
    ) -> Result<(), fantoccini::error::CmdError> {
        let tab = client
            .wait()
            .at_most(ELEMENT_WAIT)
            .for_element(Locator::Css(EMAIL_TAB))
            .await?;
        tab.click().await?;
        ::log::debug!("Selected e-mail login tab");

        client
            .wait()
            .at_most(ELEMENT_WAIT)
            .for_element(Locator::Css(LOGIN_FORM))
            .await?;

        let username = client
            .wait()
            .at_most(ELEMENT_WAIT)
            .for_element(Locator::Css(USERNAME_FIELD))
            .await?;
        username.click().await?;
        username.send_keys(&credentials.username).await?;

        let password = client.find(Locator::Css(PASSWORD_FIELD)).await?;
        password.click().await?;
        password.send_keys(&credentials.password).await?;
        ::log::info!("Entered credentials for user: {}", credentials.username);

        client.find(Locator::Css(SUBMIT_BUTTON)).await?.click().await?;
        ::log::info!("Login form submitted");
        Ok(())
    }

    /// Polls until the browser lands on the dashboard or the timeout passes
    async fn reached_dashboard(&self, client: &Client, instance: &Instance) -> bool {
        let deadline = Instant::now() + self.login_timeout;

        loop {
            if let Ok(current) = client.current_url().await {
                if instance.is_dashboard(&current) {
                    return true;
                }
            }

            if Instant::now() >= deadline {
                return false;
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Error text the login page shows after a rejected attempt
    async fn login_error_message(client: &Client) -> Option<String> {
        let element = client.find(Locator::Css(LOGIN_ERRORS)).await.ok()?;
        let text = element.text().await.ok()?;
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }
}

impl Portal for WebDriverPortal {
    async fn prepare(&mut self) -> Result<(), PortalError> {
        if self.client.is_none() {
            ::log::debug!("Starting browser session");
            self.client = Some(self.connect().await?);
        }
        Ok(())
    }

    async fn login(
        &mut self,
        instance: &Instance,
        credentials: &Credentials,
    ) -> Result<(), PortalError> {
        let client = self.client()?;
        let login_url = instance.login_url();

        ::log::info!("Navigating to login page: {}", login_url);
        client
            .goto(login_url.as_str())
            .await
            .map_err(|e| PortalError::Login(format!("could not open {}: {}", login_url, e)))?;

        Self::submit_login_form(client, credentials)
            .await
            .map_err(|e| PortalError::Login(format!("login form unavailable: {}", e)))?;

        if self.reached_dashboard(client, instance).await {
            ::log::info!("Login successful: navigated to dashboard");
            return Ok(());
        }

        let message = match Self::login_error_message(client).await {
            Some(error) => format!("portal reported: {}", error),
            None => {
                let current = client
                    .current_url()
                    .await
                    .map(|url| url.to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                format!("did not reach the dashboard (current URL: {})", current)
            }
        };
        ::log::error!("Login failed: {}", message);
        Err(PortalError::Login(message))
    }

    async fn navigate_to_dashboard(&mut self, instance: &Instance) -> Result<(), PortalError> {
        let client = self.client()?;
        let dashboard_url = instance.dashboard_url();

        ::log::info!("Navigating to dashboard: {}", dashboard_url);
        client
            .goto(dashboard_url.as_str())
            .await
            .map_err(|e| PortalError::Navigation(e.to_string()))?;

        let current = client
            .current_url()
            .await
            .map_err(|e| PortalError::Navigation(e.to_string()))?;

        if instance.is_dashboard(&current) {
            Ok(())
        } else {
            ::log::warn!("Navigation resulted in unexpected page: {}", current);
            Err(PortalError::Navigation(format!(
                "ended up on unexpected page {}",
                current
            )))
        }
    }

    async fn page_markup(&mut self) -> Result<String, PortalError> {
        self.client()?
            .source()
            .await
            .map_err(|e| PortalError::Fetch(e.to_string()))
    }

    async fn close(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.close().await {
                ::log::warn!("Failed to close browser session: {}", e);
            } else {
                ::log::debug!("Browser session closed");
            }
        }
    }
}
