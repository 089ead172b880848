pub mod webdriver;

use crate::config::Instance;
use crate::error::PortalError;
use std::fmt;
use std::future::Future;

pub use webdriver::WebDriverPortal;

/// Login credentials, passed through to the portal untouched
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A browser session against the course portal.
///
/// A session is exclusively owned; the extraction task takes it by value and
/// hands it back when it finishes.
pub trait Portal: Send {
    /// Make the session usable (e.g. start the browser)
    fn prepare(&mut self) -> impl Future<Output = Result<(), PortalError>> + Send;

    /// Sign in to the given instance
    fn login(
        &mut self,
        instance: &Instance,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<(), PortalError>> + Send;

    /// Open the instance's dashboard
    fn navigate_to_dashboard(
        &mut self,
        instance: &Instance,
    ) -> impl Future<Output = Result<(), PortalError>> + Send;

    /// Markup of the current page
    fn page_markup(&mut self) -> impl Future<Output = Result<String, PortalError>> + Send;

    /// Tear down the browser; later calls fail until `prepare` runs again
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let credentials = Credentials::new("student", "hunter2");
        let printed = format!("{:?}", credentials);
        assert!(printed.contains("student"));
        assert!(!printed.contains("hunter2"));
    }
}
