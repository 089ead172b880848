pub mod config;
pub mod error;
pub mod filter;
pub mod parsers;
pub mod portal;
pub mod reconcile;
pub mod results;
pub mod store;
pub mod task;

// Re-export commonly used types for convenience
pub use config::{Instance, PortalConfig};
pub use parsers::extract_courses;
pub use portal::{Credentials, Portal, WebDriverPortal};
pub use reconcile::{Mode, ReconcileSummary, reconcile};
pub use results::{Course, CourseList, ExtractionResult, Stage};
pub use store::CourseStore;
pub use task::{Extraction, ExtractionHandle, TaskEvent};
