pub mod dashboard;


pub use dashboard::extract_courses;
