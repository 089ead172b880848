use crate::error::StoreError;
use crate::filter::CourseFilter;
use crate::reconcile::{Mode, ReconcileSummary, reconcile_with_summary};
use crate::results::{Course, CourseList};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    courses: CourseList,
}

/// Course list persisted as a JSON file
#[derive(Debug)]
pub struct CourseStore {
    path: PathBuf,
    courses: CourseList,
}

impl CourseStore {
    /// Default location under the user's data directory
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("moodle-courses")
            .join("courses.json")
    }

    /// Open a store; a missing file is an empty list
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let courses = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str::<StoreFile>(&contents)?.courses,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                ::log::debug!("No course store at {}, starting empty", path.display());
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        // Normalize a hand-edited file that repeats a URL
        let (courses, summary) = reconcile_with_summary(&[], &courses, Mode::Replace);
        if summary.skipped > 0 {
            ::log::warn!(
                "Dropped {} duplicate entries from {}",
                summary.skipped,
                path.display()
            );
        }

        Ok(Self { path, courses })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    /// Apply an extracted list under the given mode
    pub fn apply(&mut self, incoming: &[Course], mode: Mode) -> ReconcileSummary {
        let (courses, summary) = reconcile_with_summary(&self.courses, incoming, mode);
        self.courses = courses;
        summary
    }

    /// Add a course by hand
    pub fn add(&mut self, course: Course, filter: &CourseFilter) -> Result<(), StoreError> {
        if !filter.is_course_url(&course.url) {
            return Err(StoreError::InvalidUrl(course.url));
        }
        if self.courses.iter().any(|c| c.url == course.url) {
            return Err(StoreError::DuplicateUrl(course.url));
        }
        if self.courses.iter().any(|c| c.name == course.name) {
            return Err(StoreError::DuplicateName(course.name));
        }

        self.courses.push(course);
        Ok(())
    }

    /// Remove the course whose URL or name equals `key`
    pub fn remove(&mut self, key: &str) -> Result<Course, StoreError> {
        let index = self
            .courses
            .iter()
            .position(|c| c.url == key)
            .or_else(|| self.courses.iter().position(|c| c.name == key))
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        Ok(self.courses.remove(index))
    }

    /// Write the list back to disk, replacing the previous file in one rename
    pub fn save(&self) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let file = StoreFile {
            courses: self.courses.clone(),
        };
        let contents = serde_json::to_string_pretty(&file)?;

        // Temp file must share the directory so the rename stays on one filesystem
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        ::log::info!(
            "Saved {} courses to {}",
            self.courses.len(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(name: &str, id: u32) -> Course {
        Course::new(name, format!("https://moodle.example.org/course/view.php?id={id}"))
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CourseStore::open(dir.path().join("courses.json")).unwrap();
        assert!(store.courses().is_empty());
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("courses.json");

        let mut store = CourseStore::open(&path).unwrap();
        store.apply(&[course("A", 1), course("B", 2)], Mode::Merge);
        store.save().unwrap();

        let reopened = CourseStore::open(&path).unwrap();
        assert_eq!(reopened.courses(), &[course("A", 1), course("B", 2)]);
    }

    #[test]
    fn test_save_replaces_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courses.json");

        let mut store = CourseStore::open(&path).unwrap();
        store.apply(&[course("A", 1), course("B", 2)], Mode::Merge);
        store.save().unwrap();

        store.apply(&[course("C", 3)], Mode::Replace);
        store.save().unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("courses.json")]);

        let reopened = CourseStore::open(&path).unwrap();
        assert_eq!(reopened.courses(), &[course("C", 3)]);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courses.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(CourseStore::open(&path), Err(StoreError::Parse(_))));
    }

    #[test]
    fn test_duplicate_urls_in_file_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courses.json");
        fs::write(
            &path,
            r#"{"courses": [
                {"name": "A", "url": "https://moodle.example.org/course/view.php?id=1"},
                {"name": "A copy", "url": "https://moodle.example.org/course/view.php?id=1"}
            ]}"#,
        )
        .unwrap();

        let store = CourseStore::open(&path).unwrap();
        assert_eq!(store.courses(), &[course("A", 1)]);
    }

    #[test]
    fn test_add_rejects_invalid_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CourseStore::open(dir.path().join("courses.json")).unwrap();
        let filter = CourseFilter::default();

        store.add(course("A", 1), &filter).unwrap();

        assert!(matches!(
            store.add(course("Other", 1), &filter),
            Err(StoreError::DuplicateUrl(_))
        ));
        assert!(matches!(
            store.add(course("A", 2), &filter),
            Err(StoreError::DuplicateName(_))
        ));
        assert!(matches!(
            store.add(Course::new("Bad", "https://moodle.example.org/my/"), &filter),
            Err(StoreError::InvalidUrl(_))
        ));
        assert_eq!(store.courses().len(), 1);
    }

    #[test]
    fn test_remove_by_url_or_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CourseStore::open(dir.path().join("courses.json")).unwrap();
        store.apply(&[course("A", 1), course("B", 2), course("C", 3)], Mode::Merge);

        let removed = store
            .remove("https://moodle.example.org/course/view.php?id=2")
            .unwrap();
        assert_eq!(removed.name, "B");

        let removed = store.remove("C").unwrap();
        assert_eq!(removed.name, "C");

        assert!(matches!(store.remove("missing"), Err(StoreError::NotFound(_))));
        assert_eq!(store.courses(), &[course("A", 1)]);
    }

    #[test]
    fn test_apply_reports_summary() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CourseStore::open(dir.path().join("courses.json")).unwrap();
        store.apply(&[course("A", 1)], Mode::Merge);

        let summary = store.apply(&[course("A", 1), course("B", 2)], Mode::Merge);
        assert_eq!(summary.added, 1);
        assert_eq!(summary.skipped, 1);
    }
}
