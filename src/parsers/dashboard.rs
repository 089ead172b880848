use crate::results::{Course, CourseList};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

/// Container holding the user's enrolled courses
static OVERVIEW_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"section[data-block="myoverview"]"#).expect("valid overview selector")
});

static ITEM_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li.course-listitem").expect("valid item selector"));

static COURSENAME_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.coursename").expect("valid anchor selector"));

static ANY_LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid link selector"));

/// Accessibility helpers that never render visibly
const HIDDEN_CLASSES: [&str; 3] = ["sr-only", "visually-hidden", "accesshide"];

/// Star-status text some themes prepend to the course label
const STATUS_PREFIXES: [&str; 4] = [
    "Course is starred",
    "Course is not starred",
    "Course not starred",
    "Course starred",
];

/// Extracts the enrolled courses from dashboard markup, in document order.
///
/// A missing overview block yields an empty list. Entries without a usable
/// link are skipped. Never fails: malformed markup is parsed as far as the
/// HTML parser can recover it.
pub fn extract_courses(html: &str) -> CourseList {
    let doc = Html::parse_document(html);

    let Some(overview) = doc.select(&OVERVIEW_SELECTOR).next() else {
        ::log::debug!("Dashboard overview block not found");
        return Vec::new();
    };

    let mut courses = Vec::new();
    let mut skipped = 0;

    for item in overview.select(&ITEM_SELECTOR) {
        match course_from_item(item) {
            Some(course) => courses.push(course),
            None => skipped += 1,
        }
    }

    ::log::debug!(
        "Dashboard parser found {} courses ({} entries skipped)",
        courses.len(),
        skipped
    );

    courses
}

/// Reads one list item; `None` when it has no anchor or no link
fn course_from_item(item: ElementRef<'_>) -> Option<Course> {
    let anchor = item
        .select(&COURSENAME_SELECTOR)
        .next()
        .or_else(|| item.select(&ANY_LINK_SELECTOR).next())?;

    let href = anchor.value().attr("href")?.trim();
    if href.is_empty() {
        return None;
    }

    let name = strip_status_prefix(&visible_text(anchor));

    Some(Course::new(name, href))
}

/// Text of an element with hidden helper spans removed and whitespace collapsed
fn visible_text(element: ElementRef<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node
            .ancestors()
            .take_while(|ancestor| ancestor.id() != element.id())
            .filter_map(ElementRef::wrap)
            .chain(std::iter::once(element))
            .any(is_hidden);

        if !hidden {
            parts.push(text);
        }
    }

    parts
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_hidden(element: ElementRef<'_>) -> bool {
    element
        .value()
        .classes()
        .any(|class| HIDDEN_CLASSES.contains(&class))
}

pub(crate) fn strip_status_prefix(name: &str) -> String {
    for prefix in STATUS_PREFIXES {
        if let Some(rest) = name.strip_prefix(prefix) {
            return rest.trim().to_string();
        }
    }
    name.to_string()
}
