//! Operation categories.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Coarse class of a measured operation.
///
/// The set is open: the well-known categories are provided as constants,
/// and callers may use any other name. Unknown categories fall back to the
/// default threshold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(Cow<'static, str>);

impl Category {
    /// Rendering of a UI unit
    pub const RENDER: Category = Category(Cow::Borrowed("render"));
    /// Network or service call
    pub const API: Category = Category(Cow::Borrowed("api"));
    /// Local computation
    pub const COMPUTATION: Category = Category(Cow::Borrowed("computation"));
    /// Animated or routed transition
    pub const TRANSITION: Category = Category(Cow::Borrowed("transition"));
    /// Blocking task reported by an external facility
    pub const LONG_TASK: Category = Category(Cow::Borrowed("long-task"));
    /// Non-render lifecycle hook
    pub const LIFECYCLE: Category = Category(Cow::Borrowed("lifecycle"));
    /// Uncategorized
    pub const GENERAL: Category = Category(Cow::Borrowed("general"));

    /// Create a category with an arbitrary name.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    /// The category name.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Category {
    fn default() -> Self {
        Self::GENERAL
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Category {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

impl From<String> for Category {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_names() {
        assert_eq!(Category::RENDER.as_str(), "render");
        assert_eq!(Category::LONG_TASK.as_str(), "long-task");
        assert_eq!(Category::default(), Category::GENERAL);
    }

    #[test]
    fn test_owned_and_borrowed_compare_equal() {
        assert_eq!(Category::from("api".to_string()), Category::API);
        assert_eq!(Category::new("custom").to_string(), "custom");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let json = serde_json::to_string(&Category::TRANSITION).unwrap();
        assert_eq!(json, "\"transition\"");

        let parsed: Category = serde_json::from_str("\"render\"").unwrap();
        assert_eq!(parsed, Category::RENDER);
    }
}
