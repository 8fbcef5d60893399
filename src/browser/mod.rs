//! Browser classification
//!
//! Maps a raw user-agent string onto a small closed set of browser
//! categories. Only a fixed classifier exists today; a real user-agent
//! parser can be dropped in behind [`BrowserClassifier`] without touching
//! the matcher.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[non_exhaustive]
pub enum Browser {
    Chrome,
}

impl Browser {
    /// Label persisted in the `browser` column.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Browser::Chrome => "CHROME",
        }
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait BrowserClassifier: Send + Sync {
    fn classify(&self, user_agent: &str) -> Browser;
}

/// Classifier that ignores its input and always reports the same category.
#[derive(Debug, Clone, Copy)]
pub struct FixedClassifier {
    browser: Browser,
}

impl FixedClassifier {
    pub const fn new(browser: Browser) -> Self {
        Self { browser }
    }
}

impl Default for FixedClassifier {
    fn default() -> Self {
        Self::new(Browser::Chrome)
    }
}

impl BrowserClassifier for FixedClassifier {
    fn classify(&self, _user_agent: &str) -> Browser {
        self.browser
    }
}
