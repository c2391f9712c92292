use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use glob::{MatchOptions, Pattern};

use crate::error::ConfigError;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Drop `.` components so `./src/a.js` and `src/a.js` compare equal.
pub(crate) fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    path.components()
        .filter(|c| !matches!(c, Utf8Component::CurDir))
        .collect()
}

/// Set of glob patterns rooted at the source directory.
///
/// A pattern like `vendor/*.js` matches `<source>/vendor/lib.js` but not
/// `<source>/vendor/deep/lib.js`; use `vendor/**/*.js` for that.
#[derive(Debug, Clone)]
pub struct IgnoreMatcher {
    root: Utf8PathBuf,
    patterns: Vec<(String, Pattern)>,
}

impl IgnoreMatcher {
    pub fn new<I, S>(root: impl AsRef<Utf8Path>, patterns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|raw| {
                let raw = raw.as_ref();
                let trimmed = raw.trim_start_matches("./").trim_start_matches('/');
                Pattern::new(trimmed)
                    .map(|pattern| (raw.to_string(), pattern))
                    .map_err(|e| ConfigError::Pattern(raw.to_string(), e))
            })
            .collect::<Result<_, _>>()?;

        Ok(Self {
            root: normalize(root.as_ref()),
            patterns,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// The configured patterns, as written.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|(raw, _)| raw.as_str())
    }

    /// First pattern matching `path`, if any.
    pub fn matched(&self, path: impl AsRef<Utf8Path>) -> Option<&str> {
        let path = normalize(path.as_ref());
        let local = path.strip_prefix(&self.root).unwrap_or(&path);

        self.patterns
            .iter()
            .find(|(_, pattern)| pattern.matches_path_with(local.as_std_path(), MATCH_OPTIONS))
            .map(|(raw, _)| raw.as_str())
    }

    pub fn is_ignored(&self, path: impl AsRef<Utf8Path>) -> bool {
        self.matched(path).is_some()
    }
}
