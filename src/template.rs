//! Expansion of `{{key}}` placeholders against package metadata.

use std::collections::BTreeMap;

/// Upper bound on substitution rounds. Values may reintroduce placeholders
/// (directly or through a chain of keys), so the loop needs a hard stop.
pub const MAX_ITERATIONS: usize = 100;

/// Flat, case-insensitive key/value mapping consulted during resolution.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    values: BTreeMap<String, String>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Exact key first, then the first key equal ignoring ASCII case.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .or_else(|| {
                self.values
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for TemplateContext
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A `{{key}}` occurrence inside a string.
struct Placeholder<'a> {
    start: usize,
    end: usize,
    key: &'a str,
}

/// Leftmost placeholder at or after `from`. Keys are the shortest text
/// between `{{` and the next `}}`.
fn find_placeholder(text: &str, from: usize) -> Option<Placeholder<'_>> {
    let start = from + text[from..].find("{{")?;
    let key_start = start + 2;
    let key_len = text[key_start..].find("}}")?;
    let end = key_start + key_len + 2;

    Some(Placeholder {
        start,
        end,
        key: &text[key_start..key_start + key_len],
    })
}

/// Replace every occurrence of `{{key}}` (key compared ignoring case).
fn replace_placeholder(text: &str, key: &str, value: &str) -> String {
    let mut acc = String::with_capacity(text.len());
    let mut cursor = 0;

    while let Some(found) = find_placeholder(text, cursor) {
        acc.push_str(&text[cursor..found.start]);

        if found.key.eq_ignore_ascii_case(key) {
            acc.push_str(value);
        } else {
            acc.push_str(&text[found.start..found.end]);
        }

        cursor = found.end;
    }

    acc.push_str(&text[cursor..]);
    acc
}

/// Fully resolve `template` against `context`.
///
/// Each round takes the leftmost remaining placeholder and substitutes all
/// of its occurrences, with the empty string when the key is unknown. After
/// [`MAX_ITERATIONS`] rounds whatever is left is returned as is.
pub fn resolve(template: &str, context: &TemplateContext) -> String {
    let mut text = template.to_string();

    for _ in 0..MAX_ITERATIONS {
        let Some(found) = find_placeholder(&text, 0) else {
            return text;
        };

        let key = found.key.to_string();
        let value = match context.get(&key) {
            Some(value) => value,
            None => {
                tracing::debug!(key = %key, "no value for placeholder, substituting empty string");
                ""
            }
        };

        text = replace_placeholder(&text, &key, value);
    }

    if find_placeholder(&text, 0).is_some() {
        tracing::debug!(
            template = %template,
            resolved = %text,
            "placeholder expansion stopped after {MAX_ITERATIONS} rounds"
        );
    }

    text
}
