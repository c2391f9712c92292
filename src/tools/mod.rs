//! External collaborators used by the build stages.
//!
//! The pipeline never calls a concrete tool directly. Every stage receives a
//! [`Toolchain`], a bundle of trait objects which can be swapped out, e.g. in
//! tests or to plug in a different minifier.
mod esbuild;
mod fs;
#[cfg(feature = "grass")]
mod grass;
mod header;

use std::sync::Arc;

use async_trait::async_trait;
use camino::Utf8PathBuf;
use serde_json::Value;

use crate::error::CollaboratorError;

pub use esbuild::Esbuild;
pub use fs::{Filesystem, LocalFs};
#[cfg(feature = "grass")]
pub use grass::Grass;
#[cfg(feature = "minijinja")]
pub use header::JinjaHeader;
pub use header::PlainHeader;

/// Input of an operation that accepts either a file or code already in
/// memory.
#[derive(Debug, Clone)]
pub enum Source {
    FilePath(Utf8PathBuf),
    RawCode(String),
}

/// Kind of a built file that receives a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Script,
    Style,
}

impl FileKind {
    /// Wrap `text` in a block comment. Scripts and stylesheets share the
    /// `/** ... */` syntax.
    pub(crate) fn comment(self, text: &str) -> String {
        let mut acc = String::from("/**\n");
        for line in text.lines() {
            if line.is_empty() {
                acc.push_str(" *\n");
            } else {
                acc.push_str(" * ");
                acc.push_str(line);
                acc.push('\n');
            }
        }
        acc.push_str(" */");
        acc
    }
}

#[derive(Debug, Clone)]
pub struct TranspileOptions<'a> {
    /// Base name of the source file, recorded in the map.
    pub file_name: &'a str,
    /// Whether a source map should be produced.
    pub source_maps: bool,
    /// Opaque tool options from the configuration.
    pub extra: &'a Value,
}

#[derive(Debug, Clone, Default)]
pub struct Transpiled {
    pub code: String,
    pub map: Option<String>,
    pub ast: Option<Value>,
}

/// Public location of a source map and of its sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMapRef {
    /// Resolved sourcemap root.
    pub root: String,
    /// URL of this file's map.
    pub url: String,
    /// Root under which original sources are published.
    pub sources: String,
}

impl SourceMapRef {
    /// Reference for the map of `file_name` (path relative to the output
    /// root) published under `root`.
    pub fn new(root: &str, file_name: &str) -> Self {
        Self {
            root: root.to_string(),
            url: join_url(root, &format!("{file_name}.map")),
            sources: join_url(root, "sources"),
        }
    }
}

/// Join URL segments with single slashes, keeping a scheme's `//`.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    let joined = format!("{base}/{path}");
    let (scheme, rest) = match joined.find("://") {
        Some(i) => joined.split_at(i + 3),
        None => ("", joined.as_str()),
    };

    let mut acc = String::from(scheme);
    let mut last_slash = false;

    for c in rest.chars() {
        if c == '/' {
            if last_slash {
                continue;
            }
            last_slash = true;
        } else {
            last_slash = false;
        }
        acc.push(c);
    }

    acc
}

#[derive(Debug, Clone, Default)]
pub struct MinifyOptions {
    /// Output file name relative to the output root.
    pub file_name: Option<String>,
    /// Map of the previous transformation, to be chained.
    pub prior_map: Option<String>,
    /// Set when the minifier should emit a map.
    pub source_map: Option<SourceMapRef>,
}

#[derive(Debug, Clone, Default)]
pub struct Minified {
    pub code: String,
    pub map: Option<String>,
}

#[async_trait]
pub trait Transpiler: Send + Sync {
    async fn transpile(
        &self,
        code: &str,
        options: &TranspileOptions<'_>,
    ) -> Result<Transpiled, CollaboratorError>;
}

#[async_trait]
pub trait Minifier: Send + Sync {
    async fn minify(&self, code: &str, options: &MinifyOptions)
    -> Result<Minified, CollaboratorError>;
}

pub trait StyleMinifier: Send + Sync {
    fn minify(&self, css: &str) -> Result<String, CollaboratorError>;
}

/// Renders configured header and footer text.
pub trait HeaderTemplate: Send + Sync {
    fn render(&self, text: &str) -> Result<String, CollaboratorError>;
}

/// Leaves stylesheets untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepStyles;

impl StyleMinifier for KeepStyles {
    fn minify(&self, css: &str) -> Result<String, CollaboratorError> {
        Ok(css.to_string())
    }
}

/// Every capability the build stages need.
#[derive(Clone)]
pub struct Toolchain {
    pub fs: Arc<dyn Filesystem>,
    pub transpiler: Arc<dyn Transpiler>,
    pub minifier: Arc<dyn Minifier>,
    pub styles: Arc<dyn StyleMinifier>,
    pub header: Arc<dyn HeaderTemplate>,
}

impl Toolchain {
    /// Local filesystem, `esbuild` for scripts, and the best available
    /// style minifier and header renderer.
    pub fn standard(package: &crate::PackageMetadata) -> Self {
        let esbuild = Arc::new(Esbuild::default());

        Self {
            fs: Arc::new(LocalFs),
            transpiler: esbuild.clone(),
            minifier: esbuild,
            #[cfg(feature = "grass")]
            styles: Arc::new(Grass),
            #[cfg(not(feature = "grass"))]
            styles: Arc::new(KeepStyles),
            #[cfg(feature = "minijinja")]
            header: Arc::new(JinjaHeader::new(package)),
            #[cfg(not(feature = "minijinja"))]
            header: {
                let _ = package;
                Arc::new(PlainHeader)
            },
        }
    }

    pub fn with_fs(mut self, fs: impl Filesystem + 'static) -> Self {
        self.fs = Arc::new(fs);
        self
    }

    pub fn with_transpiler(mut self, transpiler: impl Transpiler + 'static) -> Self {
        self.transpiler = Arc::new(transpiler);
        self
    }

    pub fn with_minifier(mut self, minifier: impl Minifier + 'static) -> Self {
        self.minifier = Arc::new(minifier);
        self
    }

    pub fn with_styles(mut self, styles: impl StyleMinifier + 'static) -> Self {
        self.styles = Arc::new(styles);
        self
    }

    pub fn with_header(mut self, header: impl HeaderTemplate + 'static) -> Self {
        self.header = Arc::new(header);
        self
    }

    /// Load the code of `source`, reading it from disk if needed.
    pub async fn load(&self, source: &Source) -> std::io::Result<String> {
        match source {
            Source::FilePath(path) => self.fs.read_to_string(path).await,
            Source::RawCode(code) => Ok(code.clone()),
        }
    }
}

impl std::fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Toolchain(*)")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://cdn.example.com/2.0.0", "js/app.js.map"),
            "https://cdn.example.com/2.0.0/js/app.js.map"
        );
        assert_eq!(join_url("https://cdn.example.com/", "/a.js.map"), "https://cdn.example.com/a.js.map");
        assert_eq!(join_url("/maps//", "a.js.map"), "/maps/a.js.map");
    }

    #[test]
    fn test_sourcemap_ref() {
        let reference = SourceMapRef::new("https://cdn.example.com/2.0.0", "js/app.js");
        assert_eq!(reference.root, "https://cdn.example.com/2.0.0");
        assert_eq!(reference.url, "https://cdn.example.com/2.0.0/js/app.js.map");
        assert_eq!(reference.sources, "https://cdn.example.com/2.0.0/sources");
    }

    #[test]
    fn test_comments() {
        assert_eq!(FileKind::Script.comment("a\n\nb"), "/**\n * a\n *\n * b\n */");
        assert_eq!(FileKind::Style.comment("a"), "/**\n * a\n */");
    }

    #[tokio::test]
    async fn test_load_raw_code() {
        let tools = Toolchain::standard(&crate::PackageMetadata::default());
        let code = tools.load(&Source::RawCode("let a = 1".into())).await.unwrap();
        assert_eq!(code, "let a = 1");
    }
}
