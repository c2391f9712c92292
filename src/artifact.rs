//! Header policy and writing of built files.
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::{BuildError, CollaboratorError};
use crate::tools::{FileKind, Filesystem, HeaderTemplate};

/// Marker telling minifiers to keep a comment.
pub const PRESERVE: &str = "@preserve";

/// Header and footer decoration applied to built files.
#[derive(Clone)]
pub struct HeaderPolicy {
    header: Option<String>,
    footer: Option<String>,
    /// Set when a sourcemap root is configured.
    preserve: bool,
    template: Arc<dyn HeaderTemplate>,
}

impl HeaderPolicy {
    pub fn new(
        header: Option<String>,
        footer: Option<String>,
        preserve: bool,
        template: Arc<dyn HeaderTemplate>,
    ) -> Self {
        Self {
            header,
            footer,
            preserve,
            template,
        }
    }

    /// Prefix the rendered header. Without a configured header the code is
    /// returned unchanged.
    pub fn apply_header(&self, code: String, kind: FileKind) -> Result<String, CollaboratorError> {
        let Some(header) = &self.header else {
            return Ok(code);
        };

        let text = if self.preserve {
            format!("{PRESERVE}\n{header}")
        } else {
            header.clone()
        };

        let rendered = self.template.render(&text)?;
        Ok(format!("{}\n{code}", kind.comment(&rendered)))
    }

    /// Append the rendered footer, if any.
    pub fn apply_footer(&self, code: String, kind: FileKind) -> Result<String, CollaboratorError> {
        let Some(footer) = &self.footer else {
            return Ok(code);
        };

        let rendered = self.template.render(footer)?;
        Ok(format!("{code}\n{}\n", kind.comment(&rendered)))
    }
}

impl std::fmt::Debug for HeaderPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderPolicy")
            .field("header", &self.header)
            .field("footer", &self.footer)
            .field("preserve", &self.preserve)
            .finish()
    }
}

/// A source map ready to be written next to its artifact.
#[derive(Debug, Clone)]
pub struct MapArtifact {
    pub path: Utf8PathBuf,
    pub contents: String,
}

/// Output of one per-file action.
#[derive(Debug, Clone)]
pub struct FileArtifact {
    pub source_path: Utf8PathBuf,
    pub output_path: Utf8PathBuf,
    pub content: String,
    pub source_map: Option<MapArtifact>,
}

/// Writes artifacts through the injected filesystem.
#[derive(Clone)]
pub struct ArtifactWriter {
    fs: Arc<dyn Filesystem>,
}

impl ArtifactWriter {
    pub fn new(fs: Arc<dyn Filesystem>) -> Self {
        Self { fs }
    }

    /// Write the map (when present) and then the file itself.
    pub async fn write(&self, artifact: FileArtifact) -> Result<(), BuildError> {
        if let Some(map) = &artifact.source_map {
            self.fs.write(&map.path, map.contents.as_bytes()).await?;
        }

        self.fs
            .write(&artifact.output_path, artifact.content.as_bytes())
            .await?;

        Ok(())
    }

    pub async fn copy(&self, from: &Utf8Path, to: &Utf8Path) -> Result<(), BuildError> {
        self.fs.copy(from, to).await?;
        Ok(())
    }
}

impl std::fmt::Debug for ArtifactWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ArtifactWriter(*)")
    }
}
