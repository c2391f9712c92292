//! Build configuration and package metadata.
//!
//! Raw options are deserialized as written by the user, then resolved once
//! against the package metadata into an immutable [`BuildConfig`].
use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ConfigError;
use crate::ignore::{IgnoreMatcher, normalize};
use crate::template::{self, TemplateContext};

pub const DEFAULT_SOURCE: &str = "./src";
pub const DEFAULT_OUTPUT: &str = "./dist";
pub const DEFAULT_SOURCEMAP_DIR: &str = "./SOURCEMAPS";

/// Options as they appear in a configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// Root to read from.
    pub source: Option<Utf8PathBuf>,
    /// Root to write to.
    pub output: Option<Utf8PathBuf>,
    /// Extra paths, relative to the source root, copied verbatim.
    pub assets: Vec<Utf8PathBuf>,
    /// Public root of the source maps, may contain `{{key}}` placeholders.
    pub sourcemapurl: Option<String>,
    /// Output subdirectory for source maps.
    pub sourcemapdir: Option<Utf8PathBuf>,
    /// Globs for which no source map is emitted.
    pub ignoremaps: Vec<String>,
    /// Globs excluded from every stage.
    pub ignore: Option<Vec<String>>,
    /// Opaque options forwarded to the transpiler.
    pub transpile: Option<Value>,
    /// Comment placed at the top of every built script and stylesheet.
    pub header: Option<String>,
    /// Comment placed at the bottom of every built script.
    pub footer: Option<String>,
}

impl RawConfig {
    pub fn from_file(path: impl AsRef<Utf8Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read(path.into(), e))?;
        serde_json::from_str(&text).map_err(|e| ConfigError::Parse(path.into(), e))
    }
}

/// The contents of `package.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    /// Template for the sourcemap root, used when the build configuration
    /// has none.
    #[serde(default)]
    pub sourcemaps: Option<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl PackageMetadata {
    pub fn from_file(path: impl AsRef<Utf8Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read(path.into(), e))?;
        serde_json::from_str(&text).map_err(|e| ConfigError::Parse(path.into(), e))
    }

    /// Flat key/value view used for placeholder expansion. Strings are taken
    /// verbatim, other values in their JSON form.
    pub fn context(&self) -> TemplateContext {
        let mut context: TemplateContext = self
            .fields
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect();

        context.insert("name", self.name.clone());
        context.insert("version", self.version.clone());

        if let Some(sourcemaps) = &self.sourcemaps {
            context.insert("sourcemaps", sourcemaps.clone());
        }

        context
    }
}

/// Resolved, read-only build configuration shared by every stage.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    source: Utf8PathBuf,
    output: Utf8PathBuf,
    assets: Vec<Utf8PathBuf>,
    sourcemap_url: Option<String>,
    sourcemap_dir: Utf8PathBuf,
    ignore_maps: IgnoreMatcher,
    ignore: IgnoreMatcher,
    transpile: Value,
    header: Option<String>,
    footer: Option<String>,
}

/// Resolve raw options against package metadata.
///
/// The sourcemap root comes from `sourcemapurl`, or the package's
/// `sourcemaps` field when the former is unset, with every `{{key}}` expanded
/// from the package. A root that expands to nothing counts as unset.
pub fn resolve_config(raw: RawConfig, package: &PackageMetadata) -> Result<BuildConfig, ConfigError> {
    let source = raw.source.unwrap_or_else(|| DEFAULT_SOURCE.into());
    let output = raw.output.unwrap_or_else(|| DEFAULT_OUTPUT.into());

    let sourcemap_url = raw
        .sourcemapurl
        .or_else(|| package.sourcemaps.clone())
        .map(|url| template::resolve(&url, &package.context()))
        .filter(|url| !url.trim().is_empty());

    let ignore = raw
        .ignore
        .unwrap_or_else(|| vec!["**/node_modules/**".to_string()]);

    let transpile = raw
        .transpile
        .unwrap_or_else(|| serde_json::json!({ "target": "es2015" }));

    Ok(BuildConfig {
        ignore_maps: IgnoreMatcher::new(&source, &raw.ignoremaps)?,
        ignore: IgnoreMatcher::new(&source, &ignore)?,
        source,
        output,
        assets: raw.assets,
        sourcemap_url,
        sourcemap_dir: raw
            .sourcemapdir
            .unwrap_or_else(|| DEFAULT_SOURCEMAP_DIR.into()),
        transpile,
        header: raw.header,
        footer: raw.footer,
    })
}

impl BuildConfig {
    pub fn source(&self) -> &Utf8Path {
        &self.source
    }

    pub fn output(&self) -> &Utf8Path {
        &self.output
    }

    pub fn assets(&self) -> &[Utf8PathBuf] {
        &self.assets
    }

    /// Resolved public root of the source maps.
    pub fn sourcemap_url(&self) -> Option<&str> {
        self.sourcemap_url.as_deref()
    }

    pub fn sourcemap_dir(&self) -> &Utf8Path {
        &self.sourcemap_dir
    }

    pub fn ignore_maps(&self) -> &IgnoreMatcher {
        &self.ignore_maps
    }

    pub fn ignore(&self) -> &IgnoreMatcher {
        &self.ignore
    }

    pub fn transpile(&self) -> &Value {
        &self.transpile
    }

    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    pub fn footer(&self) -> Option<&str> {
        self.footer.as_deref()
    }

    /// Rebuild the configuration with another sourcemap root. The value is
    /// taken literally, no placeholder expansion happens here.
    pub fn with_sourcemap_url(mut self, url: Option<String>) -> Self {
        self.sourcemap_url = url.filter(|url| !url.trim().is_empty());
        self
    }

    /// Path of `path` relative to the source root.
    pub fn local_path(&self, path: impl AsRef<Utf8Path>) -> Utf8PathBuf {
        let path = normalize(path.as_ref());
        let root = normalize(&self.source);

        match path.strip_prefix(&root) {
            Ok(local) => local.to_path_buf(),
            Err(_) => path,
        }
    }

    /// Mirrored location of a source file inside the output root.
    pub fn output_path(&self, path: impl AsRef<Utf8Path>) -> Utf8PathBuf {
        self.output.join(self.local_path(path))
    }

    /// Where the source map of a script is written:
    /// `output / sourcemapdir / dirname(local) / basename.map`.
    pub fn sourcemap_path(&self, path: impl AsRef<Utf8Path>) -> Utf8PathBuf {
        let local = self.local_path(path);
        let name = format!("{}.map", local.file_name().unwrap_or_default());
        let dir = self.output.join(&self.sourcemap_dir);

        match local.parent() {
            Some(parent) => normalize(&dir.join(parent).join(name)),
            None => normalize(&dir.join(name)),
        }
    }

    /// Source-rooted glob pattern, e.g. `src/**/*.js`. Glob metacharacters
    /// in the source root are escaped.
    pub fn source_glob(&self, pattern: &str) -> String {
        let root = glob::Pattern::escape(self.source.as_str());
        Utf8Path::new(&root).join(pattern).into_string()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn package(json: &str) -> PackageMetadata {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = resolve_config(RawConfig::default(), &PackageMetadata::default()).unwrap();
        assert_eq!(config.source(), "./src");
        assert_eq!(config.output(), "./dist");
        assert_eq!(config.sourcemap_dir(), "./SOURCEMAPS");
        assert_eq!(config.sourcemap_url(), None);
        assert!(config.ignore_maps().is_empty());
        assert!(config.ignore().is_ignored("src/node_modules/lib/index.js"));
        assert_eq!(config.transpile()["target"], "es2015");
    }

    #[test]
    fn test_raw_config_keys() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "source": "app",
                "output": "build",
                "assets": ["images", "robots.txt"],
                "sourcemapurl": "https://cdn/{{name}}",
                "sourcemapdir": "maps",
                "ignoremaps": ["vendor/*.js"],
                "transpile": { "target": "es2020" }
            }"#,
        )
        .unwrap();

        let config = resolve_config(raw, &package(r#"{"name": "site"}"#)).unwrap();
        assert_eq!(config.source(), "app");
        assert_eq!(config.assets().len(), 2);
        assert_eq!(config.sourcemap_url(), Some("https://cdn/site"));
        assert!(config.ignore_maps().is_ignored("app/vendor/x.js"));
        assert_eq!(config.transpile()["target"], "es2020");
    }

    #[test]
    fn test_sourcemap_url_from_package() {
        let pkg = package(
            r#"{"name": "lib", "version": "2.0.0", "sourcemaps": "https://cdn.example.com/{{version}}"}"#,
        );
        let config = resolve_config(RawConfig::default(), &pkg).unwrap();
        assert_eq!(config.sourcemap_url(), Some("https://cdn.example.com/2.0.0"));
    }

    #[test]
    fn test_explicit_url_wins_over_package() {
        let pkg = package(r#"{"version": "1.0.0", "sourcemaps": "https://pkg/{{version}}"}"#);
        let raw = RawConfig {
            sourcemapurl: Some("https://cfg/{{version}}".into()),
            ..Default::default()
        };
        let config = resolve_config(raw, &pkg).unwrap();
        assert_eq!(config.sourcemap_url(), Some("https://cfg/1.0.0"));
    }

    #[test]
    fn test_empty_resolution_is_unset() {
        let raw = RawConfig {
            sourcemapurl: Some("{{nothing}}".into()),
            ..Default::default()
        };
        let config = resolve_config(raw, &PackageMetadata::default()).unwrap();
        assert_eq!(config.sourcemap_url(), None);
    }

    #[test]
    fn test_context_coerces_scalars() {
        let pkg = package(r#"{"name": "x", "version": "1.2.3", "build": 7, "private": true, "none": null}"#);
        let context = pkg.context();
        assert_eq!(context.get("build"), Some("7"));
        assert_eq!(context.get("private"), Some("true"));
        assert_eq!(context.get("none"), Some(""));
        assert_eq!(context.get("version"), Some("1.2.3"));
    }

    #[test]
    fn test_paths() {
        let raw = RawConfig {
            source: Some("./src".into()),
            output: Some("dist".into()),
            ..Default::default()
        };
        let config = resolve_config(raw, &PackageMetadata::default()).unwrap();

        assert_eq!(config.local_path("src/js/app.js"), "js/app.js");
        assert_eq!(config.output_path("./src/js/app.js"), "dist/js/app.js");
        assert_eq!(config.sourcemap_path("src/js/app.js"), "dist/SOURCEMAPS/js/app.js.map");
        assert_eq!(config.sourcemap_path("src/main.js"), "dist/SOURCEMAPS/main.js.map");
    }

    #[test]
    fn test_source_glob_escapes_root() {
        let raw = RawConfig {
            source: Some("site[1]/src".into()),
            ..Default::default()
        };
        let config = resolve_config(raw, &PackageMetadata::default()).unwrap();

        let pattern = config.source_glob("**/*.js");
        assert_eq!(pattern, "site[[]1[]]/src/**/*.js");
        assert!(glob::Pattern::new(&pattern).unwrap().matches("site[1]/src/js/app.js"));
    }

    #[test]
    fn test_with_sourcemap_url() {
        let config = resolve_config(RawConfig::default(), &PackageMetadata::default()).unwrap();
        let config = config.with_sourcemap_url(Some("https://maps".into()));
        assert_eq!(config.sourcemap_url(), Some("https://maps"));
        let config = config.with_sourcemap_url(None);
        assert_eq!(config.sourcemap_url(), None);
    }

    #[test]
    fn test_invalid_ignore_pattern() {
        let raw = RawConfig {
            ignoremaps: vec!["[".into()],
            ..Default::default()
        };
        assert!(matches!(
            resolve_config(raw, &PackageMetadata::default()),
            Err(ConfigError::Pattern(..))
        ));
    }
}
