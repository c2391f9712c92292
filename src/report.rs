//! Console summary printed before a build starts.
use std::fmt::{self, Display};

use console::Style;

use crate::config::{BuildConfig, PackageMetadata};

const INDENT: &str = "     ";
const LABEL_WIDTH: usize = 20;

/// What the operator sees before the stages start.
#[derive(Debug, Clone)]
pub struct Report {
    tool: String,
    package: String,
    source: String,
    output: String,
    assets: Vec<String>,
    sourcemap_url: Option<String>,
    ignored: Vec<String>,
    ignored_maps: Vec<String>,
}

impl Report {
    pub fn new(config: &BuildConfig, package: &PackageMetadata) -> Self {
        Self {
            tool: format!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            package: match package.name.is_empty() {
                true => "unnamed package".into(),
                false => package.name.clone(),
            },
            source: config.source().to_string(),
            output: config.output().to_string(),
            assets: config.assets().iter().map(ToString::to_string).collect(),
            sourcemap_url: config.sourcemap_url().map(String::from),
            ignored: config.ignore().patterns().map(String::from).collect(),
            ignored_maps: config.ignore_maps().patterns().map(String::from).collect(),
        }
    }
}

fn row(f: &mut fmt::Formatter<'_>, label: &str, style: &Style, value: impl Display) -> fmt::Result {
    let label = format!("{label:<LABEL_WIDTH$}");
    writeln!(f, "{INDENT}{}{value}", style.apply_to(label))
}

impl Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bold = Style::new().bold();
        let subtle = Style::new().dim();
        let warn = Style::new().yellow();

        writeln!(f)?;
        writeln!(
            f,
            "{INDENT}{}",
            Style::new()
                .cyan()
                .apply_to(format!("Running {} for {}", self.tool, self.package))
        )?;
        writeln!(f)?;

        row(f, "Source:", &bold, &self.source)?;
        row(f, "Output:", &bold, &self.output)?;

        match self.assets.split_first() {
            None => row(f, "Assets:", &bold, warn.apply_to("None"))?,
            Some((first, rest)) => {
                row(f, "Assets:", &bold, first)?;
                for asset in rest {
                    row(f, "", &bold, asset)?;
                }
            }
        }

        if let Some(url) = &self.sourcemap_url {
            row(f, "Source Maps:", &bold, url)?;
        }

        writeln!(f)?;
        row(f, "Ignored:", &subtle, subtle.apply_to(self.ignored.join(", ")))?;

        if !self.ignored_maps.is_empty() {
            row(
                f,
                "Ignored SourceMaps:",
                &subtle,
                subtle.apply_to(self.ignored_maps.join(", ")),
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{RawConfig, resolve_config};

    fn line(label: &str, value: &str) -> String {
        format!("{INDENT}{label:<LABEL_WIDTH$}{value}\n")
    }

    fn render(raw: RawConfig, package: &str) -> String {
        console::set_colors_enabled(false);
        let package: PackageMetadata = serde_json::from_str(package).unwrap();
        let config = resolve_config(raw, &package).unwrap();
        Report::new(&config, &package).to_string()
    }

    #[test]
    fn test_report_without_assets() {
        let out = render(RawConfig::default(), r#"{"name": "site"}"#);

        assert!(out.contains(&format!("Running assetline v{} for site", env!("CARGO_PKG_VERSION"))));
        assert!(out.contains(&line("Source:", "./src")));
        assert!(out.contains(&line("Assets:", "None")));
        assert!(out.contains(&line("Ignored:", "**/node_modules/**")));
        assert!(!out.contains("Source Maps:"));
        assert!(!out.contains("Ignored SourceMaps:"));
    }

    #[test]
    fn test_report_with_maps() {
        let raw = RawConfig {
            assets: vec!["images".into(), "robots.txt".into()],
            sourcemapurl: Some("https://cdn/{{version}}".into()),
            ignoremaps: vec!["vendor/*.js".into()],
            ..Default::default()
        };
        let out = render(raw, r#"{"name": "site", "version": "1.0.0"}"#);

        assert!(out.contains(&line("Assets:", "images")));
        assert!(out.contains(&line("", "robots.txt")));
        assert!(out.contains(&line("Source Maps:", "https://cdn/1.0.0")));
        assert!(out.contains(&line("Ignored SourceMaps:", "vendor/*.js")));
    }
}
