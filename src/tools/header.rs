use crate::error::CollaboratorError;
use crate::tools::HeaderTemplate;

/// Uses the configured text verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainHeader;

impl HeaderTemplate for PlainHeader {
    fn render(&self, text: &str) -> Result<String, CollaboratorError> {
        Ok(text.to_string())
    }
}

/// Renders header text as a `minijinja` template, e.g.
/// `{{ name }} v{{ version }}`, with the package metadata as context.
#[cfg(feature = "minijinja")]
#[derive(Debug, Clone, Default)]
pub struct JinjaHeader {
    context: serde_json::Map<String, serde_json::Value>,
}

#[cfg(feature = "minijinja")]
impl JinjaHeader {
    pub fn new(package: &crate::PackageMetadata) -> Self {
        let mut context: serde_json::Map<_, _> = package
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        context.insert("name".into(), package.name.clone().into());
        context.insert("version".into(), package.version.clone().into());

        Self { context }
    }
}

#[cfg(feature = "minijinja")]
impl HeaderTemplate for JinjaHeader {
    fn render(&self, text: &str) -> Result<String, CollaboratorError> {
        let env = minijinja::Environment::new();

        env.render_str(text, &self.context)
            .map_err(|e| CollaboratorError::new("minijinja", e))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_plain() {
        assert_eq!(PlainHeader.render("{{ name }}").unwrap(), "{{ name }}");
    }

    #[cfg(feature = "minijinja")]
    #[test]
    fn test_jinja() {
        let package: crate::PackageMetadata =
            serde_json::from_str(r#"{"name": "site", "version": "1.0.0", "license": "MIT"}"#).unwrap();
        let header = JinjaHeader::new(&package);

        assert_eq!(
            header.render("{{ name }} v{{ version }} ({{ license }})").unwrap(),
            "site v1.0.0 (MIT)"
        );
    }
}
