use crate::error::CollaboratorError;
use crate::tools::StyleMinifier;

/// Stylesheet compression through the `grass` Sass compiler. Plain CSS is
/// valid SCSS, so compiling with the compressed output style minifies it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Grass;

impl StyleMinifier for Grass {
    fn minify(&self, css: &str) -> Result<String, CollaboratorError> {
        let opts = grass::Options::default().style(grass::OutputStyle::Compressed);

        grass::from_string(css.to_string(), &opts)
            .map_err(|e| CollaboratorError::new("grass", anyhow::anyhow!("{e}")))
    }
}
