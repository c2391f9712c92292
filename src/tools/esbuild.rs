use std::process::Stdio;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::CollaboratorError;
use crate::tools::{Minified, Minifier, MinifyOptions, TranspileOptions, Transpiled, Transpiler};

const TOOL: &str = "esbuild";
const INLINE_MAP: &str = "//# sourceMappingURL=data:application/json;base64,";

/// Transpiler and minifier backed by the `esbuild` command line tool.
///
/// **Note:** This requires the `esbuild` binary to be available in the system PATH.
#[derive(Debug, Clone)]
pub struct Esbuild {
    program: String,
}

impl Default for Esbuild {
    fn default() -> Self {
        Self {
            program: "esbuild".to_string(),
        }
    }
}

impl Esbuild {
    /// Use a specific `esbuild` executable.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: Vec<String>, input: String) -> Result<String, CollaboratorError> {
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CollaboratorError::new(TOOL, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| CollaboratorError::new(TOOL, e))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| CollaboratorError::new(TOOL, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return Err(CollaboratorError::new(TOOL, anyhow::anyhow!(stderr)));
        }

        String::from_utf8(output.stdout).map_err(|e| CollaboratorError::new(TOOL, e))
    }
}

/// Split an inline `sourceMappingURL` comment off the generated code.
fn split_inline_map(output: &str) -> Result<(String, Option<String>), CollaboratorError> {
    let Some(start) = output.rfind(INLINE_MAP) else {
        return Ok((output.to_string(), None));
    };

    let encoded = output[start + INLINE_MAP.len()..].trim();
    let decoded = STANDARD
        .decode(encoded)
        .map_err(|e| CollaboratorError::new(TOOL, e))?;
    let map = String::from_utf8(decoded).map_err(|e| CollaboratorError::new(TOOL, e))?;

    Ok((output[..start].trim_end().to_string(), Some(map)))
}

/// Transpiler options forwarded to esbuild as flags.
const FORWARDED: [&str; 3] = ["target", "format", "platform"];

/// Keys of the transpiler options esbuild never sees.
fn unsupported_keys(extra: &Value) -> Vec<&str> {
    match extra.as_object() {
        Some(object) => object
            .keys()
            .map(String::as_str)
            .filter(|key| !FORWARDED.contains(key))
            .collect(),
        None => Vec::new(),
    }
}

fn option_arg(extra: &Value, key: &str) -> Option<String> {
    match extra.get(key)? {
        Value::String(s) => Some(format!("--{key}={s}")),
        Value::Array(items) => {
            let items: Vec<_> = items.iter().filter_map(Value::as_str).collect();
            Some(format!("--{key}={}", items.join(",")))
        }
        _ => None,
    }
}

#[async_trait]
impl Transpiler for Esbuild {
    async fn transpile(
        &self,
        code: &str,
        options: &TranspileOptions<'_>,
    ) -> Result<Transpiled, CollaboratorError> {
        let mut args = vec![
            "--loader=js".to_string(),
            format!("--sourcefile={}", options.file_name),
        ];
        args.extend(FORWARDED.iter().filter_map(|key| option_arg(options.extra, key)));

        let ignored = unsupported_keys(options.extra);
        if !ignored.is_empty() {
            tracing::debug!(file = options.file_name, ?ignored, "transpile options not supported by esbuild");
        }

        if options.source_maps {
            args.push("--sourcemap=inline".to_string());
        }

        let output = self.run(args, code.to_string()).await?;
        let (code, map) = split_inline_map(&output)?;

        Ok(Transpiled {
            code,
            map,
            ast: None,
        })
    }
}

#[async_trait]
impl Minifier for Esbuild {
    async fn minify(
        &self,
        code: &str,
        options: &MinifyOptions,
    ) -> Result<Minified, CollaboratorError> {
        let mut args = vec!["--loader=js".to_string(), "--minify".to_string()];
        let mut input = code.to_string();

        if let Some(name) = &options.file_name {
            args.push(format!("--sourcefile={name}"));
        }

        if options.source_map.is_some() {
            args.push("--sourcemap=inline".to_string());

            if let Some(prior) = &options.prior_map {
                input.push('\n');
                input.push_str(INLINE_MAP);
                input.push_str(&STANDARD.encode(prior));
                input.push('\n');
            }
        }

        let output = self.run(args, input).await?;
        let (mut code, map) = split_inline_map(&output)?;

        let map = match (map, &options.source_map) {
            (Some(map), Some(reference)) => {
                let mut json: Value =
                    serde_json::from_str(&map).map_err(|e| CollaboratorError::new(TOOL, e))?;
                if let Some(object) = json.as_object_mut() {
                    object.insert("sourceRoot".into(), Value::String(reference.sources.clone()));
                }

                code.push_str("\n//# sourceMappingURL=");
                code.push_str(&reference.url);

                Some(json.to_string())
            }
            _ => None,
        };

        Ok(Minified { code, map })
    }
}
