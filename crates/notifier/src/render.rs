use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::RenderError;

/// Placeholder values keyed by name; `{Key}` in a template becomes the value.
pub type Substitutions = HashMap<String, String>;

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, template: &str, substitutions: &Substitutions)
    -> Result<String, RenderError>;
}

/// Renders `<dir>/<template>.html` files.
#[derive(Debug, Clone)]
pub struct FileTemplateRenderer {
    dir: PathBuf,
}

impl FileTemplateRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn template_path(&self, template: &str) -> Result<PathBuf, RenderError> {
        let valid = !template.is_empty()
            && template
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(RenderError::InvalidName(template.to_string()));
        }
        Ok(self.dir.join(format!("{template}.html")))
    }
}

#[async_trait]
impl Renderer for FileTemplateRenderer {
    async fn render(
        &self,
        template: &str,
        substitutions: &Substitutions,
    ) -> Result<String, RenderError> {
        let path = self.template_path(template)?;

        let source = tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RenderError::NotFound(path.display().to_string())
            } else {
                RenderError::Io {
                    name: template.to_string(),
                    source: e,
                }
            }
        })?;

        Ok(substitute(&source, substitutions))
    }
}

/// Replace every `{Key}` occurrence with its value in a single left-to-right pass.
///
/// Substituted values are never rescanned. Unknown placeholders are left as-is.
pub fn substitute(source: &str, substitutions: &Substitutions) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];

        match tail[1..].find(['{', '}']) {
            Some(close) if tail.as_bytes()[close + 1] == b'}' => {
                let key = &tail[1..close + 1];
                match substitutions.get(key) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&tail[..close + 2]),
                }
                rest = &tail[close + 2..];
            }
            Some(close) => {
                // Another `{` before any `}`: keep the text up to it literally.
                out.push_str(&tail[..close + 1]);
                rest = &tail[close + 1..];
            }
            None => {
                out.push_str(tail);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subs(pairs: &[(&str, &str)]) -> Substitutions {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitute_replaces_all_occurrences() {
        let out = substitute(
            "Hi {UserName}! Bye {UserName}.",
            &subs(&[("UserName", "Jane")]),
        );
        assert_eq!(out, "Hi Jane! Bye Jane.");
    }

    #[test]
    fn test_substitute_leaves_unknown_placeholders() {
        let out = substitute("Hi {UserName}, see {Link}", &subs(&[("UserName", "Bob")]));
        assert_eq!(out, "Hi Bob, see {Link}");
    }

    #[test]
    fn test_substitute_does_not_rescan_values() {
        let out = substitute(
            "{Greeting} {UserName}",
            &subs(&[("Greeting", "Hi {UserName}"), ("UserName", "Jane")]),
        );
        assert_eq!(out, "Hi {UserName} Jane");
    }

    #[test]
    fn test_substitute_handles_stray_braces() {
        let out = substitute(
            "a { b {UserName} c } {",
            &subs(&[("UserName", "Bob")]),
        );
        assert_eq!(out, "a { b Bob c } {");
    }

    #[tokio::test]
    async fn test_render_reads_template_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("welcome_email.html"),
            "<h1>Welcome, {UserName}</h1>",
        )
        .unwrap();

        let renderer = FileTemplateRenderer::new(dir.path());
        let html = renderer
            .render("welcome_email", &subs(&[("UserName", "John Doe")]))
            .await
            .unwrap();
        assert_eq!(html, "<h1>Welcome, John Doe</h1>");
    }

    #[tokio::test]
    async fn test_render_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = FileTemplateRenderer::new(dir.path());
        let err = renderer
            .render("welcome_email", &Substitutions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_render_rejects_path_traversal() {
        let renderer = FileTemplateRenderer::new("templates");
        let err = renderer
            .render("../secrets", &Substitutions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidName(_)));
    }
}
