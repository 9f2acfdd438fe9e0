//! Publish destinations: a local directory of markdown files or a webhook.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use draftfix_core::{PublishError, Publisher};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;

/// Writes each article to `<dir>/<slug>.md`.
///
/// Files are staged in a temp file and moved into place without
/// overwriting; a slug collision gets a numeric suffix.
pub struct DirectoryPublisher {
    dir: PathBuf,
}

impl DirectoryPublisher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Publisher for DirectoryPublisher {
    async fn publish(
        &self,
        title: &str,
        body: &str,
        image_ref: Option<&str>,
    ) -> Result<String, PublishError> {
        let dir = self.dir.clone();
        let slug = slugify(title);
        let content = render_markdown(title, body, image_ref);

        let path = tokio::task::spawn_blocking(move || write_unique(&dir, &slug, &content))
            .await
            .map_err(|e| PublishError::Io(e.to_string()))?
            .map_err(|e| PublishError::Io(e.to_string()))?;

        debug!(path = %path.display(), "article written");
        Ok(path.display().to_string())
    }
}

fn render_markdown(title: &str, body: &str, image_ref: Option<&str>) -> String {
    let mut out = format!("# {title}\n\n");
    if let Some(image) = image_ref {
        out.push_str(&format!("![]({image})\n\n"));
    }
    out.push_str(body.trim_end());
    out.push('\n');
    out
}

fn write_unique(dir: &Path, slug: &str, content: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;

    let mut n = 1;
    loop {
        let name = if n == 1 {
            format!("{slug}.md")
        } else {
            format!("{slug}-{n}.md")
        };
        let target = dir.join(name);
        match tmp.persist_noclobber(&target) {
            Ok(_) => return Ok(target),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                tmp = e.file;
                n += 1;
            }
            Err(e) => return Err(e.error),
        }
    }
}

/// Lowercase ASCII slug; runs of anything else collapse to one `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug.to_string()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload<'a> {
    title: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_ref: Option<&'a str>,
}

/// POSTs each article as JSON and reads the destination reference from the
/// response's `url` or `id` field.
pub struct WebhookPublisher {
    client: reqwest::Client,
    url: String,
}

impl WebhookPublisher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Publisher for WebhookPublisher {
    async fn publish(
        &self,
        title: &str,
        body: &str,
        image_ref: Option<&str>,
    ) -> Result<String, PublishError> {
        let payload = WebhookPayload {
            title,
            body,
            image_ref,
        };
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PublishError::Unavailable(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| PublishError::Unavailable(e.to_string()))?;
        destination_ref(status, &text)
    }
}

fn destination_ref(status: u16, body: &str) -> Result<String, PublishError> {
    let snippet: String = body.chars().take(200).collect();
    match status {
        200..=299 => {}
        400..=499 => return Err(PublishError::Rejected(format!("HTTP {status}: {snippet}"))),
        _ => return Err(PublishError::Unavailable(format!("HTTP {status}: {snippet}"))),
    }

    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| PublishError::Rejected(format!("unreadable response: {e}")))?;
    ["url", "id"]
        .iter()
        .find_map(|key| match value.get(key)? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .ok_or_else(|| PublishError::Rejected("response carried no id or url".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn slugs_are_lowercase_and_dashed() {
        assert_eq!(slugify("Ferry Terminal: Approved!"), "ferry-terminal-approved");
        assert_eq!(slugify("  --  "), "untitled");
        assert_eq!(slugify("Café opens"), "caf-opens");
    }

    #[tokio::test]
    async fn directory_publisher_never_overwrites() {
        let dir = tempdir().unwrap();
        let publisher = DirectoryPublisher::new(dir.path().join("out"));

        let first = publisher
            .publish("Harbour Vote", "First body.", Some("img/pier.jpg"))
            .await
            .unwrap();
        let second = publisher
            .publish("Harbour vote", "Second body.", None)
            .await
            .unwrap();

        assert!(first.ends_with("harbour-vote.md"));
        assert!(second.ends_with("harbour-vote-2.md"));

        let text = std::fs::read_to_string(&first).unwrap();
        assert_eq!(text, "# Harbour Vote\n\n![](img/pier.jpg)\n\nFirst body.\n");
        let text = std::fs::read_to_string(&second).unwrap();
        assert!(text.contains("Second body."));
    }

    #[test]
    fn webhook_reference_prefers_url_then_id() {
        assert_eq!(
            destination_ref(201, r#"{"id": 42, "url": "https://news/42"}"#).unwrap(),
            "https://news/42"
        );
        assert_eq!(destination_ref(200, r#"{"id": 42}"#).unwrap(), "42");
        assert_eq!(destination_ref(200, r#"{"id": "p-7"}"#).unwrap(), "p-7");
    }

    #[test]
    fn webhook_errors_split_by_status() {
        assert!(matches!(
            destination_ref(422, "missing title"),
            Err(PublishError::Rejected(_))
        ));
        assert!(matches!(
            destination_ref(503, "down"),
            Err(PublishError::Unavailable(_))
        ));
        assert!(matches!(
            destination_ref(200, r#"{"ok": true}"#),
            Err(PublishError::Rejected(_))
        ));
    }
}
