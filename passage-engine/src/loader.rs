//! Source content loading: inline text, plain URLs, and YouTube
//! transcripts.

use std::time::Duration;

use tracing::debug;

use passage_core::{PassageError, Resource, Result};

/// Timeout for source fetches.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches resource content from its source.
pub struct DocumentLoader {
    http: reqwest::Client,
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl DocumentLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the content for a resource: inline content wins, then the URL.
    pub async fn load(&self, resource: &Resource) -> Result<String> {
        if let Some(content) = &resource.content {
            if !content.is_empty() {
                return Ok(content.clone());
            }
        }
        let Some(url) = &resource.url else {
            return Err(PassageError::Loader(format!(
                "resource {} has neither content nor url",
                resource.id
            )));
        };
        self.fetch(url).await
    }

    /// Fetch a URL, dispatching YouTube watch links to the transcript
    /// endpoint.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        if let Some(video_id) = youtube_video_id(url) {
            return self.fetch_youtube_transcript(&video_id).await;
        }
        let response = self
            .http
            .get(url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| PassageError::Loader(format!("fetch failed for {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(PassageError::Loader(format!(
                "fetch of {url} returned {}",
                response.status()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| PassageError::Loader(format!("read failed for {url}: {e}")))?;
        debug!(url, bytes = body.len(), "fetched source");
        Ok(body)
    }

    async fn fetch_youtube_transcript(&self, video_id: &str) -> Result<String> {
        let url = format!("https://video.google.com/timedtext?lang=en&v={video_id}");
        let response = self
            .http
            .get(&url)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| PassageError::Loader(format!("transcript fetch failed: {e}")))?;
        if !response.status().is_success() {
            return Err(PassageError::Loader(format!(
                "transcript fetch returned {}",
                response.status()
            )));
        }
        let xml = response
            .text()
            .await
            .map_err(|e| PassageError::Loader(format!("transcript read failed: {e}")))?;
        let transcript = strip_transcript_xml(&xml);
        if transcript.is_empty() {
            return Err(PassageError::Loader(format!(
                "no english transcript for video {video_id}"
            )));
        }
        Ok(transcript)
    }
}

/// Extract the video id from `youtube.com/watch?v=…` and `youtu.be/…`
/// links.
fn youtube_video_id(url: &str) -> Option<String> {
    let lowered = url.to_ascii_lowercase();
    if lowered.contains("youtube.com/watch") {
        let query = url.split('?').nth(1)?;
        for pair in query.split('&') {
            if let Some(id) = pair.strip_prefix("v=") {
                return Some(id.to_string());
            }
        }
        None
    } else if lowered.contains("youtu.be/") {
        url.split("youtu.be/")
            .nth(1)
            .map(|rest| rest.split(['?', '&']).next().unwrap_or(rest).to_string())
            .filter(|id| !id.is_empty())
    } else {
        None
    }
}

/// Flatten timedtext XML into plain text: drop tags, join caption lines,
/// decode the handful of entities the endpoint emits.
fn strip_transcript_xml(xml: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    for ch in xml.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                if !out.ends_with(' ') && !out.is_empty() {
                    out.push(' ');
                }
            }
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_youtube_urls() {
        assert_eq!(
            youtube_video_id("https://www.youtube.com/watch?v=abc123&t=10"),
            Some("abc123".to_string())
        );
        assert_eq!(
            youtube_video_id("https://youtu.be/xyz789?si=tracker"),
            Some("xyz789".to_string())
        );
        assert_eq!(youtube_video_id("https://example.com/watch?v=abc"), None);
    }

    #[test]
    fn transcript_xml_flattens_to_text() {
        let xml = r#"<?xml version="1.0"?><transcript><text start="0">Hello &amp; welcome</text><text start="2">to the show</text></transcript>"#;
        assert_eq!(strip_transcript_xml(xml), "Hello & welcome to the show");
    }
}
