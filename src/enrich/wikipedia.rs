use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE: &str = "https://{lang}.wikipedia.org/api/rest_v1/page/summary/";

#[derive(Debug, Deserialize)]
struct PageSummary {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    extract: String,
}

/// Short encyclopedia summaries for terms mentioned in a lecture
pub struct WikipediaClient {
    client: reqwest::Client,
    base_url: String,
}

impl WikipediaClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE)
    }

    /// `base_url` may contain `{lang}`; the URL-encoded title is appended
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("lecture-lens/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn summary_url(&self, query: &str, lang: &str) -> String {
        let lang = if lang.trim().is_empty() { "en" } else { lang.trim() };
        format!(
            "{}{}",
            self.base_url.replace("{lang}", lang),
            urlencoding::encode(&query.trim().replace(' ', "_"))
        )
    }

    async fn fetch(&self, query: &str, lang: &str) -> Result<String> {
        let url = self.summary_url(query, lang);
        debug!("Wikipedia lookup: {}", url);

        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(anyhow!("no page named '{}'", query));
        }
        if !response.status().is_success() {
            return Err(anyhow!("HTTP {}", response.status()));
        }

        let page: PageSummary = response.json().await?;
        if page.kind == "disambiguation" {
            return Err(anyhow!("'{}' has several meanings", query));
        }
        if page.extract.trim().is_empty() {
            return Err(anyhow!("empty summary for '{}'", query));
        }
        Ok(page.extract)
    }

    /// `"[Wikipedia] ..."` with at most `sentences` sentences. Lookup errors
    /// are reported in the returned text rather than raised.
    pub async fn summary(&self, query: &str, lang: &str, sentences: usize) -> String {
        match self.fetch(query, lang).await {
            Ok(extract) => format!("[Wikipedia] {}", first_sentences(&extract, sentences)),
            Err(e) => format!("[Wikipedia] lookup failed: {}", e),
        }
    }
}

/// Leading `count` sentences, ending at `.`, `!`, `?` or `。`
pub fn first_sentences(text: &str, count: usize) -> &str {
    let text = text.trim();
    if count == 0 {
        return "";
    }

    let mut seen = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((offset, ch)) = chars.next() {
        if !matches!(ch, '.' | '!' | '?' | '。') {
            continue;
        }
        let at_boundary = match chars.peek() {
            None => true,
            Some((_, next)) => next.is_whitespace() || ch == '。',
        };
        if at_boundary {
            seen += 1;
            if seen == count {
                return &text[..offset + ch.len_utf8()];
            }
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sentences() {
        let text = "Entropy is a measure. It was defined by Shannon in 1948. Version 2.0 came later.";
        assert_eq!(first_sentences(text, 1), "Entropy is a measure.");
        assert_eq!(first_sentences(text, 2), "Entropy is a measure. It was defined by Shannon in 1948.");
        assert_eq!(first_sentences(text, 10), text);
        assert_eq!(first_sentences("엔트로피는 척도이다。두 번째。", 1), "엔트로피는 척도이다。");
    }

    #[test]
    fn test_summary_url_encodes_title() {
        let client = WikipediaClient::new().unwrap();
        assert_eq!(
            client.summary_url("Gradient descent", "en"),
            "https://en.wikipedia.org/api/rest_v1/page/summary/Gradient_descent"
        );
        assert_eq!(
            client.summary_url("경사 하강법", "ko"),
            format!(
                "https://ko.wikipedia.org/api/rest_v1/page/summary/{}",
                urlencoding::encode("경사_하강법")
            )
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_reported_in_text() {
        let client = WikipediaClient::with_base_url("http://127.0.0.1:9/{lang}/").unwrap();
        let summary = client.summary("anything", "en", 3).await;
        assert!(summary.starts_with("[Wikipedia] lookup failed:"));
    }
}
