//! Web research via the DuckDuckGo Instant Answer API.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::language::LanguageDescriptor;
use crate::services::{ResearchService, ServiceError, ensure_success};

const DDG_URL: &str = "https://api.duckduckgo.com/";
const MAX_RESULTS: usize = 5;
pub const NO_RESULTS: &str = "No search results found.";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

/// Either a single topic or a named group of topics.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RelatedTopic {
    Topic {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL")]
        first_url: String,
    },
    Group {
        #[serde(rename = "Name")]
        name: String,
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
}

#[derive(Debug, PartialEq)]
pub(crate) struct SearchHit {
    title: String,
    url: String,
    content: String,
}

fn flatten(topics: Vec<RelatedTopic>, out: &mut Vec<SearchHit>) {
    for topic in topics {
        match topic {
            RelatedTopic::Topic { text, first_url } => {
                // The first clause of the text is the topic title.
                let title = text.split(" - ").next().unwrap_or(&text).to_owned();
                out.push(SearchHit {
                    title,
                    url: first_url,
                    content: text,
                });
            }
            RelatedTopic::Group { name: _, topics } => flatten(topics, out),
        }
    }
}

pub(crate) fn collect_hits(answer: InstantAnswer) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    if !answer.abstract_text.is_empty() {
        hits.push(SearchHit {
            title: answer.heading,
            url: answer.abstract_url,
            content: answer.abstract_text,
        });
    }
    flatten(answer.related_topics, &mut hits);
    hits.truncate(MAX_RESULTS);
    hits
}

pub(crate) fn format_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return NO_RESULTS.to_owned();
    }
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "[{}] {}\nURL: {}\nContent: {}\n\n",
                i + 1,
                hit.title,
                hit.url,
                hit.content
            )
        })
        .collect()
}

/// DuckDuckGo region code for a language.
fn region(code: &str) -> &'static str {
    match code {
        "it" => "it-it",
        "es" => "es-es",
        "fr" => "fr-fr",
        "de" => "de-de",
        _ => "us-en",
    }
}

/// Keyless research back-end.
#[derive(Debug, Clone, Default)]
pub struct DuckDuckGoResearch {
    http: reqwest::Client,
}

impl DuckDuckGoResearch {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResearchService for DuckDuckGoResearch {
    async fn research(
        &self,
        topic: &str,
        language: LanguageDescriptor,
    ) -> Result<String, ServiceError> {
        info!(topic, language = language.code, "searching the web");

        let resp = self
            .http
            .get(DDG_URL)
            .query(&[
                ("q", topic),
                ("kl", region(language.code)),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?;
        // The API answers with `application/x-javascript`, so decode by hand.
        let body = ensure_success("duckduckgo", resp).await?.text().await?;
        let answer: InstantAnswer =
            serde_json::from_str(&body).map_err(|e| ServiceError::MalformedResponse {
                service: "duckduckgo",
                detail: e.to_string(),
            })?;

        let hits = collect_hits(answer);
        if hits.is_empty() {
            warn!(topic, "no search results");
        }
        Ok(format_hits(&hits))
    }
}
