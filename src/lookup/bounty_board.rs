use anyhow::{anyhow, Context, Result};
use regex::Regex;
use reqwest::blocking::Client;
use std::time::Duration;

use super::summary::Summarizer;
use super::{LookupOutcome, LookupService};
use crate::monitor::config::LookupConfig;
use crate::monitor::registry::PlayerName;

/// Marker the board shows for a search without hits.
const NO_RESULTS_MARKER: &str = "NO TARGETS FOUND";

/// Site chrome that appears on every page and confuses the summary.
const BOILERPLATE_PHRASES: [&str; 12] = [
    "Speranza Bounties is a community-driven platform",
    "TRACK • VOTE • ELIMINATE",
    "MARK TARGETS",
    "VOTE DAILY",
    "CONFIRM KILLS",
    "About Speranza Bounties",
    "FAQ",
    "Sign In",
    "Join Our Discord!",
    "Connect with the Speranza Bounties community",
    "Don't show this again",
    "JOIN DISCORD SERVER",
];

/// Searches the bounty board over HTTP and summarizes any listing.
pub struct BountyBoardLookup {
    client: Client,
    search_url: String,
    summarizer: Option<Summarizer>,
    markup: MarkupStripper,
}

impl BountyBoardLookup {
    /// Builds the lookup. Every request is bounded by `timeout_secs`.
    pub fn from_config(config: &LookupConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent("raider-watch")
            .build()
            .context("Failed to build HTTP client")?;

        let summarizer = Summarizer::from_env(client.clone(), &config.summary_model);
        if summarizer.is_none() {
            crate::log("GEMINI_API_KEY not set, bounty listings will not be summarized");
        }

        Ok(Self {
            client,
            search_url: config.search_url.clone(),
            summarizer,
            markup: MarkupStripper::new()?,
        })
    }

    fn fetch_page_text(&self, name: &PlayerName) -> Result<String> {
        let url = self.search_url.replace("{name}", name.as_str());
        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("Request to {} failed", url))?;

        if !response.status().is_success() {
            return Err(anyhow!("Bounty board returned HTTP {}", response.status()));
        }

        let html = response.text().context("Failed to read bounty board page")?;
        Ok(self.markup.to_text(&html))
    }
}

impl LookupService for BountyBoardLookup {
    fn lookup(&self, name: &PlayerName) -> Result<LookupOutcome> {
        let page = self.fetch_page_text(name)?;
        if page.contains(NO_RESULTS_MARKER) {
            return Ok(LookupOutcome::Clean {
                details: "No Record".to_string(),
            });
        }

        let cleaned = strip_boilerplate(&page);
        match &self.summarizer {
            Some(summarizer) => {
                let reply = summarizer.summarize(name.as_str(), &cleaned)?;
                Ok(classify_summary(reply))
            }
            None => Ok(LookupOutcome::Bounty {
                details: format!("Warning. {} has a record.", name),
            }),
        }
    }
}

/// Maps the summarizer's reply onto an outcome.
fn classify_summary(reply: String) -> LookupOutcome {
    if reply.to_lowercase().contains("clean") {
        LookupOutcome::Clean {
            details: "Verified Clean".to_string(),
        }
    } else {
        LookupOutcome::Bounty { details: reply }
    }
}

fn strip_boilerplate(text: &str) -> String {
    let mut cleaned = text.to_string();
    for phrase in &BOILERPLATE_PHRASES {
        cleaned = cleaned.replace(phrase, "");
    }
    cleaned
}

/// Reduces an HTML page to its visible text.
struct MarkupStripper {
    hidden: Regex,
    tags: Regex,
    whitespace: Regex,
}

impl MarkupStripper {
    fn new() -> Result<Self> {
        Ok(Self {
            hidden: Regex::new(r"(?is)<(script|style|noscript)\b.*?</(script|style|noscript)>")?,
            tags: Regex::new(r"(?s)<[^>]*>")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    fn to_text(&self, html: &str) -> String {
        let text = self.hidden.replace_all(html, " ");
        let text = self.tags.replace_all(&text, " ");
        let text = text
            .replace("&nbsp;", " ")
            .replace("&amp;", "&")
            .replace("&#39;", "'")
            .replace("&quot;", "\"");
        self.whitespace.replace_all(&text, " ").trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markup_stripped_to_text() {
        let stripper = MarkupStripper::new().unwrap();
        let html = r#"<html><head><style>.x{color:red}</style><script>var a = "<b>";</script></head>
            <body><h1>NO TARGETS</h1> <p>FOUND&nbsp;here</p></body></html>"#;

        assert_eq!(stripper.to_text(html), "NO TARGETS FOUND here");
    }

    #[test]
    fn test_boilerplate_removed() {
        let text = "Sign In FAQ Raider99 Voice Chat Snake JOIN DISCORD SERVER";
        let cleaned = strip_boilerplate(text);
        assert!(!cleaned.contains("Sign In"));
        assert!(!cleaned.contains("DISCORD"));
        assert!(cleaned.contains("Raider99 Voice Chat Snake"));
    }

    #[test]
    fn test_classify_summary() {
        assert_eq!(
            classify_summary("Clean".to_string()),
            LookupOutcome::Clean {
                details: "Verified Clean".to_string()
            }
        );
        assert_eq!(
            classify_summary("Raider99 is listed for extraction camping.".to_string()),
            LookupOutcome::Bounty {
                details: "Raider99 is listed for extraction camping.".to_string()
            }
        );
    }

    #[test]
    #[ignore = "requires network access to the bounty board"]
    fn test_live_lookup() {
        let lookup = BountyBoardLookup::from_config(&LookupConfig::default()).unwrap();
        let name = PlayerName::new("zzzz_nobody_zzzz").unwrap();
        assert!(lookup.lookup(&name).is_ok());
    }
}
