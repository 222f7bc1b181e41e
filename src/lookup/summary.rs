//! Condenses a bounty board page into one spoken sentence using the Gemini
//! `generateContent` REST endpoint.

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use serde_json::{json, Value};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct Summarizer {
    client: Client,
    api_key: String,
    model: String,
}

impl Summarizer {
    pub fn new(client: Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }

    /// Builds a summarizer from `GEMINI_API_KEY`, if set.
    pub fn from_env(client: Client, model: &str) -> Option<Self> {
        std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(|key| Self::new(client, key, model.to_string()))
    }

    /// Returns the model's plain-text verdict for `player`.
    pub fn summarize(&self, player: &str, page_text: &str) -> Result<String> {
        let body = json!({
            "contents": [{ "parts": [{ "text": build_prompt(player, page_text) }] }]
        });

        let response = self
            .client
            .post(format!("{}/{}:generateContent", API_BASE, self.model))
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&body)?)
            .send()
            .context("Summary request failed")?;

        let status = response.status();
        let text = response.text().context("Failed to read summary response")?;
        if !status.is_success() {
            return Err(anyhow!("Summary request failed: HTTP {}", status));
        }

        extract_reply(&text)
    }
}

fn build_prompt(player: &str, page_text: &str) -> String {
    format!(
        "You are a tactical assistant for Arc Raiders.\n\
         User searched for: '{player}'.\n\
         Raw website data: \"{page_text}\"\n\n\
         Instructions:\n\
         1. Ignore the site slogan and any Discord invitations.\n\
         2. Look for specific bounty tags (e.g. \"Voice Chat Snake\", \"Extraction Camper\").\n\
         3. If there are no specific tags or stats for this player, reply: \"Clean\".\n\
         4. If there are tags, summarize them in 10 words.\n\
         5. Start the sentence with \"{player} is listed for...\".\n\
         6. Plain text only."
    )
}

/// Pulls the first candidate's text out of a generateContent response.
fn extract_reply(response: &str) -> Result<String> {
    let value: Value = serde_json::from_str(response).context("Summary response is not JSON")?;
    let parts = value["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| anyhow!("Summary response has no candidates"))?;

    let reply: String = parts
        .iter()
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join("")
        .trim()
        .to_string();

    if reply.is_empty() {
        return Err(anyhow!("Summary response was empty"));
    }
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_reply() {
        let response = r#"{
            "candidates": [{
                "content": { "parts": [{ "text": " Raider99 is listed for door camping. \n" }] }
            }]
        }"#;
        assert_eq!(extract_reply(response).unwrap(), "Raider99 is listed for door camping.");
    }

    #[test]
    fn test_extract_reply_joins_parts() {
        let response = r#"{"candidates":[{"content":{"parts":[{"text":"Cle"},{"text":"an"}]}}]}"#;
        assert_eq!(extract_reply(response).unwrap(), "Clean");
    }

    #[test]
    fn test_extract_reply_rejects_missing_candidates() {
        assert!(extract_reply(r#"{"error":{"code":429}}"#).is_err());
        assert!(extract_reply(r#"{"candidates":[{"content":{"parts":[]}}]}"#).is_err());
        assert!(extract_reply("<html>").is_err());
    }

    #[test]
    fn test_prompt_names_player() {
        let prompt = build_prompt("Raider99", "some page");
        assert!(prompt.contains("'Raider99'"));
        assert!(prompt.contains("Start the sentence with \"Raider99 is listed for...\""));
    }
}
