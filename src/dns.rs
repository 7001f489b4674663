//! TXT record lookups for sending-domain verification.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DnsError {
    #[error("DNS request failed: {0}")]
    Request(String),

    #[error("DNS resolver returned status {0}")]
    Status(i32),
}

/// Checks whether a TXT record with the expected value is published.
#[cfg_attr(feature = "test-mocks", mockall::automock)]
pub trait DomainVerifier: Send + Sync {
    fn has_txt_record(&self, name: &str, expected: &str) -> Result<bool, DnsError>;
}

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: i32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

const TXT: u16 = 16;
/// DNS rcode for a name that does not exist.
const NXDOMAIN: i32 = 3;

/// TXT strings may be quoted and split into several chunks.
fn unquote_txt(data: &str) -> String {
    data.split("\" \"")
        .map(|chunk| chunk.trim_matches('"'))
        .collect()
}

fn answers_contain(response: &DohResponse, expected: &str) -> bool {
    response
        .answer
        .iter()
        .filter(|answer| answer.record_type == TXT)
        .any(|answer| unquote_txt(&answer.data).trim() == expected)
}

/// Resolver speaking the JSON flavour of DNS-over-HTTPS.
pub struct DohVerifier {
    client: reqwest::blocking::Client,
    resolver_url: String,
}

impl DohVerifier {
    pub fn new(resolver_url: impl Into<String>) -> Result<Self, DnsError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DnsError::Request(e.to_string()))?;
        Ok(Self {
            client,
            resolver_url: resolver_url.into(),
        })
    }
}

impl DomainVerifier for DohVerifier {
    fn has_txt_record(&self, name: &str, expected: &str) -> Result<bool, DnsError> {
        let response = self
            .client
            .get(&self.resolver_url)
            .query(&[("name", name), ("type", "TXT")])
            .header("accept", "application/dns-json")
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| DnsError::Request(e.to_string()))?
            .json::<DohResponse>()
            .map_err(|e| DnsError::Request(e.to_string()))?;

        match response.status {
            0 => Ok(answers_contain(&response, expected)),
            NXDOMAIN => Ok(false),
            other => Err(DnsError::Status(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_txt_chunks_are_joined() {
        assert_eq!(unquote_txt("\"afrimail-\" \"verification=x\""), "afrimail-verification=x");
        assert_eq!(unquote_txt("\"v=spf1 ~all\""), "v=spf1 ~all");
    }

    #[test]
    fn only_txt_answers_match() {
        let response: DohResponse = serde_json::from_str(
            r#"{"Status":0,"Answer":[
                {"name":"x","type":5,"data":"afrimail-verification=tok"},
                {"name":"x","type":16,"data":"\"afrimail-verification=tok\""}
            ]}"#,
        )
        .unwrap();
        assert!(answers_contain(&response, "afrimail-verification=tok"));
        assert!(!answers_contain(&response, "afrimail-verification=other"));
    }
}
