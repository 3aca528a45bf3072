use anyhow::{bail, Context, Result};
use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::config::Credentials;
use crate::error::LookupError;

const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Ruleset phase the rewrite rules live in.
pub const TRANSFORM_PHASE: &str = "http_request_transform";

/// Content prefix marking a TXT record as a DNSLink pointer.
pub const DNSLINK_PREFIX: &str = "dnslink=";

/// Thin client over the Cloudflare v4 REST API.
///
/// Only covers the lookups and writes the updater needs: zones, transform
/// rulesets and their rules, TXT records and Web3 Gateway hostnames.
pub struct CloudflareApi {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

// Cloudflare API types

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiError>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i32,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct Ruleset {
    pub id: String,
    pub phase: String,
}

#[derive(Debug, Deserialize)]
struct RulesetDetail {
    #[serde(default)]
    rules: Vec<Rule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Web3Hostname {
    pub id: String,
    pub name: String,
}

/// PATCH body for a URI-rewrite rule.
#[derive(Debug, Serialize)]
pub struct RulePatch {
    pub action: &'static str,
    pub expression: String,
    pub action_parameters: ActionParameters,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct ActionParameters {
    pub uri: UriRewrite,
}

#[derive(Debug, Serialize)]
pub struct UriRewrite {
    pub path: PathExpression,
}

#[derive(Debug, Serialize)]
pub struct PathExpression {
    pub expression: String,
}

#[derive(Debug, Serialize)]
struct CreateTxtRecord<'a> {
    #[serde(rename = "type")]
    record_type: &'static str,
    name: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateRecordContent<'a> {
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateDnslink<'a> {
    dnslink: &'a str,
}

impl<T> Envelope<T> {
    fn into_result(self, what: &str) -> Result<(Option<T>, Option<ResultInfo>)> {
        if !self.success {
            let errors: Vec<String> = self
                .errors
                .iter()
                .map(|e| format!("{}: {}", e.code, e.message))
                .collect();
            bail!("Cloudflare API error on {}: {}", what, errors.join(", "));
        }
        Ok((self.result, self.result_info))
    }
}

impl CloudflareApi {
    pub fn new(credentials: Credentials) -> Self {
        Self::with_base_url(credentials, CLOUDFLARE_API_BASE)
    }

    /// Point the client at a different API base; used by tests.
    pub fn with_base_url(credentials: Credentials, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            credentials,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let req = self
            .client
            .request(method, &url)
            .header("Content-Type", "application/json");

        match &self.credentials {
            Credentials::Token { api_token } => {
                req.header("Authorization", format!("Bearer {}", api_token))
            }
            Credentials::KeyPair { email, api_key } => {
                req.header("X-Auth-Email", email).header("X-Auth-Key", api_key)
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<Envelope<T>> {
        self.request(Method::GET, path)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", what))?
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", what))
    }

    async fn send_json<B: Serialize>(&self, method: Method, path: &str, body: &B, what: &str) -> Result<()> {
        let response: Envelope<serde_json::Value> = self
            .request(method, path)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to send {}", what))?
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", what))?;

        response.into_result(what)?;
        Ok(())
    }

    /// Resolves a zone name to its id by paging through the zone list.
    ///
    /// Pages are fetched one at a time and traversal stops at the first
    /// exact name match.
    pub async fn find_zone_id(&self, name: &str) -> Result<String> {
        let mut page = 1;
        loop {
            let response: Envelope<Vec<Zone>> =
                self.get(&format!("zones?page={}", page), "zones").await?;
            let (result, info) = response.into_result("zones")?;

            for zone in result.unwrap_or_default() {
                if zone.name == name {
                    return Ok(zone.id);
                }
            }

            let total_pages = info.map(|i| i.total_pages).unwrap_or(page);
            if page >= total_pages {
                break;
            }
            page += 1;
        }

        Err(LookupError::NotFound(format!("zone {}", name)).into())
    }

    /// Returns the id of the first ruleset in the http_request_transform phase.
    pub async fn find_ruleset_id(&self, zone_id: &str) -> Result<String> {
        let response: Envelope<Vec<Ruleset>> = self
            .get(&format!("zones/{}/rulesets", zone_id), "rulesets")
            .await?;
        let (result, _) = response.into_result("rulesets")?;

        result
            .unwrap_or_default()
            .into_iter()
            .find(|ruleset| ruleset.phase == TRANSFORM_PHASE)
            .map(|ruleset| ruleset.id)
            .ok_or_else(|| {
                LookupError::NotFound(format!("ruleset with phase {}", TRANSFORM_PHASE)).into()
            })
    }

    /// Fetches a ruleset's rules in provider order.
    pub async fn get_rules(&self, zone_id: &str, ruleset_id: &str) -> Result<Vec<Rule>> {
        let response: Envelope<RulesetDetail> = self
            .get(
                &format!("zones/{}/rulesets/{}", zone_id, ruleset_id),
                "ruleset rules",
            )
            .await?;
        let (result, _) = response.into_result("ruleset rules")?;

        let rules = result.map(|detail| detail.rules).unwrap_or_default();
        if rules.is_empty() {
            return Err(LookupError::NotFound(format!("rule in ruleset {}", ruleset_id)).into());
        }
        Ok(rules)
    }

    /// Finds the DNSLink TXT record for `name`, if one exists.
    ///
    /// Absence is not an error; the caller creates the record instead.
    pub async fn find_dnslink_record(&self, zone_id: &str, name: &str) -> Result<Option<DnsRecord>> {
        let mut page = 1;
        loop {
            let response: Envelope<Vec<DnsRecord>> = self
                .get(
                    &format!("zones/{}/dns_records?type=TXT&page={}", zone_id, page),
                    "TXT records",
                )
                .await?;
            let (result, info) = response.into_result("TXT records")?;

            for record in result.unwrap_or_default() {
                if record.name == name && record.content.starts_with(DNSLINK_PREFIX) {
                    return Ok(Some(record));
                }
            }

            let total_pages = info.map(|i| i.total_pages).unwrap_or(page);
            if page >= total_pages {
                return Ok(None);
            }
            page += 1;
        }
    }

    pub async fn list_web3_hostnames(&self, zone_id: &str) -> Result<Vec<Web3Hostname>> {
        let response: Envelope<Vec<Web3Hostname>> = self
            .get(&format!("zones/{}/web3/hostnames", zone_id), "web3 hostnames")
            .await?;
        let (result, _) = response.into_result("web3 hostnames")?;
        Ok(result.unwrap_or_default())
    }

    pub async fn patch_rule(
        &self,
        zone_id: &str,
        ruleset_id: &str,
        rule_id: &str,
        patch: &RulePatch,
    ) -> Result<()> {
        self.send_json(
            Method::PATCH,
            &format!("zones/{}/rulesets/{}/rules/{}", zone_id, ruleset_id, rule_id),
            patch,
            "rewrite rule update",
        )
        .await
    }

    pub async fn patch_dns_record(&self, zone_id: &str, record_id: &str, content: &str) -> Result<()> {
        self.send_json(
            Method::PATCH,
            &format!("zones/{}/dns_records/{}", zone_id, record_id),
            &UpdateRecordContent { content },
            "TXT record update",
        )
        .await
    }

    pub async fn create_dns_record(&self, zone_id: &str, name: &str, content: &str) -> Result<()> {
        self.send_json(
            Method::POST,
            &format!("zones/{}/dns_records", zone_id),
            &CreateTxtRecord {
                record_type: "TXT",
                name,
                content,
            },
            "TXT record create",
        )
        .await
    }

    pub async fn patch_web3_hostname(&self, zone_id: &str, record_id: &str, dnslink: &str) -> Result<()> {
        self.send_json(
            Method::PATCH,
            &format!("zones/{}/web3/hostnames/{}", zone_id, record_id),
            &UpdateDnslink { dnslink },
            "web3 hostname update",
        )
        .await
    }
}
