pub mod rules;
pub mod txt;
pub mod web3;

#[cfg(test)]
mod rules_tests;

use anyhow::Result;
use log::info;

use crate::cloudflare::{CloudflareApi, DNSLINK_PREFIX};
use crate::config::UpdateMode;

/// A single DNSLink update: point `record` under `zone` at `link`.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    /// Zone name, e.g. "example.com".
    pub zone: String,
    /// New content path, e.g. "/ipfs/bafy123".
    pub link: String,
    /// Hostname the rewrite rules match.
    pub record: String,
}

pub fn dnslink_record_name(zone: &str) -> String {
    format!("_dnslink.ipns.{}", zone)
}

pub fn dnslink_content(link: &str) -> String {
    format!("{}{}", DNSLINK_PREFIX, link)
}

/// Applies `req` to the zone and returns the link as confirmation.
///
/// The zone id is re-resolved on every call; nothing is cached between
/// invocations. Lookups run sequentially and any lookup failure aborts
/// before a write is issued.
pub async fn update(api: &CloudflareApi, mode: UpdateMode, req: &UpdateRequest) -> Result<String> {
    let zone_id = api.find_zone_id(&req.zone).await?;
    info!("Found zone id {}", zone_id);

    match mode {
        UpdateMode::Rules => rules::update(api, &zone_id, req).await,
        UpdateMode::Txt => txt::update(api, &zone_id, req).await,
        UpdateMode::Web3 => web3::update(api, &zone_id, req).await,
    }
}
