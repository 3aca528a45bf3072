use anyhow::Result;
use log::info;

use crate::cloudflare::CloudflareApi;
use crate::error::LookupError;

use super::UpdateRequest;

/// Points the zone's Web3 Gateway hostname record at the new link.
///
/// The record is selected by exact hostname match; zero and multiple
/// matches are distinct errors rather than "first record wins".
pub async fn update(api: &CloudflareApi, zone_id: &str, req: &UpdateRequest) -> Result<String> {
    let hostnames = api.list_web3_hostnames(zone_id).await?;

    let mut candidates = hostnames.iter().filter(|h| h.name == req.record);
    let record_id = match (candidates.next(), candidates.next()) {
        (Some(hostname), None) => &hostname.id,
        (Some(_), Some(_)) => {
            return Err(LookupError::Ambiguous(format!("web3 hostname {}", req.record)).into())
        }
        (None, _) => {
            return Err(LookupError::NotFound(format!("web3 hostname {}", req.record)).into())
        }
    };
    info!("Found web3 hostname {}", record_id);

    api.patch_web3_hostname(zone_id, record_id, &req.link).await?;

    Ok(req.link.clone())
}
