use anyhow::Result;
use log::info;

use crate::cloudflare::CloudflareApi;

use super::{dnslink_content, dnslink_record_name, UpdateRequest};

/// Creates or updates the zone's DNSLink TXT record.
pub async fn update(api: &CloudflareApi, zone_id: &str, req: &UpdateRequest) -> Result<String> {
    let record_name = dnslink_record_name(&req.zone);
    let content = dnslink_content(&req.link);

    match api.find_dnslink_record(zone_id, &record_name).await? {
        Some(record) => {
            info!("Found DNSLink record {}", record.id);
            api.patch_dns_record(zone_id, &record.id, &content).await?;
        }
        None => {
            info!("No DNSLink record found. A new TXT record will be created.");
            api.create_dns_record(zone_id, &record_name, &content).await?;
        }
    }

    Ok(req.link.clone())
}
