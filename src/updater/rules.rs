use anyhow::Result;
use log::{info, warn};
use tokio::try_join;

use crate::cloudflare::{
    ActionParameters, CloudflareApi, PathExpression, Rule, RulePatch, UriRewrite,
};
use crate::error::LookupError;

use super::{dnslink_content, dnslink_record_name, UpdateRequest};

/// Description tagging the plain path-rewrite rule.
pub const PATH_RULE_DESCRIPTION: &str = "Redirect to /ipfs/<CID>";
/// Description tagging the ".html"-completion rule.
pub const HTML_RULE_DESCRIPTION: &str = "Redirect non-html routes to .html";

/// One URI-rewrite rule, rendered into Cloudflare's expression DSL.
///
/// All interpolated values pass through [`quote`], so escaping lives in
/// one place instead of at each call site.
#[derive(Debug, Clone)]
pub struct RewriteRule<'a> {
    pub hostname: &'a str,
    pub link: &'a str,
    /// The variant that appends ".html" and skips paths that already
    /// contain a dot or equal "/".
    pub html_only: bool,
}

impl RewriteRule<'_> {
    /// Boolean match expression over the request.
    ///
    /// Matches the canonical hostname and its "staging." counterpart.
    pub fn match_expression(&self) -> String {
        let hosts = format!(
            "(http.host eq {} or http.host eq {})",
            quote(self.hostname),
            quote(&format!("staging.{}", self.hostname))
        );

        if self.html_only {
            format!(
                "({} and http.request.uri.path ne \"/\" and not http.request.uri.path contains \".\")",
                hosts
            )
        } else {
            hosts
        }
    }

    /// Rewritten URI path: the link concatenated with the request path.
    pub fn path_expression(&self) -> String {
        if self.html_only {
            format!("concat({},http.request.uri.path,\".html\")", quote(self.link))
        } else {
            format!("concat({},http.request.uri.path)", quote(self.link))
        }
    }

    pub fn description(&self) -> &'static str {
        if self.html_only {
            HTML_RULE_DESCRIPTION
        } else {
            PATH_RULE_DESCRIPTION
        }
    }

    pub fn to_patch(&self) -> RulePatch {
        RulePatch {
            action: "rewrite",
            expression: self.match_expression(),
            action_parameters: ActionParameters {
                uri: UriRewrite {
                    path: PathExpression {
                        expression: self.path_expression(),
                    },
                },
            },
            description: self.description().to_string(),
        }
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Picks the path-rewrite and html-completion rule ids.
///
/// Rules are selected by their description tag. A rule that carries a
/// tag keeps its slot; only missing slots are filled from list order,
/// which is how rulesets look before the first update has stamped the
/// descriptions.
pub(super) fn select_rules(rules: &[Rule], ruleset_id: &str) -> Result<(String, String)> {
    let tagged = |wanted: &str| {
        rules
            .iter()
            .find(|rule| rule.description.as_deref() == Some(wanted))
            .map(|rule| rule.id.clone())
    };

    let path_tag = tagged(PATH_RULE_DESCRIPTION);
    let html_tag = tagged(HTML_RULE_DESCRIPTION);

    if let (Some(path_rule), Some(html_rule)) = (&path_tag, &html_tag) {
        return Ok((path_rule.clone(), html_rule.clone()));
    }

    warn!(
        "Rules in ruleset {} are not fully tagged by description; filling from list order",
        ruleset_id
    );

    let taken = (path_tag.clone(), html_tag.clone());
    let mut spare = rules.iter().map(|rule| rule.id.clone()).filter(move |id| {
        taken.0.as_deref() != Some(id.as_str()) && taken.1.as_deref() != Some(id.as_str())
    });
    let mut fill = |tag: Option<String>| match tag {
        Some(id) => Ok(id),
        None => spare.next().ok_or_else(|| {
            LookupError::NotFound(format!("two rewrite rules in ruleset {}", ruleset_id))
        }),
    };

    let path_rule = fill(path_tag)?;
    let html_rule = fill(html_tag)?;
    Ok((path_rule, html_rule))
}

/// Patches both rewrite rules and the DNSLink TXT record.
///
/// The two rule PATCHes and the TXT write are issued concurrently and
/// joined; on failure, writes that already landed stay in place.
pub async fn update(api: &CloudflareApi, zone_id: &str, req: &UpdateRequest) -> Result<String> {
    let ruleset_id = api.find_ruleset_id(zone_id).await?;
    info!("Found ruleset id {}", ruleset_id);

    let rules = api.get_rules(zone_id, &ruleset_id).await?;
    let (path_rule_id, html_rule_id) = select_rules(&rules, &ruleset_id)?;
    info!("Found rule ids {} and {}", path_rule_id, html_rule_id);

    let record_name = dnslink_record_name(&req.zone);
    let dnslink_record = api.find_dnslink_record(zone_id, &record_name).await?;
    match &dnslink_record {
        Some(record) => info!("Found DNSLink record {}", record.id),
        None => info!("No DNSLink record found. A new TXT record will be created."),
    }

    let path_patch = RewriteRule {
        hostname: &req.record,
        link: &req.link,
        html_only: false,
    }
    .to_patch();
    let html_patch = RewriteRule {
        hostname: &req.record,
        link: &req.link,
        html_only: true,
    }
    .to_patch();
    let content = dnslink_content(&req.link);

    try_join!(
        api.patch_rule(zone_id, &ruleset_id, &path_rule_id, &path_patch),
        api.patch_rule(zone_id, &ruleset_id, &html_rule_id, &html_patch),
        async {
            match &dnslink_record {
                Some(record) => api.patch_dns_record(zone_id, &record.id, &content).await,
                None => api.create_dns_record(zone_id, &record_name, &content).await,
            }
        },
    )?;

    Ok(req.link.clone())
}
