use crate::cloudflare::Rule;
use crate::error::LookupError;

use super::rules::{
    select_rules, RewriteRule, HTML_RULE_DESCRIPTION, PATH_RULE_DESCRIPTION,
};

fn rule(id: &str, description: Option<&str>) -> Rule {
    Rule {
        id: id.to_string(),
        description: description.map(str::to_string),
    }
}

#[test]
fn path_rule_expressions() {
    let rule = RewriteRule {
        hostname: "example.com",
        link: "/ipfs/bafy123",
        html_only: false,
    };

    assert_eq!(
        rule.match_expression(),
        r#"(http.host eq "example.com" or http.host eq "staging.example.com")"#
    );
    assert_eq!(
        rule.path_expression(),
        r#"concat("/ipfs/bafy123",http.request.uri.path)"#
    );
    assert_eq!(rule.description(), PATH_RULE_DESCRIPTION);
}

#[test]
fn html_rule_expressions() {
    let rule = RewriteRule {
        hostname: "example.com",
        link: "/ipfs/bafy123",
        html_only: true,
    };

    assert_eq!(
        rule.match_expression(),
        r#"((http.host eq "example.com" or http.host eq "staging.example.com") and http.request.uri.path ne "/" and not http.request.uri.path contains ".")"#
    );
    assert_eq!(
        rule.path_expression(),
        r#"concat("/ipfs/bafy123",http.request.uri.path,".html")"#
    );
    assert_eq!(rule.description(), HTML_RULE_DESCRIPTION);
}

#[test]
fn interpolated_values_are_quoted() {
    let rule = RewriteRule {
        hostname: r#"evil" or true"#,
        link: r#"/ipfs/ba"fy"#,
        html_only: false,
    };

    assert_eq!(
        rule.match_expression(),
        r#"(http.host eq "evil\" or true" or http.host eq "staging.evil\" or true")"#
    );
    assert_eq!(
        rule.path_expression(),
        r#"concat("/ipfs/ba\"fy",http.request.uri.path)"#
    );
}

#[test]
fn tagged_rules_are_selected_regardless_of_position() {
    let rules = vec![
        rule("x0", Some("something else")),
        rule("x1", Some(HTML_RULE_DESCRIPTION)),
        rule("x2", Some(PATH_RULE_DESCRIPTION)),
    ];

    let (path_rule, html_rule) = select_rules(&rules, "R1").unwrap();
    assert_eq!(path_rule, "x2");
    assert_eq!(html_rule, "x1");
}

#[test]
fn untagged_rules_fall_back_to_list_order() {
    let rules = vec![rule("r1", None), rule("r2", None), rule("r3", None)];

    let (path_rule, html_rule) = select_rules(&rules, "R1").unwrap();
    assert_eq!(path_rule, "r1");
    assert_eq!(html_rule, "r2");
}

#[test]
fn partial_tagging_fills_only_the_missing_slot() {
    let rules = vec![rule("r1", Some(PATH_RULE_DESCRIPTION)), rule("r2", None)];

    let (path_rule, html_rule) = select_rules(&rules, "R1").unwrap();
    assert_eq!(path_rule, "r1");
    assert_eq!(html_rule, "r2");
}

#[test]
fn tagged_rule_keeps_its_slot_regardless_of_position() {
    // The path tag sits at position 2; it must not receive the html patch.
    let rules = vec![rule("r1", None), rule("r2", Some(PATH_RULE_DESCRIPTION))];

    let (path_rule, html_rule) = select_rules(&rules, "R1").unwrap();
    assert_eq!(path_rule, "r2");
    assert_eq!(html_rule, "r1");
}

#[test]
fn html_tag_alone_is_honoured() {
    let rules = vec![
        rule("r1", Some(HTML_RULE_DESCRIPTION)),
        rule("r2", None),
        rule("r3", None),
    ];

    let (path_rule, html_rule) = select_rules(&rules, "R1").unwrap();
    assert_eq!(path_rule, "r2");
    assert_eq!(html_rule, "r1");
}

#[test]
fn tagged_rule_without_a_spare_is_not_found() {
    let rules = vec![rule("r1", Some(PATH_RULE_DESCRIPTION))];

    let err = select_rules(&rules, "R1").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LookupError>(),
        Some(LookupError::NotFound(_))
    ));
}

#[test]
fn single_untagged_rule_is_not_found() {
    let rules = vec![rule("r1", None)];

    let err = select_rules(&rules, "R1").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LookupError>(),
        Some(LookupError::NotFound(_))
    ));
}
