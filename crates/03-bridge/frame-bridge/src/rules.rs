//! Allow-list rules deciding which documents get a web-message listener injected.

use message_channel::Origin;
use url::Url;

use crate::error::{BridgeError, BridgeResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OriginRule {
    /// `"*"`: every origin, including `"null"`.
    Any,
    /// `"scheme://"` for a scheme without hosts, e.g. `"file://"`.
    SchemeOnly(String),
    /// `"http[s]://host[:port]"`.
    Host {
        scheme: String,
        host: String,
        port: u16,
    },
    /// `"http[s]://*.domain[:port]"`: any strict subdomain of `domain`.
    SubdomainWildcard {
        scheme: String,
        domain: String,
        port: u16,
    },
}

impl OriginRule {
    pub fn parse(rule: &str) -> BridgeResult<Self> {
        if rule == "*" {
            return Ok(OriginRule::Any);
        }
        let Some((scheme, rest)) = rule.split_once("://") else {
            return Err(BridgeError::origin_rule(rule, "missing scheme"));
        };
        if !is_scheme(scheme) {
            return Err(BridgeError::origin_rule(rule, "malformed scheme"));
        }
        let scheme = scheme.to_ascii_lowercase();
        let authority = rest.strip_suffix('/').unwrap_or(rest);
        if authority.contains(['/', '?', '#']) {
            return Err(BridgeError::origin_rule(rule, "rules cannot carry a path"));
        }
        if authority.contains('@') {
            return Err(BridgeError::origin_rule(rule, "rules cannot carry credentials"));
        }

        let web = matches!(scheme.as_str(), "http" | "https");
        match (web, authority.is_empty()) {
            (false, true) => Ok(OriginRule::SchemeOnly(scheme)),
            (false, false) => Err(BridgeError::origin_rule(
                rule,
                "host rules are only supported for http and https",
            )),
            (true, true) => Err(BridgeError::origin_rule(rule, "missing host")),
            (true, false) => parse_host_rule(rule, scheme, authority),
        }
    }

    pub fn matches(&self, origin: &Origin) -> bool {
        match self {
            OriginRule::Any => true,
            OriginRule::SchemeOnly(scheme) => {
                origin.as_str().strip_suffix("://") == Some(scheme.as_str())
            }
            OriginRule::Host { scheme, host, port } => {
                parse_origin(origin).is_some_and(|(s, h, p)| s == *scheme && h == *host && p == *port)
            }
            OriginRule::SubdomainWildcard {
                scheme,
                domain,
                port,
            } => parse_origin(origin).is_some_and(|(s, h, p)| {
                s == *scheme
                    && p == *port
                    && h.strip_suffix(domain.as_str())
                        .is_some_and(|prefix| prefix.len() > 1 && prefix.ends_with('.'))
            }),
        }
    }
}

fn is_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn parse_host_rule(rule: &str, scheme: String, authority: &str) -> BridgeResult<OriginRule> {
    let (wildcard, authority) = match authority.strip_prefix("*.") {
        Some(rest) => (true, rest),
        None => (false, authority),
    };
    if authority.contains('*') {
        return Err(BridgeError::origin_rule(
            rule,
            "wildcard is only allowed as the leading host label",
        ));
    }
    let url = Url::parse(&format!("{scheme}://{authority}/"))
        .map_err(|_| BridgeError::origin_rule(rule, "malformed host"))?;
    let (Some(host), Some(port)) = (url.host_str(), url.port_or_known_default()) else {
        return Err(BridgeError::origin_rule(rule, "malformed host"));
    };
    let host = host.to_owned();
    Ok(if wildcard {
        OriginRule::SubdomainWildcard {
            scheme,
            domain: host,
            port,
        }
    } else {
        OriginRule::Host { scheme, host, port }
    })
}

fn parse_origin(origin: &Origin) -> Option<(String, String, u16)> {
    let url = Url::parse(origin.as_str()).ok()?;
    let host = url.host_str()?.to_owned();
    let port = url.port_or_known_default()?;
    Some((url.scheme().to_owned(), host, port))
}

/// Parsed allow-list. An empty set matches nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OriginRuleSet {
    rules: Vec<OriginRule>,
}

impl OriginRuleSet {
    /// Parses every rule; the first malformed one fails the whole set.
    pub fn parse<S: AsRef<str>>(rules: &[S]) -> BridgeResult<Self> {
        let rules = rules
            .iter()
            .map(|rule| OriginRule::parse(rule.as_ref()))
            .collect::<BridgeResult<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn matches(&self, origin: &Origin) -> bool {
        self.rules.iter().any(|rule| rule.matches(origin))
    }

    pub fn rules(&self) -> &[OriginRule] {
        &self.rules
    }
}
