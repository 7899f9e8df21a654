use serde::{Deserialize, Serialize};
use url::Url;

/// Platform token → anchor host. `x.com` maps to the `twitter` token so both
/// spellings collapse to one platform.
const KNOWN_PLATFORMS: &[(&str, &str)] = &[
    ("facebook", "facebook.com"),
    ("instagram", "instagram.com"),
    ("linkedin", "linkedin.com"),
    ("twitter", "twitter.com"),
    ("twitter", "x.com"),
    ("youtube", "youtube.com"),
    ("tiktok", "tiktok.com"),
];

/// A business's presence on one known social platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLink {
    pub platform: String,
    pub url: String,
}

impl SocialLink {
    pub fn new(platform: &str, url: &str) -> Self {
        Self {
            platform: platform.to_string(),
            url: url.to_string(),
        }
    }
}

/// Match an anchor target against the known-platform hosts.
pub fn platform_for_url(href: &str) -> Option<&'static str> {
    let parsed = Url::parse(href).ok()?;
    let host = parsed.host_str()?.to_lowercase();

    for (platform, domain) in KNOWN_PLATFORMS {
        if host == *domain || host.ends_with(&format!(".{}", domain)) {
            return Some(platform);
        }
    }
    None
}

/// Wire format: comma-separated `platform:url` tokens. URLs containing a
/// literal comma break the format; accepted limitation.
pub fn serialize_links(links: &[SocialLink]) -> String {
    links
        .iter()
        .map(|link| format!("{}:{}", link.platform, link.url))
        .collect::<Vec<_>>()
        .join(",")
}

/// Inverse of [`serialize_links`]; tolerates blank tokens so rows written
/// before the column existed parse as an empty list.
pub fn parse_links(raw: &str) -> Vec<SocialLink> {
    raw.split(',')
        .filter(|token| !token.trim().is_empty())
        .filter_map(|token| {
            let mut parts = token.splitn(2, ':');
            let platform = parts.next()?.trim();
            let url = parts.next()?.trim();
            if platform.is_empty() || url.is_empty() {
                return None;
            }
            Some(SocialLink::new(platform, url))
        })
        .collect()
}
