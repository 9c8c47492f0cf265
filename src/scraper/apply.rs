use url::Url;

/// Hosts where the posting page itself is the application form.
pub const DIRECT_APPLY_PLATFORMS: &[&str] = &[
    "greenhouse.io",
    "lever.co",
    "myworkdayjobs.com",
    "ashbyhq.com",
    "smartrecruiters.com",
    "workable.com",
    "icims.com",
    "jobvite.com",
    "bamboohr.com",
    "recruitee.com",
];

const APPLY_WORDS: &[&str] = &["apply", "submit application", "application form"];

/// An `<a>` element found on the page, with its href already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub text: String,
    pub href: String,
}

impl Anchor {
    pub fn new(text: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            href: href.into(),
        }
    }

    fn looks_like_apply(&self) -> bool {
        let text = self.text.to_lowercase();
        APPLY_WORDS.iter().any(|w| text.contains(w))
    }
}

pub fn is_direct_apply_platform(url: &str) -> bool {
    host_of(url).is_some_and(|host| {
        DIRECT_APPLY_PLATFORMS
            .iter()
            .any(|p| host == *p || host.ends_with(&format!(".{}", p)))
    })
}

/// Pick the link a candidate should use to apply.
///
/// An off-domain "apply" anchor wins. Without one, the source URL itself is
/// acceptable only on a known application platform or when the page carried
/// enough content to be the real posting; otherwise there is no link.
pub fn resolve_apply_link(
    anchors: &[Anchor],
    source_url: &str,
    content_len: usize,
    substantial_content_chars: usize,
) -> Option<String> {
    let source_host = host_of(source_url);

    let apply_anchors: Vec<&Anchor> = anchors
        .iter()
        .filter(|a| a.looks_like_apply() && is_http(&a.href))
        .collect();

    if let Some(external) = apply_anchors
        .iter()
        .find(|a| host_of(&a.href) != source_host)
    {
        return Some(external.href.clone());
    }

    if is_direct_apply_platform(source_url) {
        return Some(
            apply_anchors
                .first()
                .map(|a| a.href.clone())
                .unwrap_or_else(|| source_url.to_string()),
        );
    }

    if content_len >= substantial_content_chars {
        return Some(source_url.to_string());
    }

    None
}

/// Host without a leading `www.`, lowercased.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

pub fn is_http(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}
