//! Plain-text signals pulled out of scraped pages: expired-listing phrases,
//! skill tags and graduating-batch years.

use std::sync::LazyLock;

use regex::Regex;

/// Phrases that mean the listing is gone. Matched case-insensitively against
/// title and content before any AI call is made.
pub const EXPIRED_KEYWORDS: &[&str] = &[
    "job expired",
    "job has expired",
    "this job is no longer available",
    "job is no longer available",
    "position is no longer available",
    "no longer accepting applications",
    "applications are closed",
    "application is closed",
    "applications have closed",
    "this position has been filled",
    "this posting has closed",
    "this job posting has expired",
    "listing has expired",
    "page not found",
    "404 not found",
];

const TAG_KEYWORDS: &[(&str, &str)] = &[
    ("rust", "rust"),
    ("python", "python"),
    ("java", "java"),
    ("javascript", "javascript"),
    ("typescript", "typescript"),
    ("golang", "go"),
    ("c++", "c++"),
    ("react", "react"),
    ("node.js", "node.js"),
    ("nodejs", "node.js"),
    ("django", "django"),
    ("kubernetes", "kubernetes"),
    ("docker", "docker"),
    ("aws", "aws"),
    ("sql", "sql"),
    ("machine learning", "machine learning"),
    ("data science", "data science"),
    ("android", "android"),
    ("ios", "ios"),
    ("devops", "devops"),
    ("frontend", "frontend"),
    ("front-end", "frontend"),
    ("backend", "backend"),
    ("back-end", "backend"),
    ("full stack", "full stack"),
    ("fullstack", "full stack"),
];

static BATCH_CONTEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(batch|graduat\w*|pass[- ]?out|passing out|class of|grads?)\b")
        .expect("batch context pattern is valid")
});

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(20[1-3]\d)\b").expect("year pattern is valid"));

/// Window of text searched for years on either side of a batch keyword.
const BATCH_WINDOW: usize = 30;

pub fn is_expired(title: &str, content: &str) -> bool {
    let haystack = format!("{} {}", title, content).to_lowercase();
    EXPIRED_KEYWORDS.iter().any(|kw| haystack.contains(kw))
}

/// Keywords as whole words. `\b` does not work next to `+` or `.`, so the
/// boundaries are spelled out.
static TAG_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    TAG_KEYWORDS
        .iter()
        .map(|(needle, tag)| {
            let pattern = format!(r"(?i)(?:^|[^\w+]){}(?:[^\w+]|$)", regex::escape(needle));
            (Regex::new(&pattern).expect("tag pattern is valid"), *tag)
        })
        .collect()
});

pub fn detect_tags(text: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for (pattern, tag) in TAG_PATTERNS.iter() {
        if pattern.is_match(text) && !tags.iter().any(|t| t == tag) {
            tags.push((*tag).to_string());
        }
    }
    tags
}

/// Graduating years mentioned near words like "batch" or "graduates".
pub fn detect_batch(text: &str) -> Vec<String> {
    let mut years: Vec<String> = Vec::new();
    for m in BATCH_CONTEXT.find_iter(text) {
        let start = floor_char_boundary(text, m.start().saturating_sub(BATCH_WINDOW));
        let end = floor_char_boundary(text, (m.end() + BATCH_WINDOW).min(text.len()));
        for year in YEAR.find_iter(&text[start..end]) {
            let year = year.as_str().to_string();
            if !years.contains(&year) {
                years.push(year);
            }
        }
    }
    years.sort();
    years
}

/// Cap `s` at `max_chars` characters (not bytes).
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Collapse runs of whitespace within lines and drop blank lines.
pub fn normalize_whitespace(s: &str) -> String {
    s.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
