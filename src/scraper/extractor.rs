use ::scraper::{ElementRef, Html, Node, Selector};
use serde_json::Value;
use url::Url;

use crate::scraper::apply::{is_http, Anchor};
use crate::scraper::signals::normalize_whitespace;
use crate::scraper::ScraperConfig;

const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "section",
    "article", "header", "footer", "table", "blockquote", "pre",
];

/// Everything a source page yielded before the shared heuristics run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageExtract {
    /// Final page URL (after redirects)
    pub url: String,
    pub title: String,
    pub content: String,
    /// Employer named by the source's own data (vendor API). Page branding
    /// such as `og:site_name` belongs to the board, not the employer.
    pub company: Option<String>,
    pub logo: Option<String>,
    pub anchors: Vec<Anchor>,
    /// schema.org JobPosting embedded in the page, if any
    pub posting: Option<JsonLdPosting>,
    /// Apply link already known for certain (vendor API, headless click-through)
    pub apply_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JsonLdPosting {
    pub title: Option<String>,
    pub description: Option<String>,
    pub company: Option<String>,
    pub logo: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub salary: Option<String>,
    pub url: Option<String>,
}

impl JsonLdPosting {
    /// Posting body prefixed with the structured facts, so the AI stage sees them.
    pub fn to_content(&self) -> String {
        let mut lines = Vec::new();
        if let Some(ref company) = self.company {
            lines.push(format!("Company: {}", company));
        }
        if let Some(ref location) = self.location {
            lines.push(format!("Location: {}", location));
        }
        if let Some(ref employment_type) = self.employment_type {
            lines.push(format!("Employment type: {}", employment_type));
        }
        if let Some(ref salary) = self.salary {
            lines.push(format!("Salary: {}", salary));
        }
        if let Some(ref description) = self.description {
            if !lines.is_empty() {
                lines.push(String::new());
            }
            lines.push(description.clone());
        }
        lines.join("\n")
    }
}

/// Content extractor for job pages, over static HTML or a headless browser's DOM
pub struct ContentExtractor {
    config: ScraperConfig,
    content_selectors: Vec<Selector>,
    remove_selectors: Vec<Selector>,
}

impl ContentExtractor {
    pub fn new(config: ScraperConfig) -> Self {
        let content_selectors = parse_selectors(&config.content_selectors);
        let remove_selectors = parse_selectors(&config.remove_selectors);
        Self {
            config,
            content_selectors,
            remove_selectors,
        }
    }

    /// Extract the posting from a static HTML document.
    pub fn extract(&self, html: &str, page_url: &str) -> PageExtract {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();

        let posting = select_all(&document, "script[type=\"application/ld+json\"]")
            .into_iter()
            .find_map(|script| parse_json_ld(&script.text().collect::<String>()));

        PageExtract {
            url: page_url.to_string(),
            title: Self::title(&document),
            content: self.main_text(&document),
            company: None,
            logo: Self::logo(&document, base.as_ref()),
            anchors: Self::anchors(&document, base.as_ref()),
            posting,
            apply_url: None,
        }
    }

    fn title(document: &Html) -> String {
        let h1 = select_all(document, "h1")
            .into_iter()
            .map(|el| normalize_whitespace(&el.text().collect::<String>()))
            .find(|t| !t.is_empty());

        h1.or_else(|| meta_content(document, "meta[property=\"og:title\"]"))
            .or_else(|| {
                select_all(document, "title")
                    .into_iter()
                    .map(|el| normalize_whitespace(&el.text().collect::<String>()))
                    .find(|t| !t.is_empty())
            })
            .unwrap_or_default()
    }

    /// First configured region with enough text, else the whole body.
    fn main_text(&self, document: &Html) -> String {
        for selector in &self.content_selectors {
            for region in document.select(selector) {
                let text = self.visible_text(region);
                if text.chars().count() > self.config.min_region_length {
                    return text;
                }
            }
        }

        select_all(document, "body")
            .into_iter()
            .next()
            .map(|body| self.visible_text(body))
            .unwrap_or_default()
    }

    fn visible_text(&self, element: ElementRef<'_>) -> String {
        let mut out = String::new();
        self.collect_text(element, &mut out);
        normalize_whitespace(&out)
    }

    fn collect_text(&self, element: ElementRef<'_>, out: &mut String) {
        if self.remove_selectors.iter().any(|s| s.matches(&element)) {
            return;
        }

        for child in element.children() {
            if let Some(child_el) = ElementRef::wrap(child) {
                self.collect_text(child_el, out);
                if BLOCK_ELEMENTS.contains(&child_el.value().name()) {
                    out.push('\n');
                }
            } else if let Node::Text(text) = child.value() {
                out.push_str(text);
            }
        }
    }

    fn anchors(document: &Html, base: Option<&Url>) -> Vec<Anchor> {
        select_all(document, "a[href]")
            .into_iter()
            .filter_map(|el| {
                let href = el.value().attr("href")?;
                let resolved = resolve(base, href)?;
                let mut text = normalize_whitespace(&el.text().collect::<String>());
                if text.is_empty() {
                    text = el
                        .value()
                        .attr("aria-label")
                        .or_else(|| el.value().attr("title"))
                        .unwrap_or_default()
                        .to_string();
                }
                Some(Anchor::new(text, resolved))
            })
            .collect()
    }

    fn logo(document: &Html, base: Option<&Url>) -> Option<String> {
        let from_img = select_all(document, "img")
            .into_iter()
            .find(|img| {
                let value = img.value();
                ["class", "alt", "src", "id"].iter().any(|attr| {
                    value
                        .attr(attr)
                        .is_some_and(|v| v.to_lowercase().contains("logo"))
                })
            })
            .and_then(|img| img.value().attr("src").map(String::from));

        from_img
            .or_else(|| meta_content(document, "meta[property=\"og:image\"]"))
            .and_then(|src| resolve(base, &src))
    }

    /// JavaScript run inside the headless browser. Mirrors [`Self::extract`]:
    /// collects JSON-LD blocks, anchors, logo and title first, then strips
    /// boilerplate and picks the first content region with enough text.
    pub fn extraction_script(&self) -> String {
        let remove_selectors = js_string_list(&self.config.remove_selectors);
        let content_selectors = js_string_list(&self.config.content_selectors);
        let min_length = self.config.min_region_length;

        format!(
            r#"
            (() => {{
                const jsonLd = Array.from(
                    document.querySelectorAll('script[type="application/ld+json"]')
                ).map(s => s.textContent || '');

                const anchors = Array.from(document.querySelectorAll('a[href]')).map(a => ({{
                    text: (a.innerText || a.getAttribute('aria-label') || a.title || '').trim(),
                    href: a.href
                }}));

                const h1 = document.querySelector('h1');
                const ogTitle = document.querySelector('meta[property="og:title"]');
                const title = (h1 && h1.innerText.trim()) ||
                    (ogTitle && ogTitle.content) || document.title || '';

                const logoImg = Array.from(document.querySelectorAll('img')).find(img =>
                    ['className', 'alt', 'src', 'id'].some(k =>
                        String(img[k] || '').toLowerCase().includes('logo')));
                const ogImage = document.querySelector('meta[property="og:image"]');
                const logo = (logoImg && logoImg.src) || (ogImage && ogImage.content) || null;

                // Remove unwanted elements
                const removeSelectors = [{remove_selectors}];
                for (const selector of removeSelectors) {{
                    document.querySelectorAll(selector).forEach(el => el.remove());
                }}

                // Try content selectors in order
                let text = '';
                const contentSelectors = [{content_selectors}];
                outer: for (const selector of contentSelectors) {{
                    for (const element of document.querySelectorAll(selector)) {{
                        if (element.innerText.trim().length > {min_length}) {{
                            text = element.innerText;
                            break outer;
                        }}
                    }}
                }}

                // Fallback to body
                if (!text && document.body) {{
                    text = document.body.innerText;
                }}

                return {{
                    url: window.location.href,
                    title: title,
                    text: text || '',
                    logo: logo,
                    jsonLd: jsonLd,
                    anchors: anchors
                }};
            }})()
            "#
        )
    }

    /// Clicks the most apply-like control on the page. Evaluates to `true` when
    /// something was clicked.
    pub fn apply_click_script() -> &'static str {
        r#"
        (() => {
            const controls = Array.from(document.querySelectorAll(
                'a, button, [role="button"], input[type="submit"]'));
            const label = el => (el.innerText || el.value ||
                el.getAttribute('aria-label') || '').trim();
            const target = controls.find(el => /apply\s*now/i.test(label(el))) ||
                controls.find(el => /apply/i.test(label(el)));
            if (!target) {
                return false;
            }
            target.scrollIntoView();
            target.click();
            return true;
        })()
        "#
    }

    /// Build a [`PageExtract`] from the value returned by [`Self::extraction_script`].
    pub fn from_script_result(&self, result: &Value, page_url: &str) -> PageExtract {
        let str_field = |key: &str| {
            result[key]
                .as_str()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let posting = result["jsonLd"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|v| v.as_str())
            .find_map(parse_json_ld);

        let anchors = result["anchors"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|a| {
                let href = a["href"].as_str()?;
                is_http(href).then(|| Anchor::new(a["text"].as_str().unwrap_or_default(), href))
            })
            .collect();

        PageExtract {
            url: str_field("url").unwrap_or_else(|| page_url.to_string()),
            title: normalize_whitespace(&str_field("title").unwrap_or_default()),
            content: normalize_whitespace(&str_field("text").unwrap_or_default()),
            company: None,
            logo: str_field("logo"),
            anchors,
            posting,
            apply_url: None,
        }
    }
}

/// Flatten an HTML fragment (possibly entity-escaped, as vendor APIs return it) to text.
pub fn html_to_text(html: &str) -> String {
    let decoded = html_escape::decode_html_entities(html);
    let fragment = Html::parse_fragment(&decoded);
    let mut out = String::new();
    push_fragment_text(fragment.root_element(), &mut out);
    normalize_whitespace(&out)
}

fn push_fragment_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            if matches!(child_el.value().name(), "script" | "style") {
                continue;
            }
            push_fragment_text(child_el, out);
            if BLOCK_ELEMENTS.contains(&child_el.value().name()) {
                out.push('\n');
            }
        } else if let Node::Text(text) = child.value() {
            out.push_str(text);
        }
    }
}

/// Parse one `application/ld+json` block and return its JobPosting, if any.
pub fn parse_json_ld(raw: &str) -> Option<JsonLdPosting> {
    let value: Value = serde_json::from_str(raw.trim()).ok()?;
    let job = find_job_posting(&value)?;

    let org = &job["hiringOrganization"];
    let logo = match &org["logo"] {
        Value::String(s) => Some(s.clone()),
        Value::Object(_) => org["logo"]["url"].as_str().map(String::from),
        _ => None,
    };

    Some(JsonLdPosting {
        title: text_field(&job["title"]),
        description: text_field(&job["description"])
            .map(|d| html_to_text(&d))
            .filter(|d| !d.is_empty()),
        company: match org {
            Value::String(s) => Some(s.clone()),
            _ => text_field(&org["name"]),
        },
        logo,
        location: json_ld_location(job),
        employment_type: match &job["employmentType"] {
            Value::Array(types) => {
                let joined = types
                    .iter()
                    .filter_map(|t| t.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                (!joined.is_empty()).then_some(joined)
            }
            other => text_field(other),
        },
        salary: json_ld_salary(&job["baseSalary"]),
        url: text_field(&job["url"]).filter(|u| is_http(u)),
    })
}

fn find_job_posting(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_job_posting),
        Value::Object(map) => {
            let is_job = match map.get("@type") {
                Some(Value::String(t)) => t == "JobPosting",
                Some(Value::Array(types)) => types.iter().any(|t| t == "JobPosting"),
                _ => false,
            };
            if is_job {
                return Some(value);
            }
            map.get("@graph").and_then(find_job_posting)
        }
        _ => None,
    }
}

fn json_ld_location(job: &Value) -> Option<String> {
    if job["jobLocationType"]
        .as_str()
        .is_some_and(|t| t.eq_ignore_ascii_case("TELECOMMUTE"))
    {
        return Some("Remote".to_string());
    }

    let places: Vec<&Value> = match &job["jobLocation"] {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    };

    let names: Vec<String> = places
        .into_iter()
        .filter_map(|place| {
            let address = &place["address"];
            if let Some(s) = address.as_str() {
                return Some(s.to_string());
            }
            let parts: Vec<String> = ["addressLocality", "addressRegion", "addressCountry"]
                .iter()
                .filter_map(|k| match &address[*k] {
                    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                    Value::Object(_) => text_field(&address[*k]["name"]),
                    _ => None,
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        })
        .collect();

    (!names.is_empty()).then(|| names.join(" / "))
}

fn json_ld_salary(salary: &Value) -> Option<String> {
    if salary.is_null() {
        return None;
    }
    let currency = salary["currency"].as_str().unwrap_or_default();
    let value = &salary["value"];
    let number = |v: &Value| -> Option<String> {
        v.as_f64()
            .map(|n| format!("{}", n.round() as i64))
            .or_else(|| v.as_str().map(String::from))
    };

    let amount = match (number(&value["minValue"]), number(&value["maxValue"])) {
        (Some(min), Some(max)) => format!("{}-{}", min, max),
        (Some(min), None) => min,
        (None, Some(max)) => max,
        (None, None) => number(&value["value"]).or_else(|| number(value))?,
    };

    let unit = value["unitText"].as_str().unwrap_or_default();
    let mut text = format!("{} {}", currency, amount).trim().to_string();
    if !unit.is_empty() {
        text.push_str(&format!(" / {}", unit.to_lowercase()));
    }
    Some(text)
}

fn text_field(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_selectors(raw: &[String]) -> Vec<Selector> {
    raw.iter()
        .filter_map(|s| match Selector::parse(s) {
            Ok(selector) => Some(selector),
            Err(e) => {
                tracing::warn!(selector = %s, "Ignoring invalid selector: {:?}", e);
                None
            }
        })
        .collect()
}

fn select_all<'a>(document: &'a Html, selector: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(selector) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    select_all(document, selector)
        .into_iter()
        .filter_map(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .find(|c| !c.is_empty())
}

fn resolve(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    let url = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

fn js_string_list(items: &[String]) -> String {
    items
        .iter()
        .map(|s| format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOB_PAGE: &str = r#"<html><head>
        <title>Backend Engineer | Acme Careers</title>
        <meta property="og:site_name" content="Acme">
        <meta property="og:image" content="/img/banner.png">
        </head><body>
        <nav>Home Jobs About <a href="/login">Login</a></nav>
        <h1>Backend   Engineer</h1>
        <img class="company-logo" src="/static/acme-logo.png">
        <div class="job-description">
            <p>We are looking for a backend engineer to build our payment systems in Rust.</p>
            <p>You will work with a small team on distributed services and databases.</p>
            <script>var tracking = "should not appear";</script>
        </div>
        <a href="https://careers.acme.com/apply/42">Apply now</a>
        <footer>Copyright Acme</footer>
        </body></html>"#;

    fn extractor() -> ContentExtractor {
        ContentExtractor::new(ScraperConfig::default())
    }

    #[test]
    fn test_extract_static_page() {
        let page = extractor().extract(JOB_PAGE, "https://jobs.example.com/post/42");

        assert_eq!(page.title, "Backend Engineer");
        assert!(page.content.contains("payment systems in Rust"));
        assert!(!page.content.contains("should not appear"));
        assert!(!page.content.contains("Copyright"));
        assert_eq!(page.company, None);
        assert_eq!(
            page.logo.as_deref(),
            Some("https://jobs.example.com/static/acme-logo.png")
        );
        assert!(page
            .anchors
            .iter()
            .any(|a| a.text == "Apply now" && a.href == "https://careers.acme.com/apply/42"));
        assert!(page
            .anchors
            .iter()
            .any(|a| a.href == "https://jobs.example.com/login"));
    }

    #[test]
    fn test_short_regions_fall_back_to_body() {
        let html = r#"<html><body><main>tiny</main><div>Body text that is outside main</div></body></html>"#;
        let page = extractor().extract(html, "https://example.com/");
        assert!(page.content.contains("Body text that is outside main"));
    }

    #[test]
    fn test_json_ld_job_posting_in_graph() {
        let raw = r#"{
            "@context": "https://schema.org",
            "@graph": [
                {"@type": "WebPage", "name": "x"},
                {
                    "@type": "JobPosting",
                    "title": "Data Analyst",
                    "description": "&lt;p&gt;Analyse data.&lt;/p&gt;&lt;p&gt;Report weekly.&lt;/p&gt;",
                    "hiringOrganization": {"@type": "Organization", "name": "Globex",
                        "logo": {"url": "https://globex.com/logo.png"}},
                    "employmentType": ["FULL_TIME", "CONTRACTOR"],
                    "jobLocation": {"@type": "Place", "address": {
                        "addressLocality": "Pune", "addressCountry": {"name": "India"}}},
                    "baseSalary": {"currency": "INR", "value": {
                        "minValue": 600000, "maxValue": 900000, "unitText": "YEAR"}},
                    "url": "https://globex.com/jobs/7"
                }
            ]
        }"#;
        let posting = parse_json_ld(raw).unwrap();
        assert_eq!(posting.title.as_deref(), Some("Data Analyst"));
        assert_eq!(posting.company.as_deref(), Some("Globex"));
        assert_eq!(posting.logo.as_deref(), Some("https://globex.com/logo.png"));
        assert_eq!(posting.location.as_deref(), Some("Pune, India"));
        assert_eq!(posting.employment_type.as_deref(), Some("FULL_TIME, CONTRACTOR"));
        assert_eq!(posting.salary.as_deref(), Some("INR 600000-900000 / year"));
        assert_eq!(posting.url.as_deref(), Some("https://globex.com/jobs/7"));

        let description = posting.description.unwrap();
        assert!(description.contains("Analyse data."));
        assert!(description.contains("Report weekly."));
        assert!(!description.contains("<p>"));
    }

    #[test]
    fn test_json_ld_remote_and_non_job() {
        let remote = r#"[{"@type": "JobPosting", "title": "SRE", "jobLocationType": "TELECOMMUTE"}]"#;
        assert_eq!(
            parse_json_ld(remote).unwrap().location.as_deref(),
            Some("Remote")
        );
        assert!(parse_json_ld(r#"{"@type": "Organization"}"#).is_none());
        assert!(parse_json_ld("not json").is_none());
    }

    #[test]
    fn test_extract_picks_up_json_ld() {
        let html = r#"<html><head><script type="application/ld+json">
            {"@type": "JobPosting", "title": "SDE Intern", "hiringOrganization": "Acme"}
            </script></head><body><p>hello</p></body></html>"#;
        let page = extractor().extract(html, "https://example.com/job");
        let posting = page.posting.unwrap();
        assert_eq!(posting.title.as_deref(), Some("SDE Intern"));
        assert_eq!(posting.company.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_json_ld_to_content() {
        let posting = JsonLdPosting {
            company: Some("Acme".into()),
            location: Some("Remote".into()),
            description: Some("Build APIs.".into()),
            ..Default::default()
        };
        assert_eq!(
            posting.to_content(),
            "Company: Acme\nLocation: Remote\n\nBuild APIs."
        );
    }

    #[test]
    fn test_extraction_script_generation() {
        let script = extractor().extraction_script();
        assert!(script.contains("removeSelectors"));
        assert!(script.contains("contentSelectors"));
        assert!(script.contains("application/ld+json"));
        assert!(script.contains("> 100"));
    }

    #[test]
    fn test_from_script_result() {
        let result = serde_json::json!({
            "url": "https://spa.example.com/jobs/9",
            "title": " Frontend  Engineer ",
            "text": "Build  UIs\n\n with React",
            "logo": "https://spa.example.com/logo.svg",
            "jsonLd": ["{\"@type\": \"JobPosting\", \"title\": \"Frontend Engineer\"}"],
            "anchors": [
                {"text": "Apply", "href": "https://ats.example.org/apply/9"},
                {"text": "Mail", "href": "mailto:x@example.com"}
            ]
        });
        let page = extractor().from_script_result(&result, "https://spa.example.com/jobs/9");
        assert_eq!(page.title, "Frontend Engineer");
        assert_eq!(page.content, "Build UIs\nwith React");
        assert_eq!(page.company, None);
        assert_eq!(page.anchors.len(), 1);
        assert!(page.posting.is_some());
    }

    #[test]
    fn test_html_to_text_plain_passthrough() {
        assert_eq!(html_to_text("just text"), "just text");
    }
}
