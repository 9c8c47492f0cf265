use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Failure, Outcome, ScrapedCandidate};
use crate::fetcher::Fetcher;
use crate::scraper::apply::{host_of, is_http, resolve_apply_link};
use crate::scraper::chrome::Renderer;
use crate::scraper::config::ScraperConfig;
use crate::scraper::extractor::{ContentExtractor, PageExtract};
use crate::scraper::signals::{
    detect_batch, detect_tags, is_expired, normalize_whitespace, truncate_chars,
};
use crate::scraper::vendor::VendorJob;
use crate::scraper::SourceAdapter;

/// The general-purpose source adapter.
///
/// Resolution order: vendor API, then a static fetch parsed for JSON-LD and
/// content regions, then (once) the headless renderer when the fetch was
/// blocked, failed on the network, or came back without readable content.
pub struct PageScraper {
    fetcher: Arc<dyn Fetcher>,
    renderer: Arc<dyn Renderer>,
    extractor: ContentExtractor,
    config: ScraperConfig,
}

impl PageScraper {
    pub fn new(
        config: ScraperConfig,
        fetcher: Arc<dyn Fetcher>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            fetcher,
            renderer,
            extractor: ContentExtractor::new(config.clone()),
            config,
        }
    }

    async fn fetch_static(&self, url: &str) -> Outcome<PageExtract> {
        let response = match self.fetcher.fetch(url).await {
            Ok(response) => response,
            Err(e) => return Failure::Network(e.to_string()).into(),
        };
        if !response.is_success() {
            return Failure::from_status(response.status).into();
        }

        let extract = self.extractor.extract(&response.body, &response.final_url);
        if extract.posting.is_none() && extract.content.chars().count() < self.config.min_region_length
        {
            return Failure::Extraction("page has no readable content".to_string()).into();
        }
        Outcome::Done(extract)
    }

    fn should_render(&self, failure: &Failure) -> bool {
        self.config.render_fallback
            && (failure.escalates() || matches!(failure, Failure::Extraction(_)))
    }

    /// Shared heuristics applied to every extract, however it was obtained.
    fn finish(&self, source_url: &str, extract: PageExtract) -> Outcome<ScrapedCandidate> {
        let posting = extract.posting.as_ref();

        let title = posting
            .and_then(|p| p.title.as_deref())
            .map(normalize_whitespace)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| normalize_whitespace(&extract.title));

        let content = match posting {
            Some(p) if p.description.is_some() => p.to_content(),
            _ => extract.content.clone(),
        };

        if is_expired(&title, &content) {
            tracing::info!(url = %source_url, "Listing expired");
            return Outcome::skipped("job expired");
        }
        if title.is_empty() {
            return Failure::Extraction("no title found".to_string()).into();
        }

        let content = truncate_chars(&content, self.config.max_content_chars);

        // JSON-LD `url` names the employer's own posting when it is off-domain
        let structured_link = posting
            .and_then(|p| p.url.clone())
            .filter(|u| is_http(u) && host_of(u) != host_of(source_url));

        let apply_url = extract
            .apply_url
            .clone()
            .filter(|u| is_http(u))
            .or(structured_link)
            .or_else(|| {
                resolve_apply_link(
                    &extract.anchors,
                    source_url,
                    content.chars().count(),
                    self.config.substantial_content_chars,
                )
            });
        let Some(apply_url) = apply_url else {
            return Outcome::skipped("no external apply link found");
        };

        let signal_text = format!("{}\n{}", title, content);
        Outcome::Done(ScrapedCandidate {
            tags: detect_tags(&signal_text),
            batch: detect_batch(&signal_text),
            company: posting
                .and_then(|p| p.company.clone())
                .or_else(|| extract.company.clone()),
            company_logo: posting
                .and_then(|p| p.logo.clone())
                .or_else(|| extract.logo.clone()),
            title,
            content,
            apply_url,
        })
    }
}

#[async_trait]
impl SourceAdapter for PageScraper {
    async fn scrape(&self, url: &str) -> Outcome<ScrapedCandidate> {
        let first = match VendorJob::detect(url) {
            Some(job) => {
                tracing::debug!(url = %url, "Using vendor API");
                job.fetch(self.fetcher.as_ref(), url).await
            }
            None => self.fetch_static(url).await,
        };

        let extract = match first {
            Outcome::Done(extract) => extract,
            Outcome::Skipped(reason) => return Outcome::Skipped(reason),
            Outcome::Failed(failure) if self.should_render(&failure) => {
                tracing::info!(url = %url, "Escalating to headless render: {}", failure);
                match self.renderer.render(url).await {
                    Outcome::Done(extract) => extract,
                    Outcome::Skipped(reason) => return Outcome::Skipped(reason),
                    Outcome::Failed(render_failure) => {
                        tracing::warn!(url = %url, "Headless render failed: {}", render_failure);
                        return failure.into();
                    }
                }
            }
            Outcome::Failed(failure) => return failure.into(),
        };

        self.finish(url, extract)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::tests::StubFetcher;
    use crate::scraper::chrome::DisabledRenderer;
    use crate::scraper::extractor::JsonLdPosting;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const URL: &str = "https://jobs.example.com/post/42";

    fn page(body: &str) -> String {
        format!(
            "<html><head><title>Page</title></head><body><h1>Rust Backend Intern</h1>\
             <div class=\"job-description\"><p>{}</p></div>\
             <a href=\"https://careers.acme.com/apply/42\">Apply now</a></body></html>",
            body
        )
    }

    const BODY: &str = "Join Acme to build storage systems in Rust. Open to 2025 batch \
                        graduates with strong fundamentals in databases and SQL.";

    struct CountingRenderer {
        calls: AtomicUsize,
        result: Outcome<PageExtract>,
    }

    impl CountingRenderer {
        fn new(result: Outcome<PageExtract>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result,
            }
        }
    }

    #[async_trait]
    impl Renderer for CountingRenderer {
        async fn render(&self, _url: &str) -> Outcome<PageExtract> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn scraper(fetcher: StubFetcher, renderer: Arc<dyn Renderer>) -> PageScraper {
        PageScraper::new(ScraperConfig::default(), Arc::new(fetcher), renderer)
    }

    #[tokio::test]
    async fn test_static_page_scrape() {
        let fetcher = StubFetcher::new().with(URL, 200, &page(BODY));
        let candidate = scraper(fetcher, Arc::new(DisabledRenderer))
            .scrape(URL)
            .await
            .done()
            .unwrap();

        assert_eq!(candidate.title, "Rust Backend Intern");
        assert_eq!(candidate.apply_url, "https://careers.acme.com/apply/42");
        assert!(candidate.content.contains("storage systems"));
        assert!(candidate.tags.contains(&"rust".to_string()));
        assert!(candidate.tags.contains(&"sql".to_string()));
        assert_eq!(candidate.batch, vec!["2025"]);
    }

    #[tokio::test]
    async fn test_expired_listing_is_skipped() {
        let body = format!("{} Sorry, applications are closed for this role.", BODY);
        let fetcher = StubFetcher::new().with(URL, 200, &page(&body));
        let outcome = scraper(fetcher, Arc::new(DisabledRenderer)).scrape(URL).await;
        assert_eq!(outcome, Outcome::Skipped("job expired".into()));
    }

    #[tokio::test]
    async fn test_missing_apply_link_is_skipped() {
        let html = format!(
            "<html><body><h1>Engineer</h1><div class=\"job-description\"><p>{}</p></div></body></html>",
            BODY
        );
        let fetcher = StubFetcher::new().with(URL, 200, &html);
        let outcome = scraper(fetcher, Arc::new(DisabledRenderer)).scrape(URL).await;
        assert_eq!(
            outcome,
            Outcome::Skipped("no external apply link found".into())
        );
    }

    #[tokio::test]
    async fn test_blocked_fetch_escalates_to_renderer_once() {
        let rendered = PageExtract {
            url: URL.to_string(),
            title: "Frontend Engineer".into(),
            content: BODY.into(),
            apply_url: Some("https://ats.example.org/apply/42".into()),
            ..Default::default()
        };
        let renderer = Arc::new(CountingRenderer::new(Outcome::Done(rendered)));
        let fetcher = StubFetcher::new().with(URL, 403, "Forbidden");

        let candidate = scraper(fetcher, renderer.clone())
            .scrape(URL)
            .await
            .done()
            .unwrap();

        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(candidate.title, "Frontend Engineer");
        assert_eq!(candidate.apply_url, "https://ats.example.org/apply/42");
    }

    #[tokio::test]
    async fn test_unavailable_renderer_keeps_original_failure() {
        let fetcher = StubFetcher::new().with(URL, 404, "");
        let outcome = scraper(fetcher, Arc::new(DisabledRenderer)).scrape(URL).await;
        assert_eq!(outcome, Outcome::Failed(Failure::Blocked(404)));
    }

    #[tokio::test]
    async fn test_network_failure_escalates() {
        let renderer = Arc::new(CountingRenderer::new(Failure::Other("not available".into()).into()));
        let outcome = scraper(StubFetcher::new(), renderer.clone()).scrape(URL).await;
        assert!(matches!(outcome, Outcome::Failed(Failure::Network(_))));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_error_does_not_escalate() {
        let renderer = Arc::new(CountingRenderer::new(Failure::Other("unused".into()).into()));
        let fetcher = StubFetcher::new().with(URL, 500, "");
        let outcome = scraper(fetcher, renderer.clone()).scrape(URL).await;
        assert_eq!(outcome, Outcome::Failed(Failure::Other("HTTP 500".into())));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_render_fallback_can_be_disabled() {
        let renderer = Arc::new(CountingRenderer::new(Failure::Other("unused".into()).into()));
        let config = ScraperConfig {
            render_fallback: false,
            ..Default::default()
        };
        let fetcher = StubFetcher::new().with(URL, 403, "");
        let outcome = PageScraper::new(config, Arc::new(fetcher), renderer.clone())
            .scrape(URL)
            .await;
        assert_eq!(outcome, Outcome::Failed(Failure::Blocked(403)));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_vendor_url_uses_api() {
        let source = "https://jobs.lever.co/acme/abc";
        let body = r#"{"text": "Data Intern", "descriptionPlain": "Crunch numbers with Python.",
            "hostedUrl": "https://jobs.lever.co/acme/abc",
            "applyUrl": "https://jobs.lever.co/acme/abc/apply"}"#;
        let fetcher =
            StubFetcher::new().with("https://api.lever.co/v0/postings/acme/abc", 200, body);

        let candidate = scraper(fetcher, Arc::new(DisabledRenderer))
            .scrape(source)
            .await
            .done()
            .unwrap();

        assert_eq!(candidate.title, "Data Intern");
        assert_eq!(candidate.company.as_deref(), Some("Acme"));
        assert_eq!(candidate.apply_url, "https://jobs.lever.co/acme/abc/apply");
        assert!(candidate.tags.contains(&"python".to_string()));
    }

    #[test]
    fn test_finish_prefers_structured_data_and_caps_content() {
        let config = ScraperConfig {
            max_content_chars: 50,
            ..Default::default()
        };
        let scraper = PageScraper::new(
            config,
            Arc::new(StubFetcher::new()),
            Arc::new(DisabledRenderer),
        );
        let extract = PageExtract {
            url: URL.into(),
            title: "Careers | Acme".into(),
            content: "nav junk".into(),
            posting: Some(JsonLdPosting {
                title: Some("  Site   Reliability Engineer ".into()),
                description: Some("x".repeat(200)),
                company: Some("Acme".into()),
                ..Default::default()
            }),
            apply_url: Some("https://acme.com/apply".into()),
            ..Default::default()
        };

        let candidate = scraper.finish(URL, extract).done().unwrap();
        assert_eq!(candidate.title, "Site Reliability Engineer");
        assert_eq!(candidate.company.as_deref(), Some("Acme"));
        assert_eq!(candidate.content.chars().count(), 50);
        assert!(candidate.content.starts_with("Company: Acme"));
    }

    #[test]
    fn test_structured_data_url_as_apply_link() {
        let scraper = PageScraper::new(
            ScraperConfig::default(),
            Arc::new(StubFetcher::new()),
            Arc::new(DisabledRenderer),
        );
        let extract = |url: &str| PageExtract {
            url: URL.into(),
            title: "Data Engineer".into(),
            content: "Short listing.".into(),
            posting: Some(JsonLdPosting {
                url: Some(url.into()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let candidate = scraper
            .finish(URL, extract("https://careers.acme.com/jobs/7"))
            .done()
            .unwrap();
        assert_eq!(candidate.apply_url, "https://careers.acme.com/jobs/7");

        // Pointing back at the listing itself is no apply link
        assert_eq!(
            scraper.finish(URL, extract("https://www.jobs.example.com/post/42")),
            Outcome::skipped("no external apply link found")
        );
    }
}
