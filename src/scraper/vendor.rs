//! Adapters for job boards that expose a public JSON API. Going through the
//! API avoids bot detection and gives clean structured fields.

use serde::Deserialize;
use url::Url;

use crate::domain::{Failure, Outcome};
use crate::fetcher::Fetcher;
use crate::scraper::extractor::{html_to_text, JsonLdPosting, PageExtract};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorJob {
    Greenhouse { board: String, id: String },
    Lever { region: Option<String>, company: String, id: String },
}

impl VendorJob {
    /// Recognize a vendor posting URL.
    pub fn detect(url: &str) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_lowercase();
        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        if host == "boards.greenhouse.io" || host == "job-boards.greenhouse.io" {
            // /embed/job_app?for=<board>&token=<id>
            if segments.first() == Some(&"embed") {
                let query = |key: &str| {
                    parsed
                        .query_pairs()
                        .find(|(k, _)| k == key)
                        .map(|(_, v)| v.into_owned())
                };
                return Some(VendorJob::Greenhouse {
                    board: query("for")?,
                    id: query("token")?,
                });
            }
            // /<board>/jobs/<id>
            if let [board, "jobs", id, ..] = segments.as_slice() {
                return Some(VendorJob::Greenhouse {
                    board: (*board).to_string(),
                    id: (*id).to_string(),
                });
            }
            return None;
        }

        if host == "jobs.lever.co" || host == "jobs.eu.lever.co" {
            if let [company, id, ..] = segments.as_slice() {
                return Some(VendorJob::Lever {
                    region: host.contains(".eu.").then(|| "eu".to_string()),
                    company: (*company).to_string(),
                    id: (*id).to_string(),
                });
            }
        }

        None
    }

    pub fn api_url(&self) -> String {
        match self {
            VendorJob::Greenhouse { board, id } => format!(
                "https://boards-api.greenhouse.io/v1/boards/{}/jobs/{}",
                board, id
            ),
            VendorJob::Lever {
                region,
                company,
                id,
            } => match region {
                Some(region) => format!(
                    "https://api.{}.lever.co/v0/postings/{}/{}",
                    region, company, id
                ),
                None => format!("https://api.lever.co/v0/postings/{}/{}", company, id),
            },
        }
    }

    /// Fetch the posting through the vendor API.
    pub async fn fetch(&self, fetcher: &dyn Fetcher, source_url: &str) -> Outcome<PageExtract> {
        let api_url = self.api_url();
        let response = match fetcher.fetch(&api_url).await {
            Ok(response) => response,
            Err(e) => return Failure::Network(e.to_string()).into(),
        };
        if !response.is_success() {
            return Failure::from_status(response.status).into();
        }

        let parsed = match self {
            VendorJob::Greenhouse { board, .. } => {
                serde_json::from_str::<GreenhouseJob>(&response.body)
                    .map(|job| job.into_extract(board, source_url))
            }
            VendorJob::Lever { company, .. } => serde_json::from_str::<LeverPosting>(&response.body)
                .map(|job| job.into_extract(company, source_url)),
        };

        match parsed {
            Ok(extract) => Outcome::Done(extract),
            Err(e) => {
                tracing::warn!(url = %api_url, "Unexpected vendor response: {}", e);
                Failure::Extraction(format!("unexpected vendor response: {}", e)).into()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct GreenhouseJob {
    title: String,
    #[serde(default)]
    content: String,
    absolute_url: Option<String>,
    location: Option<GreenhouseLocation>,
    company_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GreenhouseLocation {
    name: String,
}

impl GreenhouseJob {
    fn into_extract(self, board: &str, source_url: &str) -> PageExtract {
        let company = self
            .company_name
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| board_to_company(board));

        let posting = JsonLdPosting {
            title: Some(self.title.clone()),
            description: Some(html_to_text(&self.content)).filter(|d| !d.is_empty()),
            company: Some(company.clone()),
            location: self.location.map(|l| l.name),
            url: self.absolute_url.clone(),
            ..Default::default()
        };

        PageExtract {
            url: source_url.to_string(),
            title: self.title,
            content: posting.to_content(),
            company: Some(company),
            apply_url: Some(self.absolute_url.unwrap_or_else(|| source_url.to_string())),
            posting: Some(posting),
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeverPosting {
    text: String,
    #[serde(default)]
    description_plain: String,
    #[serde(default)]
    lists: Vec<LeverList>,
    #[serde(default)]
    additional_plain: String,
    #[serde(default)]
    categories: LeverCategories,
    hosted_url: Option<String>,
    apply_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LeverList {
    text: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct LeverCategories {
    location: Option<String>,
    commitment: Option<String>,
}

impl LeverPosting {
    fn into_extract(self, company: &str, source_url: &str) -> PageExtract {
        let mut sections = vec![self.description_plain.trim().to_string()];
        for list in &self.lists {
            sections.push(format!("{}\n{}", list.text, html_to_text(&list.content)));
        }
        sections.push(self.additional_plain.trim().to_string());
        let description = sections
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        let company = board_to_company(company);
        let posting = JsonLdPosting {
            title: Some(self.text.clone()),
            description: Some(description).filter(|d| !d.is_empty()),
            company: Some(company.clone()),
            location: self.categories.location,
            employment_type: self.categories.commitment,
            url: self.hosted_url.clone(),
            ..Default::default()
        };

        let apply_url = self
            .apply_url
            .or(self.hosted_url)
            .unwrap_or_else(|| source_url.to_string());

        PageExtract {
            url: source_url.to_string(),
            title: self.text,
            content: posting.to_content(),
            company: Some(company),
            apply_url: Some(apply_url),
            posting: Some(posting),
            ..Default::default()
        }
    }
}

/// "acme-labs" → "Acme Labs"
fn board_to_company(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::tests::StubFetcher;

    #[test]
    fn test_detect_greenhouse_urls() {
        assert_eq!(
            VendorJob::detect("https://boards.greenhouse.io/acme/jobs/4012345"),
            Some(VendorJob::Greenhouse {
                board: "acme".into(),
                id: "4012345".into()
            })
        );
        assert_eq!(
            VendorJob::detect("https://job-boards.greenhouse.io/acme/jobs/77?gh_src=x"),
            Some(VendorJob::Greenhouse {
                board: "acme".into(),
                id: "77".into()
            })
        );
        assert_eq!(
            VendorJob::detect("https://boards.greenhouse.io/embed/job_app?for=acme&token=9"),
            Some(VendorJob::Greenhouse {
                board: "acme".into(),
                id: "9".into()
            })
        );
        assert_eq!(VendorJob::detect("https://boards.greenhouse.io/acme"), None);
    }

    #[test]
    fn test_detect_lever_urls() {
        let job = VendorJob::detect("https://jobs.lever.co/acme/5f1c-aa/apply").unwrap();
        assert_eq!(
            job.api_url(),
            "https://api.lever.co/v0/postings/acme/5f1c-aa"
        );

        let eu = VendorJob::detect("https://jobs.eu.lever.co/acme/abc").unwrap();
        assert_eq!(eu.api_url(), "https://api.eu.lever.co/v0/postings/acme/abc");

        assert_eq!(VendorJob::detect("https://example.com/acme/jobs/1"), None);
    }

    #[tokio::test]
    async fn test_greenhouse_fetch() {
        let body = r#"{
            "title": "Platform Engineer",
            "content": "&lt;p&gt;Own our &lt;strong&gt;infrastructure&lt;/strong&gt;.&lt;/p&gt;",
            "absolute_url": "https://acme.com/careers/4012345",
            "location": {"name": "Berlin"}
        }"#;
        let fetcher = StubFetcher::new().with(
            "https://boards-api.greenhouse.io/v1/boards/acme-labs/jobs/4012345",
            200,
            body,
        );
        let job = VendorJob::detect("https://boards.greenhouse.io/acme-labs/jobs/4012345").unwrap();

        let extract = job
            .fetch(&fetcher, "https://boards.greenhouse.io/acme-labs/jobs/4012345")
            .await
            .done()
            .unwrap();

        assert_eq!(fetcher.requests().len(), 1);
        assert_eq!(extract.title, "Platform Engineer");
        assert_eq!(extract.company.as_deref(), Some("Acme Labs"));
        assert_eq!(extract.apply_url.as_deref(), Some("https://acme.com/careers/4012345"));
        assert!(extract.content.contains("Location: Berlin"));
        assert!(extract.content.contains("Own our infrastructure."));
    }

    #[tokio::test]
    async fn test_lever_fetch() {
        let body = r#"{
            "text": "SDE Intern",
            "descriptionPlain": "Join the core team.",
            "lists": [{"text": "Requirements", "content": "<li>Rust</li><li>SQL</li>"}],
            "additionalPlain": "",
            "categories": {"location": "Remote", "commitment": "Internship"},
            "hostedUrl": "https://jobs.lever.co/acme/abc",
            "applyUrl": "https://jobs.lever.co/acme/abc/apply"
        }"#;
        let fetcher =
            StubFetcher::new().with("https://api.lever.co/v0/postings/acme/abc", 200, body);
        let job = VendorJob::detect("https://jobs.lever.co/acme/abc").unwrap();

        let extract = job
            .fetch(&fetcher, "https://jobs.lever.co/acme/abc")
            .await
            .done()
            .unwrap();

        assert_eq!(extract.title, "SDE Intern");
        assert_eq!(extract.apply_url.as_deref(), Some("https://jobs.lever.co/acme/abc/apply"));
        assert!(extract.content.contains("Employment type: Internship"));
        assert!(extract.content.contains("Requirements\nRust\nSQL"));
    }

    #[tokio::test]
    async fn test_vendor_status_and_body_failures() {
        let job = VendorJob::detect("https://jobs.lever.co/acme/gone").unwrap();
        let api = "https://api.lever.co/v0/postings/acme/gone";

        let missing = job
            .fetch(&StubFetcher::new().with(api, 404, ""), "https://jobs.lever.co/acme/gone")
            .await;
        assert_eq!(missing, Outcome::Failed(Failure::Blocked(404)));

        let garbage = job
            .fetch(&StubFetcher::new().with(api, 200, "<html>"), "https://jobs.lever.co/acme/gone")
            .await;
        assert!(matches!(garbage, Outcome::Failed(Failure::Extraction(_))));

        let down = job
            .fetch(&StubFetcher::new(), "https://jobs.lever.co/acme/gone")
            .await;
        assert!(matches!(down, Outcome::Failed(Failure::Network(_))));
    }

    #[test]
    fn test_board_to_company() {
        assert_eq!(board_to_company("acme"), "Acme");
        assert_eq!(board_to_company("acme-labs_inc"), "Acme Labs Inc");
    }
}
