//! Merge the stage outputs into the final record.
//!
//! Per field, the first present value wins in this order: operator
//! override, refined text, scraped text, extracted text. Whatever is still
//! missing afterwards gets a default derived from what we do have.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::domain::{ExtractedJob, Failure, JobPosting, Overrides, RefinedJob, ScrapedCandidate};
use crate::dedup::normalize_url;
use crate::scraper::signals::normalize_whitespace;

pub const MAX_TAGS: usize = 10;
pub const DEFAULT_CATEGORY: &str = "Engineering";
pub const DEFAULT_ROLE_TYPE: &str = "Software";

static SALARY_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d,]*(?:\.\d+)?)\s*(k\b|lpa\b|lakhs?\b|l\b)?")
        .expect("salary pattern is valid")
});

/// Everything the merge reads.
pub struct Draft<'a> {
    pub source_url: &'a str,
    pub scraped: &'a ScrapedCandidate,
    pub extracted: &'a ExtractedJob,
    pub refined: Option<&'a RefinedJob>,
    pub overrides: &'a Overrides,
}

pub fn finalize(draft: Draft<'_>, now: DateTime<Utc>) -> Result<JobPosting, Failure> {
    let Draft {
        source_url,
        scraped,
        extracted,
        refined,
        overrides,
    } = draft;

    let title = first_text([
        overrides.title.as_deref(),
        Some(scraped.title.as_str()),
        extracted.title.as_deref(),
    ])
    .map(|t| collapse(&t))
    .ok_or_else(|| Failure::Extraction("no title".to_string()))?;

    let company = first_text([
        overrides.company.as_deref(),
        scraped.company.as_deref(),
        extracted.company.as_deref(),
    ])
    .map(|c| collapse(&c))
    .ok_or_else(|| Failure::Extraction("no company".to_string()))?;

    let extracted_location = extracted.location.as_deref();
    let location_text = first_text([overrides.location.as_deref(), extracted_location]);
    let is_remote = extracted.is_remote.unwrap_or_else(|| {
        location_text
            .as_deref()
            .is_some_and(|l| l.to_lowercase().contains("remote"))
    });
    let location = location_text.unwrap_or_else(|| {
        if is_remote {
            "Remote".to_string()
        } else {
            "Not specified".to_string()
        }
    });

    let salary = first_text([overrides.salary.as_deref(), extracted.salary.as_deref()]);

    let description = first_text([
        overrides.description.as_deref(),
        refined.and_then(|r| r.description.as_deref()),
        Some(scraped.content.as_str()),
        extracted.description.as_deref(),
    ])
    .unwrap_or_default();

    let eligibility = first_text([
        overrides.eligibility.as_deref(),
        refined.and_then(|r| r.eligibility.as_deref()),
        extracted.eligibility.as_deref(),
    ]);

    // Links are stored normalized so the queue's duplicate check sees them
    let source_url = normalize_url(source_url).unwrap_or_else(|| source_url.trim().to_string());
    let apply_url = [
        overrides.apply_url.as_deref(),
        Some(scraped.apply_url.as_str()),
        extracted.apply_url.as_deref(),
    ]
    .into_iter()
    .flatten()
    .find_map(normalize_url)
    .unwrap_or_else(|| source_url.clone());

    let is_internship = title.to_lowercase().contains("intern");
    let job_type = first_text([extracted.job_type.as_deref()]).unwrap_or_else(|| {
        if is_internship {
            "Internship".to_string()
        } else {
            "Full-time".to_string()
        }
    });
    let seniority = first_text([extracted.seniority.as_deref()]).unwrap_or_else(|| {
        if is_internship {
            "Intern".to_string()
        } else {
            "Entry".to_string()
        }
    });
    let role_type = first_text([extracted.role_type.as_deref()])
        .unwrap_or_else(|| DEFAULT_ROLE_TYPE.to_string());
    let category = first_text([extracted.category.as_deref()])
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

    let min_salary = extracted
        .min_salary
        .or_else(|| salary.as_deref().and_then(parse_min_salary));

    let tags = normalize_tags(scraped.tags.iter().chain(extracted.tags.iter()));
    let batch = merge_batch(if scraped.batch.is_empty() {
        &extracted.batch
    } else {
        &scraped.batch
    });

    Ok(JobPosting {
        id: JobPosting::generate_id(&source_url),
        title,
        company,
        location,
        eligibility,
        salary,
        description,
        apply_url,
        source_url,
        company_logo: scraped.company_logo.clone(),
        category,
        tags,
        batch,
        job_type,
        role_type,
        seniority,
        min_salary,
        is_remote,
        is_active: true,
        created_at: now,
        updated_at: now,
    })
}

/// First candidate that is present and not blank, trimmed.
fn first_text<const N: usize>(candidates: [Option<&str>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trimmed, lowercased, unique, at most [`MAX_TAGS`].
pub fn normalize_tags<'a>(tags: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = normalize_whitespace(tag).to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
        if out.len() == MAX_TAGS {
            break;
        }
    }
    out
}

fn merge_batch(batch: &[String]) -> Vec<String> {
    let mut out: Vec<String> = batch
        .iter()
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Lowest annual amount in a free-text salary: "$50k - $70k" → 50000,
/// "6-9 LPA" → 600000, "INR 600,000" → 600000.
pub fn parse_min_salary(text: &str) -> Option<i64> {
    let caps = SALARY_AMOUNT.captures(text)?;
    let number: f64 = caps[1].replace(',', "").parse().ok()?;

    let unit = caps.get(2).map(|m| m.as_str().to_lowercase());
    // "6-9 LPA": the unit follows the last number of the range
    let unit = unit.or_else(|| {
        SALARY_AMOUNT
            .captures_iter(text)
            .filter_map(|c| c.get(2).map(|m| m.as_str().to_lowercase()))
            .next()
    });

    let multiplier = match unit.as_deref() {
        Some("k") => 1_000.0,
        Some("lpa") | Some("lakh") | Some("lakhs") | Some("l") => 100_000.0,
        _ => 1.0,
    };

    let amount = (number * multiplier).round() as i64;
    (amount > 0).then_some(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scraped(title: &str) -> ScrapedCandidate {
        ScrapedCandidate {
            title: title.into(),
            content: "Scraped body".into(),
            apply_url: "https://acme.com/apply".into(),
            company: Some("Acme".into()),
            company_logo: Some("https://acme.com/logo.png".into()),
            tags: vec!["Rust".into(), "sql".into()],
            batch: vec![],
        }
    }

    fn run(
        scraped: &ScrapedCandidate,
        extracted: &ExtractedJob,
        refined: Option<&RefinedJob>,
        overrides: &Overrides,
    ) -> Result<JobPosting, Failure> {
        finalize(
            Draft {
                source_url: "https://ex.com/job/42",
                scraped,
                extracted,
                refined,
                overrides,
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_intern_defaults() {
        let extracted = ExtractedJob {
            title: Some("SDE Intern".into()),
            company: Some("Acme".into()),
            ..Default::default()
        };
        let posting = run(&scraped("SDE Intern"), &extracted, None, &Overrides::default()).unwrap();

        assert_eq!(posting.job_type, "Internship");
        assert_eq!(posting.seniority, "Intern");
        assert_eq!(posting.role_type, "Software");
        assert_eq!(posting.category, "Engineering");
        assert_eq!(posting.location, "Not specified");
        assert!(!posting.is_remote);
        assert_eq!(posting.id, JobPosting::generate_id("https://ex.com/job/42"));
    }

    #[test]
    fn test_full_time_defaults_and_remote() {
        let extracted = ExtractedJob {
            location: Some("Remote (India)".into()),
            salary: Some("$50k - $70k".into()),
            ..Default::default()
        };
        let posting = run(&scraped("Backend Engineer"), &extracted, None, &Overrides::default())
            .unwrap();

        assert_eq!(posting.job_type, "Full-time");
        assert_eq!(posting.seniority, "Entry");
        assert!(posting.is_remote);
        assert_eq!(posting.location, "Remote (India)");
        assert_eq!(posting.min_salary, Some(50_000));
    }

    #[test]
    fn test_remote_flag_without_location() {
        let extracted = ExtractedJob {
            is_remote: Some(true),
            ..Default::default()
        };
        let posting = run(&scraped("Engineer"), &extracted, None, &Overrides::default()).unwrap();
        assert_eq!(posting.location, "Remote");
    }

    #[test]
    fn test_merge_priority() {
        let extracted = ExtractedJob {
            description: Some("extracted description".into()),
            eligibility: Some("extracted eligibility".into()),
            job_type: Some("Contract".into()),
            ..Default::default()
        };
        let refined = RefinedJob {
            description: Some("refined description".into()),
            eligibility: None,
        };
        let overrides = Overrides {
            title: Some("  Staff   Engineer ".into()),
            ..Default::default()
        };

        let posting = run(&scraped("Engineer"), &extracted, Some(&refined), &overrides).unwrap();
        assert_eq!(posting.title, "Staff Engineer");
        assert_eq!(posting.description, "refined description");
        assert_eq!(posting.eligibility.as_deref(), Some("extracted eligibility"));
        assert_eq!(posting.job_type, "Contract");

        // Without refinement the scraped text beats the extracted text
        let posting = run(&scraped("Engineer"), &extracted, None, &Overrides::default()).unwrap();
        assert_eq!(posting.description, "Scraped body");

        let overrides = Overrides {
            description: Some("operator text".into()),
            ..Default::default()
        };
        let posting = run(&scraped("Engineer"), &extracted, Some(&refined), &overrides).unwrap();
        assert_eq!(posting.description, "operator text");
    }

    #[test]
    fn test_missing_company_is_extraction_failure() {
        let mut candidate = scraped("Engineer");
        candidate.company = None;
        let result = run(&candidate, &ExtractedJob::default(), None, &Overrides::default());
        assert!(matches!(result, Err(Failure::Extraction(_))));
    }

    #[test]
    fn test_tags_normalized_and_capped() {
        let extracted = ExtractedJob {
            tags: (0..20).map(|i| format!("Tag{}", i)).chain(["RUST".to_string()]).collect(),
            batch: vec!["2025".into(), "2024".into(), "2025".into()],
            ..Default::default()
        };
        let posting = run(&scraped("Engineer"), &extracted, None, &Overrides::default()).unwrap();
        assert_eq!(posting.tags.len(), MAX_TAGS);
        assert_eq!(&posting.tags[..3], &["rust", "sql", "tag0"]);
        assert_eq!(posting.batch, vec!["2024", "2025"]);
    }

    #[test]
    fn test_invalid_apply_urls_fall_through() {
        let mut candidate = scraped("Engineer");
        candidate.apply_url = "javascript:void(0)".into();
        let extracted = ExtractedJob {
            apply_url: Some("mailto:jobs@acme.com".into()),
            ..Default::default()
        };
        let posting = run(&candidate, &extracted, None, &Overrides::default()).unwrap();
        assert_eq!(posting.apply_url, "https://ex.com/job/42");
    }

    #[test]
    fn test_links_stored_normalized() {
        let overrides = Overrides {
            apply_url: Some(" https://Careers.Acme.com ".into()),
            ..Default::default()
        };
        let candidate = scraped("Engineer");
        let extracted = ExtractedJob::default();
        let draft = Draft {
            source_url: "https://EX.com/job/42#details",
            scraped: &candidate,
            extracted: &extracted,
            refined: None,
            overrides: &overrides,
        };

        let posting = finalize(draft, Utc::now()).unwrap();
        assert_eq!(posting.apply_url, "https://careers.acme.com/");
        assert_eq!(posting.source_url, "https://ex.com/job/42");
        assert_eq!(posting.id, JobPosting::generate_id("https://ex.com/job/42"));
    }

    #[test]
    fn test_parse_min_salary() {
        assert_eq!(parse_min_salary("$50k - $70k"), Some(50_000));
        assert_eq!(parse_min_salary("INR 600,000 - 900,000 per year"), Some(600_000));
        assert_eq!(parse_min_salary("6-9 LPA"), Some(600_000));
        assert_eq!(parse_min_salary("Competitive"), None);
    }
}
