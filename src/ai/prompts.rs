use crate::domain::{ExtractedJob, ScrapedCandidate};

pub const EXTRACTION_SYSTEM: &str = r#"You extract job postings into structured JSON.

Return ONLY a JSON object with these keys:
- "title": job title as advertised
- "company": hiring company name
- "location": city/country, or "Remote"
- "eligibility": who can apply (degree, graduation years, experience)
- "salary": compensation as written, or null
- "description": a concise summary of the role and responsibilities
- "applyUrl": the application link if present in the text, or null
- "category": one of "Engineering", "Data", "Design", "Product", "Other"
- "batch": array of graduating years eligible, e.g. ["2024", "2025"]
- "tags": array of up to 10 short skill keywords, lowercase
- "jobType": "Internship", "Full-time", "Part-time" or "Contract"
- "roleType": e.g. "Software", "Data", "DevOps", "QA"
- "seniority": "Intern", "Entry", "Mid" or "Senior"
- "minSalary": lowest annual salary as an integer, or null
- "isRemote": true or false

Use null for anything the posting does not state. Do not invent details."#;

pub const REFINEMENT_SYSTEM: &str = r#"You polish job postings for a job board.

Given a draft posting as JSON, rewrite its description and eligibility so they
are clear, well structured and free of boilerplate. Keep every concrete fact
(skills, requirements, dates, compensation). Do not add facts.

Return ONLY a JSON object: {"description": "...", "eligibility": "..."}"#;

/// Text handed to the extraction stage for one scraped candidate.
pub fn extraction_blob(source_url: &str, candidate: &ScrapedCandidate) -> String {
    let mut blob = format!("URL: {}\nTitle: {}\n", source_url, candidate.title);
    if let Some(ref company) = candidate.company {
        blob.push_str(&format!("Company: {}\n", company));
    }
    blob.push_str(&format!("Apply URL: {}\n\n", candidate.apply_url));
    blob.push_str(&candidate.content);
    blob
}

pub fn refinement_input(draft: &ExtractedJob) -> String {
    serde_json::to_string_pretty(draft).unwrap_or_else(|_| {
        format!(
            "{}\n\n{}",
            draft.title.as_deref().unwrap_or_default(),
            draft.description.as_deref().unwrap_or_default()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_blob_layout() {
        let candidate = ScrapedCandidate {
            title: "SDE Intern".into(),
            content: "Build things.".into(),
            apply_url: "https://acme.com/apply".into(),
            company: Some("Acme".into()),
            ..Default::default()
        };
        let blob = extraction_blob("https://ex.com/job/42", &candidate);
        assert!(blob.starts_with("URL: https://ex.com/job/42\nTitle: SDE Intern\nCompany: Acme\n"));
        assert!(blob.ends_with("\n\nBuild things."));
    }

    #[test]
    fn test_refinement_input_is_camel_case_json() {
        let draft = ExtractedJob {
            title: Some("SDE Intern".into()),
            job_type: Some("Internship".into()),
            ..Default::default()
        };
        let input = refinement_input(&draft);
        assert!(input.contains("\"jobType\": \"Internship\""));
    }
}
