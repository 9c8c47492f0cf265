use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

/// Raw text and metadata pulled from a source page before AI structuring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapedCandidate {
    pub title: String,
    pub content: String,
    pub apply_url: String,
    pub company: Option<String>,
    pub company_logo: Option<String>,
    pub tags: Vec<String>,
    pub batch: Vec<String>,
}

/// Draft record returned by the extraction stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedJob {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub eligibility: Option<String>,
    pub salary: Option<String>,
    pub description: Option<String>,
    pub apply_url: Option<String>,
    pub category: Option<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub batch: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub tags: Vec<String>,
    pub job_type: Option<String>,
    pub role_type: Option<String>,
    pub seniority: Option<String>,
    #[serde(deserialize_with = "number_or_string")]
    pub min_salary: Option<i64>,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_remote: Option<bool>,
}

/// Polished content returned by the refinement stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RefinedJob {
    pub description: Option<String>,
    pub eligibility: Option<String>,
}

/// Text supplied by an operator for a manual trigger. Always wins the merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Overrides {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub salary: Option<String>,
    pub description: Option<String>,
    pub eligibility: Option<String>,
    pub apply_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub eligibility: Option<String>,
    pub salary: Option<String>,
    pub description: String,
    pub apply_url: String,
    pub source_url: String,
    pub company_logo: Option<String>,
    pub category: String,
    pub tags: Vec<String>,
    pub batch: Vec<String>,
    pub job_type: String,
    pub role_type: String,
    pub seniority: String,
    pub min_salary: Option<i64>,
    pub is_remote: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobPosting {
    /// Deterministic ID from the source URL, so re-publishing the same link upserts.
    pub fn generate_id(source_url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source_url.trim().as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(8)]
    }
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(String),
        Many(Vec<Option<String>>),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::One(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Some(Raw::Many(items)) => items
            .into_iter()
            .flatten()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    })
}

fn number_or_string<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Int(n)) => Some(n),
        Some(Raw::Float(f)) => Some(f.round() as i64),
        Some(Raw::Text(s)) => {
            let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        }
        None => None,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Bool(b)) => Some(b),
        Some(Raw::Text(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "remote" => Some(true),
            "false" | "no" | "onsite" | "on-site" => Some(false),
            _ => None,
        },
        None => None,
    })
}
