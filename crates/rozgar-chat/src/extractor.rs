//! Free-text to [`SearchCriteria`] extraction.
//!
//! The model path asks the language model for a JSON object; the rule path
//! is a fixed keyword matcher used whenever the model path fails.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use rozgar_core::types::{
    title_case, CriteriaSource, ExperienceBand, JobCategory, Qualification, SearchCriteria,
    DISTRICTS,
};

use crate::error::ChatError;
use crate::llm::{complete_with_timeout, LanguageModel};
use crate::types::ChatTurn;

const EXTRACTION_SYSTEM_PROMPT: &str = "You are a job search criteria extraction assistant. \
Extract criteria from user messages and return only valid JSON.";

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```(?:json|JSON)?\s*(.*?)\s*```\s*$").expect("Invalid code fence regex")
});

// Rule tables. Each list is checked in order and the first hit wins.

const GOVERNMENT_WORDS: &[&str] = &["government", "gov", "govt"];
const PRIVATE_WORDS: &[&str] = &["private", "company", "corporate"];

const QUALIFICATION_RULES: &[(Qualification, &[&str])] = &[
    (Qualification::TwelfthPass, &["12th", "twelfth", "high school"]),
    (Qualification::Graduate, &["graduate", "bachelor", "degree"]),
    (Qualification::PostGraduate, &["post graduate", "master", "mba", "phd"]),
];

const EXPERIENCE_RULES: &[(ExperienceBand, &[&str])] = &[
    (
        ExperienceBand::Entry,
        &[
            "less than 2",
            "under 2",
            "0 to 2",
            "0-2",
            "fresher",
            "entry level",
            "no experience",
            "less than 2 yrs",
            "under 2 yrs",
        ],
    ),
    (ExperienceBand::Mid, &["2-5", "2 to 5", "2-5 years", "experienced"]),
    (ExperienceBand::Senior, &["5-10", "5 to 10", "5-10 years", "senior"]),
    (ExperienceBand::Expert, &["10+", "10 plus", "10+ years", "expert"]),
];

const ROLE_KEYWORDS: &[&str] = &[
    "clerk",
    "accountant",
    "assistant",
    "engineer",
    "developer",
    "teacher",
    "nurse",
    "operator",
    "data entry",
];

/// Turns a user message into search criteria. Never fails.
pub struct CriteriaExtractor {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl CriteriaExtractor {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    pub async fn extract(&self, text: &str) -> SearchCriteria {
        self.extract_with_source(text).await.0
    }

    /// Like [`extract`](Self::extract), also reporting which path produced
    /// the criteria.
    pub async fn extract_with_source(&self, text: &str) -> (SearchCriteria, CriteriaSource) {
        match self.extract_with_model(text).await {
            Ok(criteria) => {
                debug!(?criteria, "Criteria extracted by model");
                (criteria, CriteriaSource::Model)
            }
            Err(e) => {
                warn!(error = %e, "Model criteria extraction failed, using keyword rules");
                (extract_with_rules(text), CriteriaSource::Rules)
            }
        }
    }

    async fn extract_with_model(&self, text: &str) -> Result<SearchCriteria, ChatError> {
        let turns = [
            ChatTurn::system(EXTRACTION_SYSTEM_PROMPT),
            ChatTurn::user(extraction_prompt(text)),
        ];
        let raw = complete_with_timeout(self.model.as_ref(), &turns, self.timeout).await?;
        parse_model_criteria(&raw)
    }
}

fn extraction_prompt(text: &str) -> String {
    format!(
        r#"Extract job search criteria from this user message: "{}"

Return ONLY a JSON object with these possible fields:
- job_type: "Government" or "Private" (if mentioned)
- qualification: "12th Pass", "Graduate", "Post Graduate", or "Others" (if mentioned)
- experience: "0-2 years", "2-5 years", "5-10 years", or "10+ years" (if mentioned)
- district: Any Punjab district name (if mentioned)
- keywords: A short role or keyword like "clerk", "accountant", etc. (if mentioned)

Examples:
- "less than 2 years" or "under 2 years" or "0-2 years" or "fresher" -> "0-2 years"
- "2 to 5 years" or "2-5 years" -> "2-5 years"
- "5 to 10 years" or "5-10 years" -> "5-10 years"
- "10+ years" or "more than 10 years" -> "10+ years"

If no criteria are found, return an empty JSON object: {{}}

Return only the JSON, no other text."#,
        text
    )
}

/// Remove a surrounding ```` ```json ```` / ```` ``` ```` fence, if any.
pub fn strip_code_fence(raw: &str) -> &str {
    match CODE_FENCE.captures(raw).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str(),
        None => raw.trim(),
    }
}

/// Parse and canonicalize the model's JSON reply.
///
/// Values outside the canonical vocabularies drop only their own field; a
/// reply that is not a JSON object is [`ChatError::MalformedOutput`].
pub fn parse_model_criteria(raw: &str) -> Result<SearchCriteria, ChatError> {
    let value: Value = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| ChatError::MalformedOutput(format!("criteria are not JSON: {}", e)))?;
    let Value::Object(fields) = value else {
        return Err(ChatError::MalformedOutput(
            "criteria must be a JSON object".to_string(),
        ));
    };

    Ok(SearchCriteria {
        job_type: text_field(&fields, "job_type").and_then(|v| JobCategory::parse(&v)),
        qualification: text_field(&fields, "qualification").and_then(|v| Qualification::parse(&v)),
        experience: text_field(&fields, "experience").and_then(|v| ExperienceBand::parse(&v)),
        district: text_field(&fields, "district").and_then(|v| match_district(&v)),
        keywords: text_field(&fields, "keywords"),
    })
}

/// A trimmed, non-empty string field. Arrays of strings are joined with spaces.
fn text_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    let text = match fields.get(name)? {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Map a district as written by the model onto the gazetteer.
///
/// Tries an exact match, then a gazetteer name inside the value, then the
/// value inside a gazetteer name. Values shorter than three characters only
/// match exactly.
pub fn match_district(value: &str) -> Option<String> {
    let value = value.trim().to_lowercase();
    if value.is_empty() {
        return None;
    }
    DISTRICTS
        .iter()
        .find(|d| **d == value)
        .or_else(|| DISTRICTS.iter().find(|d| value.contains(**d)))
        .or_else(|| {
            if value.chars().count() < 3 {
                None
            } else {
                DISTRICTS.iter().find(|d| d.contains(value.as_str()))
            }
        })
        .map(|d| title_case(d))
}

/// Deterministic keyword extraction used when the model is unavailable.
pub fn extract_with_rules(text: &str) -> SearchCriteria {
    let lower = text.to_lowercase();
    let has_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    let job_type = if has_any(GOVERNMENT_WORDS) {
        Some(JobCategory::Government)
    } else if has_any(PRIVATE_WORDS) {
        Some(JobCategory::Private)
    } else {
        None
    };

    let qualification = QUALIFICATION_RULES
        .iter()
        .find(|(_, words)| has_any(*words))
        .map(|(q, _)| *q);

    let experience = EXPERIENCE_RULES
        .iter()
        .find(|(_, phrases)| has_any(*phrases))
        .map(|(band, _)| *band);

    let keywords = ROLE_KEYWORDS
        .iter()
        .find(|k| lower.contains(**k))
        .map(|k| k.to_string());

    let district = DISTRICTS
        .iter()
        .find(|d| lower.contains(**d))
        .map(|d| title_case(d));

    SearchCriteria {
        job_type,
        qualification,
        experience,
        district,
        keywords,
    }
}
