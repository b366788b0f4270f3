//! Text rendering shared by the model prompt and the fallback templates.

use std::fmt::Write;

use rozgar_core::types::{ChatMessage, JobStatistics, JobSummary, MessageRole, SearchCriteria};

/// Format a rupee amount with comma thousands separators, rounded to whole
/// rupees: `45000.0` becomes `45,000`.
pub fn format_rupees(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// `₹20,000 - ₹35,000`, with one-sided and missing ranges handled.
pub fn format_salary(min: Option<f64>, max: Option<f64>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("₹{} - ₹{}", format_rupees(min), format_rupees(max)),
        (Some(min), None) => format!("₹{}+", format_rupees(min)),
        (None, Some(max)) => format!("Up to ₹{}", format_rupees(max)),
        (None, None) => "Not disclosed".to_string(),
    }
}

/// District with the taluk in parentheses when known.
pub fn format_location(job: &JobSummary) -> String {
    match job.taluk.as_deref() {
        Some(taluk) if !taluk.is_empty() => format!("{} ({})", job.district, taluk),
        _ => job.district.clone(),
    }
}

/// Job listing given to the model as context.
pub fn format_jobs_for_model(jobs: &[JobSummary]) -> String {
    if jobs.is_empty() {
        return "No jobs found matching the criteria.".to_string();
    }
    jobs.iter()
        .map(|job| {
            format!(
                "• {} at {}\n  Location: {}\n  Salary: {}\n  Experience: {}\n  Qualification: {}\n  Vacancies: {}\n  Deadline: {}",
                job.title,
                job.organization,
                format_location(job),
                format_salary(job.salary_min, job.salary_max),
                job.experience,
                job.qualification,
                job.vacancies,
                job.deadline.as_deref().unwrap_or("Not specified"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Statistics, criteria and matching jobs, sent as the `Context:` turn.
pub fn build_context_block(
    stats: &JobStatistics,
    criteria: &SearchCriteria,
    jobs: &[JobSummary],
) -> String {
    let criteria_text = if criteria.is_empty() {
        "General inquiry".to_string()
    } else {
        serde_json::to_string(criteria).unwrap_or_else(|_| "General inquiry".to_string())
    };

    format!(
        "Current Job Statistics:\n\
         - Government Jobs: {}\n\
         - Private Jobs: {}\n\
         - Total Districts: {}\n\
         - Total Employers: {}\n\
         \n\
         User's search criteria: {}\n\
         \n\
         Relevant jobs found:\n\
         {}",
        stats.government_jobs,
        stats.private_jobs,
        stats.total_districts,
        stats.total_employers,
        criteria_text,
        format_jobs_for_model(jobs),
    )
}

/// `User:` / `Assistant:` lines in the order given.
pub fn format_history(messages: &[ChatMessage]) -> String {
    let mut out = String::from("Recent conversation:\n");
    for message in messages {
        let speaker = match message.role {
            MessageRole::User => "User",
            MessageRole::Bot => "Assistant",
        };
        let _ = writeln!(out, "{}: {}", speaker, message.content);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rozgar_core::types::JobCategory;

    fn job() -> JobSummary {
        JobSummary {
            id: 1,
            title: "Junior Clerk".to_string(),
            organization: "Punjab Civil Secretariat".to_string(),
            category: "Government".to_string(),
            qualification: "Graduate".to_string(),
            experience: "0-2 years".to_string(),
            district: "Ludhiana".to_string(),
            taluk: Some("Khanna".to_string()),
            salary_min: Some(19900.0),
            salary_max: Some(63200.0),
            vacancies: 12,
            deadline: Some("2026-12-31".to_string()),
        }
    }

    #[test]
    fn test_format_rupees() {
        assert_eq!(format_rupees(0.0), "0");
        assert_eq!(format_rupees(999.0), "999");
        assert_eq!(format_rupees(1000.0), "1,000");
        assert_eq!(format_rupees(45000.4), "45,000");
        assert_eq!(format_rupees(1234567.0), "1,234,567");
        assert_eq!(format_rupees(-2500.0), "-2,500");
    }

    #[test]
    fn test_format_salary_variants() {
        assert_eq!(format_salary(Some(15000.0), Some(30000.0)), "₹15,000 - ₹30,000");
        assert_eq!(format_salary(Some(15000.0), None), "₹15,000+");
        assert_eq!(format_salary(None, Some(30000.0)), "Up to ₹30,000");
        assert_eq!(format_salary(None, None), "Not disclosed");
    }

    #[test]
    fn test_format_location() {
        let mut j = job();
        assert_eq!(format_location(&j), "Ludhiana (Khanna)");
        j.taluk = None;
        assert_eq!(format_location(&j), "Ludhiana");
    }

    #[test]
    fn test_format_jobs_for_model() {
        assert_eq!(format_jobs_for_model(&[]), "No jobs found matching the criteria.");

        let text = format_jobs_for_model(&[job()]);
        assert!(text.starts_with("• Junior Clerk at Punjab Civil Secretariat"));
        assert!(text.contains("Location: Ludhiana (Khanna)"));
        assert!(text.contains("Salary: ₹19,900 - ₹63,200"));
        assert!(text.contains("Vacancies: 12"));
        assert!(text.contains("Deadline: 2026-12-31"));
    }

    #[test]
    fn test_context_block() {
        let stats = JobStatistics {
            government_jobs: 4,
            private_jobs: 6,
            total_districts: 25,
            total_employers: 7,
        };
        let block = build_context_block(&stats, &SearchCriteria::default(), &[]);
        assert!(block.contains("- Government Jobs: 4"));
        assert!(block.contains("- Total Employers: 7"));
        assert!(block.contains("User's search criteria: General inquiry"));
        assert!(block.ends_with("No jobs found matching the criteria."));

        let criteria = SearchCriteria {
            job_type: Some(JobCategory::Government),
            ..Default::default()
        };
        let block = build_context_block(&stats, &criteria, &[job()]);
        assert!(block.contains(r#"User's search criteria: {"job_type":"Government"}"#));
        assert!(block.contains("• Junior Clerk"));
    }

    #[test]
    fn test_format_history() {
        let message = |role, content: &str| ChatMessage {
            id: 0,
            session_id: "s".to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
            metadata: None,
        };
        let text = format_history(&[
            message(MessageRole::User, "hi"),
            message(MessageRole::Bot, "hello"),
        ]);
        assert_eq!(text, "Recent conversation:\nUser: hi\nAssistant: hello\n");
    }
}
