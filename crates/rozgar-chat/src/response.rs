//! Reply generation: model path, template fallback, static last resort.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use rozgar_core::config::RozgarConfig;
use rozgar_core::types::{
    ChatMessage, CriteriaSource, JobStatistics, JobSummary, MessageMetadata, MessageRole,
    ResponsePath, SearchCriteria,
};

use crate::context::{build_context_block, format_history, format_location, format_salary};
use crate::error::ChatError;
use crate::extractor::CriteriaExtractor;
use crate::llm::{complete_with_timeout, LanguageModel};
use crate::store::{ConversationStore, JobQuery};
use crate::types::{ChatTurn, ComposedReply};

pub const SYSTEM_PROMPT: &str = "You are a helpful job search assistant for the Punjab Job Portal. \
Your role is to help job seekers find relevant opportunities in Punjab, India.

Key Information:
- Available job types: Government, Private
- Qualifications: 12th Pass, Graduate, Post Graduate, Others
- Experience levels: 0-2 years, 2-5 years, 5-10 years, 10+ years
- All 25 districts of Punjab are covered

When users ask about jobs, provide specific recommendations from the database. \
Always be helpful, friendly, and informative about Punjab employment opportunities. \
If you don't have specific information, guide them on how to search effectively.

Keep responses concise but informative. Use bullet points for job listings and include salary ranges when available.";

/// Returned when even the job search behind the fallback template fails.
pub const LAST_RESORT_REPLY: &str = "I'm here to help you find jobs in Punjab! Please try asking \
about specific job types, locations, or qualifications. For example: 'Find government jobs in \
Ludhiana' or 'Show me software developer positions'.";

/// Tunables for [`ResponseComposer`].
#[derive(Debug, Clone)]
pub struct ComposerSettings {
    pub search_limit: u32,
    pub fallback_listing: usize,
    pub history_turns: u32,
    pub model_timeout: Duration,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            search_limit: 5,
            fallback_listing: 3,
            history_turns: 5,
            model_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&RozgarConfig> for ComposerSettings {
    fn from(config: &RozgarConfig) -> Self {
        Self {
            search_limit: config.chat.search_limit,
            fallback_listing: config.chat.fallback_listing,
            history_turns: config.chat.history_turns,
            model_timeout: Duration::from_secs(config.model.timeout_secs.max(1)),
        }
    }
}

/// Builds replies from extracted criteria, matching jobs and statistics.
///
/// Never returns an error: every upstream failure degrades to the template
/// fallback, and a failing job search degrades to [`LAST_RESORT_REPLY`].
pub struct ResponseComposer {
    extractor: CriteriaExtractor,
    model: Arc<dyn LanguageModel>,
    jobs: Arc<dyn JobQuery>,
    store: Arc<dyn ConversationStore>,
    settings: ComposerSettings,
}

impl ResponseComposer {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        jobs: Arc<dyn JobQuery>,
        store: Arc<dyn ConversationStore>,
        settings: ComposerSettings,
    ) -> Self {
        Self {
            extractor: CriteriaExtractor::new(Arc::clone(&model), settings.model_timeout),
            model,
            jobs,
            store,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Generate a reply and persist the user message followed by the reply.
    ///
    /// Persistence is best effort: a failed write is logged and the reply is
    /// still returned.
    pub async fn compose(&self, session_id: &str, text: &str) -> ComposedReply {
        let reply = self.generate(session_id, text).await;
        self.persist(session_id, MessageRole::User, text, None).await;
        self.persist(session_id, MessageRole::Bot, &reply.text, Some(&reply.metadata()))
            .await;
        reply
    }

    /// Generate a reply without persisting anything.
    pub async fn generate(&self, session_id: &str, text: &str) -> ComposedReply {
        let (criteria, criteria_source) = self.extractor.extract_with_source(text).await;

        let jobs = if criteria.is_empty() {
            Ok(Vec::new())
        } else {
            self.jobs.search(&criteria, self.settings.search_limit).await
        };

        match &jobs {
            Ok(found) => match self.answer_with_model(session_id, text, &criteria, found).await {
                Ok(answer) => {
                    info!(
                        session_id,
                        jobs_found = found.len(),
                        model = self.model.model_id(),
                        "Reply generated by model"
                    );
                    return ComposedReply {
                        text: answer,
                        jobs_found: found.len(),
                        criteria,
                        criteria_source,
                        path: ResponsePath::Model,
                        model: Some(self.model.model_id().to_string()),
                    };
                }
                Err(e) => warn!(session_id, error = %e, "Model reply failed, using fallback"),
            },
            Err(e) => warn!(session_id, error = %e, "Job search failed"),
        }

        let jobs = match jobs {
            Ok(found) => self.broaden_for_fallback(&criteria, found).await,
            Err(e) => Err(e),
        };
        self.fallback(criteria, criteria_source, jobs).await
    }

    /// Fallback listings match on the structured filters only. The keyword
    /// is dropped so a role word does not hide jobs in the requested
    /// district or category; keyword-only criteria keep their own results.
    async fn broaden_for_fallback(
        &self,
        criteria: &SearchCriteria,
        found: Vec<JobSummary>,
    ) -> Result<Vec<JobSummary>, ChatError> {
        if criteria.keywords.is_none() {
            return Ok(found);
        }
        let broad = SearchCriteria {
            keywords: None,
            ..criteria.clone()
        };
        if broad.is_empty() {
            return Ok(found);
        }
        let jobs = self.jobs.search(&broad, self.settings.search_limit).await?;
        debug!(narrow = found.len(), broad = jobs.len(), "Fallback search without keywords");
        Ok(jobs)
    }

    /// Welcome text built from live statistics only.
    pub async fn welcome(&self) -> String {
        render_welcome(&self.statistics_or_placeholder().await)
    }

    async fn answer_with_model(
        &self,
        session_id: &str,
        text: &str,
        criteria: &SearchCriteria,
        jobs: &[JobSummary],
    ) -> Result<String, ChatError> {
        let stats = self.jobs.statistics().await?;
        let history = self.prior_history(session_id, text).await?;

        let mut turns = vec![
            ChatTurn::system(SYSTEM_PROMPT),
            ChatTurn::system(format!(
                "Context: {}",
                build_context_block(&stats, criteria, jobs)
            )),
        ];
        if !history.is_empty() {
            turns.push(ChatTurn::system(format_history(&history)));
        }
        turns.push(ChatTurn::user(text));

        let answer = complete_with_timeout(self.model.as_ref(), &turns, self.settings.model_timeout)
            .await?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(ChatError::MalformedOutput("empty completion".to_string()));
        }
        Ok(answer.to_string())
    }

    /// Recent messages in chronological order, without the current message
    /// when the caller has already persisted it.
    async fn prior_history(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let mut history = self
            .store
            .recent(session_id, self.settings.history_turns + 1)
            .await?;
        let newest_is_current = history
            .first()
            .is_some_and(|m| m.role == MessageRole::User && m.content == text);
        if newest_is_current {
            history.remove(0);
        }
        history.truncate(self.settings.history_turns as usize);
        history.reverse();
        Ok(history)
    }

    async fn fallback(
        &self,
        criteria: SearchCriteria,
        criteria_source: CriteriaSource,
        jobs: Result<Vec<JobSummary>, ChatError>,
    ) -> ComposedReply {
        let (text, jobs_found, path) = match jobs {
            Err(_) => (LAST_RESORT_REPLY.to_string(), 0, ResponsePath::Static),
            Ok(jobs) if !jobs.is_empty() => (
                render_job_listing(&jobs, self.settings.fallback_listing),
                jobs.len(),
                ResponsePath::Fallback,
            ),
            Ok(_) => (
                render_help(&self.statistics_or_placeholder().await),
                0,
                ResponsePath::Fallback,
            ),
        };
        debug!(?path, jobs_found, "Fallback reply rendered");

        ComposedReply {
            text,
            criteria,
            criteria_source,
            jobs_found,
            path,
            model: None,
        }
    }

    async fn statistics_or_placeholder(&self) -> JobStatistics {
        match self.jobs.statistics().await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Job statistics unavailable, using placeholders");
                JobStatistics::placeholder()
            }
        }
    }

    async fn persist(
        &self,
        session_id: &str,
        role: MessageRole,
        content: &str,
        metadata: Option<&MessageMetadata>,
    ) {
        if let Err(e) = self.store.append(session_id, role, content, metadata).await {
            warn!(session_id, role = role.as_str(), error = %e, "Failed to persist chat message");
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

fn render_job_listing(jobs: &[JobSummary], shown: usize) -> String {
    let mut out = format!("I found {} jobs matching your criteria:\n\n", jobs.len());
    for (i, job) in jobs.iter().take(shown).enumerate() {
        out.push_str(&format!(
            "{}. {} at {}\n   Location: {}\n   Salary: {}\n   Experience: {}\n   Qualification: {}\n\n",
            i + 1,
            job.title,
            job.organization,
            format_location(job),
            format_salary(job.salary_min, job.salary_max),
            job.experience,
            job.qualification,
        ));
    }
    if jobs.len() > shown {
        out.push_str(&format!("... and {} more jobs available!\n\n", jobs.len() - shown));
    }
    out.push_str(
        "💡 **Tips for job searching:**\n\
         • Be specific about your location and qualification\n\
         • Check application deadlines\n\
         • Apply early for better chances\n\
         • Keep your resume updated\n\n\
         Would you like to know more about any specific job or need help with applications?",
    );
    out
}

fn render_help(stats: &JobStatistics) -> String {
    format!(
        "Welcome to Punjab Job Portal! 🎯\n\n\
         **Current Statistics:**\n\
         • Government Jobs: {}\n\
         • Private Jobs: {}\n\
         • Total Districts: {}\n\n\
         **How to search for jobs:**\n\
         • 'Find government jobs in Ludhiana'\n\
         • 'Show me software developer positions'\n\
         • 'I need jobs for graduates in Amritsar'\n\
         • 'What are the highest paying jobs?'\n\n\
         **Available Job Types:**\n\
         • Government Jobs\n\
         • Private Sector Jobs\n\n\
         **Qualifications:**\n\
         • 12th Pass\n\
         • Graduate\n\
         • Post Graduate\n\n\
         How can I help you find your dream job today? 😊",
        stats.government_jobs, stats.private_jobs, stats.total_districts,
    )
}

fn render_welcome(stats: &JobStatistics) -> String {
    format!(
        "Welcome to the Punjab Job Portal! 🎯\n\n\
         Here's what I can help you with:\n\n\
         📊 **Current Statistics:**\n\
         • Government Jobs: {}\n\
         • Private Jobs: {}\n\
         • Total Districts: {}\n\
         • Total Employers: {}\n\n\
         🔍 **How to search for jobs:**\n\
         • \"Find government jobs in Ludhiana\"\n\
         • \"Show me software developer positions for graduates\"\n\
         • \"What are the highest paying jobs in Punjab?\"\n\
         • \"I need 2-5 years experience jobs in Amritsar\"\n\n\
         💡 **Tips:**\n\
         • Be specific about your location (district)\n\
         • Mention your qualification level\n\
         • Include your experience level\n\
         • Ask about salary ranges or benefits\n\n\
         How can I help you find your dream job today? 😊",
        stats.government_jobs, stats.private_jobs, stats.total_districts, stats.total_employers,
    )
}
