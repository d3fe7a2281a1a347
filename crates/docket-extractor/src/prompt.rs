//! LLM prompt engineering for meeting enrichment

use docket_domain::{DetailLevel, PriorSummary};

/// Upper bound on prior summaries placed in one prompt
const MAX_PRIOR_SUMMARIES: usize = 10;

/// Builds prompts for the LLM to summarize a meeting
pub struct PromptBuilder<'a> {
    text: &'a str,
    detail: DetailLevel,
    prior_summaries: &'a [PriorSummary],
}

impl<'a> PromptBuilder<'a> {
    /// Create a new prompt builder
    pub fn new(text: &'a str, detail: DetailLevel) -> Self {
        Self {
            text,
            detail,
            prior_summaries: &[],
        }
    }

    /// Add summaries of earlier meetings as context
    pub fn with_prior_summaries(mut self, prior: &'a [PriorSummary]) -> Self {
        self.prior_summaries = prior;
        self
    }

    /// Build the complete enrichment prompt
    pub fn build(&self) -> String {
        let mut prompt = String::new();

        // 1. Instruction and format specification
        prompt.push_str(ENRICHMENT_INSTRUCTIONS);
        prompt.push_str("\n\n");

        // 2. Level of detail
        prompt.push_str(&format!("Level of detail: {}\n", self.detail.as_str()));
        prompt.push_str(self.detail_guidance());
        prompt.push_str("\n\n");

        // 3. Earlier meetings, most recent last
        if !self.prior_summaries.is_empty() {
            prompt.push_str("Summaries of earlier meetings (for continuity, do not repeat them):\n");
            let skip = self.prior_summaries.len().saturating_sub(MAX_PRIOR_SUMMARIES);
            for prior in self.prior_summaries.iter().skip(skip) {
                prompt.push_str(&format!("- [{}] {}\n", prior.record_id, prior.summary));
            }
            prompt.push('\n');
        }

        // 4. The minutes
        prompt.push_str("Meeting minutes:\n");
        prompt.push_str("---\n");
        prompt.push_str(self.text);
        prompt.push_str("\n---\n\n");

        // 5. Output format reminder
        prompt.push_str(OUTPUT_FORMAT_REMINDER);

        prompt
    }

    fn detail_guidance(&self) -> &'static str {
        match self.detail {
            DetailLevel::Brief => "Write a one or two sentence summary and at most three topics.",
            DetailLevel::Standard => {
                "Write a single paragraph summary covering the main business and list the key decisions."
            }
            DetailLevel::Detailed => {
                "Write a thorough summary that covers every agenda item, and list every motion, bylaw and referral."
            }
        }
    }
}

const ENRICHMENT_INSTRUCTIONS: &str = r#"You are reading the official minutes of a city council meeting.
Produce a plain-language summary for residents, the topics discussed, and the decisions made.

Rules:
- Only report what the minutes say; do not speculate
- Decisions are motions carried or defeated, bylaws enacted, and items referred or postponed
- Name streets, neighbourhoods and dollar amounts when the minutes give them
- Topics are short noun phrases (e.g., "rezoning", "transit funding")"#;

const OUTPUT_FORMAT_REMINDER: &str = r#"Output format (JSON object only, no additional text):
{
  "summary": "plain-language summary",
  "topics": ["topic", "..."],
  "decisions": ["decision", "..."]
}

Remember: Return ONLY valid JSON, no markdown code blocks, no explanations."#;

#[cfg(test)]
mod tests {
    use super::*;
    use docket_domain::RecordId;

    fn prior(n: usize) -> PriorSummary {
        PriorSummary {
            record_id: RecordId::from(n),
            summary: format!("summary {}", n),
        }
    }

    #[test]
    fn test_prompt_includes_text() {
        let prompt = PromptBuilder::new("Council approved the budget", DetailLevel::Standard).build();
        assert!(prompt.contains("Council approved the budget"));
        assert!(prompt.contains("Meeting minutes:"));
    }

    #[test]
    fn test_prompt_includes_instructions() {
        let prompt = PromptBuilder::new("text", DetailLevel::Standard).build();
        assert!(prompt.contains("official minutes"));
        assert!(prompt.contains("\"summary\""));
        assert!(prompt.contains("\"decisions\""));
    }

    #[test]
    fn test_detail_level_changes_guidance() {
        let brief = PromptBuilder::new("text", DetailLevel::Brief).build();
        let detailed = PromptBuilder::new("text", DetailLevel::Detailed).build();

        assert!(brief.contains("Level of detail: brief"));
        assert!(brief.contains("one or two sentence"));
        assert!(detailed.contains("Level of detail: detailed"));
        assert!(detailed.contains("every agenda item"));
    }

    #[test]
    fn test_prompt_includes_prior_summaries() {
        let prior = vec![prior(1), prior(2)];
        let prompt = PromptBuilder::new("text", DetailLevel::Standard)
            .with_prior_summaries(&prior)
            .build();

        assert!(prompt.contains("earlier meetings"));
        assert!(prompt.contains("- [1] summary 1"));
        assert!(prompt.contains("- [2] summary 2"));
    }

    #[test]
    fn test_no_prior_section_without_context() {
        let prompt = PromptBuilder::new("text", DetailLevel::Standard).build();
        assert!(!prompt.contains("earlier meetings"));
    }

    #[test]
    fn test_limits_prior_summaries_to_most_recent() {
        let prior: Vec<_> = (0..25).map(prior).collect();
        let prompt = PromptBuilder::new("text", DetailLevel::Standard)
            .with_prior_summaries(&prior)
            .build();

        assert!(!prompt.contains("summary 14\n"));
        assert!(prompt.contains("summary 15\n"));
        assert!(prompt.contains("summary 24\n"));
    }
}
