//! Factsheet generation
//!
//! Builds a prompt from the industry template and retrieved evidence,
//! calls the completion provider, and validates the output length. A
//! draft outside the word-count window triggers a retry with an adjusted
//! target; the final attempt is accepted unconditionally with the
//! validity recorded on the result.

use crate::batch::Company;
use crate::config::{GenerateConfig, ProviderConfig};
use crate::error::{Error, Result};
use crate::index::EvidenceItem;
use crate::provider::{CallPacer, CompletionRequest, CostModel, Provider};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SYSTEM_PROMPT: &str =
    "You are a professional business analyst creating factsheets for sales teams.";

/// Bounds for the adjusted target word count across retries
const TARGET_CEILING: usize = 900;
const TARGET_FLOOR: usize = 700;
const TARGET_STEP: usize = 100;

/// One generated factsheet with its generation metadata
#[derive(Debug, Clone)]
pub struct Factsheet {
    pub text: String,
    pub word_count: usize,
    pub word_count_valid: bool,
    pub attempts: usize,
    pub cost: f64,
    pub evidence_count: usize,
    pub model: String,
}

/// Generates factsheets through the bounded-retry loop
pub struct Generator {
    provider: Arc<dyn Provider>,
    cost_model: CostModel,
    pacer: CallPacer,
    config: GenerateConfig,
    max_tokens: u32,
    temperature: f32,
}

impl Generator {
    pub fn new(
        provider: Arc<dyn Provider>,
        provider_config: &ProviderConfig,
        config: GenerateConfig,
    ) -> Self {
        Self {
            provider,
            cost_model: CostModel::from_config(provider_config),
            pacer: CallPacer::new(provider_config.completion_calls_per_second),
            config,
            max_tokens: provider_config.max_tokens,
            temperature: provider_config.temperature,
        }
    }

    /// Generate one factsheet.
    ///
    /// The target word count is local to this call — retries adjust it
    /// without touching shared configuration, so concurrent entities
    /// never interfere.
    pub async fn generate(
        &self,
        company: &Company,
        template: &str,
        evidence: &[EvidenceItem],
    ) -> Result<Factsheet> {
        if evidence.is_empty() {
            return Err(Error::NoEvidence(company.id.to_string()));
        }

        let mut target = self.config.target_words;
        let mut cost = 0.0f64;

        for attempt in 0..=self.config.max_retries {
            let final_attempt = attempt == self.config.max_retries;
            let prompt = build_prompt(company, template, evidence, target, &self.config);

            self.pacer.pause().await;

            let completion = match self
                .provider
                .complete(&CompletionRequest {
                    system: SYSTEM_PROMPT.to_string(),
                    prompt,
                    max_tokens: self.max_tokens,
                    temperature: self.temperature,
                })
                .await
            {
                Ok(c) => c,
                Err(e) if final_attempt => {
                    return Err(Error::Generation(format!(
                        "provider failed on final attempt for {}: {}",
                        company.id, e
                    )));
                }
                Err(e) => {
                    warn!(
                        "Provider call failed on attempt {} for {}: {}",
                        attempt + 1,
                        company.id,
                        e
                    );
                    continue;
                }
            };

            cost += self
                .cost_model
                .completion_cost(completion.input_tokens, completion.output_tokens);

            let word_count = count_words(&completion.text);
            let valid =
                word_count >= self.config.min_words && word_count <= self.config.max_words;

            if valid || final_attempt {
                if !valid {
                    warn!(
                        "Accepting out-of-range factsheet for {} after {} attempts ({} words)",
                        company.id,
                        attempt + 1,
                        word_count
                    );
                }
                info!(
                    "Generated factsheet for {} ({} words, attempt {})",
                    company.id,
                    word_count,
                    attempt + 1
                );
                return Ok(Factsheet {
                    text: completion.text,
                    word_count,
                    word_count_valid: valid,
                    attempts: attempt + 1,
                    cost,
                    evidence_count: evidence.len(),
                    model: self.provider.model_name().to_string(),
                });
            }

            if word_count < self.config.min_words {
                target = (target + TARGET_STEP).min(TARGET_CEILING);
            } else {
                target = target.saturating_sub(TARGET_STEP).max(TARGET_FLOOR);
            }

            debug!(
                "Word count {} outside [{}, {}] for {}; retrying with target {}",
                word_count, self.config.min_words, self.config.max_words, company.id, target
            );
        }

        // The loop always returns from the final attempt.
        Err(Error::Generation(format!(
            "generation loop exhausted for {}",
            company.id
        )))
    }
}

/// Count whitespace-delimited words
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Derive a probable company name from a URL's first domain label
pub fn company_name_from_url(url: &str) -> String {
    let domain = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("www.");

    let label = domain.split(['.', '/']).next().unwrap_or_default();
    if label.is_empty() {
        return "Company".to_string();
    }

    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => "Company".to_string(),
    }
}

/// Build the generation prompt: company context, index-labeled evidence,
/// the template, and the grounding/length instructions.
fn build_prompt(
    company: &Company,
    template: &str,
    evidence: &[EvidenceItem],
    target_words: usize,
    config: &GenerateConfig,
) -> String {
    let company_name = company_name_from_url(&company.url);

    let evidence_text = evidence
        .iter()
        .enumerate()
        .map(|(i, item)| format!("Evidence {}:\n{}", i + 1, item.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are creating a comprehensive factsheet for a company.\n\n\
         COMPANY INFORMATION:\n\
         - Company URL: {url}\n\
         - Estimated Company Name: {name}\n\
         - Industry: {industry}\n\n\
         EVIDENCE FROM COMPANY WEBSITE:\n\
         {evidence}\n\n\
         TEMPLATE TO FILL:\n\
         {template}\n\n\
         INSTRUCTIONS:\n\
         1. Fill in ALL placeholders in the template\n\
         2. Use ONLY information from the provided evidence - do not invent facts\n\
         3. If specific information is not available in the evidence, write \
         \"Information not available in source material\"\n\
         4. Target word count: {target} words (minimum {min}, maximum {max})\n\
         5. Use professional, factual language appropriate for sales teams\n\
         6. Maintain the exact Markdown structure of the template\n\
         7. Replace {{company_name}} with the actual company name from the evidence or URL\n\n\
         Generate the complete factsheet now:",
        url = company.url,
        name = company_name,
        industry = company.industry,
        evidence = evidence_text,
        template = template,
        target = target_words,
        min = config.min_words,
        max = config.max_words,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::EntityId;
    use crate::provider::{Completion, EmbeddingBatch};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn company() -> Company {
        Company::new("https://acme.com", "technology").unwrap()
    }

    fn evidence(n: usize) -> Vec<EvidenceItem> {
        (0..n)
            .map(|i| EvidenceItem {
                text: format!("evidence {}", i),
                distance: 0.1,
                fingerprint: format!("fp{}", i),
                entity_id: EntityId::from_url("https://acme.com").unwrap(),
            })
            .collect()
    }

    fn text_of(words: usize) -> String {
        vec!["word"; words].join(" ")
    }

    enum Scripted {
        Reply(String),
        Fail,
    }

    /// Provider returning a scripted sequence of completions
    struct ScriptedProvider {
        script: Mutex<VecDeque<Scripted>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Scripted>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        async fn embed(&self, _texts: &[String]) -> Result<EmbeddingBatch> {
            unimplemented!("not used in generation tests")
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            match self.script.lock().unwrap().pop_front() {
                Some(Scripted::Reply(text)) => Ok(Completion {
                    text,
                    input_tokens: 100,
                    output_tokens: 50,
                }),
                Some(Scripted::Fail) => Err(Error::Generation("scripted failure".to_string())),
                None => panic!("script exhausted"),
            }
        }

        fn model_name(&self) -> &str {
            "scripted-model"
        }
    }

    fn generator(script: Vec<Scripted>) -> (Arc<ScriptedProvider>, Generator) {
        let provider = Arc::new(ScriptedProvider::new(script));
        let provider_config = ProviderConfig {
            completion_calls_per_second: 1000,
            ..ProviderConfig::default()
        };
        let generator = Generator::new(
            provider.clone(),
            &provider_config,
            GenerateConfig::default(),
        );
        (provider, generator)
    }

    #[tokio::test]
    async fn test_accepts_valid_second_attempt() {
        let (_, generator) = generator(vec![
            Scripted::Reply(text_of(500)),
            Scripted::Reply(text_of(800)),
        ]);

        let factsheet = generator
            .generate(&company(), "# {company_name}", &evidence(3))
            .await
            .unwrap();

        assert_eq!(factsheet.attempts, 2);
        assert_eq!(factsheet.word_count, 800);
        assert!(factsheet.word_count_valid);
        assert_eq!(factsheet.evidence_count, 3);
        assert!(factsheet.cost > 0.0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_accepts_invalid_result() {
        let (_, generator) = generator(vec![
            Scripted::Reply(text_of(500)),
            Scripted::Reply(text_of(500)),
            Scripted::Reply(text_of(500)),
        ]);

        let factsheet = generator
            .generate(&company(), "# {company_name}", &evidence(1))
            .await
            .unwrap();

        // max_retries = 2 → attempt 3 is accepted regardless
        assert_eq!(factsheet.attempts, 3);
        assert!(!factsheet.word_count_valid);
        assert_eq!(factsheet.word_count, 500);
    }

    #[tokio::test]
    async fn test_target_raised_when_short_capped_at_900() {
        let (provider, generator) = generator(vec![
            Scripted::Reply(text_of(100)),
            Scripted::Reply(text_of(100)),
            Scripted::Reply(text_of(100)),
        ]);

        let _ = generator
            .generate(&company(), "# {company_name}", &evidence(1))
            .await
            .unwrap();

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("Target word count: 800 words"));
        assert!(prompts[1].contains("Target word count: 900 words"));
        // Third attempt stays capped at 900.
        assert!(prompts[2].contains("Target word count: 900 words"));
    }

    #[tokio::test]
    async fn test_target_lowered_when_long_floored_at_700() {
        let (provider, generator) = generator(vec![
            Scripted::Reply(text_of(1200)),
            Scripted::Reply(text_of(1200)),
            Scripted::Reply(text_of(1200)),
        ]);

        let _ = generator
            .generate(&company(), "# {company_name}", &evidence(1))
            .await
            .unwrap();

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[1].contains("Target word count: 700 words"));
        assert!(prompts[2].contains("Target word count: 700 words"));
    }

    #[tokio::test]
    async fn test_nonfinal_provider_failure_is_retried() {
        let (_, generator) = generator(vec![
            Scripted::Fail,
            Scripted::Reply(text_of(800)),
        ]);

        let factsheet = generator
            .generate(&company(), "# {company_name}", &evidence(1))
            .await
            .unwrap();

        assert!(factsheet.word_count_valid);
        assert_eq!(factsheet.attempts, 2);
    }

    #[tokio::test]
    async fn test_final_provider_failure_is_terminal() {
        let (_, generator) = generator(vec![Scripted::Fail, Scripted::Fail, Scripted::Fail]);

        let err = generator
            .generate(&company(), "# {company_name}", &evidence(1))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Generation(_)));
    }

    #[tokio::test]
    async fn test_empty_evidence_is_no_evidence_error() {
        let (_, generator) = generator(vec![]);

        let err = generator
            .generate(&company(), "# {company_name}", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NoEvidence(_)));
    }

    #[test]
    fn test_company_name_from_url() {
        assert_eq!(company_name_from_url("https://acme.com"), "Acme");
        assert_eq!(company_name_from_url("https://www.drees.co.uk/homes"), "Drees");
        assert_eq!(company_name_from_url("http://tesla.com"), "Tesla");
    }

    #[test]
    fn test_prompt_labels_evidence() {
        let prompt = build_prompt(
            &company(),
            "# {company_name}",
            &evidence(2),
            800,
            &GenerateConfig::default(),
        );

        assert!(prompt.contains("Evidence 1:"));
        assert!(prompt.contains("Evidence 2:"));
        assert!(prompt.contains("{company_name}"));
        assert!(prompt.contains("Information not available in source material"));
    }
}
