use crate::error::{CashbookError, Result};
use crate::llm::prompts::{build_patch_prompt, build_user_prompt, SYSTEM_PROMPT_EXTRACTION};
use crate::llm::{client::GeminiClient, types::*};
use crate::schema::ExtractedLedger;
use json_patch::Patch;
use log::{debug, info};
use tokio::sync::mpsc::Sender;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_MAX_RETRIES: usize = 3;

/// Turns free text into an [`ExtractedLedger`]. The returned ledger has always
/// passed [`ExtractedLedger::validate`]; partial or malformed output is an error.
pub struct TextExtractor {
    client: GeminiClient,
    model: String,
    system_prompt: String,
    max_retries: usize,
}

impl TextExtractor {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            system_prompt: SYSTEM_PROMPT_EXTRACTION.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Replace the default bookkeeping prompt (e.g. for a different locale).
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Number of JSON Patch correction rounds before giving up.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub async fn extract(
        &self,
        text: &str,
        progress: Option<Sender<ExtractionEvent>>,
    ) -> Result<ExtractedLedger> {
        if text.trim().is_empty() {
            return Err(CashbookError::ExtractionFailed(
                "Input text is empty".to_string(),
            ));
        }

        self.send_event(&progress, ExtractionEvent::Starting).await;
        info!(
            "Extracting records from {} characters of text",
            text.chars().count()
        );

        let schema_json = ExtractedLedger::schema_as_json()?;
        let response_schema = ExtractedLedger::gemini_response_schema()?;
        let mut messages = vec![Content::user(build_user_prompt(text, &schema_json))];

        self.send_event(&progress, ExtractionEvent::DraftingResponse)
            .await;

        let raw_json = self
            .client
            .generate_content(
                &self.model,
                &self.system_prompt,
                messages.clone(),
                Some(response_schema),
            )
            .await?;

        self.send_event(&progress, ExtractionEvent::ProcessingResponse)
            .await;

        let mut current_json: serde_json::Value =
            serde_json::from_str(&clean_json_output(&raw_json)).map_err(|e| {
                CashbookError::ExtractionFailed(format!("Initial JSON parse failed: {}", e))
            })?;

        for attempt in 1..=self.max_retries + 1 {
            self.send_event(&progress, ExtractionEvent::Validating { attempt })
                .await;

            let error_msg = match check_ledger(&current_json) {
                Ok(ledger) => {
                    info!(
                        "Extraction succeeded with {} incomes and {} expenses",
                        ledger.incomes.len(),
                        ledger.expenses.len()
                    );
                    self.send_event(
                        &progress,
                        ExtractionEvent::Success {
                            incomes: ledger.incomes.len(),
                            expenses: ledger.expenses.len(),
                        },
                    )
                    .await;
                    return Ok(ledger);
                }
                Err(msg) => msg,
            };

            if attempt > self.max_retries {
                break;
            }

            debug!("Extraction attempt {} needs correction: {}", attempt, error_msg);
            self.send_event(
                &progress,
                ExtractionEvent::CorrectionNeeded {
                    reason: error_msg.clone(),
                },
            )
            .await;
            self.send_event(&progress, ExtractionEvent::Patching { attempt })
                .await;

            self.apply_patch(&mut messages, &mut current_json, &error_msg)
                .await?;
        }

        let msg = "Max retries exceeded. The model could not resolve validation errors.";
        self.send_event(
            &progress,
            ExtractionEvent::Failed {
                reason: msg.to_string(),
            },
        )
        .await;
        Err(CashbookError::ExtractionFailed(msg.into()))
    }

    async fn send_event(&self, sender: &Option<Sender<ExtractionEvent>>, event: ExtractionEvent) {
        if let Some(tx) = sender {
            let _ = tx.send(event).await;
        }
    }

    async fn apply_patch(
        &self,
        history: &mut Vec<Content>,
        current_json: &mut serde_json::Value,
        error_msg: &str,
    ) -> Result<()> {
        // The model sees its own rejected JSON before the repair request.
        history.push(Content::model(current_json.to_string()));
        history.push(Content::user(build_patch_prompt(error_msg)));

        let patch_str = self
            .client
            .generate_content(
                &self.model,
                "You are a JSON Repair Agent.",
                history.clone(),
                None,
            )
            .await?;

        let patch: Patch = serde_json::from_str(&clean_json_output(&patch_str))?;
        json_patch::patch(current_json, &patch)?;

        Ok(())
    }
}

/// Deserializes and validates a candidate ledger, describing the problem in a
/// form the model can act on.
fn check_ledger(value: &serde_json::Value) -> std::result::Result<ExtractedLedger, String> {
    let ledger: ExtractedLedger = serde_json::from_value(value.clone())
        .map_err(|e| format!("Schema mismatch: {}", e))?;

    ledger
        .validate()
        .map_err(|e| format!("Invalid data: {}", e))?;

    Ok(ledger)
}

fn clean_json_output(raw: &str) -> String {
    let object = raw.find('{').zip(raw.rfind('}'));
    let array = raw.find('[').zip(raw.rfind(']'));

    // Whichever bracket opens first is the outermost value.
    let span = match (object, array) {
        (Some(o), Some(a)) => Some(if a.0 < o.0 { a } else { o }),
        (o, a) => o.or(a),
    };

    match span {
        Some((start, end)) if start <= end => raw[start..=end].to_string(),
        _ => raw.trim().to_string(),
    }
}
