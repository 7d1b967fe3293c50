//! Prompt assembly and response parsing for the messages API extractor.

use super::adapter::{AdapterError, TranscriptInput};
use chrono::{TimeZone, Utc};
use serde_json::Value;

pub const SYSTEM_PROMPT: &str = r#"You are a sales engineering analyst. You read recorded discovery calls with a customer and distill what they said into a value framework.

Extract these five categories, synthesizing across every transcript you are given:

1. current_challenges: the problems and frustrations the customer has today, including the tools they use and where those tools fall short.
2. impact: the business cost of those challenges, such as lost engineering time, slower incident response, customer experience or revenue.
3. ideal_future_state: the workflow and outcomes the customer is hoping to reach.
4. everyday_metrics: the KPIs and SLAs the customer tracks or cares about.
5. core_requirements: the capabilities any solution must have.

Write two to four concise sentences per category. For every category also collect short quotes or close paraphrases from the transcripts that support it, possibly none.

Set confidence_score between 0.0 and 1.0 to reflect how directly the transcripts support your answers (0.0 is a guess, 1.0 is stated verbatim).

Respond with JSON only, in exactly this shape:
{
  "current_challenges": "...",
  "impact": "...",
  "ideal_future_state": "...",
  "everyday_metrics": "...",
  "core_requirements": "...",
  "confidence_score": 0.0,
  "evidence": {
    "current_challenges": ["..."],
    "impact": ["..."],
    "ideal_future_state": ["..."],
    "everyday_metrics": ["..."],
    "core_requirements": ["..."]
  }
}"#;

fn format_date(started_at: Option<i64>) -> String {
    started_at
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown date".to_string())
}

/// Builds the user message: one delimited block per transcript, in input order.
pub fn build_user_prompt(account_name: &str, transcripts: &[TranscriptInput]) -> String {
    let mut parts = vec![
        format!(
            "Analyze the following call transcript(s) for the customer account: {}.",
            account_name
        ),
        String::new(),
        format!("There are {} transcript(s) to analyze.", transcripts.len()),
        String::new(),
    ];

    for (i, input) in transcripts.iter().enumerate() {
        let idx = i + 1;
        let title = input
            .title
            .clone()
            .unwrap_or_else(|| format!("Call {}", idx));
        parts.push(format!(
            "--- TRANSCRIPT {}: {} (Date: {}) ---",
            idx,
            title,
            format_date(input.started_at)
        ));
        if let Some(duration) = input.duration_seconds {
            parts.push(format!("Duration: {} min", duration / 60));
        }
        if !input.participants.is_empty() {
            parts.push(format!("Participants: {}", input.participants.join(", ")));
        }
        parts.push(String::new());
        parts.push(input.transcript.clone());
        parts.push(String::new());
        parts.push(format!("--- END TRANSCRIPT {} ---", idx));
        parts.push(String::new());
    }

    parts.push(
        "Based on the transcript(s) above, extract the value framework as specified. \
         Return only valid JSON."
            .to_string(),
    );
    parts.join("\n")
}

/// Removes a surrounding markdown code fence (```json ... ```), if any.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => "",
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Parses the model's text into JSON. A parse failure is permanent and keeps
/// the raw text.
pub fn parse_model_json(raw_text: &str) -> Result<Value, AdapterError> {
    serde_json::from_str(strip_code_fences(raw_text)).map_err(|e| {
        AdapterError::permanent(format!("Failed to parse model response as JSON: {}", e))
            .with_raw_response(raw_text)
    })
}
