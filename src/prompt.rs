//! Prompt construction for the five-bullet summarisation contract.

use crate::summary::BULLET_COUNT;

/// Maximum number of characters accepted as summarisation input
pub const MAX_INPUT_CHARS: usize = 5000;

const PREAMBLE: &str = "You are a professional summarization engine.";

/// Render the instruction sent to the model for `text`.
///
/// The output-format contract is stated negatively as well as positively,
/// since the model tends to drift toward markdown or stop early otherwise.
pub fn build_prompt(text: &str) -> String {
    let example = (1..=BULLET_COUNT)
        .map(|i| format!("    \"Sentence {i}.\""))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        r#"{PREAMBLE}

TASK:
Return EXACTLY {n} bullet points as a JSON array of {n} full sentences.
Each bullet MUST be a complete sentence.
DO NOT return fewer than {n} bullets.
DO NOT stop early.
DO NOT add commentary.
DO NOT return markdown.
DO NOT return partial sentences.

FORMAT:
{{
  "bullets": [
{example}
  ]
}}

TEXT TO SUMMARIZE:
{text}

Now return ONLY valid JSON."#,
        n = BULLET_COUNT,
    )
}
