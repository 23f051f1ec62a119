use crate::models::BranchContext;
use crate::pipeline::ingest::types::Chunk;

pub const EVALUATION_SYSTEM_PROMPT: &str = r#"You are a regulatory compliance analyst. You evaluate whether a document satisfies one compliance criterion at a time.

RULES:
1. Judge ONLY from the document excerpts provided. Do not use outside knowledge about the institution.
2. Justify the answer by pointing to what the document says (or fails to say).
3. If the excerpts contain nothing relevant, state that the required content was not found in the document.
4. Output valid JSON only, with exactly these fields:
   {"feedback": "<justification grounded in the document>", "fulfilled": <true|false>, "score": <number 0-10>}"#;

pub const SUMMARY_SYSTEM_PROMPT: &str =
    "You are a regulatory compliance analyst writing a factual summary. Output plain text only.";

/// Build the evaluation prompt for one branch.
///
/// When retrieval produced no excerpts the prompt is still generated, with
/// an explicit empty-excerpts marker, so the model reports "not found"
/// rather than the pipeline skipping the criterion.
pub fn build_branch_prompt(context: &BranchContext, excerpts: &[Chunk]) -> String {
    let mut prompt = String::new();

    prompt.push_str("<CRITERION>\n");
    prompt.push_str(&format!("Title: {}\n", context.title));
    if !context.description.is_empty() {
        prompt.push_str(&format!("Description: {}\n", context.description));
    }
    prompt.push_str("</CRITERION>\n\n");

    prompt.push_str("<HIERARCHY>\n");
    prompt.push_str(&format!("Typification: {}\n", context.typification_name));
    prompt.push_str(&format!("Taxonomy: {}\n", context.taxonomy_title));
    prompt.push_str("</HIERARCHY>\n\n");

    if !context.source_names.is_empty() {
        prompt.push_str("<NORMATIVE_SOURCES>\n");
        for name in &context.source_names {
            prompt.push_str(&format!("- {name}\n"));
        }
        prompt.push_str("</NORMATIVE_SOURCES>\n\n");
    }

    prompt.push_str("<DOCUMENT_EXCERPTS>\n");
    if excerpts.is_empty() {
        prompt.push_str("(no relevant excerpts were retrieved from the document)\n");
    } else {
        for chunk in excerpts {
            prompt.push_str(&format!("[{}]\n{}\n\n", chunk.chunk_id(), chunk.content));
        }
    }
    prompt.push_str("</DOCUMENT_EXCERPTS>\n\n");

    prompt.push_str(
        "Evaluate whether the document satisfies this criterion. \
         Justify your answer from the excerpts above and respond with the JSON object only.",
    );

    prompt
}

/// Build the release-summary prompt from the top-2 and bottom-2 scoring
/// branches.
pub fn build_summary_prompt(
    top: &[(String, f64, String)],
    bottom: &[(String, f64, String)],
) -> String {
    let mut prompt = String::new();

    prompt.push_str("<BEST_RATED_CRITERIA>\n");
    for (title, score, feedback) in top {
        prompt.push_str(&format!("- {title} (score {score}): {feedback}\n"));
    }
    prompt.push_str("</BEST_RATED_CRITERIA>\n\n");

    prompt.push_str("<WORST_RATED_CRITERIA>\n");
    for (title, score, feedback) in bottom {
        prompt.push_str(&format!("- {title} (score {score}): {feedback}\n"));
    }
    prompt.push_str("</WORST_RATED_CRITERIA>\n\n");

    prompt.push_str(
        "Write one short paragraph summarizing how the document performed against \
         these criteria. Use no adjectives. State only what was met and what was not.",
    );

    prompt
}
