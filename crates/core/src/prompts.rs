use crate::text::truncate_chars;
use crate::tools::GET_SUMMARY_BY_TITLE;
use crate::RetrievedCandidate;

pub const SHORT_SUMMARY_MAX_CHARS: usize = 800;

pub fn system_prompt() -> String {
    format!(
        "You are Smart Librarian, a helpful assistant that recommends exactly ONE book \
from the provided context. Answer in English. \
Base your choice ONLY on the retrieved context items; do not invent titles that are not present. \
Briefly justify why the selected title matches the user's request. \
After deciding the title, call the tool {tool} with that exact title \
to include the full summary in the final answer. \
Be concise, helpful, and avoid spoilers beyond the provided full summary.",
        tool = GET_SUMMARY_BY_TITLE,
    )
}

pub fn user_message(query: &str, candidates: &[RetrievedCandidate]) -> String {
    format!(
        "User request:\n{query}\n\n\
Retrieved context (each item shows Title / Themes / Short Summary):\n\
{context}\n\n\
Instructions:\n\
- Recommend exactly ONE title from the context above.\n\
- Explain your reasoning briefly (1-3 sentences).\n\
- Then call the tool {tool}(requested_title) for the chosen title.\n\
- If the context is insufficient, say so explicitly.",
        context = format_context(candidates),
        tool = GET_SUMMARY_BY_TITLE,
    )
}

/// Grounding context in retrieved order.
pub fn format_context(candidates: &[RetrievedCandidate]) -> String {
    candidates
        .iter()
        .map(|candidate| {
            let themes = if candidate.themes.is_empty() {
                "N/A".to_string()
            } else {
                candidate.themes.join(", ")
            };
            format!(
                "- Title: {}\n  Themes: {}\n  Short Summary: {}",
                candidate.title,
                themes,
                truncate_chars(candidate.short_summary.trim(), SHORT_SUMMARY_MAX_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
