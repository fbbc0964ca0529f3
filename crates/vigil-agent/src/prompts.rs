//! Prompt templates for each generator-backed step.
//!
//! System prompts take a `{domain}` placeholder; user templates take the
//! step's inputs. Rendering goes through [`vigil_llm::render_template`].

use std::collections::BTreeMap;

use vigil_llm::render_template;

/// Subject area used when none is configured.
pub const DEFAULT_DOMAIN: &str = "nutritional and metabolic disorders";

/// Answer returned when a quality gate runs out of iterations.
pub const FALLBACK_RESPONSE: &str = "I apologize, but I need more context to provide an accurate answer. \
Could you please provide more details or rephrase your question?";

/// Placeholder rendered in place of empty retrieval results.
pub const NO_CONTEXT: &str = "(no relevant documents were found)";

pub const EXPAND_SYSTEM: &str = "You are an expert research assistant specialized in {domain}. \
Given a brief user query, rewrite and expand it into a detailed, comprehensive search query \
that covers the relevant aspects of the topic. Improve retrieval by including synonyms, \
related terms, and clarifications. Return only the expanded query.";

pub const EXPAND_USER: &str = "{query}";

pub const EXPAND_WITH_FEEDBACK_USER: &str = "{query}\n\nFeedback on the previous search query:\n{query_feedback}";

pub const CRAFT_SYSTEM: &str = "You are a knowledgeable assistant specialized in {domain}. \
Using the provided context from authoritative documents, answer the user's query clearly and concisely. \
Focus on evidence-based information and make sure the answer is relevant to the question. \
If the context does not provide a direct answer, say so and offer a best-effort response based on related information.";

pub const CRAFT_USER: &str = "Query: {query}\nContext: {context}\n\n{history}\n\nFeedback: {feedback}";

pub const GROUNDEDNESS_SYSTEM: &str = "You are an expert evaluator scoring the groundedness of a response. \
Given a response and the context it was generated from, score how well the response is supported by the context \
on a scale from 0.0 to 1.0. A score of 1.0 means the response is fully supported by the context; \
0.0 means it has no support or contains hallucinations. Rely only on the provided context. \
Return only the score as a number between 0.0 and 1.0, with no explanation.";

pub const GROUNDEDNESS_USER: &str = "Context: {context}\nResponse: {response}\n\nGroundedness score:";

pub const PRECISION_SYSTEM: &str = "You are a precise evaluator. Given a user query and a response, \
score how accurately and directly the response addresses the query. Ignore irrelevant information and \
judge only whether the query is answered fully and clearly. Score from 0.0 (not at all precise) to \
1.0 (perfectly precise). Return only a single number with no explanation.";

pub const PRECISION_USER: &str = "Query: {query}\nResponse: {response}\n\nPrecision score:";

pub const REFINE_RESPONSE_SYSTEM: &str = "You are an expert assistant specialized in {domain}. \
Given a user query and a generated response, suggest clear, specific improvements to the accuracy, \
completeness and relevance of the response. Correct factual errors and point out missing details. \
Answer with concise bullet points; do not rewrite the response.";

pub const REFINE_RESPONSE_USER: &str = "Query: {query}\nResponse: {response}\n\n\
What improvements can be made to enhance accuracy and completeness?";

pub const REFINE_QUERY_SYSTEM: &str = "You are an expert research assistant specialized in {domain}. \
Given the original user query and its expanded version, suggest specific improvements that make the \
expanded query more effective for retrieving relevant documents: synonyms, related concepts, \
clarifications, and removed ambiguities. Answer with concise suggestions; do not rewrite the query.";

pub const REFINE_QUERY_USER: &str = "Original Query: {query}\nExpanded Query: {expanded_query}\n\n\
What improvements can be made for a better search?";

/// Render a system prompt for `domain`.
pub fn system_prompt(template: &str, domain: &str) -> String {
    let mut vars = BTreeMap::new();
    vars.insert("domain".to_string(), domain.to_string());
    render_template(template, &vars)
}

/// Fold refinement suggestions into the feedback string for the next cycle.
pub fn feedback(label: &str, previous: &str, suggestions: &str) -> String {
    format!("Previous {label}: {previous}\nSuggestions: {suggestions}")
}
