//! Prompt construction for the three LLM stages.

use std::collections::BTreeMap;

use delfi_core::QueryResult;

pub(crate) const GENERATION_SYSTEM_PROMPT: &str = "\
You are an expert PostgreSQL query writer. You convert natural language \
questions into a single read-only SQL query.

Rules:
- Produce exactly one SELECT statement (WITH ... SELECT is allowed).
- Never produce INSERT, UPDATE, DELETE, DDL, or any statement that \
modifies data or session state.
- Use only the tables and columns listed in the provided schema.
- Qualify columns with table aliases whenever more than one table is \
involved.
- Use LIMIT when the question asks for the top or latest N rows.
- Return the query inside a ```sql code block and nothing else.";

pub(crate) fn generation_user_prompt(
    question: &str,
    schema_text: &str,
    previous_sql: Option<&str>,
    error_feedback: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Schema:\n{schema_text}\n\nQuestion: {question}\n\n\
         Write one PostgreSQL SELECT statement that answers the question."
    );
    if let Some(previous) = previous_sql {
        prompt.push_str(&format!(
            "\n\nYour previous attempt was rejected:\n```sql\n{previous}\n```"
        ));
    }
    if let Some(feedback) = error_feedback {
        prompt.push_str(&format!(
            "\n\nRejection reason: {feedback}\n\
             Produce a corrected query that avoids this problem."
        ));
    }
    prompt
}

pub(crate) const SELECTION_SYSTEM_PROMPT: &str = "\
You route analytics questions to the right database. Reply with a JSON \
object only, no prose: {\"database\": \"<name>\", \"confidence\": <0.0-1.0>, \
\"reason\": \"<one sentence>\"}. The database must be one of the listed \
names.";

pub(crate) fn selection_user_prompt(
    question: &str,
    databases: &BTreeMap<String, String>,
) -> String {
    let mut listing = String::new();
    for (name, description) in databases {
        if description.is_empty() {
            listing.push_str(&format!("- {name}\n"));
        } else {
            listing.push_str(&format!("- {name}: {description}\n"));
        }
    }
    format!("Available databases:\n{listing}\nQuestion: {question}")
}

pub(crate) const VALIDATION_SYSTEM_PROMPT: &str = "\
You judge whether SQL query results plausibly answer the user's original \
question. Reply with a JSON object only: {\"confidence\": <0-100>, \
\"explanation\": \"<one or two sentences>\", \"suggestion\": \"<optional \
improvement or null>\"}.";

pub(crate) fn validation_user_prompt(
    question: &str,
    sql: &str,
    result: &QueryResult,
    sample_rows: usize,
) -> String {
    let sample: Vec<&serde_json::Value> = result.rows.iter().take(sample_rows).collect();
    let sample_json =
        serde_json::to_string_pretty(&sample).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Question: {question}\n\nExecuted SQL:\n{sql}\n\n\
         Columns: {columns}\nTotal rows returned: {row_count}\n\
         Sample rows:\n{sample_json}\n\n\
         How confident are you that these results answer the question?",
        columns = result.columns.join(", "),
        row_count = result.row_count,
    )
}
