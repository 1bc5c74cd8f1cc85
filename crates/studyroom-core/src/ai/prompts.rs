//! Prompt text for each command that calls the model.

use chrono::NaiveDate;

use crate::dates::format_date;
use crate::storage::TestRecord;

pub const SUMMARIZE_SYSTEM: &str = "You summarize PDFs.";
pub const EXPLAIN_SYSTEM: &str = "You explain concepts simply.";
pub const PLAN_SYSTEM: &str = "You generate exam revision plans.";

pub fn explain(question: &str) -> String {
    format!("Explain: {question}")
}

/// Study-plan request listing the user's upcoming tests.
pub fn exam_plan(username: &str, tests: &[TestRecord], today: NaiveDate) -> String {
    let exams = tests
        .iter()
        .map(|t| format!("{} on {} for {}", t.subject, format_date(t.date), t.portion))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "{username} has exams: {exams}. Today is {}. You are a smart assistant who will create a daily timetable.",
        format_date(today)
    )
}
