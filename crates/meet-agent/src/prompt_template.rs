use chrono::{Datelike, NaiveDate};
use include_dir::{include_dir, Dir};
use serde::Serialize;
use tera::{Context, Error as TeraError, Tera};

use crate::catalog::{summarize_tools, ToolSummary};
use crate::models::tool::Tool;

static PROMPTS: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/prompts");

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

/// Render one of the prompt templates bundled into the binary
pub fn load_prompt_file<T: Serialize>(name: &str, context_data: &T) -> Result<String, TeraError> {
    let template = PROMPTS
        .get_file(name)
        .and_then(|file| file.contents_utf8())
        .ok_or_else(|| TeraError::msg(format!("Prompt template not found: {}", name)))?;
    load_prompt(template, context_data)
}

#[derive(Serialize)]
struct SystemContext {
    weekday: String,
    date: String,
    year: i32,
    include_drive: bool,
    tools: Vec<ToolSummary>,
}

/// The system instruction for a conversation held on `today`
pub fn system_prompt(today: NaiveDate, tools: &[Tool]) -> Result<String, TeraError> {
    let context = SystemContext {
        weekday: today.format("%A").to_string(),
        date: today.format("%B %d, %Y").to_string(),
        year: today.year(),
        include_drive: tools.iter().any(|t| t.name.starts_with("GOOGLEDRIVE_")),
        tools: summarize_tools(tools),
    };
    load_prompt_file("system.md", &context)
}
