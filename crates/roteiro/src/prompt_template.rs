use serde::Serialize;
use tera::{Context, Error as TeraError, Tera};

use crate::models::tool::Tool;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

#[derive(Serialize)]
struct SystemPromptContext<'a> {
    today: String,
    tools: &'a [Tool],
}

/// The fixed system prompt for a run, listing the available capabilities
pub fn system_prompt(tools: &[Tool]) -> Result<String, TeraError> {
    let context = SystemPromptContext {
        today: chrono::Local::now().format("%Y-%m-%d").to_string(),
        tools,
    };
    load_prompt(SYSTEM_TEMPLATE, &context)
}
