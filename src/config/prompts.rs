//! Prompt templates for Prospekt.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub chat: ChatPrompts,
    /// Instructions sent to the remote brochure parser.
    pub parsing: ParsingPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for the context chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatPrompts {
    pub system: String,
    /// Wraps the retrieved chunks; must contain `{{context}}`.
    pub context: String,
}

impl Default for ChatPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a savvy German shopping assistant reading grocery brochures (Prospekte).
Rules for answering:
1. PRICE INTERPRETATION: If you see a price like '169' or '129' in a table context, it almost always means '1.69 €' or '1.29 €'. Assume the last two digits are cents.
2. SEARCH BROADLY: If the user asks for 'Butter', look for 'Markenbutter', 'Streichfett', or specific brands like 'Kerrygold'.
3. NO HALLUCINATION: If a price column says 'AKTION' but has no number, say 'Price not listed'.
4. ALWAYS list the Store Name found in the context."#
                .to_string(),

            context: r#"Context information from the brochures is below.
--------------------
{{context}}
--------------------
Answer using only this context and the conversation so far."#
                .to_string(),
        }
    }
}

/// Prompts for the remote document parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingPrompts {
    pub instructions: String,
}

impl Default for ParsingPrompts {
    fn default() -> Self {
        Self {
            instructions: r#"The provided document is a grocery store brochure (Prospekt) with a grid layout.
1. Extract all products and their prices into Markdown tables.
2. IMPORTANT: Prices often lack a decimal point (e.g., "169" means "1.69"). Always format prices with a decimal point.
3. Add the Store Name to the beginning of every table caption."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let chat_path = custom_path.join("chat.toml");
            if chat_path.exists() {
                let content = std::fs::read_to_string(&chat_path)?;
                prompts.chat = toml::from_str(&content)?;
            }

            let parsing_path = custom_path.join("parsing.toml");
            if parsing_path.exists() {
                let content = std::fs::read_to_string(&parsing_path)?;
                prompts.parsing = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Placeholders are resolved in a single pass over the template, so
    /// substituted values are never scanned for further placeholders.
    /// Unknown placeholders are left as they are.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find("}}").and_then(|end| vars.get(&after[..end]).map(|v| (end, v))) {
                Some((end, value)) => {
                    result.push_str(value);
                    rest = &after[end + 2..];
                }
                None => {
                    result.push_str("{{");
                    rest = after;
                }
            }
        }

        result.push_str(rest);
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// System prompt with custom variables applied.
    pub fn system_prompt(&self) -> String {
        self.render_with_custom(&self.chat.system, &HashMap::new())
    }

    /// Wrap a context block in the context template.
    ///
    /// Custom variables are applied to the template before the context is
    /// inserted, so retrieved text reaches the model verbatim.
    pub fn render_context(&self, context: &str) -> String {
        let template = self.render_with_custom(&self.chat.context, &HashMap::new());
        let mut vars = HashMap::new();
        vars.insert("context".to_string(), context.to_string());
        Self::render(&template, &vars)
    }

    /// Parsing instructions with custom variables applied.
    pub fn parsing_instructions(&self) -> String {
        self.render_with_custom(&self.parsing.instructions, &HashMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(prompts.chat.system.contains("PRICE INTERPRETATION"));
        assert!(prompts.chat.context.contains("{{context}}"));
        assert!(prompts.parsing.instructions.contains("Markdown tables"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} offers.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 offers.");
    }

    #[test]
    fn test_render_context_keeps_text_verbatim() {
        let prompts = Prompts::default();
        let rendered = prompts.render_context("ALDI\nButter 169");
        assert!(rendered.contains("ALDI\nButter 169"));
        assert!(!rendered.contains("{{context}}"));
    }

    #[test]
    fn test_context_placeholders_are_not_rendered() {
        let mut prompts = Prompts::default();
        prompts.chat.context = "Angebote in {{city}}:\n{{context}}".to_string();
        prompts.variables.insert("city".to_string(), "Berlin".to_string());

        let rendered = prompts.render_context("Coupon {{city}} gilt nur online. {{context}}");
        assert_eq!(
            rendered,
            "Angebote in Berlin:\nCoupon {{city}} gilt nur online. {{context}}"
        );
    }

    #[test]
    fn test_unknown_placeholders_are_kept() {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "{{count}}".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render("{{name}} / {{count}} / {{missing}} / {{", &vars);
        assert_eq!(result, "{{count}} / 5 / {{missing}} / {{");
    }

    #[test]
    fn test_custom_dir_overrides_chat_prompts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("chat.toml"),
            "system = \"Answer for {{city}} shoppers.\"\n",
        )
        .unwrap();

        let mut vars = HashMap::new();
        vars.insert("city".to_string(), "Berlin".to_string());
        let prompts = Prompts::load(dir.path().to_str(), Some(&vars)).unwrap();

        assert_eq!(prompts.system_prompt(), "Answer for Berlin shoppers.");
        assert!(prompts.chat.context.contains("{{context}}"));
    }
}
