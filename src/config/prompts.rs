//! Prompt templates for Avisa.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub synthesis: SynthesisPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompts for newsletter segment synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisPrompts {
    pub system: String,
    pub user: String,
}

impl Default for SynthesisPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a professional news article writer. You write newsletter sections based on video transcript excerpts, in flowing prose rather than a list of quotes.

Guidelines:
- Synthesize the excerpts into a coherent, objective, journalistic section
- Cite sources using [1], [2], [3] whenever you use information from an excerpt
- Every major point must carry a citation; never cite a number that was not provided
- If excerpts conflict or present different perspectives, present multiple viewpoints
- Write the entire section in the requested language"#
                .to_string(),

            user: r#"TOPIC: {{keyword}}
TARGET LANGUAGE: {{language}}

SOURCE MATERIAL:
Below are {{source_count}} video transcript excerpts. Each is numbered [1], [2], [3], etc.

{{sources}}

INSTRUCTIONS:
1. Write one newsletter section about the topic, synthesizing the excerpts above
2. Start with a short subheading line, then 1-3 paragraphs of prose
3. Cite sources inline with [1], [2], [3] markers for every claim you take from them
4. Write everything in {{language}}
5. Do not invent citation numbers beyond the provided sources"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let synthesis_path = custom_path.join("synthesis.toml");
            if synthesis_path.exists() {
                let content = std::fs::read_to_string(&synthesis_path)?;
                prompts.synthesis = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(!prompts.synthesis.system.is_empty());
        assert!(prompts.synthesis.user.contains("{{keyword}}"));
    }

    #[test]
    fn test_render_template() {
        let template = "Topic {{keyword}} in {{language}}.";
        let mut vars = std::collections::HashMap::new();
        vars.insert("keyword".to_string(), "earnings".to_string());
        vars.insert("language".to_string(), "English".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Topic earnings in English.");
    }
}
