//! Prompt construction for the agent and the judge
//!
//! - `catalog`: known merchant metrics and their chart kinds
//! - `request`: agent query formatting with judge feedback carried forward

mod catalog;
mod request;

pub use catalog::{ChartKind, KNOWN_METRICS, MetricSpec, chart_kind_for, lookup_metric, title_for};
pub use request::{DEFAULT_AGENT_TEMPLATE, MetricRequest, RequestFormatter};

use indexmap::IndexMap;
use std::fmt::{self, Write};

/// One rendered block of a prompt
#[derive(Debug, Clone)]
enum Block {
    Persona { expertise: String, domain: String },
    Goals(Vec<String>),
    /// Rendered where the first `context_item` was added
    Facts(IndexMap<String, String>),
    Prose { heading: Option<String>, body: String },
    Fenced { lang: String, body: String },
    Bullets { heading: String, items: Vec<String> },
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persona { expertise, domain } => write!(
                f,
                "<ROLE>\nYou are an expert {expertise} specializing in {domain}.\n</ROLE>"
            ),
            Self::Goals(goals) => {
                f.write_str("<OBJECTIVES>\n")?;
                for (n, goal) in goals.iter().enumerate() {
                    writeln!(f, "{}. {goal}", n + 1)?;
                }
                f.write_str("</OBJECTIVES>")
            }
            Self::Facts(facts) => {
                f.write_str("# Context\n")?;
                for (key, value) in facts {
                    write!(f, "\n**{key}**: {value}")?;
                }
                Ok(())
            }
            Self::Prose { heading, body } => {
                if let Some(heading) = heading {
                    write!(f, "# {heading}\n\n")?;
                }
                f.write_str(body.trim())
            }
            Self::Fenced { lang, body } => write!(f, "```{lang}\n{body}\n```"),
            Self::Bullets { heading, items } => {
                write!(f, "## {heading}\n")?;
                items.iter().try_for_each(|item| write!(f, "\n- {item}"))
            }
        }
    }
}

/// Builds prompts out of tagged and markdown blocks separated by blank lines
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    blocks: Vec<Block>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn role(self, expertise: &str, domain: &str) -> Self {
        self.push(Block::Persona {
            expertise: expertise.into(),
            domain: domain.into(),
        })
    }

    /// Numbered from 1
    pub fn objectives(self, goals: Vec<&str>) -> Self {
        self.push(Block::Goals(goals.into_iter().map(Into::into).collect()))
    }

    pub fn context_item(mut self, key: &str, value: &str) -> Self {
        if let Some(Block::Facts(facts)) = self
            .blocks
            .iter_mut()
            .find(|block| matches!(block, Block::Facts(_)))
        {
            facts.insert(key.into(), value.into());
            return self;
        }
        self.push(Block::Facts(IndexMap::from([(key.into(), value.into())])))
    }

    pub fn text(self, body: &str) -> Self {
        self.push(Block::Prose {
            heading: None,
            body: body.into(),
        })
    }

    pub fn section(self, heading: &str, body: &str) -> Self {
        self.push(Block::Prose {
            heading: Some(heading.into()),
            body: body.into(),
        })
    }

    pub fn code(self, lang: &str, body: &str) -> Self {
        self.push(Block::Fenced {
            lang: lang.into(),
            body: body.into(),
        })
    }

    /// No-op for an empty list
    pub fn bullets(self, heading: &str, items: &[String]) -> Self {
        if items.is_empty() {
            return self;
        }
        self.push(Block::Bullets {
            heading: heading.into(),
            items: items.to_vec(),
        })
    }

    pub fn build(self) -> String {
        let mut prompt = String::new();
        for block in &self.blocks {
            let _ = write!(prompt, "{block}\n\n");
        }
        prompt.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_and_numbered_objectives() {
        let prompt = PromptBuilder::new()
            .role("data quality analyst", "merchant analytics")
            .objectives(vec!["Check completeness", "Check plausibility"])
            .build();

        assert!(prompt.contains("<ROLE>"));
        assert!(prompt.contains("data quality analyst"));
        assert!(prompt.contains("1. Check completeness"));
        assert!(prompt.contains("2. Check plausibility"));
    }

    #[test]
    fn test_context_items_keep_order() {
        let prompt = PromptBuilder::new()
            .context_item("Merchant", "ABC")
            .context_item("Metric", "AOV")
            .build();

        let merchant = prompt.find("**Merchant**: ABC").unwrap();
        let metric = prompt.find("**Metric**: AOV").unwrap();
        assert!(merchant < metric);
        assert_eq!(prompt.matches("# Context").count(), 1);
    }

    #[test]
    fn test_code_and_section() {
        let prompt = PromptBuilder::new()
            .section("Structured Data", "Below:")
            .code("json", "{}")
            .build();
        assert!(prompt.contains("# Structured Data"));
        assert!(prompt.contains("```json\n{}\n```"));
    }

    #[test]
    fn test_empty_bullets_skipped() {
        let prompt = PromptBuilder::new().bullets("Suggestions", &[]).build();
        assert!(prompt.is_empty());

        let prompt = PromptBuilder::new()
            .bullets("Suggestions", &["Add 2025".to_string()])
            .build();
        assert!(prompt.contains("## Suggestions\n\n- Add 2025"));
    }
}
