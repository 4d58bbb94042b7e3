//! Prompt templates bundled at compile time.
//!
//! Templates use `{name}` placeholders that are filled with [`fill`] when
//! the agent specs and the planner/gatekeeper prompts are built.

/// Analyzer - extracts destination, dates and budget from the request
pub const ANALYZER: &str = include_str!("defaults/analyzer.md");

/// Weather - per-day forecast and advice
pub const WEATHER: &str = include_str!("defaults/weather.md");

/// Planner - day-by-day itinerary
pub const PLANNER: &str = include_str!("defaults/planner.md");

/// Supervisor - chooses which agents run and in what order
pub const SUPERVISOR: &str = include_str!("defaults/supervisor.md");

/// GateKeeper - reformats pooled outputs into the next agent's input
pub const GATEKEEPER: &str = include_str!("defaults/gatekeeper.md");

/// All default prompts with their slugs
pub fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![
        ("analyzer", ANALYZER),
        ("weather", WEATHER),
        ("planner", PLANNER),
        ("supervisor", SUPERVISOR),
        ("gatekeeper", GATEKEEPER),
    ]
}

/// Replace every `{key}` in `template` with its value
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |acc, (key, value)| {
            acc.replace(&format!("{{{key}}}"), value)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_prompts_non_empty() {
        for (slug, content) in all_defaults() {
            assert!(!content.is_empty(), "Prompt '{}' should not be empty", slug);
            assert!(content.len() > 50, "Prompt '{}' seems too short", slug);
        }
    }

    #[test]
    fn test_agent_templates_have_contract_placeholders() {
        for template in [ANALYZER, WEATHER, PLANNER] {
            assert!(template.contains("{description}"));
            assert!(template.contains("{input_format}"));
            assert!(template.contains("{input_example}"));
        }
        assert!(GATEKEEPER.contains("{agent_name}"));
        assert!(SUPERVISOR.contains("{team}"));
    }

    #[test]
    fn test_fill_leaves_json_braces_alone() {
        let filled = fill("## {title}\n{\n  \"a\": 1\n}", &[("title", "示例")]);
        assert_eq!(filled, "## 示例\n{\n  \"a\": 1\n}");
    }
}
