//! Help Assembler - topic-indexed documentation built from the registry.

use std::fmt::Write;

use super::dispatcher::ActiveModules;
use super::error::DispatchError;
use super::registry::Registry;

/// Topic that lists every module.
pub const OVERVIEW_TOPIC: &str = "overview";

/// Builds help text by reading the registry and the active module set.
pub struct HelpAssembler<'a> {
    registry: &'a Registry,
    active: &'a ActiveModules,
}

impl<'a> HelpAssembler<'a> {
    pub fn new(registry: &'a Registry, active: &'a ActiveModules) -> Self {
        Self { registry, active }
    }

    /// Every renderable topic: the overview, one per module in registration
    /// order, then module-supplied extras.
    pub fn topics(&self) -> Vec<String> {
        let mut topics = vec![OVERVIEW_TOPIC.to_string()];
        for module in self.registry.all_modules() {
            topics.push(module.name().to_lowercase());
        }
        for module in self.registry.all_modules() {
            for extra in module.help_topics() {
                let key = extra.key.to_lowercase();
                if !topics.contains(&key) {
                    topics.push(key);
                }
            }
        }
        topics
    }

    /// Render one topic. An empty topic is the overview.
    pub fn render(&self, topic: &str) -> Result<String, DispatchError> {
        let topic = topic.trim().to_lowercase();
        if topic.is_empty() || topic == OVERVIEW_TOPIC {
            return Ok(self.render_overview());
        }

        if let Some(text) = self.render_module(&topic) {
            return Ok(text);
        }

        for module in self.registry.all_modules() {
            if let Some(extra) = module
                .help_topics()
                .into_iter()
                .find(|t| t.key.eq_ignore_ascii_case(&topic))
            {
                return Ok(extra.text);
            }
        }

        Err(DispatchError::UnknownTopic {
            topic,
            available: self.topics(),
        })
    }

    fn render_overview(&self) -> String {
        let modules = self.registry.all_modules();
        let (active, inactive): (Vec<_>, Vec<_>) =
            modules.iter().partition(|m| self.active.contains(m.name()));
        let active_tools: usize = active.iter().map(|m| m.tools().len()).sum();

        let mut out = String::new();
        let _ = writeln!(
            out,
            "Active modules ({} modules, {} tools):",
            active.len(),
            active_tools
        );
        for module in &active {
            let _ = writeln!(
                out,
                "  - {}: {} ({} tools)",
                module.name(),
                module.description(),
                module.tools().len()
            );
        }

        if !inactive.is_empty() {
            let _ = writeln!(out, "\nAvailable via load_modules:");
            for module in &inactive {
                let _ = writeln!(
                    out,
                    "  - {}: {} ({} tools)",
                    module.name(),
                    module.description(),
                    module.tools().len()
                );
            }
        }

        let _ = write!(out, "\nTopics: {}", self.topics().join(", "));
        out
    }

    fn render_module(&self, topic: &str) -> Option<String> {
        let module = self
            .registry
            .all_modules()
            .iter()
            .find(|m| m.name().eq_ignore_ascii_case(topic))?;

        let mut out = String::new();
        let _ = writeln!(out, "{}: {}", module.name(), module.description());
        if !self.active.contains(module.name()) {
            let _ = writeln!(
                out,
                "(not loaded - call load_modules(modules=[\"{}\"]) to enable)",
                module.name()
            );
        }
        let _ = writeln!(out, "\nTools:");
        for tool in module.tools() {
            let required = tool.required_arguments();
            if required.is_empty() {
                let _ = writeln!(out, "  - {}: {}", tool.name(), tool.description());
            } else {
                let _ = writeln!(
                    out,
                    "  - {}({}): {}",
                    tool.name(),
                    required.join(", "),
                    tool.description()
                );
            }
        }
        Some(out.trim_end().to_string())
    }
}
