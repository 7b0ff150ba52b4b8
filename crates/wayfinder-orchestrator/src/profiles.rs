use crate::types::FallbackStrategy;
use serde::Serialize;
use wayfinder_core::Capability;

/// Static description of how a capability is presented to the execution layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityProfile {
    /// Capability this profile describes.
    pub capability: Capability,
    /// Role label attached to selections.
    pub role: &'static str,
    /// Instructions handed to the executor.
    pub system_prompt: &'static str,
    /// Capability retried when a stage of this one fails.
    pub fallback: Capability,
}

impl CapabilityProfile {
    /// Fallback used when a stage on this capability fails.
    pub fn fallback_strategy(&self, max_retries: u32) -> FallbackStrategy {
        FallbackStrategy {
            capability: self.fallback,
            max_retries,
        }
    }
}

/// Profiles for every capability, in `Capability::ALL` order.
pub fn default_profiles() -> Vec<CapabilityProfile> {
    Capability::ALL.iter().map(|c| profile(*c)).collect()
}

/// Profile for `capability`.
pub fn profile(capability: Capability) -> CapabilityProfile {
    match capability {
        Capability::FastTask => CapabilityProfile {
            capability,
            role: "Quick Responder",
            system_prompt: FAST_TASK_PROMPT,
            fallback: Capability::Research,
        },
        Capability::Research => CapabilityProfile {
            capability,
            role: "Research Specialist",
            system_prompt: RESEARCH_PROMPT,
            fallback: Capability::Analysis,
        },
        Capability::Analysis => CapabilityProfile {
            capability,
            role: "Analyst",
            system_prompt: ANALYSIS_PROMPT,
            fallback: Capability::Coding,
        },
        Capability::Coding => CapabilityProfile {
            capability,
            role: "Software Engineer",
            system_prompt: CODING_PROMPT,
            fallback: Capability::Analysis,
        },
        Capability::Creative => CapabilityProfile {
            capability,
            role: "Creative Writer",
            system_prompt: CREATIVE_PROMPT,
            fallback: Capability::Analysis,
        },
    }
}

const FAST_TASK_PROMPT: &str = r#"You answer short, well-defined requests.
Reply directly and concisely. Do not elaborate unless asked."#;

const RESEARCH_PROMPT: &str = r#"You gather and summarize information.
Collect the relevant facts, cite where they came from, and flag anything uncertain."#;

const ANALYSIS_PROMPT: &str = r#"You reason carefully about complex problems.
Break the problem down, weigh alternatives, and state your conclusion with its assumptions."#;

const CODING_PROMPT: &str = r#"You write and fix code.
Produce complete, working code that follows the conventions of the surrounding project."#;

const CREATIVE_PROMPT: &str = r#"You write original content.
Match the requested tone and format; favor clarity over ornament."#;
