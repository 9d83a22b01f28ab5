//! Themed codenames for result slots.
//!
//! The theme is picked from keywords in the task description; the first
//! matching theme wins. Matching is by substring, so "email" also matches
//! the "ai" keyword of the AI theme.

struct Theme {
    keywords: &'static [&'static str],
    names: [&'static str; 3],
}

const THEMES: &[Theme] = &[
    Theme {
        keywords: &["data", "analyze", "process", "extract"],
        names: ["ATLAS-PRIME", "ORACLE-NEXUS", "HYDRA-CORE"],
    },
    Theme {
        keywords: &["create", "generate", "design", "write"],
        names: ["MUSE-FLOW", "GENESIS-PRIME", "AURORA-SYNC"],
    },
    Theme {
        keywords: &["ai", "predict", "learn", "model"],
        names: ["CORTEX-ONE", "NEXUS-MIND", "NEURAL-STORM"],
    },
    Theme {
        keywords: &["communicate", "chat", "message", "email"],
        names: ["HERMES-LINK", "HIVE-MIND", "ECHO-NET"],
    },
];

const DEFAULT_NAMES: [&str; 3] = ["QUANTUM-FLOW", "MATRIX-CORE", "NOVA-SYNC"];

fn theme_names(task_description: &str) -> [&'static str; 3] {
    let lower = task_description.to_lowercase();
    THEMES
        .iter()
        .find(|t| t.keywords.iter().any(|k| lower.contains(k)))
        .map(|t| t.names)
        .unwrap_or(DEFAULT_NAMES)
}

/// Codenames for `count` slots.
///
/// Slots beyond the third reuse the theme's names with a numeric suffix
/// (`ATLAS-PRIME-2`, `ORACLE-NEXUS-2`, ...).
pub fn solution_codenames(task_description: &str, count: usize) -> Vec<String> {
    let names = theme_names(task_description);
    (0..count)
        .map(|i| {
            let base = names[i % names.len()];
            match i / names.len() {
                0 => base.to_string(),
                round => format!("{}-{}", base, round + 1),
            }
        })
        .collect()
}
