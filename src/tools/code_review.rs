//! Rule-based code review tools
//!
//! Five tools forming the sample review workflow:
//! extract functions -> check complexity -> detect issues -> suggest
//! improvements -> evaluate quality. The last one raises `done` once the
//! computed quality score reaches the run's `quality_threshold`.

use crate::workflow::{
    registry::{Tool, ToolRegistry},
    types::{GraphDefinition, WorkflowState, DEFAULT_THRESHOLD, QUALITY_THRESHOLD_KEY},
};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::{collections::HashMap, sync::Arc, sync::LazyLock, time::Duration};

pub const EXTRACT_FUNCTIONS: &str = "extract_functions";
pub const CHECK_COMPLEXITY: &str = "check_complexity";
pub const DETECT_ISSUES: &str = "detect_issues";
pub const SUGGEST_IMPROVEMENTS: &str = "suggest_improvements";
pub const EVALUATE_QUALITY: &str = "evaluate_quality";

/// Payload key holding the code under review
pub const SOURCE_CODE_KEY: &str = "source_code";

/// Line-anchored `def name(` / `fn name(` definitions
///
/// Coroutines (`async def`, `async fn`) are not matched; only plain function
/// definitions are reported. The scan is textual and does not parse the
/// source, so definitions are still found in code that would not compile.
static FUNCTION_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?(?:def|fn)\s+([A-Za-z_][A-Za-z0-9_]*)\s*[(<]")
        .expect("function pattern is valid")
});

/// Register all review tools; `latency` is the simulated delay of the
/// complexity check
pub fn register_code_review_tools(registry: &ToolRegistry, latency: Duration) {
    registry.register(EXTRACT_FUNCTIONS, Arc::new(ExtractFunctions));
    registry.register(CHECK_COMPLEXITY, Arc::new(CheckComplexity { latency }));
    registry.register(DETECT_ISSUES, Arc::new(DetectIssues));
    registry.register(SUGGEST_IMPROVEMENTS, Arc::new(SuggestImprovements));
    registry.register(EVALUATE_QUALITY, Arc::new(EvaluateQuality));
}

/// The linear review graph: extract -> complexity -> issues -> suggest -> evaluate
pub fn code_review_graph(threshold: f64) -> GraphDefinition {
    let nodes = [
        ("extract", EXTRACT_FUNCTIONS),
        ("complexity", CHECK_COMPLEXITY),
        ("issues", DETECT_ISSUES),
        ("suggest", SUGGEST_IMPROVEMENTS),
        ("evaluate", EVALUATE_QUALITY),
    ];
    let edges = [
        ("extract", "complexity"),
        ("complexity", "issues"),
        ("issues", "suggest"),
        ("suggest", "evaluate"),
    ];

    GraphDefinition {
        nodes: to_map(&nodes),
        edges: to_map(&edges),
        entry_node: "extract".to_string(),
        threshold,
    }
}

fn to_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn source(state: &WorkflowState) -> &str {
    state.get_str(SOURCE_CODE_KEY).unwrap_or_default()
}

/// Collects function names into `data.functions`
///
/// Names are listed in source order; a source without definitions, or an
/// absent `source_code`, yields an empty list.
pub struct ExtractFunctions;

#[async_trait]
impl Tool for ExtractFunctions {
    async fn call(&self, mut state: WorkflowState) -> anyhow::Result<WorkflowState> {
        let functions: Vec<Value> = FUNCTION_DEF
            .captures_iter(source(&state))
            .filter_map(|caps| caps.get(1))
            .map(|name| Value::from(name.as_str()))
            .collect();

        state.set("functions", functions);
        Ok(state)
    }
}

/// Line-count heuristic into `data.complexity_score`
pub struct CheckComplexity {
    pub latency: Duration,
}

#[async_trait]
impl Tool for CheckComplexity {
    async fn call(&self, mut state: WorkflowState) -> anyhow::Result<WorkflowState> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let total_lines = source(&state).lines().count();
        state.set("complexity_score", (total_lines as f64 / 200.0).min(1.0));
        Ok(state)
    }
}

/// Naive pattern checks into `data.issues` and `data.issue_count`
pub struct DetectIssues;

#[async_trait]
impl Tool for DetectIssues {
    async fn call(&self, mut state: WorkflowState) -> anyhow::Result<WorkflowState> {
        let code = source(&state);
        let issues: Vec<&str> = [
            ("print(", "Debug prints found"),
            ("TODO", "TODO comments present"),
            ("eval(", "Use of eval detected"),
        ]
        .into_iter()
        .filter(|(needle, _)| code.contains(needle))
        .map(|(_, issue)| issue)
        .collect();

        let count = issues.len();
        state.set("issues", issues);
        state.set("issue_count", count);
        Ok(state)
    }
}

/// Maps complexity and issues to `data.suggestions`
pub struct SuggestImprovements;

#[async_trait]
impl Tool for SuggestImprovements {
    async fn call(&self, mut state: WorkflowState) -> anyhow::Result<WorkflowState> {
        let mut suggestions = Vec::new();

        if state.get_f64("complexity_score").unwrap_or(0.0) > 0.7 {
            suggestions.push("Consider splitting large functions into smaller units");
        }

        let issues = state
            .data
            .get("issues")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for issue in issues.iter().filter_map(Value::as_str) {
            if issue.contains("Debug prints") {
                suggestions.push("Remove debug print statements or use logging instead");
            }
            if issue.contains("TODO") {
                suggestions.push("Resolve or track TODO items before production");
            }
            if issue.contains("eval") {
                suggestions.push("Avoid eval; consider safer alternatives");
            }
        }

        state.set("suggestions", suggestions);
        Ok(state)
    }
}

/// Scores the review and raises `done` when the score reaches the threshold
pub struct EvaluateQuality;

#[async_trait]
impl Tool for EvaluateQuality {
    async fn call(&self, mut state: WorkflowState) -> anyhow::Result<WorkflowState> {
        let complexity = state.get_f64("complexity_score").unwrap_or(0.0);
        let issue_count = state.get_f64("issue_count").unwrap_or(0.0);

        let score = 1.0 - 0.4 * complexity - 0.1 * issue_count;
        state.quality_score = score.clamp(0.0, 1.0);

        let threshold = state
            .get_f64(QUALITY_THRESHOLD_KEY)
            .unwrap_or(DEFAULT_THRESHOLD);
        state.done = state.quality_score >= threshold;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_for(code: &str) -> WorkflowState {
        let mut state = WorkflowState::default();
        state.set(SOURCE_CODE_KEY, code);
        state
    }

    #[tokio::test]
    async fn extracts_python_and_rust_functions() {
        let code = "def add(a, b):\n    return a + b\n\nclass X:\n    def run(self):\n        pass\n\npub fn parse<T>(x: T) {}\n";
        let state = ExtractFunctions.call(state_for(code)).await.unwrap();
        assert_eq!(
            state.data["functions"],
            serde_json::json!(["add", "run", "parse"])
        );
    }

    #[tokio::test]
    async fn coroutines_are_not_reported() {
        let code = "async def fetch(url):\n    pass\n\ndef parse(body):\n    pass\n\nasync fn poll() {}\n";
        let state = ExtractFunctions.call(state_for(code)).await.unwrap();
        assert_eq!(state.data["functions"], serde_json::json!(["parse"]));
    }

    #[tokio::test]
    async fn unparsable_source_yields_no_functions() {
        let state = ExtractFunctions.call(state_for("}{ nonsense")).await.unwrap();
        assert_eq!(state.data["functions"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn complexity_scales_with_lines_and_caps() {
        let tool = CheckComplexity {
            latency: Duration::ZERO,
        };
        let short = tool.call(state_for(&"x\n".repeat(50))).await.unwrap();
        assert_eq!(short.get_f64("complexity_score"), Some(0.25));

        let long = tool.call(state_for(&"x\n".repeat(500))).await.unwrap();
        assert_eq!(long.get_f64("complexity_score"), Some(1.0));
    }

    #[tokio::test]
    async fn detects_issues_and_suggests_fixes() {
        let code = "def f():\n    print(eval('1'))  # TODO\n";
        let state = DetectIssues.call(state_for(code)).await.unwrap();
        assert_eq!(state.get_f64("issue_count"), Some(3.0));

        let state = SuggestImprovements.call(state).await.unwrap();
        assert_eq!(state.data["suggestions"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn evaluate_respects_threshold() {
        let mut state = WorkflowState::default();
        state.set("complexity_score", 0.5);
        state.set("issue_count", 1);
        state.set(QUALITY_THRESHOLD_KEY, 0.65);

        let state = EvaluateQuality.call(state).await.unwrap();
        assert!((state.quality_score - 0.7).abs() < 1e-9);
        assert!(state.done);

        let mut strict = state.clone();
        strict.set(QUALITY_THRESHOLD_KEY, 0.95);
        let strict = EvaluateQuality.call(strict).await.unwrap();
        assert!(!strict.done);
    }

    #[test]
    fn review_graph_is_linear() {
        let definition = code_review_graph(0.5);
        assert_eq!(definition.nodes.len(), 5);
        assert_eq!(definition.edges.len(), 4);
        assert!(!definition.edges.contains_key("evaluate"));
    }
}
