//! The reason-act loop.
//!
//! ```text
//! Init → BuildPrompt → Retrieve → ModelCall → ParseCalls
//!                                  ↑              │
//!                                  │   (calls)    ├─(no calls)→ Finalize
//!                                  └── Observe ← ExecuteTools ┘
//! ```
//!
//! The system prompt does not depend on retrieved context, so it is built
//! first and its `PromptMeta` rides on every event of the turn.
//!
//! The loop is bounded by `max_iterations`; hitting the bound ends in
//! `MaxIterations` with the configured fallback answer. Only `Final`
//! persists the exchange to memory. Model and persistence errors abort the
//! run; tool and parse failures become Observations.

use serde::Serialize;
use serde_json::json;
use sidekick_config::{AgentConfig, ContextConfig, ModelConfig, PromptsConfig};
use sidekick_core::{ConversationEntry, GenerateRequest, ModelClient, ToolCall, ToolError};
use sidekick_memory::MemoryManager;
use sidekick_prompts::PromptBuilder;
use sidekick_telemetry::{EventContext, Telemetry, WorkflowTracer, names};
use sidekick_tools::{ParseReport, ToolHandler, parse_tool_calls};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::ContextEngineer;
use crate::context::token::estimate_tokens;
use crate::pruning::{compress_observation, prune_if_needed};
use crate::summarizer::HistorySummarizer;

/// Stop sequences that keep the model from speaking for other roles.
const STOP_SEQUENCES: &[&str] = &["\nUser:", "\nSystem:"];

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminal {
    /// The model answered without a tool call
    Final,
    /// The iteration ceiling was reached
    MaxIterations,
}

/// Outcome of one [`Orchestrator::run_detailed`] call.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub response: String,
    pub terminal: Terminal,
    /// Model calls made
    pub iterations: usize,
    /// Tool calls handled, including rejected ones
    pub tool_calls: usize,
    pub correlation_id: String,
}

/// Per-run settings.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Capability allowlist for this run; overrides the configured one
    pub allowed_capabilities: Option<BTreeSet<String>>,

    /// Overrides `AgentConfig::max_iterations`
    pub max_iterations: Option<usize>,
}

impl RunOptions {
    pub fn with_allowed_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_capabilities = Some(capabilities.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }
}

/// Flatten entries into the prompt text sent to the model.
pub fn render_conversation(entries: &[ConversationEntry]) -> String {
    let mut text = String::new();
    for entry in entries {
        text.push_str(entry.role.label());
        text.push_str(": ");
        text.push_str(&entry.content);
        text.push('\n');
    }
    text.push_str("Assistant:");
    text
}

/// Composes model, memory, tools, prompts and telemetry into the loop.
///
/// Every collaborator is injected; nothing is global.
pub struct Orchestrator {
    model: Arc<ModelClient>,
    memory: Arc<MemoryManager>,
    tools: Arc<ToolHandler>,
    prompts: PromptBuilder,
    telemetry: Telemetry,
    summarizer: Option<Arc<dyn HistorySummarizer>>,
    agent: AgentConfig,
    context: ContextConfig,
    prompt_ids: PromptsConfig,
    max_tokens: u32,
    temperature: f32,
}

impl Orchestrator {
    pub fn new(
        model: Arc<ModelClient>,
        memory: Arc<MemoryManager>,
        tools: Arc<ToolHandler>,
        prompts: PromptBuilder,
        telemetry: Telemetry,
    ) -> Self {
        let defaults = ModelConfig::default();
        Self {
            model,
            memory,
            tools,
            prompts,
            telemetry,
            summarizer: None,
            agent: AgentConfig::default(),
            context: ContextConfig::default(),
            prompt_ids: PromptsConfig::default(),
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
        }
    }

    pub fn with_agent_config(mut self, config: AgentConfig) -> Self {
        self.agent = config;
        self
    }

    pub fn with_context_config(mut self, config: ContextConfig) -> Self {
        self.context = config;
        self
    }

    /// Which registered prompts to render.
    pub fn with_prompts_config(mut self, config: PromptsConfig) -> Self {
        self.prompt_ids = config;
        self
    }

    /// Generation limits taken from the model section.
    pub fn with_model_config(mut self, config: &ModelConfig) -> Self {
        self.max_tokens = config.max_tokens;
        self.temperature = config.temperature;
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn HistorySummarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn memory(&self) -> &Arc<MemoryManager> {
        &self.memory
    }

    pub fn agent_config(&self) -> &AgentConfig {
        &self.agent
    }

    /// Run one turn and return the answer text.
    pub async fn run(&self, prompt: &str, options: &RunOptions) -> sidekick_core::Result<String> {
        Ok(self.run_detailed(prompt, options).await?.response)
    }

    /// Run one turn and report how it ended.
    pub async fn run_detailed(
        &self,
        prompt: &str,
        options: &RunOptions,
    ) -> sidekick_core::Result<RunReport> {
        let started = Instant::now();
        let correlation_id = Uuid::new_v4().to_string();
        let turn_id = Uuid::new_v4().to_string();
        let mut ctx = EventContext::new(&correlation_id)
            .with_conversation(self.memory.conversation_id(), &turn_id);
        let mut tracer = WorkflowTracer::new(self.telemetry.clone(), ctx.clone());

        let allowlist = options.allowed_capabilities.clone().or_else(|| {
            self.agent
                .allowed_capabilities
                .as_ref()
                .map(|caps| caps.iter().cloned().collect())
        });
        let max_iterations = options.max_iterations.unwrap_or(self.agent.max_iterations);

        info!(
            correlation_id = %correlation_id,
            session = %self.memory.conversation_id(),
            prompt_chars = prompt.len(),
            "Starting run"
        );

        // ── Build prompt ──
        let step = tracer.start_step("build_prompt", json!({}));
        let tools = self.tools.registry().list(allowlist.as_ref());
        let built = match self.prompts.build_system_prompt(
            &self.prompt_ids.system_prompt_id,
            self.prompt_ids.system_prompt_version,
            &tools,
        ) {
            Ok(built) => built,
            Err(e) => {
                tracer.fail_step(&step, &e.to_string());
                return Err(e.into());
            }
        };
        ctx = ctx.with_prompt(built.meta.clone());
        tracer.set_context(ctx.clone());
        tracer.end_step(&step, json!({ "tools": tools.len(), "prompt_chars": built.text.len() }));

        // ── Retrieve ──
        let step = tracer.start_step("retrieve", json!({ "query_chars": prompt.len() }));
        let history = self.memory.history().await;
        let engineered = self.engineer().engineer_context(prompt, &history, &ctx).await;
        tracer.end_step(
            &step,
            json!({
                "path": engineered.path,
                "items": engineered.items.len(),
                "history_entries": history.len(),
            }),
        );

        let mut entries = vec![ConversationEntry::system(built.text)];
        entries.extend(engineered.entries());
        entries.push(ConversationEntry::user(prompt));

        // ── Reason-act loop ──
        let mut iterations = 0;
        let mut tool_calls = 0;
        let mut tool_results: Vec<String> = Vec::new();
        let mut answer: Option<String> = None;

        while iterations < max_iterations {
            iterations += 1;

            if let Some(report) = prune_if_needed(
                &mut entries,
                self.agent.prune_char_threshold,
                self.agent.prune_keep_last,
            ) {
                debug!(
                    iteration = iterations,
                    chars_before = report.chars_before,
                    chars_after = report.chars_after,
                    "Pruned context"
                );
                self.telemetry.event(
                    names::CONTEXT_PRUNED,
                    json!({ "iteration": iterations, "report": report }),
                    &ctx,
                );
            }

            let text = self.call_model(&entries, iterations, &tracer, &ctx).await?;

            let report = parse_tool_calls(&text);
            self.report_parse_warnings(&report, iterations, &ctx);
            if report.calls.is_empty() {
                answer = Some(text);
                break;
            }

            entries.push(ConversationEntry::assistant(text));
            let step = tracer.start_step(
                "execute_tools",
                json!({ "iteration": iterations, "calls": report.calls.len() }),
            );
            let mut failures = 0;
            for call in &report.calls {
                tool_calls += 1;
                let (observation, success) = self.observe(call, allowlist.as_ref(), &ctx).await;
                if !success {
                    failures += 1;
                }
                tool_results.push(format!("{}: {observation}", call.name));
                entries.push(ConversationEntry::observation(observation));
            }
            tracer.end_step(&step, json!({ "failures": failures }));
        }

        let (response, terminal) = match answer {
            Some(text) => {
                // ── Persist ──
                tracer
                    .scoped(
                        "persist",
                        self.memory.add_interaction(prompt, &text, &tool_results),
                    )
                    .await?;
                (text, Terminal::Final)
            }
            None => {
                warn!(
                    correlation_id = %correlation_id,
                    max_iterations,
                    "Max iterations reached; returning fallback"
                );
                (self.agent.fallback_response.clone(), Terminal::MaxIterations)
            }
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        self.telemetry.event(
            names::RUN_COMPLETE,
            json!({
                "terminal": terminal,
                "iterations": iterations,
                "tool_calls": tool_calls,
                "latency_ms": latency_ms,
                "response_chars": response.len(),
            }),
            &ctx,
        );
        info!(
            correlation_id = %correlation_id,
            ?terminal,
            iterations,
            tool_calls,
            latency_ms,
            "Run complete"
        );

        Ok(RunReport {
            response,
            terminal,
            iterations,
            tool_calls,
            correlation_id,
        })
    }

    fn engineer(&self) -> ContextEngineer {
        let engineer =
            ContextEngineer::new(self.memory.clone(), self.context.clone(), self.telemetry.clone());
        match &self.summarizer {
            Some(summarizer) => engineer.with_summarizer(summarizer.clone()),
            None => engineer,
        }
    }

    /// One model call, bracketed by request/response telemetry.
    async fn call_model(
        &self,
        entries: &[ConversationEntry],
        iteration: usize,
        tracer: &WorkflowTracer,
        ctx: &EventContext,
    ) -> sidekick_core::Result<String> {
        let prompt = render_conversation(entries);
        let prompt_chars = prompt.len();
        let prompt_tokens = estimate_tokens(&prompt);

        let mut request = GenerateRequest::new(prompt);
        request.max_tokens = self.max_tokens;
        request.temperature = self.temperature;
        request.stop = STOP_SEQUENCES.iter().map(|s| s.to_string()).collect();

        self.telemetry.event(
            names::MODEL_INTERACTION,
            json!({
                "phase": "request",
                "iteration": iteration,
                "entries": entries.len(),
                "prompt_chars": prompt_chars,
                "prompt_tokens_est": prompt_tokens,
                "max_tokens": request.max_tokens,
                "temperature": request.temperature,
            }),
            ctx,
        );

        let started = Instant::now();
        let step = tracer.start_step("model_call", json!({ "iteration": iteration }));
        let response = match self.model.generate(request).await {
            Ok(response) => response,
            Err(e) => {
                tracer.fail_step(&step, &e.to_string());
                warn!(iteration, error = %e, "Model call failed; aborting run");
                return Err(e.into());
            }
        };
        let latency_ms = started.elapsed().as_millis() as u64;
        tracer.end_step(&step, json!({ "latency_ms": latency_ms }));

        self.telemetry.event(
            names::MODEL_INTERACTION,
            json!({
                "phase": "response",
                "iteration": iteration,
                "response_chars": response.text.len(),
                "tokens_generated": response.tokens_generated,
                "latency_ms": latency_ms,
            }),
            ctx,
        );
        debug!(iteration, latency_ms, response_chars = response.text.len(), "Model replied");
        Ok(response.text)
    }

    fn report_parse_warnings(&self, report: &ParseReport, iteration: usize, ctx: &EventContext) {
        for warning in &report.warnings {
            self.telemetry.event(
                names::TOOL_PARSE_ERROR,
                json!({
                    "iteration": iteration,
                    "kind": warning.kind,
                    "offset": warning.offset,
                    "message": warning.message,
                }),
                ctx,
            );
        }
    }

    /// Turn one parsed call into Observation text. Rejected calls never
    /// reach the handler.
    async fn observe(
        &self,
        call: &ToolCall,
        allowlist: Option<&BTreeSet<String>>,
        ctx: &EventContext,
    ) -> (String, bool) {
        if !call.ok {
            let error = ToolError::Rejected {
                tool_name: call.name.clone(),
                reason: call
                    .error
                    .clone()
                    .unwrap_or_else(|| "malformed tool call".into()),
            };
            self.telemetry.event(
                names::TOOL_PARSE_ERROR,
                json!({
                    "tool": call.name,
                    "kind": error.kind(),
                    "message": error.to_string(),
                }),
                ctx,
            );
            return (error.to_string(), false);
        }

        let outcome = self.tools.execute(call, allowlist, ctx).await;
        (
            compress_observation(&outcome.observation, self.agent.observation_char_limit),
            outcome.success,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{SequentialMockModel, in_memory_manager};
    use async_trait::async_trait;
    use serde_json::Value;
    use sidekick_core::{Error, ModelError, ToolArgs, ToolDefinition};
    use sidekick_prompts::PromptRegistry;
    use sidekick_telemetry::MemorySink;
    use sidekick_tools::ToolRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Harness {
        orchestrator: Orchestrator,
        model: Arc<SequentialMockModel>,
        sink: Arc<MemorySink>,
        weather_calls: Arc<AtomicUsize>,
    }

    fn harness(replies: Vec<Result<String, ModelError>>) -> Harness {
        let sink = Arc::new(MemorySink::new());
        let telemetry = Telemetry::new(sink.clone());
        let model = Arc::new(SequentialMockModel::new(replies));
        let weather_calls = Arc::new(AtomicUsize::new(0));

        let counter = weather_calls.clone();
        let weather = ToolDefinition::new(
            "weather",
            "Current weather for a city",
            json!({
                "type": "object",
                "properties": {"city": {"type": "string"}},
                "required": ["city"]
            }),
        )
        .with_capabilities(["weather"])
        .with_handler_fn(move |args: ToolArgs| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let city = args.get("city").and_then(Value::as_str).unwrap_or("?");
                Ok(Value::String(format!("Sunny in {city}")))
            }
        });
        let mut registry = ToolRegistry::new();
        registry.register("weather", weather, "info").unwrap();

        let orchestrator = Orchestrator::new(
            Arc::new(ModelClient::new(model.clone())),
            in_memory_manager("session", telemetry.clone()),
            Arc::new(ToolHandler::new(Arc::new(registry), telemetry.clone())),
            PromptBuilder::new(Arc::new(PromptRegistry::builtin().unwrap())),
            telemetry,
        );
        Harness {
            orchestrator,
            model,
            sink,
            weather_calls,
        }
    }

    fn texts(replies: &[&str]) -> Vec<Result<String, ModelError>> {
        replies.iter().map(|r| Ok(r.to_string())).collect()
    }

    #[test]
    fn conversation_renders_with_labels() {
        let text = render_conversation(&[
            ConversationEntry::system("Be brief."),
            ConversationEntry::user("hi"),
        ]);
        assert_eq!(text, "System: Be brief.\nUser: hi\nAssistant:");
    }

    #[tokio::test]
    async fn direct_answer_is_returned_verbatim() {
        let h = harness(texts(&["It is sunny."]));
        let report = h
            .orchestrator
            .run_detailed("What's the weather?", &RunOptions::default())
            .await
            .unwrap();

        assert_eq!(report.response, "It is sunny.");
        assert_eq!(report.terminal, Terminal::Final);
        assert_eq!(report.iterations, 1);
        assert_eq!(report.tool_calls, 0);

        let interactions = h.sink.named("model_interaction");
        assert_eq!(interactions.len(), 2);
        assert_eq!(interactions[0].payload["phase"], "request");
        assert_eq!(interactions[1].payload["phase"], "response");
        assert!(h.sink.named("tool_call").is_empty());
        assert_eq!(h.orchestrator.memory().history().await.len(), 2);
    }

    #[tokio::test]
    async fn tool_result_is_fed_back() {
        let h = harness(texts(&[
            "TOOL_CALL: weather(city=\"Paris\")",
            "It's sunny in Paris.",
        ]));
        let report = h
            .orchestrator
            .run_detailed("Weather in Paris?", &RunOptions::default())
            .await
            .unwrap();

        assert_eq!(report.response, "It's sunny in Paris.");
        assert_eq!(report.iterations, 2);
        assert_eq!(report.tool_calls, 1);
        assert_eq!(h.weather_calls.load(Ordering::SeqCst), 1);

        let prompts = h.model.prompts();
        assert!(prompts[1].contains("System: Observation: Sunny in Paris\n"));
        assert!(prompts[1].ends_with("Assistant:"));
    }

    #[tokio::test]
    async fn every_event_shares_the_correlation_id() {
        let h = harness(texts(&["TOOL_CALL: weather(city=\"Oslo\")", "Cold."]));
        let report = h
            .orchestrator
            .run_detailed("Weather in Oslo?", &RunOptions::default())
            .await
            .unwrap();

        let events = h.sink.events();
        assert!(!events.is_empty());
        assert!(
            events
                .iter()
                .all(|e| e.correlation_id.as_deref() == Some(report.correlation_id.as_str()))
        );

        let names = h.sink.names();
        let call = names.iter().position(|n| n == "tool_call").unwrap();
        let result = names.iter().position(|n| n == "tool_result").unwrap();
        assert!(call < result);
        assert_eq!(names.last().map(String::as_str), Some("run_complete"));

        let tool_call = &h.sink.named("tool_call")[0];
        let prompt = tool_call.prompt.as_ref().unwrap();
        assert_eq!(prompt.id, "agent.system");
        assert_eq!(prompt.hash.len(), 64);
    }

    #[tokio::test]
    async fn max_iterations_returns_fallback_without_persisting() {
        let looping = "TOOL_CALL: weather(city=\"Rome\")";
        let h = harness(texts(&[looping; 5]));
        let report = h
            .orchestrator
            .run_detailed("Loop forever", &RunOptions::default().with_max_iterations(3))
            .await
            .unwrap();

        assert_eq!(report.terminal, Terminal::MaxIterations);
        assert_eq!(report.iterations, 3);
        assert_eq!(report.response, AgentConfig::default().fallback_response);
        assert_eq!(h.model.call_count(), 3);
        assert!(h.orchestrator.memory().history().await.is_empty());
    }

    #[tokio::test]
    async fn model_error_propagates_and_persists_nothing() {
        let h = harness(vec![
            Ok("TOOL_CALL: weather(city=\"Lima\")".into()),
            Err(ModelError::Generation("out of memory".into())),
        ]);
        let err = h
            .orchestrator
            .run("Weather in Lima?", &RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, sidekick_core::Error::Model(ModelError::Generation(_))));
        assert!(h.orchestrator.memory().history().await.is_empty());
        assert!(h.sink.named("run_complete").is_empty());
    }

    #[tokio::test]
    async fn malformed_call_becomes_observation_without_execution() {
        let h = harness(texts(&["TOOL_CALL: weather(city)", "Sorry."]));
        let report = h
            .orchestrator
            .run_detailed("Weather?", &RunOptions::default())
            .await
            .unwrap();

        assert_eq!(report.response, "Sorry.");
        assert_eq!(report.tool_calls, 1);
        assert_eq!(h.weather_calls.load(Ordering::SeqCst), 0);
        assert!(h.sink.named("tool_call").is_empty());
        assert!(!h.sink.named("tool_parse_error").is_empty());
        assert!(h.model.prompts()[1].contains("Observation: Tool call 'weather' rejected"));
    }

    #[tokio::test]
    async fn allowlist_blocks_tools_outside_it() {
        let h = harness(texts(&["TOOL_CALL: weather(city=\"Paris\")", "Can't check."]));
        let options = RunOptions::default().with_allowed_capabilities(["math"]);
        let report = h.orchestrator.run_detailed("Weather?", &options).await.unwrap();

        assert_eq!(report.response, "Can't check.");
        assert_eq!(h.weather_calls.load(Ordering::SeqCst), 0);
        let result = &h.sink.named("tool_result")[0];
        assert_eq!(result.payload["success"], false);
        assert_eq!(result.payload["errorKind"], "unauthorized");
        // The filtered catalogue is what the model sees.
        assert!(h.model.prompts()[0].contains("(no tools available)"));
    }

    #[tokio::test]
    async fn long_observations_are_compressed() {
        let call = format!("TOOL_CALL: weather(city=\"{}\")", "z".repeat(3000));
        let h = harness(texts(&[call.as_str(), "Done."]));
        h.orchestrator
            .run("Weather?", &RunOptions::default())
            .await
            .unwrap();
        assert!(h.model.prompts()[1].contains("…[truncated"));
    }

    #[tokio::test]
    async fn oversized_context_is_pruned() {
        let big = "w".repeat(5000);
        let call = format!("TOOL_CALL: weather(city=\"{big}\") {big}");
        let h = harness(texts(&[call.as_str(), call.as_str(), call.as_str(), "Finished."]));
        let mut config = AgentConfig::default();
        config.observation_char_limit = 5000;
        let orchestrator = h.orchestrator.with_agent_config(config);

        let report = orchestrator
            .run_detailed("Weather?", &RunOptions::default())
            .await
            .unwrap();
        assert_eq!(report.terminal, Terminal::Final);

        let pruned = h.sink.named("context_pruned");
        assert!(!pruned.is_empty());
        for prompt in h.model.prompts().iter().skip(1) {
            assert!(prompt.contains("User: Weather?"));
            assert!(prompt.starts_with("System: You are a helpful assistant"));
        }
    }

    #[tokio::test]
    async fn every_turn_event_carries_prompt_meta() {
        let h = harness(texts(&["TOOL_CALL: weather(city=\"Oslo\")", "Sunny."]));
        h.orchestrator
            .memory()
            .add_document("Oslo is the capital of Norway.", "kb")
            .await
            .unwrap();

        h.orchestrator.run("Weather in Oslo?", &RunOptions::default()).await.unwrap();

        let events = h.sink.events();
        for name in ["retrieval_trace", "context_engineered", "workflow_step", "tool_call"] {
            assert!(events.iter().any(|e| e.name == name), "missing {name}");
        }
        let missing: Vec<&str> = events
            .iter()
            .filter(|e| e.prompt.is_none())
            .map(|e| e.name.as_str())
            .collect();
        assert!(missing.is_empty(), "events without prompt meta: {missing:?}");

        let first = events[0].prompt.clone().unwrap();
        assert!(!first.hash.is_empty());
        assert!(events.iter().all(|e| e.prompt.as_ref() == Some(&first)));
    }

    struct FixedSummary(Option<&'static str>);

    #[async_trait]
    impl HistorySummarizer for FixedSummary {
        async fn summarize(
            &self,
            _history: &[ConversationEntry],
            _max_tokens: usize,
        ) -> sidekick_core::Result<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| Error::Model(ModelError::Generation("summarizer offline".into())))
        }
    }

    async fn with_long_history(h: &Harness) {
        for i in 0..7 {
            h.orchestrator
                .memory()
                .add_interaction(&format!("question {i}"), &format!("answer {i}"), &[])
                .await
                .unwrap();
        }
        assert_eq!(h.orchestrator.memory().history().await.len(), 14);
    }

    #[tokio::test]
    async fn long_history_takes_hierarchical_path_with_summary() {
        let h = harness(texts(&["Noted."]));
        with_long_history(&h).await;
        let orchestrator = h
            .orchestrator
            .with_summarizer(Arc::new(FixedSummary(Some("They planned a trip to Kyoto."))));

        let answer = orchestrator.run("And then?", &RunOptions::default()).await.unwrap();
        assert_eq!(answer, "Noted.");

        let engineered = h.sink.named("context_engineered");
        assert_eq!(engineered.len(), 1);
        assert_eq!(engineered[0].payload["path"], "hierarchical");
        assert_eq!(engineered[0].payload["history_summarized"], true);
        assert_eq!(engineered[0].payload["summary_fallback"], false);

        let traces = h.sink.named("retrieval_trace");
        assert_eq!(traces[0].payload["mode"], "sparse");

        let prompt = &h.model.prompts()[0];
        assert!(prompt.contains("Conversation so far: They planned a trip to Kyoto."));
        assert!(prompt.ends_with("User: And then?\nAssistant:"));
    }

    #[tokio::test]
    async fn failed_summary_falls_back_to_recent_entries() {
        let h = harness(texts(&["Noted."]));
        with_long_history(&h).await;
        let orchestrator = h.orchestrator.with_summarizer(Arc::new(FixedSummary(None)));

        orchestrator.run("And then?", &RunOptions::default()).await.unwrap();

        let engineered = h.sink.named("context_engineered");
        assert_eq!(engineered[0].payload["path"], "hierarchical");
        assert_eq!(engineered[0].payload["summary_fallback"], true);

        let prompt = &h.model.prompts()[0];
        assert!(prompt.contains(
            "Conversation so far: User: question 5\nAssistant: answer 5\nUser: question 6\nAssistant: answer 6"
        ));
    }
}
