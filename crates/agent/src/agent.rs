//! The long-lived agent: configuration plus the state sessions mutate.

use std::collections::HashMap;
use std::sync::Arc;

use convoke_config::{AppConfig, RuntimeConfig};
use convoke_core::ErrorHandlingConfig;
use convoke_core::error::Result;
use convoke_core::event::{NoopTracer, Tracer};
use convoke_core::memory::{MemoryStore, VectorStore};
use convoke_core::model::ModelClient;
use convoke_core::tool::{Tool, ToolRegistry};
use convoke_memory::InMemoryStore;
use convoke_telemetry::{CostTracker, ModelPricing, PricingTable};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::context::{HeuristicCounter, Platform, TokenCounter};
use crate::execution::{NoopNotifier, StderrNotifier, ToolNotifier};
use crate::plan::{KeywordPlanPolicy, PlanFollowUpPolicy};
use crate::session::ConversationSession;
use crate::validator::OutputValidator;

/// An agent owns its identity, model binding, tools, memory and policies.
///
/// Each call to [`Agent::run`] drives one [`ConversationSession`]. The tool
/// name list is cached behind its own lock and dropped whenever the
/// registry changes.
pub struct Agent {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) client: Arc<dyn ModelClient>,
    pub(crate) model_name: String,
    pub(crate) prompt: String,
    tools: RwLock<ToolRegistry>,
    tool_names_cache: RwLock<Option<Vec<String>>>,
    pub(crate) memory: Arc<dyn MemoryStore>,
    vector_store: Option<Arc<dyn VectorStore>>,
    vars: RwLock<HashMap<String, String>>,
    pub(crate) cost: Arc<CostTracker>,
    pub(crate) error_handling: ErrorHandlingConfig,
    pub(crate) validator: OutputValidator,
    pub(crate) config: RuntimeConfig,
    max_iterations: Option<u32>,
    pub(crate) tracer: Arc<dyn Tracer>,
    notifier: Option<Arc<dyn ToolNotifier>>,
    pub(crate) plan_policy: Arc<dyn PlanFollowUpPolicy>,
    pub(crate) pricing: Arc<PricingTable>,
    pub(crate) counter: Arc<dyn TokenCounter>,
    pub(crate) platform: Platform,
}

impl Agent {
    pub fn builder(client: Arc<dyn ModelClient>, model_name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(client, model_name)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn memory(&self) -> &Arc<dyn MemoryStore> {
        &self.memory
    }

    pub fn vector_store(&self) -> Option<&Arc<dyn VectorStore>> {
        self.vector_store.as_ref()
    }

    pub fn cost(&self) -> &Arc<CostTracker> {
        &self.cost
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn error_handling(&self) -> &ErrorHandlingConfig {
        &self.error_handling
    }

    /// Explicit cap from the builder, else the configured one.
    pub fn max_iterations(&self) -> Option<u32> {
        self.max_iterations.or_else(|| self.config.max_iterations())
    }

    /// A copy of the variable map.
    pub fn vars(&self) -> HashMap<String, String> {
        self.vars.read().clone()
    }

    pub fn set_var(&self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.write().insert(key.into(), value.into());
    }

    /// Sorted tool names, computed on first use after a registry change.
    ///
    /// Lock order is registry, then cache, matching `register_tool` and
    /// `remove_tool`.
    pub fn tool_names(&self) -> Vec<String> {
        if let Some(names) = self.tool_names_cache.read().as_ref() {
            return names.clone();
        }
        let tools = self.tools.read();
        let mut cache = self.tool_names_cache.write();
        if let Some(names) = cache.as_ref() {
            return names.clone();
        }
        let names = tools.names();
        *cache = Some(names.clone());
        names
    }

    pub fn register_tool(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.write();
        debug!(agent_id = %self.id, tool = tool.name(), "Registering tool");
        tools.register(tool);
        *self.tool_names_cache.write() = None;
    }

    pub fn remove_tool(&self, name: &str) -> bool {
        let mut tools = self.tools.write();
        let removed = tools.remove(name);
        if removed {
            *self.tool_names_cache.write() = None;
        }
        removed
    }

    /// A snapshot of the registry. Tools are shared, the map is not.
    pub fn tool_registry(&self) -> ToolRegistry {
        self.tools.read().clone()
    }

    /// The notifier sessions report tool progress to.
    pub(crate) fn notifier(&self) -> Arc<dyn ToolNotifier> {
        match &self.notifier {
            Some(n) => Arc::clone(n),
            None if self.config.quiet_tool_progress() => Arc::new(NoopNotifier),
            None => Arc::new(StderrNotifier),
        }
    }

    /// Derive a child agent.
    ///
    /// The child gets a fresh ID, a fresh in-memory store, a copy of the
    /// variables and a zeroed cost tracker with the same limits. Client,
    /// tools, policies, tracer and vector store are shared.
    pub fn spawn(&self) -> Agent {
        Agent {
            id: Uuid::new_v4(),
            name: self.name.clone(),
            client: Arc::clone(&self.client),
            model_name: self.model_name.clone(),
            prompt: self.prompt.clone(),
            tools: RwLock::new(self.tool_registry()),
            tool_names_cache: RwLock::new(None),
            memory: Arc::new(InMemoryStore::new()),
            vector_store: self.vector_store.clone(),
            vars: RwLock::new(self.vars()),
            cost: Arc::new(self.cost.fresh()),
            error_handling: self.error_handling.clone(),
            validator: self.validator.clone(),
            config: self.config.clone(),
            max_iterations: self.max_iterations,
            tracer: Arc::clone(&self.tracer),
            notifier: self.notifier.clone(),
            plan_policy: Arc::clone(&self.plan_policy),
            pricing: Arc::clone(&self.pricing),
            counter: Arc::clone(&self.counter),
            platform: self.platform,
        }
    }

    /// Run one conversation session on `input`.
    pub async fn run(&self, input: &str, cancel: &CancellationToken) -> Result<String> {
        ConversationSession::new(self, input, cancel).run().await
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("client", &self.client.name())
            .field("model_name", &self.model_name)
            .field("tools", &self.tool_names())
            .finish_non_exhaustive()
    }
}

/// The default pricing table with the config's custom entries applied.
pub fn pricing_table(app: &AppConfig) -> PricingTable {
    let pricing = PricingTable::with_defaults();
    for (model, p) in &app.telemetry.custom_pricing {
        pricing.set(
            model.clone(),
            ModelPricing::new(p.input_per_m, p.output_per_m).with_context(p.context_limit),
        );
    }
    pricing
}

/// Builder for [`Agent`].
pub struct AgentBuilder {
    client: Arc<dyn ModelClient>,
    model_name: String,
    name: String,
    prompt: String,
    tools: ToolRegistry,
    memory: Option<Arc<dyn MemoryStore>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    vars: HashMap<String, String>,
    cost: Option<Arc<CostTracker>>,
    error_handling: ErrorHandlingConfig,
    validator: OutputValidator,
    config: RuntimeConfig,
    max_iterations: Option<u32>,
    tracer: Arc<dyn Tracer>,
    notifier: Option<Arc<dyn ToolNotifier>>,
    plan_policy: Arc<dyn PlanFollowUpPolicy>,
    pricing: Option<Arc<PricingTable>>,
    counter: Arc<dyn TokenCounter>,
    platform: Platform,
}

impl AgentBuilder {
    pub fn new(client: Arc<dyn ModelClient>, model_name: impl Into<String>) -> Self {
        Self {
            client,
            model_name: model_name.into(),
            name: String::new(),
            prompt: String::new(),
            tools: ToolRegistry::new(),
            memory: None,
            vector_store: None,
            vars: HashMap::new(),
            cost: None,
            error_handling: ErrorHandlingConfig::default(),
            validator: OutputValidator::default(),
            config: RuntimeConfig::default(),
            max_iterations: None,
            tracer: Arc::new(NoopTracer),
            notifier: None,
            plan_policy: Arc::new(KeywordPlanPolicy::default()),
            pricing: None,
            counter: Arc::new(HeuristicCounter),
            platform: Platform::current(),
        }
    }

    /// Start from a loaded [`AppConfig`]: prompt, variables, error policy,
    /// runtime knobs, pricing overrides and budget limits.
    pub fn from_app_config(client: Arc<dyn ModelClient>, app: &AppConfig) -> Self {
        let pricing = Arc::new(pricing_table(app));
        let cost = CostTracker::new(Arc::clone(&pricing))
            .with_budget(app.telemetry.budget_tokens, app.telemetry.budget_usd);

        let mut builder = Self::new(client, app.default_model.clone())
            .vars(app.agent.vars.clone())
            .error_handling(app.agent.error_handling.clone())
            .config(app.runtime.clone())
            .pricing(pricing)
            .cost(Arc::new(cost));
        if let Some(prompt) = &app.agent.prompt {
            builder = builder.prompt(prompt.clone());
        }
        builder
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    pub fn vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars = vars;
        self
    }

    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn cost(mut self, cost: Arc<CostTracker>) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn error_handling(mut self, config: ErrorHandlingConfig) -> Self {
        self.error_handling = config;
        self
    }

    pub fn validator(mut self, validator: OutputValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = Some(max);
        self
    }

    pub fn tracer(mut self, tracer: Arc<dyn Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn ToolNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn plan_policy(mut self, policy: Arc<dyn PlanFollowUpPolicy>) -> Self {
        self.plan_policy = policy;
        self
    }

    pub fn pricing(mut self, pricing: Arc<PricingTable>) -> Self {
        self.pricing = Some(pricing);
        self
    }

    pub fn token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn build(self) -> Agent {
        let pricing = match (&self.pricing, &self.cost) {
            (Some(p), _) => Arc::clone(p),
            (None, Some(cost)) => Arc::clone(cost.pricing()),
            (None, None) => Arc::new(PricingTable::with_defaults()),
        };
        let cost = self
            .cost
            .unwrap_or_else(|| Arc::new(CostTracker::new(Arc::clone(&pricing))));

        Agent {
            id: Uuid::new_v4(),
            name: self.name,
            client: self.client,
            model_name: self.model_name,
            prompt: self.prompt,
            tools: RwLock::new(self.tools),
            tool_names_cache: RwLock::new(None),
            memory: self
                .memory
                .unwrap_or_else(|| Arc::new(InMemoryStore::new())),
            vector_store: self.vector_store,
            vars: RwLock::new(self.vars),
            cost,
            error_handling: self.error_handling,
            validator: self.validator,
            config: self.config,
            max_iterations: self.max_iterations,
            tracer: self.tracer,
            notifier: self.notifier,
            plan_policy: self.plan_policy,
            pricing,
            counter: self.counter,
            platform: self.platform,
        }
    }
}
