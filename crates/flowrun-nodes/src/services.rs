use std::sync::Arc;

use flowrun_core::error::{ExternalCallError, Result};
use flowrun_core::gateway::LlmGateway;
use flowrun_core::http::HttpClient;
use flowrun_core::loader::ContentLoader;
use flowrun_core::tool::ToolCatalog;
use flowrun_core::vector::VectorStore;
use flowrun_graph::registry::RunnerRegistry;

use crate::control::{EndRunner, IfElseRunner, StartRunner};
use crate::http::HttpRunner;
use crate::llm::LlmRunner;
use crate::state::{CacheGetRunner, CacheSetRunner, VariableOp, VariableRunner};
use crate::text::{TextLoaderRunner, TextSplitterRunner};
use crate::tool::ToolRunner;
use crate::vector::{VectorDeleteRunner, VectorSearchRunner};

/// External collaborators shared by the built-in runners.
///
/// Every collaborator is optional; a node that needs a missing one fails with
/// `ExternalCallError::Unavailable` when it runs.
#[derive(Clone, Default)]
pub struct Services {
    pub llm: Option<Arc<dyn LlmGateway>>,
    pub http: Option<Arc<dyn HttpClient>>,
    pub vectors: Option<Arc<dyn VectorStore>>,
    pub loader: Option<Arc<dyn ContentLoader>>,
    pub tools: Arc<ToolCatalog>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmGateway>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_http(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_vectors(mut self, vectors: Arc<dyn VectorStore>) -> Self {
        self.vectors = Some(vectors);
        self
    }

    pub fn with_loader(mut self, loader: Arc<dyn ContentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn with_tools(mut self, tools: ToolCatalog) -> Self {
        self.tools = Arc::new(tools);
        self
    }

    pub(crate) fn llm(&self) -> Result<Arc<dyn LlmGateway>> {
        self.llm
            .clone()
            .ok_or_else(|| ExternalCallError::unavailable("llm").into())
    }

    pub(crate) fn http(&self) -> Result<Arc<dyn HttpClient>> {
        self.http
            .clone()
            .ok_or_else(|| ExternalCallError::unavailable("http").into())
    }

    pub(crate) fn vectors(&self) -> Result<Arc<dyn VectorStore>> {
        self.vectors
            .clone()
            .ok_or_else(|| ExternalCallError::unavailable("vector_store").into())
    }

    pub(crate) fn loader(&self) -> Result<Arc<dyn ContentLoader>> {
        self.loader
            .clone()
            .ok_or_else(|| ExternalCallError::unavailable("content_loader").into())
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("llm", &self.llm.is_some())
            .field("http", &self.http.is_some())
            .field("vectors", &self.vectors.is_some())
            .field("loader", &self.loader.is_some())
            .field("tools", &self.tools)
            .finish()
    }
}

/// A registry holding every built-in runner, wired to `services`.
pub fn builtin_registry(services: Services) -> RunnerRegistry {
    let services = Arc::new(services);
    RunnerRegistry::new()
        .with(Arc::new(StartRunner))
        .with(Arc::new(EndRunner))
        .with(Arc::new(IfElseRunner))
        .with(Arc::new(LlmRunner::new(Arc::clone(&services))))
        .with(Arc::new(HttpRunner::new(Arc::clone(&services))))
        .with(Arc::new(ToolRunner::new(Arc::clone(&services))))
        .with(Arc::new(TextSplitterRunner))
        .with(Arc::new(TextLoaderRunner::new(Arc::clone(&services))))
        .with(Arc::new(VectorSearchRunner::new(Arc::clone(&services))))
        .with(Arc::new(VectorDeleteRunner::new(services)))
        .with(Arc::new(CacheGetRunner))
        .with(Arc::new(CacheSetRunner))
        .with(Arc::new(VariableRunner::new(VariableOp::Set)))
        .with(Arc::new(VariableRunner::new(VariableOp::Push)))
        .with(Arc::new(VariableRunner::new(VariableOp::Pop)))
        .with(Arc::new(VariableRunner::new(VariableOp::Shift)))
}
