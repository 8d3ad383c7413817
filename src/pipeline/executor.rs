//! Per-request pipeline execution.
//!
//! # Responsibilities
//! - Drive one request through resolution, hooks, the handler, serialization
//!   and writing
//! - Translate any failure onto the response
//! - Run finally hooks for every request, whatever happened before
//! - Notify observers at lifecycle boundaries
//!
//! # Design Decisions
//! - Every request produces exactly one written response
//! - Postprocessors stop at the first failure; finally hooks do not
//! - Hook and observer panics are caught and treated like errors
//! - On the failure path the default format is forced so an error body
//!   can always be rendered; if even that fails the message goes out as text

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::error::{Failure, HookResult, ServiceError};
use crate::exception::{ExceptionMapping, ExceptionTranslator};
use crate::http::response::TEXT_PLAIN;
use crate::http::writer::{DefaultResponseWriter, ResponseWriter, WireResponse};
use crate::http::{specification, Body, Request};
use crate::observability::metrics;
use crate::pipeline::hooks::{MessageObserver, Postprocessor, Preprocessor};
use crate::pipeline::worker::HandlerWorkers;
use crate::pipeline::{MessageContext, PipelineState};
use crate::routing::{RouteResolver, RouteTable};
use crate::serialization::{ContentNegotiator, SerializationError, SerializationProvider, SerializationSettings};

/// Collects everything a pipeline needs before it starts serving.
pub struct PipelineBuilder {
    table: Arc<RouteTable>,
    provider: SerializationProvider,
    mapping: ExceptionMapping,
    preprocessors: Vec<Arc<dyn Preprocessor>>,
    postprocessors: Vec<Arc<dyn Postprocessor>>,
    finally: Vec<Arc<dyn Postprocessor>>,
    observers: Vec<Arc<dyn MessageObserver>>,
    workers: HandlerWorkers,
    writer: Arc<dyn ResponseWriter>,
}

impl PipelineBuilder {
    pub fn new(table: impl Into<Arc<RouteTable>>) -> Self {
        Self {
            table: table.into(),
            provider: SerializationProvider::with_defaults(),
            mapping: ExceptionMapping::new(),
            preprocessors: Vec::new(),
            postprocessors: Vec::new(),
            finally: Vec::new(),
            observers: Vec::new(),
            workers: HandlerWorkers::default(),
            writer: Arc::new(DefaultResponseWriter::default()),
        }
    }

    pub fn serialization(mut self, provider: SerializationProvider) -> Self {
        self.provider = provider;
        self
    }

    pub fn exception_mapping(mut self, mapping: ExceptionMapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn preprocessor(mut self, hook: impl Preprocessor) -> Self {
        self.preprocessors.push(Arc::new(hook));
        self
    }

    pub fn postprocessor(mut self, hook: impl Postprocessor) -> Self {
        self.postprocessors.push(Arc::new(hook));
        self
    }

    /// Add a hook that runs after the response is written, even on failure.
    pub fn finally(mut self, hook: impl Postprocessor) -> Self {
        self.finally.push(Arc::new(hook));
        self
    }

    pub fn observer(mut self, observer: impl MessageObserver) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    pub fn workers(mut self, workers: HandlerWorkers) -> Self {
        self.workers = workers;
        self
    }

    pub fn writer(mut self, writer: impl ResponseWriter + 'static) -> Self {
        self.writer = Arc::new(writer);
        self
    }

    /// Apply the worker, writer and default format settings from `config`.
    pub fn configure(self, config: &ServerConfig) -> Self {
        let provider = SerializationProvider::with_defaults()
            .default_format(config.serialization.default_format.as_str());
        self.serialization(provider)
            .workers(HandlerWorkers::from_config(&config.executor))
            .writer(DefaultResponseWriter::new(config.server.keep_alive))
    }

    pub fn build(self) -> Pipeline {
        if self.provider.is_empty() {
            tracing::warn!("No serializers registered, structured bodies will be written as raw JSON");
        }
        Pipeline {
            resolver: RouteResolver::new(self.table),
            negotiator: ContentNegotiator::new(Arc::new(self.provider)),
            translator: ExceptionTranslator::new(self.mapping),
            preprocessors: self.preprocessors,
            postprocessors: self.postprocessors,
            finally: self.finally,
            observers: self.observers,
            workers: self.workers,
            writer: self.writer,
        }
    }
}

/// Runs requests end to end. Immutable and shared across requests.
pub struct Pipeline {
    resolver: RouteResolver,
    negotiator: ContentNegotiator,
    translator: ExceptionTranslator,
    preprocessors: Vec<Arc<dyn Preprocessor>>,
    postprocessors: Vec<Arc<dyn Postprocessor>>,
    finally: Vec<Arc<dyn Postprocessor>>,
    observers: Vec<Arc<dyn MessageObserver>>,
    workers: HandlerWorkers,
    writer: Arc<dyn ResponseWriter>,
}

impl Pipeline {
    pub fn builder(table: impl Into<Arc<RouteTable>>) -> PipelineBuilder {
        PipelineBuilder::new(table)
    }

    pub fn resolver(&self) -> &RouteResolver {
        &self.resolver
    }

    pub fn negotiator(&self) -> &ContentNegotiator {
        &self.negotiator
    }

    /// Process one request and return what goes on the wire.
    pub async fn execute(&self, request: Request) -> WireResponse {
        self.run(MessageContext::new(request)).await.0
    }

    /// Like [`execute`](Self::execute), also returning the finished context.
    pub async fn run(&self, mut context: MessageContext) -> (WireResponse, MessageContext) {
        tracing::debug!(
            request_id = %context.request().id(),
            method = %context.request().method(),
            path = %context.request().path(),
            "Dispatching request"
        );
        self.notify("on_received", &context, |o, c| o.on_received(c));

        if let Err(failure) = self.process(&mut context).await {
            self.fail(&mut context, failure);
        }

        self.serialize(&mut context);

        let wire = self.writer.write(context.request(), context.response());
        context.set_state(PipelineState::Written);

        // Only requests written without any captured failure count as successes.
        if !context.has_failure() {
            self.notify("on_success", &context, |o, c| o.on_success(c));
        }

        self.run_finally(&mut context);
        self.notify("on_complete", &context, |o, c| o.on_complete(c));
        context.set_state(PipelineState::Completed);

        let route = context
            .action()
            .map(|a| a.route().pattern().template().to_string())
            .unwrap_or_else(|| "none".to_string());
        metrics::record_request(
            context.request().method().as_str(),
            wire.status().as_u16(),
            &route,
            context.elapsed(),
        );

        (wire, context)
    }

    /// Resolution through postprocessing. Any error aborts the remaining stages.
    async fn process(&self, context: &mut MessageContext) -> Result<(), Failure> {
        let action = self.resolver.resolve_request(context.request())?;
        let route = Arc::clone(action.route());
        context.set_action(action);
        context.set_state(PipelineState::Resolved);

        self.negotiator.resolve_for(context, false)?;

        for hook in &self.preprocessors {
            guarded(|| hook.process(context.request_mut())).inspect_err(|_| {
                metrics::record_hook_failure("preprocessor");
            })?;
        }
        context.request_mut().reset_body();
        context.set_state(PipelineState::Preprocessed);

        context
            .response_mut()
            .set_serialized(route.should_serialize_response());
        if let Some(body) = self.workers.invoke(&route, context).await? {
            context.response_mut().set_body(body);
        }
        context.set_state(PipelineState::Invoked);

        for hook in &self.postprocessors {
            let (request, response) = context.parts_mut();
            guarded(|| hook.process(request, response)).inspect_err(|_| {
                metrics::record_hook_failure("postprocessor");
            })?;
        }
        context.set_state(PipelineState::Postprocessed);

        Ok(())
    }

    /// Translate a failure onto the response.
    fn fail(&self, context: &mut MessageContext, failure: Failure) {
        context.set_state(PipelineState::Excepted);
        let translated = self.translator.translate(failure.as_ref());

        if translated.status.is_server_error() {
            tracing::error!(
                request_id = %context.request().id(),
                method = %context.request().method(),
                path = %context.request().path(),
                status = translated.status.as_u16(),
                error = %failure,
                root_cause = %translated.root_cause,
                "Request failed"
            );
        } else {
            tracing::debug!(
                request_id = %context.request().id(),
                status = translated.status.as_u16(),
                error = %failure,
                "Request rejected"
            );
        }
        metrics::record_failure(translated.status.as_u16());

        let response = context.response_mut();
        response.headers_mut().remove(axum::http::header::CONTENT_TYPE);
        response.set_serialized(true);
        translated.apply(response);

        context.set_failure(failure);
        if let Some(failure) = context.failure() {
            for observer in &self.observers {
                if let Err(e) = guarded(|| observer.on_exception(context, failure)) {
                    report_hook_error("on_exception", context, &e);
                }
            }
        }
    }

    fn serialize(&self, context: &mut MessageContext) {
        let settings = self.settings_for(context);

        if let Err(error) = self.render(context, settings.as_ref()) {
            if context.has_failure() {
                tracing::error!(
                    request_id = %context.request().id(),
                    error = %error,
                    "Failed to render error body"
                );
                render_plain(context);
            } else {
                self.fail(context, Box::new(ServiceError::from(error)));
                if self.render(context, settings.as_ref()).is_err() {
                    render_plain(context);
                }
            }
        }

        let response = context.response_mut();
        if response.content_type().is_none() {
            response.set_content_type(TEXT_PLAIN);
        }
        specification::enforce(response);
        context.set_state(PipelineState::Serialized);
    }

    /// Pinned settings, negotiating with the default forced on the failure path.
    fn settings_for(&self, context: &mut MessageContext) -> Option<SerializationSettings> {
        let force = context.has_failure();
        match self.negotiator.resolve_for(context, force) {
            Ok(settings) => Some(settings),
            Err(e) => {
                if !force {
                    self.fail(context, Box::new(e));
                    return self.negotiator.resolve_for(context, true).ok();
                }
                None
            }
        }
    }

    fn render(
        &self,
        context: &mut MessageContext,
        settings: Option<&SerializationSettings>,
    ) -> Result<(), SerializationError> {
        let failed = context.has_failure();
        let response = context.response_mut();

        if !specification::is_content_allowed(response.status()) {
            return Ok(());
        }
        if !(failed || response.is_serialized()) || !response.body().is_serializable() {
            return Ok(());
        }
        let Some(settings) = settings else {
            return Ok(());
        };

        if let Some(text) = settings.serialize(response)? {
            response.set_body(Body::Text(text));
        }
        Ok(())
    }

    fn run_finally(&self, context: &mut MessageContext) {
        for hook in &self.finally {
            let (request, response) = context.parts_mut();
            if let Err(e) = guarded(|| hook.process(request, response)) {
                metrics::record_hook_failure("finally");
                report_hook_error("finally", context, &e);
            }
        }
    }

    fn notify<F>(&self, stage: &'static str, context: &MessageContext, call: F)
    where
        F: Fn(&dyn MessageObserver, &MessageContext) -> HookResult,
    {
        for observer in &self.observers {
            if let Err(e) = guarded(|| call(observer.as_ref(), context)) {
                report_hook_error(stage, context, &e);
            }
        }
    }
}

/// Run a hook, turning a panic into a failure.
fn guarded<F>(hook: F) -> HookResult
where
    F: FnOnce() -> HookResult,
{
    catch_unwind(AssertUnwindSafe(hook)).unwrap_or_else(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(Failure::from(format!("hook panicked: {}", message)))
    })
}

fn report_hook_error(stage: &'static str, context: &MessageContext, error: &Failure) {
    if stage.starts_with("on_") {
        metrics::record_hook_failure("observer");
    }
    tracing::warn!(
        request_id = %context.request().id(),
        stage = stage,
        error = %error,
        "Hook failed, continuing"
    );
}

/// Replace a structured error body with its message as plain text.
fn render_plain(context: &mut MessageContext) {
    let response = context.response_mut();
    let message = response
        .body()
        .as_value()
        .and_then(|v| v.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| response.status().canonical_reason().unwrap_or("Error").to_string());
    response.set_body(Body::Text(message));
    response.set_content_type(TEXT_PLAIN);
}
