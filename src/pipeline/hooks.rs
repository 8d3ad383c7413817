//! Extension points around the handler.
//!
//! # Responsibilities
//! - Preprocessors run before the handler and may abort the request
//! - Postprocessors run after a successful handler; the first failure stops them
//! - Finally hooks share the postprocessor shape and always run
//! - Observers watch lifecycle boundaries without affecting control flow

use crate::error::{Failure, HookResult};
use crate::http::{Request, Response};
use crate::pipeline::MessageContext;

/// Runs before the handler.
pub trait Preprocessor: Send + Sync + 'static {
    fn process(&self, request: &mut Request) -> HookResult;
}

impl<F> Preprocessor for F
where
    F: Fn(&mut Request) -> HookResult + Send + Sync + 'static,
{
    fn process(&self, request: &mut Request) -> HookResult {
        self(request)
    }
}

/// Runs after the handler, and as a finally hook.
pub trait Postprocessor: Send + Sync + 'static {
    fn process(&self, request: &Request, response: &mut Response) -> HookResult;
}

impl<F> Postprocessor for F
where
    F: Fn(&Request, &mut Response) -> HookResult + Send + Sync + 'static,
{
    fn process(&self, request: &Request, response: &mut Response) -> HookResult {
        self(request, response)
    }
}

/// Notified at lifecycle boundaries. Errors are logged and ignored.
pub trait MessageObserver: Send + Sync + 'static {
    /// The request entered the pipeline.
    fn on_received(&self, _context: &MessageContext) -> HookResult {
        Ok(())
    }

    /// A failure was translated onto the response.
    fn on_exception(&self, _context: &MessageContext, _failure: &Failure) -> HookResult {
        Ok(())
    }

    /// The handler and postprocessors succeeded.
    fn on_success(&self, _context: &MessageContext) -> HookResult {
        Ok(())
    }

    /// The response was written.
    fn on_complete(&self, _context: &MessageContext) -> HookResult {
        Ok(())
    }
}
