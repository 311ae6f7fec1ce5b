//! Named pipeline stages with fixed composition order.
//!
//! The request pipeline is an ordered list of eight canonical stages. Which
//! mediator occupies a stage is configurable through the builder; the order
//! never is. Every stage always holds a binding - unconfigured stages default
//! to pass-through - so the list is complete by construction.
//!
//! Composition order, outermost to innermost (the router sits inside all of
//! them): custom-post, suspend-gate, memory-logging, tracing, auth,
//! custom-authorizer, timeout, custom-pre.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::config::AuthStrategy;

/// Future type produced by a custom mediator.
pub type BoxedMediatorFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// A caller-supplied mediator: given the request and the next handler,
/// produce a response (forwarding via `next.run(..)` or short-circuiting).
pub type CustomMediator = Arc<dyn Fn(Request, Next) -> BoxedMediatorFuture + Send + Sync>;

/// The eight canonical stage names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    CustomPost,
    SuspendGate,
    MemoryLogging,
    Tracing,
    Auth,
    CustomAuthorizer,
    Timeout,
    CustomPre,
}

impl StageKind {
    /// Canonical composition order, outermost first.
    pub const CANONICAL_ORDER: [StageKind; 8] = [
        StageKind::CustomPost,
        StageKind::SuspendGate,
        StageKind::MemoryLogging,
        StageKind::Tracing,
        StageKind::Auth,
        StageKind::CustomAuthorizer,
        StageKind::Timeout,
        StageKind::CustomPre,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StageKind::CustomPost => "custom-post",
            StageKind::SuspendGate => "suspend-gate",
            StageKind::MemoryLogging => "memory-logging",
            StageKind::Tracing => "tracing",
            StageKind::Auth => "auth",
            StageKind::CustomAuthorizer => "custom-authorizer",
            StageKind::Timeout => "timeout",
            StageKind::CustomPre => "custom-pre",
        }
    }
}

/// What occupies a stage.
#[derive(Clone)]
pub enum StageBinding {
    /// No-op: forward to the next stage unchanged.
    PassThrough,
    /// 503 for non-infrastructure paths while suspended.
    SuspendGate,
    /// Post-mediator emitting access lines into the memory log.
    MemoryLogging,
    /// Request-id generation/propagation.
    Tracing,
    /// Identity tagging per the selected strategy.
    Auth(AuthStrategy),
    /// Handler deadline enforcement.
    Timeout,
    /// Caller-supplied mediator at an injection point.
    Custom {
        name: String,
        mediator: CustomMediator,
    },
}

impl fmt::Debug for StageBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageBinding::PassThrough => f.write_str("PassThrough"),
            StageBinding::SuspendGate => f.write_str("SuspendGate"),
            StageBinding::MemoryLogging => f.write_str("MemoryLogging"),
            StageBinding::Tracing => f.write_str("Tracing"),
            StageBinding::Auth(s) => write!(f, "Auth({s})"),
            StageBinding::Timeout => f.write_str("Timeout"),
            StageBinding::Custom { name, .. } => write!(f, "Custom({name:?})"),
        }
    }
}

/// The complete, ordered stage list.
#[derive(Debug, Clone)]
pub struct PipelineStages {
    stages: Vec<(StageKind, StageBinding)>,
}

impl PipelineStages {
    /// The canonical default pipeline: suspend gate, memory logging, tracing
    /// and no-auth active; timeout and all injection points pass-through.
    pub fn with_defaults() -> Self {
        let stages = StageKind::CANONICAL_ORDER
            .iter()
            .map(|kind| {
                let binding = match kind {
                    StageKind::SuspendGate => StageBinding::SuspendGate,
                    StageKind::MemoryLogging => StageBinding::MemoryLogging,
                    StageKind::Tracing => StageBinding::Tracing,
                    StageKind::Auth => StageBinding::Auth(AuthStrategy::NoAuth),
                    _ => StageBinding::PassThrough,
                };
                (*kind, binding)
            })
            .collect();
        Self { stages }
    }

    /// Replace the binding of a named stage.
    pub fn replace(&mut self, kind: StageKind, binding: StageBinding) {
        for (k, b) in &mut self.stages {
            if *k == kind {
                *b = binding;
                return;
            }
        }
    }

    pub fn get(&self, kind: StageKind) -> Option<&StageBinding> {
        self.stages
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, b)| b)
    }

    /// Stages in application order for `Router::layer` (innermost first, so
    /// the canonical outermost stage is layered last and ends up outermost).
    pub fn iter_innermost_first(&self) -> impl Iterator<Item = &(StageKind, StageBinding)> {
        self.stages.iter().rev()
    }

    /// Every canonical stage must hold exactly one binding.
    pub fn is_complete(&self) -> bool {
        self.stages.len() == StageKind::CANONICAL_ORDER.len()
            && StageKind::CANONICAL_ORDER
                .iter()
                .all(|kind| self.stages.iter().any(|(k, _)| k == kind))
    }
}
