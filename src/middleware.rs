//! Tower middleware that gates requests through an [`AdmissionGateway`].
//!
//! The layer knows nothing about HTTP. It asks the request for a credential
//! and an endpoint path via [`GatedRequest`], lets the gateway decide, and
//! either forwards to the inner service or fails with the denial. Mapping a
//! [`GateError`] to status codes and headers is the embedding server's job.

use crate::error::Denial;
use crate::gateway::AdmissionGateway;
use crate::store::QuotaStore;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// Request types the middleware can gate.
pub trait GatedRequest {
    /// Raw credential presented by the caller.
    fn credential(&self) -> &str;
    /// Endpoint path used for catalog lookups.
    fn endpoint(&self) -> &str;
}

/// Error surfaced by [`AdmissionService`]: the gateway's denial, or whatever
/// the inner service failed with.
#[derive(Debug)]
pub enum GateError<E> {
    Denied(Denial),
    Inner(E),
}

impl<E> GateError<E> {
    pub fn is_denied(&self) -> bool {
        matches!(self, GateError::Denied(_))
    }

    pub fn into_denial(self) -> Option<Denial> {
        match self {
            GateError::Denied(denial) => Some(denial),
            GateError::Inner(_) => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for GateError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateError::Denied(denial) => write!(f, "request denied: {}", denial),
            GateError::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for GateError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GateError::Denied(denial) => Some(denial),
            GateError::Inner(e) => Some(e),
        }
    }
}

/// A layer that gates every request through an [`AdmissionGateway`].
pub struct AdmissionLayer<S> {
    gateway: Arc<AdmissionGateway<S>>,
}

impl<S> AdmissionLayer<S> {
    pub fn new(gateway: Arc<AdmissionGateway<S>>) -> Self {
        Self { gateway }
    }
}

impl<S> Clone for AdmissionLayer<S> {
    fn clone(&self) -> Self {
        Self { gateway: self.gateway.clone() }
    }
}

impl<Svc, S> Layer<Svc> for AdmissionLayer<S> {
    type Service = AdmissionService<Svc, S>;

    fn layer(&self, service: Svc) -> Self::Service {
        AdmissionService { inner: service, gateway: self.gateway.clone() }
    }
}

/// Middleware service produced by [`AdmissionLayer`].
pub struct AdmissionService<Svc, S> {
    inner: Svc,
    gateway: Arc<AdmissionGateway<S>>,
}

impl<Svc: Clone, S> Clone for AdmissionService<Svc, S> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), gateway: self.gateway.clone() }
    }
}

impl<Svc, S, Req> Service<Req> for AdmissionService<Svc, S>
where
    Svc: Service<Req> + Clone + Send + 'static,
    Svc::Future: Send + 'static,
    Svc::Error: Send + 'static,
    S: QuotaStore + 'static,
    Req: GatedRequest + Send + 'static,
{
    type Response = Svc::Response;
    type Error = GateError<Svc::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(GateError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let gateway = self.gateway.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match gateway.admit(req.credential(), req.endpoint()).await {
                Ok(_admission) => inner.call(req).await.map_err(GateError::Inner),
                Err(denial) => Err(GateError::Denied(denial)),
            }
        })
    }
}
