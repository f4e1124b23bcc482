use crate::error::Cancelled;
use crate::CircuitBreaker;
use breakwater_core::BoxError;
use futures::future::BoxFuture;
use std::convert::Infallible;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// A Tower Layer that routes requests to an inner service through a
/// [`CircuitBreaker`].
///
/// Every service produced by one layer shares the breaker it was created
/// from, including its state and monitor.
///
/// ```rust
/// use breakwater_circuitbreaker::CircuitBreaker;
/// use std::time::Duration;
/// use tower::{service_fn, Service, ServiceBuilder, ServiceExt};
///
/// # async fn example() {
/// let breaker = CircuitBreaker::<String>::builder()
///     .deadline(Duration::from_secs(1))
///     .fallback_value("unavailable".to_string())
///     .build();
///
/// let mut service = ServiceBuilder::new()
///     .layer(breaker.layer())
///     .service(service_fn(|req: String| async move {
///         Err::<String, _>(std::io::Error::other(req))
///     }));
///
/// let response = service.ready().await.unwrap().call("ping".into()).await;
/// assert_eq!(response, Ok("unavailable".to_string()));
/// # }
/// ```
pub struct CircuitBreakerLayer<T> {
    breaker: CircuitBreaker<T>,
}

impl<T> CircuitBreakerLayer<T> {
    pub(crate) fn new(breaker: CircuitBreaker<T>) -> Self {
        Self { breaker }
    }
}

impl<T> Clone for CircuitBreakerLayer<T> {
    fn clone(&self) -> Self {
        Self {
            breaker: self.breaker.clone(),
        }
    }
}

impl<S, T> Layer<S> for CircuitBreakerLayer<T> {
    type Service = CircuitBreakerService<S, T>;

    fn layer(&self, service: S) -> Self::Service {
        CircuitBreakerService {
            inner: service,
            breaker: self.breaker.clone(),
            not_ready: None,
        }
    }
}

/// A Tower Service that guards an inner service with a [`CircuitBreaker`].
///
/// The inner call is abandoned as soon as the call's cancellation signal
/// fires, so services that never observe cancellation still respect the
/// deadline. The service never fails: errors become the fallback value.
///
/// Readiness is forwarded to the inner service, so its backpressure reaches
/// the caller. If the inner `poll_ready` fails, this service still reports
/// ready and the next call goes through the breaker as a fault carrying that
/// error (or is diverted, when the breaker is disengaged).
pub struct CircuitBreakerService<S, T> {
    inner: S,
    breaker: CircuitBreaker<T>,
    not_ready: Option<BoxError>,
}

impl<S, T> CircuitBreakerService<S, T> {
    /// Returns the breaker guarding this service.
    pub fn breaker(&self) -> &CircuitBreaker<T> {
        &self.breaker
    }
}

impl<S: Clone, T> Clone for CircuitBreakerService<S, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            breaker: self.breaker.clone(),
            not_ready: None,
        }
    }
}

impl<S, T, Req> Service<Req> for CircuitBreakerService<S, T>
where
    S: Service<Req, Response = T> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
    Req: Send + 'static,
    T: Default + Send + 'static,
{
    type Response = T;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<T, Infallible>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        match self.inner.poll_ready(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(())) => Poll::Ready(Ok(())),
            Poll::Ready(Err(err)) => {
                self.not_ready = Some(err.into());
                Poll::Ready(Ok(()))
            }
        }
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let breaker = self.breaker.clone();
        // Keep the instance that was driven to readiness for this call.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let not_ready = self.not_ready.take();

        Box::pin(async move {
            let response = breaker
                .invoke(move |token| async move {
                    if let Some(err) = not_ready {
                        return Err(err);
                    }
                    if token.is_cancelled() {
                        return Err(BoxError::from(Cancelled));
                    }
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => Err(BoxError::from(Cancelled)),
                        result = inner.call(req) => result.map_err(Into::into),
                    }
                })
                .await;
            Ok(response)
        })
    }
}
