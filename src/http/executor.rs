use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, Method, Url};
use tokio::time::Instant;

use crate::args::HttpMethod;
use crate::error::StepError;
use crate::metrics::{OutcomeStatus, RequestOutcome};
use crate::scenario::{RequestStep, ResponseView, apply_checks};
use crate::session::Session;

use super::{BaseUrl, ConnectionGate};

struct RenderedRequest {
    url: Url,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

/// Issues one request per call and turns the response into a [`RequestOutcome`].
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    client: Client,
    base: BaseUrl,
    gate: ConnectionGate,
    timeout: Duration,
}

impl RequestExecutor {
    #[must_use]
    pub const fn new(client: Client, base: BaseUrl, gate: ConnectionGate, timeout: Duration) -> Self {
        Self {
            client,
            base,
            gate,
            timeout,
        }
    }

    #[must_use]
    pub const fn gate(&self) -> &ConnectionGate {
        &self.gate
    }

    /// Renders, sends, and checks one request step. Saves from checks land in
    /// `session` only up to the first failing check.
    ///
    /// Dropping the returned future before it resolves leaves `session` untouched.
    pub async fn execute(&self, step: &RequestStep, session: &mut Session) -> RequestOutcome {
        let mut outcome = RequestOutcome {
            name: step.name.shared_source(),
            user_id: session.user_id(),
            start: Instant::now(),
            duration: Duration::ZERO,
            status: OutcomeStatus::Success,
            http_status: None,
            pool_wait: None,
        };

        let rendered = match self.render(step, session) {
            Ok(rendered) => rendered,
            Err(err) => {
                outcome.status = OutcomeStatus::Failure(err);
                return outcome;
            }
        };

        let Ok(permit) = self.gate.acquire().await else {
            outcome.status = OutcomeStatus::Cancelled;
            return outcome;
        };
        outcome.pool_wait = permit.waited;
        outcome.start = Instant::now();

        let response = self.send(step.method, rendered).await;
        drop(permit);
        outcome.duration = outcome.start.elapsed();

        let result = match response {
            Ok((status, body)) => {
                outcome.http_status = Some(status);
                if step.status_allowed(status) {
                    apply_checks(&step.checks, &ResponseView::new(status, &body), session)
                } else {
                    Err(StepError::UnexpectedStatus { status })
                }
            }
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            outcome.status = OutcomeStatus::Failure(err);
        }
        outcome
    }

    fn render(&self, step: &RequestStep, session: &Session) -> Result<RenderedRequest, StepError> {
        let path = step.path.render(session)?;
        let url = self.base.join(&path)?;
        let headers = step
            .headers
            .iter()
            .map(|(name, value)| Ok((name.clone(), value.render(session)?)))
            .collect::<Result<Vec<_>, StepError>>()?;
        let body = step
            .body
            .as_ref()
            .map(|body| body.render(session))
            .transpose()?;
        Ok(RenderedRequest { url, headers, body })
    }

    async fn send(
        &self,
        method: HttpMethod,
        request: RenderedRequest,
    ) -> Result<(u16, String), StepError> {
        let mut builder = self.client.request(Method::from(method), request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| StepError::from_reqwest(&err, self.timeout))?;
        let status = response.status().as_u16();

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|err| StepError::from_reqwest(&err, self.timeout))?;
            body.extend_from_slice(&bytes);
        }
        Ok((status, String::from_utf8_lossy(&body).into_owned()))
    }
}
