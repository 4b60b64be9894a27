//! Single-flight generation worker.
//!
//! A loaded model instance is not safe to drive from several requests at
//! once, and a generation call may run for tens of seconds. The worker owns
//! the client on a dedicated task and executes queued jobs strictly one at a
//! time; callers await the result through a oneshot channel and never block
//! the task that submitted the job.

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use qna_core::{AppError, AppResult};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

struct GenerationJob {
    request: LlmRequest,
    reply: oneshot::Sender<AppResult<LlmResponse>>,
}

/// Cloneable handle to the generation worker task.
#[derive(Clone)]
pub struct GenerationWorker {
    sender: mpsc::Sender<GenerationJob>,
    provider: String,
}

impl GenerationWorker {
    /// Spawn the worker task on the current runtime.
    ///
    /// The task ends once every handle has been dropped and the queue is
    /// drained.
    pub fn spawn(client: Arc<dyn LlmClient>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let provider = client.provider_name().to_string();
        let handle = tokio::spawn(run(client, receiver));

        (Self { sender, provider }, handle)
    }

    /// Queue a request and wait for its completion.
    ///
    /// Dropping the returned future withdraws the job: the worker skips jobs
    /// whose caller has gone away before they start.
    pub async fn generate(&self, request: LlmRequest) -> AppResult<LlmResponse> {
        let (reply, receiver) = oneshot::channel();

        self.sender
            .send(GenerationJob { request, reply })
            .await
            .map_err(|_| AppError::Llm("Generation worker has stopped".to_string()))?;

        receiver
            .await
            .map_err(|_| AppError::Llm("Generation worker dropped the job".to_string()))?
    }
}

async fn run(client: Arc<dyn LlmClient>, mut receiver: mpsc::Receiver<GenerationJob>) {
    tracing::info!("Generation worker started ({})", client.provider_name());

    while let Some(job) = receiver.recv().await {
        if job.reply.is_closed() {
            tracing::debug!("Skipping generation job abandoned by its caller");
            continue;
        }

        let start = Instant::now();
        let result = client.complete(&job.request).await;

        match &result {
            Ok(response) => tracing::info!(
                "Generation finished in {:.2}s ({} completion tokens)",
                start.elapsed().as_secs_f64(),
                response.usage.completion_tokens
            ),
            Err(e) => tracing::error!("Generation failed: {}", e),
        }

        // The caller may have given up while the job was running.
        let _ = job.reply.send(result);
    }

    tracing::info!("Generation worker stopped");
}

#[async_trait::async_trait]
impl LlmClient for GenerationWorker {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.generate(request.clone()).await
    }
}
