//! A trivial in-process queue adapter (an unbounded channel) so the
//! orchestrator is independently runnable without deploying an external
//! broker. Production deployments are expected to swap this for a durable
//! queue; the orchestrator only depends on the [`JobQueue`] trait.

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

#[async_trait]
pub trait JobQueue: Send + Sync {
  async fn enqueue(&self, job_id: Uuid);
  async fn dequeue(&self) -> Option<Uuid>;
}

/// Unbounded `tokio::sync::mpsc` channel wrapped behind [`JobQueue`].
pub struct InProcessQueue {
  sender: mpsc::UnboundedSender<Uuid>,
  receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<Uuid>>,
}

impl InProcessQueue {
  pub fn new() -> Self {
    let (sender, receiver) = mpsc::unbounded_channel();
    Self { sender, receiver: tokio::sync::Mutex::new(receiver) }
  }
}

impl Default for InProcessQueue {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl JobQueue for InProcessQueue {
  async fn enqueue(&self, job_id: Uuid) {
    let _ = self.sender.send(job_id);
  }

  async fn dequeue(&self) -> Option<Uuid> {
    self.receiver.lock().await.recv().await
  }
}
