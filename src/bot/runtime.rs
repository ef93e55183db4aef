//! Bot runtime - inbound message loop.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::dispatcher::{AppState, handle_message};
use super::message::ChatMessage;

/// How long in-flight messages may take to finish after shutdown starts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle inbound messages until the transport closes or `cancel` fires.
///
/// Every message runs in its own task; a failing or panicking message is
/// logged and never takes the loop down.
pub async fn run(state: AppState, mut inbound: mpsc::Receiver<ChatMessage>, cancel: CancellationToken) {
    info!("Message loop started");
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = inbound.recv() => {
                let Some(msg) = msg else {
                    info!("Inbound transport closed");
                    break;
                };
                let state = state.clone();
                tasks.spawn(async move {
                    let id = msg.id.clone();
                    let handled = AssertUnwindSafe(handle_message(&state, msg)).catch_unwind().await;
                    match handled {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => error!("Failed to handle message {}: {:#}", id, e),
                        Err(_) => error!("Handler panicked on message {}", id),
                    }
                });
            }
            Some(done) = tasks.join_next(), if !tasks.is_empty() => reap(done),
        }
    }

    let drain = async {
        while let Some(done) = tasks.join_next().await {
            reap(done);
        }
    };
    if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
        warn!("Abandoning {} unfinished messages", tasks.len());
        tasks.abort_all();
    }
    info!("Message loop stopped");
}

fn reap(done: Result<(), tokio::task::JoinError>) {
    if let Err(e) = done
        && !e.is_cancelled()
    {
        error!("Message task failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::testing::Harness;
    use crate::permissions::AccessLevel;

    #[tokio::test]
    async fn handles_messages_until_the_transport_closes() {
        let h = Harness::new().await;
        let ch = h.channel("alpha", 100).await;

        let (tx, rx) = mpsc::channel(8);
        tx.send(h.message("alpha", 100, "mia", AccessLevel::Moderator, "!command adde hi hello"))
            .await
            .unwrap();
        drop(tx);

        run(h.state.clone(), rx, CancellationToken::new()).await;
        assert_eq!(h.sender.take().len(), 1);

        let out = h.send_as(&ch, "joe", AccessLevel::Everyone, "!hi").await;
        assert_eq!(out, vec!["[quill] hello"]);
    }
}
