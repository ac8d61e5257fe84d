use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

/// Routes Ctrl-C either to a waiting review prompt or to process exit.
///
/// While a prompt is active an interrupt rejects that prompt only; outside of
/// a prompt it ends the process with status 130.
#[derive(Debug, Clone)]
pub struct Interrupts {
    prompting: Arc<AtomicBool>,
    prompt_interrupts: watch::Receiver<u64>,
}

impl Interrupts {
    /// Installs the Ctrl-C listener. Must be called inside a tokio runtime.
    pub fn install() -> Self {
        let prompting = Arc::new(AtomicBool::new(false));
        let (tx, rx) = watch::channel(0_u64);

        let listener_prompting = Arc::clone(&prompting);
        tokio::spawn(async move {
            loop {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    tracing::warn!(?err, "failed to listen for ctrl-c; interrupts are disabled");
                    return;
                }
                if listener_prompting.load(Ordering::SeqCst) {
                    tx.send_modify(|n| *n += 1);
                } else {
                    tracing::warn!("interrupted");
                    std::process::exit(130);
                }
            }
        });

        Self {
            prompting,
            prompt_interrupts: rx,
        }
    }

    /// Marks a prompt as active until the returned scope is dropped.
    pub fn enter_prompt(&self) -> PromptScope {
        let mut interrupts = self.prompt_interrupts.clone();
        interrupts.borrow_and_update();
        self.prompting.store(true, Ordering::SeqCst);
        PromptScope {
            prompting: Arc::clone(&self.prompting),
            interrupts,
        }
    }
}

pub struct PromptScope {
    prompting: Arc<AtomicBool>,
    interrupts: watch::Receiver<u64>,
}

impl PromptScope {
    /// Resolves on the next Ctrl-C received while this scope is active.
    pub async fn interrupted(&mut self) {
        if self.interrupts.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl Drop for PromptScope {
    fn drop(&mut self) {
        self.prompting.store(false, Ordering::SeqCst);
    }
}
