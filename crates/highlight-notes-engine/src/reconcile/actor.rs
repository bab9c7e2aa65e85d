//! One task per page.
//!
//! [`PageActor`] owns the [`Highlighter`] and the [`ReconcileScheduler`].
//! Everything that touches the page arrives as a [`PageCommand`], so DOM
//! access is never shared; between commands the task sleeps until the
//! scheduler's next deadline.

use std::time::Instant;

use highlight_notes_config::ReconcileConfig;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant as TokioInstant, sleep_until};

use super::scheduler::{ReconcileScheduler, SchedulerAction};
use crate::anchoring::{Anchor, AnchorPatch, HighlightId};
use crate::dom::{Document, DomRange, NodeId};
use crate::error::HighlightError;
use crate::highlighter::Highlighter;

const COMMAND_BUFFER: usize = 64;

type Reply<T> = oneshot::Sender<Result<T, HighlightError>>;

pub enum PageCommand {
    SelectionConfirmed {
        range: DomRange,
        color: Option<String>,
        note: Option<String>,
        reply: Reply<Option<Anchor>>,
    },
    UpdateHighlight {
        id: HighlightId,
        patch: AnchorPatch,
        reply: Reply<Anchor>,
    },
    DeleteHighlight {
        id: HighlightId,
        reply: Reply<Anchor>,
    },
    Toggle {
        enabled: bool,
        reply: Reply<bool>,
    },
    ScrollTo {
        id: HighlightId,
        reply: oneshot::Sender<Option<NodeId>>,
    },
    /// The page's tab came to the front; pick up changes made elsewhere.
    TabActivated,
    /// Change the page the way its own scripts would.
    MutateDom(Box<dyn FnOnce(&mut Document) + Send>),
    Inspect(Box<dyn FnOnce(&Highlighter) + Send>),
    Unload,
}

/// Scheduler time follows tokio's clock so paused-time tests drive it.
fn now() -> Instant {
    TokioInstant::now().into_std()
}

pub struct PageActor {
    highlighter: Highlighter,
    scheduler: ReconcileScheduler,
    commands: mpsc::Receiver<PageCommand>,
    settled: bool,
}

impl PageActor {
    /// Spawn the page task. The highlighter is handed back when the task
    /// ends.
    pub fn spawn(highlighter: Highlighter, config: &ReconcileConfig) -> (PageHandle, JoinHandle<Highlighter>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let actor = PageActor {
            highlighter,
            scheduler: ReconcileScheduler::new(config),
            commands: rx,
            settled: false,
        };
        (PageHandle { tx }, tokio::spawn(actor.run()))
    }

    async fn run(mut self) -> Highlighter {
        if let Err(e) = self.highlighter.load().await {
            log::warn!("Failed to load highlights: {e}");
        }
        if let Err(e) = self.highlighter.recover_sync_queue().await {
            log::warn!("Failed to recover sync queue: {e}");
        }
        self.scheduler.start(now());

        loop {
            self.observe();
            let deadline = self.scheduler.next_deadline();
            let wake_at = deadline.map_or_else(TokioInstant::now, TokioInstant::from_std);

            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else { break };
                    if !self.handle(command).await {
                        break;
                    }
                }
                _ = sleep_until(wake_at), if deadline.is_some() => self.tick(),
            }
        }

        self.scheduler.teardown();
        log::debug!("Page actor for {} stopped", self.highlighter.context().url());
        self.highlighter
    }

    /// Feed DOM changes made since the last look to the scheduler.
    fn observe(&mut self) {
        let records = self.highlighter.document_mut().take_mutations();
        self.scheduler.on_mutations(now(), &records);
    }

    fn tick(&mut self) {
        let Some(action) = self.scheduler.poll(now()) else {
            return;
        };
        self.settled = true;
        match action {
            SchedulerAction::InitialPass => {
                if self.highlighter.context().enabled() {
                    self.highlighter.apply_all();
                }
            }
            SchedulerAction::Reconcile => {
                self.highlighter.reconcile_pass();
            }
        }
    }

    /// Returns false once the page is unloading.
    async fn handle(&mut self, command: PageCommand) -> bool {
        match command {
            PageCommand::SelectionConfirmed {
                range,
                color,
                note,
                reply,
            } => {
                let result = self
                    .highlighter
                    .create(&range, color.as_deref(), note.as_deref())
                    .await;
                let _ = reply.send(result);
            }
            PageCommand::UpdateHighlight { id, patch, reply } => {
                let _ = reply.send(self.highlighter.update(&id, &patch).await);
            }
            PageCommand::DeleteHighlight { id, reply } => {
                self.scheduler.suppress(now());
                let _ = reply.send(self.highlighter.delete(&id).await);
            }
            PageCommand::Toggle { enabled, reply } => {
                let _ = reply.send(self.highlighter.set_enabled(enabled).await);
            }
            PageCommand::ScrollTo { id, reply } => {
                let _ = reply.send(self.highlighter.scroll_to(&id));
            }
            PageCommand::TabActivated => self.on_tab_activated().await,
            PageCommand::MutateDom(mutate) => mutate(self.highlighter.document_mut()),
            PageCommand::Inspect(inspect) => inspect(&self.highlighter),
            PageCommand::Unload => return false,
        }
        true
    }

    async fn on_tab_activated(&mut self) {
        if self.settled
            && let Err(e) = self.highlighter.refresh().await
        {
            log::warn!("Failed to refresh highlights: {e}");
        }
        match self.highlighter.process_sync_queue().await {
            Ok(Some(report)) if report.remaining > 0 => {
                log::info!("{} sync operation(s) still pending", report.remaining);
            }
            Ok(_) => {}
            Err(e) => log::warn!("Sync sweep failed: {e}"),
        }
    }
}

/// Cheap, cloneable access to a running [`PageActor`].
#[derive(Clone)]
pub struct PageHandle {
    tx: mpsc::Sender<PageCommand>,
}

impl PageHandle {
    async fn send(&self, command: PageCommand) -> Result<(), HighlightError> {
        self.tx.send(command).await.map_err(|_| HighlightError::Closed)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> PageCommand,
    ) -> Result<T, HighlightError> {
        let (reply, response) = oneshot::channel();
        self.send(command(reply)).await?;
        response.await.map_err(|_| HighlightError::Closed)?
    }

    pub async fn create(
        &self,
        range: DomRange,
        color: Option<String>,
        note: Option<String>,
    ) -> Result<Option<Anchor>, HighlightError> {
        self.request(|reply| PageCommand::SelectionConfirmed {
            range,
            color,
            note,
            reply,
        })
        .await
    }

    pub async fn update(&self, id: HighlightId, patch: AnchorPatch) -> Result<Anchor, HighlightError> {
        self.request(|reply| PageCommand::UpdateHighlight { id, patch, reply })
            .await
    }

    pub async fn delete(&self, id: HighlightId) -> Result<Anchor, HighlightError> {
        self.request(|reply| PageCommand::DeleteHighlight { id, reply })
            .await
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<bool, HighlightError> {
        self.request(|reply| PageCommand::Toggle { enabled, reply })
            .await
    }

    pub async fn scroll_to(&self, id: HighlightId) -> Result<Option<NodeId>, HighlightError> {
        let (reply, response) = oneshot::channel();
        self.send(PageCommand::ScrollTo { id, reply }).await?;
        response.await.map_err(|_| HighlightError::Closed)
    }

    pub async fn tab_activated(&self) -> Result<(), HighlightError> {
        self.send(PageCommand::TabActivated).await
    }

    pub async fn mutate_dom(
        &self,
        mutate: impl FnOnce(&mut Document) + Send + 'static,
    ) -> Result<(), HighlightError> {
        self.send(PageCommand::MutateDom(Box::new(mutate))).await
    }

    /// Run `inspect` against the page state and return its result.
    pub async fn inspect<R: Send + 'static>(
        &self,
        inspect: impl FnOnce(&Highlighter) -> R + Send + 'static,
    ) -> Result<R, HighlightError> {
        let (reply, response) = oneshot::channel();
        self.send(PageCommand::Inspect(Box::new(move |highlighter| {
            let _ = reply.send(inspect(highlighter));
        })))
        .await?;
        response.await.map_err(|_| HighlightError::Closed)
    }

    pub async fn unload(&self) -> Result<(), HighlightError> {
        self.send(PageCommand::Unload).await
    }
}
