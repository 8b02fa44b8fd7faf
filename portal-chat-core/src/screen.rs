// ABOUTME: Chat screen driver wiring resolver, timeline, send pipeline and interpreter
// ABOUTME: Sends settle through an event channel and are applied one at a time

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::capability::CapabilityLatch;
use crate::error::ChatError;
use crate::interpreter::{RenderItem, SystemEventInterpreter};
use crate::model::{Conversation, SystemAction};
use crate::pipeline::{Composed, Reconciliation, SendOutcome, SendPipeline};
use crate::receipts::ReadReceiptNotifier;
use crate::resolver::IdentityResolver;
use crate::timeline::{LocalId, Timeline, TimelineStore};
use crate::transport::ChatTransport;

/// Non-blocking notice for the rendering surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    SendFailed { reason: String },
}

/// Events delivered back to the screen from background work.
#[derive(Debug)]
pub enum ScreenEvent {
    SendSettled(SendOutcome),
}

/// One open conversation as seen by the current actor.
///
/// All state changes happen in `&mut self` methods, so handlers never
/// interleave mid-mutation. Dropping the screen closes its event channel;
/// sends still in flight then settle with nowhere to land.
pub struct ChatScreen {
    actor_id: String,
    conversation: Conversation,
    transport: Arc<dyn ChatTransport>,
    timelines: TimelineStore,
    timeline: Timeline,
    pipeline: SendPipeline,
    interpreter: SystemEventInterpreter,
    capability: Arc<CapabilityLatch>,
    receipts: ReadReceiptNotifier,
    draft: String,
    notices: Vec<Notice>,
    events_tx: mpsc::UnboundedSender<ScreenEvent>,
    events_rx: mpsc::UnboundedReceiver<ScreenEvent>,
}

impl ChatScreen {
    /// Resolve the conversation with `counterpart_id` and load its history.
    ///
    /// Any failure aborts the screen load; nothing is retried.
    pub async fn open(
        transport: Arc<dyn ChatTransport>,
        actor_id: &str,
        counterpart_id: &str,
        capability: Arc<CapabilityLatch>,
    ) -> Result<Self, ChatError> {
        let resolver = IdentityResolver::new(Arc::clone(&transport), actor_id);
        let conversation = resolver.resolve(counterpart_id).await?;

        let timelines = TimelineStore::new(Arc::clone(&transport));
        let history = timelines.load(&conversation.id).await?;

        let pipeline = SendPipeline::new(&conversation, actor_id)?;
        let interpreter = SystemEventInterpreter::new(actor_id);
        let timeline = Timeline::from_history(conversation.id.clone(), history);
        capability.observe(&interpreter, timeline.messages());

        tracing::info!(
            conversation_id = %conversation.id,
            actor = %actor_id,
            counterpart = %pipeline.receiver_id(),
            messages = timeline.len(),
            interview_unlocked = capability.is_unlocked(),
            "Chat screen opened"
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            actor_id: actor_id.to_string(),
            receipts: ReadReceiptNotifier::new(Arc::clone(&transport)),
            conversation,
            transport,
            timelines,
            timeline,
            pipeline,
            interpreter,
            capability,
            draft: String::new(),
            notices: Vec::new(),
            events_tx,
            events_rx,
        })
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn render(&self) -> Vec<RenderItem> {
        self.interpreter.render_all(&self.timeline)
    }

    pub fn interview_unlocked(&self) -> bool {
        self.capability.is_unlocked()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn in_flight(&self) -> usize {
        self.pipeline.in_flight()
    }

    /// Send the current draft. Empty drafts are rejected without touching the timeline.
    pub fn submit(&mut self) -> Result<LocalId, ChatError> {
        let composed = Composed::text(&self.draft)?;
        self.draft.clear();
        Ok(self.dispatch(composed))
    }

    /// Send a workflow signal through the same pipeline as text.
    pub fn submit_signal(
        &mut self,
        action: SystemAction,
        content: &str,
    ) -> Result<LocalId, ChatError> {
        let composed = Composed::system(action, content)?;
        Ok(self.dispatch(composed))
    }

    fn dispatch(&mut self, composed: Composed) -> LocalId {
        let ticket = self.pipeline.begin(&mut self.timeline, composed);
        let local_id = ticket.local_id().clone();
        let transport = Arc::clone(&self.transport);
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            let outcome = ticket.dispatch(transport.as_ref()).await;
            if events.send(ScreenEvent::SendSettled(outcome)).is_err() {
                tracing::debug!("Chat screen closed before send settled, result discarded");
            }
        });

        local_id
    }

    /// Wait for the next background event.
    pub async fn next_event(&mut self) -> Option<ScreenEvent> {
        self.events_rx.recv().await
    }

    pub fn apply(&mut self, event: ScreenEvent) -> Reconciliation {
        match event {
            ScreenEvent::SendSettled(outcome) => {
                let reconciliation = self.pipeline.complete(&mut self.timeline, outcome);
                match &reconciliation {
                    Reconciliation::Confirmed(message) => {
                        if self.interpreter.unlocks(message) {
                            self.capability.latch();
                        }
                    }
                    Reconciliation::Failed { restored, error } => {
                        if let Some(text) = restored {
                            self.restore_draft(text);
                        }
                        self.notices.push(Notice::SendFailed {
                            reason: error.to_string(),
                        });
                    }
                    Reconciliation::Discarded => {}
                }
                reconciliation
            }
        }
    }

    /// Apply events until no send is in flight.
    pub async fn settle(&mut self) -> Vec<Reconciliation> {
        let mut settled = Vec::new();
        while self.pipeline.in_flight() > 0 {
            match self.next_event().await {
                Some(event) => settled.push(self.apply(event)),
                None => break,
            }
        }
        settled
    }

    /// Re-fetch the full history. On failure the timeline becomes unavailable.
    pub async fn reload(&mut self) -> Result<(), ChatError> {
        match self.timelines.load(&self.conversation.id).await {
            Ok(history) => {
                self.timeline.replace_history(history);
                self.capability
                    .observe(&self.interpreter, self.timeline.messages());
                Ok(())
            }
            Err(e) => {
                self.timeline.mark_unavailable();
                Err(e)
            }
        }
    }

    /// Fire read receipts for unread messages addressed to the actor.
    pub fn acknowledge_incoming(&self) -> Vec<JoinHandle<()>> {
        self.timeline
            .messages()
            .filter(|m| m.receiver_id == self.actor_id && !m.is_read())
            .map(|m| self.receipts.mark_read(&m.id))
            .collect()
    }

    fn restore_draft(&mut self, text: &str) {
        if self.draft.is_empty() {
            self.draft = text.to_string();
        } else {
            // Keep whatever was typed since the failed send
            self.draft = format!("{}\n{}", text, self.draft);
        }
    }
}

impl std::fmt::Debug for ChatScreen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatScreen")
            .field("actor_id", &self.actor_id)
            .field("conversation", &self.conversation.id)
            .field("entries", &self.timeline.len())
            .field("in_flight", &self.pipeline.in_flight())
            .field("transport", &"<ChatTransport>")
            .finish()
    }
}
