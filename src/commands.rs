// ABOUTME: Client subcommands that drive the chat core against a running service
// ABOUTME: Resolve, load, send and signal through ChatScreen; print render items as text

use anyhow::{Context, Result};
use portal_chat_core::{
    CapabilityLatch, ChatScreen, ChatTransport, FileCapabilityStore, HttpTransport,
    IdentityResolver, Notice, Participant, Reconciliation, RenderItem, StaticCredential,
    SystemAction,
};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ClientConfig;

/// Everything a client command needs: who we are, how to reach the service,
/// and the process-wide capability latch.
pub struct ClientContext {
    pub actor: Participant,
    pub transport: Arc<dyn ChatTransport>,
    pub capability: Arc<CapabilityLatch>,
}

impl ClientContext {
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let credentials = Arc::new(StaticCredential::new(config.token.clone()));
        let transport = HttpTransport::with_timeout(
            &config.base_url,
            credentials,
            Duration::from_secs(config.timeout_secs),
        )
        .context("Failed to build HTTP client")?;
        let transport: Arc<dyn ChatTransport> = Arc::new(transport);

        let actor = transport
            .whoami()
            .await
            .with_context(|| format!("Failed to identify against {}", config.base_url))?;

        let store = FileCapabilityStore::in_dir(config.state_dir());
        let capability = Arc::new(CapabilityLatch::open(Box::new(store)));

        tracing::debug!(actor = %actor.id, role = %actor.role, "Client connected");
        Ok(Self {
            actor,
            transport,
            capability,
        })
    }

    async fn open_screen(&self, counterpart: &str) -> Result<ChatScreen> {
        let screen = ChatScreen::open(
            Arc::clone(&self.transport),
            &self.actor.id,
            counterpart,
            Arc::clone(&self.capability),
        )
        .await?;
        Ok(screen)
    }
}

pub fn format_item(item: &RenderItem) -> String {
    match item {
        RenderItem::Text {
            sender_id,
            content,
            mine,
            read,
            ..
        } => {
            let marker = if *mine && *read { " (read)" } else { "" };
            format!("{}: {}{}", sender_id, content, marker)
        }
        RenderItem::Pending { content, .. } => format!("(sending) {}", content),
        RenderItem::Control { label, enabled, .. } => {
            if *enabled {
                format!("[{}]", label)
            } else {
                format!("[{}] (sent)", label)
            }
        }
        RenderItem::Notice { text, .. } => format!("! {}", text),
    }
}

fn print_screen(screen: &ChatScreen) {
    println!(
        "conversation {} ({} messages)",
        screen.conversation().id,
        screen.timeline().len()
    );
    for item in screen.render() {
        println!("  {}", format_item(&item));
    }
    println!("interview unlocked: {}", screen.interview_unlocked());
}

pub fn whoami(ctx: &ClientContext) {
    println!("{} ({}, {})", ctx.actor.id, ctx.actor.display_name, ctx.actor.role);
}

pub async fn conversations(ctx: &ClientContext) -> Result<()> {
    let resolver = IdentityResolver::new(Arc::clone(&ctx.transport), ctx.actor.id.clone());
    let conversations = resolver.list().await?;
    if conversations.is_empty() {
        println!("No conversations yet");
    }
    for conversation in conversations {
        let counterpart = conversation.counterpart_of(&ctx.actor.id).unwrap_or("?");
        println!(
            "{}  with {}  since {}",
            conversation.id,
            counterpart,
            conversation.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

pub async fn open(ctx: &ClientContext, counterpart: &str, mark_read: bool) -> Result<()> {
    let screen = ctx.open_screen(counterpart).await?;
    print_screen(&screen);

    if mark_read {
        let handles = screen.acknowledge_incoming();
        let count = handles.len();
        // Receipts are fire-and-forget; wait only so the process does not exit first
        futures_util::future::join_all(handles).await;
        println!("acknowledged {} message(s)", count);
    }
    Ok(())
}

pub async fn send(ctx: &ClientContext, counterpart: &str, text: &str) -> Result<()> {
    let mut screen = ctx.open_screen(counterpart).await?;
    screen.set_draft(text);
    screen.submit()?;
    settle_and_report(&mut screen).await
}

pub async fn signal(ctx: &ClientContext, counterpart: &str, message: &str) -> Result<()> {
    let mut screen = ctx.open_screen(counterpart).await?;
    screen.submit_signal(SystemAction::ProceedToInterview, message)?;
    settle_and_report(&mut screen).await
}

async fn settle_and_report(screen: &mut ChatScreen) -> Result<()> {
    let settled = screen.settle().await;
    for notice in screen.take_notices() {
        match notice {
            Notice::SendFailed { reason } => eprintln!("send failed: {}", reason),
        }
    }

    match settled.into_iter().next() {
        Some(Reconciliation::Confirmed(message)) => {
            println!("sent {} at {}", message.id, message.created_at.to_rfc3339());
            Ok(())
        }
        Some(Reconciliation::Failed { error, .. }) => Err(error.into()),
        Some(Reconciliation::Discarded) | None => {
            anyhow::bail!("Send did not settle")
        }
    }
}

/// Reads only local state; no service connection needed
pub fn capability(config: &ClientConfig) {
    let store = FileCapabilityStore::in_dir(config.state_dir());
    let latch = CapabilityLatch::open(Box::new(store));
    println!("interview unlocked: {}", latch.is_unlocked());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_text_marks_read_own_messages() {
        let item = RenderItem::Text {
            message_id: "m1".to_string(),
            sender_id: "alice".to_string(),
            content: "Hello".to_string(),
            mine: true,
            read: true,
        };
        assert_eq!(format_item(&item), "alice: Hello (read)");
    }

    #[test]
    fn test_format_incoming_text_has_no_read_marker() {
        let item = RenderItem::Text {
            message_id: "m1".to_string(),
            sender_id: "bob".to_string(),
            content: "Hi".to_string(),
            mine: false,
            read: true,
        };
        assert_eq!(format_item(&item), "bob: Hi");
    }

    #[test]
    fn test_format_control_enabled_and_disabled() {
        let control = |enabled| RenderItem::Control {
            message_id: "m2".to_string(),
            action: SystemAction::ProceedToInterview,
            label: "Schedule interview".to_string(),
            enabled,
        };
        assert_eq!(format_item(&control(true)), "[Schedule interview]");
        assert_eq!(format_item(&control(false)), "[Schedule interview] (sent)");
    }

    #[test]
    fn test_format_pending_and_notice() {
        let pending = RenderItem::Pending {
            local_id: "local-1".to_string(),
            content: "typing".to_string(),
        };
        assert_eq!(format_item(&pending), "(sending) typing");

        let notice = RenderItem::Notice {
            message_id: "m3".to_string(),
            text: "Unsupported workflow update (X)".to_string(),
        };
        assert_eq!(format_item(&notice), "! Unsupported workflow update (X)");
    }
}
