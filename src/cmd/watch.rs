//! `boardsync watch`: keep a board open and print what peers do to it.

use std::sync::Arc;

use anyhow::Result;
use console::style;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use boardsync::config::SyncConfig;
use boardsync::gateway::{HttpGateway, WorkspaceGateway};
use boardsync::model::BoardId;
use boardsync::realtime::{ChannelEvent, Identity, RealtimeChannel};
use boardsync::session::BoardSession;
use boardsync::store::{BoardStore, StoreNotice};

use super::board::{build_gateway, print_board};

/// Announce ourselves with the profile name when we are logged in.
async fn identity(gateway: &HttpGateway) -> Identity {
    if !gateway.has_token() {
        return Identity::default();
    }
    match gateway.profile().await {
        Ok(user) => Identity {
            user_id: Some(user.id),
            user_name: Some(user.user_name),
        },
        Err(e) => {
            warn!(error = %e, "could not fetch profile; joining anonymously");
            Identity::default()
        }
    }
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<ChannelEvent>>,
) -> Result<ChannelEvent, RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn print_presence(channel: &RealtimeChannel) {
    let names: Vec<String> = channel
        .presence()
        .into_iter()
        .map(|entry| entry.display_name)
        .collect();
    if names.is_empty() {
        println!("{} nobody else here", style("presence").dim());
    } else {
        println!("{} {}", style("presence").dim(), names.join(", "));
    }
}

pub async fn cmd_watch(config: &SyncConfig, board: &str) -> Result<()> {
    let gateway = build_gateway(config)?;
    let channel = if config.realtime.enabled {
        Some(RealtimeChannel::new(
            config.realtime.clone(),
            identity(&gateway).await,
        ))
    } else {
        None
    };

    let store = BoardStore::new(Arc::new(gateway));
    let mut events = channel.as_ref().map(|c| c.subscribe());
    let session = BoardSession::open(store.clone(), channel, &BoardId::from(board)).await?;
    let mut notices = store.subscribe();

    if let Some(graph) = store.snapshot() {
        print_board(&graph);
    }
    if session.is_synced() {
        println!(
            "{} Watching {} (Ctrl-C to stop)",
            style("●").green(),
            style(board).bold()
        );
    } else {
        println!(
            "{} Realtime unavailable; no live updates. Ctrl-C to stop.",
            style("●").yellow()
        );
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = next_event(&mut events) => match event {
                Ok(ChannelEvent::Mutation(mutation)) => {
                    println!("{} {}", style("update").cyan(), mutation.kind());
                }
                Ok(ChannelEvent::PresenceChanged) => {
                    if let Some(channel) = session.channel() {
                        print_presence(channel);
                    }
                }
                Ok(ChannelEvent::CursorMoved(_)) => {}
                Ok(ChannelEvent::Reconnected) => {
                    println!("{} reconnected", style("realtime").green());
                }
                Ok(ChannelEvent::ConnectionLost) => {
                    println!("{} connection lost; no further updates", style("realtime").red());
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => events = None,
            },
            notice = notices.recv() => match notice {
                Ok(StoreNotice::Loaded { .. }) => {
                    if let Some(graph) = store.snapshot() {
                        print_board(&graph);
                    }
                }
                Ok(StoreNotice::LoadFailed { message, .. }) => {
                    println!("{} reload failed: {}", style("error").red().bold(), message);
                }
                Ok(StoreNotice::MutationFailed { operation, message }) => {
                    println!("{} {} failed: {}", style("error").red().bold(), operation, message);
                }
                Ok(StoreNotice::Confirmed(_)) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
    }

    session.close().await;
    println!("Stopped watching {board}.");
    Ok(())
}
