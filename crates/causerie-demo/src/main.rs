//! # causerie-demo
//!
//! Terminal chat client for the causerie gossip network.
//!
//! This binary wires the full stack together:
//! - **SQLite-backed store** for the private key and nick
//! - **libp2p GossipSub transport** over QUIC, spawned lazily
//! - **Chat session** with history assembly and sealed fan-out
//!
//! Commands at the prompt:
//! - `/lobby`            switch to the default room
//! - `/dm <hex,hex,..>`  switch to the channel with those members
//! - `/invite <hex,..>`  create a chat with those members and switch to it
//! - `/chats`            list chats known from invites and traffic
//! - `/who`              list members seen in the history
//! - `/nick <name>`      change and persist the display nick
//! - `/quit`             exit
//!
//! Plain lines are sent to the current channel.

mod config;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use causerie_client::{create_chat, ensure_identity, ensure_nick, ChatSession, Directory, InviteBook};
use causerie_net::{spawn_gossip_transport, GossipConfig, LazyTransport, TransportHandle};
use causerie_shared::constants::{INVITES_TOPIC, STORE_KEY_NICK};
use causerie_shared::{Chan, ChannelId, Identity, Pubkey};
use causerie_store::{Database, KeyValueStore};

use crate::config::DemoConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,causerie_demo=info")),
        )
        .init();

    info!("Starting causerie demo v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration and open the local store
    // -----------------------------------------------------------------------
    let config = DemoConfig::from_env();
    info!(?config, "Loaded configuration");

    let db = match &config.db_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };

    let identity = ensure_identity(&db)?;
    let nick = ensure_nick(&db)?;
    println!("you are {} <{}>", nick, identity.public());

    // -----------------------------------------------------------------------
    // 3. Spawn the transport and connect the session
    // -----------------------------------------------------------------------
    let transport = init_transport(&identity, &config).await?;

    let mut session = ChatSession::connect(transport.clone(), identity.clone(), nick).await?;

    // An isolated node has no history to fetch; don't hold the prompt
    // hostage waiting for a peer that may never come.
    match tokio::time::timeout(std::time::Duration::from_secs(10), session.load_history()).await {
        Ok(Ok(count)) => println!("loaded {count} stored messages"),
        Ok(Err(e)) => warn!(error = %e, "History load failed"),
        Err(_) => println!("no peers yet; starting with an empty history"),
    }
    for envelope in session.history().visible_in(&Chan::DefaultRoom) {
        println!("{}: {}", envelope.nick(), envelope.text());
    }

    let mut live = session
        .take_live()
        .await?
        .context("session has no live subscription")?;

    let mut invite_book = InviteBook::new();
    if let Err(e) = invite_book.load(&transport).await {
        warn!(error = %e, "Invite load failed");
    }
    let mut invites_live = transport.observe(INVITES_TOPIC).await?;

    // -----------------------------------------------------------------------
    // 4. REPL: interleave stdin with live deliveries
    // -----------------------------------------------------------------------
    let mut chan = Chan::DefaultRoom;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            maybe_line = lines.next_line() => {
                let Some(line) = maybe_line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Some(command) = line.strip_prefix('/') {
                    if !handle_command(command, &mut session, &transport, &db, &invite_book, &mut chan).await? {
                        break;
                    }
                } else {
                    match session.send(&chan, line).await {
                        Ok(report) if report.all_ok() => {}
                        Ok(report) => {
                            for outcome in report.failed_recipients() {
                                let to = outcome
                                    .recipient
                                    .map(|k| k.short())
                                    .unwrap_or_else(|| "room".into());
                                println!("! send to {to} failed");
                            }
                        }
                        Err(e) => println!("! send failed: {e}"),
                    }
                }
            }
            delivery = live.recv() => {
                let Some(delivery) = delivery else { break };
                if let Some(envelope) = session.observe_delivery(&delivery) {
                    let tag = match envelope.chan().channel_id() {
                        Some(id) if Some(id) != chan.channel_id() => format!("[{}] ", id),
                        _ => String::new(),
                    };
                    println!("{}{}: {}", tag, envelope.nick(), envelope.text());
                }
            }
            delivery = invites_live.recv() => {
                let Some(delivery) = delivery else { break };
                if let Some(invite) = invite_book.observe_delivery(&delivery) {
                    println!("* invited to chat {} ({} members)", invite.chat_id, invite.pubkeys.len());
                }
            }
        }
    }

    live.close().await;
    invites_live.close().await;
    session.close().await;
    transport.shutdown().await;
    Ok(())
}

/// Spawn the gossip transport behind a [`LazyTransport`] cell and hand
/// back the command handle. A failed spawn leaves the cell empty, so
/// the error reported here is always from a fresh attempt.
async fn init_transport(identity: &Identity, config: &DemoConfig) -> anyhow::Result<TransportHandle> {
    let identity = identity.clone();
    let listen_port = config.listen_port;
    let dials = config.peers.clone();
    let lazy = LazyTransport::new(move || {
        let identity = identity.clone();
        let gossip = GossipConfig {
            listen_port,
            dials: dials.clone(),
        };
        async move {
            let (handle, peer_id) = spawn_gossip_transport(&identity, gossip).await?;
            info!(peer_id = %peer_id, "Transport ready");
            Ok(handle)
        }
    });
    Ok(lazy.get().await?.clone())
}

/// Run one slash command. Returns `false` when the REPL should exit.
async fn handle_command(
    command: &str,
    session: &mut ChatSession,
    transport: &TransportHandle,
    db: &Database,
    invite_book: &InviteBook,
    chan: &mut Chan,
) -> anyhow::Result<bool> {
    let (name, rest) = command
        .split_once(char::is_whitespace)
        .unwrap_or((command, ""));

    match name {
        "lobby" => {
            *chan = Chan::DefaultRoom;
            println!("in the lobby");
        }
        "dm" => match parse_keys(rest) {
            Ok(others) if !others.is_empty() => {
                let id = ChannelId::derive(&session.pubkey(), others);
                println!("in chat {id}");
                *chan = Chan::Channel(id);
            }
            Ok(_) => println!("usage: /dm <hex-pubkey>[,<hex-pubkey>..]"),
            Err(e) => println!("! bad key: {e}"),
        },
        "invite" => match parse_keys(rest) {
            Ok(mut members) if !members.is_empty() => {
                members.push(session.pubkey());
                let (id, report) = create_chat(transport, &members).await?;
                if report.all_ok() {
                    println!("created chat {id}");
                } else {
                    println!("created chat {id}; some invites failed to send");
                }
                *chan = Chan::Channel(id);
            }
            Ok(_) => println!("usage: /invite <hex-pubkey>[,<hex-pubkey>..]"),
            Err(e) => println!("! bad key: {e}"),
        },
        "chats" => {
            let directory = Directory::scan(session.history());
            for (id, label) in directory.channels() {
                println!("{label}  ({id})");
            }
            for invite in invite_book.iter() {
                if directory.channel_label(&invite.chat_id).is_none() {
                    println!("(invite)  ({})", invite.chat_id);
                }
            }
        }
        "who" => {
            let directory = Directory::scan(session.history());
            for (key, nick) in directory.members() {
                println!("{nick}  {key}");
            }
        }
        "nick" => {
            let nick = rest.trim();
            if nick.is_empty() {
                println!("usage: /nick <name>");
            } else {
                db.set(STORE_KEY_NICK, nick)?;
                session.set_nick(nick.to_string());
                println!("you are now {nick}");
            }
        }
        "quit" | "exit" => return Ok(false),
        other => println!("unknown command: /{other}"),
    }
    Ok(true)
}

fn parse_keys(input: &str) -> Result<Vec<Pubkey>, causerie_shared::KeyError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(Pubkey::from_hex)
        .collect()
}
