mod config;
mod terminal;

use std::sync::Arc;

use anyhow::Context;
use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use parley_api::admin::DEFAULT_AUDIT_PAGE_SIZE;
use parley_api::{HttpApi, SessionHandle};
use parley_core::inbox::{ContactList, ContactUpdate, NotificationFeed};
use parley_core::render;
use parley_core::{ConversationView, LoadOutcome, MessageStore, StoreChange};
use parley_gateway::Hub;
use parley_types::api::{Credentials, ReportRequest};
use parley_types::events::ServerEvent;
use parley_types::models::ConversationId;

use config::Config;
use terminal::Command;

const USER_TABLE_PAGE_SIZE: u32 = 20;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so they don't interleave with the chat
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley=info,parley_core=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    info!("API {} / gateway {}", config.api_url, config.gateway_url);

    let credentials = Credentials {
        nim: config.nim.clone(),
        password: config.password.clone(),
    };
    let api = Arc::new(
        HttpApi::login(config.api_url.as_str(), &credentials)
            .await
            .context("login failed")?,
    );
    let session = api.session().clone();
    let me = session.current();
    println!("Logged in as {} ({})", me.alias, me.role);
    if let Some(warning) = me.warning() {
        println!("! {}", warning);
    }

    // Realtime
    let (hub, commands) = Hub::new();
    let connection = parley_gateway::connect(
        config.gateway_url.as_str(),
        &me.token,
        me.user_id.clone(),
        hub.clone(),
        commands,
    )
    .await
    .context("gateway connection failed")?;
    tokio::spawn(async move {
        match connection.run().await {
            Ok(()) => warn!("Gateway connection closed"),
            Err(e) => error!("Gateway connection failed: {}", e),
        }
    });

    let store = Arc::new(MessageStore::new(
        api.clone(),
        session.clone(),
        ConversationId::Public,
        config.page_size,
    ));
    let contacts = Arc::new(Mutex::new(ContactList::new()));
    if me.is_staff() {
        if let Err(e) = contacts.lock().await.refresh(&api).await {
            println!("! Could not load private inbox: {}", e);
        }
    }

    tokio::spawn(print_changes(store.clone(), session.clone()));
    tokio::spawn(watch_account(hub.clone(), api.clone(), store.clone(), contacts.clone()));

    let mut view = ConversationView::open(store, hub);
    view.load_initial().await;
    let mut typing = view.typing_updates();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match terminal::parse_command(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => {
                        if let Err(e) = run_command(command, &mut view, &api, &contacts).await {
                            println!("! {:#}", e);
                        }
                        // The view may have been reopened on another conversation
                        typing = view.typing_updates();
                    }
                    Ok(None) => {}
                    Err(usage) => println!("! {}", usage),
                }
            }
            Ok(()) = typing.changed() => {
                if let Some(line) = terminal::typing_line(typing.borrow_and_update().as_deref()) {
                    println!("{}", line);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("Shutting down");
    Ok(())
}

async fn run_command(
    command: Command,
    view: &mut ConversationView,
    api: &HttpApi,
    contacts: &Mutex<ContactList>,
) -> anyhow::Result<()> {
    match command {
        Command::Send(body) => {
            view.keystroke();
            if let Err(e) = view.send(&body, None).await {
                println!("! {}", e.user_message());
            }
        }
        Command::Reply { to, body } => {
            let target = view.store().snapshot().into_iter().find(|m| m.id == to);
            match target {
                None => println!("! No message {} on screen", to),
                Some(message) if !render::can_reply(&message) => {
                    println!("! That message can no longer be replied to")
                }
                Some(_) => {
                    view.keystroke();
                    if let Err(e) = view.send(&body, Some(to)).await {
                        println!("! {}", e.user_message());
                    }
                }
            }
        }
        Command::Older => match view.load_older().await {
            LoadOutcome::Failed => println!("! Could not load older messages"),
            LoadOutcome::Skipped if view.store().is_loading() => println!("... still loading"),
            LoadOutcome::Skipped => println!("-- no older messages --"),
            _ => {}
        },
        Command::Private(owner) => {
            let me = api.session().current();
            let owner = owner.unwrap_or_else(|| me.user_id.clone());
            if !me.is_staff() && owner != me.user_id {
                println!("! You can only open your own thread");
                return Ok(());
            }
            view.switch_to(ConversationId::Private(owner));
            view.load_initial().await;
        }
        Command::Public => {
            view.switch_to(ConversationId::Public);
            view.load_initial().await;
        }
        Command::Notifications => {
            let mut feed = NotificationFeed::load(api).await?;
            println!("{} unread", feed.unread_count());
            for item in feed.items() {
                let marker = if item.is_read { ' ' } else { '*' };
                let time = item.created_at.with_timezone(&Local).format("%d/%m %H:%M");
                println!("{} {} {}", marker, time, item.message);
            }
            if feed.unread_count() > 0 {
                feed.mark_all_read(api).await?;
            }
        }
        Command::Contacts => {
            if !api.session().current().is_staff() {
                println!("! Only staff have a private inbox");
                return Ok(());
            }
            let list = contacts.lock().await;
            if list.contacts().is_empty() {
                println!("(no private threads)");
            }
            for contact in list.contacts() {
                let presence = if list.is_online(&contact.id) { "online " } else { "offline" };
                println!("{} {} ({}, {})", presence, contact.alias, contact.id, contact.role);
            }
        }
        Command::Users(page) => {
            if !api.session().current().is_staff() {
                println!("! Only staff can list users");
                return Ok(());
            }
            let users = api.users(page, USER_TABLE_PAGE_SIZE).await?;
            let now = chrono::Utc::now();
            for user in &users.items {
                println!("{}", terminal::user_row(user, now));
            }
            println!("-- page {}/{} ({} users) --", page, users.total_pages(), users.total);
        }
        Command::Audit(page) => {
            if !api.session().current().is_staff() {
                println!("! Only staff can read the audit log");
                return Ok(());
            }
            let logs = api.audit_logs(page, DEFAULT_AUDIT_PAGE_SIZE).await?;
            for entry in &logs.items {
                let time = entry.created_at.with_timezone(&Local).format("%d/%m %H:%M");
                let target = entry.target_user_alias.as_deref().unwrap_or("-");
                let details = entry.details.as_deref().unwrap_or_default();
                println!("{} {} {} -> {} {}", time, entry.admin_alias, entry.action, target, details);
            }
            println!("-- page {}/{} --", page, logs.total_pages());
        }
        Command::Stats => {
            let stats = api.chat_stats().await?;
            println!("{} users, {} messages", stats.total_users, stats.total_messages);
            if api.session().current().is_staff() {
                let activity = api.activity_by_hour().await?;
                if let Some((hour, count)) = activity.busiest() {
                    println!("busiest hour {} ({} messages)", hour, count);
                }
                for user in api.active_users().await?.iter().take(5) {
                    println!("  {} {}", user.count, user.alias);
                }
            }
        }
        Command::Report {
            message,
            category,
            reason,
        } => {
            let me = api.session().user_id();
            let target = view.store().snapshot().into_iter().find(|m| m.id == message);
            let Some(target) = target else {
                println!("! No message {} on screen", message);
                return Ok(());
            };
            if !render::can_report(&target, &me) {
                println!("! That message cannot be reported");
                return Ok(());
            }
            api.submit_report(&ReportRequest {
                message_id: target.id.clone(),
                reported_id: target.author.id.clone(),
                reason_category: category,
                reason,
            })
            .await?;
            println!("Report sent");
        }
        Command::Quit => {}
    }
    Ok(())
}

/// Print whatever the store reports, in the order it happens.
async fn print_changes(store: Arc<MessageStore>, session: SessionHandle) {
    let mut changes = store.subscribe();
    loop {
        let change = match changes.recv().await {
            Ok(change) => change,
            Err(RecvError::Lagged(n)) => {
                warn!("Printer lagged behind by {} changes", n);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let alias = session.current().alias;
        match change {
            StoreChange::Reset(conversation) => println!("=== {} ===", conversation),
            StoreChange::Replaced { .. } => {
                for message in store.snapshot() {
                    println!("{}", terminal::format_message(&message, &alias));
                }
            }
            StoreChange::Prepended { count } => {
                println!("--- {} older ---", count);
                for message in store.snapshot().iter().take(count) {
                    println!("{}", terminal::format_message(message, &alias));
                }
            }
            StoreChange::HistoryExhausted => println!("-- beginning of conversation --"),
            StoreChange::Appended(id) | StoreChange::Updated { id, .. } => {
                if let Some(message) = store.snapshot().into_iter().find(|m| m.id == id) {
                    println!("{}", terminal::format_message(&message, &alias));
                }
            }
            StoreChange::StatusChanged => println!("  (read)"),
        }
    }
}

/// Account-wide events: session updates, notifications, the staff inbox.
async fn watch_account(
    hub: Hub,
    api: Arc<HttpApi>,
    store: Arc<MessageStore>,
    contacts: Arc<Mutex<ContactList>>,
) {
    let mut events = hub.subscribe("account");
    let session = api.session().clone();

    while let Some(event) = events.recv().await {
        match &event {
            ServerEvent::UserUpdated(dto) if dto.id == session.user_id() => {
                session.apply_update(dto.clone());
                let current = session.current();
                if current.is_banned {
                    println!("! Your account has been banned");
                } else if let Some(until) = current.mute_until.filter(|_| current.is_muted_now()) {
                    println!("! You are muted until {}", until.with_timezone(&Local).format("%d/%m %H:%M"));
                }
                if let Some(warning) = current.warning() {
                    println!("! {}", warning);
                }
            }
            ServerEvent::NewNotification(notification) => println!("* {}", notification.message),
            ServerEvent::UpdateChatStats(stats) => debug!(
                "{} online, {} users, {} messages",
                stats.online_count, stats.total_users, stats.total_messages
            ),
            _ => {}
        }

        if session.current().is_staff() {
            let conversation = store.conversation();
            let mut list = contacts.lock().await;
            if list.apply_event(&event, conversation.thread_owner()) == ContactUpdate::RefreshNeeded {
                if let Err(e) = list.refresh(&api).await {
                    warn!("Contact refresh failed: {}", e);
                }
            }
        }
    }
}
