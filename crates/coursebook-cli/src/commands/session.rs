//! `coursebook session`: keep a session open, warn before it expires and
//! offer to extend it.

use std::io::{self, BufRead, Write};

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::warn;

use crate::app::App;
use coursebook_core::auth::MonitorState;

/// Stdin lines from a dedicated thread, so a pending read never holds up shutdown.
fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

pub async fn watch(app: &mut App) -> Result<()> {
    let api = app.connect().await?;
    let monitor = app.monitor.clone();

    // Subscribe before the watcher starts so no transition is missed
    let mut status_rx = monitor.subscribe();
    monitor.watch_session();

    if let Some(user) = api.session().user() {
        println!("Watching session for {}. Press Ctrl-C to stop.", user.display_name());
    }

    let mut input = stdin_lines();
    let mut last_state = status_rx.borrow().state;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = status_rx.borrow_and_update().state;
                if state == last_state {
                    continue;
                }
                last_state = state;

                match state {
                    MonitorState::Active => {
                        println!("Session active, {} remaining.", monitor.remaining_display());
                    }
                    MonitorState::Warning => {
                        while input.try_recv().is_ok() {}
                        print!(
                            "Your session expires in {}. Stay signed in? [Y/n] ",
                            monitor.remaining_display()
                        );
                        io::stdout().flush()?;
                    }
                    MonitorState::Terminated | MonitorState::Idle => break,
                }
            }
            line = input.recv(), if last_state == MonitorState::Warning => {
                let Some(answer) = line else { break };
                if answer.trim().eq_ignore_ascii_case("n") {
                    if let Err(e) = monitor.logout().await {
                        warn!(error = %e, "Server logout failed");
                    }
                    break;
                }
                match monitor.extend().await {
                    Ok(()) => app.persist_tokens(),
                    Err(e) => {
                        eprintln!("Could not extend the session: {}", e);
                        break;
                    }
                }
            }
            _ = &mut ctrl_c => {
                println!();
                break;
            }
        }
    }

    monitor.shutdown();
    Ok(())
}
