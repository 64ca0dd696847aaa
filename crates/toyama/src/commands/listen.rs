//! `listen`: stream board updates until Ctrl-C.

use std::io::{IsTerminal, Write};

use owo_colors::OwoColorize;
use tokio::sync::mpsc;

use toyama_core::{GatewayHandler, StateUpdate};

use crate::cli::{ColorMode, GlobalOpts, ListenArgs};
use crate::error::CliError;

pub async fn handle(
    handler: &GatewayHandler,
    args: &ListenArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (tx, mut rx) = mpsc::unbounded_channel::<StateUpdate>();
    handler.register_update_callback(move |update| {
        tx.send(update.clone())?;
        Ok(())
    });

    handler.start().await;
    let mut connectivity = handler.connectivity();
    let color = use_color(global.color);

    if !args.json {
        eprintln!("listening on {} (Ctrl-C to stop)", args.bind);
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome = loop {
        tokio::select! {
            res = &mut ctrl_c => break res.map_err(CliError::from),
            update = rx.recv() => {
                let Some(update) = update else { break Ok(()) };
                if let Err(e) = print_update(&update, args.json, color) {
                    break Err(e);
                }
            }
            changed = connectivity.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let up = *connectivity.borrow_and_update();
                if !args.json {
                    eprintln!("gateway {}", if up { "reachable" } else { "unreachable" });
                }
            }
        }
    };

    handler.shutdown().await;
    outcome
}

fn print_update(update: &StateUpdate, json: bool, color: bool) -> Result<(), CliError> {
    let mut out = std::io::stdout().lock();
    if json {
        writeln!(out, "{}", serde_json::to_string(update)?)?;
    } else if color {
        let state = if update.state == 0 {
            update.state.dimmed().to_string()
        } else {
            update.state.green().to_string()
        };
        writeln!(
            out,
            "{}  #{:<3} {}",
            update.board.cyan(),
            update.button_id,
            state
        )?;
    } else {
        writeln!(
            out,
            "{}  #{:<3} {}",
            update.board, update.button_id, update.state
        )?;
    }
    out.flush()?;
    Ok(())
}

fn use_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => std::io::stdout().is_terminal(),
    }
}
