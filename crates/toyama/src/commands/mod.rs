//! Command dispatch: bridges CLI args to gateway handler calls.

pub mod device;
pub mod listen;
pub mod status;

use toyama_core::GatewayHandler;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a gateway-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    handler: &GatewayHandler,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::On(args) => device::on(handler, &args).await,
        Command::Off(args) => device::off(handler, &args).await,
        Command::Speed(args) => device::speed(handler, &args).await,
        Command::Status => status::handle(handler).await,
        Command::Listen(args) => listen::handle(handler, &args, global).await,
        // Completions are handled before dispatch
        Command::Completions(_) => Ok(()),
    }
}
