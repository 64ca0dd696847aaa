//! `status`: broadcast a status poll.

use toyama_core::GatewayHandler;

use crate::error::CliError;

pub async fn handle(handler: &GatewayHandler) -> Result<(), CliError> {
    handler.request_status().await?;
    println!("status requested; boards report over UDP (see `toyama listen`)");
    Ok(())
}
