//! `on`, `off` and `speed`.

use toyama_core::{Device, DeviceType, FanSpeed, GatewayHandler};

use crate::cli::{ButtonArgs, SpeedArgs};
use crate::error::CliError;

/// The CLI has no device catalog, so it addresses buttons directly and
/// never knows their current state.
const UNKNOWN_STATE: i32 = -1;

fn target(board: u64, button: u32, kind: DeviceType) -> Device {
    Device::new(0, kind, board, button, format!("button {button}"))
        .with_room(format!("board {board}"), 0)
        .with_state(UNKNOWN_STATE)
}

pub async fn on(handler: &GatewayHandler, args: &ButtonArgs) -> Result<(), CliError> {
    let mut device = target(args.board, args.button, args.kind.into());
    handler.turn_on(&mut device).await?;
    println!("{} on", device.nice_name());
    Ok(())
}

pub async fn off(handler: &GatewayHandler, args: &ButtonArgs) -> Result<(), CliError> {
    let mut device = target(args.board, args.button, args.kind.into());
    handler.turn_off(&mut device).await?;
    println!("{} off", device.nice_name());
    Ok(())
}

pub async fn speed(handler: &GatewayHandler, args: &SpeedArgs) -> Result<(), CliError> {
    let mut device = target(args.board, args.button, DeviceType::Fan);
    handler.set_speed(&mut device, args.level).await?;
    println!(
        "{} speed {}",
        device.nice_name(),
        FanSpeed::from_raw_state(device.state)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_are_never_short_circuited() {
        let device = target(4242, 2, DeviceType::Fan);
        assert_eq!(device.nice_name(), "board 4242 button 2");
        assert_eq!(device.wire_button_id(), 18);
        assert!(device.state < 0);
    }
}
