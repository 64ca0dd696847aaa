// ── Device record ──
//
// One controllable button on a board. Everything but `state` is static
// catalog data; `kind` cannot change after construction.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::Display;

use toyama_api::StateUpdate;
use toyama_api::codec::WIRE_BUTTON_OFFSET;

/// What a button drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceType {
    /// Board-level master button (bus id 16).
    #[serde(rename = "master")]
    Master,
    /// Fan dimmer; state is one of the five dimmer command values.
    #[serde(rename = "dimmer", alias = "fan")]
    Fan,
    /// Plain on/off relay; state is 0 or 1.
    #[serde(rename = "onoff", alias = "switch")]
    Switch,
}

/// A switch or fan button as known to the device catalog.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: u32,
    /// Catalog button id. The bus id is this plus 16.
    pub button_id: u32,
    pub name: String,
    #[serde(rename = "type")]
    kind: DeviceType,
    /// Last known state. Written only by the gateway handler and
    /// [`Device::apply_update`].
    #[serde(default)]
    pub state: i32,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub gateway_id: u32,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub zone_id: u32,
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub room_id: u32,
    #[serde(default)]
    pub board: String,
    pub board_id: u64,
}

impl Device {
    pub fn new(
        id: u32,
        kind: DeviceType,
        board_id: u64,
        button_id: u32,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            button_id,
            name: name.into(),
            kind,
            state: 0,
            gateway: String::new(),
            gateway_id: 0,
            zone: String::new(),
            zone_id: 0,
            room: String::new(),
            room_id: 0,
            board: String::new(),
            board_id,
        }
    }

    pub fn with_room(mut self, room: impl Into<String>, room_id: u32) -> Self {
        self.room = room.into();
        self.room_id = room_id;
        self
    }

    pub fn with_zone(mut self, zone: impl Into<String>, zone_id: u32) -> Self {
        self.zone = zone.into();
        self.zone_id = zone_id;
        self
    }

    pub fn with_board_name(mut self, board: impl Into<String>) -> Self {
        self.board = board.into();
        self
    }

    pub fn with_gateway(mut self, gateway: impl Into<String>, gateway_id: u32) -> Self {
        self.gateway = gateway.into();
        self.gateway_id = gateway_id;
        self
    }

    pub fn with_state(mut self, state: i32) -> Self {
        self.state = state;
        self
    }

    pub fn kind(&self) -> DeviceType {
        self.kind
    }

    /// Button id used on the local bus (`button_id + 16`).
    pub fn wire_button_id(&self) -> u32 {
        self.button_id + WIRE_BUTTON_OFFSET
    }

    /// "Room Name", for logs and error messages.
    pub fn nice_name(&self) -> String {
        format!("{} {}", self.room, self.name)
    }

    /// Stable key: `room_boardid_buttonid` with spaces and hyphens
    /// replaced by underscores.
    pub fn unique_id(&self) -> String {
        format!("{}_{}_{}", self.room, self.board_id, self.button_id).replace([' ', '-'], "_")
    }

    pub fn is_master(&self) -> bool {
        self.kind == DeviceType::Master
    }

    pub fn is_fan(&self) -> bool {
        self.kind == DeviceType::Fan
    }

    pub fn is_switch(&self) -> bool {
        self.kind == DeviceType::Switch
    }

    /// Anything that is not a board master.
    pub fn is_device(&self) -> bool {
        !self.is_master()
    }

    /// Whether an inbound update is about this button.
    pub fn matches(&self, update: &StateUpdate) -> bool {
        let same_board = update.board == self.board_id.to_string()
            || (!self.board.is_empty() && update.board.eq_ignore_ascii_case(&self.board));
        same_board && update.button_id == self.wire_button_id()
    }

    /// Record a reported state if the update targets this device.
    ///
    /// Returns `true` if the stored state changed.
    pub fn apply_update(&mut self, update: &StateUpdate) -> bool {
        if !self.matches(update) || self.state == update.state {
            return false;
        }
        self.state = update.state;
        true
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Device(room='{}' name='{}' type={})",
            self.room, self.name, self.kind
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn hall_fan() -> Device {
        Device::new(7, DeviceType::Fan, 4242, 2, "Ceiling Fan")
            .with_room("Living-Room Hall", 3)
            .with_board_name("b4e62d0a91f1")
    }

    fn update(board: &str, button_id: u32, state: i32) -> StateUpdate {
        StateUpdate {
            board: board.into(),
            button_id,
            state,
        }
    }

    #[test]
    fn derived_names() {
        let dev = hall_fan();
        assert_eq!(dev.wire_button_id(), 18);
        assert_eq!(dev.nice_name(), "Living-Room Hall Ceiling Fan");
        assert_eq!(dev.unique_id(), "Living_Room_Hall_4242_2");
    }

    #[test]
    fn predicates_follow_kind() {
        let fan = hall_fan();
        assert!(fan.is_fan() && fan.is_device());
        assert!(!fan.is_switch() && !fan.is_master());

        let master = Device::new(1, DeviceType::Master, 4242, 0, "Master");
        assert!(master.is_master());
        assert!(!master.is_device());
    }

    #[test]
    fn debug_rendering() {
        assert_eq!(
            format!("{:?}", hall_fan()),
            "Device(room='Living-Room Hall' name='Ceiling Fan' type=FAN)"
        );
    }

    #[test]
    fn deserializes_catalog_record() {
        let dev: Device = serde_json::from_value(json!({
            "id": 11,
            "button_id": 3,
            "name": "Lamp",
            "type": "onoff",
            "state": 1,
            "gateway": "192.168.1.20",
            "gateway_id": 1,
            "zone": "Ground",
            "zone_id": 1,
            "room": "Study",
            "room_id": 4,
            "board": "Study Board",
            "board_id": 900
        }))
        .unwrap();
        assert_eq!(dev.kind(), DeviceType::Switch);
        assert_eq!(dev.state, 1);
        assert_eq!(dev.wire_button_id(), 19);

        let fan: Device = serde_json::from_value(json!({
            "id": 12, "button_id": 1, "name": "Fan", "type": "fan", "board_id": 900
        }))
        .unwrap();
        assert!(fan.is_fan());
        assert_eq!(fan.state, 0);
    }

    #[test]
    fn apply_update_matches_board_and_wire_button() {
        let mut dev = hall_fan();

        assert!(!dev.apply_update(&update("4242", 2, 50)), "catalog id is not a bus id");
        assert!(!dev.apply_update(&update("9999", 18, 50)));
        assert!(dev.apply_update(&update("4242", 18, 50)));
        assert_eq!(dev.state, 50);

        assert!(!dev.apply_update(&update("4242", 18, 50)), "unchanged state");
        assert!(dev.apply_update(&update("B4E62D0A91F1", 18, 100)));
        assert_eq!(dev.state, 100);
    }
}
