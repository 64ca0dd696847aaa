//! Wire shapes for the gateway protocol.
//!
//! Outbound, everything is an `swcmd` envelope posted to `/operate`:
//!
//! ```json
//! {"type":"swcmd","data":[{"addr":[1234],"nodedata":{"cmdtype":"operate","subid":18,"cmd":1}}]}
//! ```
//!
//! Inbound, boards announce changes over UDP in one of two shapes:
//!
//! ```json
//! {"addr":"A1","data":{"stype":"single","subid":20,"status":1}}
//! {"addr":"A1","data":{"stype":"all","status":[1,0,1]}}
//! ```
//!
//! Both decode into a flat list of [`StateUpdate`] triples.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Address that makes every board on the bus answer.
pub const BROADCAST_ADDRESS: &str = "ffffffffffff";

/// Offset between a catalog button id and the id used on the local bus.
pub const WIRE_BUTTON_OFFSET: u32 = 16;

/// Button id reported at position 0 of an "all" snapshot. The master
/// button (16) never appears in snapshots.
pub const FIRST_SNAPSHOT_BUTTON_ID: u32 = 17;

const ENVELOPE_TYPE: &str = "swcmd";

// ── Outbound ─────────────────────────────────────────────────────────

/// One entry of an operate request's `addr` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BoardAddress {
    /// A specific board, sent as a JSON number.
    Board(u64),
    /// A literal address string such as [`BROADCAST_ADDRESS`].
    Raw(String),
}

impl BoardAddress {
    pub fn broadcast() -> Self {
        Self::Raw(BROADCAST_ADDRESS.into())
    }
}

impl From<u64> for BoardAddress {
    fn from(board_id: u64) -> Self {
        Self::Board(board_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Operate,
    GetStatus,
}

/// Full request body for `POST /operate`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperateRequest {
    #[serde(rename = "type")]
    kind: &'static str,
    data: Vec<NodeCommand>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct NodeCommand {
    addr: Vec<BoardAddress>,
    nodedata: NodeData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct NodeData {
    cmdtype: CommandType,
    #[serde(skip_serializing_if = "Option::is_none")]
    subid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cmd: Option<i32>,
}

impl OperateRequest {
    /// Command type of the (single) node command in this request.
    pub fn command_type(&self) -> Option<CommandType> {
        self.data.first().map(|node| node.nodedata.cmdtype)
    }

    /// Wire button id targeted by this request, if any.
    pub fn subid(&self) -> Option<u32> {
        self.data.first().and_then(|node| node.nodedata.subid)
    }

    /// Command value carried by this request, if any.
    pub fn command(&self) -> Option<i32> {
        self.data.first().and_then(|node| node.nodedata.cmd)
    }

    /// Target addresses of this request.
    pub fn targets(&self) -> &[BoardAddress] {
        match self.data.first() {
            Some(node) => &node.addr,
            None => &[],
        }
    }
}

/// Build an `operate` command.
///
/// `subid` is the wire button id; leave it out to address whole boards.
pub fn encode_operate(
    targets: Vec<BoardAddress>,
    subid: Option<u32>,
    command: i32,
) -> OperateRequest {
    envelope(targets, CommandType::Operate, subid, Some(command))
}

/// Build the broadcast `getstatus` command that makes every board report
/// its current state over UDP.
pub fn encode_status_request() -> OperateRequest {
    envelope(
        vec![BoardAddress::broadcast()],
        CommandType::GetStatus,
        None,
        None,
    )
}

fn envelope(
    addr: Vec<BoardAddress>,
    cmdtype: CommandType,
    subid: Option<u32>,
    cmd: Option<i32>,
) -> OperateRequest {
    OperateRequest {
        kind: ENVELOPE_TYPE,
        data: vec![NodeCommand {
            addr,
            nodedata: NodeData { cmdtype, subid, cmd },
        }],
    }
}

// ── Inbound ──────────────────────────────────────────────────────────

/// A normalized state change for one button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUpdate {
    /// Board address as reported by the gateway.
    pub board: String,
    /// Wire button id (17 and up for regular buttons).
    pub button_id: u32,
    pub state: i32,
}

#[derive(Debug, Deserialize)]
struct UpdateEnvelope {
    addr: WireAddress,
    data: UpdateData,
}

/// Boards usually report a hex string, but numeric ids show up too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireAddress {
    Text(String),
    Number(u64),
}

impl WireAddress {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "stype", rename_all = "lowercase")]
enum UpdateData {
    Single { subid: u32, status: i32 },
    All { status: Vec<i32> },
}

/// Decode one UDP datagram into zero or more state updates.
///
/// Anything that is not UTF-8 JSON in one of the two known shapes is
/// [`Error::MalformedPayload`].
pub fn decode_update(bytes: &[u8]) -> Result<Vec<StateUpdate>, Error> {
    let text = std::str::from_utf8(bytes).map_err(|e| Error::MalformedPayload {
        reason: format!("not UTF-8: {e}"),
        body: String::from_utf8_lossy(bytes).into_owned(),
    })?;

    let envelope: UpdateEnvelope =
        serde_json::from_str(text).map_err(|e| Error::MalformedPayload {
            reason: e.to_string(),
            body: text.to_owned(),
        })?;

    let board = envelope.addr.into_string();

    let updates = match envelope.data {
        UpdateData::Single { subid, status } => vec![StateUpdate {
            board,
            button_id: subid,
            state: status,
        }],
        UpdateData::All { status } => (FIRST_SNAPSHOT_BUTTON_ID..)
            .zip(status)
            .map(|(button_id, state)| StateUpdate {
                board: board.clone(),
                button_id,
                state,
            })
            .collect(),
    };

    Ok(updates)
}
