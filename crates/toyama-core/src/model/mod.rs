// ── Domain model ──
//
// The device record is owned by whatever catalog loaded it; core only reads
// its addressing fields and writes `state`.

pub mod device;
pub mod speed;

pub use device::{Device, DeviceType};
pub use speed::FanSpeed;
