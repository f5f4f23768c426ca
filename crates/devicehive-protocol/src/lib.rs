//! Binary frame codec, payload registry, and transceiver used by the XBee
//! style gateway transport. Has no knowledge of the DeviceHive entity model
//! or either network service — it only turns bytes into frames and back.

pub mod frame;
pub mod payload;
pub mod transceiver;

pub use frame::{Frame, ParseOutcome, SimpleFrame, XBeeFrame};
pub use payload::XbeePayload;
pub use transceiver::{Transceiver, TransceiverConfig, TransceiverError};
