pub mod driver;
pub mod pcap_engine;
pub mod protocol;

pub use driver::{CaptureCounters, CaptureDriver, CaptureHandle, CaptureSnapshot, PacketSource};
pub use pcap_engine::{decode_frame, CaptureError, CapturedFrame, LinkLayer, PcapEngine};
pub use protocol::{classify, Transport};
