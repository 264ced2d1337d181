mod frame_gate;
mod stats;


pub use frame_gate::{FaceGateState, FrameGate, GateDecision};
pub use stats::{GateStats, GateStatsSnapshot};
