//! Narrow interfaces to the platform collaborators the core depends on.

mod classifier;
mod clock;
mod id;
mod presence;
mod scripted;

pub use classifier::{ClassifierFactory, ClassifierPort, FallbackClassifier};
pub use clock::{ClockPort, FixedClock, SystemClock};
pub use id::{IdPort, SequentialIds, UuidIdGenerator};
pub use presence::FacePresencePort;
pub use scripted::{PortProbe, ScriptedClassifier, ScriptedPresence};
