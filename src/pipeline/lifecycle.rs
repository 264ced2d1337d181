use crate::ports::{ClassifierPort, FacePresencePort};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub(crate) type SharedClassifier = Arc<Mutex<Box<dyn ClassifierPort>>>;
pub(crate) type SharedPresence = Arc<Mutex<Box<dyn FacePresencePort>>>;

/// Where the model resources are in their life
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceLifecycle {
    /// Loaded; a teardown will release them
    Active,
    /// Loaded and kept across the next teardown (screen hidden, not destroyed)
    Suspended,
    /// Closed for good
    Released,
}

/// Classifier and face presence handles.
///
/// Each handle sits behind its own mutex, so at most one call per port runs
/// at any moment.
pub(crate) struct ModelResources {
    classifier: SharedClassifier,
    presence: SharedPresence,
}

impl ModelResources {
    pub(crate) fn new(
        classifier: Box<dyn ClassifierPort>,
        presence: Box<dyn FacePresencePort>,
    ) -> Self {
        Self {
            classifier: Arc::new(Mutex::new(classifier)),
            presence: Arc::new(Mutex::new(presence)),
        }
    }

    /// Blocks until any in-flight call on either port has returned.
    /// Only reachable through [`ResourceSlot::take_for_release`].
    pub(crate) fn close(self) {
        let mut classifier = self.classifier.lock();
        debug!("Closing classifier '{}'", classifier.name());
        classifier.close();
        drop(classifier);

        self.presence.lock().close();
        debug!("Face presence detector closed");
    }
}

/// Ownership slot for the model resources, one per pipeline
pub(crate) enum ResourceSlot {
    Active(ModelResources),
    Suspended(ModelResources),
    Released,
}

impl ResourceSlot {
    pub(crate) fn lifecycle(&self) -> ResourceLifecycle {
        match self {
            ResourceSlot::Active(_) => ResourceLifecycle::Active,
            ResourceSlot::Suspended(_) => ResourceLifecycle::Suspended,
            ResourceSlot::Released => ResourceLifecycle::Released,
        }
    }

    fn resources(&self) -> Option<&ModelResources> {
        match self {
            ResourceSlot::Active(resources) | ResourceSlot::Suspended(resources) => Some(resources),
            ResourceSlot::Released => None,
        }
    }

    pub(crate) fn classifier(&self) -> Option<SharedClassifier> {
        self.resources().map(|r| Arc::clone(&r.classifier))
    }

    pub(crate) fn presence(&self) -> Option<SharedPresence> {
        self.resources().map(|r| Arc::clone(&r.presence))
    }

    /// Active -> Suspended; returns whether the slot changed
    pub(crate) fn suspend(&mut self) -> bool {
        match std::mem::replace(self, ResourceSlot::Released) {
            ResourceSlot::Active(resources) => {
                *self = ResourceSlot::Suspended(resources);
                true
            }
            other => {
                *self = other;
                false
            }
        }
    }

    /// Suspended -> Active; returns whether the slot changed
    pub(crate) fn resume(&mut self) -> bool {
        match std::mem::replace(self, ResourceSlot::Released) {
            ResourceSlot::Suspended(resources) => {
                *self = ResourceSlot::Active(resources);
                true
            }
            other => {
                *self = other;
                false
            }
        }
    }

    /// Move to `Released`, handing back the resources that must be closed
    pub(crate) fn take_for_release(&mut self) -> Option<ModelResources> {
        match std::mem::replace(self, ResourceSlot::Released) {
            ResourceSlot::Active(resources) | ResourceSlot::Suspended(resources) => {
                Some(resources)
            }
            ResourceSlot::Released => None,
        }
    }
}
