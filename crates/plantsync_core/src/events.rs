//! Component change notifications.
//!
//! The core publishes "component changed" events on a plain channel; the
//! presentation layer owns the receiving end. Nothing in core depends on a
//! concrete listener type.

use crate::model::component::ComponentId;
use crate::model::reference::ObjectRef;
use std::sync::mpsc::{channel, Receiver, Sender};

/// What happened to a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Component was created or refreshed by a restore.
    Restored,
    /// Figure geometry was recomputed (e.g. after a scale change).
    FigureUpdated,
    /// Component state was written to a store or backend.
    Persisted,
}

/// One published change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub component: ComponentId,
    pub reference: ObjectRef,
    pub kind: ChangeKind,
}

/// Sending half of the change channel.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    sender: Sender<ChangeEvent>,
}

impl ChangeNotifier {
    /// Creates a notifier and the receiver a presentation layer listens on.
    pub fn channel() -> (Self, Receiver<ChangeEvent>) {
        let (sender, receiver) = channel();
        (Self { sender }, receiver)
    }

    /// Publishes one event. A dropped receiver is not an error.
    pub fn publish(&self, component: ComponentId, reference: ObjectRef, kind: ChangeKind) {
        let _ = self.sender.send(ChangeEvent {
            component,
            reference,
            kind,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{ChangeKind, ChangeNotifier};
    use crate::model::reference::ObjectRef;
    use uuid::Uuid;

    #[test]
    fn publishes_to_receiver_in_order() {
        let (notifier, receiver) = ChangeNotifier::channel();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        notifier.publish(first, ObjectRef::point("P1"), ChangeKind::Restored);
        notifier.publish(second, ObjectRef::point("P2"), ChangeKind::Persisted);

        let events: Vec<_> = receiver.try_iter().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].component, first);
        assert_eq!(events[1].kind, ChangeKind::Persisted);
    }

    #[test]
    fn publish_after_receiver_drop_is_ignored() {
        let (notifier, receiver) = ChangeNotifier::channel();
        drop(receiver);
        notifier.publish(Uuid::new_v4(), ObjectRef::point("P1"), ChangeKind::Restored);
    }
}
