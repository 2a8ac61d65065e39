//! Transport-time mutation of outbound messages.
//!
//! Decorators live in a [`DecoratorRegistry`] owned by the transport layer. A
//! message only records [`DecoratorHandle`]s, and
//! [`SipMessage::call_outbound_decorators`] resolves them against the
//! registry right before the message is written, once per send attempt.

use std::fmt;
use std::sync::Arc;

use crate::protocol::{SipMessage, Tuple};

/// A mutator run on a message immediately before it is sent.
///
/// Decorators can't fail: errors are theirs to log or ignore.
#[cfg_attr(test, mockall::automock)]
pub trait OutboundDecorator: Send + Sync {
    fn decorate(&self, message: &mut SipMessage, source: &Tuple, destination: &Tuple);
}

impl<F> OutboundDecorator for F
where
    F: Fn(&mut SipMessage, &Tuple, &Tuple) + Send + Sync,
{
    fn decorate(&self, message: &mut SipMessage, source: &Tuple, destination: &Tuple) {
        (self)(message, source, destination);
    }
}

/// Index of a decorator inside a [`DecoratorRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecoratorHandle(usize);

impl DecoratorHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Owns decorators; messages refer to them by handle.
#[derive(Clone, Default)]
pub struct DecoratorRegistry {
    decorators: Vec<Arc<dyn OutboundDecorator>>,
}

impl DecoratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<D: OutboundDecorator + 'static>(&mut self, decorator: D) -> DecoratorHandle {
        self.register_arc(Arc::new(decorator))
    }

    pub fn register_arc(&mut self, decorator: Arc<dyn OutboundDecorator>) -> DecoratorHandle {
        self.decorators.push(decorator);
        DecoratorHandle(self.decorators.len() - 1)
    }

    pub fn get(&self, handle: DecoratorHandle) -> Option<&Arc<dyn OutboundDecorator>> {
        self.decorators.get(handle.0)
    }

    pub fn len(&self) -> usize {
        self.decorators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decorators.is_empty()
    }
}

impl fmt::Debug for DecoratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoratorRegistry").field("decorators", &self.decorators.len()).finish()
    }
}
