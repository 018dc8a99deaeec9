#![forbid(unsafe_code)]

//! Error value carried on a stream's error channel.

use std::error::Error;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

/// Plain-text error used by [`StreamError::msg`].
#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

/// A cloneable, type-erased error delivered to observers.
///
/// Errors are shared (`Rc`) because one failure fans out to every observer
/// of the stream that carried it.
#[derive(Clone)]
pub struct StreamError {
    inner: Rc<dyn Error + 'static>,
}

impl StreamError {
    /// Wrap an arbitrary error.
    pub fn new<E: Error + 'static>(err: E) -> Self {
        Self {
            inner: Rc::new(err),
        }
    }

    /// Create an error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Message(message.into()))
    }

    /// The wrapped error.
    #[must_use]
    pub fn get(&self) -> &(dyn Error + 'static) {
        &*self.inner
    }

    /// Downcast to the concrete error type, if it matches.
    #[must_use]
    pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    /// Whether both handles refer to the same error instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StreamError").field(&self.inner).finish()
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}
