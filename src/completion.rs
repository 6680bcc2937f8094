//! Deferred completions for the single-threaded update loop.
//!
//! A [`Handle`] is written once by its producer (the texture cache, the atlas
//! packer) and read by any number of consumers. A [`Completion`] joins handles
//! into a plain "done yet?" signal. Nothing here blocks or spawns threads; the
//! frame loop polls.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::ResourceError;

#[derive(Clone, Debug, PartialEq)]
pub enum LoadState<T> {
    Loading,
    Loaded(T),
    Failed(ResourceError),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Status {
    Pending,
    Done,
    Failed(ResourceError),
}

/// Shared write-once slot for a deferred value.
#[derive(Debug)]
pub struct Handle<T> {
    slot: Rc<RefCell<LoadState<T>>>,
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self { slot: Rc::clone(&self.slot) }
    }
}

impl<T: Clone + 'static> Handle<T> {
    pub fn pending() -> Self {
        Self { slot: Rc::new(RefCell::new(LoadState::Loading)) }
    }

    pub fn ready(value: T) -> Self {
        Self { slot: Rc::new(RefCell::new(LoadState::Loaded(value))) }
    }

    pub fn failed(err: ResourceError) -> Self {
        Self { slot: Rc::new(RefCell::new(LoadState::Failed(err))) }
    }

    /// Settle the slot. A handle settles once; later calls are ignored.
    pub(crate) fn resolve(&self, result: Result<T, ResourceError>) {
        let mut slot = self.slot.borrow_mut();
        if !matches!(*slot, LoadState::Loading) {
            return;
        }
        *slot = match result {
            Ok(v) => LoadState::Loaded(v),
            Err(e) => LoadState::Failed(e),
        };
    }

    pub fn state(&self) -> LoadState<T> {
        self.slot.borrow().clone()
    }

    pub fn get(&self) -> Option<T> {
        match &*self.slot.borrow() {
            LoadState::Loaded(v) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.slot.borrow(), LoadState::Loading)
    }

    pub fn error(&self) -> Option<ResourceError> {
        match &*self.slot.borrow() {
            LoadState::Failed(e) => Some(e.clone()),
            _ => None,
        }
    }

    /// Erase the value type, keeping only the settle signal.
    pub fn completion(&self) -> Completion {
        Completion { parts: vec![Rc::clone(&self.slot) as Rc<dyn Settle>] }
    }
}

trait Settle {
    fn status(&self) -> Status;
}

impl<T> Settle for RefCell<LoadState<T>> {
    fn status(&self) -> Status {
        match &*self.borrow() {
            LoadState::Loading => Status::Pending,
            LoadState::Loaded(_) => Status::Done,
            LoadState::Failed(e) => Status::Failed(e.clone()),
        }
    }
}

/// Joined settle signal over zero or more handles.
#[derive(Clone, Default)]
pub struct Completion {
    parts: Vec<Rc<dyn Settle>>,
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("parts", &self.parts.len())
            .field("status", &self.status())
            .finish()
    }
}

impl Completion {
    /// Already settled.
    pub fn done() -> Self {
        Self::default()
    }

    pub fn join(parts: impl IntoIterator<Item = Completion>) -> Self {
        Self { parts: parts.into_iter().flat_map(|c| c.parts).collect() }
    }

    /// First failure wins, then any pending part keeps the whole pending.
    pub fn status(&self) -> Status {
        let mut pending = false;
        for part in &self.parts {
            match part.status() {
                Status::Failed(e) => return Status::Failed(e),
                Status::Pending => pending = true,
                Status::Done => {}
            }
        }
        if pending { Status::Pending } else { Status::Done }
    }

    pub fn is_done(&self) -> bool {
        self.status() == Status::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_settles_only_once() {
        let h: Handle<u32> = Handle::pending();
        h.resolve(Ok(7));
        h.resolve(Err(ResourceError::load_failure("x", "late")));
        assert_eq!(h.get(), Some(7));
    }

    #[test]
    fn clones_observe_the_same_slot() {
        let h: Handle<u32> = Handle::pending();
        let c = h.clone();
        assert!(c.is_pending());
        h.resolve(Ok(1));
        assert_eq!(c.get(), Some(1));
    }

    #[test]
    fn joined_completion_waits_for_every_part() {
        let a: Handle<u8> = Handle::pending();
        let b: Handle<u8> = Handle::pending();
        let joined = Completion::join([a.completion(), b.completion()]);
        assert_eq!(joined.status(), Status::Pending);
        a.resolve(Ok(0));
        assert_eq!(joined.status(), Status::Pending);
        b.resolve(Ok(0));
        assert!(joined.is_done());
    }

    #[test]
    fn failure_dominates_pending() {
        let a: Handle<u8> = Handle::pending();
        let b: Handle<u8> = Handle::failed(ResourceError::load_failure("b.png", "404"));
        let joined = Completion::join([a.completion(), b.completion()]);
        assert!(matches!(joined.status(), Status::Failed(_)));
    }

    #[test]
    fn empty_completion_is_done() {
        assert!(Completion::done().is_done());
        assert!(Completion::join(Vec::new()).is_done());
    }
}
