//! Mutable engine state

use std::sync::Arc;

use fetchkit_http::{AbortController, RawResponse};
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::watch;

use crate::data::Data;
use crate::error::Error;
use crate::view::ResponseHolder;

/// Lifecycle of the owning component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Lifecycle {
    /// Created, not yet mounted
    #[default]
    Created,
    /// Mounted and observed
    Mounted,
    /// Torn down; no further state changes are published
    Unmounted,
}

#[derive(Debug)]
struct Slots {
    loading: bool,
    error: Option<Error>,
    attempt: u32,
    has_more: bool,
    timed_out: bool,
    lifecycle: Lifecycle,
    controller: Option<(u64, AbortController)>,
    next_controller_id: u64,
    dependencies: Option<Vec<Value>>,
}

/// Observable state shared by every clone of an engine
///
/// Writers bump a revision counter that subscribers watch. Once the lifecycle
/// reaches [`Lifecycle::Unmounted`] every setter is a no-op.
#[derive(Debug)]
pub(crate) struct FetchState {
    slots: RwLock<Slots>,
    holder: Arc<ResponseHolder>,
    revision: watch::Sender<u64>,
}

impl FetchState {
    pub(crate) fn new(loading: bool, data: Option<Data>, dependencies: Option<Vec<Value>>) -> Self {
        let holder = Arc::new(ResponseHolder::default());
        holder.set_data(data);
        let (revision, _) = watch::channel(0);

        Self {
            slots: RwLock::new(Slots {
                loading,
                error: None,
                attempt: 0,
                has_more: true,
                timed_out: false,
                lifecycle: Lifecycle::Created,
                controller: None,
                next_controller_id: 0,
                dependencies,
            }),
            holder,
            revision,
        }
    }

    pub(crate) fn holder(&self) -> Arc<ResponseHolder> {
        Arc::clone(&self.holder)
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn publish(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    /// Apply `change` unless unmounted, publishing when it reports a change
    fn update(&self, change: impl FnOnce(&mut Slots) -> bool) {
        let changed = {
            let mut slots = self.slots.write();
            if slots.lifecycle == Lifecycle::Unmounted {
                return;
            }
            change(&mut slots)
        };

        if changed {
            self.publish();
        }
    }

    pub(crate) fn lifecycle(&self) -> Lifecycle {
        self.slots.read().lifecycle
    }

    pub(crate) fn is_mounted(&self) -> bool {
        self.lifecycle() == Lifecycle::Mounted
    }

    pub(crate) fn mount(&self) {
        self.update(|slots| {
            let changed = slots.lifecycle != Lifecycle::Mounted;
            slots.lifecycle = Lifecycle::Mounted;
            changed
        });
    }

    pub(crate) fn unmount(&self) {
        self.slots.write().lifecycle = Lifecycle::Unmounted;
    }

    pub(crate) fn loading(&self) -> bool {
        self.slots.read().loading
    }

    /// Loading only ever turns on while mounted
    pub(crate) fn set_loading(&self, loading: bool) {
        let mounted = self.is_mounted();
        self.update(|slots| {
            if loading && !mounted {
                return false;
            }
            let changed = slots.loading != loading;
            slots.loading = loading;
            changed
        });
    }

    pub(crate) fn error(&self) -> Option<Error> {
        self.slots.read().error.clone()
    }

    pub(crate) fn set_error(&self, error: Option<Error>) {
        self.update(|slots| {
            let changed = slots.error != error;
            slots.error = error;
            changed
        });
    }

    pub(crate) fn data(&self) -> Option<Data> {
        self.holder.data()
    }

    pub(crate) fn set_data(&self, data: Data) {
        let holder = &self.holder;
        self.update(|_| {
            holder.set_data(Some(data));
            true
        });
    }

    pub(crate) fn set_response(&self, response: RawResponse) {
        let holder = &self.holder;
        self.update(|_| {
            holder.set_response(response);
            true
        });
    }

    pub(crate) fn attempt(&self) -> u32 {
        self.slots.read().attempt
    }

    pub(crate) fn set_attempt(&self, attempt: u32) {
        self.update(|slots| {
            slots.attempt = attempt;
            false
        });
    }

    pub(crate) fn has_more(&self) -> bool {
        self.slots.read().has_more
    }

    pub(crate) fn set_has_more(&self, has_more: bool) {
        self.update(|slots| {
            let changed = slots.has_more != has_more;
            slots.has_more = has_more;
            changed
        });
    }

    #[cfg(test)]
    pub(crate) fn timed_out(&self) -> bool {
        self.slots.read().timed_out
    }

    pub(crate) fn set_timed_out(&self, timed_out: bool) {
        self.update(|slots| {
            slots.timed_out = timed_out;
            false
        });
    }

    /// Install the controller guarding the current attempt, returning its id
    pub(crate) fn install_controller(&self, controller: AbortController) -> u64 {
        let mut slots = self.slots.write();
        let id = slots.next_controller_id;
        slots.next_controller_id += 1;
        slots.controller = Some((id, controller));
        id
    }

    /// Drop the controller if it is still the one installed under `id`
    pub(crate) fn release_controller(&self, id: u64) {
        let mut slots = self.slots.write();
        if matches!(&slots.controller, Some((current, _)) if *current == id) {
            slots.controller = None;
        }
    }

    pub(crate) fn controller(&self) -> Option<AbortController> {
        self.slots
            .read()
            .controller
            .as_ref()
            .map(|(_, controller)| controller.clone())
    }

    #[cfg(test)]
    pub(crate) fn dependencies(&self) -> Option<Vec<Value>> {
        self.slots.read().dependencies.clone()
    }

    /// Store `dependencies`, returning whether they differ from the stored ones
    pub(crate) fn replace_dependencies(&self, dependencies: Vec<Value>) -> bool {
        let mut slots = self.slots.write();
        if slots.dependencies.as_ref() == Some(&dependencies) {
            return false;
        }
        slots.dependencies = Some(dependencies);
        true
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_loading_requires_mount() {
        let state = FetchState::new(false, None, None);

        state.set_loading(true);
        assert!(!state.loading());

        state.mount();
        state.set_loading(true);
        assert!(state.loading());
    }

    #[test]
    fn test_unmounted_state_is_frozen() {
        let state = FetchState::new(false, None, None);
        state.mount();
        state.unmount();

        state.set_error(Some(Error::Aborted));
        state.set_data(Data::from("late"));
        state.set_response(RawResponse::new(200, "late"));

        assert_eq!(state.error(), None);
        assert_eq!(state.data(), None);
        assert!(state.holder().response().is_none());
    }

    #[test]
    fn test_changes_bump_revision() {
        let state = FetchState::new(false, None, None);
        let receiver = state.subscribe();
        state.mount();
        state.set_error(Some(Error::Timeout));

        assert_eq!(*receiver.borrow(), 2);

        state.set_error(Some(Error::Timeout));
        assert_eq!(*receiver.borrow(), 2);
    }

    #[test]
    fn test_release_only_own_controller() {
        let state = FetchState::new(false, None, None);
        let first = state.install_controller(AbortController::new());
        let second = state.install_controller(AbortController::new());

        state.release_controller(first);
        assert!(state.controller().is_some());

        state.release_controller(second);
        assert!(state.controller().is_none());
    }

    #[test]
    fn test_dependencies_compare_deeply() {
        let state = FetchState::new(false, None, Some(vec![json!({"a": [1]})]));

        assert!(!state.replace_dependencies(vec![json!({"a": [1]})]));
        assert!(state.replace_dependencies(vec![json!({"a": [2]})]));
        assert_eq!(state.dependencies(), Some(vec![json!({"a": [2]})]));
    }
}
