//! Property Listeners
//!
//! Listener registration is an explicit scoped resource: `ListenerRegistry::add`
//! hands out a `PropertyListener`, and the caller releases it with
//! `ListenerRegistry::remove`. Handles still outstanding when the registry is
//! swept or dropped are removed from the HAL at that point.
//!
//! # Delivery
//!
//! Without a queue, callbacks run on whatever thread the HAL notifies on.
//! A `NotificationQueue` moves them onto one named worker thread, in order.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{HalError, HalResult};
use crate::hal::{Hal, ListenerCallback, ListenerToken};
use crate::types::{AudioObjectId, OsStatus, PropertyAddress};

/// Caller-side listener callback
pub type AddressCallback = Arc<dyn Fn(&[PropertyAddress]) + Send + Sync>;

type Job = Box<dyn FnOnce() + Send>;

enum Task {
    Run(Job),
    Stop,
}

/// Serial execution queue backed by one worker thread
pub struct NotificationQueue {
    name: String,
    sender: Sender<Task>,
    worker: Option<JoinHandle<()>>,
}

impl NotificationQueue {
    pub fn new(name: &str) -> io::Result<Self> {
        let (sender, receiver) = unbounded::<Task>();
        let thread_name = name.to_string();

        let worker = thread::Builder::new().name(name.into()).spawn(move || {
            while let Ok(task) = receiver.recv() {
                match task {
                    Task::Run(job) => {
                        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            warn!("Listener callback panicked on queue '{}'", thread_name);
                        }
                    }
                    Task::Stop => break,
                }
            }
        })?;

        debug!("Notification queue '{}' started", name);
        Ok(Self {
            name: name.to_string(),
            sender,
            worker: Some(worker),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue a job; returns false once the worker has stopped
    pub fn dispatch<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender.send(Task::Run(Box::new(job))).is_ok()
    }

    fn sender(&self) -> Sender<Task> {
        self.sender.clone()
    }
}

impl Drop for NotificationQueue {
    fn drop(&mut self) {
        let _ = self.sender.send(Task::Stop);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
        debug!("Notification queue '{}' stopped", self.name);
    }
}

struct ListenerEntry {
    token: ListenerToken,
    object: AudioObjectId,
    address: PropertyAddress,
    active: Arc<AtomicBool>,
    /// Held across the HAL call so concurrent removals see its real outcome
    removal: Mutex<()>,
}

/// Handle to one registered listener
#[derive(Clone)]
pub struct PropertyListener {
    entry: Arc<ListenerEntry>,
}

impl PropertyListener {
    pub fn is_active(&self) -> bool {
        self.entry.active.load(Ordering::SeqCst)
    }

    pub fn object(&self) -> AudioObjectId {
        self.entry.object
    }

    pub fn address(&self) -> PropertyAddress {
        self.entry.address
    }
}

impl std::fmt::Debug for PropertyListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyListener")
            .field("token", &self.entry.token)
            .field("object", &self.entry.object)
            .field("address", &self.entry.address)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Owner of every listener registered through it
pub struct ListenerRegistry {
    hal: Arc<dyn Hal>,
    entries: Mutex<Vec<Arc<ListenerEntry>>>,
}

impl ListenerRegistry {
    pub fn new(hal: Arc<dyn Hal>) -> Self {
        Self {
            hal,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn hal(&self) -> &Arc<dyn Hal> {
        &self.hal
    }

    /// Register `callback` for changes of `address` on `object`
    ///
    /// Notifications with an empty address list are dropped, as are
    /// notifications that arrive after the listener was removed.
    pub fn add(
        &self,
        object: AudioObjectId,
        address: PropertyAddress,
        queue: Option<&NotificationQueue>,
        callback: AddressCallback,
    ) -> HalResult<PropertyListener> {
        let active = Arc::new(AtomicBool::new(true));
        let gate = active.clone();

        let deliver: ListenerCallback = match queue {
            Some(queue) => {
                let sender = queue.sender();
                Arc::new(move |_object: AudioObjectId, addresses: &[PropertyAddress]| {
                    if addresses.is_empty() || !gate.load(Ordering::SeqCst) {
                        return;
                    }
                    let addresses = addresses.to_vec();
                    let callback = callback.clone();
                    let gate = gate.clone();
                    let _ = sender.send(Task::Run(Box::new(move || {
                        if gate.load(Ordering::SeqCst) {
                            callback(&addresses);
                        }
                    })));
                })
            }
            None => Arc::new(move |_object: AudioObjectId, addresses: &[PropertyAddress]| {
                if addresses.is_empty() || !gate.load(Ordering::SeqCst) {
                    return;
                }
                callback(addresses);
            }),
        };

        let token = self
            .hal
            .add_listener(object, &address, deliver)
            .map_err(HalError::Os)?;

        let entry = Arc::new(ListenerEntry {
            token,
            object,
            address,
            active,
            removal: Mutex::new(()),
        });
        self.entries.lock().push(entry.clone());

        debug!("Listener {:?} added on @{}", token, object);
        Ok(PropertyListener { entry })
    }

    /// Remove a listener; removing an already removed listener succeeds
    ///
    /// A listener whose HAL removal fails stays registered and active, so the
    /// call can be retried.
    pub fn remove(&self, listener: &PropertyListener) -> HalResult<()> {
        match self.release(&listener.entry) {
            Ok(_) => Ok(()),
            Err(status) => {
                warn!("Failed to remove listener {:?}: status {}", listener.entry.token, status);
                Err(HalError::Os(status))
            }
        }
    }

    /// Remove every outstanding listener, returning how many were removed
    ///
    /// Listeners the HAL refuses to remove stay tracked for a later sweep.
    pub fn sweep(&self) -> usize {
        let outstanding: Vec<Arc<ListenerEntry>> = self.entries.lock().clone();
        let mut removed = 0;
        for entry in outstanding {
            match self.release(&entry) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(status) => {
                    warn!("Sweep could not remove listener {:?}: status {}", entry.token, status)
                }
            }
        }
        removed
    }

    /// Returns whether this call removed the listener from the HAL
    fn release(&self, entry: &Arc<ListenerEntry>) -> Result<bool, OsStatus> {
        let _removal = entry.removal.lock();
        if !entry.active.load(Ordering::SeqCst) {
            return Ok(false);
        }

        self.hal.remove_listener(entry.token)?;
        entry.active.store(false, Ordering::SeqCst);
        self.entries.lock().retain(|e| !Arc::ptr_eq(e, entry));
        debug!("Listener {:?} removed from @{}", entry.token, entry.object);
        Ok(true)
    }

    /// Number of outstanding listeners
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Drop for ListenerRegistry {
    fn drop(&mut self) {
        let removed = self.sweep();
        if removed > 0 {
            debug!("Swept {} outstanding listeners", removed);
        }
        let leaked = self.entries.get_mut().len();
        if leaked > 0 {
            warn!("{} listeners could not be removed before teardown", leaked);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulatedHal;
    use crate::types::{fourcc, status};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    const DEVICE: AudioObjectId = 40;

    fn setup() -> (Arc<SimulatedHal>, ListenerRegistry) {
        let hal = Arc::new(SimulatedHal::new());
        hal.add_object(DEVICE, fourcc(b"adev"), 1, "Device");
        hal.set_scalar(DEVICE, PropertyAddress::any(fourcc(b"nsrt")), 44100.0f64, true);
        let registry = ListenerRegistry::new(hal.clone());
        (hal, registry)
    }

    fn counter() -> (Arc<AtomicUsize>, AddressCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let callback: AddressCallback = Arc::new(move |_addresses: &[PropertyAddress]| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (count, callback)
    }

    #[test]
    fn test_notification_reaches_callback() {
        let (hal, registry) = setup();
        let (count, callback) = counter();
        let address = PropertyAddress::any(fourcc(b"nsrt"));

        let listener = registry.add(DEVICE, address, None, callback).unwrap();
        hal.notify(DEVICE, &[address]);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        registry.remove(&listener).unwrap();
        hal.notify(DEVICE, &[address]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_notifications_are_dropped() {
        let (hal, registry) = setup();
        let (count, callback) = counter();
        let _listener = registry
            .add(DEVICE, PropertyAddress::any(fourcc(b"nsrt")), None, callback)
            .unwrap();

        hal.notify(DEVICE, &[]);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_remove_twice_succeeds() {
        let (hal, registry) = setup();
        let (_count, callback) = counter();
        let listener = registry
            .add(DEVICE, PropertyAddress::any(fourcc(b"nsrt")), None, callback)
            .unwrap();

        assert!(registry.remove(&listener).is_ok());
        assert!(registry.remove(&listener).is_ok());
        assert!(!listener.is_active());
        assert_eq!(hal.listener_count(), 0);
    }

    #[test]
    fn test_failed_remove_can_be_retried() {
        let (hal, registry) = setup();
        let (count, callback) = counter();
        let address = PropertyAddress::any(fourcc(b"nsrt"));
        let listener = registry.add(DEVICE, address, None, callback).unwrap();

        hal.refuse_listener_removals(status::UNSPECIFIED, 1);
        assert_eq!(registry.remove(&listener), Err(HalError::Os(status::UNSPECIFIED)));
        assert!(listener.is_active());
        assert_eq!(registry.len(), 1);

        // Still registered, so notifications keep arriving
        hal.notify(DEVICE, &[address]);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(registry.remove(&listener).is_ok());
        assert!(!listener.is_active());
        assert_eq!(hal.listener_count(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_sweep_keeps_listeners_the_hal_refused() {
        let (hal, registry) = setup();
        let (_count, callback) = counter();
        let listener = registry
            .add(DEVICE, PropertyAddress::any(fourcc(b"nsrt")), None, callback)
            .unwrap();

        hal.refuse_listener_removals(status::UNSPECIFIED, 1);
        assert_eq!(registry.sweep(), 0);
        assert_eq!(registry.len(), 1);
        assert_eq!(hal.listener_count(), 1);
        assert!(listener.is_active());

        assert_eq!(registry.sweep(), 1);
        assert!(registry.is_empty());
        assert_eq!(hal.listener_count(), 0);
        assert!(registry.remove(&listener).is_ok());
    }

    #[test]
    fn test_concurrent_removes_see_the_real_outcome() {
        let (hal, registry) = setup();
        let registry = Arc::new(registry);
        let (_count, callback) = counter();
        let listener = registry
            .add(DEVICE, PropertyAddress::any(fourcc(b"nsrt")), None, callback)
            .unwrap();

        // The first removal to reach the HAL fails; the other must not report success for it
        hal.refuse_listener_removals(status::UNSPECIFIED, 1);
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let registry = registry.clone();
                let listener = listener.clone();
                thread::spawn(move || registry.remove(&listener))
            })
            .collect();
        let results: Vec<HalResult<()>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(!listener.is_active());
        assert_eq!(hal.listener_count(), 0);
    }

    #[test]
    fn test_add_on_unknown_object_fails() {
        let (_hal, registry) = setup();
        let (_count, callback) = counter();
        let result = registry.add(999, PropertyAddress::any(fourcc(b"nsrt")), None, callback);
        assert!(matches!(result, Err(HalError::Os(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_drop_sweeps_outstanding_listeners() {
        let (hal, registry) = setup();
        for _ in 0..3 {
            let (_count, callback) = counter();
            registry
                .add(DEVICE, PropertyAddress::any(fourcc(b"nsrt")), None, callback)
                .unwrap();
        }
        assert_eq!(registry.len(), 3);
        assert_eq!(hal.listener_count(), 3);

        drop(registry);
        assert_eq!(hal.listener_count(), 0);
    }

    #[test]
    fn test_queue_delivers_on_worker_thread() {
        let (hal, registry) = setup();
        let queue = NotificationQueue::new("halscope-test-listener").unwrap();
        let (tx, rx) = crossbeam_channel::bounded(1);
        let callback: AddressCallback = Arc::new(move |addresses: &[PropertyAddress]| {
            let name = thread::current().name().map(str::to_string);
            let _ = tx.send((addresses.len(), name));
        });
        let address = PropertyAddress::any(fourcc(b"nsrt"));

        let _listener = registry.add(DEVICE, address, Some(&queue), callback).unwrap();
        hal.notify(DEVICE, &[address]);

        let (count, name) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(count, 1);
        assert_eq!(name.as_deref(), Some("halscope-test-listener"));
    }

    #[test]
    fn test_queue_survives_panicking_job() {
        let queue = NotificationQueue::new("halscope-test-panic").unwrap();
        let (tx, rx) = crossbeam_channel::bounded(1);
        assert!(queue.dispatch(|| panic!("boom")));
        assert!(queue.dispatch(move || {
            let _ = tx.send(7);
        }));
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok(7));
    }
}
