/// Visibility-gated live state polling
///
/// The settings view only needs live values while it is on screen. Becoming
/// visible starts one refresh; becoming invisible drops interest in whatever
/// is still outstanding. Every request carries the generation it was issued
/// under and completions from an older generation are discarded, so a late
/// answer never lands on a view the user has already left.
use crate::live_state::{LiveSnapshot, LiveStateClient};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Invisible,
    Visible,
}

#[derive(Debug)]
struct InFlight {
    generation: u64,
    abort: Option<AbortHandle>,
}

#[derive(Debug)]
struct PollState {
    visibility: Visibility,
    generation: u64,
    in_flight: Option<InFlight>,
    snapshot: LiveSnapshot,
    last_updated: Option<DateTime<Utc>>,
}

/// Ticket for a request started with `begin_request`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    generation: u64,
}

pub struct PollController<C> {
    client: Arc<C>,
    state: Arc<Mutex<PollState>>,
}

impl<C> Clone for PollController<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            state: self.state.clone(),
        }
    }
}

impl<C: LiveStateClient> PollController<C> {
    pub fn new(client: C) -> Self {
        Self {
            client: Arc::new(client),
            state: Arc::new(Mutex::new(PollState {
                visibility: Visibility::Invisible,
                generation: 0,
                in_flight: None,
                snapshot: LiveSnapshot::default(),
                last_updated: None,
            })),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Host view became visible. Spawns a refresh on the current Tokio
    /// runtime unless one is already outstanding.
    pub fn on_visible(&self) -> Option<JoinHandle<()>> {
        self.lock().visibility = Visibility::Visible;

        let ticket = self.begin_request()?;
        let client = self.client.clone();
        let controller = self.clone();

        let handle = tokio::spawn(async move {
            let snapshot = client.snapshot().await;
            controller.complete_request(ticket, snapshot);
        });

        let mut state = self.lock();
        if let Some(in_flight) = state.in_flight.as_mut() {
            if in_flight.generation == ticket.generation {
                in_flight.abort = Some(handle.abort_handle());
            }
        }
        Some(handle)
    }

    /// Host view went away. Anything still outstanding is abandoned.
    pub fn on_invisible(&self) {
        let mut state = self.lock();
        state.visibility = Visibility::Invisible;
        state.generation += 1;

        if let Some(in_flight) = state.in_flight.take() {
            debug!(generation = in_flight.generation, "Abandoning live state request");
            if let Some(abort) = in_flight.abort {
                abort.abort();
            }
        }
    }

    /// Whether a tap on the summary should be forwarded to the view
    pub fn on_tap(&self) -> bool {
        self.is_visible()
    }

    /// Reserve the single request slot.
    ///
    /// Returns `None` while invisible or when a request is already
    /// outstanding. Hosts that run their own event loop pair this with
    /// `complete_request`; `on_visible` does both on Tokio.
    pub fn begin_request(&self) -> Option<RequestTicket> {
        let mut state = self.lock();
        if state.visibility != Visibility::Visible {
            return None;
        }
        if let Some(in_flight) = &state.in_flight {
            debug!(generation = in_flight.generation, "Live state request already outstanding");
            return None;
        }

        let generation = state.generation;
        state.in_flight = Some(InFlight {
            generation,
            abort: None,
        });
        Some(RequestTicket { generation })
    }

    /// Deliver a response. Returns whether the snapshot was replaced.
    pub fn complete_request(&self, ticket: RequestTicket, snapshot: LiveSnapshot) -> bool {
        let mut state = self.lock();

        if state
            .in_flight
            .as_ref()
            .is_some_and(|f| f.generation == ticket.generation)
        {
            state.in_flight = None;
        }

        if ticket.generation != state.generation || state.visibility != Visibility::Visible {
            debug!(
                issued = ticket.generation,
                current = state.generation,
                "Discarding stale live state response"
            );
            return false;
        }

        state.snapshot = snapshot;
        state.last_updated = Some(Utc::now());
        true
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        self.lock().snapshot.clone()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.lock().last_updated
    }

    pub fn visibility(&self) -> Visibility {
        self.lock().visibility
    }

    pub fn is_visible(&self) -> bool {
        self.visibility() == Visibility::Visible
    }

    pub fn in_flight(&self) -> bool {
        self.lock().in_flight.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, PollState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live_state::{Live, MockLiveState};

    fn governor(name: &str) -> LiveSnapshot {
        LiveSnapshot {
            governor: Live::Value(name.to_string()),
            ..LiveSnapshot::default()
        }
    }

    #[test]
    fn test_starts_invisible() {
        let controller = PollController::new(MockLiveState::typical());
        assert_eq!(controller.visibility(), Visibility::Invisible);
        assert!(controller.begin_request().is_none());
        assert!(!controller.on_tap());
        assert!(controller.last_updated().is_none());
    }

    #[test]
    fn test_single_request_slot() {
        let controller = PollController::new(MockLiveState::typical());
        controller.lock().visibility = Visibility::Visible;

        let ticket = controller.begin_request().unwrap();
        assert!(controller.begin_request().is_none());

        assert!(controller.complete_request(ticket, governor("performance")));
        assert!(!controller.in_flight());
        assert!(controller.begin_request().is_some());
    }

    #[test]
    fn test_stale_ticket_discarded() {
        let controller = PollController::new(MockLiveState::typical());
        controller.lock().visibility = Visibility::Visible;
        let old = controller.begin_request().unwrap();

        controller.on_invisible();
        controller.lock().visibility = Visibility::Visible;
        let fresh = controller.begin_request().unwrap();

        assert!(!controller.complete_request(old, governor("stale")));
        assert_eq!(controller.snapshot(), LiveSnapshot::default());
        // The newer request still owns the slot
        assert!(controller.in_flight());

        assert!(controller.complete_request(fresh, governor("fresh")));
        assert_eq!(controller.snapshot().governor, Live::Value("fresh".to_string()));
    }

    #[tokio::test]
    async fn test_visible_refreshes_snapshot() {
        let controller = PollController::new(MockLiveState::typical());
        let handle = controller.on_visible().unwrap();
        handle.await.unwrap();

        assert_eq!(controller.snapshot(), MockLiveState::typical().values);
        assert!(controller.last_updated().is_some());
        assert!(controller.on_tap());
    }

    #[tokio::test]
    async fn test_rapid_visible_signals_one_request() {
        let (mock, gate) = MockLiveState::gated(governor("ondemand"));
        let controller = PollController::new(mock);

        let handle = controller.on_visible().unwrap();
        assert!(controller.on_visible().is_none());
        assert!(controller.on_visible().is_none());
        tokio::task::yield_now().await;
        assert_eq!(controller.client().request_count(), 1);

        gate.notify_one();
        handle.await.unwrap();
        assert_eq!(controller.snapshot().governor, Live::Value("ondemand".to_string()));
    }

    #[tokio::test]
    async fn test_invisible_abandons_request() {
        let (mock, gate) = MockLiveState::gated(governor("performance"));
        let controller = PollController::new(mock);

        let handle = controller.on_visible().unwrap();
        tokio::task::yield_now().await;
        controller.on_invisible();
        gate.notify_one();

        assert!(handle.await.unwrap_err().is_cancelled());
        assert_eq!(controller.snapshot(), LiveSnapshot::default());
        assert!(!controller.in_flight());
    }
}
