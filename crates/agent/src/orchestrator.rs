use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::info;

use showroom_core::domain::booking::Booking;
use showroom_core::inventory::InventoryStore;
use showroom_core::ledger::AvailabilityLedger;

use crate::dispatch::{DispatchLimits, DispatchLoop};
use crate::llm::DecisionOracle;
use crate::session::{Session, SessionId, Turn};
use crate::tools::dealership_tools;

/// Owns session lifecycle and routes inbound messages to the dispatch loop.
/// No business logic lives here beyond lifecycle and delegation: the
/// inventory store is never mutated, and booking state is only read through
/// the ledger.
///
/// Messages for one session identifier are serialized through a per-session
/// async mutex; distinct sessions run fully in parallel. The per-session lock
/// is separate from the registry map lock, so resolving a session never
/// blocks on another session's in-flight turn.
pub struct SessionOrchestrator {
    ledger: Arc<AvailabilityLedger>,
    dispatch: DispatchLoop,
    sessions: Mutex<HashMap<String, Arc<tokio::sync::Mutex<Session>>>>,
}

impl SessionOrchestrator {
    pub fn new(
        inventory: Arc<InventoryStore>,
        ledger: Arc<AvailabilityLedger>,
        oracle: Arc<dyn DecisionOracle>,
        limits: DispatchLimits,
    ) -> Self {
        let tools = Arc::new(dealership_tools(inventory, Arc::clone(&ledger)));
        Self {
            ledger,
            dispatch: DispatchLoop::new(oracle, tools, limits),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Resolves a session by its case-sensitive identifier, creating it on
    /// first use.
    fn resolve_session(&self, session_id: &str) -> Arc<tokio::sync::Mutex<Session>> {
        let mut sessions = self.sessions.lock().expect("session map lock poisoned");
        if let Some(existing) = sessions.get(session_id) {
            return Arc::clone(existing);
        }

        info!(
            event_name = "agent.orchestrator.session_created",
            session_id = %session_id,
            "new session created"
        );
        let created =
            Arc::new(tokio::sync::Mutex::new(Session::new(SessionId(session_id.to_string()))));
        sessions.insert(session_id.to_string(), Arc::clone(&created));
        created
    }

    /// Processes one message for one session and returns the reply. A second
    /// message for the same session waits for the first turn to finish.
    pub async fn process(&self, session_id: &str, text: &str) -> String {
        let session = self.resolve_session(session_id);
        let mut session = session.lock().await;
        self.dispatch.run_turn(&mut session, text).await
    }

    /// All bookings made during this process lifetime, creation order.
    pub fn bookings(&self) -> Vec<Booking> {
        self.ledger.bookings()
    }

    /// Snapshot of a session's transcript, if the session exists.
    pub async fn transcript(&self, session_id: &str) -> Option<Vec<Turn>> {
        let session = {
            let sessions = self.sessions.lock().expect("session map lock poisoned");
            sessions.get(session_id).cloned()
        }?;
        let session = session.lock().await;
        Some(session.transcript().to_vec())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().expect("session map lock poisoned").len()
    }
}
