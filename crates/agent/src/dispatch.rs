use std::sync::Arc;

use tracing::{info, warn};

use crate::llm::{Decision, DecisionOracle, ToolCall};
use crate::session::Session;
use crate::tools::ToolRegistry;

/// Per-turn guard rails for the dispatch loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchLimits {
    /// Ceiling on oracle-requested tool calls within one user message.
    pub max_tool_calls: u32,
}

impl Default for DispatchLimits {
    fn default() -> Self {
        Self { max_tool_calls: 6 }
    }
}

/// Reply used when the oracle transport fails. The turn ends, the session
/// stays usable.
const ORACLE_FAILURE_REPLY: &str =
    "I'm sorry, I'm having trouble responding right now. Could you try again in a moment?";

/// Reply used when the oracle keeps requesting tools past the per-turn budget.
const TOOL_BUDGET_REPLY: &str =
    "I'm sorry, I wasn't able to finish that request. Could you rephrase or simplify it?";

/// Turn-level state machine: `AwaitingDecision` consults the oracle,
/// `ExecutingTools` runs the requested calls and feeds results back, and
/// `Responding` appends the final text. Fatal oracle failure short-circuits
/// straight to `Responding` with an apology instead of terminating the
/// session.
enum Phase {
    AwaitingDecision,
    ExecutingTools(Vec<ToolCall>),
    Responding(String),
}

/// Drives one user message to a final reply. Owns no session state; the
/// caller passes the session in so the orchestrator can serialize turns.
pub struct DispatchLoop {
    oracle: Arc<dyn DecisionOracle>,
    tools: Arc<ToolRegistry>,
    limits: DispatchLimits,
}

impl DispatchLoop {
    pub fn new(
        oracle: Arc<dyn DecisionOracle>,
        tools: Arc<ToolRegistry>,
        limits: DispatchLimits,
    ) -> Self {
        Self { oracle, tools, limits }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Processes one inbound message and returns the assistant's reply. Never
    /// returns an error: every failure mode inside the loop surfaces as a
    /// conversational message.
    pub async fn run_turn(&self, session: &mut Session, text: &str) -> String {
        session.push_user(text);

        let specs = self.tools.specs();
        let mut calls_used: u32 = 0;
        let mut phase = Phase::AwaitingDecision;

        loop {
            phase = match phase {
                Phase::AwaitingDecision => {
                    match self.oracle.decide(session.transcript(), &specs).await {
                        Ok(Decision::Reply(reply)) => Phase::Responding(reply),
                        // An empty batch is malformed: executing it would
                        // consume no budget and loop back here without ever
                        // yielding, so the turn ends with an apology instead.
                        Ok(Decision::ToolCalls(calls)) if calls.is_empty() => {
                            warn!(
                                event_name = "agent.dispatch.empty_tool_batch",
                                session_id = %session.id(),
                                "oracle requested zero tools; replying with apology"
                            );
                            Phase::Responding(ORACLE_FAILURE_REPLY.to_string())
                        }
                        Ok(Decision::ToolCalls(calls)) => Phase::ExecutingTools(calls),
                        Err(error) => {
                            warn!(
                                event_name = "agent.dispatch.oracle_failure",
                                session_id = %session.id(),
                                error = %error,
                                "decision oracle failed; replying with apology"
                            );
                            Phase::Responding(ORACLE_FAILURE_REPLY.to_string())
                        }
                    }
                }
                Phase::ExecutingTools(calls) => {
                    let mut next = None;
                    for call in calls {
                        if calls_used >= self.limits.max_tool_calls {
                            warn!(
                                event_name = "agent.dispatch.tool_budget_exhausted",
                                session_id = %session.id(),
                                budget = self.limits.max_tool_calls,
                                "tool-call budget exhausted; forcing a reply"
                            );
                            next = Some(Phase::Responding(TOOL_BUDGET_REPLY.to_string()));
                            break;
                        }
                        calls_used += 1;

                        let result = match self.tools.call(&call.name, &call.arguments).await {
                            Ok(output) => output,
                            // Tool errors go back to the oracle as tool output
                            // so it can retry with corrected input.
                            Err(error) => {
                                info!(
                                    event_name = "agent.dispatch.tool_error",
                                    session_id = %session.id(),
                                    tool = %call.name,
                                    error = %error,
                                    "tool execution failed; reporting back to oracle"
                                );
                                error.user_message()
                            }
                        };

                        info!(
                            event_name = "agent.dispatch.tool_executed",
                            session_id = %session.id(),
                            tool = %call.name,
                            calls_used,
                            "tool executed"
                        );

                        let call_id = call.id.clone();
                        let tool_name = call.name.clone();
                        session.push_tool_request(call);
                        session.push_tool_result(call_id, tool_name, result);
                    }
                    next.unwrap_or(Phase::AwaitingDecision)
                }
                Phase::Responding(reply) => {
                    session.push_assistant(reply.clone());
                    return reply;
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, NaiveDate, Utc};
    use serde_json::json;

    use showroom_core::inventory::{InventoryDocument, InventoryStore};
    use showroom_core::ledger::{AvailabilityLedger, BookingPolicy, Clock};

    use crate::llm::{Decision, OracleError, ScriptedOracle, ToolCall};
    use crate::session::{Session, SessionId, Turn};
    use crate::tools::dealership_tools;

    use super::{DispatchLimits, DispatchLoop, ORACLE_FAILURE_REPLY, TOOL_BUDGET_REPLY};

    struct FixedClock {
        today: NaiveDate,
    }

    impl Clock for FixedClock {
        fn today(&self) -> NaiveDate {
            self.today
        }

        fn now(&self) -> DateTime<Utc> {
            self.today.and_hms_opt(8, 0, 0).expect("valid time").and_utc()
        }
    }

    fn registry() -> Arc<crate::tools::ToolRegistry> {
        let document: InventoryDocument = serde_json::from_value(json!({
            "dealership": {
                "name": "Premium Auto Dealership",
                "location": "123 Main Street, Springfield",
                "contact": "+1-555-0100"
            },
            "working_hours": { "monday": "9:00-18:00" },
            "inventory": [{
                "id": "sedan_001",
                "brand": "Aurora",
                "model": "Elegance",
                "year": 2024,
                "type": "sedan",
                "price_range": "28,000-32,000",
                "features": ["sunroof"],
                "fuel_type": "hybrid",
                "seating_capacity": 5,
                "availability": true
            }]
        }))
        .expect("fixture should deserialize");
        let inventory =
            Arc::new(InventoryStore::from_document(document).expect("fixture should load"));
        let ledger = Arc::new(AvailabilityLedger::with_clock(
            BookingPolicy::default(),
            Box::new(FixedClock {
                today: NaiveDate::from_ymd_opt(2098, 12, 20).expect("valid date"),
            }),
        ));
        Arc::new(dealership_tools(inventory, ledger))
    }

    fn call(id: &str, name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall { id: id.to_string(), name: name.to_string(), arguments }
    }

    #[tokio::test]
    async fn direct_reply_appends_user_and_assistant_turns() {
        let oracle = Arc::new(ScriptedOracle::replying("Welcome to Premium Auto!"));
        let dispatch = DispatchLoop::new(oracle, registry(), DispatchLimits::default());
        let mut session = Session::new(SessionId("lead-1".to_string()));

        let reply = dispatch.run_turn(&mut session, "hello").await;

        assert_eq!(reply, "Welcome to Premium Auto!");
        assert_eq!(session.transcript().len(), 2);
        assert!(matches!(&session.transcript()[0], Turn::User { text } if text == "hello"));
        assert!(matches!(&session.transcript()[1], Turn::Assistant { .. }));
    }

    #[tokio::test]
    async fn tool_round_trip_feeds_results_back_to_the_oracle() {
        let oracle = Arc::new(ScriptedOracle::new(vec![
            Ok(Decision::ToolCalls(vec![call(
                "call-1",
                "list_available_vehicles",
                json!({}),
            )])),
            Ok(Decision::Reply("We have the Aurora Elegance available.".to_string())),
        ]));
        let dispatch = DispatchLoop::new(oracle, registry(), DispatchLimits::default());
        let mut session = Session::new(SessionId("lead-1".to_string()));

        let reply = dispatch.run_turn(&mut session, "what can I test drive?").await;

        assert_eq!(reply, "We have the Aurora Elegance available.");
        // user, tool request, tool result, assistant
        assert_eq!(session.transcript().len(), 4);
        assert!(matches!(&session.transcript()[1], Turn::ToolRequest { .. }));
        assert!(matches!(
            &session.transcript()[2],
            Turn::ToolResult { tool, text, .. }
                if tool == "list_available_vehicles" && text.contains("Aurora Elegance")
        ));
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_back_not_raised() {
        let oracle = Arc::new(ScriptedOracle::new(vec![
            Ok(Decision::ToolCalls(vec![call("call-1", "telepathy", json!({}))])),
            Ok(Decision::Reply("Let me try something else.".to_string())),
        ]));
        let dispatch = DispatchLoop::new(oracle, registry(), DispatchLimits::default());
        let mut session = Session::new(SessionId("lead-1".to_string()));

        let reply = dispatch.run_turn(&mut session, "read my mind").await;

        assert_eq!(reply, "Let me try something else.");
        assert!(matches!(
            &session.transcript()[2],
            Turn::ToolResult { text, .. } if text.contains("does not exist")
        ));
    }

    #[tokio::test]
    async fn oracle_failure_becomes_an_apology_and_session_stays_usable() {
        let oracle = Arc::new(ScriptedOracle::new(vec![
            Err(OracleError::Timeout),
            Ok(Decision::Reply("Back online. How can I help?".to_string())),
        ]));
        let dispatch = DispatchLoop::new(oracle, registry(), DispatchLimits::default());
        let mut session = Session::new(SessionId("lead-1".to_string()));

        let first = dispatch.run_turn(&mut session, "hello?").await;
        assert_eq!(first, ORACLE_FAILURE_REPLY);

        let second = dispatch.run_turn(&mut session, "still there?").await;
        assert_eq!(second, "Back online. How can I help?");
    }

    #[tokio::test]
    async fn empty_tool_batch_ends_the_turn_instead_of_spinning() {
        let oracle = Arc::new(ScriptedOracle::new(vec![Ok(Decision::ToolCalls(Vec::new()))]));
        let dispatch = DispatchLoop::new(oracle, registry(), DispatchLimits::default());
        let mut session = Session::new(SessionId("lead-1".to_string()));

        let reply = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            dispatch.run_turn(&mut session, "hello"),
        )
        .await
        .expect("turn must terminate");

        assert_eq!(reply, ORACLE_FAILURE_REPLY);
        // user turn plus the apology, no tool turns.
        assert_eq!(session.transcript().len(), 2);
        assert!(matches!(&session.transcript()[1], Turn::Assistant { .. }));
    }

    #[tokio::test]
    async fn exceeding_the_tool_budget_forces_a_fallback_reply() {
        // Script an oracle that keeps asking for tools and never answers.
        let greedy_turn =
            || Ok(Decision::ToolCalls(vec![call("c", "list_available_vehicles", json!({}))]));
        let oracle = Arc::new(ScriptedOracle::new(vec![
            greedy_turn(),
            greedy_turn(),
            greedy_turn(),
            greedy_turn(),
        ]));
        let dispatch = DispatchLoop::new(
            oracle,
            registry(),
            DispatchLimits { max_tool_calls: 3 },
        );
        let mut session = Session::new(SessionId("lead-1".to_string()));

        let reply = dispatch.run_turn(&mut session, "loop forever").await;

        assert_eq!(reply, TOOL_BUDGET_REPLY);
        let tool_results = session
            .transcript()
            .iter()
            .filter(|turn| matches!(turn, Turn::ToolResult { .. }))
            .count();
        assert_eq!(tool_results, 3, "only the budgeted calls should have run");
    }

    #[tokio::test]
    async fn multiple_calls_in_one_decision_execute_in_order() {
        let oracle = Arc::new(ScriptedOracle::new(vec![
            Ok(Decision::ToolCalls(vec![
                call("call-1", "get_dealership_info", json!({})),
                call("call-2", "list_available_vehicles", json!({})),
            ])),
            Ok(Decision::Reply("Here's everything.".to_string())),
        ]));
        let dispatch = DispatchLoop::new(oracle, registry(), DispatchLimits::default());
        let mut session = Session::new(SessionId("lead-1".to_string()));

        dispatch.run_turn(&mut session, "tell me about the dealership and stock").await;

        let tools: Vec<&str> = session
            .transcript()
            .iter()
            .filter_map(|turn| match turn {
                Turn::ToolResult { tool, .. } => Some(tool.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(tools, vec!["get_dealership_info", "list_available_vehicles"]);
    }
}
