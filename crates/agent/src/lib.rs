//! Conversational agent runtime for the showroom test-drive assistant.
//!
//! This crate is the "brain" of the system:
//! - Keeps per-session transcripts and scratch memory (`session`)
//! - Exposes the fixed tool set over inventory and ledger (`tools`)
//! - Drives the decide/execute/respond loop per user message (`dispatch`)
//! - Owns session lifecycle and per-session serialization (`orchestrator`)
//!
//! # Architecture
//!
//! One user message runs through a constrained loop:
//! 1. **Decision** (`llm`) - the external oracle reads the transcript plus
//!    the tool schemas and returns either a final reply or tool requests
//! 2. **Tool execution** (`tools`) - requested tools run against the
//!    read-only inventory store and the lock-guarded availability ledger
//! 3. **Response** (`dispatch`) - the final text is appended to the
//!    transcript and handed back to the transport
//!
//! # Safety principle
//!
//! The oracle never touches booking state directly. Every write goes through
//! the ledger's `reserve`, and every oracle failure is converted into a
//! conversational apology at the dispatch boundary - a session stays usable
//! after any single bad turn.

pub mod dispatch;
pub mod llm;
pub mod orchestrator;
pub mod session;
pub mod tools;

pub use dispatch::{DispatchLimits, DispatchLoop};
pub use llm::{
    ChatCompletionsOracle, Decision, DecisionOracle, OracleError, ScriptedOracle, ToolCall,
    ToolSpec,
};
pub use orchestrator::SessionOrchestrator;
pub use session::{Session, SessionId, Turn};
pub use tools::{dealership_tools, Tool, ToolRegistry};
