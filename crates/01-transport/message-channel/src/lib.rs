//! Entangled message ports shared by the page bridge, scenarios, and tests.
//!
//! The crate models the cross-realm channel primitives:
//! * [`MessageHub`] – explicitly constructed registry that mints channels and owns config.
//! * [`MessagePort`] – one endpoint handle with the `Pending → Started → Closed` lifecycle
//!   plus the terminal `Transferred` state for handles whose ownership moved away.
//! * The transfer ledger – all-or-nothing validation of transfer lists.
//! * The dispatcher – per-port FIFO delivery onto whichever [`Executor`] is registered
//!   when a message is handed out.
//! * [`PortError`] – the single synchronous error surface (`InvalidStateError`).

mod dispatch;
mod endpoint;
mod error;
mod executor;
mod hub;
mod ledger;
mod metrics;
mod origin;
mod payload;
mod port;

pub use error::{PortError, PortResult, StateViolation};
pub use executor::{Executor, InlineExecutor, Task};
pub use hub::{Channel, MessageHub, MessageHubBuilder, DEFAULT_DISPATCH_BUDGET};
pub use metrics::PortMetricsSnapshot;
pub use origin::{Origin, EMBEDDER_ORIGIN, OPAQUE_ORIGIN};
pub use payload::{MessagePayload, PayloadKind, QueuedMessage};
pub use port::{MessageCallback, MessagePort, PortId, PortState, TransferList};
