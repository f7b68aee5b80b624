/// Messaging between the detection core and external state sinks
///
/// The aggregator is the only publisher; sinks (a HUD overlay, a web
/// server, the CLI) subscribe and receive every applied change.
///
/// ```text
/// ┌─────────────┐  StateUpdate  ┌──────────┐  per-subscriber channel  ┌───────┐
/// │ Aggregator  │ ────────────> │ StateBus │ ───────────────────────> │ Sinks │
/// └─────────────┘               └──────────┘                          └───────┘
/// ```

pub mod bus;
pub mod updates;

pub use bus::{StateBus, SubscriberId};
pub use updates::StateUpdate;
