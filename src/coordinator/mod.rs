pub mod bus;
pub mod controller;
pub mod messages;
pub mod registry;
pub mod state;

pub use bus::{serve, CoordinatorHandle, RequestCounts, Subscription, TransportError};
pub use controller::Coordinator;
pub use messages::{LastScoreReply, NewUnit, NewUnitReply, Push, Reply, Request};
pub use registry::{ContextId, ListenerRegistry};
pub use state::{CoordinatorState, Phase};
