//! AMQP-backed message dispatch: connection bootstrap, the `consume`
//! primitive, and the cross-cutting error wrapper.

pub mod broker;
pub mod consume;
pub mod error;
pub mod wrapper;

pub use broker::Broker;
pub use consume::consume;
pub use error::DispatchError;
pub use wrapper::wrap;
