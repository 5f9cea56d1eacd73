//! Rendezvous - peer pairing and signaling relay core
//!
//! Two peers find each other through a single-use token and then exchange
//! opaque signaling messages (SDP offers/answers, ICE candidates) through the
//! server. This crate has no HTTP dependencies: the transport hands each
//! connection over as a [`Channel`] (outbound) plus a stream of [`Inbound`]
//! frames, and [`Session::run`] drives the pairing state machine.
//!
//! # Example
//!
//! ```no_run
//! use std::convert::Infallible;
//! use std::sync::Arc;
//! use futures::channel::mpsc;
//! use rendezvous::{Channel, Inbound, Session, Switchboard};
//!
//! #[tokio::main]
//! async fn main() {
//!     let switchboard = Arc::new(Switchboard::new());
//!
//!     let (out_tx, _out_rx) = mpsc::unbounded::<String>();
//!     let (in_tx, in_rx) = mpsc::unbounded::<Result<Inbound, Infallible>>();
//!
//!     let session = Session::new(Channel::new(out_tx), switchboard);
//!     let task = tokio::spawn(session.run(in_rx));
//!
//!     in_tx
//!         .unbounded_send(Ok(Inbound::Text(r#"{"type":"register"}"#.into())))
//!         .unwrap();
//!     drop(in_tx);
//!     task.await.unwrap();
//! }
//! ```

mod channel;
mod error;
mod pairing;
pub mod protocol;
mod registry;
mod session;
mod switchboard;

pub use channel::{Channel, ChannelId, SendSlot};
pub use error::{PairingError, SendError, SignalError};
pub use pairing::PairingTable;
pub use protocol::{MessageType, SignalMessage};
pub use registry::{Registry, Token};
pub use session::{Inbound, NoopObserver, Session, SessionConfig, SessionObserver, teardown};
pub use switchboard::{Switchboard, SwitchboardStats};
