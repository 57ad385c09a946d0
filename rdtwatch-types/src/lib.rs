//! # rdtwatch-types
//!
//! Wire schema for the control plane of a reliable-data-transfer engine
//! (a TCP-like protocol run over UDP). The engine reports its state as loosely
//! shaped JSON: almost every field may be missing depending on whether the
//! server is running, whether the client has been configured, and how far a
//! transfer has progressed. Every such field is an `Option` here so consumers
//! have to decide what "absent" means instead of silently reading a zero.
//!
//! ## Features
//!
//! - `serde`: derive `Serialize`/`Deserialize` for every type. Disabled by
//!   default so the schema can be used without a serialization framework.
//!
//! ## Example
//!
//! ```rust
//! use rdtwatch_types::{ClientStatus, ClientState, ProtocolMode};
//!
//! let status = ClientStatus::default();
//! assert_eq!(status.state, ClientState::Idle);
//! assert_eq!("go_back_n".parse::<ProtocolMode>(), Ok(ProtocolMode::GoBackN));
//! ```

mod control;
mod event;
mod frame;
mod records;
mod status;

pub use control::*;
pub use event::*;
pub use frame::*;
pub use records::*;
pub use status::*;
