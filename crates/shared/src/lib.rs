//! Types shared by the ProPhone server and client.

pub mod inbox;
pub mod messages;
pub mod phone;
pub mod roles;
pub mod session;

pub use messages::*;
pub use roles::{can_act, resolve, AccountStatus, Action, Decision, Denial, DenialKind, Plan, Role};
