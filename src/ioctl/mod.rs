/*!
 * Ioctl Boundary
 *
 * Command codes, the fixed-size request record, caller memory access and
 * the dispatcher that validates requests before they reach the store.
 */

pub mod command;
mod dispatcher;
mod request;
mod response;
mod user;

pub use command::Command;
pub use dispatcher::IoctlDispatcher;
pub use request::{IoctlRequest, UserPtr};
pub use response::{IoctlResponse, IoctlResult};
pub use user::{AddressSpace, UserSpace};
