//! Status and exit types shared between Warden's supervisor and its observers.
//!
//! The supervisor pushes a [`StatusEvent`] on every lifecycle transition of a managed process, and
//! whenever the process id shown for it changes. Observers (a UI, a log, a test) treat these as
//! best-effort notifications: they carry the full current state for one process, so a missed event
//! is made up for by the next one.

#[doc(inline)]
pub use process::*;

#[doc(inline)]
pub use status::*;

mod process;
mod status;
