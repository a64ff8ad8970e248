//! HTTP handlers of the sandbox front end

pub mod forward;
pub mod meta;

pub use forward::forward;
pub use meta::update_version;
