//! Request routing and reverse proxying

pub mod forward;
pub mod router;
