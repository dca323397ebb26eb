//! Wire protocol and connection plumbing between the server, the application and render clients.

pub mod link;
pub mod loopback;
pub mod packets;
pub mod requests;
