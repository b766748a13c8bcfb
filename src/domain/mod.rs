//! Domain types: orders, resolved notifications, the callback audit record,
//! and the storage port the backends implement.

pub mod notification;
pub mod order;
pub mod ports;
