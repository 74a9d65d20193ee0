//! SMPP v3.4 SMS gateway: protocol engine, session registry, message
//! dispatcher, cross-worker receipt bus, and the worker/master process
//! fabric that load-balances client connections across them.

pub mod bus;
pub mod config;
pub mod master;
pub mod pdu;
pub mod provider;
pub mod receipt;
pub mod smpp;
pub mod worker;
