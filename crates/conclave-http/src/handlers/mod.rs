//! Domain handlers. Each takes the gateway and a parsed request and
//! returns a [`crate::response::Reply`]; the pipeline does the rest.

pub(crate) mod agent;
pub(crate) mod catalog;
pub(crate) mod kv;
pub(crate) mod operator;
pub(crate) mod status;
