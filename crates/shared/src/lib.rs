//! Types shared by every crate of the catalog browser: the program catalog
//! data model, the wire shapes exchanged with the search server, and the
//! wire error shape.

pub mod domain;
pub mod error;
pub mod protocol;
