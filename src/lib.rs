//! # courier-rpc
//!
//! An RPC framework layered over HTTP: a server that exposes registered
//! methods of a user service as network-callable endpoints, a client that
//! invokes them by name with transparent marshaling, and a standalone
//! [registry](crate::registry) that discovers live servers, round-robins
//! lookups across replicas, and drops instances whose heartbeats age out.
//!
//! Every call is one `POST /call` exchange: the envelope travels as JSON
//! in the `X-Header` header, the argument and reply as codec-encoded
//! bytes in the bodies. Codecs are pluggable by tag — a self-describing
//! binary format by default, JSON as the textual alternative.
//!
//! ## Usage
//!
//! 1. Register your methods in a [`ServiceMethods`] table. A method takes
//!    its argument by value, writes its result through a `&mut` out-slot,
//!    and reports failure with a [`MethodError`].
//! 2. Start a [`Server`] over the table, either standalone or attached to
//!    a registry.
//! 3. Point a [`Client`] at the server (or at the registry with
//!    `use_registry`), and call methods by service + method name.
//!
//! ```no_run
//! use courier_rpc::{Client, Options, Server, ServiceMethods};
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize, Deserialize)]
//! struct AddReq {
//!     a: i32,
//!     b: i32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), courier_rpc::RpcError> {
//!     let mut methods = ServiceMethods::new();
//!     methods.register("Add", |req: AddReq, ret: &mut i32| {
//!         *ret = req.a + req.b;
//!         Ok(())
//!     });
//!     let server = Server::new("Calc", 8082, methods, Duration::from_millis(100))?;
//!     let addr = server.addr();
//!     tokio::spawn(async move { server.run().await });
//!
//!     let client = Client::new(addr, Options::default())?;
//!     let sum: i32 = client.call("Calc", "Add", &AddReq { a: 2, b: 3 }).await?;
//!     assert_eq!(sum, 5);
//!     Ok(())
//! }
//! ```
//!
//! To run behind the registry, start `courier-registry` (or embed
//! [`registry::Registry`]), serve with
//! [`Server::run_with_registry`], and construct the client with
//! `use_registry: true` and the registry's address as target.

mod client;
pub mod codec;
mod config;
mod error;
mod method;
pub mod net;
mod option;
pub mod registry;
mod server;

pub use client::Client;
pub use config::ClientConfig;
pub use error::{BalanceError, CodecError, MethodError, RpcError};
pub use method::{Method, ServiceMethods};
pub use option::{
    Header, Options, ServiceInfo, HEADER_RPC, HEADER_TYPE, MAGIC_NUMBER, TYPE_ASK, TYPE_CALL,
    TYPE_PING, TYPE_REG,
};
pub use server::Server;
