//! # remotedoc
//!
//! A client-side model of a remote, mutable image-editing document hosted by an
//! external application. The client never holds pixel or layer data - it holds
//! typed, generation-checked handles into host state and issues asynchronous
//! commands, observing results when the host resolves them.
//!
//! The embedding application supplies the wire: implement
//! [`channel::HostTransport`], hand it to a [`channel::CommandChannel`], then open
//! documents through [`proxy::document::Document::open`].

pub mod channel;
pub mod commands;
pub mod constants;
pub mod error;
pub mod id;
pub mod proxy;
pub mod registry;
pub mod save;
pub mod state;

pub use channel::{CommandChannel, HostResponse, HostTransport, Request};
pub use error::Error;
pub use id::Id;
pub use proxy::document::{Document, SaveAs};
pub use proxy::history::History;
pub use proxy::layers::{Layer, LayerTree};
