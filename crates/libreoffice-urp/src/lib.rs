//! A client for the UNO Remote Protocol (URP), the binary protocol an
//! office process speaks when started with a socket acceptor:
//!
//! ```text
//! soffice --headless --accept="socket,host=localhost,port=2002;urp;StarOffice.ComponentContext"
//! ```
//!
//! Layers, bottom up:
//! - [`transport`]: block framing over any async byte stream
//! - [`marshal`]: UNO values on the wire
//! - [`protocol`]: request/reply headers and their caches
//! - [`connection`]: negotiation, synchronous calls, bootstrap
//!
//! ```rust,no_run
//! use libreoffice_urp::UrpConnection;
//!
//! # async fn example() -> libreoffice_urp::Result<()> {
//! let mut conn = UrpConnection::connect("localhost", 2002).await?;
//! let env = conn.bootstrap().await?;
//! println!("desktop is {}", env.desktop.oid);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod connection;
pub mod error;
pub mod interface;
pub mod marshal;
pub mod protocol;
pub mod proxy;
pub mod transport;
pub mod types;

pub use connection::{UnoEnvironment, UrpConnection};
pub use error::{Result, UrpError};
pub use proxy::UnoProxy;
pub use types::{type_names, Any, Type, TypeClass, UnoValue};
