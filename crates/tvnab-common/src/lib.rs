//! tvnab-common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across tvnab:
//!
//! - **Entity IDs**: Path-shaped identifiers for shows, seasons and episodes
//! - **Encoded values**: The hashable, serializable form of task arguments
//! - **Path Utilities**: Functions to detect file types by extension
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use tvnab_common::{EntityId, Value, Error, Result};
//! use tvnab_common::paths::is_video_file;
//! use std::path::Path;
//!
//! // Identify the second episode of the first season of a show
//! let id = EntityId::show("Archer").child(1u32).child(2u32);
//! assert_eq!(id.to_string(), "Archer/1/2");
//!
//! // Encoded arguments are plain values or entity references
//! let args = vec![Value::from("hello"), Value::EntityRef(id)];
//! assert!(args[1].is_entity_ref());
//!
//! // Check file types
//! assert!(is_video_file(Path::new("archer.s01e02.mkv")));
//!
//! // Use common error types
//! fn example() -> Result<Value> {
//!     Ok(serde_json::from_str("[1, 2]")?)
//! }
//! assert!(example().is_ok());
//! let bad = serde_json::from_str::<Value>("{").map_err(Error::from);
//! assert!(matches!(bad, Err(Error::Serialization(_))));
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod value;

pub use error::{Error, Result};
pub use ids::*;
pub use value::Value;
