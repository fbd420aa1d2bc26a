//! Environment definitions for berth
//!
//! Parses folders of HCL definition documents into a [`Config`]: an ordered
//! list of typed resources plus optional [`Blueprint`] metadata. Modules are
//! expanded inline, and [`parse_references`] turns each resource's typed
//! references into dependency edges once parsing is complete.
//!
//! ```no_run
//! use blueprint::{Config, LocalOnly, ParseOptions, Parser, parse_references};
//!
//! let parser = Parser::new(LocalOnly);
//! let mut config = Config::new();
//! parser.parse_folder("./env".as_ref(), &mut config, &ParseOptions::new())?;
//! parse_references(&mut config)?;
//! # Ok::<(), blueprint::Error>(())
//! ```

pub mod blueprint;
pub mod config;
pub mod connection;
pub mod error;
pub mod eval;
pub mod getter;
pub mod link;
pub mod parser;
pub mod paths;
pub mod registry;
pub mod resource;

mod decode;

pub use blueprint::Blueprint;
pub use config::Config;
pub use connection::ClusterConnection;
pub use error::{Error, ErrorCategory, Result};
pub use getter::{Getter, LocalOnly, MockGetter};
pub use link::parse_references;
pub use parser::{DEFAULT_VAR_PREFIX, ParseOptions, Parser};
pub use resource::{Info, Resource, ResourceKind, Status};
