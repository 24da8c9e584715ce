//! Cascade loads templates by name from a cascading file system: a list of
//! root directories searched in priority order, so that an application can
//! override the views shipped with its modules and libraries.
//!
//! This crate provides the loader itself ([`ViewLoader`]), the directory
//! search it sits on ([`CascadingFinder`]) and a
//! [Handlebars](https://handlebarsjs.com/)-based [`Templates`] registry that
//! compiles through any [`Loader`]. For the command line interface, see the
//! `cascade-cli` crate.

mod config;
mod error;
mod finder;
pub mod fs;
mod loader;
mod template;

pub use config::{Options, Settings};
pub use error::Error;
pub use finder::{CascadingFinder, FileFinder};
pub use loader::{normalize, Loader, ViewLoader, DEFAULT_EXTENSION, VIEWS};
pub use template::Templates;
