//! Spanning multi-monitor wallpapers.
//!
//! Every display gets its own image, chosen from a folder matching its
//! resolution; the images are streamed into one canvas covering the whole
//! desktop and applied as a single spanned background.

pub mod apply;
pub mod canvas;
pub mod compositor;
pub mod config;
pub mod control;
pub mod decode;
pub mod displays;
pub mod error;
pub mod meta;
pub mod output;
pub mod paths;
pub mod repo;
pub mod ring;
pub mod scan;
pub mod schedule;
pub mod scratch;
pub mod service;

pub use error::{Error, Result};
