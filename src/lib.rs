//! Organize audio files into `<root>/<YYYY>/<MM-YY>/<artist>/` by their
//! embedded artist tag.

pub mod collect;
pub mod config;
pub mod layout;
pub mod organize;
pub mod session;
pub mod tags;
