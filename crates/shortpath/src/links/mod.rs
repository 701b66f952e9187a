//! The link engine: path validation, resolution, insertion and target checks.

mod inserter;
mod path;
mod resolver;
mod url_check;

pub use inserter::insert;
pub use path::{PathRules, shortcut};
pub use resolver::resolve;
pub use url_check::UrlChecker;
