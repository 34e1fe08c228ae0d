//! Page objects for the blog

pub mod home;
pub mod results;

pub use home::{HomePage, SearchPath};
pub use results::ResultsPage;
