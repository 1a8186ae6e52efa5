//! Configuration module

mod site;

pub use site::normalize_path_prefix;
pub use site::BuildConfig;
pub use site::DirConfig;
pub use site::SiteMetadata;
pub use site::TemplateEngine;
pub use site::TemplateFormat;
