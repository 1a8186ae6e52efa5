//! Content module - handles pages, front-matter, and markdown rendering

mod frontmatter;
pub mod loader;
mod markdown;
mod page;

pub use frontmatter::{DateKeyword, FrontMatter, Permalink};
pub(crate) use frontmatter::{parse_date_string, scalar_to_string};
pub use frontmatter::parse_mapping as parse_front_matter_mapping;
pub use markdown::MarkdownRenderer;
pub use page::{CollectionItem, Page, PageInfo};
