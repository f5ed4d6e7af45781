//! Report formatting and on-disk archives.
//!
//! # Submodules
//!
//! - [`report`]: Turns a news list into the Markdown report (template or model)
//! - [`json`]: Writes [`crate::models::Digest`] records for other tools
//! - [`markdown`]: Writes reports and maintains the date index
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     └── 081500.json
//!
//! markdown_output_dir/
//! ├── 2025-05-06_081500.md
//! └── daily_digest.md        # Master index
//! ```

pub mod json;
pub mod markdown;
pub mod report;
