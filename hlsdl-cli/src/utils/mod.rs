mod files;
mod headers;
pub mod progress;

pub use self::files::{create_dirs, derive_output_from_url};
pub use self::headers::build_headers;
