pub mod footer;
pub mod header;
pub mod utils;

pub use footer::{draw_footer, Notice};
pub use header::{draw_header, extract_domain, HeaderInfo};
pub use utils::{severity_color, trend_color, truncate};
