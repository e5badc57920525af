pub mod download;
pub mod filing;
pub mod holdings;
pub mod index;
pub mod parsing;

pub use download::{business_days, download_day, DownloadStats};
pub use holdings::{list_days, parse_day, parse_days, write_table_csv, ParseStats};
pub use index::{fetch_daily_index, IndexEntry};
