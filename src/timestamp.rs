//! Creation timestamps for container attributes.

use chrono::Local;

/// Current local time as `YYYY-MM-DD HH:MM:SS`, the format stored in
/// `creation_date` attributes.
pub fn now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
