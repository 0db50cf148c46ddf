pub mod date_time;
pub mod human_bytes;
pub mod url;
