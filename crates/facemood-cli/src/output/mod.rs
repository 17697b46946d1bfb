//! Output sinks for CLI.

mod frames;
mod jsonl;
mod status;

pub use frames::FrameWriter;
pub use jsonl::JsonlOutput;
pub use status::StatusLine;

/// Generate ISO 8601 UTC timestamp (RFC 3339 format).
pub fn iso_timestamp() -> String {
    match time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339) {
        Ok(ts) => ts,
        Err(e) => {
            tracing::debug!("Timestamp format failed: {e}");
            String::from("1970-01-01T00:00:00Z")
        }
    }
}
