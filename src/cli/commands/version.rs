//! Version command: binary version and the on-disk formats it writes.

use crate::error::Result;
use crate::storage::schema::CURRENT_SCHEMA_VERSION;
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput {
    version: &'static str,
    schema: i32,
    debug: bool,
}

/// Print the version.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let output = VersionOutput {
        version: env!("CARGO_PKG_VERSION"),
        schema: CURRENT_SCHEMA_VERSION,
        debug: cfg!(debug_assertions),
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
    } else if output.debug {
        println!("outbox {} (store schema v{}, debug build)", output.version, output.schema);
    } else {
        println!("outbox {} (store schema v{})", output.version, output.schema);
    }
    Ok(())
}
