//! Forget command implementation.

use crate::cli::ForgetArgs;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use crate::session::Session;
use memoir_domain::ProfileId;

/// Execute the forget command.
pub async fn execute_forget(args: ForgetArgs, session: &Session, formatter: &Formatter) -> Result<()> {
    let id = ProfileId::from_string(args.id.trim())
        .map_err(|e| CliError::InvalidInput(format!("'{}': {}", args.id, e)))?;

    if session.coordinator.forget_profile(&args.user, id).await? {
        println!("{}", formatter.success(&format!("Forgot profile entry {}", id)));
    } else {
        println!(
            "{}",
            formatter.warning(&format!("No profile entry {} for user '{}'", id, args.user))
        );
    }
    Ok(())
}
