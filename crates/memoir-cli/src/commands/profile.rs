//! Profile command implementation.

use crate::cli::ProfileArgs;
use crate::error::Result;
use crate::output::Formatter;
use crate::session::Session;
use memoir_domain::ProfileEntry;

/// Execute the profile command.
pub async fn execute_profile(args: ProfileArgs, session: &Session, formatter: &Formatter) -> Result<()> {
    let entries = session.coordinator.profiles(&args.user).await?;
    let entries = filter_by_topic(entries, args.topic.as_deref());
    println!("{}", formatter.format_profiles(&entries)?);
    Ok(())
}

/// Keep entries of `topic` (case-insensitive); all of them when `None`.
fn filter_by_topic(entries: Vec<ProfileEntry>, topic: Option<&str>) -> Vec<ProfileEntry> {
    match topic {
        Some(topic) => entries
            .into_iter()
            .filter(|e| e.topic.eq_ignore_ascii_case(topic))
            .collect(),
        None => entries,
    }
}
