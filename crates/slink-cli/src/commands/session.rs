//! Commands that run over the multiplexed session

use anyhow::Result;

use slink_core::config::Profile;
use slink_core::runner::LocalContext;
use slink_core::sync::ExternalSync;
use slink_core::transport::OpenSsh;
use slink_core::{ConnectionBroker, Operation, SessionRunner};

/// Run `operation` against the selected host with the real ssh and rsync
pub async fn run_operation(profile: Profile, operation: Operation) -> Result<()> {
    let local = LocalContext::from_env()?;
    let settings = &profile.settings;

    let transport = OpenSsh::new(settings.ssh.clone());
    let sync = ExternalSync::new(
        settings.ssh.clone(),
        settings.sync.clone(),
        settings.copy.clone(),
    );
    let broker = ConnectionBroker::new(transport, profile.control_dir());

    let mut runner = SessionRunner::new(profile, local, broker, sync);
    runner.run(operation).await?;
    Ok(())
}
