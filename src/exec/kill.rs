// src/exec/kill.rs

//! Process-tree termination.
//!
//! Both implementations share one contract: the call returns only after the
//! child has been reaped, and a child that is already gone is not an error.

use std::io;
use std::time::Duration;

use tokio::process::Child;
#[cfg(unix)]
use tracing::warn;
use tracing::debug;

/// How often the group is checked after its leader exited.
#[cfg(unix)]
const GROUP_POLL: Duration = Duration::from_millis(50);

/// Interrupt the process group led by `child`, escalate to a hard kill if
/// anything in it is still alive after `grace`, and wait for the child to be
/// reaped.
#[cfg(unix)]
pub async fn terminate_tree(child: &mut Child, grace: Duration) -> io::Result<()> {
    use nix::sys::signal::Signal;

    // `id()` is `None` once the child has been reaped.
    let Some(pid) = child.id() else {
        debug!("process already reaped; nothing to terminate");
        return Ok(());
    };

    let deadline = tokio::time::Instant::now() + grace;
    signal_group(pid, Signal::SIGINT);

    match tokio::time::timeout_at(deadline, child.wait()).await {
        Ok(status) => {
            let status = status?;
            debug!(pid, %status, "group leader exited after interrupt");
        }
        Err(_) => {
            warn!(
                pid,
                grace_ms = grace.as_millis() as u64,
                "process group ignored interrupt; killing"
            );
            signal_group(pid, Signal::SIGKILL);
            let status = child.wait().await?;
            debug!(pid, %status, "process group killed");
            return Ok(());
        }
    }

    // Descendants that ignore SIGINT outlive the leader.
    kill_survivors(pid, deadline).await;
    Ok(())
}

/// Terminate what is left of the group led by `pgid` once its leader has
/// already exited and been reaped: interrupt, then kill after `grace`.
/// A group that no longer exists is not an error.
#[cfg(unix)]
pub async fn terminate_group(pgid: u32, grace: Duration) {
    use nix::sys::signal::Signal;

    if !group_alive(pgid) {
        return;
    }
    debug!(pgid, "leader gone but process group still alive; interrupting");
    let deadline = tokio::time::Instant::now() + grace;
    signal_group(pgid, Signal::SIGINT);
    kill_survivors(pgid, deadline).await;
}

#[cfg(not(unix))]
pub async fn terminate_group(_pgid: u32, _grace: Duration) {}

#[cfg(unix)]
async fn kill_survivors(pgid: u32, deadline: tokio::time::Instant) {
    use nix::sys::signal::Signal;

    while group_alive(pgid) {
        if tokio::time::Instant::now() >= deadline {
            warn!(pgid, "descendants survived interrupt; killing process group");
            signal_group(pgid, Signal::SIGKILL);
            break;
        }
        tokio::time::sleep(GROUP_POLL).await;
    }
}

#[cfg(unix)]
fn group_alive(pid: u32) -> bool {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match i32::try_from(pid) {
        Ok(raw) => killpg(Pid::from_raw(raw), None::<Signal>).is_ok(),
        Err(_) => false,
    }
}

/// Send `signal` to the group whose leader is `pid`. "No such process" means
/// the group is already gone; any other failure is logged and the caller
/// keeps going (it still waits for the child).
#[cfg(unix)]
fn signal_group(pid: u32, signal: nix::sys::signal::Signal) {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        warn!(pid, "pid out of range; cannot signal process group");
        return;
    };

    match killpg(Pid::from_raw(raw), signal) {
        Ok(()) => debug!(pid, ?signal, "signalled process group"),
        Err(Errno::ESRCH) => debug!(pid, ?signal, "process group already gone"),
        Err(errno) => warn!(pid, ?signal, %errno, "failed to signal process group"),
    }
}

/// Kill the direct child and wait for it. There are no process groups to
/// target here, so descendants are not reached.
#[cfg(not(unix))]
pub async fn terminate_tree(child: &mut Child, _grace: Duration) -> io::Result<()> {
    if let Some(status) = child.try_wait()? {
        debug!(%status, "process already exited; nothing to terminate");
        return Ok(());
    }

    match child.kill().await {
        Ok(()) => Ok(()),
        // Exited between the check and the kill.
        Err(e) if e.kind() == io::ErrorKind::InvalidInput => {
            child.wait().await?;
            Ok(())
        }
        Err(e) => Err(e),
    }
}
