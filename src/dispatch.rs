use std::thread;

use tracing::{error, trace};

use crate::task::{DispatchMode, TimerTask};

/// Run a fired task according to its dispatch mode.
///
/// Inline tasks run to completion on the calling thread and a panic
/// propagates to the caller. Detached tasks get their own thread which is
/// never joined; whatever happens there is not reported back.
pub fn dispatch(task: TimerTask) {
    match task.mode() {
        DispatchMode::Inline => {
            trace!(id = task.id(), "running timer inline");
            task.run();
        }
        DispatchMode::Detached => spawn_detached(task),
    }
}

fn spawn_detached(task: TimerTask) {
    let id = task.id();
    trace!(id, "spawning detached timer");

    let spawned = thread::Builder::new()
        .name(format!("timer-{id}"))
        .spawn(move || task.run());

    if let Err(err) = spawned {
        error!(id, %err, "could not spawn detached timer thread, callback dropped");
    }
}
