//! Wires a Ctrl-C signal into the core's [`AbortFlag`], the collaborator
//! the host is responsible for per §5's cancellation model.

use std::sync::Arc;

use lucky_core::pool::AbortFlag;

/// Guard returned by [`install_ctrlc`]; the handler stays registered for
/// the life of the process, so there is nothing to do on drop beyond
/// keeping the `Arc<AbortFlag>` alive for the closure.
pub struct CtrlcGuard {
    _flag: Arc<AbortFlag>,
}

/// Register a Ctrl-C handler that marks `abort` as user-aborted. Returns a
/// guard that must be kept alive for as long as the handler should fire;
/// a failure to install (e.g. a handler already set) is logged and
/// otherwise ignored, since running without cancellation support is still
/// safe.
pub fn install_ctrlc(abort: &Arc<AbortFlag>) -> CtrlcGuard {
    let flag = abort.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        flag.set_user_abort();
    }) {
        tracing::warn!(%err, "failed to install Ctrl-C handler");
    }
    CtrlcGuard {
        _flag: abort.clone(),
    }
}
