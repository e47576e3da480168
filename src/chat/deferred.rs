use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::client::ChatApi;
use crate::observability::DEFERRED_RESTORES;

/// A member's role list to put back once a timeout ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRestore {
    pub server_id: String,
    pub user_id: String,
    pub token: String,
    /// The roles captured when the timeout was issued.
    pub roles: Vec<String>,
}

/// Delayed actions owned by the session.  Every task still pending is
/// aborted on [`DeferredTasks::abort_all`] or drop.
#[derive(Debug, Default)]
pub struct DeferredTasks {
    handles: Vec<JoinHandle<()>>,
}

impl DeferredTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores `restore.roles` after `delay`.  Failures are logged; the task
    /// never touches session state.
    pub fn schedule_role_restore(
        &mut self,
        api: Arc<dyn ChatApi>,
        restore: RoleRestore,
        delay: Duration,
    ) {
        self.handles.retain(|handle| !handle.is_finished());
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let RoleRestore {
                server_id,
                user_id,
                token,
                roles,
            } = restore;
            match api
                .update_member_roles(&server_id, &user_id, &token, &roles)
                .await
            {
                Ok(()) => {
                    DEFERRED_RESTORES.click();
                    tracing::info!(%server_id, %user_id, "timeout lifted");
                }
                Err(err) => {
                    tracing::warn!(%server_id, %user_id, "failed to lift timeout: {err}");
                }
            }
        });
        self.handles.push(handle);
    }

    /// Tasks that have not finished yet.
    pub fn pending(&self) -> usize {
        self.handles
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    pub fn abort_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for DeferredTasks {
    fn drop(&mut self) {
        self.abort_all();
    }
}
