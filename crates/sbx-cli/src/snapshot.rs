//! Tutorial filesystem snapshots.
//!
//! The tutorial directory is captured into the `fs` state namespace so a
//! learner's files survive a page reload, and replayed into a fresh guest.

use sbx_state::{KvStore, LocalState, StateError};
use sbx_vfs::{create_dir_all, list_tree, read_file, write_file};
use tracing::info;

use crate::error::StageError;
use crate::machine::Machine;
use crate::platform::Platform;
use crate::session::Session;

impl<M, P> Session<M, P>
where
    M: Machine + 'static,
    P: Platform + 'static,
{
    /// Save the tutorial directory under `tutorial`. Returns the entry count.
    pub async fn save_fs_state<S: KvStore>(
        &self,
        state: &LocalState<S>,
        tutorial: &str,
    ) -> Result<usize, StageError> {
        if tutorial.is_empty() {
            return Err(StateError::NoActiveTutorial.into());
        }
        let Some(machine) = self.active_machine("save_fs_state") else {
            return Ok(0);
        };

        let mut snapshot = list_tree(machine.fs(), &self.config.tutorial_dir);
        for entry in snapshot.iter_mut().filter(|e| !e.is_dir) {
            entry.contents = read_file(machine.fs(), &entry.path).await?;
        }

        let count = snapshot.len();
        state.set_fs(tutorial, snapshot).await?;
        info!(target: "sbx::stage", tutorial, count, "saved FS state");
        Ok(count)
    }

    /// Recreate the entries saved under `tutorial`. Returns the entry count.
    pub async fn restore_fs_state<S: KvStore>(
        &self,
        state: &LocalState<S>,
        tutorial: &str,
    ) -> Result<usize, StageError> {
        let snapshot = state.get_fs(tutorial).await?;
        if snapshot.is_empty() {
            return Ok(0);
        }
        let Some(machine) = self.active_machine("restore_fs_state") else {
            return Ok(0);
        };

        for entry in &snapshot {
            if entry.is_dir {
                create_dir_all(machine.fs(), &entry.path)?;
            } else {
                let contents = entry.contents.clone().unwrap_or_default();
                write_file(machine.fs(), &entry.path, contents).await?;
            }
        }

        info!(target: "sbx::stage", tutorial, count = snapshot.len(), "restored FS state");
        Ok(snapshot.len())
    }
}
