//! Workspace session
//!
//! The session is the single owner of an open workspace and the execution
//! state of its requests. Every editing operation goes through it and marks
//! the workspace dirty; navigation of results does not.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};
use workbench_domain::workbook::{BodyKind, HttpMethod};
use workbench_domain::{
    CompletionOutcome, EffectiveParameters, Entity, ExecutionBatch, ExecutionTracker,
    GroupExecution, Id, IdGenerator, ParameterKind, ParameterLists, Persistence, Position, Request,
    RequestEntry, RequestGroup, RunTarget, RunToken, Selection, UuidIdGenerator,
    WorkbenchSettings, Workspace,
};
use workbench_domain::{Authorization, Certificate, IndexedEntities, Proxy, Scenario};

use crate::error::{ApplicationError, ApplicationResult};
use crate::ports::RunCommand;

/// A session shared between the editor and running executions.
pub type SharedSession = Arc<Mutex<WorkspaceSession>>;

/// An open workspace and the execution state of its requests.
pub struct WorkspaceSession {
    workspace: Workspace,
    executions: ExecutionTracker,
    settings: WorkbenchSettings,
    ids: Arc<dyn IdGenerator>,
    dirty: bool,
}

fn update_entity<T: Entity>(
    index: &mut IndexedEntities<T>,
    id: &str,
    update: impl FnOnce(&mut T),
) -> ApplicationResult<()> {
    index.update(id, update)?;
    Ok(())
}

impl WorkspaceSession {
    /// Opens a session on `workspace` with random UUID identifiers.
    #[must_use]
    pub fn new(workspace: Workspace, settings: WorkbenchSettings) -> Self {
        Self {
            workspace,
            executions: ExecutionTracker::new(settings.execution()),
            settings,
            ids: Arc::new(UuidIdGenerator),
            dirty: false,
        }
    }

    /// Replaces the identifier generator.
    #[must_use]
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Wraps the session for sharing with running executions.
    #[must_use]
    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    /// The workspace being edited.
    #[must_use]
    pub const fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Session settings.
    #[must_use]
    pub const fn settings(&self) -> &WorkbenchSettings {
        &self.settings
    }

    /// Execution state of every request and group.
    #[must_use]
    pub const fn executions(&self) -> &ExecutionTracker {
        &self.executions
    }

    /// Mutable execution state, for result navigation.
    pub fn executions_mut(&mut self) -> &mut ExecutionTracker {
        &mut self.executions
    }

    /// Returns true if the workspace changed since it was opened or saved.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Marks the workspace as saved.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    fn touch(&mut self) {
        self.dirty = true;
    }

    // ------------------------------------------------------------------
    // Requests and groups
    // ------------------------------------------------------------------

    /// Adds a request next to `target`: first inside it when it is a group,
    /// right after it otherwise, and at the top when there is no target.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the target does not exist.
    pub fn add_request(&mut self, target: Option<&str>) -> ApplicationResult<Id> {
        let request = Request::new(self.ids.generate()).with_test(self.settings.new_request_test.clone());
        self.add_entry(request.into(), target)
    }

    /// Adds a group with the same placement rules as [`Self::add_request`].
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the target does not exist.
    pub fn add_group(&mut self, target: Option<&str>) -> ApplicationResult<Id> {
        let group = RequestGroup::new(self.ids.generate());
        self.add_entry(group.into(), target)
    }

    fn add_entry(&mut self, entry: RequestEntry, target: Option<&str>) -> ApplicationResult<Id> {
        let id = entry.id().to_string();
        let position = match target {
            Some(target) if self.workspace.requests.get(target)?.is_group() => Position::FirstChild,
            Some(_) => Position::After,
            None => Position::Before,
        };
        self.workspace.requests.insert_at(entry, target, position)?;
        self.touch();
        debug!(request_id = %id, "Added request entry");
        Ok(id)
    }

    /// Deletes a request or group with its subtree, dropping the execution
    /// state of everything removed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the entry does not exist.
    pub fn delete_request(&mut self, id: &str) -> ApplicationResult<()> {
        let removed = self.workspace.requests.remove(id)?;
        for entry in &removed {
            self.executions.remove(entry.id());
        }
        self.touch();
        info!(request_id = %id, removed = removed.len(), "Deleted request entry");
        Ok(())
    }

    /// Moves a request or group relative to `anchor`.
    ///
    /// # Errors
    ///
    /// Returns the index error when the move is not allowed.
    pub fn move_request(&mut self, id: &str, anchor: Option<&str>, position: Position) -> ApplicationResult<()> {
        self.workspace.requests.move_entity(id, anchor, position)?;
        self.touch();
        Ok(())
    }

    /// Copies a request or group with its subtree right after itself.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the entry does not exist.
    pub fn copy_request(&mut self, id: &str) -> ApplicationResult<Id> {
        let copy = self
            .workspace
            .requests
            .duplicate(id, self.ids.as_ref(), &self.settings.request_copy_suffix)?;
        self.touch();
        debug!(request_id = %id, copy_id = %copy, "Copied request entry");
        Ok(copy)
    }

    /// Applies `update` to a request.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` is not a request.
    pub fn update_request(&mut self, id: &str, update: impl FnOnce(&mut Request)) -> ApplicationResult<()> {
        self.workspace
            .requests
            .update(id, |entry| entry.as_request_mut().map(update))?
            .ok_or_else(|| ApplicationError::NotFound(format!("request {id}")))?;
        self.touch();
        Ok(())
    }

    /// Applies `update` to a group.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` is not a group.
    pub fn update_group(&mut self, id: &str, update: impl FnOnce(&mut RequestGroup)) -> ApplicationResult<()> {
        self.workspace
            .requests
            .update(id, |entry| entry.as_group_mut().map(update))?
            .ok_or_else(|| ApplicationError::NotFound(format!("group {id}")))?;
        self.touch();
        Ok(())
    }

    /// Renames a request or group.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the entry does not exist.
    pub fn rename_request(&mut self, id: &str, name: impl Into<String>) -> ApplicationResult<()> {
        let name = name.into();
        self.workspace.requests.update(id, |entry| entry.set_name(name))?;
        self.touch();
        Ok(())
    }

    /// Sets the URL of a request.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` is not a request.
    pub fn set_request_url(&mut self, id: &str, url: impl Into<String>) -> ApplicationResult<()> {
        let url = url.into();
        self.update_request(id, |request| request.url = url)
    }

    /// Sets the method of a request.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` is not a request.
    pub fn set_request_method(&mut self, id: &str, method: HttpMethod) -> ApplicationResult<()> {
        self.update_request(id, |request| request.method = method)
    }

    /// Switches the body of a request to another kind, converting its data.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` is not a request.
    pub fn set_request_body_kind(&mut self, id: &str, kind: BodyKind) -> ApplicationResult<()> {
        let ids = Arc::clone(&self.ids);
        self.update_request(id, |request| {
            request.body = request.body.convert(kind, ids.as_ref());
        })
    }

    /// Sets how many times a request or group runs.
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` for zero runs and `NotFound` for a missing entry.
    pub fn set_runs(&mut self, id: &str, runs: u32) -> ApplicationResult<()> {
        self.workspace
            .requests
            .update(id, |entry| entry.set_runs(runs))??;
        self.touch();
        Ok(())
    }

    /// Sets whether a group runs its children one after another or at once.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` is not a group.
    pub fn set_group_execution(&mut self, id: &str, execution: GroupExecution) -> ApplicationResult<()> {
        self.update_group(id, |group| group.execution = execution)
    }

    /// Sets a parameter selection of a request or group.
    ///
    /// Entity selections are checked against the parameter index and cache
    /// the entity's current name.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the entry or the selected entity does not exist.
    pub fn set_selection(&mut self, id: &str, kind: ParameterKind, selection: Selection) -> ApplicationResult<()> {
        let selection = self.normalize(kind, selection)?;
        self.workspace
            .requests
            .update(id, |entry| *entry.selections_mut().get_mut(kind) = selection)?;
        self.touch();
        Ok(())
    }

    /// Sets a workspace-wide default selection.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the selected entity does not exist.
    pub fn set_default_selection(&mut self, kind: ParameterKind, selection: Selection) -> ApplicationResult<()> {
        let selection = self.normalize(kind, selection)?;
        *self.workspace.defaults.get_mut(kind) = selection;
        self.touch();
        Ok(())
    }

    fn normalize(&self, kind: ParameterKind, selection: Selection) -> ApplicationResult<Selection> {
        match selection {
            Selection::Entity { id, .. } => {
                let name = self.workspace.parameter_name(kind, &id)?.to_string();
                Ok(Selection::entity(id, name))
            }
            other => Ok(other),
        }
    }

    // ------------------------------------------------------------------
    // Parameters
    // ------------------------------------------------------------------

    /// Adds an empty parameter entity right after `target`, or at the end.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the target does not exist.
    pub fn add_parameter(&mut self, kind: ParameterKind, target: Option<&str>) -> ApplicationResult<Id> {
        let id = self.ids.generate();
        self.workspace.add_parameter(kind, id.clone(), target)?;
        self.touch();
        debug!(%kind, parameter_id = %id, "Added parameter");
        Ok(id)
    }

    /// Deletes a parameter entity and resets every selection pointing at it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the entity does not exist.
    pub fn delete_parameter(&mut self, kind: ParameterKind, id: &str) -> ApplicationResult<()> {
        let cleared = self.workspace.remove_parameter(kind, id)?;
        self.touch();
        info!(%kind, parameter_id = %id, cleared, "Deleted parameter");
        Ok(())
    }

    /// Moves a parameter entity before or after another one.
    ///
    /// # Errors
    ///
    /// Returns the index error when the move is not allowed.
    pub fn move_parameter(
        &mut self,
        kind: ParameterKind,
        id: &str,
        anchor: Option<&str>,
        position: Position,
    ) -> ApplicationResult<()> {
        self.workspace.move_parameter(kind, id, anchor, position)?;
        self.touch();
        Ok(())
    }

    /// Copies a parameter entity right after itself.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the entity does not exist.
    pub fn copy_parameter(&mut self, kind: ParameterKind, id: &str) -> ApplicationResult<Id> {
        let copy = self.workspace.duplicate_parameter(
            kind,
            id,
            self.ids.as_ref(),
            &self.settings.parameter_copy_suffix,
        )?;
        self.touch();
        Ok(copy)
    }

    /// Renames a parameter entity.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the entity does not exist.
    pub fn rename_parameter(&mut self, kind: ParameterKind, id: &str, name: impl Into<String>) -> ApplicationResult<()> {
        self.workspace.rename_parameter(kind, id, name.into())?;
        self.touch();
        Ok(())
    }

    /// Changes which file a parameter entity is saved to.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the entity does not exist.
    pub fn set_parameter_persistence(
        &mut self,
        kind: ParameterKind,
        id: &str,
        persistence: Persistence,
    ) -> ApplicationResult<()> {
        self.workspace.set_parameter_persistence(kind, id, persistence)?;
        self.touch();
        Ok(())
    }

    /// Applies `update` to a scenario.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the scenario does not exist.
    pub fn update_scenario(&mut self, id: &str, update: impl FnOnce(&mut Scenario)) -> ApplicationResult<()> {
        update_entity(&mut self.workspace.scenarios, id, update)?;
        self.touch();
        Ok(())
    }

    /// Applies `update` to an authorization.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the authorization does not exist.
    pub fn update_authorization(
        &mut self,
        id: &str,
        update: impl FnOnce(&mut Authorization),
    ) -> ApplicationResult<()> {
        update_entity(&mut self.workspace.authorizations, id, update)?;
        self.touch();
        Ok(())
    }

    /// Applies `update` to a certificate.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the certificate does not exist.
    pub fn update_certificate(&mut self, id: &str, update: impl FnOnce(&mut Certificate)) -> ApplicationResult<()> {
        update_entity(&mut self.workspace.certificates, id, update)?;
        self.touch();
        Ok(())
    }

    /// Applies `update` to a proxy.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the proxy does not exist.
    pub fn update_proxy(&mut self, id: &str, update: impl FnOnce(&mut Proxy)) -> ApplicationResult<()> {
        update_entity(&mut self.workspace.proxies, id, update)?;
        self.touch();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Drop-down options for the parameters of a request or group.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the entry does not exist.
    pub fn parameter_lists(&self, id: &str) -> ApplicationResult<ParameterLists> {
        Ok(self.workspace.parameter_lists(id)?)
    }

    /// Parameters a request or group runs with.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the entry does not exist.
    pub fn effective_parameters(&self, id: &str) -> ApplicationResult<EffectiveParameters> {
        Ok(self.workspace.effective_parameters(id)?)
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Marks `id` as running and builds the engine command for it.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyRunning` if a run of `id` is in progress and
    /// `NotFound` if the entry does not exist.
    pub fn begin_run(&mut self, id: &str) -> ApplicationResult<RunCommand> {
        if self.executions.is_running(id) {
            return Err(ApplicationError::AlreadyRunning(id.to_string()));
        }
        let entry = self.workspace.requests.get(id)?;
        let execution = entry.as_group().map(|group| group.execution);
        let target = execution.map_or(RunTarget::Request, RunTarget::Group);
        let runs = entry.runs();
        let workspace = self.workspace.run_snapshot(id)?;
        let token = self.executions.begin_run(id, target);
        info!(request_id = %id, runs, token = token.value(), "Run started");
        Ok(RunCommand {
            workspace,
            target_id: id.to_string(),
            token,
            runs,
            execution,
        })
    }

    /// Stores the results of the run of `id` identified by `token`.
    ///
    /// Results are aggregated for what the run targeted when it began.
    /// Results for an entry that was deleted, is no longer running, or was
    /// restarted since are ignored.
    pub fn complete_run(&mut self, id: &str, token: RunToken, batch: &ExecutionBatch) -> CompletionOutcome {
        let outcome = self
            .executions
            .complete(id, token, batch, &self.workspace.requests);
        match outcome {
            CompletionOutcome::Applied => info!(request_id = %id, runs = batch.len(), "Run completed"),
            CompletionOutcome::Ignored => {
                debug!(request_id = %id, token = token.value(), "Ignoring late results");
            }
        }
        outcome
    }

    /// Returns `id` to idle if it is running. Returns true if it was.
    pub fn cancel_run(&mut self, id: &str) -> bool {
        let cancelled = self.executions.cancel(id);
        if cancelled {
            info!(request_id = %id, "Run cancelled");
        }
        cancelled
    }

    /// Returns `id` to idle if the run identified by `token` is still the
    /// one in progress. Returns true if it was.
    ///
    /// Used when a run ends without results, so that a failure of a
    /// superseded run does not stop the current one.
    pub fn abandon_run(&mut self, id: &str, token: RunToken) -> bool {
        let abandoned = self.executions.cancel_run(id, token);
        if abandoned {
            info!(request_id = %id, token = token.value(), "Run abandoned");
        }
        abandoned
    }
}
