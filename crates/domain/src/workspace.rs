//! The workspace aggregate: the request tree plus the four parameter indices.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::DomainResult;
use crate::id::{Id, IdGenerator};
use crate::index::{FlatSnapshot, IndexedEntities, NestedIndex, NestedSnapshot, Position};
use crate::resolution::{
    EffectiveParameters, ParameterLists, find_matching, resolve_effective, resolve_inherited,
    selection_options,
};
use crate::workbook::{
    Authorization, Certificate, ParameterEntity, ParameterFile, ParameterKind, Persistence, Proxy,
    RequestEntry, Scenario, Selection, Selections, Workbook, WorkbookFiles,
};

/// Runs `$body` with `$index` bound to the parameter index of `$kind`.
macro_rules! with_index {
    (mut $owner:expr, $kind:expr, |$index:ident| $body:expr) => {
        match $kind {
            ParameterKind::Scenario => {
                let $index = &mut $owner.scenarios;
                $body
            }
            ParameterKind::Authorization => {
                let $index = &mut $owner.authorizations;
                $body
            }
            ParameterKind::Certificate => {
                let $index = &mut $owner.certificates;
                $body
            }
            ParameterKind::Proxy => {
                let $index = &mut $owner.proxies;
                $body
            }
        }
    };
    ($owner:expr, $kind:expr, |$index:ident| $body:expr) => {
        match $kind {
            ParameterKind::Scenario => {
                let $index = &$owner.scenarios;
                $body
            }
            ParameterKind::Authorization => {
                let $index = &$owner.authorizations;
                $body
            }
            ParameterKind::Certificate => {
                let $index = &$owner.certificates;
                $body
            }
            ParameterKind::Proxy => {
                let $index = &$owner.proxies;
                $body
            }
        }
    };
}

/// Everything a workbook edits.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Workspace {
    /// Request tree.
    pub requests: NestedIndex<RequestEntry>,
    /// Scenarios.
    pub scenarios: IndexedEntities<Scenario>,
    /// Authorizations.
    pub authorizations: IndexedEntities<Authorization>,
    /// Certificates.
    pub certificates: IndexedEntities<Certificate>,
    /// Proxies.
    pub proxies: IndexedEntities<Proxy>,
    /// Workspace-wide default selections.
    pub defaults: Selections,
}

/// Indexed form of a workspace, as handed to the execution engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSnapshot {
    /// Request tree.
    pub requests: NestedSnapshot<RequestEntry>,
    /// Scenarios.
    pub scenarios: FlatSnapshot<Scenario>,
    /// Authorizations.
    pub authorizations: FlatSnapshot<Authorization>,
    /// Certificates.
    pub certificates: FlatSnapshot<Certificate>,
    /// Proxies.
    pub proxies: FlatSnapshot<Proxy>,
    /// Workspace-wide default selections.
    #[serde(default)]
    pub defaults: Selections,
}

fn merge<T: ParameterEntity>(
    index: &mut IndexedEntities<T>,
    entities: Vec<T>,
    persistence: Persistence,
) -> DomainResult<()> {
    for mut entity in entities {
        entity.set_persistence(persistence);
        if let Ok(existing) = index.get_mut(entity.id()) {
            *existing = entity;
        } else {
            index.insert(entity, None)?;
        }
    }
    Ok(())
}

fn split<T: ParameterEntity>(index: &IndexedEntities<T>) -> (Vec<T>, Vec<T>, Vec<T>) {
    let mut workbook = Vec::new();
    let mut private = Vec::new();
    let mut global = Vec::new();
    for entity in index.iter() {
        match entity.persistence() {
            Persistence::Workbook => workbook.push(entity.clone()),
            Persistence::Private => private.push(entity.clone()),
            Persistence::Global => global.push(entity.clone()),
        }
    }
    (workbook, private, global)
}

impl Workspace {
    /// An empty workspace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a workspace from its files.
    ///
    /// Parameters are merged global first, then private, then workbook; an
    /// entity id found in several files keeps its first position and takes
    /// the content of the last file. Each entity is tagged with the
    /// persistence of the file it came from.
    ///
    /// # Errors
    ///
    /// Returns an index error if the request tree is malformed.
    pub fn from_files(
        workbook: Workbook,
        private: Option<ParameterFile>,
        global: Option<ParameterFile>,
    ) -> DomainResult<Self> {
        let mut workspace = Self {
            requests: NestedIndex::from_serializable(workbook.requests)?,
            defaults: workbook.defaults,
            ..Self::default()
        };

        let sources = [
            (global.unwrap_or_default(), Persistence::Global),
            (private.unwrap_or_default(), Persistence::Private),
            (
                ParameterFile {
                    version: workbook.version,
                    scenarios: workbook.scenarios,
                    authorizations: workbook.authorizations,
                    certificates: workbook.certificates,
                    proxies: workbook.proxies,
                },
                Persistence::Workbook,
            ),
        ];
        for (file, persistence) in sources {
            merge(&mut workspace.scenarios, file.scenarios, persistence)?;
            merge(&mut workspace.authorizations, file.authorizations, persistence)?;
            merge(&mut workspace.certificates, file.certificates, persistence)?;
            merge(&mut workspace.proxies, file.proxies, persistence)?;
        }
        Ok(workspace)
    }

    /// Splits the workspace into its files by parameter persistence.
    #[must_use]
    pub fn to_files(&self) -> WorkbookFiles {
        let (scenarios, private_scenarios, global_scenarios) = split(&self.scenarios);
        let (authorizations, private_authorizations, global_authorizations) = split(&self.authorizations);
        let (certificates, private_certificates, global_certificates) = split(&self.certificates);
        let (proxies, private_proxies, global_proxies) = split(&self.proxies);

        WorkbookFiles {
            workbook: Workbook {
                requests: self.requests.to_serializable(),
                scenarios,
                authorizations,
                certificates,
                proxies,
                defaults: self.defaults.clone(),
                ..Workbook::default()
            },
            private: ParameterFile {
                scenarios: private_scenarios,
                authorizations: private_authorizations,
                certificates: private_certificates,
                proxies: private_proxies,
                ..ParameterFile::default()
            },
            global: ParameterFile {
                scenarios: global_scenarios,
                authorizations: global_authorizations,
                certificates: global_certificates,
                proxies: global_proxies,
                ..ParameterFile::default()
            },
        }
    }

    /// Indexed form of the whole workspace.
    #[must_use]
    pub fn snapshot(&self) -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            requests: self.requests.snapshot(),
            scenarios: self.scenarios.snapshot(),
            authorizations: self.authorizations.snapshot(),
            certificates: self.certificates.snapshot(),
            proxies: self.proxies.snapshot(),
            defaults: self.defaults.clone(),
        }
    }

    /// Indexed form restricted to what running `id` needs: its ancestors
    /// (for inherited selections), its subtree and every parameter.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` is not in the tree.
    pub fn run_snapshot(&self, id: &str) -> DomainResult<WorkspaceSnapshot> {
        Ok(WorkspaceSnapshot {
            requests: self.requests.subset(id)?.snapshot(),
            ..self.snapshot_without_requests()
        })
    }

    fn snapshot_without_requests(&self) -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            requests: NestedSnapshot::default(),
            scenarios: self.scenarios.snapshot(),
            authorizations: self.authorizations.snapshot(),
            certificates: self.certificates.snapshot(),
            proxies: self.proxies.snapshot(),
            defaults: self.defaults.clone(),
        }
    }

    /// Rebuilds a workspace from its indexed form.
    ///
    /// # Errors
    ///
    /// Returns `InconsistentIndex` if any index is malformed.
    pub fn from_snapshot(snapshot: WorkspaceSnapshot) -> DomainResult<Self> {
        Ok(Self {
            requests: NestedIndex::from_snapshot(snapshot.requests)?,
            scenarios: IndexedEntities::from_snapshot(snapshot.scenarios)?,
            authorizations: IndexedEntities::from_snapshot(snapshot.authorizations)?,
            certificates: IndexedEntities::from_snapshot(snapshot.certificates)?,
            proxies: IndexedEntities::from_snapshot(snapshot.proxies)?,
            defaults: snapshot.defaults,
        })
    }

    /// Effective parameters of a request or group, falling back to the
    /// workspace defaults for kinds its ancestors leave unconfigured.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` is not in the tree.
    pub fn effective_parameters(&self, id: &str) -> DomainResult<EffectiveParameters> {
        Ok(resolve_effective(&self.requests, id)?.with_defaults(&self.defaults))
    }

    /// Drop-down options for every parameter kind of a request or group.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `id` is not in the tree.
    pub fn parameter_lists(&self, id: &str) -> DomainResult<ParameterLists> {
        let inherited = resolve_inherited(&self.requests, id)?.with_defaults(&self.defaults);
        Ok(ParameterLists {
            scenarios: selection_options(&inherited.scenario, &self.scenarios),
            authorizations: selection_options(&inherited.authorization, &self.authorizations),
            certificates: selection_options(&inherited.certificate, &self.certificates),
            proxies: selection_options(&inherited.proxy, &self.proxies),
        })
    }

    /// Adds an empty parameter entity right after `target`, or at the end
    /// when there is no target.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateId` if the id is taken and `NotFound` if the target
    /// is missing.
    pub fn add_parameter(&mut self, kind: ParameterKind, id: Id, target: Option<&str>) -> DomainResult<()> {
        fn place<T: ParameterEntity>(
            index: &mut IndexedEntities<T>,
            entity: T,
            target: Option<&str>,
        ) -> DomainResult<()> {
            match target {
                Some(target) => index.insert_after(entity, target),
                None => index.insert(entity, None),
            }
        }

        match kind {
            ParameterKind::Scenario => place(&mut self.scenarios, Scenario::new(id, ""), target),
            ParameterKind::Authorization => place(&mut self.authorizations, Authorization::basic(id), target),
            ParameterKind::Certificate => place(&mut self.certificates, Certificate::pem(id), target),
            ParameterKind::Proxy => place(&mut self.proxies, Proxy::new(id, "", ""), target),
        }
    }

    /// Display name of a parameter entity.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the entity does not exist.
    pub fn parameter_name(&self, kind: ParameterKind, id: &str) -> DomainResult<&str> {
        with_index!(self, kind, |index| index.get(id).map(Entity::name))
    }

    /// Ids of one parameter kind, in order.
    #[must_use]
    pub fn parameter_ids(&self, kind: ParameterKind) -> &[Id] {
        with_index!(self, kind, |index| index.ids())
    }

    /// Removes a parameter entity and resets every selection pointing at it
    /// to inherit. Returns how many selections were reset.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the entity does not exist.
    pub fn remove_parameter(&mut self, kind: ParameterKind, id: &str) -> DomainResult<usize> {
        with_index!(mut self, kind, |index| index.remove(id).map(|_| ()))?;
        Ok(self.clear_references(kind, id))
    }

    /// Moves a parameter entity before or after another one.
    ///
    /// # Errors
    ///
    /// See [`IndexedEntities::move_entity`].
    pub fn move_parameter(
        &mut self,
        kind: ParameterKind,
        id: &str,
        anchor: Option<&str>,
        position: Position,
    ) -> DomainResult<()> {
        with_index!(mut self, kind, |index| index.move_entity(id, anchor, position))
    }

    /// Copies a parameter entity right after itself.
    ///
    /// # Errors
    ///
    /// See [`IndexedEntities::duplicate`].
    pub fn duplicate_parameter(
        &mut self,
        kind: ParameterKind,
        id: &str,
        ids: &dyn IdGenerator,
        suffix: &str,
    ) -> DomainResult<Id> {
        with_index!(mut self, kind, |index| index.duplicate(id, ids, suffix))
    }

    /// Renames a parameter entity.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the entity does not exist.
    pub fn rename_parameter(&mut self, kind: ParameterKind, id: &str, name: String) -> DomainResult<()> {
        with_index!(mut self, kind, |index| index.get_mut(id).map(|e| e.set_name(name)))
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
    ) -> DomainResult<()> {
        with_index!(mut self, kind, |index| index
            .get_mut(id)
            .map(|e| e.set_persistence(persistence)))
    }

    /// Resets every selection of `kind` referencing `id` to inherit, in the
    /// request tree, the workspace defaults and OAuth2 authorizations.
    /// Returns how many were reset.
    pub fn clear_references(&mut self, kind: ParameterKind, id: &str) -> usize {
        let mut cleared = 0;
        for entry in self.requests.values_mut() {
            cleared += usize::from(entry.selections_mut().clear_reference(kind, id));
        }
        for authorization in self.authorizations.values_mut() {
            cleared += usize::from(authorization.clear_reference(kind, id));
        }
        cleared += usize::from(self.defaults.clear_reference(kind, id));
        cleared
    }

    /// Checks every selection against the parameter indices.
    ///
    /// Selections that only match by name are repointed to the matching
    /// entity's id; selections that match nothing are reset to inherit and
    /// reported.
    pub fn validate_selections(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        let mut defaults = std::mem::take(&mut self.defaults);
        self.repair(&mut defaults, "none", &mut warnings);
        self.defaults = defaults;

        let ids: Vec<Id> = self.requests.iter().map(|e| e.id().to_string()).collect();
        for id in ids {
            let Ok(entry) = self.requests.get_mut(&id) else {
                continue;
            };
            let mut selections = std::mem::take(entry.selections_mut());
            self.repair(&mut selections, "parent", &mut warnings);
            if let Ok(entry) = self.requests.get_mut(&id) {
                *entry.selections_mut() = selections;
            }
        }
        warnings
    }

    fn repair(&self, selections: &mut Selections, fallback: &str, warnings: &mut Vec<String>) {
        for kind in ParameterKind::ALL {
            let selection = selections.get_mut(kind);
            let Selection::Entity { id, name } = &*selection else {
                continue;
            };
            match self.match_selection(kind, selection) {
                Some((found_id, found_name)) => {
                    if found_id != *id {
                        *selection = Selection::entity(found_id, found_name);
                    }
                }
                None => {
                    warnings.push(format!(
                        "Unable to locate {kind} (ID: {id}, Name: {name}), defaulting to {fallback}"
                    ));
                    *selection = Selection::Inherit;
                }
            }
        }
    }

    fn match_selection(&self, kind: ParameterKind, selection: &Selection) -> Option<(Id, String)> {
        with_index!(self, kind, |index| find_matching(selection, index)
            .map(|e| (e.id().to_string(), e.name().to_string())))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::index::TreeNode;
    use crate::resolution::ResolvedParameter;
    use crate::workbook::{AuthorizationKind, Request, RequestGroup};

    fn workbook() -> Workbook {
        Workbook {
            requests: vec![TreeNode::with_children(
                RequestGroup::new("g")
                    .with_selection(ParameterKind::Scenario, Selection::entity("s1", "Dev"))
                    .into(),
                vec![TreeNode::leaf(
                    Request::new("r")
                        .with_selection(ParameterKind::Proxy, Selection::entity("p1", "Corp"))
                        .into(),
                )],
            )],
            scenarios: vec![Scenario::new("s1", "Dev")],
            proxies: vec![Proxy::new("p1", "Corp", "http://proxy:3128")],
            ..Workbook::default()
        }
    }

    fn private_file() -> ParameterFile {
        ParameterFile {
            scenarios: vec![Scenario::new("s2", "Secrets")],
            authorizations: vec![Authorization::basic("a1")],
            ..ParameterFile::default()
        }
    }

    #[test]
    fn test_files_round_trip_by_persistence() {
        let global = ParameterFile {
            proxies: vec![Proxy::new("p2", "Home", "http://home:8080")],
            ..ParameterFile::default()
        };
        let workspace =
            Workspace::from_files(workbook(), Some(private_file()), Some(global.clone())).unwrap();

        assert_eq!(workspace.scenarios.ids(), ["s2", "s1"]);
        assert_eq!(workspace.proxies.ids(), ["p2", "p1"]);
        assert_eq!(workspace.scenarios.get("s2").unwrap().persistence, Persistence::Private);
        assert_eq!(workspace.proxies.get("p2").unwrap().persistence, Persistence::Global);

        let files = workspace.to_files();
        assert_eq!(files.workbook.scenarios, vec![Scenario::new("s1", "Dev")]);
        assert_eq!(files.private.scenarios[0].id, "s2");
        assert_eq!(files.private.authorizations[0].id, "a1");
        assert_eq!(files.global.proxies[0].id, "p2");
        assert_eq!(files.workbook.requests, workbook().requests);
    }

    #[test]
    fn test_workbook_wins_on_duplicate_ids() {
        let private = ParameterFile {
            scenarios: vec![Scenario::new("s1", "Shadowed")],
            ..ParameterFile::default()
        };
        let workspace = Workspace::from_files(workbook(), Some(private), None).unwrap();

        assert_eq!(workspace.scenarios.len(), 1);
        let scenario = workspace.scenarios.get("s1").unwrap();
        assert_eq!(scenario.name, "Dev");
        assert_eq!(scenario.persistence, Persistence::Workbook);
    }

    #[test]
    fn test_remove_parameter_clears_references() {
        let mut workspace = Workspace::from_files(workbook(), Some(private_file()), None).unwrap();
        workspace.defaults.selected_proxy = Selection::entity("p1", "Corp");
        workspace.authorizations.insert(
            Authorization::new(
                "a2",
                "OAuth",
                AuthorizationKind::OAuth2Client {
                    access_token_url: String::new(),
                    client_id: String::new(),
                    client_secret: String::new(),
                    scope: None,
                    selected_certificate: Selection::Inherit,
                    selected_proxy: Selection::entity("p1", "Corp"),
                },
            ),
            None,
        )
        .unwrap();

        let cleared = workspace.remove_parameter(ParameterKind::Proxy, "p1").unwrap();

        assert_eq!(cleared, 3);
        assert!(workspace.proxies.is_empty());
        let request = workspace.requests.get("r").unwrap();
        assert!(request.selections().selected_proxy.is_inherit());
        assert!(workspace.defaults.selected_proxy.is_inherit());
        assert!(workspace.remove_parameter(ParameterKind::Proxy, "p1").is_err());
    }

    #[test]
    fn test_validate_selections() {
        let mut wb = workbook();
        wb.defaults.selected_certificate = Selection::entity("c9", "Gone");
        wb.scenarios = vec![Scenario::new("s1-renumbered", "DEV")];
        let mut workspace = Workspace::from_files(wb, None, None).unwrap();

        let warnings = workspace.validate_selections();

        assert_eq!(
            warnings,
            vec!["Unable to locate certificate (ID: c9, Name: Gone), defaulting to none".to_string()]
        );
        assert!(workspace.defaults.selected_certificate.is_inherit());
        let group = workspace.requests.get("g").unwrap();
        assert_eq!(
            group.selections().selected_scenario,
            Selection::entity("s1-renumbered", "DEV")
        );
    }

    #[test]
    fn test_validate_selections_reports_requests() {
        let mut workspace = Workspace::from_files(workbook(), None, None).unwrap();
        workspace.proxies.remove("p1").unwrap();

        let warnings = workspace.validate_selections();
        assert_eq!(
            warnings,
            vec!["Unable to locate proxy (ID: p1, Name: Corp), defaulting to parent".to_string()]
        );
    }

    #[test]
    fn test_effective_parameters_use_defaults() {
        let mut workspace = Workspace::from_files(workbook(), Some(private_file()), None).unwrap();
        workspace.defaults.selected_authorization = Selection::entity("a1", "");

        let effective = workspace.effective_parameters("r").unwrap();
        assert_eq!(effective.scenario.id(), Some("s1"));
        assert_eq!(effective.authorization.id(), Some("a1"));
        assert_eq!(effective.proxy.id(), Some("p1"));
        assert_eq!(effective.certificate, ResolvedParameter::NoneConfigured);
    }

    #[test]
    fn test_parameter_lists_show_inherited_default() {
        let workspace = Workspace::from_files(workbook(), Some(private_file()), None).unwrap();
        let lists = workspace.parameter_lists("r").unwrap();

        let scenario_labels: Vec<_> = lists.scenarios.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(scenario_labels, vec!["Default (Dev)", "Off", "Secrets", "Dev"]);
        assert_eq!(lists.proxies[0].label, "Default (None Configured)");
        assert_eq!(lists.authorizations[2].label, "(Unnamed)");
    }

    #[test]
    fn test_run_snapshot_is_limited_to_chain() {
        let mut workspace = Workspace::from_files(workbook(), None, None).unwrap();
        workspace
            .requests
            .insert(Request::new("other").into(), None, None)
            .unwrap();

        let snapshot = workspace.run_snapshot("r").unwrap();
        assert_eq!(snapshot.requests.top_level_ids, vec!["g".to_string()]);
        assert!(!snapshot.requests.entities.contains_key("other"));
        assert_eq!(snapshot.proxies.top_level_ids, vec!["p1".to_string()]);

        let restored = Workspace::from_snapshot(workspace.snapshot()).unwrap();
        assert_eq!(restored, workspace);
    }

    #[test]
    fn test_add_parameter_after_target() {
        let mut workspace = Workspace::from_files(workbook(), Some(private_file()), None).unwrap();

        workspace
            .add_parameter(ParameterKind::Scenario, "s3".to_string(), Some("s2"))
            .unwrap();
        workspace
            .add_parameter(ParameterKind::Proxy, "p9".to_string(), None)
            .unwrap();

        assert_eq!(workspace.parameter_ids(ParameterKind::Scenario), ["s2", "s3", "s1"]);
        assert_eq!(workspace.parameter_ids(ParameterKind::Proxy), ["p1", "p9"]);
        assert!(workspace
            .add_parameter(ParameterKind::Certificate, "c1".to_string(), Some("missing"))
            .is_err());
        assert!(workspace.certificates.is_empty());
    }

    #[test]
    fn test_parameter_dispatch() {
        let ids = crate::id::SequentialIdGenerator::new("x");
        let mut workspace = Workspace::from_files(workbook(), Some(private_file()), None).unwrap();

        let copy = workspace
            .duplicate_parameter(ParameterKind::Scenario, "s1", &ids, " - Copy")
            .unwrap();
        assert_eq!(workspace.parameter_ids(ParameterKind::Scenario), ["s2", "s1", "x-1"]);
        assert_eq!(workspace.parameter_name(ParameterKind::Scenario, &copy).unwrap(), "Dev - Copy");

        workspace
            .move_parameter(ParameterKind::Scenario, &copy, None, Position::Before)
            .unwrap();
        assert_eq!(workspace.parameter_ids(ParameterKind::Scenario), ["x-1", "s2", "s1"]);

        workspace
            .rename_parameter(ParameterKind::Scenario, &copy, "Renamed".to_string())
            .unwrap();
        workspace
            .set_parameter_persistence(ParameterKind::Scenario, &copy, Persistence::Global)
            .unwrap();
        let scenario = workspace.scenarios.get(&copy).unwrap();
        assert_eq!(scenario.name, "Renamed");
        assert_eq!(scenario.persistence, Persistence::Global);
    }
}
