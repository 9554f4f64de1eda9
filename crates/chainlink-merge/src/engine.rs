//! The [`MergeEngine`]: the only writer of `merge_target_id`.

use serde::Serialize;
use tracing::{debug, info, warn};

use chainlink_graph::{Entity, IntegrityError, MergeGraph};
use chainlink_store::{EntityStore, EntityTx};
use chainlink_types::{EntityId, MergeRole};

use crate::association::{Association, AssociationKind, Reassignment};
use crate::error::{DirectionViolation, MergeError, MergeResult};

/// Result of a committed merge.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MergeOutcome<E> {
    /// The surviving record as committed.
    pub target: E,
    /// The merged-away record, now pointing at `target`.
    pub source: E,
    /// Child rows moved per requested association, in request order.
    pub reassignments: Vec<Reassignment>,
}

impl<E> MergeOutcome<E> {
    /// Child rows moved across all associations.
    pub fn moved(&self) -> u64 {
        self.reassignments.iter().map(|r| r.moved).sum()
    }
}

/// Performs pairwise merges on one mergeable table.
///
/// Every merge runs in a single write transaction: legality is checked
/// against the transaction's own view of storage, then child rows are moved,
/// the reconcile callback runs, the source's pointer is claimed and both
/// records are saved. Any error rolls all of it back.
pub struct MergeEngine<E, S> {
    graph: MergeGraph<E, S>,
    associations: Vec<Association>,
}

impl<E: Entity, S: EntityStore> MergeEngine<E, S> {
    pub fn new(graph: MergeGraph<E, S>) -> Self {
        Self {
            graph,
            associations: Vec::new(),
        }
    }

    /// Engine with a set of associations registered up front.
    pub fn with_associations(
        graph: MergeGraph<E, S>,
        associations: impl IntoIterator<Item = Association>,
    ) -> MergeResult<Self> {
        let mut engine = Self::new(graph);
        for association in associations {
            engine.register(association)?;
        }
        Ok(engine)
    }

    /// Declare an association. Names must be unique per engine.
    pub fn register(&mut self, association: Association) -> MergeResult<()> {
        association.validate()?;
        if self.association(&association.name).is_some() {
            return Err(MergeError::Configuration(format!(
                "association {:?} is already registered on {}",
                association.name,
                self.table()
            )));
        }
        debug!(
            table = %self.table(),
            association = %association.name,
            kind = %association.kind,
            child = %association.table,
            "registered association"
        );
        self.associations.push(association);
        Ok(())
    }

    pub fn graph(&self) -> &MergeGraph<E, S> {
        &self.graph
    }

    pub fn associations(&self) -> &[Association] {
        &self.associations
    }

    pub fn association(&self, name: &str) -> Option<&Association> {
        self.associations.iter().find(|a| a.name == name)
    }

    // ---------------------------------------------------------------
    // Merging
    // ---------------------------------------------------------------

    /// Merge `source` into `target`.
    ///
    /// On success both arguments are replaced with their committed state and
    /// the target is returned. On failure neither argument nor storage is
    /// changed. Attribute edits made to the arguments before the call are not
    /// saved; use [`merge_with`](Self::merge_with) to change fields as part
    /// of the merge.
    pub fn merge(&self, target: &mut E, source: &mut E) -> MergeResult<E> {
        self.merge_with(target, source, |_, _| Ok(()))
    }

    /// Merge with a callback that reconciles fields before both records are
    /// saved, e.g. copying attributes the target lacks from the source.
    ///
    /// Only the columns the callback changes are written, so values
    /// committed by other writers since the records were loaded survive.
    ///
    /// The callback must not change either record's id or merge pointer;
    /// doing so aborts the merge with [`IntegrityError::IdentityMutated`].
    /// An error returned by the callback aborts the merge unchanged.
    ///
    /// The callback runs inside the merge transaction while the store's
    /// connection is held. It must not call back into the store (for
    /// example `engine.graph().find(..)`): with [`SqliteEntityStore`] that
    /// call blocks on the same connection lock and never returns.
    ///
    /// [`SqliteEntityStore`]: chainlink_store::SqliteEntityStore
    pub fn merge_with<F>(&self, target: &mut E, source: &mut E, reconcile: F) -> MergeResult<E>
    where
        F: FnOnce(&mut E, &mut E) -> MergeResult<()>,
    {
        self.execute(target, source, &[], reconcile)
            .map(|outcome| outcome.target)
    }

    /// Reassign the named associations from `source` to `target` and merge,
    /// all in one transaction.
    pub fn merge_with_associations<I>(
        &self,
        target: &mut E,
        source: &mut E,
        names: I,
    ) -> MergeResult<MergeOutcome<E>>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let selected = self.lookup(names)?;
        self.execute(target, source, &selected, |_, _| Ok(()))
    }

    /// Move child rows of the named associations from `source` to `target`
    /// without merging.
    ///
    /// Collections are moved with one bulk update each. Singular
    /// associations are skipped and report zero rows. All names are checked
    /// before anything is written.
    pub fn reassign_associations<I>(
        &self,
        target: &E,
        source: &E,
        names: I,
    ) -> MergeResult<Vec<Reassignment>>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let selected = self.lookup(names)?;
        let (to, from) = (target.id(), source.id());
        self.graph
            .store()
            .transaction(|tx| self.reassign_in(tx, &selected, to, from))
    }

    fn execute<F>(
        &self,
        target: &mut E,
        source: &mut E,
        associations: &[&Association],
        reconcile: F,
    ) -> MergeResult<MergeOutcome<E>>
    where
        F: FnOnce(&mut E, &mut E) -> MergeResult<()>,
    {
        let target_id = target.id();
        let source_id = source.id();

        if target_id == source_id {
            return Err(self.direction(MergeRole::Source, source_id, DirectionViolation::SelfMerge));
        }
        if self.graph.is_merged(source) {
            return Err(self.direction(MergeRole::Source, source_id, DirectionViolation::AlreadyMerged));
        }
        if self.graph.is_merged(target) {
            return Err(self.direction(MergeRole::Target, target_id, DirectionViolation::AlreadyMerged));
        }

        let mut work_target = target.clone();
        let mut work_source = source.clone();
        let schema = self.graph.schema();

        let outcome = self.graph.store().transaction(|tx| -> MergeResult<MergeOutcome<E>> {
            self.validate_in(tx, target_id, source_id)?;
            let reassignments = self.reassign_in(tx, associations, target_id, source_id)?;

            reconcile(&mut work_target, &mut work_source)?;
            self.check_identity(&work_target, &*target)?;
            self.check_identity(&work_source, &*source)?;

            match tx.claim_merge_target(schema, source_id, target_id) {
                Ok(true) => {}
                Ok(false) => {
                    warn!(table = %schema.table, source = %source_id, "merge target claimed concurrently");
                    return Err(self.direction(
                        MergeRole::Source,
                        source_id,
                        DirectionViolation::ConcurrentMerge,
                    ));
                }
                Err(e) if e.is_constraint_violation() => {
                    return Err(IntegrityError::DanglingReference {
                        table: schema.table.clone(),
                        id: source_id,
                        target: target_id,
                    }
                    .into());
                }
                Err(e) => return Err(e.into()),
            }

            self.save_changes(tx, &work_source, &*source)?;
            self.save_changes(tx, &work_target, &*target)?;

            Ok(MergeOutcome {
                target: self.graph.fetch_in(tx, target_id)?,
                source: self.graph.fetch_in(tx, source_id)?,
                reassignments,
            })
        })?;

        info!(
            table = %schema.table,
            target = %target_id,
            source = %source_id,
            moved = outcome.moved(),
            "merged records"
        );
        *target = outcome.target.clone();
        *source = outcome.source.clone();
        Ok(outcome)
    }

    /// Re-check legality against storage under the write lock.
    fn validate_in(&self, tx: &dyn EntityTx, target: EntityId, source: EntityId) -> MergeResult<()> {
        let stored_source = self.graph.fetch_in(tx, source)?;
        if self.graph.is_merged(&stored_source) {
            warn!(table = %self.table(), source = %source, "source was merged since it was loaded");
            return Err(self.direction(MergeRole::Source, source, DirectionViolation::AlreadyMerged));
        }
        if self.graph.has_incoming_merges_in(tx, source)? {
            return Err(self.direction(MergeRole::Source, source, DirectionViolation::HasIncomingMerges));
        }

        let stored_target = self.graph.fetch_in(tx, target)?;
        if self.graph.is_merged(&stored_target) {
            warn!(table = %self.table(), target = %target, "target was merged since it was loaded");
            return Err(self.direction(MergeRole::Target, target, DirectionViolation::AlreadyMerged));
        }
        Ok(())
    }

    fn reassign_in(
        &self,
        tx: &dyn EntityTx,
        associations: &[&Association],
        to: EntityId,
        from: EntityId,
    ) -> MergeResult<Vec<Reassignment>> {
        associations
            .iter()
            .map(|association| {
                let moved = match association.kind {
                    AssociationKind::Collection => tx.reassign_foreign_key(
                        &association.table,
                        &association.foreign_key,
                        from,
                        to,
                    )?,
                    AssociationKind::Singular => {
                        debug!(
                            association = %association.name,
                            "singular association is not reassigned"
                        );
                        0
                    }
                };
                debug!(association = %association.name, moved, %from, %to, "reassigned");
                Ok(Reassignment {
                    association: association.name.clone(),
                    kind: association.kind,
                    moved,
                })
            })
            .collect()
    }

    fn lookup<I>(&self, names: I) -> MergeResult<Vec<&Association>>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                self.association(name).ok_or_else(|| {
                    MergeError::Configuration(format!(
                        "unknown association {name:?} on {}",
                        self.table()
                    ))
                })
            })
            .collect()
    }

    /// Write the columns of `edited` that differ from `loaded`, if any.
    fn save_changes(&self, tx: &dyn EntityTx, edited: &E, loaded: &E) -> MergeResult<()> {
        let row = edited.to_row();
        let changed = row.changed_columns(&loaded.to_row());
        if changed.is_empty() {
            return Ok(());
        }
        debug!(table = %self.table(), id = %row.id, columns = changed.len(), "saving reconciled columns");
        tx.update_columns(self.graph.schema(), &row, &changed)?;
        Ok(())
    }

    fn check_identity(&self, edited: &E, original: &E) -> MergeResult<()> {
        let field = if edited.id() != original.id() {
            "id"
        } else if edited.merge_target_id() != original.merge_target_id() {
            "merge_target_id"
        } else {
            return Ok(());
        };
        Err(IntegrityError::IdentityMutated {
            table: self.table().to_string(),
            id: original.id(),
            field,
        }
        .into())
    }

    fn direction(&self, role: MergeRole, id: EntityId, violation: DirectionViolation) -> MergeError {
        MergeError::Direction {
            table: self.table().to_string(),
            role,
            id,
            violation,
        }
    }

    fn table(&self) -> &str {
        &self.graph.schema().table
    }
}
