//! Read side of the indexed store, plus filter-based revocation.
//!
//! A filter is answered from exactly one index, the most specific one it
//! names (see [`IndexScope::resolve`]). Members whose record is gone are
//! dangling; they are dropped from the result and pruned from the indexes
//! the filter names. Records are then checked against the whole filter,
//! since a coarser index does not enforce the finer components.

use passport_kv::WriteBatch;
use tracing::{debug, instrument, warn};

use super::{IndexedGrantStore, LogScope};
use crate::GrantResult;
use crate::keys::IndexScope;
use crate::record;
use crate::types::{Grant, GrantFilter};

/// Members of one index, split by the state of their records.
#[derive(Debug, Default)]
pub(super) struct IndexSnapshot {
    /// Index key the members were read from.
    pub(super) index_key: String,
    /// Members with a readable record.
    pub(super) present: Vec<Grant>,
    /// Members whose record is missing or expired.
    pub(super) dangling: Vec<String>,
    /// Members whose record exists but does not decode.
    pub(super) corrupt: usize,
}

impl IndexSnapshot {
    /// Number of members whose record still exists.
    pub(super) fn stored(&self) -> usize {
        self.present.len() + self.corrupt
    }
}

impl IndexedGrantStore {
    #[instrument(skip(self))]
    pub(super) async fn get_grant(&self, key: &str) -> GrantResult<Option<Grant>> {
        if key.is_empty() {
            return Ok(None);
        }
        let fields = self
            .backend
            .hash_get_all(&self.keys.primary_key(key))
            .await
            .map_err(|e| LogScope::default().fail("get", e))?;

        match record::decode(fields) {
            Ok(grant) => Ok(grant),
            Err(e) => {
                warn!(error = %e, "Ignoring corrupt grant record");
                Ok(None)
            }
        }
    }

    #[instrument(
        skip(self, filter),
        fields(
            subject_id = %filter.subject_id,
            client_id = filter.client(),
            grant_type = filter.grant_type(),
            session_id = filter.session(),
        )
    )]
    pub(super) async fn find_grants(&self, filter: &GrantFilter) -> GrantResult<Vec<Grant>> {
        filter.validate()?;

        let index_key = self.keys.index_key(&IndexScope::resolve(filter));
        let snapshot = self
            .load_index(index_key, LogScope::of_filter(filter), "get_all")
            .await?;
        if !snapshot.dangling.is_empty() {
            self.prune_dangling(filter, &snapshot.dangling).await;
        }

        let grants: Vec<Grant> = snapshot
            .present
            .into_iter()
            .filter(|grant| filter.matches(grant))
            .collect();

        debug!(
            index = %snapshot.index_key,
            found = grants.len(),
            dangling = snapshot.dangling.len(),
            corrupt = snapshot.corrupt,
            "Resolved grants"
        );
        Ok(grants)
    }

    /// Deletes every grant matching `filter` and unlinks it from all four of
    /// its indexes in one batch.
    ///
    /// The resolved index key is deleted as a whole only when every member
    /// with a stored record matched; otherwise the other members keep their
    /// membership.
    #[instrument(
        skip(self, filter),
        fields(
            subject_id = %filter.subject_id,
            client_id = filter.client(),
            grant_type = filter.grant_type(),
            session_id = filter.session(),
        )
    )]
    pub(super) async fn revoke_matching(&self, filter: &GrantFilter) -> GrantResult<()> {
        filter.validate()?;

        let index_key = self.keys.index_key(&IndexScope::resolve(filter));
        let snapshot = self
            .load_index(index_key, LogScope::of_filter(filter), "remove_all")
            .await?;
        let total = snapshot.stored();
        let matching: Vec<&Grant> = snapshot
            .present
            .iter()
            .filter(|grant| filter.matches(grant))
            .collect();

        let mut batch = WriteBatch::new();
        for grant in &matching {
            batch.delete(self.keys.primary_key(&grant.key));
            for index in self.keys.grant_index_keys(grant) {
                batch.set_remove(index, [grant.key.as_str()]);
            }
        }
        if !snapshot.dangling.is_empty() {
            for index in self.keys.filter_index_keys(filter) {
                batch.set_remove(index, snapshot.dangling.iter().map(String::as_str));
            }
        }
        if matching.len() == total {
            batch.delete(snapshot.index_key.as_str());
        }

        if batch.is_empty() {
            return Ok(());
        }
        self.backend
            .execute(batch)
            .await
            .map_err(|e| LogScope::of_filter(filter).fail("remove_all", e))?;

        debug!(
            index = %snapshot.index_key,
            removed = matching.len(),
            kept = total - matching.len(),
            dangling = snapshot.dangling.len(),
            "Revoked grants by filter"
        );
        Ok(())
    }

    /// Reads one index and the records of its members.
    pub(super) async fn load_index(
        &self,
        index_key: String,
        scope: LogScope<'_>,
        operation: &'static str,
    ) -> GrantResult<IndexSnapshot> {
        let members = self
            .backend
            .set_members(&index_key)
            .await
            .map_err(|e| scope.fail(operation, e))?;
        if members.is_empty() {
            return Ok(IndexSnapshot {
                index_key,
                ..IndexSnapshot::default()
            });
        }

        let primaries: Vec<String> = members.iter().map(|m| self.keys.primary_key(m)).collect();
        let records = self
            .backend
            .hash_get_all_many(&primaries)
            .await
            .map_err(|e| scope.fail(operation, e))?;

        let mut snapshot = IndexSnapshot {
            index_key,
            ..IndexSnapshot::default()
        };
        for (member, fields) in members.into_iter().zip(records) {
            match record::decode(fields) {
                Ok(Some(grant)) => snapshot.present.push(grant),
                Ok(None) => snapshot.dangling.push(member),
                Err(e) => {
                    warn!(key = %member, error = %e, "Ignoring corrupt grant record");
                    snapshot.corrupt += 1;
                }
            }
        }

        debug!(
            index = %snapshot.index_key,
            members = snapshot.stored() + snapshot.dangling.len(),
            "Loaded index"
        );
        Ok(snapshot)
    }

    /// Removes dangling members from every index the filter names.
    ///
    /// Failure is logged and swallowed: the next read retries the cleanup.
    async fn prune_dangling(&self, filter: &GrantFilter, dangling: &[String]) {
        let mut batch = WriteBatch::new();
        for index in self.keys.filter_index_keys(filter) {
            batch.set_remove(index, dangling.iter().map(String::as_str));
        }

        match self.backend.execute(batch).await {
            Ok(()) => debug!(pruned = dangling.len(), "Pruned dangling index references"),
            Err(e) => warn!(
                pruned = dangling.len(),
                error = %e,
                "Failed to prune dangling index references"
            ),
        }
    }
}
