//! Write side of the indexed store: storing, removing and coarse revocation.

use std::collections::HashSet;

use passport_kv::WriteBatch;
use tracing::{debug, instrument, warn};

use super::{IndexedGrantStore, LogScope};
use crate::GrantResult;
use crate::error::GrantStoreError;
use crate::keys::IndexScope;
use crate::record;
use crate::types::{Grant, GrantFilter};

impl IndexedGrantStore {
    /// Writes the record and its index memberships in one batch.
    ///
    /// The previous record under the same key, if any, is read first so that
    /// index memberships it implied and the new grant no longer does are
    /// removed in the same batch.
    #[instrument(
        skip(self, grant),
        fields(
            key = %grant.key,
            grant_type = %grant.grant_type,
            subject_id = grant.subject(),
            client_id = %grant.client_id,
        )
    )]
    pub(super) async fn store_grant(&self, grant: &Grant) -> GrantResult<()> {
        if grant.key.is_empty() {
            return Err(GrantStoreError::validation("grant key must not be empty"));
        }
        let fields = record::encode(grant)?;
        let scope = LogScope::of_grant(grant);
        let primary = self.keys.primary_key(&grant.key);

        let previous = self
            .backend
            .hash_get_all(&primary)
            .await
            .map_err(|e| scope.fail("store", e))?;
        let stale = match record::decode(previous) {
            Ok(Some(old)) => self.keys.grant_index_keys(&old),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Overwriting corrupt grant record");
                Vec::new()
            }
        };

        let current = self.keys.grant_index_keys(grant);
        let keep: HashSet<&str> = current.iter().map(String::as_str).collect();

        let mut batch = WriteBatch::new();
        batch.hash_replace(primary, fields, grant.expiration);
        for index in stale.iter().filter(|k| !keep.contains(k.as_str())) {
            batch.set_remove(index.as_str(), [grant.key.as_str()]);
        }
        for index in &current {
            batch.set_append(index.as_str(), [grant.key.as_str()], grant.expiration);
        }

        let ops = batch.len();
        self.backend
            .execute(batch)
            .await
            .map_err(|e| scope.fail("store", e))?;

        debug!(indexes = current.len(), ops, "Stored grant");
        Ok(())
    }

    /// Deletes the primary record only; index references are pruned by reads.
    #[instrument(skip(self))]
    pub(super) async fn remove_grant(&self, key: &str) -> GrantResult<()> {
        if key.is_empty() {
            return Ok(());
        }
        let existed = self
            .backend
            .delete(&self.keys.primary_key(key))
            .await
            .map_err(|e| LogScope::default().fail("remove", e))?;

        debug!(existed, "Removed grant");
        Ok(())
    }

    /// Deletes the records of the index `scope` resolves to that belong to
    /// that scope, then drops them from the index.
    ///
    /// Index keys of different scopes can coincide (a subject id containing
    /// `:`, a session id equal to a type name), so members are checked
    /// against `scope` before anything is deleted. The index key goes as a
    /// whole only when every stored member matched. Broader indexes keep
    /// their references to the deleted records until a read prunes them.
    #[instrument(
        skip(self, scope),
        fields(
            subject_id = %scope.subject_id,
            client_id = scope.client(),
            grant_type = scope.grant_type(),
        )
    )]
    pub(super) async fn revoke_index(&self, scope: &GrantFilter) -> GrantResult<()> {
        let log_scope = LogScope::of_filter(scope);
        let index_key = self.keys.index_key(&IndexScope::resolve(scope));
        let snapshot = self
            .load_index(index_key, log_scope, "remove_all")
            .await?;

        let matching: Vec<&str> = snapshot
            .present
            .iter()
            .filter(|grant| scope.matches(grant))
            .map(|grant| grant.key.as_str())
            .collect();

        let mut batch = WriteBatch::new();
        for key in &matching {
            batch.delete(self.keys.primary_key(key));
        }
        if matching.len() == snapshot.stored() {
            batch.delete(snapshot.index_key.as_str());
        } else {
            let unlinked = matching
                .iter()
                .copied()
                .chain(snapshot.dangling.iter().map(String::as_str));
            batch.set_remove(snapshot.index_key.as_str(), unlinked);
        }

        if batch.is_empty() {
            return Ok(());
        }
        self.backend
            .execute(batch)
            .await
            .map_err(|e| log_scope.fail("remove_all", e))?;

        debug!(
            index = %snapshot.index_key,
            removed = matching.len(),
            kept = snapshot.stored() - matching.len(),
            "Revoked grants by index"
        );
        Ok(())
    }
}
