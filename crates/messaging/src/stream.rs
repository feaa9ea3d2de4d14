use crate::error::Error;
use crate::store::{LogStore, LogStoreError, Retention, StreamConfig};

use std::collections::BTreeSet;

use ticketing_events::Subject;
use tracing::{debug, info};

/// What `ensure_stream` did to the store.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EnsureOutcome {
    /// The stream did not exist and was created.
    Created,

    /// The stream existed and its subject set was widened.
    Updated {
        /// Subjects added by this call.
        added: BTreeSet<String>,
    },

    /// The stream already covered every requested subject.
    Unchanged,
}

/// A stream known to exist on the store.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StreamHandle {
    /// The stream name.
    pub name: String,

    /// Subjects the stream now routes.
    pub subjects: BTreeSet<String>,

    /// Retention policy as stored.
    pub retention: Retention,

    /// What this call changed.
    pub outcome: EnsureOutcome,
}

/// Creates the stream or widens its subject set to include `subjects`.
///
/// Subjects are never removed, so concurrent callers with different subject
/// sets converge on their union. A create that loses a race with another
/// process is retried once as a reconcile.
///
/// # Errors
///
/// Returns [`Error::EmptySubjects`] if `subjects` is empty, or the store
/// error if listing, creating or updating fails.
pub async fn ensure_stream<L, I, S>(
    store: &L,
    name: &str,
    subjects: I,
) -> Result<StreamHandle, Error<L::Error>>
where
    L: LogStore,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let requested: BTreeSet<String> = subjects.into_iter().map(Into::into).collect();
    if requested.is_empty() {
        return Err(Error::EmptySubjects(name.to_string()));
    }

    if let Some(handle) = reconcile(store, name, &requested).await? {
        return Ok(handle);
    }

    let config = StreamConfig {
        name: name.to_string(),
        subjects: requested.clone(),
        retention: Retention::Interest,
    };

    match store.create_stream(config).await {
        Ok(created) => {
            info!(stream = %name, subjects = ?created.subjects, "created stream");

            Ok(StreamHandle {
                name: created.name,
                subjects: created.subjects,
                retention: created.retention,
                outcome: EnsureOutcome::Created,
            })
        }
        Err(e) if e.is_conflict() => {
            debug!(stream = %name, "stream created concurrently, reconciling");

            reconcile(store, name, &requested)
                .await?
                .ok_or_else(|| Error::StreamNotFound(name.to_string()))
        }
        Err(e) => Err(Error::Store(e)),
    }
}

/// Ensures the stream with every subject of the event catalog.
///
/// # Errors
///
/// See [`ensure_stream`].
pub async fn ensure_catalog_stream<L>(
    store: &L,
    name: &str,
) -> Result<StreamHandle, Error<L::Error>>
where
    L: LogStore,
{
    ensure_stream(store, name, Subject::all_names()).await
}

async fn reconcile<L>(
    store: &L,
    name: &str,
    requested: &BTreeSet<String>,
) -> Result<Option<StreamHandle>, Error<L::Error>>
where
    L: LogStore,
{
    let Some(existing) = store
        .streams()
        .await
        .map_err(Error::Store)?
        .into_iter()
        .find(|stream| stream.name == name)
    else {
        return Ok(None);
    };

    let added: BTreeSet<String> = requested.difference(&existing.subjects).cloned().collect();

    if added.is_empty() {
        debug!(stream = %name, "stream already covers requested subjects");

        return Ok(Some(StreamHandle {
            name: existing.name,
            subjects: existing.subjects,
            retention: existing.retention,
            outcome: EnsureOutcome::Unchanged,
        }));
    }

    let subjects = existing.subjects.union(&added).cloned().collect();
    let updated = store
        .update_stream(StreamConfig {
            subjects,
            ..existing
        })
        .await
        .map_err(Error::Store)?;

    info!(stream = %name, added = ?added, "widened stream subjects");

    Ok(Some(StreamHandle {
        name: updated.name,
        subjects: updated.subjects,
        retention: updated.retention,
        outcome: EnsureOutcome::Updated { added },
    }))
}
