//! Per-post "liked by the current viewer" state. The like row in the store is
//! the source of truth; `LikeTracker` caches its existence per post.

use crate::{
    post::{PostId, UserId},
    remote::{into_row, DataService, Filter, Query, Table},
    FeedError, FeedResult,
};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Default, Clone)]
pub struct LikeTracker {
    liked: HashMap<PostId, bool>,
    in_flight: HashSet<PostId>,
}

impl LikeTracker {
    /// Cached state for a post; posts never primed read as not liked.
    pub fn is_liked(&self, post_id: &str) -> bool {
        self.liked.get(post_id).copied().unwrap_or(false)
    }

    pub fn is_in_flight(&self, post_id: &str) -> bool {
        self.in_flight.contains(post_id)
    }

    /// Merge a freshly primed batch into the cache.
    pub fn prime(&mut self, states: HashMap<PostId, bool>) {
        self.liked.extend(states);
    }

    /// Start a toggle for `post_id` and return the state it toggles from.
    /// Only one toggle per post may be outstanding at a time.
    pub fn begin_toggle(&mut self, post_id: &str) -> FeedResult<bool> {
        if !self.in_flight.insert(post_id.to_owned()) {
            return Err(FeedError::ToggleInFlight {
                post_id: post_id.to_owned(),
            }
            .into());
        }
        Ok(self.is_liked(post_id))
    }

    /// Finish the outstanding toggle. `confirmed` carries the new state once
    /// the store accepted the change; `None` leaves the cache untouched.
    pub fn finish_toggle(&mut self, post_id: &str, confirmed: Option<bool>) {
        self.in_flight.remove(post_id);
        if let Some(liked) = confirmed {
            self.liked.insert(post_id.to_owned(), liked);
        }
    }

    pub fn forget(&mut self, post_id: &str) {
        self.liked.remove(post_id);
    }

    /// Drop every viewer-scoped entry, e.g. after sign out.
    pub fn clear(&mut self) {
        self.liked.clear();
        self.in_flight.clear();
    }

    pub fn as_map(&self) -> &HashMap<PostId, bool> {
        &self.liked
    }
}

/// Existence check for the viewer's like on every post in `post_ids`, done as
/// a single query. Without a viewer nothing can be liked.
pub async fn fetch_like_states(
    service: &dyn DataService,
    viewer: Option<&UserId>,
    post_ids: &[PostId],
) -> FeedResult<HashMap<PostId, bool>> {
    let mut states: HashMap<PostId, bool> =
        post_ids.iter().map(|id| (id.clone(), false)).collect();
    let Some(viewer) = viewer else {
        return Ok(states);
    };
    if post_ids.is_empty() {
        return Ok(states);
    }

    let query = Query::from(Table::Likes)
        .filter(Filter::In(
            "post_id",
            post_ids.iter().map(|id| json!(id)).collect(),
        ))
        .filter(Filter::Eq("user_id", json!(viewer)));
    let rows = service.query(&query).await?;
    for row in rows.iter() {
        if let Some(post_id) = row.get("post_id").and_then(Value::as_str) {
            if let Some(state) = states.get_mut(post_id) {
                *state = true;
            }
        }
    }
    debug!(
        "Primed like state for {} posts, {} liked",
        states.len(),
        states.values().filter(|liked| **liked).count()
    );
    Ok(states)
}

/// Make the store agree with `liked` for (post, viewer).
pub async fn write_like(
    service: &dyn DataService,
    viewer: &UserId,
    post_id: &str,
    liked: bool,
) -> FeedResult<()> {
    if liked {
        let record = into_row(json!({ "post_id": post_id, "user_id": viewer }))?;
        service.insert(Table::Likes, record).await?;
    } else {
        service
            .delete(
                Table::Likes,
                &[
                    Filter::Eq("post_id", json!(post_id)),
                    Filter::Eq("user_id", json!(viewer)),
                ],
            )
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unprimed_post_reads_as_not_liked() {
        let tracker = LikeTracker::default();
        assert!(!tracker.is_liked("p1"));
    }

    #[test]
    fn toggle_flips_only_after_confirmation() {
        let mut tracker = LikeTracker::default();
        tracker.prime(HashMap::from([("p1".to_string(), false)]));

        let from = tracker.begin_toggle("p1").unwrap();
        assert!(!from);
        assert!(!tracker.is_liked("p1"));
        assert!(tracker.is_in_flight("p1"));

        tracker.finish_toggle("p1", Some(!from));
        assert!(tracker.is_liked("p1"));
        assert!(!tracker.is_in_flight("p1"));
    }

    #[test]
    fn failed_toggle_keeps_cached_state() {
        let mut tracker = LikeTracker::default();
        tracker.prime(HashMap::from([("p1".to_string(), true)]));

        tracker.begin_toggle("p1").unwrap();
        tracker.finish_toggle("p1", None);
        assert!(tracker.is_liked("p1"));
        assert!(!tracker.is_in_flight("p1"));
    }

    #[test]
    fn second_toggle_while_in_flight_is_rejected() {
        let mut tracker = LikeTracker::default();
        tracker.begin_toggle("p1").unwrap();

        let err = tracker.begin_toggle("p1").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FeedError>(),
            Some(FeedError::ToggleInFlight { .. })
        ));
        // other posts are independent
        assert!(tracker.begin_toggle("p2").is_ok());
    }

    #[test]
    fn clear_drops_viewer_state() {
        let mut tracker = LikeTracker::default();
        tracker.prime(HashMap::from([("p1".to_string(), true)]));
        tracker.begin_toggle("p2").unwrap();

        tracker.clear();
        assert!(!tracker.is_liked("p1"));
        assert!(!tracker.is_in_flight("p2"));
    }
}
