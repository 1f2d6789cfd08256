use indexmap::IndexMap;
use serde::ser::SerializeSeq as _;

use crate::event::Stage;

/// Progress of the pipeline for one in-flight message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    InProgress,
    Completed,
    Failed,
}

impl StageStatus {
    /// True for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, StageStatus::InProgress)
    }
}

/// Key of a Stage 2 review: who reviewed whom.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ReviewKey {
    pub reviewer: String,
    pub target: String,
}

impl ReviewKey {
    pub fn new(reviewer: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            reviewer: reviewer.into(),
            target: target.into(),
        }
    }
}

/// Chairman synthesis.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FinalAnswer {
    pub model: String,
    pub response: String,
}

/// Three-stage view of a council answer, built only by the reducer.
///
/// Entries are keyed by model identity and only ever added or replaced whole.
/// Map iteration order is first-arrival order.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct StageState {
    pub(crate) stage1: IndexMap<String, String>,
    #[serde(serialize_with = "serialize_reviews")]
    pub(crate) stage2: IndexMap<ReviewKey, String>,
    pub(crate) stage3: Option<FinalAnswer>,
    pub(crate) status: StageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error_detail: Option<String>,
    pub(crate) active_stage: Option<Stage>,
}

impl StageState {
    /// Stage 1 answers by model.
    pub fn stage1(&self) -> &IndexMap<String, String> {
        &self.stage1
    }

    /// Stage 2 reviews by (reviewer, target).
    pub fn stage2(&self) -> &IndexMap<ReviewKey, String> {
        &self.stage2
    }

    pub fn stage3(&self) -> Option<&FinalAnswer> {
        self.stage3.as_ref()
    }

    pub fn status(&self) -> StageStatus {
        self.status
    }

    /// Failure reason; only set when `status` is `Failed`.
    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    /// Most recently started stage. Presentational only.
    pub fn active_stage(&self) -> Option<Stage> {
        self.active_stage
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Stage 1 answer of `model`, `None` while pending.
    pub fn response(&self, model: &str) -> Option<&str> {
        self.stage1.get(model).map(String::as_str)
    }

    /// Review written by `reviewer` about `target`, `None` while pending.
    pub fn review(&self, reviewer: &str, target: &str) -> Option<&str> {
        self.stage2
            .get(&ReviewKey::new(reviewer, target))
            .map(String::as_str)
    }

    /// Reviews received about `target`, in arrival order.
    pub fn reviews_of<'a>(&'a self, target: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.stage2
            .iter()
            .filter(move |(key, _)| key.target == target)
            .map(|(key, review)| (key.reviewer.as_str(), review.as_str()))
    }

    /// Council members that have not answered Stage 1 yet.
    pub fn pending_stage1<'a>(&self, council: &'a [String]) -> Vec<&'a str> {
        council
            .iter()
            .filter(|model| !self.stage1.contains_key(model.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Reviewer/target pairs still missing, assuming every council member
    /// reviews every other member's answer.
    pub fn pending_reviews(&self, council: &[String]) -> Vec<ReviewKey> {
        let mut pending = Vec::new();
        for reviewer in council {
            for target in council.iter().filter(|target| *target != reviewer) {
                let key = ReviewKey::new(reviewer.as_str(), target.as_str());
                if !self.stage2.contains_key(&key) {
                    pending.push(key);
                }
            }
        }
        pending
    }
}

fn serialize_reviews<S>(reviews: &IndexMap<ReviewKey, String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    #[derive(serde::Serialize)]
    struct Entry<'a> {
        reviewer: &'a str,
        target: &'a str,
        review: &'a str,
    }

    let mut seq = serializer.serialize_seq(Some(reviews.len()))?;
    for (key, review) in reviews {
        seq.serialize_element(&Entry {
            reviewer: &key.reviewer,
            target: &key.target,
            review,
        })?;
    }
    seq.end()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn council() -> Vec<String> {
        vec!["a".into(), "b".into(), "c".into()]
    }

    #[test]
    fn default_state_is_in_progress_and_empty() {
        let state = StageState::default();
        assert_eq!(state.status(), StageStatus::InProgress);
        assert!(state.stage1().is_empty());
        assert!(state.stage2().is_empty());
        assert!(state.stage3().is_none());
        assert!(state.error_detail().is_none());
        assert!(!state.is_terminal());
    }

    #[test]
    fn pending_helpers_follow_council_order() {
        let mut state = StageState::default();
        state.stage1.insert("b".into(), "answer".into());
        state.stage2.insert(ReviewKey::new("a", "b"), "ok".into());

        assert_eq!(state.pending_stage1(&council()), vec!["a", "c"]);
        let pending = state.pending_reviews(&council());
        assert_eq!(pending.len(), 5);
        assert_eq!(pending[0], ReviewKey::new("a", "c"));
        assert!(!pending.contains(&ReviewKey::new("a", "b")));
    }

    #[test]
    fn reviews_of_filters_by_target() {
        let mut state = StageState::default();
        state.stage2.insert(ReviewKey::new("a", "b"), "ab".into());
        state.stage2.insert(ReviewKey::new("c", "a"), "ca".into());
        state.stage2.insert(ReviewKey::new("c", "b"), "cb".into());
        let of_b: Vec<_> = state.reviews_of("b").collect();
        assert_eq!(of_b, vec![("a", "ab"), ("c", "cb")]);
    }

    #[test]
    fn serializes_for_rendering() {
        let mut state = StageState::default();
        state.stage1.insert("m1".into(), "hi".into());
        state.stage2.insert(ReviewKey::new("m1", "m2"), "solid".into());
        state.active_stage = Some(Stage::Two);
        let value = serde_json::to_value(&state).expect("encode");
        assert_eq!(value["stage1"]["m1"], "hi");
        assert_eq!(value["stage2"][0]["reviewer"], "m1");
        assert_eq!(value["stage2"][0]["review"], "solid");
        assert_eq!(value["stage3"], serde_json::Value::Null);
        assert_eq!(value["status"], "in_progress");
        assert_eq!(value["active_stage"], "two");
        assert!(value.get("error_detail").is_none());
    }
}
