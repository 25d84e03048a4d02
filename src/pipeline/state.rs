use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// A discovered profile to be contacted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub display_name: String,
}

impl Target {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let display_name = display_name_for(&id);
        Self { id, display_name }
    }
}

/// Progress of one outreach run.
///
/// `cursor` points at the target currently being advanced through the stage
/// sequence; everything before it has been through Close.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutreachState {
    pub targets: Vec<Target>,
    pub cursor: usize,
    pub outcomes: BTreeMap<String, bool>,
}

impl OutreachState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The target under the cursor, if any remain.
    pub fn current(&self) -> Option<&Target> {
        self.targets.get(self.cursor)
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.targets.len()
    }

    pub fn completed(&self) -> usize {
        self.outcomes.values().filter(|ok| **ok).count()
    }

    /// Record the current target as finished and move on to the next one.
    pub(crate) fn complete_current(&mut self, success: bool) {
        if let Some(target) = self.targets.get(self.cursor) {
            self.outcomes.insert(target.id.clone(), success);
            self.cursor += 1;
        }
    }
}

/// Keep the first occurrence of every identifier, up to `cap` entries.
pub fn collect_targets<I>(ids: I, cap: usize) -> Vec<Target>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(id.clone()))
        .take(cap)
        .map(Target::new)
        .collect()
}

/// Derive a human name from a profile URL: `.../in/jane-q-doe-123/` -> `Jane Q Doe 123`.
pub fn display_name_for(id: &str) -> String {
    let path = id.split(['?', '#']).next().unwrap_or(id);
    let slug = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .last()
        .unwrap_or("");

    title_case(&slug.replace('-', " "))
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_is_letter = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_from_profile_url() {
        assert_eq!(
            display_name_for("https://www.linkedin.com/in/jane-q-doe-123/"),
            "Jane Q Doe 123"
        );
    }

    #[test]
    fn test_display_name_without_trailing_slash_or_with_query() {
        assert_eq!(
            display_name_for("https://www.linkedin.com/in/JOHN-smith?miniProfileUrn=abc"),
            "John Smith"
        );
        assert_eq!(display_name_for("/in/o-brien-md#about"), "O Brien Md");
    }

    #[test]
    fn test_display_name_of_empty_identifier() {
        assert_eq!(display_name_for(""), "");
        assert_eq!(display_name_for("///"), "");
    }

    #[test]
    fn test_collect_targets_dedups_and_caps() {
        let ids = ["a/", "b/", "a/", "c/", "d/"].map(String::from);
        let targets = collect_targets(ids, 3);
        let kept: Vec<_> = targets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(kept, vec!["a/", "b/", "c/"]);
    }

    #[test]
    fn test_complete_current_advances_cursor_once() {
        let mut state = OutreachState {
            targets: collect_targets(["x/".to_string()], 10),
            ..OutreachState::default()
        };
        state.complete_current(true);
        assert_eq!(state.cursor, 1);
        assert_eq!(state.outcomes.get("x/"), Some(&true));

        // Nothing left under the cursor
        state.complete_current(true);
        assert_eq!(state.cursor, 1);
        assert_eq!(state.outcomes.len(), 1);
    }

    #[test]
    fn test_state_json_round_trip() {
        let mut state = OutreachState {
            targets: collect_targets(["https://x/in/a-b/".to_string(), "https://x/in/c/".to_string()], 10),
            ..OutreachState::default()
        };
        state.complete_current(true);

        let json = serde_json::to_string(&state).unwrap();
        let back: OutreachState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
