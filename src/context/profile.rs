//! User profile extraction.
//!
//! The profile is rebuilt from scratch on every optimizer run by scanning the
//! user's own words with a fixed rule table. Nothing is persisted between
//! runs, so clearing the history also forgets the profile.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Facts about the user inferred from what they wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: Option<String>,
    pub preferences: BTreeSet<String>,
    pub dislikes: BTreeSet<String>,
}

impl UserProfile {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.preferences.is_empty() && self.dislikes.is_empty()
    }

    /// Whether `text` mentions the user's name as a whole word.
    pub fn mentions_name(&self, text: &str) -> bool {
        let Some(name) = self.name.as_deref() else {
            return false;
        };
        let name = name.to_lowercase();
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric() && c != '\'' && c != '-')
            .any(|word| word == name)
    }

    /// One-line description for prompts, e.g.
    /// `The user's name is Alice. They like hiking. They dislike rain.`
    /// Likes and dislikes are capped at three each.
    pub fn describe(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(name) = &self.name {
            parts.push(format!("The user's name is {name}."));
        }
        if !self.preferences.is_empty() {
            let likes: Vec<&str> = self.preferences.iter().take(3).map(String::as_str).collect();
            parts.push(format!("They like {}.", likes.join(", ")));
        }
        if !self.dislikes.is_empty() {
            let dislikes: Vec<&str> = self.dislikes.iter().take(3).map(String::as_str).collect();
            parts.push(format!("They dislike {}.", dislikes.join(", ")));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// Which profile field a rule feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Name,
    Preference,
    Dislike,
}

/// A single extraction rule. The first capture group holds the value.
#[derive(Debug)]
pub struct ProfileRule {
    pub field: ProfileField,
    pub pattern: Regex,
}

impl ProfileRule {
    fn new(field: ProfileField, pattern: &str) -> Self {
        Self {
            field,
            pattern: Regex::new(pattern).expect("profile pattern is valid"),
        }
    }
}

/// Extraction rules, in no particular priority; name matches are ordered by
/// where they occur in the text.
pub static PROFILE_RULES: LazyLock<Vec<ProfileRule>> = LazyLock::new(|| {
    vec![
        ProfileRule::new(ProfileField::Name, r"(?i)\bmy name is\s+(\p{L}[\p{L}\p{M}'’\-]*)"),
        ProfileRule::new(ProfileField::Name, r"(?i)\bcall me\s+(\p{L}[\p{L}\p{M}'’\-]*)"),
        // Case-sensitive on purpose: "I'm tired" is not an introduction.
        ProfileRule::new(
            ProfileField::Name,
            r"\b(?:[Ii]['’]m|[Ii] am)\s+(\p{Lu}[\p{L}\p{M}'’\-]*)",
        ),
        ProfileRule::new(
            ProfileField::Preference,
            r"(?i)\bi\s+(?:really\s+|also\s+|absolutely\s+)?(?:love|like|enjoy|adore)\s+([^.!?;\n]+)",
        ),
        ProfileRule::new(
            ProfileField::Dislike,
            r"(?i)\bi\s+(?:really\s+|also\s+)?(?:hate|dislike|detest|don['’]t like|do not like|can['’]t stand|cannot stand)\s+([^.!?;\n]+)",
        ),
    ]
});

/// Words that follow "I'm" / "my name is" without being names.
const NAME_STOPLIST: &[&str] = &[
    "a", "an", "the", "not", "so", "very", "really", "just", "also", "still", "here", "back",
    "sorry", "fine", "good", "great", "ok", "okay", "sure", "glad", "happy", "sad", "tired",
    "excited", "interested", "looking", "trying", "going", "working", "done", "ready", "new",
    "in", "at", "on", "from", "unknown", "confused", "curious", "wondering", "thinking",
];

/// Trailing filler dropped from preference phrases.
const PHRASE_FILLERS: &[&str] = &[" a lot", " very much", " so much", " too"];

const MAX_PHRASE_CHARS: usize = 60;

/// Build a profile from user-authored texts in chronological order.
pub fn extract_profile<'a>(texts: impl IntoIterator<Item = &'a str>) -> UserProfile {
    let mut profile = UserProfile::default();

    for text in texts {
        let mut latest_name: Option<(usize, String)> = None;

        for rule in PROFILE_RULES.iter() {
            for caps in rule.pattern.captures_iter(text) {
                let Some(value) = caps.get(1) else { continue };
                match rule.field {
                    ProfileField::Name => {
                        let candidate = value
                            .as_str()
                            .trim_matches(|c| matches!(c, '\'' | '’' | '-'));
                        if candidate.is_empty()
                            || NAME_STOPLIST.contains(&candidate.to_lowercase().as_str())
                        {
                            continue;
                        }
                        let replace = latest_name
                            .as_ref()
                            .is_none_or(|(pos, _)| value.start() >= *pos);
                        if replace {
                            latest_name = Some((value.start(), title_case(candidate)));
                        }
                    }
                    ProfileField::Preference => {
                        profile.preferences.extend(split_phrases(value.as_str()));
                    }
                    ProfileField::Dislike => {
                        profile.dislikes.extend(split_phrases(value.as_str()));
                    }
                }
            }
        }

        if let Some((_, name)) = latest_name {
            profile.name = Some(name);
        }
    }

    profile
}

/// True if any rule matches `text`; used as an intent signal when scoring.
pub fn has_profile_statement(text: &str) -> bool {
    !extract_profile([text]).is_empty()
}

fn split_phrases(raw: &str) -> Vec<String> {
    // "I love hiking but hate rain" keeps only the liked part.
    let raw = raw.split(" but ").next().unwrap_or(raw);

    raw.split(',')
        .flat_map(|chunk| chunk.split(" and "))
        .filter_map(|phrase| {
            let mut phrase = phrase.trim().to_lowercase();
            for filler in PHRASE_FILLERS {
                if let Some(stripped) = phrase.strip_suffix(filler) {
                    phrase = stripped.trim_end().to_string();
                }
            }
            let phrase = phrase.trim_start_matches("to ").trim().to_string();
            if phrase.is_empty() || phrase.chars().count() > MAX_PHRASE_CHARS {
                None
            } else {
                Some(phrase)
            }
        })
        .collect()
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rules_compile() {
        assert_eq!(PROFILE_RULES.len(), 5);
    }

    #[test]
    fn extracts_name_and_preference_from_one_sentence() {
        let profile = extract_profile(["Hi, my name is Alice and I love hiking"]);
        assert_eq!(profile.name.as_deref(), Some("Alice"));
        assert_eq!(
            profile.preferences,
            BTreeSet::from(["hiking".to_string()])
        );
        assert!(profile.dislikes.is_empty());
    }

    #[test]
    fn name_is_title_cased() {
        let profile = extract_profile(["call me BOB"]);
        assert_eq!(profile.name.as_deref(), Some("Bob"));
    }

    #[test]
    fn latest_name_wins() {
        let profile = extract_profile(["My name is Alice", "Actually, call me Ally"]);
        assert_eq!(profile.name.as_deref(), Some("Ally"));

        let profile = extract_profile(["I'm Carol, but call me Caz"]);
        assert_eq!(profile.name.as_deref(), Some("Caz"));
    }

    #[test]
    fn im_requires_capitalized_non_stoplist_word() {
        assert_eq!(extract_profile(["I'm tired today"]).name, None);
        assert_eq!(extract_profile(["I am Sorry about that"]).name, None);
        assert_eq!(extract_profile(["I am Dana"]).name.as_deref(), Some("Dana"));
    }

    #[test]
    fn accented_names_are_kept_whole() {
        assert_eq!(extract_profile(["my name is José"]).name.as_deref(), Some("José"));
        assert_eq!(extract_profile(["call me zoë"]).name.as_deref(), Some("Zoë"));
        assert_eq!(extract_profile(["I'm Łukasz"]).name.as_deref(), Some("Łukasz"));
        assert_eq!(extract_profile(["I am émile"]).name, None);
    }

    #[test]
    fn my_name_is_not_a_name() {
        assert_eq!(extract_profile(["my name is not important"]).name, None);
    }

    #[test]
    fn preferences_split_and_deduplicate() {
        let profile = extract_profile([
            "I like Pizza, pasta and sushi",
            "i really love pizza a lot",
        ]);
        let expected: BTreeSet<String> = ["pasta", "pizza", "sushi"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(profile.preferences, expected);
    }

    #[test]
    fn dislikes_cover_negated_forms() {
        let profile = extract_profile([
            "I hate traffic.",
            "I don't like spiders",
            "I can't stand loud music!",
        ]);
        let expected: BTreeSet<String> = ["loud music", "spiders", "traffic"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(profile.dislikes, expected);
        assert!(profile.preferences.is_empty());
    }

    #[test]
    fn but_clause_is_not_a_preference() {
        let profile = extract_profile(["I love tea but coffee is fine"]);
        assert_eq!(profile.preferences, BTreeSet::from(["tea".to_string()]));
    }

    #[test]
    fn describe_caps_lists_at_three() {
        let profile = extract_profile(["My name is Eve. I like a, b, c, d and e"]);
        assert_eq!(
            profile.describe().as_deref(),
            Some("The user's name is Eve. They like a, b, c.")
        );
        assert_eq!(UserProfile::default().describe(), None);
    }

    #[test]
    fn mentions_name_matches_whole_words() {
        let profile = extract_profile(["call me Al"]);
        assert!(profile.mentions_name("thanks al!"));
        assert!(!profile.mentions_name("totally fine"));
    }

    #[test]
    fn profile_statement_detection() {
        assert!(has_profile_statement("I enjoy chess"));
        assert!(!has_profile_statement("What time is it?"));
    }
}
