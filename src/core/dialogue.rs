/// Heuristic mapping from free-text author phrases to dialogue categories.
///
/// Content writes things like `(attack cry)` or `(悲鳴口上)` inside event text.
/// The rules below guess which personality line bucket the author meant.
/// Rules are checked in order and the first match wins, so more specific
/// categories (death before scream, heavy damage before light) come first.

use regex::Regex;

/// Canonical dialogue-category keys used by personality line tables.
pub mod keys {
    pub const DEATH: &str = "death";
    pub const SCREAM: &str = "scream";
    pub const DAMAGE_HEAVY: &str = "damage_heavy";
    pub const DAMAGE_LIGHT: &str = "damage_light";
    pub const ATTACK: &str = "attack";
    pub const DODGE: &str = "dodge";
    pub const TRAP_FOUND: &str = "trap_found";
    pub const ITEM_GET: &str = "item_get";
    pub const REST: &str = "rest";
    pub const VICTORY: &str = "victory";
    pub const MOAN: &str = "moan";
    pub const PANT: &str = "pant";
    pub const EMBARRASSED: &str = "embarrassed";
    pub const FRIGHTENED: &str = "frightened";
    pub const STRUGGLE: &str = "struggle";
}

/// (key, substrings matched anywhere, English word stems matched on word boundaries)
const STANDARD_RULES: &[(&str, &[&str], &[&str])] = &[
    (
        keys::DEATH,
        &["断末魔", "死に際", "最期"],
        &["death", "dying", "last breath", "last words", "final cry"],
    ),
    (keys::SCREAM, &["悲鳴", "叫び"], &["scream", "shriek", "screech"]),
    (
        keys::DAMAGE_HEAVY,
        &["大ダメージ", "重傷", "痛恨"],
        &["heavy (?:damage|hit|wound)", "critical(?:ly)? (?:hit|damage)", "badly hurt"],
    ),
    (
        keys::DAMAGE_LIGHT,
        &["ダメージ", "被弾", "痛っ"],
        &["(?:light|minor|small) (?:damage|hit|wound)", "hurt", "ouch", "pain cry", "damage"],
    ),
    (
        keys::ATTACK,
        &["攻撃", "掛け声", "気合"],
        &["attack", "battle cry", "war cry", "strike", "charge"],
    ),
    (keys::DODGE, &["回避", "避け", "かわす"], &["dodge", "evade", "evasion", "sidestep"]),
    (keys::TRAP_FOUND, &["罠", "トラップ"], &["trap"]),
    (
        keys::ITEM_GET,
        &["アイテム", "入手", "宝箱"],
        &["item", "loot", "treasure", "pick(?:ed)? up"],
    ),
    (keys::REST, &["休憩", "休息", "野営"], &["rest", "camp", "sleep"]),
    (keys::VICTORY, &["勝利", "勝ち"], &["victory", "win", "triumph"]),
    (keys::MOAN, &["喘ぎ", "嬌声"], &["moan", "gasp"]),
    (keys::PANT, &["吐息", "息遣い", "荒い息"], &["pant", "heavy breath", "breathing"]),
    (
        keys::EMBARRASSED,
        &["恥じら", "羞恥", "照れ"],
        &["embarrass\\w*", "blush", "fluster"],
    ),
    (keys::FRIGHTENED, &["怯え", "恐怖", "怖"], &["fear", "afraid", "frighten", "terrified"]),
    (keys::STRUGGLE, &["抵抗", "もがき", "拘束"], &["struggle", "resist", "restrain"]),
];

struct DialogueRule {
    key: &'static str,
    pattern: Regex,
}

/// Ordered phrase-matching rules.
pub struct DialogueRules {
    rules: Vec<DialogueRule>,
}

impl DialogueRules {
    /// The built-in rule table.
    pub fn standard() -> Self {
        let rules = STANDARD_RULES
            .iter()
            .filter_map(|&(key, substrings, words)| {
                let pattern = build_pattern(substrings, words);
                match Regex::new(&pattern) {
                    Ok(pattern) => Some(DialogueRule { key, pattern }),
                    Err(e) => {
                        log::error!("dialogue rule '{}' failed to compile: {}", key, e);
                        None
                    }
                }
            })
            .collect();
        Self { rules }
    }

    /// Build rules from `(key, regex)` pairs, checked in the given order.
    pub fn from_patterns(patterns: &[(&'static str, &str)]) -> Result<Self, regex::Error> {
        let mut rules = Vec::with_capacity(patterns.len());
        for &(key, pattern) in patterns {
            rules.push(DialogueRule {
                key,
                pattern: Regex::new(pattern)?,
            });
        }
        Ok(Self { rules })
    }

    /// Resolve a phrase to a dialogue key, if any rule matches.
    pub fn resolve(&self, phrase: &str) -> Option<&'static str> {
        let normalized = normalize(phrase);
        if normalized.is_empty() {
            return None;
        }
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(&normalized))
            .map(|rule| rule.key)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for DialogueRules {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for DialogueRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|r| r.key))
            .finish()
    }
}

fn build_pattern(substrings: &[&str], words: &[&str]) -> String {
    let mut alternatives: Vec<String> = substrings.iter().map(|s| regex::escape(s)).collect();
    if !words.is_empty() {
        alternatives.push(format!(r"\b(?:{})(?:s|es|ed|ing)?\b", words.join("|")));
    }
    alternatives.join("|")
}

/// Lower-case, trim, and collapse internal whitespace runs.
fn normalize(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_rules_all_compile() {
        assert_eq!(DialogueRules::standard().len(), STANDARD_RULES.len());
    }

    #[test]
    fn japanese_phrases() {
        let rules = DialogueRules::standard();
        assert_eq!(rules.resolve("悲鳴口上"), Some(keys::SCREAM));
        assert_eq!(rules.resolve("断末魔の叫び"), Some(keys::DEATH));
        assert_eq!(rules.resolve("大ダメージ時のセリフ"), Some(keys::DAMAGE_HEAVY));
        assert_eq!(rules.resolve("ダメージ"), Some(keys::DAMAGE_LIGHT));
        assert_eq!(rules.resolve("罠発見"), Some(keys::TRAP_FOUND));
    }

    #[test]
    fn english_phrases() {
        let rules = DialogueRules::standard();
        assert_eq!(rules.resolve("  Attack   Cry "), Some(keys::ATTACK));
        assert_eq!(rules.resolve("light-damage cry"), Some(keys::DAMAGE_LIGHT));
        assert_eq!(rules.resolve("heavy hit"), Some(keys::DAMAGE_HEAVY));
        assert_eq!(rules.resolve("death scream"), Some(keys::DEATH));
        assert_eq!(rules.resolve("dodge line"), Some(keys::DODGE));
        assert_eq!(rules.resolve("trap-found line"), Some(keys::TRAP_FOUND));
        assert_eq!(rules.resolve("item-get line"), Some(keys::ITEM_GET));
        assert_eq!(rules.resolve("rest line"), Some(keys::REST));
        assert_eq!(rules.resolve("victory line"), Some(keys::VICTORY));
        assert_eq!(rules.resolve("blushing"), Some(keys::EMBARRASSED));
    }

    #[test]
    fn word_boundaries_prevent_partial_matches() {
        let rules = DialogueRules::standard();
        assert_eq!(rules.resolve("the wind howls"), None);
        assert_eq!(rules.resolve("an arrest"), None);
        assert_eq!(rules.resolve("quietly"), None);
        assert_eq!(rules.resolve("   "), None);
    }

    #[test]
    fn custom_rules_keep_order() {
        let rules = DialogueRules::from_patterns(&[("first", "cry"), ("second", "battle")]).unwrap();
        assert_eq!(rules.resolve("battle cry"), Some("first"));
        assert!(DialogueRules::from_patterns(&[("bad", "(")]).is_err());
    }
}
