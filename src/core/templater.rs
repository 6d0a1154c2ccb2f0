/// Text templater: renders authored text against the active player.
///
/// Four passes run in a fixed order, each over the previous pass's output:
///
/// 1. `{category}` / `{random:category}`: random words
/// 2. `[Name]`: the player's display name
/// 3. `[raceName]`, `[PersonalityName]`, `[bodyType]`, `[clothing]`
/// 4. `(free-text phrase)`: a personality dialogue line, when the phrase
///    maps to a dialogue key the personality has lines for
///
/// Later passes rely on earlier placeholders already being resolved, so a
/// random word may itself contain `[Name]` or a dialogue phrase.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::core::dialogue::DialogueRules;
use crate::core::ports::WordProvider;
use crate::schema::player::{Personality, Player};

/// Output for placeholders that cannot be resolved.
pub const UNKNOWN: &str = "???";

const NAME_PLACEHOLDER: &str = "[Name]";

/// Built-in word table used when no provider is configured or the
/// provider has nothing for a category.
const BUILTIN_WORDS: &[(&str, &[&str])] = &[
    ("color", &["crimson", "ashen", "pale", "emerald", "golden", "ink-black"]),
    ("adjective", &["damp", "ancient", "silent", "crooked", "flickering", "forgotten"]),
    ("monster", &["goblin", "slime", "ghoul", "giant rat", "skeleton", "wisp"]),
    ("weapon", &["rusty sword", "cudgel", "spear", "hand axe", "dagger"]),
    ("direction", &["north", "south", "east", "west"]),
    ("sound", &["a distant drip", "scraping claws", "a low moan", "echoing footsteps"]),
    ("smell", &["mildew", "smoke", "iron", "rot", "incense"]),
];

/// The player data a template may draw on.
#[derive(Debug, Clone, Copy)]
pub struct PlayerContext<'a> {
    pub player: &'a Player,
    pub personality: Option<&'a Personality>,
}

impl<'a> PlayerContext<'a> {
    pub fn new(player: &'a Player, personality: Option<&'a Personality>) -> Self {
        Self {
            player,
            personality,
        }
    }
}

pub struct TextTemplater {
    dialogue: DialogueRules,
    words: Option<Box<dyn WordProvider>>,
}

impl TextTemplater {
    pub fn new() -> Self {
        Self::with_rules(DialogueRules::standard())
    }

    pub fn with_rules(dialogue: DialogueRules) -> Self {
        Self {
            dialogue,
            words: None,
        }
    }

    pub fn set_word_provider(&mut self, provider: Box<dyn WordProvider>) {
        self.words = Some(provider);
    }

    /// Render a template through all four passes.
    pub fn render(&self, template: &str, ctx: &PlayerContext<'_>, rng: &mut StdRng) -> String {
        let text = self.substitute_random_words(template, rng);
        let text = substitute_name(&text, ctx.player);
        let text = substitute_attributes(&text, ctx);
        self.substitute_dialogue(&text, ctx.personality, rng)
    }

    fn substitute_random_words(&self, text: &str, rng: &mut StdRng) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            match after.find('}').and_then(|end| category_of(&after[..end]).map(|c| (end, c))) {
                Some((end, category)) => {
                    out.push_str(&self.random_word(category, rng));
                    rest = &after[end + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }

    fn random_word(&self, category: &str, rng: &mut StdRng) -> String {
        if let Some(word) = self
            .words
            .as_ref()
            .and_then(|provider| provider.random_word(category, rng))
        {
            return word;
        }
        builtin_word(category, rng).unwrap_or(UNKNOWN).to_string()
    }

    fn substitute_dialogue(
        &self,
        text: &str,
        personality: Option<&Personality>,
        rng: &mut StdRng,
    ) -> String {
        let Some(personality) = personality else {
            return text.to_string();
        };
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some((start, open)) = rest.char_indices().find(|(_, c)| *c == '(' || *c == '（') {
            let close = if open == '(' { ')' } else { '）' };
            out.push_str(&rest[..start]);
            let after = &rest[start + open.len_utf8()..];
            match after.find(|c: char| c == close || c == open) {
                Some(end) if after[end..].starts_with(close) => {
                    let phrase = &after[..end];
                    let line = self
                        .dialogue
                        .resolve(phrase)
                        .and_then(|key| personality.lines_for(key).choose(rng));
                    match line {
                        Some(line) => out.push_str(line),
                        None => {
                            out.push(open);
                            out.push_str(phrase);
                            out.push(close);
                        }
                    }
                    rest = &after[end + close.len_utf8()..];
                }
                _ => {
                    out.push(open);
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

impl Default for TextTemplater {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TextTemplater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextTemplater")
            .field("dialogue", &self.dialogue)
            .field("word_provider", &self.words.is_some())
            .finish()
    }
}

fn substitute_name(text: &str, player: &Player) -> String {
    text.replace(NAME_PLACEHOLDER, &player.name)
}

fn substitute_attributes(text: &str, ctx: &PlayerContext<'_>) -> String {
    if !text.contains('[') {
        return text.to_string();
    }
    let player = ctx.player;
    let replacements = [
        ("[raceName]", player.race_name.as_deref()),
        (
            "[PersonalityName]",
            ctx.personality.map(|p| p.name.as_str()),
        ),
        ("[bodyType]", player.body_type.as_deref()),
        ("[clothing]", player.clothing.as_deref()),
    ];
    let mut out = text.to_string();
    for (placeholder, value) in replacements {
        if out.contains(placeholder) {
            out = out.replace(placeholder, value.unwrap_or(UNKNOWN));
        }
    }
    out
}

fn builtin_word(category: &str, rng: &mut StdRng) -> Option<&'static str> {
    BUILTIN_WORDS
        .iter()
        .find(|(name, _)| *name == category)
        .and_then(|(_, words)| words.choose(rng))
        .copied()
}

/// The category named by a `{...}` body, if it is a valid placeholder.
fn category_of(body: &str) -> Option<&str> {
    let category = body.strip_prefix("random:").unwrap_or(body);
    let valid = !category.is_empty()
        && !category.contains(|c: char| c.is_whitespace() || c == '{' || c == ':');
    valid.then_some(category)
}
