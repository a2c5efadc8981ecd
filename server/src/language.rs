//! Spoken languages: garbling speech for listeners who don't know the
//! tongue well, learning by listening, and slow forgetting.

use log::debug;
use rand::Rng;

use mud_shared::{CharData, NATIVE_LANGUAGE};

use crate::services::Services;
use crate::world::lock_world;

/// Letter substitution used when a word comes out wrong. Each language
/// rotates the alphabet by its own amount.
pub fn cipher_char(c: char, language: &str) -> char {
    let shift = (language.bytes().map(|b| b as u32).sum::<u32>() % 25 + 1) as u8;
    match c {
        'a'..='z' => (((c as u8 - b'a') + shift) % 26 + b'a') as char,
        'A'..='Z' => (((c as u8 - b'A') + shift) % 26 + b'A') as char,
        _ => c,
    }
}

/// What `listener` hears when `speaker` says `words`. Each letter comes
/// through clearly with odds weighing the listener's proficiency against
/// the speaker's. Listening may teach the listener a point; the second value
/// is true when it did.
pub fn spoken<R: Rng>(speaker: &CharData, listener: &mut CharData, words: &str, rng: &mut R) -> (String, bool) {
    let language = speaker.speaking.as_str();
    let known = *listener.languages.entry(language.to_string()).or_insert(0);
    if known >= 100 {
        return (words.to_string(), false);
    }
    let fluency = speaker.languages.get(language).copied().unwrap_or(1).max(1);

    let heard: String = words
        .chars()
        .map(|c| {
            if rng.gen_range(0..fluency) < known {
                c
            } else {
                cipher_char(c, language)
            }
        })
        .collect();

    let mut learned = false;
    if rng.gen_range(0..5) == 0 {
        if let Some(level) = listener.languages.get_mut(language) {
            *level = (*level + 1).min(100);
            learned = true;
        }
    }
    (heard, learned)
}

/// Languages a character can't forget: the common tongue, the one being
/// spoken and the character's racial language.
fn is_native(ch: &CharData, language: &str) -> bool {
    language == NATIVE_LANGUAGE || language == ch.speaking || language.eq_ignore_ascii_case(&ch.race)
}

/// One decay roll for every non-native, not fully mastered language. Returns
/// true if anything was forgotten.
pub fn decay<R: Rng>(ch: &mut CharData, rng: &mut R) -> bool {
    let forgettable: Vec<String> = ch
        .languages
        .iter()
        .filter(|(name, level)| **level > 0 && **level < 100 && !is_native(ch, name))
        .map(|(name, _)| name.clone())
        .collect();
    let mut lost = false;
    for name in forgettable {
        if rng.gen_range(1..=100) == 100 {
            if let Some(level) = ch.languages.get_mut(&name) {
                *level = level.saturating_sub(1);
                lost = true;
            }
        }
    }
    lost
}

/// Register the periodic forgetting pass over every player.
pub fn schedule_decay(services: &Services) {
    let svc = services.clone();
    let interval = services.config.language_decay_secs.clamp(1, u32::MAX as u64) as u32;
    services.scheduler.every(interval, move || {
        let mut world = lock_world(&svc.world);
        let mut rng = rand::thread_rng();
        let mut count = 0;
        for e in world.entities_mut().filter(|e| e.is_player()) {
            if decay(&mut e.char, &mut rng) {
                e.send("\r\n&xYou've forgotten a little bit of language knowledge.&d\r\n");
                count += 1;
            }
        }
        debug!("Language decay pass, {} players forgot something", count);
    });
}
