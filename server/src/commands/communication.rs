//! Speech: say, shout, emote, the comlink and language selection.

use std::collections::{HashSet, VecDeque};

use mud_shared::{ItemType, NATIVE_LANGUAGE};

use super::{rest, send};
use crate::entities::player::parse_frequency;
use crate::entities::EntityId;
use crate::hooks::{self, HookContext, HookEvent};
use crate::language;
use crate::services::Services;
use crate::world::{RoomKey, World};

/// How many rooms away a shout carries
pub const SHOUT_DEPTH: usize = 3;

fn speech_verb(language: &str, verb: &str) -> String {
    if language == NATIVE_LANGUAGE {
        verb.to_string()
    } else {
        format!("{} in {}", verb, language)
    }
}

pub fn do_say(world: &mut World, services: &Services, id: EntityId, args: &[String]) {
    if args.is_empty() {
        send(world, id, "\r\nSay what?\r\n");
        return;
    }
    let Some(speaker) = world.entity(id) else { return };
    if speaker.is_unspeakable() {
        speaker.send("\r\nYou can't speak right now.\r\n");
        return;
    }
    let words = rest(args);
    let speaker_char = speaker.char.clone();
    let room = speaker.location();
    let says = speech_verb(&speaker_char.speaking, "says");
    speaker.send(format!(
        "\r\n&CYou {}, '&W{}&C'&d\r\n",
        speech_verb(&speaker_char.speaking, "say"),
        words
    ));

    let mut rng = rand::thread_rng();
    for listener in world.entities_in_room(room) {
        if listener == id {
            continue;
        }
        let Some(e) = world.entity_mut(listener) else { continue };
        if e.is_unspeakable() {
            continue;
        }
        let (heard, learned) = language::spoken(&speaker_char, &mut e.char, &words, &mut rng);
        e.send(format!("\r\n&C{} {}, '&W{}&C'&d\r\n", speaker_char.name, says, heard));
        if learned && e.is_player() {
            e.send(format!(
                "&cYou gain a little knowledge of the {} language.&d\r\n",
                speaker_char.speaking
            ));
        }
    }

    let ctx = HookContext {
        actor: Some(speaker_char.name.clone()),
        text: Some(words),
        ..Default::default()
    };
    hooks::fire_room(world, services, room, HookEvent::Say, &ctx);
    hooks::fire_npcs_in_room(world, services, room, id, HookEvent::Say, &ctx);
}

/// Rooms a shout from `start` reaches: breadth first, `depth` exits deep,
/// never through a closed door.
pub fn shout_reach(world: &World, start: RoomKey, depth: usize) -> Vec<RoomKey> {
    let mut seen = HashSet::from([start]);
    let mut order = vec![start];
    let mut queue = VecDeque::from([(start, 0usize)]);
    while let Some((key, dist)) = queue.pop_front() {
        if dist >= depth {
            continue;
        }
        let Ok(room) = world.get_room(key) else { continue };
        for (dir, target) in &room.exits {
            if room.is_exit_blocked(dir) {
                continue;
            }
            let next = RoomKey::new(*target, key.ship);
            if world.has_room(next) && seen.insert(next) {
                order.push(next);
                queue.push_back((next, dist + 1));
            }
        }
    }
    order
}

pub fn do_shout(world: &mut World, _services: &Services, id: EntityId, args: &[String]) {
    if args.is_empty() {
        send(world, id, "\r\nShout what?\r\n");
        return;
    }
    let Some(speaker) = world.entity(id) else { return };
    if speaker.is_unspeakable() {
        speaker.send("\r\nYou can't shout right now.\r\n");
        return;
    }
    let words = rest(args);
    let name = speaker.name().to_string();
    let here = speaker.location();
    speaker.send(format!("\r\n&YYou shout, '&W{}&Y'&d\r\n", words));

    for key in shout_reach(world, here, SHOUT_DEPTH) {
        let msg = if key == here {
            format!("\r\n&Y{} shouts, '&W{}&Y'&d\r\n", name, words)
        } else {
            format!("\r\n&YYou hear {} shout from nearby, '&W{}&Y'&d\r\n", name, words)
        };
        for listener in world.entities_in_room(key) {
            if listener == id {
                continue;
            }
            if let Some(e) = world.entity(listener) {
                if !e.is_unspeakable() {
                    e.send(msg.as_str());
                }
            }
        }
    }
}

pub fn do_emote(world: &mut World, _services: &Services, id: EntityId, args: &[String]) {
    if args.is_empty() {
        send(world, id, "\r\nEmote what?\r\n");
        return;
    }
    let Some(e) = world.entity(id) else { return };
    if e.is_dead() {
        e.send("\r\nYou are dead.\r\n");
        return;
    }
    let msg = format!("\r\n{} {}\r\n", e.name(), rest(args));
    world.send_to_room(e.location(), &msg, &[]);
}

/// Frequency an entity's comlink is tuned to, if it carries one.
fn comlink_frequency(world: &World, id: EntityId) -> Option<String> {
    let e = world.entity(id)?;
    let has_comlink = e
        .char
        .inventory
        .iter()
        .chain(e.char.equipment.values())
        .any(|i| i.item_type == ItemType::Comlink);
    if !has_comlink {
        return None;
    }
    e.player().map(|p| p.frequency.clone())
}

pub fn do_comlink(world: &mut World, _services: &Services, id: EntityId, args: &[String]) {
    if args.is_empty() {
        send(world, id, "\r\nTransmit what?\r\n");
        return;
    }
    let Some(freq) = comlink_frequency(world, id) else {
        send(world, id, "\r\nYou don't have a comlink.\r\n");
        return;
    };
    let Some(speaker) = world.entity(id) else { return };
    if speaker.is_unspeakable() {
        speaker.send("\r\nYou can't speak right now.\r\n");
        return;
    }
    let words = rest(args);
    let name = speaker.name().to_string();
    speaker.send(format!("\r\n&G[{}] You transmit, '&W{}&G'&d\r\n", freq, words));
    for listener in world.entity_ids() {
        if listener == id || comlink_frequency(world, listener).as_deref() != Some(freq.as_str()) {
            continue;
        }
        if let Some(e) = world.entity(listener) {
            if !e.is_unspeakable() {
                e.send(format!("\r\n&G[{}] {} transmits, '&W{}&G'&d\r\n", freq, name, words));
            }
        }
    }
}

pub fn do_tune(world: &mut World, _services: &Services, id: EntityId, args: &[String]) {
    let Some(arg) = args.first() else {
        let current = world.entity(id).and_then(|e| e.player()).map(|p| p.frequency.clone());
        match current {
            Some(f) => send(world, id, &format!("\r\nYour comlink is tuned to {}.\r\nSyntax: tune <frequency>\r\n", f)),
            None => send(world, id, "\r\nSyntax: tune <frequency>\r\n"),
        }
        return;
    };
    let Some(freq) = parse_frequency(arg) else {
        send(world, id, "\r\nFrequencies run from 100.000 to 500.000 in steps of 0.250.\r\n");
        return;
    };
    if let Some(p) = world.entity_mut(id).and_then(|e| e.player_mut()) {
        p.frequency = freq.clone();
    }
    send(world, id, &format!("\r\nYou tune your comlink to {}.\r\n", freq));
}

pub fn do_speak(world: &mut World, _services: &Services, id: EntityId, args: &[String]) {
    let Some(e) = world.entity_mut(id) else { return };
    let Some(wanted) = args.first().map(|a| a.to_lowercase()) else {
        let mut known: Vec<String> = e
            .char
            .languages
            .iter()
            .map(|(name, level)| format!("  {:<16} {:>3}%", name, level))
            .collect();
        known.sort();
        e.send(format!(
            "\r\nYou are speaking {}.\r\nYou know:\r\n{}\r\n",
            e.char.speaking,
            known.join("\r\n")
        ));
        return;
    };
    let found = e
        .char
        .languages
        .iter()
        .find(|(name, level)| name.starts_with(&wanted) && **level > 0)
        .map(|(name, _)| name.clone());
    match found {
        Some(name) => {
            e.send(format!("\r\nYou now speak {}.\r\n", name));
            e.char.speaking = name;
        }
        None => e.send("\r\nYou don't know that language.\r\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tests::{add_player, drain, test_world};
    use mud_shared::{EntityState, ItemData};

    #[test]
    fn test_shout_does_not_cross_closed_door() {
        let world = test_world();
        let reach = shout_reach(&world, RoomKey::planet(100), SHOUT_DEPTH);
        assert_eq!(reach, vec![RoomKey::planet(100), RoomKey::planet(101)]);
    }

    #[test]
    fn test_shout_depth_and_cycles() {
        let mut world = test_world();
        world.operate_door(RoomKey::planet(101), "north", crate::world::room::DoorAction::Open).unwrap();
        assert_eq!(shout_reach(&world, RoomKey::planet(100), 1).len(), 2);
        assert_eq!(shout_reach(&world, RoomKey::planet(100), SHOUT_DEPTH).len(), 3);
    }

    #[test]
    fn test_shout_heard_nearby() {
        let mut world = test_world();
        let (services, _q) = Services::detached(World::default());
        let (han, _rx) = add_player(&mut world, "Han", 100);
        let (_luke, mut rx_luke) = add_player(&mut world, "Luke", 101);
        let (_leia, mut rx_leia) = add_player(&mut world, "Leia", 102);
        do_shout(&mut world, &services, han, &["Chewie!".to_string()]);
        assert!(drain(&mut rx_luke).contains("You hear Han shout from nearby, 'Chewie!'"));
        assert!(drain(&mut rx_leia).is_empty());
    }

    #[test]
    fn test_sleeping_listener_hears_nothing() {
        let mut world = test_world();
        let (services, _q) = Services::detached(World::default());
        let (han, _rx) = add_player(&mut world, "Han", 100);
        let (chewie, mut rx) = add_player(&mut world, "Chewie", 100);
        world.entity_mut(chewie).unwrap().char.state = EntityState::Sleeping;
        do_say(&mut world, &services, han, &["wake".to_string(), "up".to_string()]);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_say_fires_room_script() {
        let mut world = test_world();
        let (services, _q) = Services::detached(World::default());
        world
            .get_room_mut(RoomKey::planet(100))
            .unwrap()
            .progs
            .insert("say".into(), "echo The walls repeat '$s' back at $n.".into());
        let (han, _rx) = add_player(&mut world, "Han", 100);
        let (_leia, mut rx) = add_player(&mut world, "Leia", 100);
        do_say(&mut world, &services, han, &["hello".to_string()]);
        assert!(drain(&mut rx).contains("The walls repeat 'hello' back at Han."));
    }

    #[test]
    fn test_comlink_reaches_same_frequency_only() {
        let mut world = test_world();
        let (services, _q) = Services::detached(World::default());
        let comlink = |id| ItemData { id, name: "a comlink".into(), item_type: ItemType::Comlink, ..Default::default() };
        let (han, _rx) = add_player(&mut world, "Han", 100);
        let (leia, mut rx_leia) = add_player(&mut world, "Leia", 102);
        let (vader, mut rx_vader) = add_player(&mut world, "Vader", 102);
        for (who, item) in [(han, 1), (leia, 2), (vader, 3)] {
            world.entity_mut(who).unwrap().char.inventory.push(comlink(item));
        }
        world.entity_mut(han).unwrap().player_mut().unwrap().frequency = "123.250".into();
        world.entity_mut(leia).unwrap().player_mut().unwrap().frequency = "123.250".into();
        world.entity_mut(vader).unwrap().player_mut().unwrap().frequency = "400.000".into();
        do_comlink(&mut world, &services, han, &["Hello".to_string()]);
        assert!(drain(&mut rx_leia).contains("Han transmits, 'Hello'"));
        assert!(drain(&mut rx_vader).is_empty());
    }

    #[test]
    fn test_tune_validates() {
        let mut world = test_world();
        let (services, _q) = Services::detached(World::default());
        let (han, mut rx) = add_player(&mut world, "Han", 100);
        do_tune(&mut world, &services, han, &["99".to_string()]);
        assert!(drain(&mut rx).contains("Frequencies run"));
        do_tune(&mut world, &services, han, &["250.5".to_string()]);
        assert_eq!(world.entity(han).unwrap().player().unwrap().frequency, "250.500");
    }
}
