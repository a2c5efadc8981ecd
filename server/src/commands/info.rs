//! Looking around, character sheets, help, saving and quitting.

use log::info;

use mud_shared::{EntityState, ItemData, STAT_NAMES};

use super::{open_editor, send};
use crate::entities::{xp_for_level, Entity, EntityId};
use crate::network::{EditTarget, Outbound};
use crate::persistence;
use crate::services::Services;
use crate::world::World;

fn posture(e: &Entity) -> &'static str {
    match e.state() {
        EntityState::Sitting => " is sitting here.",
        EntityState::Sleeping => " is sleeping here.",
        EntityState::Fighting => " is here, fighting!",
        EntityState::Unconscious => " is lying here unconscious.",
        EntityState::Dead => " is lying here, dead.",
        _ => " is here.",
    }
}

fn room_view(world: &World, id: EntityId) -> String {
    let Some(me) = world.entity(id) else { return String::new() };
    let key = me.location();
    let room = match world.get_room(key) {
        Ok(room) => room,
        Err(e) => {
            log::error!("{} is standing in a missing room: {}", me.name(), e);
            return "\r\nYou are floating in a formless void.\r\n".into();
        }
    };
    let mut out = format!("\r\n&W{}&d\r\n", room.name);
    if !room.desc.is_empty() {
        out.push_str(&room.desc);
        out.push_str("\r\n");
    }
    out.push_str(&format!("&YExits:&d {}\r\n", world.describe_exits(key)));
    if key.ship == 0 {
        for ship in world.ships_docked_at(key.room) {
            out.push_str(&format!("&C{} is docked here.&d\r\n", ship.name));
        }
    }
    for item in &room.items {
        out.push_str(&format!("&G{} is here.&d\r\n", item.name));
    }
    for other in world.entities().filter(|e| e.location() == key && e.id() != id) {
        out.push_str(&format!("&P{}&d{}\r\n", other.name(), posture(other)));
    }
    out
}

fn item_list(items: &[ItemData]) -> String {
    if items.is_empty() {
        return "     Nothing.\r\n".into();
    }
    items.iter().map(|i| format!("     {}\r\n", i.name)).collect()
}

fn find_visible_item<'a>(world: &'a World, e: &'a Entity, query: &str) -> Option<&'a ItemData> {
    let own = e.char.inventory.iter().chain(e.char.equipment.values()).find(|i| i.matches(query));
    own.or_else(|| {
        world
            .get_room(e.location())
            .ok()
            .and_then(|r| r.items.iter().find(|i| i.matches(query)))
    })
}

pub fn do_look(world: &mut World, _services: &Services, id: EntityId, args: &[String]) {
    let Some(me) = world.entity(id) else { return };
    match me.state() {
        EntityState::Dead => {
            me.send("\r\nYou are dead.\r\n");
            return;
        }
        EntityState::Sleeping | EntityState::Unconscious => {
            me.send("\r\nYou can't see anything, you're not awake!\r\n");
            return;
        }
        _ => {}
    }

    if args.is_empty() {
        me.send(room_view(world, id));
        return;
    }

    if args[0] == "in" {
        let Some(query) = args.get(1) else {
            me.send("\r\nLook in what?\r\n");
            return;
        };
        match find_visible_item(world, me, query) {
            Some(c) if c.is_container() => {
                me.send(format!("\r\n{} contains:\r\n{}", c.name, item_list(&c.contents)));
            }
            Some(c) => me.send(format!("\r\n{} is not a container.\r\n", c.name)),
            None => me.send("\r\nYou don't see that here.\r\n"),
        }
        return;
    }

    let query = &args[0];
    if let Some(other) = world.find_in_room(me.location(), query, id).and_then(|o| world.entity(o)) {
        let mut out = format!("\r\n&W{}&d {}\r\n", other.name(), other.char.title);
        if !other.char.desc.is_empty() {
            out.push_str(&other.char.desc);
            out.push_str("\r\n");
        }
        if !other.char.equipment.is_empty() {
            out.push_str("They are using:\r\n");
            for (slot, item) in &other.char.equipment {
                out.push_str(&format!("  &Y<{}>&d {}\r\n", slot, item.name));
            }
        }
        me.send(out);
        if other.is_player() {
            other.send(format!("\r\n{} looks at you.\r\n", me.name()));
        }
        return;
    }
    match find_visible_item(world, me, query) {
        Some(item) if item.desc.is_empty() => me.send(format!("\r\nYou see nothing special about {}.\r\n", item.name)),
        Some(item) => me.send(format!("\r\n{}\r\n", item.desc)),
        None => me.send("\r\nYou don't see that here.\r\n"),
    }
}

pub fn do_who(world: &mut World, _services: &Services, id: EntityId, _args: &[String]) {
    let mut out = String::from("\r\n&Y--- Players Online ---&d\r\n");
    let mut count = 0;
    for e in world.entities().filter(|e| e.is_player()) {
        let flag = if e.is_connected() { "" } else { " &x(linkdead)&d" };
        out.push_str(&format!(
            "&G[&W{:>3} {:<12}&G]&d {} {}{}\r\n",
            e.char.level, e.char.race, e.name(), e.char.title, flag
        ));
        count += 1;
    }
    out.push_str(&format!("&Y{} player{} online.&d\r\n", count, if count == 1 { "" } else { "s" }));
    send(world, id, &out);
}

pub fn do_score(world: &mut World, _services: &Services, id: EntityId, _args: &[String]) {
    let Some(e) = world.entity(id) else { return };
    let ch = &e.char;
    let mut out = format!("\r\n&W{}&d {}\r\n", ch.name, ch.title);
    out.push_str(&format!(
        "&GRace:&W {}  &GLevel:&W {}  &GExperience:&W {} &G(next at {})&d\r\n",
        ch.race,
        ch.level,
        ch.xp,
        xp_for_level(ch.level)
    ));
    out.push_str(&format!(
        "&GHp:&W {}/{}  &GMp:&W {}/{}  &GMv:&W {}/{}&d\r\n",
        e.effective_hp().max(0),
        ch.hp.max,
        ch.mp.current,
        ch.mp.max,
        ch.mv.current,
        ch.mv.max
    ));
    let stats: Vec<String> = STAT_NAMES
        .iter()
        .zip(ch.stats.iter())
        .map(|(n, v)| format!("&G{}:&W {}", n, v))
        .collect();
    out.push_str(&stats.join("  "));
    out.push_str("&d\r\n");
    out.push_str(&format!("&GGold:&W {}", ch.gold));
    if let Some(p) = e.player() {
        out.push_str(&format!("  &GBank:&W {}  &GComlink:&W {}", p.bank, p.frequency));
    }
    out.push_str(&format!("  &GState:&W {}&d\r\n", ch.state.as_str()));
    e.send(out);
}

pub fn do_inventory(world: &mut World, _services: &Services, id: EntityId, _args: &[String]) {
    let Some(e) = world.entity(id) else { return };
    e.send(format!(
        "\r\nYou are carrying ({} kg):\r\n{}",
        e.char.carried_weight(),
        item_list(&e.char.inventory)
    ));
}

pub fn do_equipment(world: &mut World, _services: &Services, id: EntityId, _args: &[String]) {
    let Some(e) = world.entity(id) else { return };
    let mut out = String::from("\r\nYou are using:\r\n");
    if e.char.equipment.is_empty() {
        out.push_str("     Nothing.\r\n");
    }
    for (slot, item) in &e.char.equipment {
        out.push_str(&format!("  &Y<{:<8}>&d {}\r\n", slot, item.name));
    }
    out.push_str(&format!("&GArmor class:&W {}&d\r\n", e.char.armor_class()));
    e.send(out);
}

pub fn do_help(world: &mut World, _services: &Services, id: EntityId, args: &[String]) {
    let level = world.entity(id).map(|e| e.privilege()).unwrap_or(0);
    let topic = if args.is_empty() { "help".to_string() } else { args.join(" ") };
    let found = world.helps_for(&topic, level);
    let msg = match found.first() {
        Some(help) => format!("\r\n&W{}&d\r\n{}\r\n", help.name.to_uppercase(), help.desc),
        None if args.is_empty() => "\r\nTry 'commands' for a list of commands.\r\n".into(),
        None => "\r\nNo help on that word.\r\n".into(),
    };
    send(world, id, &msg);
}

pub fn do_commands(world: &mut World, _services: &Services, id: EntityId, _args: &[String]) {
    let level = world.entity(id).map(|e| e.privilege()).unwrap_or(0);
    let names: Vec<String> = world.commands.visible(level).map(|c| format!("{:<14}", c.name)).collect();
    let mut out = String::from("\r\n");
    for row in names.chunks(5) {
        out.push_str(&row.concat());
        out.push_str("\r\n");
    }
    send(world, id, &out);
}

pub fn do_description(world: &mut World, _services: &Services, id: EntityId, _args: &[String]) {
    let Some(initial) = world.entity(id).map(|e| e.char.desc.clone()) else { return };
    open_editor(world, id, EditTarget::CharDesc, initial);
}

pub fn do_save(world: &mut World, services: &Services, id: EntityId, _args: &[String]) {
    match world.entity(id) {
        Some(e) if persistence::save_entity(services, e) => e.send("\r\nSaved.\r\n"),
        Some(e) => e.send("\r\nYour character could not be saved right now.\r\n"),
        None => {}
    }
}

pub fn do_quit(world: &mut World, services: &Services, id: EntityId, _args: &[String]) {
    let Some(e) = world.entity(id) else { return };
    if !e.is_player() {
        return;
    }
    if e.is_fighting() {
        e.send("\r\nNo way! You are fighting.\r\n");
        return;
    }
    persistence::save_entity(services, e);
    let name = e.name().to_string();
    let room = e.location();
    e.send("\r\n&YMay the Force be with you.&d\r\n");

    if let Some(client) = world.client_for(id).map(|c| c.id) {
        if let Some(c) = world.client_mut(client) {
            c.entity = None;
            c.send(Outbound::Close);
        }
    }
    world.remove_entity(id);
    world.send_to_room(room, &format!("\r\n{} has left the game.\r\n", name), &[]);
    info!("{} quit", name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tests::{add_player, drain, test_world};
    use crate::world::RoomKey;
    use mud_shared::HelpData;

    #[test]
    fn test_look_shows_room_and_occupants() {
        let mut world = test_world();
        let (services, _q) = Services::detached(World::default());
        let (han, mut rx) = add_player(&mut world, "Han", 100);
        add_player(&mut world, "Chewie", 100);
        world.get_room_mut(RoomKey::planet(100)).unwrap().items.push(ItemData { id: 1, name: "a crate".into(), ..Default::default() });
        do_look(&mut world, &services, han, &[]);
        let out = drain(&mut rx);
        assert!(out.contains("Docking Bay"));
        assert!(out.contains("Exits: north"));
        assert!(out.contains("a crate is here."));
        assert!(out.contains("Chewie is here."));
        assert!(!out.contains("Han is here."));
    }

    #[test]
    fn test_look_in_container() {
        let mut world = test_world();
        let (services, _q) = Services::detached(World::default());
        let (han, mut rx) = add_player(&mut world, "Han", 100);
        world.entity_mut(han).unwrap().char.inventory.push(ItemData {
            id: 1,
            name: "a satchel".into(),
            item_type: mud_shared::ItemType::Container,
            contents: vec![ItemData { id: 2, name: "a datapad".into(), ..Default::default() }],
            ..Default::default()
        });
        do_look(&mut world, &services, han, &["in".to_string(), "satchel".to_string()]);
        assert!(drain(&mut rx).contains("a datapad"));
    }

    #[test]
    fn test_help_respects_level() {
        let mut world = test_world();
        let (services, _q) = Services::detached(World::default());
        world.helps.push(HelpData { name: "advance".into(), keywords: vec![], level: 100, desc: "Admin only.".into() });
        world.helps.push(HelpData { name: "armor".into(), keywords: vec![], level: 0, desc: "Armor class.".into() });
        let (han, mut rx) = add_player(&mut world, "Han", 100);
        do_help(&mut world, &services, han, &["a".to_string()]);
        let out = drain(&mut rx);
        assert!(out.contains("ARMOR"));
        assert!(!out.contains("Admin only."));
    }

    #[test]
    fn test_quit_removes_entity_and_closes() {
        let mut world = test_world();
        let (services, _q) = Services::detached(World::default());
        let (han, mut rx) = add_player(&mut world, "Han", 100);
        let (_luke, mut rx_luke) = add_player(&mut world, "Luke", 100);
        do_quit(&mut world, &services, han, &[]);
        assert!(world.entity(han).is_none());
        assert!(drain(&mut rx_luke).contains("Han has left the game."));
        let mut closed = false;
        while let Ok(msg) = rx.try_recv() {
            closed |= msg == Outbound::Close;
        }
        assert!(closed);
    }
}
