//! Scripted reactions attached to mob prototypes and rooms.
//!
//! A script body is a list of instructions, one per line, drawn from a small
//! closed set. Text arguments may use `$n` (the entity that triggered the
//! event), `$i` (the item involved), `$s` (spoken words) and `$me` (the
//! owner's own name). Entity-owned scripts act by queueing trusted commands
//! as if the owner typed them; room-owned scripts can only echo and transfer.
//!
//! Script faults are logged and never interrupt the action that fired them.

use log::{debug, warn};
use rand::Rng;

use crate::entities::EntityId;
use crate::error::{MudError, MudResult};
use crate::executor::QueuedCommand;
use crate::services::Services;
use crate::world::{lock_world, RoomKey, World};

/// Events a script can react to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    Spawn,
    Enter,
    Leave,
    Greet,
    Move,
    Kill,
    Death,
    Drop,
    Give,
    Say,
}

impl HookEvent {
    /// Key of the script body in a `progs` map
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::Spawn => "spawn",
            HookEvent::Enter => "enter",
            HookEvent::Leave => "leave",
            HookEvent::Greet => "greet",
            HookEvent::Move => "move",
            HookEvent::Kill => "kill",
            HookEvent::Death => "death",
            HookEvent::Drop => "drop",
            HookEvent::Give => "give",
            HookEvent::Say => "say",
        }
    }
}

/// Values bound for substitution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookContext {
    pub actor: Option<String>,
    pub item: Option<String>,
    pub text: Option<String>,
}

/// One parsed script line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Say(String),
    Emote(String),
    Echo(String),
    Transfer { target: String, room: u64 },
    Look,
    Fight(String),
    Stand,
    Delay(u32),
    Random(u32),
}

/// Who a script runs as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Entity(EntityId),
    Room(RoomKey),
}

/// Parse a script body. Blank lines and `#` comments are skipped; an unknown
/// instruction fails the whole body.
pub fn parse(body: &str) -> MudResult<Vec<Instruction>> {
    let mut out = Vec::new();
    for (n, line) in body.lines().enumerate() {
        let line = line.trim().trim_end_matches(';');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (op, rest) = match line.split_once(char::is_whitespace) {
            Some((op, rest)) => (op, rest.trim()),
            None => (line, ""),
        };
        let number = |what: &str| {
            rest.parse::<u32>()
                .map_err(|_| MudError::Script(format!("line {}: {} needs a number, got '{}'", n + 1, what, rest)))
        };
        let instr = match op.to_lowercase().as_str() {
            "say" => Instruction::Say(rest.to_string()),
            "emote" => Instruction::Emote(rest.to_string()),
            "echo" => Instruction::Echo(rest.to_string()),
            "look" => Instruction::Look,
            "stand" => Instruction::Stand,
            "fight" | "kill" => Instruction::Fight(rest.to_string()),
            "delay" => Instruction::Delay(number("delay")?),
            "random" => Instruction::Random(number("random")?.min(100)),
            "transfer" => {
                let (target, room) = rest
                    .rsplit_once(char::is_whitespace)
                    .ok_or_else(|| MudError::Script(format!("line {}: transfer <who> <room>", n + 1)))?;
                let room = room
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| MudError::Script(format!("line {}: bad room '{}'", n + 1, room)))?;
                Instruction::Transfer { target: target.trim().to_string(), room }
            }
            other => return Err(MudError::Script(format!("line {}: unknown instruction '{}'", n + 1, other))),
        };
        out.push(instr);
    }
    Ok(out)
}

/// Replace the bound variables in a line of script text.
pub fn substitute(text: &str, ctx: &HookContext, me: &str) -> String {
    text.replace("$me", me)
        .replace("$n", ctx.actor.as_deref().unwrap_or("someone"))
        .replace("$i", ctx.item.as_deref().unwrap_or("something"))
        .replace("$s", ctx.text.as_deref().unwrap_or(""))
}

/// Run an entity's script for `event`, if it has one.
pub fn fire_entity(world: &mut World, services: &Services, id: EntityId, event: HookEvent, ctx: &HookContext) {
    let Some(body) = world.entity(id).and_then(|e| e.char.progs.get(event.as_str())).cloned() else {
        return;
    };
    start(world, services, Owner::Entity(id), event, &body, ctx);
}

/// Run a room's script for `event`, if it has one.
pub fn fire_room(world: &mut World, services: &Services, key: RoomKey, event: HookEvent, ctx: &HookContext) {
    let Some(body) = world.get_room(key).ok().and_then(|r| r.progs.get(event.as_str())).cloned() else {
        return;
    };
    start(world, services, Owner::Room(key), event, &body, ctx);
}

/// Fire an event on every NPC in a room other than `except`.
pub fn fire_npcs_in_room(
    world: &mut World,
    services: &Services,
    key: RoomKey,
    except: EntityId,
    event: HookEvent,
    ctx: &HookContext,
) {
    let ids: Vec<EntityId> = world
        .entities()
        .filter(|e| e.location() == key && e.id() != except && !e.is_player() && !e.is_unspeakable())
        .filter(|e| e.char.progs.contains_key(event.as_str()))
        .map(|e| e.id())
        .collect();
    for id in ids {
        fire_entity(world, services, id, event, ctx);
    }
}

fn start(world: &mut World, services: &Services, owner: Owner, event: HookEvent, body: &str, ctx: &HookContext) {
    match parse(body) {
        Ok(program) => {
            debug!("Running {} hook for {:?}", event.as_str(), owner);
            run(world, services, owner, &program, ctx);
        }
        Err(e) => warn!("Script fault in {} hook of {:?}: {}", event.as_str(), owner, e),
    }
}

fn run(world: &mut World, services: &Services, owner: Owner, program: &[Instruction], ctx: &HookContext) {
    let me = match owner {
        Owner::Entity(id) => match world.entity(id) {
            Some(e) if !e.is_dead() => e.name().to_string(),
            // the owner died or left the roster while the script waited
            _ => return,
        },
        Owner::Room(key) => match world.get_room(key) {
            Ok(r) => r.name.clone(),
            Err(e) => {
                warn!("Script owner vanished: {}", e);
                return;
            }
        },
    };

    for (pc, instr) in program.iter().enumerate() {
        match instr {
            Instruction::Delay(seconds) => {
                let rest = program[pc + 1..].to_vec();
                if rest.is_empty() {
                    return;
                }
                let svc = services.clone();
                let ctx = ctx.clone();
                services.scheduler.once((*seconds).max(1), move || {
                    let mut world = lock_world(&svc.world);
                    run(&mut world, &svc, owner, &rest, &ctx);
                });
                return;
            }
            Instruction::Random(percent) => {
                if rand::thread_rng().gen_range(1..=100) > *percent {
                    return;
                }
            }
            Instruction::Echo(text) => {
                let text = substitute(text, ctx, &me);
                let room = match owner {
                    Owner::Entity(id) => world.entity(id).map(|e| e.location()),
                    Owner::Room(key) => Some(key),
                };
                if let Some(room) = room {
                    world.send_to_room(room, &format!("\r\n{}\r\n", text), &[]);
                }
            }
            Instruction::Transfer { target, room } => {
                let target = substitute(target, ctx, &me);
                match owner {
                    Owner::Entity(id) => queue(services, id, format!("transfer {} {}", target, room)),
                    Owner::Room(_) => transfer(world, &target, *room),
                }
            }
            other => {
                let Owner::Entity(id) = owner else {
                    debug!("Room script on {:?} cannot {:?}", owner, other);
                    continue;
                };
                let line = match other {
                    Instruction::Say(text) => format!("say {}", substitute(text, ctx, &me)),
                    Instruction::Emote(text) => format!("emote {}", substitute(text, ctx, &me)),
                    Instruction::Fight(target) => format!("kill {}", substitute(target, ctx, &me)),
                    Instruction::Look => "look".to_string(),
                    Instruction::Stand => "stand".to_string(),
                    _ => continue,
                };
                queue(services, id, line);
            }
        }
    }
}

fn queue(services: &Services, entity: EntityId, line: String) {
    services.queue(QueuedCommand::Line { entity, line, trusted: true });
}

/// Move whoever matches `target` to a planet room, without ceremony.
fn transfer(world: &mut World, target: &str, room: u64) {
    let key = RoomKey::planet(room);
    if !world.has_room(key) {
        warn!("Script transfer into missing room {}", room);
        return;
    }
    let Some(id) = world.find_entity(target) else {
        return;
    };
    if let Some(e) = world.entity_mut(id) {
        e.char.room = room;
        e.char.ship = 0;
        e.send("\r\n&YYou are whisked away!&d\r\n");
    }
}
