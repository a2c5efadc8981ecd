//! Command table and dispatcher.
//!
//! A typed line is split into a verb and arguments. Three sigils skip the
//! table entirely: `'` says, `"` transmits on the comlink and `.` emotes.
//! `!` replays the previous line. Otherwise the verb is prefix-matched
//! against each command's keywords in table order and the first command the
//! entity is privileged enough for runs.
//!
//! Handlers never fail outward: anything wrong with the input is reported
//! to the entity as text.

pub mod communication;
pub mod movement;
pub mod info;
pub mod objects;
pub mod combat;
pub mod admin;
pub mod space;

use log::{debug, warn};

use mud_shared::CommandDef;

use crate::entities::player::ADMIN_PRIV;
use crate::entities::EntityId;
use crate::network::{EditTarget, Outbound};
use crate::services::Services;
use crate::world::World;

/// Signature every command handler shares
pub type Handler = fn(&mut World, &Services, EntityId, &[String]);

/// A loaded command
#[derive(Clone)]
pub struct Command {
    pub name: String,
    pub keywords: Vec<String>,
    pub level: u32,
    pub func: String,
    handler: Handler,
}

impl Command {
    fn matches(&self, verb: &str) -> bool {
        !verb.is_empty() && self.keywords.iter().any(|k| k.starts_with(verb))
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("func", &self.func)
            .finish()
    }
}

/// Ordered command table
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    commands: Vec<Command>,
}

impl CommandTable {
    /// Bind loaded definitions to handlers. A definition naming an unknown
    /// function is kept but does nothing.
    pub fn from_defs(defs: Vec<CommandDef>) -> Self {
        let commands = defs
            .into_iter()
            .map(|def| {
                let handler = lookup(&def.func).unwrap_or_else(|| {
                    warn!("Command '{}' names unknown function '{}'", def.name, def.func);
                    do_nothing
                });
                let mut keywords = def.keywords;
                if keywords.is_empty() {
                    keywords.push(def.name.clone());
                }
                Command {
                    name: def.name,
                    keywords,
                    level: def.level,
                    func: def.func,
                    handler,
                }
            })
            .collect();
        Self { commands }
    }

    /// The table used when no `sys/commands.json` exists.
    pub fn builtin() -> Self {
        Self::from_defs(builtin_defs())
    }

    /// First command matching `verb` that `privilege` may use.
    pub fn find(&self, verb: &str, privilege: u32, trusted: bool) -> Option<&Command> {
        self.commands
            .iter()
            .find(|c| c.matches(verb) && (trusted || c.level <= privilege))
    }

    /// Commands visible at a privilege level, in table order
    pub fn visible(&self, privilege: u32) -> impl Iterator<Item = &Command> {
        self.commands.iter().filter(move |c| c.level <= privilege)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Resolve a function name from the command table to its handler.
pub fn lookup(func: &str) -> Option<Handler> {
    let handler: Handler = match func {
        "do_say" => communication::do_say,
        "do_shout" => communication::do_shout,
        "do_emote" => communication::do_emote,
        "do_comlink" => communication::do_comlink,
        "do_tune" => communication::do_tune,
        "do_speak" => communication::do_speak,

        "do_north" => movement::do_north,
        "do_east" => movement::do_east,
        "do_south" => movement::do_south,
        "do_west" => movement::do_west,
        "do_northeast" => movement::do_northeast,
        "do_northwest" => movement::do_northwest,
        "do_southeast" => movement::do_southeast,
        "do_southwest" => movement::do_southwest,
        "do_up" => movement::do_up,
        "do_down" => movement::do_down,
        "do_open" => movement::do_open,
        "do_close" => movement::do_close,
        "do_lock" => movement::do_lock,
        "do_unlock" => movement::do_unlock,
        "do_sit" => movement::do_sit,
        "do_stand" => movement::do_stand,
        "do_sleep" => movement::do_sleep,

        "do_look" => info::do_look,
        "do_who" => info::do_who,
        "do_score" => info::do_score,
        "do_inventory" => info::do_inventory,
        "do_equipment" => info::do_equipment,
        "do_help" => info::do_help,
        "do_commands" => info::do_commands,
        "do_description" => info::do_description,
        "do_save" => info::do_save,
        "do_quit" => info::do_quit,

        "do_get" => objects::do_get,
        "do_put" => objects::do_put,
        "do_drop" => objects::do_drop,
        "do_give" => objects::do_give,
        "do_wear" => objects::do_wear,
        "do_remove" => objects::do_remove,

        "do_kill" => combat::do_kill,
        "do_flee" => combat::do_flee,

        "do_advance" => admin::do_advance,
        "do_transfer" => admin::do_transfer,
        "do_areset" => admin::do_areset,
        "do_echo" => admin::do_echo,
        "do_goto" => admin::do_goto,
        "do_redit" => admin::do_redit,
        "do_asave" => admin::do_asave,

        "do_board" => space::do_board,
        "do_leave" => space::do_leave,
        "do_starsystems" => space::do_starsystems,
        "do_hyperspace" => space::do_hyperspace,

        "do_nothing" => do_nothing,
        _ => return None,
    };
    Some(handler)
}

/// Placeholder for table entries that bind to nothing
pub fn do_nothing(_world: &mut World, _services: &Services, _entity: EntityId, _args: &[String]) {}

fn builtin_defs() -> Vec<CommandDef> {
    vec![
        // movement comes first so single letters resolve to directions
        CommandDef::new("north", &["north"], 0, "do_north"),
        CommandDef::new("east", &["east"], 0, "do_east"),
        CommandDef::new("south", &["south"], 0, "do_south"),
        CommandDef::new("west", &["west"], 0, "do_west"),
        CommandDef::new("up", &["up"], 0, "do_up"),
        CommandDef::new("down", &["down"], 0, "do_down"),
        CommandDef::new("northeast", &["northeast", "ne"], 0, "do_northeast"),
        CommandDef::new("northwest", &["northwest", "nw"], 0, "do_northwest"),
        CommandDef::new("southeast", &["southeast", "se"], 0, "do_southeast"),
        CommandDef::new("southwest", &["southwest", "sw"], 0, "do_southwest"),
        CommandDef::new("look", &["look"], 0, "do_look"),
        CommandDef::new("say", &["say"], 0, "do_say"),
        CommandDef::new("shout", &["shout", "yell"], 0, "do_shout"),
        CommandDef::new("emote", &["emote"], 0, "do_emote"),
        CommandDef::new("comlink", &["comlink", "clink"], 0, "do_comlink"),
        CommandDef::new("tune", &["tune"], 0, "do_tune"),
        CommandDef::new("speak", &["speak"], 0, "do_speak"),
        CommandDef::new("inventory", &["inventory"], 0, "do_inventory"),
        CommandDef::new("equipment", &["equipment"], 0, "do_equipment"),
        CommandDef::new("get", &["get", "take"], 0, "do_get"),
        CommandDef::new("put", &["put"], 0, "do_put"),
        CommandDef::new("drop", &["drop"], 0, "do_drop"),
        CommandDef::new("give", &["give"], 0, "do_give"),
        CommandDef::new("wear", &["wear", "wield"], 0, "do_wear"),
        CommandDef::new("remove", &["remove"], 0, "do_remove"),
        CommandDef::new("open", &["open"], 0, "do_open"),
        CommandDef::new("close", &["close"], 0, "do_close"),
        CommandDef::new("lock", &["lock"], 0, "do_lock"),
        CommandDef::new("unlock", &["unlock"], 0, "do_unlock"),
        CommandDef::new("kill", &["kill", "attack"], 0, "do_kill"),
        CommandDef::new("flee", &["flee"], 0, "do_flee"),
        CommandDef::new("sit", &["sit"], 0, "do_sit"),
        CommandDef::new("stand", &["stand", "wake"], 0, "do_stand"),
        CommandDef::new("sleep", &["sleep"], 0, "do_sleep"),
        CommandDef::new("who", &["who"], 0, "do_who"),
        CommandDef::new("score", &["score"], 0, "do_score"),
        CommandDef::new("help", &["help"], 0, "do_help"),
        CommandDef::new("commands", &["commands"], 0, "do_commands"),
        CommandDef::new("description", &["description"], 1, "do_description"),
        CommandDef::new("board", &["board"], 0, "do_board"),
        CommandDef::new("leave", &["leave"], 0, "do_leave"),
        CommandDef::new("starsystems", &["starsystems", "systems"], 0, "do_starsystems"),
        CommandDef::new("hyperspace", &["hyperspace"], 0, "do_hyperspace"),
        CommandDef::new("save", &["save"], 1, "do_save"),
        CommandDef::new("quit", &["quit"], 1, "do_quit"),
        CommandDef::new("advance", &["advance"], ADMIN_PRIV, "do_advance"),
        CommandDef::new("transfer", &["transfer"], ADMIN_PRIV, "do_transfer"),
        CommandDef::new("areset", &["areset"], ADMIN_PRIV, "do_areset"),
        CommandDef::new("echo", &["echo"], ADMIN_PRIV, "do_echo"),
        CommandDef::new("goto", &["goto"], ADMIN_PRIV, "do_goto"),
        CommandDef::new("redit", &["redit"], ADMIN_PRIV, "do_redit"),
        CommandDef::new("asave", &["asave"], ADMIN_PRIV, "do_asave"),
    ]
}

/// Dispatch one line typed by (or queued for) an entity.
pub fn interpret(world: &mut World, services: &Services, entity: EntityId, line: &str, trusted: bool) {
    let Some(e) = world.entity(entity) else {
        debug!("Dropping command for missing entity {}", entity);
        return;
    };
    let is_player = e.is_player();
    let privilege = e.privilege();

    let mut line = line.trim().to_string();
    if line == "!" {
        line = e.player().map(|p| p.last_command.clone()).unwrap_or_default();
        if line.is_empty() {
            huh(world, entity, is_player);
            return;
        }
    } else if !line.is_empty() {
        if let Some(p) = world.entity_mut(entity).and_then(|e| e.player_mut()) {
            p.last_command = line.clone();
        }
    }

    if line.is_empty() {
        world.prompt(entity);
        return;
    }

    let (handler, args): (Handler, Vec<String>) = match line.chars().next() {
        Some('\'') => (communication::do_say as Handler, split_args(&line[1..])),
        Some('"') => (communication::do_comlink as Handler, split_args(&line[1..])),
        Some('.') => (communication::do_emote as Handler, split_args(&line[1..])),
        _ => {
            let mut parts = line.split_whitespace();
            let verb = parts.next().unwrap_or_default();
            let args: Vec<String> = parts.map(str::to_string).collect();
            match world.commands.find(verb, privilege, trusted) {
                Some(cmd) => (cmd.handler, args),
                None => {
                    huh(world, entity, is_player);
                    return;
                }
            }
        }
    };

    handler(world, services, entity, &args);
    world.prompt(entity);
}

fn split_args(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

fn huh(world: &World, entity: EntityId, is_player: bool) {
    if is_player {
        if let Some(e) = world.entity(entity) {
            e.send("\r\nHuh?\r\n");
        }
        world.prompt(entity);
    }
}

/// Apply the text from a closed editor session and give the connection back
/// to the dispatcher.
pub fn finish_edit(
    world: &mut World,
    services: &Services,
    entity: EntityId,
    target: EditTarget,
    text: Option<String>,
) {
    if let Some(client) = world.client_for(entity).map(|c| c.id) {
        if let Some(c) = world.client_mut(client) {
            c.editing = false;
        }
    }
    match text {
        None => send(world, entity, "\r\nEdit aborted.\r\n"),
        Some(text) => match target {
            EditTarget::RoomDesc(key) => admin::apply_room_desc(world, services, entity, key, text),
            EditTarget::CharDesc => {
                if let Some(e) = world.entity_mut(entity) {
                    e.char.desc = text;
                    e.send("\r\nDescription set.\r\n");
                }
            }
        },
    }
    world.prompt(entity);
}

/// Open the line editor on an entity's connection.
pub(crate) fn open_editor(world: &mut World, entity: EntityId, target: EditTarget, initial: String) {
    let Some(client) = world.client_for(entity).map(|c| c.id) else {
        send(world, entity, "\r\nYou need a connection to use the editor.\r\n");
        return;
    };
    if let Some(c) = world.client_mut(client) {
        c.editing = true;
        c.send(Outbound::Edit { target, initial });
    }
}

/// Send text to one entity, if it is still around.
pub(crate) fn send(world: &World, entity: EntityId, msg: &str) {
    if let Some(e) = world.entity(entity) {
        e.send(msg);
    }
}

/// Join handler arguments back into free text.
pub(crate) fn rest(args: &[String]) -> String {
    args.join(" ")
}
