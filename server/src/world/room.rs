//! Exits and doors.
//!
//! Door state is stored per side. Operating a door mirrors the change onto
//! the reverse exit of the neighbouring room when that exit leads back.
//! Opened doors swing shut on their own after a while, and keyed doors lock
//! themselves again once closed.

use log::{debug, warn};

use mud_shared::reverse_direction;

use super::{lock_world, RoomKey, World};
use crate::scheduler::ScheduleId;
use crate::services::Services;

/// Seconds before an opened door closes itself
pub const DOOR_AUTO_CLOSE_SECS: u32 = 15;

/// Seconds before an unlocked keyed door locks itself
pub const DOOR_RELOCK_SECS: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorAction {
    Open,
    Close,
    Lock,
    Unlock,
}

impl DoorAction {
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
        }
    }
}

impl World {
    /// Where an exit leads. Errors are user-facing text.
    pub fn exit_target(&self, key: RoomKey, dir: &str) -> Result<RoomKey, &'static str> {
        let room = self.get_room(key).map_err(|_| "You are nowhere.")?;
        let target = room.exits.get(dir).ok_or("You can't go that way.")?;
        Ok(RoomKey::new(*target, key.ship))
    }

    /// Key id required by a door, zero if none.
    pub fn door_key(&self, key: RoomKey, dir: &str) -> u64 {
        self.get_room(key).map(|r| r.exit_flag(dir).key).unwrap_or(0)
    }

    /// Apply a door action to one side of an exit and mirror it.
    pub fn operate_door(&mut self, key: RoomKey, dir: &str, action: DoorAction) -> Result<(), &'static str> {
        let room = self.get_room(key).map_err(|_| "You are nowhere.")?;
        let target = *room.exits.get(dir).ok_or("There is no exit in that direction.")?;
        let mut flag = *room
            .exit_flags
            .get(dir)
            .ok_or("There is no door in that direction.")?;

        match action {
            DoorAction::Open if flag.locked => return Err("It's locked."),
            DoorAction::Open if !flag.closed => return Err("It's already open."),
            DoorAction::Open => flag.closed = false,
            DoorAction::Close if flag.closed => return Err("It's already closed."),
            DoorAction::Close => flag.closed = true,
            DoorAction::Lock if !flag.closed => return Err("You need to close it first."),
            DoorAction::Lock if flag.locked => return Err("It's already locked."),
            DoorAction::Lock => flag.locked = true,
            DoorAction::Unlock if !flag.locked => return Err("It's not locked."),
            DoorAction::Unlock => flag.locked = false,
        }

        if let Ok(room) = self.get_room_mut(key) {
            room.exit_flags.insert(dir.to_string(), flag);
        }

        let other = RoomKey::new(target, key.ship);
        let Some(back) = reverse_direction(dir) else {
            return Ok(());
        };
        match self.get_room_mut(other) {
            Ok(room) if room.exits.get(back) == Some(&key.room) => {
                let entry = room.exit_flags.entry(back.to_string()).or_default();
                entry.closed = flag.closed;
                entry.locked = flag.locked;
            }
            Ok(_) => debug!("Exit {} {} is one-way, not mirroring door", key, dir),
            Err(e) => warn!("Door {} {} leads to a missing room: {}", key, dir, e),
        }
        Ok(())
    }

    /// Exit list for room descriptions, e.g. `north (closed), south`.
    pub fn describe_exits(&self, key: RoomKey) -> String {
        let Ok(room) = self.get_room(key) else {
            return String::new();
        };
        let exits: Vec<String> = mud_shared::DIRECTIONS
            .iter()
            .filter(|d| room.exits.contains_key(**d))
            .map(|d| format!("{}{}", d, room.exit_flag(d).status()))
            .collect();
        if exits.is_empty() {
            "none".into()
        } else {
            exits.join(", ")
        }
    }
}

/// A pending one-shot timer on one side of a door. Only the timer whose
/// generation is still recorded may act when it fires.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DoorTimer {
    generation: u64,
    schedule: ScheduleId,
}

impl World {
    /// This side of a door plus the far side when its exit leads back.
    fn door_sides(&self, key: RoomKey, dir: &str) -> Vec<(RoomKey, String)> {
        let mut sides = vec![(key, dir.to_string())];
        if let (Ok(target), Some(back)) = (self.exit_target(key, dir), reverse_direction(dir)) {
            let leads_back = self
                .get_room(target)
                .map(|r| r.exits.get(back) == Some(&key.room))
                .unwrap_or(false);
            if leads_back {
                sides.push((target, back.to_string()));
            }
        }
        sides
    }

    fn take_door_timers(&mut self, key: RoomKey, dir: &str) -> Vec<ScheduleId> {
        self.door_sides(key, dir)
            .into_iter()
            .filter_map(|side| self.door_timers.remove(&side))
            .map(|t| t.schedule)
            .collect()
    }

    /// Number of doors with a timer pending
    pub fn pending_door_timers(&self) -> usize {
        self.door_timers.len()
    }
}

/// Drop whatever timer is pending on either side of a door.
pub fn clear_door_timer(world: &mut World, services: &Services, key: RoomKey, dir: &str) {
    for schedule in world.take_door_timers(key, dir) {
        services.scheduler.cancel(schedule);
    }
}

/// Replace the door's pending timer with `action` after `seconds`.
fn arm_door_timer(
    world: &mut World,
    services: &Services,
    key: RoomKey,
    dir: &str,
    seconds: u32,
    action: fn(&mut World, &Services, RoomKey, &str),
) {
    clear_door_timer(world, services, key, dir);
    world.next_door_timer += 1;
    let generation = world.next_door_timer;
    let svc = services.clone();
    let side = (key, dir.to_string());
    let schedule = services.scheduler.once(seconds, {
        let side = side.clone();
        move || {
            let mut world = lock_world(&svc.world);
            let current = world.door_timers.get(&side).map(|t| t.generation) == Some(generation);
            if !current {
                return;
            }
            world.door_timers.remove(&side);
            action(&mut world, &svc, side.0, &side.1);
        }
    });
    world.door_timers.insert(side, DoorTimer { generation, schedule });
}

/// After a door opens, close it again unless someone beat us to it.
pub fn schedule_auto_close(world: &mut World, services: &Services, key: RoomKey, dir: &str) {
    arm_door_timer(world, services, key, dir, DOOR_AUTO_CLOSE_SECS, auto_close);
}

/// Lock a keyed door again if it is closed by then.
pub fn schedule_relock(world: &mut World, services: &Services, key: RoomKey, dir: &str) {
    arm_door_timer(world, services, key, dir, DOOR_RELOCK_SECS, relock);
}

fn auto_close(world: &mut World, services: &Services, key: RoomKey, dir: &str) {
    let still_open = world
        .get_room(key)
        .map(|r| r.exit_flags.get(dir).map(|f| !f.closed).unwrap_or(false))
        .unwrap_or(false);
    if !still_open {
        return;
    }
    if world.operate_door(key, dir, DoorAction::Close).is_ok() {
        world.send_to_room(key, &format!("\r\nThe door to the {} swings shut.\r\n", dir), &[]);
        if let Ok(target) = world.exit_target(key, dir) {
            world.send_to_room(target, "\r\nA door swings shut.\r\n", &[]);
        }
        if world.door_key(key, dir) != 0 {
            schedule_relock(world, services, key, dir);
        }
    }
}

fn relock(world: &mut World, _services: &Services, key: RoomKey, dir: &str) {
    let flag = match world.get_room(key) {
        Ok(room) => room.exit_flag(dir),
        Err(_) => return,
    };
    if flag.closed && !flag.locked && flag.key != 0 {
        let _ = world.operate_door(key, dir, DoorAction::Lock);
        world.send_to_room(key, &format!("\r\nYou hear a click from the {}.\r\n", dir), &[]);
    }
}
