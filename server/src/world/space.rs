//! Ships: boarding, leaving and the hyperspace countdown.

use log::{info, warn};
use rand::Rng;

use super::{RoomKey, World};
use crate::entities::EntityId;

impl World {
    /// Walk up the ramp of a ship docked in the entity's room.
    pub fn board_ship(&mut self, id: EntityId, query: &str) -> Result<u64, String> {
        let entity = self.entity(id).ok_or("You don't exist.")?;
        if entity.char.ship != 0 {
            return Err("You are already aboard a ship.".into());
        }
        entity.can_move().map_err(str::to_string)?;
        let here = entity.char.room;
        let name = entity.name().to_string();
        let query = query.to_lowercase();
        let (ship_id, ramp, ship_name) = self
            .ships_docked_at(here)
            .into_iter()
            .find(|s| s.name.to_lowercase().starts_with(&query))
            .map(|s| (s.id, s.ramp, s.name.clone()))
            .ok_or_else(|| format!("There is no ship called '{}' here.", query))?;
        let ramp_key = RoomKey::new(ramp, ship_id);
        if !self.has_room(ramp_key) {
            return Err(format!("The ramp of {} is sealed.", ship_name));
        }

        self.send_to_room(RoomKey::planet(here), &format!("\r\n{} boards {}.\r\n", name, ship_name), &[id]);
        if let Some(e) = self.entity_mut(id) {
            e.char.room = ramp;
            e.char.ship = ship_id;
            e.char.mv.lose(1);
        }
        self.send_to_room(ramp_key, &format!("\r\n{} has boarded the ship.\r\n", name), &[id]);
        Ok(ship_id)
    }

    /// Walk down the ramp. Only possible from the ramp room of a docked ship.
    pub fn leave_ship(&mut self, id: EntityId) -> Result<RoomKey, String> {
        let entity = self.entity(id).ok_or("You don't exist.")?;
        let here = entity.location();
        let name = entity.name().to_string();
        entity.can_move().map_err(str::to_string)?;
        let ship = self.ship(here.ship).ok_or("You are not aboard a ship.")?;
        if ship.in_space {
            return Err("You can't leave the airlock in space.".into());
        }
        if here.room != ship.ramp {
            return Err("Please make your way to the ramp to leave the ship.".into());
        }
        let outside = RoomKey::planet(ship.location_id);
        if !self.has_room(outside) {
            return Err("The ramp opens onto nothing.".into());
        }

        self.send_to_room(here, &format!("\r\n{} has left the ship.\r\n", name), &[id]);
        if let Some(e) = self.entity_mut(id) {
            e.char.room = outside.room;
            e.char.ship = 0;
        }
        self.send_to_room(outside, &format!("\r\n{} has arrived.\r\n", name), &[id]);
        Ok(outside)
    }

    /// Start a hyperspace jump toward a star system. The countdown is the
    /// distance in parsecs, rounded, and at least one second.
    pub fn jump_hyperspace<R: Rng>(&mut self, ship_id: u64, target: &str, rng: &mut R) -> Result<u32, String> {
        let dest = self
            .starsystem(target)
            .ok_or_else(|| format!("There is no star system called '{}'.", target))?
            .clone();
        let ship = self.ship(ship_id).ok_or("That ship doesn't exist.")?;
        if ship.in_hyper {
            return Err("The ship is already in hyperspace.".into());
        }
        if ship.current_system.eq_ignore_ascii_case(&dest.name) {
            return Err("You are already in that system.".into());
        }
        let origin = self.starsystem(&ship.current_system).map(|s| s.position).unwrap_or(ship.position);
        let dx = dest.position[0] - origin[0];
        let dy = dest.position[1] - origin[1];
        let seconds = ((dx * dx + dy * dy).sqrt().round() as u32).max(1);

        let ship = self.ship_mut(ship_id).ok_or("That ship doesn't exist.")?;
        ship.in_space = true;
        ship.in_hyper = true;
        ship.hyper_destination = Some(dest.name.clone());
        ship.hyper_time_until = seconds;
        ship.heading = rng.gen_range(0.0..360.0);
        info!("Ship '{}' [{}] jumping to {} ({}s)", ship.name, ship.id, dest.name, seconds);
        Ok(seconds)
    }

    /// One second of hyperspace travel for every ship in transit. Ships whose
    /// countdown runs out drop into the destination system and dock at its
    /// first spaceport, if it has one.
    pub fn tick_hyperspace(&mut self) -> Vec<u64> {
        let mut arrived = Vec::new();
        for ship in self.ships.iter_mut().filter(|s| s.in_hyper) {
            ship.hyper_time_until = ship.hyper_time_until.saturating_sub(1);
            if ship.hyper_time_until == 0 {
                arrived.push(ship.id);
            }
        }

        for ship_id in &arrived {
            let Some(ship) = self.ship(*ship_id) else { continue };
            let dest_name = ship.hyper_destination.clone().unwrap_or_default();
            let (position, port) = match self.starsystem(&dest_name) {
                Some(sys) => (sys.position, sys.landing_room()),
                None => {
                    warn!("Ship {} arrived at unknown system '{}'", ship_id, dest_name);
                    (ship.position, None)
                }
            };
            let port = port.filter(|p| self.has_room(RoomKey::planet(*p)));
            if let Some(ship) = self.ship_mut(*ship_id) {
                ship.in_hyper = false;
                ship.hyper_destination = None;
                ship.current_system = dest_name.clone();
                ship.position = position;
                if let Some(room) = port {
                    ship.in_space = false;
                    ship.location_id = room;
                }
            }
            let msg = match port {
                Some(_) => format!("\r\n&YThe ship drops out of hyperspace and settles onto a landing pad in {}.&d\r\n", dest_name),
                None => format!("\r\n&YThe ship drops out of hyperspace in the {} system.&d\r\n", dest_name),
            };
            for e in self.entities().filter(|e| e.char.ship == *ship_id) {
                e.send(msg.as_str());
            }
            if let Some(room) = port {
                if let Some(ship) = self.ship(*ship_id) {
                    let notice = format!("\r\n&W{}&d lands nearby.\r\n", ship.name);
                    self.send_to_room(RoomKey::planet(room), &notice, &[]);
                }
            }
        }
        arrived
    }

    /// Human-readable list of known systems.
    pub fn describe_starsystems(&self) -> String {
        let mut out = String::from("\r\n&YStar Systems&d\r\n");
        for sys in &self.starsystems {
            out.push_str(&format!(
                "&W{:<24}&d &YSector:&d {:<16} &YPosition:&d {:.2}, {:.2}\r\n",
                sys.name, sys.sector, sys.position[0], sys.position[1]
            ));
            for orbit in &sys.orbits {
                out.push_str(&format!("    &W└{}&d\r\n", orbit.name));
            }
        }
        out
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::world::tests::{add_player, drain, test_world};
    use mud_shared::{OrbitalData, RoomData, ShipData, StarSystemData};
    use rand::rngs::mock::StepRng;

    /// The test world plus a docked freighter and two star systems.
    pub fn with_ship() -> World {
        let mut world = test_world();
        let mut ramp = RoomData::new(1, "Boarding Ramp");
        ramp.exits.insert("north".into(), 2);
        let cockpit = RoomData::new(2, "Cockpit");
        world.add_ship(ShipData {
            id: 300_000_001,
            name: "Millennium Falcon".into(),
            location_id: 100,
            current_system: "Tatooine".into(),
            rooms: vec![ramp, cockpit],
            ramp: 1,
            cockpit: 2,
            ..Default::default()
        });
        world.starsystems.push(StarSystemData {
            name: "Tatooine".into(),
            position: [0.0, 0.0],
            orbits: vec![OrbitalData { name: "Tatooine".into(), spaceports: vec![100], ..Default::default() }],
            ..Default::default()
        });
        world.starsystems.push(StarSystemData {
            name: "Corellia".into(),
            position: [3.0, 4.0],
            orbits: vec![OrbitalData { name: "Corellia".into(), spaceports: vec![102], ..Default::default() }],
            ..Default::default()
        });
        world
    }

    #[test]
    fn test_board_and_leave() {
        let mut world = with_ship();
        let (han, mut rx) = add_player(&mut world, "Han", 100);
        assert!(world.board_ship(han, "mill").is_ok());
        assert_eq!(world.entity(han).unwrap().location(), RoomKey::new(1, 300_000_001));
        assert!(world.board_ship(han, "mill").is_err());
        assert_eq!(world.leave_ship(han).unwrap(), RoomKey::planet(100));
        assert_eq!(world.entity(han).unwrap().char.ship, 0);
        drain(&mut rx);
    }

    #[test]
    fn test_leave_only_from_ramp() {
        let mut world = with_ship();
        let (han, _rx) = add_player(&mut world, "Han", 100);
        world.board_ship(han, "millennium").unwrap();
        world.entity_mut(han).unwrap().char.room = 2;
        let err = world.leave_ship(han).unwrap_err();
        assert!(err.contains("ramp"));
    }

    #[test]
    fn test_hyperspace_countdown_and_arrival() {
        let mut world = with_ship();
        let secs = world.jump_hyperspace(300_000_001, "cor", &mut StepRng::new(0, 0)).unwrap();
        assert_eq!(secs, 5);
        assert!(world.ship(300_000_001).unwrap().in_space);
        for _ in 0..4 {
            assert!(world.tick_hyperspace().is_empty());
        }
        assert_eq!(world.tick_hyperspace(), vec![300_000_001]);
        let ship = world.ship(300_000_001).unwrap();
        assert!(!ship.in_hyper);
        assert!(!ship.in_space);
        assert_eq!(ship.location_id, 102);
        assert_eq!(ship.current_system, "Corellia");
    }

    #[test]
    fn test_cannot_leave_in_space() {
        let mut world = with_ship();
        let (han, _rx) = add_player(&mut world, "Han", 100);
        world.board_ship(han, "mill").unwrap();
        world.jump_hyperspace(300_000_001, "Corellia", &mut StepRng::new(0, 0)).unwrap();
        assert!(world.leave_ship(han).unwrap_err().contains("space"));
    }
}
