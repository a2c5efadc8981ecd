//! Item ownership helpers and instance id allocation.
//!
//! An item lives in exactly one list at a time: a room, an inventory, an
//! equipment slot or a container. Moving is always take-then-put.

use rand::Rng;

use mud_shared::{CharData, ItemData, ItemType};

use super::player::gender_name;

/// Instance id bands, one per record kind
pub fn new_npc_id<R: Rng>(rng: &mut R) -> u64 {
    rng.gen_range(100_000_000..200_000_000)
}

pub fn new_item_id<R: Rng>(rng: &mut R) -> u64 {
    rng.gen_range(200_000_000..300_000_000)
}

pub fn new_ship_id<R: Rng>(rng: &mut R) -> u64 {
    rng.gen_range(300_000_000..400_000_000)
}

pub fn new_player_id<R: Rng>(rng: &mut R) -> u64 {
    rng.gen_range(900_000_000..1_000_000_000)
}

/// Push an item unless one with the same id is already in the list.
pub fn add_unique(items: &mut Vec<ItemData>, item: ItemData) -> Result<(), ItemData> {
    if items.iter().any(|i| i.id == item.id) {
        return Err(item);
    }
    items.push(item);
    Ok(())
}

/// Index of the first item matching `query`.
pub fn find_matching(items: &[ItemData], query: &str) -> Option<usize> {
    items.iter().position(|i| i.matches(query))
}

/// Remove and return the first item matching `query`.
pub fn take_matching(items: &mut Vec<ItemData>, query: &str) -> Option<ItemData> {
    let idx = find_matching(items, query)?;
    Some(items.remove(idx))
}

/// Build a corpse holding `contents`.
pub fn make_corpse<R: Rng>(ch: &CharData, contents: Vec<ItemData>, rng: &mut R) -> ItemData {
    let what = format!("{} {}", gender_name(&ch.gender), ch.race.to_lowercase());
    ItemData {
        id: new_item_id(rng),
        oid: 0,
        name: format!("the corpse of {}", ch.name),
        keywords: vec!["corpse".into()],
        desc: format!("A bloody corpse of a {} lies here in rot.", what),
        item_type: ItemType::Corpse,
        value: ch.gold.min(u32::MAX as u64) as u32,
        weight: contents.iter().map(|i| i.total_weight()).sum(),
        contents,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u64, name: &str) -> ItemData {
        ItemData { id, name: name.into(), ..Default::default() }
    }

    #[test]
    fn test_add_unique_rejects_duplicate() {
        let mut items = vec![item(1, "a knife")];
        assert!(add_unique(&mut items, item(2, "a rope")).is_ok());
        let back = add_unique(&mut items, item(1, "a knife"));
        assert_eq!(back.map_err(|i| i.id), Err(1));
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_take_matching() {
        let mut items = vec![item(1, "a knife"), item(2, "a rope")];
        let taken = take_matching(&mut items, "rop").unwrap();
        assert_eq!(taken.id, 2);
        assert_eq!(items.len(), 1);
        assert!(take_matching(&mut items, "rope").is_none());
    }

    #[test]
    fn test_id_bands() {
        let mut rng = rand::thread_rng();
        assert!((100_000_000..200_000_000).contains(&new_npc_id(&mut rng)));
        assert!((200_000_000..300_000_000).contains(&new_item_id(&mut rng)));
        assert!((300_000_000..400_000_000).contains(&new_ship_id(&mut rng)));
    }

    #[test]
    fn test_corpse_holds_contents() {
        let ch = CharData::new("a womp rat");
        let corpse = make_corpse(&ch, vec![item(5, "a tail")], &mut rand::thread_rng());
        assert_eq!(corpse.item_type, ItemType::Corpse);
        assert_eq!(corpse.contents.len(), 1);
        assert!(corpse.matches("corpse"));
    }
}
