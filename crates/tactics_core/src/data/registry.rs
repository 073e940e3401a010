//! Template registry with fallback substitution.

use std::collections::BTreeMap;

use crate::components::{AiArchetype, Mob};
use crate::data::MobTemplate;
use crate::error::{GameError, Result};
use crate::factions::Faction;
use crate::items::Item;
use crate::math::GridPos;
use crate::unit::Unit;

/// Key of the item substituted for unknown item ids.
pub const FALLBACK_ITEM: &str = "unknown_item";

/// Key of the mob substituted for unknown mob ids.
pub const FALLBACK_MOB: &str = "unknown_mob";

/// Parse an item catalog: a RON map from item id to [`Item`].
pub fn parse_item_catalog(source: &str, path: &str) -> Result<BTreeMap<String, Item>> {
    ron::from_str(source).map_err(|e| GameError::DataParseError {
        path: path.to_string(),
        message: e.to_string(),
    })
}

/// Parse a mob catalog: a RON map from mob id to [`MobTemplate`].
pub fn parse_mob_catalog(source: &str, path: &str) -> Result<BTreeMap<String, MobTemplate>> {
    ron::from_str(source).map_err(|e| GameError::DataParseError {
        path: path.to_string(),
        message: e.to_string(),
    })
}

/// Immutable templates keyed by id.
///
/// Lookups never fail: an unknown key logs an error and yields the fallback
/// template, so a typo in content degrades one unit instead of the mission.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    items: BTreeMap<String, Item>,
    mobs: BTreeMap<String, MobTemplate>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRegistry {
    /// Create a registry holding only the fallback templates.
    #[must_use]
    pub fn new() -> Self {
        let mut items = BTreeMap::new();
        let mut fallback_item = Item::named("Unidentified Object");
        fallback_item.description = "Something that should not be here.".into();
        items.insert(FALLBACK_ITEM.to_string(), fallback_item);

        let mut mobs = BTreeMap::new();
        let mut fallback_mob = MobTemplate::named("Unknown Lifeform");
        fallback_mob.description = "A mobile entity with unknown characteristics.".into();
        mobs.insert(FALLBACK_MOB.to_string(), fallback_mob);

        Self { items, mobs }
    }

    /// Build a registry from RON catalog sources.
    pub fn from_ron(items_src: &str, mobs_src: &str) -> Result<Self> {
        let mut registry = Self::new();
        for (id, item) in parse_item_catalog(items_src, "items.ron")? {
            registry.insert_item(id, item);
        }
        for (id, mob) in parse_mob_catalog(mobs_src, "mobs.ron")? {
            registry.insert_mob(id, mob);
        }
        tracing::info!(
            items = registry.items.len(),
            mobs = registry.mobs.len(),
            "Template registry loaded"
        );
        Ok(registry)
    }

    /// Register or replace an item template.
    pub fn insert_item(&mut self, id: impl Into<String>, item: Item) {
        self.items.insert(id.into(), item);
    }

    /// Register or replace a mob template.
    pub fn insert_mob(&mut self, id: impl Into<String>, template: MobTemplate) {
        self.mobs.insert(id.into(), template);
    }

    /// Borrow an item template if it exists.
    #[must_use]
    pub fn item_template(&self, id: &str) -> Option<&Item> {
        self.items.get(id)
    }

    /// Borrow a mob template if it exists.
    #[must_use]
    pub fn mob_template(&self, id: &str) -> Option<&MobTemplate> {
        self.mobs.get(id)
    }

    /// Item ids in sorted order.
    pub fn item_ids(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    /// A fresh item instance, or the fallback for unknown ids.
    pub fn item(&self, id: &str) -> Result<Item> {
        if let Some(item) = self.items.get(id) {
            return Ok(item.clone());
        }
        tracing::error!(item = id, fallback = FALLBACK_ITEM, "Missing item template");
        self.items
            .get(FALLBACK_ITEM)
            .cloned()
            .ok_or_else(|| GameError::TemplateNotFound(id.to_string()))
    }

    /// The mob template for an id, or the fallback for unknown ids.
    pub fn mob(&self, id: &str) -> Result<&MobTemplate> {
        if let Some(template) = self.mobs.get(id) {
            return Ok(template);
        }
        tracing::error!(mob = id, fallback = FALLBACK_MOB, "Missing mob template");
        self.mobs
            .get(FALLBACK_MOB)
            .ok_or_else(|| GameError::TemplateNotFound(id.to_string()))
    }

    /// Build a unit from a mob template, equipped with fresh item instances.
    ///
    /// Player spawns always use the player archetype.
    pub fn spawn(&self, mob_id: &str, pos: GridPos, faction: Faction) -> Result<Unit> {
        let template = self.mob(mob_id)?;
        let archetype = if faction == Faction::Player {
            AiArchetype::Player
        } else {
            template.archetype
        };

        let mut mob = Mob::new(archetype, template.stats.clone());
        mob.death_message.clone_from(&template.death_message);

        let mut unit = Unit::combatant(template.name.clone(), pos, faction, mob);
        for item_id in &template.equipment {
            unit.equip(self.item(item_id)?);
        }
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Slot;

    const ITEMS: &str = r#"{
        "rifle": (
            name: "Mass Driver",
            slot: Ranged,
            class: Projectile,
            stats: (attack: 20, range: 8.0, accuracy: 0.9, ammo: 6, max_ammo: 6, reload: 1),
        ),
        "vest": (name: "Flak Vest", slot: Suit, stats: (defence: 4)),
    }"#;

    const MOBS: &str = r#"{
        "trooper": (name: "Trooper", stats: (health: 80), equipment: ["rifle", "vest"]),
        "grub": (name: "Grub", archetype: MeleeAggressive, stats: (health: 20, defence: 1)),
    }"#;

    fn registry() -> TemplateRegistry {
        TemplateRegistry::from_ron(ITEMS, MOBS).unwrap()
    }

    #[test]
    fn test_spawn_player_uses_player_archetype_and_armour() {
        let unit = registry().spawn("trooper", GridPos::new(2, 3), Faction::Player).unwrap();
        let mob = unit.mob.as_ref().unwrap();
        assert_eq!(mob.archetype, AiArchetype::Player);
        assert_eq!(mob.stats.defence, 4);
        assert_eq!(unit.original_health, 80);
        assert_eq!(unit.pos, GridPos::new(2, 3));
    }

    #[test]
    fn test_spawn_enemy_keeps_template_archetype() {
        let unit = registry().spawn("grub", GridPos::new(0, 0), Faction::Enemy).unwrap();
        let mob = unit.mob.as_ref().unwrap();
        assert_eq!(mob.archetype, AiArchetype::MeleeAggressive);
        assert_eq!(mob.stats.defence, 1);
    }

    #[test]
    fn test_missing_keys_fall_back() {
        let reg = registry();
        let item = reg.item("plasma_lance").unwrap();
        assert_eq!(item.name, "Unidentified Object");
        let unit = reg.spawn("dragon", GridPos::new(0, 0), Faction::Enemy).unwrap();
        assert_eq!(unit.name, "Unknown Lifeform");
    }

    #[test]
    fn test_instances_are_independent() {
        let reg = registry();
        let mut first = reg.spawn("trooper", GridPos::new(0, 0), Faction::Player).unwrap();
        let second = reg.spawn("trooper", GridPos::new(1, 0), Faction::Player).unwrap();

        if let Some(gun) = first.mob.as_mut().and_then(|m| m.equipment.get_mut(Slot::Ranged)) {
            gun.spend_round();
        }
        let ammo = |u: &Unit| u.mob.as_ref().and_then(|m| m.ranged_weapon()).map(|g| g.stats.ammo);
        assert_eq!(ammo(&first), Some(5));
        assert_eq!(ammo(&second), Some(6));
        assert_eq!(reg.item_template("rifle").map(|g| g.stats.ammo), Some(6));
    }

    #[test]
    fn test_bad_ron_reports_path() {
        let err = parse_item_catalog("{ oops", "broken.ron").unwrap_err();
        assert!(err.to_string().contains("broken.ron"));
    }
}
