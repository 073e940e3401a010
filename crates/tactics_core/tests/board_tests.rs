//! Map queries and content loading.

use proptest::prelude::*;
use tactics_core::pathfinding::{find_path, line_of_sight, terrain_path};
use tactics_core::prelude::*;
use tactics_test_utils::determinism::strategies::{arb_grid_pos, arb_tile_map};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_line_of_sight_is_symmetric(
        map in arb_tile_map(10, 10, 35),
        a in arb_grid_pos(10, 10),
        b in arb_grid_pos(10, 10),
    ) {
        prop_assert_eq!(line_of_sight(&map, a, b), line_of_sight(&map, b, a));
    }

    #[test]
    fn prop_terrain_paths_are_connected_steps(
        map in arb_tile_map(10, 10, 25),
        a in arb_grid_pos(10, 10),
        b in arb_grid_pos(10, 10),
    ) {
        if let Some(path) = terrain_path(&map, a, b) {
            prop_assert_eq!(path.first().copied(), Some(a));
            prop_assert_eq!(path.last().copied(), Some(b));
            prop_assert!(path.len() as u32 > a.chebyshev(b));
            for pair in path.windows(2) {
                prop_assert_eq!(pair[0].chebyshev(pair[1]), 1);
            }
            for cell in path.iter().skip(1).take(path.len().saturating_sub(2)) {
                prop_assert!(map.is_passable(*cell));
            }
        }
    }
}

#[test]
fn test_walls_cut_line_of_sight() {
    let map = TileMap::from_rows(&["..#..", "..#..", "..#.."]).unwrap();
    assert!(!line_of_sight(&map, GridPos::new(0, 1), GridPos::new(4, 1)));
    assert!(line_of_sight(&map, GridPos::new(0, 1), GridPos::new(1, 2)));
}

#[test]
fn test_line_of_sight_ignores_units() {
    let map = TileMap::new(5, 1);
    let path = find_path(GridPos::new(0, 0), GridPos::new(4, 0), |p| map.is_passable(p)).unwrap();
    assert_eq!(path.len(), 5);
    assert!(line_of_sight(&map, GridPos::new(0, 0), GridPos::new(4, 0)));
}

#[test]
fn test_registry_spawns_with_fallbacks() {
    let items = r#"{
        "pulse_rifle": (
            name: "M41A Pulse Rifle",
            slot: Ranged,
            class: Projectile,
            stats: (attack: 14, range: 9.0, ammo: 10, max_ammo: 10, reload: 1, accuracy: 0.8),
        ),
        "vest": (name: "Flak Vest", slot: Suit, stats: (defence: 4)),
    }"#;
    let mobs = r#"{
        "marine": (
            name: "Colonial Marine",
            archetype: Player,
            stats: (health: 90),
            equipment: ["pulse_rifle", "vest", "smart_gun"],
        ),
    }"#;
    let registry = TemplateRegistry::from_ron(items, mobs).unwrap();

    let marine = registry.spawn("marine", GridPos::new(2, 2), Faction::Player).unwrap();
    assert_eq!(marine.health(), 90);
    assert_eq!(marine.defence(), 4);
    let rifle = marine.mob.as_ref().and_then(Mob::ranged_weapon).unwrap();
    assert_eq!(rifle.stats.ammo, 10);

    let stray = registry.spawn("xenomorph", GridPos::new(0, 0), Faction::Enemy).unwrap();
    assert_eq!(stray.name, "Unknown Lifeform");
}

#[test]
fn test_registry_rejects_bad_ron() {
    let err = TemplateRegistry::from_ron("{ \"x\": (", "{}").unwrap_err();
    assert!(matches!(err, GameError::DataParseError { .. }));
}

#[test]
fn test_spawned_items_are_independent_copies() {
    let items = r#"{ "pistol": (name: "Pistol", slot: Ranged, stats: (attack: 6, range: 5.0, ammo: 2, max_ammo: 2)) }"#;
    let registry = TemplateRegistry::from_ron(items, "{}").unwrap();
    let mut first = registry.item("pistol").unwrap();
    first.spend_round();
    let second = registry.item("pistol").unwrap();
    assert_eq!(first.stats.ammo, 1);
    assert_eq!(second.stats.ammo, 2);
}
