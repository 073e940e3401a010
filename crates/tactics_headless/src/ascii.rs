//! ASCII battle view for terminal review.
//!
//! Draws the tile map with units and projectiles on top, a status header
//! and a roster legend. Combatants the squad cannot see are left off
//! unless `reveal` is set; scenery is always drawn.

use tactics_core::prelude::*;

/// ASCII visualization configuration.
#[derive(Debug, Clone)]
pub struct AsciiConfig {
    /// Show the roster below the map.
    pub show_legend: bool,
    /// Use colored output (ANSI).
    pub use_color: bool,
    /// Draw units the squad cannot see.
    pub reveal: bool,
}

impl Default for AsciiConfig {
    fn default() -> Self {
        Self {
            show_legend: true,
            use_color: true,
            reveal: false,
        }
    }
}

/// ANSI color codes.
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const GREEN: &str = "\x1b[32m";
    pub const RED: &str = "\x1b[31m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";
    pub const MAGENTA: &str = "\x1b[35m";
}

/// Glyph for a unit on the board.
fn unit_char(unit: &UnitSnapshot) -> char {
    match unit.faction {
        Faction::Player if unit.selected => '@',
        Faction::Player => unit.name.chars().next().map_or('S', |c| c.to_ascii_uppercase()),
        Faction::Enemy => unit.name.chars().next().map_or('e', |c| c.to_ascii_lowercase()),
        Faction::Neutral if unit.max_health == 0 => '&',
        Faction::Neutral => 'n',
    }
}

fn faction_color(faction: Faction) -> &'static str {
    match faction {
        Faction::Player => colors::GREEN,
        Faction::Enemy => colors::RED,
        Faction::Neutral => colors::GRAY,
    }
}

fn health_color(health: i32, max: i32) -> &'static str {
    let fraction = if max > 0 { health as f32 / max as f32 } else { 1.0 };
    if fraction > 0.66 {
        colors::GREEN
    } else if fraction > 0.33 {
        colors::YELLOW
    } else {
        colors::RED
    }
}

/// Overlay markers that are not units.
#[derive(Debug, Clone, Copy, Default)]
pub struct Markers {
    /// Artifact cell, drawn as `$`.
    pub artifact: Option<GridPos>,
    /// Evac zone, floor drawn as `:`.
    pub evac: Option<EvacZone>,
}

impl Markers {
    /// Markers for a mission: the zone shows once evac opens.
    #[must_use]
    pub fn for_mission(mission: &Mission, artifact: Option<GridPos>) -> Self {
        Self {
            artifact,
            evac: (mission.phase() == MissionPhase::Evac).then(|| mission.evac_zone()),
        }
    }
}

/// Render the board as ASCII art.
pub fn render_ascii(sim: &Simulation, markers: Markers, config: &AsciiConfig) -> String {
    let map = sim.map();
    let mut grid: Vec<Vec<(char, &'static str)>> = map
        .rows()
        .iter()
        .map(|row| row.chars().map(|c| (c, colors::GRAY)).collect())
        .collect();

    let mut put = |pos: GridPos, cell: (char, &'static str)| {
        let (Ok(x), Ok(y)) = (usize::try_from(pos.x), usize::try_from(pos.y)) else {
            return;
        };
        if let Some(slot) = grid.get_mut(y).and_then(|row| row.get_mut(x)) {
            *slot = cell;
        }
    };

    if let Some(zone) = markers.evac {
        for y in zone.min.y..=zone.max.y {
            for x in zone.min.x..=zone.max.x {
                let pos = GridPos::new(x, y);
                if map.is_passable(pos) {
                    put(pos, (':', colors::CYAN));
                }
            }
        }
    }
    if let Some(cell) = markers.artifact {
        put(cell, ('$', colors::YELLOW));
    }

    let units = sim.unit_snapshots();
    for unit in units.iter().filter(|u| u.max_health == 0) {
        put(unit.pos, (unit_char(unit), colors::GRAY));
    }
    for unit in units.iter().filter(|u| u.alive && (u.visible || config.reveal)) {
        put(unit.pos, (unit_char(unit), faction_color(unit.faction)));
    }
    for shot in sim.projectile_snapshots(Fixed::ZERO) {
        put(shot.cell, ('*', colors::MAGENTA));
    }

    let (bold, reset) = if config.use_color {
        (colors::BOLD, colors::RESET)
    } else {
        ("", "")
    };

    let mut output = String::new();
    output.push_str(&format!("{bold}╔══ Turn {} ══╗{reset}\n", sim.clock()));
    for row in &grid {
        for &(ch, color) in row {
            if config.use_color {
                output.push_str(color);
                output.push(ch);
                output.push_str(colors::RESET);
            } else {
                output.push(ch);
            }
        }
        output.push('\n');
    }

    if config.show_legend {
        output.push_str("╠══ LEGEND ══╣\n");
        output.push_str("@=selected  A-Z=squad  a-z=hostile  n=neutral  &=prop  *=shot  $=artifact  :=evac\n");
        for unit in units.iter().filter(|u| u.alive && (u.visible || config.reveal)) {
            let health = if config.use_color {
                format!(
                    "{}{}/{}{}",
                    health_color(unit.health, unit.max_health),
                    unit.health,
                    unit.max_health,
                    colors::RESET
                )
            } else {
                format!("{}/{}", unit.health, unit.max_health)
            };
            let ammo = unit.ammo.map(|(n, max)| format!(" ammo {n}/{max}")).unwrap_or_default();
            let status = if unit.status_effects.is_empty() {
                String::new()
            } else {
                let names: Vec<_> = unit.status_effects.iter().map(|s| format!("{:?}", s.kind)).collect();
                format!(" [{}]", names.join(", "))
            };
            output.push_str(&format!(
                "  {} {:<20} {:>7} hp{ammo}{status}\n",
                unit_char(unit),
                unit.name,
                health
            ));
        }
    }
    output.push_str("╚══════╝\n");
    output
}

/// One-line mission status.
pub fn mission_status(mission: &Mission) -> String {
    let mut line = format!("Phase: {:?} | Kills: {}", mission.phase(), mission.kill_count());
    if let Some(oxygen) = mission.oxygen() {
        line.push_str(&format!(" | O2: {:.1}", oxygen.to_num::<f64>()));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> AsciiConfig {
        AsciiConfig {
            show_legend: false,
            use_color: false,
            reveal: false,
        }
    }

    fn board() -> Simulation {
        let map = TileMap::from_rows(&["#####", "#...#", "#...#", "#####"]).unwrap();
        let mut sim = Simulation::new(map, 0);
        sim.spawn(Unit::combatant(
            "Hicks",
            GridPos::new(1, 1),
            Faction::Player,
            Mob::new(AiArchetype::Player, MobStats::default()),
        ));
        sim.spawn(Unit::combatant(
            "Vasquez",
            GridPos::new(1, 2),
            Faction::Player,
            Mob::new(AiArchetype::Player, MobStats::default()),
        ));
        sim.spawn(Unit::combatant(
            "Drone",
            GridPos::new(3, 2),
            Faction::Enemy,
            Mob::new(AiArchetype::Basic, MobStats::default()),
        ));
        sim
    }

    #[test]
    fn test_board_layout() {
        let sim = board();
        let text = render_ascii(&sim, Markers::default(), &plain());
        let rows: Vec<&str> = text.lines().skip(1).take(4).collect();
        assert_eq!(rows, vec!["#####", "#@..#", "#V.d#", "#####"]);
    }

    #[test]
    fn test_hidden_units_need_reveal() {
        let mut sim = board();
        sim.refresh_visibility(Fixed::ONE);
        let hidden = render_ascii(&sim, Markers::default(), &plain());
        assert!(!hidden.lines().nth(3).unwrap().contains('d'));

        let config = AsciiConfig { reveal: true, ..plain() };
        let shown = render_ascii(&sim, Markers::default(), &config);
        assert!(shown.lines().nth(3).unwrap().contains('d'));
    }

    #[test]
    fn test_markers_drawn_under_units() {
        let sim = board();
        let markers = Markers {
            artifact: Some(GridPos::new(2, 1)),
            evac: Some(EvacZone {
                min: GridPos::new(1, 1),
                max: GridPos::new(2, 2),
            }),
        };
        let text = render_ascii(&sim, markers, &plain());
        let rows: Vec<&str> = text.lines().skip(1).take(4).collect();
        assert_eq!(rows[1], "#@$.#");
        assert_eq!(rows[2], "#V:d#");
    }

    #[test]
    fn test_legend_lists_units() {
        let sim = board();
        let config = AsciiConfig {
            show_legend: true,
            ..plain()
        };
        let text = render_ascii(&sim, Markers::default(), &config);
        assert!(text.contains("Vasquez"));
        assert!(text.contains("100/100 hp"));
    }

    #[test]
    fn test_mission_status_shows_oxygen() {
        let mission = Mission::new(
            Objective::Retrieve,
            EvacZone {
                min: GridPos::new(0, 0),
                max: GridPos::new(0, 0),
            },
        )
        .with_oxygen(Fixed::from_num(3));
        assert_eq!(mission_status(&mission), "Phase: Main | Kills: 0 | O2: 3.0");
    }
}
