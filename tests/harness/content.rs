//! Standard catalog and combatants shared by the scenarios

use skirmish::combat::{
    ActionCatalog, ActionDef, CombatEntity, Controller, DamageType, EffectAtom, Magnitude, ResourceKind,
    StatKind, StatusKind, Targeting, Team,
};

/// Weapons, spells and items every scenario can draw from
///
/// - `sword`: attack roll, 1d8+2 slashing
/// - `axe`: flat 6 slashing, always lands
/// - `claws`: flat 3 slashing, always lands
/// - `fireball`: 20 mana, 3d6 fire at one enemy
/// - `venom`: 5 mana, poisons for 3 turns at 2 per turn
/// - `potion`: heals 10
pub fn catalog() -> ActionCatalog {
    ActionCatalog::new()
        .with_weapon(
            "sword",
            ActionDef::new(
                "Sword",
                Targeting::Enemy,
                vec![EffectAtom::damage(Magnitude::dice("1d8+2"), DamageType::Slashing)],
            )
            .with_attack_roll(),
        )
        .with_weapon(
            "axe",
            ActionDef::new(
                "Axe",
                Targeting::Enemy,
                vec![EffectAtom::damage(Magnitude::flat(6), DamageType::Slashing)],
            ),
        )
        .with_weapon(
            "claws",
            ActionDef::new(
                "Claws",
                Targeting::Enemy,
                vec![EffectAtom::damage(Magnitude::flat(3), DamageType::Slashing)],
            ),
        )
        .with_spell(
            "fireball",
            ActionDef::new(
                "Fireball",
                Targeting::Enemy,
                vec![EffectAtom::damage(Magnitude::dice("3d6"), DamageType::Fire)],
            )
            .with_cost(ResourceKind::Mana, 20),
        )
        .with_spell(
            "venom",
            ActionDef::new(
                "Venom",
                Targeting::Enemy,
                vec![EffectAtom::status("poison", StatusKind::Poisoned, 3, 2)],
            )
            .with_cost(ResourceKind::Mana, 5),
        )
        .with_item(
            "potion",
            ActionDef::new("Potion", Targeting::Ally, vec![EffectAtom::heal(Magnitude::flat(10))]),
        )
}

/// Player caster: 20 health, 30 mana, knows fireball and venom
pub fn mage(id: &str) -> CombatEntity {
    CombatEntity::new(id, &title(id), Team::Party, Controller::Player)
        .with_pool(ResourceKind::Health, 20)
        .with_pool(ResourceKind::Mana, 30)
        .with_action("fireball")
        .with_action("venom")
}

/// Player melee: 30 health, axe first, escape 4
pub fn fighter(id: &str) -> CombatEntity {
    CombatEntity::new(id, &title(id), Team::Party, Controller::Player)
        .with_pool(ResourceKind::Health, 30)
        .with_pool(ResourceKind::Stamina, 10)
        .with_stat(StatKind::Escape, 4)
        .with_action("axe")
        .with_action("sword")
}

/// NPC brute: 30 health, magic defense 2, 20% fire resistance, escape 2
pub fn orc(id: &str) -> CombatEntity {
    CombatEntity::new(id, &title(id), Team::Foes, Controller::Npc)
        .with_pool(ResourceKind::Health, 30)
        .with_stat(StatKind::MagicDefense, 2)
        .with_stat(StatKind::Escape, 2)
        .with_resistance(DamageType::Fire, 20)
        .with_action("claws")
}

/// NPC skirmisher: 12 health, weak to fire
pub fn goblin(id: &str) -> CombatEntity {
    CombatEntity::new(id, &title(id), Team::Foes, Controller::Npc)
        .with_pool(ResourceKind::Health, 12)
        .with_resistance(DamageType::Fire, -50)
        .with_action("claws")
}

fn title(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
