// Character schema: ability categories, the skill catalog, and the document
// field paths written at finalization.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Draft constants
// ---------------------------------------------------------------------------

/// Number of allocation rounds. Round `r` assigns `+r` to the picker and
/// `-r` to the paired participant.
pub const DRAFT_ROUNDS: u8 = 5;

/// Largest group that uses the deterministic starter rotation. Bigger groups
/// draw a random starter per round from the indices not yet used.
pub const SMALL_GROUP_MAX: usize = 5;

/// The one skill every participant starts with. Excluded from the draftable
/// pool.
pub const FIXED_SKILL: &str = "guns";

/// Pre-seeded value of [`FIXED_SKILL`].
pub const FIXED_SKILL_VALUE: i32 = 2;

// ---------------------------------------------------------------------------
// Abilities
// ---------------------------------------------------------------------------

/// The four ability categories skills roll up into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ability {
    Brains,
    Chutzpah,
    Mechanics,
    Violence,
}

impl Ability {
    pub const ALL: [Ability; 4] = [
        Ability::Brains,
        Ability::Chutzpah,
        Ability::Mechanics,
        Ability::Violence,
    ];

    /// Document key for this ability (e.g. `violence`).
    pub fn key(self) -> &'static str {
        match self {
            Ability::Brains => "brains",
            Ability::Chutzpah => "chutzpah",
            Ability::Mechanics => "mechanics",
            Ability::Violence => "violence",
        }
    }

    /// Display label for this ability.
    pub fn label(self) -> &'static str {
        match self {
            Ability::Brains => "Brains",
            Ability::Chutzpah => "Chutzpah",
            Ability::Mechanics => "Mechanics",
            Ability::Violence => "Violence",
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ---------------------------------------------------------------------------
// Skill catalog
// ---------------------------------------------------------------------------

/// One entry in the fixed skill catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkillDef {
    /// Document key (e.g. `alpha_complex`).
    pub key: &'static str,
    /// Display label (e.g. "Alpha Complex").
    pub label: &'static str,
    /// Parent ability category.
    pub ability: Ability,
}

const fn skill(key: &'static str, label: &'static str, ability: Ability) -> SkillDef {
    SkillDef { key, label, ability }
}

/// The full skill catalog in sheet order: four skills per ability.
pub const SKILLS: [SkillDef; 16] = [
    skill("alpha_complex", "Alpha Complex", Ability::Brains),
    skill("bureaucracy", "Bureaucracy", Ability::Brains),
    skill("psychology", "Psychology", Ability::Brains),
    skill("science", "Science", Ability::Brains),
    skill("bluff", "Bluff", Ability::Chutzpah),
    skill("charm", "Charm", Ability::Chutzpah),
    skill("intimidate", "Intimidate", Ability::Chutzpah),
    skill("stealth", "Stealth", Ability::Chutzpah),
    skill("demolitions", "Demolitions", Ability::Mechanics),
    skill("engineer", "Engineer", Ability::Mechanics),
    skill("operate", "Operate", Ability::Mechanics),
    skill("program", "Program", Ability::Mechanics),
    skill("athletics", "Athletics", Ability::Violence),
    skill("guns", "Guns", Ability::Violence),
    skill("melee", "Melee", Ability::Violence),
    skill("throw", "Throw", Ability::Violence),
];

/// Look up a skill definition by document key.
pub fn skill_def(key: &str) -> Option<&'static SkillDef> {
    SKILLS.iter().find(|s| s.key == key)
}

/// Parent ability of a skill, if the key is known.
pub fn ability_of(key: &str) -> Option<Ability> {
    skill_def(key).map(|s| s.ability)
}

/// Display label for a skill key. Unknown keys fall back to the key itself
/// so announcements stay readable even for off-catalog input.
pub fn skill_label(key: &str) -> &str {
    skill_def(key).map(|s| s.label).unwrap_or(key)
}

/// Keys of every skill eligible for the draft: the catalog minus
/// [`FIXED_SKILL`], in sheet order.
pub fn draftable_skill_keys() -> Vec<String> {
    SKILLS
        .iter()
        .filter(|s| s.key != FIXED_SKILL)
        .map(|s| s.key.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Document field paths
// ---------------------------------------------------------------------------

/// Dotted field path of a skill's value in a participant record.
pub fn skill_value_path(def: &SkillDef) -> String {
    format!(
        "system.abilities.{}.skills.{}.value",
        def.ability.key(),
        def.key
    )
}

/// Dotted field path of an ability's derived score.
pub fn ability_value_path(ability: Ability) -> String {
    format!("system.abilities.{}.value", ability.key())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_four_skills_per_ability() {
        for ability in Ability::ALL {
            let count = SKILLS.iter().filter(|s| s.ability == ability).count();
            assert_eq!(count, 4, "wrong skill count for {ability}");
        }
    }

    #[test]
    fn skill_keys_are_unique() {
        for (i, a) in SKILLS.iter().enumerate() {
            for b in &SKILLS[i + 1..] {
                assert_ne!(a.key, b.key);
            }
        }
    }

    #[test]
    fn draftable_pool_excludes_fixed_skill() {
        let pool = draftable_skill_keys();
        assert_eq!(pool.len(), SKILLS.len() - 1);
        assert!(!pool.contains(&FIXED_SKILL.to_string()));
    }

    #[test]
    fn ability_lookup() {
        assert_eq!(ability_of("athletics"), Some(Ability::Violence));
        assert_eq!(ability_of("stealth"), Some(Ability::Chutzpah));
        assert_eq!(ability_of("engineer"), Some(Ability::Mechanics));
        assert_eq!(ability_of("science"), Some(Ability::Brains));
        assert_eq!(ability_of("juggling"), None);
    }

    #[test]
    fn labels_and_fallback() {
        assert_eq!(skill_label("alpha_complex"), "Alpha Complex");
        assert_eq!(skill_label("no_such_skill"), "no_such_skill");
        assert_eq!(format!("{}", Ability::Chutzpah), "Chutzpah");
    }

    #[test]
    fn field_paths() {
        let def = skill_def("guns").unwrap();
        assert_eq!(
            skill_value_path(def),
            "system.abilities.violence.skills.guns.value"
        );
        assert_eq!(
            ability_value_path(Ability::Brains),
            "system.abilities.brains.value"
        );
    }
}
