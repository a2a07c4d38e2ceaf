//! Static content the app ships with: the achievement catalog, per-category
//! scenario images, chat contacts, and the location list.

use rand::seq::SliceRandom;

use crate::domain::{AchievementDef, HazardCategory, Rarity};

/// Full achievement catalog. Unlock state is tracked per id in the player
/// profile; the catalog itself never changes at runtime.
pub const ACHIEVEMENTS: [AchievementDef; 8] = [
    AchievementDef {
        id: "first_game",
        name_key: "ach_first_game_name",
        description_key: "ach_first_game_desc",
        rarity: Rarity::Common,
    },
    AchievementDef {
        id: "perfect_score",
        name_key: "ach_perfect_score_name",
        description_key: "ach_perfect_score_desc",
        rarity: Rarity::Rare,
    },
    AchievementDef {
        id: "quick_thinker",
        name_key: "ach_quick_thinker_name",
        description_key: "ach_quick_thinker_desc",
        rarity: Rarity::Rare,
    },
    AchievementDef {
        id: "level_5",
        name_key: "ach_level_5_name",
        description_key: "ach_level_5_desc",
        rarity: Rarity::Legendary,
    },
    AchievementDef {
        id: "fire_fighter",
        name_key: "ach_fire_fighter_name",
        description_key: "ach_fire_fighter_desc",
        rarity: Rarity::Common,
    },
    AchievementDef {
        id: "flood_expert",
        name_key: "ach_flood_expert_name",
        description_key: "ach_flood_expert_desc",
        rarity: Rarity::Common,
    },
    AchievementDef {
        id: "comms_check",
        name_key: "ach_comms_check_name",
        description_key: "ach_comms_check_desc",
        rarity: Rarity::Common,
    },
    AchievementDef {
        id: "chat_starter",
        name_key: "ach_chat_starter_name",
        description_key: "ach_chat_starter_desc",
        rarity: Rarity::Common,
    },
];

pub fn achievement_by_id(id: &str) -> Option<&'static AchievementDef> {
    ACHIEVEMENTS.iter().find(|a| a.id == id)
}

/// Scenario illustrations. Images are served from a static manifest rather
/// than generated per request; one entry is picked at random per session.
fn image_manifest(category: HazardCategory) -> &'static [&'static str] {
    match category {
        HazardCategory::UrbanFire => &[
            "https://cdn.builder.io/api/v1/image/assets%2F72fdc3fe902a491fb76060ce278d01d8%2F6085498f29dd439f9867fed34e32e344?format=webp&width=800",
            "https://cdn.builder.io/api/v1/image/assets%2F72fdc3fe902a491fb76060ce278d01d8%2Fef43c8779b6e4827a9845d40dfc7f922?format=webp&width=800",
            "https://cdn.builder.io/api/v1/image/assets%2F72fdc3fe902a491fb76060ce278d01d8%2F8bd81e7b19f746c495145d8019152905?format=webp&width=800",
        ],
        HazardCategory::FloodResponse => &[
            "https://cdn.builder.io/api/v1/image/assets%2F72fdc3fe902a491fb76060ce278d01d8%2Fdd7b93a2f6114362a33aa65035b5da28?format=webp&width=800",
            "https://cdn.builder.io/api/v1/image/assets%2F72fdc3fe902a491fb76060ce278d01d8%2F999d11b720fc45d799fe82d37e2bf735?format=webp&width=800",
            "https://cdn.builder.io/api/v1/image/assets%2F72fdc3fe902a491fb76060ce278d01d8%2F4dfc644b850e4a4d8638a6bf4823f40c?format=webp&width=800",
            "https://cdn.builder.io/api/v1/image/assets%2F72fdc3fe902a491fb76060ce278d01d8%2F9a216ec9bed747b396de6365d2a8ee90?format=webp&width=800",
        ],
        HazardCategory::RoadAccident => &[
            "https://cdn.builder.io/api/v1/image/assets%2F72fdc3fe902a491fb76060ce278d01d8%2Fca2d5ffcdcb54f5da58c02bc54241cf2?format=webp&width=800",
            "https://cdn.builder.io/api/v1/image/assets%2F72fdc3fe902a491fb76060ce278d01d8%2Fe5f843f586ae49ed8615f205e742146f?format=webp&width=800",
            "https://cdn.builder.io/api/v1/image/assets%2F72fdc3fe902a491fb76060ce278d01d8%2F8d75b88d79bc4d969de07b09971520a9?format=webp&width=800",
            "https://cdn.builder.io/api/v1/image/assets%2F72fdc3fe902a491fb76060ce278d01d8%2Ffecc5775bb8c453baa8116e1bd6efc37?format=webp&width=800",
            "https://cdn.builder.io/api/v1/image/assets%2F72fdc3fe902a491fb76060ce278d01d8%2F7cd1d8c688e64164887eae8d71ae3469?format=webp&width=800",
        ],
        HazardCategory::MarketplaceStampede => &[
            "https://cdn.builder.io/api/v1/image/assets%2F72fdc3fe902a491fb76060ce278d01d8%2F0266b766462947f985289b2b5982fe1c?format=webp&width=800",
            "https://cdn.builder.io/api/v1/image/assets%2F72fdc3fe902a491fb76060ce278d01d8%2Fb5792367c069485a963ced30c33c35fe?format=webp&width=800",
            "https://cdn.builder.io/api/v1/image/assets%2F72fdc3fe902a491fb76060ce278d01d8%2F19664f417326416381465161d9aff87d?format=webp&width=800",
            "https://cdn.builder.io/api/v1/image/assets%2F72fdc3fe902a491fb76060ce278d01d8%2F331c2e9d3dd841268f1550aa0a6c5112?format=webp&width=800",
        ],
    }
}

/// Pick one illustration for the category.
pub fn scenario_image(category: HazardCategory) -> String {
    let images = image_manifest(category);
    let mut rng = rand::thread_rng();
    images
        .choose(&mut rng)
        .copied()
        .unwrap_or(images[0])
        .to_string()
}

/// A simulated chat contact. The opener seeds the conversation view; replies
/// are generated from the contact's persona.
#[derive(Clone, Copy, Debug)]
pub struct ChatContact {
    pub id: &'static str,
    pub name_key: &'static str,
    pub persona: &'static str,
    pub avatar: &'static str,
    pub opener: &'static str,
}

pub const CHAT_CONTACTS: [ChatContact; 3] = [
    ChatContact {
        id: "family",
        name_key: "familyGroupChat",
        persona: "Family Group",
        avatar: "😊",
        opener: "Everyone check in, please.",
    },
    ChatContact {
        id: "community",
        name_key: "communityWatchChat",
        persona: "Community Watch",
        avatar: "🏠",
        opener: "Official Announcement: Please stay indoors until further notice. We will share updates as they come.",
    },
    ChatContact {
        id: "neighbor",
        name_key: "neighborChat",
        persona: "Neighbor",
        avatar: "👤",
        opener: "Hey, just checking in. Are you okay over there?",
    },
];

pub fn contact_by_id(id: &str) -> Option<&'static ChatContact> {
    CHAT_CONTACTS.iter().find(|c| c.id == id)
}

/// Locations offered by the region picker.
pub const NIGERIAN_STATES: [&str; 37] = [
    "Abia",
    "Adamawa",
    "Akwa Ibom",
    "Anambra",
    "Bauchi",
    "Bayelsa",
    "Benue",
    "Borno",
    "Cross River",
    "Delta",
    "Ebonyi",
    "Edo",
    "Ekiti",
    "Enugu",
    "FCT - Abuja",
    "Gombe",
    "Imo",
    "Jigawa",
    "Kaduna",
    "Kano",
    "Katsina",
    "Kebbi",
    "Kogi",
    "Kwara",
    "Lagos",
    "Nasarawa",
    "Niger",
    "Ogun",
    "Ondo",
    "Osun",
    "Oyo",
    "Plateau",
    "Rivers",
    "Sokoto",
    "Taraba",
    "Yobe",
    "Zamfara",
];
