use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Measurement units accepted for ingredients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Cup,
    Tbsp,
    Tsp,
    Oz,
    Lb,
    G,
    Kg,
    Ml,
    L,
    Piece,
    Clove,
    Bunch,
}

impl Unit {
    pub const ALL: [Unit; 12] = [
        Unit::Cup,
        Unit::Tbsp,
        Unit::Tsp,
        Unit::Oz,
        Unit::Lb,
        Unit::G,
        Unit::Kg,
        Unit::Ml,
        Unit::L,
        Unit::Piece,
        Unit::Clove,
        Unit::Bunch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Cup => "cup",
            Unit::Tbsp => "tbsp",
            Unit::Tsp => "tsp",
            Unit::Oz => "oz",
            Unit::Lb => "lb",
            Unit::G => "g",
            Unit::Kg => "kg",
            Unit::Ml => "ml",
            Unit::L => "l",
            Unit::Piece => "piece",
            Unit::Clove => "clove",
            Unit::Bunch => "bunch",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Unit::ALL
            .into_iter()
            .find(|unit| unit.as_str() == value)
            .ok_or_else(|| {
                let allowed: Vec<&str> = Unit::ALL.iter().map(Unit::as_str).collect();
                format!("Unit '{}' is not one of: {}", value, allowed.join(", "))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub quantity: f64,
    pub unit: Unit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeImage {
    pub url: String,
    pub key: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub ingredients: Vec<Ingredient>,
    pub instructions: Vec<String>,
    pub creator: String,
    pub images: Vec<RecipeImage>,
    pub likes: u32,
    pub rating: Option<f64>,
    pub rating_count: u32,
    pub difficulty: Option<f64>,
    pub time: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated recipe submission, before it has an id
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipe {
    pub name: String,
    pub description: String,
    pub ingredients: Vec<Ingredient>,
    pub instructions: Vec<String>,
    pub difficulty: Option<f64>,
    pub time: Option<String>,
}

/// Merge-patch for the owner-editable fields. `None` leaves the stored value alone;
/// `Some(None)` clears one of the optional fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub ingredients: Option<Vec<Ingredient>>,
    pub instructions: Option<Vec<String>>,
    pub difficulty: Option<Option<f64>>,
    pub time: Option<Option<String>>,
}

impl Recipe {
    pub fn create(id: Uuid, creator: &str, new: NewRecipe, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: new.name,
            description: new.description,
            ingredients: new.ingredients,
            instructions: new.instructions,
            creator: creator.to_string(),
            images: Vec::new(),
            likes: 0,
            rating: None,
            rating_count: 0,
            difficulty: new.difficulty,
            time: new.time,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_owned_by(&self, username: &str) -> bool {
        self.creator == username
    }

    pub fn apply(&mut self, patch: RecipePatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(ingredients) = patch.ingredients {
            self.ingredients = ingredients;
        }
        if let Some(instructions) = patch.instructions {
            self.instructions = instructions;
        }
        if let Some(difficulty) = patch.difficulty {
            self.difficulty = difficulty;
        }
        if let Some(time) = patch.time {
            self.time = time;
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pasta() -> Recipe {
        Recipe::create(
            Uuid::new_v4(),
            "bob",
            NewRecipe {
                name: "Pasta".to_string(),
                description: String::new(),
                ingredients: vec![Ingredient {
                    name: "spaghetti".to_string(),
                    quantity: 200.0,
                    unit: Unit::G,
                    notes: None,
                }],
                instructions: vec!["Boil water".to_string()],
                difficulty: Some(2.0),
                time: Some("20 min".to_string()),
            },
            Utc::now(),
        )
    }

    #[test]
    fn parses_every_unit_name() {
        for unit in Unit::ALL {
            assert_eq!(unit.as_str().parse::<Unit>(), Ok(unit));
        }
        assert!("handful".parse::<Unit>().is_err());
        assert!("Cup".parse::<Unit>().is_err());
    }

    #[test]
    fn new_recipe_starts_without_engagement() {
        let recipe = pasta();
        assert_eq!(recipe.likes, 0);
        assert_eq!(recipe.rating, None);
        assert_eq!(recipe.rating_count, 0);
        assert!(recipe.images.is_empty());
        assert!(recipe.is_owned_by("bob"));
        assert!(!recipe.is_owned_by("alice"));
    }

    #[test]
    fn apply_only_touches_present_fields() {
        let mut recipe = pasta();
        let original = recipe.clone();

        recipe.apply(
            RecipePatch {
                description: Some("Weeknight dinner".to_string()),
                ..Default::default()
            },
            Utc::now(),
        );

        assert_eq!(recipe.description, "Weeknight dinner");
        assert_eq!(recipe.name, original.name);
        assert_eq!(recipe.ingredients, original.ingredients);
        assert_eq!(recipe.instructions, original.instructions);
        assert_eq!(recipe.time, original.time);
        assert_eq!(recipe.creator, original.creator);
    }

    #[test]
    fn apply_clears_optional_fields() {
        let mut recipe = pasta();

        recipe.apply(
            RecipePatch {
                difficulty: Some(None),
                time: Some(Some("1 hour".to_string())),
                ..Default::default()
            },
            Utc::now(),
        );

        assert_eq!(recipe.difficulty, None);
        assert_eq!(recipe.time.as_deref(), Some("1 hour"));
    }

    #[test]
    fn serializes_in_camel_case() {
        let value = serde_json::to_value(pasta()).unwrap();
        assert!(value.get("ratingCount").is_some());
        assert!(value.get("createdAt").is_some());
        assert_eq!(value["ingredients"][0]["unit"], "g");
        assert!(value["ingredients"][0].get("notes").is_none());
    }
}
