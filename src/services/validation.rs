use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use crate::database::models::{Ingredient, NewRecipe, RecipePatch, Unit};

pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Recipe fields as submitted by a client, before validation.
///
/// `ingredients` and `instructions` arrive either as JSON arrays or, from
/// multipart forms, as JSON-encoded strings. Fields such as `likes`,
/// `rating` or `creator` are not part of the draft and are dropped on
/// deserialization.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RecipeDraft {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ingredients: Option<Value>,
    #[serde(default)]
    pub instructions: Option<Value>,
    /// `Some(Value::Null)` when the field is sent as `null`
    #[serde(default, deserialize_with = "present")]
    pub difficulty: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub time: Option<Value>,
}

/// Keeps an explicit `null` distinguishable from an absent field.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// An image file received with a recipe submission
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: String,
    pub data: Bytes,
}

impl ImageUpload {
    /// File extension for the stored object: the uploaded name's, else one derived from the type.
    pub fn extension(&self) -> String {
        self.file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| {
                match self.content_type.as_str() {
                    "image/jpeg" => "jpg",
                    "image/png" => "png",
                    "image/gif" => "gif",
                    "image/webp" => "webp",
                    _ => "bin",
                }
                .to_string()
            })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InstructionStep {
    Text(String),
    Structured {
        #[serde(rename = "Steps")]
        steps: String,
    },
}

pub fn parse_recipe_id(raw: &str) -> ServiceResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ServiceError::validation("Invalid recipe ID"))
}

/// Decodes a field that may hold either JSON or a JSON-encoded string.
fn decode_embedded(value: &Value) -> ServiceResult<Value> {
    match value {
        Value::String(raw) => serde_json::from_str(raw)
            .map_err(|_| ServiceError::validation("Invalid ingredients or instructions format")),
        other => Ok(other.clone()),
    }
}

fn require_array(value: &Value, empty_message: &str) -> ServiceResult<Vec<Value>> {
    match decode_embedded(value)? {
        Value::Array(items) if !items.is_empty() => Ok(items),
        Value::Array(_) | Value::Null => Err(ServiceError::validation(empty_message)),
        _ => Err(ServiceError::validation("Invalid ingredients or instructions format")),
    }
}

fn parse_quantity(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub fn parse_ingredients(value: &Value) -> ServiceResult<Vec<Ingredient>> {
    let items = require_array(value, "Recipe must have at least one ingredient")?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let position = index + 1;
            let object = item.as_object().ok_or_else(|| {
                ServiceError::validation(format!("Ingredient {} must be an object", position))
            })?;

            let name = object
                .get("name")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| {
                    ServiceError::validation(format!("Ingredient {}: name is required", position))
                })?;

            let quantity = parse_quantity(object.get("quantity"))
                .filter(|q| q.is_finite() && *q > 0.0)
                .ok_or_else(|| {
                    ServiceError::validation(format!(
                        "Ingredient {}: quantity must be a positive number",
                        position
                    ))
                })?;

            let unit = object
                .get("unit")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ServiceError::validation(format!("Ingredient {}: unit is required", position))
                })?
                .parse::<Unit>()
                .map_err(|e| ServiceError::validation(format!("Ingredient {}: {}", position, e)))?;

            let notes = object
                .get("notes")
                .and_then(Value::as_str)
                .filter(|notes| !notes.is_empty())
                .map(str::to_string);

            Ok(Ingredient {
                name: name.to_string(),
                quantity,
                unit,
                notes,
            })
        })
        .collect()
}

pub fn parse_instructions(value: &Value) -> ServiceResult<Vec<String>> {
    let items = require_array(value, "Recipe must have at least one instruction step")?;

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let step = match serde_json::from_value::<InstructionStep>(item) {
                Ok(InstructionStep::Text(text)) => text,
                Ok(InstructionStep::Structured { steps }) => steps,
                Err(_) => {
                    return Err(ServiceError::validation(format!(
                        "Instruction {} must be text",
                        index + 1
                    )))
                }
            };
            let step = step.trim();
            if step.is_empty() {
                return Err(ServiceError::validation(format!(
                    "Instruction {} cannot be empty",
                    index + 1
                )));
            }
            Ok(step.to_string())
        })
        .collect()
}

fn parse_difficulty(value: Option<&Value>) -> ServiceResult<Option<f64>> {
    let parsed = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    parsed
        .filter(|d| d.is_finite())
        .map(Some)
        .ok_or_else(|| ServiceError::validation("Difficulty must be a number"))
}

fn parse_time(value: Option<&Value>) -> ServiceResult<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(ServiceError::validation("Time must be text")),
    }
}

/// Validates a full submission for recipe creation.
pub fn new_recipe(draft: &RecipeDraft) -> ServiceResult<NewRecipe> {
    let name = draft
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ServiceError::validation("Recipe name is required"))?;

    let ingredients = match &draft.ingredients {
        Some(value) => parse_ingredients(value)?,
        None => return Err(ServiceError::validation("Recipe must have at least one ingredient")),
    };
    let instructions = match &draft.instructions {
        Some(value) => parse_instructions(value)?,
        None => {
            return Err(ServiceError::validation(
                "Recipe must have at least one instruction step",
            ))
        }
    };

    Ok(NewRecipe {
        name: name.to_string(),
        description: draft.description.clone().unwrap_or_default(),
        ingredients,
        instructions,
        difficulty: parse_difficulty(draft.difficulty.as_ref())?,
        time: parse_time(draft.time.as_ref())?,
    })
}

/// Validates the fields present in an update; absent fields stay untouched.
pub fn recipe_patch(draft: &RecipeDraft) -> ServiceResult<RecipePatch> {
    let name = match draft.name.as_deref().map(str::trim) {
        Some("") => return Err(ServiceError::validation("Recipe name cannot be empty")),
        other => other.map(str::to_string),
    };

    Ok(RecipePatch {
        name,
        description: draft.description.clone(),
        ingredients: draft.ingredients.as_ref().map(parse_ingredients).transpose()?,
        instructions: draft.instructions.as_ref().map(parse_instructions).transpose()?,
        difficulty: draft
            .difficulty
            .as_ref()
            .map(|value| parse_difficulty(Some(value)))
            .transpose()?,
        time: draft
            .time
            .as_ref()
            .map(|value| parse_time(Some(value)))
            .transpose()?,
    })
}

/// Ratings must be whole numbers from 1 to 5 (`5.0` counts). Strings and fractions are refused.
pub fn validate_rating(value: Option<&Value>) -> ServiceResult<u8> {
    let rating = match value {
        None | Some(Value::Null) => return Err(ServiceError::validation("Rating is required")),
        Some(Value::Number(n)) => n.as_f64(),
        Some(_) => None,
    };
    rating
        .filter(|r| r.fract() == 0.0 && (1.0..=5.0).contains(r))
        .map(|r| r as u8)
        .ok_or_else(|| ServiceError::validation("Rating must be an integer between 1 and 5"))
}

pub fn validate_images(images: &[ImageUpload], max_count: usize, max_bytes: usize) -> ServiceResult<()> {
    if images.len() > max_count {
        return Err(ServiceError::validation(format!(
            "Too many files. Maximum is {} images.",
            max_count
        )));
    }
    for image in images {
        if image.data.len() > max_bytes {
            return Err(ServiceError::validation(format!(
                "File too large. Maximum size is {}MB.",
                max_bytes / (1024 * 1024)
            )));
        }
        if !ALLOWED_IMAGE_TYPES.contains(&image.content_type.as_str()) {
            return Err(ServiceError::validation(
                "Invalid file type. Only JPEG, PNG, GIF, and WebP are allowed.",
            ));
        }
    }
    Ok(())
}
