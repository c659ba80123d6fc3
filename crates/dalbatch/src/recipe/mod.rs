//! Recipe loading and validation
//!
//! Recipes are parsed from YAML into a raw [`RecipeSpec`] and then validated
//! into an immutable [`Recipe`] with every default applied up front.

mod recipe_spec;
mod validated_recipe;

pub use recipe_spec::*;
pub use validated_recipe::*;
