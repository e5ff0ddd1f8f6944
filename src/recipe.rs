//! Recipe definitions
//!
//! A recipe is a named unit of conditional configuration. Its definition
//! says when it is pulled in automatically, which other recipes it drags
//! along, and which fragment documents hold its configuration:
//!
//! ```yaml
//! recipes:
//!   base:
//!     always_include: true
//!     expand: [common]
//!   k8s:
//!     include_if_recipe: [base]
//!     expand: [docker]
//!     cloud_configs: [k8s, k8s-extra]
//! ```

use serde::{Deserialize, Serialize};

/// Recipe definition as written in `repository.yaml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipeDef {
    /// Optional human-readable description
    #[serde(default)]
    pub description: Option<String>,
    /// Selected on every request
    #[serde(default)]
    pub always_include: bool,
    /// Selected when any of these recipes is wanted
    #[serde(default)]
    pub include_if_recipe: Vec<String>,
    /// Selected when none of these recipes is wanted (ignored when empty)
    #[serde(default)]
    pub include_if_not_recipe: Vec<String>,
    /// Recipes pulled in whenever this one is selected
    #[serde(default)]
    pub expand: Vec<String>,
    /// Fragment source documents; defaults to the recipe's own id
    #[serde(default)]
    pub cloud_configs: Option<Vec<String>>,
}

/// A resolved recipe, immutable for the lifetime of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub id: String,
    /// Name of the repository that defines this recipe
    pub repository: String,
    pub def: RecipeDef,
}

/// Reference to one fragment source document of a recipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentSource {
    pub name: String,
    /// False when the name is the implicit default, in which case a missing
    /// document simply means the recipe carries no configuration
    pub explicit: bool,
}

impl Recipe {
    pub fn new(id: impl Into<String>, repository: impl Into<String>, def: RecipeDef) -> Self {
        Self {
            id: id.into(),
            repository: repository.into(),
            def,
        }
    }

    /// Fragment documents to load for this recipe, in order
    pub fn fragment_sources(&self) -> Vec<FragmentSource> {
        match &self.def.cloud_configs {
            Some(names) => names
                .iter()
                .map(|name| FragmentSource {
                    name: name.clone(),
                    explicit: true,
                })
                .collect(),
            None => vec![FragmentSource {
                name: self.id.clone(),
                explicit: false,
            }],
        }
    }

    /// Whether discovery selects this recipe given the currently wanted ids
    pub fn auto_qualifies(&self, wanted: &[String]) -> bool {
        if self.def.always_include {
            return true;
        }
        if self
            .def
            .include_if_recipe
            .iter()
            .any(|id| wanted.contains(id))
        {
            return true;
        }
        !self.def.include_if_not_recipe.is_empty()
            && !self
                .def
                .include_if_not_recipe
                .iter()
                .any(|id| wanted.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wanted(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_recipe_def() {
        let def: RecipeDef = serde_yaml::from_str(
            "include_if_recipe: [base]\nexpand: [docker]\ncloud_configs: [k8s, k8s-extra]",
        )
        .unwrap();
        assert!(!def.always_include);
        assert_eq!(def.include_if_recipe, vec!["base"]);
        assert_eq!(def.expand, vec!["docker"]);
        assert_eq!(
            def.cloud_configs,
            Some(vec!["k8s".to_string(), "k8s-extra".to_string()])
        );
    }

    #[test]
    fn test_parse_recipe_def_rejects_unknown_fields() {
        let result = serde_yaml::from_str::<RecipeDef>("always_includ: true");
        assert!(result.is_err());
    }

    #[test]
    fn test_fragment_sources_default() {
        let recipe = Recipe::new("base", "main", RecipeDef::default());
        assert_eq!(
            recipe.fragment_sources(),
            vec![FragmentSource {
                name: "base".to_string(),
                explicit: false
            }]
        );
    }

    #[test]
    fn test_fragment_sources_explicit() {
        let def = RecipeDef {
            cloud_configs: Some(vec!["a".to_string(), "b".to_string()]),
            ..Default::default()
        };
        let sources = Recipe::new("x", "main", def).fragment_sources();
        assert_eq!(sources.len(), 2);
        assert!(sources.iter().all(|s| s.explicit));
    }

    #[test]
    fn test_auto_qualifies() {
        let always = Recipe::new(
            "base",
            "main",
            RecipeDef {
                always_include: true,
                ..Default::default()
            },
        );
        assert!(always.auto_qualifies(&[]));

        let if_recipe = Recipe::new(
            "k8s",
            "main",
            RecipeDef {
                include_if_recipe: vec!["base".to_string()],
                ..Default::default()
            },
        );
        assert!(if_recipe.auto_qualifies(&wanted(&["base"])));
        assert!(!if_recipe.auto_qualifies(&wanted(&["other"])));

        let if_not = Recipe::new(
            "fallback",
            "main",
            RecipeDef {
                include_if_not_recipe: vec!["custom".to_string()],
                ..Default::default()
            },
        );
        assert!(if_not.auto_qualifies(&wanted(&["other"])));
        assert!(!if_not.auto_qualifies(&wanted(&["custom"])));

        let plain = Recipe::new("plain", "main", RecipeDef::default());
        assert!(!plain.auto_qualifies(&wanted(&["anything"])));
    }
}
