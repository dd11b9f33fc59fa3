//! Who performed an audited operation.

use std::fmt;

use serde::{Deserialize, Serialize};
use ticketry_core::validation::non_empty;
use ticketry_core::{Validate, ValidationError, ValidationErrors};

/// Kind of actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    /// A person.
    Human,
    /// An AI agent acting under human oversight.
    Ai,
    /// An automated process.
    System,
}

impl ActorType {
    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Ai => "ai",
            Self::System => "system",
        }
    }
}

impl fmt::Display for ActorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The actor behind an operation.
///
/// AI actors must name the human they act for in `co_author`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Kind of actor.
    #[serde(rename = "type")]
    pub actor_type: ActorType,

    /// Actor identifier.
    pub id: String,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Human attribution for the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co_author: Option<String>,
}

impl Actor {
    /// Creates a human actor.
    pub fn human(id: impl Into<String>) -> Self {
        Self::new(ActorType::Human, id)
    }

    /// Creates an AI actor attributed to `co_author`.
    pub fn ai(id: impl Into<String>, co_author: impl Into<String>) -> Self {
        Self::new(ActorType::Ai, id).with_co_author(co_author)
    }

    /// Creates a system actor.
    pub fn system(id: impl Into<String>) -> Self {
        Self::new(ActorType::System, id)
    }

    /// Creates an actor of any type with no name or co-author.
    pub fn new(actor_type: ActorType, id: impl Into<String>) -> Self {
        Self {
            actor_type,
            id: id.into(),
            name: None,
            co_author: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the co-author.
    #[must_use]
    pub fn with_co_author(mut self, co_author: impl Into<String>) -> Self {
        self.co_author = Some(co_author.into());
        self
    }

    /// Checks the actor invariants, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the ID is empty or an AI actor has no co-author.
    pub fn check(&self) -> Result<(), ValidationError> {
        non_empty("actor.id", &self.id)?;
        self.check_co_author()
    }

    fn check_co_author(&self) -> Result<(), ValidationError> {
        let has_co_author = self
            .co_author
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());

        if self.actor_type == ActorType::Ai && !has_co_author {
            return Err(ValidationError::constraint(
                "actor.co_author",
                "AI actors require a human co-author",
            ));
        }
        Ok(())
    }
}

impl Validate for Actor {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.check(non_empty("actor.id", &self.id));
        errors.check(self.check_co_author());
        errors.finish()
    }
}
