//! Entity and claim data model
//!
//! An entity is one dump record: a unique identifier plus the claims
//! attached to it. A claim is a (property, datatype, value) statement.
//! Values are opaque strings and claim order follows document order, so
//! downstream output is reproducible.

/// A single (property, datatype, value) statement attached to an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub property: String,
    pub datatype: String,
    pub value: String,
}

impl Claim {
    /// Create a new claim with the given fields
    pub fn new(property: &str, datatype: &str, value: &str) -> Self {
        Self {
            property: property.to_string(),
            datatype: datatype.to_string(),
            value: value.to_string(),
        }
    }
}

/// One dump record: an identifier and its claims, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub id: String,
    pub claims: Vec<Claim>,
}

impl Entity {
    /// Create an entity with no claims
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            claims: Vec::new(),
        }
    }

    /// Create an entity with the given claims
    pub fn with_claims(id: &str, claims: Vec<Claim>) -> Self {
        Self {
            id: id.to_string(),
            claims,
        }
    }

    /// Append a claim, keeping document order
    pub fn push(&mut self, claim: Claim) {
        self.claims.push(claim);
    }
}
