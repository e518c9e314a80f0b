use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    User,
    Preference,
    Cuisine,
    Dish,
    Restaurant,
    DietaryRestriction,
    Address,
    OrderHistory,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Preference => "Preference",
            Self::Cuisine => "Cuisine",
            Self::Dish => "Dish",
            Self::Restaurant => "Restaurant",
            Self::DietaryRestriction => "DietaryRestriction",
            Self::Address => "Address",
            Self::OrderHistory => "OrderHistory",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    HasPreference,
    LikesCuisine,
    OrderedFrom,
    HasDietaryRestriction,
    LivesAt,
    OrderedDish,
    SimilarTo,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HasPreference => "HAS_PREFERENCE",
            Self::LikesCuisine => "LIKES_CUISINE",
            Self::OrderedFrom => "ORDERED_FROM",
            Self::HasDietaryRestriction => "HAS_DIETARY_RESTRICTION",
            Self::LivesAt => "LIVES_AT",
            Self::OrderedDish => "ORDERED_DISH",
            Self::SimilarTo => "SIMILAR_TO",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    /// `<type>_<value>` with the type lower-cased and every whitespace run in
    /// the value collapsed to `_`, so one (type, value) pair maps to one id.
    pub fn for_value(node_type: NodeType, value: &str) -> Self {
        let normalized =
            value.split_whitespace().collect::<Vec<_>>().join("_").to_lowercase();
        Self(format!("{}_{}", node_type.as_str().to_lowercase(), normalized))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipId(pub String);

impl RelationshipId {
    pub fn for_edge(source: &NodeId, kind: RelationshipType, target: &NodeId) -> Self {
        Self(format!("{}_{}_{}", source.0, kind.as_str(), target.0))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub node_type: NodeType,
    pub properties: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GraphNode {
    pub fn value(&self) -> Option<&str> {
        self.properties.get("value").and_then(Value::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphRelationship {
    pub id: RelationshipId,
    pub source: NodeId,
    pub target: NodeId,
    pub kind: RelationshipType,
    pub properties: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub relationships: usize,
    pub users: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    pub nodes: Vec<GraphNode>,
    pub relationships: Vec<GraphRelationship>,
}

#[cfg(test)]
mod tests {
    use super::{NodeId, NodeType, RelationshipId, RelationshipType};

    #[test]
    fn node_ids_normalize_case_and_whitespace() {
        assert_eq!(NodeId::for_value(NodeType::Address, "Downtown SF").0, "address_downtown_sf");
        assert_eq!(
            NodeId::for_value(NodeType::DietaryRestriction, "No   nuts"),
            NodeId::for_value(NodeType::DietaryRestriction, "no nuts")
        );
        assert_ne!(
            NodeId::for_value(NodeType::Preference, "Italian"),
            NodeId::for_value(NodeType::Cuisine, "Italian")
        );
    }

    #[test]
    fn relationship_ids_encode_the_triple() {
        let source = NodeId::for_value(NodeType::User, "1");
        let target = NodeId::for_value(NodeType::Preference, "Italian");
        let id = RelationshipId::for_edge(&source, RelationshipType::HasPreference, &target);

        assert_eq!(id.0, "user_1_HAS_PREFERENCE_preference_italian");
    }
}
