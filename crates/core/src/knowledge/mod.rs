//! Personalization graph, restaurant catalog and recommendation scoring.

pub mod catalog;
pub mod extraction;
pub mod graph;
pub mod profile;
pub mod scoring;
pub mod store;

pub use catalog::{Dish, Restaurant, RestaurantCatalog};
pub use extraction::{extract_preferences, ExtractedPreferences};
pub use graph::{
    GraphExport, GraphNode, GraphRelationship, GraphStats, NodeId, NodeType, RelationshipId,
    RelationshipType,
};
pub use profile::{OrderRecord, UserProfile};
pub use scoring::{PersonalizationScorer, Recommendation, ScoringWeights};
pub use store::KnowledgeStore;
