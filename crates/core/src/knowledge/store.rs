use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use super::catalog::RestaurantCatalog;
use super::extraction::{extract_preferences, ExtractedPreferences};
use super::graph::{
    GraphExport, GraphNode, GraphRelationship, GraphStats, NodeId, NodeType, RelationshipId,
    RelationshipType,
};
use super::profile::{demo_profiles, merge_unique, OrderRecord, UserProfile};
use super::scoring::{PersonalizationScorer, Recommendation};
use crate::errors::KnowledgeError;

/// In-memory personalization graph plus per-user profile records.
///
/// Node and relationship ids are content-addressed (see [`NodeId::for_value`]
/// and [`RelationshipId::for_edge`]), so repeating an upsert never grows the
/// store.
#[derive(Clone, Debug, Default)]
pub struct KnowledgeStore {
    nodes: BTreeMap<NodeId, GraphNode>,
    relationships: BTreeMap<RelationshipId, GraphRelationship>,
    profiles: BTreeMap<String, UserProfile>,
    catalog: RestaurantCatalog,
    scorer: PersonalizationScorer,
}

impl KnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(catalog: RestaurantCatalog) -> Self {
        Self { catalog, ..Self::default() }
    }

    /// Store preloaded with the demo user profiles.
    pub fn seeded() -> Self {
        let mut store = Self::new();
        for profile in demo_profiles() {
            store.create_user_profile(profile);
        }
        store
    }

    pub fn catalog(&self) -> &RestaurantCatalog {
        &self.catalog
    }

    pub fn get_or_create_node(&mut self, node_type: NodeType, value: &str) -> NodeId {
        let id = NodeId::for_value(node_type, value);
        if !self.nodes.contains_key(&id) {
            let now = Utc::now();
            let mut properties = BTreeMap::new();
            properties.insert("value".to_string(), Value::String(value.to_string()));
            self.nodes.insert(
                id.clone(),
                GraphNode {
                    id: id.clone(),
                    node_type,
                    properties,
                    created_at: now,
                    updated_at: now,
                },
            );
        }
        id
    }

    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn create_relationship(
        &mut self,
        source: &NodeId,
        kind: RelationshipType,
        target: &NodeId,
    ) -> Result<RelationshipId, KnowledgeError> {
        self.create_relationship_with(source, kind, target, BTreeMap::new())
    }

    pub fn create_relationship_with(
        &mut self,
        source: &NodeId,
        kind: RelationshipType,
        target: &NodeId,
        properties: BTreeMap<String, Value>,
    ) -> Result<RelationshipId, KnowledgeError> {
        for endpoint in [source, target] {
            if !self.nodes.contains_key(endpoint) {
                return Err(KnowledgeError::UnknownNode(endpoint.0.clone()));
            }
        }

        let id = RelationshipId::for_edge(source, kind, target);
        self.relationships.entry(id.clone()).or_insert_with(|| GraphRelationship {
            id: id.clone(),
            source: source.clone(),
            target: target.clone(),
            kind,
            properties,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    pub fn relationships_from(&self, source: &NodeId) -> Vec<&GraphRelationship> {
        self.relationships.values().filter(|edge| &edge.source == source).collect()
    }

    /// Registers the profile and links its tags and location into the graph.
    /// Re-creating an existing id replaces the profile record.
    pub fn create_user_profile(&mut self, profile: UserProfile) -> NodeId {
        let user_node = self.get_or_create_node(NodeType::User, &profile.id);
        if let Some(node) = self.nodes.get_mut(&user_node) {
            node.properties.insert("name".to_string(), json!(profile.name));
            node.properties.insert("location".to_string(), json!(profile.location));
            node.updated_at = Utc::now();
        }

        self.link_tags(&user_node, NodeType::Preference, RelationshipType::HasPreference, &profile.preferences);
        self.link_tags(
            &user_node,
            NodeType::DietaryRestriction,
            RelationshipType::HasDietaryRestriction,
            &profile.dietary,
        );
        let location = [profile.location.clone()];
        self.link_tags(&user_node, NodeType::Address, RelationshipType::LivesAt, &location);

        self.profiles.insert(profile.id.clone(), profile);
        user_node
    }

    pub fn user_profile(&self, user_id: &str) -> Option<&UserProfile> {
        self.profiles.get(user_id)
    }

    pub fn user_profiles(&self) -> impl Iterator<Item = &UserProfile> {
        self.profiles.values()
    }

    /// Merges new tags into the profile (ordered, no duplicates) and upserts
    /// the matching nodes and edges.
    pub fn update_user_preferences(
        &mut self,
        user_id: &str,
        preferences: &[String],
        dietary: &[String],
    ) -> Result<(), KnowledgeError> {
        let profile = self
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| KnowledgeError::UnknownUser(user_id.to_string()))?;
        merge_unique(&mut profile.preferences, preferences.iter().cloned());
        merge_unique(&mut profile.dietary, dietary.iter().cloned());

        let user_node = NodeId::for_value(NodeType::User, user_id);
        self.link_tags(&user_node, NodeType::Preference, RelationshipType::HasPreference, preferences);
        self.link_tags(
            &user_node,
            NodeType::DietaryRestriction,
            RelationshipType::HasDietaryRestriction,
            dietary,
        );

        debug!(
            event_name = "knowledge.preferences.merged",
            user_id,
            preferences = preferences.len(),
            dietary = dietary.len(),
            "merged conversation preferences into profile"
        );
        Ok(())
    }

    pub fn add_order_to_history(
        &mut self,
        user_id: &str,
        order: OrderRecord,
    ) -> Result<NodeId, KnowledgeError> {
        let profile = self
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| KnowledgeError::UnknownUser(user_id.to_string()))?;
        let sequence = profile.order_history.len();
        profile.last_order = Some(order.summary());
        profile.order_history.push(order.clone());

        let user_node = NodeId::for_value(NodeType::User, user_id);
        let order_node =
            self.get_or_create_node(NodeType::OrderHistory, &format!("{user_id} {sequence}"));
        if let Some(node) = self.nodes.get_mut(&order_node) {
            node.properties.insert("restaurant".to_string(), json!(order.restaurant));
            node.properties.insert("dish".to_string(), json!(order.dish));
            node.properties.insert("quantity".to_string(), json!(order.quantity));
            if let Some(price) = order.price {
                node.properties.insert("price".to_string(), json!(price.to_string()));
            }
        }
        self.create_relationship(&user_node, RelationshipType::OrderedDish, &order_node)?;

        let restaurant_node = self.get_or_create_node(NodeType::Restaurant, &order.restaurant);
        self.create_relationship(&user_node, RelationshipType::OrderedFrom, &restaurant_node)?;

        Ok(order_node)
    }

    /// Ranked recommendations for a user; unknown users get none.
    pub fn personalized_recommendations(&self, user_id: &str) -> Vec<Recommendation> {
        match self.profiles.get(user_id) {
            Some(profile) => self.scorer.rank(profile, &self.catalog),
            None => Vec::new(),
        }
    }

    pub fn extract_preferences_from_conversation(&self, text: &str) -> ExtractedPreferences {
        extract_preferences(text)
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            nodes: self.nodes.len(),
            relationships: self.relationships.len(),
            users: self.profiles.len(),
        }
    }

    pub fn export(&self) -> GraphExport {
        GraphExport {
            nodes: self.nodes.values().cloned().collect(),
            relationships: self.relationships.values().cloned().collect(),
        }
    }

    fn link_tags(
        &mut self,
        user_node: &NodeId,
        node_type: NodeType,
        kind: RelationshipType,
        values: &[String],
    ) {
        for value in values {
            let target = self.get_or_create_node(node_type, value);
            let id = RelationshipId::for_edge(user_node, kind, &target);
            self.relationships.entry(id.clone()).or_insert_with(|| GraphRelationship {
                id,
                source: user_node.clone(),
                target,
                kind,
                properties: BTreeMap::new(),
                created_at: Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::KnowledgeStore;
    use crate::errors::KnowledgeError;
    use crate::knowledge::graph::{NodeId, NodeType, RelationshipType};
    use crate::knowledge::profile::{OrderRecord, UserProfile};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn node_upsert_is_idempotent() {
        let mut store = KnowledgeStore::new();
        let first = store.get_or_create_node(NodeType::Cuisine, "Italian");
        let before = store.stats().nodes;
        let second = store.get_or_create_node(NodeType::Cuisine, "Italian");

        assert_eq!(first, second);
        assert_eq!(store.stats().nodes, before);
        assert_eq!(store.node(&first).and_then(|node| node.value()), Some("Italian"));
    }

    #[test]
    fn node_count_grows_by_at_most_one_per_distinct_pair() {
        let mut store = KnowledgeStore::new();
        let pairs = [
            (NodeType::Cuisine, "Thai"),
            (NodeType::Cuisine, "thai"),
            (NodeType::Preference, "Thai"),
            (NodeType::Cuisine, "Thai"),
            (NodeType::Dish, "Pad  Thai"),
            (NodeType::Dish, "pad thai"),
        ];
        for (node_type, value) in pairs {
            store.get_or_create_node(node_type, value);
        }

        assert_eq!(store.stats().nodes, 3);
    }

    #[test]
    fn relationship_creation_is_idempotent_per_triple() {
        let mut store = KnowledgeStore::new();
        let source = store.get_or_create_node(NodeType::Restaurant, "Tony's Italian");
        let target = store.get_or_create_node(NodeType::Restaurant, "Golden Dragon");

        let first = store
            .create_relationship(&source, RelationshipType::SimilarTo, &target)
            .expect("endpoints exist");
        let second = store
            .create_relationship(&source, RelationshipType::SimilarTo, &target)
            .expect("endpoints exist");
        let reverse = store
            .create_relationship(&target, RelationshipType::SimilarTo, &source)
            .expect("endpoints exist");

        assert_eq!(first, second);
        assert_ne!(first, reverse);
        assert_eq!(store.stats().relationships, 2);
    }

    #[test]
    fn relationships_require_existing_endpoints() {
        let mut store = KnowledgeStore::new();
        let source = store.get_or_create_node(NodeType::User, "1");
        let missing = NodeId::for_value(NodeType::Cuisine, "Martian");

        let error = store
            .create_relationship(&source, RelationshipType::LikesCuisine, &missing)
            .expect_err("dangling edge is rejected");
        assert_eq!(error, KnowledgeError::UnknownNode("cuisine_martian".to_string()));
    }

    #[test]
    fn seeded_store_builds_demo_graph() {
        let store = KnowledgeStore::seeded();
        let stats = store.stats();

        assert_eq!(stats.users, 3);
        // 3 users + 9 preferences + 4 dietary tags + 3 addresses
        assert_eq!(stats.nodes, 19);
        assert_eq!(stats.relationships, 16);

        let sarah = NodeId::for_value(NodeType::User, "1");
        assert_eq!(store.relationships_from(&sarah).len(), 6);
    }

    #[test]
    fn preference_merge_is_ordered_unique_and_upserts_edges() {
        let mut store = KnowledgeStore::seeded();
        let before = store.stats();

        store
            .update_user_preferences("1", &strings(&["Italian", "thai"]), &strings(&["Vegan"]))
            .expect("known user");
        store
            .update_user_preferences("1", &strings(&["thai"]), &strings(&["Vegan"]))
            .expect("known user");

        let profile = store.user_profile("1").expect("sarah");
        assert_eq!(profile.preferences, strings(&["Italian", "Vegetarian", "Healthy", "thai"]));
        assert_eq!(profile.dietary, strings(&["No nuts", "Low sodium", "Vegan"]));

        let after = store.stats();
        assert_eq!(after.nodes, before.nodes + 2);
        assert_eq!(after.relationships, before.relationships + 2);
    }

    #[test]
    fn preference_merge_for_unknown_user_fails() {
        let mut store = KnowledgeStore::seeded();
        let error = store
            .update_user_preferences("404", &strings(&["thai"]), &[])
            .expect_err("unknown user");

        assert_eq!(error, KnowledgeError::UnknownUser("404".to_string()));
    }

    #[test]
    fn order_history_updates_profile_and_graph() {
        let mut store = KnowledgeStore::seeded();
        let mut order = OrderRecord::new("Golden Dragon", "Kung Pao Chicken");
        order.price = Some(Decimal::new(1599, 2));

        let order_node = store.add_order_to_history("2", order).expect("known user");
        let second = store
            .add_order_to_history("2", OrderRecord::new("Golden Dragon", "Dim Sum Platter"))
            .expect("known user");

        assert_ne!(order_node, second);
        let profile = store.user_profile("2").expect("mike");
        assert_eq!(profile.order_history.len(), 2);
        assert_eq!(profile.last_order.as_deref(), Some("Dim Sum Platter from Golden Dragon"));

        let mike = NodeId::for_value(NodeType::User, "2");
        let ordered_from = store
            .relationships_from(&mike)
            .into_iter()
            .filter(|edge| edge.kind == RelationshipType::OrderedFrom)
            .count();
        assert_eq!(ordered_from, 1);
    }

    #[test]
    fn recommendations_use_profile_and_history() {
        let mut store = KnowledgeStore::seeded();
        let sarah: Vec<_> = store
            .personalized_recommendations("1")
            .into_iter()
            .map(|rec| rec.restaurant.name)
            .collect();
        assert_eq!(sarah, vec!["Tony's Italian", "Fresh & Green"]);

        store
            .add_order_to_history("1", OrderRecord::new("Fresh & Green", "Quinoa Salad"))
            .expect("known user");
        let reranked: Vec<_> = store
            .personalized_recommendations("1")
            .into_iter()
            .map(|rec| rec.restaurant.name)
            .collect();
        assert_eq!(reranked, vec!["Fresh & Green", "Tony's Italian"]);
    }

    #[test]
    fn unknown_users_get_no_recommendations() {
        assert!(KnowledgeStore::seeded().personalized_recommendations("404").is_empty());
    }

    #[test]
    fn export_lists_every_node_and_edge() {
        let mut store = KnowledgeStore::new();
        store.create_user_profile(
            UserProfile::new("7", "Ada", "Soho").with_preferences(&["Thai"]).with_dietary(&["Vegan"]),
        );

        let export = store.export();
        assert_eq!(export.nodes.len(), store.stats().nodes);
        assert_eq!(export.relationships.len(), 3);
        assert!(export.nodes.iter().any(|node| node.id.0 == "user_7"));
    }
}
