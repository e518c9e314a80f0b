//! Local keyword-template responder, the last tier of the completion chain.
//!
//! It never touches shared state: checkout replies read the cart they are
//! handed, and the order stage uses [`RuleBasedResponder::recognise_item`] to
//! decide what goes into the cart.

use rust_decimal::Decimal;

use echoshop_core::domain::cart::{cart_total, CartItem};
use echoshop_core::domain::intent::{CompletionReply, Intent, ReplyEntities, ReplySource};
use echoshop_core::knowledge::UserProfile;

const ORDER_KEYWORDS: [&str; 8] =
    ["order", "add", "get", "buy", "want", "give me", "i need", "bring me"];
const CHECKOUT_KEYWORDS: [&str; 3] = ["checkout", "place order", "complete order"];
const RULE_BASED_CONFIDENCE: f64 = 0.6;

const TONYS: &str = "Tony's Italian";
const FRESH_AND_GREEN: &str = "Fresh & Green";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Template {
    Pizza,
    Pasta,
    Vegetarian,
}

impl Template {
    fn detect(lowered: &str) -> Option<Self> {
        if lowered.contains("pizza") {
            Some(Self::Pizza)
        } else if lowered.contains("italian") || lowered.contains("pasta") {
            Some(Self::Pasta)
        } else if ["vegetarian", "vegan", "salad"].iter().any(|term| lowered.contains(term)) {
            Some(Self::Vegetarian)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RuleBasedResponder;

impl RuleBasedResponder {
    pub fn new() -> Self {
        Self
    }

    pub fn respond(
        &self,
        utterance: &str,
        profile: Option<&UserProfile>,
        cart: &[CartItem],
    ) -> CompletionReply {
        let lowered = utterance.to_lowercase();
        let ordering = is_order_command(&lowered);

        if is_greeting(&lowered) {
            return reply(greeting_text(profile), Intent::Greeting, ReplyEntities::default());
        }

        if let Some(template) = Template::detect(&lowered) {
            if ordering {
                let item = template_item(template, &lowered);
                let text = added_text(template, &item);
                return reply(text, Intent::AddToCart, item_entities(&item));
            }
            return reply(browse_text(template), Intent::Recommendation, browse_entities(template));
        }

        if CHECKOUT_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
            let text = format!(
                "Great! I'm processing your order with {} items for a total of ${}. Your order will be ready in 25-30 minutes. Thank you for using EchoShop!",
                cart.len(),
                cart_total(cart).round_dp(2)
            );
            let entities = ReplyEntities { action: Some("checkout".to_string()), ..ReplyEntities::default() };
            return reply(text, Intent::Confirmation, entities);
        }

        if ordering {
            let text = "I'd be happy to help you order! What specific food item would you like to add to your cart? You can say things like \"order a pizza\", \"add pasta\", or \"get me a salad\".";
            return reply(text.to_string(), Intent::Order, ReplyEntities::default());
        }

        reply(fallback_text(profile), Intent::Search, ReplyEntities::default())
    }

    /// The cart item an order template would add for this utterance.
    pub fn recognise_item(&self, utterance: &str) -> Option<CartItem> {
        let lowered = utterance.to_lowercase();
        Template::detect(&lowered).map(|template| template_item(template, &lowered))
    }

    pub fn default_item(&self) -> CartItem {
        cart_item("Margherita Pizza", TONYS, 1899, 1, Vec::new())
    }
}

pub fn is_order_command(lowered: &str) -> bool {
    ORDER_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

/// Keyword intent used when the completion service cannot classify.
pub fn fallback_intent(utterance: &str) -> Intent {
    let lowered = utterance.to_lowercase();
    if lowered.contains("order") || lowered.contains("add") {
        Intent::Order
    } else if ["search", "show", "find"].iter().any(|term| lowered.contains(term)) {
        Intent::Search
    } else if is_greeting(&lowered) {
        Intent::Greeting
    } else {
        Intent::Search
    }
}

fn is_greeting(lowered: &str) -> bool {
    lowered.contains("hello") || words(lowered).any(|word| word == "hi")
}

fn words(lowered: &str) -> impl Iterator<Item = &str> {
    lowered.split(|ch: char| !ch.is_alphanumeric()).filter(|word| !word.is_empty())
}

/// First run of ASCII digits in the text, defaulting to one.
fn quantity(lowered: &str) -> u32 {
    let digits = lowered
        .chars()
        .skip_while(|ch| !ch.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect::<String>();
    digits.parse::<u32>().ok().filter(|value| *value > 0).unwrap_or(1)
}

fn template_item(template: Template, lowered: &str) -> CartItem {
    let quantity = quantity(lowered);
    match template {
        Template::Pizza => {
            if lowered.contains("cheese") {
                cart_item("Margherita Pizza", TONYS, 2299, quantity, vec!["extra cheese".to_string()])
            } else {
                cart_item("Margherita Pizza", TONYS, 1899, quantity, Vec::new())
            }
        }
        Template::Pasta => {
            let name = if lowered.contains("fettuccine") {
                "Fettuccine Alfredo"
            } else {
                "Spaghetti Carbonara"
            };
            cart_item(name, TONYS, 1699, quantity, Vec::new())
        }
        Template::Vegetarian => {
            let name = if lowered.contains("quinoa") && !lowered.contains("mediterranean") {
                "Quinoa Salad"
            } else {
                "Mediterranean Bowl"
            };
            cart_item(name, FRESH_AND_GREEN, 1499, quantity, Vec::new())
        }
    }
}

fn cart_item(name: &str, restaurant: &str, cents: i64, quantity: u32, modifiers: Vec<String>) -> CartItem {
    CartItem {
        name: name.to_string(),
        restaurant: restaurant.to_string(),
        unit_price: Decimal::new(cents, 2),
        quantity,
        modifiers,
    }
}

fn added_text(template: Template, item: &CartItem) -> String {
    match template {
        Template::Pizza => format!(
            "Perfect! I've added {} {}{} from {} to your cart for ${}. What else would you like to order?",
            item.quantity,
            item.name,
            if item.modifiers.is_empty() { "" } else { " with extra cheese" },
            item.restaurant,
            item.unit_price
        ),
        Template::Pasta => format!(
            "Excellent! I've added {} {} from {} to your cart for ${}. Would you like to add anything else?",
            item.quantity, item.name, item.restaurant, item.unit_price
        ),
        Template::Vegetarian => format!(
            "Perfect! I've added {} {} from {} to your cart for ${}. This matches your dietary preferences perfectly!",
            item.quantity, item.name, item.restaurant, item.unit_price
        ),
    }
}

fn browse_text(template: Template) -> String {
    match template {
        Template::Pizza => "Great choice! Based on your preference for Italian food, I recommend Tony's Italian Restaurant. They have excellent Margherita and Pepperoni pizzas. Just say \"order a pizza\" to add it to your cart!",
        Template::Pasta => "Excellent! I found Tony's Italian Restaurant which perfectly matches your preferences. They offer authentic Italian cuisine with options for your dietary needs. Just say \"order pasta\" to add it to your cart!",
        Template::Vegetarian => "Perfect! I found several vegetarian options that match your dietary preferences. Fresh & Green has amazing Mediterranean bowls and quinoa salads. Just say \"order a salad\" to add it to your cart!",
    }
    .to_string()
}

fn greeting_text(profile: Option<&UserProfile>) -> String {
    match profile.filter(|profile| !profile.preferences.is_empty()) {
        Some(profile) => format!(
            "Hello! I'm your AI food ordering assistant. I see you prefer {} food. What would you like to order today?",
            profile.preferences.join(" and ")
        ),
        None => "Hello! I'm your AI food ordering assistant. What would you like to order today?"
            .to_string(),
    }
}

fn fallback_text(profile: Option<&UserProfile>) -> String {
    match profile {
        Some(profile) if !profile.preferences.is_empty() => format!(
            "I understand you're looking for food options. Based on your preferences for {}, I can recommend several restaurants in {}. Just say \"order [food item]\" to add it to your cart!",
            profile.preferences.join(", "),
            profile.location
        ),
        _ => "I understand you're looking for food options. Just say \"order [food item]\" to add it to your cart!"
            .to_string(),
    }
}

fn item_entities(item: &CartItem) -> ReplyEntities {
    ReplyEntities {
        food: vec![item.name.clone()],
        restaurant: vec![item.restaurant.clone()],
        action: Some("add_to_cart".to_string()),
        quantity: Some(item.quantity),
        price: Some(item.unit_price),
        modifiers: item.modifiers.clone(),
    }
}

fn browse_entities(template: Template) -> ReplyEntities {
    let (food, restaurant) = match template {
        Template::Pizza => ("pizza", TONYS),
        Template::Pasta => ("pasta", TONYS),
        Template::Vegetarian => ("salad", FRESH_AND_GREEN),
    };
    ReplyEntities {
        food: vec![food.to_string()],
        restaurant: vec![restaurant.to_string()],
        action: Some("recommend".to_string()),
        ..ReplyEntities::default()
    }
}

fn reply(response: String, intent: Intent, entities: ReplyEntities) -> CompletionReply {
    CompletionReply {
        response,
        intent,
        confidence: RULE_BASED_CONFIDENCE,
        entities,
        source: ReplySource::RuleBased,
        processing_ms: 0,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use echoshop_core::domain::intent::{Intent, ReplySource};
    use echoshop_core::knowledge::profile::demo_profiles;

    use super::{fallback_intent, RuleBasedResponder};

    #[test]
    fn pizza_order_with_cheese_uses_upgraded_price() {
        let reply = RuleBasedResponder::new().respond("order 2 pizzas with extra cheese", None, &[]);

        assert_eq!(reply.intent, Intent::AddToCart);
        assert_eq!(reply.source, ReplySource::RuleBased);
        assert_eq!(reply.entities.quantity, Some(2));
        assert_eq!(reply.entities.price, Some(Decimal::new(2299, 2)));
        assert_eq!(reply.entities.modifiers, vec!["extra cheese".to_string()]);
        assert_eq!(
            reply.response,
            "Perfect! I've added 2 Margherita Pizza with extra cheese from Tony's Italian to your cart for $22.99. What else would you like to order?"
        );
    }

    #[test]
    fn pizza_without_order_verb_recommends() {
        let reply = RuleBasedResponder::new().respond("pizza sounds nice", None, &[]);

        assert_eq!(reply.intent, Intent::Recommendation);
        assert!(reply.response.contains("Just say \"order a pizza\""));
    }

    #[test]
    fn pasta_and_salad_templates_pick_named_dishes() {
        let responder = RuleBasedResponder::new();
        let pasta = responder.recognise_item("I want fettuccine pasta").expect("pasta template");
        let salad = responder.recognise_item("get me a quinoa salad").expect("salad template");

        assert_eq!(pasta.name, "Fettuccine Alfredo");
        assert_eq!(pasta.unit_price, Decimal::new(1699, 2));
        assert_eq!(salad.name, "Quinoa Salad");
        assert_eq!(salad.restaurant, "Fresh & Green");
        assert!(responder.recognise_item("sushi please").is_none());
    }

    #[test]
    fn checkout_reports_cart_count_and_total() {
        let responder = RuleBasedResponder::new();
        let cart = vec![
            responder.recognise_item("2 pizza").expect("pizza"),
            responder.recognise_item("salad").expect("salad"),
        ];

        let reply = responder.respond("please checkout", None, &cart);

        assert_eq!(reply.intent, Intent::Confirmation);
        assert!(reply.response.contains("with 2 items for a total of $52.97"));
    }

    #[test]
    fn place_order_is_checkout_not_generic_order() {
        let reply = RuleBasedResponder::new().respond("place order now", None, &[]);
        assert_eq!(reply.intent, Intent::Confirmation);
    }

    #[test]
    fn greeting_mentions_profile_preferences() {
        let sarah = demo_profiles().remove(0);
        let reply = RuleBasedResponder::new().respond("Hi there", Some(&sarah), &[]);

        assert_eq!(reply.intent, Intent::Greeting);
        assert!(reply.response.contains("Italian and Vegetarian and Healthy"));
    }

    #[test]
    fn hi_inside_a_word_is_not_a_greeting() {
        let reply = RuleBasedResponder::new().respond("this is something else", None, &[]);
        assert_eq!(reply.intent, Intent::Search);
    }

    #[test]
    fn generic_order_asks_for_an_item() {
        let reply = RuleBasedResponder::new().respond("can you bring me something", None, &[]);

        assert_eq!(reply.intent, Intent::Order);
        assert!(reply.response.starts_with("I'd be happy to help you order!"));
    }

    #[test]
    fn fallback_uses_preferences_and_location() {
        let mike = demo_profiles().remove(1);
        let reply = RuleBasedResponder::new().respond("what's good tonight", Some(&mike), &[]);

        assert!(reply.response.contains("Asian, Spicy, Quick"));
        assert!(reply.response.contains("Mission District"));
    }

    #[test]
    fn keyword_intent_fallback() {
        assert_eq!(fallback_intent("add a drink"), Intent::Order);
        assert_eq!(fallback_intent("show me menus"), Intent::Search);
        assert_eq!(fallback_intent("hello"), Intent::Greeting);
        assert_eq!(fallback_intent("mmm"), Intent::Search);
    }

    #[test]
    fn zero_quantity_falls_back_to_one() {
        let item = RuleBasedResponder::new().recognise_item("0 pizza").expect("pizza");
        assert_eq!(item.quantity, 1);
    }
}
