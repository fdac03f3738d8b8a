use crate::types::Category;

/// Checked in order; the first category with a keyword hit wins. Frozen
/// comes first so `ice cream` is not filed under dairy.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Frozen,
        &["ice cream", "icecream", "frozen", "pizza", "fries", "peas", "corn"],
    ),
    (
        Category::FreshProduce,
        &[
            "apple", "banana", "tomato", "lettuce", "carrot", "onion", "potato", "avocado",
            "cucumber", "pepper", "broccoli", "cauliflower", "kiwi", "mandarin", "pear", "lemon",
            "lime", "orange", "spinach", "pumpkin",
        ],
    ),
    (
        Category::Dairy,
        &[
            "milk", "cheese", "yogurt", "yoghurt", "butter", "cream", "cheddar", "mozzarella",
            "feta", "parmesan",
        ],
    ),
    (
        Category::Meat,
        &[
            "beef", "chicken", "pork", "lamb", "steak", "mince", "sausage", "bacon", "ham",
            "turkey", "salami",
        ],
    ),
    (
        Category::Pantry,
        &[
            "bread", "pasta", "rice", "flour", "sugar", "oil", "sauce", "soup", "cereal", "honey",
            "jam", "muesli",
        ],
    ),
    (
        Category::Beverages,
        &[
            "water", "juice", "soda", "beer", "wine", "coffee", "tea", "coke", "pepsi", "kombucha",
        ],
    ),
    (
        Category::Snacks,
        &["chips", "crackers", "nuts", "chocolate", "candy", "biscuits", "cookies", "popcorn"],
    ),
    (
        Category::Household,
        &[
            "toilet paper", "paper towel", "soap", "detergent", "cleaning", "tissue", "laundry",
            "bleach",
        ],
    ),
];

/// Assign a grocery category by keyword, matching at word starts so that
/// `steak` is not read as `tea`.
pub fn categorize(name: &str) -> Option<Category> {
    let words: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let padded = format!(" {} ", words.split_whitespace().collect::<Vec<_>>().join(" "));

    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| padded.contains(&format!(" {k}"))))
        .map(|(category, _)| *category)
}
