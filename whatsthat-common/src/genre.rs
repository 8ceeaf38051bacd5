//! Genre catalog and keyword-based genre detection

/// Every genre a venue may allow, in display order
pub const ALL_GENRES: [&str; 10] = [
    "country",
    "rap",
    "rock",
    "pop",
    "jazz",
    "lofi",
    "electronic",
    "r&b",
    "metal",
    "classical",
];

/// Keywords checked in order; the first hit decides the genre.
const KEYWORDS: &[(&[&str], &str)] = &[
    (&["country"], "country"),
    (&["rap", "hip hop", "hip-hop"], "rap"),
    (&["rock"], "rock"),
    (&["pop"], "pop"),
    (&["jazz"], "jazz"),
    (&["lofi", "lo-fi"], "lofi"),
    (&["edm", "electronic", "house"], "electronic"),
    (&["r&b", "rnb"], "r&b"),
    (&["metal"], "metal"),
    (&["classical", "orchestral"], "classical"),
];

/// Default allowed genre list for new venues (the whole catalog)
pub fn default_allowed() -> Vec<String> {
    ALL_GENRES.iter().map(|g| (*g).to_string()).collect()
}

/// Whether `genre` is part of the catalog
pub fn is_known(genre: &str) -> bool {
    ALL_GENRES.contains(&genre)
}

/// Keep only catalog genres, preserving the caller's order
pub fn retain_known(genres: Vec<String>) -> Vec<String> {
    genres.into_iter().filter(|g| is_known(g)).collect()
}

/// Guess a genre from free text by substring keywords.
///
/// Matching is a case-insensitive substring search, so "trapeze" counts as rap.
pub fn detect_genre(text: &str) -> Option<&'static str> {
    let lowered = text.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(words, _)| words.iter().any(|w| lowered.contains(w)))
        .map(|(_, genre)| *genre)
}
