//! Keyword-based category tagging.

use nb_protocol::Category;

const KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Medicine,
        &[
            "farmaco",
            "farmaci",
            "medicina",
            "medicine",
            "pillola",
            "pastiglia",
            "integratore",
            "vitamina",
            "antibiotico",
            "compressa",
            "dose",
        ],
    ),
    (Category::Birthday, &["compleanno", "auguri"]),
    (
        Category::Car,
        &[
            "bollo",
            "tagliando",
            "assicurazione auto",
            "revisione",
            "benzina",
            "gomme",
        ],
    ),
    (
        Category::House,
        &["affitto", "bolletta", "bollette", "condominio", "luce", "gas", "acqua"],
    ),
    (
        Category::Health,
        &["dentista", "dottore", "medico", "visita", "analisi", "esame"],
    ),
    (
        Category::Document,
        &[
            "carta d'identità",
            "carta d'identita",
            "passaporto",
            "patente",
            "documenti",
            "730",
            "isee",
        ],
    ),
    (
        Category::Habit,
        &[
            "bere acqua",
            "meditare",
            "camminare",
            "palestra",
            "stretching",
            "leggere",
        ],
    ),
];

/// Tag `text` with the category of its longest matching keyword.
pub fn detect(text: &str) -> Category {
    let lower = text.to_lowercase();
    let mut best: Option<(usize, Category)> = None;
    for (category, words) in KEYWORDS {
        for word in *words {
            if contains_word(&lower, word) && best.is_none_or(|(len, _)| word.len() > len) {
                best = Some((word.len(), *category));
            }
        }
    }
    best.map_or(Category::Generic, |(_, category)| category)
}

/// Whole-word (or whole-phrase) containment.
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_each_category() {
        assert_eq!(detect("prendere la pillola"), Category::Medicine);
        assert_eq!(detect("compleanno di Giulia"), Category::Birthday);
        assert_eq!(detect("pagare il bollo"), Category::Car);
        assert_eq!(detect("pagare la bolletta della luce"), Category::House);
        assert_eq!(detect("dentista"), Category::Health);
        assert_eq!(detect("rinnovare il passaporto"), Category::Document);
        assert_eq!(detect("andare in palestra"), Category::Habit);
        assert_eq!(detect("comprare il latte"), Category::Generic);
    }

    #[test]
    fn longest_keyword_wins() {
        // "acqua" alone is a house bill, "bere acqua" a habit.
        assert_eq!(detect("bolletta acqua"), Category::House);
        assert_eq!(detect("bere acqua"), Category::Habit);
    }

    #[test]
    fn matches_whole_words_only() {
        assert_eq!(detect("guardare la lucertola"), Category::Generic);
        assert_eq!(detect("Vitamina D"), Category::Medicine);
    }
}
