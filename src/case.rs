//! Resource naming: English pluralization for collection path segments.

use regex::Regex;
use std::sync::OnceLock;

const IRREGULAR: &[(&str, &str)] = &[
    ("ox", "oxen"),
    ("axe", "axes"),
    ("die", "dice"),
    ("foot", "feet"),
    ("goose", "geese"),
    ("tooth", "teeth"),
    ("quiz", "quizzes"),
    ("human", "humans"),
    ("proof", "proofs"),
    ("carve", "carves"),
    ("valve", "valves"),
    ("thief", "thieves"),
    ("groove", "grooves"),
    ("pickaxe", "pickaxes"),
    ("passerby", "passersby"),
    ("canvas", "canvases"),
    ("echo", "echoes"),
    ("dingo", "dingoes"),
    ("volcano", "volcanoes"),
    ("tornado", "tornadoes"),
    ("torpedo", "torpedoes"),
    ("genus", "genera"),
    ("viscus", "viscera"),
    ("stigma", "stigmata"),
    ("stoma", "stomata"),
    ("dogma", "dogmata"),
    ("lemma", "lemmata"),
    ("schema", "schemata"),
    ("anathema", "anathemata"),
];

const UNCOUNTABLE: &[&str] = &[
    "adulthood", "advice", "agenda", "aid", "aircraft", "alcohol", "ammo", "analytics", "anime", "athletics",
    "audio", "bison", "blood", "bream", "buffalo", "butter", "carp", "cash", "chassis", "chess", "clothing", "cod",
    "commerce", "cooperation", "corps", "debris", "diabetes", "digestion", "elk", "energy", "equipment",
    "excretion", "expertise", "firmware", "flounder", "fun", "gallows", "garbage", "graffiti", "hardware",
    "headquarters", "health", "herpes", "highjinks", "homework", "housework", "information", "jeans", "justice",
    "kudos", "labour", "literature", "machinery", "mackerel", "mail", "media", "mews", "moose", "music", "mud",
    "manga", "news", "only", "personnel", "pike", "plankton", "pliers", "police", "pollution", "premises", "rain",
    "research", "rice", "salmon", "scissors", "series", "sewage", "shambles", "shrimp", "software", "species",
    "staff", "swine", "tennis", "traffic", "transportation", "trout", "tuna", "wealth", "welfare", "whiting",
    "wildebeest", "wildlife",
];

/// Suffix rules on the lowercased word, most specific first; the first match wins.
/// Replacements use `regex` expansion syntax.
const RULES: &[(&str, &str)] = &[
    // uncountable endings
    (r"pok[eé]mon$", "$0"),
    (r"[^aeiou]ese$", "$0"),
    (r"deer$", "$0"),
    (r"fish$", "$0"),
    (r"measles$", "$0"),
    (r"o[iu]s$", "$0"),
    (r"pox$", "$0"),
    (r"sheep$", "$0"),
    (r"m[ae]n$", "men"),
    (r"eaux$", "$0"),
    (r"(child)(?:ren)?$", "${1}ren"),
    (r"(pe)(?:rson|ople)$", "${1}ople"),
    (r"\b((?:tit)?m|l)(?:ice|ouse)$", "${1}ice"),
    (r"(matr|cod|mur|sil|vert|ind|append)(?:ix|ex)$", "${1}ices"),
    (r"(x|ch|ss|sh|zz)$", "${1}es"),
    (r"([^ch][ieo][ln])ey$", "${1}ies"),
    (r"([^aeiouy]|qu)y$", "${1}ies"),
    (r"(?:(kni|wi|li)fe|(ar|l|ea|eo|oa|hoo)f)$", "${1}${2}ves"),
    (r"sis$", "ses"),
    (
        r"(apheli|hyperbat|periheli|asyndet|noumen|phenomen|criteri|organ|prolegomen|hedr|automat)(?:a|on)$",
        "${1}a",
    ),
    (
        r"(agend|addend|millenni|dat|extrem|bacteri|desiderat|strat|candelabr|errat|ov|symposi|curricul|automat|quor)(?:a|um)$",
        "${1}a",
    ),
    (r"(her|at|gr)o$", "${1}oes"),
    (r"(seraph|cherub)(?:im)?$", "${1}im"),
    (r"(alumn|alg|vertebr)(?:a|ae)$", "${1}ae"),
    (
        r"(alumn|syllab|vir|radi|nucle|fung|cact|stimul|termin|bacill|foc|uter|loc|strat)(?:us|i)$",
        "${1}i",
    ),
    (r"([^l]ias|[aeiou]las|[ejzr]as|[iu]am)$", "${1}"),
    (r"(e[mn]u)s?$", "${1}s"),
    (r"(alias|[^aou]us|t[lm]as|gas|ris)$", "${1}es"),
    (r"(ax|test)is$", "${1}es"),
    (r"[^\x00-\x7F]$", "$0"),
    (r"s?$", "s"),
];

fn rules() -> &'static [(Regex, &'static str)] {
    static COMPILED: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        RULES
            .iter()
            .map(|(pattern, replacement)| (Regex::new(pattern).expect("static regex"), *replacement))
            .collect()
    })
}

/// Plural form of a resource name, e.g. "group" -> "groups", "person" -> "people", "analysis" -> "analyses".
/// Only the last segment of a camelCase or snake_case name is inflected ("userGroup" -> "userGroups").
/// Words that are already plural ("people", "groups") come back unchanged.
pub fn pluralize(word: &str) -> String {
    let split = last_word_start(word);
    let (head, tail) = word.split_at(split);
    let lower = tail.to_lowercase();
    if lower.is_empty() || UNCOUNTABLE.contains(&lower.as_str()) {
        return word.to_string();
    }
    if IRREGULAR.iter().any(|(_, plural)| *plural == lower) {
        return word.to_string();
    }

    let plural = match IRREGULAR.iter().find(|(singular, _)| *singular == lower) {
        Some((_, plural)) => plural.to_string(),
        None => rules()
            .iter()
            .find(|(re, _)| re.is_match(&lower))
            .map(|(re, replacement)| re.replace(&lower, *replacement).into_owned())
            .unwrap_or(lower),
    };
    format!("{}{}", head, match_case(tail, &plural))
}

fn last_word_start(word: &str) -> usize {
    word.char_indices()
        .filter(|(i, c)| *i > 0 && (c.is_uppercase() || *c == '_'))
        .map(|(i, c)| if c == '_' { i + 1 } else { i })
        .last()
        .unwrap_or(0)
}

fn match_case(original: &str, plural: &str) -> String {
    if original.chars().next().is_some_and(char::is_uppercase) {
        let mut chars = plural.chars();
        chars
            .next()
            .map(|c| c.to_uppercase().chain(chars).collect())
            .unwrap_or_default()
    } else {
        plural.to_string()
    }
}
