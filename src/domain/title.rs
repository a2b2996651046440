/// Canonical form of a series title used for matching and for library
/// directory names: ASCII letters, digits and single spaces only.
pub fn normalize(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect();
    kept.split(' ')
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sort key that ignores a leading "The ".
pub fn sort_key(title: &str) -> &str {
    title.strip_prefix("The ").unwrap_or(title)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "Show Name",
        "  Marvel's Agents of S.H.I.E.L.D.  ",
        "Mr. Robot",
        "Law & Order: Special Victims Unit",
        "Star Trek: Discovery (2017)",
        "Pokémon",
        "tabs\tand\nnewlines",
        "!!!",
        "",
        "a    b",
    ];

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Show Name"), "Show Name");
        assert_eq!(normalize("Mr. Robot"), "Mr Robot");
        assert_eq!(
            normalize("Law & Order: Special Victims Unit"),
            "Law Order Special Victims Unit"
        );
        assert_eq!(
            normalize("  Marvel's Agents of S.H.I.E.L.D.  "),
            "Marvels Agents of SHIELD"
        );
        assert_eq!(normalize("Pokémon"), "Pokmon");
        assert_eq!(normalize("tabs\tand\nnewlines"), "tabsandnewlines");
        assert_eq!(normalize("!!!"), "");
        assert_eq!(normalize("a    b"), "a b");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for title in SAMPLES {
            let once = normalize(title);
            assert_eq!(normalize(&once), once, "title {title:?}");
        }
    }

    #[test]
    fn test_sort_key() {
        assert_eq!(sort_key("The Wire"), "Wire");
        assert_eq!(sort_key("Theater"), "Theater");
    }
}
