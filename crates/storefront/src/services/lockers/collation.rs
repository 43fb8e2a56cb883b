//! Polish-locale string ordering.
//!
//! Primary level: whitespace and punctuation, then digits, then letters in
//! Polish alphabet order (`ą` after `a`, `ł` after `l` and so on). Letters
//! outside the alphabet follow `ż` by code point. Ties on the primary level
//! are broken by case, lowercase first, and finally by code point.

use std::cmp::Ordering;

const ALPHABET: [char; 35] = [
    'a', 'ą', 'b', 'c', 'ć', 'd', 'e', 'ę', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'ł', 'm', 'n', 'ń',
    'o', 'ó', 'p', 'q', 'r', 's', 'ś', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ź', 'ż',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Class {
    Separator,
    Digit,
    Letter,
    OtherLetter,
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn primary(c: char) -> (Class, u32) {
    let lower = fold(c);
    if let Some(pos) = ALPHABET.iter().position(|&l| l == lower) {
        (Class::Letter, u32::try_from(pos).unwrap_or(u32::MAX))
    } else if let Some(d) = c.to_digit(10) {
        (Class::Digit, d)
    } else if c.is_alphabetic() {
        (Class::OtherLetter, u32::from(lower))
    } else {
        (Class::Separator, u32::from(c))
    }
}

/// Compare two strings the way a Polish reader expects.
#[must_use]
pub fn compare(a: &str, b: &str) -> Ordering {
    a.chars()
        .map(primary)
        .cmp(b.chars().map(primary))
        .then_with(|| {
            a.chars()
                .map(char::is_uppercase)
                .cmp(b.chars().map(char::is_uppercase))
        })
        .then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(input: &[&str]) -> Vec<String> {
        let mut v: Vec<String> = input.iter().map(|s| (*s).to_owned()).collect();
        v.sort_by(|a, b| compare(a, b));
        v
    }

    #[test]
    fn test_diacritics_follow_base_letter() {
        assert_eq!(
            sorted(&["Malbork", "Łódź", "Lublin", "Łomża"]),
            vec!["Lublin", "Łomża", "Łódź", "Malbork"]
        );
        assert_eq!(
            sorted(&["Ćmielów", "Czersk", "Cieszyn"]),
            vec!["Cieszyn", "Czersk", "Ćmielów"]
        );
    }

    #[test]
    fn test_z_variants() {
        assert_eq!(
            sorted(&["Żary", "Źródła", "Zielona Góra"]),
            vec!["Zielona Góra", "Źródła", "Żary"]
        );
    }

    #[test]
    fn test_case_is_secondary() {
        assert_eq!(compare("abc", "Abc"), Ordering::Less);
        assert_eq!(compare("Abc", "abd"), Ordering::Less);
        assert_eq!(compare("Kraków", "Kraków"), Ordering::Equal);
    }

    #[test]
    fn test_space_digits_letters() {
        assert_eq!(compare("Nowa Wieś", "Nowak"), Ordering::Less);
        assert_eq!(compare("KRA01M", "KRAA1M"), Ordering::Less);
        assert_eq!(compare("WAW01", "WAW100"), Ordering::Less);
    }

    #[test]
    fn test_prefix_sorts_first() {
        assert_eq!(compare("Gdańsk", "Gdańsk Oliwa"), Ordering::Less);
    }
}
