//! Phonetic keys for CJK titles

use pinyin::ToPinyin;

/// Full romanization and initials of `text`.
///
/// Han characters are transliterated; other alphanumerics pass through
/// lowercased, and whitespace and punctuation are dropped.
pub fn phonetic_keys(text: &str) -> (String, String) {
    let mut full = String::new();
    let mut initials = String::new();

    for (c, py) in text.chars().zip(text.to_pinyin()) {
        match py {
            Some(py) => {
                full.push_str(py.plain());
                initials.push_str(py.first_letter());
            }
            None if c.is_alphanumeric() => {
                for lower in c.to_lowercase() {
                    full.push(lower);
                    initials.push(lower);
                }
            }
            None => {}
        }
    }

    (full, initials)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phonetic_keys() {
        let (full, initials) = phonetic_keys("文档管理");
        assert_eq!(full, "wendangguanli");
        assert_eq!(initials, "wdgl");
    }

    #[test]
    fn test_mixed_script_keeps_latin() {
        let (full, initials) = phonetic_keys("报告 V2");
        assert_eq!(full, "baogaov2");
        assert_eq!(initials, "bgv2");
    }
}
