/// Cache-key normalization: trim, case-fold, collapse internal whitespace.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::normalize;

    #[test]
    fn collapses_and_folds() {
        assert_eq!(normalize("  Near   DOWNTOWN\t"), "near downtown");
        assert_eq!(normalize("near downtown"), normalize("NEAR\ndowntown "));
        assert_eq!(normalize("   "), "");
    }
}
