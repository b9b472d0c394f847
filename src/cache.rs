//! Thread-local cache of compiled anchor regexes.
//!
//! Patch sets are re-applied for every target file and every tier, and the
//! same handful of method-signature patterns shows up each time. Compiled
//! regexes are kept per thread, capped at 128 entries; the whole cache is
//! dropped when the cap is reached.

use regex::Regex;
use std::cell::RefCell;
use std::collections::HashMap;

const MAX_CACHE_ENTRIES: usize = 128;

thread_local! {
    static REGEX_CACHE: RefCell<HashMap<String, Regex>> = RefCell::new(HashMap::new());
}

/// Get a compiled regex from the cache, or compile and cache it.
///
/// Compilation errors are returned as-is and never cached.
pub fn get_or_compile_regex(pattern: &str) -> Result<Regex, regex::Error> {
    REGEX_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();

        if let Some(re) = cache.get(pattern) {
            return Ok(re.clone());
        }

        if cache.len() >= MAX_CACHE_ENTRIES {
            cache.clear();
        }

        let compiled = Regex::new(pattern)?;
        cache.insert(pattern.to_string(), compiled.clone());
        Ok(compiled)
    })
}

/// Clear the regex cache (mainly for testing).
pub fn clear_cache() {
    REGEX_CACHE.with(|cache| cache.borrow_mut().clear());
}

/// Number of compiled regexes held by the current thread.
pub fn cache_size() -> usize {
    REGEX_CACHE.with(|cache| cache.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compiles_once() {
        clear_cache();
        let a = get_or_compile_regex(r"\[FIRApp configure\];").unwrap();
        let b = get_or_compile_regex(r"\[FIRApp configure\];").unwrap();
        assert_eq!(a.as_str(), b.as_str());
        assert_eq!(cache_size(), 1);
    }

    #[test]
    fn test_invalid_pattern_not_cached() {
        clear_cache();
        assert!(get_or_compile_regex(r"(unclosed").is_err());
        assert_eq!(cache_size(), 0);
    }

    #[test]
    fn test_cap_evicts_everything() {
        clear_cache();
        for i in 0..MAX_CACHE_ENTRIES {
            get_or_compile_regex(&format!("line{i}")).unwrap();
        }
        assert_eq!(cache_size(), MAX_CACHE_ENTRIES);
        get_or_compile_regex("one-more").unwrap();
        assert_eq!(cache_size(), 1);
    }
}
