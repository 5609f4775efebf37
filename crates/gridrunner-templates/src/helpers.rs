//! The fixed helper vocabulary exposed to the template environment.
//!
//! Stochastic helpers (`random_int`, `random_string`, `faker`, `today`)
//! all draw from one seeded RNG per [`super::Renderer`] so a test can
//! pin every "random" value by constructing the renderer with
//! [`super::Renderer::with_seed`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const KOREAN_SURNAMES: &[&str] = &["김", "이", "박", "최", "정", "강", "조", "윤"];
const KOREAN_GIVEN_NAMES: &[&str] = &["민준", "서연", "도윤", "지우", "하은", "예준", "수빈", "시우"];
const EMAIL_DOMAINS: &[&str] = &["example.com", "mail.test", "korea.test"];

#[derive(Clone)]
pub struct Rng32(Arc<Mutex<StdRng>>);

impl Rng32 {
    pub fn from_seed(seed: u64) -> Self {
        Self(Arc::new(Mutex::new(StdRng::seed_from_u64(seed))))
    }

    pub fn from_entropy() -> Self {
        Self(Arc::new(Mutex::new(StdRng::from_entropy())))
    }

    pub fn random_int(&self, min: i64, max: i64) -> i64 {
        let mut rng = self.0.lock().expect("rng mutex poisoned");
        rng.gen_range(min..=max)
    }

    pub fn random_string(&self, n: usize) -> String {
        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        let mut rng = self.0.lock().expect("rng mutex poisoned");
        (0..n)
            .map(|_| {
                let idx = rng.gen_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }

    pub fn faker(&self) -> serde_json::Value {
        let mut rng = self.0.lock().expect("rng mutex poisoned");
        let surname = KOREAN_SURNAMES[rng.gen_range(0..KOREAN_SURNAMES.len())];
        let given = KOREAN_GIVEN_NAMES[rng.gen_range(0..KOREAN_GIVEN_NAMES.len())];
        let domain = EMAIL_DOMAINS[rng.gen_range(0..EMAIL_DOMAINS.len())];
        let digits: String = (0..8).map(|_| char::from(b'0' + rng.gen_range(0..10))).collect();
        serde_json::json!({
            "name": format!("{surname}{given}"),
            "email": format!("user{digits}@{domain}"),
            "phone": format!("010-{}-{}", &digits[0..4], &digits[4..8]),
        })
    }
}

pub fn today(format: &str) -> String {
    chrono::Local::now().format(format).to_string()
}

/// Reads `{js_dir}/{name}`, rejecting any path that escapes `js_dir`.
pub fn read_js_file(js_dir: &Path, name: &str) -> Result<String, super::error::TemplateError> {
    if name.contains("..") || Path::new(name).is_absolute() {
        return Err(super::error::TemplateError::Resource(format!(
            "refusing to read outside js_dir: {name}"
        )));
    }
    let path: PathBuf = js_dir.join(name);
    std::fs::read_to_string(&path)
        .map_err(|_| super::error::TemplateError::Resource(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_int_is_inclusive_and_deterministic_for_a_fixed_seed() {
        let rng = Rng32::from_seed(42);
        let a = rng.random_int(1, 1);
        assert_eq!(a, 1);
        let rng1 = Rng32::from_seed(7);
        let rng2 = Rng32::from_seed(7);
        assert_eq!(rng1.random_int(0, 1_000_000), rng2.random_int(0, 1_000_000));
    }

    #[test]
    fn random_string_has_requested_length_and_charset() {
        let rng = Rng32::from_seed(1);
        let s = rng.random_string(16);
        assert_eq!(s.len(), 16);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn faker_seeded_is_reproducible() {
        let rng1 = Rng32::from_seed(99);
        let rng2 = Rng32::from_seed(99);
        assert_eq!(rng1.faker(), rng2.faker());
    }

    #[test]
    fn read_js_file_rejects_traversal() {
        let dir = std::env::temp_dir();
        let err = read_js_file(&dir, "../escape.js").unwrap_err();
        assert!(matches!(err, super::super::error::TemplateError::Resource(_)));
    }
}
